//! Enumerations and field types for the task board.
//!
//! The four quadrants are the only categorisation the board knows about. Their
//! kebab-less lowercase keys are part of the storage format and of the JSON the
//! categorization service is asked to return, so they must never change.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One of the four fixed task categories, ordered as the board shows them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Quadrant {
    /// 2-5 minute tasks that unblock next steps.
    Triggers,
    /// Ideas to capture so they stop taking up mental bandwidth.
    Marinate,
    /// Tasks requiring an hour or more of focused time.
    Deepwork,
    /// 10-30 minute tasks for momentum.
    Quickwins,
}

impl Quadrant {
    /// All quadrants in board order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::Triggers,
        Quadrant::Marinate,
        Quadrant::Deepwork,
        Quadrant::Quickwins,
    ];

    /// Storage / wire key.
    pub fn key(self) -> &'static str {
        match self {
            Quadrant::Triggers => "triggers",
            Quadrant::Marinate => "marinate",
            Quadrant::Deepwork => "deepwork",
            Quadrant::Quickwins => "quickwins",
        }
    }

    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Quadrant::Triggers => "Set in Motion",
            Quadrant::Marinate => "Marinate",
            Quadrant::Deepwork => "Deep Work",
            Quadrant::Quickwins => "Quick Wins",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Quadrant::Triggers => "2-5 minute tasks that unblock next steps",
            Quadrant::Marinate => "Ideas to jot down and let simmer",
            Quadrant::Deepwork => "Tasks requiring extended focus",
            Quadrant::Quickwins => "Short tasks for momentum",
        }
    }

    /// Column position on the board.
    pub fn index(self) -> usize {
        match self {
            Quadrant::Triggers => 0,
            Quadrant::Marinate => 1,
            Quadrant::Deepwork => 2,
            Quadrant::Quickwins => 3,
        }
    }

    pub fn from_index(i: usize) -> Option<Quadrant> {
        Quadrant::ALL.get(i).copied()
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Quadrant {
    type Err = String;

    /// Accepts the storage key or the display name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Quadrant::ALL
            .iter()
            .copied()
            .find(|q| q.key() == needle || q.display_name().to_lowercase() == needle)
            .ok_or_else(|| format!("Unknown quadrant '{}'", s))
    }
}

/// What the `export` command writes out.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ExportKind {
    /// The completed-task log.
    Completed,
    /// Brain-dump history with the categorization each dump produced.
    History,
    /// Brainstorm prompt templates, as an importable bundle.
    Templates,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrant_keys_roundtrip_through_serde() {
        for q in Quadrant::ALL {
            let json = serde_json::to_string(&q).unwrap();
            assert_eq!(json, format!("\"{}\"", q.key()));
            let back: Quadrant = serde_json::from_str(&json).unwrap();
            assert_eq!(back, q);
        }
    }

    #[test]
    fn test_quadrant_from_str() {
        assert_eq!("deepwork".parse::<Quadrant>().unwrap(), Quadrant::Deepwork);
        assert_eq!("Quick Wins".parse::<Quadrant>().unwrap(), Quadrant::Quickwins);
        assert_eq!(" set in motion ".parse::<Quadrant>().unwrap(), Quadrant::Triggers);
        assert!("someday".parse::<Quadrant>().is_err());
    }

    #[test]
    fn test_index_order() {
        for (i, q) in Quadrant::ALL.iter().enumerate() {
            assert_eq!(q.index(), i);
            assert_eq!(Quadrant::from_index(i), Some(*q));
        }
        assert_eq!(Quadrant::from_index(4), None);
    }
}
