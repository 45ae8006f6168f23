//! The task board: four ordered task lists and the operations that keep them
//! consistent.
//!
//! Every operation here is synchronous and purely in-memory. Persistence is the
//! caller's job (see `session`), which writes the whole board after each
//! mutation. Out-of-range indices are ignored rather than reported; the only
//! reported failure is undoing a completed record that does not exist.
//!
//! Moves always remove from the source list before inserting into the
//! destination, so a task id is owned by at most one list at any time.

use std::collections::HashSet;

use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fields::Quadrant;
use crate::task::{Categorization, CompletedRecord, Task, TaskEntry};

/// Quadrant → ordered tasks. List order is the on-screen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBoard {
    pub triggers: Vec<Task>,
    pub marinate: Vec<Task>,
    pub deepwork: Vec<Task>,
    pub quickwins: Vec<Task>,
}

/// The board as stored, before legacy entries are normalised.
#[derive(Debug, Default, Deserialize)]
pub struct StoredBoard {
    #[serde(default)]
    pub triggers: Vec<TaskEntry>,
    #[serde(default)]
    pub marinate: Vec<TaskEntry>,
    #[serde(default)]
    pub deepwork: Vec<TaskEntry>,
    #[serde(default)]
    pub quickwins: Vec<TaskEntry>,
}

impl StoredBoard {
    /// Convert every entry to the object form.
    ///
    /// Returns the board and whether any legacy entry had to be migrated.
    pub fn normalise(self) -> (TaskBoard, bool) {
        let migrated = [&self.triggers, &self.marinate, &self.deepwork, &self.quickwins]
            .iter()
            .any(|lane| lane.iter().any(TaskEntry::is_legacy));
        let convert = |lane: Vec<TaskEntry>| -> Vec<Task> { lane.into_iter().map(TaskEntry::into_task).collect() };
        let board = TaskBoard {
            triggers: convert(self.triggers),
            marinate: convert(self.marinate),
            deepwork: convert(self.deepwork),
            quickwins: convert(self.quickwins),
        };
        (board, migrated)
    }
}

/// Where a dragged task lands when dropped on another task of the same list.
///
/// `dragged` and `target` are indices in the list before the dragged task is
/// removed; `len_after_removal` is the list length once it has been. Dropping
/// above the target's midpoint inserts before it, below inserts after it. The
/// removal shifts the target up by one when the dragged task came from above.
pub fn reorder_index(dragged: usize, target: usize, drop_above: bool, len_after_removal: usize) -> usize {
    let index = if dragged < target {
        if drop_above { target - 1 } else { target }
    } else if drop_above {
        target
    } else {
        target + 1
    };
    index.min(len_after_removal)
}

impl TaskBoard {
    pub fn lane(&self, quadrant: Quadrant) -> &Vec<Task> {
        match quadrant {
            Quadrant::Triggers => &self.triggers,
            Quadrant::Marinate => &self.marinate,
            Quadrant::Deepwork => &self.deepwork,
            Quadrant::Quickwins => &self.quickwins,
        }
    }

    fn lane_mut(&mut self, quadrant: Quadrant) -> &mut Vec<Task> {
        match quadrant {
            Quadrant::Triggers => &mut self.triggers,
            Quadrant::Marinate => &mut self.marinate,
            Quadrant::Deepwork => &mut self.deepwork,
            Quadrant::Quickwins => &mut self.quickwins,
        }
    }

    pub fn get(&self, quadrant: Quadrant, index: usize) -> Option<&Task> {
        self.lane(quadrant).get(index)
    }

    /// Locate a task by id.
    pub fn find(&self, id: &str) -> Option<(Quadrant, usize)> {
        Quadrant::ALL.iter().find_map(|&q| {
            self.lane(q).iter().position(|t| t.id == id).map(|i| (q, i))
        })
    }

    /// Total number of tasks across all four lists.
    pub fn total(&self) -> usize {
        Quadrant::ALL.iter().map(|q| self.lane(*q).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Append a new task to the end of `quadrant`.
    pub fn insert(&mut self, quadrant: Quadrant, text: impl Into<String>, source_dump_id: Option<String>) -> Task {
        let task = Task::new(text, source_dump_id);
        self.lane_mut(quadrant).push(task.clone());
        debug!("insert: {} into {}", task.id, quadrant.key());
        task
    }

    /// Remove and return the task at `index`. No-op when out of bounds.
    pub fn delete(&mut self, quadrant: Quadrant, index: usize) -> Option<Task> {
        let lane = self.lane_mut(quadrant);
        if index >= lane.len() {
            return None;
        }
        Some(lane.remove(index))
    }

    /// Replace the text of the task at `index`, keeping everything else.
    ///
    /// Empty (or all-whitespace) text is discarded and the original kept.
    /// Returns whether the task changed.
    pub fn edit_text(&mut self, quadrant: Quadrant, index: usize, new_text: &str) -> bool {
        let new_text = new_text.trim();
        if new_text.is_empty() {
            return false;
        }
        match self.lane_mut(quadrant).get_mut(index) {
            Some(task) if task.text != new_text => {
                task.text = new_text.to_string();
                true
            }
            _ => false,
        }
    }

    /// Drag the task at `from` onto the task at `to` in the same list.
    ///
    /// Returns whether anything moved.
    pub fn move_within(&mut self, quadrant: Quadrant, from: usize, to: usize, drop_above: bool) -> bool {
        let lane = self.lane_mut(quadrant);
        if from == to || from >= lane.len() || to >= lane.len() {
            return false;
        }
        let task = lane.remove(from);
        let index = reorder_index(from, to, drop_above, lane.len());
        lane.insert(index, task);
        debug!("move_within: {} {} -> {}", quadrant.key(), from, index);
        from != index
    }

    /// Move the task at `from_index` of `from` into `to`.
    ///
    /// With a target index the task lands above or below that task, otherwise
    /// at the end. Within a single list this defers to [`move_within`]; a drop
    /// on the empty area of the task's own list does nothing.
    ///
    /// [`move_within`]: TaskBoard::move_within
    pub fn move_across(
        &mut self,
        from: Quadrant,
        from_index: usize,
        to: Quadrant,
        to_index: Option<usize>,
        drop_above: bool,
    ) -> bool {
        if from == to {
            return match to_index {
                Some(target) => self.move_within(from, from_index, target, drop_above),
                None => false,
            };
        }
        let Some(task) = self.delete(from, from_index) else {
            return false;
        };
        let dest = self.lane_mut(to);
        match to_index {
            Some(target) => {
                let index = if drop_above { target } else { target + 1 };
                dest.insert(index.min(dest.len()), task);
            }
            None => dest.push(task),
        }
        debug!("move_across: {}[{}] -> {}", from.key(), from_index, to.key());
        true
    }

    /// Check off the task at `index`: remove it and append a record to `log`.
    pub fn complete(&mut self, quadrant: Quadrant, index: usize, log: &mut Vec<CompletedRecord>) -> Option<CompletedRecord> {
        let task = self.delete(quadrant, index)?;
        let record = CompletedRecord::new(next_completed_id(log), task.text, quadrant);
        log.push(record.clone());
        Some(record)
    }

    /// Put a completed task back at the end of its original list.
    ///
    /// The task gets a fresh id and loses its brain-dump link; its old position
    /// is not restored.
    pub fn undo(&mut self, completed_id: u64, log: &mut Vec<CompletedRecord>) -> Result<Task> {
        let pos = log
            .iter()
            .position(|r| r.id == completed_id)
            .ok_or_else(|| Error::NotFound(format!("completed record {}", completed_id)))?;
        let record = log.remove(pos);
        Ok(self.insert(record.quadrant, record.text, None))
    }

    /// Append everything a categorization produced, tagged with `dump_id`.
    pub fn ingest(&mut self, categorization: &Categorization, dump_id: &str) -> usize {
        let mut added = 0;
        for quadrant in Quadrant::ALL {
            for text in categorization.items(quadrant) {
                self.insert(quadrant, text.clone(), Some(dump_id.to_string()));
                added += 1;
            }
        }
        added
    }

    pub fn clear(&mut self) {
        for quadrant in Quadrant::ALL {
            self.lane_mut(quadrant).clear();
        }
    }

    /// Ids that appear in more than one place. Always empty for a board only
    /// touched through these operations.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for quadrant in Quadrant::ALL {
            for task in self.lane(quadrant) {
                if !seen.insert(task.id.as_str()) {
                    dups.push(task.id.clone());
                }
            }
        }
        dups
    }
}

/// Next completed-record id: the current time in milliseconds, bumped past the
/// newest existing id so ids stay unique when completions land in the same
/// millisecond.
pub fn next_completed_id(log: &[CompletedRecord]) -> u64 {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let last = log.iter().map(|r| r.id).max().unwrap_or(0);
    now.max(last + 1)
}
