//! Reusable brainstorm prompt templates.
//!
//! A template is a saved prompt with `{task}`, `{quadrant}`, `{user}`, `{date}`
//! and `{time}` placeholders, substituted when the template is used. Templates
//! survive a clean slate and can be exported to / imported from a JSON bundle.

use std::sync::LazyLock;

use chrono::{DateTime, Local, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fields::Quadrant;
use crate::task::new_template_id;

pub const BUNDLE_VERSION: &str = "1.0";

const PLACEHOLDER_PATTERN: &str = r"(?i)\{(task|quadrant|user|date|time)\}";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time, epoch milliseconds.
    pub created: i64,
    #[serde(default)]
    pub last_used: Option<i64>,
    #[serde(default)]
    pub use_count: u32,
}

/// Partial update; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub prompt: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// What `export templates` writes and `import` reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateBundle {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub user: String,
    pub templates: Vec<Template>,
}

/// Values substituted into a template prompt.
#[derive(Debug, Clone)]
pub struct TemplateVars<'a> {
    pub task: &'a str,
    pub quadrant: Option<Quadrant>,
    pub user: &'a str,
    pub now: DateTime<Local>,
}

/// Split "a, b,,c" style tag input.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn require(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("Template {} cannot be empty", field)));
    }
    Ok(value.to_string())
}

impl Template {
    /// Build a template. Name and prompt are required.
    pub fn new(name: &str, description: &str, prompt: &str, tags: Vec<String>) -> Result<Self> {
        Ok(Template {
            id: new_template_id(),
            name: require("name", name)?,
            description: description.trim().to_string(),
            prompt: require("prompt", prompt)?,
            tags: clean_tags(tags),
            created: Utc::now().timestamp_millis(),
            last_used: None,
            use_count: 0,
        })
    }

    /// Case-insensitive match over name, description and tags.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.name.to_lowercase().contains(&q)
            || self.description.to_lowercase().contains(&q)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&q))
    }

    /// The prompt with every placeholder replaced.
    pub fn render(&self, vars: &TemplateVars<'_>) -> String {
        substitute(&self.prompt, vars)
    }
}

/// Replace `{task}`, `{quadrant}`, `{user}`, `{date}` and `{time}`
/// (case-insensitively) in `text`.
pub fn substitute(text: &str, vars: &TemplateVars<'_>) -> String {
    let date = vars.now.format("%-m/%-d/%Y").to_string();
    let time = vars.now.format("%-I:%M:%S %p").to_string();
    let quadrant = vars.quadrant.map(|q| q.display_name()).unwrap_or("");
    let pairs = [
        ("task", vars.task),
        ("quadrant", quadrant),
        ("user", vars.user),
        ("date", date.as_str()),
        ("time", time.as_str()),
    ];

    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let name = caps[1].to_lowercase();
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// A user's template collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateLibrary {
    templates: Vec<Template>,
}

impl TemplateLibrary {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn create(&mut self, name: &str, description: &str, prompt: &str, tags: Vec<String>) -> Result<Template> {
        let template = Template::new(name, description, prompt, tags)?;
        self.templates.push(template.clone());
        Ok(template)
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Look a template up by id, or by exact (case-insensitive) name.
    pub fn resolve(&self, id_or_name: &str) -> Result<&Template> {
        self.get(id_or_name)
            .or_else(|| {
                self.templates
                    .iter()
                    .find(|t| t.name.eq_ignore_ascii_case(id_or_name))
            })
            .ok_or_else(|| Error::NotFound(format!("template '{}'", id_or_name)))
    }

    pub fn update(&mut self, id: &str, update: TemplateUpdate) -> Result<Template> {
        let template = self
            .templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("template '{}'", id)))?;
        let name = update.name.as_deref().map(|n| require("name", n)).transpose()?;
        let prompt = update.prompt.as_deref().map(|p| require("prompt", p)).transpose()?;

        if let Some(name) = name {
            template.name = name;
        }
        if let Some(prompt) = prompt {
            template.prompt = prompt;
        }
        if let Some(description) = update.description {
            template.description = description.trim().to_string();
        }
        if let Some(tags) = update.tags {
            template.tags = clean_tags(tags);
        }
        Ok(template.clone())
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.templates.len();
        self.templates.retain(|t| t.id != id);
        self.templates.len() != before
    }

    /// Bump usage statistics.
    pub fn mark_used(&mut self, id: &str) -> Option<&Template> {
        let template = self.templates.iter_mut().find(|t| t.id == id)?;
        template.last_used = Some(Utc::now().timestamp_millis());
        template.use_count += 1;
        Some(template)
    }

    /// All templates, most recently used first; never-used ones last.
    pub fn all(&self) -> Vec<&Template> {
        let mut list: Vec<&Template> = self.templates.iter().collect();
        list.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        list
    }

    pub fn search(&self, query: &str) -> Vec<&Template> {
        self.templates.iter().filter(|t| t.matches(query)).collect()
    }

    pub fn bundle(&self, user: &str) -> TemplateBundle {
        TemplateBundle {
            version: BUNDLE_VERSION.to_string(),
            export_date: Utc::now(),
            user: user.to_string(),
            templates: self.all().into_iter().cloned().collect(),
        }
    }

    /// Add every template from an exported bundle.
    ///
    /// The raw JSON is validated first: it must hold a `templates` array whose
    /// entries all have non-empty string `name` and `prompt`. Imported
    /// templates get fresh ids and zeroed usage; names that clash are suffixed
    /// `" (n)"`. Returns `(imported, renamed)`.
    pub fn import(&mut self, raw: &str) -> Result<(usize, usize)> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| Error::Validation(format!("Invalid template file: {}", e)))?;
        let Some(entries) = value.get("templates").and_then(|t| t.as_array()) else {
            return Err(Error::Validation(
                "Invalid template file format. Missing templates array.".into(),
            ));
        };

        let mut incoming = Vec::with_capacity(entries.len());
        for entry in entries {
            let field = |name: &str| -> Result<String> {
                match entry.get(name).and_then(|v| v.as_str()) {
                    Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
                    _ => Err(Error::Validation(format!(
                        "Invalid template: missing or invalid '{}' field.",
                        name
                    ))),
                }
            };
            let name = field("name")?;
            let prompt = field("prompt")?;
            let description = entry
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let tags: Vec<String> = entry
                .get("tags")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|t| t.as_str().map(String::from)).collect())
                .unwrap_or_default();
            incoming.push((name, description, prompt, tags));
        }

        let mut renamed = 0;
        for (name, description, prompt, tags) in incoming {
            let mut candidate = name.trim().to_string();
            let mut counter = 1;
            while self.templates.iter().any(|t| t.name == candidate) {
                candidate = format!("{} ({})", name.trim(), counter);
                counter += 1;
            }
            if counter > 1 {
                renamed += 1;
            }
            self.create(&candidate, &description, &prompt, tags)?;
        }
        Ok((entries.len(), renamed))
    }
}
