//! One user's working session.
//!
//! A `Session` owns everything the app knows about the active user: the task
//! board, the completed log, brain-dump history, prompt templates and the
//! selected model. It is built fresh for each user and dropped on switch, so
//! nothing leaks between users. Every command that changes state writes the
//! affected keys back to the user's store before returning.

use chrono::{Local, Utc};
use log::{debug, info, warn};

use crate::board::{StoredBoard, TaskBoard};
use crate::brainstorm::{self, BrainstormContext};
use crate::db::{
    Store, UserStore, KEY_COMPLETED, KEY_LAST_UPDATED, KEY_LOGS, KEY_MODEL, KEY_TASKS, KEY_TEMPLATES,
};
use crate::error::{Error, Result};
use crate::fields::Quadrant;
use crate::llm::{self, ChatService};
use crate::task::{new_dump_id, BrainDumpLog, Categorization, CompletedRecord, Task};
use crate::template::{Template, TemplateLibrary, TemplateUpdate, TemplateVars};
use crate::user::KEY_USER_NAME;

/// What a successful brain-dump submission produced.
#[derive(Debug, Clone)]
pub struct Organized {
    pub dump_id: String,
    pub added: usize,
    pub categorization: Categorization,
}

pub struct Session {
    user: String,
    store: UserStore,
    board: TaskBoard,
    completed: Vec<CompletedRecord>,
    logs: Vec<BrainDumpLog>,
    templates: TemplateLibrary,
    model: String,
}

impl Session {
    /// Load `user`'s data, migrating legacy entries on the way in.
    pub fn open(store: &Store, user: &str, default_model: &str) -> Result<Self> {
        let user_store = store.user(user);

        let (board, migrated) = user_store
            .get::<StoredBoard>(KEY_TASKS)
            .unwrap_or_default()
            .normalise();
        let completed: Vec<CompletedRecord> = user_store.get(KEY_COMPLETED).unwrap_or_default();
        let mut logs: Vec<BrainDumpLog> = user_store.get(KEY_LOGS).unwrap_or_default();
        let templates: TemplateLibrary = user_store.get(KEY_TEMPLATES).unwrap_or_default();
        let model = user_store
            .get::<String>(KEY_MODEL)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model.to_string());

        let duplicates = board.duplicate_ids();
        if !duplicates.is_empty() {
            warn!("Board for {} has duplicate task ids: {}", user, duplicates.join(", "));
        }

        let mut logs_migrated = false;
        for log in logs.iter_mut().filter(|l| l.id.is_none()) {
            log.id = Some(new_dump_id());
            logs_migrated = true;
        }

        let session = Session {
            user: user.trim().to_string(),
            store: user_store,
            board,
            completed,
            logs,
            templates,
            model,
        };

        if session.store.get::<String>(KEY_USER_NAME).as_deref() != Some(session.user.as_str()) {
            session.store.set(KEY_USER_NAME, &session.user)?;
        }
        if migrated {
            info!("Migrated legacy tasks for {} to the object format", session.user);
            session.save_board()?;
        }
        if logs_migrated {
            info!("Assigned ids to legacy brain-dump logs for {}", session.user);
            session.save_logs()?;
        }
        debug!(
            "opened session for {}: {} tasks, {} completed",
            session.user,
            session.board.total(),
            session.completed.len()
        );
        Ok(session)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    pub fn completed(&self) -> &[CompletedRecord] {
        &self.completed
    }

    pub fn logs(&self) -> &[BrainDumpLog] {
        &self.logs
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The brain dump a task was extracted from.
    pub fn dump_for(&self, task: &Task) -> Option<&BrainDumpLog> {
        let id = task.source_dump_id.as_deref()?;
        self.logs.iter().find(|l| l.id.as_deref() == Some(id))
    }

    fn save_board(&self) -> Result<()> {
        self.store.set(KEY_TASKS, &self.board)?;
        self.store.set(KEY_LAST_UPDATED, &Utc::now())
    }

    fn save_completed(&self) -> Result<()> {
        self.store.set(KEY_COMPLETED, &self.completed)
    }

    fn save_logs(&self) -> Result<()> {
        self.store.set(KEY_LOGS, &self.logs)
    }

    fn save_templates(&self) -> Result<()> {
        self.store.set(KEY_TEMPLATES, &self.templates)
    }

    pub fn add_task(&mut self, quadrant: Quadrant, text: &str) -> Result<Task> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Task text cannot be empty".into()));
        }
        let task = self.board.insert(quadrant, text, None);
        self.save_board()?;
        Ok(task)
    }

    pub fn delete_task(&mut self, quadrant: Quadrant, index: usize) -> Result<Option<Task>> {
        let removed = self.board.delete(quadrant, index);
        if removed.is_some() {
            self.save_board()?;
        }
        Ok(removed)
    }

    pub fn edit_task(&mut self, quadrant: Quadrant, index: usize, text: &str) -> Result<bool> {
        let changed = self.board.edit_text(quadrant, index, text);
        if changed {
            self.save_board()?;
        }
        Ok(changed)
    }

    pub fn move_within(&mut self, quadrant: Quadrant, from: usize, to: usize, drop_above: bool) -> Result<bool> {
        let moved = self.board.move_within(quadrant, from, to, drop_above);
        if moved {
            self.save_board()?;
        }
        Ok(moved)
    }

    pub fn move_across(
        &mut self,
        from: Quadrant,
        from_index: usize,
        to: Quadrant,
        to_index: Option<usize>,
        drop_above: bool,
    ) -> Result<bool> {
        let moved = self.board.move_across(from, from_index, to, to_index, drop_above);
        if moved {
            self.save_board()?;
        }
        Ok(moved)
    }

    pub fn complete_task(&mut self, quadrant: Quadrant, index: usize) -> Result<Option<CompletedRecord>> {
        let Some(record) = self.board.complete(quadrant, index, &mut self.completed) else {
            return Ok(None);
        };
        self.save_board()?;
        self.save_completed()?;
        Ok(Some(record))
    }

    pub fn undo_completed(&mut self, completed_id: u64) -> Result<Task> {
        let task = self.board.undo(completed_id, &mut self.completed)?;
        self.save_board()?;
        self.save_completed()?;
        Ok(task)
    }

    /// Send a brain dump to the categorizer and put the results on the board.
    ///
    /// On any failure the board is left exactly as it was.
    pub fn organize(&mut self, brain_dump: &str, service: &dyn ChatService) -> Result<Organized> {
        let brain_dump = brain_dump.trim();
        if brain_dump.is_empty() {
            return Err(Error::Validation("Please enter some thoughts first".into()));
        }
        let categorization = llm::categorize(service, &self.model, brain_dump)?;

        let dump_id = new_dump_id();
        let added = self.board.ingest(&categorization, &dump_id);
        self.save_board()?;

        self.logs.push(BrainDumpLog {
            id: Some(dump_id.clone()),
            timestamp: Utc::now(),
            brain_dump: brain_dump.to_string(),
            categorized_tasks: categorization.clone(),
        });
        self.save_logs()?;

        info!("Organized brain dump {} into {} tasks", dump_id, added);
        Ok(Organized { dump_id, added, categorization })
    }

    /// Forget the board, the completed log and brain-dump history. Templates
    /// and the model choice stay.
    pub fn clean_slate(&mut self) -> Result<()> {
        self.board.clear();
        self.completed.clear();
        self.logs.clear();
        self.save_board()?;
        self.save_completed()?;
        self.save_logs()?;
        info!("Clean slate for {}", self.user);
        Ok(())
    }

    /// Models are named `provider/model`.
    pub fn set_model(&mut self, model: &str) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            return Err(Error::Validation("Please enter a model name".into()));
        }
        if !model.contains('/') {
            return Err(Error::Validation(
                "Invalid model format. Use provider/model-name (e.g. openai/gpt-4o)".into(),
            ));
        }
        self.model = model.to_string();
        self.store.set(KEY_MODEL, &self.model)
    }

    pub fn create_template(&mut self, name: &str, description: &str, prompt: &str, tags: Vec<String>) -> Result<Template> {
        let template = self.templates.create(name, description, prompt, tags)?;
        self.save_templates()?;
        Ok(template)
    }

    pub fn update_template(&mut self, id_or_name: &str, update: TemplateUpdate) -> Result<Template> {
        let id = self.templates.resolve(id_or_name)?.id.clone();
        let template = self.templates.update(&id, update)?;
        self.save_templates()?;
        Ok(template)
    }

    pub fn delete_template(&mut self, id_or_name: &str) -> Result<Template> {
        let template = self.templates.resolve(id_or_name)?.clone();
        self.templates.delete(&template.id);
        self.save_templates()?;
        Ok(template)
    }

    /// Import an exported bundle. Returns `(imported, renamed)`.
    pub fn import_templates(&mut self, raw: &str) -> Result<(usize, usize)> {
        let counts = self.templates.import(raw)?;
        self.save_templates()?;
        Ok(counts)
    }

    /// Ask the assistant about the task at `index` of `quadrant`, optionally
    /// through a template.
    pub fn brainstorm(
        &mut self,
        quadrant: Quadrant,
        index: usize,
        template: Option<&str>,
        request: &str,
        service: &dyn ChatService,
    ) -> Result<String> {
        let task = self
            .board
            .get(quadrant, index)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("task {} in {}", index + 1, quadrant)))?;

        let template_text = match template {
            Some(name) => {
                let id = self.templates.resolve(name)?.id.clone();
                let vars = TemplateVars {
                    task: &task.text,
                    quadrant: Some(quadrant),
                    user: &self.user,
                    now: Local::now(),
                };
                let rendered = self.templates.mark_used(&id).map(|t| t.render(&vars));
                self.save_templates()?;
                rendered
            }
            None => None,
        };

        let ctx = BrainstormContext {
            task: &task.text,
            quadrant,
            user: &self.user,
            brain_dump: self.dump_for(&task).map(|l| l.brain_dump.as_str()),
            template: template_text.as_deref(),
        };
        brainstorm::ask(service, &self.model, &ctx, request)
    }
}
