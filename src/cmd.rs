//! Command implementations for the CLI interface.
//!
//! Each subcommand maps onto one session operation. Handlers print results to
//! stdout; failures go to stderr with a non-zero exit, so scripts can tell a
//! rejected input from a successful no-op.

use std::fs;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::config::Config;
use crate::db::*;
use crate::error::{Error, Result};
use crate::export::{group_completed, history, write_export};
use crate::fields::*;
use crate::llm::ChatService;
use crate::session::Session;
use crate::template::{parse_tags, Template, TemplateUpdate};
use crate::tui::run::run_board;
use crate::user::{discover_users, validate_user_name, KEY_USER_NAME};

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive board.
    Ui,

    /// Send a brain dump to be sorted into quadrants.
    /// Reads stdin when no text is given.
    Dump {
        /// The text to sort. Words are joined with spaces.
        text: Vec<String>,
        /// Read the brain dump from a file.
        #[arg(long, short, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Add a task to a quadrant.
    Add {
        #[arg(value_enum)]
        quadrant: Quadrant,
        /// Task text.
        text: Vec<String>,
    },

    /// Show the board, or a single quadrant.
    #[command(alias = "board", alias = "ls")]
    List {
        #[arg(value_enum)]
        quadrant: Option<Quadrant>,
        /// Also show task ids and where each task came from.
        #[arg(long, short)]
        verbose: bool,
    },

    /// Replace the text of a task.
    Edit {
        #[arg(value_enum)]
        quadrant: Quadrant,
        /// 1-based position in the quadrant.
        position: usize,
        text: Vec<String>,
    },

    /// Delete a task.
    #[command(alias = "rm")]
    Delete {
        #[arg(value_enum)]
        quadrant: Quadrant,
        position: usize,
    },

    /// Drop a task onto another task of the same quadrant.
    Reorder {
        #[arg(value_enum)]
        quadrant: Quadrant,
        /// Position of the task to move.
        from: usize,
        /// Position of the task to drop onto.
        onto: usize,
        /// Land above the target instead of below it.
        #[arg(long)]
        above: bool,
    },

    /// Move a task to another quadrant.
    Move {
        #[arg(value_enum)]
        quadrant: Quadrant,
        position: usize,
        /// Destination quadrant.
        #[arg(value_enum)]
        to: Quadrant,
        /// Drop onto this position of the destination instead of appending.
        #[arg(long)]
        onto: Option<usize>,
        /// With --onto, land above the target instead of below it.
        #[arg(long, requires = "onto")]
        above: bool,
    },

    /// Check off a task.
    #[command(alias = "check")]
    Complete {
        #[arg(value_enum)]
        quadrant: Quadrant,
        position: usize,
    },

    /// Put a completed task back on the board (default: the latest one).
    Undo {
        /// Completed record id, as shown by `done --verbose`.
        id: Option<u64>,
    },

    /// List completed tasks grouped by day.
    Done {
        /// Show record ids.
        #[arg(long, short)]
        verbose: bool,
    },

    /// Browse past brain dumps.
    History {
        /// Only dumps whose text or tasks contain this.
        #[arg(long, short)]
        search: Option<String>,
    },

    /// Export completed tasks, brain-dump history or templates to JSON.
    Export {
        #[arg(value_enum)]
        kind: ExportKind,
        /// Output file path (default: a dated file in the current directory).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Manage brainstorm prompt templates.
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Ask the assistant for help with one task.
    Brainstorm {
        #[arg(value_enum)]
        quadrant: Quadrant,
        position: usize,
        /// What you want help with.
        request: Vec<String>,
        /// Apply a saved template (id or name).
        #[arg(long, short)]
        template: Option<String>,
    },

    /// Show or change the language model, e.g. `openai/gpt-4o`.
    Model {
        model: Option<String>,
    },

    /// Show or change configuration.
    Config {
        /// Save an OpenRouter API key to the config file.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// List users with data in the data directory.
    Users,

    /// Switch to another user. New names start with an empty board.
    #[command(alias = "switch-user")]
    Login {
        name: String,
    },

    /// Forget the current user.
    Logout,

    /// Clear the board, completed tasks and brain-dump history. Templates are kept.
    CleanSlate {
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum TemplateAction {
    /// Create a new template.
    Create {
        name: String,
        /// Prompt text; may use {task}, {quadrant}, {user}, {date} and {time}.
        #[arg(long, short)]
        prompt: String,
        #[arg(long, short)]
        description: Option<String>,
        /// Comma-separated tags.
        #[arg(long)]
        tags: Option<String>,
    },
    /// List templates, most recently used first.
    List,
    /// Show one template in full.
    Show {
        /// Template id or name.
        template: String,
    },
    /// Change fields of a template.
    Edit {
        /// Template id or name.
        template: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, short)]
        prompt: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        /// Comma-separated tags; replaces the existing ones.
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a template.
    Delete {
        template: String,
    },
    /// Find templates by name, description or tag.
    Search {
        query: String,
    },
    /// Import templates from an exported bundle.
    Import {
        input: PathBuf,
    },
}

/// Print the error and exit non-zero.
fn fail(e: Error) -> ! {
    eprintln!("Error: {e}");
    if !e.is_user_error() {
        eprintln!("Run with RUST_LOG=debug for more detail.");
    }
    std::process::exit(1);
}

fn or_exit<T>(result: Result<T>) -> T {
    result.unwrap_or_else(|e| fail(e))
}

/// 1-based position from the command line to a list index.
fn index_of(position: usize) -> usize {
    if position == 0 {
        fail(Error::Validation("Positions start at 1".into()));
    }
    position - 1
}

fn no_task(quadrant: Quadrant, position: usize) -> ! {
    fail(Error::NotFound(format!("task {} in {}", position, quadrant)))
}

/// Launch the board.
pub fn cmd_ui(session: &mut Session, service: &dyn ChatService) {
    if let Err(e) = run_board(session, service) {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}

pub fn cmd_dump(session: &mut Session, service: &dyn ChatService, text: Vec<String>, file: Option<PathBuf>) {
    let dump = if let Some(path) = file {
        or_exit(fs::read_to_string(&path).map_err(Error::from))
    } else if !text.is_empty() {
        text.join(" ")
    } else {
        if io::stdin().is_terminal() {
            eprintln!("Type your brain dump, then Ctrl-D:");
        }
        let mut buf = String::new();
        or_exit(io::stdin().read_to_string(&mut buf).map_err(Error::from));
        buf
    };

    println!("Organizing with {}...", session.model());
    let organized = or_exit(session.organize(&dump, service));
    if organized.added == 0 {
        println!("The model found no tasks in that brain dump.");
        return;
    }
    println!("Added {} task(s):", organized.added);
    for quadrant in Quadrant::ALL {
        let items = organized.categorization.items(quadrant);
        if items.is_empty() {
            continue;
        }
        println!("  {}", quadrant.display_name());
        for item in items {
            println!("    - {}", item);
        }
    }
}

pub fn cmd_add(session: &mut Session, quadrant: Quadrant, text: Vec<String>) {
    let task = or_exit(session.add_task(quadrant, &text.join(" ")));
    let position = session.board().lane(quadrant).len();
    println!("Added to {} at position {}: {}", quadrant, position, task.text);
}

pub fn cmd_list(session: &Session, only: Option<Quadrant>, verbose: bool) {
    let board = session.board();
    if only.is_none() && board.is_empty() {
        println!("No tasks. Try `bsort dump` or `bsort add <quadrant> <text>`.");
        return;
    }

    for quadrant in Quadrant::ALL.into_iter().filter(|q| only.map_or(true, |o| o == *q)) {
        let lane = board.lane(quadrant);
        println!("{} ({}) - {}", quadrant.display_name(), lane.len(), quadrant.description());
        if lane.is_empty() {
            println!("    (empty)");
        }
        for (i, task) in lane.iter().enumerate() {
            if verbose {
                let source = task.source_dump_id.as_deref().unwrap_or("-");
                println!("  {:>3}. {:<50} {} {}", i + 1, truncate(&task.text, 50), task.id, source);
            } else {
                println!("  {:>3}. {}", i + 1, task.text);
            }
        }
        println!();
    }
}

pub fn cmd_edit(session: &mut Session, quadrant: Quadrant, position: usize, text: Vec<String>) {
    let index = index_of(position);
    if session.board().get(quadrant, index).is_none() {
        no_task(quadrant, position);
    }
    if or_exit(session.edit_task(quadrant, index, &text.join(" "))) {
        println!("Updated task {} in {}.", position, quadrant);
    } else {
        println!("No changes.");
    }
}

pub fn cmd_delete(session: &mut Session, quadrant: Quadrant, position: usize) {
    match or_exit(session.delete_task(quadrant, index_of(position))) {
        Some(task) => println!("Deleted: {}", task.text),
        None => no_task(quadrant, position),
    }
}

pub fn cmd_reorder(session: &mut Session, quadrant: Quadrant, from: usize, onto: usize, above: bool) {
    let (from_index, onto_index) = (index_of(from), index_of(onto));
    let len = session.board().lane(quadrant).len();
    if from_index >= len {
        no_task(quadrant, from);
    }
    if onto_index >= len {
        no_task(quadrant, onto);
    }
    if or_exit(session.move_within(quadrant, from_index, onto_index, above)) {
        cmd_list(session, Some(quadrant), false);
    } else {
        println!("Nothing moved.");
    }
}

pub fn cmd_move(
    session: &mut Session,
    quadrant: Quadrant,
    position: usize,
    to: Quadrant,
    onto: Option<usize>,
    above: bool,
) {
    let index = index_of(position);
    let Some(task) = session.board().get(quadrant, index).cloned() else {
        no_task(quadrant, position);
    };
    let onto_index = onto.map(index_of);
    if or_exit(session.move_across(quadrant, index, to, onto_index, above)) {
        println!("Moved '{}' to {}.", task.text, to);
    } else {
        println!("Nothing moved.");
    }
}

pub fn cmd_complete(session: &mut Session, quadrant: Quadrant, position: usize) {
    match or_exit(session.complete_task(quadrant, index_of(position))) {
        Some(record) => println!("Completed: {} (undo with `bsort undo {}`)", record.text, record.id),
        None => no_task(quadrant, position),
    }
}

pub fn cmd_undo(session: &mut Session, id: Option<u64>) {
    let id = match id {
        Some(id) => id,
        None => match session.completed().iter().max_by_key(|r| r.id) {
            Some(record) => record.id,
            None => {
                println!("Nothing to undo.");
                return;
            }
        },
    };
    let task = or_exit(session.undo_completed(id));
    let quadrant = session
        .board()
        .find(&task.id)
        .map(|(q, _)| q.display_name())
        .unwrap_or("the board");
    println!("Restored to {}: {}", quadrant, task.text);
}

pub fn cmd_done(session: &Session, verbose: bool) {
    if session.completed().is_empty() {
        println!("No completed tasks yet.");
        return;
    }
    for (label, records) in group_completed(session.completed(), today()) {
        println!("{} ({})", label, records.len());
        for record in records {
            let time = record.timestamp.with_timezone(&chrono::Local).format("%H:%M");
            if verbose {
                println!("  {} {:<50} {:<14} {}", time, truncate(&record.text, 50), record.quadrant.display_name(), record.id);
            } else {
                println!("  {} {:<50} {}", time, truncate(&record.text, 50), record.quadrant.display_name());
            }
        }
        println!();
    }
}

pub fn cmd_history(session: &Session, search: Option<String>) {
    let logs = history(session.logs(), search.as_deref());
    if logs.is_empty() {
        match search {
            Some(s) => println!("No brain dumps match '{}'.", s),
            None => println!("No brain dumps yet."),
        }
        return;
    }
    for log in logs {
        let when = log.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M");
        println!("{}  ({} tasks)", when, log.categorized_tasks.total());
        println!("  {}", truncate(log.brain_dump.trim(), 100).replace('\n', " "));
        for quadrant in Quadrant::ALL {
            for item in log.categorized_tasks.items(quadrant) {
                println!("    [{}] {}", quadrant.display_name(), item);
            }
        }
        println!();
    }
}

pub fn cmd_export(session: &Session, kind: ExportKind, output: Option<PathBuf>) {
    let path = or_exit(write_export(session, kind, output.as_deref(), today()));
    println!("Exported to {}", path.display());
}

fn print_template(template: &Template) {
    println!("Name:        {}", template.name);
    println!("Id:          {}", template.id);
    if !template.description.is_empty() {
        println!("Description: {}", template.description);
    }
    if !template.tags.is_empty() {
        println!("Tags:        {}", template.tags.join(", "));
    }
    println!("Used:        {} time(s)", template.use_count);
    println!("Prompt:\n{}", template.prompt);
}

fn print_template_table(templates: &[&Template]) {
    println!("{:<24} {:<30} {:<20} {:>5}", "Name", "Description", "Tags", "Used");
    for t in templates {
        println!(
            "{:<24} {:<30} {:<20} {:>5}",
            truncate(&t.name, 24),
            truncate(&t.description, 30),
            truncate(&t.tags.join(","), 20),
            t.use_count
        );
    }
}

pub fn cmd_template(session: &mut Session, action: TemplateAction) {
    match action {
        TemplateAction::Create { name, prompt, description, tags } => {
            let tags = tags.as_deref().map(parse_tags).unwrap_or_default();
            let template = or_exit(session.create_template(&name, description.as_deref().unwrap_or(""), &prompt, tags));
            println!("Created template '{}'", template.name);
        }
        TemplateAction::List => {
            let templates = session.templates().all();
            if templates.is_empty() {
                println!("No templates found.");
                return;
            }
            print_template_table(&templates);
        }
        TemplateAction::Show { template } => {
            print_template(or_exit(session.templates().resolve(&template)));
        }
        TemplateAction::Edit { template, name, prompt, description, tags } => {
            let update = TemplateUpdate {
                name,
                description,
                prompt,
                tags: tags.as_deref().map(parse_tags),
            };
            let updated = or_exit(session.update_template(&template, update));
            println!("Updated template '{}'", updated.name);
        }
        TemplateAction::Delete { template } => {
            let removed = or_exit(session.delete_template(&template));
            println!("Deleted template '{}'", removed.name);
        }
        TemplateAction::Search { query } => {
            let found = session.templates().search(&query);
            if found.is_empty() {
                println!("No templates match '{}'.", query);
                return;
            }
            print_template_table(&found);
        }
        TemplateAction::Import { input } => {
            let raw = or_exit(fs::read_to_string(&input).map_err(Error::from));
            let (imported, renamed) = or_exit(session.import_templates(&raw));
            println!("Imported {} template(s).", imported);
            if renamed > 0 {
                println!("{} template(s) were renamed to avoid duplicates.", renamed);
            }
        }
    }
}

pub fn cmd_brainstorm(
    session: &mut Session,
    service: &dyn ChatService,
    quadrant: Quadrant,
    position: usize,
    request: Vec<String>,
    template: Option<String>,
) {
    let reply = or_exit(session.brainstorm(
        quadrant,
        index_of(position),
        template.as_deref(),
        &request.join(" "),
        service,
    ));
    println!("{}", reply.trim());
}

pub fn cmd_model(session: &mut Session, model: Option<String>) {
    match model {
        Some(model) => {
            or_exit(session.set_model(&model));
            println!("Model set to {}", session.model());
        }
        None => println!("{}", session.model()),
    }
}

pub fn cmd_config(config: &mut Config, config_path: &Path, api_key: Option<String>) {
    if let Some(key) = api_key {
        or_exit(config.set_api_key(&key));
        or_exit(config.save(config_path));
        println!("API key saved to {}", config_path.display());
        return;
    }
    println!("Config file:   {}", config_path.display());
    println!("Data dir:      {}", config.data_dir.display());
    println!("API URL:       {}", config.api_url);
    println!("Default model: {}", config.default_model);
    match &config.api_key {
        Some(key) => println!("API key:       {}", mask_secret(key)),
        None => println!("API key:       (not set)"),
    }
}

pub fn cmd_users(store: &Store) {
    let users = or_exit(discover_users(store.root()));
    if users.is_empty() {
        println!("No users yet. Run `bsort login <name>`.");
        return;
    }
    let current = store.last_user();
    for user in users {
        let marker = if current.as_deref().map(str::trim) == Some(user.as_str()) { "*" } else { " " };
        println!("{} {}", marker, user);
    }
}

pub fn cmd_login(store: &Store, name: &str) {
    let name = or_exit(validate_user_name(name));
    or_exit(store.user(&name).set(KEY_USER_NAME, &name));
    or_exit(store.set_last_user(&name));
    println!("Logged in as {}", name);
}

pub fn cmd_logout(store: &Store) {
    or_exit(store.clear_last_user());
    println!("Logged out.");
}

pub fn cmd_clean_slate(session: &mut Session, yes: bool) {
    if !yes {
        print!(
            "This clears all {} task(s), {} completed record(s) and brain-dump history for {}. Continue? [y/N] ",
            session.board().total(),
            session.completed().len(),
            session.user()
        );
        let _ = io::stdout().flush();
        let mut answer = String::new();
        or_exit(io::stdin().lock().read_line(&mut answer).map_err(Error::from));
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Cancelled.");
            return;
        }
    }
    or_exit(session.clean_slate());
    println!("Clean slate. Templates were kept.");
}

pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
