//! # bsort - BrainSort task organizer
//!
//! Type (or pipe) whatever is on your mind; a language model sorts it into four
//! quadrants and you work the resulting board from the terminal.
//!
//! ## Quadrants
//!
//! - **Set in Motion** (`triggers`): 2-5 minute tasks that unblock next steps
//! - **Marinate** (`marinate`): ideas to jot down and let simmer
//! - **Deep Work** (`deepwork`): tasks requiring extended focus
//! - **Quick Wins** (`quickwins`): short tasks for momentum
//!
//! ## Quick Start
//!
//! ```bash
//! bsort config --api-key sk-or-...
//! bsort login Sam
//! bsort dump "email the landlord, plan the offsite, maybe learn piano"
//! bsort ui
//! ```
//!
//! Data is stored per user in `~/.brainsort/` as one JSON file per key. Set
//! `RUST_LOG=info` (or `debug`) to see what the app is doing.

use std::path::PathBuf;

use clap::Parser;
use log::debug;

pub mod board;
pub mod brainstorm;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod fields;
pub mod llm;
pub mod session;
pub mod task;
pub mod template;
pub mod user;
pub mod tui {
    pub mod board;
    pub mod colors;
    pub mod input;
    pub mod run;
    pub mod utils;
}

use cli::Cli;
use cmd::*;
use config::Config;
use db::Store;
use llm::OpenRouterClient;
use session::Session;
use user::validate_user_name;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };
    let config_path = Config::resolve_path(cli.config.as_ref());
    let data_dir: PathBuf = cli.dir.clone().unwrap_or_else(|| config.data_dir.clone());

    let store = match Store::open(&data_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open data directory {}: {}", data_dir.display(), e);
            std::process::exit(1);
        }
    };
    debug!("data dir {}", data_dir.display());

    // Commands that don't need a user session
    match &cli.command {
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            return;
        }
        Commands::Config { api_key } => {
            cmd_config(&mut config, &config_path, api_key.clone());
            return;
        }
        Commands::Users => {
            cmd_users(&store);
            return;
        }
        Commands::Login { name } => {
            cmd_login(&store, name);
            return;
        }
        Commands::Logout => {
            cmd_logout(&store);
            return;
        }
        _ => {}
    }

    let user = match cli.user.as_deref().map(validate_user_name) {
        Some(Ok(name)) => name,
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        None => match store.last_user() {
            Some(name) => name,
            None => {
                eprintln!("No user selected. Run `bsort login <name>` or pass --user <name>.");
                std::process::exit(1);
            }
        },
    };

    let mut session = match Session::open(&store, &user, &config.default_model) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to load data for {}: {}", user, e);
            std::process::exit(1);
        }
    };
    let client = OpenRouterClient::from_config(&config);

    match cli.command {
        Commands::Ui => cmd_ui(&mut session, &client),

        Commands::Dump { text, file } => cmd_dump(&mut session, &client, text, file),

        Commands::Add { quadrant, text } => cmd_add(&mut session, quadrant, text),

        Commands::List { quadrant, verbose } => cmd_list(&session, quadrant, verbose),

        Commands::Edit { quadrant, position, text } => cmd_edit(&mut session, quadrant, position, text),

        Commands::Delete { quadrant, position } => cmd_delete(&mut session, quadrant, position),

        Commands::Reorder { quadrant, from, onto, above } =>
            cmd_reorder(&mut session, quadrant, from, onto, above),

        Commands::Move { quadrant, position, to, onto, above } =>
            cmd_move(&mut session, quadrant, position, to, onto, above),

        Commands::Complete { quadrant, position } => cmd_complete(&mut session, quadrant, position),

        Commands::Undo { id } => cmd_undo(&mut session, id),

        Commands::Done { verbose } => cmd_done(&session, verbose),

        Commands::History { search } => cmd_history(&session, search),

        Commands::Export { kind, output } => cmd_export(&session, kind, output),

        Commands::Template { action } => cmd_template(&mut session, action),

        Commands::Brainstorm { quadrant, position, request, template } =>
            cmd_brainstorm(&mut session, &client, quadrant, position, request, template),

        Commands::Model { model } => cmd_model(&mut session, model),

        Commands::CleanSlate { yes } => cmd_clean_slate(&mut session, yes),

        Commands::Completions { .. }
        | Commands::Config { .. }
        | Commands::Users
        | Commands::Login { .. }
        | Commands::Logout => unreachable!("handled above"),
    }
}
