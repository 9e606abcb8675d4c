//! # Odin Library CLI (`odin`)
//!
//! The `odin` binary signs in to the Odin Library backend, manages the
//! document library, runs contextual search, and chats with the assistant.
//!
//! ## Usage
//!
//! ```bash
//! odin --config ./config/odin.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `odin login <user>` | Sign in and store a session |
//! | `odin logout` | End the session |
//! | `odin refresh` | Renew the session with the refresh token |
//! | `odin whoami` | Show the signed-in user |
//! | `odin files list` | The "My Files" dashboard |
//! | `odin files show <id>` | Document details with extracted content |
//! | `odin files upload <path>...` | Upload one or more documents |
//! | `odin files delete <id>` | Delete a document |
//! | `odin files download <id>` | Download the original file |
//! | `odin search "<query>"` | Contextual search |
//! | `odin categories` | List document categories |
//! | `odin chat` | Interactive chat |
//! | `odin chat ask "<question>"` | Ask one question and stream the answer |
//! | `odin chat history` | Print the stored transcript |
//! | `odin chat clear` | Clear the stored transcript |
//! | `odin prefs ...` | Details view preferences |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odin_library::api::ApiClient;
use odin_library::auth::{self, SessionStore, TokenProvider};
use odin_library::chat_cmd;
use odin_library::chat_store::ChatStore;
use odin_library::config::{self, Config};
use odin_library::display::{self, DisplayStore, FontSize};
use odin_library::files;
use odin_library::output::OutputMode;
use odin_library::search;
use odin_library::storage::{FileStorage, Storage};

/// Odin Library CLI: your document library and research assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/odin.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "odin",
    about = "Odin Library: a document library with contextual search and a chat assistant",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/odin.toml`. A missing file means defaults.
    #[arg(
        long,
        global = true,
        env = "ODIN_CONFIG",
        default_value = "./config/odin.toml"
    )]
    config: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to the backend.
    ///
    /// The session is stored locally and lasts `auth.session_minutes`
    /// (30 by default).
    Login {
        username: String,

        /// Password. Read from stdin when omitted.
        #[arg(long, env = "ODIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session.
    Logout,

    /// Renew the session using the stored refresh token.
    Refresh,

    /// Show who is signed in.
    Whoami,

    /// Browse and manage documents.
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },

    /// Contextual search across the library.
    ///
    /// Queries shorter than `search.min_query_len` characters (5 by
    /// default) are not sent to the backend.
    Search {
        query: String,

        /// Words of context around each match in the preview.
        #[arg(long)]
        context_range: Option<u32>,
    },

    /// List the categories assigned to documents.
    Categories,

    /// Chat with the assistant. Without a subcommand, starts an
    /// interactive session.
    Chat {
        #[command(subcommand)]
        action: Option<ChatAction>,
    },

    /// Details view preferences.
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand)]
enum FilesAction {
    /// List your files.
    List,

    /// Show a document's details and extracted content.
    Show {
        file_id: String,

        /// Print the extracted content only, unwrapped.
        #[arg(long)]
        raw: bool,
    },

    /// Upload one or more files.
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Delete a file.
    Delete { file_id: String },

    /// Download the original file.
    Download {
        file_id: String,

        /// Output path. Defaults to the server-supplied filename.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ChatAction {
    /// Ask one question and stream the answer.
    Ask { question: String },

    /// Print the stored transcript.
    History,

    /// Clear the stored transcript.
    Clear,
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Show the current preferences.
    Show,

    /// Set the font size used to pick the wrap width.
    FontSize {
        #[arg(value_enum)]
        size: FontSize,
    },

    /// Toggle between the collapsed and expanded layout.
    ToggleExpanded,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "odin_library=debug,odin=debug"
    } else {
        "odin_library=info,odin=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_storage(cfg: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    let storage = FileStorage::open(&cfg.storage.dir).with_context(|| {
        format!(
            "Failed to open storage directory: {}",
            cfg.storage.dir.display()
        )
    })?;
    Ok(Arc::new(storage))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    let mode = OutputMode::from_flag(cli.json);
    let storage = open_storage(&cfg)?;
    let sessions = SessionStore::open(storage.clone());

    match cli.command {
        Commands::Login { username, password } => {
            auth::run_login(&cfg, &sessions, &username, password).await?;
        }
        Commands::Logout => {
            auth::run_logout(&cfg, &sessions).await?;
        }
        Commands::Refresh => {
            auth::run_refresh(&cfg, &sessions).await?;
        }
        Commands::Whoami => {
            auth::run_whoami(&sessions)?;
        }
        Commands::Files { action } => {
            let api = ApiClient::new(&cfg.api, sessions.bearer())?;
            match action {
                FilesAction::List => files::run_list(&api, mode).await?,
                FilesAction::Show { file_id, raw } => {
                    let display = DisplayStore::open(storage.clone());
                    files::run_show(&api, &display, &file_id, raw, mode).await?;
                }
                FilesAction::Upload { paths } => files::run_upload(&api, &paths, mode).await?,
                FilesAction::Delete { file_id } => files::run_delete(&api, &file_id, mode).await?,
                FilesAction::Download { file_id, output } => {
                    files::run_download(&api, &file_id, output.as_deref()).await?;
                }
            }
        }
        Commands::Search {
            query,
            context_range,
        } => {
            let api = ApiClient::new(&cfg.api, sessions.bearer())?;
            search::run_search(&cfg, &api, &query, context_range, mode).await?;
        }
        Commands::Categories => {
            let api = ApiClient::new(&cfg.api, sessions.bearer())?;
            files::run_categories(&api, mode).await?;
        }
        Commands::Chat { action } => {
            let store = ChatStore::open(storage.clone());
            match action {
                None => {
                    let mut view = chat_cmd::build_view(&cfg, store, sessions)?;
                    chat_cmd::run_repl(&mut view).await?;
                }
                Some(ChatAction::Ask { question }) => {
                    let mut view = chat_cmd::build_view(&cfg, store, sessions)?;
                    chat_cmd::run_ask(&mut view, &question, mode).await?;
                }
                Some(ChatAction::History) => chat_cmd::run_history(&store, mode)?,
                Some(ChatAction::Clear) => chat_cmd::run_clear(&store)?,
            }
        }
        Commands::Prefs { action } => {
            let mut store = DisplayStore::open(storage.clone());
            match action {
                PrefsAction::Show => display::run_prefs_show(&store, mode)?,
                PrefsAction::FontSize { size } => display::run_set_font_size(&mut store, size)?,
                PrefsAction::ToggleExpanded => display::run_toggle_expanded(&mut store)?,
            }
        }
    }

    Ok(())
}
