//! # Formsmith CLI (`formsmith`)
//!
//! ## Usage
//!
//! ```bash
//! formsmith --config ./config/formsmith.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `formsmith init` | Create the SQLite database and run schema migrations |
//! | `formsmith serve` | Start the HTTP API server |
//! | `formsmith forms --user <email>` | List a user's forms |
//! | `formsmith retrieve --user <email> "<prompt>"` | Show the forms retrieved as generation context |
//! | `formsmith export <form-id>` | Export a form's submissions as CSV |
//!
//! Secrets (`JWT_SECRET`, `GEMINI_API_KEY`, `OPENAI_API_KEY`,
//! `CLOUDINARY_*`) are read from the environment, or from a `.env` file in
//! the working directory.
//!
//! Logging goes to stderr. `RUST_LOG` sets the filter and `LOG_FORMAT=json`
//! switches to JSON lines.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formsmith::{config, forms_cmd, migrate, server};

/// Formsmith: AI-assisted form builder backend.
#[derive(Parser)]
#[command(
    name = "formsmith",
    about = "Formsmith: generate forms from prompts, share them, and collect submissions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/formsmith.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the users, forms and
    /// form_submissions tables. Safe to run repeatedly.
    Init,

    /// Start the HTTP API server on `[server].bind`.
    Serve,

    /// List a user's forms, newest first.
    Forms {
        /// Email address of the owner.
        #[arg(long)]
        user: String,
    },

    /// Rank a user's forms against a prompt.
    ///
    /// Prints the forms that would be handed to the generator as context.
    /// Requires an embedding provider.
    Retrieve {
        /// The prompt to embed.
        prompt: String,

        /// Email address of the owner.
        #[arg(long)]
        user: String,

        /// Maximum number of forms (defaults to `[retrieval].top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Export a form's submissions as CSV.
    Export {
        /// Form id.
        form_id: String,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "formsmith=info,formsmith_core=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Forms { user } => {
            forms_cmd::run_list_forms(&cfg, &user).await?;
        }
        Commands::Retrieve {
            prompt,
            user,
            limit,
        } => {
            forms_cmd::run_retrieve(&cfg, &user, &prompt, limit).await?;
        }
        Commands::Export { form_id, output } => {
            forms_cmd::run_export(&cfg, &form_id, output.as_deref()).await?;
        }
    }

    Ok(())
}
