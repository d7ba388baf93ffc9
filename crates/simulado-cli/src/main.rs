//! simulado CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use simulado_core::model::{Area, ExamMode, ForeignLanguage};

mod commands;

#[derive(Parser)]
#[command(name = "simulado", version, about = "AI-powered ENEM exam simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new exam session
    Run {
        /// Exam mode: full-day-a, full-day-b, area-training, essay-only, remediation
        #[arg(long, default_value = "full-day-a")]
        mode: ExamMode,

        /// Number of question slots (defaults per mode)
        #[arg(long)]
        slots: Option<usize>,

        /// Session duration in seconds (defaults per mode)
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Foreign language for day-1 sessions: english, spanish
        #[arg(long)]
        language: Option<ForeignLanguage>,

        /// Knowledge area for area-training (e.g. mathematics)
        #[arg(long)]
        area: Option<Area>,

        /// Courses to compare against cutoff estimates (comma-separated)
        #[arg(long)]
        courses: Option<String>,

        /// Topics for remediation mode (comma-separated)
        #[arg(long)]
        topics: Option<String>,

        /// Use the deterministic mock generator instead of the OpenAI API
        #[arg(long)]
        mock: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Resume a suspended session
    Resume {
        /// Session id
        #[arg(long)]
        session: uuid::Uuid,

        /// Use the deterministic mock generator instead of the OpenAI API
        #[arg(long)]
        mock: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Start a turbo review over a finished session's weak topics
    Review {
        /// Finished session id
        #[arg(long)]
        session: uuid::Uuid,

        /// Use the deterministic mock generator instead of the OpenAI API
        #[arg(long)]
        mock: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config file
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("simulado=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            mode,
            slots,
            duration_secs,
            language,
            area,
            courses,
            topics,
            mock,
            config,
        } => {
            commands::run::execute(
                mode,
                slots,
                duration_secs,
                language,
                area,
                courses,
                topics,
                mock,
                config,
            )
            .await
        }
        Commands::Resume {
            session,
            mock,
            config,
        } => commands::resume::execute(session, mock, config).await,
        Commands::Review {
            session,
            mock,
            config,
        } => commands::review::execute(session, mock, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
