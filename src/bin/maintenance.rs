use cbt_portal::MaintenanceTask;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cbt-maintenance")]
#[command(about = "Maintenance tools for the CBT portal database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report users with empty, non-normalized or duplicate login keys and inactive students
    AuditUsers,
    /// Rewrite login keys into trimmed lowercase form, refusing collisions
    NormalizeLoginKeys {
        /// Print the planned renames without writing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete every session (and its answers) of one exam
    ClearSessions {
        /// Exam id
        #[arg(long = "exam")]
        exam_id: String,
    },
}

impl From<Commands> for MaintenanceTask {
    fn from(command: Commands) -> Self {
        match command {
            Commands::AuditUsers => MaintenanceTask::AuditUsers,
            Commands::NormalizeLoginKeys { dry_run } => {
                MaintenanceTask::NormalizeLoginKeys { dry_run }
            }
            Commands::ClearSessions { exam_id } => MaintenanceTask::ClearSessions { exam_id },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cbt_portal::run_maintenance(cli.command.into()).await {
        eprintln!("cbt-maintenance fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
