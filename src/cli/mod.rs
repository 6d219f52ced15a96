pub mod analysis;
pub mod input;
pub mod report;
pub mod track;

use std::path::PathBuf;

use analysis::{process_analyze_command, AnalyzeCommand};
use anyhow::Result;
use clap::{Parser, Subcommand};
use report::{
    process_current_command, process_last_command, process_report_command, CurrentCommand,
    LastCommand, ReportCommand,
};
use tracing::{debug, level_filters::LevelFilter};
use track::{
    process_add_command, process_continue_command, process_remove_command, process_start_command,
    process_stop_command, AddCommand, ContinueCommand, RemoveCommand, StartCommand, StopCommand,
};

use crate::{
    config::{Backend, StorageConfig},
    storage::{
        interval_store::IntervalStore, line_store::LineStore, notes::FileNoteStore, ActivityStore,
    },
    tracking::service::{ActivityResolver, ActivityService},
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
        time::TimeFormatter,
    },
};

#[derive(Parser, Debug)]
#[command(name = "tock", version, long_about = None)]
#[command(about = "A simple time tracker for the command line", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        short,
        long,
        global = true,
        help = "Storage backend. Defaults to $TOCK_BACKEND or file"
    )]
    backend: Option<Backend>,
    #[arg(
        short,
        long,
        global = true,
        help = "Path to the activity file, or to the data directory for timewarrior"
    )]
    file: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start a new activity, stopping the running one")]
    Start {
        #[command(flatten)]
        command: StartCommand,
    },
    #[command(about = "Stop the running activity")]
    Stop {
        #[command(flatten)]
        command: StopCommand,
    },
    #[command(about = "Add a completed activity")]
    Add {
        #[command(flatten)]
        command: AddCommand,
    },
    #[command(about = "Start again one of the recent activities")]
    Continue {
        #[command(flatten)]
        command: ContinueCommand,
    },
    #[command(about = "Remove an activity", visible_alias = "rm")]
    Remove {
        #[command(flatten)]
        command: RemoveCommand,
    },
    #[command(about = "List currently running activities")]
    Current {
        #[command(flatten)]
        command: CurrentCommand,
    },
    #[command(about = "List recent distinct activities", visible_alias = "lt")]
    Last {
        #[command(flatten)]
        command: LastCommand,
    },
    #[command(about = "Report tracked time aggregated by project")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "Analyze focus, context switching and daily rhythm")]
    Analyze {
        #[command(flatten)]
        command: AnalyzeCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(
        CLI_PREFIX,
        &create_application_default_path()?,
        logging_level,
        args.log,
    )?;

    let config = StorageConfig::from_env(args.backend, args.file)?;
    let formatter = config.time_format;
    let notes = FileNoteStore::new(config.notes_dir.clone());

    match config.backend {
        Backend::File => {
            let service = create_service(LineStore::new(config.path), notes);
            process_command(args.commands, &service, &formatter).await
        }
        Backend::Timewarrior => {
            let service = create_service(IntervalStore::new(config.path), notes);
            process_command(args.commands, &service, &formatter).await
        }
    }
}

fn create_service<S: ActivityStore>(store: S, notes: FileNoteStore) -> ActivityService<S> {
    ActivityService::new(store, Some(Box::new(notes)), Box::new(DefaultClock))
}

async fn process_command(
    commands: Commands,
    resolver: &impl ActivityResolver,
    formatter: &TimeFormatter,
) -> Result<()> {
    debug!("Running {commands:?}");
    match commands {
        Commands::Start { command } => process_start_command(command, resolver, formatter).await,
        Commands::Stop { command } => process_stop_command(command, resolver, formatter).await,
        Commands::Add { command } => process_add_command(command, resolver, formatter).await,
        Commands::Continue { command } => {
            process_continue_command(command, resolver, formatter).await
        }
        Commands::Remove { command } => process_remove_command(command, resolver, formatter).await,
        Commands::Current { command } => {
            process_current_command(command, resolver, formatter).await
        }
        Commands::Last { command } => process_last_command(command, resolver).await,
        Commands::Report { command } => process_report_command(command, resolver, formatter).await,
        Commands::Analyze { command } => process_analyze_command(command, resolver).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::config::Backend;

    use super::{Args, Commands};

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "tock",
            "start",
            "-p",
            "work",
            "-d",
            "review",
            "-b",
            "timewarrior",
            "--file",
            "/tmp/data",
        ])
        .unwrap();

        assert_eq!(args.backend, Some(Backend::Timewarrior));
        assert_eq!(args.file, Some("/tmp/data".into()));
        assert!(matches!(args.commands, Commands::Start { .. }));
    }

    #[test]
    fn test_add_needs_end_or_duration() {
        let base = ["tock", "add", "-p", "work", "-d", "review", "-s", "09:00"];
        assert!(Args::try_parse_from(base).is_err());
        assert!(Args::try_parse_from(base.iter().chain(&["--duration", "1h"])).is_ok());
        assert!(Args::try_parse_from(base.iter().chain(&["-e", "10:00"])).is_ok());
        assert!(
            Args::try_parse_from(base.iter().chain(&["-e", "10:00", "--duration", "1h"])).is_err()
        );
    }

    #[test]
    fn test_report_range_flags_conflict() {
        assert!(Args::try_parse_from(["tock", "report", "--today"]).is_ok());
        assert!(Args::try_parse_from(["tock", "report", "--today", "--yesterday"]).is_err());
        assert!(Args::try_parse_from(["tock", "report", "--date", "2023-10-15"]).is_ok());
        assert!(Args::try_parse_from(["tock", "report", "--date", "15.10.2023"]).is_err());
    }

    #[test]
    fn test_analyze_days_must_be_positive() {
        assert!(Args::try_parse_from(["tock", "analyze"]).is_ok());
        assert!(Args::try_parse_from(["tock", "analyze", "-n", "7"]).is_ok());
        assert!(Args::try_parse_from(["tock", "analyze", "--days", "0"]).is_err());
    }
}
