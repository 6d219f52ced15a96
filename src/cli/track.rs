use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::Parser;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    tracking::{
        dto::{ActivityFilter, AddActivityRequest, StartActivityRequest, StopActivityRequest},
        entities::Activity,
        errors::TrackError,
        service::ActivityResolver,
    },
    utils::time::{format_hours_minutes, TimeFormatter},
};

use super::input::{local_midday, parse_day_index, parse_duration, parse_local_time, whole_day};

#[derive(Debug, Clone, Default, clap::Args)]
pub struct NoteArgs {
    #[arg(long, help = "Free text note attached to the activity")]
    note: Option<String>,
    #[arg(long = "tag", help = "Tag attached to the activity. Can be repeated")]
    tags: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct StartCommand {
    #[arg(short, long, help = "Project the activity belongs to")]
    project: String,
    #[arg(short, long, help = "What is being worked on")]
    description: String,
    #[arg(
        short = 't',
        long = "time",
        help = "Start time as HH:MM or \"YYYY-MM-DD HH:MM\". Defaults to now"
    )]
    at: Option<String>,
    #[command(flatten)]
    notes: NoteArgs,
}

#[derive(Debug, Parser)]
pub struct StopCommand {
    #[arg(
        short = 't',
        long = "time",
        help = "End time as HH:MM or \"YYYY-MM-DD HH:MM\". Defaults to now"
    )]
    at: Option<String>,
    #[command(flatten)]
    notes: NoteArgs,
}

#[derive(Debug, Parser)]
pub struct AddCommand {
    #[arg(short, long, help = "Project the activity belongs to")]
    project: String,
    #[arg(short, long, help = "What was worked on")]
    description: String,
    #[arg(short, long, help = "Start time as HH:MM or \"YYYY-MM-DD HH:MM\"")]
    start: String,
    #[arg(
        short,
        long,
        required_unless_present = "duration",
        conflicts_with = "duration",
        help = "End time as HH:MM or \"YYYY-MM-DD HH:MM\""
    )]
    end: Option<String>,
    #[arg(long, help = "Length of the activity instead of an end time, e.g. 1h30m")]
    duration: Option<String>,
    #[command(flatten)]
    notes: NoteArgs,
}

#[derive(Debug, Parser)]
pub struct ContinueCommand {
    #[arg(
        default_value_t = 0,
        help = "Which recent activity to continue, as listed by `last`. 0 is the most recent"
    )]
    number: usize,
    #[arg(short, long, help = "Replace the project of the continued activity")]
    project: Option<String>,
    #[arg(short, long, help = "Replace the description of the continued activity")]
    description: Option<String>,
    #[arg(
        short = 't',
        long = "time",
        help = "Start time as HH:MM or \"YYYY-MM-DD HH:MM\". Defaults to now"
    )]
    at: Option<String>,
}

#[derive(Debug, Parser)]
pub struct RemoveCommand {
    #[arg(
        help = "Activity to remove as YYYY-MM-DD-NN, as shown by `report`. Defaults to the last one"
    )]
    index: Option<String>,
    #[arg(short, long, help = "Skip confirmation")]
    yes: bool,
}

fn split_notes(notes: NoteArgs) -> (String, Vec<String>) {
    (notes.note.unwrap_or_default(), notes.tags)
}

fn describe(activity: &Activity, formatter: &TimeFormatter) -> String {
    format!(
        "{} | {} at {}",
        activity.project,
        activity.description,
        formatter.display(&activity.start_time.with_timezone(&Local))
    )
}

pub async fn process_start_command(
    StartCommand {
        project,
        description,
        at,
        notes,
    }: StartCommand,
    resolver: &impl ActivityResolver,
    formatter: &TimeFormatter,
) -> Result<()> {
    let start_time = at
        .map(|v| parse_local_time(formatter, &v, resolver.now()))
        .transpose()?;
    let (notes, tags) = split_notes(notes);

    let activity = resolver
        .start(StartActivityRequest {
            description,
            project,
            start_time,
            notes,
            tags,
        })
        .await?;
    println!("Started activity: {}", describe(&activity, formatter));
    Ok(())
}

pub async fn process_stop_command(
    StopCommand { at, notes }: StopCommand,
    resolver: &impl ActivityResolver,
    formatter: &TimeFormatter,
) -> Result<()> {
    let end_time = at
        .map(|v| parse_local_time(formatter, &v, resolver.now()))
        .transpose()?;
    let (notes, tags) = split_notes(notes);

    let activity = match resolver
        .stop(StopActivityRequest {
            end_time,
            notes,
            tags,
        })
        .await
    {
        Ok(v) => v,
        Err(e) if TrackError::is(&e, &TrackError::NoActiveActivity) => {
            println!("No currently running activities.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let end = activity.end_time.unwrap_or_else(|| resolver.now());
    println!(
        "Stopped activity: {} | {} at {} ({})",
        activity.project,
        activity.description,
        formatter.display(&end.with_timezone(&Local)),
        format_hours_minutes(activity.duration(end)),
    );
    Ok(())
}

pub async fn process_add_command(
    AddCommand {
        project,
        description,
        start,
        end,
        duration,
        notes,
    }: AddCommand,
    resolver: &impl ActivityResolver,
    formatter: &TimeFormatter,
) -> Result<()> {
    let now = resolver.now();
    let start_time = parse_local_time(formatter, &start, now).context("Invalid start time")?;
    let end_time = match (end, duration) {
        (Some(end), _) => parse_local_time(formatter, &end, now).context("Invalid end time")?,
        (None, Some(duration)) => start_time
            .checked_add_signed(parse_duration(&duration)?)
            .ok_or_else(|| anyhow!("Duration {duration:?} goes past the supported dates"))?,
        (None, None) => bail!("Either an end time or a duration is required"),
    };
    let (notes, tags) = split_notes(notes);

    let activity = resolver
        .add(AddActivityRequest {
            description,
            project,
            start_time,
            end_time,
            notes,
            tags,
        })
        .await?;
    println!(
        "Added activity: {} | {} ({} - {})",
        activity.project,
        activity.description,
        formatter.display(&start_time.with_timezone(&Local)),
        formatter.display(&end_time.with_timezone(&Local)),
    );
    Ok(())
}

pub async fn process_continue_command(
    ContinueCommand {
        number,
        project,
        description,
        at,
    }: ContinueCommand,
    resolver: &impl ActivityResolver,
    formatter: &TimeFormatter,
) -> Result<()> {
    let recent = resolver.get_recent(number + 1).await?;
    let Some(previous) = recent.into_iter().nth(number) else {
        bail!("Activity number {number} not found");
    };

    let start_time = at
        .map(|v| parse_local_time(formatter, &v, resolver.now()))
        .transpose()?;
    let activity = resolver
        .start(StartActivityRequest {
            description: description.unwrap_or(previous.description),
            project: project.unwrap_or(previous.project),
            start_time,
            ..Default::default()
        })
        .await?;
    println!("Started activity: {}", describe(&activity, formatter));
    Ok(())
}

pub async fn process_remove_command(
    RemoveCommand { index, yes }: RemoveCommand,
    resolver: &impl ActivityResolver,
    formatter: &TimeFormatter,
) -> Result<()> {
    let activity = match index {
        Some(index) => find_by_day_index(resolver, &index).await?,
        None => match resolver.get_last().await {
            Ok(v) => v,
            Err(e) if TrackError::is(&e, &TrackError::ActivityNotFound) => {
                bail!("No activities found")
            }
            Err(e) => return Err(e),
        },
    };

    if !yes && !confirm_removal(&activity, formatter).await? {
        println!("Aborted.");
        return Ok(());
    }

    resolver.remove(&activity).await?;
    println!("Activity removed.");
    Ok(())
}

/// Resolves `YYYY-MM-DD-NN` to the NN-th activity started on that local day.
pub async fn find_by_day_index(resolver: &impl ActivityResolver, index: &str) -> Result<Activity> {
    let (date, sequence) = parse_day_index(index)?;
    let day = whole_day(local_midday(date)?);

    let mut activities = resolver
        .list(&ActivityFilter {
            to_date: None,
            ..day.clone()
        })
        .await?;
    activities.retain(|v| day.to_date.map_or(true, |end| v.start_time <= end));
    activities.sort_by_key(|v| v.start_time);

    sequence
        .checked_sub(1)
        .and_then(|position| activities.into_iter().nth(position))
        .with_context(|| format!("Activity #{sequence} not found on {date}"))
}

async fn confirm_removal(activity: &Activity, formatter: &TimeFormatter) -> Result<bool> {
    println!("About to remove:");
    println!("  Project:     {}", activity.project);
    println!("  Description: {}", activity.description);
    println!(
        "  Start:       {}",
        formatter.display_with_date(&activity.start_time.with_timezone(&Local))
    );
    if let Some(end) = activity.end_time {
        println!(
            "  End:         {}",
            formatter.display(&end.with_timezone(&Local))
        );
    }

    let mut stdout = io::stdout();
    stdout.write_all(b"\nAre you sure? [y/N]: ").await?;
    stdout.flush().await?;

    let mut response = String::new();
    BufReader::new(io::stdin())
        .read_line(&mut response)
        .await
        .context("Failed to read confirmation")?;
    Ok(matches!(
        response.trim().to_lowercase().as_str(),
        "y" | "yes"
    ))
}
