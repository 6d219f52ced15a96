use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use clap::Parser;
use now::DateTimeNow;
use serde::Serialize;

use crate::{
    tracking::{
        dto::{ActivityFilter, Report},
        entities::Activity,
        service::ActivityResolver,
    },
    utils::time::{date_to_record_name, format_hms, format_hours_minutes, TimeFormatter},
};

use super::input::{local_midday, parse_natural_date, whole_day, DateStyle};

#[derive(Debug, Parser)]
pub struct CurrentCommand {
    #[arg(long, help = "Output in JSON format")]
    json: bool,
}

#[derive(Debug, Parser)]
pub struct LastCommand {
    #[arg(
        short = 'n',
        long = "number",
        default_value_t = 10,
        help = "Number of recent activities to show"
    )]
    limit: usize,
    #[arg(long, help = "Output in JSON format")]
    json: bool,
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(long, conflicts_with_all = ["yesterday", "date", "from", "to"], help = "Report for today")]
    today: bool,
    #[arg(long, conflicts_with_all = ["date", "from", "to"], help = "Report for yesterday")]
    yesterday: bool,
    #[arg(long, conflicts_with_all = ["from", "to"], help = "Report for a specific day, YYYY-MM-DD")]
    date: Option<NaiveDate>,
    #[arg(
        long,
        help = "Start of the range. Examples are \"yesterday\", \"2 days ago\", \"15/03/2025\", \"12:00 16/03/2025\""
    )]
    from: Option<String>,
    #[arg(
        long,
        help = "End of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\""
    )]
    to: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long = "days",
        default_value_t = false,
        help = "Take --from and --to as whole days"
    )]
    treat_as_days: bool,
    #[arg(short, long, help = "Only activities of this project, grouped by description")]
    project: Option<String>,
    #[arg(short, long, help = "Only activities with this description")]
    description: Option<String>,
    #[arg(short, long, help = "Show only project totals")]
    summary: bool,
    #[arg(long, help = "Output activities in JSON format")]
    json: bool,
    #[arg(long, help = "Show only the total duration")]
    total: bool,
}

/// Activity as printed by `current --json`, with the elapsed time attached.
#[derive(Serialize)]
struct RunningActivity<'a> {
    #[serde(flatten)]
    activity: &'a Activity,
    duration_seconds: i64,
}

pub async fn process_current_command(
    CurrentCommand { json }: CurrentCommand,
    resolver: &impl ActivityResolver,
    formatter: &TimeFormatter,
) -> Result<()> {
    let activities = resolver.list(&ActivityFilter::running()).await?;
    let now = resolver.now();

    if json {
        let running = activities
            .iter()
            .map(|activity| RunningActivity {
                activity,
                duration_seconds: activity.duration(now).num_seconds(),
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&running)?);
        return Ok(());
    }

    if activities.is_empty() {
        println!("No currently running activities.");
        return Ok(());
    }

    let rows = activities
        .iter()
        .map(|v| {
            vec![
                formatter.display_with_date(&v.start_time.with_timezone(&Local)),
                v.description.clone(),
                v.project.clone(),
                format_hms(v.duration(now)),
            ]
        })
        .collect::<Vec<_>>();
    print!(
        "{}",
        render_table(&["Start", "Description", "Project", "Duration"], &rows)
    );
    Ok(())
}

pub async fn process_last_command(
    LastCommand { limit, json }: LastCommand,
    resolver: &impl ActivityResolver,
) -> Result<()> {
    let activities = resolver.get_recent(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&activities)?);
        return Ok(());
    }
    if activities.is_empty() {
        println!("No activities found.");
        return Ok(());
    }

    // Oldest first so the most recent one ends up next to the prompt.
    let rows = activities
        .iter()
        .enumerate()
        .rev()
        .map(|(i, v)| vec![format!("[{i}]"), v.description.clone(), v.project.clone()])
        .collect::<Vec<_>>();
    print!("{}", render_table(&[" #", "Description", "Project"], &rows));
    Ok(())
}

pub async fn process_report_command(
    command: ReportCommand,
    resolver: &impl ActivityResolver,
    formatter: &TimeFormatter,
) -> Result<()> {
    let filter = report_filter(&command, resolver.now())?;
    let report = resolver.get_report(&filter).await?;

    if command.total {
        println!("{}", format_hours_minutes(report.total_duration));
        return Ok(());
    }
    if command.json {
        println!("{}", serde_json::to_string_pretty(&report.activities)?);
        return Ok(());
    }

    let detail = match (&command.project, command.summary) {
        (Some(_), _) => ReportDetail::ByDescription,
        (None, true) => ReportDetail::Summary,
        (None, false) => ReportDetail::Activities,
    };
    print!(
        "{}",
        render_report(&report, detail, formatter, resolver.now())
    );
    Ok(())
}

fn report_filter(command: &ReportCommand, now: DateTime<Utc>) -> Result<ActivityFilter> {
    let local_now = now.with_timezone(&Local);
    let mut filter = if command.today {
        whole_day(local_now)
    } else if command.yesterday {
        whole_day(local_now - Duration::days(1))
    } else if let Some(date) = command.date {
        whole_day(local_midday(date)?)
    } else {
        let from = command
            .from
            .as_deref()
            .map(|v| parse_natural_date(v, now, command.date_style))
            .transpose()
            .context("Invalid --from")?;
        let to = command
            .to
            .as_deref()
            .map(|v| parse_natural_date(v, now, command.date_style))
            .transpose()
            .context("Invalid --to")?;

        let (from, to) = if command.treat_as_days {
            (
                from.map(|v| v.beginning_of_day()),
                to.map(|v| v.end_of_day()),
            )
        } else {
            (from, to)
        };
        ActivityFilter {
            from_date: from.map(|v| v.with_timezone(&Utc)),
            to_date: to.map(|v| v.with_timezone(&Utc)),
            ..Default::default()
        }
    };

    filter.project = command.project.clone();
    filter.description = command.description.clone();
    Ok(filter)
}

/// Assigns `YYYY-MM-DD-NN` identifiers: activities are numbered from 1 within their local start
/// day, in start order. `remove` accepts the same identifiers.
pub fn day_indexes(activities: &[Activity]) -> HashMap<DateTime<Utc>, String> {
    let mut starts = activities.iter().map(|v| v.start_time).collect::<Vec<_>>();
    starts.sort();

    let mut per_day = HashMap::<NaiveDate, usize>::new();
    starts
        .into_iter()
        .map(|start| {
            let day = start.with_timezone(&Local).date_naive();
            let count = per_day.entry(day).or_default();
            *count += 1;
            (start, format!("{}-{:02}", date_to_record_name(day), count))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDetail {
    Summary,
    Activities,
    ByDescription,
}

pub fn render_report(
    report: &Report,
    detail: ReportDetail,
    formatter: &TimeFormatter,
    now: DateTime<Utc>,
) -> String {
    if report.activities.is_empty() {
        return "No activities found for the specified period.\n".to_string();
    }

    let indexes = day_indexes(&report.activities);
    let mut out = String::from("Time Tracking Report\n====================\n\n");

    let projects = report.by_project.iter().collect::<BTreeMap<_, _>>();
    for (name, project) in projects {
        out.push_str(&format!(
            "{name}: {}\n",
            format_hours_minutes(project.duration)
        ));

        match detail {
            ReportDetail::Summary => continue,
            ReportDetail::ByDescription => {
                let mut by_description = BTreeMap::<&str, Duration>::new();
                for activity in &project.activities {
                    *by_description
                        .entry(activity.description.as_str())
                        .or_insert_with(Duration::zero) += activity.duration(now);
                }
                for (description, duration) in by_description {
                    out.push_str(&format!(
                        "   - {description}: {}\n",
                        format_hours_minutes(duration)
                    ));
                }
            }
            ReportDetail::Activities => {
                for activity in &project.activities {
                    let end = activity
                        .end_time
                        .map(|v| formatter.display(&v.with_timezone(&Local)))
                        .unwrap_or_else(|| "--:--".to_string());
                    out.push_str(&format!(
                        "   [{}] {} - {end} ({}) | {}\n",
                        indexes
                            .get(&activity.start_time)
                            .map(String::as_str)
                            .unwrap_or_default(),
                        formatter.display(&activity.start_time.with_timezone(&Local)),
                        format_hours_minutes(activity.duration(now)),
                        activity.description
                    ));
                }
            }
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Total: {}\n",
        format_hours_minutes(report.total_duration)
    ));
    out
}

/// Left aligned columns separated by two spaces.
fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = header.iter().map(|v| v.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header = header.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    for row in std::iter::once(&header).chain(rows) {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
