use std::{collections::BTreeMap, fmt::Display};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Timelike, Utc, Weekday};
use clap::Parser;
use serde::Serialize;

use crate::{
    tracking::{
        dto::{serialize_duration, ActivityFilter},
        entities::Activity,
        service::ActivityResolver,
    },
    utils::time::format_hours_minutes,
};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const SCORE_BAR_WIDTH: usize = 50;
const DISTRIBUTION_BAR_WIDTH: usize = 40;

#[derive(Debug, Parser)]
pub struct AnalyzeCommand {
    #[arg(
        short = 'n',
        long,
        default_value_t = 30,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Number of days to analyze"
    )]
    days: u32,
    #[arg(long, help = "Output in JSON format")]
    json: bool,
}

/// How long a single session lasted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Focus {
    Fragmented,
    Flow,
    Deep,
}

impl Focus {
    fn of(duration: Duration) -> Self {
        if duration >= Duration::hours(1) {
            Focus::Deep
        } else if duration >= Duration::minutes(15) {
            Focus::Flow
        } else {
            Focus::Fragmented
        }
    }
}

impl Display for Focus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Focus::Fragmented => write!(f, "Fragmented (<15m)"),
            Focus::Flow => write!(f, "Flow (15m-1h)"),
            Focus::Deep => write!(f, "Deep Focus (>1h)"),
        }
    }
}

/// Part of the day most of the tracked time starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Chronotype {
    MorningLark,
    AfternoonPower,
    EveningSprinter,
    NightOwl,
}

impl Chronotype {
    fn of_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Chronotype::MorningLark,
            12..=17 => Chronotype::AfternoonPower,
            18..=22 => Chronotype::EveningSprinter,
            _ => Chronotype::NightOwl,
        }
    }
}

impl Display for Chronotype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chronotype::MorningLark => write!(f, "Morning Lark"),
            Chronotype::AfternoonPower => write!(f, "Afternoon Power"),
            Chronotype::EveningSprinter => write!(f, "Evening Sprinter"),
            Chronotype::NightOwl => write!(f, "Night Owl"),
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Analysis {
    #[serde(serialize_with = "serialize_duration")]
    pub total_duration: Duration,
    #[serde(serialize_with = "serialize_duration")]
    pub deep_work_duration: Duration,
    /// Share of the tracked time spent in sessions of an hour or longer, 0 to 100.
    pub deep_work_score: f64,
    #[serde(serialize_with = "serialize_duration")]
    pub average_session: Duration,
    /// Project changes between consecutive activities of the same local day.
    pub context_switches: usize,
    pub switches_per_day: f64,
    pub chronotype: Chronotype,
    pub peak_hour: Option<u32>,
    pub best_day: Option<Weekday>,
    pub focus_distribution: BTreeMap<Focus, usize>,
}

/// Derives focus and rhythm statistics from a set of activities. Hours and days are local.
/// Time is attributed to the hour and weekday an activity starts in.
pub fn analyze_activities(mut activities: Vec<Activity>, now: DateTime<Utc>) -> Analysis {
    activities.sort_by_key(|v| v.start_time);

    let mut total_duration = Duration::zero();
    let mut deep_work_duration = Duration::zero();
    let mut focus_distribution = BTreeMap::<Focus, usize>::new();
    let mut hourly = [Duration::zero(); 24];
    let mut daily = [Duration::zero(); 7];

    let mut context_switches = 0;
    let mut active_days = 0;
    let mut previous: Option<(NaiveDate, &str)> = None;

    for activity in &activities {
        let duration = activity.duration(now);
        let start = activity.start_time.with_timezone(&Local);
        total_duration += duration;

        let focus = Focus::of(duration);
        if focus == Focus::Deep {
            deep_work_duration += duration;
        }
        *focus_distribution.entry(focus).or_default() += 1;

        hourly[start.hour() as usize] += duration;
        daily[start.weekday().num_days_from_monday() as usize] += duration;

        let day = start.date_naive();
        match previous {
            Some((previous_day, project)) if previous_day == day => {
                if project != activity.project {
                    context_switches += 1;
                }
            }
            _ => active_days += 1,
        }
        previous = Some((day, activity.project.as_str()));
    }

    let deep_work_score = match total_duration.num_milliseconds() {
        0 => 0.0,
        total => deep_work_duration.num_milliseconds() as f64 / total as f64 * 100.0,
    };
    let average_session = i32::try_from(activities.len())
        .ok()
        .filter(|count| *count > 0)
        .map_or_else(Duration::zero, |count| total_duration / count);
    let switches_per_day = match active_days {
        0 => 0.0,
        days => context_switches as f64 / days as f64,
    };

    let mut periods = BTreeMap::<u8, (Chronotype, Duration)>::new();
    for (hour, duration) in (0u32..).zip(hourly) {
        let chronotype = Chronotype::of_hour(hour);
        let order = match chronotype {
            Chronotype::MorningLark => 0,
            Chronotype::AfternoonPower => 1,
            Chronotype::EveningSprinter => 2,
            Chronotype::NightOwl => 3,
        };
        periods
            .entry(order)
            .or_insert((chronotype, Duration::zero()))
            .1 += duration;
    }
    let chronotype = periods
        .into_values()
        .fold(None, |best: Option<(Chronotype, Duration)>, v| match best {
            Some(best) if best.1 >= v.1 => Some(best),
            _ => Some(v),
        })
        .map_or(Chronotype::MorningLark, |v| v.0);

    Analysis {
        total_duration,
        deep_work_duration,
        deep_work_score,
        average_session,
        context_switches,
        switches_per_day,
        chronotype,
        peak_hour: busiest(hourly.iter().copied().zip(0u32..)),
        best_day: busiest(daily.iter().copied().zip(WEEKDAYS)),
        focus_distribution,
    }
}

/// Key with the longest positive duration. Ties go to the earliest key.
fn busiest<K>(durations: impl Iterator<Item = (Duration, K)>) -> Option<K> {
    durations
        .filter(|(duration, _)| *duration > Duration::zero())
        .fold(None, |best: Option<(Duration, K)>, v| match best {
            Some(best) if best.0 >= v.0 => Some(best),
            _ => Some(v),
        })
        .map(|v| v.1)
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn switching_verdict(switches_per_day: f64) -> &'static str {
    if switches_per_day > 10.0 {
        "High fragmentation"
    } else if switches_per_day > 5.0 {
        "Moderate switching"
    } else {
        "Excellent focus"
    }
}

pub async fn process_analyze_command(
    AnalyzeCommand { days, json }: AnalyzeCommand,
    resolver: &impl ActivityResolver,
) -> Result<()> {
    let now = resolver.now();
    let from = Duration::try_days(i64::from(days))
        .and_then(|v| now.checked_sub_signed(v))
        .ok_or_else(|| anyhow!("{days} days is too far back"))?;

    let report = resolver
        .get_report(&ActivityFilter::between(from, now))
        .await?;
    if report.activities.is_empty() {
        println!("No activities found for analysis.");
        return Ok(());
    }

    let analysis = analyze_activities(report.activities, now);
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print!("{}", render_analysis(&analysis));
    }
    Ok(())
}

fn bar(filled: usize, width: usize) -> String {
    let filled = filled.min(width);
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled))
}

pub fn render_analysis(analysis: &Analysis) -> String {
    let mut out = String::from("Productivity Analysis\n=====================\n\n");

    out.push_str("Focus Quality\n");
    out.push_str(&format!(
        "  {:<20}{:.1}%\n",
        "Deep Work Score:", analysis.deep_work_score
    ));
    let filled = (analysis.deep_work_score / 100.0 * SCORE_BAR_WIDTH as f64) as usize;
    out.push_str(&format!("  {}\n", bar(filled, SCORE_BAR_WIDTH)));
    out.push_str(&format!(
        "  {:<20}{}\n\n",
        "Avg Session:",
        format_hours_minutes(analysis.average_session)
    ));

    out.push_str("Chronotype & Rhythm\n");
    out.push_str(&format!("  {:<20}{}\n", "Type:", analysis.chronotype));
    if let Some(hour) = analysis.peak_hour {
        out.push_str(&format!(
            "  {:<20}{hour:02}:00 - {:02}:00\n",
            "Peak Hour:",
            (hour + 1) % 24
        ));
    }
    if let Some(day) = analysis.best_day {
        out.push_str(&format!("  {:<20}{}\n", "Best Day:", weekday_name(day)));
    }
    out.push('\n');

    out.push_str("Context Switching\n");
    out.push_str(&format!(
        "  {:<20}{:.1}\n",
        "Avg Switches/Day:", analysis.switches_per_day
    ));
    out.push_str(&format!(
        "  {:<20}{}\n\n",
        "Verdict:",
        switching_verdict(analysis.switches_per_day)
    ));

    out.push_str("Session Distribution\n");
    let max = analysis
        .focus_distribution
        .values()
        .copied()
        .max()
        .unwrap_or_default();
    for focus in [Focus::Fragmented, Focus::Flow, Focus::Deep] {
        let count = analysis
            .focus_distribution
            .get(&focus)
            .copied()
            .unwrap_or_default();
        let filled = if max == 0 {
            0
        } else {
            count * DISTRIBUTION_BAR_WIDTH / max
        };
        out.push_str(&format!(
            "  {:<20}{} {count}\n",
            focus.to_string(),
            "#".repeat(filled)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};

    use crate::{tracking::entities::Activity, utils::time::local_to_utc};

    use super::{analyze_activities, render_analysis, Chronotype, Focus};

    // 2024-05-13 is a Monday.
    fn local(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        local_to_utc(
            NaiveDate::from_ymd_opt(2024, 5, day)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
        )
        .unwrap()
    }

    fn activity(project: &str, day: u32, hour: u32, minutes: i64) -> Activity {
        let start = local(day, hour, 0);
        Activity::new(project, "task", start).with_end(start + Duration::minutes(minutes))
    }

    #[test]
    fn test_analyze_focus_and_rhythm() {
        let activities = vec![
            activity("work", 13, 9, 120),
            activity("mail", 13, 11, 10),
            activity("work", 13, 14, 30),
            activity("work", 14, 9, 60),
            activity("home", 14, 20, 20),
        ];
        let analysis = analyze_activities(activities, local(20, 12, 0));

        assert_eq!(analysis.total_duration, Duration::minutes(240));
        assert_eq!(analysis.deep_work_duration, Duration::minutes(180));
        assert_eq!(analysis.deep_work_score, 75.0);
        assert_eq!(analysis.average_session, Duration::minutes(48));

        // work -> mail -> work on Monday, work -> home on Tuesday.
        assert_eq!(analysis.context_switches, 3);
        assert_eq!(analysis.switches_per_day, 1.5);

        assert_eq!(analysis.chronotype, Chronotype::MorningLark);
        assert_eq!(analysis.peak_hour, Some(9));
        assert_eq!(analysis.best_day, Some(Weekday::Mon));
        assert_eq!(analysis.focus_distribution[&Focus::Deep], 2);
        assert_eq!(analysis.focus_distribution[&Focus::Flow], 2);
        assert_eq!(analysis.focus_distribution[&Focus::Fragmented], 1);
    }

    #[test]
    fn test_running_activity_counts_up_to_now() {
        let activities = vec![
            Activity::new("work", "late", local(15, 21, 0)),
            activity("work", 15, 8, 30),
        ];
        let analysis = analyze_activities(activities, local(15, 23, 30));

        assert_eq!(analysis.total_duration, Duration::minutes(180));
        assert_eq!(analysis.chronotype, Chronotype::EveningSprinter);
        assert_eq!(analysis.peak_hour, Some(21));
        assert_eq!(analysis.context_switches, 0);
    }

    #[test]
    fn test_analyze_nothing_tracked() {
        let analysis = analyze_activities(vec![], local(15, 12, 0));

        assert_eq!(analysis.deep_work_score, 0.0);
        assert_eq!(analysis.average_session, Duration::zero());
        assert_eq!(analysis.peak_hour, None);
        assert_eq!(analysis.best_day, None);
        assert_eq!(analysis.chronotype, Chronotype::MorningLark);
    }

    #[test]
    fn test_render_analysis() {
        let activities = vec![activity("work", 13, 9, 90), activity("mail", 13, 11, 30)];
        let rendered = render_analysis(&analyze_activities(activities, local(20, 12, 0)));

        assert!(rendered.starts_with("Productivity Analysis\n"));
        assert!(rendered.contains("  Deep Work Score:    75.0%\n"));
        assert!(rendered.contains(&format!("  {}{}\n", "#".repeat(37), ".".repeat(13))));
        assert!(rendered.contains("  Avg Session:        1h 0m\n"));
        assert!(rendered.contains("  Peak Hour:          09:00 - 10:00\n"));
        assert!(rendered.contains("  Best Day:           Monday\n"));
        assert!(rendered.contains("  Verdict:            Excellent focus\n"));
        assert!(rendered.contains(&format!("  Flow (15m-1h)       {} 1\n", "#".repeat(40))));
        assert!(rendered.contains("  Fragmented (<15m)    0\n"));
    }
}
