//! `repeat` CLI — compute, advance, and undo recurring-task occurrences.
//!
//! ## Usage
//!
//! ```sh
//! # Next due date of a rule (local ISO in, local ISO and millis out)
//! repeat --tz Europe/Berlin next --rule "FREQ=WEEKLY;BYDAY=MO,WE" --due 2026-03-02T09:00
//!
//! # Repeat from completion
//! repeat next --rule "FREQ=DAILY" --due 2026-03-02 --completed 2026-03-05T18:30 --from-completion
//!
//! # Advance a task described as JSON (stdin → stdout)
//! echo '{"recurrence":"FREQ=DAILY;COUNT=3","task":{"due_date":1772452800000,"now":0}}' | repeat advance
//!
//! # Undo an advance from file to file
//! repeat undo -i advanced.json -o restored.json
//!
//! # Zone and DST policy from a config file, with debug logging
//! repeat --config repeat.json --verbose advance -i task.json
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use log::debug;
use repeat_engine::dst::resolve_local;
use repeat_engine::task::to_local;
use repeat_engine::{
    create_due_date, has_due_time, Alarm, DuePrecision, RepeatConfig, RepeatCoordinator,
    RepeatFrom, RepeatOutcome, TaskOccurrenceInput,
};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};

#[derive(Parser)]
#[command(
    name = "repeat",
    version,
    about = "Recurring task occurrence calculator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// IANA zone for day boundaries and wall-clock times (overrides --config)
    #[arg(long, global = true)]
    tz: Option<String>,

    /// JSON configuration file (timezone, dst_policy, search_limit)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log engine decisions at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the next due date of a rule
    Next {
        /// Recurrence rule, optionally with ;FROM=COMPLETION
        #[arg(long)]
        rule: String,
        /// Current due date: YYYY-MM-DD or YYYY-MM-DDTHH:MM in the configured zone
        #[arg(long)]
        due: String,
        /// Completion time, same formats as --due
        #[arg(long)]
        completed: Option<String>,
        /// Measure from completion instead of the due date
        #[arg(long)]
        from_completion: bool,
        /// Treat --due as day-only even if it has a time
        #[arg(long)]
        day_only: bool,
    },
    /// Advance a task past its current occurrence
    Advance {
        /// Input JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Reverse an advance
    Undo {
        /// Input JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Request body for `advance` and `undo`.
#[derive(Debug, Deserialize)]
struct RepeatRequest {
    recurrence: String,
    task: TaskOccurrenceInput,
    /// Owner id of the alarms to shift.
    #[serde(default)]
    task_id: i64,
    #[serde(default)]
    alarms: Vec<Alarm>,
    /// Only read by `undo`.
    #[serde(default)]
    previous_due_date: Option<i64>,
}

#[derive(Debug, Serialize)]
struct RepeatResponse {
    result: RepeatOutcome,
    alarms: Vec<Alarm>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = load_config(cli.config.as_deref(), cli.tz.as_deref())?;
    let coordinator =
        RepeatCoordinator::new(config.clone()).context("Invalid repeat configuration")?;
    debug!("using {:?}", config);

    match cli.command {
        Commands::Next {
            rule,
            due,
            completed,
            from_completion,
            day_only,
        } => {
            let tz = config.zone()?;
            let precision_hint = if day_only {
                Some(DuePrecision::Day)
            } else {
                None
            };
            let due_date = parse_local(&due, &tz, &config, precision_hint)?;
            let mut task = TaskOccurrenceInput::new(due_date, Utc::now().timestamp_millis());
            if let Some(completed) = completed {
                let completed = parse_local(&completed, &tz, &config, Some(DuePrecision::DayTime))?;
                task = task.with_completion_date(completed);
            }
            if from_completion {
                task = task.with_repeat_from(RepeatFrom::CompletionDate);
            }

            let next = coordinator
                .next_due_date(&rule, &task)
                .with_context(|| format!("Failed to compute next occurrence of '{}'", rule))?;
            println!("{}\t{}", format_local(next, &tz)?, next);
        }
        Commands::Advance { input, output } => {
            let request = read_request(input.as_deref())?;
            let outcome = coordinator.advance(&request.recurrence, &request.task);
            respond(output.as_deref(), &request, outcome)?;
        }
        Commands::Undo { input, output } => {
            let request = read_request(input.as_deref())?;
            let outcome =
                coordinator.undo(&request.recurrence, &request.task, request.previous_due_date);
            respond(output.as_deref(), &request, outcome)?;
        }
    }

    Ok(())
}

/// Build the configuration from `--config` and `--tz`. The flag wins over the
/// file's zone.
fn load_config(path: Option<&str>, tz: Option<&str>) -> Result<RepeatConfig> {
    let mut config = match path {
        Some(path) => {
            let json = read_input(Some(path))?;
            RepeatConfig::from_json(&json)
                .with_context(|| format!("Failed to load config: {}", path))?
        }
        None => RepeatConfig::default(),
    };
    if let Some(tz) = tz {
        config.timezone = tz.to_string();
    }
    Ok(config)
}

/// Parse `YYYY-MM-DD` (day-only) or `YYYY-MM-DDTHH:MM[:SS]` (day+time) in
/// the configured zone and encode it as a due date.
fn parse_local(
    value: &str,
    tz: &Tz,
    config: &RepeatConfig,
    precision: Option<DuePrecision>,
) -> Result<i64> {
    let (naive, parsed_precision) = if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
    {
        (date.and_hms_opt(12, 0, 0).unwrap_or_default(), DuePrecision::Day)
    } else {
        let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
            .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD or YYYY-MM-DDTHH:MM", value))?;
        (naive, DuePrecision::DayTime)
    };
    let local = resolve_local(tz, naive, config.dst_policy);
    Ok(create_due_date(
        precision.unwrap_or(parsed_precision),
        &local,
        config.dst_policy,
    ))
}

/// Day-only due dates print as a date, day+time ones as RFC 3339.
fn format_local(millis: i64, tz: &Tz) -> Result<String> {
    let local: DateTime<Tz> = to_local(millis, tz)?;
    Ok(if has_due_time(millis) {
        local.to_rfc3339()
    } else {
        local.format("%Y-%m-%d").to_string()
    })
}

fn read_request(path: Option<&str>) -> Result<RepeatRequest> {
    let json = read_input(path)?;
    serde_json::from_str(&json).context("Failed to parse repeat request JSON")
}

/// Write the outcome and the task's alarms, shifted when the series continues.
/// An aborted outcome is still written, then reported as a failure.
fn respond(output: Option<&str>, request: &RepeatRequest, outcome: RepeatOutcome) -> Result<()> {
    let alarms = match outcome.instructions() {
        Some(instructions) => instructions
            .alarm_shift(request.task_id)
            .apply(&request.alarms),
        None => request.alarms.clone(),
    };
    let aborted = match &outcome {
        RepeatOutcome::Aborted { error } => Some(error.clone()),
        _ => None,
    };

    let response = RepeatResponse {
        result: outcome,
        alarms,
    };
    let mut json = serde_json::to_string_pretty(&response)?;
    json.push('\n');
    write_output(output, &json)?;

    if let Some(error) = aborted {
        anyhow::bail!("Task left unchanged: {}", error);
    }
    Ok(())
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
