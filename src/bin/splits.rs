//! Splits CLI - edit run files from the command line
//!
//! Commands:
//! - show: Print the segments of a run
//! - average: Regenerate the Average Segments comparison
//! - insert / remove / move: Structural edits
//! - segment-times: Rewrite splits from local segment times
//! - comparison: Add, rename or remove custom comparisons
//! - check: Diagnose run invariants

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use runsplits::comparisons::{AverageSegmentsGenerator, ComparisonGenerator};
use runsplits::format::format_optional_duration;
use runsplits::segment::PERSONAL_BEST_COMPARISON_NAME;
use runsplits::{
    EditError, InvariantViolation, Run, RunEditor, RunEvent, TimingMethod, RUNSPLITS_VERSION,
};

/// Splits - run timing data model and segment-history editor
#[derive(Parser)]
#[command(name = "splits")]
#[command(version = RUNSPLITS_VERSION)]
#[command(about = "Edit speedrun splits while keeping history consistent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the segments of a run
    Show {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Timing method to display
        #[arg(long, default_value = "real-time")]
        method: MethodArg,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Regenerate the Average Segments comparison
    Average {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Weight ratio between consecutive attempts (1.0 = plain mean)
        #[arg(long, default_value = "0.9")]
        decay: f64,
    },

    /// Insert an empty segment
    Insert {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Segment index (0-based) to insert next to
        #[arg(long)]
        index: usize,

        /// Insert after the segment instead of before it
        #[arg(long)]
        below: bool,
    },

    /// Remove segments, merging their history into the next segment
    Remove {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Segment indices (0-based)
        #[arg(required = true)]
        indices: Vec<usize>,
    },

    /// Move a segment up or down by one
    Move {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Segment index (0-based)
        #[arg(long)]
        index: usize,

        #[arg(value_enum)]
        direction: Direction,
    },

    /// Rewrite personal best splits from local segment times
    SegmentTimes {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        #[arg(long, default_value = "real-time")]
        method: MethodArg,

        /// One time per segment; use _ for no time
        #[arg(required = true)]
        times: Vec<String>,
    },

    /// Manage custom comparisons
    Comparison {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        #[command(subcommand)]
        action: ComparisonAction,
    },

    /// Diagnose run invariants
    Check {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ComparisonAction {
    /// Add an empty custom comparison
    Add { name: String },
    /// Rename a custom comparison
    Rename { old: String, new: String },
    /// Remove a custom comparison
    Remove { name: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    /// Real-world time
    RealTime,
    /// In-game time
    GameTime,
}

impl From<MethodArg> for TimingMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::RealTime => TimingMethod::RealTime,
            MethodArg::GameTime => TimingMethod::GameTime,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Up,
    Down,
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SplitsCliError> {
    match cli.command {
        Commands::Show {
            input,
            method,
            json,
        } => cmd_show(&input, method.into(), json),

        Commands::Average {
            input,
            output,
            decay,
        } => cmd_average(&input, &output, decay),

        Commands::Insert {
            input,
            output,
            index,
            below,
        } => edit_run(&input, &output, TimingMethod::RealTime, |editor| {
            if below {
                editor.insert_below(index)
            } else {
                editor.insert_above(index)
            }
        }),

        Commands::Remove {
            input,
            output,
            indices,
        } => edit_run(&input, &output, TimingMethod::RealTime, |editor| {
            let removed = editor.remove_segments(&indices);
            log::info!("removed {} of {} requested segments", removed, indices.len());
            Ok(())
        }),

        Commands::Move {
            input,
            output,
            index,
            direction,
        } => edit_run(&input, &output, TimingMethod::RealTime, |editor| {
            match direction {
                Direction::Up => editor.move_up(index),
                Direction::Down => editor.move_down(index),
            }
        }),

        Commands::SegmentTimes {
            input,
            output,
            method,
            times,
        } => cmd_segment_times(&input, &output, method.into(), &times),

        Commands::Comparison {
            input,
            output,
            action,
        } => edit_run(&input, &output, TimingMethod::RealTime, |editor| {
            match &action {
                ComparisonAction::Add { name } => editor.add_comparison(name),
                ComparisonAction::Rename { old, new } => editor.rename_comparison(old, new),
                ComparisonAction::Remove { name } => editor.remove_comparison(name),
            }
        }),

        Commands::Check { input, json } => cmd_check(&input, json),
    }
}

fn reads_stdin(input: &Path) -> bool {
    input.to_string_lossy() == "-"
}

/// Refuse to wait on an interactive terminal for a JSON run
fn ensure_piped_stdin(input: &Path, stdin_is_tty: bool) -> Result<(), SplitsCliError> {
    if reads_stdin(input) && stdin_is_tty {
        return Err(SplitsCliError::InvalidArgument(
            "no run piped on stdin; pass --input <file> or pipe a run".to_string(),
        ));
    }
    Ok(())
}

fn read_input(input: &Path) -> Result<String, SplitsCliError> {
    ensure_piped_stdin(input, atty::is(atty::Stream::Stdin))?;
    if reads_stdin(input) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_run(input: &Path) -> Result<Run, SplitsCliError> {
    let data = read_input(input)?;
    Ok(Run::from_json(&data)?)
}

fn write_run(output: &Path, run: &Run) -> Result<(), SplitsCliError> {
    let json = run.to_json_pretty()?;
    if output.to_string_lossy() == "-" {
        println!("{}", json);
    } else {
        fs::write(output, json)?;
    }
    Ok(())
}

/// Load a run, apply one editor operation, and write it back
fn edit_run<F>(
    input: &Path,
    output: &Path,
    method: TimingMethod,
    edit: F,
) -> Result<(), SplitsCliError>
where
    F: FnOnce(&mut RunEditor) -> Result<(), EditError>,
{
    let run = load_run(input)?;
    let mut editor = RunEditor::with_method(run, method);
    edit(&mut editor)?;

    for event in editor.drain_events() {
        log_event(&event);
    }

    write_run(output, &editor.into_run())
}

fn log_event(event: &RunEvent) {
    match event {
        RunEvent::RunEdited => log::debug!("run edited"),
        RunEvent::SegmentRemovedOrAdded => log::info!("segment list changed"),
        RunEvent::ComparisonRenamed { old_name, new_name } => {
            log::info!("comparison '{}' renamed to '{}'", old_name, new_name)
        }
        RunEvent::ComparisonRemoved { name } => log::info!("comparison '{}' removed", name),
    }
}

fn cmd_show(input: &Path, method: TimingMethod, json: bool) -> Result<(), SplitsCliError> {
    let run = load_run(input)?;
    let segment_times = run.segment_times(method);
    let comparison_names = run.comparison_names();

    let rows: Vec<SegmentRow> = run
        .segments()
        .iter()
        .zip(&segment_times)
        .map(|(segment, segment_time)| SegmentRow {
            name: segment.name.clone(),
            split_time: format_optional_duration(segment.personal_best_split_time[method]),
            segment_time: format_optional_duration(*segment_time),
            best_segment: format_optional_duration(segment.best_segment_time[method]),
            comparisons: comparison_names
                .iter()
                .filter(|name| name.as_str() != PERSONAL_BEST_COMPARISON_NAME)
                .map(|name| {
                    (
                        name.to_string(),
                        format_optional_duration(segment.comparison(name.as_str())[method]),
                    )
                })
                .collect(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{} - {}", run.game_name, run.category_name);
    println!("Attempts: {}   Method: {}", run.attempt_count, method.as_str());
    println!();
    println!(
        "{:<24} {:>14} {:>14} {:>14}",
        "Segment", "Split", "Segment", "Best"
    );
    for row in &rows {
        println!(
            "{:<24} {:>14} {:>14} {:>14}",
            row.name, row.split_time, row.segment_time, row.best_segment
        );
        for (name, value) in &row.comparisons {
            println!("    {:<20} {:>14}", name, value);
        }
    }

    Ok(())
}

fn cmd_average(input: &Path, output: &Path, decay: f64) -> Result<(), SplitsCliError> {
    let generator = AverageSegmentsGenerator::with_decay(decay)?;
    let mut run = load_run(input)?;
    generator.generate_all(&mut run);
    log::info!(
        "generated averages over {} attempts (decay {})",
        run.run_history_count,
        generator.decay()
    );
    write_run(output, &run)
}

fn cmd_segment_times(
    input: &Path,
    output: &Path,
    method: TimingMethod,
    times: &[String],
) -> Result<(), SplitsCliError> {
    let deltas = times
        .iter()
        .map(|text| {
            if text == "_" {
                Ok(None)
            } else {
                runsplits::format::parse_duration(text).map(Some)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut run = load_run(input)?;
    runsplits::reconcile::derive_from_deltas(&mut run, method, &deltas)?;

    let mut editor = RunEditor::with_method(run, method);
    editor.fix();
    write_run(output, &editor.into_run())
}

fn cmd_check(input: &Path, json: bool) -> Result<(), SplitsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();
    let mut violations: Vec<InvariantViolation> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("splits version {}", RUNSPLITS_VERSION),
    });

    match read_input(input).map(|data| Run::from_json(&data)) {
        Ok(Ok(run)) => {
            checks.push(DoctorCheck {
                name: "run".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} segments, {} attempts in history",
                    run.len(),
                    run.run_history_count
                ),
            });

            if run.run_history_count == 0 {
                checks.push(DoctorCheck {
                    name: "history".to_string(),
                    status: CheckStatus::Warning,
                    message: "no attempts recorded; Average Segments will be empty".to_string(),
                });
            }

            violations = run.check_invariants();
            if violations.is_empty() {
                checks.push(DoctorCheck {
                    name: "invariants".to_string(),
                    status: CheckStatus::Ok,
                    message: "split order and best segments are consistent".to_string(),
                });
            }
            for violation in &violations {
                checks.push(DoctorCheck {
                    name: "invariants".to_string(),
                    status: CheckStatus::Error,
                    message: violation.to_string(),
                });
            }
        }
        Ok(Err(e)) => checks.push(DoctorCheck {
            name: "run".to_string(),
            status: CheckStatus::Error,
            message: format!("Invalid run: {}", e),
        }),
        Err(e) => checks.push(DoctorCheck {
            name: "run".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read run: {}", e.message()),
        }),
    }

    let errors = checks
        .iter()
        .filter(|c| matches!(c.status, CheckStatus::Error))
        .count();

    if json {
        println!("{}", serde_json::to_string_pretty(&DoctorReport { checks, violations })?);
    } else {
        println!("Splits Check Report");
        println!("===================");
        for check in &checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    if errors > 0 {
        Err(SplitsCliError::CheckFailed(errors))
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum SplitsCliError {
    Io(io::Error),
    Edit(EditError),
    Json(serde_json::Error),
    InvalidArgument(String),
    CheckFailed(usize),
}

impl SplitsCliError {
    fn message(&self) -> String {
        match self {
            SplitsCliError::Io(e) => e.to_string(),
            SplitsCliError::Edit(e) => e.to_string(),
            SplitsCliError::Json(e) => e.to_string(),
            SplitsCliError::InvalidArgument(msg) => msg.clone(),
            SplitsCliError::CheckFailed(count) => format!("{} check(s) failed", count),
        }
    }
}

impl From<io::Error> for SplitsCliError {
    fn from(e: io::Error) -> Self {
        SplitsCliError::Io(e)
    }
}

impl From<EditError> for SplitsCliError {
    fn from(e: EditError) -> Self {
        SplitsCliError::Edit(e)
    }
}

impl From<serde_json::Error> for SplitsCliError {
    fn from(e: serde_json::Error) -> Self {
        SplitsCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    error: String,
    message: String,
}

impl From<SplitsCliError> for CliError {
    fn from(e: SplitsCliError) -> Self {
        let error = match &e {
            SplitsCliError::Io(_) => "io_error",
            SplitsCliError::Edit(_) => "edit_error",
            SplitsCliError::Json(_) => "json_error",
            SplitsCliError::InvalidArgument(_) => "invalid_argument",
            SplitsCliError::CheckFailed(_) => "check_failed",
        };
        CliError {
            error: error.to_string(),
            message: e.message(),
        }
    }
}

#[derive(Serialize)]
struct SegmentRow {
    name: String,
    split_time: String,
    segment_time: String,
    best_segment: String,
    comparisons: Vec<(String, String)>,
}

#[derive(Serialize)]
struct DoctorReport {
    checks: Vec<DoctorCheck>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<InvariantViolation>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
