use chrono::Utc;
use clap::{Parser, Subcommand};
use companion_core::logging;
use companion_core::session::GREETING;
use companion_core::trace::load_motion_trace;
use companion_core::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "companion")]
#[command(about = "Guided breathing exercises and camera heart rate checks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in exercises (default)
    List,

    /// Run a guided exercise
    Run {
        /// Exercise id, e.g. box-breathing
        exercise: String,

        /// Tick once per second instead of replaying instantly
        #[arg(long)]
        realtime: bool,

        /// Heart rate measured before the exercise, for the summary
        #[arg(long)]
        heart_rate: Option<u32>,

        /// Dry run - run the exercise without logging a summary
        #[arg(long)]
        dry_run: bool,
    },

    /// Estimate heart rate from camera frames
    Ppg {
        /// Replay a CSV trace with a `red` column
        #[arg(long, conflicts_with_all = ["synthetic_bpm", "unavailable"])]
        trace: Option<PathBuf>,

        /// Generate a clean pulse at this rate
        #[arg(long, conflicts_with = "unavailable")]
        synthetic_bpm: Option<f64>,

        /// Simulate a camera that cannot be opened
        #[arg(long)]
        unavailable: bool,

        /// Maximum frames to process (defaults to one estimate's worth)
        #[arg(long)]
        frames: Option<u64>,

        /// Seed for filler values
        #[arg(long)]
        seed: Option<u64>,

        /// Pace frames at the capture rate
        #[arg(long)]
        realtime: bool,

        /// Dry run - estimate without logging a reading
        #[arg(long)]
        dry_run: bool,
    },

    /// Screen an accelerometer trace for falls
    Fall {
        /// CSV trace with x, y, z columns in m/s²
        #[arg(long)]
        trace: PathBuf,

        /// Dry run - report without logging events
        #[arg(long)]
        dry_run: bool,
    },

    /// Sample the simulated stress level
    Stress {
        /// Number of random-walk steps to take
        #[arg(long, default_value_t = 1)]
        samples: u32,

        /// Seed for the walk
        #[arg(long)]
        seed: Option<u64>,

        /// Take one sample per configured interval instead of all at once
        #[arg(long)]
        realtime: bool,

        /// Heart rate to attach to the reading
        #[arg(long)]
        heart_rate: Option<u32>,

        /// Dry run - sample without logging a reading
        #[arg(long)]
        dry_run: bool,
    },

    /// Show logged records
    History {
        /// Show only the most recent N records
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    logging::init_with_level(logging::level_for_verbosity(cli.verbose));

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    match cli.command {
        Some(Commands::List) | None => cmd_list(),
        Some(Commands::Run {
            exercise,
            realtime,
            heart_rate,
            dry_run,
        }) => cmd_run(&data_dir, &exercise, realtime, heart_rate, dry_run),
        Some(Commands::Ppg {
            trace,
            synthetic_bpm,
            unavailable,
            frames,
            seed,
            realtime,
            dry_run,
        }) => {
            let source: Box<dyn FrameSource> = if unavailable {
                Box::new(UnavailableSource::new("camera permission denied"))
            } else if let Some(path) = trace {
                Box::new(TraceSource::from_csv(&path)?)
            } else {
                let bpm = synthetic_bpm.unwrap_or(72.0);
                Box::new(SyntheticPulse::new(bpm, config.ppg.capture_fps))
            };
            let opts = PpgOptions {
                frames,
                seed,
                realtime,
                dry_run,
            };
            cmd_ppg(&data_dir, source, opts, &config)
        }
        Some(Commands::Fall { trace, dry_run }) => cmd_fall(&data_dir, &trace, dry_run, &config),
        Some(Commands::Stress {
            samples,
            seed,
            realtime,
            heart_rate,
            dry_run,
        }) => {
            let opts = StressOptions {
                samples,
                seed,
                realtime,
                heart_rate,
                dry_run,
            };
            cmd_stress(&data_dir, opts, &config)
        }
        Some(Commands::History { limit }) => cmd_history(&data_dir, limit),
    }
}

fn records_path(data_dir: &Path) -> PathBuf {
    data_dir.join("records.jsonl")
}

fn log_record(data_dir: &Path, record: Record, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("\n[Dry run - not logging record]");
        return Ok(());
    }
    let mut sink = JsonlSink::new(records_path(data_dir));
    sink.append(&record)?;
    println!("\n✓ Logged to {}", sink.path().display());
    Ok(())
}

fn checked_catalog() -> Result<&'static Catalog> {
    let catalog = get_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }
    Ok(catalog)
}

fn cmd_list() -> Result<()> {
    let catalog = checked_catalog()?;

    println!("{}", GREETING);
    println!();
    for ex in catalog.sorted() {
        println!(
            "  {:<24} {:<28} {:>4}s  ({} round{})",
            ex.id,
            ex.name,
            ex.total_seconds(),
            ex.rounds,
            if ex.rounds == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn cmd_run(
    data_dir: &Path,
    exercise_id: &str,
    realtime: bool,
    heart_rate: Option<u32>,
    dry_run: bool,
) -> Result<()> {
    let catalog = checked_catalog()?;
    let definition = catalog
        .get(exercise_id)
        .cloned()
        .ok_or_else(|| Error::Other(format!("Unknown exercise: {}", exercise_id)))?;

    display_exercise(&definition);

    let mut session = ExerciseSession::new();
    let started_at = Utc::now();
    session.start(definition)?;
    if heart_rate.is_some_and(|bpm| Rhythm::classify(bpm).is_elevated()) {
        session.set_concerned();
    }
    display_step(&session);

    let mut ticker = if realtime {
        Ticker::every(Duration::from_secs(1))
    } else {
        Ticker::immediate()
    };
    run_session(&mut session, &mut ticker, |s, outcome| match outcome {
        TickOutcome::StepAdvanced { .. } | TickOutcome::RoundAdvanced { .. } => display_step(s),
        TickOutcome::Completed => println!("\n✓ {}", s.message()),
        TickOutcome::Counting { .. } | TickOutcome::Idle => {}
    });
    ticker.stop();

    let before = Vitals {
        heart_rate,
        stress: None,
    };
    match session.summarize(started_at, before, Vitals::default()) {
        Some(summary) => {
            println!(
                "  {} of {} steps in {}s",
                summary.completed_steps, summary.total_steps, summary.duration_seconds
            );
            log_record(data_dir, Record::ExerciseSummary(summary), dry_run)
        }
        None => Ok(()),
    }
}

struct PpgOptions {
    frames: Option<u64>,
    seed: Option<u64>,
    realtime: bool,
    dry_run: bool,
}

fn cmd_ppg(
    data_dir: &Path,
    source: Box<dyn FrameSource>,
    opts: PpgOptions,
    config: &Config,
) -> Result<()> {
    let ppg = config.ppg.clone();
    let max_frames = opts.frames.unwrap_or(ppg.estimate_after_frames);
    let interval = ppg.frame_interval();
    let estimator = match opts.seed {
        Some(seed) => PpgEstimator::seeded(ppg, seed),
        None => PpgEstimator::new(ppg),
    };

    let mut monitor = PpgMonitor::with_estimator(source, estimator);
    println!("Place your fingertip over the camera...");

    let result = if opts.realtime {
        let mut pace = Ticker::every(interval);
        let result = monitor.measure(max_frames, &mut pace);
        pace.stop();
        result
    } else {
        monitor.measure(max_frames, Ticker::immediate())
    };

    let estimate = match result {
        Ok(estimate) => estimate,
        Err(Error::EstimationInconclusive) => {
            println!("No heartbeat found in the signal.");
            println!("Keep your fingertip still over the lens and try again.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    println!();
    println!("  Heart rate: {} BPM", estimate.bpm);
    println!("  Rhythm:     {}", estimate.rhythm);
    println!("  Confidence: {:.0}%", estimate.confidence);
    if estimate.filler {
        println!("  (estimated - signal too weak to count beats)");
    }

    if estimate.rhythm.is_elevated() {
        if let Some(ex) = checked_catalog()?.recommend(estimate.rhythm, None) {
            println!();
            println!("  Your heart is working hard. Try: {} ({})", ex.name, ex.id);
        }
    }

    let duration = (max_frames as f64 / monitor.estimator().config().capture_fps).round() as u32;
    match monitor.estimator().reading(Some(duration)) {
        Some(reading) => log_record(data_dir, Record::HeartReading(reading), opts.dry_run),
        None => Ok(()),
    }
}

fn cmd_fall(data_dir: &Path, trace: &Path, dry_run: bool, config: &Config) -> Result<()> {
    let samples = load_motion_trace(trace)?;

    let mut detector = FallDetector::new(config.motion.clone());
    detector.start();
    let events: Vec<FallEvent> = samples
        .into_iter()
        .filter_map(|sample| detector.on_sample(sample))
        .collect();
    detector.stop();

    if events.is_empty() {
        println!("No falls detected.");
        return Ok(());
    }

    println!("⚠ {} possible fall(s) detected", events.len());
    for event in &events {
        println!("  {:?} (magnitude {:.1} m/s²)", event.signal, event.magnitude);
    }

    if dry_run {
        println!("\n[Dry run - not logging events]");
        return Ok(());
    }
    let mut sink = JsonlSink::new(records_path(data_dir));
    for event in events {
        sink.append(&Record::FallEvent(event))?;
    }
    println!("\n✓ Logged to {}", sink.path().display());
    Ok(())
}

struct StressOptions {
    samples: u32,
    seed: Option<u64>,
    realtime: bool,
    heart_rate: Option<u32>,
    dry_run: bool,
}

fn cmd_stress(data_dir: &Path, opts: StressOptions, config: &Config) -> Result<()> {
    let mut monitor = match opts.seed {
        Some(seed) => StressMonitor::seeded(config.stress.clone(), seed),
        None => StressMonitor::new(config.stress.clone()),
    };

    let mut pace = if opts.realtime {
        Ticker::every(config.stress.interval())
    } else {
        Ticker::immediate()
    };
    for _ in (&mut pace).take(opts.samples as usize) {
        let level = monitor.sample();
        if opts.realtime {
            println!("  {:.0}", level);
        }
    }
    pace.stop();

    println!("Stress level: {:.0} ({:?})", monitor.level(), monitor.label());
    if monitor.needs_calming() {
        let rhythm = opts.heart_rate.map(Rhythm::classify).unwrap_or_default();
        if let Some(ex) = checked_catalog()?.recommend(rhythm, Some(monitor.level())) {
            println!("  Calm Down: try {} ({})", ex.name, ex.id);
        }
    }

    log_record(
        data_dir,
        Record::StressReading(monitor.reading(opts.heart_rate)),
        opts.dry_run,
    )
}

fn cmd_history(data_dir: &Path, limit: Option<usize>) -> Result<()> {
    let mut records = read_records(&records_path(data_dir))?;
    if records.is_empty() {
        println!("No records yet.");
        return Ok(());
    }

    records.sort_by_key(|r| r.timestamp());
    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));

    for record in records.iter().skip(skip) {
        let when = record.timestamp().format("%Y-%m-%d %H:%M:%S");
        match record {
            Record::ExerciseSummary(s) => println!(
                "{}  exercise  {} ({}/{} steps{})",
                when,
                s.exercise_id,
                s.completed_steps,
                s.total_steps,
                if s.completed { ", completed" } else { "" }
            ),
            Record::HeartReading(h) => {
                println!("{}  heart     {} BPM, {}", when, h.bpm, h.rhythm)
            }
            Record::StressReading(s) => {
                println!("{}  stress    {:.0} ({:?})", when, s.level, s.label)
            }
            Record::FallEvent(f) => println!(
                "{}  fall      {:?} at {:.1} m/s²",
                when, f.signal, f.magnitude
            ),
        }
    }
    Ok(())
}

fn display_exercise(definition: &ExerciseDefinition) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", definition.name);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {}", definition.description);
    println!(
        "  Duration: {} seconds ({} round{})",
        definition.total_seconds(),
        definition.rounds,
        if definition.rounds == 1 { "" } else { "s" }
    );
    println!();
}

fn display_step(session: &ExerciseSession) {
    let (Some(definition), Some(step)) = (session.definition(), session.current_step()) else {
        return;
    };
    println!(
        "  [round {}/{}] {} ({}s)",
        session.current_round() + 1,
        definition.rounds,
        step.instruction,
        step.duration_seconds
    );
    if !session.message().is_empty() {
        println!("    {}", session.message());
    }
}
