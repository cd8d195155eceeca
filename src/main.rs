mod barrier;
mod bins;
mod budget;
mod calibrate;
mod error;
mod pipeline;
mod queue;
mod sampler;
mod signal;
mod stats;
mod system;
mod ui;
mod worker;

use std::io;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use log::{error, info};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::error::PipelineError;
use crate::pipeline::{PipelineConfig, RetryMode, RunHandle, RunReport, Strategy};
use crate::stats::StatResult;
use crate::system::{SystemInfo, WorkerCounts};
use crate::ui::{App, Stage};

const DEFAULT_ROUNDS: usize = 4;

// ---------------------------------------------------------------------------
// Global quit flag, set by SIGINT handler or key events
// ---------------------------------------------------------------------------

static QUIT: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_: libc::c_int) {
    QUIT.store(true, Ordering::Relaxed);
}

fn quitting() -> bool {
    QUIT.load(Ordering::Relaxed)
}

fn is_quit_event(ev: &Event) -> bool {
    match ev {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            key.code == KeyCode::Char('q')
                || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "hist-bench",
    about = "Producer/consumer histogram pipeline benchmark with TUI"
)]
struct Cli {
    /// Number of histogram bins
    #[arg(long, default_value_t = 10)]
    bins: usize,

    /// Smallest measurement (inclusive)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    min: f64,

    /// Largest measurement (exclusive)
    #[arg(long, default_value_t = 5.0, allow_hyphen_values = true)]
    max: f64,

    /// Samples per run (omit to auto-calibrate)
    #[arg(short, long)]
    samples: Option<u64>,

    /// Producer threads (also the direct and partitioned thread count)
    #[arg(short, long)]
    producers: Option<usize>,

    /// Consumer threads
    #[arg(short, long)]
    consumers: Option<usize>,

    /// Queue capacity
    #[arg(long, default_value_t = pipeline::DEFAULT_QUEUE_CAPACITY)]
    capacity: usize,

    /// Timed runs per strategy
    #[arg(short, long, default_value_t = DEFAULT_ROUNDS)]
    rounds: usize,

    /// What workers do on a full or empty queue
    #[arg(long, value_enum, default_value_t = RetryMode::Block)]
    retry: RetryMode,

    /// Start timing at spawn instead of aligning workers on a barrier
    #[arg(long)]
    no_barrier: bool,

    /// Run only the queued pipeline, skipping the strategy comparison
    #[arg(long)]
    no_compare: bool,

    /// Print plain text instead of drawing the TUI
    #[arg(long)]
    plain: bool,

    /// Base RNG seed (default: from the clock)
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn pipeline_config(&self, workers: WorkerCounts) -> PipelineConfig {
        PipelineConfig {
            bin_count: self.bins,
            min_measurement: self.min,
            max_measurement: self.max,
            target_count: self.samples.unwrap_or(0),
            producer_count: workers.producers,
            consumer_count: workers.consumers,
            queue_capacity: self.capacity,
            retry: self.retry,
            align_start: !self.no_barrier,
            seed: self.seed,
            strategy: Strategy::Queued,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));

    let cli = Cli::parse();
    let sysinfo = SystemInfo::detect();
    let workers = WorkerCounts::with_overrides(sysinfo.ncpus, cli.producers, cli.consumers);
    let config = cli.pipeline_config(workers);

    if let Err(e) = config.validate() {
        eprintln!("hist-bench: {e}");
        process::exit(2);
    }

    // Install SIGINT handler (Ctrl+C outside raw mode / during calibration)
    unsafe {
        libc::signal(
            libc::SIGINT,
            handle_sigint as *const () as libc::sighandler_t,
        );
    }

    let mut app = App::new(sysinfo, config);
    let result = if cli.plain {
        run_plain(&mut app, &cli)
    } else {
        run_tui(&mut app, &cli)
    };

    match result {
        Ok(()) => {
            if !quitting() {
                ui::print_summary(&app);
            }
        }
        Err(e) => {
            error!("run failed: {e}");
            eprintln!("hist-bench: {e}");
            process::exit(1);
        }
    }
}

fn calibrate_if_needed(app: &mut App, cli: &Cli) -> Result<(), PipelineError> {
    if cli.samples.is_some() {
        return Ok(());
    }
    let cal = calibrate::calibrate(&app.config)?;
    info!(
        "calibrated to {} samples ({:.0} samples/s)",
        cal.target_count, cal.probe_samples_per_sec
    );
    app.config.target_count = cal.target_count;
    app.calibration = Some(cal);
    Ok(())
}

fn run_plain(app: &mut App, cli: &Cli) -> Result<(), PipelineError> {
    calibrate_if_needed(app, cli)?;
    run_rounds(app, cli, |_, config| {
        let report = pipeline::run(config);
        if let Ok(ref r) = report {
            info!(
                "{} round: {:?} ({:.0} samples/s)",
                r.strategy.label(),
                r.elapsed,
                r.samples_per_sec()
            );
        }
        Some(report)
    })
}

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

/// Elapsed time of every finished round, per strategy.
#[derive(Default)]
struct Timings([Vec<Duration>; 3]);

impl Timings {
    fn push(&mut self, report: &RunReport) -> StatResult {
        let list = &mut self.0[report.strategy.index()];
        list.push(report.elapsed);
        StatResult::from_durations(list)
    }
}

/// Strategies to run in `round`. Each round starts one strategy later than
/// the previous one so none always runs on a cold or a warm machine.
fn round_order(round: usize, compare: bool) -> Vec<Strategy> {
    if !compare {
        return vec![Strategy::Queued];
    }
    let mut order = Strategy::ALL.to_vec();
    let len = order.len();
    order.rotate_left(round % len);
    order
}

/// Runs every round, handing each run to `exec`. `exec` returns `None` when
/// the user quit mid-run.
fn run_rounds<F>(app: &mut App, cli: &Cli, mut exec: F) -> Result<(), PipelineError>
where
    F: FnMut(&mut App, &PipelineConfig) -> Option<Result<RunReport, PipelineError>>,
{
    let rounds = cli.rounds.max(1);
    let mut timings = Timings::default();

    for round in 0..rounds {
        for strategy in round_order(round, !cli.no_compare) {
            if quitting() {
                return Ok(());
            }
            app.stage = Stage::Running {
                round: round + 1,
                total_rounds: rounds,
                strategy,
                phase: pipeline::Phase::Configuring,
            };
            app.progress = 0.0;

            let config = app.config.with_strategy(strategy);
            let Some(result) = exec(app, &config) else {
                return Ok(());
            };
            let report = result?;
            let stats = timings.push(&report);
            app.record(strategy, report.histogram, stats);
        }
    }
    app.stage = Stage::Done;
    app.finished = true;
    app.progress = 1.0;
    Ok(())
}

// ---------------------------------------------------------------------------
// TUI
// ---------------------------------------------------------------------------

fn run_tui(app: &mut App, cli: &Cli) -> Result<(), PipelineError> {
    // Set up terminal
    enable_raw_mode().expect("failed to enable raw mode");
    io::stdout()
        .execute(EnterAlternateScreen)
        .expect("failed to enter alternate screen");
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend).expect("failed to create terminal");

    let result = drive_tui(&mut terminal, app, cli);

    // --- Cleanup (always runs) ---
    disable_raw_mode().ok();
    io::stdout().execute(LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    result
}

fn drive_tui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    cli: &Cli,
) -> Result<(), PipelineError> {
    // --- Phase 1: Calibration ---
    app.stage = Stage::Calibrating;
    terminal.draw(|f| ui::draw(f, app)).ok();
    if let Err(e) = calibrate_if_needed(app, cli) {
        show_error(terminal, app, &e);
        return Err(e);
    }

    // --- Phase 2: Benchmark ---
    let result = run_rounds(app, cli, |app, config| {
        let handle = pipeline::run_async(config);
        run_with_progress(terminal, app, &handle)
    });
    if let Err(ref e) = result {
        show_error(terminal, app, e);
        return result;
    }

    // --- Phase 3: Wait for quit (only if benchmark ran to completion) ---
    if !quitting() {
        terminal.draw(|f| ui::draw(f, app)).ok();
        loop {
            if quitting() {
                break;
            }
            if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                if let Ok(ev) = event::read() {
                    if is_quit_event(&ev) {
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

fn show_error(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    e: &PipelineError,
) {
    app.stage = Stage::Error(e.to_string());
    terminal.draw(|f| ui::draw(f, app)).ok();
    std::thread::sleep(Duration::from_secs(3));
}

/// Polls a background run, redrawing until it reports. Returns `None` if
/// the user quits first; the run itself is left to finish on its own.
fn run_with_progress(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    handle: &RunHandle,
) -> Option<Result<RunReport, PipelineError>> {
    loop {
        if quitting() {
            return None;
        }

        app.progress = handle.progress();
        if let Stage::Running { ref mut phase, .. } = app.stage {
            *phase = handle.monitor.phase();
        }
        terminal.draw(|f| ui::draw(f, app)).ok();

        if let Some(result) = handle.try_recv() {
            app.progress = 1.0;
            return Some(result);
        }

        if event::poll(Duration::from_millis(50)).unwrap_or(false) {
            if let Ok(ev) = event::read() {
                if is_quit_event(&ev) {
                    QUIT.store(true, Ordering::Relaxed);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_maps_onto_pipeline_config() {
        let cli = Cli::parse_from([
            "hist-bench",
            "--bins",
            "4",
            "--min",
            "-1.5",
            "--max",
            "2",
            "-s",
            "500",
            "--retry",
            "spin",
            "--no-barrier",
            "--seed",
            "3",
        ]);
        let cfg = cli.pipeline_config(WorkerCounts::with_overrides(4, None, Some(3)));
        assert_eq!(cfg.bin_count, 4);
        assert_eq!(cfg.min_measurement, -1.5);
        assert_eq!(cfg.max_measurement, 2.0);
        assert_eq!(cfg.target_count, 500);
        assert_eq!(cfg.producer_count, 2);
        assert_eq!(cfg.consumer_count, 3);
        assert_eq!(cfg.queue_capacity, pipeline::DEFAULT_QUEUE_CAPACITY);
        assert_eq!(cfg.retry, RetryMode::Spin);
        assert!(!cfg.align_start);
        assert_eq!(cfg.seed, Some(3));
    }

    #[test]
    fn rounds_rotate_strategy_order() {
        use Strategy::*;
        assert_eq!(round_order(0, true), vec![Queued, Direct, Partitioned]);
        assert_eq!(round_order(1, true), vec![Direct, Partitioned, Queued]);
        assert_eq!(round_order(2, true), vec![Partitioned, Queued, Direct]);
        assert_eq!(round_order(3, true), round_order(0, true));
        assert_eq!(round_order(1, false), vec![Queued]);
    }

    #[test]
    fn plain_rounds_fill_every_column() {
        let cli = Cli::parse_from(["hist-bench", "-s", "2000", "-p", "2", "-c", "2", "-r", "2"]);
        let workers = WorkerCounts::with_overrides(2, cli.producers, cli.consumers);
        let mut app = App::new(SystemInfo::detect(), cli.pipeline_config(workers));
        run_plain(&mut app, &cli).unwrap();

        assert!(app.finished);
        for strategy in Strategy::ALL {
            assert_eq!(app.histogram(strategy).map(|h| h.total()), Some(2000));
            assert_eq!(app.result(strategy).map(|s| s.count), Some(2));
        }
    }
}
