use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, warn};

use crate::barrier::{Arrival, StartBarrier};
use crate::bins::{BinSnapshot, BinTable};
use crate::budget::SampleBudget;
use crate::error::{ClassificationError, ConfigError, PipelineError, Result};
use crate::queue::BoundedIndexQueue;
use crate::sampler::{Sampler, UniformSampler};
use crate::worker;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What a worker does when the queue is full (producer) or empty (consumer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RetryMode {
    /// Sleep on the queue's signals.
    #[default]
    Block,
    /// Retry after `thread::yield_now()`.
    Yield,
    /// Retry after a spin-loop hint. Busy-waits; for benchmarking only.
    Spin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Producers classify and enqueue, consumers dequeue and count.
    Queued,
    /// No queue: every worker samples, classifies and counts on its own.
    Direct,
    /// Samples are generated before the clock starts; each worker counts
    /// its own contiguous block under one table-wide lock.
    Partitioned,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Queued, Strategy::Direct, Strategy::Partitioned];

    pub fn label(self) -> &'static str {
        match self {
            Strategy::Queued => "queued",
            Strategy::Direct => "direct",
            Strategy::Partitioned => "partitioned",
        }
    }

    /// Position in [`Strategy::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub bin_count: usize,
    pub min_measurement: f64,
    pub max_measurement: f64,
    pub target_count: u64,
    /// Also the worker count of the direct strategy.
    pub producer_count: usize,
    pub consumer_count: usize,
    pub queue_capacity: usize,
    pub retry: RetryMode,
    pub align_start: bool,
    /// Base RNG seed; taken from the clock when unset.
    pub seed: Option<u64>,
    pub strategy: Strategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bin_count: 10,
            min_measurement: 0.0,
            max_measurement: 5.0,
            target_count: 0,
            producer_count: 1,
            consumer_count: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry: RetryMode::default(),
            align_start: true,
            seed: None,
            strategy: Strategy::Queued,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.bin_count == 0 {
            return Err(ConfigError::NoBins);
        }
        let (min, max) = (self.min_measurement, self.max_measurement);
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(ConfigError::EmptyRange { min, max });
        }
        if !(max - min).is_finite() {
            return Err(ConfigError::RangeOverflow { min, max });
        }
        if self.producer_count == 0 {
            return Err(ConfigError::NoProducers);
        }
        if self.consumer_count == 0 {
            return Err(ConfigError::NoConsumers);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::NoCapacity);
        }
        Ok(())
    }

    pub fn with_strategy(&self, strategy: Strategy) -> Self {
        Self {
            strategy,
            ..self.clone()
        }
    }

    /// Threads the chosen strategy will spawn.
    pub fn worker_count(&self) -> usize {
        match self.strategy {
            Strategy::Queued => self.producer_count + self.consumer_count,
            Strategy::Direct | Strategy::Partitioned => self.producer_count,
        }
    }
}

/// Block of `total` items handled by worker `index` of `workers`. The first
/// `total % workers` workers take one extra item.
pub fn partition_bounds(total: usize, workers: usize, index: usize) -> Range<usize> {
    let share = total / workers;
    let extra = total % workers;
    let start = index * share + index.min(extra);
    let len = share + usize::from(index < extra);
    start..start + len
}

// ---------------------------------------------------------------------------
// Run phases and monitoring
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Configuring,
    Barriered,
    Running,
    Draining,
    Reporting,
    Done,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Phase::Configuring,
            1 => Phase::Barriered,
            2 => Phase::Running,
            3 => Phase::Draining,
            4 => Phase::Reporting,
            _ => Phase::Done,
        }
    }
}

/// Progress of a run as seen from outside the worker pool.
#[derive(Debug, Default)]
pub struct RunMonitor {
    counted: AtomicU64,
    phase: AtomicU8,
}

impl RunMonitor {
    /// Samples counted into bins so far.
    pub fn counted(&self) -> u64 {
        self.counted.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: Phase) {
        debug!("run phase -> {phase:?}");
        self.phase.store(phase as u8, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// Everything one run shares between its workers. Owned by the run and
/// handed to each worker at spawn time.
pub(crate) struct RunContext {
    pub(crate) config: PipelineConfig,
    pub(crate) bins: BinTable,
    pub(crate) queue: BoundedIndexQueue,
    pub(crate) budget: SampleBudget,
    barrier: StartBarrier,
    monitor: Arc<RunMonitor>,
    aborted: AtomicBool,
}

impl RunContext {
    fn new(config: PipelineConfig, monitor: Arc<RunMonitor>) -> Self {
        let queue = BoundedIndexQueue::new(config.queue_capacity);
        if config.target_count == 0 {
            queue.close();
        }
        let (min, max, n) = (
            config.min_measurement,
            config.max_measurement,
            config.bin_count,
        );
        let bins = match config.strategy {
            Strategy::Partitioned => BinTable::with_shared_lock(min, max, n),
            Strategy::Queued | Strategy::Direct => BinTable::new(min, max, n),
        };
        Self {
            bins,
            queue,
            budget: SampleBudget::new(config.target_count),
            barrier: StartBarrier::new(config.worker_count()),
            monitor,
            aborted: AtomicBool::new(false),
            config,
        }
    }

    /// Waits for the timed phase to begin. `false` means the run was called
    /// off before it started.
    pub(crate) fn start_gate(&self) -> bool {
        if !self.config.align_start {
            return !self.is_aborted();
        }
        match self.barrier.wait() {
            Arrival::Leader => {
                self.monitor.set_phase(Phase::Running);
                true
            }
            Arrival::Follower => true,
            Arrival::Cancelled => false,
        }
    }

    /// Claims one sample from the budget.
    pub(crate) fn claim(&self) -> bool {
        match self.budget.try_claim() {
            Some(n) => {
                if n == self.budget.target() {
                    self.monitor.set_phase(Phase::Draining);
                }
                true
            }
            None => false,
        }
    }

    /// Marks a claimed sample delivered; the final one closes the queue.
    pub(crate) fn publish(&self) {
        if self.budget.publish() {
            self.queue.close();
        }
    }

    pub(crate) fn record(&self, bin: usize) {
        self.bins.increment(bin);
        self.monitor.counted.fetch_add(1, Ordering::Relaxed);
    }

    /// Stops every worker: blocked threads are woken and loops bail out.
    pub(crate) fn abort(&self) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            warn!("aborting run with {} items still queued", self.queue.len());
        }
        self.barrier.cancel();
        self.queue.abort();
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct RunReport {
    pub strategy: Strategy,
    pub histogram: BinSnapshot,
    /// Barrier release (or spawn, without alignment) to last join.
    pub elapsed: Duration,
}

impl RunReport {
    pub fn samples(&self) -> u64 {
        self.histogram.total()
    }

    pub fn samples_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.samples() as f64 / secs
        }
    }
}

type WorkerHandle = (&'static str, JoinHandle<std::result::Result<(), ClassificationError>>);

/// Runs the pipeline once with uniformly distributed samples.
pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    run_monitored(config, Arc::new(RunMonitor::default()))
}

pub fn run_monitored(config: &PipelineConfig, monitor: Arc<RunMonitor>) -> Result<RunReport> {
    let base = config.seed.unwrap_or_else(clock_seed);
    let (min, max) = (config.min_measurement, config.max_measurement);
    run_with(config, monitor, |i| {
        UniformSampler::new(min, max, UniformSampler::worker_seed(base, i))
    })
}

/// Runs the pipeline once, building producer `i`'s sampler with
/// `make_sampler(i)`.
pub fn run_with<S, F>(
    config: &PipelineConfig,
    monitor: Arc<RunMonitor>,
    mut make_sampler: F,
) -> Result<RunReport>
where
    S: Sampler + Send + 'static,
    F: FnMut(usize) -> S,
{
    monitor.set_phase(Phase::Configuring);
    monitor.counted.store(0, Ordering::Relaxed);
    config.validate()?;

    let ctx = Arc::new(RunContext::new(config.clone(), Arc::clone(&monitor)));
    debug!(
        "{} run: {} samples, {} producers, {} consumers, capacity {}, {:?}",
        config.strategy.label(),
        config.target_count,
        config.producer_count,
        config.consumer_count,
        ctx.queue.capacity(),
        config.retry,
    );

    let data = match config.strategy {
        Strategy::Partitioned => Some(pregenerate(config, &mut make_sampler)?),
        Strategy::Queued | Strategy::Direct => None,
    };

    monitor.set_phase(Phase::Barriered);
    let spawned_at = Instant::now();
    if !config.align_start {
        monitor.set_phase(Phase::Running);
    }

    let mut handles: Vec<WorkerHandle> = Vec::with_capacity(config.worker_count());
    let spawn_result = spawn_workers(&ctx, &mut handles, &mut make_sampler, data);

    let mut failure = spawn_result.err();
    if failure.is_some() {
        ctx.abort();
    }
    for (role, handle) in handles {
        let outcome = match handle.join() {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => PipelineError::Classification(e),
            Err(_) => {
                ctx.abort();
                PipelineError::WorkerPanicked { role }
            }
        };
        failure.get_or_insert(outcome);
    }
    let finished_at = Instant::now();
    monitor.set_phase(Phase::Reporting);

    if let Some(err) = failure {
        monitor.set_phase(Phase::Done);
        return Err(err);
    }

    let started_at = ctx.barrier.released_at().unwrap_or(spawned_at);
    let report = RunReport {
        strategy: config.strategy,
        histogram: ctx.bins.snapshot(),
        elapsed: finished_at.saturating_duration_since(started_at),
    };
    monitor.set_phase(Phase::Done);
    debug!(
        "{} run done: {} of {} claimed samples counted in {:?}",
        config.strategy.label(),
        report.samples(),
        ctx.budget.claimed(),
        report.elapsed
    );
    Ok(report)
}

/// Fills one block per worker with that worker's sampler, before anything
/// is timed.
fn pregenerate<S, F>(config: &PipelineConfig, make_sampler: &mut F) -> Result<Arc<[f64]>>
where
    S: Sampler,
    F: FnMut(usize) -> S,
{
    let target = config.target_count;
    // Saturating is fine: reserving usize::MAX floats always fails.
    let total = usize::try_from(target).unwrap_or(usize::MAX);
    let mut data = Vec::new();
    data.try_reserve_exact(total)
        .map_err(|source| PipelineError::Pregenerate {
            samples: target,
            source,
        })?;

    for i in 0..config.producer_count {
        let mut sampler = make_sampler(i);
        let block = partition_bounds(total, config.producer_count, i);
        data.extend((0..block.len()).map(|_| sampler.sample()));
    }
    debug!("pre-generated {total} samples");
    Ok(data.into())
}

fn spawn_workers<S, F>(
    ctx: &Arc<RunContext>,
    handles: &mut Vec<WorkerHandle>,
    make_sampler: &mut F,
    data: Option<Arc<[f64]>>,
) -> Result<()>
where
    S: Sampler + Send + 'static,
    F: FnMut(usize) -> S,
{
    let config = &ctx.config;

    if let Some(data) = data {
        for i in 0..config.producer_count {
            let block = partition_bounds(data.len(), config.producer_count, i);
            let worker_ctx = Arc::clone(ctx);
            let data = Arc::clone(&data);
            let handle = thread::Builder::new()
                .name(format!("partitioned-{i}"))
                .spawn(move || worker::partitioned(&worker_ctx, i, &data[block]))
                .map_err(|source| PipelineError::Spawn {
                    role: "partitioned",
                    source,
                })?;
            handles.push(("partitioned", handle));
        }
        return Ok(());
    }

    let producer_role = match config.strategy {
        Strategy::Direct => "direct",
        Strategy::Queued | Strategy::Partitioned => "producer",
    };

    for i in 0..config.producer_count {
        let sampler = make_sampler(i);
        let worker_ctx = Arc::clone(ctx);
        let strategy = config.strategy;
        let handle = thread::Builder::new()
            .name(format!("{producer_role}-{i}"))
            .spawn(move || match strategy {
                Strategy::Direct => worker::direct(&worker_ctx, i, sampler),
                Strategy::Queued | Strategy::Partitioned => {
                    worker::producer(&worker_ctx, i, sampler)
                }
            })
            .map_err(|source| PipelineError::Spawn {
                role: producer_role,
                source,
            })?;
        handles.push((producer_role, handle));
    }

    if config.strategy == Strategy::Queued {
        for i in 0..config.consumer_count {
            let worker_ctx = Arc::clone(ctx);
            let handle = thread::Builder::new()
                .name(format!("consumer-{i}"))
                .spawn(move || worker::consumer(&worker_ctx, i))
                .map_err(|source| PipelineError::Spawn {
                    role: "consumer",
                    source,
                })?;
            handles.push(("consumer", handle));
        }
    }
    Ok(())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed)
}

// ---------------------------------------------------------------------------
// Background runs
// ---------------------------------------------------------------------------

pub struct RunHandle {
    pub monitor: Arc<RunMonitor>,
    pub total: u64,
    rx: Receiver<Result<RunReport>>,
}

impl RunHandle {
    pub fn try_recv(&self) -> Option<Result<RunReport>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PipelineError::WorkerPanicked {
                role: "coordinator",
            })),
        }
    }

    pub fn progress(&self) -> f64 {
        if self.total > 0 {
            self.monitor.counted() as f64 / self.total as f64
        } else {
            0.0
        }
    }
}

/// Starts a run on a background thread.
pub fn run_async(config: &PipelineConfig) -> RunHandle {
    let monitor = Arc::new(RunMonitor::default());
    let (tx, rx) = mpsc::channel();

    let config = config.clone();
    let total = config.target_count;
    let monitor_clone = Arc::clone(&monitor);

    thread::spawn(move || {
        let result = run_monitored(&config, monitor_clone);
        let _ = tx.send(result);
    });

    RunHandle { monitor, total, rx }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(target: u64, producers: usize, consumers: usize) -> PipelineConfig {
        PipelineConfig {
            bin_count: 10,
            min_measurement: 0.0,
            max_measurement: 5.0,
            target_count: target,
            producer_count: producers,
            consumer_count: consumers,
            seed: Some(99),
            ..PipelineConfig::default()
        }
    }

    fn assert_complete(report: &RunReport, target: u64) {
        assert_eq!(report.samples(), target);
        assert_eq!(report.histogram.counts.iter().sum::<u64>(), target);
    }

    #[test]
    fn invalid_configs_are_rejected_before_running() {
        let with_range = |min, max| PipelineConfig {
            min_measurement: min,
            max_measurement: max,
            ..config(1_000, 2, 2)
        };
        let cases = [
            (
                PipelineConfig {
                    bin_count: 0,
                    ..config(1, 1, 1)
                },
                ConfigError::NoBins,
            ),
            (
                PipelineConfig {
                    producer_count: 0,
                    ..config(1, 1, 1)
                },
                ConfigError::NoProducers,
            ),
            (
                PipelineConfig {
                    consumer_count: 0,
                    ..config(1, 1, 1)
                },
                ConfigError::NoConsumers,
            ),
            (
                PipelineConfig {
                    queue_capacity: 0,
                    ..config(1, 1, 1)
                },
                ConfigError::NoCapacity,
            ),
            (with_range(2.0, 2.0), ConfigError::EmptyRange { min: 2.0, max: 2.0 }),
            (
                with_range(-1e308, 1e308),
                ConfigError::RangeOverflow {
                    min: -1e308,
                    max: 1e308,
                },
            ),
        ];
        for (cfg, expected) in cases {
            for strategy in Strategy::ALL {
                match run(&cfg.with_strategy(strategy)) {
                    Err(PipelineError::Config(e)) => assert_eq!(e, expected),
                    other => panic!("expected {expected:?}, got {other:?}"),
                }
            }
        }
        let nan = with_range(0.0, f64::NAN);
        assert!(matches!(nan.validate(), Err(ConfigError::EmptyRange { .. })));
    }

    #[test]
    fn single_producer_single_consumer() {
        let report = run(&config(10_000, 1, 1)).unwrap();
        assert_complete(&report, 10_000);
        assert_eq!(report.strategy, Strategy::Queued);
        assert_eq!(report.histogram.counts.len(), 10);
    }

    #[test]
    fn zero_target_finishes_with_empty_bins() {
        let report = run(&config(0, 1, 1)).unwrap();
        assert_eq!(report.histogram.counts, vec![0; 10]);
    }

    #[test]
    fn single_bin_gets_every_sample() {
        let cfg = PipelineConfig {
            bin_count: 1,
            min_measurement: 0.0,
            max_measurement: 1.0,
            ..config(5_000, 3, 2)
        };
        let report = run(&cfg).unwrap();
        assert_eq!(report.histogram.counts, vec![5_000]);
    }

    #[test]
    fn stress_many_workers_small_queue() {
        let cfg = PipelineConfig {
            queue_capacity: 64,
            ..config(100_000, 8, 8)
        };
        let report = run(&cfg).unwrap();
        assert_complete(&report, 100_000);
    }

    #[test]
    fn every_retry_mode_delivers_the_exact_target() {
        for retry in [RetryMode::Block, RetryMode::Yield, RetryMode::Spin] {
            let cfg = PipelineConfig {
                retry,
                queue_capacity: 8,
                ..config(20_000, 4, 3)
            };
            let report = run(&cfg).unwrap();
            assert_complete(&report, 20_000);
        }
    }

    #[test]
    fn unaligned_start_still_counts_everything() {
        let cfg = PipelineConfig {
            align_start: false,
            ..config(20_000, 2, 5)
        };
        assert_complete(&run(&cfg).unwrap(), 20_000);
    }

    #[test]
    fn direct_strategy_counts_everything() {
        let cfg = config(30_000, 4, 1).with_strategy(Strategy::Direct);
        assert_eq!(cfg.worker_count(), 4);
        let report = run(&cfg).unwrap();
        assert_eq!(report.strategy, Strategy::Direct);
        assert_complete(&report, 30_000);
    }

    struct Fixed(f64);

    impl Sampler for Fixed {
        fn sample(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn partition_bounds_hand_the_remainder_to_the_first_workers() {
        let blocks: Vec<_> = (0..4).map(|i| partition_bounds(10, 4, i)).collect();
        assert_eq!(blocks, vec![0..3, 3..6, 6..8, 8..10]);

        let blocks: Vec<_> = (0..3).map(|i| partition_bounds(2, 3, i)).collect();
        assert_eq!(blocks, vec![0..1, 1..2, 2..2]);
    }

    #[test]
    fn partitioned_strategy_counts_everything() {
        let cfg = config(25_003, 4, 1).with_strategy(Strategy::Partitioned);
        assert_eq!(cfg.worker_count(), 4);
        let report = run(&cfg).unwrap();
        assert_eq!(report.strategy, Strategy::Partitioned);
        assert_complete(&report, 25_003);
    }

    #[test]
    fn partitioned_strategy_handles_fewer_samples_than_workers() {
        let cfg = config(3, 5, 1).with_strategy(Strategy::Partitioned);
        assert_complete(&run(&cfg).unwrap(), 3);
        let cfg = config(0, 2, 1).with_strategy(Strategy::Partitioned);
        assert_complete(&run(&cfg).unwrap(), 0);
    }

    #[test]
    fn partitioned_strategy_rejects_bad_samples() {
        let cfg = config(1_000, 3, 1).with_strategy(Strategy::Partitioned);
        let result = run_with(&cfg, Arc::new(RunMonitor::default()), |i| {
            Fixed(if i == 1 { 9.0 } else { 1.0 })
        });
        match result {
            Err(PipelineError::Classification(e)) => assert_eq!(e.value, 9.0),
            other => panic!("expected classification error, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_sample_aborts_the_run() {
        let modes = [
            (RetryMode::Block, DEFAULT_QUEUE_CAPACITY),
            (RetryMode::Yield, DEFAULT_QUEUE_CAPACITY),
            (RetryMode::Spin, 1),
        ];
        for (retry, queue_capacity) in modes {
            let cfg = PipelineConfig {
                retry,
                queue_capacity,
                ..config(1_000, 2, 2)
            };
            let monitor = Arc::new(RunMonitor::default());
            let result = run_with(&cfg, Arc::clone(&monitor), |_| Fixed(5.0));
            match result {
                Err(PipelineError::Classification(e)) => assert_eq!(e.value, 5.0),
                other => panic!("expected classification error, got {other:?}"),
            }
            assert_eq!(monitor.phase(), Phase::Done);
        }
    }

    #[test]
    fn one_bad_producer_stops_the_others() {
        for retry in [RetryMode::Block, RetryMode::Yield, RetryMode::Spin] {
            // A one-slot queue keeps the good producers spinning on a full
            // queue when the abort lands.
            let cfg = PipelineConfig {
                retry,
                queue_capacity: 1,
                ..config(u64::MAX, 3, 2)
            };
            let result = run_with(&cfg, Arc::new(RunMonitor::default()), |i| {
                Fixed(if i == 2 { -1.0 } else { 1.0 })
            });
            assert!(matches!(result, Err(PipelineError::Classification(_))));
        }
    }

    #[test]
    fn fixed_samples_land_in_their_bin() {
        let cfg = config(2_000, 2, 2);
        let report = run_with(&cfg, Arc::new(RunMonitor::default()), |_| Fixed(2.5)).unwrap();
        let mut expected = vec![0; 10];
        expected[5] = 2_000;
        assert_eq!(report.histogram.counts, expected);
    }

    #[test]
    fn monitor_reports_done_and_progress() {
        let monitor = Arc::new(RunMonitor::default());
        let report = run_monitored(&config(4_000, 2, 2), Arc::clone(&monitor)).unwrap();
        assert_eq!(monitor.phase(), Phase::Done);
        assert_eq!(monitor.counted(), 4_000);
        assert!(report.samples_per_sec() > 0.0);
    }

    #[test]
    fn independent_runs_do_not_share_state() {
        let a = run(&config(3_000, 2, 2)).unwrap();
        let b = run(&config(7_000, 2, 2)).unwrap();
        assert_complete(&a, 3_000);
        assert_complete(&b, 7_000);
    }

    #[test]
    fn async_run_delivers_report() {
        let handle = run_async(&config(5_000, 2, 2));
        let report = loop {
            if let Some(result) = handle.try_recv() {
                break result.unwrap();
            }
            thread::sleep(Duration::from_millis(1));
        };
        assert_complete(&report, 5_000);
        assert_eq!(handle.progress(), 1.0);
    }
}
