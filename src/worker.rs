use std::hint;
use std::thread;

use log::{error, trace};

use crate::error::ClassificationError;
use crate::pipeline::{RetryMode, RunContext};
use crate::queue::TryEnqueue;
use crate::sampler::Sampler;

type WorkerResult = Result<(), ClassificationError>;

// ---------------------------------------------------------------------------
// Panic guard
// ---------------------------------------------------------------------------

/// Aborts the run if the owning worker unwinds, so nobody waits forever on
/// an item that will never come.
struct AbortOnPanic<'a>(&'a RunContext);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

fn backoff(mode: RetryMode) {
    match mode {
        RetryMode::Spin => hint::spin_loop(),
        RetryMode::Block | RetryMode::Yield => thread::yield_now(),
    }
}

fn classify(ctx: &RunContext, value: f64) -> Result<usize, ClassificationError> {
    ctx.bins.classify(value).inspect_err(|e| {
        error!("{e}");
        ctx.abort();
    })
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

pub(crate) fn producer<S: Sampler>(ctx: &RunContext, id: usize, mut sampler: S) -> WorkerResult {
    let _guard = AbortOnPanic(ctx);
    if !ctx.start_gate() {
        return Ok(());
    }

    let mut produced = 0u64;
    while !ctx.is_aborted() {
        let bin = classify(ctx, sampler.sample())?;
        if !ctx.claim() {
            break;
        }
        if !enqueue(ctx, bin) {
            break;
        }
        ctx.publish();
        produced += 1;
    }
    trace!("producer {id} done, {produced} enqueued");
    Ok(())
}

/// `false` if the run was aborted while waiting for room.
fn enqueue(ctx: &RunContext, bin: usize) -> bool {
    let mode = ctx.config.retry;
    if mode == RetryMode::Block {
        return ctx.queue.enqueue(bin);
    }
    loop {
        match ctx.queue.try_enqueue(bin) {
            TryEnqueue::Enqueued => return true,
            TryEnqueue::Full if ctx.is_aborted() => return false,
            TryEnqueue::Full => backoff(mode),
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

pub(crate) fn consumer(ctx: &RunContext, id: usize) -> WorkerResult {
    let _guard = AbortOnPanic(ctx);
    if !ctx.start_gate() {
        return Ok(());
    }

    let mode = ctx.config.retry;
    let mut consumed = 0u64;
    if mode == RetryMode::Block {
        while let Some(bin) = ctx.queue.dequeue() {
            ctx.record(bin);
            consumed += 1;
        }
    } else {
        loop {
            if let Some(bin) = ctx.queue.try_dequeue() {
                ctx.record(bin);
                consumed += 1;
                continue;
            }
            if ctx.is_aborted() {
                break;
            }
            if ctx.budget.is_drained() {
                // Everything is in the queue; one more look decides.
                match ctx.queue.try_dequeue() {
                    Some(bin) => {
                        ctx.record(bin);
                        consumed += 1;
                        continue;
                    }
                    None => break,
                }
            }
            backoff(mode);
        }
    }
    trace!("consumer {id} done, {consumed} counted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Direct (no queue)
// ---------------------------------------------------------------------------

pub(crate) fn direct<S: Sampler>(ctx: &RunContext, id: usize, mut sampler: S) -> WorkerResult {
    let _guard = AbortOnPanic(ctx);
    if !ctx.start_gate() {
        return Ok(());
    }

    let mut counted = 0u64;
    while !ctx.is_aborted() {
        let bin = classify(ctx, sampler.sample())?;
        if !ctx.claim() {
            break;
        }
        ctx.record(bin);
        ctx.publish();
        counted += 1;
    }
    trace!("direct worker {id} done, {counted} counted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Partitioned (pre-generated block, shared table lock)
// ---------------------------------------------------------------------------

pub(crate) fn partitioned(ctx: &RunContext, id: usize, block: &[f64]) -> WorkerResult {
    let _guard = AbortOnPanic(ctx);
    if !ctx.start_gate() {
        return Ok(());
    }

    for &value in block {
        if ctx.is_aborted() {
            break;
        }
        let bin = classify(ctx, value)?;
        ctx.record(bin);
    }
    trace!("partitioned worker {id} done with a block of {}", block.len());
    Ok(())
}
