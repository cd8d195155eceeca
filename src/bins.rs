use crossbeam::utils::CachePadded;
use parking_lot::Mutex;

use crate::error::ClassificationError;

// ---------------------------------------------------------------------------
// Bin table
// ---------------------------------------------------------------------------

/// How a [`BinTable`] guards its counters.
enum Counts {
    // Padded so consumers hammering neighbouring bins do not share a line.
    PerBin(Box<[CachePadded<Mutex<u64>>]>),
    /// One lock for the whole table.
    Shared(Mutex<Vec<u64>>),
}

/// Equal-width partition of `[min, max)`, by default with one lock per bin.
///
/// Bin `i` covers `[maxes[i - 1], maxes[i])`, with `maxes[-1] = min`.
pub struct BinTable {
    min: f64,
    max: f64,
    maxes: Vec<f64>,
    counts: Counts,
}

impl BinTable {
    /// Callers validate `bin_count > 0` and a finite `min < max` with a
    /// finite width first.
    pub fn new(min: f64, max: f64, bin_count: usize) -> Self {
        let counts = (0..bin_count)
            .map(|_| CachePadded::new(Mutex::new(0)))
            .collect();
        Self::with_counts(min, max, bin_count, Counts::PerBin(counts))
    }

    /// Same bins, but every increment takes a single table-wide lock.
    pub fn with_shared_lock(min: f64, max: f64, bin_count: usize) -> Self {
        let counts = Counts::Shared(Mutex::new(vec![0; bin_count]));
        Self::with_counts(min, max, bin_count, counts)
    }

    fn with_counts(min: f64, max: f64, bin_count: usize, counts: Counts) -> Self {
        let width = (max - min) / bin_count as f64;
        let mut maxes: Vec<f64> = (1..=bin_count)
            .map(|i| min + i as f64 * width)
            .collect();
        // min + n * width can round below max
        if let Some(last) = maxes.last_mut() {
            *last = max;
        }
        Self {
            min,
            max,
            maxes,
            counts,
        }
    }

    fn lower_bound(&self, index: usize) -> f64 {
        if index == 0 {
            self.min
        } else {
            self.maxes[index - 1]
        }
    }

    /// Binary search for the bin holding `value`.
    pub fn classify(&self, value: f64) -> Result<usize, ClassificationError> {
        let err = ClassificationError {
            value,
            min: self.min,
            max: self.max,
        };
        // Written this way round so NaN is rejected too.
        if !(value >= self.min && value < self.max) {
            return Err(err);
        }

        let mut bottom = 0;
        let mut top = self.maxes.len();
        while bottom < top {
            let mid = bottom + (top - bottom) / 2;
            if value >= self.maxes[mid] {
                bottom = mid + 1;
            } else if value < self.lower_bound(mid) {
                top = mid;
            } else {
                return Ok(mid);
            }
        }
        Err(err)
    }

    /// Counts one measurement in bin `index`. Only that bin's lock is taken,
    /// unless the table was built with a shared lock.
    pub fn increment(&self, index: usize) {
        match &self.counts {
            Counts::PerBin(bins) => *bins[index].lock() += 1,
            Counts::Shared(bins) => bins.lock()[index] += 1,
        }
    }

    /// Copies the current counts. Meant to be read once the workers have
    /// been joined; concurrent increments may or may not be included.
    pub fn snapshot(&self) -> BinSnapshot {
        BinSnapshot {
            min: self.min,
            maxes: self.maxes.clone(),
            counts: match &self.counts {
                Counts::PerBin(bins) => bins.iter().map(|c| *c.lock()).collect(),
                Counts::Shared(bins) => bins.lock().clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BinSnapshot {
    pub min: f64,
    pub maxes: Vec<f64>,
    pub counts: Vec<u64>,
}

impl BinSnapshot {
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn largest(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// `(lower, upper)` bounds of every bin, in order.
    pub fn ranges(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let lowers = std::iter::once(self.min).chain(self.maxes.iter().copied());
        lowers.zip(self.maxes.iter().copied())
    }

    pub fn fraction(&self, bin: usize) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.counts[bin] as f64 / total as f64
        }
    }

    /// Rescales counts so the largest bin becomes `scale`.
    pub fn normalized(&self, scale: u64) -> Vec<u64> {
        let largest = self.largest();
        if largest == 0 {
            return vec![0; self.counts.len()];
        }
        self.counts
            .iter()
            .map(|&c| (scale as f64 * c as f64 / largest as f64).round() as u64)
            .collect()
    }
}
