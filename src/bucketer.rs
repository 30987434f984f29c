// ============================================================================
// AGGREGATION BUCKETER
// ============================================================================
// Streaming fixed-width bucket aggregation. Each write either extends the
// open bucket or finalizes it and opens a new one; history is never
// re-scanned.
//
// A write that maps to a bucket other than the open one always rolls the
// bucket, including when that bucket is older. Late arrivals therefore close
// the current bucket early and produce an out-of-order aggregate. Callers that
// need reordering protection must sort before writing.
// ============================================================================

use std::num::{NonZeroU64, NonZeroUsize};

use serde::{Deserialize, Serialize};

use crate::ring_buffer::BoundedRingBuffer;
use crate::timestamp::Timestamp;

/// A finalized bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub bucket_start: Timestamp,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

/// The in-progress accumulator for the current bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenBucket {
    pub bucket_start: Timestamp,
    pub sum: f64,
    pub count: u64,
    pub min: f64,
    pub max: f64,
}

impl OpenBucket {
    fn start(bucket_start: Timestamp, value: f64) -> Self {
        Self {
            bucket_start,
            sum: value,
            count: 1,
            min: value,
            max: value,
        }
    }

    #[inline]
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Close the bucket. `count` is at least 1 by construction.
    pub fn finalize(&self) -> Aggregate {
        Aggregate {
            bucket_start: self.bucket_start,
            avg: self.sum / self.count as f64,
            min: self.min,
            max: self.max,
            count: self.count,
        }
    }
}

/// Whether a bucketer currently has an open bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BucketState {
    #[default]
    Idle,
    Open(OpenBucket),
}

/// What a single fold did to the bucketer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FoldOutcome {
    /// First write since construction or reset
    Opened,
    /// Value joined the open bucket
    Accumulated,
    /// The open bucket was finalized and a new one opened.
    /// `late` is set when the new bucket starts before the finalized one.
    Rolled { finalized: Aggregate, late: bool },
}

/// Folds (value, timestamp) writes into fixed-width buckets and keeps a
/// bounded history of finalized aggregates.
#[derive(Debug, Clone)]
pub struct Bucketer {
    width_ms: NonZeroU64,
    state: BucketState,
    finalized: BoundedRingBuffer<Aggregate>,
}

impl Bucketer {
    pub fn new(width_ms: NonZeroU64, history: NonZeroUsize) -> Self {
        Self {
            width_ms,
            state: BucketState::Idle,
            finalized: BoundedRingBuffer::new(history),
        }
    }

    /// Start of the bucket that `timestamp` falls into.
    #[inline]
    pub fn bucket_start_for(&self, timestamp: Timestamp) -> Timestamp {
        timestamp.floor_to(self.width_ms.get())
    }

    /// Fold one write. O(1).
    pub fn fold(&mut self, value: f64, timestamp: Timestamp) -> FoldOutcome {
        let bucket_start = self.bucket_start_for(timestamp);

        if let BucketState::Open(open) = &mut self.state {
            if open.bucket_start == bucket_start {
                open.add(value);
                return FoldOutcome::Accumulated;
            }
        }

        let previous = std::mem::replace(
            &mut self.state,
            BucketState::Open(OpenBucket::start(bucket_start, value)),
        );

        match previous {
            BucketState::Idle => FoldOutcome::Opened,
            BucketState::Open(open) => {
                let finalized = open.finalize();
                self.finalized.push(finalized);
                FoldOutcome::Rolled {
                    finalized,
                    late: bucket_start < open.bucket_start,
                }
            }
        }
    }

    /// The in-progress bucket, if any.
    pub fn open_bucket(&self) -> Option<&OpenBucket> {
        match &self.state {
            BucketState::Open(open) => Some(open),
            BucketState::Idle => None,
        }
    }

    pub fn state(&self) -> &BucketState {
        &self.state
    }

    /// Finalized aggregates, in finalization order.
    pub fn aggregates(&self) -> &BoundedRingBuffer<Aggregate> {
        &self.finalized
    }

    #[inline]
    pub fn width_ms(&self) -> u64 {
        self.width_ms.get()
    }

    /// Discard the open bucket and all finalized history.
    pub fn reset(&mut self) {
        self.state = BucketState::Idle;
        self.finalized.clear();
    }
}
