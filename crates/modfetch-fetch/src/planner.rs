//! C4 — partitions `[0, size)` into non-overlapping, contiguous, inclusive
//! byte ranges. Pure and idempotent (spec 4.4, spec 8's "Coverage" and
//! "Replanning" properties): identical inputs always yield identical
//! output, with no I/O and no hidden state.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlannedRange {
    pub idx: u32,
    pub start: u64,
    /// Inclusive, matching spec 3's `Chunk` row (`end = start+size-1`).
    pub end: u64,
}

impl PlannedRange {
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Plan {
    /// Server supports ranges and size is known: N ranges for the Chunk
    /// Worker Pool.
    Ranged(Vec<PlannedRange>),
    /// No range support, unknown size, or a governor-forced demotion: one
    /// whole-file stream for the Single-Stream Fallback.
    SingleStream,
}

/// Plan chunk ranges for a file of `size` bytes (`None` if unknown).
///
/// `chunk_size` is the target size of each range; `per_file_chunks` caps
/// how many ranges are ever produced, matching the Chunk Worker Pool's
/// own concurrency ceiling — planning more chunks than could ever run
/// concurrently buys nothing. The last chunk absorbs any remainder left
/// by integer division (spec 4.4's tie-break rule).
pub fn plan(size: Option<u64>, accept_ranges: bool, chunk_size: u64, per_file_chunks: u32) -> Plan {
    let (Some(size), true) = (size, accept_ranges) else {
        return Plan::SingleStream;
    };

    if size == 0 {
        return Plan::Ranged(Vec::new());
    }

    let chunk_size = chunk_size.max(1);
    let ideal_chunks = size.div_ceil(chunk_size);
    let n = ideal_chunks.min(per_file_chunks.max(1) as u64).max(1);

    let mut ranges = Vec::with_capacity(n as usize);
    let mut start = 0u64;
    for idx in 0..n {
        let end = if idx + 1 == n {
            size - 1
        } else {
            (start + chunk_size - 1).min(size - 1)
        };
        ranges.push(PlannedRange {
            idx: idx as u32,
            start,
            end,
        });
        start = end + 1;
    }

    Plan::Ranged(ranges)
}
