//! Block partitioning of one grid axis across a fixed set of workers.

use crate::error::DecompositionError;

/// One worker's contiguous share of the decomposition axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Partition {
    /// The decomposed axis.
    pub axis: usize,
    /// First owned index along `axis`.
    pub start: usize,
    /// Number of owned samples along `axis`.
    pub count: usize,
}

impl Partition {
    /// One past the last owned index.
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    /// Whether this worker owns nothing (more workers than samples).
    pub fn is_degenerate(&self) -> bool {
        self.count == 0
    }
}

/// Splits an axis of `extent` samples into `worker_count` slabs.
///
/// Slab sizes differ by at most one; the remainder goes to the
/// lowest-ranked workers:
///
/// ```text
/// base  = extent / W,  rem = extent % W
/// count = base + (index < rem)
/// start = index * base + min(index, rem)
/// ```
///
/// # Examples
///
/// ```
/// use divcurl_decomp::DomainDecomposer;
///
/// let d = DomainDecomposer::new(3).unwrap();
/// let counts: Vec<_> = d.partitions(2, 10).iter().map(|p| p.count).collect();
/// assert_eq!(counts, [4, 3, 3]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomainDecomposer {
    worker_count: usize,
}

impl DomainDecomposer {
    /// Create a decomposer for `worker_count` workers.
    pub fn new(worker_count: usize) -> Result<Self, DecompositionError> {
        if worker_count == 0 {
            return Err(DecompositionError::NoWorkers);
        }
        Ok(Self { worker_count })
    }

    /// Number of workers sharing the axis.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The slab owned by `worker_index` along `axis`.
    pub fn partition(
        &self,
        axis: usize,
        extent: usize,
        worker_index: usize,
    ) -> Result<Partition, DecompositionError> {
        if worker_index >= self.worker_count {
            return Err(DecompositionError::WorkerOutOfRange {
                index: worker_index,
                count: self.worker_count,
            });
        }
        let base = extent / self.worker_count;
        let rem = extent % self.worker_count;
        let count = base + usize::from(worker_index < rem);
        let start = worker_index * base + worker_index.min(rem);
        Ok(Partition { axis, start, count })
    }

    /// Slabs for every worker, in rank order.
    pub fn partitions(&self, axis: usize, extent: usize) -> Vec<Partition> {
        let base = extent / self.worker_count;
        let rem = extent % self.worker_count;
        let mut out = Vec::with_capacity(self.worker_count);
        let mut cursor = 0usize;
        for rank in 0..self.worker_count {
            let count = base + usize::from(rank < rem);
            out.push(Partition {
                axis,
                start: cursor,
                count,
            });
            cursor += count;
        }
        out
    }
}

/// The slab owned by `worker_index` when `extent` samples along `axis`
/// are shared by `worker_count` workers.
pub fn decompose(
    axis: usize,
    extent: usize,
    worker_count: usize,
    worker_index: usize,
) -> Result<Partition, DecompositionError> {
    DomainDecomposer::new(worker_count)?.partition(axis, extent, worker_index)
}

/// Every worker's slab, in rank order.
pub fn decompose_all(
    axis: usize,
    extent: usize,
    worker_count: usize,
) -> Result<Vec<Partition>, DecompositionError> {
    Ok(DomainDecomposer::new(worker_count)?.partitions(axis, extent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_workers_rejected() {
        assert_eq!(DomainDecomposer::new(0), Err(DecompositionError::NoWorkers));
    }

    #[test]
    fn worker_index_must_be_in_range() {
        let d = DomainDecomposer::new(4).unwrap();
        assert_eq!(
            d.partition(2, 16, 4),
            Err(DecompositionError::WorkerOutOfRange { index: 4, count: 4 })
        );
    }

    #[test]
    fn even_split() {
        let d = DomainDecomposer::new(2).unwrap();
        assert_eq!(
            d.partition(2, 8, 0).unwrap(),
            Partition { axis: 2, start: 0, count: 4 }
        );
        assert_eq!(
            d.partition(2, 8, 1).unwrap(),
            Partition { axis: 2, start: 4, count: 4 }
        );
    }

    #[test]
    fn remainder_goes_to_lowest_ranks() {
        let d = DomainDecomposer::new(4).unwrap();
        let parts = d.partitions(0, 10);
        let counts: Vec<_> = parts.iter().map(|p| p.count).collect();
        let starts: Vec<_> = parts.iter().map(|p| p.start).collect();
        assert_eq!(counts, [3, 3, 2, 2]);
        assert_eq!(starts, [0, 3, 6, 8]);
    }

    #[test]
    fn more_workers_than_samples_degenerates() {
        let d = DomainDecomposer::new(5).unwrap();
        let parts = d.partitions(2, 3);
        assert!(!parts[2].is_degenerate());
        assert!(parts[3].is_degenerate());
        assert!(parts[4].is_degenerate());
        assert_eq!(parts[4].start, 3);
    }

    #[test]
    fn free_functions_match_decomposer() {
        assert_eq!(
            decompose(2, 8, 2, 1).unwrap(),
            Partition { axis: 2, start: 4, count: 4 }
        );
        assert_eq!(decompose(2, 8, 0, 0), Err(DecompositionError::NoWorkers));
        assert_eq!(
            decompose_all(1, 7, 3).unwrap(),
            DomainDecomposer::new(3).unwrap().partitions(1, 7)
        );
    }

    proptest! {
        #[test]
        fn partitions_cover_axis_exactly(extent in 0usize..500, workers in 1usize..64) {
            let d = DomainDecomposer::new(workers).unwrap();
            let parts = d.partitions(2, extent);
            prop_assert_eq!(parts.len(), workers);

            let mut cursor = 0;
            for (rank, p) in parts.iter().enumerate() {
                // Contiguous and non-overlapping.
                prop_assert_eq!(p.start, cursor);
                cursor = p.end();
                // Single-worker query agrees with the bulk computation.
                prop_assert_eq!(d.partition(2, extent, rank).unwrap(), *p);
            }
            prop_assert_eq!(cursor, extent);

            let max = parts.iter().map(|p| p.count).max().unwrap();
            let min = parts.iter().map(|p| p.count).min().unwrap();
            prop_assert!(max - min <= 1);
        }
    }
}
