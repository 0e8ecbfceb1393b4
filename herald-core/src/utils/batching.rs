//! Partitioning of a broadcast's eligible recipients into delivery batches.

/// Lists up to this size are delivered as a single batch.
const SINGLE_BATCH_THRESHOLD: usize = 100;
const MIN_BATCH_SIZE: usize = 100;
const MAX_BATCH_SIZE: usize = 1000;

/// Batch size for `total` recipients: everyone in one batch up to the
/// threshold, otherwise a tenth of the list clamped to `100..=1000`.
pub fn batch_size(total: usize) -> usize {
    if total <= SINGLE_BATCH_THRESHOLD {
        total.max(1)
    } else {
        (total / 10).clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
    }
}

/// Split `recipients` into consecutive slices of [`batch_size`].
pub fn partition<T>(recipients: &[T]) -> Vec<&[T]> {
    if recipients.is_empty() {
        return Vec::new();
    }
    recipients.chunks(batch_size(recipients.len())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_small_list_is_one_batch() {
        let recipients: Vec<u32> = (0..100).collect();
        let batches = partition(&recipients);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 100);
    }

    #[test]
    fn test_250_recipients() {
        let recipients: Vec<u32> = (0..250).collect();
        let sizes: Vec<usize> = partition(&recipients).iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn test_size_bounds() {
        assert_eq!(batch_size(101), 100);
        assert_eq!(batch_size(5_000), 500);
        assert_eq!(batch_size(10_000), 1000);
        assert_eq!(batch_size(1_000_000), 1000);
    }

    #[test]
    fn test_empty_list() {
        let recipients: Vec<u32> = Vec::new();
        assert!(partition(&recipients).is_empty());
    }

    #[test]
    fn test_partition_covers_every_recipient_once() {
        for total in [1usize, 99, 100, 101, 999, 1_001, 12_345, 25_000] {
            let recipients: Vec<usize> = (0..total).collect();
            let batches = partition(&recipients);

            let mut seen = HashSet::new();
            let mut count = 0;
            for batch in &batches {
                if total > SINGLE_BATCH_THRESHOLD {
                    // Every batch but the trailing remainder is full-sized.
                    assert!(batch.len() <= MAX_BATCH_SIZE);
                }
                for r in batch.iter() {
                    assert!(seen.insert(*r), "duplicate recipient {r}");
                    count += 1;
                }
            }
            assert_eq!(count, total);
            let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
            let full = batch_size(total);
            for size in &sizes[..sizes.len() - 1] {
                assert_eq!(*size, full);
                if total > SINGLE_BATCH_THRESHOLD {
                    assert!((MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(size));
                }
            }
        }
    }
}
