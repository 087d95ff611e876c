//! Batch cursor for sequential paginated reads

/// Default fetch batch size
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Offset/limit cursor over a table read in fixed-size batches
///
/// The read is complete after an empty batch or a batch shorter than the
/// batch size.
///
/// # Examples
/// ```
/// use efq_common::db::BatchCursor;
///
/// let mut cursor = BatchCursor::new(1000);
/// assert_eq!(cursor.offset(), 0);
///
/// assert!(cursor.advance(1000));   // full batch: keep going
/// assert_eq!(cursor.offset(), 1000);
///
/// assert!(!cursor.advance(250));   // short batch: done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCursor {
    offset: usize,
    batch_size: usize,
}

impl BatchCursor {
    /// A batch size of 0 is clamped to 1
    pub fn new(batch_size: usize) -> Self {
        Self {
            offset: 0,
            batch_size: batch_size.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Record a fetched batch of `fetched` rows
    ///
    /// Returns `true` if another batch should be requested.
    pub fn advance(&mut self, fetched: usize) -> bool {
        if fetched == 0 || fetched < self.batch_size {
            return false;
        }
        self.offset += fetched;
        true
    }
}

impl Default for BatchCursor {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
