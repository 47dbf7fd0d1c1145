//! Row and batch types returned by the queue.

/// Identifier assigned by storage on insert. Strictly increasing.
pub type RowId = i64;

/// A raw row as stored: id plus the undecoded payload blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPayload {
    pub id: RowId,
    pub payload: Vec<u8>,
}

/// A decoded payload paired with the id it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPayload<P> {
    pub id: RowId,
    pub payload: P,
}

/// Oldest-first rows read for one delivery attempt.
///
/// Rows whose blob could not be decoded are not in `entries`; their ids are
/// listed in `skipped` so a range acknowledgement can still cover them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<P> {
    pub entries: Vec<QueuedPayload<P>>,
    pub skipped: Vec<RowId>,
}

impl<P> Batch<P> {
    /// An empty batch.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// True when no rows at all were read.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.skipped.is_empty()
    }

    /// Number of decoded entries. Skipped rows are not counted.
    pub fn decoded_len(&self) -> usize {
        self.entries.len()
    }

    /// Inclusive id bounds over every row read, decoded or skipped.
    ///
    /// Returns None for an empty batch.
    pub fn id_range(&self) -> Option<(RowId, RowId)> {
        self.entries
            .iter()
            .map(|entry| entry.id)
            .chain(self.skipped.iter().copied())
            .fold(None, |bounds, id| match bounds {
                None => Some((id, id)),
                Some((min, max)) => Some((min.min(id), max.max(id))),
            })
    }

    /// Iterate decoded payloads in id order.
    pub fn payloads(&self) -> impl Iterator<Item = &P> {
        self.entries.iter().map(|entry| &entry.payload)
    }
}

impl<P> Default for Batch<P> {
    fn default() -> Self {
        Self::empty()
    }
}
