use aquifer_kernel::Moment;
use std::sync::Arc;

/// A recorded edit together with the moment that reverses it.
///
/// Moments are shared so that cloning a log (when a worktree value is
/// copied) does not copy the edits themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub moment: Arc<Moment>,
    pub inverse: Arc<Moment>,
}

/// Linear edit history of one branch with an undo/redo cursor.
///
/// `cursor` counts how many entries are currently applied, so it ranges over
/// `0..=entries.len()`. Entries past the cursor form the redo future.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MomentLog {
    entries: Vec<LogEntry>,
    cursor: usize,
}

impl MomentLog {
    /// Create an empty log at cursor 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from stored entries. Returns `None` if `cursor` is past the end.
    pub fn from_parts(entries: Vec<LogEntry>, cursor: usize) -> Option<Self> {
        (cursor <= entries.len()).then_some(Self { entries, cursor })
    }

    /// Record an edit, discarding any redo future first.
    pub fn append(&mut self, moment: Moment, inverse: Moment) {
        if self.cursor < self.entries.len() {
            let discarded = self.entries.len() - self.cursor;
            self.entries.truncate(self.cursor);
            tracing::trace!(discarded, "redo history discarded");
        }
        self.entries.push(LogEntry {
            moment: Arc::new(moment),
            inverse: Arc::new(inverse),
        });
        self.cursor += 1;
    }

    /// Step back one entry, returning the moment that reverses it.
    /// `None` at cursor 0.
    pub fn undo(&mut self) -> Option<Arc<Moment>> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(Arc::clone(&self.entries[self.cursor].inverse))
    }

    /// Step forward one entry, returning the moment to re-apply.
    /// `None` when there is no redo future.
    pub fn redo(&mut self) -> Option<Arc<Moment>> {
        let entry = self.entries.get(self.cursor)?;
        let moment = Arc::clone(&entry.moment);
        self.cursor += 1;
        Some(moment)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Number of applied entries.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, including the redo future.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries currently applied, oldest first.
    pub fn applied(&self) -> &[LogEntry] {
        &self.entries[..self.cursor]
    }

    /// The moment `undo()` would reverse, for history labels.
    pub fn next_undo(&self) -> Option<&Moment> {
        self.cursor
            .checked_sub(1)
            .map(|i| self.entries[i].moment.as_ref())
    }

    /// The moment `redo()` would re-apply.
    pub fn next_redo(&self) -> Option<&Moment> {
        self.entries.get(self.cursor).map(|e| e.moment.as_ref())
    }
}
