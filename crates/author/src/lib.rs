//! Authoring history: the cursor-addressed moment log behind undo/redo.
//!
//! # Invariants
//! - Applying the forward moments of entries `[0, cursor)` to the branch's base
//!   model reproduces the branch's current model.
//! - A fresh edit discards every entry past the cursor.

pub mod moment_log;

pub use moment_log::{LogEntry, MomentLog};
