//! The undo/redo edit timeline.
//!
//! History is linear: an ordered list of snapshots plus a cursor.
//! Committing while the cursor is behind the end discards everything
//! after the cursor first, so an undone branch can never be redone once
//! something new is committed.

use crate::mask::Mask;
use crate::service::EditResult;

/// One committed point in the edit history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditSnapshot {
    /// Prompt that produced this point.
    pub prompt: String,
    /// Negative prompt that produced this point.
    pub negative_prompt: String,
    /// What the service returned; absent for the pristine upload.
    pub edit_result: Option<EditResult>,
    /// Mask the edit was restricted to, if any.
    pub mask: Option<Mask>,
}

impl EditSnapshot {
    /// The snapshot representing a fresh upload: empty prompts, no
    /// result, no mask.
    #[must_use]
    pub fn pristine() -> Self {
        Self::default()
    }

    /// Whether this is the first-snapshot shape (no edit result).
    #[must_use]
    pub const fn is_pristine(&self) -> bool {
        self.edit_result.is_none()
    }
}

/// Timeline operations that were refused. None of them mutate history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The timeline has not been initialized.
    #[error("the edit history is empty")]
    Empty,

    /// The cursor is already at the first snapshot.
    #[error("cannot undo")]
    CannotUndo,

    /// The cursor is already at the last snapshot.
    #[error("cannot redo")]
    CannotRedo,

    /// The first snapshot of a timeline may not carry an edit result.
    #[error("the first snapshot must not contain an edit result")]
    NotPristine,
}

/// A linear timeline of [`EditSnapshot`]s with a cursor.
///
/// Invariant: `cursor < snapshots.len()` whenever the timeline is
/// non-empty, and `cursor` is `None` exactly when it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditHistory {
    snapshots: Vec<EditSnapshot>,
    cursor: Option<usize>,
}

impl EditHistory {
    /// An empty timeline.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: None,
        }
    }

    /// Reset to a single pristine snapshot at cursor 0.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotPristine`] if `pristine` carries an
    /// edit result; the timeline is left unchanged.
    pub fn init(&mut self, pristine: EditSnapshot) -> Result<(), HistoryError> {
        if !pristine.is_pristine() {
            return Err(HistoryError::NotPristine);
        }
        self.snapshots = vec![pristine];
        self.cursor = Some(0);
        log::debug!("history: initialized");
        Ok(())
    }

    /// Append `snapshot` after the cursor, discarding any snapshots
    /// beyond it, and move the cursor to the new snapshot.
    ///
    /// Returns the new cursor.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Empty`] if the timeline was never
    /// initialized; nothing is recorded.
    pub fn commit(&mut self, snapshot: EditSnapshot) -> Result<usize, HistoryError> {
        let cursor = self.cursor.ok_or(HistoryError::Empty)?;
        let discarded = self.snapshots.len() - (cursor + 1);
        self.snapshots.truncate(cursor + 1);
        self.snapshots.push(snapshot);
        let cursor = self.snapshots.len() - 1;
        self.cursor = Some(cursor);
        log::debug!("history: committed at {cursor}, discarded {discarded}");
        Ok(cursor)
    }

    /// Step back one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::CannotUndo`] at the first snapshot and
    /// [`HistoryError::Empty`] on an empty timeline.
    pub fn undo(&mut self) -> Result<&EditSnapshot, HistoryError> {
        let cursor = self.cursor.ok_or(HistoryError::Empty)?;
        if cursor == 0 {
            return Err(HistoryError::CannotUndo);
        }
        self.move_to(cursor - 1)
    }

    /// Step forward one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::CannotRedo`] at the last snapshot and
    /// [`HistoryError::Empty`] on an empty timeline.
    pub fn redo(&mut self) -> Result<&EditSnapshot, HistoryError> {
        let cursor = self.cursor.ok_or(HistoryError::Empty)?;
        if cursor + 1 >= self.snapshots.len() {
            return Err(HistoryError::CannotRedo);
        }
        self.move_to(cursor + 1)
    }

    /// Snapshot at the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&EditSnapshot> {
        self.cursor.and_then(|c| self.snapshots.get(c))
    }

    /// Empty the timeline.
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = None;
        log::debug!("history: cleared");
    }

    /// Cursor position; `None` when empty.
    #[must_use]
    pub const fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Number of snapshots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the timeline is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// All snapshots, oldest first.
    #[must_use]
    pub fn snapshots(&self) -> &[EditSnapshot] {
        &self.snapshots
    }

    /// Whether [`Self::undo`] would succeed.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    /// Whether [`Self::redo`] would succeed.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.snapshots.len())
    }

    fn move_to(&mut self, cursor: usize) -> Result<&EditSnapshot, HistoryError> {
        self.cursor = Some(cursor);
        log::debug!("history: cursor at {cursor}");
        self.snapshots.get(cursor).ok_or(HistoryError::Empty)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snap(prompt: &str) -> EditSnapshot {
        EditSnapshot {
            prompt: prompt.to_owned(),
            negative_prompt: String::new(),
            edit_result: Some(EditResult {
                image: None,
                text: Some(format!("result of {prompt}")),
            }),
            mask: None,
        }
    }

    fn prompts(history: &EditHistory) -> Vec<&str> {
        history
            .snapshots()
            .iter()
            .map(|s| s.prompt.as_str())
            .collect()
    }

    fn timeline(commits: &[&str]) -> EditHistory {
        let mut history = EditHistory::new();
        history.init(EditSnapshot::pristine()).unwrap();
        for p in commits {
            history.commit(snap(p)).unwrap();
        }
        history
    }

    #[test]
    fn new_history_is_empty() {
        let history = EditHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.cursor(), None);
        assert_eq!(history.current(), None);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn init_sets_single_pristine_snapshot() {
        let history = timeline(&[]);
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.current(), Some(&EditSnapshot::pristine()));
    }

    #[test]
    fn init_rejects_snapshot_with_result() {
        let mut history = timeline(&["a"]);
        assert_eq!(history.init(snap("x")), Err(HistoryError::NotPristine));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn init_replaces_existing_timeline() {
        let mut history = timeline(&["a", "b"]);
        history.init(EditSnapshot::pristine()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), Some(0));
    }

    #[test]
    fn commit_on_empty_is_rejected_without_mutation() {
        let mut history = EditHistory::new();
        assert_eq!(history.commit(snap("a")), Err(HistoryError::Empty));
        assert!(history.is_empty());
    }

    #[test]
    fn commit_appends_and_moves_cursor() {
        let mut history = timeline(&["a"]);
        assert_eq!(history.commit(snap("b")), Ok(2));
        assert_eq!(prompts(&history), ["", "a", "b"]);
        assert_eq!(history.current().unwrap().prompt, "b");
    }

    #[test]
    fn commit_after_undo_discards_redo_branch() {
        let mut history = timeline(&["B", "C"]);
        assert_eq!(history.cursor(), Some(2));
        history.undo().unwrap();
        assert_eq!(history.cursor(), Some(1));

        history.commit(snap("D")).unwrap();
        assert_eq!(prompts(&history), ["", "B", "D"]);
        assert_eq!(history.cursor(), Some(2));
        assert!(!history.can_redo());
    }

    #[test]
    fn commit_from_start_discards_everything_after() {
        let mut history = timeline(&["a", "b", "c"]);
        history.undo().unwrap();
        history.undo().unwrap();
        history.undo().unwrap();
        history.commit(snap("z")).unwrap();
        assert_eq!(prompts(&history), ["", "z"]);
    }

    #[test]
    fn undo_at_start_reports_and_keeps_state() {
        let mut history = timeline(&[]);
        let before = history.clone();
        assert_eq!(history.undo(), Err(HistoryError::CannotUndo));
        assert_eq!(history, before);
    }

    #[test]
    fn redo_at_end_reports_and_keeps_state() {
        let mut history = timeline(&["a"]);
        let before = history.clone();
        assert_eq!(history.redo(), Err(HistoryError::CannotRedo));
        assert_eq!(history, before);
    }

    #[test]
    fn undo_redo_move_cursor_only() {
        let mut history = timeline(&["a", "b"]);
        let snapshots = history.snapshots().to_vec();

        assert_eq!(history.undo().unwrap().prompt, "a");
        assert_eq!(history.undo().unwrap().prompt, "");
        assert!(history.can_redo());
        assert!(!history.can_undo());
        assert_eq!(history.redo().unwrap().prompt, "a");
        assert_eq!(history.redo().unwrap().prompt, "b");

        assert_eq!(history.snapshots(), snapshots.as_slice());
    }

    #[test]
    fn operations_on_empty_timeline() {
        let mut history = EditHistory::new();
        assert_eq!(history.undo(), Err(HistoryError::Empty));
        assert_eq!(history.redo(), Err(HistoryError::Empty));
    }

    #[test]
    fn clear_empties_timeline() {
        let mut history = timeline(&["a"]);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.cursor(), None);
    }
}
