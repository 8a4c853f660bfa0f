//! Position state machine for stepping through a question sequence.

use crate::answer_store::AnswerStore;
use crate::model::Question;

/// Outcome of a forward step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The current answer is incomplete; nothing changed.
    Blocked,
    /// Moved to the given position.
    Moved(usize),
    /// The last question is complete; the caller should submit.
    Submit,
}

/// Segment state for a progress indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressBar {
    pub total: usize,
    pub current: usize,
    /// `segments[i]` is lit for every position up to and including `current`.
    pub segments: Vec<bool>,
}

/// Tracks the current position over `[0, len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    position: usize,
    len: usize,
}

impl Navigator {
    /// Navigator for a fresh attempt, starting at position 0.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { position: 0, len }
    }

    /// Navigator for a resumed attempt; `position` is clamped to the sequence.
    #[must_use]
    pub fn resume_at(len: usize, position: usize) -> Self {
        Self {
            position: position.min(len.saturating_sub(1)),
            len,
        }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.len > 0 && self.position + 1 == self.len
    }

    #[must_use]
    pub fn can_advance(&self, store: &AnswerStore, questions: &[Question]) -> bool {
        store.is_complete(self.position, questions)
    }

    #[must_use]
    pub fn can_retreat(&self) -> bool {
        self.position > 0
    }

    /// Step forward if the current answer is complete.
    ///
    /// On the last position a complete answer yields `Advance::Submit` and the
    /// position stays put.
    pub fn advance(&mut self, store: &AnswerStore, questions: &[Question]) -> Advance {
        if !self.can_advance(store, questions) {
            return Advance::Blocked;
        }
        if self.is_last() {
            return Advance::Submit;
        }
        self.position += 1;
        Advance::Moved(self.position)
    }

    /// Step back one position. Answers are left as they are.
    pub fn retreat(&mut self) -> bool {
        if !self.can_retreat() {
            return false;
        }
        self.position -= 1;
        true
    }

    /// Move toward `target` one step at a time.
    ///
    /// Forward steps obey the same guard as `advance` and stop at the first
    /// incomplete position; a jump never triggers submission. Returns the
    /// position reached.
    pub fn jump_to(&mut self, target: usize, store: &AnswerStore, questions: &[Question]) -> usize {
        let target = target.min(self.len.saturating_sub(1));
        while self.position > target {
            self.retreat();
        }
        while self.position < target {
            if !matches!(self.advance(store, questions), Advance::Moved(_)) {
                break;
            }
        }
        self.position
    }

    #[must_use]
    pub fn progress_bar(&self) -> ProgressBar {
        ProgressBar {
            total: self.len,
            current: self.position,
            segments: (0..self.len).map(|idx| idx <= self.position).collect(),
        }
    }
}
