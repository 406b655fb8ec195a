use serde::Serialize;

/// Lifecycle of one editable cell.
///
/// ```text
///  Clean ──edit──► Dirty ──begin_save──► Saving ──ok──► Saved ──settle──► Clean
///    ▲               │                     │
///    └────undo───────┘                     └──err──► Errored ──edit/begin_save──► ...
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    #[default]
    Clean,
    Dirty,
    Saving,
    Saved,
    Errored,
}

/// A save the caller must perform. Hand `generation` back to
/// [`EditSession::complete`] with the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket<T> {
    pub generation: u64,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    /// Stored. `follow_up` carries the next save when the draft changed
    /// while the request was in flight.
    Saved { follow_up: Option<SaveTicket<T>> },
    /// Rejected; the committed value is unchanged and the draft is kept.
    Failed,
    /// Belongs to a save that was replaced or reset; ignored.
    Superseded,
}

/// Draft/committed pair for one field of one row.
///
/// At most one save is in flight. Repeated save triggers for the same draft
/// (debounce timer plus blur) collapse into one request.
#[derive(Debug, Clone)]
pub struct EditSession<T> {
    committed: T,
    draft: T,
    state: EditState,
    generation: u64,
    in_flight: Option<SaveTicket<T>>,
    error: Option<String>,
}

impl<T: Clone + PartialEq> EditSession<T> {
    pub fn new(committed: T) -> Self {
        Self {
            draft: committed.clone(),
            committed,
            state: EditState::Clean,
            generation: 0,
            in_flight: None,
            error: None,
        }
    }

    /// Last value the server accepted
    pub fn committed(&self) -> &T {
        &self.committed
    }

    /// Value currently in the input
    pub fn draft(&self) -> &T {
        &self.draft
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.committed
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// User changed the input.
    pub fn edit(&mut self, value: T) {
        self.draft = value;
        if self.in_flight.is_some() {
            return;
        }
        self.state = if self.is_dirty() {
            EditState::Dirty
        } else {
            EditState::Clean
        };
    }

    /// Start a save of the current draft.
    ///
    /// Returns None when nothing needs saving or a save is already in
    /// flight; in the latter case [`complete`](Self::complete) issues the
    /// follow-up if the draft moved on.
    pub fn begin_save(&mut self) -> Option<SaveTicket<T>> {
        if self.in_flight.is_some() {
            return None;
        }
        if !self.is_dirty() {
            if self.state == EditState::Dirty {
                self.state = EditState::Clean;
            }
            return None;
        }

        self.generation += 1;
        let ticket = SaveTicket {
            generation: self.generation,
            value: self.draft.clone(),
        };
        self.in_flight = Some(ticket.clone());
        self.state = EditState::Saving;
        self.error = None;
        Some(ticket)
    }

    /// Apply the outcome of the save identified by `generation`.
    ///
    /// `Ok(Some(v))` commits the value echoed by the server, `Ok(None)` the
    /// submitted one.
    pub fn complete(
        &mut self,
        generation: u64,
        outcome: std::result::Result<Option<T>, String>,
    ) -> Completion<T> {
        let submitted = match self.in_flight.take() {
            Some(ticket) if ticket.generation == generation => ticket.value,
            other => {
                self.in_flight = other;
                return Completion::Superseded;
            }
        };

        match outcome {
            Ok(echoed) => {
                let stored = echoed.unwrap_or_else(|| submitted.clone());
                if self.draft == submitted {
                    self.draft = stored.clone();
                }
                self.committed = stored;

                if self.is_dirty() {
                    self.state = EditState::Dirty;
                    Completion::Saved {
                        follow_up: self.begin_save(),
                    }
                } else {
                    self.state = EditState::Saved;
                    Completion::Saved { follow_up: None }
                }
            }
            Err(message) => {
                self.state = EditState::Errored;
                self.error = Some(message);
                Completion::Failed
            }
        }
    }

    /// Revert the draft to the committed value.
    pub fn undo(&mut self) {
        self.draft = self.committed.clone();
        self.error = None;
        if self.in_flight.is_none() {
            self.state = EditState::Clean;
        }
    }

    /// Saved flash is over.
    pub fn settle(&mut self) {
        if self.state == EditState::Saved {
            self.state = EditState::Clean;
        }
    }

    /// Replace with a freshly loaded value. Completions of earlier saves
    /// become [`Completion::Superseded`].
    pub fn reset(&mut self, committed: T) {
        self.generation += 1;
        self.in_flight = None;
        self.draft = committed.clone();
        self.committed = committed;
        self.state = EditState::Clean;
        self.error = None;
    }
}
