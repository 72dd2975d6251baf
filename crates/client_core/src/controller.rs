//! Note synchronization state machine.
//!
//! Every mutating operation applies its effect to the local view first and
//! then dispatches the matching backend call as an independent task. Backend
//! failures are logged and never rolled back.

use std::{fmt, future::Future, str::FromStr, sync::Arc};

use anyhow::Result;
use shared::domain::{ClientId, Note, NoteId};
use tokio::{sync::watch, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::{
    error::{MutationKind, SyncError},
    NoteMutationService, NoteQueryService,
};

const VALIDATION_MESSAGE: &str = "please enter a name and description";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Name,
    Description,
}

impl DraftField {
    pub fn as_str(self) -> &'static str {
        match self {
            DraftField::Name => "name",
            DraftField::Description => "description",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DraftField {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(DraftField::Name),
            "description" | "desc" => Ok(DraftField::Description),
            other => Err(SyncError::Validation(format!("unknown draft field: {other}"))),
        }
    }
}

/// Unsaved note-creation input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftForm {
    pub name: String,
    pub description: String,
}

impl DraftForm {
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.description.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Ready,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub notes: Vec<Note>,
    pub loading: bool,
    pub error: bool,
    pub draft: DraftForm,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            loading: true,
            error: false,
            draft: DraftForm::default(),
        }
    }
}

impl ViewState {
    pub fn phase(&self) -> SessionPhase {
        if self.error {
            SessionPhase::Errored
        } else if self.loading {
            SessionPhase::Loading
        } else {
            SessionPhase::Ready
        }
    }

    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| &note.id == id)
    }

    fn position(&self, id: &NoteId) -> Option<usize> {
        self.notes.iter().position(|note| &note.id == id)
    }
}

pub struct NoteSyncController {
    client_id: ClientId,
    state: ViewState,
    mutations: Arc<dyn NoteMutationService>,
    in_flight: JoinSet<()>,
    snapshots: watch::Sender<ViewState>,
}

impl NoteSyncController {
    pub fn new(client_id: ClientId, mutations: Arc<dyn NoteMutationService>) -> Self {
        let state = ViewState::default();
        let (snapshots, _) = watch::channel(state.clone());
        Self {
            client_id,
            state,
            mutations,
            in_flight: JoinSet::new(),
            snapshots,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<ViewState> {
        self.snapshots.subscribe()
    }

    /// Number of backend requests dispatched and not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub async fn initialize(&mut self, query: &dyn NoteQueryService) {
        let result = query.fetch_all().await;
        self.apply_fetch_result(result);
    }

    pub fn apply_fetch_result(&mut self, result: Result<Vec<Note>>) {
        match result {
            Ok(notes) => {
                info!(count = notes.len(), "notes loaded");
                self.state.notes = notes;
                self.state.loading = false;
            }
            Err(err) => {
                let err = SyncError::Fetch(format!("{err:#}"));
                error!("{err}");
                self.state.loading = false;
                self.state.error = true;
            }
        }
        self.publish();
    }

    pub fn update_draft_field(&mut self, field: DraftField, value: impl Into<String>) {
        let value = value.into();
        match field {
            DraftField::Name => self.state.draft.name = value,
            DraftField::Description => self.state.draft.description = value,
        }
        self.publish();
    }

    /// Turns the draft into a note, shows it immediately and sends the create
    /// request in the background.
    pub fn submit_draft(&mut self) -> Result<NoteId, SyncError> {
        if !self.state.draft.is_complete() {
            return Err(SyncError::Validation(VALIDATION_MESSAGE.to_string()));
        }

        let draft = std::mem::take(&mut self.state.draft);
        let note = Note::draft(self.client_id.clone(), draft.name, draft.description);
        let id = note.id.clone();
        self.state.notes.insert(0, note.clone());
        self.publish();

        let mutations = Arc::clone(&self.mutations);
        self.dispatch(MutationKind::Create, id.clone(), async move {
            mutations.create(&note).await
        });
        Ok(id)
    }

    /// Returns whether a note was removed. Unknown ids are ignored.
    pub fn request_delete(&mut self, id: &NoteId) -> bool {
        let Some(index) = self.state.position(id) else {
            debug!(note_id = %id, "delete ignored: note not in view");
            return false;
        };
        self.state.notes.remove(index);
        self.publish();

        let mutations = Arc::clone(&self.mutations);
        let target = id.clone();
        self.dispatch(MutationKind::Delete, id.clone(), async move {
            mutations.delete(&target).await
        });
        true
    }

    /// Flips the note's completion flag and returns the new value.
    pub fn request_toggle_complete(&mut self, id: &NoteId) -> Option<bool> {
        let Some(index) = self.state.position(id) else {
            debug!(note_id = %id, "toggle ignored: note not in view");
            return None;
        };
        let note = &mut self.state.notes[index];
        note.completed = !note.completed;
        let completed = note.completed;
        self.publish();

        let mutations = Arc::clone(&self.mutations);
        let target = id.clone();
        self.dispatch(MutationKind::Update, id.clone(), async move {
            mutations.update_completed(&target, completed).await
        });
        Some(completed)
    }

    /// Applies a creation event from the live feed. Returns whether the view
    /// changed.
    pub fn on_remote_note_created(&mut self, note: Note) -> bool {
        if note.originated_by(&self.client_id) {
            debug!(note_id = %note.id, "ignoring self-originated note event");
            return false;
        }
        if self.state.position(&note.id).is_some() {
            debug!(note_id = %note.id, "ignoring note event for a note already in view");
            return false;
        }
        info!(note_id = %note.id, "remote note created");
        self.state.notes.insert(0, note);
        self.publish();
        true
    }

    /// Waits for every dispatched backend request to finish.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(err) = joined {
                warn!("backend request task ended abnormally: {err}");
            }
        }
    }

    fn dispatch<F>(&mut self, operation: MutationKind, note_id: NoteId, request: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        while let Some(joined) = self.in_flight.try_join_next() {
            if let Err(err) = joined {
                warn!("backend request task ended abnormally: {err}");
            }
        }

        self.in_flight.spawn(async move {
            match request.await {
                Ok(()) => info!(
                    operation = operation.as_str(),
                    note_id = %note_id,
                    "{}",
                    operation.acknowledgement()
                ),
                Err(err) => {
                    let err = SyncError::Mutation {
                        operation,
                        note_id,
                        message: format!("{err:#}"),
                    };
                    warn!("{err}");
                }
            }
        });
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.state.clone());
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
