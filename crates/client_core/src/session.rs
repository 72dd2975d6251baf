//! Event loop that serializes presentation intents and live feed events onto
//! one `NoteSyncController`.

use shared::domain::{ClientId, Note, NoteId};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

use crate::{
    controller::{DraftField, NoteSyncController, ViewState},
    error::SyncError,
    Backend, FeedSubscription,
};

const INTENT_QUEUE_DEPTH: usize = 256;
const EVENT_QUEUE_DEPTH: usize = 64;

/// User intents forwarded by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    UpdateDraftField { field: DraftField, value: String },
    SubmitDraft,
    Delete { id: NoteId },
    ToggleComplete { id: NoteId },
    Shutdown,
}

/// Notices that are not part of the view state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ValidationFailed(String),
    LiveFeedClosed,
}

/// Presentation-side end of a session.
#[derive(Clone)]
pub struct SessionHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<ViewState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Queues an intent. Returns false once the session has ended.
    pub async fn send(&self, intent: Intent) -> bool {
        self.intents.send(intent).await.is_ok()
    }

    pub fn snapshots(&self) -> watch::Receiver<ViewState> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> ViewState {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

pub struct NoteSession {
    controller: NoteSyncController,
    backend: Backend,
    intents: mpsc::Receiver<Intent>,
    events: broadcast::Sender<SessionEvent>,
}

impl NoteSession {
    pub fn new(client_id: ClientId, backend: Backend) -> (Self, SessionHandle) {
        let controller = NoteSyncController::new(client_id, backend.mutations.clone());
        let (intent_tx, intent_rx) = mpsc::channel(INTENT_QUEUE_DEPTH);
        let (events, _) = broadcast::channel(EVENT_QUEUE_DEPTH);
        let handle = SessionHandle {
            intents: intent_tx,
            snapshots: controller.subscribe_snapshots(),
            events: events.clone(),
        };
        (
            Self {
                controller,
                backend,
                intents: intent_rx,
                events,
            },
            handle,
        )
    }

    /// Runs until a `Shutdown` intent arrives or every handle is dropped, then
    /// unsubscribes from the feed, waits for in-flight requests and returns the
    /// final view state.
    pub async fn run(mut self) -> ViewState {
        info!(client_id = %self.controller.client_id(), "note session starting");

        let mut feed = match self.backend.feed.subscribe().await {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                warn!("live feed unavailable; continuing without remote updates: {err:#}");
                None
            }
        };

        self.controller.initialize(self.backend.query.as_ref()).await;

        loop {
            tokio::select! {
                intent = self.intents.recv() => {
                    match intent {
                        Some(Intent::Shutdown) | None => break,
                        Some(intent) => self.handle_intent(intent),
                    }
                }
                remote = next_remote(&mut feed), if feed.is_some() => {
                    match remote {
                        Some(note) => {
                            self.controller.on_remote_note_created(note);
                        }
                        None => {
                            warn!("live feed closed");
                            feed = None;
                            let _ = self.events.send(SessionEvent::LiveFeedClosed);
                        }
                    }
                }
            }
        }

        if let Some(subscription) = feed.take() {
            subscription.unsubscribe().await;
        }
        self.controller.settle().await;
        info!("note session ended");
        self.controller.state().clone()
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::UpdateDraftField { field, value } => {
                self.controller.update_draft_field(field, value);
            }
            Intent::SubmitDraft => {
                if let Err(err) = self.controller.submit_draft() {
                    self.report(err);
                }
            }
            Intent::Delete { id } => {
                self.controller.request_delete(&id);
            }
            Intent::ToggleComplete { id } => {
                self.controller.request_toggle_complete(&id);
            }
            Intent::Shutdown => {}
        }
    }

    fn report(&self, err: SyncError) {
        if let SyncError::Validation(message) = err {
            let _ = self.events.send(SessionEvent::ValidationFailed(message));
        } else {
            warn!("{err}");
        }
    }
}

async fn next_remote(feed: &mut Option<FeedSubscription>) -> Option<Note> {
    match feed {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
