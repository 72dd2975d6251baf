use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{Note, NoteId};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::debug;

pub mod controller;
pub mod error;
pub mod graphql;
pub mod session;

pub use controller::{DraftField, DraftForm, NoteSyncController, SessionPhase, ViewState};
pub use error::{MutationKind, SyncError};
pub use graphql::{GraphqlEndpoints, GraphqlNotesClient};
pub use session::{Intent, NoteSession, SessionEvent, SessionHandle};

/// Request/response reads of the full note list.
#[async_trait]
pub trait NoteQueryService: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Note>>;
}

/// Request/response writes. Only success or failure is consumed.
#[async_trait]
pub trait NoteMutationService: Send + Sync {
    async fn create(&self, note: &Note) -> Result<()>;
    async fn delete(&self, id: &NoteId) -> Result<()>;
    async fn update_completed(&self, id: &NoteId, completed: bool) -> Result<()>;
}

/// Server-push stream of note creation events, including this client's own.
#[async_trait]
pub trait NoteEventFeed: Send + Sync {
    async fn subscribe(&self) -> Result<FeedSubscription>;
}

/// The three backend collaborators a session talks to.
#[derive(Clone)]
pub struct Backend {
    pub query: Arc<dyn NoteQueryService>,
    pub mutations: Arc<dyn NoteMutationService>,
    pub feed: Arc<dyn NoteEventFeed>,
}

impl Backend {
    pub fn new(
        query: Arc<dyn NoteQueryService>,
        mutations: Arc<dyn NoteMutationService>,
        feed: Arc<dyn NoteEventFeed>,
    ) -> Self {
        Self {
            query,
            mutations,
            feed,
        }
    }

    /// Uses one service object for all three roles.
    pub fn shared<T>(service: Arc<T>) -> Self
    where
        T: NoteQueryService + NoteMutationService + NoteEventFeed + 'static,
    {
        Self {
            query: service.clone(),
            mutations: service.clone(),
            feed: service,
        }
    }
}

/// A live feed subscription.
///
/// Dropping the subscription signals its reader task to stop; `unsubscribe`
/// additionally waits for the reader to finish its teardown.
pub struct FeedSubscription {
    events: mpsc::Receiver<Note>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    pub fn new(
        events: mpsc::Receiver<Note>,
        stop: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            stop: Some(stop),
            task: Some(task),
        }
    }

    /// A subscription with no reader task behind it; the feed ends when every
    /// sender of `events` is dropped.
    pub fn from_receiver(events: mpsc::Receiver<Note>) -> Self {
        Self {
            events,
            stop: None,
            task: None,
        }
    }

    pub async fn next(&mut self) -> Option<Note> {
        self.events.recv().await
    }

    pub async fn unsubscribe(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.events.close();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                debug!("feed reader ended abnormally during unsubscribe: {err}");
            }
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
