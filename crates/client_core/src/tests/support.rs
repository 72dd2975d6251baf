use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{ClientId, Note, NoteId};
use tokio::sync::{mpsc, oneshot};

use crate::{FeedSubscription, NoteEventFeed, NoteMutationService, NoteQueryService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordedMutation {
    Create(Note),
    Delete(NoteId),
    Update { id: NoteId, completed: bool },
}

pub(crate) fn note(id: &str, name: &str, description: &str, completed: bool) -> Note {
    Note {
        id: NoteId::from(id),
        name: name.to_string(),
        description: description.to_string(),
        completed,
        client_id: None,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn note_from(id: &str, client_id: &ClientId) -> Note {
    let mut note = note(id, "remote", "from elsewhere", false);
    note.client_id = Some(client_id.clone());
    note
}

/// In-memory stand-in for the query, mutation and feed services.
pub(crate) struct FakeBackend {
    notes: Vec<Note>,
    fetch_error: Option<String>,
    mutation_error: Option<String>,
    feed_error: Option<String>,
    recorded: Mutex<Vec<RecordedMutation>>,
    feed: Mutex<Option<mpsc::Receiver<Note>>>,
    feed_sender: Mutex<Option<mpsc::Sender<Note>>>,
    unsubscribed: Arc<AtomicBool>,
}

impl FakeBackend {
    pub(crate) fn with_notes(notes: Vec<Note>) -> Self {
        let (feed_tx, feed_rx) = mpsc::channel(16);
        Self {
            notes,
            fetch_error: None,
            mutation_error: None,
            feed_error: None,
            recorded: Mutex::new(Vec::new()),
            feed: Mutex::new(Some(feed_rx)),
            feed_sender: Mutex::new(Some(feed_tx)),
            unsubscribed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn failing_fetch(err: impl Into<String>) -> Self {
        let mut backend = Self::with_notes(Vec::new());
        backend.fetch_error = Some(err.into());
        backend
    }

    pub(crate) fn with_mutation_error(mut self, err: impl Into<String>) -> Self {
        self.mutation_error = Some(err.into());
        self
    }

    pub(crate) fn with_feed_error(mut self, err: impl Into<String>) -> Self {
        self.feed_error = Some(err.into());
        self
    }

    /// Hands out the sender that plays the backend side of the live feed.
    /// Without this the feed stays open and silent.
    pub(crate) fn with_feed(self) -> (Self, mpsc::Sender<Note>) {
        let tx = self
            .feed_sender
            .lock()
            .expect("feed lock")
            .take()
            .expect("feed sender already taken");
        (self, tx)
    }

    pub(crate) fn recorded(&self) -> Vec<RecordedMutation> {
        self.recorded.lock().expect("recorded lock").clone()
    }

    pub(crate) fn unsubscribed(&self) -> bool {
        self.unsubscribed.load(Ordering::SeqCst)
    }

    fn record(&self, mutation: RecordedMutation) -> Result<()> {
        self.recorded.lock().expect("recorded lock").push(mutation);
        match &self.mutation_error {
            Some(err) => Err(anyhow!(err.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NoteQueryService for FakeBackend {
    async fn fetch_all(&self) -> Result<Vec<Note>> {
        if let Some(err) = &self.fetch_error {
            return Err(anyhow!(err.clone()));
        }
        Ok(self.notes.clone())
    }
}

#[async_trait]
impl NoteMutationService for FakeBackend {
    async fn create(&self, note: &Note) -> Result<()> {
        self.record(RecordedMutation::Create(note.clone()))
    }

    async fn delete(&self, id: &NoteId) -> Result<()> {
        self.record(RecordedMutation::Delete(id.clone()))
    }

    async fn update_completed(&self, id: &NoteId, completed: bool) -> Result<()> {
        self.record(RecordedMutation::Update {
            id: id.clone(),
            completed,
        })
    }
}

#[async_trait]
impl NoteEventFeed for FakeBackend {
    async fn subscribe(&self) -> Result<FeedSubscription> {
        if let Some(err) = &self.feed_error {
            return Err(anyhow!(err.clone()));
        }
        let events = self
            .feed
            .lock()
            .expect("feed lock")
            .take()
            .unwrap_or_else(|| mpsc::channel(1).1);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let unsubscribed = Arc::clone(&self.unsubscribed);
        let task = tokio::spawn(async move {
            let _ = stop_rx.await;
            unsubscribed.store(true, Ordering::SeqCst);
        });
        Ok(FeedSubscription::new(events, stop_tx, task))
    }
}
