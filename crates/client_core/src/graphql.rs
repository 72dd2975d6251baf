//! GraphQL backend: queries and mutations over HTTP, creation events over a
//! `graphql-transport-ws` websocket.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use shared::{
    domain::{Note, NoteId},
    error::GraphqlFailure,
    protocol::{
        create_note_document, delete_note_document, list_notes_document, on_create_note_document,
        update_note_document, CreateNoteData, CreateNoteInput, DeleteNoteData, DeleteNoteInput,
        GraphqlRequest, GraphqlResponse, InputVariables, ListNotesData, NoVariables,
        SubscriptionClientFrame, SubscriptionServerFrame, UpdateNoteData, UpdateNoteInput,
        SUBSCRIPTION_PROTOCOL,
    },
};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{FeedSubscription, NoteEventFeed, NoteMutationService, NoteQueryService};

const API_KEY_HEADER: &str = "x-api-key";
const FEED_BUFFER: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphqlEndpoints {
    pub graphql_url: Url,
    pub realtime_url: Url,
}

impl GraphqlEndpoints {
    /// Uses `realtime_url` when given, otherwise maps the GraphQL url's scheme
    /// to its websocket counterpart.
    pub fn new(graphql_url: Url, realtime_url: Option<Url>) -> Result<Self> {
        let realtime_url = match realtime_url {
            Some(url) => url,
            None => derive_realtime_url(&graphql_url)?,
        };
        match realtime_url.scheme() {
            "ws" | "wss" => {}
            other => bail!("realtime url must use ws:// or wss://, got {other}://"),
        }
        Ok(Self {
            graphql_url,
            realtime_url,
        })
    }
}

fn derive_realtime_url(graphql_url: &Url) -> Result<Url> {
    let scheme = match graphql_url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => bail!("graphql url must start with http:// or https://, got {other}://"),
    };
    let mut realtime = graphql_url.clone();
    realtime
        .set_scheme(scheme)
        .map_err(|_| anyhow!("cannot derive realtime url from {graphql_url}"))?;
    Ok(realtime)
}

pub struct GraphqlNotesClient {
    http: Client,
    endpoints: GraphqlEndpoints,
    api_key: Option<String>,
}

impl GraphqlNotesClient {
    pub fn new(endpoints: GraphqlEndpoints, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            endpoints,
            api_key,
        }
    }

    pub fn endpoints(&self) -> &GraphqlEndpoints {
        &self.endpoints
    }

    async fn execute<V, T>(&self, operation: &str, query: String, variables: V) -> Result<T>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(self.endpoints.graphql_url.clone())
            .json(&GraphqlRequest::new(query, variables));
        if let Some(api_key) = &self.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        let response: GraphqlResponse<T> = request
            .send()
            .await
            .with_context(|| format!("{operation}: request to graphql endpoint failed"))?
            .error_for_status()
            .with_context(|| format!("{operation}: graphql endpoint returned an error status"))?
            .json()
            .await
            .with_context(|| format!("{operation}: invalid graphql response body"))?;

        if !response.errors.is_empty() {
            return Err(anyhow::Error::new(GraphqlFailure::new(response.errors))
                .context(operation.to_string()));
        }
        response
            .data
            .ok_or_else(|| anyhow::Error::new(GraphqlFailure::new(Vec::new())))
            .with_context(|| operation.to_string())
    }

    fn connection_init_payload(&self) -> Option<serde_json::Value> {
        self.api_key
            .as_ref()
            .map(|api_key| json!({ "x-api-key": api_key }))
    }
}

#[async_trait]
impl NoteQueryService for GraphqlNotesClient {
    async fn fetch_all(&self) -> Result<Vec<Note>> {
        let data: ListNotesData = self
            .execute("listNotes", list_notes_document(), NoVariables {})
            .await?;
        Ok(data.list_notes.items)
    }
}

#[async_trait]
impl NoteMutationService for GraphqlNotesClient {
    async fn create(&self, note: &Note) -> Result<()> {
        let _: CreateNoteData = self
            .execute(
                "createNote",
                create_note_document(),
                InputVariables {
                    input: CreateNoteInput::from(note),
                },
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> Result<()> {
        let _: DeleteNoteData = self
            .execute(
                "deleteNote",
                delete_note_document(),
                InputVariables {
                    input: DeleteNoteInput { id: id.clone() },
                },
            )
            .await?;
        Ok(())
    }

    async fn update_completed(&self, id: &NoteId, completed: bool) -> Result<()> {
        let _: UpdateNoteData = self
            .execute(
                "updateNote",
                update_note_document(),
                InputVariables {
                    input: UpdateNoteInput {
                        id: id.clone(),
                        completed,
                    },
                },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NoteEventFeed for GraphqlNotesClient {
    async fn subscribe(&self) -> Result<FeedSubscription> {
        let realtime_url = self.endpoints.realtime_url.as_str();
        let mut request = realtime_url
            .into_client_request()
            .with_context(|| format!("invalid realtime url: {realtime_url}"))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBSCRIPTION_PROTOCOL),
        );

        let (ws_stream, _) = connect_async(request)
            .await
            .with_context(|| format!("failed to connect websocket: {realtime_url}"))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        send_frame(
            &mut ws_writer,
            &SubscriptionClientFrame::ConnectionInit {
                payload: self.connection_init_payload(),
            },
        )
        .await?;

        loop {
            let Some(msg) = ws_reader.next().await else {
                bail!("websocket closed before connection_ack");
            };
            let Message::Text(text) = msg.context("websocket receive failed")? else {
                continue;
            };
            match serde_json::from_str::<SubscriptionServerFrame>(&text)
                .context("invalid subscription frame")?
            {
                SubscriptionServerFrame::ConnectionAck { .. } => break,
                SubscriptionServerFrame::Ping => {
                    send_frame(&mut ws_writer, &SubscriptionClientFrame::Pong).await?;
                }
                other => bail!("unexpected frame before connection_ack: {other:?}"),
            }
        }

        let subscription_id = uuid::Uuid::new_v4().to_string();
        send_frame(
            &mut ws_writer,
            &SubscriptionClientFrame::Subscribe {
                id: subscription_id.clone(),
                payload: GraphqlRequest::new(on_create_note_document(), NoVariables {}),
            },
        )
        .await?;
        info!(subscription_id = %subscription_id, "subscribed to onCreateNote");

        let (events_tx, events_rx) = mpsc::channel(FEED_BUFFER);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        complete_subscription(&mut ws_writer, &subscription_id).await;
                        break;
                    }
                    msg = ws_reader.next() => {
                        let text = match msg {
                            Some(Ok(Message::Text(text))) => text,
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => continue,
                            Some(Err(err)) => {
                                warn!("websocket receive failed: {err}");
                                break;
                            }
                        };
                        let frame = match serde_json::from_str::<SubscriptionServerFrame>(&text) {
                            Ok(frame) => frame,
                            Err(err) => {
                                warn!("invalid subscription frame: {err}");
                                continue;
                            }
                        };
                        match frame {
                            SubscriptionServerFrame::Next { id, payload } if id == subscription_id => {
                                if !payload.errors.is_empty() {
                                    warn!("{}", GraphqlFailure::new(payload.errors));
                                    continue;
                                }
                                let Some(note) = payload.data.and_then(|data| data.on_create_note) else {
                                    continue;
                                };
                                if events_tx.send(note).await.is_err() {
                                    // Receiver closed while this send was parked.
                                    complete_subscription(&mut ws_writer, &subscription_id).await;
                                    break;
                                }
                            }
                            SubscriptionServerFrame::Error { id, payload } if id == subscription_id => {
                                warn!("subscription rejected: {}", GraphqlFailure::new(payload));
                                break;
                            }
                            SubscriptionServerFrame::Complete { id } if id == subscription_id => break,
                            SubscriptionServerFrame::Ping => {
                                if let Err(err) = send_frame(&mut ws_writer, &SubscriptionClientFrame::Pong).await {
                                    warn!("failed to answer ping: {err:#}");
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            debug!(subscription_id = %subscription_id, "subscription reader stopped");
        });

        Ok(FeedSubscription::new(events_rx, stop_tx, task))
    }
}

async fn complete_subscription<S>(writer: &mut S, subscription_id: &str)
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let complete = SubscriptionClientFrame::Complete {
        id: subscription_id.to_string(),
    };
    if let Err(err) = send_frame(writer, &complete).await {
        debug!("failed to send complete frame: {err:#}");
    }
    let _ = writer.close().await;
}

async fn send_frame<S>(writer: &mut S, frame: &SubscriptionClientFrame) -> Result<()>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let text = serde_json::to_string(frame)?;
    writer
        .send(Message::Text(text))
        .await
        .context("websocket send failed")
}

#[cfg(test)]
#[path = "tests/graphql_tests.rs"]
mod tests;
