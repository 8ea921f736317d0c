//! WebSocket client protocol for GraphQL subscriptions.
//!
//! Speaks the subscriptions-transport-ws protocol (subprotocol name
//! "graphql-ws"): `connection_init`/`connection_ack` handshake, one
//! `start` message carrying the composed operation, then a receive loop
//! surfacing each `data` message independently until the server completes
//! or the owner drops its [`SubscriptionHandle`].

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use futures::SinkExt;
use futures::Stream;
use futures::StreamExt;
use http::HeaderMap;
use http::HeaderValue;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;
use uuid::Uuid;

use crate::client::Reply;
use crate::client::decode_reply;
use crate::error::HttpError;
use crate::graphql;
use crate::select::Operation;
use crate::select::Selection;
use crate::select::compose;

const CONNECTION_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// The WebSocket subprotocol name. Confusingly, the
/// subscriptions-transport-ws protocol registers as "graphql-ws".
const SUBPROTOCOL: &str = "graphql-ws";

/// The close reason marking a closure initiated by the subscription's
/// owner, distinguishable from any server-initiated close frame.
const CANCEL_REASON: &str = "client cancelled";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket messages sent from the client.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ClientMessage {
    /// Opens the GraphQL connection after the WebSocket handshake.
    ConnectionInit {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// The initiation envelope of one subscription.
    Start {
        id: String,
        payload: graphql::Request,
    },
    /// Ends one subscription.
    Stop { id: String },
    /// Ends the GraphQL connection as a whole.
    ConnectionTerminate,
}

/// WebSocket messages received from the server.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ServerMessage {
    ConnectionAck,
    Data {
        id: String,
        payload: graphql::Response,
    },
    #[serde(alias = "connection_error")]
    Error {
        id: Option<String>,
        payload: Value,
    },
    Complete {
        id: String,
    },
    #[serde(rename = "ka")]
    KeepAlive,
}

/// One event surfaced by an open subscription: a decoded message or a
/// per-message failure. A failure does not end the stream unless it is
/// [`HttpError::Cancelled`] or a transport fault.
pub type Event<R> = Result<Reply<R>, HttpError>;

/// Opens subscriptions against a fixed WebSocket endpoint.
pub struct Subscriber {
    endpoint: String,
    headers: HeaderMap,
    connection_params: Option<Value>,
    operation_name: Option<String>,
}

#[buildstructor::buildstructor]
impl Subscriber {
    /// Builder for a [`Subscriber`]: `endpoint` is required (a `ws://` or
    /// `wss://` URL); `connection_params` ride on `connection_init` for
    /// servers that authenticate there.
    #[builder(visibility = "pub")]
    fn new(
        endpoint: String,
        headers: Option<HeaderMap>,
        connection_params: Option<Value>,
        operation_name: Option<String>,
    ) -> Self {
        Self {
            endpoint,
            headers: headers.unwrap_or_default(),
            connection_params,
            operation_name,
        }
    }
}

impl Subscriber {
    /// Opens one subscription for `selection`.
    ///
    /// Connects, performs the `connection_init` handshake, sends the
    /// composed operation in a `start` envelope, and spawns the receive
    /// loop. The returned [`SubscriptionHandle`] is the sole owner of the
    /// stream's lifetime; the returned [`SubscriptionStream`] yields
    /// events in arrival order.
    pub async fn subscribe<R, T>(
        &self,
        selection: &Selection<R, T>,
    ) -> Result<(SubscriptionHandle, SubscriptionStream<R>), HttpError>
    where
        R: Send + 'static,
        T: 'static,
    {
        let url = Url::parse(&self.endpoint).map_err(|err| HttpError::BadUrl {
            reason: err.to_string(),
        })?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|err| HttpError::BadUrl {
                reason: err.to_string(),
            })?;
        request.headers_mut().insert(
            http::header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(SUBPROTOCOL),
        );
        for (name, value) in self.headers.iter() {
            request.headers_mut().insert(name, value.clone());
        }

        let (mut stream, _response) =
            connect_async(request)
                .await
                .map_err(|err| HttpError::Network {
                    reason: err.to_string(),
                })?;

        send_client(
            &mut stream,
            &ClientMessage::ConnectionInit {
                payload: self.connection_params.clone(),
            },
        )
        .await?;
        wait_for_ack(&mut stream).await?;

        let id = Uuid::new_v4().to_string();
        let payload = compose(
            Operation::Subscription,
            self.operation_name.as_deref(),
            selection,
        );
        send_client(
            &mut stream,
            &ClientMessage::Start {
                id: id.clone(),
                payload,
            },
        )
        .await?;

        let (events, receiver) = mpsc::channel(16);
        let (close_signal, close_sentinel) = oneshot::channel();
        let selection = selection.clone();
        tokio::spawn(receive_loop(stream, id, selection, events, close_sentinel));

        Ok((
            SubscriptionHandle {
                close: Some(close_signal),
            },
            SubscriptionStream { receiver },
        ))
    }
}

/// Owns the lifetime of one open subscription.
///
/// Dropping (or explicitly closing) the handle closes the underlying
/// connection exactly once: the receive loop sends `stop`, terminates the
/// GraphQL connection, closes the socket with a [`CANCEL_REASON`] frame,
/// surfaces exactly one [`HttpError::Cancelled`] event, and never
/// dispatches again.
pub struct SubscriptionHandle {
    close: Option<oneshot::Sender<()>>,
}

impl SubscriptionHandle {
    /// Closes the subscription. Equivalent to dropping the handle.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        // Idempotent: the signal can only be taken once.
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// The events of one open subscription, in arrival order. Ends after the
/// server completes, the transport faults, or the owner cancels.
pub struct SubscriptionStream<R> {
    receiver: mpsc::Receiver<Event<R>>,
}

impl<R> Stream for SubscriptionStream<R> {
    type Item = Event<R>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

async fn send_client(stream: &mut WsStream, message: &ClientMessage) -> Result<(), HttpError> {
    let text = serde_json::to_string(message).map_err(|err| HttpError::Network {
        reason: format!("cannot serialize client message: {err}"),
    })?;
    stream
        .send(Message::text(text))
        .await
        .map_err(|err| HttpError::Network {
            reason: format!("cannot send to websocket connection: {err}"),
        })
}

/// Waits for `connection_ack`, skipping keep-alives and protocol-level
/// ping/pong frames.
async fn wait_for_ack(stream: &mut WsStream) -> Result<(), HttpError> {
    let handshake = async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(ServerMessage::KeepAlive) => continue,
                        Ok(ServerMessage::ConnectionAck) => return Ok(()),
                        Ok(other) => {
                            return Err(HttpError::Network {
                                reason: format!(
                                    "expected connection_ack from websocket connection, received: {other:?}"
                                ),
                            });
                        }
                        Err(err) => {
                            return Err(HttpError::Network {
                                reason: format!("cannot read handshake message: {err}"),
                            });
                        }
                    }
                }
                Some(Ok(other)) => {
                    return Err(HttpError::Network {
                        reason: format!(
                            "expected connection_ack from websocket connection, received: {other:?}"
                        ),
                    });
                }
                Some(Err(err)) => {
                    return Err(HttpError::Network {
                        reason: format!("websocket connection failed during handshake: {err}"),
                    });
                }
                None => {
                    return Err(HttpError::Network {
                        reason: "websocket connection closed during handshake".to_owned(),
                    });
                }
            }
        }
    };
    tokio::time::timeout(CONNECTION_ACK_TIMEOUT, handshake)
        .await
        .map_err(|_| HttpError::Timeout)?
}

/// What one inbound frame means to the receive loop.
enum Inbound {
    /// Keep-alives, acks and other subscriptions' traffic.
    Ignore,
    /// The server ended the subscription or the connection.
    Closed,
    /// A payload (or a per-message failure) to surface to the caller.
    Event(Result<graphql::Response, HttpError>),
}

fn classify(message: Message, id: &str) -> Inbound {
    let parsed = match &message {
        Message::Text(text) => serde_json::from_str::<ServerMessage>(text),
        Message::Binary(bytes) => serde_json::from_slice::<ServerMessage>(bytes),
        Message::Close(_) => return Inbound::Closed,
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Inbound::Ignore,
    };
    match parsed {
        Ok(ServerMessage::Data { id: msg_id, payload }) if msg_id == id => {
            Inbound::Event(Ok(payload))
        }
        // This connection carries a single subscription; traffic for any
        // other id is not ours to surface.
        Ok(ServerMessage::Data { .. }) => Inbound::Ignore,
        Ok(ServerMessage::Error { payload, .. }) => Inbound::Event(Err(HttpError::BadPayload {
            reason: format!("server reported an error: {payload:?}"),
        })),
        Ok(ServerMessage::Complete { id: msg_id }) if msg_id == id => Inbound::Closed,
        Ok(ServerMessage::Complete { .. })
        | Ok(ServerMessage::ConnectionAck)
        | Ok(ServerMessage::KeepAlive) => Inbound::Ignore,
        Err(err) => Inbound::Event(Err(HttpError::BadPayload {
            reason: format!("cannot deserialize websocket server message: {err}"),
        })),
    }
}

/// The single task driving one subscription: suspends on the next inbound
/// message or on the owner's close signal, surfaces events in order, and
/// re-arms itself until closed.
async fn receive_loop<R, T>(
    mut stream: WsStream,
    id: String,
    selection: Selection<R, T>,
    events: mpsc::Sender<Event<R>>,
    mut close_sentinel: oneshot::Receiver<()>,
) where
    R: Send + 'static,
    T: 'static,
{
    loop {
        tokio::select! {
            // When a message and the close signal are both ready, the
            // cancellation wins: nothing may be dispatched after it.
            biased;
            _ = &mut close_sentinel => {
                close_stream(&mut stream, &id).await;
                let _ = events.send(Err(HttpError::Cancelled)).await;
                return;
            }
            message = stream.next() => {
                let Some(message) = message else {
                    // Server dropped the connection without a close frame.
                    return;
                };
                let message = match message {
                    Ok(message) => message,
                    Err(err) => {
                        let _ = events
                            .send(Err(HttpError::Network {
                                reason: format!("cannot read message from websocket: {err}"),
                            }))
                            .await;
                        return;
                    }
                };
                match classify(message, &id) {
                    Inbound::Ignore => {}
                    Inbound::Closed => return,
                    Inbound::Event(result) => {
                        let event = result.and_then(|payload| decode_reply(&selection, payload));
                        if events.send(event).await.is_err() {
                            // The caller dropped the event stream.
                            close_stream(&mut stream, &id).await;
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Ends the subscription on the wire: `stop`, `connection_terminate`,
/// then a close frame marked with [`CANCEL_REASON`].
async fn close_stream(stream: &mut WsStream, id: &str) {
    let farewell = [
        ClientMessage::Stop { id: id.to_owned() },
        ClientMessage::ConnectionTerminate,
    ];
    for message in farewell {
        if send_client(stream, &message).await.is_err() {
            break;
        }
    }
    if let Err(err) = stream
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: CANCEL_REASON.into(),
        }))
        .await
    {
        tracing::trace!("cannot close the websocket stream: {err:?}");
    }
}
