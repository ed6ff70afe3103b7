//! Chat room over STOMP on a WebSocket.
//!
//! Clients subscribe to `/notice` (broadcast) or `/user/message` (their own
//! point-to-point queue) and send to `/app/entry` or `/app/chat`. Every
//! session listens on one broadcast channel and filters by its subscriptions.

use std::collections::HashMap;

use actix_web::{HttpRequest, HttpResponse, get, web};
use actix_ws::Message;
use futures_util::StreamExt;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::auth::AuthUser;
use crate::stomp::{Command, Frame, decode_frames};

pub const NOTICE_PREFIX: &str = "/notice";
pub const MESSAGE_PREFIX: &str = "/message";
pub const APP_PREFIX: &str = "/app";
pub const USER_PREFIX: &str = "/user";

/// Largest partial frame a session buffers before giving up.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

const JSON: &str = "application/json";
const TEXT: &str = "text/plain;charset=UTF-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomEvent {
    pub destination: String,
    /// Recipient of a point-to-point message; `None` broadcasts.
    pub user: Option<String>,
    pub content_type: String,
    pub body: String,
}

#[derive(Clone)]
pub struct ChatRoom {
    tx: broadcast::Sender<RoomEvent>,
}

impl ChatRoom {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns the number of sessions the event reached.
    pub fn publish(&self, event: RoomEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.tx.subscribe()
    }

    pub fn members(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChatRoom {
    fn default() -> Self {
        Self::new(256)
    }
}

#[derive(Deserialize)]
struct NamePayload {
    name: String,
}

fn error_frame(message: &str) -> Frame {
    Frame::new(Command::Error)
        .header("message", message)
        .header("content-type", TEXT)
        .body(message)
}

fn is_broker_destination(destination: &str) -> bool {
    [NOTICE_PREFIX, MESSAGE_PREFIX, USER_PREFIX]
        .iter()
        .any(|p| destination == *p || destination.starts_with(&format!("{p}/")))
}

/// Protocol state of one connection.
pub struct StompSession {
    username: String,
    session_id: String,
    subscriptions: HashMap<String, String>,
    buffer: Vec<u8>,
    message_seq: u64,
    connected: bool,
    closed: bool,
}

impl StompSession {
    pub fn new(username: &str, session_id: &str) -> Self {
        Self {
            username: username.to_string(),
            session_id: session_id.to_string(),
            subscriptions: HashMap::new(),
            buffer: Vec::new(),
            message_seq: 0,
            connected: false,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feeds raw bytes; returns the frames to send back.
    pub fn receive(&mut self, bytes: &[u8], room: &ChatRoom) -> Vec<Frame> {
        self.buffer.extend_from_slice(bytes);
        let (frames, used) = match decode_frames(&self.buffer) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.closed = true;
                return vec![error_frame(&e.to_string())];
            }
        };
        self.buffer.drain(..used);
        let mut replies = Vec::new();
        for frame in frames {
            replies.extend(self.handle(frame, room));
            if self.closed {
                break;
            }
        }
        if !self.closed && self.buffer.len() > MAX_FRAME_BYTES {
            warn!(
                "session {} sent a frame over {MAX_FRAME_BYTES} bytes",
                self.session_id
            );
            self.buffer.clear();
            self.closed = true;
            replies.push(error_frame("frame too large"));
        }
        replies
    }

    pub fn handle(&mut self, frame: Frame, room: &ChatRoom) -> Vec<Frame> {
        let receipt = frame.get("receipt").map(str::to_string);
        let mut replies = match frame.command {
            Command::Connect | Command::Stomp => {
                self.connected = true;
                vec![Frame::new(Command::Connected)
                    .header("version", "1.2")
                    .header("heart-beat", "0,0")
                    .header("user-name", &self.username)]
            }
            _ if !self.connected => {
                self.closed = true;
                return vec![error_frame("not connected")];
            }
            Command::Subscribe => self.subscribe(&frame),
            Command::Unsubscribe => {
                if let Some(id) = frame.get("id") {
                    self.subscriptions.remove(id);
                }
                Vec::new()
            }
            Command::Send => self.send(&frame, room),
            Command::Disconnect => {
                self.closed = true;
                Vec::new()
            }
            Command::Ack | Command::Nack | Command::Begin | Command::Commit | Command::Abort => {
                Vec::new()
            }
            other => {
                self.closed = true;
                vec![error_frame(&format!("unexpected {other} frame from client"))]
            }
        };
        if let Some(id) = receipt {
            replies.push(Frame::new(Command::Receipt).header("receipt-id", &id));
        }
        replies
    }

    fn subscribe(&mut self, frame: &Frame) -> Vec<Frame> {
        let (Some(id), Some(destination)) = (frame.get("id"), frame.get("destination")) else {
            return vec![error_frame("SUBSCRIBE needs id and destination")];
        };
        if !is_broker_destination(destination) {
            return vec![error_frame(&format!("cannot subscribe to {destination}"))];
        }
        debug!("{} subscribed to {destination} as {id}", self.username);
        self.subscriptions
            .insert(id.to_string(), destination.to_string());
        Vec::new()
    }

    fn send(&mut self, frame: &Frame, room: &ChatRoom) -> Vec<Frame> {
        let Some(destination) = frame.get("destination") else {
            return vec![error_frame("SEND needs a destination")];
        };
        let body = match frame.body_text() {
            Ok(body) => body,
            Err(e) => return vec![error_frame(&e.to_string())],
        };
        let event = match destination.strip_prefix(APP_PREFIX) {
            Some("/entry") => match serde_json::from_str::<NamePayload>(body) {
                Ok(p) => RoomEvent {
                    destination: NOTICE_PREFIX.to_string(),
                    user: None,
                    content_type: JSON.to_string(),
                    body: json!({ "content": format!("Greetings {}", p.name) }).to_string(),
                },
                Err(e) => return vec![error_frame(&format!("invalid payload: {e}"))],
            },
            Some("/chat") => match serde_json::from_str::<NamePayload>(body) {
                Ok(p) => RoomEvent {
                    destination: MESSAGE_PREFIX.to_string(),
                    user: Some(self.username.clone()),
                    content_type: TEXT.to_string(),
                    body: format!("Hi, {}", p.name),
                },
                Err(e) => return vec![error_frame(&format!("invalid payload: {e}"))],
            },
            Some(_) => return vec![error_frame(&format!("no handler for {destination}"))],
            None if is_broker_destination(destination) => RoomEvent {
                destination: destination.to_string(),
                user: None,
                content_type: frame.get("content-type").unwrap_or(TEXT).to_string(),
                body: body.to_string(),
            },
            None => return vec![error_frame(&format!("unknown destination {destination}"))],
        };
        room.publish(event);
        Vec::new()
    }

    /// MESSAGE frames for every subscription the event matches.
    pub fn deliver(&mut self, event: &RoomEvent) -> Vec<Frame> {
        let target = match &event.user {
            Some(user) if *user != self.username => return Vec::new(),
            Some(_) => format!("{USER_PREFIX}{}", event.destination),
            None => event.destination.clone(),
        };
        let mut matched: Vec<(&String, &String)> = self
            .subscriptions
            .iter()
            .filter(|(_, dest)| **dest == target)
            .collect();
        matched.sort();
        let mut frames = Vec::with_capacity(matched.len());
        for (id, dest) in matched {
            self.message_seq += 1;
            frames.push(
                Frame::new(Command::Message)
                    .header("destination", dest)
                    .header("message-id", &format!("{}-{}", self.session_id, self.message_seq))
                    .header("subscription", id)
                    .header("content-type", &event.content_type)
                    .body(event.body.clone()),
            );
        }
        frames
    }
}

#[utoipa::path(
    get,
    path = "/chat-room",
    responses(
        (status = 101, description = "Switching to a STOMP WebSocket"),
        (status = 401, body = crate::errors::ProblemDetail)
    ),
    security(
        ("jwt_cookie" = [])
    ),
    tag = "chat"
)]
#[get("/chat-room")]
pub async fn chat_room(
    auth: AuthUser,
    req: HttpRequest,
    body: web::Payload,
    room: web::Data<ChatRoom>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;
    let session_id = format!("{}-{}", auth.user_id, chrono::Utc::now().timestamp_millis());
    info!("{} joined the chat room", auth.username);
    let stomp = StompSession::new(&auth.username, &session_id);
    let room = room.get_ref().clone();
    actix_web::rt::spawn(run_session(stomp, session, stream, room));
    Ok(response)
}

async fn run_session(
    mut stomp: StompSession,
    mut session: actix_ws::Session,
    mut stream: actix_ws::MessageStream,
    room: ChatRoom,
) {
    let mut events = room.subscribe();
    loop {
        let outgoing = tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => stomp.receive(text.as_bytes(), &room),
                Some(Ok(Message::Binary(bytes))) => stomp.receive(&bytes, &room),
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        return;
                    }
                    continue;
                }
                Some(Ok(Message::Close(reason))) => {
                    let _ = session.close(reason).await;
                    return;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("chat room protocol error: {e}");
                    break;
                }
                None => break,
            },
            event = events.recv() => match event {
                Ok(event) => stomp.deliver(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("chat session lagged, {skipped} event(s) dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };
        for frame in outgoing {
            if session.text(frame.to_text()).await.is_err() {
                return;
            }
        }
        if stomp.is_closed() {
            break;
        }
    }
    let _ = session.close(None).await;
}
