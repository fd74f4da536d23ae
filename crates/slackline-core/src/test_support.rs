//! Recording fakes shared by the unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use slackline_transport::{
    ApiError, BootstrapApi, SignalKind, SignalReceiver, SignalSender, StreamHandle, StreamId,
    StreamSignal, Transport, TransportError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::host::{ConnectionStatus, ErrorClass, EventHandlers};
use crate::session::{Session, SessionConfig, SessionState};

/// Ordered log of every call made into the fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

pub struct FakeTransport {
    journal: Journal,
    pub fail_open: AtomicBool,
    /// Signal channel and id of the most recently opened stream.
    last_open: Mutex<Option<(StreamId, SignalSender)>>,
}

impl FakeTransport {
    /// Deliver a signal as if the last opened stream produced it.
    pub fn emit(&self, kind: SignalKind) {
        let last_open = self.last_open.lock().unwrap();
        let (id, signals) = last_open.as_ref().expect("no stream opened");
        signals.send(StreamSignal::new(*id, kind)).unwrap();
    }
}

impl Transport for FakeTransport {
    fn open(
        &self,
        url: &str,
        signals: SignalSender,
    ) -> Result<Box<dyn StreamHandle>, TransportError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("refused".into()));
        }
        let id = StreamId::generate();
        self.journal.push(format!("open {} {}", id, url));
        *self.last_open.lock().unwrap() = Some((id, signals));
        Ok(Box::new(FakeStream {
            id,
            journal: self.journal.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeStream {
    id: StreamId,
    journal: Journal,
}

impl StreamHandle for FakeStream {
    fn id(&self) -> StreamId {
        self.id
    }

    fn send_text(&self, data: Bytes) -> Result<(), TransportError> {
        self.journal
            .push(format!("send {}", String::from_utf8_lossy(&data)));
        Ok(())
    }

    fn abort(self: Box<Self>) {
        self.journal.push(format!("abort {}", self.id));
    }
}

pub struct RecordingStatus {
    journal: Journal,
}

impl ConnectionStatus for RecordingStatus {
    fn update_progress(&self, message: &str, step: u32, total: u32) {
        self.journal
            .push(format!("progress {}/{} {}", step, total, message));
    }

    fn connection_error(&self, class: ErrorClass, message: &str) {
        self.journal.push(format!("error {} {}", class, message));
    }

    fn set_display_name(&self, name: &str) {
        self.journal.push(format!("display_name {}", name));
    }
}

pub struct RecordingHandlers {
    journal: Journal,
}

impl EventHandlers for RecordingHandlers {
    fn load_users(&self, _session: &Session) {
        self.journal.push("load_users");
    }

    fn user_changed(&self, _session: &Session, payload: &Value) {
        self.journal.push(format!("user_changed {}", payload));
    }

    fn im_closed(&self, _session: &Session, payload: &Value) {
        self.journal.push(format!("im_closed {}", payload));
    }

    fn im_opened(&self, _session: &Session, payload: &Value) {
        self.journal.push(format!("im_opened {}", payload));
    }

    fn presence_changed(&self, _session: &Session, payload: &Value) {
        self.journal.push(format!("presence_changed {}", payload));
    }

    fn init_roster(&self, session: &Session) {
        self.journal.push(format!(
            "init_roster {}",
            session.team().id.as_deref().unwrap_or("-")
        ));
    }
}

/// Bootstrap API answering from a queue of canned results.
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<VecDeque<Result<Value, ApiError>>>,
}

impl FakeApi {
    pub fn with_responses(responses: Vec<Result<Value, ApiError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl BootstrapApi for FakeApi {
    async fn rtm_connect(&self) -> Result<Value, ApiError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Http("no canned response".into())))
    }
}

/// Fakes wired to one shared journal.
pub struct Harness {
    pub journal: Journal,
    pub transport: Arc<FakeTransport>,
    pub status: Arc<RecordingStatus>,
    pub handlers: Arc<RecordingHandlers>,
    signals_tx: SignalSender,
    _signals_rx: SignalReceiver,
}

impl Harness {
    pub fn new() -> Self {
        let journal = Journal::default();
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(FakeTransport {
                journal: journal.clone(),
                fail_open: AtomicBool::new(false),
                last_open: Mutex::new(None),
            }),
            status: Arc::new(RecordingStatus {
                journal: journal.clone(),
            }),
            handlers: Arc::new(RecordingHandlers {
                journal: journal.clone(),
            }),
            journal,
            signals_tx,
            _signals_rx: signals_rx,
        }
    }

    pub fn config() -> SessionConfig {
        SessionConfig {
            ping_interval: std::time::Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    pub fn session(&self) -> Session {
        self.session_with(Self::config())
    }

    pub fn session_with(&self, config: SessionConfig) -> Session {
        Session::new(
            config,
            self.transport.clone(),
            self.signals_tx.clone(),
            self.status.clone(),
            self.handlers.clone(),
        )
    }

    /// A session that completed the handshake and received `Open`.
    pub fn connected_session(&self) -> Session {
        self.connect(self.session())
    }

    pub fn connect(&self, mut session: Session) -> Session {
        session.begin_handshake();
        session.complete_handshake(Ok(valid_handshake())).unwrap();
        let stream = session.stream_id().unwrap();
        session.handle_signal(StreamSignal::new(stream, SignalKind::Open));
        assert_eq!(session.state(), SessionState::Open);
        session
    }
}

pub fn valid_handshake() -> Value {
    json!({
        "ok": true,
        "url": "wss://rtm.example.invalid/ws/1",
        "self": {"id": "U0SELF", "name": "alice"},
        "team": {"id": "T0TEAM", "name": "Example Team", "domain": "example"}
    })
}

/// A text frame signal for the session's current stream.
pub fn text(session: &Session, body: &str) -> StreamSignal {
    StreamSignal::new(
        session.stream_id().expect("session has no stream"),
        SignalKind::Text(Bytes::copy_from_slice(body.as_bytes())),
    )
}
