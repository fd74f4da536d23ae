//! Session driver.
//!
//! The driver is the single owner of a [`Session`]. It runs as one task and
//! serializes everything that touches the session: handshake results, stream
//! signals, command requests from [`SessionHandle`]s and the keepalive timer.
//! No locking is needed because nothing else can reach the session.

use serde_json::{Map, Value};
use slackline_transport::{ApiError, BootstrapApi, SignalReceiver, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::host::{ConnectionStatus, EventHandlers};
use crate::session::{Session, SessionConfig, SessionState};

/// Requests from handles to the driver.
enum Input {
    Connect,
    Command {
        type_tag: String,
        fields: Map<String, Value>,
        reply: oneshot::Sender<Result<u64, SessionError>>,
    },
    Shutdown,
}

/// Owns a [`Session`] and drives it from one task.
pub struct SessionDriver {
    session: Session,
    api: Arc<dyn BootstrapApi>,
    inputs: mpsc::UnboundedReceiver<Input>,
    signals: SignalReceiver,
    handshake_tx: mpsc::UnboundedSender<Result<Value, ApiError>>,
    handshake_rx: mpsc::UnboundedReceiver<Result<Value, ApiError>>,
    handshake_in_flight: bool,
    state_tx: watch::Sender<SessionState>,
}

impl SessionDriver {
    /// Create a driver and a handle for controlling it.
    ///
    /// Nothing happens until the driver is [run](SessionDriver::run) and a
    /// handle calls [`SessionHandle::connect`].
    #[must_use]
    pub fn new(
        config: SessionConfig,
        api: Arc<dyn BootstrapApi>,
        transport: Arc<dyn Transport>,
        status: Arc<dyn ConnectionStatus>,
        handlers: Arc<dyn EventHandlers>,
    ) -> (Self, SessionHandle) {
        let (inputs_tx, inputs) = mpsc::unbounded_channel();
        let (signals_tx, signals) = mpsc::unbounded_channel();
        let (handshake_tx, handshake_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        let session = Session::new(config, transport, signals_tx, status, handlers);

        let driver = Self {
            session,
            api,
            inputs,
            signals,
            handshake_tx,
            handshake_rx,
            handshake_in_flight: false,
            state_tx,
        };
        let handle = SessionHandle {
            inputs: inputs_tx,
            state: state_rx,
        };

        (driver, handle)
    }

    /// Spawn the driver on the current runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        let mut keepalive = keepalive_timer(self.session.config().ping_interval);

        loop {
            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(Input::Shutdown) | None => break,
                    Some(input) => self.handle_input(input),
                },
                Some(response) = self.handshake_rx.recv() => {
                    self.handshake_in_flight = false;
                    if let Err(e) = self.session.complete_handshake(response) {
                        warn!(error = %e, "RTM handshake failed");
                    }
                }
                Some(signal) = self.signals.recv() => {
                    self.session.handle_signal(signal);
                }
                _ = tick(&mut keepalive) => self.keepalive(),
            }

            self.state_tx.send_replace(self.session.state());
        }

        self.session.disconnect();
        self.state_tx.send_replace(self.session.state());
        info!("Session driver stopped");
    }

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::Connect => self.start_handshake(),
            Input::Command {
                type_tag,
                fields,
                reply,
            } => {
                let result = self.session.send_command(&type_tag, &fields);
                // The requester may have given up waiting.
                let _ = reply.send(result);
            }
            Input::Shutdown => {}
        }
    }

    /// Issue the bootstrap request without blocking the session.
    fn start_handshake(&mut self) {
        if self.handshake_in_flight {
            debug!("Handshake already in flight");
            return;
        }

        self.handshake_in_flight = true;
        self.session.begin_handshake();

        let api = Arc::clone(&self.api);
        let tx = self.handshake_tx.clone();
        tokio::spawn(async move {
            let response = api.rtm_connect().await;
            let _ = tx.send(response);
        });
    }

    fn keepalive(&mut self) {
        if self.session.state() != SessionState::Open {
            return;
        }
        if let Err(e) = self.session.send_command("ping", &Map::new()) {
            warn!(error = %e, "Keepalive ping failed");
        }
    }
}

fn keepalive_timer(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Cloneable handle for controlling a running [`SessionDriver`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<Input>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Start (or restart) the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DriverStopped`] if the driver has exited.
    pub fn connect(&self) -> Result<(), SessionError> {
        self.inputs
            .send(Input::Connect)
            .map_err(|_| SessionError::DriverStopped)
    }

    /// Send a command built from `type_tag` and `fields`.
    ///
    /// Returns the command's correlation id.
    ///
    /// # Errors
    ///
    /// Returns the session's send error, or
    /// [`SessionError::DriverStopped`] if the driver has exited.
    pub async fn send_command(
        &self,
        type_tag: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Result<u64, SessionError> {
        let (reply, response) = oneshot::channel();
        self.inputs
            .send(Input::Command {
                type_tag: type_tag.into(),
                fields,
                reply,
            })
            .map_err(|_| SessionError::DriverStopped)?;

        response.await.map_err(|_| SessionError::DriverStopped)?
    }

    /// The session's state as of its last processed input.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session state satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DriverStopped`] if the driver exits first.
    pub async fn wait_for_state(
        &self,
        mut predicate: impl FnMut(SessionState) -> bool,
    ) -> Result<SessionState, SessionError> {
        let mut state = self.state.clone();
        loop {
            let current = *state.borrow_and_update();
            if predicate(current) {
                return Ok(current);
            }
            state
                .changed()
                .await
                .map_err(|_| SessionError::DriverStopped)?;
        }
    }

    /// Stop the driver, aborting any open stream.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DriverStopped`] if the driver has already
    /// exited.
    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.inputs
            .send(Input::Shutdown)
            .map_err(|_| SessionError::DriverStopped)
    }
}
