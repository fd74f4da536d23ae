//! Session host for the command-line client.
//!
//! Logs connection progress and domain events, and forwards commands typed
//! on stdin to the session.

use crate::config::Config;
use crate::metrics::{self, SessionMetricsGuard};
use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use slackline_core::{
    ConnectionStatus, ErrorClass, EventHandlers, Session, SessionDriver, SessionHandle,
};
use slackline_protocol::optional_str;
use slackline_transport::{HttpBootstrapApi, WebSocketTransport};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// Connection status sink that logs and remembers the last error.
#[derive(Debug, Default)]
pub struct LoggingStatus {
    last_error: Mutex<Option<String>>,
}

impl LoggingStatus {
    /// The most recent connection error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }
}

impl ConnectionStatus for LoggingStatus {
    fn update_progress(&self, message: &str, step: u32, total: u32) {
        info!(step, total, "{}", message);
        metrics::record_connect_step(step);
    }

    fn connection_error(&self, class: ErrorClass, message: &str) {
        error!(class = %class, "{}", message);
        metrics::record_connection_error(&class.to_string());
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(message.to_string());
        }
    }

    fn set_display_name(&self, name: &str) {
        info!(name = %name, "Signed in");
    }
}

/// Event handlers that log each event.
#[derive(Debug, Default)]
pub struct LoggingHandlers;

impl EventHandlers for LoggingHandlers {
    fn load_users(&self, session: &Session) {
        metrics::record_event("hello");
        info!(team = ?session.team().name, "RTM hello; user directory requested");
    }

    fn user_changed(&self, _session: &Session, payload: &Value) {
        record_payload_event(payload);
        let user = payload.get("user").unwrap_or(&Value::Null);
        info!(
            user = optional_str(user, "id").unwrap_or("-"),
            name = optional_str(user, "name").unwrap_or("-"),
            "User updated"
        );
    }

    fn im_closed(&self, _session: &Session, payload: &Value) {
        record_payload_event(payload);
        info!(channel = optional_str(payload, "channel").unwrap_or("-"), "IM closed");
    }

    fn im_opened(&self, _session: &Session, payload: &Value) {
        record_payload_event(payload);
        info!(
            channel = optional_str(payload, "channel").unwrap_or("-"),
            user = optional_str(payload, "user").unwrap_or("-"),
            "IM opened"
        );
    }

    fn presence_changed(&self, _session: &Session, payload: &Value) {
        record_payload_event(payload);
        debug!(
            users = presence_count(payload),
            presence = optional_str(payload, "presence").unwrap_or("-"),
            "Presence changed"
        );
    }

    fn init_roster(&self, session: &Session) {
        info!(
            team = session.team().id.as_deref().unwrap_or("-"),
            domain = session.team().domain.as_deref().unwrap_or("-"),
            self_id = session.self_id().unwrap_or("-"),
            "Roster initialized"
        );
    }
}

fn record_payload_event(payload: &Value) {
    metrics::record_event(optional_str(payload, "type").unwrap_or("unknown"));
}

/// Number of users a presence event covers.
fn presence_count(payload: &Value) -> usize {
    if let Some(users) = payload.get("users").and_then(Value::as_array) {
        return users.len();
    }
    match payload.get("presences") {
        Some(Value::Array(presences)) => presences.len(),
        Some(Value::Object(presences)) => presences.len(),
        _ => usize::from(payload.get("user").is_some()),
    }
}

/// Parse a stdin command line: a type tag optionally followed by a JSON
/// object of fields. Blank lines yield `None`.
///
/// # Errors
///
/// Returns an error if the fields are not a JSON object or try to set
/// `id` or `type`.
pub fn parse_command(line: &str) -> Result<Option<(String, Map<String, Value>)>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (type_tag, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let fields = match rest.trim() {
        "" => Map::new(),
        json => match serde_json::from_str(json).context("Command fields must be JSON")? {
            Value::Object(fields) => fields,
            _ => bail!("Command fields must be a JSON object"),
        },
    };

    if fields.contains_key("id") || fields.contains_key("type") {
        bail!("Command fields may not set id or type");
    }

    Ok(Some((type_tag.to_string(), fields)))
}

/// Run the client until interrupted or the session ends.
///
/// # Errors
///
/// Returns an error if no token is configured, the API client cannot be
/// built, or the session ends with a connection error.
pub async fn run_client(config: Config) -> Result<()> {
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let api = HttpBootstrapApi::new(config.api.base_url.clone(), config.token()?)
        .context("Failed to build bootstrap API client")?;
    let transport = WebSocketTransport::new(config.websocket_config());
    let status = Arc::new(LoggingStatus::default());

    let (driver, handle) = SessionDriver::new(
        config.session_config(),
        Arc::new(api),
        Arc::new(transport),
        status.clone(),
        Arc::new(LoggingHandlers),
    );
    let task = driver.spawn();
    let _guard = SessionMetricsGuard::new();

    handle.connect()?;
    let outcome = drive(&handle, &status).await;

    if handle.shutdown().is_err() {
        debug!("Session driver already stopped");
    }
    task.await.context("Session driver panicked")?;

    outcome
}

async fn drive(handle: &SessionHandle, status: &LoggingStatus) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
            state = handle.wait_for_state(|s| s.is_terminal()) => {
                let state = state?;
                let reason = status.last_error().unwrap_or_else(|| state.to_string());
                bail!("RTM session ended ({}): {}", state, reason);
            }
            line = lines.next_line(), if input_open => match line? {
                Some(line) => send_line(handle, &line).await,
                None => {
                    debug!("Command input closed");
                    input_open = false;
                }
            },
        }
    }
}

async fn send_line(handle: &SessionHandle, line: &str) {
    let (type_tag, fields) = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "Ignoring command");
            return;
        }
    };

    match handle.send_command(type_tag.as_str(), fields).await {
        Ok(id) => {
            metrics::record_command(&type_tag);
            info!(id, command = %type_tag, "Command sent");
        }
        Err(e) => warn!(command = %type_tag, error = %e, "Command not sent"),
    }
}
