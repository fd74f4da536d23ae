//! # slackline-core
//!
//! Session state machine for the Slack real-time messaging (RTM) stream.
//!
//! This crate provides the pieces between the network and the domain
//! handlers:
//!
//! - **Session** - one logical connection: stream handle, command counter,
//!   identity and team metadata
//! - **Handshake** - applies the `rtm.connect` response and opens the stream
//! - **Lifecycle** - reacts to stream signals (open, frames, error, close)
//! - **Dispatch** - routes decoded events to [`EventHandlers`]
//! - **Commands** - builds and frames id-correlated outbound commands
//! - **Driver** - single-owner task that serializes all session inputs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ BootstrapApi│────▶│   Session   │────▶│  Transport  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │ signals ▲          │
//!                            ▼         └──────────┘
//!                     ┌─────────────┐
//!                     │  Dispatch   │────▶ EventHandlers
//!                     └─────────────┘
//! ```

pub mod command;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod handshake;
pub mod host;
pub mod lifecycle;
pub mod session;

#[cfg(test)]
mod test_support;

pub use dispatch::dispatch;
pub use driver::{SessionDriver, SessionHandle};
pub use error::SessionError;
pub use handshake::MISSING_PARAMETERS;
pub use host::{ConnectionStatus, ErrorClass, EventHandlers, CONNECT_STEPS};
pub use lifecycle::{CONNECTION_CLOSED, PARSE_ERROR};
pub use session::{
    DecodeFailurePolicy, Session, SessionConfig, SessionState, DEFAULT_MAX_PENDING_COMMANDS,
};
