//! # slackline-protocol
//!
//! Wire protocol definitions for the Slack real-time messaging (RTM) stream.
//!
//! This crate covers the three pieces of data that cross the wire:
//!
//! - **Inbound frames** - typed events and command replies pushed by the service
//! - **Outbound commands** - id-correlated JSON objects built by the client
//! - **Handshake** - the `rtm.connect` response that bootstraps a session
//!
//! ## Example
//!
//! ```rust
//! use slackline_protocol::{codec, Command, EventKind, InboundFrame};
//!
//! let frame = codec::decode(br#"{"type":"hello"}"#).unwrap();
//! assert!(matches!(frame, InboundFrame::Event(ref e) if e.kind == EventKind::Hello));
//!
//! let command = Command::new(1, "ping").close();
//! codec::validate_frame(command.body().as_bytes()).unwrap();
//! ```

pub mod codec;
pub mod frames;
pub mod handshake;

pub use codec::{decode, validate_frame, Command, FrameError, ProtocolError, MAX_COMMAND_SIZE};
pub use frames::{CommandReply, EventKind, InboundEvent, InboundFrame};
pub use handshake::{assign_optional_string, optional_str, HandshakeResult, TeamInfo};
