//! # wyrcore
//!
//! A synchronous, zero-allocation IRC protocol core: line framing over a
//! non-blocking transport, zero-copy message parsing, ISUPPORT-aware mode
//! editing, outgoing message splitting, and optional channel/user tracking.
//!
//! ## Quick Start
//!
//! ```rust
//! use wyrcore::message::MessageRef;
//!
//! let raw = ":nick!user@host PRIVMSG #channel :Hello!";
//! let message = MessageRef::parse(raw).expect("valid line");
//! assert_eq!(message.command, "PRIVMSG");
//! ```
//!
//! [`client::Client`] ties the pieces together into a connection: feed it
//! bytes from a [`transport::Transport`] and it parses, dispatches to typed
//! [`events::EventHandlers`], and keeps an optional [`tracker::Tracker`] of
//! channel membership up to date.

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod ctcp;
pub mod error;
pub mod events;
pub mod format;
pub mod framer;
pub mod isupport;
pub mod message;
pub mod mode;
pub mod tracker;
pub mod transport;
pub mod user;

pub use self::client::{Client, ClientConfig};
pub use self::error::{IrcCoreError, MessageParseError, ModeParseError, Result};
pub use self::events::EventHandlers;
pub use self::framer::LineFramer;
pub use self::isupport::IsupportState;
pub use self::message::MessageRef;
pub use self::tracker::Tracker;
pub use self::transport::{TcpTransport, Transport};
pub use self::user::IrcUser;
