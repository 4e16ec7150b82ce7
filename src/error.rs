//! Error types, layered the way the teacher crate splits protocol-level
//! errors from message-parse errors: a top-level [`IrcCoreError`] wraps a
//! [`MessageParseError`] rather than flattening it, so callers that only
//! care about the coarse kind can match broadly while `#[source]` still
//! chains through to the parse detail.

use thiserror::Error;

pub type Result<T, E = IrcCoreError> = std::result::Result<T, E>;

/// Errors encountered while parsing a single IRC line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    #[error("empty message")]
    EmptyMessage,

    #[error("invalid command")]
    InvalidCommand,

    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
}

/// Errors encountered while walking a MODE string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModeParseError {
    /// A character that is neither `+`/`-` nor an ASCII letter appeared
    /// where a mode letter was expected.
    #[error("invalid mode modifier: {modifier}")]
    InvalidModeModifier { modifier: char },

    /// The mode string did not open with a `+` or `-` sign.
    #[error("missing mode modifier")]
    MissingModeModifier,
}

/// Top-level errors raised by the client/dispatcher.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrcCoreError {
    /// An operation other than `connect` was issued before connecting, or
    /// after the connection was torn down.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called while already connected.
    #[error("already connected")]
    AlreadyConnected,

    /// A caller-supplied argument violated a protocol constraint (empty
    /// nick, out-of-range USERHOST count, non-list mode passed to a
    /// list-editing helper, nick too long under NICKLEN enforcement, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The transport reported an I/O failure.
    #[error("transport error: {0}")]
    TransportError(String),

    /// A line from the server failed to parse. Non-fatal unless the caller
    /// decides otherwise.
    #[error("protocol parse error: {0}")]
    ProtocolParseError(#[from] MessageParseError),

    /// The server closed the connection with `ERROR`, or sent a `433` with
    /// no registered handler willing to supply a replacement nick. Forces
    /// the client into the disconnected state.
    #[error("irc error: {0}")]
    IrcError(String),

    /// A tracker query was made while the tracker was disabled or still
    /// starting up.
    #[error("not tracking")]
    NotTracking,

    /// The line framer's buffer filled without finding a line terminator.
    #[error("buffer overflow: no line terminator within {0} bytes")]
    BufferOverflow(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_human_readable_messages() {
        assert_eq!(IrcCoreError::NotConnected.to_string(), "not connected");
        assert_eq!(
            IrcCoreError::InvalidArgument("empty nick".into()).to_string(),
            "invalid argument: empty nick"
        );
    }

    #[test]
    fn mode_parse_error_displays() {
        assert_eq!(
            ModeParseError::MissingModeModifier.to_string(),
            "missing mode modifier"
        );
        assert_eq!(
            ModeParseError::InvalidModeModifier { modifier: '3' }.to_string(),
            "invalid mode modifier: 3"
        );
    }

    #[test]
    fn parse_error_chains_as_source() {
        let err: IrcCoreError = MessageParseError::EmptyMessage.into();
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
    }
}
