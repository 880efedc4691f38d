//! Error types for gatecheck_core operations.

use std::fmt;
use thiserror::Error;

/// Marker the engine puts in the message of a rule rejection.
pub const ACCESS_DENIED_MARKER: &str = "access denied";

/// Engine error code for a rule rejection.
pub const ENGINE_ACCESS_DENIED: i32 = 5;
/// Engine error code for a generic missing resource.
pub const ENGINE_NOT_FOUND: i32 = 2;
/// Engine error code for a missing application.
pub const ENGINE_APP_NOT_FOUND: i32 = 1003;

/// Core error type for gatecheck_core operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// Transport could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// The engine sent a frame that could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session was already disconnected.
    #[error("session is closed")]
    SessionClosed,

    /// I/O error on the socket or the traffic dump.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine rule evaluation rejected the request.
    #[error("access denied ({reason}): {message}")]
    Authorization {
        /// How the denial was recognized
        reason: DenialReason,
        /// Message reported by the engine
        message: String,
    },

    /// Referenced app or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Engine error that is neither a denial nor a missing resource.
    #[error("engine error {code}: {message}")]
    Operation {
        /// Engine error code
        code: i32,
        /// Engine error message
        message: String,
    },

    /// Reload ran but the engine reported it as unsuccessful.
    #[error("reload failed")]
    ReloadFailed,

    /// A handle was used on a session that did not produce it.
    #[error("stale handle {id}: owned by session {owner}, used on session {session}")]
    StaleHandle {
        /// App or object id of the handle
        id: String,
        /// Session serial the handle belongs to
        owner: u64,
        /// Session serial it was used on
        session: u64,
    },

    /// Layout did not have the shape the caller asked for.
    #[error("malformed layout: {0}")]
    MalformedLayout(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Claims could not be signed into a token.
    #[error("token error: {0}")]
    Token(String),

    /// Request parameters could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification the scenario runner matches expectations against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure.
    Connection,
    /// Rule rejection.
    Authorization,
    /// Missing app or object.
    NotFound,
    /// Permitted but unsuccessful.
    Operation,
    /// Harness misconfiguration.
    Setup,
}

/// How an authorization failure was recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// The engine returned its access-denied error code.
    EngineCode(i32),
    /// The message carried the textual access-denied marker.
    ///
    /// The engine exposes no richer taxonomy than its message text, so this is
    /// kept as a compatibility shim.
    MessageMarker,
    /// The websocket upgrade was refused with this HTTP status.
    HandshakeRejected {
        /// HTTP status of the refused upgrade
        status: u16,
    },
    /// The engine accepted the socket but announced the session must authenticate.
    AuthenticationRequired,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineCode(code) => write!(f, "engine code {}", code),
            Self::MessageMarker => write!(f, "message marker"),
            Self::HandshakeRejected { status } => write!(f, "handshake rejected with {}", status),
            Self::AuthenticationRequired => write!(f, "authentication required"),
        }
    }
}

impl GateError {
    /// Classify an engine error response.
    pub fn from_engine(code: i32, parameter: Option<&str>, message: &str) -> Self {
        let text = match parameter {
            Some(p) if !p.is_empty() => format!("{} ({})", message, p),
            _ => message.to_string(),
        };

        if code == ENGINE_ACCESS_DENIED {
            return Self::Authorization {
                reason: DenialReason::EngineCode(code),
                message: text,
            };
        }
        if contains_access_denied(&text) {
            return Self::Authorization {
                reason: DenialReason::MessageMarker,
                message: text,
            };
        }
        match code {
            ENGINE_NOT_FOUND | ENGINE_APP_NOT_FOUND => Self::NotFound(text),
            _ => Self::Operation {
                code,
                message: text,
            },
        }
    }

    /// Returns the kind the scenario runner uses to compare outcomes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) | Self::Protocol(_) | Self::SessionClosed | Self::Io(_) => {
                ErrorKind::Connection
            }
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Operation { .. }
            | Self::ReloadFailed
            | Self::StaleHandle { .. }
            | Self::MalformedLayout(_) => ErrorKind::Operation,
            Self::Config(_) | Self::Token(_) | Self::Serialization(_) => ErrorKind::Setup,
        }
    }

    /// True when the engine (or its upgrade handshake) rejected the identity.
    pub fn is_access_denied(&self) -> bool {
        self.kind() == ErrorKind::Authorization
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Connection(_) => {
                Some("Check that the engine is running and the endpoint URL is reachable.")
            }
            Self::Authorization {
                reason: DenialReason::HandshakeRejected { .. },
                ..
            } => Some("The engine refused the token. Check the signing secret and the claims."),
            Self::Token(_) => Some("Claim values must be strings, booleans or string lists."),
            Self::Config(_) => Some("Run 'gatecheck run --config <file>' with a valid TOML file."),
            Self::StaleHandle { .. } => {
                Some("Handles are only valid on the session that produced them; open the app again.")
            }
            _ => None,
        }
    }
}

/// Case-insensitive check for the access-denied marker.
pub fn contains_access_denied(message: &str) -> bool {
    message.to_lowercase().contains(ACCESS_DENIED_MARKER)
}

/// Convenience Result type for gatecheck_core operations.
pub type Result<T> = std::result::Result<T, GateError>;
