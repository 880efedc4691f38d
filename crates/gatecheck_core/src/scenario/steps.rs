use crate::error::{ErrorKind, GateError};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_height() -> u32 {
    50
}

/// All possible actions in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    // Session layer
    CreateApp {
        name: String,
        /// Key later scenarios use to open the app (default: `name`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    OpenApp {
        /// Alias recorded by an earlier `create_app`, or a literal app id.
        app: String,
    },
    Disconnect,
    Reconnect,

    // Objects
    CreateSheet {
        id: String,
    },
    CreateCube {
        id: String,
        kind: String,
        dimensions: Vec<String>,
        #[serde(default = "default_height")]
        height: u32,
        /// Defaults to one column per dimension.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
    },
    ReadObject {
        id: String,
        /// Type marker the object must carry.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
    GetLayout {
        id: String,
    },

    // Data and persistence
    Reload {
        script: String,
    },
    SaveObjects,
    SaveApp,

    // Content checks
    ExpectRow {
        object: String,
        row: usize,
        label: String,
        value: f64,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateApp { name, .. } => write!(f, "create app {}", name),
            Self::OpenApp { app } => write!(f, "open app {}", app),
            Self::Disconnect => write!(f, "disconnect"),
            Self::Reconnect => write!(f, "reconnect"),
            Self::CreateSheet { id } => write!(f, "create sheet {}", id),
            Self::CreateCube { id, kind, .. } => write!(f, "create {} object {}", kind, id),
            Self::ReadObject { id, .. } => write!(f, "read object {}", id),
            Self::GetLayout { id } => write!(f, "get layout of {}", id),
            Self::Reload { .. } => write!(f, "reload"),
            Self::SaveObjects => write!(f, "save objects"),
            Self::SaveApp => write!(f, "save app"),
            Self::ExpectRow { object, row, .. } => write!(f, "check row {} of {}", row, object),
        }
    }
}

/// Expected outcome of one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    #[default]
    Allowed,
    Denied,
    NotFound,
    Failed,
    Unreachable,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::NotFound => "not found",
            Self::Failed => "failed",
            Self::Unreachable => "unreachable",
        };
        f.write_str(s)
    }
}

/// A step and the outcome it must have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(flatten)]
    pub step: Step,
    #[serde(default)]
    pub expect: Expectation,
}

impl StepSpec {
    /// Step expected to be allowed.
    pub fn allowed(step: Step) -> Self {
        Self {
            step,
            expect: Expectation::Allowed,
        }
    }
}

/// What actually happened when a step ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Allowed,
    Denied(String),
    NotFound(String),
    Failed(String),
    Unreachable(String),
    /// Harness-side problem (bad scenario, failed content check); matches nothing.
    Invalid(String),
}

impl Outcome {
    /// Classify an engine error.
    pub fn from_error(err: &GateError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Authorization => Self::Denied(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Operation => Self::Failed(message),
            ErrorKind::Connection => Self::Unreachable(message),
            ErrorKind::Setup => Self::Invalid(message),
        }
    }

    /// True when this outcome is what `expectation` asked for.
    pub fn matches(&self, expectation: Expectation) -> bool {
        matches!(
            (self, expectation),
            (Self::Allowed, Expectation::Allowed)
                | (Self::Denied(_), Expectation::Denied)
                | (Self::NotFound(_), Expectation::NotFound)
                | (Self::Failed(_), Expectation::Failed)
                | (Self::Unreachable(_), Expectation::Unreachable)
        )
    }

    /// True for a rule rejection.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => write!(f, "allowed"),
            Self::Denied(m) => write!(f, "denied: {}", m),
            Self::NotFound(m) => write!(f, "not found: {}", m),
            Self::Failed(m) => write!(f, "failed: {}", m),
            Self::Unreachable(m) => write!(f, "unreachable: {}", m),
            Self::Invalid(m) => write!(f, "invalid: {}", m),
        }
    }
}
