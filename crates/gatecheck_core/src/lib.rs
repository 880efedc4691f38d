//! Gatecheck Core Library
//!
//! An access-rule test harness for an analytics engine reached over websocket
//! JSON-RPC, providing:
//! - Claim sets signed into bearer tokens
//! - Authenticated engine sessions with typed app and object operations
//! - Error classification that tells rule denials apart from other failures
//! - Declarative scenarios and suites with per-step expectations
//!
//! # Quick Start
//!
//! ```
//! use gatecheck_core::{ClaimSet, TokenIssuer};
//!
//! let issuer = TokenIssuer::fixture();
//! let claims = ClaimSet::subject("someCreateUser").with("allowCreate", true);
//!
//! // Anonymous identities get no credential at all
//! assert!(issuer.issue(None).unwrap().is_none());
//!
//! let credential = issuer.issue(Some(&claims)).unwrap().unwrap();
//! assert!(credential.bearer().starts_with("Bearer "));
//! ```
//!
//! # Scenarios
//!
//! A scenario states what one identity may and may not do:
//!
//! ```
//! use gatecheck_core::scenario::{fixtures, Expectation, Scenario};
//!
//! let scenario = Scenario::new("view user")
//!     .as_identity(fixtures::view_user())
//!     .create_app(fixtures::FORBIDDEN_APP)
//!     .denied()
//!     .open_app(fixtures::APP_ID)
//!     .read_object_of_kind(fixtures::MOVIES_OBJECT_ID, "movies")
//!     .reload_movies()
//!     .denied();
//!
//! assert_eq!(scenario.steps().len(), 4);
//! assert_eq!(scenario.steps()[3].expect, Expectation::Denied);
//! ```
//!
//! Running it needs a live engine:
//!
//! ```no_run
//! use gatecheck_core::{ConnectOptions, TokenIssuer};
//! use gatecheck_core::scenario::{fixtures, Scenario};
//!
//! let result = Scenario::new("admin")
//!     .as_identity(fixtures::admin())
//!     .create_app(fixtures::APP_ID)
//!     .create_sheet(fixtures::SHEET_ID)
//!     .save_objects()
//!     .run("ws://localhost:9076", &TokenIssuer::fixture(), &ConnectOptions::default());
//! result.unwrap();
//! ```

mod config;
pub mod engine;
mod error;
pub mod scenario;
mod token;

pub use config::{Config, ConnectionConfig, SigningConfig, SuiteConfig, CONFIG_FILE};
pub use engine::{
    AppHandle, Cell, ConnectOptions, FetchWindow, Layout, ObjectDefinition, ObjectHandle,
    ObjectInfo, Session, TabularResult, TrafficLog,
};
pub use error::{
    contains_access_denied, DenialReason, ErrorKind, GateError, Result, ACCESS_DENIED_MARKER,
};
pub use token::{ClaimSet, ClaimValue, Credential, TokenIssuer, FIXTURE_SECRET};
