//! Client side of the engine: wire protocol, session and operations.

pub mod ops;
pub mod protocol;
pub mod session;
pub mod traffic;

pub use ops::{FetchWindow, ObjectDefinition, TabularResult};
pub use protocol::{Cell, Layout, ObjectInfo};
pub use session::{AppHandle, ConnectOptions, ObjectHandle, Session};
pub use traffic::TrafficLog;
