//! Authenticated websocket session to one engine instance.
//!
//! Handles connecting with an optional bearer credential, sending engine
//! requests and reading their responses (skipping interleaved notifications),
//! and releasing the connection exactly once.

use crate::engine::protocol::{CreatedDoc, JsonRpcMessage, ObjectRef, Returned, GLOBAL_HANDLE};
use crate::engine::traffic::{Direction, TrafficLog};
use crate::error::{DenialReason, GateError, Result};
use crate::token::Credential;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io::ErrorKind as IoErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::client::ClientHandshake;
use tungstenite::handshake::HandshakeError;
use tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tungstenite::{Message, WebSocket};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Longest `disconnect` waits for the engine to answer the close frame.
const CLOSE_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport options for [`Session::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Socket read/write timeout for every request.
    pub request_timeout: Duration,
    /// Optional traffic dump file.
    pub traffic_dump: Option<PathBuf>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            traffic_dump: None,
        }
    }
}

/// An application opened or created within a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHandle {
    pub(crate) session: u64,
    pub(crate) handle: i64,
    id: String,
}

impl AppHandle {
    /// Application id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Engine handle number.
    pub fn handle(&self) -> i64 {
        self.handle
    }

    /// Serial of the session that produced this handle.
    pub fn session_serial(&self) -> u64 {
        self.session
    }
}

/// A generic object inside an [`AppHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub(crate) session: u64,
    pub(crate) handle: i64,
    app: String,
    id: String,
    kind: String,
}

impl ObjectHandle {
    pub(crate) fn new(app: &AppHandle, handle: i64, id: String, kind: String) -> Self {
        Self {
            session: app.session,
            handle,
            app: app.id.clone(),
            id,
            kind,
        }
    }

    /// Object id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Object type marker, e.g. `sheet`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Id of the owning application.
    pub fn app_id(&self) -> &str {
        &self.app
    }

    /// Engine handle number.
    pub fn handle(&self) -> i64 {
        self.handle
    }
}

/// One live connection to one engine endpoint, under one identity.
///
/// All calls are blocking round trips. The connection is released by
/// [`Session::disconnect`] or, failing that, when the session is dropped.
pub struct Session {
    socket: Option<WebSocket<TcpStream>>,
    endpoint: String,
    serial: u64,
    next_id: u64,
    traffic: Option<TrafficLog>,
}

impl Session {
    /// Connect to `endpoint`, presenting `credential` as a bearer token if given.
    ///
    /// # Errors
    ///
    /// - `Authorization` when the engine refuses the upgrade with 401/403
    /// - `Connection` for unsupported schemes, unreachable hosts, timeouts and
    ///   any other handshake failure
    pub fn connect(
        endpoint: &str,
        credential: Option<&Credential>,
        options: &ConnectOptions,
    ) -> Result<Self> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| GateError::Connection(format!("invalid endpoint {}: {}", endpoint, e)))?;

        if request.uri().scheme_str() != Some("ws") {
            return Err(GateError::Connection(format!(
                "unsupported endpoint scheme in {} (only ws:// is supported)",
                endpoint
            )));
        }

        let host = request
            .uri()
            .host()
            .ok_or_else(|| GateError::Connection(format!("endpoint {} has no host", endpoint)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = request.uri().port_u16().unwrap_or(80);

        if let Some(credential) = credential {
            let value = HeaderValue::from_str(&credential.bearer())
                .map_err(|e| GateError::Token(format!("token is not a valid header: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let traffic = match &options.traffic_dump {
            Some(path) => Some(TrafficLog::open(path)?),
            None => None,
        };

        let stream = open_stream(&host, port, options)?;
        let (socket, _response) =
            tungstenite::client(request, stream).map_err(handshake_error)?;

        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        info!(
            endpoint,
            session = serial,
            authenticated = credential.is_some(),
            "connected to engine"
        );

        Ok(Self {
            socket: Some(socket),
            endpoint: endpoint.to_string(),
            serial,
            next_id: 1,
            traffic,
        })
    }

    /// Process-unique serial of this session.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Endpoint this session is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// True until the session is disconnected or the engine closes it.
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Release the connection. Calling it again is a no-op.
    pub fn disconnect(&mut self) {
        let Some(mut socket) = self.socket.take() else {
            return;
        };

        if let Err(e) = socket.close(None) {
            debug!(session = self.serial, error = %e, "close frame not sent");
        } else {
            let stream = socket.get_ref();
            let wait = match stream.read_timeout() {
                Ok(Some(timeout)) => timeout.min(CLOSE_REPLY_TIMEOUT),
                _ => CLOSE_REPLY_TIMEOUT,
            };
            if let Err(e) = stream.set_read_timeout(Some(wait)) {
                debug!(session = self.serial, error = %e, "close reply wait not bounded");
            } else {
                while socket.read().is_ok() {}
            }
        }

        info!(endpoint = %self.endpoint, session = self.serial, "disconnected from engine");
    }

    /// Create a new application named `name`.
    pub fn create_app(&mut self, name: &str) -> Result<AppHandle> {
        let created: CreatedDoc = self.call(
            GLOBAL_HANDLE,
            "CreateDocEx",
            json!({
                "qDocName": name,
                "qUserName": "",
                "qPassword": "",
                "qSerial": "",
                "qLocalizedScriptMainSection": "Main",
            }),
        )?;

        let handle = created
            .doc
            .handle
            .ok_or_else(|| GateError::Protocol("CreateDocEx returned no handle".into()))?;
        let id = if created.doc_id.is_empty() {
            created.doc.generic_id
        } else {
            created.doc_id
        };
        if id.is_empty() {
            return Err(GateError::Protocol("CreateDocEx returned an empty app id".into()));
        }

        info!(session = self.serial, app = %id, name, "created app");
        Ok(AppHandle {
            session: self.serial,
            handle,
            id,
        })
    }

    /// Open an existing application by id (or name, for file-backed engines).
    pub fn open_app(&mut self, id: &str) -> Result<AppHandle> {
        let opened: Returned<ObjectRef> = self.call(
            GLOBAL_HANDLE,
            "OpenDoc",
            json!({
                "qDocName": id,
                "qUserName": "",
                "qPassword": "",
                "qSerial": "",
                "qNoData": false,
            }),
        )?;

        let handle = opened
            .value
            .handle
            .ok_or_else(|| GateError::NotFound(format!("app {}", id)))?;

        debug!(session = self.serial, app = id, handle, "opened app");
        Ok(AppHandle {
            session: self.serial,
            handle,
            id: id.to_string(),
        })
    }

    /// Reject handles produced by another (or a closed) session.
    pub(crate) fn check_owner(&self, owner: u64, id: &str) -> Result<()> {
        if self.socket.is_none() {
            return Err(GateError::SessionClosed);
        }
        if owner != self.serial {
            return Err(GateError::StaleHandle {
                id: id.to_string(),
                owner,
                session: self.serial,
            });
        }
        Ok(())
    }

    /// Send a request on `handle` and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns the classified engine error, or a transport error if the
    /// connection fails while waiting.
    pub(crate) fn call<R: DeserializeOwned>(
        &mut self,
        handle: i64,
        method: &str,
        params: Value,
    ) -> Result<R> {
        if self.socket.is_none() {
            return Err(GateError::SessionClosed);
        }

        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcMessage::request(id, handle, method, params);
        self.send_message(&request)?;

        // Read until our response arrives; the engine interleaves notifications.
        loop {
            let message = self.read_message()?;

            if message.is_response() && message.id == Some(id) {
                if let Some(error) = message.error {
                    let err = GateError::from_engine(
                        error.code,
                        error.parameter.as_deref(),
                        &error.message,
                    );
                    debug!(session = self.serial, method, id, error = %err, "engine call failed");
                    return Err(err);
                }

                let result = message.result.unwrap_or(Value::Null);
                return serde_json::from_value(result).map_err(|e| {
                    GateError::Protocol(format!("unexpected {} result: {}", method, e))
                });
            }

            if message.is_notification() {
                self.handle_notification(&message)?;
            }
        }
    }

    fn handle_notification(&mut self, message: &JsonRpcMessage) -> Result<()> {
        let method = message.method.as_deref().unwrap_or_default();
        let params = message.params.clone().unwrap_or(Value::Null);
        debug!(session = self.serial, method, %params, "engine notification");

        if method == "OnAuthenticationInformation"
            && params.get("mustAuthenticate").and_then(Value::as_bool) == Some(true)
        {
            return Err(GateError::Authorization {
                reason: DenialReason::AuthenticationRequired,
                message: "engine requires authentication for this session".to_string(),
            });
        }
        Ok(())
    }

    fn send_message(&mut self, message: &JsonRpcMessage) -> Result<()> {
        let json =
            serde_json::to_string(message).map_err(|e| GateError::Serialization(e.to_string()))?;
        self.capture(Direction::Sent, &json);

        let socket = self.socket.as_mut().ok_or(GateError::SessionClosed)?;
        socket.send(Message::text(json)).map_err(transport_error)
    }

    fn read_message(&mut self) -> Result<JsonRpcMessage> {
        loop {
            let socket = self.socket.as_mut().ok_or(GateError::SessionClosed)?;
            let frame = match socket.read() {
                Ok(frame) => frame,
                Err(e) => {
                    let err = transport_error(e);
                    if matches!(err, GateError::SessionClosed) {
                        self.socket = None;
                    }
                    return Err(err);
                }
            };

            match frame {
                Message::Text(text) => {
                    self.capture(Direction::Received, text.as_str());
                    return serde_json::from_str(text.as_str())
                        .map_err(|e| GateError::Protocol(format!("undecodable frame: {}", e)));
                }
                Message::Close(frame) => {
                    self.socket = None;
                    let reason = frame
                        .map(|f| format!(" ({}: {})", u16::from(f.code), f.reason))
                        .unwrap_or_default();
                    return Err(GateError::Connection(format!(
                        "engine closed the connection{}",
                        reason
                    )));
                }
                // Pings are answered by tungstenite on the next write.
                _ => continue,
            }
        }
    }

    fn capture(&mut self, direction: Direction, frame: &str) {
        if let Some(log) = self.traffic.as_mut() {
            if let Err(e) = log.record(direction, frame) {
                warn!(error = %e, "failed to write traffic dump");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("serial", &self.serial)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn nonzero(duration: Duration) -> Option<Duration> {
    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}

fn open_stream(host: &str, port: u16, options: &ConnectOptions) -> Result<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| GateError::Connection(format!("cannot resolve {}:{}: {}", host, port, e)))?;

    let mut last_error = None;
    for addr in addrs {
        let attempt = match nonzero(options.connect_timeout) {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                stream.set_read_timeout(nonzero(options.request_timeout))?;
                stream.set_write_timeout(nonzero(options.request_timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(GateError::Connection(match last_error {
        Some(e) => format!("cannot connect to {}:{}: {}", host, port, e),
        None => format!("no address found for {}:{}", host, port),
    }))
}

fn handshake_error(err: HandshakeError<ClientHandshake<TcpStream>>) -> GateError {
    match err {
        HandshakeError::Failure(tungstenite::Error::Http(response)) => {
            let status = response.status().as_u16();
            let body = response
                .body()
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).trim().to_string())
                .filter(|b| !b.is_empty())
                .map(|b| format!(": {}", b))
                .unwrap_or_default();

            if status == 401 || status == 403 {
                GateError::Authorization {
                    reason: DenialReason::HandshakeRejected { status },
                    message: format!("engine refused the websocket upgrade{}", body),
                }
            } else {
                GateError::Connection(format!("websocket upgrade failed with HTTP {}{}", status, body))
            }
        }
        HandshakeError::Failure(e) => transport_error(e),
        HandshakeError::Interrupted(_) => {
            GateError::Connection("websocket handshake interrupted".to_string())
        }
    }
}

fn transport_error(err: tungstenite::Error) -> GateError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            GateError::SessionClosed
        }
        tungstenite::Error::Io(e)
            if matches!(e.kind(), IoErrorKind::WouldBlock | IoErrorKind::TimedOut) =>
        {
            GateError::Connection("request timed out".to_string())
        }
        other => GateError::Connection(other.to_string()),
    }
}
