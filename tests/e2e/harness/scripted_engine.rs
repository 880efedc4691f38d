use anyhow::{Context, Result};
use gatecheck_core::engine::protocol::JsonRpcMessage;
use serde_json::Value;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tungstenite::{Message, WebSocket};

/// What a scripted engine does with one request.
pub enum Reply {
    /// Answer with this `result`.
    Result(Value),
    /// Read the request and never answer it.
    Silent,
    /// Close the socket instead of answering.
    Close,
}

type Script = dyn Fn(&str, &Value) -> Reply + Send + Sync;

/// Engine whose answers come from a closure over method and params.
///
/// Used for transport edges and misbehaving engines that the rule-driven
/// [`MockEngine`](super::MockEngine) never produces.
pub struct ScriptedEngine {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
}

impl ScriptedEngine {
    pub fn start<F>(script: F) -> Result<Self>
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        let script: Arc<Script> = Arc::new(script);
        Self::spawn(move |socket, shutdown| answer(socket, &*script, &shutdown))
    }

    /// Engine that completes the handshake and then never reads again,
    /// so close frames go unanswered.
    pub fn unresponsive() -> Result<Self> {
        Self::spawn(|socket, shutdown| {
            while !shutdown.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(20));
            }
            drop(socket);
        })
    }

    fn spawn<F>(handler: F) -> Result<Self>
    where
        F: Fn(WebSocket<TcpStream>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        let listener =
            TcpListener::bind("127.0.0.1:0").context("Failed to bind scripted engine")?;
        let addr = listener.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let handler = Arc::new(handler);

        let flag = Arc::clone(&shutdown);
        thread::spawn(move || {
            for stream in listener.incoming() {
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let Ok(socket) = tungstenite::accept(stream) else {
                    continue;
                };
                let handler = Arc::clone(&handler);
                let flag = Arc::clone(&flag);
                thread::spawn(move || (*handler)(socket, flag));
            }
        });

        Ok(Self { addr, shutdown })
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}", self.addr)
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
    }
}

fn answer(mut socket: WebSocket<TcpStream>, script: &Script, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        let text = match socket.read() {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let Ok(request) = serde_json::from_str::<JsonRpcMessage>(text.as_str()) else {
            continue;
        };
        let (Some(id), Some(method)) = (request.id, request.method.as_deref()) else {
            continue;
        };
        let params = request.params.clone().unwrap_or(Value::Null);

        match script(method, &params) {
            Reply::Result(result) => {
                let Ok(text) = serde_json::to_string(&JsonRpcMessage::response(id, result)) else {
                    break;
                };
                if socket.send(Message::text(text)).is_err() {
                    break;
                }
            }
            Reply::Silent => {}
            Reply::Close => {
                let _ = socket.close(None);
                let _ = socket.flush();
                break;
            }
        }
    }
}
