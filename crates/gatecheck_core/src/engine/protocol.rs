//! Engine wire types and message handling.
//!
//! The engine speaks JSON-RPC 2.0 over websocket text frames, with one extra
//! envelope field: `handle`, the remote object the method is invoked on.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Handle of the engine's global object.
pub const GLOBAL_HANDLE: i64 = -1;

/// JSON-RPC message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: String, // Always "2.0"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error as reported by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl JsonRpcMessage {
    /// Create a request message.
    pub fn request(id: u64, handle: i64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            handle: Some(handle),
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    /// Create a success response.
    pub fn response(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            handle: None,
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error_response(id: u64, code: i32, parameter: &str, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            handle: None,
            method: None,
            params: None,
            result: None,
            error: Some(JsonRpcError {
                code,
                parameter: Some(parameter.to_string()),
                message: message.to_string(),
            }),
        }
    }

    /// Create a notification message.
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            handle: None,
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    /// Check if this is a response.
    pub fn is_response(&self) -> bool {
        self.id.is_some() && self.method.is_none()
    }

    /// Check if this is a notification.
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }
}

/// Reference to a remote object returned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(rename = "qType", default)]
    pub kind: Option<String>,
    /// `None` when the engine could not resolve the object.
    #[serde(rename = "qHandle", default)]
    pub handle: Option<i64>,
    #[serde(rename = "qGenericId", default)]
    pub generic_id: String,
    #[serde(rename = "qGenericType", default, skip_serializing_if = "Option::is_none")]
    pub generic_type: Option<String>,
}

/// `{"qReturn": ...}` result wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Returned<T> {
    #[serde(rename = "qReturn")]
    pub value: T,
}

/// Result of `CreateDocEx`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedDoc {
    #[serde(rename = "qDocId", default)]
    pub doc_id: String,
    #[serde(rename = "qReturn")]
    pub doc: ObjectRef,
}

/// Identity of an object inside an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    #[serde(rename = "qId")]
    pub id: String,
    #[serde(rename = "qType")]
    pub kind: String,
}

/// Result of `GetInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResult {
    #[serde(rename = "qInfo")]
    pub info: ObjectInfo,
}

/// Result of `GetLayout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutResult {
    #[serde(rename = "qLayout")]
    pub layout: Layout,
}

/// Evaluated layout of a generic object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    #[serde(rename = "qInfo")]
    pub info: ObjectInfo,
    #[serde(rename = "qHyperCube", default, skip_serializing_if = "Option::is_none")]
    pub hypercube: Option<HyperCube>,
}

impl Layout {
    /// Rows of the first data page, empty when there is none.
    pub fn rows(&self) -> &[Vec<Cell>] {
        self.hypercube
            .as_ref()
            .and_then(|cube| cube.data_pages.first())
            .map(|page| page.matrix.as_slice())
            .unwrap_or(&[])
    }
}

/// Evaluated hypercube.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HyperCube {
    #[serde(rename = "qDataPages", default)]
    pub data_pages: Vec<DataPage>,
}

/// One fetched page of a hypercube.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataPage {
    #[serde(rename = "qMatrix", default)]
    pub matrix: Vec<Vec<Cell>>,
}

/// A single hypercube cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    #[serde(rename = "qText", default)]
    pub text: String,
    /// `NaN` for cells without a numeric representation.
    #[serde(rename = "qNum", default = "nan", deserialize_with = "number_or_nan")]
    pub num: f64,
}

impl Cell {
    /// Cell with text and number.
    pub fn new(text: impl Into<String>, num: f64) -> Self {
        Self {
            text: text.into(),
            num,
        }
    }
}

fn nan() -> f64 {
    f64::NAN
}

/// The engine encodes non-numeric cells as the string `"NaN"`.
fn number_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
        Null(()),
    }

    Ok(match NumOrText::deserialize(deserializer)? {
        NumOrText::Num(n) => n,
        NumOrText::Text(s) => s.parse().unwrap_or(f64::NAN),
        NumOrText::Null(()) => f64::NAN,
    })
}
