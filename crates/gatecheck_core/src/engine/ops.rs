//! Typed operations against apps and objects of a session.

use crate::engine::protocol::{InfoResult, Layout, LayoutResult, ObjectInfo, ObjectRef, Returned};
use crate::engine::session::{AppHandle, ObjectHandle, Session};
use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Initial page fetched for a data-bound object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub height: u32,
    pub width: u32,
}

/// Properties for `CreateObject`.
#[derive(Debug, Clone)]
pub struct ObjectDefinition {
    id: String,
    kind: String,
    properties: Value,
}

impl ObjectDefinition {
    /// A sheet: a container whose children expose their metadata fields.
    pub fn sheet(id: &str) -> Self {
        Self::custom(
            id,
            "sheet",
            json!({
                "qChildListDef": {
                    "qData": {
                        "title": "/title",
                        "description": "/description",
                        "meta": "/meta",
                        "order": "/order",
                        "type": "/qInfo/qType",
                        "id": "/qInfo/qId",
                        "lb": "/qListObjectDef",
                        "hc": "/qHyperCubeDef"
                    }
                }
            }),
        )
    }

    /// A data-bound object with one inline dimension per field.
    pub fn cube(id: &str, kind: &str, dimensions: &[String], window: FetchWindow) -> Self {
        let dimensions: Vec<Value> = dimensions
            .iter()
            .map(|field| json!({ "qDef": { "qFieldDefs": [field] } }))
            .collect();

        Self::custom(
            id,
            kind,
            json!({
                "qHyperCubeDef": {
                    "qDimensions": dimensions,
                    "qInitialDataFetch": [{
                        "qTop": 0,
                        "qLeft": 0,
                        "qHeight": window.height,
                        "qWidth": window.width
                    }]
                }
            }),
        )
    }

    /// Arbitrary properties; `qInfo` is set from `id` and `kind`.
    pub fn custom(id: &str, kind: &str, properties: Value) -> Self {
        let mut properties = match properties {
            Value::Object(map) => Value::Object(map),
            _ => json!({}),
        };
        properties["qInfo"] = json!({ "qId": id, "qType": kind });

        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            properties,
        }
    }

    /// Object id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Object type marker.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Full property tree sent to the engine.
    pub fn properties(&self) -> &Value {
        &self.properties
    }
}

/// Two columns projected out of a layout, in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl TabularResult {
    /// Project column 0 (text) and column 1 (number) of the first data page.
    pub fn from_layout(layout: &Layout) -> Result<Self> {
        let cube = layout.hypercube.as_ref().ok_or_else(|| {
            GateError::MalformedLayout(format!("object {} has no hypercube", layout.info.id))
        })?;
        let page = cube.data_pages.first().ok_or_else(|| {
            GateError::MalformedLayout(format!("object {} has no data page", layout.info.id))
        })?;

        let mut result = TabularResult {
            labels: Vec::with_capacity(page.matrix.len()),
            values: Vec::with_capacity(page.matrix.len()),
        };
        for (i, row) in page.matrix.iter().enumerate() {
            match row.as_slice() {
                [label, value, ..] => {
                    result.labels.push(label.text.clone());
                    result.values.push(value.num);
                }
                _ => {
                    return Err(GateError::MalformedLayout(format!(
                        "row {} has {} cells, need at least 2",
                        i,
                        row.len()
                    )))
                }
            }
        }
        Ok(result)
    }

    /// Row `index` as a `(label, value)` pair.
    pub fn row(&self, index: usize) -> Option<(&str, f64)> {
        Some((self.labels.get(index)?.as_str(), *self.values.get(index)?))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when no rows were fetched.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Session {
    /// Create an object in `app`. Needs create rights.
    pub fn create_object(
        &mut self,
        app: &AppHandle,
        definition: &ObjectDefinition,
    ) -> Result<ObjectHandle> {
        self.check_owner(app.session, app.id())?;

        let created: Returned<ObjectRef> = self.call(
            app.handle,
            "CreateObject",
            json!({ "qProp": definition.properties() }),
        )?;
        let handle = created
            .value
            .handle
            .ok_or_else(|| GateError::Protocol("CreateObject returned no handle".into()))?;

        let id = non_empty(created.value.generic_id).unwrap_or_else(|| definition.id().to_string());
        let kind = created
            .value
            .generic_type
            .and_then(non_empty)
            .unwrap_or_else(|| definition.kind().to_string());

        info!(app = app.id(), object = %id, kind = %kind, "created object");
        Ok(ObjectHandle::new(app, handle, id, kind))
    }

    /// Fetch an existing object by id. Needs read rights.
    pub fn read_object(&mut self, app: &AppHandle, id: &str) -> Result<ObjectHandle> {
        self.check_owner(app.session, app.id())?;

        let found: Returned<ObjectRef> =
            self.call(app.handle, "GetObject", json!({ "qId": id }))?;
        let handle = found
            .value
            .handle
            .ok_or_else(|| GateError::NotFound(format!("object {} in app {}", id, app.id())))?;

        let resolved = non_empty(found.value.generic_id).unwrap_or_else(|| id.to_string());
        let kind = found.value.generic_type.and_then(non_empty).unwrap_or_default();
        debug!(app = app.id(), object = id, resolved = %resolved, handle, "read object");
        Ok(ObjectHandle::new(app, handle, resolved, kind))
    }

    /// Id and type marker of an object.
    pub fn object_info(&mut self, object: &ObjectHandle) -> Result<ObjectInfo> {
        self.check_owner(object.session, object.id())?;
        let info: InfoResult = self.call(object.handle, "GetInfo", json!({}))?;
        Ok(info.info)
    }

    /// Evaluated layout of an object. Needs view rights.
    pub fn get_layout(&mut self, object: &ObjectHandle) -> Result<Layout> {
        self.check_owner(object.session, object.id())?;
        let result: LayoutResult = self.call(object.handle, "GetLayout", json!({}))?;
        Ok(result.layout)
    }

    /// Replace the load script of `app` and reload it. Needs reload rights.
    ///
    /// # Errors
    ///
    /// `ReloadFailed` when the reload ran but the engine reported failure; this
    /// is never classified as a denial.
    pub fn set_script_and_reload(&mut self, app: &AppHandle, script: &str) -> Result<()> {
        self.check_owner(app.session, app.id())?;

        let _: Value = self.call(app.handle, "SetScript", json!({ "qScript": script }))?;
        let reloaded: Returned<bool> = self.call(
            app.handle,
            "DoReload",
            json!({ "qMode": 0, "qPartial": false, "qDebug": false }),
        )?;

        if !reloaded.value {
            return Err(GateError::ReloadFailed);
        }
        info!(app = app.id(), "reloaded app");
        Ok(())
    }

    /// Persist pending object changes of `app`.
    pub fn save_objects(&mut self, app: &AppHandle) -> Result<()> {
        self.check_owner(app.session, app.id())?;
        let _: Value = self.call(app.handle, "SaveObjects", json!({}))?;
        Ok(())
    }

    /// Persist `app`.
    pub fn save_app(&mut self, app: &AppHandle) -> Result<()> {
        self.check_owner(app.session, app.id())?;
        let _: Value = self.call(app.handle, "DoSave", json!({ "qFileName": "" }))?;
        Ok(())
    }

    /// Fetch the layout of `object` and project its first two columns.
    pub fn read_tabular_result(&mut self, object: &ObjectHandle) -> Result<TabularResult> {
        let layout = self.get_layout(object)?;
        TabularResult::from_layout(&layout)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
