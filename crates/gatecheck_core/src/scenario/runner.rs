use super::builder::Scenario;
use super::report::{Mismatch, ScenarioResult};
use super::steps::{Outcome, Step};
use crate::engine::{
    AppHandle, ConnectOptions, FetchWindow, ObjectDefinition, ObjectHandle, Session,
};
use crate::error::GateError;
use crate::token::{Credential, TokenIssuer};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Why a step did not complete.
enum StepError {
    /// The engine (or transport) reported an error; classified against the expectation.
    Engine(GateError),
    /// The step completed but its result was wrong, or the scenario is malformed.
    Check(String),
}

impl From<GateError> for StepError {
    fn from(err: GateError) -> Self {
        Self::Engine(err)
    }
}

type StepResult<T> = std::result::Result<T, StepError>;

/// State that outlives one scenario within a suite.
#[derive(Debug, Default)]
pub struct SuiteContext {
    apps: HashMap<String, String>,
}

impl SuiteContext {
    /// Remember the id the engine assigned to an app created under `alias`.
    pub fn record_app(&mut self, alias: &str, id: &str) {
        self.apps.insert(alias.to_string(), id.to_string());
    }

    /// Id recorded for `alias`.
    pub fn app_id(&self, alias: &str) -> Option<&str> {
        self.apps.get(alias).map(String::as_str)
    }

    /// Recorded id for `key`, or `key` itself as a literal app id.
    pub fn resolve_app<'a>(&'a self, key: &'a str) -> &'a str {
        self.app_id(key).unwrap_or(key)
    }
}

/// Per-scenario state: the session and the app and objects opened on it.
struct ScenarioContext {
    credential: Option<Credential>,
    session: Option<Session>,
    app: Option<AppHandle>,
    objects: HashMap<String, ObjectHandle>,
}

impl ScenarioContext {
    fn new(credential: Option<Credential>) -> Self {
        Self {
            credential,
            session: None,
            app: None,
            objects: HashMap::new(),
        }
    }

    fn connect(&mut self, endpoint: &str, options: &ConnectOptions) -> crate::Result<()> {
        let session = Session::connect(endpoint, self.credential.as_ref(), options)?;
        self.session = Some(session);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_connected)
    }

    /// Disconnect and forget everything opened on the session.
    fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.disconnect();
        }
        self.app = None;
        self.objects.clear();
    }

    fn session(&mut self) -> StepResult<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| StepError::Check("no session".to_string()))
    }

    fn session_and_app(&mut self) -> StepResult<(&mut Session, &AppHandle)> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| StepError::Check("no session".to_string()))?;
        let app = self.app.as_ref().ok_or_else(|| {
            StepError::Check("no app is open; add a create_app or open_app step first".to_string())
        })?;
        Ok((session, app))
    }

    /// Handle for `id`, reading the object from the open app if not seen yet.
    fn object(&mut self, id: &str) -> StepResult<ObjectHandle> {
        if let Some(object) = self.objects.get(id) {
            return Ok(object.clone());
        }
        let (session, app) = self.session_and_app()?;
        let object = session.read_object(app, id)?;
        self.objects.insert(id.to_string(), object.clone());
        Ok(object)
    }
}

/// Executes scenarios against one engine endpoint
pub struct ScenarioRunner<'a> {
    endpoint: &'a str,
    issuer: &'a TokenIssuer,
    options: &'a ConnectOptions,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(endpoint: &'a str, issuer: &'a TokenIssuer, options: &'a ConnectOptions) -> Self {
        Self {
            endpoint,
            issuer,
            options,
        }
    }

    /// Run one scenario. The session is always released before returning.
    pub fn run(&self, scenario: &Scenario, suite: &mut SuiteContext) -> ScenarioResult {
        let identity = scenario
            .claims()
            .map(|c| c.sub().unwrap_or("<no sub>"))
            .unwrap_or("anonymous");
        info!(scenario = scenario.name(), identity, "running scenario");

        let credential = match self.issuer.issue(scenario.claims()) {
            Ok(credential) => credential,
            Err(e) => return ScenarioResult::failed(scenario.name(), 0, e.to_string()),
        };

        let mut context = ScenarioContext::new(credential);
        let result = self.execute(scenario, suite, &mut context);
        context.release();

        if result.success {
            info!(scenario = scenario.name(), steps = result.steps_executed, "scenario passed");
        } else {
            warn!(
                scenario = scenario.name(),
                step = result.failure_step.unwrap_or(0),
                error = result.error.as_deref().unwrap_or_default(),
                "scenario failed"
            );
        }
        result
    }

    fn execute(
        &self,
        scenario: &Scenario,
        suite: &mut SuiteContext,
        context: &mut ScenarioContext,
    ) -> ScenarioResult {
        let name = scenario.name();

        let outcome = match context.connect(self.endpoint, self.options) {
            Ok(()) => Outcome::Allowed,
            Err(e) => Outcome::from_error(&e),
        };
        if scenario.expects_rejection() && outcome.is_denied() {
            return ScenarioResult::passed(name, 1);
        }
        if !outcome.matches(scenario.connect_expectation()) {
            return ScenarioResult::mismatched(
                name,
                Mismatch {
                    step: 0,
                    description: format!("connect to {}", self.endpoint),
                    expected: scenario.connect_expectation(),
                    actual: outcome,
                },
            );
        }
        // An expected connect failure ends the scenario; nothing else can run.
        if !context.is_connected() {
            return self.finish(scenario, 1);
        }

        for (i, spec) in scenario.steps().iter().enumerate() {
            let index = i + 1;
            let outcome = match self.execute_step(context, suite, &spec.step) {
                Ok(()) => Outcome::Allowed,
                Err(StepError::Engine(e)) => Outcome::from_error(&e),
                Err(StepError::Check(message)) => Outcome::Invalid(message),
            };
            debug!(scenario = name, step = index, action = %spec.step, %outcome, "step finished");

            if scenario.expects_rejection() && outcome.is_denied() {
                return ScenarioResult::passed(name, index + 1);
            }
            if !outcome.matches(spec.expect) {
                return ScenarioResult::mismatched(
                    name,
                    Mismatch {
                        step: index,
                        description: spec.step.to_string(),
                        expected: spec.expect,
                        actual: outcome,
                    },
                );
            }
        }

        self.finish(scenario, scenario.steps().len() + 1)
    }

    /// Every step matched; a rejection scenario still needs a denial.
    fn finish(&self, scenario: &Scenario, executed: usize) -> ScenarioResult {
        if scenario.expects_rejection() {
            return ScenarioResult::failed(
                scenario.name(),
                executed,
                "expected the identity to be rejected, but no step was denied".to_string(),
            );
        }
        ScenarioResult::passed(scenario.name(), executed)
    }

    fn execute_step(
        &self,
        context: &mut ScenarioContext,
        suite: &mut SuiteContext,
        step: &Step,
    ) -> StepResult<()> {
        match step {
            Step::CreateApp { name, alias } => {
                let app = context.session()?.create_app(name)?;
                suite.record_app(alias.as_deref().unwrap_or(name), app.id());
                context.app = Some(app);
            }
            Step::OpenApp { app } => {
                let id = suite.resolve_app(app).to_string();
                let handle = context.session()?.open_app(&id)?;
                context.app = Some(handle);
            }
            Step::Disconnect => context.session()?.disconnect(),
            Step::Reconnect => {
                context.release();
                context.connect(self.endpoint, self.options)?;
            }

            Step::CreateSheet { id } => {
                let (session, app) = context.session_and_app()?;
                let object = session.create_object(app, &ObjectDefinition::sheet(id))?;
                let info = session.object_info(&object)?;
                if info.id != *id {
                    return Err(StepError::Check(format!(
                        "engine reports sheet id {}, expected {}",
                        info.id, id
                    )));
                }
                context.objects.insert(id.clone(), object);
            }
            Step::CreateCube {
                id,
                kind,
                dimensions,
                height,
                width,
            } => {
                let window = FetchWindow {
                    height: *height,
                    width: width.unwrap_or(dimensions.len() as u32),
                };
                let definition = ObjectDefinition::cube(id, kind, dimensions, window);
                let (session, app) = context.session_and_app()?;
                let object = session.create_object(app, &definition)?;
                context.objects.insert(id.clone(), object);
            }
            Step::ReadObject { id, kind } => {
                let (session, app) = context.session_and_app()?;
                let object = session.read_object(app, id)?;
                let info = session.object_info(&object)?;
                if object.id() != id || info.id != *id {
                    return Err(StepError::Check(format!(
                        "engine returned object {} for id {}",
                        info.id, id
                    )));
                }
                if let Some(kind) = kind {
                    if info.kind != *kind {
                        return Err(StepError::Check(format!(
                            "object {} has type {}, expected {}",
                            id, info.kind, kind
                        )));
                    }
                }
                context.objects.insert(id.clone(), object);
            }
            Step::GetLayout { id } => {
                let object = context.object(id)?;
                context.session()?.get_layout(&object)?;
            }

            Step::Reload { script } => {
                let (session, app) = context.session_and_app()?;
                session.set_script_and_reload(app, script)?;
            }
            Step::SaveObjects => {
                let (session, app) = context.session_and_app()?;
                session.save_objects(app)?;
            }
            Step::SaveApp => {
                let (session, app) = context.session_and_app()?;
                session.save_app(app)?;
            }

            Step::ExpectRow {
                object,
                row,
                label,
                value,
            } => {
                let handle = context.object(object)?;
                let table = context.session()?.read_tabular_result(&handle)?;
                match table.row(*row) {
                    None => {
                        return Err(StepError::Check(format!(
                            "object {} has {} rows, no row {}",
                            object,
                            table.len(),
                            row
                        )))
                    }
                    Some((l, v)) if l == label && same_number(v, *value) => {}
                    Some((l, v)) => {
                        return Err(StepError::Check(format!(
                            "row {} of {} is ({}, {}), expected ({}, {})",
                            row, object, l, v, label, value
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

fn same_number(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}
