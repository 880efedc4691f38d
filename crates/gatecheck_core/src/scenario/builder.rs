use super::fixtures::{MOVIES_FIELDS, MOVIES_SCRIPT, MOVIES_WINDOW};
use super::report::{ScenarioResult, SuiteReport};
use super::runner::{ScenarioRunner, SuiteContext};
use super::steps::{Expectation, Step, StepSpec};
use crate::engine::ConnectOptions;
use crate::token::{ClaimSet, TokenIssuer};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Serializable form of a scenario, as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,

    /// Name of an `[identities]` entry; absent or `anonymous` sends no token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// Pass when some step is denied, fail when every step is allowed.
    #[serde(default)]
    pub rejected: bool,

    /// Expected outcome of the connect itself.
    #[serde(default)]
    pub connect: Expectation,

    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// Fluent DSL for building identity scenarios
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    claims: Option<ClaimSet>,
    connect: Expectation,
    rejected: bool,
    steps: Vec<StepSpec>,
}

impl Scenario {
    /// Create a new anonymous scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            claims: None,
            connect: Expectation::Allowed,
            rejected: false,
            steps: Vec::new(),
        }
    }

    /// Build from a config entry and its resolved claims.
    pub fn from_spec(spec: &ScenarioSpec, claims: Option<ClaimSet>) -> Self {
        Self {
            name: spec.name.clone(),
            claims,
            connect: spec.connect,
            rejected: spec.rejected,
            steps: spec.steps.clone(),
        }
    }

    // ===== Identity =====

    /// Connect with a token signed from `claims`
    pub fn as_identity(mut self, claims: ClaimSet) -> Self {
        self.claims = Some(claims);
        self
    }

    /// Connect without a token
    pub fn anonymous(mut self) -> Self {
        self.claims = None;
        self
    }

    /// Expected outcome of the connect itself
    pub fn connect_expecting(mut self, expectation: Expectation) -> Self {
        self.connect = expectation;
        self
    }

    /// The scenario passes when any step (connect included) is denied
    pub fn rejected(mut self) -> Self {
        self.rejected = true;
        self
    }

    // ===== Session =====

    /// Create an app, recorded under its name for later scenarios
    pub fn create_app(self, name: &str) -> Self {
        self.push(Step::CreateApp {
            name: name.to_string(),
            alias: None,
        })
    }

    /// Create an app, recorded under `alias`
    pub fn create_app_as(self, name: &str, alias: &str) -> Self {
        self.push(Step::CreateApp {
            name: name.to_string(),
            alias: Some(alias.to_string()),
        })
    }

    /// Open an app by alias or literal id
    pub fn open_app(self, app: &str) -> Self {
        self.push(Step::OpenApp {
            app: app.to_string(),
        })
    }

    /// Release the session
    pub fn disconnect(self) -> Self {
        self.push(Step::Disconnect)
    }

    /// Open a fresh session under the same identity
    pub fn reconnect(self) -> Self {
        self.push(Step::Reconnect)
    }

    // ===== Objects =====

    /// Create a sheet and check the engine reports the same id
    pub fn create_sheet(self, id: &str) -> Self {
        self.push(Step::CreateSheet { id: id.to_string() })
    }

    /// Create a data-bound object over `dimensions`
    pub fn create_cube(self, id: &str, kind: &str, dimensions: &[&str]) -> Self {
        self.push(Step::CreateCube {
            id: id.to_string(),
            kind: kind.to_string(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            height: MOVIES_WINDOW.height,
            width: None,
        })
    }

    /// Create the movies object used by the reload suites
    pub fn create_movies_object(self, id: &str) -> Self {
        self.push(Step::CreateCube {
            id: id.to_string(),
            kind: "movies".to_string(),
            dimensions: MOVIES_FIELDS.iter().map(|d| d.to_string()).collect(),
            height: MOVIES_WINDOW.height,
            width: Some(MOVIES_WINDOW.width),
        })
    }

    /// Read an object by id
    pub fn read_object(self, id: &str) -> Self {
        self.push(Step::ReadObject {
            id: id.to_string(),
            kind: None,
        })
    }

    /// Read an object and check its type marker
    pub fn read_object_of_kind(self, id: &str, kind: &str) -> Self {
        self.push(Step::ReadObject {
            id: id.to_string(),
            kind: Some(kind.to_string()),
        })
    }

    /// Fetch the layout of an object
    pub fn get_layout(self, id: &str) -> Self {
        self.push(Step::GetLayout { id: id.to_string() })
    }

    // ===== Data and persistence =====

    /// Set the load script and reload
    pub fn reload(self, script: &str) -> Self {
        self.push(Step::Reload {
            script: script.to_string(),
        })
    }

    /// Reload with the movies load script
    pub fn reload_movies(self) -> Self {
        self.reload(MOVIES_SCRIPT)
    }

    /// Persist pending object changes
    pub fn save_objects(self) -> Self {
        self.push(Step::SaveObjects)
    }

    /// Persist the app
    pub fn save_app(self) -> Self {
        self.push(Step::SaveApp)
    }

    /// Check one row of an object's first two columns
    pub fn expect_row(self, object: &str, row: usize, label: &str, value: f64) -> Self {
        self.push(Step::ExpectRow {
            object: object.to_string(),
            row,
            label: label.to_string(),
            value,
        })
    }

    // ===== Expectations =====

    /// The previous step must be denied
    pub fn denied(self) -> Self {
        self.expecting(Expectation::Denied)
    }

    /// The previous step must report a missing resource
    pub fn not_found(self) -> Self {
        self.expecting(Expectation::NotFound)
    }

    /// The previous step must be permitted but unsuccessful
    pub fn fails(self) -> Self {
        self.expecting(Expectation::Failed)
    }

    /// Set the expectation of the previous step
    pub fn expecting(mut self, expectation: Expectation) -> Self {
        match self.steps.last_mut() {
            Some(last) => last.expect = expectation,
            None => self.connect = expectation,
        }
        self
    }

    fn push(mut self, step: Step) -> Self {
        self.steps.push(StepSpec::allowed(step));
        self
    }

    // ===== Accessors =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn claims(&self) -> Option<&ClaimSet> {
        self.claims.as_ref()
    }

    pub fn connect_expectation(&self) -> Expectation {
        self.connect
    }

    pub fn expects_rejection(&self) -> bool {
        self.rejected
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    // ===== Execution =====

    /// Execute the scenario on its own, with no app aliases from earlier scenarios
    pub fn run(
        &self,
        endpoint: &str,
        issuer: &TokenIssuer,
        options: &ConnectOptions,
    ) -> ScenarioResult {
        let mut context = SuiteContext::default();
        ScenarioRunner::new(endpoint, issuer, options).run(self, &mut context)
    }
}

/// Ordered scenarios against one engine instance.
///
/// Later scenarios may depend on apps created by earlier ones.
#[derive(Debug, Clone)]
pub struct Suite {
    name: String,
    endpoint: String,
    scenarios: Vec<Scenario>,
}

impl Suite {
    pub fn new(name: &str, endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            scenarios: Vec::new(),
        }
    }

    /// Append a scenario
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Append several scenarios
    pub fn with_scenarios(mut self, scenarios: Vec<Scenario>) -> Self {
        self.scenarios.extend(scenarios);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Run every scenario in order and collect the results.
    ///
    /// A failing scenario does not stop the suite; later scenarios that need
    /// its apps will fail on their own.
    pub fn run(&self, issuer: &TokenIssuer, options: &ConnectOptions) -> SuiteReport {
        self.run_with(issuer, options, |_| {})
    }

    /// Like [`Suite::run`], calling `on_result` after each scenario.
    pub fn run_with<F>(
        &self,
        issuer: &TokenIssuer,
        options: &ConnectOptions,
        mut on_result: F,
    ) -> SuiteReport
    where
        F: FnMut(&ScenarioResult),
    {
        info!(
            suite = %self.name,
            endpoint = %self.endpoint,
            scenarios = self.scenarios.len(),
            "running suite"
        );

        let runner = ScenarioRunner::new(&self.endpoint, issuer, options);
        let mut context = SuiteContext::default();
        let mut results = Vec::with_capacity(self.scenarios.len());

        for scenario in &self.scenarios {
            let result = runner.run(scenario, &mut context);
            on_result(&result);
            results.push(result);
        }

        SuiteReport {
            name: self.name.clone(),
            endpoint: self.endpoint.clone(),
            results,
        }
    }
}
