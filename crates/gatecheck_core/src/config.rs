//! Configuration for gatecheck runs.

use crate::engine::ConnectOptions;
use crate::error::{GateError, Result};
use crate::scenario::{Scenario, ScenarioSpec, Suite};
use crate::token::{ClaimSet, TokenIssuer, FIXTURE_SECRET};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default file name looked up by the CLI.
pub const CONFIG_FILE: &str = "gatecheck.toml";

/// Comprehensive configuration for a gatecheck run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Token signing configuration.
    #[serde(default)]
    pub signing: SigningConfig,

    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Named claim sets, referenced by scenarios.
    #[serde(default)]
    pub identities: BTreeMap<String, ClaimSet>,

    /// Suites, one per engine instance.
    #[serde(default)]
    pub suites: Vec<SuiteConfig>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GateError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `gatecheck.toml` from a directory, or defaults when absent.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GateError::Config(format!("failed to parse config: {}", e)))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GateError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)
            .map_err(|e| GateError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    /// Build the runnable suites, resolving identity names.
    pub fn build_suites(&self) -> Result<Vec<Suite>> {
        self.suites
            .iter()
            .map(|suite| {
                let scenarios = suite
                    .scenarios
                    .iter()
                    .map(|spec| self.build_scenario(&suite.name, spec))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Suite::new(&suite.name, &suite.engine).with_scenarios(scenarios))
            })
            .collect()
    }

    fn build_scenario(&self, suite: &str, spec: &ScenarioSpec) -> Result<Scenario> {
        let claims = match spec.identity.as_deref() {
            None | Some("anonymous") => None,
            Some(name) => Some(self.identities.get(name).cloned().ok_or_else(|| {
                GateError::Config(format!(
                    "suite '{}' scenario '{}' references unknown identity '{}'",
                    suite, spec.name, name
                ))
            })?),
        };
        Ok(Scenario::from_spec(spec, claims))
    }
}

/// Token signing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Literal secret. Prefer `secret_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Environment variable holding the secret (default: GATECHECK_SIGNING_SECRET).
    pub secret_env: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_env: "GATECHECK_SIGNING_SECRET".to_string(),
        }
    }
}

impl SigningConfig {
    /// Resolve the secret: environment first, then the literal, then the fixture.
    ///
    /// The issuer built from a fixture secret warns when it is created.
    pub fn resolve_secret(&self) -> SecretString {
        if let Ok(value) = std::env::var(&self.secret_env) {
            if !value.is_empty() {
                return SecretString::from(value);
            }
        }
        if let Some(secret) = &self.secret {
            return SecretString::from(secret.clone());
        }
        debug!(
            env = %self.secret_env,
            "no signing secret configured, falling back to the fixture secret"
        );
        SecretString::from(FIXTURE_SECRET.to_string())
    }

    /// Build a token issuer from the resolved secret.
    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer::new(self.resolve_secret())
    }
}

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// TCP connect timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,

    /// Per-request read/write timeout in seconds (default: 30).
    pub request_timeout_secs: u64,

    /// Optional file that receives every frame sent and received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_dump: Option<PathBuf>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            traffic_dump: None,
        }
    }
}

impl ConnectionConfig {
    /// Connect options for sessions.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            traffic_dump: self.traffic_dump.clone(),
        }
    }
}

/// One engine instance and the scenarios run against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Suite name.
    pub name: String,

    /// Engine websocket endpoint.
    pub engine: String,

    /// Scenarios, run in order.
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}
