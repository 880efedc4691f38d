//! Identity claims and the bearer tokens signed from them.

use crate::error::{GateError, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Secret the test engines are provisioned with.
///
/// Never use this outside of test fixtures.
pub const FIXTURE_SECRET: &str = "secret";

/// A single claim value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    /// Boolean capability flag, e.g. `allowCreate`.
    Flag(bool),
    /// Plain string, e.g. `sub`.
    Text(String),
    /// String list, e.g. `roles`.
    List(Vec<String>),
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for ClaimValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<&[&str]> for ClaimValue {
    fn from(value: &[&str]) -> Self {
        Self::List(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Identity attributes encoded into a credential.
///
/// Keys are kept sorted so the same claims always sign to the same token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet {
    claims: BTreeMap<String, ClaimValue>,
}

impl ClaimSet {
    /// Create an empty claim set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim set with only a subject.
    pub fn subject(sub: &str) -> Self {
        Self::new().with("sub", sub)
    }

    /// Add or replace a claim.
    pub fn with(mut self, name: &str, value: impl Into<ClaimValue>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    /// Add a string-list claim.
    pub fn with_list(self, name: &str, values: &[&str]) -> Self {
        self.with(name, values)
    }

    /// Look up a claim.
    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.claims.get(name)
    }

    /// The `sub` claim, if it is a string.
    pub fn sub(&self) -> Option<&str> {
        match self.claims.get("sub") {
            Some(ClaimValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Number of claims.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// True when no claims are set.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Iterate claims in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClaimValue)> {
        self.claims.iter()
    }
}

/// A signed bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// The raw token string.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<{} bytes>)", self.token.len())
    }
}

/// Signs claim sets with a shared HS256 secret.
pub struct TokenIssuer {
    secret: SecretString,
}

impl TokenIssuer {
    /// Create an issuer from a secret.
    pub fn new(secret: SecretString) -> Self {
        if secret.expose_secret() == FIXTURE_SECRET {
            warn!("signing tokens with the fixture secret; this is only safe against test engines");
        }
        Self { secret }
    }

    /// Issuer for the test engines' fixture secret.
    pub fn fixture() -> Self {
        Self::new(SecretString::from(FIXTURE_SECRET.to_string()))
    }

    /// Sign `claims`, or return `None` for an anonymous identity.
    pub fn issue(&self, claims: Option<&ClaimSet>) -> Result<Option<Credential>> {
        let Some(claims) = claims else {
            return Ok(None);
        };

        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &key)
            .map_err(|e| GateError::Token(e.to_string()))?;

        debug!(sub = claims.sub().unwrap_or("<none>"), claims = claims.len(), "issued token");

        Ok(Some(Credential { token }))
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}
