use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Operations the mock engine guards with rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateApp,
    OpenApp,
    CreateObject,
    ReadObject,
    ViewLayout,
    Reload,
    SaveObjects,
    SaveApp,
}

/// Verified claims of a connection, or none for an anonymous one.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    claims: Option<Value>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self { claims: None }
    }

    pub fn from_claims(claims: Value) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.claims.is_none()
    }

    pub fn sub(&self) -> Option<&str> {
        self.claims.as_ref()?.get("sub")?.as_str()
    }

    /// Boolean claim, false when absent.
    pub fn flag(&self, name: &str) -> bool {
        self.claims
            .as_ref()
            .and_then(|c| c.get(name))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// True when the string-list claim `name` contains `value`.
    pub fn has(&self, name: &str, value: &str) -> bool {
        self.claims
            .as_ref()
            .and_then(|c| c.get(name))
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(|v| v.as_str() == Some(value)))
    }
}

/// What happens to a connection that presents no token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousPolicy {
    /// Accept it; rules see an anonymous identity.
    Allow,
    /// Accept the socket, then announce that the session must authenticate.
    MustAuthenticate,
    /// Refuse the websocket upgrade with 401.
    Reject,
}

/// How a rule rejection is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialStyle {
    /// Error code 5.
    Code,
    /// A generic error code with the marker only in the message.
    MessageOnly,
}

type Predicate = dyn Fn(&Identity, Action) -> bool + Send + Sync;

/// Rules of one engine instance.
#[derive(Clone)]
pub struct RuleSet {
    pub name: &'static str,
    pub anonymous: AnonymousPolicy,
    pub denial: DenialStyle,
    allow: Arc<Predicate>,
}

impl RuleSet {
    pub fn new<F>(name: &'static str, allow: F) -> Self
    where
        F: Fn(&Identity, Action) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            anonymous: AnonymousPolicy::Allow,
            denial: DenialStyle::Code,
            allow: Arc::new(allow),
        }
    }

    pub fn with_anonymous(mut self, policy: AnonymousPolicy) -> Self {
        self.anonymous = policy;
        self
    }

    pub fn with_denial(mut self, style: DenialStyle) -> Self {
        self.denial = style;
        self
    }

    pub fn allows(&self, identity: &Identity, action: Action) -> bool {
        (self.allow)(identity, action)
    }

    /// Admins may do anything; other signed-in users may only read.
    pub fn empty_engine() -> Self {
        Self::new("empty-engine", |identity, action| {
            if identity.is_anonymous() {
                return false;
            }
            if identity.has("roles", "admin") {
                return true;
            }
            matches!(
                action,
                Action::OpenApp | Action::ReadObject | Action::ViewLayout
            )
        })
    }

    /// Capabilities come from the `allowCreate`, `allowReload` and `allowView` flags.
    pub fn reload_engine() -> Self {
        Self::new("reload-engine", |identity, action| {
            if identity.is_anonymous() {
                return false;
            }
            let create = identity.flag("allowCreate");
            let reload = identity.flag("allowReload");
            let view = identity.flag("allowView");
            match action {
                Action::CreateApp | Action::CreateObject | Action::SaveObjects => create,
                Action::OpenApp => true,
                Action::ReadObject | Action::ViewLayout => view,
                Action::Reload => reload,
                Action::SaveApp => reload || create,
            }
        })
    }

    /// Any signed-in user may do anything; anonymous sessions must authenticate.
    pub fn basic() -> Self {
        Self::new("basic", |identity, _| !identity.is_anonymous())
            .with_anonymous(AnonymousPolicy::MustAuthenticate)
    }

    /// No rules at all.
    pub fn allow_all() -> Self {
        Self::new("allow-all", |_, _| true)
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("name", &self.name)
            .field("anonymous", &self.anonymous)
            .field("denial", &self.denial)
            .finish_non_exhaustive()
    }
}
