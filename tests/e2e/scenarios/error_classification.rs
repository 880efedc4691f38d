//! How engine errors are sorted into denied, not found and everything else.

use crate::harness::{test_options, DenialStyle, MockEngine, Reply, RuleSet, ScriptedEngine};
use gatecheck_core::scenario::fixtures::{self, APP_ID, FORBIDDEN_APP, MOVIES_OBJECT_ID, SHEET_ID};
use gatecheck_core::scenario::{Expectation, Outcome, Scenario};
use gatecheck_core::{Config, DenialReason, GateError, Session, TokenIssuer};
use serde_json::json;

#[test]
fn test_message_only_denial_is_recognized() {
    let engine =
        MockEngine::start(RuleSet::empty_engine().with_denial(DenialStyle::MessageOnly)).unwrap();
    let credential = TokenIssuer::fixture()
        .issue(Some(&fixtures::non_admin()))
        .unwrap();

    let mut session =
        Session::connect(&engine.endpoint(), credential.as_ref(), &test_options()).unwrap();
    let err = session.create_app(FORBIDDEN_APP).unwrap_err();
    session.disconnect();

    assert!(matches!(
        err,
        GateError::Authorization {
            reason: DenialReason::MessageMarker,
            ..
        }
    ));
    assert!(err.is_access_denied());

    Scenario::new("non-admin")
        .as_identity(fixtures::non_admin())
        .create_app(FORBIDDEN_APP)
        .denied()
        .run(&engine.endpoint(), &TokenIssuer::fixture(), &test_options())
        .unwrap();
}

#[test]
fn test_missing_app_and_object_are_not_found() {
    let engine = MockEngine::start(RuleSet::allow_all()).unwrap();
    let credential = TokenIssuer::fixture().issue(Some(&fixtures::admin())).unwrap();

    let mut session =
        Session::connect(&engine.endpoint(), credential.as_ref(), &test_options()).unwrap();
    let err = session.open_app("no-such-app").unwrap_err();
    assert!(matches!(err, GateError::NotFound(_)));
    assert!(!err.is_access_denied());
    session.disconnect();

    Scenario::new("missing things")
        .as_identity(fixtures::admin())
        .open_app("no-such-app")
        .not_found()
        .create_app(APP_ID)
        .read_object("NOPE01")
        .not_found()
        .run(&engine.endpoint(), &TokenIssuer::fixture(), &test_options())
        .unwrap();
}

/// Engine that resolves every object id to `OTHER`.
fn substituting_engine() -> ScriptedEngine {
    ScriptedEngine::start(|method, _| match method {
        "OpenDoc" => Reply::Result(json!({
            "qReturn": { "qType": "Doc", "qHandle": 1, "qGenericId": "A" }
        })),
        "GetObject" => Reply::Result(json!({
            "qReturn": {
                "qType": "GenericObject",
                "qHandle": 2,
                "qGenericId": "OTHER",
                "qGenericType": "sheet"
            }
        })),
        "GetInfo" => Reply::Result(json!({ "qInfo": { "qId": "OTHER", "qType": "sheet" } })),
        _ => Reply::Result(json!({})),
    })
    .unwrap()
}

#[test]
fn test_read_object_reports_engine_id() {
    let engine = substituting_engine();
    let mut session = Session::connect(&engine.endpoint(), None, &test_options()).unwrap();

    let app = session.open_app("A").unwrap();
    let object = session.read_object(&app, SHEET_ID).unwrap();

    assert_eq!(object.id(), "OTHER");
    assert_eq!(object.kind(), "sheet");
    session.disconnect();
}

#[test]
fn test_read_object_of_another_id_is_invalid() {
    let engine = substituting_engine();

    let result = Scenario::new("read round trip")
        .open_app("A")
        .read_object_of_kind(SHEET_ID, "sheet")
        .run(&engine.endpoint(), &TokenIssuer::fixture(), &test_options());

    assert!(!result.success);
    assert_eq!(result.failure_step, Some(2));
    let actual = result.mismatch.unwrap().actual;
    assert!(matches!(&actual, Outcome::Invalid(m) if m.contains("OTHER")), "{}", actual);
}

#[test]
fn test_unexpected_denial_is_reported() {
    let engine = MockEngine::start(RuleSet::empty_engine()).unwrap();

    let result = Scenario::new("non-admin expecting too much")
        .as_identity(fixtures::non_admin())
        .create_app(APP_ID)
        .create_sheet(SHEET_ID)
        .run(&engine.endpoint(), &TokenIssuer::fixture(), &test_options());

    assert!(!result.success);
    assert_eq!(result.failure_step, Some(1));
    assert_eq!(result.steps_executed, 2);
    let mismatch = result.mismatch.unwrap();
    assert_eq!(mismatch.expected, Expectation::Allowed);
    assert!(mismatch.actual.is_denied());
    assert!(result
        .error
        .unwrap()
        .to_lowercase()
        .contains("access denied"));
    assert_eq!(engine.app_count(), 0);
}

#[test]
fn test_wrong_row_is_invalid() {
    let engine = MockEngine::start(RuleSet::allow_all()).unwrap();

    let result = Scenario::new("wrong row")
        .as_identity(fixtures::admin())
        .create_app(APP_ID)
        .create_movies_object(MOVIES_OBJECT_ID)
        .reload_movies()
        .expect_row(MOVIES_OBJECT_ID, 1, "Avatar", 2009.0)
        .run(&engine.endpoint(), &TokenIssuer::fixture(), &test_options());

    assert!(!result.success);
    assert_eq!(result.failure_step, Some(4));
    let actual = result.mismatch.unwrap().actual;
    assert!(matches!(&actual, Outcome::Invalid(m) if m.contains("Armageddon")));
    // A failed content check never satisfies an expectation, not even a negative one.
    for expectation in [Expectation::Denied, Expectation::Failed, Expectation::NotFound] {
        assert!(!actual.matches(expectation));
    }
}

#[test]
fn test_config_driven_suite() {
    let engine = MockEngine::start(RuleSet::empty_engine()).unwrap();
    let config = Config::from_toml_str(&format!(
        r#"
[signing]
secret = "secret"
secret_env = "GATECHECK_E2E_UNSET_SECRET"

[connection]
connect_timeout_secs = 2
request_timeout_secs = 5

[identities.admin]
sub = "someAdminUser"
roles = ["admin"]

[identities.nonadmin]
sub = "someNonAdminUser"

[[suites]]
name = "empty-engine"
engine = "{endpoint}"

[[suites.scenarios]]
name = "admin"
identity = "admin"
steps = [
  {{ op = "create_app", name = "{app}" }},
  {{ op = "create_sheet", id = "{sheet}" }},
  {{ op = "save_objects" }},
]

[[suites.scenarios]]
name = "non-admin"
identity = "nonadmin"
steps = [
  {{ op = "create_app", name = "{forbidden}", expect = "denied" }},
  {{ op = "open_app", app = "{app}" }},
  {{ op = "read_object", id = "{sheet}", kind = "sheet" }},
  {{ op = "create_sheet", id = "SHEET02", expect = "denied" }},
]

[[suites.scenarios]]
name = "anonymous"
rejected = true
steps = [{{ op = "open_app", app = "{app}" }}]
"#,
        endpoint = engine.endpoint(),
        app = APP_ID,
        sheet = SHEET_ID,
        forbidden = FORBIDDEN_APP,
    ))
    .unwrap();

    let issuer = config.signing.issuer();
    let options = config.connection.connect_options();
    let suites = config.build_suites().unwrap();
    assert_eq!(suites.len(), 1);

    let report = suites[0].run(&issuer, &options);
    assert_eq!(report.passed(), 3);
    report.unwrap();
}
