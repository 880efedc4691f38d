//! Connect, disconnect, reconnect and what handles survive each.

use crate::harness::{test_options, MockEngine, Reply, RuleSet, ScriptedEngine, TestWorkspace};
use gatecheck_core::scenario::fixtures::{self, APP_ID, SHEET_ID};
use gatecheck_core::scenario::{Expectation, Scenario};
use gatecheck_core::{
    ConnectOptions, Credential, ErrorKind, GateError, ObjectDefinition, Session, TokenIssuer,
};
use std::time::{Duration, Instant};

fn admin_credential() -> Option<Credential> {
    TokenIssuer::fixture().issue(Some(&fixtures::admin())).unwrap()
}

#[test]
fn test_disconnect_is_idempotent() {
    let engine = MockEngine::start(RuleSet::allow_all()).unwrap();
    let mut session =
        Session::connect(&engine.endpoint(), admin_credential().as_ref(), &test_options()).unwrap();
    assert!(session.is_connected());

    session.disconnect();
    session.disconnect();

    assert!(!session.is_connected());
    assert!(matches!(session.open_app(APP_ID), Err(GateError::SessionClosed)));
}

#[test]
fn test_handles_do_not_cross_sessions() {
    let engine = MockEngine::start(RuleSet::allow_all()).unwrap();
    let credential = admin_credential();

    let mut first = Session::connect(&engine.endpoint(), credential.as_ref(), &test_options()).unwrap();
    let app = first.create_app(APP_ID).unwrap();
    assert!(!app.id().is_empty());
    assert_eq!(app.session_serial(), first.serial());

    let mut second =
        Session::connect(&engine.endpoint(), credential.as_ref(), &test_options()).unwrap();
    assert_ne!(first.serial(), second.serial());

    let err = second
        .create_object(&app, &ObjectDefinition::sheet(SHEET_ID))
        .unwrap_err();
    assert!(matches!(err, GateError::StaleHandle { .. }));

    // The second session works with its own handle to the same app.
    let reopened = second.open_app(app.id()).unwrap();
    let sheet = second
        .create_object(&reopened, &ObjectDefinition::sheet(SHEET_ID))
        .unwrap();
    assert_eq!(second.object_info(&sheet).unwrap().id, SHEET_ID);

    first.disconnect();
    let err = first
        .create_object(&app, &ObjectDefinition::sheet("SHEET02"))
        .unwrap_err();
    assert!(matches!(err, GateError::SessionClosed));
    second.disconnect();
}

#[test]
fn test_reconnect_in_scenario() {
    let engine = MockEngine::start(RuleSet::allow_all()).unwrap();

    Scenario::new("reconnect")
        .as_identity(fixtures::admin())
        .create_app(APP_ID)
        .disconnect()
        .disconnect()
        .open_app(APP_ID)
        .expecting(Expectation::Unreachable)
        .reconnect()
        .open_app(APP_ID)
        .create_sheet(SHEET_ID)
        .run(&engine.endpoint(), &TokenIssuer::fixture(), &test_options())
        .unwrap();

    let app = engine.app_named(APP_ID).unwrap();
    assert!(app.objects.contains_key(SHEET_ID));
}

#[test]
fn test_same_name_creates_distinct_apps() {
    let engine = MockEngine::start(RuleSet::allow_all()).unwrap();
    let mut session =
        Session::connect(&engine.endpoint(), admin_credential().as_ref(), &test_options()).unwrap();

    let a = session.create_app(APP_ID).unwrap();
    let b = session.create_app(APP_ID).unwrap();

    assert_ne!(a.id(), b.id());
    assert_ne!(a.handle(), b.handle());
    assert_eq!(engine.app_count(), 2);
    session.disconnect();
}

#[test]
fn test_traffic_is_dumped() {
    let engine = MockEngine::start(RuleSet::allow_all()).unwrap();
    let workspace = TestWorkspace::empty().unwrap();
    let options = workspace.dumping_options("traffic-dump.json");

    let mut session = Session::connect(&engine.endpoint(), admin_credential().as_ref(), &options).unwrap();
    session.create_app(APP_ID).unwrap();
    session.disconnect();

    let frames = workspace.read_dump("traffic-dump.json").unwrap();
    let sent: Vec<_> = frames.iter().filter(|f| f["direction"] == "sent").collect();
    let received: Vec<_> = frames.iter().filter(|f| f["direction"] == "received").collect();

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["frame"]["method"], "CreateDocEx");
    assert_eq!(sent[0]["frame"]["handle"], -1);
    assert!(received
        .iter()
        .any(|f| f["frame"]["method"] == "OnConnected"));
    assert!(received
        .iter()
        .any(|f| f["frame"]["id"] == sent[0]["frame"]["id"]));
    assert!(frames.iter().all(|f| f["ts_ms"].is_u64()));
}

#[test]
fn test_silent_engine_times_out() {
    let engine = ScriptedEngine::start(|_, _| Reply::Silent).unwrap();
    let options = ConnectOptions {
        request_timeout: Duration::from_millis(300),
        ..test_options()
    };

    let mut session = Session::connect(&engine.endpoint(), None, &options).unwrap();
    let started = Instant::now();
    let err = session.open_app(APP_ID).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("timed out"), "{}", err);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_engine_closing_the_socket_ends_the_session() {
    let engine = ScriptedEngine::start(|_, _| Reply::Close).unwrap();
    let mut session = Session::connect(&engine.endpoint(), None, &test_options()).unwrap();

    let err = session.open_app(APP_ID).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("closed"), "{}", err);
    assert!(!session.is_connected());

    let err = session.open_app(APP_ID).unwrap_err();
    assert!(matches!(err, GateError::SessionClosed));
}

#[test]
fn test_disconnect_is_bounded_without_request_timeout() {
    let engine = ScriptedEngine::unresponsive().unwrap();
    let options = ConnectOptions {
        request_timeout: Duration::ZERO,
        ..test_options()
    };

    let mut session = Session::connect(&engine.endpoint(), None, &options).unwrap();
    let started = Instant::now();
    session.disconnect();
    assert!(!session.is_connected());

    let dropped = Session::connect(&engine.endpoint(), None, &options).unwrap();
    drop(dropped);

    assert!(started.elapsed() < Duration::from_secs(10));
}
