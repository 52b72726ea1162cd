//! Interactive login flow against a scripted browser: the captured session
//! must reach the credential store and the outcome must describe the result

mod common;

use chrono::Utc;
use common::{cookie, MockSession, Script, FEED_URL};
use rust_post_scraper::app_state::AppState;
use rust_post_scraper::auth;
use rust_post_scraper::browser::{PageEvent, PageSurface};
use rust_post_scraper::config::Config;
use rust_post_scraper::db::Database;
use rust_post_scraper::session::{CredentialStore, SessionCredential};
use std::collections::BTreeMap;
use std::time::Duration;

fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.auth.poll_interval_ms = 10;
    config.session_path = dir.path().join("session.json").to_string_lossy().into_owned();
    config
}

fn saved_credential(token: &str) -> SessionCredential {
    SessionCredential {
        cookies: vec![cookie("li_at", token)],
        local_storage: BTreeMap::new(),
        captured_at: Utc::now(),
        last_validated: Utc::now(),
    }
}

/// Sign in on the most recently opened surface
async fn sign_in(session: &MockSession) {
    let surface = session.last_surface().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    surface.set_storage_entry("voyager-web:theme", "dark");
    surface.add_cookie("li_at", "fresh-token");
    surface.set_url(FEED_URL);
    surface.emit(PageEvent::Navigated {
        url: FEED_URL.to_string(),
        main_frame: true,
    });
}

/// Close the login window without signing in
async fn close_window(session: &MockSession) {
    let surface = session.last_surface().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    surface.close().await.unwrap();
}

#[tokio::test]
async fn test_login_saves_captured_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let store = CredentialStore::new(&config.session_path);
    let session = MockSession::new(Script::default());

    let (outcome, ()) = tokio::join!(
        auth::run_login_flow(&session, &store, &config),
        sign_in(&session)
    );
    let outcome = outcome.unwrap();

    assert!(outcome.success);
    assert!(outcome.reason.starts_with("login detected via "), "{}", outcome.reason);

    let saved = store.load().unwrap().expect("session saved");
    assert!(saved.has_cookie("li_at"));
    assert_eq!(
        saved.local_storage.get("voyager-web:theme").map(String::as_str),
        Some("dark")
    );
    assert_eq!(session.opened(), 1);
    assert_eq!(session.active(), 0, "login surface closed");
}

#[tokio::test]
async fn test_closed_window_reports_failure_and_saves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let store = CredentialStore::new(&config.session_path);
    let session = MockSession::new(Script::default());

    let (outcome, ()) = tokio::join!(
        auth::run_login_flow(&session, &store, &config),
        close_window(&session)
    );
    let outcome = outcome.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.reason, "login window closed before a session was saved");
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_forced_login_replaces_saved_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = AppState::with_database(test_config(&dir), Database::open_in_memory().unwrap());
    app.credentials.save(&saved_credential("old-token")).unwrap();
    let session = MockSession::new(Script::default());

    let (outcome, ()) = tokio::join!(app.authenticate_in(&session, true), sign_in(&session));
    assert!(outcome.unwrap().success);

    let saved = app.credentials.load().unwrap().unwrap();
    let token = saved.cookies.iter().rev().find(|c| c.name == "li_at").unwrap();
    assert_eq!(token.value, "fresh-token");
}

#[tokio::test]
async fn test_failed_forced_login_keeps_old_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = AppState::with_database(test_config(&dir), Database::open_in_memory().unwrap());
    app.credentials.save(&saved_credential("old-token")).unwrap();
    let session = MockSession::new(Script::default());

    let (outcome, ()) = tokio::join!(app.authenticate_in(&session, true), close_window(&session));
    assert!(!outcome.unwrap().success);

    let saved = app.credentials.load().unwrap().expect("old session kept");
    assert_eq!(saved.cookies, vec![cookie("li_at", "old-token")]);
}

#[tokio::test]
async fn test_valid_session_skips_browser() {
    let dir = tempfile::tempdir().unwrap();
    let app = AppState::with_database(test_config(&dir), Database::open_in_memory().unwrap());
    app.credentials.save(&saved_credential("old-token")).unwrap();
    let session = MockSession::new(Script::default());

    let outcome = app.authenticate_in(&session, false).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.reason, "already authenticated");
    assert_eq!(session.opened(), 0);
}
