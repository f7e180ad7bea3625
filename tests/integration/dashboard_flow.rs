//! End-to-end flows through the application controller.
//!
//! Sign up, log in, manage tasks page by page, recover a password and log
//! out, all against `InMemoryGateway`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use smarttask::app::{App, AppError};
use smarttask::gateway::memory::{InMemoryGateway, Operation};
use smarttask::route::{Navigation, Route};
use smarttask::tasks::{Pager, TaskDraft, TaskError};
use smarttask_proto::task::{TaskPatch, TaskStatus};

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "secret1";
const RESET_URL: &str = "https://tasks.example.com/reset-password";

async fn app() -> (Arc<InMemoryGateway>, App<InMemoryGateway>) {
    let gw = Arc::new(InMemoryGateway::new());
    let app = App::new(Arc::clone(&gw), Pager::default(), RESET_URL);
    app.start().await;
    (gw, app)
}

async fn logged_in() -> (Arc<InMemoryGateway>, App<InMemoryGateway>) {
    let (gw, mut app) = app().await;
    gw.register_account(EMAIL, PASSWORD);
    app.login(EMAIL, PASSWORD).await.unwrap();
    (gw, app)
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        description: None,
    }
}

#[tokio::test]
async fn signup_then_login_lands_on_dashboard() {
    let (_gw, mut app) = app().await;

    app.sign_up(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(app.route(), Route::Login);
    assert_eq!(app.welcome_line(), "Welcome, Guest");

    app.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(app.route(), Route::Dashboard);
    assert_eq!(app.welcome_line(), format!("Welcome, {EMAIL}"));
}

#[tokio::test]
async fn signup_errors_carry_backend_message() {
    let (_gw, mut app) = app().await;
    app.sign_up(EMAIL, PASSWORD).await.unwrap();

    let dup = app.sign_up(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(dup.to_string(), "User already registered");

    let weak = app.sign_up("bob@example.com", "123").await.unwrap_err();
    assert_eq!(weak.to_string(), "Password should be at least 6 characters.");
}

#[tokio::test]
async fn root_redirects_to_login() {
    let (_gw, mut app) = logged_in().await;
    assert_eq!(
        app.navigate(Route::Root),
        Navigation::Redirect(Route::Login)
    );
}

#[tokio::test]
async fn paging_through_tasks() {
    let (_gw, mut app) = logged_in().await;
    for n in 1..=25 {
        app.create_task(draft(&format!("task {n:02}"))).await.unwrap();
    }
    app.load_tasks().await.unwrap();

    let first = app.dashboard_page();
    assert_eq!(first.rows.len(), 10);
    assert_eq!(first.rows[0].title, "task 25");
    assert_eq!(first.label, "Page 1 of 3");
    assert!(!first.has_prev);
    assert!(first.has_next);

    app.next_page();
    app.next_page();
    app.next_page();
    let last = app.dashboard_page();
    assert_eq!(last.label, "Page 3 of 3");
    assert_eq!(last.rows.len(), 5);
    assert!(!last.has_next);

    app.set_rows_per_page(20).unwrap();
    assert_eq!(app.dashboard_page().label, "Page 1 of 2");

    app.go_to_page(2);
    for task in app.dashboard_page().rows {
        app.delete_task(&task.id).await.unwrap();
    }
    let page = app.dashboard_page();
    assert_eq!(page.label, "Page 1 of 1");
    assert_eq!(page.rows.len(), 20);
}

#[tokio::test]
async fn edit_and_status_from_dashboard() {
    let (gw, mut app) = logged_in().await;
    let task = app.create_task(draft("write report")).await.unwrap();
    assert_eq!(app.dashboard_page().rows[0].id, task.id);

    let users = app.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].email, EMAIL);

    app.edit_task(&task.id, TaskPatch {
        title: "write final report".to_string(),
        description: "due friday".to_string(),
        assigned_to: Some(users[0].id.clone()),
    })
    .await
    .unwrap();
    app.change_status(&task.id, TaskStatus::InProgress)
        .await
        .unwrap();

    let page = app.dashboard_page();
    let row = &page.rows[0];
    assert_eq!(row.title, "write final report");
    assert_eq!(row.status, TaskStatus::InProgress);

    app.load_tasks().await.unwrap();
    assert_eq!(app.dashboard_page().rows[0], gw.stored_tasks()[0]);
}

#[tokio::test]
async fn fetch_failure_shows_message_and_keeps_rows() {
    let (gw, mut app) = logged_in().await;
    app.create_task(draft("keep me")).await.unwrap();

    gw.fail_next(
        Operation::FetchTasks,
        smarttask::gateway::GatewayError::backend("network error"),
    );
    assert!(app.load_tasks().await.is_err());
    let page = app.dashboard_page();
    assert_eq!(page.error.as_deref(), Some("network error"));
    assert_eq!(page.rows.len(), 1);
}

#[tokio::test]
async fn password_recovery_flow() {
    let (gw, mut app) = logged_in().await;

    app.forgot_password(EMAIL).await.unwrap();
    assert_eq!(app.route(), Route::Login);
    assert_eq!(
        gw.reset_requests(),
        vec![(EMAIL.to_string(), RESET_URL.to_string())]
    );

    app.reset_password("brand-new-secret").await.unwrap();
    assert_eq!(app.route(), Route::Dashboard);

    app.logout().await.unwrap();
    assert!(app.login(EMAIL, PASSWORD).await.is_err());
    app.login(EMAIL, "brand-new-secret").await.unwrap();
}

#[tokio::test]
async fn logout_locks_the_dashboard() {
    let (gw, mut app) = logged_in().await;
    app.logout().await.unwrap();
    assert_eq!(app.route(), Route::Login);
    assert_eq!(
        app.navigate(Route::Dashboard),
        Navigation::Redirect(Route::Login)
    );

    let calls_before = gw.calls().len();
    assert_eq!(
        app.create_task(draft("orphan")).await.unwrap_err(),
        AppError::Task(TaskError::NoUserLoggedIn)
    );
    assert_eq!(
        app.load_tasks().await.unwrap_err(),
        AppError::Task(TaskError::NoUserLoggedIn)
    );
    assert_eq!(gw.calls().len(), calls_before);
}

#[tokio::test]
async fn next_user_starts_with_empty_dashboard() {
    let (gw, mut app) = logged_in().await;
    app.create_task(draft("ada private")).await.unwrap();
    assert_eq!(app.dashboard_page().rows.len(), 1);
    app.logout().await.unwrap();
    assert!(app.dashboard_page().rows.is_empty());

    gw.register_account("bob@example.com", "secret2");
    app.login("bob@example.com", "secret2").await.unwrap();
    let page = app.dashboard_page();
    assert!(page.rows.is_empty());
    assert!(page.error.is_none());
    assert_eq!(page.label, "Page 1 of 1");
    assert_eq!(app.welcome_line(), "Welcome, bob@example.com");

    app.load_tasks().await.unwrap();
    assert!(app.dashboard_page().rows.is_empty());
}

#[tokio::test]
async fn dispose_releases_session_subscription() {
    let (gw, app) = logged_in().await;
    assert_eq!(gw.listener_count(), 1);
    app.dispose();
    assert_eq!(gw.listener_count(), 0);
}
