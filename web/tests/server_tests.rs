/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;
use web::create_router;

fn create_server() -> TestServer {
    TestServer::new(create_router(common::create_web_state())).unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = create_server();

    let response = server.get("/api/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["error"], false);
    assert_eq!(body["message"], "200 ALIVE");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let server = create_server();

    let response = server.get("/api/leaderboard").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "Not Found");
}

#[tokio::test]
async fn test_scheduler_status_before_start() {
    let server = create_server();

    let response = server.get("/api/scheduler/status").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["error"], false);
    assert_eq!(body["message"]["running"], false);
    assert_eq!(body["message"]["interval_seconds"], 7200);
    assert!(body["message"]["next_run_at"].is_null());
    assert!(body["message"]["last_pass"].is_null());
}

#[tokio::test]
async fn test_trigger_returns_immediately() {
    let state = common::create_web_state();
    let scheduler = state.scheduler.clone();
    let server = TestServer::new(create_router(state)).unwrap();

    let response = server.post("/api/scheduler/trigger").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["error"], false);
    assert_eq!(body["message"], "triggered");

    let response = server.post("/api/scheduler/trigger").await;
    response.assert_status_ok();

    for _ in 0..100 {
        if scheduler.status().last_pass.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(scheduler.status().last_pass.map(|p| p.attempted), Some(0));
}

#[tokio::test]
async fn test_trigger_requires_post() {
    let server = create_server();

    let response = server.get("/api/scheduler/trigger").await;
    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
}
