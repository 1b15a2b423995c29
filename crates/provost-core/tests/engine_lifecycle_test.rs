// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end tests for the provisioning engine lifecycle.
//!
//! Drives the engine the way the portal would: dispatch an operation with
//! the mock launcher, feed the completion notification, and assert the
//! status record POSTed to the (mocked) self-service API.

use std::sync::Arc;
use std::time::Duration;

use provost_core::launcher::MockLauncher;
use provost_core::operation::{Action, LibraryRequest, OperationRequest, ResourceKind};
use provost_core::runtime::ProvisioningEngine;
use provost_core::Error;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXPLORATORY_PATH: &str = "/api/infrastructure_provision/exploratory_environment/status";
const COMPUTATIONAL_PATH: &str = "/api/infrastructure_provision/computational_resources/status";
const LIB_PATH: &str = "/api/infrastructure_provision/library/status";

fn engine(base_url: &str) -> ProvisioningEngine {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    ProvisioningEngine::builder(Arc::new(MockLauncher::new()))
        .with_self_service_base_url(base_url)
        .with_operation_timeout(None)
        .start()
        .expect("engine should start")
}

fn exploratory_request(operation_id: &str) -> OperationRequest {
    OperationRequest::new("alice", ResourceKind::Exploratory, Action::Create, "nb-1")
        .with_operation_id(operation_id)
}

#[tokio::test]
async fn test_successful_create_delivers_running_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXPLORATORY_PATH))
        .and(body_partial_json(json!({
            "request_id": "op-1",
            "user": "alice",
            "exploratory_name": "nb-1",
            "notebook_instance_name": "i-0abc123",
            "status": "running"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server.uri());
    engine.dispatch(exploratory_request("op-1")).await.unwrap();

    engine
        .notify(
            "op-1",
            json!({"status": "success", "result": {"instance_id": "i-0abc123"}}),
        )
        .await
        .unwrap();

    // Shutdown drains the processing loop and the forwarder queue
    engine.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_failed_command_delivers_failed_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPUTATIONAL_PATH))
        .and(body_partial_json(json!({
            "request_id": "op-2",
            "computational_name": "spark-1",
            "status": "failed",
            "error_message": "spot capacity unavailable"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server.uri());
    let request =
        OperationRequest::new("bob", ResourceKind::Computational, Action::Create, "nb-2")
            .with_operation_id("op-2")
            .with_computational_name("spark-1");
    engine.dispatch(request).await.unwrap();

    engine
        .notify(
            "op-2",
            json!({"status": "err", "error_message": "spot capacity unavailable"}),
        )
        .await
        .unwrap();

    engine.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_lib_install_failure_stamps_every_library() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LIB_PATH))
        .and(body_partial_json(json!({
            "request_id": "op-3",
            "status": "failed",
            "libs": [
                {"group": "pip3", "name": "numpy", "status": "failed",
                 "error_message": "container crashed"},
                {"group": "pip3", "name": "pandas", "status": "failed",
                 "error_message": "container crashed"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server.uri());
    let request = OperationRequest::new(
        "alice",
        ResourceKind::LibraryInstall,
        Action::InstallLibraries,
        "nb-1",
    )
    .with_operation_id("op-3")
    .with_libraries(vec![
        LibraryRequest::new("pip3", "numpy"),
        LibraryRequest::new("pip3", "pandas"),
    ]);
    engine.dispatch(request).await.unwrap();

    engine
        .notify(
            "op-3",
            json!({"status": "failed", "error_message": "container crashed"}),
        )
        .await
        .unwrap();

    engine.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_missing_result_section_still_resolves_the_operation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXPLORATORY_PATH))
        .and(body_partial_json(json!({"request_id": "op-4", "status": "failed"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server.uri());
    engine.dispatch(exploratory_request("op-4")).await.unwrap();

    engine
        .notify("op-4", json!({"status": "success"}))
        .await
        .unwrap();

    engine.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_duplicate_notification_yields_single_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXPLORATORY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server.uri());
    engine.dispatch(exploratory_request("op-5")).await.unwrap();

    let payload = json!({"status": "ok", "result": {}});
    engine.notify("op-5", payload.clone()).await.unwrap();
    engine.notify("op-5", payload.clone()).await.unwrap();
    engine.notify("op-5", payload).await.unwrap();

    engine.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_unknown_operation_notification_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine(&server.uri());

    engine
        .notify("never-dispatched", json!({"status": "ok", "result": {}}))
        .await
        .unwrap();

    engine.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_malformed_payload_resolves_into_failed_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXPLORATORY_PATH))
        .and(body_partial_json(json!({"request_id": "op-6", "status": "failed"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server.uri());
    engine.dispatch(exploratory_request("op-6")).await.unwrap();

    // Not an envelope at all: no status field
    engine
        .notify("op-6", json!({"unexpected": true}))
        .await
        .unwrap();

    engine.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_failed_launch_leaves_nothing_pending() {
    let server = MockServer::start().await;
    let engine = ProvisioningEngine::builder(Arc::new(MockLauncher::failing()))
        .with_self_service_base_url(server.uri())
        .with_operation_timeout(None)
        .start()
        .unwrap();

    let err = engine
        .dispatch(exploratory_request("op-7"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Launcher(_)));
    assert_eq!(engine.pending_operations(), 0);

    // A late notification for the failed dispatch is discarded
    engine
        .notify("op-7", json!({"status": "ok", "result": {}}))
        .await
        .unwrap();

    engine.shutdown().await;
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_delivers_failed_record_and_blocks_later_notification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXPLORATORY_PATH))
        .and(body_partial_json(json!({
            "request_id": "op-8",
            "status": "failed",
            "error_message": "cancelled by user"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server.uri());
    engine.dispatch(exploratory_request("op-8")).await.unwrap();

    engine.cancel("op-8", "cancelled by user").await.unwrap();

    // The operation is resolved; its notification arrives too late
    engine
        .notify("op-8", json!({"status": "ok", "result": {}}))
        .await
        .unwrap();

    engine.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_timed_out_operation_is_force_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXPLORATORY_PATH))
        .and(body_partial_json(json!({"request_id": "op-9", "status": "failed"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = ProvisioningEngine::builder(Arc::new(MockLauncher::new()))
        .with_self_service_base_url(server.uri())
        .with_operation_timeout(Some(Duration::from_millis(50)))
        .with_timeout_poll_interval(Duration::from_millis(50))
        .start()
        .unwrap();

    engine.dispatch(exploratory_request("op-9")).await.unwrap();

    // Wait past the timeout plus at least one monitor scan
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(engine.pending_operations(), 0);

    engine.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_slow_destination_does_not_block_other_deliveries() {
    let slow_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LIB_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&slow_server)
        .await;
    Mock::given(method("POST"))
        .and(path(EXPLORATORY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&slow_server)
        .await;

    let engine = ProvisioningEngine::builder(Arc::new(MockLauncher::new()))
        .with_self_service_base_url(slow_server.uri())
        .with_operation_timeout(None)
        .with_forwarder_workers(2)
        .start()
        .unwrap();

    let lib_request = OperationRequest::new(
        "alice",
        ResourceKind::LibraryInstall,
        Action::InstallLibraries,
        "nb-1",
    )
    .with_operation_id("op-slow")
    .with_libraries(vec![LibraryRequest::new("pip3", "numpy")]);
    engine.dispatch(lib_request).await.unwrap();
    engine.dispatch(exploratory_request("op-fast")).await.unwrap();

    // The slow delivery goes first; the fast one must not wait behind it
    engine
        .notify(
            "op-slow",
            json!({"status": "success", "result": {"libs": []}}),
        )
        .await
        .unwrap();
    engine
        .notify("op-fast", json!({"status": "ok", "result": {}}))
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        let received = slow_server.received_requests().await.unwrap();
        if received
            .iter()
            .any(|r| r.url.path() == EXPLORATORY_PATH)
        {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "fast delivery was blocked behind the slow destination"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    engine.shutdown().await;
}
