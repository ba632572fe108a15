//! Integration tests for HttpService against a real server.
//!
//! Each test spawns an in-process axum server on 127.0.0.1:0, then exercises
//! the HTTP client layer through the full request/response cycle.

use std::time::Duration;

use eventsource_stream::Eventsource;
use flowstate_core::notification::{NotificationKind, NotificationRequest};
use flowstate_server::test_helpers::{spawn_test_server, spawn_test_server_with_auth};
use flowstate_service::{HttpService, NotificationService, ServiceError};
use futures::StreamExt;

fn build_done() -> NotificationRequest {
    NotificationRequest {
        kind: NotificationKind::Completed,
        title: "Build done".into(),
        body: "Task X finished".into(),
        task_run_id: "t1".into(),
        project_id: "p1".into(),
        issue_id: "i1".into(),
    }
}

#[tokio::test]
async fn health_check_via_http() {
    let server = spawn_test_server().await;
    let svc = HttpService::new(&server.base_url);
    svc.health_check().await.unwrap();
}

#[tokio::test]
async fn publish_without_listeners_is_accepted() {
    let server = spawn_test_server().await;
    let svc = HttpService::new(&server.base_url);
    let receipt = svc.publish_notification(&build_done()).await.unwrap();
    assert_eq!(receipt.delivered, 0);
    assert!(!receipt.id.is_empty());
}

#[tokio::test]
async fn publish_rejects_invalid_request() {
    let server = spawn_test_server().await;
    let svc = HttpService::new(&server.base_url);
    let mut req = build_done();
    req.title.clear();
    let err = svc.publish_notification(&req).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)), "got {err:?}");
}

#[tokio::test]
async fn published_notification_arrives_on_stream() {
    let server = spawn_test_server().await;
    let svc = HttpService::new(&server.base_url);

    let mut events = svc.notification_stream().await.unwrap().eventsource();
    assert_eq!(server.hub.subscriber_count(), 1);

    let receipt = svc.publish_notification(&build_done()).await.unwrap();
    assert_eq!(receipt.delivered, 1);

    let event = tokio::time::timeout(Duration::from_secs(5), events.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream ended")
        .expect("malformed event");
    assert_eq!(event.id, receipt.id);
    let decoded = NotificationRequest::from_json(&event.data).unwrap();
    assert_eq!(decoded, build_done());
}

#[tokio::test]
async fn stream_preserves_publish_order() {
    let server = spawn_test_server().await;
    let svc = HttpService::new(&server.base_url);
    let mut events = svc.notification_stream().await.unwrap().eventsource();

    for title in ["first", "second", "third"] {
        let mut req = build_done();
        req.title = title.into();
        svc.publish_notification(&req).await.unwrap();
    }

    let mut titles = Vec::new();
    while titles.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        titles.push(NotificationRequest::from_json(&event.data).unwrap().title);
    }
    assert_eq!(titles, ["first", "second", "third"]);
}

#[tokio::test]
async fn authenticated_server_requires_key() {
    let server = spawn_test_server_with_auth().await;

    let anonymous = HttpService::new(&server.base_url);
    anonymous.health_check().await.unwrap();
    let err = anonymous.publish_notification(&build_done()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)), "got {err:?}");
    assert!(matches!(
        anonymous.notification_stream().await,
        Err(ServiceError::Unauthorized(_))
    ));

    let key = server.api_key.clone().unwrap();
    let authed = HttpService::with_api_key(&server.base_url, key);
    authed.publish_notification(&build_done()).await.unwrap();
    assert!(authed.notification_stream().await.is_ok());
}
