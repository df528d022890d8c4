use std::sync::Arc;

use chrono::Utc;
use pipeline_desk::dispatch::{Action, ActionKind, Dispatcher};
use pipeline_desk::error::Error;
use pipeline_desk::gateway::memory::{GatewayCall, MemoryGateway};
use pipeline_desk::gateway::{CONTENT_EXTRACTOR_FUNCTION, FunctionResponse, RESET_STUCK_FUNCTION};
use pipeline_desk::model::{Article, ParentRef, QueueStatus, WorkItem};
use serde_json::json;
use uuid::Uuid;

fn job(parent: ParentRef) -> WorkItem {
    WorkItem {
        id: Uuid::new_v4(),
        parent,
        status: QueueStatus::Pending,
        attempts: 0,
        max_attempts: Some(3),
        error_message: None,
        created_at: Utc::now(),
    }
}

fn setup() -> (Arc<MemoryGateway>, Dispatcher) {
    let gateway = Arc::new(MemoryGateway::new());
    let dispatcher = Dispatcher::new(gateway.clone(), 3);
    (gateway, dispatcher)
}

#[tokio::test]
async fn bulk_cancel_is_one_delete_call_with_every_id() {
    let (gateway, dispatcher) = setup();
    let jobs: Vec<WorkItem> = (0..4)
        .map(|_| job(ParentRef::Legacy(Uuid::new_v4())))
        .collect();
    for j in &jobs {
        gateway.insert_work_item(j.clone());
    }
    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();

    let outcome = dispatcher
        .dispatch(Action::BulkCancel(ids.clone()))
        .await
        .unwrap();

    assert_eq!(outcome.kind, ActionKind::BulkCancel);
    assert_eq!(outcome.affected, 4);
    assert_eq!(gateway.calls(), vec![GatewayCall::DeleteQueueItems(ids)]);
    assert!(gateway.queue_ids().is_empty());
}

#[tokio::test]
async fn bulk_cancel_counts_only_rows_that_existed() {
    let (gateway, dispatcher) = setup();
    let live = job(ParentRef::Topic(Uuid::new_v4()));
    gateway.insert_work_item(live.clone());

    let outcome = dispatcher
        .dispatch(Action::BulkCancel(vec![live.id, Uuid::new_v4()]))
        .await
        .unwrap();
    assert_eq!(outcome.affected, 1);
}

#[tokio::test]
async fn empty_bulk_cancel_makes_no_calls() {
    let (gateway, dispatcher) = setup();
    let err = dispatcher
        .dispatch(Action::BulkCancel(Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptySelection("bulk cancel")));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn cancel_reverts_the_parent_story_and_article() {
    let (gateway, dispatcher) = setup();
    let parent = ParentRef::Legacy(Uuid::new_v4());
    gateway.insert_article(Article {
        parent,
        title: "Council votes on budget".into(),
        url: None,
        processing_status: "processing".into(),
        created_at: Utc::now(),
    });
    gateway.insert_story(parent, "generating");
    let j = job(parent);
    gateway.insert_work_item(j.clone());

    let outcome = dispatcher.dispatch(Action::Cancel(j.id)).await.unwrap();

    assert_eq!(outcome.affected, 1);
    assert_eq!(
        gateway.calls(),
        vec![
            GatewayCall::DeleteQueueItems(vec![j.id]),
            GatewayCall::RevertParent(parent),
        ]
    );
    assert_eq!(gateway.story_status(parent).as_deref(), Some("draft"));
    assert_eq!(gateway.article_status(parent).as_deref(), Some("new"));
}

#[tokio::test]
async fn clear_stuck_behaves_like_cancel() {
    let (gateway, dispatcher) = setup();
    let parent = ParentRef::Topic(Uuid::new_v4());
    let j = job(parent);
    gateway.insert_work_item(j.clone());

    let outcome = dispatcher.dispatch(Action::ClearStuck(j.id)).await.unwrap();

    assert_eq!(outcome.kind, ActionKind::ClearStuck);
    assert_eq!(outcome.affected, 1);
    assert_eq!(gateway.calls_to("revert_parent").len(), 1);
}

#[tokio::test]
async fn revert_failure_does_not_fail_cancel() {
    let (gateway, dispatcher) = setup();
    let j = job(ParentRef::Legacy(Uuid::new_v4()));
    gateway.insert_work_item(j.clone());
    gateway.fail("revert_parent");

    let outcome = dispatcher.dispatch(Action::Cancel(j.id)).await.unwrap();
    assert_eq!(outcome.affected, 1);
    assert!(gateway.queue_ids().is_empty());
}

#[tokio::test]
async fn cancelling_a_vanished_job_succeeds_with_nothing_affected() {
    let (gateway, dispatcher) = setup();
    let outcome = dispatcher
        .dispatch(Action::Cancel(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(outcome.affected, 0);
    assert!(gateway.calls_to("revert_parent").is_empty());
}

#[tokio::test]
async fn delete_failure_is_returned() {
    let (gateway, dispatcher) = setup();
    gateway.fail("delete_queue_items");
    assert!(
        dispatcher
            .dispatch(Action::BulkCancel(vec![Uuid::new_v4()]))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn reset_stuck_invokes_the_reset_function() {
    let (gateway, dispatcher) = setup();
    let outcome = dispatcher.dispatch(Action::ResetStuck).await.unwrap();

    assert!(outcome.response.is_some_and(|r| r.success));
    assert_eq!(
        gateway.calls(),
        vec![GatewayCall::Invoke {
            function: RESET_STUCK_FUNCTION.to_string(),
            body: json!({ "resetAll": true }),
        }]
    );
}

#[tokio::test]
async fn reported_function_failure_becomes_an_error() {
    let (gateway, dispatcher) = setup();
    gateway.set_function_response(
        RESET_STUCK_FUNCTION,
        FunctionResponse::failed("lock timeout"),
    );

    let err = dispatcher.dispatch(Action::ResetStuck).await.unwrap_err();
    match err {
        Error::Function { name, message } => {
            assert_eq!(name, RESET_STUCK_FUNCTION);
            assert_eq!(message, "lock timeout");
        }
        other => panic!("expected function error, got {other:?}"),
    }
}

#[tokio::test]
async fn extract_names_the_parent_table() {
    let (gateway, dispatcher) = setup();
    let id = Uuid::new_v4();
    dispatcher
        .dispatch(Action::Extract(ParentRef::Topic(id)))
        .await
        .unwrap();

    assert_eq!(
        gateway.calls(),
        vec![GatewayCall::Invoke {
            function: CONTENT_EXTRACTOR_FUNCTION.to_string(),
            body: json!({ "articleId": id, "table": "topic_articles" }),
        }]
    );
}

#[tokio::test]
async fn approve_enqueues_every_parent_in_one_call() {
    let (gateway, dispatcher) = setup();
    let parents = vec![
        ParentRef::Legacy(Uuid::new_v4()),
        ParentRef::Topic(Uuid::new_v4()),
    ];

    let outcome = dispatcher
        .dispatch(Action::Approve(parents.clone()))
        .await
        .unwrap();

    assert_eq!(outcome.affected, 2);
    assert_eq!(gateway.calls(), vec![GatewayCall::Enqueue(parents)]);
    assert_eq!(gateway.queue_ids().len(), 2);
}

#[tokio::test]
async fn empty_approve_makes_no_calls() {
    let (gateway, dispatcher) = setup();
    let err = dispatcher
        .dispatch(Action::Approve(Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptySelection("approve")));
    assert!(gateway.calls().is_empty());
}
