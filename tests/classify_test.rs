//! Queue classifier behavior.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use pipeline_desk::classify::{QueueClass, QueuePolicy, StuckReason, classify, is_terminal_failure};
use pipeline_desk::model::{ParentRef, QueueStatus, WorkItem};
use pipeline_desk::reconcile::join_queue;
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
}

fn item(status: QueueStatus, attempts: u32, max_attempts: u32, age: TimeDelta) -> WorkItem {
    WorkItem {
        id: Uuid::new_v4(),
        parent: ParentRef::Legacy(Uuid::new_v4()),
        status,
        attempts,
        max_attempts: Some(max_attempts),
        error_message: None,
        created_at: now() - age,
    }
}

#[test]
fn exhausted_attempts_are_stuck_whatever_the_status() {
    let policy = QueuePolicy::default();
    for status in [
        QueueStatus::Pending,
        QueueStatus::Processing,
        QueueStatus::Completed,
        QueueStatus::Failed,
    ] {
        for (attempts, max) in [(3, 3), (4, 3), (1, 1)] {
            let c = classify(&item(status, attempts, max, TimeDelta::zero()), now(), &policy);
            assert_eq!(c.class, QueueClass::Stuck, "{status} {attempts}/{max}");
            assert_eq!(
                c.reason,
                Some(StuckReason::AttemptsExhausted {
                    attempts,
                    max_attempts: max
                })
            );
        }
    }
}

#[test]
fn processing_turns_stuck_just_past_the_staleness_window() {
    let policy = QueuePolicy::default();
    let window = TimeDelta::minutes(10);
    let ms = TimeDelta::milliseconds(1);

    let over = item(QueueStatus::Processing, 0, 3, window + ms);
    let under = item(QueueStatus::Processing, 0, 3, window - ms);

    assert_eq!(classify(&over, now(), &policy).class, QueueClass::Stuck);
    assert!(matches!(
        classify(&over, now(), &policy).reason,
        Some(StuckReason::Stale { age_secs: 600 })
    ));
    assert_eq!(classify(&under, now(), &policy).class, QueueClass::Processing);
    assert_eq!(classify(&under, now(), &policy).reason, None);
}

#[test]
fn old_pending_items_stay_pending() {
    let policy = QueuePolicy::default();
    let old = item(QueueStatus::Pending, 1, 3, TimeDelta::hours(6));
    assert_eq!(classify(&old, now(), &policy).class, QueueClass::Pending);
}

#[test]
fn missing_max_attempts_falls_back_to_policy_default() {
    let policy = QueuePolicy {
        stale_after_secs: 600,
        default_max_attempts: 2,
    };
    let mut it = item(QueueStatus::Pending, 2, 0, TimeDelta::zero());
    it.max_attempts = None;
    assert_eq!(classify(&it, now(), &policy).class, QueueClass::Stuck);

    it.attempts = 1;
    assert_eq!(classify(&it, now(), &policy).class, QueueClass::Pending);
}

#[test]
fn staleness_window_comes_from_policy() {
    let policy = QueuePolicy {
        stale_after_secs: 120,
        default_max_attempts: 3,
    };
    let it = item(QueueStatus::Processing, 0, 3, TimeDelta::minutes(3));
    assert_eq!(classify(&it, now(), &policy).class, QueueClass::Stuck);
}

#[test]
fn huge_staleness_window_never_marks_stale() {
    let policy = QueuePolicy {
        stale_after_secs: u64::MAX,
        default_max_attempts: 3,
    };
    let it = item(QueueStatus::Processing, 0, 3, TimeDelta::days(3650));
    assert_eq!(classify(&it, now(), &policy).class, QueueClass::Processing);
}

#[test]
fn terminal_failure_needs_exhaustion_and_not_processing() {
    let policy = QueuePolicy::default();
    assert!(is_terminal_failure(
        &item(QueueStatus::Pending, 3, 3, TimeDelta::zero()),
        &policy
    ));
    assert!(!is_terminal_failure(
        &item(QueueStatus::Processing, 3, 3, TimeDelta::zero()),
        &policy
    ));
    assert!(!is_terminal_failure(
        &item(QueueStatus::Pending, 2, 3, TimeDelta::zero()),
        &policy
    ));
}

#[test]
fn exhausted_pending_is_hidden_and_stale_processing_is_shown_stuck() {
    let policy = QueuePolicy::default();
    let a = item(QueueStatus::Pending, 3, 3, TimeDelta::zero());
    let b = item(QueueStatus::Processing, 0, 3, TimeDelta::minutes(11));

    assert_eq!(classify(&a, now(), &policy).class, QueueClass::Stuck);

    let rows = join_queue(vec![a.clone(), b.clone()], Vec::new(), now(), &policy);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id(), b.id);
    assert!(rows[0].is_stuck());
}
