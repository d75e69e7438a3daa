#![allow(clippy::unwrap_used, clippy::panic)]

use super::*;
use crate::models::{LimitStatus, Role};
use rust_decimal_macros::dec;
use std::sync::{Arc, Barrier};

fn approver(name: &str) -> Actor {
    Actor::new(name.into(), vec![Role::ManagingDirector])
}

fn clerk(name: &str) -> Actor {
    Actor::new(name.into(), vec![Role::PurchaseOrderCreator])
}

fn pending_request(db: &Database) -> i64 {
    submit(db, "alice", "Acme", dec!(2000), dec!(10000), "new supplier")
        .unwrap()
        .id
        .unwrap()
}

// ── submit ────────────────────────────────────────────────────

#[test]
fn test_submit_creates_pending_request() {
    let db = Database::open_in_memory().unwrap();
    let req = submit(&db, "alice", "Acme", dec!(2000), dec!(10000), " new supplier ").unwrap();
    assert!(req.is_pending());
    assert_eq!(req.reason, "new supplier");

    let stored = db.get_increase_request(req.id.unwrap()).unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::PendingApproval);
    assert_eq!(stored.requested_per_po_limit, dec!(2000));
    assert_eq!(stored.requested_per_month_limit, dec!(10000));
    assert!(stored.resolved_at.is_none());
    assert!(stored.resolved_by.is_none());
}

#[test]
fn test_submit_snapshots_current_limits() {
    let db = Database::open_in_memory().unwrap();
    let existing = UserLimit::new(
        "alice".into(),
        "Acme".into(),
        dec!(500),
        dec!(1500),
        LimitStatus::Active,
    );
    db.insert_limit_if_absent(&existing).unwrap();

    let req = submit(&db, "alice", "Acme", dec!(2000), dec!(10000), "").unwrap();
    assert_eq!(req.current_per_po_limit, dec!(500));
    assert_eq!(req.current_per_month_limit, dec!(1500));

    let fresh = submit(&db, "bob", "Acme", dec!(100), dec!(100), "").unwrap();
    assert_eq!(fresh.current_per_po_limit, Decimal::ZERO);
}

#[test]
fn test_submit_allows_lower_or_zero_values() {
    let db = Database::open_in_memory().unwrap();
    let req = submit(&db, "alice", "Acme", Decimal::ZERO, Decimal::ZERO, "").unwrap();
    assert!(req.is_pending());
}

#[test]
fn test_submit_rejects_negative_limits() {
    let db = Database::open_in_memory().unwrap();
    let err = submit(&db, "alice", "Acme", dec!(-1), dec!(100), "").unwrap_err();
    assert!(matches!(err, LimitError::Validation(_)));
    let err = submit(&db, "alice", "Acme", dec!(100), dec!(-0.01), "").unwrap_err();
    assert!(matches!(err, LimitError::Validation(_)));
    assert!(list_pending(&db).unwrap().is_empty());
}

#[test]
fn test_submit_requires_user_and_company() {
    let db = Database::open_in_memory().unwrap();
    assert!(matches!(
        submit(&db, " ", "Acme", dec!(1), dec!(1), ""),
        Err(LimitError::Validation(_))
    ));
    assert!(matches!(
        submit(&db, "alice", "", dec!(1), dec!(1), ""),
        Err(LimitError::Validation(_))
    ));
}

// ── approve ───────────────────────────────────────────────────

#[test]
fn test_submit_then_approve_scenario() {
    let mut db = Database::open_in_memory().unwrap();
    let id = pending_request(&db);

    let limit = approve(&mut db, id, &approver("md")).unwrap();
    assert_eq!(limit.per_po_limit, dec!(2000));
    assert_eq!(limit.per_month_limit, dec!(10000));
    assert_eq!(limit.status, LimitStatus::Active);

    let stored = db.get_user_limit("alice", "Acme").unwrap().unwrap();
    assert_eq!(stored.per_po_limit, dec!(2000));
    assert_eq!(stored.per_month_limit, dec!(10000));
    assert_eq!(stored.status, LimitStatus::Active);
    assert_eq!(stored.monthly_usage, Decimal::ZERO);

    let req = db.get_increase_request(id).unwrap().unwrap();
    assert_eq!(req.status, RequestStatus::Approved);
    assert_eq!(req.resolved_by.as_deref(), Some("md"));
    assert!(req.resolved_at.is_some());
    assert!(req.rejection_reason.is_none());
}

#[test]
fn test_approve_reactivates_revoked_limit_and_keeps_usage() {
    let mut db = Database::open_in_memory().unwrap();
    let mut existing = UserLimit::revoked("alice".into(), "Acme".into());
    existing.monthly_usage = dec!(75);
    db.insert_limit_if_absent(&existing).unwrap();

    let id = pending_request(&db);
    let limit = approve(&mut db, id, &approver("md")).unwrap();
    assert_eq!(limit.status, LimitStatus::Active);
    assert_eq!(limit.per_po_limit, dec!(2000));
    assert_eq!(limit.monthly_usage, dec!(75));
    assert_eq!(limit.last_updated_by.as_deref(), Some("md"));
}

#[test]
fn test_system_manager_can_approve() {
    let mut db = Database::open_in_memory().unwrap();
    let id = pending_request(&db);
    let sm = Actor::new("ops".into(), vec![Role::SystemManager]);
    assert!(approve(&mut db, id, &sm).is_ok());
}

#[test]
fn test_approve_requires_approver_role() {
    let mut db = Database::open_in_memory().unwrap();
    let id = pending_request(&db);

    let err = approve(&mut db, id, &clerk("alice")).unwrap_err();
    assert!(matches!(err, LimitError::Authorization { .. }));

    // Nothing moved
    assert!(db.get_increase_request(id).unwrap().unwrap().is_pending());
    assert!(db.get_user_limit("alice", "Acme").unwrap().is_none());
}

#[test]
fn test_approve_unknown_request() {
    let mut db = Database::open_in_memory().unwrap();
    let err = approve(&mut db, 4242, &approver("md")).unwrap_err();
    assert!(matches!(err, LimitError::NotFound(_)));
}

#[test]
fn test_approve_twice_is_invalid_state() {
    let mut db = Database::open_in_memory().unwrap();
    let id = pending_request(&db);
    approve(&mut db, id, &approver("md")).unwrap();

    // An admin edit after approval must survive a second approval attempt.
    let mut edited = db.get_user_limit("alice", "Acme").unwrap().unwrap();
    edited.per_po_limit = dec!(1500);
    db.upsert_user_limit(&edited, "md", "2024-01-01T00:00:00Z").unwrap();

    let err = approve(&mut db, id, &approver("md2")).unwrap_err();
    match err {
        LimitError::InvalidState { id: got, status } => {
            assert_eq!(got, id);
            assert_eq!(status, RequestStatus::Approved);
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }

    let limit = db.get_user_limit("alice", "Acme").unwrap().unwrap();
    assert_eq!(limit.per_po_limit, dec!(1500));
    let req = db.get_increase_request(id).unwrap().unwrap();
    assert_eq!(req.resolved_by.as_deref(), Some("md"));
}

#[test]
fn test_approve_rejected_request_is_invalid_state() {
    let mut db = Database::open_in_memory().unwrap();
    let id = pending_request(&db);
    reject(&mut db, id, &approver("md"), "budget freeze").unwrap();

    let err = approve(&mut db, id, &approver("md")).unwrap_err();
    assert!(matches!(
        err,
        LimitError::InvalidState {
            status: RequestStatus::Rejected,
            ..
        }
    ));
    assert!(db.get_user_limit("alice", "Acme").unwrap().is_none());
}

#[test]
fn test_concurrent_approvals_apply_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("limits.db");
    let id = {
        let db = Database::open(&path).unwrap();
        pending_request(&db)
    };

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["md-one", "md-two"]
        .into_iter()
        .map(|name| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let mut db = Database::open(&path).unwrap();
                barrier.wait();
                (name, approve(&mut db, id, &approver(name)))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<&str> = results
        .iter()
        .filter(|(_, r)| r.is_ok())
        .map(|(name, _)| *name)
        .collect();
    assert_eq!(winners.len(), 1);

    let losers: Vec<&LimitError> = results.iter().filter_map(|(_, r)| r.as_ref().err()).collect();
    assert_eq!(losers.len(), 1);
    assert!(matches!(
        losers[0],
        LimitError::InvalidState {
            status: RequestStatus::Approved,
            ..
        }
    ));

    let db = Database::open(&path).unwrap();
    let limit = db.get_user_limit("alice", "Acme").unwrap().unwrap();
    assert_eq!(limit.per_po_limit, dec!(2000));
    assert_eq!(limit.per_month_limit, dec!(10000));
    assert_eq!(limit.status, LimitStatus::Active);
    assert_eq!(limit.last_updated_by.as_deref(), Some(winners[0]));

    let req = db.get_increase_request(id).unwrap().unwrap();
    assert_eq!(req.status, RequestStatus::Approved);
    assert_eq!(req.resolved_by.as_deref(), Some(winners[0]));
}

// ── reject ────────────────────────────────────────────────────

#[test]
fn test_reject_records_reason_and_leaves_limit_alone() {
    let mut db = Database::open_in_memory().unwrap();
    let existing = UserLimit::new(
        "alice".into(),
        "Acme".into(),
        dec!(500),
        dec!(1500),
        LimitStatus::Active,
    );
    db.insert_limit_if_absent(&existing).unwrap();
    let id = pending_request(&db);

    let req = reject(&mut db, id, &approver("md"), "  over budget ").unwrap();
    assert_eq!(req.status, RequestStatus::Rejected);
    assert_eq!(req.rejection_reason.as_deref(), Some("over budget"));
    assert_eq!(req.resolved_by.as_deref(), Some("md"));
    assert!(req.resolved_at.is_some());

    let limit = db.get_user_limit("alice", "Acme").unwrap().unwrap();
    assert_eq!(limit.per_po_limit, dec!(500));
    assert_eq!(limit.per_month_limit, dec!(1500));
}

#[test]
fn test_reject_empty_reason_keeps_request_pending() {
    let mut db = Database::open_in_memory().unwrap();
    let id = pending_request(&db);

    for reason in ["", "   "] {
        let err = reject(&mut db, id, &approver("md"), reason).unwrap_err();
        assert!(matches!(err, LimitError::Validation(_)));
    }
    let req = db.get_increase_request(id).unwrap().unwrap();
    assert!(req.is_pending());
    assert!(req.rejection_reason.is_none());
}

#[test]
fn test_reject_checks_authorization_before_reason() {
    let mut db = Database::open_in_memory().unwrap();
    let id = pending_request(&db);
    let err = reject(&mut db, id, &clerk("bob"), "").unwrap_err();
    assert!(matches!(err, LimitError::Authorization { .. }));
}

#[test]
fn test_reject_terminal_request_is_invalid_state() {
    let mut db = Database::open_in_memory().unwrap();
    let id = pending_request(&db);
    approve(&mut db, id, &approver("md")).unwrap();

    let err = reject(&mut db, id, &approver("md"), "changed my mind").unwrap_err();
    assert!(matches!(
        err,
        LimitError::InvalidState {
            status: RequestStatus::Approved,
            ..
        }
    ));
    let req = db.get_increase_request(id).unwrap().unwrap();
    assert!(req.rejection_reason.is_none());
}

#[test]
fn test_reject_unknown_request() {
    let mut db = Database::open_in_memory().unwrap();
    let err = reject(&mut db, 7, &approver("md"), "no").unwrap_err();
    assert!(matches!(err, LimitError::NotFound(_)));
}

// ── listing ───────────────────────────────────────────────────

#[test]
fn test_list_pending_excludes_resolved() {
    let mut db = Database::open_in_memory().unwrap();
    let a = pending_request(&db);
    let b = submit(&db, "bob", "Acme", dec!(10), dec!(10), "").unwrap().id.unwrap();
    let c = submit(&db, "carol", "Globex", dec!(10), dec!(10), "").unwrap().id.unwrap();

    approve(&mut db, a, &approver("md")).unwrap();
    reject(&mut db, b, &approver("md"), "duplicate").unwrap();

    let pending = list_pending(&db).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, Some(c));
    assert_eq!(pending[0].user, "carol");

    assert_eq!(db.list_increase_requests(None).unwrap().len(), 3);
}
