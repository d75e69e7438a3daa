use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{LimitError, LimitResult};
use crate::models::{Actor, IncreaseRequest, RequestStatus, UserLimit};
use crate::util::now_rfc3339;

/// Fail with an authorization error unless `actor` may resolve requests.
pub(crate) fn require_approver(actor: &Actor, action: &'static str) -> LimitResult<()> {
    if actor.is_approver() {
        return Ok(());
    }
    warn!(actor = %actor.user, action, "Refused: actor lacks approver role");
    Err(LimitError::Authorization {
        actor: actor.user.clone(),
        action,
    })
}

pub(crate) fn require_non_negative(field: &str, value: Decimal) -> LimitResult<()> {
    if value < Decimal::ZERO {
        return Err(LimitError::Validation(format!(
            "{field} must not be negative (got {value})"
        )));
    }
    Ok(())
}

pub(crate) fn require_present(field: &str, value: &str) -> LimitResult<()> {
    if value.trim().is_empty() {
        return Err(LimitError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Raise a new request for `user` in `company`. The current limits (zero when
/// none exist) are captured alongside the requested ones.
pub(crate) fn submit(
    db: &Database,
    user: &str,
    company: &str,
    requested_per_po_limit: Decimal,
    requested_per_month_limit: Decimal,
    reason: &str,
) -> LimitResult<IncreaseRequest> {
    require_present("user", user)?;
    require_present("company", company)?;
    require_non_negative("requested per PO limit", requested_per_po_limit)?;
    require_non_negative("requested per month limit", requested_per_month_limit)?;

    let mut req = IncreaseRequest::new(
        user.to_string(),
        company.to_string(),
        requested_per_po_limit,
        requested_per_month_limit,
    );
    req.reason = reason.trim().to_string();
    if let Some(current) = db.get_user_limit(user, company)? {
        req.current_per_po_limit = current.per_po_limit;
        req.current_per_month_limit = current.per_month_limit;
    }

    let id = db.insert_increase_request(&req)?;
    req.id = Some(id);
    info!(
        request_id = id,
        user,
        company,
        per_po = %requested_per_po_limit,
        per_month = %requested_per_month_limit,
        "Limit increase requested"
    );
    Ok(req)
}

/// Approve a pending request and apply its limits to the user's record,
/// creating the record if needed. Returns the resulting limit.
///
/// The status change is a conditional update on `Pending Approval`, so of two
/// approvers racing on one request only the first wins.
pub(crate) fn approve(db: &mut Database, request_id: i64, actor: &Actor) -> LimitResult<UserLimit> {
    require_approver(actor, "approve limit increase requests")?;

    let limit = db
        .approve_increase_request(request_id, &actor.user, &now_rfc3339())
        .inspect_err(|e| warn!(request_id, actor = %actor.user, error = %e, "Approval refused"))?;

    info!(
        request_id,
        approver = %actor.user,
        user = %limit.user,
        company = %limit.company,
        per_po = %limit.per_po_limit,
        per_month = %limit.per_month_limit,
        "Limit increase approved"
    );
    Ok(limit)
}

/// Reject a pending request. The user's limits are left untouched.
pub(crate) fn reject(
    db: &mut Database,
    request_id: i64,
    actor: &Actor,
    rejection_reason: &str,
) -> LimitResult<IncreaseRequest> {
    require_approver(actor, "reject limit increase requests")?;
    require_present("rejection reason", rejection_reason)?;

    let req = db
        .reject_increase_request(
            request_id,
            &actor.user,
            &now_rfc3339(),
            rejection_reason.trim(),
        )
        .inspect_err(|e| warn!(request_id, actor = %actor.user, error = %e, "Rejection refused"))?;

    info!(request_id, approver = %actor.user, user = %req.user, "Limit increase rejected");
    Ok(req)
}

pub(crate) fn list_pending(db: &Database) -> LimitResult<Vec<IncreaseRequest>> {
    db.list_increase_requests(Some(RequestStatus::PendingApproval))
}

#[cfg(test)]
mod tests;
