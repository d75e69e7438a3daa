use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{duplicate_po, LimitResult};
use crate::evaluate::{evaluate_po_submission, Decision};
use crate::models::{PoSubmission, PurchaseOrder};
use crate::workflow::require_present;

pub(crate) const RESTRICTION_TITLE: &str = "PO Limit Restriction";

/// What the submit affordance should show for a purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubmissionGate {
    pub(crate) enabled: bool,
    pub(crate) code: &'static str,
    pub(crate) title: String,
    pub(crate) explanation: String,
}

impl SubmissionGate {
    pub(crate) fn from_decision(decision: &Decision) -> Self {
        let title = if decision.is_allowed() {
            "PO Limit".to_string()
        } else {
            RESTRICTION_TITLE.to_string()
        };
        Self {
            enabled: decision.is_allowed(),
            code: decision.code(),
            title,
            explanation: decision.to_string(),
        }
    }
}

/// Read-only check used to render the submit affordance.
pub(crate) fn check(
    db: &Database,
    user: &str,
    company: &str,
    amount: Decimal,
) -> LimitResult<SubmissionGate> {
    let decision = evaluate_po_submission(db, user, company, amount)?;
    Ok(SubmissionGate::from_decision(&decision))
}

/// Evaluate `po` for `user` and, if it passes, record it in the ledger and
/// book its amount against the user's monthly usage. A denied order leaves
/// the store untouched, and so does one whose amount is not positive.
pub(crate) fn submit_purchase_order(
    db: &mut Database,
    user: &str,
    po: &PurchaseOrder,
    today: NaiveDate,
) -> LimitResult<SubmissionGate> {
    require_present("purchase order name", &po.name)?;
    if db.get_po_submission(&po.name)?.is_some() {
        return Err(duplicate_po(&po.name));
    }

    let decision = evaluate_po_submission(db, user, &po.company, po.amount)?;
    let gate = SubmissionGate::from_decision(&decision);
    if !gate.enabled {
        warn!(user, po = %po.name, code = gate.code, "Purchase order blocked");
        return Ok(gate);
    }
    if po.amount <= Decimal::ZERO {
        debug!(user, po = %po.name, amount = %po.amount, "Nothing to book");
        return Ok(gate);
    }

    db.record_po_submission(&PoSubmission::from_order(user.to_string(), po), today)?;
    info!(user, po = %po.name, company = %po.company, amount = %po.amount, "Purchase order submitted");
    Ok(gate)
}

/// Cancel a submitted purchase order and release its amount from usage.
pub(crate) fn cancel_purchase_order(
    db: &mut Database,
    po_name: &str,
    today: NaiveDate,
) -> LimitResult<PoSubmission> {
    let sub = db.cancel_po_submission(po_name, today)?;
    info!(po = %po_name, user = %sub.user, amount = %sub.amount, "Purchase order cancelled");
    Ok(sub)
}
