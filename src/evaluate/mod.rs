use rust_decimal::Decimal;
use tracing::debug;

use crate::db::Database;
use crate::error::LimitResult;
use crate::models::UserLimit;
use crate::util::format_amount;

/// Outcome of checking a purchase-order amount against a user's limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    Allowed(Allowance),
    Denied(Denial),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Allowance {
    pub(crate) amount: Decimal,
    pub(crate) per_po_limit: Decimal,
    pub(crate) per_month_limit: Decimal,
    /// Headroom left under the per-PO limit after this amount.
    pub(crate) remaining: Decimal,
    /// Display only; never compared against `per_month_limit`.
    pub(crate) monthly_usage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Denial {
    RequiresApproval,
    NoPerPoLimit,
    NoMonthlyLimit,
    PerPoExceeded {
        amount: Decimal,
        per_po_limit: Decimal,
        excess: Decimal,
    },
}

impl Denial {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::RequiresApproval => "RequiresApproval",
            Self::NoPerPoLimit => "NoPerPoLimit",
            Self::NoMonthlyLimit => "NoMonthlyLimit",
            Self::PerPoExceeded { .. } => "PerPoExceeded",
        }
    }
}

impl Decision {
    pub(crate) fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::Allowed(_) => "Allowed",
            Self::Denied(d) => d.code(),
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed(a) => write!(
                f,
                "PO amount {} is within your Per PO Limit {} ({} remaining). Per Month Limit: {}, used this month: {}.",
                format_amount(a.amount),
                format_amount(a.per_po_limit),
                format_amount(a.remaining),
                format_amount(a.per_month_limit),
                format_amount(a.monthly_usage),
            ),
            Self::Denied(Denial::RequiresApproval) => write!(
                f,
                "PO submission requires MD approval. Please request a PO submission limit."
            ),
            Self::Denied(Denial::NoPerPoLimit) => write!(
                f,
                "PO submission requires MD approval. No Per PO Limit is set."
            ),
            Self::Denied(Denial::NoMonthlyLimit) => write!(
                f,
                "PO submission requires MD approval. No Per Month Limit is set."
            ),
            Self::Denied(Denial::PerPoExceeded {
                amount,
                per_po_limit,
                excess,
            }) => write!(
                f,
                "PO Amount ({}) exceeds your Per PO Limit ({}). Excess: {}. Please reduce the PO amount or request MD approval.",
                format_amount(*amount),
                format_amount(*per_po_limit),
                format_amount(*excess),
            ),
        }
    }
}

/// Apply the admission rules in order; the first rule that matches decides.
///
/// 1. no record, or a revoked one
/// 2. per-PO limit not positive
/// 3. monthly limit not positive
/// 4. amount above the per-PO limit
pub(crate) fn evaluate(limit: Option<&UserLimit>, amount: Decimal) -> Decision {
    let limit = match limit {
        Some(l) if l.is_active() => l,
        _ => return Decision::Denied(Denial::RequiresApproval),
    };

    if limit.per_po_limit <= Decimal::ZERO {
        return Decision::Denied(Denial::NoPerPoLimit);
    }
    if limit.per_month_limit <= Decimal::ZERO {
        return Decision::Denied(Denial::NoMonthlyLimit);
    }
    if amount > limit.per_po_limit {
        return Decision::Denied(Denial::PerPoExceeded {
            amount,
            per_po_limit: limit.per_po_limit,
            excess: amount - limit.per_po_limit,
        });
    }

    Decision::Allowed(Allowance {
        amount,
        per_po_limit: limit.per_po_limit,
        per_month_limit: limit.per_month_limit,
        remaining: limit.per_po_limit - amount,
        monthly_usage: limit.monthly_usage,
    })
}

/// Look up the user's limit in `company` and evaluate `amount` against it.
pub(crate) fn evaluate_po_submission(
    db: &Database,
    user: &str,
    company: &str,
    amount: Decimal,
) -> LimitResult<Decision> {
    let limit = db.get_user_limit(user, company)?;
    let decision = evaluate(limit.as_ref(), amount);
    debug!(user, company, amount = %amount, decision = decision.code(), "Evaluated PO amount");
    Ok(decision)
}
