use rust_decimal::Decimal;
use tracing::info;

use crate::db::Database;
use crate::error::{LimitError, LimitResult};
use crate::models::{Actor, LimitStatus, UserLimit};
use crate::util::now_rfc3339;
use crate::workflow::{require_approver, require_non_negative, require_present};

/// Set a user's limits and status in one company, creating the record if it
/// does not exist yet. This bypasses the request workflow.
pub(crate) fn upsert_user_limit(
    db: &Database,
    actor: &Actor,
    user: &str,
    company: &str,
    per_po_limit: Decimal,
    per_month_limit: Decimal,
    status: LimitStatus,
) -> LimitResult<UserLimit> {
    require_approver(actor, "edit purchase order limits")?;
    require_present("user", user)?;
    require_present("company", company)?;
    require_non_negative("per PO limit", per_po_limit)?;
    require_non_negative("per month limit", per_month_limit)?;

    let limit = UserLimit::new(
        user.to_string(),
        company.to_string(),
        per_po_limit,
        per_month_limit,
        status,
    );
    let saved = db.upsert_user_limit(&limit, &actor.user, &now_rfc3339())?;
    info!(
        admin = %actor.user,
        user,
        company,
        per_po = %per_po_limit,
        per_month = %per_month_limit,
        status = %status,
        "Limit updated"
    );
    Ok(saved)
}

/// Revoke or reinstate an existing record without touching its amounts.
pub(crate) fn set_limit_status(
    db: &Database,
    actor: &Actor,
    user: &str,
    company: &str,
    status: LimitStatus,
) -> LimitResult<UserLimit> {
    require_approver(actor, "change purchase order limit status")?;

    let updated = db
        .set_limit_status(user, company, status, &actor.user, &now_rfc3339())?
        .ok_or_else(|| LimitError::NotFound(format!("PO limit for {user} in {company}")))?;
    info!(admin = %actor.user, user, company, status = %status, "Limit status changed");
    Ok(updated)
}

/// Give `user` a revoked zero limit in every company where they have none.
/// Returns the number of records created.
pub(crate) fn provision_user(db: &Database, user: &str, companies: &[String]) -> LimitResult<usize> {
    require_present("user", user)?;

    let mut created = 0;
    for company in companies {
        if company.trim().is_empty() {
            continue;
        }
        let placeholder = UserLimit::revoked(user.to_string(), company.clone());
        if db.insert_limit_if_absent(&placeholder)? {
            created += 1;
        }
    }
    if created > 0 {
        info!(user, created, "Provisioned default PO limits");
    }
    Ok(created)
}
