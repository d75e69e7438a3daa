use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use tracing::info;

use crate::db::{Database, LimitFilter};
use crate::error::LimitResult;

/// True when `last_reset_date` falls in a different calendar month than
/// `today`. An unparseable anchor counts as rolled over.
pub(crate) fn month_rolled_over(last_reset_date: &str, today: NaiveDate) -> bool {
    match NaiveDate::parse_from_str(last_reset_date.trim(), "%Y-%m-%d") {
        Ok(last) => last.year() != today.year() || last.month() != today.month(),
        Err(_) => true,
    }
}

/// Rebuild every record's usage from the ledger for the month containing
/// `today`. Returns how many records ended up with non-zero usage.
///
/// `monthly_usage` is a cache over the ledger for the month named by
/// `last_reset_date`. It is informational only; the evaluator never gates on it.
pub(crate) fn recompute_monthly_usage(db: &Database, today: NaiveDate) -> LimitResult<usize> {
    let month = today.format("%Y-%m").to_string();
    let anchor = today.format("%Y-%m-%d").to_string();
    let mut count = 0;

    for limit in db.list_user_limits(&LimitFilter::default())? {
        let total = db
            .get_month_po_total(&limit.user, &limit.company, &month)?
            .max(Decimal::ZERO);
        db.set_monthly_usage(&limit.user, &limit.company, total, &anchor)?;
        if !total.is_zero() {
            count += 1;
        }
    }

    info!(month = %month, updated = count, "Recomputed monthly usage");
    Ok(count)
}
