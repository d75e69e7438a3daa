mod schema;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{duplicate_po, LimitError, LimitResult};
use crate::models::*;

/// How long a writer waits for another connection's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const LIMIT_COLUMNS: &str = "id, user, company, per_po_limit, per_month_limit, status, \
     monthly_usage, last_reset_date, last_updated_by, last_updated_at";

const REQUEST_COLUMNS: &str = "id, user, company, requested_per_po_limit, \
     requested_per_month_limit, current_per_po_limit, current_per_month_limit, reason, \
     status, rejection_reason, created_at, resolved_at, resolved_by";

/// Optional narrowing for [`Database::list_user_limits`].
#[derive(Debug, Clone, Default)]
pub(crate) struct LimitFilter {
    pub(crate) user: Option<String>,
    pub(crate) company: Option<String>,
    pub(crate) status: Option<LimitStatus>,
}

pub(crate) struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn open(path: &Path) -> LimitResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> LimitResult<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&mut self) -> LimitResult<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            // Fresh database - apply full schema
            let tx = self.conn.transaction()?;
            tx.execute_batch(schema::SCHEMA_V1)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            tx.commit()?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    // ── User limits ───────────────────────────────────────────

    pub(crate) fn get_user_limit(&self, user: &str, company: &str) -> LimitResult<Option<UserLimit>> {
        let result = self.conn.query_row(
            &format!("SELECT {LIMIT_COLUMNS} FROM user_limits WHERE user = ?1 AND company = ?2"),
            params![user, company],
            limit_from_row,
        );
        match result {
            Ok(l) => Ok(Some(l)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn list_user_limits(&self, filter: &LimitFilter) -> LimitResult<Vec<UserLimit>> {
        let mut sql = format!("SELECT {LIMIT_COLUMNS} FROM user_limits WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(user) = &filter.user {
            sql.push_str(&format!(" AND user = ?{}", param_values.len() + 1));
            param_values.push(Box::new(user.clone()));
        }
        if let Some(company) = &filter.company {
            sql.push_str(&format!(" AND company = ?{}", param_values.len() + 1));
            param_values.push(Box::new(company.clone()));
        }
        if let Some(status) = filter.status {
            sql.push_str(&format!(" AND status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str()));
        }

        sql.push_str(" ORDER BY user, company");

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_ref.as_slice(), limit_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Insert or update the limits and status for (user, company).
    /// Usage figures on an existing record are left as they are.
    pub(crate) fn upsert_user_limit(
        &self,
        limit: &UserLimit,
        updated_by: &str,
        updated_at: &str,
    ) -> LimitResult<UserLimit> {
        upsert_limit(
            &self.conn,
            &limit.user,
            &limit.company,
            limit.per_po_limit,
            limit.per_month_limit,
            limit.status,
            &limit.last_reset_date,
            updated_by,
            updated_at,
        )
    }

    /// Insert `limit` unless (user, company) already has a record.
    /// Returns whether a row was created.
    pub(crate) fn insert_limit_if_absent(&self, limit: &UserLimit) -> LimitResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO user_limits
                 (user, company, per_po_limit, per_month_limit, status, monthly_usage, last_reset_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                limit.user,
                limit.company,
                limit.per_po_limit.to_string(),
                limit.per_month_limit.to_string(),
                limit.status.as_str(),
                limit.monthly_usage.to_string(),
                limit.last_reset_date,
            ],
        )?;
        Ok(changed > 0)
    }

    pub(crate) fn set_limit_status(
        &self,
        user: &str,
        company: &str,
        status: LimitStatus,
        updated_by: &str,
        updated_at: &str,
    ) -> LimitResult<Option<UserLimit>> {
        let changed = self.conn.execute(
            "UPDATE user_limits SET status = ?1, last_updated_by = ?2, last_updated_at = ?3
             WHERE user = ?4 AND company = ?5",
            params![status.as_str(), updated_by, updated_at, user, company],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_user_limit(user, company)
    }

    // ── Increase requests ─────────────────────────────────────

    pub(crate) fn insert_increase_request(&self, req: &IncreaseRequest) -> LimitResult<i64> {
        self.conn.execute(
            "INSERT INTO increase_requests
                 (user, company, requested_per_po_limit, requested_per_month_limit,
                  current_per_po_limit, current_per_month_limit, reason, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                req.user,
                req.company,
                req.requested_per_po_limit.to_string(),
                req.requested_per_month_limit.to_string(),
                req.current_per_po_limit.to_string(),
                req.current_per_month_limit.to_string(),
                req.reason,
                RequestStatus::PendingApproval.as_str(),
                req.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub(crate) fn get_increase_request(&self, id: i64) -> LimitResult<Option<IncreaseRequest>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM increase_requests WHERE id = ?1"),
                params![id],
                request_from_row,
            )
            .optional()?)
    }

    pub(crate) fn list_increase_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> LimitResult<Vec<IncreaseRequest>> {
        let mut stmt;
        let rows = match status {
            Some(s) => {
                stmt = self.conn.prepare(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM increase_requests WHERE status = ?1
                     ORDER BY created_at, id"
                ))?;
                stmt.query_map(params![s.as_str()], request_from_row)?
            }
            None => {
                stmt = self.conn.prepare(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM increase_requests ORDER BY created_at, id"
                ))?;
                stmt.query_map([], request_from_row)?
            }
        };
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Move a pending request to Approved and apply its limits in one
    /// immediate transaction. Only the connection whose conditional update
    /// matched a pending row gets to touch the user's limit.
    pub(crate) fn approve_increase_request(
        &mut self,
        id: i64,
        resolved_by: &str,
        resolved_at: &str,
    ) -> LimitResult<UserLimit> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE increase_requests SET status = ?1, resolved_at = ?2, resolved_by = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                RequestStatus::Approved.as_str(),
                resolved_at,
                resolved_by,
                id,
                RequestStatus::PendingApproval.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(transition_error(&tx, id));
        }

        let req = tx.query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM increase_requests WHERE id = ?1"),
            params![id],
            request_from_row,
        )?;
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let limit = upsert_limit(
            &tx,
            &req.user,
            &req.company,
            req.requested_per_po_limit,
            req.requested_per_month_limit,
            LimitStatus::Active,
            &today,
            resolved_by,
            resolved_at,
        )?;

        tx.commit()?;
        Ok(limit)
    }

    pub(crate) fn reject_increase_request(
        &mut self,
        id: i64,
        resolved_by: &str,
        resolved_at: &str,
        rejection_reason: &str,
    ) -> LimitResult<IncreaseRequest> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE increase_requests
             SET status = ?1, resolved_at = ?2, resolved_by = ?3, rejection_reason = ?4
             WHERE id = ?5 AND status = ?6",
            params![
                RequestStatus::Rejected.as_str(),
                resolved_at,
                resolved_by,
                rejection_reason,
                id,
                RequestStatus::PendingApproval.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(transition_error(&tx, id));
        }

        let req = tx.query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM increase_requests WHERE id = ?1"),
            params![id],
            request_from_row,
        )?;
        tx.commit()?;
        Ok(req)
    }

    // ── Roles ─────────────────────────────────────────────────

    pub(crate) fn grant_role(&self, user: &str, role: Role) -> LimitResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO user_roles (user, role) VALUES (?1, ?2)",
            params![user, role.as_str()],
        )?;
        Ok(changed > 0)
    }

    pub(crate) fn revoke_role(&self, user: &str, role: Role) -> LimitResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM user_roles WHERE user = ?1 AND role = ?2",
            params![user, role.as_str()],
        )?;
        Ok(changed > 0)
    }

    pub(crate) fn get_roles(&self, user: &str) -> LimitResult<Vec<Role>> {
        let mut stmt = self
            .conn
            .prepare("SELECT role FROM user_roles WHERE user = ?1 ORDER BY role")?;
        let rows = stmt.query_map(params![user], |row| row.get::<_, String>(0))?;
        let names = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names.iter().filter_map(|n| Role::parse(n)).collect())
    }

    pub(crate) fn get_users_with_role(&self, role: Role) -> LimitResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user FROM user_roles WHERE role = ?1 ORDER BY user")?;
        let rows = stmt.query_map(params![role.as_str()], |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn load_actor(&self, user: &str) -> LimitResult<Actor> {
        Ok(Actor::new(user.to_string(), self.get_roles(user)?))
    }

    /// Users holding any role that lets them raise purchase orders.
    pub(crate) fn get_purchase_users(&self) -> LimitResult<Vec<String>> {
        let roles: Vec<&str> = Role::all().iter().map(Role::as_str).collect();
        let placeholders: String = (0..roles.len())
            .map(|i| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT DISTINCT user FROM user_roles WHERE role IN ({placeholders}) ORDER BY user"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(roles), |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Purchase order ledger ─────────────────────────────────

    pub(crate) fn get_po_submission(&self, po_name: &str) -> LimitResult<Option<PoSubmission>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, po_name, user, company, amount, transaction_date, cancelled
                 FROM po_submissions WHERE po_name = ?1",
                params![po_name],
                submission_from_row,
            )
            .optional()?)
    }

    /// Record a submitted purchase order and add its amount to the owner's
    /// monthly usage, resetting the usage first if the month has rolled over.
    /// The name must be new and the amount positive.
    pub(crate) fn record_po_submission(
        &mut self,
        sub: &PoSubmission,
        today: NaiveDate,
    ) -> LimitResult<i64> {
        if sub.amount <= Decimal::ZERO {
            return Err(LimitError::Validation(format!(
                "purchase order {} has no positive amount to book",
                sub.po_name
            )));
        }
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM po_submissions WHERE po_name = ?1)",
            params![sub.po_name],
            |row| row.get(0),
        )?;
        if exists {
            return Err(duplicate_po(&sub.po_name));
        }
        tx.execute(
            "INSERT INTO po_submissions (po_name, user, company, amount, transaction_date, cancelled)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                sub.po_name,
                sub.user,
                sub.company,
                sub.amount.to_string(),
                sub.transaction_date,
            ],
        )?;
        let id = tx.last_insert_rowid();
        adjust_usage(&tx, &sub.user, &sub.company, sub.amount, today)?;
        tx.commit()?;
        Ok(id)
    }

    /// Mark a submitted purchase order cancelled and take its amount back off
    /// the owner's monthly usage (never below zero).
    pub(crate) fn cancel_po_submission(
        &mut self,
        po_name: &str,
        today: NaiveDate,
    ) -> LimitResult<PoSubmission> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE po_submissions SET cancelled = 1 WHERE po_name = ?1 AND cancelled = 0",
            params![po_name],
        )?;
        if changed == 0 {
            return Err(LimitError::NotFound(format!(
                "submitted purchase order {po_name}"
            )));
        }
        let sub = tx.query_row(
            "SELECT id, po_name, user, company, amount, transaction_date, cancelled
             FROM po_submissions WHERE po_name = ?1",
            params![po_name],
            submission_from_row,
        )?;
        adjust_usage(&tx, &sub.user, &sub.company, -sub.amount, today)?;
        tx.commit()?;
        Ok(sub)
    }

    /// Sum of non-cancelled submissions for (user, company) in `month` ("YYYY-MM").
    pub(crate) fn get_month_po_total(
        &self,
        user: &str,
        company: &str,
        month: &str,
    ) -> LimitResult<Decimal> {
        let mut stmt = self.conn.prepare(
            "SELECT amount FROM po_submissions
             WHERE user = ?1 AND company = ?2 AND cancelled = 0 AND transaction_date LIKE ?3",
        )?;
        let rows = stmt.query_map(params![user, company, format!("{month}%")], |row| {
            let amt_str: String = row.get(0)?;
            Ok(Decimal::from_str(&amt_str).unwrap_or_default())
        })?;
        let amounts = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(amounts.into_iter().sum())
    }

    pub(crate) fn set_monthly_usage(
        &self,
        user: &str,
        company: &str,
        usage: Decimal,
        last_reset_date: &str,
    ) -> LimitResult<bool> {
        let changed = self.conn.execute(
            "UPDATE user_limits SET monthly_usage = ?1, last_reset_date = ?2
             WHERE user = ?3 AND company = ?4",
            params![usage.to_string(), last_reset_date, user, company],
        )?;
        Ok(changed > 0)
    }
}

#[allow(clippy::too_many_arguments)]
fn upsert_limit(
    conn: &Connection,
    user: &str,
    company: &str,
    per_po_limit: Decimal,
    per_month_limit: Decimal,
    status: LimitStatus,
    last_reset_date: &str,
    updated_by: &str,
    updated_at: &str,
) -> LimitResult<UserLimit> {
    conn.execute(
        "INSERT INTO user_limits
             (user, company, per_po_limit, per_month_limit, status, monthly_usage,
              last_reset_date, last_updated_by, last_updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, '0', ?6, ?7, ?8)
         ON CONFLICT(user, company) DO UPDATE SET
             per_po_limit = excluded.per_po_limit,
             per_month_limit = excluded.per_month_limit,
             status = excluded.status,
             last_updated_by = excluded.last_updated_by,
             last_updated_at = excluded.last_updated_at",
        params![
            user,
            company,
            per_po_limit.to_string(),
            per_month_limit.to_string(),
            status.as_str(),
            last_reset_date,
            updated_by,
            updated_at,
        ],
    )?;
    Ok(conn.query_row(
        &format!("SELECT {LIMIT_COLUMNS} FROM user_limits WHERE user = ?1 AND company = ?2"),
        params![user, company],
        limit_from_row,
    )?)
}

/// Apply `delta` to the usage of (user, company), flooring at zero.
/// A missing limit record is not an error: there is nothing to track.
fn adjust_usage(
    conn: &Connection,
    user: &str,
    company: &str,
    delta: Decimal,
    today: NaiveDate,
) -> LimitResult<()> {
    let current: Option<(String, String)> = conn
        .query_row(
            "SELECT monthly_usage, last_reset_date FROM user_limits WHERE user = ?1 AND company = ?2",
            params![user, company],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((usage_str, last_reset)) = current else {
        return Ok(());
    };

    let (usage, anchor) = if crate::usage::month_rolled_over(&last_reset, today) {
        (Decimal::ZERO, today.format("%Y-%m-%d").to_string())
    } else {
        (Decimal::from_str(&usage_str).unwrap_or_default(), last_reset)
    };
    let updated = (usage + delta).max(Decimal::ZERO);

    conn.execute(
        "UPDATE user_limits SET monthly_usage = ?1, last_reset_date = ?2
         WHERE user = ?3 AND company = ?4",
        params![updated.to_string(), anchor, user, company],
    )?;
    Ok(())
}

/// Explain why a conditional status update matched nothing.
fn transition_error(conn: &Connection, id: i64) -> LimitError {
    let found = conn
        .query_row(
            "SELECT status FROM increase_requests WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        )
        .optional();
    match found {
        Ok(Some(s)) => match RequestStatus::parse(&s) {
            Some(status) => LimitError::InvalidState { id, status },
            None => LimitError::Validation(format!(
                "increase request {id} has unknown status '{s}'"
            )),
        },
        Ok(None) => LimitError::NotFound(format!("increase request {id}")),
        Err(e) => e.into(),
    }
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Ok(Decimal::from_str(&s).unwrap_or_default())
}

fn limit_from_row(row: &Row<'_>) -> rusqlite::Result<UserLimit> {
    Ok(UserLimit {
        id: Some(row.get(0)?),
        user: row.get(1)?,
        company: row.get(2)?,
        per_po_limit: decimal_column(row, 3)?,
        per_month_limit: decimal_column(row, 4)?,
        status: LimitStatus::parse(&row.get::<_, String>(5)?),
        monthly_usage: decimal_column(row, 6)?,
        last_reset_date: row.get(7)?,
        last_updated_by: row.get(8)?,
        last_updated_at: row.get(9)?,
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<IncreaseRequest> {
    let status_str: String = row.get(8)?;
    let status = RequestStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown request status '{status_str}'").into(),
        )
    })?;
    Ok(IncreaseRequest {
        id: Some(row.get(0)?),
        user: row.get(1)?,
        company: row.get(2)?,
        requested_per_po_limit: decimal_column(row, 3)?,
        requested_per_month_limit: decimal_column(row, 4)?,
        current_per_po_limit: decimal_column(row, 5)?,
        current_per_month_limit: decimal_column(row, 6)?,
        reason: row.get(7)?,
        status,
        rejection_reason: row.get(9)?,
        created_at: row.get(10)?,
        resolved_at: row.get(11)?,
        resolved_by: row.get(12)?,
    })
}

fn submission_from_row(row: &Row<'_>) -> rusqlite::Result<PoSubmission> {
    Ok(PoSubmission {
        id: Some(row.get(0)?),
        po_name: row.get(1)?,
        user: row.get(2)?,
        company: row.get(3)?,
        amount: decimal_column(row, 4)?,
        transaction_date: row.get(5)?,
        cancelled: row.get(6)?,
    })
}
