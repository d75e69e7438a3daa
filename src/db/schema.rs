pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_limits (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user             TEXT NOT NULL,
    company          TEXT NOT NULL,
    per_po_limit     TEXT NOT NULL DEFAULT '0',
    per_month_limit  TEXT NOT NULL DEFAULT '0',
    status           TEXT NOT NULL DEFAULT 'Revoked',
    monthly_usage    TEXT NOT NULL DEFAULT '0',
    last_reset_date  TEXT NOT NULL,
    last_updated_by  TEXT,
    last_updated_at  TEXT,
    UNIQUE(user, company)
);

CREATE TABLE IF NOT EXISTS increase_requests (
    id                         INTEGER PRIMARY KEY AUTOINCREMENT,
    user                       TEXT NOT NULL,
    company                    TEXT NOT NULL,
    requested_per_po_limit     TEXT NOT NULL,
    requested_per_month_limit  TEXT NOT NULL,
    current_per_po_limit       TEXT NOT NULL DEFAULT '0',
    current_per_month_limit    TEXT NOT NULL DEFAULT '0',
    reason                     TEXT NOT NULL DEFAULT '',
    status                     TEXT NOT NULL DEFAULT 'Pending Approval',
    rejection_reason           TEXT,
    created_at                 TEXT NOT NULL,
    resolved_at                TEXT,
    resolved_by                TEXT,
    CHECK ((status = 'Pending Approval') = (resolved_at IS NULL)),
    CHECK ((status = 'Pending Approval') = (resolved_by IS NULL)),
    CHECK ((status = 'Rejected') = (rejection_reason IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_increase_requests_status ON increase_requests(status);

CREATE TABLE IF NOT EXISTS user_roles (
    user  TEXT NOT NULL,
    role  TEXT NOT NULL,
    UNIQUE(user, role)
);

CREATE TABLE IF NOT EXISTS po_submissions (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    po_name           TEXT NOT NULL UNIQUE,
    user              TEXT NOT NULL,
    company           TEXT NOT NULL,
    amount            TEXT NOT NULL,
    transaction_date  TEXT NOT NULL,
    cancelled         BOOLEAN NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_po_submissions_owner ON po_submissions(user, company, transaction_date);
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];
