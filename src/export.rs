use anyhow::{Context, Result};
use std::path::Path;

use crate::models::UserLimit;

const HEADER: [&str; 9] = [
    "user",
    "company",
    "status",
    "per_po_limit",
    "per_month_limit",
    "monthly_usage",
    "last_reset_date",
    "last_updated_by",
    "last_updated_at",
];

/// Write `limits` to a CSV file at `path`. Returns the number of data rows.
pub(crate) fn export_limits_csv(limits: &[UserLimit], path: &Path) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(HEADER)?;
    for limit in limits {
        let per_po = limit.per_po_limit.to_string();
        let per_month = limit.per_month_limit.to_string();
        let usage = limit.monthly_usage.to_string();
        wtr.write_record([
            limit.user.as_str(),
            limit.company.as_str(),
            limit.status.as_str(),
            per_po.as_str(),
            per_month.as_str(),
            usage.as_str(),
            limit.last_reset_date.as_str(),
            limit.last_updated_by.as_deref().unwrap_or(""),
            limit.last_updated_at.as_deref().unwrap_or(""),
        ])?;
    }
    wtr.flush().context("Failed to write CSV")?;
    Ok(limits.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::models::LimitStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn test_export_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");

        let mut alice = UserLimit::new(
            "alice".into(),
            "Acme, Inc.".into(),
            dec!(1000),
            dec!(5000.50),
            LimitStatus::Active,
        );
        alice.last_updated_by = Some("md".into());
        let bob = UserLimit::revoked("bob".into(), "Acme, Inc.".into());

        let count = export_limits_csv(&[alice, bob], &path).unwrap();
        assert_eq!(count, 2);

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.len(), HEADER.len());
        assert_eq!(&headers[0], "user");

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "Acme, Inc.");
        assert_eq!(&rows[0][2], "Active");
        assert_eq!(&rows[0][4], "5000.50");
        assert_eq!(&rows[0][7], "md");
        assert_eq!(&rows[1][2], "Revoked");
        assert_eq!(&rows[1][7], "");
    }

    #[test]
    fn test_export_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        assert_eq!(export_limits_csv(&[], &path).unwrap(), 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
