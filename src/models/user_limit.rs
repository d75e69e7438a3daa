use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStatus {
    Active,
    Revoked,
}

impl LimitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Revoked => "Revoked",
        }
    }

    /// Anything that is not recognisably "active" is treated as revoked.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "active" => Self::Active,
            _ => Self::Revoked,
        }
    }

    /// Strict variant used for user input, where a typo must not silently revoke.
    pub fn parse_strict(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

impl std::fmt::Display for LimitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct UserLimit {
    pub id: Option<i64>,
    pub user: String,
    pub company: String,
    pub per_po_limit: Decimal,
    pub per_month_limit: Decimal,
    pub status: LimitStatus,
    pub monthly_usage: Decimal,
    /// Format: "YYYY-MM-DD". Anchors `monthly_usage` to a calendar month.
    pub last_reset_date: String,
    pub last_updated_by: Option<String>,
    pub last_updated_at: Option<String>,
}

impl UserLimit {
    pub fn new(
        user: String,
        company: String,
        per_po_limit: Decimal,
        per_month_limit: Decimal,
        status: LimitStatus,
    ) -> Self {
        Self {
            id: None,
            user,
            company,
            per_po_limit,
            per_month_limit,
            status,
            monthly_usage: Decimal::ZERO,
            last_reset_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            last_updated_by: None,
            last_updated_at: None,
        }
    }

    /// Zero-limit placeholder given to users who have never been assigned a limit.
    pub fn revoked(user: String, company: String) -> Self {
        Self::new(
            user,
            company,
            Decimal::ZERO,
            Decimal::ZERO,
            LimitStatus::Revoked,
        )
    }

    pub fn is_active(&self) -> bool {
        self.status == LimitStatus::Active
    }
}
