use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    PendingApproval,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "Pending Approval",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending approval" | "pendingapproval" | "pending" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::PendingApproval)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's request to have their limits raised in one company.
///
/// `resolved_at` and `resolved_by` are set exactly when the request has left
/// `PendingApproval`; `rejection_reason` is set exactly when it was rejected.
#[derive(Debug, Clone)]
pub struct IncreaseRequest {
    pub id: Option<i64>,
    pub user: String,
    pub company: String,
    pub requested_per_po_limit: Decimal,
    pub requested_per_month_limit: Decimal,
    /// Limits in force when the request was raised (zero if none existed).
    pub current_per_po_limit: Decimal,
    pub current_per_month_limit: Decimal,
    pub reason: String,
    pub status: RequestStatus,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<String>,
}

impl IncreaseRequest {
    pub fn new(
        user: String,
        company: String,
        requested_per_po_limit: Decimal,
        requested_per_month_limit: Decimal,
    ) -> Self {
        Self {
            id: None,
            user,
            company,
            requested_per_po_limit,
            requested_per_month_limit,
            current_per_po_limit: Decimal::ZERO,
            current_per_month_limit: Decimal::ZERO,
            reason: String::new(),
            status: RequestStatus::PendingApproval,
            rejection_reason: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            resolved_at: None,
            resolved_by: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::PendingApproval
    }
}
