use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct PurchaseOrder {
    pub name: String,
    pub company: String,
    pub amount: Decimal,
    /// Format: "YYYY-MM-DD"
    pub transaction_date: String,
}

impl PurchaseOrder {
    pub fn new(name: String, company: String, amount: Decimal, transaction_date: String) -> Self {
        Self {
            name,
            company,
            amount,
            transaction_date,
        }
    }
}

/// Ledger row written when a purchase order passes the submission gate.
#[derive(Debug, Clone)]
pub struct PoSubmission {
    pub id: Option<i64>,
    pub po_name: String,
    pub user: String,
    pub company: String,
    pub amount: Decimal,
    /// Format: "YYYY-MM-DD"
    pub transaction_date: String,
    pub cancelled: bool,
}

impl PoSubmission {
    pub fn from_order(user: String, po: &PurchaseOrder) -> Self {
        Self {
            id: None,
            po_name: po.name.clone(),
            user,
            company: po.company.clone(),
            amount: po.amount,
            transaction_date: po.transaction_date.clone(),
            cancelled: false,
        }
    }
}
