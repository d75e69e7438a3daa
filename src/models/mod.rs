mod actor;
mod increase_request;
mod purchase_order;
mod user_limit;

pub use actor::{Actor, Role};
pub use increase_request::{IncreaseRequest, RequestStatus};
pub use purchase_order::{PoSubmission, PurchaseOrder};
pub use user_limit::{LimitStatus, UserLimit};
