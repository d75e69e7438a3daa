#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    ManagingDirector,
    SystemManager,
    PurchaseOrderManager,
    PurchaseOrderCreator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManagingDirector => "Managing Director",
            Self::SystemManager => "System Manager",
            Self::PurchaseOrderManager => "Purchase Order Manager",
            Self::PurchaseOrderCreator => "Purchase Order Creator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "managing director" | "md" => Some(Self::ManagingDirector),
            "system manager" | "sm" => Some(Self::SystemManager),
            "purchase order manager" | "po manager" => Some(Self::PurchaseOrderManager),
            "purchase order creator" | "po creator" => Some(Self::PurchaseOrderCreator),
            _ => None,
        }
    }

    pub fn all() -> &'static [Role] {
        &[
            Self::ManagingDirector,
            Self::SystemManager,
            Self::PurchaseOrderManager,
            Self::PurchaseOrderCreator,
        ]
    }

    /// Roles that may resolve increase requests and edit limits directly.
    pub fn grants_approval(&self) -> bool {
        matches!(self, Self::ManagingDirector | Self::SystemManager)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: String,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(user: String, roles: Vec<Role>) -> Self {
        Self { user, roles }
    }

    pub fn is_approver(&self) -> bool {
        self.roles.iter().any(Role::grants_approval)
    }
}
