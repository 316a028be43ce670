use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Doctor,
    Admin,
    PharmacyManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
            Role::PharmacyManager => "pharmacy_manager",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "doctor" => Some(Role::Doctor),
            "admin" => Some(Role::Admin),
            "pharmacy_manager" => Some(Role::PharmacyManager),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order lifecycle. Discriminants are the ids seeded into `order_statuses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum OrderStatus {
    Pending = 1,
    Processing = 2,
    Shipped = 3,
    Delivered = 4,
    Completed = 5,
    Canceled = 6,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Canceled,
    ];

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Completed => "Completed",
            OrderStatus::Canceled => "Canceled",
        }
    }

    /// Case-insensitive lookup, accepting both `Pending` and `pending`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }

    /// The only state `role` may move an order out of to reach `target`,
    /// or `None` when the role may never perform that transition.
    pub fn transition_source(target: OrderStatus, role: Role) -> Option<OrderStatus> {
        use OrderStatus::*;
        match (target, role) {
            (Processing, Role::Admin) => Some(Pending),
            (Canceled, Role::User) | (Canceled, Role::Admin) => Some(Pending),
            (Canceled, Role::PharmacyManager) => Some(Processing),
            (Shipped, Role::PharmacyManager) => Some(Processing),
            (Completed, Role::User) => Some(Shipped),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stock-transfer lifecycle. Discriminants are the ids seeded into `mutation_statuses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MutationStatus {
    Pending = 1,
    Processed = 2,
    Canceled = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Transfer,
    Cancel,
    Noop,
}

impl MutationStatus {
    pub const ALL: [MutationStatus; 3] = [
        MutationStatus::Pending,
        MutationStatus::Processed,
        MutationStatus::Canceled,
    ];

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            MutationStatus::Pending => "Pending",
            MutationStatus::Processed => "Processed",
            MutationStatus::Canceled => "Canceled",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }

    /// What moving from `self` to `target` requires; only pending requests move.
    pub fn action_to(self, target: MutationStatus) -> Option<MutationAction> {
        match (self, target) {
            (MutationStatus::Pending, MutationStatus::Processed) => Some(MutationAction::Transfer),
            (MutationStatus::Pending, MutationStatus::Canceled) => Some(MutationAction::Cancel),
            (MutationStatus::Pending, MutationStatus::Pending) => Some(MutationAction::Noop),
            _ => None,
        }
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_ids_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(OrderStatus::from_id(42), None);
    }

    #[test]
    fn order_status_names_are_case_insensitive() {
        assert_eq!(OrderStatus::from_name("shipped"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::from_name("CANCELED"), Some(OrderStatus::Canceled));
        assert_eq!(OrderStatus::from_name("cancelled"), None);
    }

    #[test]
    fn allowed_transitions_follow_role_table() {
        use OrderStatus::*;
        assert_eq!(OrderStatus::transition_source(Processing, Role::Admin), Some(Pending));
        assert_eq!(OrderStatus::transition_source(Canceled, Role::User), Some(Pending));
        assert_eq!(OrderStatus::transition_source(Canceled, Role::Admin), Some(Pending));
        assert_eq!(
            OrderStatus::transition_source(Canceled, Role::PharmacyManager),
            Some(Processing)
        );
        assert_eq!(
            OrderStatus::transition_source(Shipped, Role::PharmacyManager),
            Some(Processing)
        );
        assert_eq!(OrderStatus::transition_source(Completed, Role::User), Some(Shipped));
    }

    #[test]
    fn forbidden_transitions_have_no_source() {
        use OrderStatus::*;
        assert_eq!(OrderStatus::transition_source(Processing, Role::User), None);
        assert_eq!(OrderStatus::transition_source(Shipped, Role::Admin), None);
        assert_eq!(OrderStatus::transition_source(Completed, Role::Admin), None);
        assert_eq!(OrderStatus::transition_source(Delivered, Role::PharmacyManager), None);
        assert_eq!(OrderStatus::transition_source(Pending, Role::Admin), None);
        assert_eq!(OrderStatus::transition_source(Canceled, Role::Doctor), None);
    }

    #[test]
    fn non_cancel_transitions_only_move_forward() {
        let roles = [Role::User, Role::Doctor, Role::Admin, Role::PharmacyManager];
        for target in OrderStatus::ALL {
            if target == OrderStatus::Canceled {
                continue;
            }
            for role in roles {
                if let Some(source) = OrderStatus::transition_source(target, role) {
                    assert!(source.id() < target.id(), "{source} -> {target}");
                }
            }
        }
    }

    #[test]
    fn mutation_actions_only_leave_pending() {
        use MutationStatus::*;
        assert_eq!(Pending.action_to(Processed), Some(MutationAction::Transfer));
        assert_eq!(Pending.action_to(Canceled), Some(MutationAction::Cancel));
        assert_eq!(Pending.action_to(Pending), Some(MutationAction::Noop));
        assert_eq!(Processed.action_to(Canceled), None);
        assert_eq!(Canceled.action_to(Processed), None);
    }

    #[test]
    fn roles_parse_from_claim_strings() {
        assert_eq!(Role::parse("pharmacy_manager"), Some(Role::PharmacyManager));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
