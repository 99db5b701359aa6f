/// Row-level access policy
///
/// Every tenant table is governed by the same small rule set, evaluated here
/// in Rust and mirrored as PostgreSQL row-level security policies in
/// `migrations/*_row_level_security.sql`. The Rust side produces precise
/// errors for the API; the database side guarantees that a query which
/// slips past the Rust check still cannot read or write another tenant's
/// rows.
///
/// # Actors
///
/// - [`Actor::System`]: internal flows (registration, login lookup, invite
///   acceptance). Never built from a request.
/// - [`Actor::Anonymous`]: public booking pages, scoped to the business
///   resolved from the URL slug.
/// - [`Actor::Member`]: a signed-in owner, staff member or customer.
///
/// # Rules
///
/// | table            | owner | staff                  | customer               | anonymous          |
/// |------------------|-------|------------------------|------------------------|--------------------|
/// | businesses       | all   | read                   | read                   | read               |
/// | users            | all*  | self                   | self                   | -                  |
/// | services         | all   | read                   | read active            | read active        |
/// | staff            | all   | read, update self      | read                   | read               |
/// | customers        | all   | read, insert, update   | own row, flow          | flow               |
/// | bookings         | all   | read, insert, update assigned | own, flow, cancel own | flow       |
/// | payments         | all   | read, flow insert      | own                    | flow               |
/// | booking_settings | all   | read                   | read                   | read               |
/// | staff_invites    | all   | -                      | -                      | -                  |
///
/// `*` owners cannot delete their own user row. "flow" means the operation is
/// only allowed while running inside [`crate::booking_flow`].
///
/// # Example
///
/// ```
/// use bookdesk_shared::auth::policy::{evaluate, Actor, Decision, Operation, RowScope, Table};
/// use bookdesk_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let business_id = Uuid::new_v4();
/// let staff = Actor::member(Uuid::new_v4(), business_id, UserRole::Staff, "sam@example.com");
///
/// let scope = RowScope::new(business_id);
/// assert!(evaluate(&staff, Table::Customers, Operation::Select, &scope).is_allowed());
/// assert!(!evaluate(&staff, Table::Services, Operation::Delete, &scope).is_allowed());
///
/// // Rows in another tenant are never visible
/// let foreign = RowScope::new(Uuid::new_v4());
/// assert_eq!(
///     evaluate(&staff, Table::Customers, Operation::Select, &foreign),
///     Decision::Deny(bookdesk_shared::auth::policy::DenyReason::CrossTenant),
/// );
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::user::UserRole;

/// Who is performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Internal flow with no tenant restriction
    System,

    /// Unauthenticated visitor, optionally pinned to one business
    Anonymous { business_id: Option<Uuid> },

    /// Signed-in user
    Member {
        user_id: Uuid,
        business_id: Uuid,
        role: UserRole,
        email: String,
    },
}

impl Actor {
    /// Builds a signed-in actor
    pub fn member(user_id: Uuid, business_id: Uuid, role: UserRole, email: impl Into<String>) -> Self {
        Actor::Member {
            user_id,
            business_id,
            role,
            email: email.into(),
        }
    }

    /// Builds a visitor on a business's public pages
    pub fn anonymous(business_id: Uuid) -> Self {
        Actor::Anonymous {
            business_id: Some(business_id),
        }
    }

    /// Business the actor is pinned to
    pub fn business_id(&self) -> Option<Uuid> {
        match self {
            Actor::System => None,
            Actor::Anonymous { business_id } => *business_id,
            Actor::Member { business_id, .. } => Some(*business_id),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::Member { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<UserRole> {
        match self {
            Actor::Member { role, .. } => Some(*role),
            _ => None,
        }
    }

    /// Value stored in the `app.role` session setting
    pub fn role_name(&self) -> &'static str {
        match self {
            Actor::System => "system",
            Actor::Anonymous { .. } => "anonymous",
            Actor::Member { role, .. } => role.as_str(),
        }
    }

    /// Owners and staff run the business; customers and visitors do not
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Actor::Member {
                role: UserRole::Owner | UserRole::Staff,
                ..
            }
        )
    }

    fn email(&self) -> Option<&str> {
        match self {
            Actor::Member { email, .. } => Some(email.as_str()),
            _ => None,
        }
    }
}

/// Tenant tables under policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Businesses,
    Users,
    Services,
    Staff,
    Customers,
    Bookings,
    Payments,
    BookingSettings,
    StaffInvites,
}

impl Table {
    pub const ALL: [Table; 9] = [
        Table::Businesses,
        Table::Users,
        Table::Services,
        Table::Staff,
        Table::Customers,
        Table::Bookings,
        Table::Payments,
        Table::BookingSettings,
        Table::StaffInvites,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Businesses => "businesses",
            Table::Users => "users",
            Table::Services => "services",
            Table::Staff => "staff",
            Table::Customers => "customers",
            Table::Bookings => "bookings",
            Table::Payments => "payments",
            Table::BookingSettings => "booking_settings",
            Table::StaffInvites => "staff_invites",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Select,
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts about the row being touched
///
/// Only `business_id` is mandatory; the other fields matter for the
/// self/own/assigned rules and default to "unknown".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowScope {
    /// Tenant the row belongs to
    pub business_id: Uuid,

    /// User the row describes or is linked to (users.id, staff.user_id)
    pub user_id: Option<Uuid>,

    /// User account of the staff member assigned to a booking
    pub assigned_staff_user_id: Option<Uuid>,

    /// Email of the customer a customer/booking/payment row belongs to
    pub customer_email: Option<String>,

    /// Active flag, for services
    pub active: Option<bool>,

    /// Whether the operation runs inside the booking flow
    pub through_booking_flow: bool,
}

impl RowScope {
    pub fn new(business_id: Uuid) -> Self {
        Self {
            business_id,
            user_id: None,
            assigned_staff_user_id: None,
            customer_email: None,
            active: None,
            through_booking_flow: false,
        }
    }

    pub fn with_user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_assigned_staff(mut self, user_id: Option<Uuid>) -> Self {
        self.assigned_staff_user_id = user_id;
        self
    }

    pub fn with_customer_email(mut self, email: Option<String>) -> Self {
        self.customer_email = email;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn in_booking_flow(mut self) -> Self {
        self.through_booking_flow = true;
        self
    }
}

/// Why an operation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Row belongs to another business
    CrossTenant,

    /// Actor is not pinned to any business
    NoTenant,

    /// Actor's role may never perform this operation on this table
    Role,

    /// Allowed only on the actor's own rows
    NotOwnRow,

    /// Row is hidden from this actor while inactive
    Inactive,

    /// Allowed only inside the booking flow
    FlowOnly,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::CrossTenant => "row belongs to another business",
            DenyReason::NoTenant => "no business context",
            DenyReason::Role => "role not permitted",
            DenyReason::NotOwnRow => "only permitted on your own records",
            DenyReason::Inactive => "record is not active",
            DenyReason::FlowOnly => "only permitted while booking",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    fn from_bool(allowed: bool, reason: DenyReason) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny(reason)
        }
    }
}

/// Evaluates the policy for one operation on one row
pub fn evaluate(actor: &Actor, table: Table, op: Operation, scope: &RowScope) -> Decision {
    if let Actor::System = actor {
        return Decision::Allow;
    }

    // Business profiles are public
    if table == Table::Businesses && op == Operation::Select {
        return Decision::Allow;
    }

    let Some(actor_business) = actor.business_id() else {
        return Decision::Deny(DenyReason::NoTenant);
    };
    if actor_business != scope.business_id {
        return Decision::Deny(DenyReason::CrossTenant);
    }

    match actor {
        Actor::System => Decision::Allow,
        Actor::Anonymous { .. } => anonymous_rule(table, op, scope),
        Actor::Member { user_id, role, .. } => match role {
            UserRole::Owner => owner_rule(*user_id, table, op, scope),
            UserRole::Staff => staff_rule(*user_id, table, op, scope),
            UserRole::Customer => customer_rule(actor, *user_id, table, op, scope),
        },
    }
}

fn owner_rule(user_id: Uuid, table: Table, op: Operation, scope: &RowScope) -> Decision {
    match (table, op) {
        (Table::Users, Operation::Delete) => {
            Decision::from_bool(scope.user_id != Some(user_id), DenyReason::NotOwnRow)
        }
        _ => Decision::Allow,
    }
}

fn staff_rule(user_id: Uuid, table: Table, op: Operation, scope: &RowScope) -> Decision {
    let is_self = scope.user_id == Some(user_id);

    match (table, op) {
        (Table::StaffInvites, _) => Decision::Deny(DenyReason::Role),
        (Table::Users, Operation::Select | Operation::Update) => {
            Decision::from_bool(is_self, DenyReason::NotOwnRow)
        }
        (Table::Staff, Operation::Update) => Decision::from_bool(is_self, DenyReason::NotOwnRow),
        (_, Operation::Select) => Decision::Allow,
        (Table::Customers, Operation::Insert | Operation::Update) => Decision::Allow,
        (Table::Bookings, Operation::Insert) => Decision::Allow,
        (Table::Bookings, Operation::Update) => Decision::from_bool(
            scope.assigned_staff_user_id == Some(user_id),
            DenyReason::NotOwnRow,
        ),
        (Table::Payments, Operation::Insert) => {
            Decision::from_bool(scope.through_booking_flow, DenyReason::FlowOnly)
        }
        _ => Decision::Deny(DenyReason::Role),
    }
}

fn customer_rule(
    actor: &Actor,
    user_id: Uuid,
    table: Table,
    op: Operation,
    scope: &RowScope,
) -> Decision {
    let owns_row = match (actor.email(), scope.customer_email.as_deref()) {
        (Some(mine), Some(theirs)) => mine.eq_ignore_ascii_case(theirs),
        _ => false,
    };

    match (table, op) {
        (Table::Users, Operation::Select | Operation::Update) => {
            Decision::from_bool(scope.user_id == Some(user_id), DenyReason::NotOwnRow)
        }
        (Table::Services, Operation::Select) => public_service_visibility(scope),
        (Table::Staff | Table::BookingSettings, Operation::Select) => Decision::Allow,
        (Table::Customers | Table::Bookings | Table::Payments, Operation::Select) => {
            Decision::from_bool(owns_row || scope.through_booking_flow, DenyReason::NotOwnRow)
        }
        (Table::Customers | Table::Bookings | Table::Payments, Operation::Insert) => {
            Decision::from_bool(scope.through_booking_flow, DenyReason::FlowOnly)
        }
        (Table::Customers, Operation::Update) => {
            Decision::from_bool(scope.through_booking_flow, DenyReason::FlowOnly)
        }
        (Table::Bookings, Operation::Update) => Decision::from_bool(owns_row, DenyReason::NotOwnRow),
        _ => Decision::Deny(DenyReason::Role),
    }
}

fn anonymous_rule(table: Table, op: Operation, scope: &RowScope) -> Decision {
    match (table, op) {
        (Table::Services, Operation::Select) => public_service_visibility(scope),
        (Table::Staff | Table::BookingSettings, Operation::Select) => Decision::Allow,
        (Table::Customers | Table::Bookings, Operation::Select)
        | (Table::Customers | Table::Bookings | Table::Payments, Operation::Insert)
        | (Table::Customers, Operation::Update) => {
            Decision::from_bool(scope.through_booking_flow, DenyReason::FlowOnly)
        }
        _ => Decision::Deny(DenyReason::Role),
    }
}

fn public_service_visibility(scope: &RowScope) -> Decision {
    Decision::from_bool(scope.active.unwrap_or(false), DenyReason::Inactive)
}
