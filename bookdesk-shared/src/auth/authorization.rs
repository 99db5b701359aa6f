/// Authorization checks for handlers and flows
///
/// Thin, error-returning wrappers around [`super::policy::evaluate`] plus the
/// coarse role gates used by admin endpoints.
///
/// # Permission Model
///
/// 1. **Tenant**: every row belongs to exactly one business; actors never
///    cross into another business
/// 2. **Role**: `Owner > Staff > Customer` for the coarse gates
/// 3. **Row**: self/own/assigned rules from the policy table
///
/// # Example
///
/// ```no_run
/// use bookdesk_shared::auth::authorization::{authorize, require_role};
/// use bookdesk_shared::auth::middleware::AuthContext;
/// use bookdesk_shared::auth::policy::{Operation, RowScope, Table};
/// use bookdesk_shared::models::user::UserRole;
///
/// fn can_edit_service(auth: &AuthContext) -> Result<(), bookdesk_shared::auth::authorization::AuthzError> {
///     let actor = auth.actor();
///     require_role(&actor, UserRole::Owner)?;
///     authorize(&actor, Table::Services, Operation::Update, &RowScope::new(auth.business_id))
/// }
/// ```

use uuid::Uuid;

use super::policy::{evaluate, Actor, Decision, DenyReason, Operation, RowScope, Table};
use crate::models::user::UserRole;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Caller is not a signed-in member of a business
    #[error("Sign-in required")]
    NotMember,

    /// Row belongs to a different business
    #[error("Resource belongs to another business")]
    CrossTenant,

    /// Policy refused the operation
    #[error("Not allowed to {operation} {table}: {reason}")]
    Denied {
        table: Table,
        operation: Operation,
        reason: DenyReason,
    },

    /// Caller's role is below the required one
    #[error("Insufficient permissions: requires {required:?}, has {actual:?}")]
    InsufficientRole {
        required: UserRole,
        actual: Option<UserRole>,
    },

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Identity of a signed-in member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberIdentity {
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub role: UserRole,
}

/// Checks one operation on one row
///
/// # Errors
///
/// `AuthzError::CrossTenant` for rows in another business, otherwise
/// `AuthzError::Denied` with the policy's reason.
pub fn authorize(
    actor: &Actor,
    table: Table,
    operation: Operation,
    scope: &RowScope,
) -> Result<(), AuthzError> {
    match evaluate(actor, table, operation, scope) {
        Decision::Allow => Ok(()),
        Decision::Deny(DenyReason::CrossTenant) => {
            tracing::warn!(
                table = %table,
                operation = %operation,
                actor_business = ?actor.business_id(),
                row_business = %scope.business_id,
                "Cross-tenant access refused"
            );
            Err(AuthzError::CrossTenant)
        }
        Decision::Deny(reason) => {
            tracing::debug!(
                table = %table,
                operation = %operation,
                role = actor.role_name(),
                reason = reason.as_str(),
                "Operation refused by policy"
            );
            Err(AuthzError::Denied {
                table,
                operation,
                reason,
            })
        }
    }
}

/// Requires a signed-in member and returns their identity
pub fn require_member(actor: &Actor) -> Result<MemberIdentity, AuthzError> {
    match actor {
        Actor::Member {
            user_id,
            business_id,
            role,
            ..
        } => Ok(MemberIdentity {
            user_id: *user_id,
            business_id: *business_id,
            role: *role,
        }),
        _ => Err(AuthzError::NotMember),
    }
}

/// Requires a member whose role is at least `required`
///
/// ```
/// use bookdesk_shared::auth::authorization::require_role;
/// use bookdesk_shared::auth::policy::Actor;
/// use bookdesk_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let staff = Actor::member(Uuid::new_v4(), Uuid::new_v4(), UserRole::Staff, "sam@example.com");
/// assert!(require_role(&staff, UserRole::Staff).is_ok());
/// assert!(require_role(&staff, UserRole::Owner).is_err());
/// ```
pub fn require_role(actor: &Actor, required: UserRole) -> Result<MemberIdentity, AuthzError> {
    let identity = require_member(actor)?;

    if !identity.role.has_permission(required) {
        return Err(AuthzError::InsufficientRole {
            required,
            actual: Some(identity.role),
        });
    }

    Ok(identity)
}

/// Requires an owner or staff member
pub fn require_operator(actor: &Actor) -> Result<MemberIdentity, AuthzError> {
    require_role(actor, UserRole::Staff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_maps_cross_tenant() {
        let actor = Actor::member(Uuid::new_v4(), Uuid::new_v4(), UserRole::Owner, "o@example.com");
        let scope = RowScope::new(Uuid::new_v4());

        assert!(matches!(
            authorize(&actor, Table::Bookings, Operation::Select, &scope),
            Err(AuthzError::CrossTenant)
        ));
    }

    #[test]
    fn test_authorize_reports_reason() {
        let business_id = Uuid::new_v4();
        let actor = Actor::member(Uuid::new_v4(), business_id, UserRole::Staff, "s@example.com");

        let err = authorize(
            &actor,
            Table::Services,
            Operation::Delete,
            &RowScope::new(business_id),
        )
        .unwrap_err();

        match err {
            AuthzError::Denied {
                table,
                operation,
                reason,
            } => {
                assert_eq!(table, Table::Services);
                assert_eq!(operation, Operation::Delete);
                assert_eq!(reason, DenyReason::Role);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_require_member_rejects_visitors() {
        assert!(matches!(
            require_member(&Actor::anonymous(Uuid::new_v4())),
            Err(AuthzError::NotMember)
        ));
        assert!(matches!(
            require_member(&Actor::System),
            Err(AuthzError::NotMember)
        ));
    }

    #[test]
    fn test_require_role_hierarchy() {
        let business_id = Uuid::new_v4();
        let owner = Actor::member(Uuid::new_v4(), business_id, UserRole::Owner, "o@example.com");
        let customer = Actor::member(Uuid::new_v4(), business_id, UserRole::Customer, "c@example.com");

        assert!(require_role(&owner, UserRole::Owner).is_ok());
        assert!(require_operator(&owner).is_ok());
        assert!(require_role(&customer, UserRole::Customer).is_ok());

        assert!(matches!(
            require_operator(&customer),
            Err(AuthzError::InsufficientRole {
                required: UserRole::Staff,
                actual: Some(UserRole::Customer)
            })
        ));
    }

    #[test]
    fn test_require_member_returns_identity() {
        let user_id = Uuid::new_v4();
        let business_id = Uuid::new_v4();
        let actor = Actor::member(user_id, business_id, UserRole::Staff, "s@example.com");

        let identity = require_member(&actor).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.business_id, business_id);
        assert_eq!(identity.role, UserRole::Staff);
    }
}
