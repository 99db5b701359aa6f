/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and validation
/// - [`jwt`]: Access token generation and validation
/// - [`token`]: Staff invite token generation and hashing
/// - [`policy`]: Row-level access rules shared by every tenant table
/// - [`authorization`]: Checks built on top of the policy
/// - [`middleware`]: Axum middleware that turns a bearer token into an [`middleware::AuthContext`]
///
/// # Example
///
/// ```no_run
/// use bookdesk_shared::auth::password::{hash_password, verify_password};
/// use bookdesk_shared::auth::jwt::{create_token, Claims};
/// use bookdesk_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::Owner, "owner@example.com");
/// let token = create_token(&claims, "secret-key")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod token;
