/// User accounts within the business
///
/// - `PUT /v1/auth/me`: change own name or password
/// - `GET /v1/users?role=staff` (owner)
/// - `DELETE /v1/users/:id` (owner; never their own account)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{auth::check_password, deleted, found},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use bookdesk_shared::{
    auth::{
        authorization::{authorize, require_role},
        middleware::AuthContext,
        password,
        policy::{Operation, RowScope, Table},
    },
    models::user::{UpdateProfile, User, UserRole},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    /// Empty string clears the name
    #[validate(length(max = 255))]
    pub name: Option<String>,

    /// Required when changing the password
    pub current_password: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<UserRole>,
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateMeRequest>,
) -> ApiResult<Json<User>> {
    let actor = auth.actor();
    let scope = RowScope::new(auth.business_id).with_user(Some(auth.user_id));
    authorize(&actor, Table::Users, Operation::Update, &scope)?;
    req.validate()?;

    let mut tx = state.begin(&actor).await?;
    let user = found(User::find_by_id(&mut *tx, auth.user_id).await?, "User")?;

    let password_hash = match req.new_password.as_deref() {
        Some(new_password) => {
            let current = req.current_password.as_deref().unwrap_or_default();
            if !password::verify_password(current, &user.password_hash)? {
                return Err(ApiError::invalid_field(
                    "current_password",
                    "Current password is incorrect",
                ));
            }
            check_password(new_password)?;
            Some(password::hash_password(new_password)?)
        }
        None => None,
    };

    let changes = UpdateProfile {
        name: req.name.map(Some),
        password_hash,
    };
    let user = found(User::update_profile(&mut *tx, auth.user_id, changes).await?, "User")?;
    tx.commit().await?;

    Ok(Json(user))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<Vec<User>>> {
    let actor = auth.actor();
    require_role(&actor, UserRole::Owner)?;

    let mut tx = state.begin(&actor).await?;
    let users = User::list_by_business(&mut *tx, auth.business_id, query.role).await?;
    tx.commit().await?;

    Ok(Json(users))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let actor = auth.actor();
    let scope = RowScope::new(auth.business_id).with_user(Some(id));
    authorize(&actor, Table::Users, Operation::Delete, &scope)?;

    let mut tx = state.begin(&actor).await?;
    let removed = User::delete(&mut *tx, auth.business_id, id).await?;
    tx.commit().await?;

    deleted(removed, "User", id)?;
    Ok(StatusCode::NO_CONTENT)
}
