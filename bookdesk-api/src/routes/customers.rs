/// Customer records
///
/// - `GET /v1/customers?search=ana&limit=50&offset=0`
/// - `POST /v1/customers` (owner, staff)
/// - `GET /v1/customers/:id`
/// - `PUT /v1/customers/:id` (owner, staff)
/// - `DELETE /v1/customers/:id` (owner; bookings and payments go with it)
///
/// A signed-in customer sees only the record matching their account email.
/// Aggregates (`visit_count`, `last_visit_at`, `total_spent_cents`) are
/// read-only here.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{deleted, found},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use bookdesk_shared::{
    auth::{
        authorization::authorize,
        middleware::AuthContext,
        policy::{Operation, RowScope, Table},
    },
    models::{
        customer::{CreateCustomer, Customer, UpdateCustomer},
        page_bounds,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListCustomersQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CustomerPage {
    pub customers: Vec<Customer>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn customer_scope(customer: &Customer) -> RowScope {
    RowScope::new(customer.business_id).with_customer_email(customer.email.clone())
}

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListCustomersQuery>,
) -> ApiResult<Json<CustomerPage>> {
    let actor = auth.actor();
    let (limit, offset) = page_bounds(query.limit, query.offset);

    let mut tx = state.begin(&actor).await?;

    let page = if actor.is_operator() {
        authorize(&actor, Table::Customers, Operation::Select, &RowScope::new(auth.business_id))?;

        let customers =
            Customer::list(&mut *tx, auth.business_id, query.search.as_deref(), limit, offset)
                .await?;
        let total = Customer::count(&mut *tx, auth.business_id).await?;
        CustomerPage {
            customers,
            total,
            limit,
            offset,
        }
    } else {
        let own = Customer::find_by_email(&mut *tx, auth.business_id, &auth.email).await?;
        if let Some(customer) = &own {
            authorize(&actor, Table::Customers, Operation::Select, &customer_scope(customer))?;
        }
        let customers: Vec<Customer> = own.into_iter().collect();
        CustomerPage {
            total: customers.len() as i64,
            customers,
            limit,
            offset: 0,
        }
    };

    tx.commit().await?;

    Ok(Json(page))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;
    let customer = found(Customer::find(&mut *tx, auth.business_id, id).await?, "Customer")?;
    tx.commit().await?;

    authorize(&actor, Table::Customers, Operation::Select, &customer_scope(&customer))?;

    Ok(Json(customer))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let actor = auth.actor();
    let scope = RowScope::new(auth.business_id).with_customer_email(req.email.clone());
    authorize(&actor, Table::Customers, Operation::Insert, &scope)?;
    req.validate()?;

    let mut tx = state.begin(&actor).await?;
    let customer = Customer::create(&mut *tx, auth.business_id, req).await?;
    tx.commit().await?;

    tracing::info!(customer_id = %customer.id, "Customer created");

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCustomer>,
) -> ApiResult<Json<Customer>> {
    let actor = auth.actor();
    req.validate()?;

    let mut tx = state.begin(&actor).await?;
    let existing = found(Customer::find(&mut *tx, auth.business_id, id).await?, "Customer")?;
    authorize(&actor, Table::Customers, Operation::Update, &customer_scope(&existing))?;

    let customer = found(Customer::update(&mut *tx, auth.business_id, id, req).await?, "Customer")?;
    tx.commit().await?;

    Ok(Json(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let actor = auth.actor();
    authorize(&actor, Table::Customers, Operation::Delete, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;
    let removed = Customer::delete(&mut *tx, auth.business_id, id).await?;
    tx.commit().await?;

    deleted(removed, "Customer", id)?;
    Ok(StatusCode::NO_CONTENT)
}
