/// Integration tests for the Bookdesk API
///
/// These tests run the full router against PostgreSQL:
/// - Registration, login and the current user
/// - Role and tenant boundaries
/// - Booking flow: payment creation, deposits, customer aggregates
/// - Booking rules: lead time, overlaps, cancellation window
/// - Public booking pages and customer signup
/// - Staff invites
///
/// Set `DATABASE_URL` to run them; without it each test returns early.

mod common;

use axum::http::StatusCode;
use common::{hours_from_now, unique_email, TestContext, TEST_PASSWORD};
use serde_json::json;

macro_rules! context {
    () => {
        match TestContext::new().await.unwrap() {
            Some(ctx) => ctx,
            None => return,
        }
    };
}

#[tokio::test]
async fn test_health_reports_database() {
    let ctx = context!();

    let (status, body) = ctx.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["migrations"]["is_up_to_date"], true);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_register_login_and_me() {
    let ctx = context!();

    let (status, body) = ctx.owner("GET", "/v1/auth/me", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "owner");
    assert_eq!(body["business"]["slug"], ctx.slug);
    assert!(body["user"].get("password_hash").is_none());

    // Email is matched case-insensitively
    let (status, body) = ctx
        .send(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": ctx.owner_email.to_uppercase(), "password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["token_type"], "Bearer");

    let (status, _) = ctx
        .send(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": ctx.owner_email, "password": "Wr0ngPassword" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Same email cannot register a second business
    let (status, _) = ctx
        .send(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "email": ctx.owner_email,
                "password": TEST_PASSWORD,
                "business_name": "Another Shop"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_booking_creates_payment_and_updates_customer() {
    let ctx = context!();

    let service_id = ctx.create_service("Haircut", 45, 5000).await;
    let customer_id = ctx.create_customer("Casey", &unique_email("casey")).await;

    let (status, created) = ctx
        .owner(
            "POST",
            "/v1/bookings",
            Some(json!({
                "customer_id": customer_id,
                "service_id": service_id,
                "start_time": hours_from_now(24)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["booking"]["status"], "pending");
    assert_eq!(created["payment"]["status"], "pending");
    assert_eq!(created["payment"]["amount_cents"], 5000);
    assert_eq!(created["customer"]["visit_count"], 1);
    assert_eq!(created["customer"]["total_spent_cents"], 0);

    let payment_id = created["payment"]["id"].as_str().unwrap();

    let (status, change) = ctx
        .owner(
            "PUT",
            &format!("/v1/payments/{}/status", payment_id),
            Some(json!({ "status": "paid", "method": "card" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", change);
    assert!(change["payment"]["paid_at"].is_string());
    assert_eq!(change["customer"]["total_spent_cents"], 5000);

    // Paying twice does not double count
    let (_, change) = ctx
        .owner(
            "PUT",
            &format!("/v1/payments/{}/status", payment_id),
            Some(json!({ "status": "paid" })),
        )
        .await;
    assert!(change["customer"].is_null());

    let (status, change) = ctx
        .owner(
            "PUT",
            &format!("/v1/payments/{}/status", payment_id),
            Some(json!({ "status": "refunded" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(change["payment"]["paid_at"].is_null());
    assert_eq!(change["customer"]["total_spent_cents"], 0);

    let (status, summary) = ctx.owner("GET", "/v1/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["bookings_by_status"]["pending"], 1);
    assert_eq!(summary["bookings_by_status"]["cancelled"], 0);
    assert_eq!(summary["customer_count"], 1);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_deposit_sets_payment_amount() {
    let ctx = context!();

    let (status, settings) = ctx
        .owner(
            "PUT",
            "/v1/settings/booking",
            Some(json!({ "require_deposit": true, "deposit_percent": 25 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", settings);
    assert_eq!(settings["deposit_percent"], 25);
    assert_eq!(settings["cancellation_window_hours"], 24);

    let service_id = ctx.create_service("Color", 90, 4999).await;
    let customer_id = ctx.create_customer("Dana", &unique_email("dana")).await;

    let (status, created) = ctx
        .owner(
            "POST",
            "/v1/bookings",
            Some(json!({
                "customer_id": customer_id,
                "service_id": service_id,
                "start_time": hours_from_now(30)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["payment"]["amount_cents"], 1249);

    let (status, _) = ctx
        .owner(
            "PUT",
            "/v1/settings/booking",
            Some(json!({ "deposit_percent": 150 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_overlap_prevention() {
    let ctx = context!();

    ctx.owner(
        "PUT",
        "/v1/settings/booking",
        Some(json!({ "prevent_overlaps": true })),
    )
    .await;

    let service_id = ctx.create_service("Massage", 60, 8000).await;
    let staff_id = ctx.create_staff("Sam", &[&service_id]).await;
    let customer_id = ctx.create_customer("Eli", &unique_email("eli")).await;

    let book = |start: String| {
        json!({
            "customer_id": customer_id,
            "service_id": service_id,
            "staff_id": staff_id,
            "start_time": start
        })
    };

    let start = chrono::DateTime::parse_from_rfc3339(&hours_from_now(48)).unwrap();
    let at = |minutes: i64| (start + chrono::Duration::minutes(minutes)).to_rfc3339();

    let (status, first) = ctx.owner("POST", "/v1/bookings", Some(book(at(0)))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);

    // Starts 30 minutes into the first booking
    let (status, body) = ctx.owner("POST", "/v1/bookings", Some(book(at(30)))).await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    // Back to back is fine
    let (status, _) = ctx.owner("POST", "/v1/bookings", Some(book(at(60)))).await;
    assert_eq!(status, StatusCode::CREATED);

    // A cancelled booking frees its slot
    let first_id = first["booking"]["id"].as_str().unwrap();
    let (status, _) = ctx
        .owner(
            "PUT",
            &format!("/v1/bookings/{}/status", first_id),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx.owner("POST", "/v1/bookings", Some(book(at(0)))).await;
    assert_eq!(status, StatusCode::CREATED);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_public_booking_and_customer_account() {
    let ctx = context!();

    let service_id = ctx.create_service("Trim", 30, 2500).await;
    let hidden_id = ctx.create_service("Staff Only", 30, 0).await;
    ctx.owner(
        "PUT",
        &format!("/v1/services/{}", hidden_id),
        Some(json!({ "active": false })),
    )
    .await;

    let (status, profile) = ctx
        .send("GET", &format!("/v1/public/{}", ctx.slug), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let services = profile["services"].as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["id"], service_id.as_str());

    let email = unique_email("walkin");
    let request = |start: String| {
        json!({
            "name": "Walk In",
            "email": email,
            "service_id": service_id,
            "start_time": start
        })
    };

    // Inside the default 60 minute lead time
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/v1/public/{}/bookings", ctx.slug),
            None,
            Some(request(hours_from_now(0))),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
    assert_eq!(body["error"], "booking_rule");

    let (status, created) = ctx
        .send(
            "POST",
            &format!("/v1/public/{}/bookings", ctx.slug),
            None,
            Some(request(hours_from_now(72))),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["customer"]["email"], email.as_str());
    assert_eq!(created["customer"]["visit_count"], 1);

    // The account sees the booking made before signing up
    let token = ctx.signup_customer(&email).await;
    let (status, bookings) = ctx.send("GET", "/v1/bookings", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bookings.as_array().unwrap().len(), 1);

    let (status, customers) = ctx.send("GET", "/v1/customers", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customers["total"], 1);

    // Customers do not see the inactive service or run the business
    let (status, _) = ctx
        .send("GET", &format!("/v1/services/{}", hidden_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx.send("GET", "/v1/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_customer_cancellation_window() {
    let ctx = context!();

    let service_id = ctx.create_service("Facial", 60, 6000).await;
    let email = unique_email("frankie");
    let token = ctx.signup_customer(&email).await;

    let book = |start: String| {
        json!({
            "name": "Frankie",
            "email": email,
            "service_id": service_id,
            "start_time": start
        })
    };

    let (status, soon) = ctx
        .send(
            "POST",
            &format!("/v1/public/{}/bookings", ctx.slug),
            Some(&token),
            Some(book(hours_from_now(3))),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", soon);

    let (status, later) = ctx
        .send(
            "POST",
            &format!("/v1/public/{}/bookings", ctx.slug),
            Some(&token),
            Some(book(hours_from_now(72))),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", later);

    let cancel = |id: &str| format!("/v1/bookings/{}/status", id);

    // Three hours out is inside the 24 hour window
    let (status, body) = ctx
        .send(
            "PUT",
            &cancel(soon["booking"]["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);

    // Customers can only cancel
    let later_id = later["booking"]["id"].as_str().unwrap();
    let (status, _) = ctx
        .send("PUT", &cancel(later_id), Some(&token), Some(json!({ "status": "confirmed" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .send("PUT", &cancel(later_id), Some(&token), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "cancelled");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_tenant_isolation() {
    let ctx = context!();
    let other = context!();

    let service_id = ctx.create_service("Cut", 30, 3000).await;
    let customer_id = ctx.create_customer("Gale", &unique_email("gale")).await;
    let (_, created) = ctx
        .owner(
            "POST",
            "/v1/bookings",
            Some(json!({
                "customer_id": customer_id,
                "service_id": service_id,
                "start_time": hours_from_now(24)
            })),
        )
        .await;
    let booking_id = created["booking"]["id"].as_str().unwrap();

    for uri in [
        format!("/v1/bookings/{}", booking_id),
        format!("/v1/customers/{}", customer_id),
        format!("/v1/services/{}", service_id),
    ] {
        let (status, _) = other.owner("GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
    }

    let (_, bookings) = other.owner("GET", "/v1/bookings", None).await;
    assert!(bookings.as_array().unwrap().is_empty());

    // Booking another tenant's customer into this business fails
    let other_service = other.create_service("Cut", 30, 3000).await;
    let (status, _) = other
        .owner(
            "POST",
            "/v1/bookings",
            Some(json!({
                "customer_id": customer_id,
                "service_id": other_service,
                "start_time": hours_from_now(24)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
    other.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_staff_invite_and_permissions() {
    let ctx = context!();

    let service_id = ctx.create_service("Shave", 20, 1500).await;
    let staff_id = ctx.create_staff("Harper", &[&service_id]).await;
    let staff_email = unique_email("harper");

    let (status, invite) = ctx
        .owner(
            "POST",
            "/v1/staff-invites",
            Some(json!({ "staff_id": staff_id, "email": staff_email })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", invite);
    let token = invite["token"].as_str().unwrap().to_string();
    assert!(invite["invite"].get("token_hash").is_none());

    let (status, accepted) = ctx
        .send(
            "POST",
            "/v1/invites/accept",
            None,
            Some(json!({ "token": token, "name": "Harper", "password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", accepted);
    assert_eq!(accepted["user"]["role"], "staff");
    let staff_token = common::token_of(&accepted).unwrap();

    // Invites are single use
    let (status, _) = ctx
        .send(
            "POST",
            "/v1/invites/accept",
            None,
            Some(json!({ "token": token, "name": "Again", "password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, staff) = ctx
        .owner("GET", &format!("/v1/staff/{}", staff_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(staff["user_id"], accepted["user"]["id"]);

    // Staff work customers but not the catalogue or settings
    let (status, _) = ctx
        .send(
            "POST",
            "/v1/customers",
            Some(&staff_token),
            Some(json!({ "name": "Indy", "email": unique_email("indy") })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = ctx
        .send("DELETE", &format!("/v1/services/{}", service_id), Some(&staff_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(
            "PUT",
            "/v1/settings/booking",
            Some(&staff_token),
            Some(json!({ "prevent_overlaps": true })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Own contact details are editable, assignments are not
    let (status, _) = ctx
        .send(
            "PUT",
            &format!("/v1/staff/{}", staff_id),
            Some(&staff_token),
            Some(json!({ "phone": "555-0101" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx
        .send(
            "PUT",
            &format!("/v1/staff/{}", staff_id),
            Some(&staff_token),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_cannot_overlap() {
    let ctx = std::sync::Arc::new(context!());

    ctx.owner(
        "PUT",
        "/v1/settings/booking",
        Some(json!({ "prevent_overlaps": true })),
    )
    .await;

    let service_id = ctx.create_service("Massage", 60, 8000).await;
    let staff_id = ctx.create_staff("Jo", &[&service_id]).await;
    let customer_id = ctx.create_customer("Kai", &unique_email("kai")).await;

    let body = json!({
        "customer_id": customer_id,
        "service_id": service_id,
        "staff_id": staff_id,
        "start_time": hours_from_now(36)
    });

    let mut requests = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let ctx = ctx.clone();
        let body = body.clone();
        requests.spawn(async move { ctx.owner("POST", "/v1/bookings", Some(body)).await.0 });
    }

    let mut statuses = Vec::new();
    while let Some(status) = requests.join_next().await {
        statuses.push(status.unwrap());
    }

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!((created, conflicts), (1, 7), "{:?}", statuses);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_reschedule_keeps_payment() {
    let ctx = context!();

    ctx.owner(
        "PUT",
        "/v1/settings/booking",
        Some(json!({ "prevent_overlaps": true })),
    )
    .await;

    let service_id = ctx.create_service("Lesson", 60, 4000).await;
    let staff_id = ctx.create_staff("Lee", &[&service_id]).await;
    let customer_id = ctx.create_customer("Max", &unique_email("max")).await;

    let start = chrono::DateTime::parse_from_rfc3339(&hours_from_now(48)).unwrap();
    let at = |minutes: i64| start + chrono::Duration::minutes(minutes);
    let book = |minutes: i64| {
        json!({
            "customer_id": customer_id,
            "service_id": service_id,
            "staff_id": staff_id,
            "start_time": at(minutes).to_rfc3339()
        })
    };
    let parse = |value: &serde_json::Value| {
        chrono::DateTime::parse_from_rfc3339(value.as_str().unwrap()).unwrap()
    };

    let (status, first) = ctx.owner("POST", "/v1/bookings", Some(book(0))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    let (status, _) = ctx.owner("POST", "/v1/bookings", Some(book(120))).await;
    assert_eq!(status, StatusCode::CREATED);

    let booking_uri = format!("/v1/bookings/{}", first["booking"]["id"].as_str().unwrap());

    // Overlaps its own old slot, which does not count
    let (status, moved) = ctx
        .owner("PUT", &booking_uri, Some(json!({ "start_time": at(30).to_rfc3339() })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", moved);
    assert_eq!(parse(&moved["start_time"]), at(30));
    assert_eq!(parse(&moved["end_time"]), at(90));

    // Runs into the second booking
    let (status, _) = ctx
        .owner("PUT", &booking_uri, Some(json!({ "start_time": at(100).to_rfc3339() })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let payment_uri = format!("/v1/payments/{}", first["payment"]["id"].as_str().unwrap());
    let (status, payment) = ctx.owner("GET", &payment_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["amount_cents"], 4000);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_deleting_paid_records_reduces_spend() {
    let ctx = context!();

    let service_id = ctx.create_service("Cut", 30, 3000).await;
    let customer_id = ctx.create_customer("Noa", &unique_email("noa")).await;

    let mut created = Vec::new();
    for hours in [24, 48] {
        let (status, body) = ctx
            .owner(
                "POST",
                "/v1/bookings",
                Some(json!({
                    "customer_id": customer_id,
                    "service_id": service_id,
                    "start_time": hours_from_now(hours)
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        let payment_id = body["payment"]["id"].as_str().unwrap();
        let (status, _) = ctx
            .owner(
                "PUT",
                &format!("/v1/payments/{}/status", payment_id),
                Some(json!({ "status": "paid", "method": "cash" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        created.push(body);
    }

    let customer_uri = format!("/v1/customers/{}", customer_id);
    let spent = || async {
        let (_, customer) = ctx.owner("GET", &customer_uri, None).await;
        customer["total_spent_cents"].as_i64().unwrap()
    };
    assert_eq!(spent().await, 6000);

    let payment_id = created[0]["payment"]["id"].as_str().unwrap();
    let (status, _) = ctx
        .owner("DELETE", &format!("/v1/payments/{}", payment_id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(spent().await, 3000);

    let booking_id = created[1]["booking"]["id"].as_str().unwrap();
    let (status, _) = ctx
        .owner("DELETE", &format!("/v1/bookings/{}", booking_id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(spent().await, 0);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_deleted_service_leaves_staff_assignments() {
    let ctx = context!();

    let kept = ctx.create_service("Wash", 15, 1000).await;
    let retired = ctx.create_service("Perm", 120, 9000).await;
    let both = ctx.create_staff("Oak", &[&kept, &retired]).await;
    let only_retired = ctx.create_staff("Pip", &[&retired]).await;

    let (status, _) = ctx
        .owner("DELETE", &format!("/v1/services/{}", retired), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, staff) = ctx.owner("GET", &format!("/v1/staff/{}", both), None).await;
    assert_eq!(staff["service_ids"], json!([kept]));

    let (_, staff) = ctx
        .owner("GET", &format!("/v1/staff/{}", only_retired), None)
        .await;
    assert_eq!(staff["service_ids"], json!([]));

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_deleted_account_loses_access() {
    let ctx = context!();

    let email = unique_email("quinn");
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/v1/public/{}/signup", ctx.slug),
            None,
            Some(json!({ "email": email, "password": TEST_PASSWORD, "name": "Quinn" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let token = common::token_of(&body).unwrap();
    let user_id = body["user"]["id"].as_str().unwrap();

    let (status, _) = ctx.send("GET", "/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .owner("DELETE", &format!("/v1/users/{}", user_id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The token has not expired, but its account is gone
    let (status, _) = ctx.send("GET", "/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = ctx.send("GET", "/v1/bookings", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_booking_rejects_out_of_range_start() {
    let ctx = context!();

    let service_id = ctx.create_service("Trim", 30, 2500).await;
    let customer_id = ctx.create_customer("Far Future", &unique_email("future")).await;

    // Owners skip the advance window, so the end time itself overflows
    let (status, body) = ctx
        .owner(
            "POST",
            "/v1/bookings",
            Some(json!({
                "customer_id": customer_id,
                "service_id": service_id,
                "start_time": "+262142-12-31T23:59:00Z"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
    assert_eq!(body["error"], "booking_rule");

    ctx.cleanup().await.unwrap();
}
