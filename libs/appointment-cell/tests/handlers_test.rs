use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDateTime;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::{appointment_routes, AppointmentBookingService, SchedulingState};
use shared_models::scheduling::Account;
use shared_utils::test_utils::{future_slot, JwtTestUtils, SchedulingFixture, TestConfig};

struct TestApp {
    fixture: SchedulingFixture,
    config: TestConfig,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let fixture = SchedulingFixture::new().await;
        let config = TestConfig::default();
        let app_config = config.to_arc();
        let engine = AppointmentBookingService::new(fixture.repositories.clone(), &app_config);
        let router = appointment_routes(SchedulingState::new(app_config, engine));

        Self { fixture, config, router }
    }

    fn token_for(&self, account: &Account) -> String {
        let user = self.fixture.test_user_for(account);
        JwtTestUtils::create_test_token(&user, &self.config.jwt_secret, None)
    }

    async fn call(&self, method: Method, uri: &str, as_account: Option<&Account>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(account) = as_account {
            builder = builder.header("Authorization", format!("Bearer {}", self.token_for(account)));
        }

        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    fn booking_body(&self, start_time: NaiveDateTime) -> Value {
        json!({
            "customer_id": self.fixture.customer.id,
            "service_id": self.fixture.service.id,
            "professional_id": self.fixture.professional.id,
            "start_time": start_time,
        })
    }

    async fn book(&self, start_time: NaiveDateTime) -> Uuid {
        let (status, body) = self
            .call(Method::POST, "/", Some(&self.fixture.customer), Some(self.booking_body(start_time)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["appointment"]["id"].as_str().unwrap().parse().unwrap()
    }
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app.call(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user = app.fixture.test_user_for(&app.fixture.customer);
    let expired = JwtTestUtils::create_expired_token(&user, &app.config.jwt_secret);
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header("Authorization", format!("Bearer {}", expired))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_book_returns_created_pending_appointment() {
    let app = TestApp::new().await;
    let start = future_slot(1, 10, 0);

    let (status, body) = app
        .call(Method::POST, "/", Some(&app.fixture.customer), Some(app.booking_body(start)))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["status"], "PENDIENTE");
    assert_eq!(body["appointment"]["customer_id"], json!(app.fixture.customer.id));
}

#[tokio::test]
async fn test_domain_errors_map_to_http_categories() {
    let app = TestApp::new().await;
    let start = future_slot(1, 10, 0);
    app.book(start).await;

    let (status, body) = app
        .call(Method::POST, "/", Some(&app.fixture.customer), Some(app.booking_body(start + chrono::Duration::minutes(10))))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "scheduling_conflict");

    let (status, body) = app
        .call(Method::POST, "/", Some(&app.fixture.customer), Some(app.booking_body(future_slot(-1, 10, 0))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, body) = app
        .call(Method::GET, &format!("/{}", Uuid::new_v4()), Some(&app.fixture.admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = app
        .call(Method::GET, "/status/ARCHIVADA", Some(&app.fixture.admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lifecycle_endpoints() {
    let app = TestApp::new().await;
    let id = app.book(future_slot(2, 10, 0)).await;

    let (status, body) = app
        .call(Method::PATCH, &format!("/{}/confirm", id), Some(&app.fixture.customer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "unauthorized");

    let (status, body) = app
        .call(Method::PATCH, &format!("/{}/confirm", id), Some(&app.fixture.professional_account), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "CONFIRMADA");

    let (status, body) = app
        .call(Method::PATCH, &format!("/{}/cancel", id), Some(&app.fixture.customer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "CANCELADA");

    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/{}/status", id),
            Some(&app.fixture.admin),
            Some(json!({ "status": "CONFIRMADA" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reschedule_and_details() {
    let app = TestApp::new().await;
    let id = app.book(future_slot(2, 10, 0)).await;
    let new_start = future_slot(2, 16, 0);

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/{}/reschedule", id),
            Some(&app.fixture.customer),
            Some(json!({ "new_start_time": new_start })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["start_time"], json!(new_start));

    let (status, body) = app
        .call(Method::GET, &format!("/{}/details", id), Some(&app.fixture.professional_account), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!(id));
    assert_eq!(body["service_name"], "Masaje descontracturante");
    assert_eq!(body["service_duration_minutes"], 30);
}

#[tokio::test]
async fn test_listings_and_stats() {
    let app = TestApp::new().await;
    app.book(future_slot(1, 10, 0)).await;
    app.book(future_slot(1, 12, 0)).await;

    let (status, body) = app.call(Method::GET, "/", Some(&app.fixture.customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (_, body) = app.call(Method::GET, "/", Some(&app.fixture.other_customer), None).await;
    assert_eq!(body["total"], 0);

    let (status, body) = app
        .call(Method::GET, &format!("/professionals/{}", app.fixture.professional.id), Some(&app.fixture.professional_account), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, body) = app
        .call(Method::GET, "/status/PENDIENTE", Some(&app.fixture.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, body) = app.call(Method::GET, "/stats", Some(&app.fixture.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, _) = app.call(Method::GET, "/stats", Some(&app.fixture.customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_is_admin_only() {
    let app = TestApp::new().await;
    let id = app.book(future_slot(1, 10, 0)).await;

    let (status, _) = app
        .call(Method::DELETE, &format!("/{}", id), Some(&app.fixture.customer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::DELETE, &format!("/{}", id), Some(&app.fixture.admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(Method::GET, &format!("/{}", id), Some(&app.fixture.admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
