use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::portal::router::create_handler;
use crate::portal::{
    portal_router, Job, PortalService, PortalSettings, RecordId, User, ROLE_HEADER,
};

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn raw_request(
    method: &str,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn create_handler_returns_created_record() {
    let (service, _) = build_service();

    let response = create_handler::<User, _>(
        State(service),
        Default::default(),
        Ok(Json(user_payload("a@example.com"))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["email"], "a@example.com");
    assert!(body["id"].as_str().is_some());
    assert!(body["created_at"].as_str().is_some());
}

#[tokio::test]
async fn create_handler_returns_internal_error_on_repository_failure() {
    let service = Arc::new(PortalService::new(
        Arc::new(UnavailableRepository),
        PortalSettings::default(),
    ));

    let response = create_handler::<User, _>(
        State(service),
        Default::default(),
        Ok(Json(user_payload("a@example.com"))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn invalid_payload_returns_field_errors() {
    let (router, _) = portal_router_with_service();

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/users",
            json!({ "email": "not-an-email" }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["fields"]["email"], "email must be a valid email");
    assert_eq!(body["fields"]["tenant_id"], "tenant_id is a required field");
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let (router, service) = portal_router_with_service();
    let seeded = seed_portal(&service);

    let cases = [
        (
            raw_request("POST", "/api/v1/users", Some("application/json"), "not json"),
            StatusCode::BAD_REQUEST,
        ),
        (
            raw_request("POST", "/api/v1/users", None, "{}"),
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ),
        (
            raw_request("POST", "/api/v1/users", Some("application/json"), "[1, 2]"),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (
            raw_request(
                "PATCH",
                &format!("/api/v1/jobs/{}", seeded.job.id),
                Some("application/json"),
                "{\"title\": ",
            ),
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (request, expected) in cases {
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        assert_eq!(response.status(), expected);
        let body = read_json_body(response).await;
        assert!(
            body["error"].as_str().is_some_and(|message| !message.is_empty()),
            "missing error message in {body}"
        );
    }

    let job: Job = service.get(&hr_manager(), &seeded.job.id).expect("job");
    assert_eq!(job, seeded.job);
}

#[tokio::test]
async fn forbidden_role_gets_403_with_message() {
    let (router, service) = portal_router_with_service();
    let seeded = seed_portal(&service);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/jobs/{}", seeded.job.id))
        .header(ROLE_HEADER, "customer")
        .body(Body::empty())
        .expect("request");
    let response = router.oneshot(request).await.expect("router response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json_body(response).await;
    assert_eq!(
        body["error"],
        "You don't have permissions to delete this resource"
    );
}

#[tokio::test]
async fn unknown_role_header_is_a_bad_request() {
    let (router, _) = portal_router_with_service();

    let request = Request::builder()
        .uri("/api/v1/jobs")
        .header(ROLE_HEADER, "superuser")
        .body(Body::empty())
        .expect("request");
    let response = router.oneshot(request).await.expect("router response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_id_is_a_bad_request_and_unknown_id_is_not_found() {
    let (router, _) = portal_router_with_service();

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/users/not-a-uuid"))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(get_request(&format!("/api/v1/users/{}", RecordId::new())))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_applies_window_and_filters() {
    let (router, service) = portal_router_with_service();
    let seeded = seed_portal(&service);

    let response = router
        .clone()
        .oneshot(get_request(&format!(
            "/api/v1/jobs?recruiter_id={}&limit=1&offset=0",
            seeded.recruiter.id
        )))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["items"][0]["title"], "Engineer");

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/jobs?limit=0"))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(get_request("/api/v1/jobs?password=secret"))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fetch_expands_relations_and_counts() {
    let (router, service) = portal_router_with_service();
    let seeded = seed_portal(&service);

    let response = router
        .oneshot(get_request(&format!(
            "/api/v1/jobs/{}?expand=recruiter",
            seeded.job.id
        )))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["title"], "Engineer");
    assert_eq!(body["recruiter"]["id"], seeded.recruiter.id.to_string());
    assert_eq!(body["_count"]["application"], 1);
}

#[tokio::test]
async fn patch_updates_and_delete_conflicts_then_succeeds() {
    let (router, service) = portal_router_with_service();
    let seeded = seed_portal(&service);

    let response = router
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/v1/applications/{}", seeded.application.id),
            json!({ "status": "reviewed" }),
        ))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "reviewed");
    assert_eq!(body["job_id"], seeded.job.id.to_string());

    let job_uri = format!("/api/v1/jobs/{}", seeded.job.id);
    let response = router
        .clone()
        .oneshot(json_request("DELETE", &job_uri, json!(null)))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(json_request(
            "DELETE",
            &format!("/api/v1/applications/{}", seeded.application.id),
            json!(null),
        ))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .oneshot(json_request("DELETE", &job_uri, json!(null)))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn duplicate_email_returns_conflict() {
    let (service, _) = build_service();
    let router = portal_router(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/users",
            Value::Object(user_payload("a@example.com")),
        ))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/users",
            Value::Object(user_payload("a@example.com")),
        ))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
