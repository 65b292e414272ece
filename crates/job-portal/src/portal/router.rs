use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};

use super::access::{Actor, Role};
use super::domain::{Application, Job, JobSeeker, Organization, RecordId, Recruiter, User};
use super::entity::Entity;
use super::query::ListQuery;
use super::repository::{EntityRepository, PortalRepository, RepositoryError};
use super::service::{PortalService, PortalServiceError};

/// Header naming the caller's role.
pub const ROLE_HEADER: &str = "x-portal-role";

type SharedService<R> = Arc<PortalService<R>>;

/// Router builder exposing CRUD endpoints for every entity under `/api/v1`.
pub fn portal_router<R>(service: SharedService<R>) -> Router
where
    R: PortalRepository + 'static,
{
    Router::new()
        .merge(entity_routes::<User, R>())
        .merge(entity_routes::<JobSeeker, R>())
        .merge(entity_routes::<Recruiter, R>())
        .merge(entity_routes::<Organization, R>())
        .merge(entity_routes::<Job, R>())
        .merge(entity_routes::<Application, R>())
        .with_state(service)
}

fn entity_routes<E, R>() -> Router<SharedService<R>>
where
    E: Entity,
    R: PortalRepository + EntityRepository<E> + 'static,
{
    let collection = format!("/api/v1/{}", E::KIND.collection());
    let member = format!("{collection}/:id");
    Router::new()
        .route(
            &collection,
            get(list_handler::<E, R>).post(create_handler::<E, R>),
        )
        .route(
            &member,
            get(fetch_handler::<E, R>)
                .put(update_handler::<E, R>)
                .patch(update_handler::<E, R>)
                .delete(delete_handler::<E, R>),
        )
}

fn resolve_actor<R>(service: &PortalService<R>, headers: &HeaderMap) -> Result<Actor, Response>
where
    R: PortalRepository + 'static,
{
    let Some(raw) = headers.get(ROLE_HEADER) else {
        return Ok(service.actor(None));
    };
    raw.to_str()
        .ok()
        .and_then(|value| value.parse::<Role>().ok())
        .map(|role| service.actor(Some(role)))
        .ok_or_else(|| {
            let payload = json!({
                "error": format!("{ROLE_HEADER} must name a known role"),
            });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        })
}

fn parse_id(raw: &str) -> Result<RecordId, Response> {
    raw.parse().map_err(|_| {
        let payload = json!({
            "error": format!("'{raw}' is not a valid identifier"),
        });
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

/// Malformed bodies get the same `{"error": ..}` shape as every other failure.
fn json_body(
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Map<String, Value>, Response> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        let payload = json!({
            "error": rejection.body_text(),
        });
        (rejection.status(), Json(payload)).into_response()
    })
}

fn expand_list(params: &BTreeMap<String, String>) -> Vec<String> {
    let mut names: Vec<String> = params
        .get("expand")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names.dedup();
    names
}

/// Map service failures onto HTTP responses.
pub fn error_response(error: PortalServiceError) -> Response {
    let status = match &error {
        PortalServiceError::Validation(errors) => {
            let payload = json!({
                "error": error.to_string(),
                "fields": errors.fields,
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
        PortalServiceError::UnknownReference { fields, .. }
        | PortalServiceError::Repository(RepositoryError::MissingReferences(fields)) => {
            let payload = json!({
                "error": error.to_string(),
                "fields": fields,
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
        PortalServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        PortalServiceError::Query(_) => StatusCode::BAD_REQUEST,
        PortalServiceError::NotFound { .. }
        | PortalServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        PortalServiceError::StillReferenced { .. }
        | PortalServiceError::Repository(RepositoryError::StillReferenced(_))
        | PortalServiceError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
        PortalServiceError::Repository(RepositoryError::Unavailable(_))
        | PortalServiceError::Decode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

pub(crate) async fn list_handler<E, R>(
    State(service): State<SharedService<R>>,
    headers: HeaderMap,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response
where
    E: Entity,
    R: PortalRepository + EntityRepository<E> + 'static,
{
    let actor = match resolve_actor(&service, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let query = match ListQuery::from_params(params, service.settings().page_limit) {
        Ok(query) => query,
        Err(error) => return error_response(error.into()),
    };

    match service.list::<E>(&actor, &query) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_handler<E, R>(
    State(service): State<SharedService<R>>,
    headers: HeaderMap,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Response
where
    E: Entity,
    R: PortalRepository + EntityRepository<E> + 'static,
{
    let actor = match resolve_actor(&service, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let payload = match json_body(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    match service.create::<E>(&actor, payload) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn fetch_handler<E, R>(
    State(service): State<SharedService<R>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response
where
    E: Entity,
    R: PortalRepository + EntityRepository<E> + 'static,
{
    let actor = match resolve_actor(&service, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.view::<E>(&actor, &id, &expand_list(&params)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<E, R>(
    State(service): State<SharedService<R>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Response
where
    E: Entity,
    R: PortalRepository + EntityRepository<E> + 'static,
{
    let actor = match resolve_actor(&service, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let payload = match json_body(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    match service.update::<E>(&actor, &id, payload) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_handler<E, R>(
    State(service): State<SharedService<R>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response
where
    E: Entity,
    R: PortalRepository + EntityRepository<E> + 'static,
{
    let actor = match resolve_actor(&service, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.delete::<E>(&actor, &id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}
