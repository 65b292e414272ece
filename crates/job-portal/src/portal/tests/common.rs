use std::sync::Arc;

use axum::response::Response;
use axum::Router;
use serde_json::{json, Map, Value};

use crate::portal::{
    portal_router, Actor, Application, EntityRepository, InMemoryPortalRepository, Job, JobSeeker,
    ListQuery, Organization, Page, PortalService, PortalSettings, RecordId, Recruiter,
    RepositoryError, Role, User,
};

pub(super) type MemoryService = PortalService<InMemoryPortalRepository>;

pub(super) fn build_service() -> (Arc<MemoryService>, InMemoryPortalRepository) {
    let repository = InMemoryPortalRepository::new();
    let service = PortalService::new(Arc::new(repository.clone()), PortalSettings::default());
    (Arc::new(service), repository)
}

pub(super) fn portal_router_with_service() -> (Router, Arc<MemoryService>) {
    let (service, _) = build_service();
    (portal_router(service.clone()), service)
}

pub(super) fn hr_manager() -> Actor {
    Actor::new(Role::HrManager)
}

pub(super) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub(super) fn user_payload(email: &str) -> Map<String, Value> {
    object(json!({
        "email": email,
        "first_name": "Ada",
        "last_name": "Lovelace",
        "roq_user_id": format!("roq-{email}"),
        "tenant_id": "tenant-1",
    }))
}

pub(super) fn organization_payload(user_id: RecordId) -> Map<String, Value> {
    object(json!({
        "name": "Acme",
        "city": "Berlin",
        "user_id": user_id.to_string(),
        "tenant_id": "tenant-1",
    }))
}

pub(super) fn recruiter_payload(user_id: RecordId, organization_id: RecordId) -> Map<String, Value> {
    object(json!({
        "user_id": user_id.to_string(),
        "organization_id": organization_id.to_string(),
        "job_posted": 0,
    }))
}

pub(super) fn job_payload(recruiter_id: RecordId) -> Map<String, Value> {
    object(json!({
        "title": "Engineer",
        "description": "Build things",
        "recruiter_id": recruiter_id.to_string(),
        "salary": 90000,
        "posted_date": "2024-03-01",
    }))
}

pub(super) fn job_seeker_payload(user_id: RecordId) -> Map<String, Value> {
    object(json!({
        "user_id": user_id.to_string(),
        "skills": "rust, sql",
        "experience_years": 4,
    }))
}

pub(super) fn application_payload(job_seeker_id: RecordId, job_id: RecordId) -> Map<String, Value> {
    object(json!({
        "job_seeker_id": job_seeker_id.to_string(),
        "job_id": job_id.to_string(),
        "application_date": "2024-03-02",
        "status": "submitted",
    }))
}

/// Records created by [`seed_portal`], one per entity.
pub(super) struct Seeded {
    pub user: User,
    pub applicant: User,
    pub organization: Organization,
    pub recruiter: Recruiter,
    pub job: Job,
    pub job_seeker: JobSeeker,
    pub application: Application,
}

pub(super) fn seed_portal(service: &MemoryService) -> Seeded {
    let actor = hr_manager();
    let user: User = service
        .create(&actor, user_payload("a@example.com"))
        .expect("user created");
    let organization: Organization = service
        .create(&actor, organization_payload(user.id))
        .expect("organization created");
    let recruiter: Recruiter = service
        .create(&actor, recruiter_payload(user.id, organization.id))
        .expect("recruiter created");
    let job: Job = service
        .create(&actor, job_payload(recruiter.id))
        .expect("job created");
    let applicant: User = service
        .create(&actor, user_payload("b@example.com"))
        .expect("applicant created");
    let job_seeker: JobSeeker = service
        .create(&actor, job_seeker_payload(applicant.id))
        .expect("job seeker created");
    let application: Application = service
        .create(&actor, application_payload(job_seeker.id, job.id))
        .expect("application created");

    Seeded {
        user,
        applicant,
        organization,
        recruiter,
        job,
        job_seeker,
        application,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Fails every call so tests can prove which paths never reach storage.
pub(super) struct UnavailableRepository;

fn unavailable() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

macro_rules! unavailable_table {
    ($entity:ty) => {
        impl EntityRepository<$entity> for UnavailableRepository {
            fn insert(&self, _record: $entity) -> Result<$entity, RepositoryError> {
                Err(unavailable())
            }

            fn update(&self, _record: $entity) -> Result<$entity, RepositoryError> {
                Err(unavailable())
            }

            fn fetch(&self, _id: &RecordId) -> Result<Option<$entity>, RepositoryError> {
                Err(unavailable())
            }

            fn list(&self, _query: &ListQuery) -> Result<Page<$entity>, RepositoryError> {
                Err(unavailable())
            }

            fn count(&self, _query: &ListQuery) -> Result<usize, RepositoryError> {
                Err(unavailable())
            }

            fn delete(&self, _id: &RecordId) -> Result<bool, RepositoryError> {
                Err(unavailable())
            }
        }
    };
}

unavailable_table!(User);
unavailable_table!(JobSeeker);
unavailable_table!(Recruiter);
unavailable_table!(Organization);
unavailable_table!(Job);
unavailable_table!(Application);
