use serde_json::Value;

use super::domain::{
    Application, EntityKind, Job, JobSeeker, Organization, RecordId, Recruiter, User,
};
use super::entity::Entity;
use super::query::{ListQuery, Page};

/// Storage abstraction for one entity so the service can be exercised against any backend.
///
/// Writes are atomic with their integrity checks: `insert` and `update` confirm every
/// [`Entity::references`] target exists, and `delete` confirms no [`Entity::CHILDREN`] record
/// points at the id, all while holding the store's lock or transaction.
pub trait EntityRepository<E: Entity>: Send + Sync {
    fn insert(&self, record: E) -> Result<E, RepositoryError>;
    fn update(&self, record: E) -> Result<E, RepositoryError>;
    fn fetch(&self, id: &RecordId) -> Result<Option<E>, RepositoryError>;
    /// Matches ordered by creation time, then id.
    fn list(&self, query: &ListQuery) -> Result<Page<E>, RepositoryError>;
    fn count(&self, query: &ListQuery) -> Result<usize, RepositoryError>;
    /// Returns `false` when no record had the id.
    fn delete(&self, id: &RecordId) -> Result<bool, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record conflicts with existing data: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("references records that do not exist: {}", .0.join(", "))]
    MissingReferences(Vec<&'static str>),
    #[error("still referenced by {}", .0.join(", "))]
    StillReferenced(Vec<String>),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Fail with the reference fields whose targets `exists` cannot find.
pub(crate) fn ensure_references<E, F>(record: &E, mut exists: F) -> Result<(), RepositoryError>
where
    E: Entity,
    F: FnMut(EntityKind, &RecordId) -> Result<bool, RepositoryError>,
{
    let mut missing = Vec::new();
    for reference in record.references() {
        if !exists(reference.kind, &reference.id)? {
            missing.push(reference.field);
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RepositoryError::MissingReferences(missing))
    }
}

/// Fail with a "<count> <kind>" entry for every child kind still pointing at `id`.
pub(crate) fn ensure_unreferenced<E, F>(id: &RecordId, mut count: F) -> Result<(), RepositoryError>
where
    E: Entity,
    F: FnMut(EntityKind, &'static str, &str) -> Result<usize, RepositoryError>,
{
    let id = id.to_string();
    let mut dependents = Vec::new();
    for child in E::CHILDREN {
        let found = count(child.kind, child.field, &id)?;
        if found > 0 {
            dependents.push(format!("{found} {}", child.kind));
        }
    }
    if dependents.is_empty() {
        Ok(())
    } else {
        Err(RepositoryError::StillReferenced(dependents))
    }
}

/// A store for all six entities, with lookups addressed by [`EntityKind`] at runtime.
pub trait PortalRepository:
    EntityRepository<User>
    + EntityRepository<JobSeeker>
    + EntityRepository<Recruiter>
    + EntityRepository<Organization>
    + EntityRepository<Job>
    + EntityRepository<Application>
{
    fn fetch_value(&self, kind: EntityKind, id: &RecordId) -> Result<Option<Value>, RepositoryError> {
        match kind {
            EntityKind::User => to_value(EntityRepository::<User>::fetch(self, id)?),
            EntityKind::JobSeeker => to_value(EntityRepository::<JobSeeker>::fetch(self, id)?),
            EntityKind::Recruiter => to_value(EntityRepository::<Recruiter>::fetch(self, id)?),
            EntityKind::Organization => {
                to_value(EntityRepository::<Organization>::fetch(self, id)?)
            }
            EntityKind::Job => to_value(EntityRepository::<Job>::fetch(self, id)?),
            EntityKind::Application => {
                to_value(EntityRepository::<Application>::fetch(self, id)?)
            }
        }
    }

    fn count_where(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> Result<usize, RepositoryError> {
        let query = ListQuery::default().filter(field, value);
        match kind {
            EntityKind::User => EntityRepository::<User>::count(self, &query),
            EntityKind::JobSeeker => EntityRepository::<JobSeeker>::count(self, &query),
            EntityKind::Recruiter => EntityRepository::<Recruiter>::count(self, &query),
            EntityKind::Organization => EntityRepository::<Organization>::count(self, &query),
            EntityKind::Job => EntityRepository::<Job>::count(self, &query),
            EntityKind::Application => EntityRepository::<Application>::count(self, &query),
        }
    }
}

impl<T> PortalRepository for T where
    T: EntityRepository<User>
        + EntityRepository<JobSeeker>
        + EntityRepository<Recruiter>
        + EntityRepository<Organization>
        + EntityRepository<Job>
        + EntityRepository<Application>
{
}

fn to_value<E: Entity>(record: Option<E>) -> Result<Option<Value>, RepositoryError> {
    record
        .map(|record| {
            serde_json::to_value(record)
                .map_err(|err| RepositoryError::Unavailable(format!("unable to encode record: {err}")))
        })
        .transpose()
}
