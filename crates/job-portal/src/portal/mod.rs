//! Job portal records: users, organizations, recruiters, job seekers, jobs, and applications.
//!
//! Each entity is bound to a declarative validation schema, stored through the
//! [`EntityRepository`] abstraction, and exposed by [`PortalService`] and [`portal_router`].

pub mod access;
pub mod domain;
pub mod entity;
pub mod memory;
pub mod query;
pub mod repository;
pub mod router;
pub mod schema;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use access::{AccessDenied, AccessPolicy, Actor, Operation, Role, UnknownRole};
pub use domain::{
    Application, ApplicationDraft, EntityKind, Job, JobDraft, JobSeeker, JobSeekerDraft,
    Organization, OrganizationDraft, RecordId, Recruiter, RecruiterDraft, User, UserDraft,
};
pub use entity::{ChildRelation, Entity, Reference};
pub use memory::InMemoryPortalRepository;
pub use query::{ListQuery, Page, QueryError, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use repository::{EntityRepository, PortalRepository, RepositoryError};
pub use router::{error_response, portal_router, ROLE_HEADER};
pub use schema::{schema_for, FieldKind, FieldRule, Schema, ValidationErrors};
pub use service::{PortalService, PortalServiceError, PortalSettings, RecordView};
pub use sqlite::{SqlRecord, SqlitePortalRepository};
