use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::domain::{
    Application, ApplicationDraft, EntityKind, Job, JobDraft, JobSeeker, JobSeekerDraft,
    Organization, OrganizationDraft, RecordId, Recruiter, RecruiterDraft, User, UserDraft,
};
use super::schema::{
    Schema, APPLICATION_SCHEMA, JOB_SCHEMA, JOB_SEEKER_SCHEMA, ORGANIZATION_SCHEMA,
    RECRUITER_SCHEMA, USER_SCHEMA,
};

/// A foreign key held by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub kind: EntityKind,
    pub id: RecordId,
}

impl Reference {
    /// Name used when the referenced record is expanded on read.
    pub fn relation(&self) -> &'static str {
        self.kind.label()
    }
}

/// A record type holding foreign keys that point at this entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRelation {
    pub kind: EntityKind,
    pub field: &'static str,
}

/// Binds a record type to its schema, writable draft, and relations.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: EntityKind;
    /// Fields accepted as equality filters when listing.
    const FILTERABLE: &'static [&'static str];
    /// Records that reference this entity; deletion is refused while any exist.
    const CHILDREN: &'static [ChildRelation];
    /// Filterable fields compared ignoring ASCII case.
    const CASE_INSENSITIVE: &'static [&'static str] = &[];

    type Draft: Clone + Serialize + DeserializeOwned;

    fn schema() -> &'static Schema;
    fn id(&self) -> RecordId;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn from_draft(id: RecordId, draft: Self::Draft, now: DateTime<Utc>) -> Self;
    /// Replace the writable fields; `created_at` is kept and `updated_at` set to `now`.
    fn apply(&mut self, draft: Self::Draft, now: DateTime<Utc>);
    fn draft(&self) -> Self::Draft;
    fn references(&self) -> Vec<Reference>;

    /// Values that must be unique across all records of this entity.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Text form of a field, used for in-memory filtering.
    fn field_text(&self, field: &str) -> Option<String> {
        let value = serde_json::to_value(self).ok()?;
        match value.get(field)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;
    const CASE_INSENSITIVE: &'static [&'static str] = &["email"];
    const FILTERABLE: &'static [&'static str] = &[
        "id",
        "email",
        "first_name",
        "last_name",
        "roq_user_id",
        "tenant_id",
    ];
    const CHILDREN: &'static [ChildRelation] = &[
        ChildRelation {
            kind: EntityKind::JobSeeker,
            field: "user_id",
        },
        ChildRelation {
            kind: EntityKind::Organization,
            field: "user_id",
        },
        ChildRelation {
            kind: EntityKind::Recruiter,
            field: "user_id",
        },
    ];

    type Draft = UserDraft;

    fn schema() -> &'static Schema {
        &USER_SCHEMA
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_draft(id: RecordId, draft: UserDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email: draft.email,
            first_name: draft.first_name,
            last_name: draft.last_name,
            roq_user_id: draft.roq_user_id,
            tenant_id: draft.tenant_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, draft: UserDraft, now: DateTime<Utc>) {
        *self = Self {
            created_at: self.created_at,
            ..Self::from_draft(self.id, draft, now)
        };
    }

    fn draft(&self) -> UserDraft {
        UserDraft {
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            roq_user_id: self.roq_user_id.clone(),
            tenant_id: self.tenant_id.clone(),
        }
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("email", self.email.to_ascii_lowercase())]
    }
}

impl Entity for JobSeeker {
    const KIND: EntityKind = EntityKind::JobSeeker;
    const FILTERABLE: &'static [&'static str] = &[
        "id",
        "user_id",
        "resume",
        "skills",
        "education_level",
        "preferred_job_type",
        "preferred_location",
    ];
    const CHILDREN: &'static [ChildRelation] = &[ChildRelation {
        kind: EntityKind::Application,
        field: "job_seeker_id",
    }];

    type Draft = JobSeekerDraft;

    fn schema() -> &'static Schema {
        &JOB_SEEKER_SCHEMA
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_draft(id: RecordId, draft: JobSeekerDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            resume: draft.resume,
            skills: draft.skills,
            experience_years: draft.experience_years,
            education_level: draft.education_level,
            preferred_job_type: draft.preferred_job_type,
            preferred_location: draft.preferred_location,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, draft: JobSeekerDraft, now: DateTime<Utc>) {
        *self = Self {
            created_at: self.created_at,
            ..Self::from_draft(self.id, draft, now)
        };
    }

    fn draft(&self) -> JobSeekerDraft {
        JobSeekerDraft {
            user_id: self.user_id,
            resume: self.resume.clone(),
            skills: self.skills.clone(),
            experience_years: self.experience_years,
            education_level: self.education_level.clone(),
            preferred_job_type: self.preferred_job_type.clone(),
            preferred_location: self.preferred_location.clone(),
        }
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference {
            field: "user_id",
            kind: EntityKind::User,
            id: self.user_id,
        }]
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("user_id", self.user_id.to_string())]
    }
}

impl Entity for Recruiter {
    const KIND: EntityKind = EntityKind::Recruiter;
    const FILTERABLE: &'static [&'static str] = &["id", "user_id", "organization_id"];
    const CHILDREN: &'static [ChildRelation] = &[ChildRelation {
        kind: EntityKind::Job,
        field: "recruiter_id",
    }];

    type Draft = RecruiterDraft;

    fn schema() -> &'static Schema {
        &RECRUITER_SCHEMA
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_draft(id: RecordId, draft: RecruiterDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            organization_id: draft.organization_id,
            job_posted: draft.job_posted,
            job_filled: draft.job_filled,
            active_jobs: draft.active_jobs,
            inactive_jobs: draft.inactive_jobs,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, draft: RecruiterDraft, now: DateTime<Utc>) {
        *self = Self {
            created_at: self.created_at,
            ..Self::from_draft(self.id, draft, now)
        };
    }

    fn draft(&self) -> RecruiterDraft {
        RecruiterDraft {
            user_id: self.user_id,
            organization_id: self.organization_id,
            job_posted: self.job_posted,
            job_filled: self.job_filled,
            active_jobs: self.active_jobs,
            inactive_jobs: self.inactive_jobs,
        }
    }

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference {
                field: "user_id",
                kind: EntityKind::User,
                id: self.user_id,
            },
            Reference {
                field: "organization_id",
                kind: EntityKind::Organization,
                id: self.organization_id,
            },
        ]
    }
}

impl Entity for Organization {
    const KIND: EntityKind = EntityKind::Organization;
    const FILTERABLE: &'static [&'static str] = &[
        "id",
        "description",
        "address",
        "city",
        "state",
        "country",
        "postal_code",
        "name",
        "user_id",
        "tenant_id",
    ];
    const CHILDREN: &'static [ChildRelation] = &[ChildRelation {
        kind: EntityKind::Recruiter,
        field: "organization_id",
    }];

    type Draft = OrganizationDraft;

    fn schema() -> &'static Schema {
        &ORGANIZATION_SCHEMA
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_draft(id: RecordId, draft: OrganizationDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            address: draft.address,
            city: draft.city,
            state: draft.state,
            country: draft.country,
            postal_code: draft.postal_code,
            user_id: draft.user_id,
            tenant_id: draft.tenant_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, draft: OrganizationDraft, now: DateTime<Utc>) {
        *self = Self {
            created_at: self.created_at,
            ..Self::from_draft(self.id, draft, now)
        };
    }

    fn draft(&self) -> OrganizationDraft {
        OrganizationDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            country: self.country.clone(),
            postal_code: self.postal_code.clone(),
            user_id: self.user_id,
            tenant_id: self.tenant_id.clone(),
        }
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference {
            field: "user_id",
            kind: EntityKind::User,
            id: self.user_id,
        }]
    }
}

impl Entity for Job {
    const KIND: EntityKind = EntityKind::Job;
    const FILTERABLE: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "recruiter_id",
        "location",
        "job_type",
    ];
    const CHILDREN: &'static [ChildRelation] = &[ChildRelation {
        kind: EntityKind::Application,
        field: "job_id",
    }];

    type Draft = JobDraft;

    fn schema() -> &'static Schema {
        &JOB_SCHEMA
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_draft(id: RecordId, draft: JobDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            recruiter_id: draft.recruiter_id,
            location: draft.location,
            salary: draft.salary,
            job_type: draft.job_type,
            posted_date: draft.posted_date,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, draft: JobDraft, now: DateTime<Utc>) {
        *self = Self {
            created_at: self.created_at,
            ..Self::from_draft(self.id, draft, now)
        };
    }

    fn draft(&self) -> JobDraft {
        JobDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            recruiter_id: self.recruiter_id,
            location: self.location.clone(),
            salary: self.salary,
            job_type: self.job_type.clone(),
            posted_date: self.posted_date,
        }
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference {
            field: "recruiter_id",
            kind: EntityKind::Recruiter,
            id: self.recruiter_id,
        }]
    }
}

impl Entity for Application {
    const KIND: EntityKind = EntityKind::Application;
    const FILTERABLE: &'static [&'static str] = &[
        "id",
        "job_seeker_id",
        "job_id",
        "status",
        "resume",
        "cover_letter",
    ];
    const CHILDREN: &'static [ChildRelation] = &[];

    type Draft = ApplicationDraft;

    fn schema() -> &'static Schema {
        &APPLICATION_SCHEMA
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_draft(id: RecordId, draft: ApplicationDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            job_seeker_id: draft.job_seeker_id,
            job_id: draft.job_id,
            application_date: draft.application_date,
            status: draft.status,
            resume: draft.resume,
            cover_letter: draft.cover_letter,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, draft: ApplicationDraft, now: DateTime<Utc>) {
        *self = Self {
            created_at: self.created_at,
            ..Self::from_draft(self.id, draft, now)
        };
    }

    fn draft(&self) -> ApplicationDraft {
        ApplicationDraft {
            job_seeker_id: self.job_seeker_id,
            job_id: self.job_id,
            application_date: self.application_date,
            status: self.status.clone(),
            resume: self.resume.clone(),
            cover_letter: self.cover_letter.clone(),
        }
    }

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference {
                field: "job_seeker_id",
                kind: EntityKind::JobSeeker,
                id: self.job_seeker_id,
            },
            Reference {
                field: "job_id",
                kind: EntityKind::Job,
                id: self.job_id,
            },
        ]
    }
}
