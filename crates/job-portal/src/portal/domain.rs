use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier shared by every portal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// The six record types managed by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    JobSeeker,
    Recruiter,
    Organization,
    Job,
    Application,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::User,
        EntityKind::JobSeeker,
        EntityKind::Recruiter,
        EntityKind::Organization,
        EntityKind::Job,
        EntityKind::Application,
    ];

    /// Singular storage name, also used as the relation name when expanding records.
    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::JobSeeker => "job_seeker",
            EntityKind::Recruiter => "recruiter",
            EntityKind::Organization => "organization",
            EntityKind::Job => "job",
            EntityKind::Application => "application",
        }
    }

    /// URL segment of the HTTP collection.
    pub const fn collection(self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::JobSeeker => "job-seekers",
            EntityKind::Recruiter => "recruiters",
            EntityKind::Organization => "organizations",
            EntityKind::Job => "jobs",
            EntityKind::Application => "applications",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Portal account. `roq_user_id` points at the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roq_user_id: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDraft {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roq_user_id: String,
    pub tenant_id: String,
}

/// Candidate profile; at most one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSeeker {
    pub id: RecordId,
    pub user_id: RecordId,
    pub resume: Option<String>,
    pub skills: Option<String>,
    pub experience_years: Option<i64>,
    pub education_level: Option<String>,
    pub preferred_job_type: Option<String>,
    pub preferred_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSeekerDraft {
    pub user_id: RecordId,
    pub resume: Option<String>,
    pub skills: Option<String>,
    pub experience_years: Option<i64>,
    pub education_level: Option<String>,
    pub preferred_job_type: Option<String>,
    pub preferred_location: Option<String>,
}

/// Membership of a user in an organization, with posting counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recruiter {
    pub id: RecordId,
    pub user_id: RecordId,
    pub organization_id: RecordId,
    pub job_posted: Option<i64>,
    pub job_filled: Option<i64>,
    pub active_jobs: Option<i64>,
    pub inactive_jobs: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruiterDraft {
    pub user_id: RecordId,
    pub organization_id: RecordId,
    pub job_posted: Option<i64>,
    pub job_filled: Option<i64>,
    pub active_jobs: Option<i64>,
    pub inactive_jobs: Option<i64>,
}

/// Hiring organization owned by a user and scoped to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: RecordId,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub user_id: RecordId,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationDraft {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub user_id: RecordId,
    pub tenant_id: String,
}

/// Job posting published by a recruiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: RecordId,
    pub title: String,
    pub description: Option<String>,
    pub recruiter_id: RecordId,
    pub location: Option<String>,
    pub salary: Option<i64>,
    pub job_type: Option<String>,
    pub posted_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDraft {
    pub title: String,
    pub description: Option<String>,
    pub recruiter_id: RecordId,
    pub location: Option<String>,
    pub salary: Option<i64>,
    pub job_type: Option<String>,
    pub posted_date: Option<NaiveDate>,
}

/// A job seeker's application to a job.
///
/// `status` is free-form text; no transition rules apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: RecordId,
    pub job_seeker_id: RecordId,
    pub job_id: RecordId,
    pub application_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub resume: Option<String>,
    pub cover_letter: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub job_seeker_id: RecordId,
    pub job_id: RecordId,
    pub application_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub resume: Option<String>,
    pub cover_letter: Option<String>,
}
