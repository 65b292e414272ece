//! SQLite-backed store. One table per entity, foreign keys enforced by the engine.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params_from_iter, Connection, ErrorCode, Row, TransactionBehavior};

use super::domain::{
    Application, EntityKind, Job, JobSeeker, Organization, RecordId, Recruiter, User,
};
use super::entity::Entity;
use super::query::{ListQuery, Page};
use super::repository::{
    ensure_references, ensure_unreferenced, EntityRepository, RepositoryError,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "user" (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    first_name TEXT,
    last_name TEXT,
    roq_user_id TEXT NOT NULL,
    tenant_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "organization" (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    address TEXT,
    city TEXT,
    state TEXT,
    country TEXT,
    postal_code TEXT,
    user_id TEXT NOT NULL REFERENCES "user"(id),
    tenant_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "recruiter" (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL REFERENCES "user"(id),
    organization_id TEXT NOT NULL REFERENCES "organization"(id),
    job_posted INTEGER,
    job_filled INTEGER,
    active_jobs INTEGER,
    inactive_jobs INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "job_seeker" (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL UNIQUE REFERENCES "user"(id),
    resume TEXT,
    skills TEXT,
    experience_years INTEGER,
    education_level TEXT,
    preferred_job_type TEXT,
    preferred_location TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "job" (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    recruiter_id TEXT NOT NULL REFERENCES "recruiter"(id),
    location TEXT,
    salary INTEGER,
    job_type TEXT,
    posted_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "application" (
    id TEXT PRIMARY KEY NOT NULL,
    job_seeker_id TEXT NOT NULL REFERENCES "job_seeker"(id),
    job_id TEXT NOT NULL REFERENCES "job"(id),
    application_date TEXT,
    status TEXT,
    resume TEXT,
    cover_letter TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_organization_user ON "organization"(user_id);
CREATE INDEX IF NOT EXISTS idx_recruiter_user ON "recruiter"(user_id);
CREATE INDEX IF NOT EXISTS idx_recruiter_organization ON "recruiter"(organization_id);
CREATE INDEX IF NOT EXISTS idx_job_recruiter ON "job"(recruiter_id);
CREATE INDEX IF NOT EXISTS idx_application_job_seeker ON "application"(job_seeker_id);
CREATE INDEX IF NOT EXISTS idx_application_job ON "application"(job_id);
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqlitePortalRepository {
    conn: Mutex<Connection>,
}

impl SqlitePortalRepository {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "unable to create {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(storage_error)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(storage_error)?;
        let repository = Self {
            conn: Mutex::new(conn),
        };
        repository.init()?;
        Ok(repository)
    }

    /// Create any missing tables and indexes. Safe to run repeatedly.
    pub fn init(&self) -> Result<(), RepositoryError> {
        self.lock()?.execute_batch(SCHEMA).map_err(storage_error)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("connection mutex poisoned".to_string()))
    }
}

fn storage_error(err: rusqlite::Error) -> RepositoryError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepositoryError::Conflict(message.clone().unwrap_or_else(|| err.to_string()))
        }
        _ => RepositoryError::Unavailable(err.to_string()),
    }
}

fn row_exists(conn: &Connection, kind: EntityKind, id: &RecordId) -> Result<bool, RepositoryError> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE id = ?1)",
        kind.label()
    );
    conn.query_row(&sql, [id.to_string()], |row| row.get(0))
        .map_err(storage_error)
}

/// `field` always comes from a static child relation, never from a request.
fn count_children(
    conn: &Connection,
    kind: EntityKind,
    field: &'static str,
    value: &str,
) -> Result<usize, RepositoryError> {
    let sql = format!("SELECT COUNT(*) FROM \"{}\" WHERE {field} = ?1", kind.label());
    let count: i64 = conn
        .query_row(&sql, [value], |row| row.get(0))
        .map_err(storage_error)?;
    Ok(usize::try_from(count).unwrap_or_default())
}

/// Column mapping for a record stored in its own table named after [`Entity::KIND`].
pub trait SqlRecord: Entity {
    /// Writable columns, excluding `id` and the timestamps.
    const COLUMNS: &'static [&'static str];

    /// Values for [`Self::COLUMNS`], in order.
    fn values(&self) -> Vec<SqlValue>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

fn text(value: &Option<String>) -> SqlValue {
    value.clone().map_or(SqlValue::Null, SqlValue::Text)
}

fn integer(value: Option<i64>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::Integer)
}

fn id(value: RecordId) -> SqlValue {
    SqlValue::Text(value.to_string())
}

fn date(value: Option<NaiveDate>) -> SqlValue {
    value.map_or(SqlValue::Null, |date| {
        SqlValue::Text(date.format(DATE_FORMAT).to_string())
    })
}

fn timestamp(value: DateTime<Utc>) -> SqlValue {
    SqlValue::Text(value.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn conversion_error<E>(row: &Row<'_>, column: &str, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let index = row.as_ref().column_index(column).unwrap_or_default();
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn id_column(row: &Row<'_>, column: &str) -> rusqlite::Result<RecordId> {
    let raw: String = row.get(column)?;
    raw.parse().map_err(|err| conversion_error(row, column, err))
}

fn date_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| {
        NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|err| conversion_error(row, column, err))
    })
    .transpose()
}

fn timestamp_column(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|stamp| stamp.with_timezone(&Utc))
        .map_err(|err| conversion_error(row, column, err))
}

fn select_list<E: SqlRecord>() -> String {
    let mut columns = vec!["id"];
    columns.extend_from_slice(E::COLUMNS);
    columns.extend_from_slice(&["created_at", "updated_at"]);
    columns.join(", ")
}

/// `None` when a filter names a column that cannot be filtered; such a query matches nothing.
fn where_clause<E: SqlRecord>(query: &ListQuery) -> Option<(String, Vec<SqlValue>)> {
    if query.filters.is_empty() {
        return Some((String::new(), Vec::new()));
    }
    let mut conditions = Vec::with_capacity(query.filters.len());
    let mut values = Vec::with_capacity(query.filters.len());
    for (field, value) in &query.filters {
        if !E::FILTERABLE.contains(&field.as_str()) {
            return None;
        }
        conditions.push(format!("{field} = ?"));
        values.push(SqlValue::Text(value.clone()));
    }
    Some((format!(" WHERE {}", conditions.join(" AND ")), values))
}

impl<E: SqlRecord> EntityRepository<E> for SqlitePortalRepository {
    fn insert(&self, record: E) -> Result<E, RepositoryError> {
        let mut values = vec![id(record.id())];
        values.extend(record.values());
        values.push(timestamp(record.created_at()));
        values.push(timestamp(record.updated_at()));

        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({placeholders})",
            E::KIND.label(),
            select_list::<E>()
        );

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_error)?;
        ensure_references(&record, |kind, id| row_exists(&tx, kind, id))?;
        tx.execute(&sql, params_from_iter(values))
            .map_err(storage_error)?;
        tx.commit().map_err(storage_error)?;
        Ok(record)
    }

    fn update(&self, record: E) -> Result<E, RepositoryError> {
        let assignments = E::COLUMNS
            .iter()
            .map(|column| format!("{column} = ?"))
            .chain(std::iter::once("updated_at = ?".to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE \"{}\" SET {assignments} WHERE id = ?",
            E::KIND.label()
        );

        let mut values = record.values();
        values.push(timestamp(record.updated_at()));
        values.push(id(record.id()));

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_error)?;
        ensure_references(&record, |kind, id| row_exists(&tx, kind, id))?;
        let changed = tx
            .execute(&sql, params_from_iter(values))
            .map_err(storage_error)?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        tx.commit().map_err(storage_error)?;
        Ok(record)
    }

    fn fetch(&self, record_id: &RecordId) -> Result<Option<E>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM \"{}\" WHERE id = ?1",
            select_list::<E>(),
            E::KIND.label()
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(storage_error)?;
        let mut rows = stmt
            .query_map([record_id.to_string()], |row| E::from_row(row))
            .map_err(storage_error)?;
        let record = rows.next().transpose().map_err(storage_error)?;
        Ok(record)
    }

    fn list(&self, query: &ListQuery) -> Result<Page<E>, RepositoryError> {
        let Some((filter, mut values)) = where_clause::<E>(query) else {
            return Ok(Page::from_matches(Vec::new(), query));
        };
        let total = <Self as EntityRepository<E>>::count(self, query)?;

        let sql = format!(
            "SELECT {} FROM \"{}\"{filter} ORDER BY created_at, id LIMIT ? OFFSET ?",
            select_list::<E>(),
            E::KIND.label()
        );
        values.push(SqlValue::Integer(to_sql_count(query.limit)));
        values.push(SqlValue::Integer(to_sql_count(query.offset)));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(storage_error)?;
        let items = stmt
            .query_map(params_from_iter(values), |row| E::from_row(row))
            .map_err(storage_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_error)?;

        Ok(Page {
            items,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    fn count(&self, query: &ListQuery) -> Result<usize, RepositoryError> {
        let Some((filter, values)) = where_clause::<E>(query) else {
            return Ok(0);
        };
        let sql = format!("SELECT COUNT(*) FROM \"{}\"{filter}", E::KIND.label());
        let count: i64 = self
            .lock()?
            .query_row(&sql, params_from_iter(values), |row| row.get(0))
            .map_err(storage_error)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn delete(&self, record_id: &RecordId) -> Result<bool, RepositoryError> {
        let sql = format!("DELETE FROM \"{}\" WHERE id = ?1", E::KIND.label());
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_error)?;
        if !row_exists(&tx, E::KIND, record_id)? {
            return Ok(false);
        }
        ensure_unreferenced::<E, _>(record_id, |kind, field, value| {
            count_children(&tx, kind, field, value)
        })?;
        let changed = tx
            .execute(&sql, [record_id.to_string()])
            .map_err(storage_error)?;
        tx.commit().map_err(storage_error)?;
        Ok(changed > 0)
    }
}

fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl SqlRecord for User {
    const COLUMNS: &'static [&'static str] =
        &["email", "first_name", "last_name", "roq_user_id", "tenant_id"];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.email.clone()),
            text(&self.first_name),
            text(&self.last_name),
            SqlValue::Text(self.roq_user_id.clone()),
            SqlValue::Text(self.tenant_id.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: id_column(row, "id")?,
            email: row.get("email")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            roq_user_id: row.get("roq_user_id")?,
            tenant_id: row.get("tenant_id")?,
            created_at: timestamp_column(row, "created_at")?,
            updated_at: timestamp_column(row, "updated_at")?,
        })
    }
}

impl SqlRecord for JobSeeker {
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "resume",
        "skills",
        "experience_years",
        "education_level",
        "preferred_job_type",
        "preferred_location",
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            id(self.user_id),
            text(&self.resume),
            text(&self.skills),
            integer(self.experience_years),
            text(&self.education_level),
            text(&self.preferred_job_type),
            text(&self.preferred_location),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: id_column(row, "id")?,
            user_id: id_column(row, "user_id")?,
            resume: row.get("resume")?,
            skills: row.get("skills")?,
            experience_years: row.get("experience_years")?,
            education_level: row.get("education_level")?,
            preferred_job_type: row.get("preferred_job_type")?,
            preferred_location: row.get("preferred_location")?,
            created_at: timestamp_column(row, "created_at")?,
            updated_at: timestamp_column(row, "updated_at")?,
        })
    }
}

impl SqlRecord for Recruiter {
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "organization_id",
        "job_posted",
        "job_filled",
        "active_jobs",
        "inactive_jobs",
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            id(self.user_id),
            id(self.organization_id),
            integer(self.job_posted),
            integer(self.job_filled),
            integer(self.active_jobs),
            integer(self.inactive_jobs),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: id_column(row, "id")?,
            user_id: id_column(row, "user_id")?,
            organization_id: id_column(row, "organization_id")?,
            job_posted: row.get("job_posted")?,
            job_filled: row.get("job_filled")?,
            active_jobs: row.get("active_jobs")?,
            inactive_jobs: row.get("inactive_jobs")?,
            created_at: timestamp_column(row, "created_at")?,
            updated_at: timestamp_column(row, "updated_at")?,
        })
    }
}

impl SqlRecord for Organization {
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "description",
        "address",
        "city",
        "state",
        "country",
        "postal_code",
        "user_id",
        "tenant_id",
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.name.clone()),
            text(&self.description),
            text(&self.address),
            text(&self.city),
            text(&self.state),
            text(&self.country),
            text(&self.postal_code),
            id(self.user_id),
            SqlValue::Text(self.tenant_id.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: id_column(row, "id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            address: row.get("address")?,
            city: row.get("city")?,
            state: row.get("state")?,
            country: row.get("country")?,
            postal_code: row.get("postal_code")?,
            user_id: id_column(row, "user_id")?,
            tenant_id: row.get("tenant_id")?,
            created_at: timestamp_column(row, "created_at")?,
            updated_at: timestamp_column(row, "updated_at")?,
        })
    }
}

impl SqlRecord for Job {
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "description",
        "recruiter_id",
        "location",
        "salary",
        "job_type",
        "posted_date",
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.title.clone()),
            text(&self.description),
            id(self.recruiter_id),
            text(&self.location),
            integer(self.salary),
            text(&self.job_type),
            date(self.posted_date),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: id_column(row, "id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            recruiter_id: id_column(row, "recruiter_id")?,
            location: row.get("location")?,
            salary: row.get("salary")?,
            job_type: row.get("job_type")?,
            posted_date: date_column(row, "posted_date")?,
            created_at: timestamp_column(row, "created_at")?,
            updated_at: timestamp_column(row, "updated_at")?,
        })
    }
}

impl SqlRecord for Application {
    const COLUMNS: &'static [&'static str] = &[
        "job_seeker_id",
        "job_id",
        "application_date",
        "status",
        "resume",
        "cover_letter",
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            id(self.job_seeker_id),
            id(self.job_id),
            date(self.application_date),
            text(&self.status),
            text(&self.resume),
            text(&self.cover_letter),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: id_column(row, "id")?,
            job_seeker_id: id_column(row, "job_seeker_id")?,
            job_id: id_column(row, "job_id")?,
            application_date: date_column(row, "application_date")?,
            status: row.get("status")?,
            resume: row.get("resume")?,
            cover_letter: row.get("cover_letter")?,
            created_at: timestamp_column(row, "created_at")?,
            updated_at: timestamp_column(row, "updated_at")?,
        })
    }
}
