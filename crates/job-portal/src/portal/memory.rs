use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Application, EntityKind, Job, JobSeeker, Organization, RecordId, Recruiter, User,
};
use super::entity::Entity;
use super::query::{ListQuery, Page};
use super::repository::{
    ensure_references, ensure_unreferenced, EntityRepository, RepositoryError,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<RecordId, User>,
    job_seekers: BTreeMap<RecordId, JobSeeker>,
    recruiters: BTreeMap<RecordId, Recruiter>,
    organizations: BTreeMap<RecordId, Organization>,
    jobs: BTreeMap<RecordId, Job>,
    applications: BTreeMap<RecordId, Application>,
}

impl Tables {
    fn contains(&self, kind: EntityKind, id: &RecordId) -> bool {
        match kind {
            EntityKind::User => self.users.contains_key(id),
            EntityKind::JobSeeker => self.job_seekers.contains_key(id),
            EntityKind::Recruiter => self.recruiters.contains_key(id),
            EntityKind::Organization => self.organizations.contains_key(id),
            EntityKind::Job => self.jobs.contains_key(id),
            EntityKind::Application => self.applications.contains_key(id),
        }
    }

    fn count_where(&self, kind: EntityKind, field: &str, value: &str) -> usize {
        let query = ListQuery::default().filter(field, value);
        match kind {
            EntityKind::User => matching(&self.users, &query).len(),
            EntityKind::JobSeeker => matching(&self.job_seekers, &query).len(),
            EntityKind::Recruiter => matching(&self.recruiters, &query).len(),
            EntityKind::Organization => matching(&self.organizations, &query).len(),
            EntityKind::Job => matching(&self.jobs, &query).len(),
            EntityKind::Application => matching(&self.applications, &query).len(),
        }
    }

    fn ensure_references<E: Entity>(&self, record: &E) -> Result<(), RepositoryError> {
        ensure_references(record, |kind, id| Ok(self.contains(kind, id)))
    }

    fn ensure_unreferenced<E: Entity>(&self, id: &RecordId) -> Result<(), RepositoryError> {
        ensure_unreferenced::<E, _>(id, |kind, field, value| {
            Ok(self.count_where(kind, field, value))
        })
    }
}

/// Process-local store. Clones share the same tables.
#[derive(Default, Clone)]
pub struct InMemoryPortalRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryPortalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

fn ensure_unique<E: Entity>(
    table: &BTreeMap<RecordId, E>,
    record: &E,
) -> Result<(), RepositoryError> {
    for (field, value) in record.unique_keys() {
        let clash = table.values().any(|other| {
            other.id() != record.id()
                && other
                    .unique_keys()
                    .iter()
                    .any(|(other_field, other_value)| *other_field == field && *other_value == value)
        });
        if clash {
            return Err(RepositoryError::Conflict(format!(
                "{} with {field} '{value}' already exists",
                E::KIND
            )));
        }
    }
    Ok(())
}

fn insert_record<E: Entity>(
    table: &mut BTreeMap<RecordId, E>,
    record: E,
) -> Result<E, RepositoryError> {
    if table.contains_key(&record.id()) {
        return Err(RepositoryError::Conflict(format!(
            "{} {} already exists",
            E::KIND,
            record.id()
        )));
    }
    ensure_unique(table, &record)?;
    table.insert(record.id(), record.clone());
    Ok(record)
}

fn update_record<E: Entity>(
    table: &mut BTreeMap<RecordId, E>,
    record: E,
) -> Result<E, RepositoryError> {
    if !table.contains_key(&record.id()) {
        return Err(RepositoryError::NotFound);
    }
    ensure_unique(table, &record)?;
    table.insert(record.id(), record.clone());
    Ok(record)
}

fn matching<E: Entity>(table: &BTreeMap<RecordId, E>, query: &ListQuery) -> Vec<E> {
    let mut matches: Vec<E> = table
        .values()
        .filter(|record| {
            query.filters.iter().all(|(field, value)| {
                match record.field_text(field) {
                    Some(text) if E::CASE_INSENSITIVE.contains(&field.as_str()) => {
                        text.eq_ignore_ascii_case(value)
                    }
                    Some(text) => text == *value,
                    None => false,
                }
            })
        })
        .cloned()
        .collect();
    matches.sort_by_key(|record| (record.created_at(), record.id()));
    matches
}

macro_rules! memory_table {
    ($entity:ty, $table:ident) => {
        impl EntityRepository<$entity> for InMemoryPortalRepository {
            fn insert(&self, record: $entity) -> Result<$entity, RepositoryError> {
                let mut tables = self.lock()?;
                tables.ensure_references(&record)?;
                insert_record(&mut tables.$table, record)
            }

            fn update(&self, record: $entity) -> Result<$entity, RepositoryError> {
                let mut tables = self.lock()?;
                tables.ensure_references(&record)?;
                update_record(&mut tables.$table, record)
            }

            fn fetch(&self, id: &RecordId) -> Result<Option<$entity>, RepositoryError> {
                Ok(self.lock()?.$table.get(id).cloned())
            }

            fn list(&self, query: &ListQuery) -> Result<Page<$entity>, RepositoryError> {
                let matches = matching(&self.lock()?.$table, query);
                Ok(Page::from_matches(matches, query))
            }

            fn count(&self, query: &ListQuery) -> Result<usize, RepositoryError> {
                Ok(matching(&self.lock()?.$table, query).len())
            }

            fn delete(&self, id: &RecordId) -> Result<bool, RepositoryError> {
                let mut tables = self.lock()?;
                if !tables.$table.contains_key(id) {
                    return Ok(false);
                }
                tables.ensure_unreferenced::<$entity>(id)?;
                Ok(tables.$table.remove(id).is_some())
            }
        }
    };
}

memory_table!(User, users);
memory_table!(JobSeeker, job_seekers);
memory_table!(Recruiter, recruiters);
memory_table!(Organization, organizations);
memory_table!(Job, jobs);
memory_table!(Application, applications);
