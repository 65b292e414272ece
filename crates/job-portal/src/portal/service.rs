use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::access::{AccessDenied, AccessPolicy, Actor, Operation, Role};
use super::domain::{EntityKind, RecordId};
use super::entity::Entity;
use super::query::{ListQuery, Page, QueryError, DEFAULT_PAGE_LIMIT};
use super::repository::{EntityRepository, PortalRepository, RepositoryError};
use super::schema::ValidationErrors;

/// Knobs the service needs from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalSettings {
    /// Role assumed when a request does not name one.
    pub default_role: Role,
    pub page_limit: usize,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            default_role: Role::HrManager,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// A record with optionally expanded parent relations and child counts.
#[derive(Debug, Clone, Serialize)]
pub struct RecordView<E> {
    #[serde(flatten)]
    pub record: E,
    #[serde(flatten)]
    pub relations: BTreeMap<String, Value>,
    #[serde(rename = "_count", skip_serializing_if = "BTreeMap::is_empty")]
    pub counts: BTreeMap<String, usize>,
}

/// Create, edit, load, list, and delete flows shared by every entity.
pub struct PortalService<R> {
    repository: Arc<R>,
    policy: AccessPolicy,
    settings: PortalSettings,
}

/// Lift the store's integrity refusals into the service vocabulary.
fn integrity_error(entity: EntityKind, id: RecordId, err: RepositoryError) -> PortalServiceError {
    match err {
        RepositoryError::MissingReferences(fields) => {
            PortalServiceError::UnknownReference { entity, fields }
        }
        RepositoryError::StillReferenced(dependents) => PortalServiceError::StillReferenced {
            entity,
            id,
            dependents,
        },
        other => PortalServiceError::Repository(other),
    }
}

/// Timestamps are kept at microsecond precision so every store returns them unchanged.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

impl<R> PortalService<R>
where
    R: PortalRepository + 'static,
{
    pub fn new(repository: Arc<R>, settings: PortalSettings) -> Self {
        Self {
            repository,
            policy: AccessPolicy,
            settings,
        }
    }

    pub fn settings(&self) -> &PortalSettings {
        &self.settings
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Resolve the acting role, falling back to the configured default.
    pub fn actor(&self, role: Option<Role>) -> Actor {
        Actor::new(role.unwrap_or(self.settings.default_role))
    }

    fn authorize(
        &self,
        actor: &Actor,
        entity: EntityKind,
        operation: Operation,
    ) -> Result<(), PortalServiceError> {
        self.policy
            .authorize(actor, entity, operation)
            .map_err(|denied| {
                warn!(
                    role = %actor.role,
                    %entity,
                    operation = operation.label(),
                    "operation denied"
                );
                PortalServiceError::Forbidden(denied)
            })
    }

    fn decode<E: Entity>(normalized: Map<String, Value>) -> Result<E::Draft, PortalServiceError> {
        serde_json::from_value(Value::Object(normalized)).map_err(|source| {
            PortalServiceError::Decode {
                entity: E::KIND,
                source,
            }
        })
    }

    fn load<E>(&self, id: &RecordId) -> Result<E, PortalServiceError>
    where
        E: Entity,
        R: EntityRepository<E>,
    {
        EntityRepository::<E>::fetch(self.repository.as_ref(), id)?.ok_or(
            PortalServiceError::NotFound {
                entity: E::KIND,
                id: *id,
            },
        )
    }

    /// Validate a payload, check its references, and store a new record.
    pub fn create<E>(&self, actor: &Actor, payload: Map<String, Value>) -> Result<E, PortalServiceError>
    where
        E: Entity,
        R: EntityRepository<E>,
    {
        self.authorize(actor, E::KIND, Operation::Create)?;
        let normalized = E::schema().validate(&payload)?;
        let draft = Self::decode::<E>(normalized)?;

        let id = RecordId::new();
        let record = E::from_draft(id, draft, now());
        let stored = EntityRepository::<E>::insert(self.repository.as_ref(), record)
            .map_err(|err| integrity_error(E::KIND, id, err))?;

        info!(entity = %E::KIND, id = %stored.id(), "record created");
        Ok(stored)
    }

    /// Overlay a full or partial payload on the stored record and re-validate the result.
    pub fn update<E>(
        &self,
        actor: &Actor,
        id: &RecordId,
        payload: Map<String, Value>,
    ) -> Result<E, PortalServiceError>
    where
        E: Entity,
        R: EntityRepository<E>,
    {
        self.authorize(actor, E::KIND, Operation::Update)?;
        let mut record: E = self.load(id)?;

        let mut merged = match serde_json::to_value(record.draft()) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(source) => {
                return Err(PortalServiceError::Decode {
                    entity: E::KIND,
                    source,
                })
            }
        };
        let schema = E::schema();
        for (key, value) in payload {
            if schema.declares(&key) {
                merged.insert(key, value);
            }
        }

        let normalized = schema.validate(&merged)?;
        let draft = Self::decode::<E>(normalized)?;
        record.apply(draft, now());
        let stored = EntityRepository::<E>::update(self.repository.as_ref(), record)
            .map_err(|err| integrity_error(E::KIND, *id, err))?;

        info!(entity = %E::KIND, id = %stored.id(), "record updated");
        Ok(stored)
    }

    pub fn get<E>(&self, actor: &Actor, id: &RecordId) -> Result<E, PortalServiceError>
    where
        E: Entity,
        R: EntityRepository<E>,
    {
        self.authorize(actor, E::KIND, Operation::Read)?;
        self.load(id)
    }

    /// Load a record with the named parent relations expanded and the child counts the
    /// actor may read.
    pub fn view<E>(
        &self,
        actor: &Actor,
        id: &RecordId,
        expand: &[String],
    ) -> Result<RecordView<E>, PortalServiceError>
    where
        E: Entity,
        R: EntityRepository<E>,
    {
        let record: E = self.get(actor, id)?;
        let references = record.references();

        let mut relations = BTreeMap::new();
        for name in expand {
            let reference = references
                .iter()
                .find(|reference| reference.relation() == name.as_str())
                .ok_or_else(|| QueryError::UnknownRelation(name.clone()))?;
            self.authorize(actor, reference.kind, Operation::Read)?;
            let related = self
                .repository
                .fetch_value(reference.kind, &reference.id)?
                .unwrap_or(Value::Null);
            relations.insert(name.clone(), related);
        }

        let mut counts = BTreeMap::new();
        for child in E::CHILDREN {
            if !self.policy.allows(actor.role, child.kind, Operation::Read) {
                continue;
            }
            let count = self
                .repository
                .count_where(child.kind, child.field, &id.to_string())?;
            counts.insert(child.kind.label().to_string(), count);
        }

        Ok(RecordView {
            record,
            relations,
            counts,
        })
    }

    pub fn list<E>(&self, actor: &Actor, query: &ListQuery) -> Result<Page<E>, PortalServiceError>
    where
        E: Entity,
        R: EntityRepository<E>,
    {
        self.authorize(actor, E::KIND, Operation::Read)?;
        query.ensure_filterable(E::FILTERABLE)?;
        Ok(EntityRepository::<E>::list(self.repository.as_ref(), query)?)
    }

    /// Delete a record that nothing references any more, returning it.
    pub fn delete<E>(&self, actor: &Actor, id: &RecordId) -> Result<E, PortalServiceError>
    where
        E: Entity,
        R: EntityRepository<E>,
    {
        self.authorize(actor, E::KIND, Operation::Delete)?;
        let record: E = self.load(id)?;

        let removed = EntityRepository::<E>::delete(self.repository.as_ref(), id)
            .map_err(|err| integrity_error(E::KIND, *id, err))?;
        if !removed {
            return Err(PortalServiceError::NotFound {
                entity: E::KIND,
                id: *id,
            });
        }

        info!(entity = %E::KIND, %id, "record deleted");
        Ok(record)
    }
}

/// Error raised by the portal service.
#[derive(Debug, thiserror::Error)]
pub enum PortalServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Forbidden(#[from] AccessDenied),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: RecordId },
    #[error("{entity} references records that do not exist: {}", .fields.join(", "))]
    UnknownReference {
        entity: EntityKind,
        fields: Vec<&'static str>,
    },
    #[error("{entity} {id} is still referenced by {}", .dependents.join(", "))]
    StillReferenced {
        entity: EntityKind,
        id: RecordId,
        dependents: Vec<String>,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("unable to decode {entity} payload: {source}")]
    Decode {
        entity: EntityKind,
        source: serde_json::Error,
    },
}
