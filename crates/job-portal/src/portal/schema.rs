//! Declarative validation schemas, one per entity.
//!
//! A schema checks a raw JSON payload field by field, collects every failure, and hands back a
//! normalized map holding only the declared fields so it can be decoded into the entity draft.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::domain::EntityKind;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Integer,
    Date,
    Reference(EntityKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }

    /// `Ok(None)` means the field was absent and optional.
    fn check(&self, value: Option<&Value>) -> Result<Option<Value>, String> {
        let value = match value {
            None => return self.missing().map(|_| None),
            Some(Value::Null) => return self.missing().map(|_| Some(Value::Null)),
            Some(Value::String(text)) if text.is_empty() => {
                if self.required {
                    return Err(self.required_message());
                }
                // Cleared inputs arrive as "", which only means something for text fields.
                if !matches!(self.kind, FieldKind::Text) {
                    return Ok(Some(Value::Null));
                }
                return Ok(Some(Value::String(String::new())));
            }
            Some(value) => value,
        };

        let normalized = match self.kind {
            FieldKind::Text => match value {
                Value::String(_) => value.clone(),
                _ => return Err(format!("{} must be a string", self.name)),
            },
            FieldKind::Email => match value {
                Value::String(text) if looks_like_email(text) => Value::String(text.clone()),
                _ => return Err(format!("{} must be a valid email", self.name)),
            },
            FieldKind::Integer => Value::from(self.integer(value)?),
            FieldKind::Date => match value {
                Value::String(text) => match parse_date(text) {
                    Some(date) => Value::String(date.format(DATE_FORMAT).to_string()),
                    None => return Err(format!("{} must be a valid date", self.name)),
                },
                _ => return Err(format!("{} must be a valid date", self.name)),
            },
            FieldKind::Reference(_) => match value {
                Value::String(text) => match Uuid::parse_str(text.trim()) {
                    Ok(id) => Value::String(id.hyphenated().to_string()),
                    Err(_) => return Err(format!("{} must be a valid identifier", self.name)),
                },
                _ => return Err(format!("{} must be a valid identifier", self.name)),
            },
        };

        Ok(Some(normalized))
    }

    fn missing(&self) -> Result<(), String> {
        if self.required {
            Err(self.required_message())
        } else {
            Ok(())
        }
    }

    fn required_message(&self) -> String {
        format!("{} is a required field", self.name)
    }

    fn integer(&self, value: &Value) -> Result<i64, String> {
        let not_integer = || format!("{} must be an integer", self.name);
        match value {
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    return Ok(int);
                }
                match number.as_f64() {
                    Some(float)
                        if float.fract() == 0.0
                            && float >= i64::MIN as f64
                            && float <= i64::MAX as f64 =>
                    {
                        Ok(float as i64)
                    }
                    _ => Err(not_integer()),
                }
            }
            Value::String(text) => {
                let text = text.trim();
                if let Ok(int) = text.parse::<i64>() {
                    Ok(int)
                } else if text.parse::<f64>().is_ok() {
                    Err(not_integer())
                } else {
                    Err(format!("{} must be a number", self.name))
                }
            }
            _ => Err(format!("{} must be a number", self.name)),
        }
    }
}

fn looks_like_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok().or_else(|| {
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|stamp| stamp.with_timezone(&Utc).date_naive())
    })
}

/// Field constraints for one entity.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub entity: EntityKind,
    pub fields: &'static [FieldRule],
}

impl Schema {
    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|rule| rule.name == field)
    }

    pub fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|rule| rule.name == field)
    }

    /// Validate a payload, returning the normalized declared fields or every field error found.
    /// Undeclared keys such as `id`, timestamps, or expanded relations are dropped.
    pub fn validate(&self, payload: &Map<String, Value>) -> Result<Map<String, Value>, ValidationErrors> {
        let mut normalized = Map::new();
        let mut errors = ValidationErrors::new(self.entity);

        for rule in self.fields {
            match rule.check(payload.get(rule.name)) {
                Ok(Some(value)) => {
                    normalized.insert(rule.name.to_string(), value);
                }
                Ok(None) => {}
                Err(message) => errors.push(rule.name, message),
            }
        }

        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(errors)
        }
    }
}

/// Field-keyed validation failures, one message per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("invalid {entity} payload: {}", summarize(.fields))]
pub struct ValidationErrors {
    pub entity: EntityKind,
    pub fields: BTreeMap<String, String>,
}

fn summarize(fields: &BTreeMap<String, String>) -> String {
    fields.values().cloned().collect::<Vec<_>>().join("; ")
}

impl ValidationErrors {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            fields: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, field: &str, message: String) {
        self.fields.entry(field.to_string()).or_insert(message);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

use FieldKind::{Date, Email, Integer, Reference, Text};

pub static USER_SCHEMA: Schema = Schema {
    entity: EntityKind::User,
    fields: &[
        FieldRule::required("email", Email),
        FieldRule::optional("first_name", Text),
        FieldRule::optional("last_name", Text),
        FieldRule::required("roq_user_id", Text),
        FieldRule::required("tenant_id", Text),
    ],
};

pub static JOB_SEEKER_SCHEMA: Schema = Schema {
    entity: EntityKind::JobSeeker,
    fields: &[
        FieldRule::optional("resume", Text),
        FieldRule::optional("skills", Text),
        FieldRule::optional("experience_years", Integer),
        FieldRule::optional("education_level", Text),
        FieldRule::optional("preferred_job_type", Text),
        FieldRule::optional("preferred_location", Text),
        FieldRule::required("user_id", Reference(EntityKind::User)),
    ],
};

pub static RECRUITER_SCHEMA: Schema = Schema {
    entity: EntityKind::Recruiter,
    fields: &[
        FieldRule::optional("job_posted", Integer),
        FieldRule::optional("job_filled", Integer),
        FieldRule::optional("active_jobs", Integer),
        FieldRule::optional("inactive_jobs", Integer),
        FieldRule::required("user_id", Reference(EntityKind::User)),
        FieldRule::required("organization_id", Reference(EntityKind::Organization)),
    ],
};

pub static ORGANIZATION_SCHEMA: Schema = Schema {
    entity: EntityKind::Organization,
    fields: &[
        FieldRule::required("name", Text),
        FieldRule::optional("description", Text),
        FieldRule::optional("address", Text),
        FieldRule::optional("city", Text),
        FieldRule::optional("state", Text),
        FieldRule::optional("country", Text),
        FieldRule::optional("postal_code", Text),
        FieldRule::required("user_id", Reference(EntityKind::User)),
        FieldRule::required("tenant_id", Text),
    ],
};

pub static JOB_SCHEMA: Schema = Schema {
    entity: EntityKind::Job,
    fields: &[
        FieldRule::required("title", Text),
        FieldRule::optional("description", Text),
        FieldRule::optional("location", Text),
        FieldRule::optional("salary", Integer),
        FieldRule::optional("job_type", Text),
        FieldRule::optional("posted_date", Date),
        FieldRule::required("recruiter_id", Reference(EntityKind::Recruiter)),
    ],
};

pub static APPLICATION_SCHEMA: Schema = Schema {
    entity: EntityKind::Application,
    fields: &[
        FieldRule::optional("application_date", Date),
        FieldRule::optional("status", Text),
        FieldRule::optional("resume", Text),
        FieldRule::optional("cover_letter", Text),
        FieldRule::required("job_seeker_id", Reference(EntityKind::JobSeeker)),
        FieldRule::required("job_id", Reference(EntityKind::Job)),
    ],
};

pub fn schema_for(kind: EntityKind) -> &'static Schema {
    match kind {
        EntityKind::User => &USER_SCHEMA,
        EntityKind::JobSeeker => &JOB_SEEKER_SCHEMA,
        EntityKind::Recruiter => &RECRUITER_SCHEMA,
        EntityKind::Organization => &ORGANIZATION_SCHEMA,
        EntityKind::Job => &JOB_SCHEMA,
        EntityKind::Application => &APPLICATION_SCHEMA,
    }
}
