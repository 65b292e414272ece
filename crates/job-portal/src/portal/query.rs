use std::collections::BTreeMap;

use serde::Serialize;

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Equality filters plus a limit/offset window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filters: BTreeMap<String, String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: BTreeMap::new(),
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl ListQuery {
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn window(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Build a query from raw URL parameters. `limit` and `offset` control the window, `expand`
    /// is ignored, and every other parameter becomes an equality filter.
    pub fn from_params(
        params: BTreeMap<String, String>,
        default_limit: usize,
    ) -> Result<Self, QueryError> {
        let mut query = Self {
            limit: default_limit.clamp(1, MAX_PAGE_LIMIT),
            ..Self::default()
        };

        for (key, value) in params {
            match key.as_str() {
                "limit" => {
                    let limit = parse_count(&key, &value)?;
                    if limit == 0 {
                        return Err(QueryError::InvalidWindow {
                            param: key,
                            value,
                        });
                    }
                    query.limit = limit.min(MAX_PAGE_LIMIT);
                }
                "offset" => query.offset = parse_count(&key, &value)?,
                "expand" => {}
                _ => {
                    query.filters.insert(key, value);
                }
            }
        }

        Ok(query)
    }

    /// Reject filters on fields outside `allowed`.
    pub fn ensure_filterable(&self, allowed: &[&str]) -> Result<(), QueryError> {
        match self
            .filters
            .keys()
            .find(|field| !allowed.contains(&field.as_str()))
        {
            Some(field) => Err(QueryError::UnknownFilter(field.clone())),
            None => Ok(()),
        }
    }
}

fn parse_count(param: &str, value: &str) -> Result<usize, QueryError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| QueryError::InvalidWindow {
            param: param.to_string(),
            value: value.to_string(),
        })
}

/// One window of a listing together with the unwindowed total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    pub fn from_matches(matches: Vec<T>, query: &ListQuery) -> Self {
        let total = matches.len();
        let items = matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();
        Self {
            items,
            total,
            limit: query.limit,
            offset: query.offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("unknown filter field '{0}'")]
    UnknownFilter(String),
    #[error("{param} must be a non-negative integer, got '{value}'")]
    InvalidWindow { param: String, value: String },
    #[error("unknown relation '{0}'")]
    UnknownRelation(String),
}
