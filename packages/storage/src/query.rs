// ABOUTME: Query model for document store listings
// ABOUTME: Equality, substring and null filters with ordering and pagination

use serde_json::Value;
use std::cmp::Ordering;

use crate::document::Document;
use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value; `Null` also matches a missing field
    Equal(String, Value),
    /// Case-insensitive substring match on a string field
    Contains(String, String),
    IsNull(String),
}

impl Filter {
    pub fn field(&self) -> &str {
        match self {
            Filter::Equal(field, _) | Filter::Contains(field, _) | Filter::IsNull(field) => field,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Equal(field, Value::Null) | Filter::IsNull(field) => {
                matches!(doc.field(field), None | Some(Value::Null))
            }
            Filter::Equal(field, expected) => doc.field(field).as_ref() == Some(expected),
            Filter::Contains(field, needle) => match doc.field(field) {
                Some(Value::String(s)) => s.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Equal(field.to_string(), value.into()));
        self
    }

    pub fn contains(mut self, field: &str, needle: &str) -> Self {
        self.filters
            .push(Filter::Contains(field.to_string(), needle.to_string()));
        self
    }

    pub fn is_null(mut self, field: &str) -> Self {
        self.filters.push(Filter::IsNull(field.to_string()));
        self
    }

    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.order = Some((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Field names are spliced into JSON paths, so only plain identifiers are allowed
    pub fn validate(&self) -> StorageResult<()> {
        let fields = self
            .filters
            .iter()
            .map(Filter::field)
            .chain(self.order.iter().map(|(field, _)| field.as_str()));

        for field in fields {
            let valid = !field.is_empty()
                && field
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(StorageError::InvalidQuery(format!(
                    "Invalid field name: {}",
                    field
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|filter| filter.matches(doc))
    }

    /// Filter, order and paginate an in-memory candidate list.
    /// Candidates are expected in insertion order, which breaks ordering ties.
    pub fn apply(&self, candidates: Vec<Document>) -> Vec<Document> {
        let mut docs: Vec<Document> = candidates
            .into_iter()
            .filter(|doc| self.matches(doc))
            .collect();

        if let Some((field, order)) = &self.order {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.field(field).as_ref(), b.field(field).as_ref());
                match order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }

        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        docs.into_iter().skip(offset).take(limit).collect()
    }
}

/// Nulls first, then numbers, then strings; other shapes compare equal
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
