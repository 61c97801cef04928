//! Structured queries consumed by storers.
//!
//! A [`Query`] bundles a [`Predicate`], a sort order, an optional [`Window`] and a
//! [`Projection`]. Parsing query strings is left to transports; this module only
//! holds the structured form plus in-memory evaluation helpers.

pub mod projection;

pub use projection::{Projection, ProjectionField, ProjectionSource};

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A single filter expression over a top-level payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Equal { field: String, value: Value },
    NotEqual { field: String, value: Value },
    In { field: String, values: Vec<Value> },
}

impl Expression {
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        match self {
            Self::Equal { field, value } => payload.get(field) == Some(value),
            Self::NotEqual { field, value } => payload.get(field) != Some(value),
            Self::In { field, values } => payload.get(field).is_some_and(|v| values.contains(v)),
        }
    }
}

/// Conjunction of expressions. An empty predicate matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate(pub Vec<Expression>);

impl Predicate {
    pub fn equal(field: impl Into<String>, value: Value) -> Self {
        Self(vec![Expression::Equal {
            field: field.into(),
            value,
        }])
    }

    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self(vec![Expression::In {
            field: field.into(),
            values,
        }])
    }

    /// Build equality expressions from a `{"field": value}` object.
    pub fn from_equalities(filter: &Map<String, Value>) -> Self {
        Self(
            filter
                .iter()
                .map(|(field, value)| Expression::Equal {
                    field: field.clone(),
                    value: value.clone(),
                })
                .collect(),
        )
    }

    pub fn and(mut self, other: Predicate) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        self.0.iter().all(|e| e.matches(payload))
    }
}

/// Sort key; `reversed` sorts descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub name: String,
    pub reversed: bool,
}

impl SortField {
    /// Parse a comma separated sort expression such as `name,-age`.
    pub fn parse_list(expr: &str) -> Vec<SortField> {
        expr.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('-') {
                Some(name) => SortField {
                    name: name.to_string(),
                    reversed: true,
                },
                None => SortField {
                    name: s.to_string(),
                    reversed: false,
                },
            })
            .collect()
    }
}

/// Offset/limit pagination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    /// Maximum number of items, `None` for no limit
    pub limit: Option<usize>,
}

impl Window {
    pub fn new(offset: usize, limit: Option<usize>) -> Self {
        Self { offset, limit }
    }

    /// Window for a 1-based page of `per_page` items.
    pub fn page(page: usize, per_page: usize) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(per_page),
            limit: Some(per_page),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub predicate: Predicate,
    pub sort: Vec<SortField>,
    pub window: Option<Window>,
    pub projection: Projection,
}

impl Query {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            ..Self::default()
        }
    }

    /// Query matching a single id.
    pub fn by_id(id: &Value) -> Self {
        Self::new(Predicate::equal("id", id.clone())).with_window(Window::new(0, Some(1)))
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortField>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Same predicate without sort, window or projection, as used for counting.
    pub fn predicate_only(&self) -> Self {
        Self::new(self.predicate.clone())
    }

    /// Compare two payloads by this query's sort keys.
    pub fn compare(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        for key in &self.sort {
            let ordering = compare_values(a.get(&key.name), b.get(&key.name));
            let ordering = if key.reversed {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Total order over JSON values: missing < null < bool < number < string < other.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
