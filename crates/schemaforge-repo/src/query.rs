//! Search queries and aggregation pipelines over stored documents.
//!
//! Field names are document field names (`_id`, not `id`); dotted paths reach
//! into embedded sub-documents.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Filter expression on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpr {
    /// Field equals value.
    Eq { field: String, value: Value },
    /// Field not equals value.
    Ne { field: String, value: Value },
    /// Field is in a set of values.
    In { field: String, values: Vec<Value> },
    /// Field greater than value.
    Gt { field: String, value: Value },
    /// Field less than value.
    Lt { field: String, value: Value },
    /// Array field contains value, or string field contains substring.
    Contains { field: String, value: Value },
}

impl FilterExpr {
    /// Field equals value.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field not equals value.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field is one of `values`.
    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        FilterExpr::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Field greater than value.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field less than value.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field contains value.
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate against a document. Missing fields only match `Ne`.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            FilterExpr::Eq { field, value } => field_value(document, field) == Some(value),
            FilterExpr::Ne { field, value } => field_value(document, field) != Some(value),
            FilterExpr::In { field, values } => {
                field_value(document, field).is_some_and(|v| values.contains(v))
            }
            FilterExpr::Gt { field, value } => field_value(document, field)
                .and_then(|v| compare_values(v, value))
                .is_some_and(Ordering::is_gt),
            FilterExpr::Lt { field, value } => field_value(document, field)
                .and_then(|v| compare_values(v, value))
                .is_some_and(Ordering::is_lt),
            FilterExpr::Contains { field, value } => match field_value(document, field) {
                Some(Value::Array(items)) => items.contains(value),
                Some(Value::String(text)) => value.as_str().is_some_and(|s| text.contains(s)),
                _ => false,
            },
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Order specification for sorting results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Field to order by.
    pub field: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// A conjunction of filters with optional ordering and paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// All filters must match.
    pub filters: Vec<FilterExpr>,
    /// Sort order.
    pub order: Option<OrderSpec>,
    /// Number of results to skip.
    pub offset: usize,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// Match every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter.
    pub fn filter(mut self, filter: FilterExpr) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sort the results.
    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.order = Some(order);
        self
    }

    /// Skip results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Limit results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether a document passes every filter.
    pub fn matches(&self, document: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(document))
    }

    /// Apply the query to a set of documents.
    pub fn apply(&self, documents: Vec<Value>) -> Vec<Value> {
        let mut stages = vec![Stage::Match(self.filters.clone())];
        if let Some(order) = &self.order {
            stages.push(Stage::Sort(order.clone()));
        }
        stages.push(Stage::Skip(self.offset));
        if let Some(limit) = self.limit {
            stages.push(Stage::Limit(limit));
        }
        run_pipeline(documents, &stages)
    }
}

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Keep documents matching every filter.
    Match(Vec<FilterExpr>),
    /// Sort documents.
    Sort(OrderSpec),
    /// Skip documents.
    Skip(usize),
    /// Keep at most N documents.
    Limit(usize),
    /// Keep only the named top-level fields.
    Project(Vec<String>),
    /// Replace the stream by a single `{ name: count }` document.
    Count(String),
}

/// Run an aggregation pipeline.
pub fn run_pipeline(mut documents: Vec<Value>, stages: &[Stage]) -> Vec<Value> {
    for stage in stages {
        documents = match stage {
            Stage::Match(filters) => documents
                .into_iter()
                .filter(|d| filters.iter().all(|f| f.matches(d)))
                .collect(),
            Stage::Sort(order) => {
                documents.sort_by(|a, b| {
                    let ordering = match (field_value(a, &order.field), field_value(b, &order.field)) {
                        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    };
                    match order.direction {
                        OrderDirection::Asc => ordering,
                        OrderDirection::Desc => ordering.reverse(),
                    }
                });
                documents
            }
            Stage::Skip(n) => documents.into_iter().skip(*n).collect(),
            Stage::Limit(n) => documents.into_iter().take(*n).collect(),
            Stage::Project(fields) => documents
                .into_iter()
                .map(|d| {
                    let projected: Map<String, Value> = fields
                        .iter()
                        .filter_map(|f| d.get(f).map(|v| (f.clone(), v.clone())))
                        .collect();
                    Value::Object(projected)
                })
                .collect(),
            Stage::Count(name) => {
                let mut counted = Map::new();
                counted.insert(name.clone(), Value::from(documents.len()));
                vec![Value::Object(counted)]
            }
        };
    }
    documents
}

/// Resolve a dotted field path.
pub(crate) fn field_value<'v>(document: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
        .filter(|v| !v.is_null())
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Vec<Value> {
        vec![
            json!({"_id": "1", "name": "Ann", "age": 31, "tags": ["admin"], "address": {"city": "Oslo"}}),
            json!({"_id": "2", "name": "Bob", "age": 25, "tags": []}),
            json!({"_id": "3", "name": "Cid", "age": 40, "tags": ["admin", "ops"], "address": {"city": "Rome"}}),
        ]
    }

    fn ids(documents: &[Value]) -> Vec<&str> {
        documents.iter().filter_map(|d| d["_id"].as_str()).collect()
    }

    #[test]
    fn test_filters() {
        let docs = people();
        assert!(FilterExpr::eq("name", "Ann").matches(&docs[0]));
        assert!(FilterExpr::ne("name", "Ann").matches(&docs[1]));
        assert!(FilterExpr::is_in("age", [25, 40]).matches(&docs[2]));
        assert!(FilterExpr::gt("age", 30).matches(&docs[0]));
        assert!(!FilterExpr::lt("age", 30).matches(&docs[0]));
        assert!(FilterExpr::contains("tags", "ops").matches(&docs[2]));
        assert!(FilterExpr::contains("name", "id").matches(&docs[2]));
        assert!(FilterExpr::eq("address.city", "Rome").matches(&docs[2]));
        assert!(!FilterExpr::eq("address.city", "Rome").matches(&docs[1]));
    }

    #[test]
    fn test_search_query() {
        let query = SearchQuery::new()
            .filter(FilterExpr::contains("tags", "admin"))
            .order_by(OrderSpec::desc("age"));
        assert_eq!(ids(&query.apply(people())), vec!["3", "1"]);

        let page = SearchQuery::new()
            .order_by(OrderSpec::asc("age"))
            .offset(1)
            .limit(1);
        assert_eq!(ids(&page.apply(people())), vec!["1"]);
    }

    #[test]
    fn test_pipeline() {
        let result = run_pipeline(
            people(),
            &[
                Stage::Match(vec![FilterExpr::gt("age", 26)]),
                Stage::Sort(OrderSpec::asc("name")),
                Stage::Project(vec!["name".into()]),
            ],
        );
        assert_eq!(result, vec![json!({"name": "Ann"}), json!({"name": "Cid"})]);

        let count = run_pipeline(people(), &[Stage::Count("total".into())]);
        assert_eq!(count, vec![json!({"total": 3})]);
    }
}
