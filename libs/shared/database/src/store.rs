use std::cmp::Ordering;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::subscription::Subscription;

pub type Fields = serde_json::Map<String, Value>;

// ==============================================================================
// DOCUMENTS AND QUERIES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self { id: id.into(), data }
    }

    /// Split a flat row (with an `id` column) into a document.
    pub fn from_row(row: Value) -> Result<Self, StoreError> {
        let mut data = match row {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Serialization(format!(
                    "expected object row, got {}",
                    other
                )))
            }
        };

        let id = match data.remove("id") {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(StoreError::Serialization("row has no id".to_string())),
        };

        Ok(Self { id, data })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.data.get(field).and_then(Value::as_i64)
    }

    /// Deserialize the document with its id injected as the `id` field.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data)).map_err(|e| {
            StoreError::Serialization(format!("failed to decode document {}: {}", self.id, e))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        if self.field == "id" {
            return self.value.as_str() == Some(doc.id.as_str());
        }
        doc.data.get(&self.field) == Some(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(field, value));
        self
    }

    pub fn order_by_asc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Apply ordering and limit to an already filtered result set.
    pub fn finish(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if let Some(order) = &self.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.field), b.get(&order.field))
                    .then_with(|| a.id.cmp(&b.id));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Missing values sort first; numbers numerically; everything else by string form.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

// ==============================================================================
// WRITES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Set(Value),
    Increment(i64),
    ServerTimestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWrite {
    pub field: String,
    pub value: FieldValue,
}

impl FieldWrite {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: FieldValue::Set(value.into()),
        }
    }

    pub fn increment(field: impl Into<String>, by: i64) -> Self {
        Self {
            field: field.into(),
            value: FieldValue::Increment(by),
        }
    }

    pub fn server_timestamp(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: FieldValue::ServerTimestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Write {
    /// Fails with `AlreadyExists` when `id` is taken; a missing id is assigned by the store.
    Create {
        collection: String,
        id: Option<String>,
        fields: Vec<FieldWrite>,
    },
    /// Fails with `NotFound` when the document does not exist.
    Update {
        collection: String,
        id: String,
        fields: Vec<FieldWrite>,
    },
    Delete {
        collection: String,
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Precondition {
    Exists {
        collection: String,
        id: String,
    },
    FieldEquals {
        collection: String,
        id: String,
        field: String,
        expected: Value,
    },
}

/// A set of writes applied all-or-nothing once every precondition holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_exists(mut self, collection: &str, id: &str) -> Self {
        self.preconditions.push(Precondition::Exists {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn require_field(
        mut self,
        collection: &str,
        id: &str,
        field: &str,
        expected: impl Into<Value>,
    ) -> Self {
        self.preconditions.push(Precondition::FieldEquals {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            expected: expected.into(),
        });
        self
    }

    pub fn create(mut self, collection: &str, id: Option<&str>, fields: Vec<FieldWrite>) -> Self {
        self.writes.push(Write::Create {
            collection: collection.to_string(),
            id: id.map(str::to_string),
            fields,
        });
        self
    }

    pub fn update(mut self, collection: &str, id: &str, fields: Vec<FieldWrite>) -> Self {
        self.writes.push(Write::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
        self
    }

    pub fn delete(mut self, collection: &str, id: &str) -> Self {
        self.writes.push(Write::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitResult {
    /// Ids of created documents, in the order of their `Create` writes.
    pub created_ids: Vec<String>,
}

// ==============================================================================
// STORE TRAIT
// ==============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<CommitResult, StoreError>;

    /// Live query: the first snapshot is delivered immediately, then one per change.
    async fn watch(&self, query: Query) -> Result<Subscription, StoreError>;

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Vec<FieldWrite>,
    ) -> Result<String, StoreError> {
        let result = self
            .commit(WriteBatch::new().create(collection, id, fields))
            .await?;
        result
            .created_ids
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::InvalidWrite("store returned no created id".to_string()))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Vec<FieldWrite>,
    ) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().update(collection, id, fields))
            .await
            .map(|_| ())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().delete(collection, id))
            .await
            .map(|_| ())
    }
}
