use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt::Debug;
use std::str::FromStr;
use thiserror::Error;

/// A schemaless record as held by the document store. Decimal fields are carried as
/// exact-digit strings and timestamps as RFC 3339 strings, so documents round-trip
/// without losing precision.
pub type Document = serde_json::Map<String, Value>;

/// Errors surfaced by a document [`Engine`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient connectivity loss - eligible for the reconnect retry policy.
    #[error("store connection lost: {0}")]
    ConnectionLost(String),

    /// A document did not decode into (or encode from) its typed shape.
    #[error("malformed `{collection}` document: {error}")]
    Codec {
        collection: &'static str,
        error: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::ConnectionLost(_))
    }
}

/// Typed condition evaluated against one [`Document`] field.
#[derive(Debug, Clone)]
enum Condition {
    Eq(&'static str, Value),
    Ne(&'static str, Value),
    /// Decimal-aware equality on an exact-digit string field (missing field reads zero).
    DecimalEq(&'static str, Decimal),
    TimeAfter(&'static str, DateTime<Utc>),
    TimeBefore(&'static str, DateTime<Utc>),
}

/// Conjunction of [`Condition`]s selecting documents within one collection.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(field, value.into()));
        self
    }

    /// Add an equality condition only when a value is present (absent means "any").
    pub fn maybe_eq<V: Into<Value>>(self, field: &'static str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.eq(field, value),
            None => self,
        }
    }

    pub fn ne(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Ne(field, value.into()));
        self
    }

    pub fn decimal_eq(mut self, field: &'static str, value: Decimal) -> Self {
        self.conditions.push(Condition::DecimalEq(field, value));
        self
    }

    pub fn maybe_time_after(mut self, field: &'static str, value: Option<DateTime<Utc>>) -> Self {
        if let Some(value) = value {
            self.conditions.push(Condition::TimeAfter(field, value));
        }
        self
    }

    pub fn maybe_time_before(mut self, field: &'static str, value: Option<DateTime<Utc>>) -> Self {
        if let Some(value) = value {
            self.conditions.push(Condition::TimeBefore(field, value));
        }
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Eq(field, value) => document.get(*field) == Some(value),
            Condition::Ne(field, value) => document.get(*field) != Some(value),
            Condition::DecimalEq(field, value) => {
                decimal_field(document, field).is_some_and(|parsed| parsed == *value)
                    || (document.get(*field).is_none() && value.is_zero())
            }
            Condition::TimeAfter(field, value) => {
                time_field(document, field).is_some_and(|parsed| parsed > *value)
            }
            Condition::TimeBefore(field, value) => {
                time_field(document, field).is_some_and(|parsed| parsed < *value)
            }
        })
    }
}

/// Mutation applied by [`Engine::find_one_and_update`]: replacement values plus
/// decimal-aware increments.
#[derive(Debug, Clone, Default)]
pub struct Update {
    set: Vec<(&'static str, Value)>,
    inc: Vec<(&'static str, Decimal)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.set.push((field, value.into()));
        self
    }

    pub fn inc(mut self, field: &'static str, delta: Decimal) -> Self {
        self.inc.push((field, delta));
        self
    }

    fn apply(&self, document: &mut Document) {
        for (field, value) in &self.set {
            document.insert((*field).to_owned(), value.clone());
        }
        for (field, delta) in &self.inc {
            let current = decimal_field(document, field).unwrap_or(Decimal::ZERO);
            document.insert((*field).to_owned(), Value::String((current + delta).to_string()));
        }
    }
}

fn decimal_field(document: &Document, field: &str) -> Option<Decimal> {
    match document.get(field)? {
        Value::String(raw) => Decimal::from_str(raw).ok(),
        Value::Number(raw) => Decimal::from_str(&raw.to_string()).ok(),
        _ => None,
    }
}

fn time_field(document: &Document, field: &str) -> Option<DateTime<Utc>> {
    match document.get(field)? {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        _ => None,
    }
}

/// Document store capability consumed by the typed [`Store`](crate::store::Store)
/// layer. Each method is one atomic step from the engine's point of view.
pub trait Engine: Debug + Send + Sync {
    fn insert(&self, collection: &'static str, document: Document) -> Result<(), StoreError>;

    fn find(&self, collection: &'static str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    fn find_one(
        &self,
        collection: &'static str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    /// Atomically mutate the first matching document, returning its *after* image.
    fn find_one_and_update(
        &self,
        collection: &'static str,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, StoreError>;

    /// Atomically increment fields of the first matching document, inserting
    /// `insert_base` with the increments applied when nothing matches (upsert).
    fn increment_one(
        &self,
        collection: &'static str,
        filter: &Filter,
        increments: &[(&'static str, Decimal)],
        insert_base: Document,
    ) -> Result<(), StoreError>;

    fn delete_one(&self, collection: &'static str, filter: &Filter) -> Result<bool, StoreError>;
}

/// In-process [`Engine`] holding every collection in memory. Used by the server
/// binary and as the reference engine in tests.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    collections: Mutex<FnvHashMap<&'static str, Vec<Document>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine for MemoryEngine {
    fn insert(&self, collection: &'static str, document: Document) -> Result<(), StoreError> {
        self.collections
            .lock()
            .entry(collection)
            .or_default()
            .push(document);
        Ok(())
    }

    fn find(&self, collection: &'static str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.lock();
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find_one(
        &self,
        collection: &'static str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.lock();
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|document| filter.matches(document)))
            .cloned())
    }

    fn find_one_and_update(
        &self,
        collection: &'static str,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.lock();
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(document) = documents.iter_mut().find(|document| filter.matches(document)) else {
            return Ok(None);
        };
        update.apply(document);
        Ok(Some(document.clone()))
    }

    fn increment_one(
        &self,
        collection: &'static str,
        filter: &Filter,
        increments: &[(&'static str, Decimal)],
        insert_base: Document,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.lock();
        let documents = collections.entry(collection).or_default();
        let index = match documents.iter().position(|document| filter.matches(document)) {
            Some(index) => index,
            None => {
                documents.push(insert_base);
                documents.len() - 1
            }
        };
        let document = &mut documents[index];
        for (field, delta) in increments {
            let current = decimal_field(document, field).unwrap_or(Decimal::ZERO);
            document.insert((*field).to_owned(), Value::String((current + delta).to_string()));
        }
        Ok(())
    }

    fn delete_one(&self, collection: &'static str, filter: &Filter) -> Result<bool, StoreError> {
        let mut collections = self.collections.lock();
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(position) = documents.iter().position(|document| filter.matches(document)) else {
            return Ok(false);
        };
        documents.remove(position);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn document(value: Value) -> Document {
        match value {
            Value::Object(document) => document,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_filter_matches() {
        struct TestCase {
            filter: Filter,
            expected: bool,
        }

        let doc = document(json!({
            "_id": "1",
            "api_key": "test",
            "status": "opened",
            "amount": "100",
            "executed_amount": "25.5",
            "created_at": "2018-12-01T10:10:00Z",
        }));

        let tests = vec![
            TestCase {
                // TC0: single equality hit
                filter: Filter::new().eq("_id", "1"),
                expected: true,
            },
            TestCase {
                // TC1: equality miss
                filter: Filter::new().eq("_id", "2"),
                expected: false,
            },
            TestCase {
                // TC2: inequality passes on different value
                filter: Filter::new().ne("status", "closed"),
                expected: true,
            },
            TestCase {
                // TC3: inequality passes on missing field
                filter: Filter::new().ne("ghost", "closed"),
                expected: true,
            },
            TestCase {
                // TC4: decimal equality ignores representation
                filter: Filter::new().decimal_eq("executed_amount", dec!(25.50)),
                expected: true,
            },
            TestCase {
                // TC5: decimal equality on missing field only matches zero
                filter: Filter::new().decimal_eq("ghost", dec!(0)),
                expected: true,
            },
            TestCase {
                // TC6: interval conditions
                filter: Filter::new()
                    .maybe_time_after("created_at", Some(Utc.with_ymd_and_hms(2018, 12, 1, 0, 0, 0).unwrap()))
                    .maybe_time_before("created_at", Some(Utc.with_ymd_and_hms(2018, 12, 2, 0, 0, 0).unwrap())),
                expected: true,
            },
            TestCase {
                // TC7: lower bound is strict
                filter: Filter::new().maybe_time_after(
                    "created_at",
                    Some(Utc.with_ymd_and_hms(2018, 12, 1, 10, 10, 0).unwrap()),
                ),
                expected: false,
            },
            TestCase {
                // TC8: absent optional conditions match everything
                filter: Filter::new().maybe_eq::<&str>("status", None).maybe_time_after("created_at", None),
                expected: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.filter.matches(&doc), test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_find_one_and_update_returns_after_image() {
        let engine = MemoryEngine::new();
        engine
            .insert(
                "orders",
                document(json!({"_id": "1", "status": "opened", "executed_amount": "0"})),
            )
            .unwrap();

        let updated = engine
            .find_one_and_update(
                "orders",
                &Filter::new().eq("_id", "1").eq("status", "opened"),
                &Update::new()
                    .set("status", "closed")
                    .inc("executed_amount", dec!(100)),
            )
            .unwrap()
            .expect("document should match");

        assert_eq!(updated.get("status"), Some(&Value::String("closed".into())));
        assert_eq!(
            updated.get("executed_amount"),
            Some(&Value::String("100".into()))
        );

        // A second update gated on the opened status must miss.
        let missed = engine
            .find_one_and_update(
                "orders",
                &Filter::new().eq("_id", "1").eq("status", "opened"),
                &Update::new().set("status", "closed"),
            )
            .unwrap();
        assert!(missed.is_none());
    }

    #[test]
    fn test_increment_one_upserts() {
        let engine = MemoryEngine::new();
        let filter = Filter::new().eq("api_key", "test").eq("currency", "BTC");

        engine
            .increment_one(
                "balances",
                &filter,
                &[("available", dec!(1.5)), ("frozen", dec!(0))],
                document(json!({"_id": "b1", "api_key": "test", "currency": "BTC"})),
            )
            .unwrap();
        engine
            .increment_one(
                "balances",
                &filter,
                &[("available", dec!(-0.5))],
                document(json!({"_id": "b2", "api_key": "test", "currency": "BTC"})),
            )
            .unwrap();

        let rows = engine.find("balances", &filter).unwrap();
        assert_eq!(rows.len(), 1, "upsert must not duplicate rows");
        assert_eq!(
            rows[0].get("available"),
            Some(&Value::String("1.0".into()))
        );
    }

    #[test]
    fn test_delete_one() {
        let engine = MemoryEngine::new();
        engine
            .insert("trades", document(json!({"_id": "t1"})))
            .unwrap();

        assert!(engine.delete_one("trades", &Filter::new().eq("_id", "t1")).unwrap());
        assert!(!engine.delete_one("trades", &Filter::new().eq("_id", "t1")).unwrap());
    }
}
