//! JsonModelClient port (spec §6): schema-constrained structured
//! generation, `generate_json(prompt, schema) → T`.
//!
//! Rust has no runtime `type()` construction, so the "dynamic schema"
//! design note (spec §9) is implemented as: a JSON-schema `serde_json::Value`
//! built at call time by [`SchemaBuilder`], decoded into a
//! `HashMap<String, String>` rather than a freshly-minted struct type. Fixed
//! shapes (the bulk of call sites) implement [`ModelSchema`] and get a
//! typed `generate::<T>()` helper built on top of the object-safe trait
//! method.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;

/// A fixed-shape response type the model is asked to produce. `schema()`
/// is the JSON Schema describing it; `neutral()` is the shape-valid empty
/// value returned when schema-validation retries are exhausted (spec §7:
/// "final failure degrades to an empty/neutral instance of the requested
/// schema").
pub trait ModelSchema: DeserializeOwned + Send {
    fn schema() -> Value;
    fn neutral() -> Self;
}

/// Schema-constrained structured generation. Object-safe: the dynamic
/// schema path and the typed path both funnel through
/// `generate_json_value`.
#[async_trait]
pub trait JsonModelClient: Send + Sync {
    /// Generate a JSON value conforming to `schema`. Implementations must
    /// enforce JSON-only output and validate against `schema`, retrying
    /// in-place on validation failure up to a configured cap before
    /// giving up (the caller then falls back to `ModelSchema::neutral()`
    /// or an empty map, per spec §7).
    async fn generate_json_value(&self, prompt: &str, schema: &Value) -> Result<Value>;
}

/// Typed convenience wrapper over [`JsonModelClient::generate_json_value`].
/// On any failure (transport, schema, or deserialization), returns
/// `T::neutral()` rather than propagating — matching spec §7's degrade-
/// over-raise policy for deep components.
pub async fn generate<T: ModelSchema>(client: &dyn JsonModelClient, prompt: &str) -> T {
    match client.generate_json_value(prompt, &T::schema()).await {
        Ok(value) => serde_json::from_value(value).unwrap_or_else(|_| T::neutral()),
        Err(_) => T::neutral(),
    }
}

/// Builds a JSON Schema (and decodes responses) for a record whose field
/// names are known only at call time — PaperAdder's per-column feature
/// extraction (spec §4.10, §9 "Dynamic schemas").
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// `{field: string}` for each name in `fields`, all required, no
    /// additional properties tolerated (spec §9: "unknown-field tolerance
    /// off").
    pub fn string_record_schema(fields: &[String]) -> Value {
        let properties: serde_json::Map<String, Value> = fields
            .iter()
            .map(|f| (f.clone(), json!({"type": "string"})))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": fields,
            "additionalProperties": false,
        })
    }

    /// Generates a record over `fields`, decoding into a map. Missing or
    /// malformed responses degrade to `"Not Available"` per field (spec
    /// §4.10 failure semantics).
    pub async fn generate_record(
        client: &dyn JsonModelClient,
        prompt: &str,
        fields: &[String],
    ) -> HashMap<String, String> {
        let schema = Self::string_record_schema(fields);
        let neutral = || {
            fields
                .iter()
                .map(|f| (f.clone(), crate::entities::NOT_AVAILABLE.to_string()))
                .collect::<HashMap<_, _>>()
        };
        match client.generate_json_value(prompt, &schema).await {
            Ok(Value::Object(map)) => fields
                .iter()
                .map(|f| {
                    let value = map
                        .get(f)
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.is_empty())
                        .unwrap_or(crate::entities::NOT_AVAILABLE)
                        .to_string();
                    (f.clone(), value)
                })
                .collect(),
            _ => neutral(),
        }
    }
}

/// `{reasoning, answer: bool}` — the recurring sufficiency/boolean-check
/// shape (spec §4.6 step 3).
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct BoolAnswer {
    pub reasoning: String,
    pub answer: bool,
}

impl ModelSchema for BoolAnswer {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": {"type": "string"},
                "answer": {"type": "boolean"},
            },
            "required": ["reasoning", "answer"],
        })
    }

    fn neutral() -> Self {
        Self {
            reasoning: String::new(),
            answer: false,
        }
    }
}

/// `{reasoning, value: string}` — single free-text consolidation/extraction
/// calls (e.g. per-new-feature value, consolidated domain string).
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct StringResponse {
    pub reasoning: String,
    pub value: String,
}

impl ModelSchema for StringResponse {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": {"type": "string"},
                "value": {"type": "string"},
            },
            "required": ["reasoning", "value"],
        })
    }

    fn neutral() -> Self {
        Self {
            reasoning: String::new(),
            value: crate::entities::NOT_AVAILABLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JsonModelClient for StubClient {
        async fn generate_json_value(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::Transport("stubbed failure".into()))
        }
    }

    #[tokio::test]
    async fn failed_generation_degrades_to_neutral() {
        let client = StubClient {
            calls: AtomicUsize::new(0),
        };
        let result: BoolAnswer = generate(&client, "is this sufficient?").await;
        assert!(!result.answer);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dynamic_record_degrades_per_field() {
        let client = StubClient {
            calls: AtomicUsize::new(0),
        };
        let fields = vec!["method".to_string(), "dataset".to_string()];
        let record = SchemaBuilder::generate_record(&client, "extract", &fields).await;
        assert_eq!(record.get("method").unwrap(), "Not Available");
        assert_eq!(record.get("dataset").unwrap(), "Not Available");
    }
}
