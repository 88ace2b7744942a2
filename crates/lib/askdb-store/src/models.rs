use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single document as returned by the store.
pub type Document = Map<String, Value>;

/// Sort direction for a single sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn as_keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One key of an ordered, multi-key sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SortField {
    /// Field to sort on. Nested fields use dot notation, e.g. `address.city`.
    pub field: String,
    /// `asc` or `desc`.
    pub direction: SortDirection,
}

/// Raw arguments accepted by the query tool.
///
/// This is the wire shape a caller (usually a language model) proposes. It is
/// only ever turned into a [`QuerySpec`] through validation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryArgs {
    /// Collection to read from, e.g. `customers`.
    pub collection: String,
    /// Match conditions, e.g. `{"city": "London"}` or `{"age": {"$gte": 30}}`.
    /// Supported operators: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
    /// `$nin`, `$exists`, `$not`, and top-level `$and`, `$or`, `$nor`.
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,
    /// Fields to return, e.g. `{"name": 1, "city": 1}`. Use either all 1s
    /// (include) or all 0s (exclude). Omit to return every field.
    #[serde(default)]
    pub projection: Option<Map<String, Value>>,
    /// Ordered sort keys, e.g. `[{"field": "age", "direction": "desc"}]`.
    #[serde(default)]
    pub sort: Option<Vec<SortField>>,
    /// Maximum number of documents to return (1-500, default 50).
    #[serde(default)]
    #[schemars(range(min = 1, max = 500))]
    pub limit: Option<i64>,
}

/// Field inclusion/exclusion map; values are `0` or `1`.
pub type Projection = BTreeMap<String, u8>;

/// A validated, bounded query.
///
/// Serializes to the same shape as [`QueryArgs`], so a spec can be handed back
/// to the tool verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub collection: String,
    pub filter: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortField>>,
    pub limit: usize,
}

impl QuerySpec {
    /// Converts the spec back into tool arguments.
    #[must_use]
    pub fn to_arguments(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Documents returned by a query, in store order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub documents: Vec<Document>,
    pub count: usize,
}

impl QueryResult {
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        let count = documents.len();
        Self { documents, count }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Discoverable description of a callable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A model's structured request to invoke a tool. Untrusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallProposal {
    pub tool: String,
    pub arguments: Map<String, Value>,
}
