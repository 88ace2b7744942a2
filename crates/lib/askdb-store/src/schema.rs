use std::error::Error;
use std::fmt;

use schemars::generate::SchemaSettings;
use serde_json::{Map, Value};

use crate::models::{Document, Projection, QueryArgs, QuerySpec, SortField};

pub const TOOL_NAME: &str = "run_query_tool";
pub const TOOL_DESCRIPTION: &str = "Runs a read-only query against the document store. \
Provide the collection, an optional filter, projection, sort, and limit. \
Use this instead of writing raw database queries.";

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

pub const COMPARISON_OPERATORS: &[&str] = &[
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$exists", "$not",
];
pub const LOGICAL_OPERATORS: &[&str] = &["$and", "$or", "$nor"];

const MAX_NAME_LEN: usize = 128;
const MAX_FILTER_DEPTH: usize = 8;
const ID_FIELD: &str = "id";

/// Raised when tool arguments do not fit the query schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaValidationError(pub String);

impl SchemaValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema validation failed: {}", self.0)
    }
}

impl Error for SchemaValidationError {}

pub type SchemaResult<T> = Result<T, SchemaValidationError>;

/// JSON schema for the query tool's arguments, with subschemas inlined so the
/// model sees a single self-contained object.
#[must_use]
pub fn query_args_schema() -> Value {
    let schema = SchemaSettings::draft2020_12()
        .with(|settings| settings.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<QueryArgs>();
    serde_json::to_value(schema).unwrap_or_else(|_| Value::Object(Map::new()))
}

impl QuerySpec {
    /// Parses and validates untrusted tool arguments.
    ///
    /// # Errors
    /// Returns `SchemaValidationError` for missing or unknown keys, out of
    /// range limits, or filter operators outside the allow-list.
    pub fn from_arguments(arguments: Map<String, Value>) -> SchemaResult<Self> {
        let args: QueryArgs = serde_json::from_value(Value::Object(arguments))
            .map_err(|err| SchemaValidationError::new(err.to_string()))?;
        Self::try_from(args)
    }

    /// Re-checks every invariant of an already constructed spec.
    ///
    /// # Errors
    /// Returns `SchemaValidationError` describing the first violated invariant.
    pub fn validate(&self) -> SchemaResult<()> {
        validate_collection(&self.collection)?;
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(limit_error(self.limit));
        }
        validate_filter(&self.filter, 0)?;
        if let Some(projection) = &self.projection {
            validate_projection(projection)?;
        }
        if let Some(sort) = &self.sort {
            validate_sort(sort)?;
        }
        Ok(())
    }
}

impl TryFrom<QueryArgs> for QuerySpec {
    type Error = SchemaValidationError;

    fn try_from(args: QueryArgs) -> SchemaResult<Self> {
        let limit = match args.limit {
            None => DEFAULT_LIMIT,
            Some(value) => usize::try_from(value)
                .ok()
                .filter(|limit| (1..=MAX_LIMIT).contains(limit))
                .ok_or_else(|| limit_error(value))?,
        };

        let projection = args.projection.map(parse_projection).transpose()?;
        let sort = args.sort.filter(|sort| !sort.is_empty());

        let spec = Self {
            collection: args.collection.trim().to_string(),
            filter: args.filter.unwrap_or_default(),
            projection,
            sort,
            limit,
        };
        spec.validate()?;
        Ok(spec)
    }
}

fn limit_error(value: impl fmt::Display) -> SchemaValidationError {
    SchemaValidationError::new(format!(
        "limit must be between 1 and {MAX_LIMIT}, got {value}"
    ))
}

fn validate_collection(collection: &str) -> SchemaResult<()> {
    if collection.is_empty() {
        return Err(SchemaValidationError::new("collection is required"));
    }
    if collection.len() > MAX_NAME_LEN {
        return Err(SchemaValidationError::new("collection name is too long"));
    }
    if collection.starts_with("system.") {
        return Err(SchemaValidationError::new(format!(
            "collection {collection} is not queryable"
        )));
    }
    let valid = collection
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
    if !valid {
        return Err(SchemaValidationError::new(format!(
            "invalid collection name: {collection}"
        )));
    }
    Ok(())
}

/// Checks a dotted field path such as `address.city`.
///
/// # Errors
/// Returns `SchemaValidationError` when any segment is not an identifier.
pub fn validate_field_path(path: &str) -> SchemaResult<()> {
    if path.is_empty() || path.len() > MAX_NAME_LEN {
        return Err(SchemaValidationError::new(format!(
            "invalid field name: {path:?}"
        )));
    }
    for segment in path.split('.') {
        let mut chars = segment.chars();
        let head_ok = chars
            .next()
            .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
        if !head_ok || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(SchemaValidationError::new(format!(
                "invalid field name: {path:?}"
            )));
        }
    }
    Ok(())
}

fn validate_filter(filter: &Document, depth: usize) -> SchemaResult<()> {
    if depth > MAX_FILTER_DEPTH {
        return Err(SchemaValidationError::new("filter is nested too deeply"));
    }
    for (key, value) in filter {
        if key.starts_with('$') {
            if !LOGICAL_OPERATORS.contains(&key.as_str()) {
                return Err(unknown_operator(key));
            }
            let Value::Array(clauses) = value else {
                return Err(SchemaValidationError::new(format!(
                    "{key} expects an array of filters"
                )));
            };
            if clauses.is_empty() {
                return Err(SchemaValidationError::new(format!(
                    "{key} expects at least one filter"
                )));
            }
            for clause in clauses {
                let Value::Object(clause) = clause else {
                    return Err(SchemaValidationError::new(format!(
                        "{key} entries must be objects"
                    )));
                };
                validate_filter(clause, depth + 1)?;
            }
        } else {
            validate_field_path(key)?;
            if let Value::Object(condition) = value {
                if is_operator_object(condition)? {
                    validate_operators(key, condition, depth + 1)?;
                }
            }
        }
    }
    Ok(())
}

/// Returns true when every key is an operator, false when none are.
///
/// # Errors
/// Returns `SchemaValidationError` when operators and plain keys are mixed.
pub fn is_operator_object(condition: &Document) -> SchemaResult<bool> {
    let operators = condition.keys().filter(|key| key.starts_with('$')).count();
    if operators == 0 {
        return Ok(false);
    }
    if operators != condition.len() {
        return Err(SchemaValidationError::new(
            "cannot mix operators and field values in one condition",
        ));
    }
    Ok(true)
}

fn validate_operators(field: &str, condition: &Document, depth: usize) -> SchemaResult<()> {
    if depth > MAX_FILTER_DEPTH {
        return Err(SchemaValidationError::new("filter is nested too deeply"));
    }
    for (operator, operand) in condition {
        match operator.as_str() {
            "$in" | "$nin" => {
                if !operand.is_array() {
                    return Err(SchemaValidationError::new(format!(
                        "{operator} on {field} expects an array"
                    )));
                }
            }
            "$exists" => {
                if !operand.is_boolean() {
                    return Err(SchemaValidationError::new(format!(
                        "$exists on {field} expects true or false"
                    )));
                }
            }
            "$not" => {
                let Value::Object(inner) = operand else {
                    return Err(SchemaValidationError::new(format!(
                        "$not on {field} expects an operator object"
                    )));
                };
                if inner.is_empty() || !is_operator_object(inner)? {
                    return Err(SchemaValidationError::new(format!(
                        "$not on {field} expects an operator object"
                    )));
                }
                validate_operators(field, inner, depth + 1)?;
            }
            other if COMPARISON_OPERATORS.contains(&other) => {}
            other => return Err(unknown_operator(other)),
        }
    }
    Ok(())
}

fn unknown_operator(operator: &str) -> SchemaValidationError {
    SchemaValidationError::new(format!("operator {operator} is not allowed"))
}

fn parse_projection(raw: Map<String, Value>) -> SchemaResult<Projection> {
    let mut projection = Projection::new();
    for (field, flag) in raw {
        let flag = match flag {
            Value::Bool(include) => u8::from(include),
            Value::Number(number) => match number.as_u64() {
                Some(0) => 0,
                Some(1) => 1,
                _ => return Err(projection_value_error(&field)),
            },
            _ => return Err(projection_value_error(&field)),
        };
        projection.insert(field, flag);
    }
    validate_projection(&projection)?;
    Ok(projection)
}

fn projection_value_error(field: &str) -> SchemaValidationError {
    SchemaValidationError::new(format!("projection value for {field} must be 0 or 1"))
}

fn validate_projection(projection: &Projection) -> SchemaResult<()> {
    let mut includes = false;
    let mut excludes = false;
    for (field, flag) in projection {
        validate_field_path(field)?;
        match flag {
            1 => includes = true,
            0 if field == ID_FIELD => {}
            0 => excludes = true,
            _ => return Err(projection_value_error(field)),
        }
    }
    if includes && excludes {
        return Err(SchemaValidationError::new(
            "projection cannot mix inclusion and exclusion",
        ));
    }
    Ok(())
}

fn validate_sort(sort: &[SortField]) -> SchemaResult<()> {
    for key in sort {
        validate_field_path(&key.field)?;
    }
    Ok(())
}
