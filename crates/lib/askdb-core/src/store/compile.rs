use askdb_store::schema::{is_operator_object, validate_field_path};
use askdb_store::{Document, QuerySpec};
use serde_json::Value;

use super::{StoreError, StoreResult};

/// A `SurrealQL` statement plus the values bound to its parameters.
///
/// Filter values never appear in `text`; only validated field names do.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    pub bindings: Vec<(String, Value)>,
}

/// Compiles a query spec into a single `SELECT` statement.
///
/// The collection and limit are bound as `$collection` and `$limit`; filter
/// operands are bound as `$f0`, `$f1`, and so on.
///
/// # Errors
/// Returns `StoreError::InvalidInput` if the filter contains a construct the
/// store cannot express.
pub fn compile_select(spec: &QuerySpec) -> StoreResult<CompiledQuery> {
    let mut compiler = FilterCompiler::default();
    let condition = compiler.document(&spec.filter)?;

    let mut clauses = vec!["SELECT *, record::id(id) AS id FROM type::table($collection)".to_string()];
    if let Some(condition) = condition {
        clauses.push(format!("WHERE {condition}"));
    }
    if let Some(sort) = spec.sort.as_ref().filter(|sort| !sort.is_empty()) {
        // ORDER BY sees the projected row, where `id` is already the plain key.
        let keys = sort
            .iter()
            .map(|key| Ok(format!("{} {}", ident(&key.field)?, key.direction.as_keyword())))
            .collect::<StoreResult<Vec<_>>>()?;
        clauses.push(format!("ORDER BY {}", keys.join(", ")));
    }
    clauses.push("LIMIT $limit;".to_string());
    let text = clauses.join(" ");

    let mut bindings = vec![
        ("collection".to_string(), Value::String(spec.collection.clone())),
        ("limit".to_string(), Value::from(spec.limit)),
    ];
    bindings.extend(compiler.bindings);
    Ok(CompiledQuery { text, bindings })
}

#[derive(Default)]
struct FilterCompiler {
    bindings: Vec<(String, Value)>,
}

impl FilterCompiler {
    fn bind(&mut self, value: &Value) -> String {
        let name = format!("f{}", self.bindings.len());
        self.bindings.push((name.clone(), value.clone()));
        format!("${name}")
    }

    /// Conjunction of every entry in a filter document; `None` when empty.
    fn document(&mut self, filter: &Document) -> StoreResult<Option<String>> {
        let mut clauses = Vec::with_capacity(filter.len());
        for (key, value) in filter {
            let clause = match key.as_str() {
                "$and" => self.logical(value, " AND ", false)?,
                "$or" => self.logical(value, " OR ", false)?,
                "$nor" => self.logical(value, " OR ", true)?,
                other if other.starts_with('$') => {
                    return Err(StoreError::InvalidInput(format!(
                        "unsupported operator {other}"
                    )));
                }
                field => self.field(field, value)?,
            };
            clauses.push(clause);
        }
        Ok(match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(clauses.join(" AND ")),
        })
    }

    fn logical(&mut self, value: &Value, joiner: &str, negate: bool) -> StoreResult<String> {
        let Value::Array(entries) = value else {
            return Err(StoreError::InvalidInput(
                "logical operators expect an array".to_string(),
            ));
        };
        let mut parts = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::Object(sub) = entry else {
                return Err(StoreError::InvalidInput(
                    "logical operator entries must be objects".to_string(),
                ));
            };
            // An empty sub-filter matches everything.
            parts.push(self.document(sub)?.unwrap_or_else(|| "true".to_string()));
        }
        let joined = format!("({})", parts.join(joiner));
        Ok(if negate { format!("!{joined}") } else { joined })
    }

    fn field(&mut self, field: &str, value: &Value) -> StoreResult<String> {
        let name = filter_operand(field)?;
        if let Value::Object(condition) = value {
            let is_operators = is_operator_object(condition)
                .map_err(|err| StoreError::InvalidInput(err.message().to_string()))?;
            if is_operators {
                return self.operators(&name, condition);
            }
        }
        Ok(self.equals(&name, value))
    }

    fn equals(&mut self, name: &str, value: &Value) -> String {
        if value.is_null() {
            format!("({name} = NULL OR {name} = NONE)")
        } else {
            let param = self.bind(value);
            format!("{name} = {param}")
        }
    }

    fn operators(&mut self, name: &str, condition: &Document) -> StoreResult<String> {
        let mut clauses = Vec::with_capacity(condition.len());
        for (operator, operand) in condition {
            let clause = match operator.as_str() {
                "$eq" => self.equals(name, operand),
                "$ne" => {
                    let equals = self.equals(name, operand);
                    format!("!({equals})")
                }
                "$gt" => self.compare(name, ">", operand),
                "$gte" => self.compare(name, ">=", operand),
                "$lt" => self.compare(name, "<", operand),
                "$lte" => self.compare(name, "<=", operand),
                "$in" => self.compare(name, "INSIDE", operand),
                "$nin" => self.compare(name, "NOTINSIDE", operand),
                "$exists" => {
                    if operand.as_bool().unwrap_or(false) {
                        format!("{name} != NONE")
                    } else {
                        format!("{name} = NONE")
                    }
                }
                "$not" => {
                    let Value::Object(inner) = operand else {
                        return Err(StoreError::InvalidInput(
                            "$not expects an operator object".to_string(),
                        ));
                    };
                    let inner = self.operators(name, inner)?;
                    format!("!({inner})")
                }
                other => {
                    return Err(StoreError::InvalidInput(format!(
                        "unsupported operator {other}"
                    )));
                }
            };
            clauses.push(clause);
        }
        Ok(if clauses.len() == 1 {
            clauses.pop().unwrap_or_default()
        } else {
            format!("({})", clauses.join(" AND "))
        })
    }

    fn compare(&mut self, name: &str, operator: &str, operand: &Value) -> String {
        let param = self.bind(operand);
        format!("{name} {operator} {param}")
    }
}

/// The left-hand side of a filter clause.
///
/// `WHERE` runs against the stored row, whose `id` is a record id. Results
/// carry only its key, so `id` compares through `record::id` to match.
fn filter_operand(path: &str) -> StoreResult<String> {
    if path == "id" {
        Ok("record::id(id)".to_string())
    } else {
        ident(path)
    }
}

/// Renders a validated dotted path as backtick-escaped idents.
fn ident(path: &str) -> StoreResult<String> {
    validate_field_path(path).map_err(|err| StoreError::InvalidInput(err.message().to_string()))?;
    Ok(path
        .split('.')
        .map(|segment| format!("`{segment}`"))
        .collect::<Vec<_>>()
        .join("."))
}
