//! Filter expressions for collection queries.
//!
//! Mutators build these structurally; the HTTP store serializes them into the
//! store's string filter language (escaping embedded quotes), and the
//! in-memory store evaluates them directly against records.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact match on a field's stringified value.
    Eq(String, String),
    /// Case-insensitive substring match.
    Like(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn like(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Like(field.into(), value.into())
    }

    /// Conjunction that collapses a single clause to itself.
    pub fn and(mut clauses: Vec<Filter>) -> Self {
        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Filter::And(clauses)
        }
    }

    /// Disjunction that collapses a single clause to itself.
    pub fn any(mut clauses: Vec<Filter>) -> Self {
        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Filter::Or(clauses)
        }
    }

    /// Serializes into the store's filter expression language.
    ///
    /// String values are escaped before interpolation; a value can never
    /// terminate its own quoting.
    pub fn to_query(&self) -> String {
        match self {
            Filter::Eq(field, value) => format!("{}=\"{}\"", field, escape(value)),
            Filter::Like(field, value) => format!("{}~\"{}\"", field, escape(value)),
            Filter::And(clauses) => group(clauses, " && "),
            Filter::Or(clauses) => group(clauses, " || "),
        }
    }

    /// Evaluates the filter against a record, mirroring the store's matching
    /// semantics: fields compare by stringified value, `~` is a
    /// case-insensitive substring test, missing fields read as empty.
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Filter::Eq(field, value) => field_as_string(record, field) == *value,
            Filter::Like(field, value) => field_as_string(record, field)
                .to_lowercase()
                .contains(&value.to_lowercase()),
            Filter::And(clauses) => clauses.iter().all(|c| c.matches(record)),
            Filter::Or(clauses) => clauses.iter().any(|c| c.matches(record)),
        }
    }
}

fn group(clauses: &[Filter], separator: &str) -> String {
    let parts: Vec<String> = clauses.iter().map(Filter::to_query).collect();
    format!("({})", parts.join(separator))
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn field_as_string(record: &Value, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_conjunction_of_substring_and_exact_clauses() {
        let filter = Filter::and(vec![
            Filter::any(vec![
                Filter::like("item_label", "drill"),
                Filter::like("item_notes", "drill"),
            ]),
            Filter::eq("category_functional", "Tools"),
        ]);
        assert_eq!(
            filter.to_query(),
            r#"((item_label~"drill" || item_notes~"drill") && category_functional="Tools")"#
        );
    }

    #[test]
    fn escapes_embedded_quotes_and_backslashes() {
        let filter = Filter::eq("item_label", r#"3" screws \ brass"#);
        assert_eq!(
            filter.to_query(),
            r#"item_label="3\" screws \\ brass""#
        );
    }

    #[test]
    fn single_clause_collapses_without_grouping() {
        let filter = Filter::and(vec![Filter::eq("container", "abc")]);
        assert_eq!(filter.to_query(), r#"container="abc""#);
    }

    #[test]
    fn matches_exact_and_substring() {
        let record = json!({
            "item_label": "Cordless Drill",
            "category_functional": "Tools",
        });
        assert!(Filter::eq("category_functional", "Tools").matches(&record));
        assert!(!Filter::eq("category_functional", "tools").matches(&record));
        assert!(Filter::like("item_label", "drill").matches(&record));
        assert!(!Filter::like("item_label", "hammer").matches(&record));
    }

    #[test]
    fn missing_fields_read_as_empty() {
        let record = json!({ "item_label": "Hammer" });
        assert!(Filter::eq("container", "").matches(&record));
        assert!(!Filter::eq("container", "abc").matches(&record));
    }

    #[test]
    fn conjunction_and_disjunction_evaluate() {
        let record = json!({
            "item_label": "Cordless Drill",
            "category_functional": "Tools",
        });
        let hit = Filter::and(vec![
            Filter::any(vec![
                Filter::like("item_label", "drill"),
                Filter::like("item_notes", "drill"),
            ]),
            Filter::eq("category_functional", "Tools"),
        ]);
        assert!(hit.matches(&record));

        let miss = Filter::and(vec![
            Filter::like("item_label", "drill"),
            Filter::eq("category_functional", "Office"),
        ]);
        assert!(!miss.matches(&record));
    }
}
