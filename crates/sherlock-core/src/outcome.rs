use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix every failure diagnostic starts with.
pub const FAILURE_MARKER: &str = "Error";

/// One result row: column name → value, in column order.
pub type Row = serde_json::Map<String, Value>;

/// What the Query Execution Tool hands back. Failures are values, never panics
/// or `Err`s, so the pipeline can feed them back into generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum QueryOutcome {
    Success(Vec<Row>),
    Failure(String),
}

impl QueryOutcome {
    /// Build a failure, prefixing the marker if the diagnostic lacks it.
    pub fn failure(diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        if diagnostic.starts_with(FAILURE_MARKER) {
            Self::Failure(diagnostic)
        } else {
            Self::Failure(format!("{FAILURE_MARKER}: {diagnostic}"))
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            Self::Success(rows) => Some(rows),
            Self::Failure(_) => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(msg) => Some(msg),
        }
    }

    /// Column names of the first row, in order.
    pub fn columns(&self) -> Vec<String> {
        self.rows()
            .and_then(|rows| rows.first())
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// True for exactly one row with exactly one column.
    pub fn is_single_scalar(&self) -> bool {
        matches!(self.rows(), Some([row]) if row.len() == 1)
    }

    /// Text placed in the conversation: JSON rows on success, the diagnostic
    /// verbatim on failure.
    pub fn to_message_text(&self) -> String {
        match self {
            Self::Success(rows) => {
                serde_json::to_string(rows)
                    .unwrap_or_else(|e| format!("<unserializable rows: {e}>"))
            }
            Self::Failure(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn failure_adds_marker_once() {
        let f = QueryOutcome::failure("missing query");
        assert_eq!(f.diagnostic(), Some("Error: missing query"));

        let already = QueryOutcome::failure("Error executing SQL query: no such column");
        assert_eq!(already.diagnostic(), Some("Error executing SQL query: no such column"));
        assert!(!already.is_success());
    }

    #[test]
    fn columns_preserve_order() {
        let outcome =
            QueryOutcome::Success(vec![row(json!({"country": "USA", "total_sales": 523.06}))]);
        assert_eq!(outcome.columns(), vec!["country", "total_sales"]);
    }

    #[test]
    fn single_scalar_detection() {
        let scalar = QueryOutcome::Success(vec![row(json!({"COUNT(*)": 8}))]);
        assert!(scalar.is_single_scalar());

        let two_cols = QueryOutcome::Success(vec![row(json!({"a": 1, "b": 2}))]);
        assert!(!two_cols.is_single_scalar());

        let empty = QueryOutcome::Success(vec![]);
        assert!(!empty.is_single_scalar());
        assert!(empty.columns().is_empty());
    }

    #[test]
    fn message_text_success_is_json() {
        let outcome = QueryOutcome::Success(vec![row(json!({"COUNT(*)": 8}))]);
        assert_eq!(outcome.to_message_text(), r#"[{"COUNT(*)":8}]"#);
    }

    #[test]
    fn serde_shape_is_tagged() {
        let outcome = QueryOutcome::failure("boom");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["data"], "Error: boom");
    }

    #[test]
    fn success_containing_marker_is_still_success() {
        let outcome = QueryOutcome::Success(vec![row(json!({"note": "Error in invoice 12"}))]);
        assert!(outcome.is_success());
        assert!(outcome.to_message_text().contains(FAILURE_MARKER));
    }
}
