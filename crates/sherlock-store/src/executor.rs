use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Number, Value};
use tracing::{info, instrument, warn};

use sherlock_core::outcome::{QueryOutcome, Row};
use sherlock_core::tools::QueryTool;

use crate::database::Database;

/// Query Execution Tool backed by the shared SQLite connection.
#[derive(Clone)]
pub struct SqliteQueryTool {
    db: Database,
}

impl SqliteQueryTool {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}

fn query_rows(conn: &Connection, sql: &str) -> Result<Vec<Row>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            record.insert(name.clone(), sql_value(row.get_ref(idx)?));
        }
        out.push(record);
    }
    Ok(out)
}

fn query_error(err: &rusqlite::Error, sql: &str) -> String {
    format!(
        "Error executing SQL query: {err}\n\
         Query: '{sql}'\n\
         Please check the SQL syntax and ensure the table and column names are correct."
    )
}

fn unexpected_error(detail: &str, sql: &str) -> String {
    format!("Error: unexpected failure while executing query: {detail}\nQuery: '{sql}'")
}

#[async_trait]
impl QueryTool for SqliteQueryTool {
    #[instrument(skip(self), fields(db = %self.db.path().display()))]
    async fn execute(&self, sql: &str) -> QueryOutcome {
        let db = self.db.clone();
        let owned = sql.to_owned();
        let joined = tokio::task::spawn_blocking(move || {
            db.with_conn(|conn| Ok(query_rows(conn, &owned)))
        })
        .await;

        match joined {
            Ok(Ok(Ok(rows))) => {
                info!(rows = rows.len(), "query succeeded");
                QueryOutcome::Success(rows)
            }
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "query failed");
                QueryOutcome::failure(query_error(&e, sql))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "query could not run");
                QueryOutcome::failure(unexpected_error(&e.to_string(), sql))
            }
            Err(e) => {
                warn!(error = %e, "query worker failed");
                QueryOutcome::failure(unexpected_error(&e.to_string(), sql))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use serde_json::json;
    use sherlock_core::outcome::FAILURE_MARKER;

    fn tool() -> SqliteQueryTool {
        SqliteQueryTool::new(fixture::demo_database().unwrap())
    }

    #[tokio::test]
    async fn count_query_returns_single_row() {
        let outcome = tool().execute("SELECT COUNT(*) FROM employees").await;
        let rows = outcome.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["COUNT(*)"], json!(8));
        assert!(outcome.is_single_scalar());
    }

    #[tokio::test]
    async fn preserves_column_order() {
        let outcome = tool()
            .execute(
                "SELECT LastName, EmployeeId, Title FROM employees ORDER BY EmployeeId LIMIT 2",
            )
            .await;
        let rows = outcome.rows().unwrap();
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["LastName", "EmployeeId", "Title"]);
        assert_eq!(rows[0]["LastName"], json!("Adams"));
        assert_eq!(rows[1]["EmployeeId"], json!(2));
    }

    #[tokio::test]
    async fn zero_rows_is_empty_success() {
        let outcome = tool()
            .execute("SELECT * FROM employees WHERE EmployeeId > 100")
            .await;
        assert_eq!(outcome, QueryOutcome::Success(vec![]));
    }

    #[tokio::test]
    async fn maps_null_real_and_blob() {
        let outcome = tool()
            .execute(
                "SELECT ReportsTo, 2.5 AS r, x'DEADBEEF' AS b FROM employees WHERE EmployeeId = 1",
            )
            .await;
        let row = &outcome.rows().unwrap()[0];
        assert_eq!(row["ReportsTo"], Value::Null);
        assert_eq!(row["r"], json!(2.5));
        assert_eq!(row["b"], json!("3q2+7w=="));
    }

    #[tokio::test]
    async fn unknown_column_is_marked_failure() {
        let sql = "SELECT NonExistentColumn FROM employees";
        let outcome = tool().execute(sql).await;
        let diag = outcome.diagnostic().unwrap();
        assert!(diag.starts_with("Error executing SQL query:"));
        assert!(diag.contains("no such column: NonExistentColumn"));
        assert!(diag.contains("Query: 'SELECT NonExistentColumn FROM employees'"));
        assert!(diag.contains(FAILURE_MARKER));
    }

    #[tokio::test]
    async fn unknown_table_is_marked_failure() {
        let outcome = tool().execute("SELECT Name FROM artistss").await;
        assert!(!outcome.is_success());
        assert!(outcome.diagnostic().unwrap().contains("no such table: artistss"));
    }

    #[tokio::test]
    async fn repeated_execution_is_stable() {
        let t = tool();
        let sql = "SELECT BillingCountry, SUM(Total) AS total FROM invoices \
                   GROUP BY BillingCountry ORDER BY total DESC";
        assert_eq!(t.execute(sql).await, t.execute(sql).await);
    }

    #[test]
    fn non_finite_real_is_null() {
        assert_eq!(sql_value(ValueRef::Real(f64::NAN)), Value::Null);
        assert_eq!(sql_value(ValueRef::Integer(-3)), json!(-3));
    }

    #[test]
    fn tool_name() {
        assert_eq!(tool().name(), "execute_sql");
    }
}
