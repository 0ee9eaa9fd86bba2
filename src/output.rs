//! Terminal rendering of a finished turn.

use serde_json::Value;

use sherlock_core::outcome::Row;
use sherlock_core::state::{PipelineState, RunStatus};

const MAX_ROWS: usize = 20;
const MAX_CELL: usize = 40;

pub fn print_turn(state: &PipelineState, show_work: bool) {
    print!("{}", format_turn(state, show_work));
}

pub fn format_turn(state: &PipelineState, show_work: bool) -> String {
    let mut out = String::new();
    match state.status {
        RunStatus::Answered => {
            out.push_str(state.final_answer.as_deref().unwrap_or_default());
            out.push('\n');
        }
        _ => {
            if let Some(last) = state.conversation.last() {
                out.push_str(&last.text());
                out.push('\n');
            }
        }
    }

    if show_work {
        if let Some(sql) = &state.generated_query {
            out.push_str(&format!("\nSQL:\n  {sql}\n"));
        }
        match state.raw_result.as_ref().and_then(|r| r.rows()) {
            Some(rows) => {
                out.push('\n');
                out.push_str(&format_table(rows));
            }
            None => {
                if let Some(err) = &state.execution_error {
                    out.push_str(&format!("\n{err}\n"));
                }
            }
        }
        if state.chart_artifact.is_some() {
            out.push_str("\n(chart available)\n");
        }
    }
    out
}

fn cell(value: &Value) -> String {
    let text = match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL {
        let cut: String = text.chars().take(MAX_CELL - 1).collect();
        format!("{cut}…")
    } else {
        text
    }
}

/// Plain fixed-width table, truncated to the first rows.
pub fn format_table(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return "(no rows)\n".to_string();
    };
    let headers: Vec<&String> = first.keys().collect();
    let body: Vec<Vec<String>> = rows
        .iter()
        .take(MAX_ROWS)
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h.as_str()).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            body.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };

    let mut out = line(headers.iter().map(|h| h.as_str()).collect());
    out.push_str(&format!(
        "{}\n",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
    ));
    for row in &body {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    if rows.len() > MAX_ROWS {
        out.push_str(&format!("... {} more rows\n", rows.len() - MAX_ROWS));
    }
    out
}
