//! CSV export of form submissions.
//!
//! Columns are `Submitted At` followed by every response key in the order
//! it is first seen across the submissions. String values are always
//! quoted; numbers and booleans are written raw; lists and objects are
//! written as quoted JSON; missing values leave the cell empty.

use serde_json::Value;

use crate::models::FormSubmission;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn header_cell(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        quote(s)
    } else {
        s.to_string()
    }
}

fn value_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => quote(s),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => quote(&other.to_string()),
    }
}

fn format_submitted_at(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Render `submissions` as CSV text (rows joined by `\n`, no trailing
/// newline). An empty slice yields just the header row.
pub fn submissions_to_csv(submissions: &[FormSubmission]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for sub in submissions {
        for key in sub.responses.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut lines = Vec::with_capacity(submissions.len() + 1);

    let mut header = vec!["Submitted At".to_string()];
    header.extend(columns.iter().map(|c| header_cell(c)));
    lines.push(header.join(","));

    for sub in submissions {
        let mut row = vec![format_submitted_at(sub.submitted_at)];
        row.extend(columns.iter().map(|c| value_cell(sub.responses.get(*c))));
        lines.push(row.join(","));
    }

    lines.join("\n")
}

/// File name offered for download, derived from the form title.
pub fn export_file_name(form_title: &str) -> String {
    let safe: String = form_title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim();
    if safe.is_empty() {
        "form_submissions.csv".to_string()
    } else {
        format!("{}_submissions.csv", safe)
    }
}
