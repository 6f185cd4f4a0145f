//! Structured data formats: JSON and CSV

use super::html::render_table;
use crate::error::ConvertError;

/// Pretty-print JSON inside a fenced code block
pub fn json_to_markdown(text: &str) -> Result<String, ConvertError> {
    let value: serde_json::Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .map_err(|e| ConvertError::ConversionFailed(format!("invalid JSON document: {e}")))?;
    let pretty = serde_json::to_string_pretty(&value)
        .map_err(|e| ConvertError::ConversionFailed(format!("invalid JSON document: {e}")))?;
    Ok(format!("```json\n{pretty}\n```"))
}

/// Render CSV as a Markdown table, first record as header
pub fn csv_to_markdown(text: &str) -> Result<String, ConvertError> {
    let rows = parse_csv(text)?;
    Ok(render_table(&rows))
}

/// Parse RFC 4180 style CSV
fn parse_csv(text: &str) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ConvertError::ConversionFailed(
            "malformed CSV: unterminated quoted field".to_string(),
        ));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    let rows = rows
        .into_iter()
        .map(|r| r.into_iter().map(|f| f.replace('\n', " ")).collect())
        .collect();
    Ok(rows)
}
