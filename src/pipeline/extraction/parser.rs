use super::ExtractionError;
use crate::grid::TableData;

/// Parse the assembled model response into a table.
///
/// Markdown fencing is removed first; the remainder must be a JSON array of
/// arrays of strings. No shape validation beyond that.
pub fn parse_table_response(response: &str) -> Result<TableData, ExtractionError> {
    let cleaned = strip_code_fence(response);
    let rows: Vec<Vec<String>> = serde_json::from_str(cleaned)?;
    Ok(TableData::from_rows(rows))
}

/// Remove a leading and/or trailing markdown code fence.
///
/// Handles ```` ```json ````, bare ```` ``` ````, and responses where only
/// one side of the fence survived.
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        // Drop an info string such as `json` up to the end of the fence line.
        body = match rest.find('\n') {
            Some(pos) if rest[..pos].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
                &rest[pos + 1..]
            }
            _ => strip_language_tag(rest),
        };
    }

    body = body.trim();
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Strip a language tag glued to a single-line fence, e.g. ```` ```json[["x"]] ````.
fn strip_language_tag(rest: &str) -> &str {
    let tag_len = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphanumeric())
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    if rest[..tag_len].eq_ignore_ascii_case("json") {
        &rest[tag_len..]
    } else {
        rest
    }
}
