//! `{{field}}` substitution, the only templating the engine does.
//! Placeholders are filled from the event payload; nothing else is evaluated.

use serde_json::Value;
use wikiflow_core::error::{Result, WikiflowError};
use wikiflow_core::types::EventPayload;

/// Replace every `{{field}}` token with the stringified payload value.
/// Missing fields render as an empty string. Substituted values are never
/// re-scanned, so a value containing `{{x}}` is emitted verbatim.
pub fn render(template: &str, payload: &EventPayload) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            WikiflowError::Other(format!(
                "malformed template: unterminated placeholder in '{template}'"
            ))
        })?;
        let field = after[..end].trim();
        if let Some(value) = payload.get(field) {
            out.push_str(&stringify(value));
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Display form of a payload value: strings verbatim, null as empty,
/// numbers and booleans via their JSON text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read a payload field as an identifier. Empty strings and null count as absent.
pub fn payload_id(payload: &EventPayload, field: &str) -> Option<String> {
    payload
        .get(field)
        .map(stringify)
        .filter(|s| !s.is_empty())
}
