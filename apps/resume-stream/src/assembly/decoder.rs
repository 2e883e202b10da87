//! Snapshot decoding. One raw event payload in, one `RawSnapshot` out.
//!
//! Partial trust: a section with an unexpected shape is dropped from the
//! snapshot, it never fails the whole payload.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::models::resume::{Identified, PartialResume};

/// The decoded form of one stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSnapshot {
    /// A cumulative partial document.
    Document(PartialResume),
    /// The extraction service reported a failure. Stream-fatal.
    RemoteError(String),
    /// The payload was not a JSON object. Skipped by the session.
    DecodeFailure { raw: String, reason: String },
}

pub fn decode(raw: &str) -> RawSnapshot {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            return RawSnapshot::DecodeFailure {
                raw: raw.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let Value::Object(mut fields) = value else {
        return RawSnapshot::DecodeFailure {
            raw: raw.to_string(),
            reason: "payload is not a JSON object".to_string(),
        };
    };

    // An error field wins over any document fields in the same payload.
    match fields.remove("error") {
        None | Some(Value::Null) => {}
        Some(Value::String(message)) => return RawSnapshot::RemoteError(message),
        Some(other) => return RawSnapshot::RemoteError(other.to_string()),
    }

    RawSnapshot::Document(PartialResume {
        contact: take_section(&mut fields, "contact_info"),
        summary: take_section::<String>(&mut fields, "summary").filter(|s| !s.trim().is_empty()),
        work_experience: take_sequence(&mut fields, "work_experience"),
        education: take_sequence(&mut fields, "education"),
        certifications: take_sequence(&mut fields, "certification_and_training"),
        projects: take_sequence(&mut fields, "projects"),
        skill_categories: take_sequence(&mut fields, "skill_categories"),
    })
}

fn take_section<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    match fields.remove(key)? {
        Value::Null => None,
        value => serde_json::from_value(value).ok(),
    }
}

/// Decodes each element on its own; malformed or unidentified elements are
/// dropped and an empty result counts as an absent section.
fn take_sequence<T>(fields: &mut Map<String, Value>, key: &str) -> Option<Vec<T>>
where
    T: DeserializeOwned + Identified,
{
    let Value::Array(items) = fields.remove(key)? else {
        return None;
    };

    let elements: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<T>(item).ok())
        .filter(|element| element.is_identified())
        .collect();

    if elements.is_empty() {
        None
    } else {
        Some(elements)
    }
}
