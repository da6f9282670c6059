//! Join parameters: validation and the query-string form used by the entry screen.
//!
//! Names and rooms are trimmed here and nowhere else. Every later comparison
//! (join payload, typing self-exclusion, own-message detection) uses the
//! trimmed values, so padded input can never desynchronize them.

use serde::{Deserialize, Serialize};

/// Validated, trimmed `(name, room)` pair. Also the payload of `join`,
/// `typing` and `stopTyping`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinParams {
    pub name: String,
    pub room: String,
}

/// Name or room missing (or blank after trimming).
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Name and Room are required")]
pub struct InvalidParams {
    pub name_missing: bool,
    pub room_missing: bool,
}

/// Trim and validate raw join input.
///
/// # Errors
///
/// Returns [`InvalidParams`] when either value is empty after trimming.
pub fn validate(name: &str, room: &str) -> Result<JoinParams, InvalidParams> {
    let name = name.trim();
    let room = room.trim();
    if name.is_empty() || room.is_empty() {
        return Err(InvalidParams { name_missing: name.is_empty(), room_missing: room.is_empty() });
    }
    Ok(JoinParams { name: name.to_owned(), room: room.to_owned() })
}

/// Decode and validate a chat location query such as `?name=Ann&room=lobby`.
///
/// A leading `?` is optional. Missing keys count as blank. When a key repeats,
/// the first occurrence wins.
///
/// # Errors
///
/// Returns [`InvalidParams`] when either parameter is absent or blank.
pub fn from_query(query: &str) -> Result<JoinParams, InvalidParams> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut name: Option<String> = None;
    let mut room: Option<String> = None;

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "name" if name.is_none() => name = Some(value.into_owned()),
            "room" if room.is_none() => room = Some(value.into_owned()),
            _ => {}
        }
    }

    validate(name.as_deref().unwrap_or_default(), room.as_deref().unwrap_or_default())
}

/// Build the chat location query the entry screen navigates to.
#[must_use]
pub fn to_query(params: &JoinParams) -> String {
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("name", &params.name)
        .append_pair("room", &params.room)
        .finish();
    format!("?{encoded}")
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
