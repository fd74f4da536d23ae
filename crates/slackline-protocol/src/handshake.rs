//! Session bootstrap (`rtm.connect`) response model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::ProtocolError;

/// Look up a string field on a JSON object.
///
/// Returns `None` if `value` is not an object, the key is absent, or the
/// field is not a string.
#[must_use]
pub fn optional_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Overwrite `target` with the string field `key` of `value`.
///
/// The target is always replaced: a missing field clears it.
pub fn assign_optional_string(target: &mut Option<String>, value: &Value, key: &str) {
    *target = optional_str(value, key).map(str::to_string);
}

/// Team metadata returned by the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    /// Team id.
    pub id: Option<String>,
    /// Team display name.
    pub name: Option<String>,
    /// Team subdomain.
    pub domain: Option<String>,
}

impl TeamInfo {
    /// Read team fields from a `team` object. Missing fields are `None`.
    #[must_use]
    pub fn from_json(team: &Value) -> Self {
        let mut info = Self::default();
        info.assign_from(team);
        info
    }

    /// Overwrite every field from a `team` object.
    pub fn assign_from(&mut self, team: &Value) {
        assign_optional_string(&mut self.id, team, "id");
        assign_optional_string(&mut self.name, team, "name");
        assign_optional_string(&mut self.domain, team, "domain");
    }
}

/// The validated result of a session bootstrap request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResult {
    /// Stream endpoint to open.
    pub url: String,
    /// The local user's id.
    pub self_id: String,
    /// The local user's display name.
    pub self_name: Option<String>,
    /// Team metadata.
    pub team: TeamInfo,
}

impl HandshakeResult {
    /// Extract a handshake result from a bootstrap response body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingField`] if `url` or `self.id` is
    /// absent or not a string.
    pub fn from_json(json: &Value) -> Result<Self, ProtocolError> {
        let url = optional_str(json, "url").ok_or(ProtocolError::MissingField("url"))?;
        let self_obj = json
            .get("self")
            .filter(|s| s.is_object())
            .ok_or(ProtocolError::MissingField("self"))?;
        let self_id = optional_str(self_obj, "id").ok_or(ProtocolError::MissingField("self.id"))?;

        let team = json
            .get("team")
            .filter(|t| t.is_object())
            .map(TeamInfo::from_json)
            .unwrap_or_default();

        Ok(Self {
            url: url.to_string(),
            self_id: self_id.to_string(),
            self_name: optional_str(self_obj, "name").map(str::to_string),
            team,
        })
    }
}
