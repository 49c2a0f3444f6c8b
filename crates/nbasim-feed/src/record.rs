//! Raw action records as delivered by the play-by-play feed.
//!
//! Only the fields the replay core needs are typed. Everything else the
//! feed sends is kept verbatim in [`RawRecord::fields`] so it can be
//! forwarded to consumers untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single action record from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    /// Sequence number assigned by the feed.
    #[serde(default)]
    pub action_number: u64,
    /// Period clock in `PTmmMss.ffS` notation, counting down within a period.
    pub clock: String,
    /// Period number, 1-based. Periods past the fourth are overtime.
    pub period: u32,
    /// Action type tag (e.g. `"jumpball"`, `"2pt"`, `"rebound"`).
    #[serde(default)]
    pub action_type: String,
    /// All remaining fields, opaque to the replay core.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawRecord {
    /// Build a record with no extra fields.
    pub fn new(clock: impl Into<String>, period: u32, action_type: impl Into<String>) -> Self {
        Self {
            action_number: 0,
            clock: clock.into(),
            period,
            action_type: action_type.into(),
            fields: Map::new(),
        }
    }

    /// Set the feed sequence number.
    #[must_use]
    pub const fn with_action_number(mut self, action_number: u64) -> Self {
        self.action_number = action_number;
        self
    }

    /// Attach an opaque field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Top-level play-by-play document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayByPlayResponse {
    /// Response metadata.
    #[serde(default)]
    pub meta: FeedMeta,
    /// The game and its actions.
    #[serde(default)]
    pub game: FeedGame,
}

/// Metadata block of a play-by-play document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedMeta {
    /// Feed schema version.
    #[serde(default)]
    pub version: u32,
    /// Feed status code.
    #[serde(default)]
    pub code: u32,
    /// Original request URL as echoed by the feed.
    #[serde(default)]
    pub request: String,
    /// Generation time as reported by the feed.
    #[serde(default)]
    pub time: String,
}

/// Game block of a play-by-play document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedGame {
    /// Game identifier.
    #[serde(rename = "gameId", default)]
    pub game_id: String,
    /// Actions in feed order.
    #[serde(default)]
    pub actions: Vec<RawRecord>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_preserved() {
        let json = r#"{
            "actionNumber": 4,
            "clock": "PT11M58.00S",
            "period": 1,
            "actionType": "jumpball",
            "teamTricode": "LAL",
            "personId": 2544,
            "qualifiers": []
        }"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.action_number, 4);
        assert_eq!(record.clock, "PT11M58.00S");
        assert_eq!(record.period, 1);
        assert_eq!(record.action_type, "jumpball");
        assert_eq!(record.fields["teamTricode"], "LAL");
        assert_eq!(record.fields["personId"], 2544);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["teamTricode"], "LAL");
        assert_eq!(back["actionType"], "jumpball");
    }

    #[test]
    fn document_without_actions_decodes_empty() {
        let json = r#"{"meta": {"version": 1}, "game": {"gameId": "0022000180"}}"#;
        let doc: PlayByPlayResponse = serde_json::from_str(json).unwrap();
        assert_eq!(doc.meta.version, 1);
        assert_eq!(doc.game.game_id, "0022000180");
        assert!(doc.game.actions.is_empty());
    }

    #[test]
    fn missing_clock_is_a_decode_error() {
        let json = r#"{"period": 1, "actionType": "period"}"#;
        assert!(serde_json::from_str::<RawRecord>(json).is_err());
    }
}
