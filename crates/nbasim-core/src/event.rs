//! Event preparation.
//!
//! [`prepare_events`] converts the feed's raw records into the immutable,
//! time-sorted [`Event`] sequence a single playback walks through.

use nbasim_feed::RawRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::{compute_offset, ClockError};

/// A raw record placed on the simulated timeline.
///
/// This is also the wire payload: serialized as JSON with
/// `simulatedOffsetSeconds`, `actionType`, and the untouched feed record
/// under `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Position on the simulated clock, in seconds since the nominal start.
    pub simulated_offset_seconds: i64,
    /// Action type tag copied from the record.
    pub action_type: String,
    /// The original feed record.
    pub action: RawRecord,
}

impl Event {
    /// Place a record on the timeline.
    ///
    /// # Errors
    ///
    /// Returns the [`ClockError`] if the record's clock cannot be converted.
    pub fn from_record(record: RawRecord) -> Result<Self, ClockError> {
        let simulated_offset_seconds = compute_offset(&record.clock, record.period)?;
        Ok(Self {
            simulated_offset_seconds,
            action_type: record.action_type.clone(),
            action: record,
        })
    }

    /// Serialize the event into its JSON wire payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if an opaque record field cannot be
    /// encoded.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A record that was left out of a playback because its clock was unreadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Position of the record in the feed.
    pub index: usize,
    /// Feed sequence number of the record.
    pub action_number: u64,
    /// Why the record was skipped.
    pub error: ClockError,
}

/// Output of [`prepare_events`].
#[derive(Debug, Clone, Default)]
pub struct PreparedEvents {
    /// Events sorted by offset, ties in feed order.
    pub events: Vec<Event>,
    /// Non-fatal diagnostics, one per skipped record.
    pub skipped: Vec<SkippedRecord>,
}

impl PreparedEvents {
    /// Number of events ready for playback.
    pub fn prepared(&self) -> usize {
        self.events.len()
    }
}

/// Build the sorted event sequence for one playback.
///
/// Records whose clock cannot be converted are skipped and reported in
/// [`PreparedEvents::skipped`]; they never abort preparation. The result is
/// sorted by offset ascending and is stable, so records sharing an offset
/// keep their feed order.
pub fn prepare_events(records: Vec<RawRecord>) -> PreparedEvents {
    let mut prepared = PreparedEvents {
        events: Vec::with_capacity(records.len()),
        skipped: Vec::new(),
    };

    for (index, record) in records.into_iter().enumerate() {
        let action_number = record.action_number;
        match Event::from_record(record) {
            Ok(event) => prepared.events.push(event),
            Err(error) => {
                warn!(index, action_number, %error, "skipping record with unreadable clock");
                prepared.skipped.push(SkippedRecord {
                    index,
                    action_number,
                    error,
                });
            }
        }
    }

    // `sort_by_key` is stable: equal offsets keep feed order.
    prepared.events.sort_by_key(|event| event.simulated_offset_seconds);
    prepared
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn record(n: u64, clock: &str, period: u32) -> RawRecord {
        RawRecord::new(clock, period, "shot").with_action_number(n)
    }

    #[test]
    fn events_are_sorted_by_offset() {
        let prepared = prepare_events(vec![
            record(1, "PT00M00.00S", 1),
            record(2, "PT12M00.00S", 2),
            record(3, "PT11M30.00S", 1),
            record(4, "PT12M00.00S", 1),
        ]);

        let offsets: Vec<i64> = prepared
            .events
            .iter()
            .map(|e| e.simulated_offset_seconds)
            .collect();
        assert_eq!(offsets, vec![0, 30, 720, 720]);
        assert!(prepared.skipped.is_empty());
    }

    #[test]
    fn equal_offsets_keep_feed_order() {
        let prepared = prepare_events(vec![
            record(10, "PT11M00.00S", 1),
            record(11, "PT11M30.00S", 1),
            record(12, "PT11M00.00S", 1),
            record(13, "PT11M00.00S", 1),
        ]);

        let order: Vec<u64> = prepared
            .events
            .iter()
            .map(|e| e.action.action_number)
            .collect();
        assert_eq!(order, vec![11, 10, 12, 13]);
    }

    #[test]
    fn malformed_record_is_skipped_not_fatal() {
        let prepared = prepare_events(vec![
            record(1, "PT12M00.00S", 1),
            record(2, "garbage", 1),
            record(3, "PT11M00.00S", 1),
            record(4, "PT10M00.00S", 1),
        ]);

        assert_eq!(prepared.prepared(), 3);
        assert_eq!(prepared.skipped.len(), 1);
        assert_eq!(prepared.skipped[0].index, 1);
        assert_eq!(prepared.skipped[0].action_number, 2);
        assert!(matches!(
            prepared.skipped[0].error,
            ClockError::MalformedClockString { .. }
        ));
    }

    #[test]
    fn empty_feed_prepares_nothing() {
        let prepared = prepare_events(Vec::new());
        assert_eq!(prepared.prepared(), 0);
        assert!(prepared.skipped.is_empty());
    }

    #[test]
    fn payload_carries_offset_type_and_raw_fields() {
        let raw = RawRecord::new("PT11M30.00S", 1, "2pt")
            .with_action_number(7)
            .with_field("teamTricode", serde_json::json!("LAL"));
        let event = Event::from_record(raw).unwrap();

        let payload: serde_json::Value = serde_json::from_str(&event.to_payload().unwrap()).unwrap();
        assert_eq!(payload["simulatedOffsetSeconds"], 30);
        assert_eq!(payload["actionType"], "2pt");
        assert_eq!(payload["action"]["clock"], "PT11M30.00S");
        assert_eq!(payload["action"]["actionNumber"], 7);
        assert_eq!(payload["action"]["teamTricode"], "LAL");
    }
}
