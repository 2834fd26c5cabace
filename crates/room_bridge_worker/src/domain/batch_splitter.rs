use common::domain::{DomainError, DomainResult};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

const EVENTS_FIELD: &str = "events";

/// Whether textually identical events in one batch are kept or collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    #[default]
    Ordered,
    Unique,
}

/// Breaks an ingress batch `{"events": [...]}` into one serialized event per element.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSplitter {
    mode: SplitMode,
}

impl BatchSplitter {
    pub fn new(mode: SplitMode) -> Self {
        Self { mode }
    }

    /// Split `batch` preserving source order.
    ///
    /// Empty input and a null `events` field give an empty list. Anything
    /// else without an `events` array rejects the whole batch, as does an
    /// element that is not an object.
    pub fn split(&self, batch: &str) -> DomainResult<Vec<String>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let document: Value = serde_json::from_str(batch)
            .map_err(|e| DomainError::MalformedInput(format!("batch is not valid JSON: {}", e)))?;

        let Value::Object(mut document) = document else {
            return Err(DomainError::MalformedInput(
                "batch must be a JSON object".to_string(),
            ));
        };

        let events = match document.remove(EVENTS_FIELD) {
            Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(events)) => events,
            None => {
                return Err(DomainError::MalformedInput(
                    "batch has no 'events' field".to_string(),
                ))
            }
            Some(_) => {
                return Err(DomainError::MalformedInput(
                    "batch field 'events' must be an array".to_string(),
                ))
            }
        };

        let mut seen = HashSet::new();
        let mut split = Vec::with_capacity(events.len());

        for (index, event) in events.iter().enumerate() {
            if !event.is_object() {
                return Err(DomainError::MalformedInput(format!(
                    "batch element {} is not an event object",
                    index
                )));
            }

            let serialized = serde_json::to_string(event).map_err(|e| {
                DomainError::MalformedInput(format!("batch element {}: {}", index, e))
            })?;

            if self.mode == SplitMode::Unique && !seen.insert(serialized.clone()) {
                debug!(index, "skipping duplicate event in batch");
                continue;
            }
            split.push(serialized);
        }

        Ok(split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::RoomEvent;
    use serde_json::json;

    #[test]
    fn test_split_preserves_order() {
        // Arrange
        let batch = json!({
            "events": [
                {"type": "m.room.create", "event_id": "e1", "room_id": "!r:x", "sender": "@a:x", "origin_server_ts": 1, "content": {}},
                {"type": "m.room.message", "event_id": "e2", "room_id": "!r:x", "sender": "@a:x", "origin_server_ts": 2, "content": {"msgtype": "m.text", "body": "hi"}}
            ]
        })
        .to_string();

        // Act
        let split = BatchSplitter::default().split(&batch).unwrap();

        // Assert
        assert_eq!(split.len(), 2);
        assert!(split[0].contains("\"e1\""));
        assert!(split[1].contains("\"e2\""));
        assert_eq!(RoomEvent::parse(&split[1]).unwrap().event_id, "e2");
    }

    #[test]
    fn test_empty_input_and_empty_events_are_empty() {
        let splitter = BatchSplitter::default();

        assert!(splitter.split("").unwrap().is_empty());
        assert!(splitter.split(r#"{"events": null}"#).unwrap().is_empty());
        assert!(splitter.split(r#"{"events": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_missing_events_field_is_rejected() {
        let splitter = BatchSplitter::default();

        for batch in ["{}", r#"{"not_events": []}"#, "   \n"] {
            let result = splitter.split(batch);
            assert!(
                matches!(result, Err(DomainError::MalformedInput(_))),
                "expected rejection for {:?}",
                batch
            );
        }
    }

    #[test]
    fn test_malformed_batches_are_rejected() {
        let splitter = BatchSplitter::default();

        for batch in [
            "{not json",
            "[1, 2]",
            r#"{"events": "nope"}"#,
            r#"{"events": [{"type": "m.room.create"}, 42]}"#,
        ] {
            let result = splitter.split(batch);
            assert!(
                matches!(result, Err(DomainError::MalformedInput(_))),
                "expected rejection for {}",
                batch
            );
        }
    }

    #[test]
    fn test_ordered_mode_keeps_duplicates() {
        let batch = r#"{"events": [{"type": "a"}, {"type": "a"}, {"type": "b"}]}"#;

        let split = BatchSplitter::new(SplitMode::Ordered).split(batch).unwrap();

        assert_eq!(split.len(), 3);
    }

    #[test]
    fn test_unique_mode_drops_exact_duplicates() {
        let batch = r#"{"events": [{"type": "a"}, {"type": "b"}, {"type": "a"}]}"#;

        let split = BatchSplitter::new(SplitMode::Unique).split(batch).unwrap();

        assert_eq!(split, vec![r#"{"type":"a"}"#, r#"{"type":"b"}"#]);
    }
}
