//! Decoding event-queue responses into [`Message`]s.
//!
//! A response looks like:
//!
//! ```json
//! {
//!   "id": 12,
//!   "events": [
//!     { "message": "AgentGroupDataUpdate",
//!       "body": { "AgentData": [ { "AgentID": "..." } ],
//!                 "GroupData": [ { "GroupID": "..." }, { "GroupID": "..." } ] } },
//!     { "message": "EstablishAgentCommunication",
//!       "body": { "agent-id": "...", "sim-ip-and-port": "..." } }
//!   ]
//! }
//! ```
//!
//! When the template registry knows the message name, the body is keyed by
//! block name and each list element becomes one [`Block`]. Otherwise the body
//! is a flat map and becomes a single [`MESSAGE_DATA_BLOCK`] block.

use grid_core::{
    Host,
    message::{Block, Message, Variable, VariableSize},
    template::TemplateRegistry,
};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Key of the event list in a response.
pub const EVENTS_KEY: &str = "events";

/// Key of the event id in a response.
pub const ID_KEY: &str = "id";

/// Key of an event's message name.
pub const MESSAGE_KEY: &str = "message";

/// Key of an event's body.
pub const BODY_KEY: &str = "body";

/// Name of the synthetic block holding the fields of an untemplated event.
pub const MESSAGE_DATA_BLOCK: &str = "Message_Data";

/// Tags applied to every message decoded from one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventContext {
    /// The acknowledged id in effect when the response was decoded.
    pub event_queue_id: Option<i64>,

    /// The simulator the queue belongs to.
    pub host: Option<Host>,
}

/// The response's event list.
///
/// A response without `events` has nothing to decode and yields an empty
/// slice.
///
/// # Errors
///
/// Returns [`DecodeError::EventsNotList`] if `events` is present but is not
/// a list.
pub fn events(response: &Value) -> Result<&[Value], DecodeError> {
    match response.get(EVENTS_KEY) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(entries)) => Ok(entries),
        Some(_) => Err(DecodeError::EventsNotList),
    }
}

/// The server-assigned id of a response, if present.
#[must_use]
pub fn response_id(response: &Value) -> Option<i64> {
    response.get(ID_KEY).and_then(Value::as_i64)
}

/// Decode one event entry.
///
/// # Errors
///
/// Returns [`DecodeError`] if the entry has no name or its body does not
/// have the shape its template implies.
pub fn decode_event<T>(event: &Value, templates: &T, ctx: &EventContext) -> Result<Message, DecodeError>
where
    T: TemplateRegistry + ?Sized,
{
    let name = event
        .get(MESSAGE_KEY)
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingMessageName)?;

    let empty = Map::new();
    let body = match event.get(BODY_KEY) {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(body)) => body,
        Some(_) => {
            return Err(DecodeError::BodyNotObject {
                message: name.to_owned(),
            });
        }
    };

    let mut message = Message::new(name)
        .with_event_queue_id(ctx.event_queue_id)
        .with_host(ctx.host);

    if templates.lookup(name).is_some() {
        for (block_name, repetitions) in body {
            let Value::Array(repetitions) = repetitions else {
                return Err(DecodeError::BlockNotList {
                    message: name.to_owned(),
                    block: block_name.clone(),
                });
            };

            for (index, fields) in repetitions.iter().enumerate() {
                let Value::Object(fields) = fields else {
                    return Err(DecodeError::RepetitionNotObject {
                        message: name.to_owned(),
                        block: block_name.clone(),
                        index,
                    });
                };
                message.add_block(fields_block(block_name, fields));
            }
        }
    } else {
        message.add_block(fields_block(MESSAGE_DATA_BLOCK, body));
    }

    Ok(message)
}

fn fields_block(name: &str, fields: &Map<String, Value>) -> Block {
    let mut block = Block::new(name);
    for (field, value) in fields {
        block.add_variable(Variable::new(field.as_str(), value.clone(), VariableSize::Unknown));
    }
    block
}

/// Decode every event in a response in order, pairing each raw entry with
/// its decoded message.
///
/// # Errors
///
/// Returns [`DecodeError::EventsNotList`] if the event list itself is
/// malformed; errors in individual entries are reported in place.
pub fn decode_events<'a, T>(
    response: &'a Value,
    templates: &T,
    ctx: &EventContext,
) -> Result<Vec<(&'a Value, Result<Message, DecodeError>)>, DecodeError>
where
    T: TemplateRegistry + ?Sized,
{
    Ok(events(response)?
        .iter()
        .map(|event| (event, decode_event(event, templates, ctx)))
        .collect())
}

#[cfg(test)]
mod tests {
    use grid_core::template::{MemoryTemplates, Template};
    use serde_json::json;

    use super::*;

    fn templates() -> MemoryTemplates {
        MemoryTemplates::new()
            .with_template(Template::new("AgentGroupDataUpdate"))
            .with_template(Template::new("TeleportFinish"))
    }

    fn ctx() -> EventContext {
        EventContext {
            event_queue_id: Some(12),
            host: Some("127.0.0.1:13000".parse().expect("valid host")),
        }
    }

    fn names(block: &Block) -> Vec<&str> {
        block.variables().iter().map(Variable::name).collect()
    }

    #[test]
    fn every_event_becomes_a_tagged_message() {
        let response = json!({
            "id": 12,
            "events": [
                {"message": "TeleportFinish", "body": {"Info": [{"SimPort": 13001}]}},
                {"message": "EstablishAgentCommunication", "body": {"agent-id": "a"}},
                {"message": "ChatterBoxInvitation", "body": {}},
            ]
        });

        let decoded = decode_events(&response, &templates(), &ctx()).expect("event list");
        assert_eq!(decoded.len(), 3);
        for (event, msg) in decoded {
            assert!(event.get(MESSAGE_KEY).is_some());
            let msg = msg.expect("decoded");
            assert_eq!(msg.event_queue_id(), Some(12));
            assert_eq!(msg.host(), ctx().host);
        }
    }

    #[test]
    fn templated_repetitions_become_separate_blocks() {
        let event = json!({
            "message": "AgentGroupDataUpdate",
            "body": {
                "AgentData": [{"AgentID": "agent"}],
                "GroupData": [
                    {"GroupID": "g1", "GroupPowers": 1, "AcceptNotices": true},
                    {"GroupID": "g2", "GroupPowers": 2, "AcceptNotices": false},
                    {"GroupID": "g3", "GroupPowers": 4, "AcceptNotices": true},
                ]
            }
        });

        let msg = decode_event(&event, &templates(), &ctx()).expect("decoded");
        let groups: Vec<_> = msg.blocks_named("GroupData").collect();
        assert_eq!(groups.len(), 3);
        for block in &groups {
            assert_eq!(names(block), ["GroupID", "GroupPowers", "AcceptNotices"]);
            assert!(
                block
                    .variables()
                    .iter()
                    .all(|v| v.size() == VariableSize::Unknown)
            );
        }
        assert_eq!(msg.variable("GroupData", 2, "GroupID"), Some(&json!("g3")));
        assert_eq!(msg.blocks()[0].name(), "AgentData");
    }

    #[test]
    fn untemplated_event_gets_one_message_data_block() {
        let event = json!({
            "message": "EstablishAgentCommunication",
            "body": {
                "agent-id": "a",
                "sim-ip-and-port": "10.0.0.1:13005",
                "seed-capability": "https://sim/cap",
                "nested": {"deep": [1, 2]},
            }
        });

        let msg = decode_event(&event, &templates(), &ctx()).expect("decoded");
        assert_eq!(msg.blocks().len(), 1);
        let block = &msg.blocks()[0];
        assert_eq!(block.name(), MESSAGE_DATA_BLOCK);
        assert_eq!(
            names(block),
            ["agent-id", "sim-ip-and-port", "seed-capability", "nested"]
        );
        assert_eq!(
            block.variable("nested").map(Variable::value),
            Some(&json!({"deep": [1, 2]}))
        );
    }

    #[test]
    fn untemplated_event_without_body_has_empty_block() {
        let msg = decode_event(&json!({"message": "Ping"}), &templates(), &ctx()).expect("decoded");
        assert_eq!(msg.blocks().len(), 1);
        assert!(msg.blocks()[0].variables().is_empty());
    }

    #[test]
    fn missing_events_is_zero_messages() {
        let response = json!({"id": 1});
        let decoded = decode_events(&response, &templates(), &ctx()).expect("no list");
        assert!(decoded.is_empty());
        assert!(events(&json!(null)).expect("null response").is_empty());
    }

    #[test]
    fn malformed_entries_fail_in_place() {
        let response = json!({
            "id": 4,
            "events": [
                {"body": {}},
                {"message": "TeleportFinish", "body": {"Info": {"SimPort": 1}}},
                {"message": "TeleportFinish", "body": {"Info": [1]}},
                {"message": "Other", "body": [1, 2]},
                {"message": "Other", "body": {"ok": 1}},
            ]
        });

        let decoded = decode_events(&response, &templates(), &ctx()).expect("event list");
        assert_eq!(decoded[0].1, Err(DecodeError::MissingMessageName));
        assert!(matches!(decoded[1].1, Err(DecodeError::BlockNotList { .. })));
        assert!(matches!(
            decoded[2].1,
            Err(DecodeError::RepetitionNotObject { index: 0, .. })
        ));
        assert!(matches!(decoded[3].1, Err(DecodeError::BodyNotObject { .. })));
        assert!(decoded[4].1.is_ok());
        assert_eq!(decoded[3].0, &response["events"][3]);
    }

    #[test]
    fn events_must_be_a_list() {
        assert_eq!(
            events(&json!({"events": {"a": 1}})),
            Err(DecodeError::EventsNotList)
        );
    }

    #[test]
    fn response_id_reads_integer() {
        assert_eq!(response_id(&json!({"id": 9})), Some(9));
        assert_eq!(response_id(&json!({"id": "9"})), None);
        assert_eq!(response_id(&json!({})), None);
    }
}
