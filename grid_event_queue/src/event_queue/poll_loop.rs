//! Background polling task.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, atomic::Ordering},
};

use grid_core::{dispatch::Dispatch, settings::MissingIdPolicy, template::TemplateRegistry};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use super::{EventQueueState, NO_EVENT_ID, Shared};
use crate::{
    capability::CapabilityPost,
    decode::{self, EventContext},
};

pub(super) async fn run<C, T, D>(shared: Arc<Shared<C, T, D>>)
where
    C: CapabilityPost,
    T: TemplateRegistry,
    D: Dispatch,
{
    let host = shared.host_label();
    info!(role = %shared.role, host = %host, "starting event queue");

    loop {
        tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            () = tokio::time::sleep(shared.poll_interval) => {}
        }

        if shared.cancel.is_cancelled() {
            break;
        }

        poll_once(&shared, &host).await;
    }

    // Cancellation from a parent token skips `stop()`; the state still has
    // to leave Running.
    let _ = shared.transition(EventQueueState::Running, EventQueueState::Stopping);

    if let Some(ack) = shared.last_event_id() {
        let payload = json!({ "ack": ack, "done": true });
        if shared.settings.enable_eq_logging {
            debug!(host = %host, %payload, "sending final event queue acknowledgement");
        }
        if let Err(e) = shared.capability.post(payload).await {
            warn!(host = %host, ack, error = %e, "final event queue acknowledgement failed");
        }
    }

    shared
        .state
        .store(EventQueueState::Stopped as u8, Ordering::Release);
    shared.running.store(false, Ordering::Release);
    info!(role = %shared.role, host = %host, "event queue loop exited");
}

async fn poll_once<C, T, D>(shared: &Shared<C, T, D>, host: &str)
where
    C: CapabilityPost,
    T: TemplateRegistry,
    D: Dispatch,
{
    let mut payload = Map::new();
    if let Some(ack) = shared.last_event_id() {
        payload.insert("ack".into(), ack.into());
    }
    let payload = Value::Object(payload);

    if shared.settings.enable_eq_logging {
        debug!(host = %host, %payload, "posting to event queue");
    }

    match shared.capability.post(payload).await {
        Ok(Some(response)) => handle_response(shared, host, &response),
        Ok(None) => match shared.settings.missing_id_policy {
            MissingIdPolicy::Retain => debug!(host = %host, "event queue poll returned nothing"),
            MissingIdPolicy::Reset => {
                debug!(host = %host, "event queue poll returned nothing, resetting ack");
                shared.last_event_id.store(NO_EVENT_ID, Ordering::Release);
            }
        },
        Err(e) => warn!(host = %host, error = %e, "event queue poll failed"),
    }
}

fn handle_response<C, T, D>(shared: &Shared<C, T, D>, host: &str, response: &Value)
where
    T: TemplateRegistry,
    D: Dispatch,
{
    match decode::response_id(response) {
        Some(id) => shared.last_event_id.store(id, Ordering::Release),
        None => match shared.settings.missing_id_policy {
            MissingIdPolicy::Retain => {
                debug!(host = %host, "event queue response has no id, keeping last ack");
            }
            MissingIdPolicy::Reset => {
                debug!(host = %host, "event queue response has no id, resetting ack");
                shared.last_event_id.store(NO_EVENT_ID, Ordering::Release);
            }
        },
    }

    if shared.settings.enable_eq_logging {
        debug!(host = %host, %response, "event queue response");
    }

    if !shared.settings.handle_event_queue_data {
        return;
    }

    let ctx = EventContext {
        event_queue_id: shared.last_event_id(),
        host: shared.host,
    };

    let decoded = match decode::decode_events(response, &shared.templates, &ctx) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(host = %host, error = %e, %response, "discarding event queue response");
            return;
        }
    };

    for (event, message) in decoded {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!(host = %host, error = %e, %event, "failed to decode event");
                continue;
            }
        };

        let name = message.name().to_owned();
        match catch_unwind(AssertUnwindSafe(|| shared.dispatch.handle(message))) {
            Ok(Ok(())) => {
                if shared.settings.log_verbose {
                    debug!(host = %host, msg = %name, "dispatched event");
                }
            }
            Ok(Err(e)) => {
                warn!(host = %host, msg = %name, error = %e, %event, "event dispatch failed");
            }
            Err(_) => {
                warn!(host = %host, msg = %name, %event, "event handler panicked");
            }
        }
    }
}
