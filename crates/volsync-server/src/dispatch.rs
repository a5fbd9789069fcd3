//! Action dispatch for inbound client messages.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, warn};

use volsync_core::{Action, ActionRequest, ActionResponse, VolumeController};

/// Handle one text message and return the direct reply, if any.
///
/// Reply policy:
/// - malformed JSON: `{"error": "Failed to process message"}`
/// - unknown action: `{"error": "Invalid action"}`
/// - failed action (validation or backend): the error reply
/// - `getState`: the full state
/// - successful mutation: the full state when polling is disabled, nothing
///   when polling is enabled (the monitor broadcasts the change instead)
///
/// Panics raised while handling are contained here and reported as a
/// processing failure.
pub async fn handle_message(
    controller: &VolumeController,
    text: &str,
    polling_enabled: bool,
) -> Option<ActionResponse> {
    let request = match ActionRequest::parse(text) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Malformed message");
            return Some(ActionResponse::processing_failed());
        }
    };

    let Some(action) = request.known_action() else {
        warn!(action = %request.action, "Unknown action");
        return Some(ActionResponse::invalid_action());
    };

    match AssertUnwindSafe(dispatch(controller, action, &request, polling_enabled))
        .catch_unwind()
        .await
    {
        Ok(reply) => reply,
        Err(_) => {
            error!(%action, "Action handler panicked");
            Some(ActionResponse::processing_failed())
        }
    }
}

async fn dispatch(
    controller: &VolumeController,
    action: Action,
    request: &ActionRequest,
    polling_enabled: bool,
) -> Option<ActionResponse> {
    debug!(%action, value = ?request.value, "Handling action");

    match controller.execute(action, request.integer_value()).await {
        Ok(_) if action.is_mutating() && polling_enabled => None,
        Ok(state) => Some(state.into()),
        Err(e) if e.is_validation() => {
            debug!(%action, error = %e, "Rejected action value");
            Some(ActionResponse::from_error(&e))
        }
        Err(e) => {
            error!(%action, error = %e, "Error processing message");
            Some(ActionResponse::from_error(&e))
        }
    }
}
