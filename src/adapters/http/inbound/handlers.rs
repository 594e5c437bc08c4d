//! Inbound webhook: gateway messages enter the chat's worker queue.
//!
//! Messages from configured admin numbers are read as operator commands and
//! applied to the chat of the most recent open alert.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::adapters::http::{ApiError, AppState};
use crate::domain::escalation::AdminCommand;
use crate::domain::foundation::ChatId;

use super::dto::{InboundDisposition, InboundRequest, InboundResponse};
use super::signature::{self, SIGNATURE_HEADER};

const BROADCAST_CHAT: &str = "status@broadcast";

/// POST /api/inbound
pub async fn receive_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<InboundResponse>), ApiError> {
    if let Some(secret) = &state.inbound_secret {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        signature::verify(secret, &body, header)
            .map_err(|err| ApiError::unauthorized(err.to_string()))?;
    }

    let request: InboundRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request(format!("invalid inbound payload: {err}")))?;

    if request.is_group || request.chat_id == BROADCAST_CHAT {
        return Ok(accepted(InboundDisposition::Ignored));
    }

    let chat_id = ChatId::new(request.chat_id)?;
    if state.engine().escalation().is_admin(&chat_id) {
        relay_admin_command(&state, chat_id, &request.text)?;
        return Ok(accepted(InboundDisposition::AdminCommand));
    }

    state
        .dispatcher
        .submit_inbound(&chat_id, request.text, request.attachments)?;
    Ok(accepted(InboundDisposition::Queued))
}

fn accepted(status: InboundDisposition) -> (StatusCode, Json<InboundResponse>) {
    (StatusCode::ACCEPTED, Json(InboundResponse { status }))
}

/// Queues an admin's reply on the chat of the latest open alert before the
/// request returns, so replies apply in the order they arrived. The admin
/// hears back once the command has run.
fn relay_admin_command(state: &AppState, admin: ChatId, text: &str) -> Result<(), ApiError> {
    let escalation = state.engine().escalation().clone();
    let parsed = escalation
        .latest_open()
        .ok_or_else(|| "No hay alertas abiertas.".to_string())
        .and_then(|alert| {
            AdminCommand::parse(text)
                .map(|command| (alert.chat_id().clone(), command))
                .map_err(|err| format!("Comando invalido: {err}"))
        });
    let (target, command) = match parsed {
        Ok(parsed) => parsed,
        Err(reply) => {
            tokio::spawn(async move { escalation.notify_admin(&admin, &reply).await });
            return Ok(());
        }
    };

    let label = command.label();
    let pending = state.dispatcher.submit_admin(&target, command)?;
    tokio::spawn(async move {
        let reply = match pending.await {
            Ok(_) => format!("Comando '{label}' aplicado en {target}."),
            Err(err) => {
                tracing::warn!(chat_id = %target, error = %err, "admin command failed");
                format!("No se pudo aplicar '{label}' en {target}: {err}")
            }
        };
        escalation.notify_admin(&admin, &reply).await;
    });
    Ok(())
}
