use actix_web::{web, HttpResponse, Responder};
use serde_json::Value;

use crate::channels;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/message").route(web::post().to(receive_message)));
}

/// Shared webhook endpoint for all messaging providers. Always
/// acknowledges with 200 so providers do not retry; failures are
/// handled internally.
async fn receive_message(state: web::Data<AppState>, body: web::Json<Value>) -> impl Responder {
    match channels::parse_inbound(&body) {
        Ok(message) => {
            log::info!(
                "[WEBHOOK] Received {:?} message from {}",
                message.metadata.kind(),
                message.metadata.user_name()
            );

            let provider = channels::provider_for(&message, &state.config);
            match state.dispatcher.dispatch(provider.as_ref(), &message).await {
                Ok(outcome) => log::info!("[WEBHOOK] Handled as {:?}", outcome),
                Err(e) => {
                    log::error!("[WEBHOOK] Dispatch failed: {}", e);
                    match state.dispatcher.simple_response(provider.as_ref(), &message).await {
                        Ok(outcome) => log::info!("[WEBHOOK] Fallback handled as {:?}", outcome),
                        Err(e) => log::error!("[WEBHOOK] Fallback response failed: {}", e),
                    }
                }
            }
        }
        Err(e) => log::error!("[WEBHOOK] Could not parse webhook body: {}", e),
    }

    HttpResponse::Ok().json(serde_json::json!({ "message": "Received" }))
}
