//! Axum glue for session endpoints.
//!
//! [`SessionRequest`] opens the envelope, confirms the caller is still an
//! active subject and parses the payload. [`SessionReply`] seals whatever the
//! handler produced, errors included, under the same session key.

use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sio_core::protocol::{EnvelopeHeader, ErrorMessage, SessionEnvelope};

use super::SessionContext;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// An authenticated session request with its decrypted payload.
#[derive(Debug)]
pub struct SessionRequest<T> {
    pub ctx: SessionContext,
    pub payload: T,
}

impl<T> FromRequest<AppState> for SessionRequest<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(envelope) = Json::<SessionEnvelope>::from_request(req, state)
            .await
            .map_err(|e| {
                AppError::Session(format!("Malformed envelope: {}", e.body_text())).into_response()
            })?;

        let (ctx, plaintext) = state
            .sessions
            .authenticate(&envelope)
            .await
            .map_err(IntoResponse::into_response)?;

        if let Err(err) = ensure_subject_active(state, &ctx).await {
            return Err(SessionReply::error(&ctx, err).into_response());
        }

        match serde_json::from_value(plaintext) {
            Ok(payload) => Ok(Self { ctx, payload }),
            Err(e) => Err(SessionReply::error(
                &ctx,
                AppError::BadRequest(format!("Invalid request payload: {}", e)),
            )
            .into_response()),
        }
    }
}

async fn ensure_subject_active(state: &AppState, ctx: &SessionContext) -> AppResult<()> {
    let organization = state
        .store
        .get(&ctx.organization)
        .await?
        .ok_or_else(|| AppError::Forbidden("User is not active".to_string()))?;
    organization.ensure_active(&ctx.username)?;
    Ok(())
}

/// Encrypted response to a session request.
pub struct SessionReply {
    status: StatusCode,
    envelope: AppResult<SessionEnvelope>,
}

impl SessionReply {
    pub fn new<T: Serialize>(ctx: &SessionContext, status: StatusCode, payload: &T) -> Self {
        let header = EnvelopeHeader::new(ctx.session_id.clone(), ctx.reply_msg_id);
        let envelope = SessionEnvelope::seal(&ctx.key, header, payload)
            .map_err(|e| AppError::Internal(format!("Failed to seal reply: {}", e)));
        Self { status, envelope }
    }

    pub fn ok<T: Serialize>(ctx: &SessionContext, payload: &T) -> Self {
        Self::new(ctx, StatusCode::OK, payload)
    }

    /// Seal `{"error": message}` with the status the error maps to.
    pub fn error(ctx: &SessionContext, err: AppError) -> Self {
        let (status, error) = err.status_and_message();
        tracing::debug!(
            session_id = %ctx.session_id,
            username = %ctx.username,
            status = status.as_u16(),
            error = %error,
            "Session request failed"
        );
        Self::new(ctx, status, &ErrorMessage { error })
    }

    pub fn from_result<T: Serialize>(ctx: &SessionContext, result: AppResult<T>) -> Self {
        match result {
            Ok(payload) => Self::ok(ctx, &payload),
            Err(err) => Self::error(ctx, err),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for SessionReply {
    fn into_response(self) -> Response {
        match self.envelope {
            Ok(envelope) => (self.status, Json(envelope)).into_response(),
            Err(err) => err.into_response(),
        }
    }
}
