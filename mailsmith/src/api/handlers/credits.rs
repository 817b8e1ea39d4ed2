use crate::{
    AppState,
    api::models::{credits::CreditsResponse, users::CurrentUser},
    errors::{Error, ErrorBody, Result},
};
use axum::{extract::State, response::Json};

/// Get the current user's remaining credits
#[utoipa::path(
    get,
    path = "/api/credits",
    tag = "credits",
    responses(
        (status = 200, description = "Current balance", body = CreditsResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "No balance exists for this user", body = ErrorBody),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_credits(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<CreditsResponse>> {
    let credits = state
        .stores
        .credits
        .balance(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Credit balance".to_string(),
            id: current_user.id.to_string(),
        })?;

    Ok(Json(CreditsResponse { credits }))
}
