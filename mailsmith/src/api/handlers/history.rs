use crate::{
    AppState,
    api::models::{history::HistoryResponse, users::CurrentUser},
    errors::{Error, ErrorBody, Result},
    types::{HistoryId, abbrev_uuid},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::debug;

/// List the current user's saved emails, newest first
#[utoipa::path(
    get,
    path = "/api/history",
    tag = "history",
    responses(
        (status = 200, description = "Saved emails", body = [HistoryResponse]),
        (status = 401, description = "Unauthorized", body = ErrorBody),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_history(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<HistoryResponse>>> {
    let records = state.stores.history.list(current_user.id).await?;
    Ok(Json(records.into_iter().map(HistoryResponse::from).collect()))
}

/// Delete one of the current user's saved emails
#[utoipa::path(
    delete,
    path = "/api/history/{id}",
    tag = "history",
    params(
        ("id" = String, Path, description = "Saved email ID (UUID)"),
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "No saved email with this ID belongs to the caller", body = ErrorBody),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_history(
    State(state): State<AppState>,
    Path(id): Path<HistoryId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let not_found = || Error::NotFound {
        resource: "Email".to_string(),
        id: id.to_string(),
    };

    // Records owned by someone else are reported as missing
    let record = state.stores.history.get(id).await?.ok_or_else(not_found)?;
    if record.user_id != current_user.id {
        debug!(
            user_id = %abbrev_uuid(&current_user.id),
            record = %abbrev_uuid(&id),
            "Refusing to delete a record owned by another user"
        );
        return Err(not_found());
    }

    if !state.stores.history.delete_by_id(id).await? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::history::HistoryResponse;
    use crate::test_utils::{create_test_server, create_test_state, create_user_with_credits};
    use axum::http::StatusCode;
    use uuid::Uuid;

    #[test_log::test(tokio::test)]
    async fn test_list_requires_authentication() {
        let server = create_test_server(create_test_state(None));
        server.get("/api/history").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_list_returns_only_own_records_newest_first() {
        let state = create_test_state(None);
        let (alice, alice_token) = create_user_with_credits(&state, "alice@gmail.com", 3).await;
        let (bob, _) = create_user_with_credits(&state, "bob@gmail.com", 3).await;

        let history = &state.stores.history;
        history.append(alice.id, "first", "Email one").await.unwrap();
        history.append(bob.id, "other", "Bob's email").await.unwrap();
        history.append(alice.id, "second", "Email two").await.unwrap();

        let server = create_test_server(state.clone());
        let response = server.get("/api/history").authorization_bearer(alice_token.clone()).await;
        response.assert_status_ok();

        let records: Vec<HistoryResponse> = response.json();
        let prompts: Vec<_> = records.iter().map(|r| r.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["second", "first"]);
        assert!(records.iter().all(|r| r.user_id == alice.id));

        // Listing is stable without intervening writes
        let again: Vec<HistoryResponse> = server.get("/api/history").authorization_bearer(alice_token).await.json();
        assert_eq!(again, records);
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_own_record() {
        let state = create_test_state(None);
        let (user, token) = create_user_with_credits(&state, "owner@gmail.com", 3).await;
        let record = state.stores.history.append(user.id, "prompt", "email").await.unwrap();
        let server = create_test_server(state.clone());

        server
            .delete(&format!("/api/history/{}", record.id))
            .authorization_bearer(token.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        assert!(state.stores.history.list(user.id).await.unwrap().is_empty());

        server
            .delete(&format!("/api/history/{}", record.id))
            .authorization_bearer(token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn test_cannot_delete_someone_elses_record() {
        let state = create_test_state(None);
        let (owner, _) = create_user_with_credits(&state, "owner@gmail.com", 3).await;
        let (_, intruder_token) = create_user_with_credits(&state, "intruder@gmail.com", 3).await;
        let record = state.stores.history.append(owner.id, "prompt", "email").await.unwrap();
        let server = create_test_server(state.clone());

        server
            .delete(&format!("/api/history/{}", record.id))
            .authorization_bearer(intruder_token)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        assert_eq!(state.stores.history.list(owner.id).await.unwrap().len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_unknown_record() {
        let state = create_test_state(None);
        let (_, token) = create_user_with_credits(&state, "someone@gmail.com", 3).await;
        let server = create_test_server(state);

        server
            .delete(&format!("/api/history/{}", Uuid::new_v4()))
            .authorization_bearer(token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
