// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Support ticket endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::Auth,
    error::ApiError,
    models::{SupportTicket, TicketCategory, TicketPriority},
    state::AppState,
    storage::AuditEventType,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub message: String,
    /// Defaults to `general`.
    pub category: Option<TicketCategory>,
    /// Defaults to `medium`.
    pub priority: Option<TicketPriority>,
}

#[utoipa::path(
    post,
    path = "/v1/support/ticket",
    request_body = CreateTicketRequest,
    tag = "Support",
    security(("bearer" = [])),
    responses((status = 201, body = SupportTicket))
)]
pub async fn create_ticket(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<SupportTicket>), ApiError> {
    if request.subject.trim().is_empty() {
        return Err(ApiError::bad_request("Subject cannot be empty"));
    }
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }

    let ticket = state.store.create_ticket(
        user.user_id,
        request.subject.trim(),
        request.message.trim(),
        request.category.unwrap_or(TicketCategory::General),
        request.priority.unwrap_or(TicketPriority::Medium),
    )?;
    audit_log!(
        state,
        AuditEventType::TicketCreated,
        user,
        "support_ticket",
        ticket.id.to_string()
    );
    Ok((StatusCode::CREATED, Json(ticket)))
}

#[utoipa::path(
    get,
    path = "/v1/support/tickets",
    tag = "Support",
    security(("bearer" = [])),
    responses((status = 200, body = [SupportTicket]))
)]
pub async fn list_tickets(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<SupportTicket>>, ApiError> {
    let tickets = if user.is_admin {
        state.store.list_all_tickets()?
    } else {
        state.store.list_tickets(user.user_id)?
    };
    Ok(Json(tickets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::state::tests::temp_state;

    #[tokio::test]
    async fn ticket_defaults_apply() {
        let (state, _dir) = temp_state();
        let user = state
            .store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();

        let (status, Json(ticket)) = create_ticket(
            Auth(AuthenticatedUser::from(&user)),
            State(state),
            Json(CreateTicketRequest {
                subject: "Card declined".to_string(),
                message: "My card keeps getting declined".to_string(),
                category: None,
                priority: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ticket.category, TicketCategory::General);
        assert_eq!(ticket.priority, TicketPriority::Medium);
    }

    #[tokio::test]
    async fn non_admin_sees_only_their_tickets() {
        let (state, _dir) = temp_state();
        let alice = state
            .store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();
        let admin = state
            .store
            .insert_user("root", "root@example.com", "h", true)
            .unwrap();
        state
            .store
            .create_ticket(
                alice.id,
                "a",
                "b",
                TicketCategory::Account,
                TicketPriority::Low,
            )
            .unwrap();
        state
            .store
            .create_ticket(
                admin.id,
                "c",
                "d",
                TicketCategory::Billing,
                TicketPriority::High,
            )
            .unwrap();

        let Json(own) = list_tickets(
            Auth(AuthenticatedUser::from(&alice)),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(own.len(), 1);

        let Json(all) = list_tickets(Auth(AuthenticatedUser::from(&admin)), State(state))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
