//! Admin endpoints
//!
//! Authenticated by a shared `secret` query parameter compared against
//! `admin.secret`. With no secret configured every admin call is rejected.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use careline_core::Organization;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::state::AppState;
use crate::ServerError;

const DEFAULT_NOTIFICATION_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct AdminParams {
    pub secret: Option<String>,
    pub tenant: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub unseen: bool,
    pub limit: Option<usize>,
}

impl AdminParams {
    fn authorize(&self, state: &AppState) -> Result<(), ServerError> {
        if state.admin_authorized(self.secret.as_deref()) {
            Ok(())
        } else {
            tracing::warn!("Rejected admin request");
            Err(ServerError::Forbidden)
        }
    }

    fn required_tenant(&self) -> Result<&str, ServerError> {
        self.tenant
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServerError::InvalidRequest("tenant is required".to_string()))
    }

    fn required_phone(&self) -> Result<&str, ServerError> {
        self.phone
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ServerError::InvalidRequest("phone is required".to_string()))
    }
}

async fn organization(state: &AppState, tenant: &str) -> Result<Organization, ServerError> {
    state
        .engine
        .tenants()
        .by_id(tenant)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("tenant {}", tenant)))
}

/// `POST /admin/cache/refresh`
pub async fn refresh_cache(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let dropped = state.engine.tenants().refresh(params.tenant.as_deref());
    tracing::info!(tenant = ?params.tenant, dropped, "Tenant cache refreshed");
    Ok(Json(json!({ "status": "ok", "dropped": dropped })))
}

/// `POST /admin/knowledge/clear`
pub async fn clear_knowledge(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let cleared = state.engine.knowledge().clear(params.tenant.as_deref());
    tracing::info!(tenant = ?params.tenant, cleared, "Knowledge cache cleared");
    Ok(Json(json!({ "status": "ok", "cleared": cleared })))
}

/// `GET /admin/tenants`
pub async fn list_tenants(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let tenants: Vec<Value> = state
        .engine
        .tenants()
        .list()
        .await?
        .into_iter()
        .map(|org| {
            json!({
                "id": org.id,
                "name": org.name,
                "active": org.active,
                "doctors": org.doctors.len(),
            })
        })
        .collect();
    Ok(Json(json!({ "count": tenants.len(), "tenants": tenants })))
}

/// `GET /admin/contacts?phone=..[&tenant=..]`
pub async fn find_contacts(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let phone = params.required_phone()?;
    let contacts = state
        .engine
        .stores()
        .contacts
        .find_by_phone(phone, params.tenant.as_deref())
        .await?;
    Ok(Json(json!({ "count": contacts.len(), "contacts": contacts })))
}

/// `POST /admin/contacts/welcome?tenant=..&phone=..`
pub async fn resend_welcome(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let organization = organization(&state, params.required_tenant()?).await?;
    let phone = params.required_phone()?;

    if !state.engine.contacts().resend_welcome(&organization, phone).await? {
        return Err(ServerError::NotFound(format!("contact {}", phone)));
    }
    Ok(Json(json!({ "status": "sent" })))
}

/// `POST /admin/backfill[?tenant=..]`
pub async fn backfill(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let updated = state.engine.backfill(params.tenant.as_deref()).await?;
    Ok(Json(json!({ "status": "ok", "updated": updated })))
}

/// `GET /admin/notifications?tenant=..[&unseen=true][&limit=..]`
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let tenant = params.required_tenant()?;
    let notifications = state
        .engine
        .stores()
        .notifications
        .list(
            tenant,
            params.unseen,
            params.limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT),
        )
        .await?;
    Ok(Json(json!({ "count": notifications.len(), "notifications": notifications })))
}

/// `GET /admin/notifications/count?tenant=..`
pub async fn count_notifications(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let tenant = params.required_tenant()?;
    let unseen = state
        .engine
        .stores()
        .notifications
        .count_unseen(tenant)
        .await?;
    Ok(Json(json!({ "unseen": unseen })))
}

#[derive(Debug, Deserialize)]
pub struct MarkSeenRequest {
    pub ids: Vec<Uuid>,
}

/// `POST /admin/notifications/seen?tenant=..` with `{"ids": [...]}`
///
/// The body is decoded only after the secret checks out.
pub async fn mark_notifications_seen(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
    body: Bytes,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let tenant = params.required_tenant()?;
    let request: MarkSeenRequest = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequest(format!("invalid body: {}", e)))?;
    let marked = state
        .engine
        .stores()
        .notifications
        .mark_seen(tenant, &request.ids)
        .await?;
    Ok(Json(json!({ "marked": marked })))
}

/// `GET /admin/tenants/:id/selftest`
///
/// Reports credential presence, Graph API reachability and whether a
/// knowledge source loads. Token values are never echoed.
pub async fn selftest(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(params): Query<AdminParams>,
) -> Result<Json<Value>, ServerError> {
    params.authorize(&state)?;
    let organization = organization(&state, &tenant).await?;

    let credentials = json!({
        "access_token": !organization.whatsapp.access_token.trim().is_empty(),
        "phone_number_id": !organization.whatsapp.phone_number_id.trim().is_empty(),
    });

    let graph_api = match state.whatsapp.check(&organization).await {
        Ok(()) => json!({ "status": "ok" }),
        Err(e) => json!({ "status": "error", "error": e.to_string() }),
    };

    let knowledge = match state.engine.knowledge().load(&organization).await {
        Some(text) => json!({ "status": "ok", "chars": text.len() }),
        None => json!({ "status": "missing" }),
    };

    Ok(Json(json!({
        "tenant": organization.id,
        "active": organization.active,
        "credentials": credentials,
        "graph_api": graph_api,
        "knowledge": knowledge,
    })))
}
