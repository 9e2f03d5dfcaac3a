use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use hub_core::{ensure_ip, OrgId};

use crate::AppState;

#[derive(Serialize)]
struct AllocateIpResponse {
    virtual_ip: String,
}

#[derive(Serialize)]
struct OrgIpsResponse {
    org_id: OrgId,
    ips: Vec<String>,
}

/// `POST /organizations/{org_id}/allocate_ip` (original
/// `app/api/virtual_ip.py`'s `allocate_ip`, kept as a thin control-plane
/// endpoint outside the signaling core per §6.2).
///
/// The caller is the same user whose token authenticated the request; this
/// demo wiring takes the user id as a query-less path-adjacent concept is
/// out of scope (no HTTP auth middleware here), so a `user_id` query param
/// stands in for the `get_current_user` dependency the original uses.
pub async fn allocate_ip(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<OrgId>,
    axum::extract::Query(params): axum::extract::Query<AllocateIpParams>,
) -> Response {
    match ensure_ip(state.store.as_ref(), params.user_id, org_id).await {
        Ok(ip) => Json(AllocateIpResponse {
            virtual_ip: ip.to_string(),
        })
        .into_response(),
        Err(e) => {
            log::error!("allocate_ip failed for org {org_id}: {e}");
            (StatusCode::BAD_REQUEST, e.wire_message()).into_response()
        }
    }
}

#[derive(serde::Deserialize)]
pub struct AllocateIpParams {
    user_id: hub_core::UserId,
}

/// `GET /organizations/{org_id}/ips` (original `app/api/virtual_ip.py`'s
/// `get_organization_ips`).
pub async fn list_ips(State(state): State<Arc<AppState>>, Path(org_id): Path<OrgId>) -> Response {
    match state.store.list_used_ips(org_id).await {
        Ok(ips) => Json(OrgIpsResponse {
            org_id,
            ips: ips.iter().map(|ip| ip.to_string()).collect(),
        })
        .into_response(),
        Err(e) => {
            log::error!("list_ips failed for org {org_id}: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Plain liveness probe (§6.2 NEW): 200 once the listener is bound.
pub async fn healthz() -> &'static str {
    "ok"
}
