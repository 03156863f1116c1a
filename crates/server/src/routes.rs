use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ServerError;
use crate::state::ServerState;

fn parse_cano_id(raw: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::BadRequest(format!("invalid canonical id: {raw}")))
}

/// GET /canonical/{file_name} -> 200 { "cano_id": ... }, 404 if unknown.
pub async fn canonical_by_file_name(
    State(state): State<Arc<ServerState>>,
    Path(file_name): Path<String>,
) -> Result<Json<Value>, ServerError> {
    match state.hierarchy.canonical_of(&file_name)? {
        Some(id) => Ok(Json(json!({ "cano_id": id }))),
        None => Err(ServerError::NotFound),
    }
}

/// GET /documents/{cano_id} -> 200 array of file names (possibly empty).
pub async fn documents_by_cano_id(
    State(state): State<Arc<ServerState>>,
    Path(cano_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let cano_id = parse_cano_id(&cano_id)?;
    let names = state.hierarchy.documents_of(cano_id)?;
    Ok(Json(json!(names)))
}

/// GET /children/{cano_id} -> 200 array of canonical ids. Empty list is a
/// valid 200 response rather than a 404, since "no children" is not an
/// error condition.
pub async fn children_by_cano_id(
    State(state): State<Arc<ServerState>>,
    Path(cano_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let cano_id = parse_cano_id(&cano_id)?;
    let children = state.hierarchy.children_of(cano_id)?;
    Ok(Json(json!(children)))
}

/// GET /parent/{cano_id} -> 200 { "parent_id": ... }, 404 if none.
pub async fn parent_by_cano_id(
    State(state): State<Arc<ServerState>>,
    Path(cano_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let cano_id = parse_cano_id(&cano_id)?;
    match state.hierarchy.parent_of(cano_id)? {
        Some(id) => Ok(Json(json!({ "parent_id": id }))),
        None => Err(ServerError::NotFound),
    }
}

/// GET /upstream/{cano_id} -> 200 with the root-first chain string.
pub async fn upstream_chain_by_cano_id(
    State(state): State<Arc<ServerState>>,
    Path(cano_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let cano_id = parse_cano_id(&cano_id)?;
    let chain = state.hierarchy.upstream_chain(cano_id)?;
    Ok(Json(json!({ "chain": chain })))
}
