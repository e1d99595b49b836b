//! Management endpoint handlers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::http::server::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    #[serde(rename = "activeProfiles")]
    pub active_profiles: Vec<String>,
}

/// One rule as reported by `/management/rules`.
#[derive(Debug, Serialize)]
pub struct RuleView {
    pub index: usize,
    pub patterns: Vec<String>,
    pub method: Option<String>,
    pub access: String,
    pub shadowed: bool,
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "UP" }))
}

pub async fn liveness() -> impl IntoResponse {
    Json(json!({ "status": "UP" }))
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let upstream = match &state.upstream {
        Some(_) => json!({ "status": "UP" }),
        None => json!({ "status": "UNKNOWN" }),
    };
    Json(json!({ "status": "UP", "components": { "upstream": upstream } }))
}

pub async fn info(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "app": &*state.info }))
}

pub async fn prometheus(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn rules(State(state): State<AppState>) -> impl IntoResponse {
    let chain = state.chain.load();
    let table = chain.rules();
    let shadowed = table.shadowed_rules();

    let views: Vec<RuleView> = table
        .rules()
        .iter()
        .enumerate()
        .map(|(index, rule)| RuleView {
            index,
            patterns: rule.patterns().iter().map(|p| p.as_str().to_string()).collect(),
            method: rule.method().map(ToString::to_string),
            access: rule.access().to_string(),
            shadowed: shadowed.contains(&index),
        })
        .collect();

    Json(views)
}
