use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use checkin_core::CoreConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::dnf::to_dnf_bounded;
use crate::editor::{EditCommand, NodePath, RuleEditor};
use crate::expr::Expr;
use crate::graph::FlowGraph;
use crate::render::SvgRenderer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRequest {
    pub rule: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResponse {
    pub rule: Expr,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    #[serde(flatten)]
    pub graph: FlowGraph,
    /// Per node id, whether a fully passing path leads through it.
    pub path_results: Vec<Option<bool>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathCommand {
    #[serde(default)]
    pub path: NodePath,
    pub command: EditCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub rule: Expr,
    #[serde(default)]
    pub commands: Vec<PathCommand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResponse {
    pub rule: Expr,
    pub serialized: String,
    pub revision: u64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: code.into(),
            message: message.into(),
        }),
    )
}

#[derive(Clone)]
struct RuleServiceState {
    catalog: Arc<Catalog>,
    dnf_max_terms: usize,
}

/// Configuration for the rule API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleServiceConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Requests whose normal form would be larger are refused with 422.
    #[serde(default = "default_dnf_max_terms")]
    pub dnf_max_terms: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_dnf_max_terms() -> usize {
    CoreConfig::default().dnf_max_terms
}

impl Default for RuleServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            dnf_max_terms: default_dnf_max_terms(),
        }
    }
}

impl From<&CoreConfig> for RuleServiceConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            bind_address: config.http_bind.clone(),
            dnf_max_terms: config.dnf_max_terms,
        }
    }
}

/// Composes the rule analysis API router.
#[derive(Clone)]
pub struct RuleApiBuilder {
    state: RuleServiceState,
}

impl RuleApiBuilder {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            state: RuleServiceState {
                catalog: Arc::new(catalog),
                dnf_max_terms: default_dnf_max_terms(),
            },
        }
    }

    /// Caps the size of normal forms computed by `/rules/dnf`.
    pub fn with_dnf_max_terms(mut self, max_terms: usize) -> Self {
        self.state.dnf_max_terms = max_terms;
        self
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/catalog", get(catalog))
            .route("/rules/dnf", post(normalize_rule))
            .route("/rules/graph", post(layout_rule))
            .route("/rules/render", post(render_rule))
            .route("/rules/edit", post(edit_rule))
            .with_state(self.state)
    }

    /// Spawns an HTTP server binding to the configured address.
    pub async fn serve(self, config: RuleServiceConfig) -> anyhow::Result<oneshot::Sender<()>> {
        let (tx, rx) = oneshot::channel();
        let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
        let state = RuleServiceState {
            dnf_max_terms: config.dnf_max_terms,
            ..self.state
        };

        tokio::spawn(async move {
            info!(
                address = %config.bind_address,
                dnf_max_terms = config.dnf_max_terms,
                "starting rule service"
            );
            let app = RuleApiBuilder { state }.into_router();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .ok();
        });

        Ok(tx)
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn catalog(State(state): State<RuleServiceState>) -> impl IntoResponse {
    Json(state.catalog.as_ref().clone())
}

/// Runs CPU-bound rule work on the blocking pool so it cannot stall the
/// async workers.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        error!(error = %err, "rule analysis task failed");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "rule analysis failed",
        )
    })
}

async fn normalize_rule(
    State(state): State<RuleServiceState>,
    Json(payload): Json<RuleRequest>,
) -> Result<Json<RuleResponse>, ApiError> {
    let max_terms = state.dnf_max_terms;
    let rule = run_blocking(move || to_dnf_bounded(&payload.rule, max_terms))
        .await?
        .map_err(|err| {
            api_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "dnf_too_large",
                err.to_string(),
            )
        })?;
    Ok(Json(RuleResponse { rule }))
}

async fn layout_rule(Json(payload): Json<RuleRequest>) -> Result<Json<GraphResponse>, ApiError> {
    let response = run_blocking(move || {
        let graph = FlowGraph::build(&payload.rule);
        let path_results = graph.results_incl_parents();
        GraphResponse {
            graph,
            path_results,
        }
    })
    .await?;
    Ok(Json(response))
}

async fn render_rule(
    State(state): State<RuleServiceState>,
    Json(payload): Json<RuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let catalog = Arc::clone(&state.catalog);
    let svg = run_blocking(move || {
        let graph = FlowGraph::build(&payload.rule);
        SvgRenderer::new(&catalog).render(&graph)
    })
    .await?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

async fn edit_rule(
    State(state): State<RuleServiceState>,
    Json(payload): Json<EditRequest>,
) -> Result<Json<EditResponse>, ApiError> {
    let mut editor = RuleEditor::with_catalog(payload.rule, state.catalog.as_ref().clone());
    for (index, step) in payload.commands.into_iter().enumerate() {
        editor.apply(&step.path, step.command).map_err(|err| {
            api_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_command",
                format!("command {}: {}", index, err),
            )
        })?;
    }

    Ok(Json(EditResponse {
        serialized: editor.serialized().to_string(),
        revision: editor.revision(),
        rule: editor.into_root(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        RuleApiBuilder::new(Catalog::builtin()).into_router()
    }

    async fn post_json(uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
        post_json_to(router(), uri, body).await
    }

    async fn post_json_to(router: Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, bytes.to_vec())
    }

    #[test]
    fn bind_address_comes_from_core_config() {
        let core = CoreConfig {
            http_bind: "0.0.0.0:9000".into(),
            ..CoreConfig::default()
        };
        let core = CoreConfig {
            dnf_max_terms: 32,
            ..core
        };
        let config = RuleServiceConfig::from(&core);
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.dnf_max_terms, 32);
        assert_eq!(RuleServiceConfig::default().bind_address, "127.0.0.1:8090");
        assert_eq!(RuleServiceConfig::default().dnf_max_terms, 1024);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn normalizes_rules() {
        let a = json!({"==": [{"var": "entries_number"}, 0]});
        let b = json!({"==": [{"var": "entries_today"}, 0]});
        let c = json!({"==": [{"var": "entries_days"}, 0]});
        let (status, body) = post_json(
            "/rules/dnf",
            json!({"rule": {"and": [{"or": [a, b]}, c]}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(
            body["rule"],
            json!({"or": [{"and": [c, a]}, {"and": [c, b]}]})
        );
    }

    #[tokio::test]
    async fn refuses_oversized_normal_forms() {
        let pairs: Vec<Value> = (0..4)
            .map(|index| {
                json!({"or": [
                    {"==": [{"var": "entries_number"}, index]},
                    {"==": [{"var": "entries_today"}, index]}
                ]})
            })
            .collect();
        let request = json!({"rule": {"and": pairs}});
        let limited = || {
            RuleApiBuilder::new(Catalog::builtin())
                .with_dnf_max_terms(8)
                .into_router()
        };

        let (status, body) = post_json_to(limited(), "/rules/dnf", request.clone()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["code"], json!("dnf_too_large"));
        assert!(body["message"].as_str().unwrap_or_default().contains("16"));

        let (status, body) = post_json_to(router(), "/rules/dnf", request).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["rule"]["or"].as_array().map(Vec::len), Some(16));
    }

    #[tokio::test]
    async fn lays_out_graphs() {
        let (status, body) = post_json(
            "/rules/graph",
            json!({"rule": {"and": [
                {"==": [{"var": "entries_number"}, 0]},
                {"==": [{"var": "entries_today"}, 0]}
            ]}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["columns"], json!(2));
        assert_eq!(body["height"], json!(1));
        assert_eq!(body["nodes"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn renders_svg() {
        let response = router()
            .oneshot(
                Request::post("/rules/render")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"rule": {"<": [{"var": "entries_today"}, 2]}}).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"image/svg+xml"[..])
        );
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert!(String::from_utf8_lossy(&body).starts_with("<svg"));
    }

    #[tokio::test]
    async fn applies_edit_commands_in_order() {
        let (status, body) = post_json(
            "/rules/edit",
            json!({
                "rule": {"and": []},
                "commands": [
                    {"path": [], "command": {"type": "add_condition"}},
                    {"path": [0], "command": {"type": "set_variable", "name": "entries_today"}}
                ]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["revision"], json!(2));
        assert_eq!(body["rule"], json!({"and": [{"!!": [{"var": "entries_today"}]}]}));
    }

    #[tokio::test]
    async fn rejects_invalid_commands() {
        let (status, body) = post_json(
            "/rules/edit",
            json!({
                "rule": {"==": [{"var": "entries_number"}, 0]},
                "commands": [{"path": [], "command": {"type": "remove"}}]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["code"], json!("invalid_command"));
    }
}
