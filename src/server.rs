//!
//! src/server.rs
//!
//! HTTP surface: health, login, and the graphql endpoint. Bearer tokens are
//! checked here and the caller is handed to graphql as request data.
//!

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use async_graphql::Pos;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing::{debug, error};

use crate::auth::{AuthService, LoginRequest, LoginResponse};
use crate::catalog::TrackCatalog;
use crate::config::AuthConfig;
use crate::errors::{CatalogError, ErrorKind};
use crate::fetch::MetadataProvider;
use crate::graphql::{create_schema, surface, GraphQLSchema};
use crate::persistent::SqliteCatalog;
use crate::resolver::Resolver;

#[derive(Clone)]
pub struct AppState {
    pub schema: GraphQLSchema,
    pub auth: AuthService,
}

impl AppState {
    /// Wires store, provider, resolver, catalog and auth together
    pub fn build(
        store: Arc<SqliteCatalog>,
        provider: Arc<dyn MetadataProvider>,
        auth_cfg: &AuthConfig,
    ) -> Self {
        let resolver = Resolver::new(store.clone(), provider);
        let catalog = TrackCatalog::new(store.clone(), resolver);
        Self {
            schema: create_schema(catalog),
            auth: AuthService::new(store, auth_cfg),
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = StatusCode::from_u16(kind.status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match kind {
            ErrorKind::InternalError => error!(error = %self, "http.error"),
            _ => debug!(code = kind.code(), error = %self, "http.rejected"),
        }
        let body = serde_json::json!({
            "statusCode": status.as_u16(),
            "message": self.public_message(),
            "code": kind.code(),
        });
        (status, Json(body)).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, CatalogError> {
    let Json(req) = body.map_err(|e| CatalogError::BadRequest(e.body_text()))?;
    state.auth.login(&req).await.map(Json)
}

/// Unauthenticated requests still execute; every operation then fails
/// with UNAUTHENTICATED because no caller is attached. Any other failure
/// while checking the token answers the whole request with its own code.
async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let mut req = req.into_inner();
    match state.auth.authenticate(header).await {
        Ok(user) => req = req.data(user),
        Err(e) if e.kind() == ErrorKind::Unauthenticated => debug!(reason = %e, "auth.rejected"),
        Err(e) => {
            let err = surface("authenticate", e).into_server_error(Pos::default());
            return async_graphql::Response::from_errors(vec![err]).into();
        }
    }
    state.schema.execute(req).await.into()
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/graphql", post(graphql_handler).get(graphql_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
