use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use grapi_graphql::handler::{GraphQLContextTemplate, GraphQLState};
use grapi_graphql::{HttpUpstream, PlatformSchemaBuilder, graphql_handler, graphql_handler_get};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppConfig, handlers, middleware as app_middleware};

pub struct GrapiServer {
    addr: SocketAddr,
    app: Router,
}

/// Builds the GraphQL state: the schema, shared by all requests, and the
/// template every request's context is built from.
pub fn build_graphql_state(cfg: &AppConfig) -> anyhow::Result<GraphQLState> {
    let schema = PlatformSchemaBuilder::new(cfg.graphql.to_schema_builder_config()).build()?;
    let upstream = HttpUpstream::new(&cfg.upstream)?.into_dyn();

    tracing::info!(
        api_url = %cfg.upstream.base_url(),
        force_http = cfg.upstream.force_http,
        max_batch_size = cfg.graphql.max_batch_size,
        "GraphQL facade initialized"
    );

    Ok(GraphQLState {
        schema: Arc::new(schema),
        context_template: GraphQLContextTemplate {
            upstream,
            base_url: cfg.upstream.base_url().to_string(),
            loader_settings: cfg.graphql.to_loader_settings(),
        },
    })
}

pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let body_limit = cfg.server.body_limit_bytes;
    let graphql_state = build_graphql_state(cfg)?;

    let graphql = Router::new()
        .route("/graphql", get(graphql_handler_get).post(graphql_handler))
        .with_state(graphql_state);

    let app = Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .merge(graphql)
        // Middleware stack (order: request id -> compression/cors/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .headers()
                        .get(app_middleware::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status().as_u16();
                        span.record("http.status_code", tracing::field::display(status));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit));

    Ok(app)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<GrapiServer> {
        let app = build_app(&self.config)?;

        Ok(GrapiServer {
            addr: self.addr,
            app,
        })
    }
}

impl GrapiServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
