//! Axum HTTP handlers for GraphQL endpoints.
//!
//! This module provides the HTTP handlers for GraphQL requests:
//! - `POST /graphql` - JSON body `{query, operationName, variables}`
//! - `GET /graphql` - query, operation name and variables as URL params
//!
//! Every request gets its own [`GraphQLContext`]: fresh loaders, a fresh
//! request cache and the request's own `Authorization` header as the
//! upstream credential.

use std::sync::Arc;

use async_graphql::dynamic::Schema;
use async_graphql::{Request, Response, Variables};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use crate::context::{GraphQLContext, GraphQLContextBuilder};
use crate::error::GraphQLError;
use crate::loaders::LoaderSettings;
use crate::upstream::{Credential, DynUpstream};

/// State shared across GraphQL handlers.
#[derive(Clone)]
pub struct GraphQLState {
    /// The platform schema, built once at startup.
    pub schema: Arc<Schema>,

    /// Context builder template with shared dependencies.
    pub context_template: GraphQLContextTemplate,
}

/// Template for building per-request GraphQL context.
///
/// This contains the shared dependencies that are cloned into each request's context.
#[derive(Clone)]
pub struct GraphQLContextTemplate {
    pub upstream: DynUpstream,
    pub base_url: String,
    pub loader_settings: LoaderSettings,
}

/// GraphQL request body.
#[derive(Debug, Deserialize)]
pub struct GraphQLRequest {
    /// The GraphQL query string.
    pub query: String,

    /// Optional operation name for multi-operation documents.
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,

    /// Optional variables for the query.
    pub variables: Option<serde_json::Value>,
}

/// Query parameters for GET requests.
#[derive(Debug, Deserialize)]
pub struct GraphQLQueryParams {
    /// The GraphQL query string.
    pub query: Option<String>,

    /// Optional operation name.
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,

    /// Optional variables (JSON string).
    pub variables: Option<String>,
}

/// GraphQL response body.
#[derive(Debug, Serialize)]
pub struct GraphQLResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<serde_json::Value>,
}

impl From<Response> for GraphQLResponse {
    fn from(resp: Response) -> Self {
        let data_json = serde_json::to_value(&resp.data).unwrap_or(serde_json::Value::Null);
        let data = if data_json.is_null() {
            None
        } else {
            Some(data_json)
        };

        // ServerError already serializes as {message, locations, path, extensions}
        let errors = resp
            .errors
            .iter()
            .map(|e| {
                serde_json::to_value(e)
                    .unwrap_or_else(|_| serde_json::json!({"message": e.message}))
            })
            .collect();

        Self { data, errors }
    }
}

/// Handles POST requests to /graphql.
pub async fn graphql_handler(
    State(state): State<GraphQLState>,
    headers: HeaderMap,
    Json(request): Json<GraphQLRequest>,
) -> impl IntoResponse {
    debug!("Processing GraphQL request");
    execute_graphql(state, headers, request).await.into_response()
}

/// Handles GET requests to /graphql.
///
/// This endpoint supports GraphQL queries via URL query parameters.
pub async fn graphql_handler_get(
    State(state): State<GraphQLState>,
    headers: HeaderMap,
    Query(params): Query<GraphQLQueryParams>,
) -> impl IntoResponse {
    let request = match params_to_request(params) {
        Ok(req) => req,
        Err(e) => {
            return error_response(GraphQLError::InvalidQuery(e.to_string())).into_response();
        }
    };

    debug!("Processing GraphQL GET request");
    execute_graphql(state, headers, request).await.into_response()
}

/// Executes a GraphQL request.
async fn execute_graphql(
    state: GraphQLState,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> impl IntoResponse {
    if request.query.trim().is_empty() {
        return error_response(GraphQLError::InvalidQuery("missing query".into())).into_response();
    }

    // Extract request ID from headers (set by middleware)
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let context = match build_context(&state.context_template, &headers, request_id.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            let error = GraphQLError::Internal(format!("request context: {e}"));
            return error_response(error).into_response();
        }
    };

    let mut gql_request = Request::new(&request.query);

    if let Some(op_name) = request.operation_name {
        gql_request = gql_request.operation_name(op_name);
    }

    if let Some(vars) = request.variables {
        let variables = Variables::from_json(vars);
        gql_request = gql_request.variables(variables);
    }

    gql_request = gql_request.data(context);

    debug!(query = %request.query, "Executing GraphQL query");
    // The context, and with it the request cache, is dropped when execution ends
    let response = state
        .schema
        .execute(gql_request)
        .instrument(info_span!("graphql", request_id = %request_id))
        .await;

    if !response.errors.is_empty() {
        warn!(
            request_id = %request_id,
            errors = response.errors.len(),
            "GraphQL query completed with errors"
        );
    }

    // GraphQL always returns 200 OK, even with field errors
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Json(GraphQLResponse::from(response)),
    )
        .into_response()
}

/// Builds a GraphQL context from the template and the request headers.
fn build_context(
    template: &GraphQLContextTemplate,
    headers: &HeaderMap,
    request_id: String,
) -> Result<GraphQLContext, crate::context::ContextBuilderError> {
    GraphQLContextBuilder::new()
        .with_upstream(template.upstream.clone())
        .with_base_url(template.base_url.clone())
        .with_credential(credential_from_headers(headers))
        .with_request_id(request_id)
        .with_loader_settings(template.loader_settings.clone())
        .build()
}

/// Captures the incoming `Authorization` header verbatim.
fn credential_from_headers(headers: &HeaderMap) -> Option<Credential> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(Credential::new)
}

/// Converts GET query params to a GraphQL request.
fn params_to_request(params: GraphQLQueryParams) -> Result<GraphQLRequest, serde_json::Error> {
    let variables = if let Some(vars_str) = params.variables {
        Some(serde_json::from_str(&vars_str)?)
    } else {
        None
    };

    Ok(GraphQLRequest {
        query: params.query.unwrap_or_default(),
        operation_name: params.operation_name,
        variables,
    })
}

/// Returns an error response.
fn error_response(error: GraphQLError) -> impl IntoResponse {
    let status = match error.status_code() {
        400 => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(error.to_response_body()),
    )
}
