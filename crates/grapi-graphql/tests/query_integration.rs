//! Integration tests for GraphQL query execution.
//!
//! These tests run complete queries through the platform schema against an
//! in-memory upstream and check both the response shape and the upstream
//! traffic the query caused.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use assert_json_diff::assert_json_eq;
use async_graphql::dynamic::Schema;
use grapi_graphql::{
    Credential, FetchError, GraphQLContext, PlatformSchemaBuilder, SchemaBuilderConfig,
    UpstreamClient,
};
use serde_json::json;

const BASE: &str = "http://api.test";

// =============================================================================
// Stub Upstream
// =============================================================================

/// In-memory upstream serving canned documents by path.
struct StubUpstream {
    documents: HashMap<String, serde_json::Value>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl StubUpstream {
    fn new(documents: serde_json::Value) -> Arc<Self> {
        let documents = documents
            .as_object()
            .expect("documents keyed by path")
            .iter()
            .map(|(path, doc)| (format!("{BASE}{path}"), doc.clone()))
            .collect();
        Arc::new(Self {
            documents,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls_to(&self, path: &str) -> usize {
        let url = format!("{BASE}{path}");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == url)
            .count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn credentials(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl UpstreamClient for StubUpstream {
    async fn get_json(
        &self,
        url: &str,
        credential: Option<&Credential>,
    ) -> Result<serde_json::Value, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), credential.map(|c| c.as_str().to_string())));

        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Upstream {
                url: url.to_string(),
                status: 404,
                body: Some("{\"errors\":[{\"title\":\"CF-ResourceNotFound\"}]}".into()),
            })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn app(guid: &str, name: &str) -> serde_json::Value {
    json!({
        "guid": guid,
        "name": name,
        "state": "STARTED",
        "created_at": "2017-01-01T00:00:00Z",
        "links": {
            "self": {"href": format!("{BASE}/v3/apps/{guid}")},
            "packages": {"href": format!("{BASE}/v3/apps/{guid}/packages")},
            "processes": {"href": format!("{BASE}/v3/apps/{guid}/processes")},
            "droplets": {"href": format!("{BASE}/v3/apps/{guid}/droplets")},
            "current_droplet": {"href": format!("{BASE}/v3/apps/{guid}/droplets/current")},
            "route_mappings": {"href": format!("{BASE}/v3/apps/{guid}/route_mappings")}
        }
    })
}

fn process(app_guid: &str, process_type: &str) -> serde_json::Value {
    let guid = format!("{app_guid}-{process_type}");
    json!({
        "guid": guid,
        "type": process_type,
        "command": "bundle exec rackup",
        "instances": 2,
        "memory_in_mb": 256,
        "disk_in_mb": 1024,
        "links": {
            "app": {"href": format!("{BASE}/v3/apps/{app_guid}")},
            "stats": {"href": format!("{BASE}/v3/processes/{guid}/stats")}
        }
    })
}

fn documents() -> serde_json::Value {
    json!({
        "/v3/apps?per_page=1": {
            "pagination": {"total_results": 2},
            "resources": [app("a1", "my-app")]
        },
        "/v3/apps": {"resources": [app("a1", "my-app"), app("a2", "other-app")]},
        "/v3/apps/a1": app("a1", "my-app"),
        "/v3/apps/a1/packages": {"resources": [
            {"guid": "pkg-1", "type": "bits", "state": "READY"},
            {"guid": "pkg-2", "type": "bits", "state": "PROCESSING_UPLOAD"}
        ]},
        "/v3/apps/a1/processes": {"resources": [process("a1", "web"), process("a1", "worker")]},
        "/v3/apps/a1/droplets": {"resources": [
            {"guid": "d-1", "state": "STAGED", "stack": "cflinuxfs2"}
        ]},
        "/v3/apps/a1/droplets/current": {"guid": "d-1", "state": "STAGED", "stack": "cflinuxfs2"},
        "/v3/apps/a1/route_mappings": {"resources": [
            {"links": {
                "route": {"href": format!("{BASE}/v2/routes/r1")},
                "process": {"href": format!("{BASE}/v3/apps/a1/processes/web")}
            }},
            {"links": {"route": {"href": format!("{BASE}/v2/routes/r2")}}}
        ]},
        "/v2/routes/r1": {
            "metadata": {"guid": "r1"},
            "entity": {"host": "www", "path": "", "domain_url": "/v2/shared_domains/dom-1"}
        },
        "/v2/routes/r2": {
            "metadata": {"guid": "r2"},
            "entity": {"host": "api", "path": "/v1", "domain_url": "/v2/shared_domains/dom-1"}
        },
        "/v2/shared_domains/dom-1": {
            "metadata": {"guid": "dom-1"},
            "entity": {"name": "example.com"}
        },
        "/v3/processes/a1-web/stats": {"resources": [
            {
                "index": 0, "state": "RUNNING", "host": "10.0.0.1", "uptime": 42,
                "usage": {"cpu": 0.5, "mem": 1024, "disk": 2048},
                "mem_quota": 4096, "disk_quota": 8192
            }
        ]},
        "/v3/apps/a2/packages": {"resources": []}
    })
}

fn schema() -> Schema {
    PlatformSchemaBuilder::new(SchemaBuilderConfig::default())
        .build()
        .expect("schema should build")
}

fn context(upstream: &Arc<StubUpstream>, credential: Option<&str>) -> GraphQLContext {
    GraphQLContext::builder()
        .with_upstream(upstream.clone())
        .with_base_url(BASE)
        .with_credential(credential.map(Credential::new))
        .with_request_id("test-request")
        .build()
        .expect("context should build")
}

async fn execute(
    schema: &Schema,
    upstream: &Arc<StubUpstream>,
    query: &str,
) -> async_graphql::Response {
    let request = async_graphql::Request::new(query).data(context(upstream, Some("bearer test")));
    schema.execute(request).await
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_apps_with_packages_fetches_each_list_once() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();

    let response = execute(
        &schema,
        &upstream,
        "{ apps(limit: 1) { name packages { guid state } } }",
    )
    .await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_json_eq!(
        response.data.into_json().unwrap(),
        json!({
            "apps": [{
                "name": "my-app",
                "packages": [
                    {"guid": "pkg-1", "state": "READY"},
                    {"guid": "pkg-2", "state": "PROCESSING_UPLOAD"}
                ]
            }]
        })
    );
    assert_eq!(upstream.calls_to("/v3/apps?per_page=1"), 1);
    assert_eq!(upstream.calls_to("/v3/apps/a1/packages"), 1);
    assert_eq!(upstream.total_calls(), 2);
}

#[tokio::test]
async fn test_failed_relation_does_not_fail_siblings() {
    let mut docs = documents();
    docs.as_object_mut().unwrap().remove("/v3/apps/a1/packages");
    let upstream = StubUpstream::new(docs);
    let schema = schema();

    let response = execute(
        &schema,
        &upstream,
        r#"{ app(guid: "a1") { name packages { guid } processes { type } } }"#,
    )
    .await;

    assert_eq!(response.errors.len(), 1);
    let error = &response.errors[0];
    let extensions = error.extensions.as_ref().expect("error extensions");
    assert_eq!(
        extensions.get("code"),
        Some(&async_graphql::Value::from("UPSTREAM_ERROR"))
    );
    assert_eq!(extensions.get("status"), Some(&async_graphql::Value::from(404u16)));

    assert_json_eq!(
        response.data.into_json().unwrap(),
        json!({
            "app": {
                "name": "my-app",
                "packages": null,
                "processes": [{"type": "web"}, {"type": "worker"}]
            }
        })
    );
}

#[tokio::test]
async fn test_repeated_relations_are_fetched_once() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();

    let response = execute(
        &schema,
        &upstream,
        r#"{
            first: app(guid: "a1") { packages { guid } currentDroplet { guid } }
            second: app(guid: "a1") { packages { state } droplets { guid } }
        }"#,
    )
    .await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(upstream.calls_to("/v3/apps/a1"), 1);
    assert_eq!(upstream.calls_to("/v3/apps/a1/packages"), 1);
    assert_eq!(upstream.calls_to("/v3/apps/a1/droplets/current"), 1);
    assert_eq!(upstream.calls_to("/v3/apps/a1/droplets"), 1);
}

#[tokio::test]
async fn test_failures_are_replayed_within_request() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();

    let response = execute(
        &schema,
        &upstream,
        r#"{ a: app(guid: "missing") { name } b: app(guid: "missing") { guid } }"#,
    )
    .await;

    assert_eq!(response.errors.len(), 2);
    assert_eq!(upstream.calls_to("/v3/apps/missing"), 1);
}

#[tokio::test]
async fn test_requests_do_not_share_cache() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();

    for _ in 0..2 {
        let response = execute(&schema, &upstream, r#"{ app(guid: "a1") { name } }"#).await;
        assert!(response.errors.is_empty());
    }

    assert_eq!(upstream.calls_to("/v3/apps/a1"), 2);
}

#[tokio::test]
async fn test_process_routes_and_domains() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();

    let response = execute(
        &schema,
        &upstream,
        r#"{ app(guid: "a1") {
            processes { type routes { guid host path domain { guid name } } }
        } }"#,
    )
    .await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_json_eq!(
        response.data.into_json().unwrap(),
        json!({
            "app": {
                "processes": [
                    {
                        "type": "web",
                        "routes": [
                            {
                                "guid": "r1", "host": "www", "path": "",
                                "domain": {"guid": "dom-1", "name": "example.com"}
                            },
                            {
                                "guid": "r2", "host": "api", "path": "/v1",
                                "domain": {"guid": "dom-1", "name": "example.com"}
                            }
                        ]
                    },
                    {"type": "worker", "routes": []}
                ]
            }
        })
    );

    // Both processes walk through the same app and mapping list
    assert_eq!(upstream.calls_to("/v3/apps/a1"), 1);
    assert_eq!(upstream.calls_to("/v3/apps/a1/route_mappings"), 1);
    assert_eq!(upstream.calls_to("/v2/routes/r1"), 1);
    assert_eq!(upstream.calls_to("/v2/shared_domains/dom-1"), 1);
}

#[tokio::test]
async fn test_process_stats() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();

    let response = execute(
        &schema,
        &upstream,
        r#"{ app(guid: "a1") {
            processes { type instances stats { index state cpu memoryUsage diskQuota } }
        } }"#,
    )
    .await;

    assert_eq!(response.errors.len(), 1, "worker has no stats document");
    let data = response.data.into_json().unwrap();
    assert_json_eq!(
        data["app"]["processes"][0],
        json!({
            "type": "web",
            "instances": 2,
            "stats": [
                {"index": 0, "state": "RUNNING", "cpu": 0.5, "memoryUsage": 1024, "diskQuota": 8192}
            ]
        })
    );
    assert_eq!(data["app"]["processes"][1]["stats"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_credential_is_forwarded_on_every_fetch() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();

    let response =
        execute(&schema, &upstream, r#"{ app(guid: "a1") { packages { guid } } }"#).await;
    assert!(response.errors.is_empty());

    let credentials = upstream.credentials();
    assert_eq!(credentials.len(), 2);
    assert!(
        credentials
            .iter()
            .all(|c| c.as_deref() == Some("bearer test"))
    );
}

#[tokio::test]
async fn test_invalid_guid_is_rejected_without_fetch() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();

    let response = execute(&schema, &upstream, r#"{ app(guid: "../v2/info") { name } }"#).await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(upstream.total_calls(), 0);
}

#[tokio::test]
async fn test_sibling_relations_are_fetched_in_one_batch() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();
    let context = context(&upstream, Some("bearer test"));
    let loaders = context.loaders.clone();

    let request = async_graphql::Request::new(
        r#"{ app(guid: "a1") { packages { guid } processes { guid } droplets { guid } } }"#,
    )
    .data(context);
    let response = schema.execute(request).await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    let stats = loaders.stats();
    // One batch for the app, one for all three of its relations
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.fetches, 4);
    assert_eq!(upstream.total_calls(), 4);
}

#[tokio::test]
async fn test_relations_of_listed_apps_share_one_batch() {
    let upstream = StubUpstream::new(documents());
    let schema = schema();
    let context = context(&upstream, Some("bearer test"));
    let loaders = context.loaders.clone();

    let request =
        async_graphql::Request::new("{ apps { name packages { guid } processes { type } } }")
            .data(context);
    let response = schema.execute(request).await;

    // a2 has no processes document
    assert_eq!(response.errors.len(), 1);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["apps"][0]["processes"][0]["type"], "web");
    assert_eq!(data["apps"][1]["packages"], json!([]));

    let stats = loaders.stats();
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.fetches, 5);
}
