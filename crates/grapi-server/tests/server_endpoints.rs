use assert_json_diff::assert_json_eq;
use grapi_graphql::UpstreamConfig;
use grapi_server::{AppConfig, build_app};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_server(api_url: &str) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let cfg = AppConfig {
        upstream: UpstreamConfig::new(api_url),
        ..AppConfig::default()
    };
    let app = build_app(&cfg).expect("build app");

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

fn app_json(api: &str, guid: &str, name: &str) -> Value {
    json!({
        "guid": guid,
        "name": name,
        "state": "STARTED",
        "links": {
            "packages": {"href": format!("{api}/v3/apps/{guid}/packages")},
            "processes": {"href": format!("{api}/v3/apps/{guid}/processes")}
        }
    })
}

async fn graphql(client: &reqwest::Client, base: &str, query: &str, token: &str) -> Value {
    let resp = client
        .post(format!("{base}/graphql"))
        .header("authorization", token)
        .json(&json!({ "query": query }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn server_endpoints_work() {
    let upstream = MockServer::start().await;
    let (base, shutdown_tx, handle) = start_server(&upstream.uri()).await;
    let client = reqwest::Client::new();

    // GET /
    let resp = client.get(format!("{base}/")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["service"], "Grapi");
    assert_eq!(body["status"], "ok");

    // GET /healthz
    let resp = client
        .get(format!("{base}/healthz"))
        .header("x-request-id", "health-1")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["x-request-id"], "health-1");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // GET /graphql with the query in URL params
    let resp = client
        .get(format!("{base}/graphql"))
        .query(&[("query", "{ _health }")])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["_health"], "ok");

    // GET /graphql with unparsable variables
    let resp = client
        .get(format!("{base}/graphql"))
        .query(&[("query", "{ _health }"), ("variables", "{not json")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["extensions"]["code"], "INVALID_QUERY");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn apps_with_packages_hits_each_upstream_url_once() {
    let upstream = MockServer::start().await;
    let api = upstream.uri();

    Mock::given(method("GET"))
        .and(path("/v3/apps"))
        .and(query_param("per_page", "1"))
        .and(header("authorization", "bearer alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pagination": {"total_results": 3},
            "resources": [app_json(&api, "a1", "my-app")]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/a1/packages"))
        .and(header("authorization", "bearer alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [
                {"guid": "pkg-1", "state": "READY"},
                {"guid": "pkg-2", "state": "FAILED"}
            ]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let (base, shutdown_tx, handle) = start_server(&api).await;
    let client = reqwest::Client::new();

    let body = graphql(
        &client,
        &base,
        "{ apps(limit: 1) { name packages { guid state } again: packages { guid } } }",
        "bearer alice",
    )
    .await;

    assert!(body.get("errors").is_none(), "unexpected errors: {body}");
    assert_json_eq!(
        body["data"],
        json!({
            "apps": [{
                "name": "my-app",
                "packages": [
                    {"guid": "pkg-1", "state": "READY"},
                    {"guid": "pkg-2", "state": "FAILED"}
                ],
                "again": [{"guid": "pkg-1"}, {"guid": "pkg-2"}]
            }]
        })
    );

    let _ = shutdown_tx.send(());
    let _ = handle.await;
    // MockServer verifies the `expect(1)` counts on drop
}

#[tokio::test]
async fn failed_relation_is_reported_next_to_sibling_data() {
    let upstream = MockServer::start().await;
    let api = upstream.uri();

    Mock::given(method("GET"))
        .and(path("/v3/apps/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(app_json(&api, "a1", "my-app")))
        .expect(1)
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/a1/packages"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/a1/processes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [{"guid": "p1", "type": "web", "instances": 3}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let (base, shutdown_tx, handle) = start_server(&api).await;
    let client = reqwest::Client::new();

    let body = graphql(
        &client,
        &base,
        r#"{ app(guid: "a1") { name packages { guid } processes { type instances } } }"#,
        "bearer bob",
    )
    .await;

    assert_json_eq!(
        body["data"],
        json!({
            "app": {
                "name": "my-app",
                "packages": null,
                "processes": [{"type": "web", "instances": 3}]
            }
        })
    );

    let errors = body["errors"].as_array().expect("errors array");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["path"], json!(["app", "packages"]));
    assert_eq!(errors[0]["extensions"]["code"], "UPSTREAM_ERROR");
    assert_eq!(errors[0]["extensions"]["status"], 502);
    assert_eq!(errors[0]["extensions"]["upstreamBody"], "bad gateway");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn each_request_uses_its_own_credential_and_cache() {
    let upstream = MockServer::start().await;
    let api = upstream.uri();

    for token in ["bearer alice", "bearer bob"] {
        Mock::given(method("GET"))
            .and(path("/v3/apps/a1"))
            .and(header("authorization", token))
            .respond_with(ResponseTemplate::new(200).set_body_json(app_json(&api, "a1", "my-app")))
            .expect(1)
            .mount(&upstream)
            .await;
    }

    let (base, shutdown_tx, handle) = start_server(&api).await;
    let client = reqwest::Client::new();

    let query = r#"{ app(guid: "a1") { name } }"#;
    let (alice, bob) = tokio::join!(
        graphql(&client, &base, query, "bearer alice"),
        graphql(&client, &base, query, "bearer bob"),
    );

    assert_eq!(alice["data"]["app"]["name"], "my-app");
    assert_eq!(bob["data"]["app"]["name"], "my-app");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
