use std::net::SocketAddr;

use axum::Router;
use checkin::rules::RuleApiBuilder;
use checkin::Catalog;
use serde_json::{json, Value};
use test_case::test_case;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct HttpService {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
}

async fn spawn_http_service(router: Router) -> anyhow::Result<HttpService> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await
            .ok();
    });

    Ok(HttpService { addr, shutdown: tx })
}

async fn rule_service() -> anyhow::Result<HttpService> {
    spawn_http_service(RuleApiBuilder::new(Catalog::builtin()).into_router()).await
}

#[tokio::test]
async fn serves_catalog_and_health() -> anyhow::Result<()> {
    let service = rule_service().await?;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("http://{}/health", service.addr))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(health, json!({"status": "ok"}));

    let catalog: Catalog = client
        .get(format!("http://{}/catalog", service.addr))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(catalog, Catalog::builtin());

    let _ = service.shutdown.send(());
    Ok(())
}

#[test_case(json!({}), 0 ; "empty rule draws only the final checkmark")]
#[test_case(json!({"<": [{"var": "entries_today"}, 2]}), 1 ; "single condition")]
#[test_case(json!({"and": [
    {"or": [{"==": [{"var": "entries_number"}, 0]}, {">": [{"var": "minutes_since_last_entry"}, 30]}]},
    {"isAfter": [{"var": "now"}, {"buildTime": ["date_admission"]}]}
]}), 3 ; "converging paths")]
#[tokio::test]
async fn renders_one_box_per_condition(rule: Value, boxes: usize) -> anyhow::Result<()> {
    let service = rule_service().await?;
    let response = reqwest::Client::new()
        .post(format!("http://{}/rules/render", service.addr))
        .json(&json!({ "rule": rule }))
        .send()
        .await?;
    assert!(response.status().is_success());
    let svg = response.text().await?;
    assert_eq!(svg.matches("<rect").count(), boxes);

    let _ = service.shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn edit_then_normalize_round() -> anyhow::Result<()> {
    let service = rule_service().await?;
    let client = reqwest::Client::new();

    let edited: Value = client
        .post(format!("http://{}/rules/edit", service.addr))
        .json(&json!({
            "rule": {"<": [{"var": "entries_today"}, 2]},
            "commands": [
                {"path": [], "command": {"type": "wrap_and"}},
                {"path": [], "command": {"type": "add_condition"}},
                {"path": [1], "command": {"type": "set_variable", "name": "or"}},
                {"path": [1], "command": {"type": "add_condition"}},
                {"path": [1], "command": {"type": "add_condition"}}
            ]
        }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(edited["revision"], json!(5));
    assert_eq!(
        edited["rule"],
        json!({"and": [{"<": [{"var": "entries_today"}, 2]}, {"or": [{"": []}, {"": []}]}]})
    );

    let normalized: Value = client
        .post(format!("http://{}/rules/dnf", service.addr))
        .json(&json!({ "rule": edited["rule"] }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(
        normalized["rule"],
        json!({"or": [
            {"and": [{"<": [{"var": "entries_today"}, 2]}, {"": []}]},
            {"and": [{"<": [{"var": "entries_today"}, 2]}, {"": []}]}
        ]})
    );

    let _ = service.shutdown.send(());
    Ok(())
}
