//! MLflow model resolution against a scripted tracking server.
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use mlokit_core::{HttpMethod, HttpResponse};
use mlokit_resolve::{MlflowClient, MlflowEndpoints};
use mlokit_testkit::fixtures::{self, json};
use mlokit_testkit::{init_test_tracing, ScriptedHttp};

const SERVER: &str = "https://mlflow.local";
const CREDENTIAL: &str = "alice;s3cret";

fn api() -> MlflowEndpoints {
    MlflowEndpoints::new(SERVER).unwrap()
}

fn registry(http: ScriptedHttp) -> ScriptedHttp {
    let api = api();
    http.on_get_json(
        &api.search(None).unwrap(),
        json!({
            "model_versions": [
                fixtures::mlflow_model_version("Churn", "3", "run-churn"),
                fixtures::mlflow_model_version("Churn", "2", "run-old"),
            ],
            "next_page_token": "p2",
        }),
    )
    .on_get_json(
        &api.search(Some("p2")).unwrap(),
        json!({
            "model_versions": [
                {"name": "fraud", "version": 7, "run_id": "run-fraud"},
                {"name": "orphan", "version": "1"},
            ],
        }),
    )
}

#[tokio::test]
async fn models_are_listed_across_pages_once_per_name() {
    init_test_tracing();
    let http = registry(ScriptedHttp::new());
    let client = MlflowClient::new(&http, SERVER, CREDENTIAL).unwrap();

    let models = client.list_models().await.unwrap();

    let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Churn", "fraud", "orphan"]);
    assert_eq!(models[0].run_id, "run-churn");
    assert_eq!(models[1].version, "7");
    assert_eq!(http.request_count().await, 2);

    let requests = http.requests().await;
    assert_eq!(
        requests[0].header("Authorization"),
        Some("Basic YWxpY2U6czNjcmV0")
    );
}

#[tokio::test]
async fn model_lookup_ignores_case() {
    let http = registry(ScriptedHttp::new());
    let client = MlflowClient::new(&http, SERVER, CREDENTIAL).unwrap();

    let model = client.find_model("churn").await.unwrap().unwrap();
    assert_eq!(model.name, "Churn");
    assert_eq!(client.find_model("missing").await.unwrap(), None);
}

#[tokio::test]
async fn model_download_walks_artifact_tree_breadth_first() {
    let api = api();
    let http = registry(ScriptedHttp::new())
        .on_get_json(
            &api.artifacts("run-churn", None).unwrap(),
            fixtures::mlflow_files(vec![fixtures::mlflow_file("model", true)]),
        )
        .on_get_json(
            &api.artifacts("run-churn", Some("model")).unwrap(),
            fixtures::mlflow_files(vec![
                fixtures::mlflow_file("model/data", true),
                fixtures::mlflow_file("model/MLmodel", false),
            ]),
        )
        .on_get_json(
            &api.artifacts("run-churn", Some("model/data")).unwrap(),
            fixtures::mlflow_files(vec![fixtures::mlflow_file("model/data/model.pkl", false)]),
        )
        .on(
            HttpMethod::Get,
            &api.artifact_download("run-churn", "model/MLmodel").unwrap(),
            HttpResponse::new(200, b"flavors: {}".to_vec()),
        )
        .on(
            HttpMethod::Get,
            &api.artifact_download("run-churn", "model/data/model.pkl").unwrap(),
            HttpResponse::new(200, vec![0x80, 0x04]),
        );
    let client = MlflowClient::new(&http, SERVER, CREDENTIAL).unwrap();

    let artifacts = client.download_model("CHURN").await.unwrap().unwrap();

    let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["model/MLmodel", "model/data/model.pkl"]);
    assert_eq!(artifacts[0].bytes, b"flavors: {}");
    assert_eq!(artifacts[1].bytes, vec![0x80, 0x04]);
}

#[tokio::test]
async fn missing_artifact_directory_is_skipped() {
    let api = api();
    let http = ScriptedHttp::new()
        .on_get_json(
            &api.artifacts("r1", Some("root")).unwrap(),
            fixtures::mlflow_files(vec![
                fixtures::mlflow_file("root/gone", true),
                fixtures::mlflow_file("root/a.txt", false),
            ]),
        )
        .on_status(HttpMethod::Get, &api.artifacts("r1", Some("root/gone")).unwrap(), 404);
    let client = MlflowClient::new(&http, SERVER, CREDENTIAL).unwrap();

    let files = client.list_artifacts("r1", "root").await.unwrap();
    assert_eq!(files, vec!["root/a.txt"]);
}

#[tokio::test]
async fn model_without_run_or_name_resolves_to_none() {
    let http = registry(ScriptedHttp::new());
    let client = MlflowClient::new(&http, SERVER, CREDENTIAL).unwrap();

    assert_eq!(client.download_model("orphan").await.unwrap(), None);
    assert_eq!(client.download_model("unknown").await.unwrap(), None);
    assert!(http
        .requests_to(HttpMethod::Get, &format!("{SERVER}/api/2.0/mlflow/artifacts"))
        .await
        .is_empty());
}

#[tokio::test]
async fn failed_artifact_download_is_an_error() {
    let api = api();
    let http = registry(ScriptedHttp::new())
        .on_get_json(
            &api.artifacts("run-fraud", None).unwrap(),
            fixtures::mlflow_files(vec![fixtures::mlflow_file("model", true)]),
        )
        .on_get_json(
            &api.artifacts("run-fraud", Some("model")).unwrap(),
            fixtures::mlflow_files(vec![fixtures::mlflow_file("model/MLmodel", false)]),
        )
        .on_status(
            HttpMethod::Get,
            &api.artifact_download("run-fraud", "model/MLmodel").unwrap(),
            403,
        );
    let client = MlflowClient::new(&http, SERVER, CREDENTIAL).unwrap();

    let err = client.download_model("fraud").await.unwrap_err();
    assert_eq!(err.http_status(), Some(403));
}

#[tokio::test]
async fn listing_continues_past_a_page_of_malformed_versions() {
    let api = api();
    let http = ScriptedHttp::new()
        .on_get_json(
            &api.search(None).unwrap(),
            json!({
                "model_versions": [fixtures::mlflow_model_version("Churn", "3", "run-churn")],
                "next_page_token": "p2",
            }),
        )
        .on_get_json(
            &api.search(Some("p2")).unwrap(),
            json!({"model_versions": ["bad", 7], "next_page_token": "p3"}),
        )
        .on_get_json(
            &api.search(Some("p3")).unwrap(),
            json!({"model_versions": [fixtures::mlflow_model_version("fraud", "1", "run-fraud")]}),
        );
    let client = MlflowClient::new(&http, SERVER, CREDENTIAL).unwrap();

    let models = client.list_models().await.unwrap();

    let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Churn", "fraud"]);
    assert_eq!(http.request_count().await, 3);
}

#[test]
fn credential_with_extra_field_is_rejected() {
    let http = ScriptedHttp::new();
    assert!(MlflowClient::new(&http, SERVER, "alice;pa;ss").is_err());
    assert!(MlflowClient::new(&http, SERVER, "alice").is_err());
}
