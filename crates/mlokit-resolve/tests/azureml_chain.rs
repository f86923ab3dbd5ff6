//! AzureML resolution chains against a scripted workspace.
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use mlokit_core::{Artifact, HttpMethod, HttpResponse, MlokitError, StorageConfig};
use mlokit_resolve::{AzureMlClient, WorkspaceScope};
use mlokit_signature::shared_key_authorization;
use mlokit_testkit::fixtures::{self, json, TEST_ACCOUNT_KEY};
use mlokit_testkit::{init_test_tracing, FixedClock, ScriptedHttp};

const MODEL_ID: &str = "churn:3";
const ASSET_ID: &str = "3f1c2a7e9b8d4c6e";
const PREFIX_1: &str = "ExperimentRun/dcid.run_1/outputs";
const PREFIX_2: &str = "ExperimentRun/dcid.run_2/outputs";
const URI_1: &str =
    "https://mlstore01.blob.core.windows.net/azureml/ExperimentRun/dcid.run_1/outputs/model.pkl?sv=2019-07-07&sr=b&sig=one";
const URI_2: &str =
    "https://mlstore01.blob.core.windows.net/azureml/ExperimentRun/dcid.run_2/outputs/model.pkl?sv=2019-07-07&sr=b&sig=two";

fn scope() -> WorkspaceScope {
    WorkspaceScope::new("sub-1", "eastus", "rg-ml", "ws-prod").unwrap()
}

fn matching_datastores() -> serde_json::Value {
    fixtures::azureml_datastore_list(vec![
        fixtures::azureml_datastore("workspaceblobstore", "MLSTORE01", "azureml", "azureblob", ""),
        fixtures::azureml_datastore("workspacefilestore", "mlstore01", "azureml", "AzureFile", ""),
        fixtures::azureml_datastore("otherstore", "mlstore01", "other", "AzureBlob", ""),
    ])
}

/// A model with two artifact prefixes stored in the workspace blob datastore
fn two_prefix_workspace() -> ScriptedHttp {
    workspace_with_datastores(matching_datastores())
}

fn workspace_with_datastores(datastores: serde_json::Value) -> ScriptedHttp {
    let scope = scope();
    ScriptedHttp::new()
        .on_get_json(
            &scope.model_url(MODEL_ID),
            fixtures::azureml_model(MODEL_ID, "churn", ASSET_ID),
        )
        .on_get_json(
            &scope.asset_url(ASSET_ID),
            fixtures::azureml_asset(&[PREFIX_1, PREFIX_2]),
        )
        .on_get_json(
            &scope.content_info_url(PREFIX_1),
            fixtures::azureml_content_info(&[URI_1]),
        )
        .on_get_json(
            &scope.content_info_url(PREFIX_2),
            fixtures::azureml_content_info(&[URI_2]),
        )
        .on_get_json(&scope.datastores_url(), datastores)
        .on_get_json(
            &scope.datastore_url("workspaceblobstore"),
            fixtures::azureml_datastore(
                "workspaceblobstore",
                "mlstore01",
                "azureml",
                "AzureBlob",
                TEST_ACCOUNT_KEY,
            ),
        )
}

#[tokio::test]
async fn model_listing_follows_next_link_and_dedups() {
    init_test_tracing();
    let scope = scope();
    let page_2 = "https://eastus.modelmanagement.azureml.net/models?$skipToken=2";
    let page_3 = "https://eastus.modelmanagement.azureml.net/models?$skipToken=3";
    let http = ScriptedHttp::new()
        .on_get_json(
            &scope.models_url(),
            fixtures::azureml_model_page(
                vec![
                    fixtures::azureml_model("a:1", "a", "asset-a"),
                    fixtures::azureml_model("b:1", "b", "asset-b"),
                ],
                Some(page_2),
            ),
        )
        .on_get_json(
            page_2,
            fixtures::azureml_model_page(
                vec![
                    fixtures::azureml_model("c:1", "c", "asset-c"),
                    fixtures::azureml_model("a:1", "a", "asset-a"),
                ],
                Some(page_3),
            ),
        )
        .on_get_json(
            page_3,
            fixtures::azureml_model_page(vec![fixtures::azureml_model("d:1", "d", "asset-d")], None),
        );
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope).unwrap();

    let models = client.list_models().await.unwrap();

    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a:1", "b:1", "c:1", "d:1"]);
    assert_eq!(models[2].asset_id.as_deref(), Some("asset-c"));
    assert_eq!(http.request_count().await, 3);

    let request = http.requests().await.remove(0);
    assert_eq!(request.header("Authorization"), Some("Bearer tok"));
}

#[tokio::test]
async fn malformed_models_are_skipped_individually() {
    let scope = scope();
    let http = ScriptedHttp::new().on_get_json(
        &scope.models_url(),
        json!({
            "value": [
                fixtures::azureml_model("a:1", "a", "asset-a"),
                {"name": "no id"},
                {"id": 42},
                "not an object",
                fixtures::azureml_model("b:1", "b", "asset-b"),
            ]
        }),
    );
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope).unwrap();

    let models = client.list_models().await.unwrap();
    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a:1", "b:1"]);
}

#[tokio::test]
async fn missing_asset_field_is_not_found() {
    let scope = scope();
    let http = ScriptedHttp::new().on_get_json(
        &scope.model_url(MODEL_ID),
        json!({"id": MODEL_ID, "name": "churn", "modelType": "sklearn"}),
    );
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope).unwrap();

    assert_eq!(client.resolve_model_storage(MODEL_ID).await.unwrap(), None);
    assert_eq!(client.resolve_model_artifacts(MODEL_ID).await.unwrap(), None);
    // only the model lookups were issued
    assert_eq!(http.request_count().await, 2);
}

#[tokio::test]
async fn unknown_model_is_not_found_but_server_error_fails() {
    let scope = scope();
    let http = ScriptedHttp::new()
        .on_status(HttpMethod::Get, &scope.model_url("missing:1"), 404)
        .on_status(HttpMethod::Get, &scope.model_url("broken:1"), 500);
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope).unwrap();

    assert_eq!(client.get_model("missing:1").await.unwrap(), None);
    let err = client.get_model("broken:1").await.unwrap_err();
    assert_matches!(err, MlokitError::Status { status: 500, .. });
}

#[tokio::test]
async fn two_prefixes_resolve_to_the_second_path() {
    init_test_tracing();
    let http = two_prefix_workspace();
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope()).unwrap();

    let coordinate = client.resolve_model_storage(MODEL_ID).await.unwrap().unwrap();

    assert_eq!(coordinate.account, "mlstore01");
    assert_eq!(coordinate.container, "azureml");
    assert_eq!(coordinate.relative_path, "ExperimentRun/dcid.run_2/outputs/");
    assert_eq!(coordinate.credential, TEST_ACCOUNT_KEY);

    // the datastore listing is fetched once for the whole pass
    let listings = http
        .requests_to(HttpMethod::Get, &scope().datastores_url())
        .await;
    assert_eq!(listings.len(), 1);
}

#[tokio::test]
async fn artifacts_resolve_to_content_uris_in_prefix_order() {
    let http = two_prefix_workspace();
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope()).unwrap();

    let resolved = client.resolve_model_artifacts(MODEL_ID).await.unwrap().unwrap();

    assert_eq!(resolved.model.name, "churn");
    let raw: Vec<&str> = resolved.content_uris.iter().map(|uri| uri.raw.as_str()).collect();
    assert_eq!(raw, vec![URI_1, URI_2]);
    assert_eq!(resolved.content_uris[0].sas_token.as_deref(), Some("sv=2019-07-07&sr=b&sig=one"));
}

#[tokio::test]
async fn download_model_fetches_each_content_uri_unsigned() {
    let http = two_prefix_workspace()
        .on(HttpMethod::Get, URI_1, HttpResponse::new(200, b"first".to_vec()))
        .on(HttpMethod::Get, URI_2, HttpResponse::new(200, b"second".to_vec()));
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope()).unwrap();

    let artifacts = client.download_model(MODEL_ID).await.unwrap().unwrap();

    assert_eq!(
        artifacts,
        vec![
            Artifact::new("model.pkl", b"first".to_vec()),
            Artifact::new("model.pkl", b"second".to_vec()),
        ]
    );
    let blob_gets = http
        .requests_to(HttpMethod::Get, "https://mlstore01.blob.core.windows.net/")
        .await;
    assert_eq!(blob_gets.len(), 2);
    assert!(blob_gets.iter().all(|r| r.header("Authorization").is_none()));
}

#[tokio::test]
async fn poison_model_uploads_signed_block_blobs() {
    init_test_tracing();
    let target = "https://mlstore01.blob.core.windows.net/azureml/ExperimentRun/dcid.run_2/outputs/model.pkl";
    let http = two_prefix_workspace().on_status(HttpMethod::Put, target, 201);
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope()).unwrap();

    let written = client
        .poison_model(MODEL_ID, vec![Artifact::new("model.pkl", b"hello world".to_vec())])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(written.len(), 1);
    assert_eq!(written[0].blob_url(), target);

    let put = http.requests_to(HttpMethod::Put, target).await.remove(0);
    assert_eq!(put.header("x-ms-blob-type"), Some("BlockBlob"));
    assert_eq!(put.header("Content-Length"), Some("11"));

    let received: Vec<(String, String)> = put
        .headers
        .iter()
        .filter(|(name, _)| name != "Authorization")
        .cloned()
        .collect();
    let recomputed = shared_key_authorization(
        "mlstore01",
        TEST_ACCOUNT_KEY,
        HttpMethod::Put,
        &put.url,
        &received,
        Some(11),
    ).unwrap();
    assert_eq!(put.header("Authorization"), Some(recomputed.as_str()));
}

#[tokio::test]
async fn poison_model_without_matching_datastore_uploads_nothing() {
    let http = workspace_with_datastores(fixtures::azureml_datastore_list(vec![
        fixtures::azureml_datastore("otherstore", "mlstore01", "other", "AzureBlob", ""),
    ]));
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope()).unwrap();

    let outcome = client
        .poison_model(MODEL_ID, vec![Artifact::new("model.pkl", b"x".to_vec())])
        .await
        .unwrap();

    assert_eq!(outcome, None);
    assert!(http.requests_to(HttpMethod::Put, "https://").await.is_empty());
}

#[tokio::test]
async fn dataset_downloads_through_its_datastore_key() {
    let scope = scope();
    let blob = "https://mlstore01.blob.core.windows.net/datasets/UI/2023/iris.csv";
    let http = ScriptedHttp::new()
        .on_get_json(
            &scope.dataset_url("ds-1"),
            fixtures::azureml_dataset("ds-1", "datasetstore", blob),
        )
        .on_get_json(
            &scope.datastore_url("datasetstore"),
            fixtures::azureml_datastore("datasetstore", "mlstore01", "datasets", "AzureBlob", TEST_ACCOUNT_KEY),
        )
        .on(HttpMethod::Get, blob, HttpResponse::new(200, b"a,b\n1,2\n".to_vec()));
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope).unwrap();

    let artifact = client.download_dataset("ds-1").await.unwrap().unwrap();

    assert_eq!(artifact, Artifact::new("iris.csv", b"a,b\n1,2\n".to_vec()));
    let get = http.requests_to(HttpMethod::Get, blob).await.remove(0);
    assert!(get.header("Authorization").unwrap().starts_with("SharedKey mlstore01:"));
    assert_eq!(get.header("x-ms-version"), Some("2021-08-06"));
}

#[tokio::test]
async fn dataset_with_short_path_is_not_found() {
    let scope = scope();
    let http = ScriptedHttp::new().on_get_json(
        &scope.dataset_url("ds-2"),
        fixtures::azureml_dataset("ds-2", "datasetstore", "https://mlstore01.blob.core.windows.net/datasets"),
    );
    let clock = FixedClock::default();
    let client = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok", scope).unwrap();

    assert_eq!(client.resolve_dataset_storage("ds-2").await.unwrap(), None);
    assert_eq!(http.request_count().await, 1);
}

#[test]
fn credential_and_scope_are_validated() {
    let http = ScriptedHttp::new();
    let clock = FixedClock::default();
    let err = AzureMlClient::new(&http, &clock, &StorageConfig::default(), "tok;extra", scope())
        .err()
        .unwrap();
    assert_matches!(err, MlokitError::Credential { .. });

    assert_matches!(
        WorkspaceScope::new("sub-1", "", "rg", "ws"),
        Err(MlokitError::Invalid { .. })
    );
}
