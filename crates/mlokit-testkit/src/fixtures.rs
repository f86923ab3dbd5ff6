//! Platform payload fixtures
//!
//! Builders for the JSON bodies the platform APIs return, shaped the way the
//! real services shape them.

pub use serde_json::json;
use serde_json::Value;

/// Account key used across fixtures: base64 of `secret-key-0123456789`
pub const TEST_ACCOUNT_KEY: &str = "c2VjcmV0LWtleS0wMTIzNDU2Nzg5";

/// AzureML model record whose `url` embeds `asset_id`
pub fn azureml_model(id: &str, name: &str, asset_id: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "modelType": "sklearn",
        "createdTime": "2024-03-01T10:00:00Z",
        "modifiedTime": "2024-03-02T10:00:00Z",
        "url": format!("aml://asset/{asset_id}"),
    })
}

/// AzureML model listing page
pub fn azureml_model_page(models: Vec<Value>, next_link: Option<&str>) -> Value {
    match next_link {
        Some(link) => json!({ "value": models, "nextLink": link }),
        None => json!({ "value": models }),
    }
}

/// AzureML asset with one artifact per prefix
pub fn azureml_asset(prefixes: &[&str]) -> Value {
    let artifacts: Vec<Value> = prefixes
        .iter()
        .map(|prefix| json!({ "artifactPrefix": prefix }))
        .collect();
    json!({ "artifacts": artifacts })
}

/// AzureML content-info listing
pub fn azureml_content_info(uris: &[&str]) -> Value {
    let value: Vec<Value> = uris.iter().map(|uri| json!({ "contentUri": uri })).collect();
    json!({ "value": value })
}

/// AzureML datastore with its fields nested under `properties`
pub fn azureml_datastore(name: &str, account: &str, container: &str, kind: &str, credential: &str) -> Value {
    json!({
        "properties": {
            "name": name,
            "accountName": account,
            "containerName": container,
            "endpoint": "core.windows.net",
            "credential": credential,
            "datastoreType": kind,
        }
    })
}

/// AzureML datastore listing
pub fn azureml_datastore_list(datastores: Vec<Value>) -> Value {
    json!({ "value": datastores })
}

/// AzureML dataset
pub fn azureml_dataset(id: &str, datastore_name: &str, azure_file_path: &str) -> Value {
    json!({
        "id": id,
        "name": "iris",
        "state": "active",
        "dataType": "tabular",
        "datastoreName": datastore_name,
        "azureFilePath": azure_file_path,
    })
}

/// Foundry filesystem node
pub fn foundry_node(rid: &str, display_name: &str, node_type: &str) -> Value {
    json!({
        "rid": rid,
        "displayName": display_name,
        "type": node_type,
        "createdTime": "2024-01-01T00:00:00Z",
        "updatedTime": "2024-01-02T00:00:00Z",
    })
}

/// Foundry listing page (`data` + optional `nextPageToken`)
pub fn foundry_page(nodes: Vec<Value>, next_page_token: Option<&str>) -> Value {
    match next_page_token {
        Some(token) => json!({ "data": nodes, "nextPageToken": token }),
        None => json!({ "data": nodes }),
    }
}

/// MLflow model version
pub fn mlflow_model_version(name: &str, version: &str, run_id: &str) -> Value {
    json!({
        "name": name,
        "version": version,
        "status": "READY",
        "description": "",
        "source": format!("mlflow-artifacts:/0/{run_id}/artifacts/model"),
        "run_id": run_id,
    })
}

/// MLflow artifact listing entry
pub fn mlflow_file(path: &str, is_dir: bool) -> Value {
    if is_dir {
        json!({ "path": path, "is_dir": true })
    } else {
        json!({ "path": path, "is_dir": false, "file_size": 128 })
    }
}

/// MLflow artifact listing
pub fn mlflow_files(files: Vec<Value>) -> Value {
    json!({ "files": files })
}

/// Vertex AI model with one exportable format
pub fn vertex_model(project: &str, region: &str, id: &str, export_format: &str) -> Value {
    json!({
        "name": format!("projects/{project}/locations/{region}/models/{id}"),
        "displayName": format!("model-{id}"),
        "createTime": "2024-05-01T00:00:00Z",
        "updateTime": "2024-05-02T00:00:00Z",
        "sourceInfo": { "sourceType": "AUTOML" },
        "supportedExportFormats": [
            { "id": "custom" },
            { "id": export_format },
        ],
    })
}

/// Vertex AI dataset imported from `gcs_uri`
pub fn vertex_dataset(project: &str, region: &str, id: &str, gcs_uri: &str) -> Value {
    json!({
        "name": format!("projects/{project}/locations/{region}/datasets/{id}"),
        "displayName": format!("dataset-{id}"),
        "createTime": "2024-05-01T00:00:00Z",
        "updateTime": "2024-05-02T00:00:00Z",
        "metadata": { "inputConfig": { "gcsSource": { "uri": gcs_uri } } },
    })
}

/// Location listing for a project
pub fn gcp_locations(project: &str, regions: &[&str]) -> Value {
    let locations: Vec<Value> = regions
        .iter()
        .map(|region| json!({ "name": format!("projects/{project}/locations/{region}") }))
        .collect();
    json!({ "locations": locations })
}

/// Cloud Storage bucket or object listing page (`items[].name`)
pub fn gcs_listing(names: &[&str], next_page_token: Option<&str>) -> Value {
    let items: Vec<Value> = names.iter().map(|name| json!({ "name": name })).collect();
    match next_page_token {
        Some(token) => json!({ "items": items, "nextPageToken": token }),
        None => json!({ "items": items }),
    }
}

/// ClearML response envelope
pub fn clearml_envelope(data: Value) -> Value {
    json!({ "meta": { "result_code": 200 }, "data": data })
}
