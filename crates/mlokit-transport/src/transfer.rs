//! Transfer executor
//!
//! One authenticated exchange per call, whole object in memory. Downloads
//! accept any 2xx; uploads are `BlockBlob` PUTs and accept only 200 or 201.

use mlokit_core::errors::redact_query;
use mlokit_core::{
    ClockEffects, HttpEffects, HttpRequest, MlokitError, Result, StorageConfig, StorageCoordinate,
};
use mlokit_signature::SharedKeyCredential;
use tracing::{debug, info};

/// Blob type header sent with uploads
pub const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";

/// The only blob type this executor writes
pub const BLOCK_BLOB: &str = "BlockBlob";

fn signer(coordinate: &StorageCoordinate) -> Result<SharedKeyCredential> {
    SharedKeyCredential::new(coordinate.account.as_str(), &coordinate.credential)
}

/// Download one blob with a shared-key signed GET.
pub async fn download_blob<H, C>(
    http: &H,
    clock: &C,
    api_version: &str,
    coordinate: &StorageCoordinate,
) -> Result<Vec<u8>>
where
    H: HttpEffects + ?Sized,
    C: ClockEffects + ?Sized,
{
    let url = coordinate.blob_url();
    let mut request = HttpRequest::get(url.as_str()).with_header("Content-Type", "application/json");
    signer(coordinate)?.sign_request(&mut request, clock.now_utc(), api_version);

    debug!(
        account = %coordinate.account,
        container = %coordinate.container,
        path = %coordinate.blob_path(),
        "Downloading blob"
    );
    let response = http.execute(request).await?;
    if !response.is_success() {
        return Err(MlokitError::status(response.status, &url));
    }

    info!(
        account = %coordinate.account,
        path = %coordinate.blob_path(),
        bytes = response.body.len(),
        "Blob downloaded"
    );
    Ok(response.body)
}

/// Upload `content` as a block blob with a shared-key signed PUT.
pub async fn upload_blob<H, C>(
    http: &H,
    clock: &C,
    api_version: &str,
    coordinate: &StorageCoordinate,
    content: Vec<u8>,
) -> Result<()>
where
    H: HttpEffects + ?Sized,
    C: ClockEffects + ?Sized,
{
    let url = coordinate.blob_url();
    let length = content.len();
    let mut request = HttpRequest::put(url.as_str())
        .with_header("Content-Type", "application/json")
        .with_header(BLOB_TYPE_HEADER, BLOCK_BLOB)
        .with_header("Content-Length", length.to_string())
        .with_body(content);
    signer(coordinate)?.sign_request(&mut request, clock.now_utc(), api_version);

    debug!(
        account = %coordinate.account,
        container = %coordinate.container,
        path = %coordinate.blob_path(),
        bytes = length,
        "Uploading blob"
    );
    let response = http.execute(request).await?;
    if !matches!(response.status, 200 | 201) {
        return Err(MlokitError::status(response.status, &url));
    }

    info!(
        account = %coordinate.account,
        path = %coordinate.blob_path(),
        bytes = length,
        "Blob uploaded"
    );
    Ok(())
}

/// Download a content URI that carries its own SAS token. No signing.
pub async fn download_url<H>(http: &H, url: &str) -> Result<Vec<u8>>
where
    H: HttpEffects + ?Sized,
{
    if url.trim().is_empty() {
        return Err(MlokitError::invalid("content URI is empty"));
    }
    let request = HttpRequest::get(url).with_header("Content-Type", "application/json");
    let response = http.execute(request).await?;
    if !response.is_success() {
        return Err(MlokitError::status(response.status, url));
    }
    debug!(
        url = redact_query(url),
        bytes = response.body.len(),
        "Content URI downloaded"
    );
    Ok(response.body)
}

/// HTTP handler, clock and storage settings bundled for repeated transfers
pub struct BlobTransfer<'a, H: ?Sized, C: ?Sized> {
    http: &'a H,
    clock: &'a C,
    api_version: String,
}

impl<'a, H, C> BlobTransfer<'a, H, C>
where
    H: HttpEffects + ?Sized,
    C: ClockEffects + ?Sized,
{
    /// Create a transfer executor
    pub fn new(http: &'a H, clock: &'a C, storage: &StorageConfig) -> Self {
        Self {
            http,
            clock,
            api_version: storage.api_version.clone(),
        }
    }

    /// See [`download_blob`]
    pub async fn download(&self, coordinate: &StorageCoordinate) -> Result<Vec<u8>> {
        download_blob(self.http, self.clock, &self.api_version, coordinate).await
    }

    /// See [`upload_blob`]
    pub async fn upload(&self, coordinate: &StorageCoordinate, content: Vec<u8>) -> Result<()> {
        upload_blob(self.http, self.clock, &self.api_version, coordinate, content).await
    }

    /// See [`download_url`]
    pub async fn download_url(&self, url: &str) -> Result<Vec<u8>> {
        download_url(self.http, url).await
    }
}
