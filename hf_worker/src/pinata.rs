//! Pinata pinning service, as the [`ContentStore`].

use async_trait::async_trait;
use hodlerfc::interface::ContentStore;
use hodlerfc::model::{ContentHash, Upload};
use hodlerfc::ExternalError;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use url::Url;

/// Pinata API credentials and endpoints.
pub struct PinataClient {
    /// HTTP client.
    pub client: Client,
    /// API base, e.g. `https://api.pinata.cloud/`.
    pub api_url: Url,
    /// Gateway base, e.g. `https://gateway.pinata.cloud/`. Blobs are read from `ipfs/{cid}`.
    pub gateway_url: Url,
    /// `pinata_api_key` header.
    pub api_key: SecretString,
    /// `pinata_secret_api_key` header.
    pub secret_api_key: SecretString,
}
impl PinataClient {
    fn endpoint(&self, base: &Url, path: &str) -> Result<Url, ExternalError> {
        base.join(path)
            .map_err(|e| format!("Bad Pinata url `{}` + `{}`: {}", base, path, e).into())
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("pinata_api_key", self.api_key.expose_secret())
            .header("pinata_secret_api_key", self.secret_api_key.expose_secret())
    }

    async fn pin(&self, what: &str, builder: RequestBuilder) -> Result<ContentHash, ExternalError> {
        let resp = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| format!("Pinning {} failed: {}", what, e))?;
        let val = json_body(resp).await?;
        let hash = ipfs_hash(&val)?;
        log::info!("Pinned {} as {}.", what, hash);
        Ok(hash)
    }
}

/// Read a JSON body, turning HTTP errors into [`ExternalError`]s.
async fn json_body(resp: Response) -> Result<Value, ExternalError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(format!("HTTP {}: {}", status, text).into());
    }
    resp.json()
        .await
        .map_err(|e| format!("Response body not JSON: {}", e).into())
}

/// Extract `IpfsHash` from a pin response.
fn ipfs_hash(val: &Value) -> Result<ContentHash, ExternalError> {
    val.get("IpfsHash")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(ContentHash::from)
        .ok_or_else(|| format!("Unexpected Pinata response, `IpfsHash` not found: {}", val).into())
}

/// Pin request body for a JSON blob (CIDv1).
fn pin_json_body(blob: &Value) -> Value {
    json!({
        "pinataOptions": { "cidVersion": 1 },
        "pinataContent": blob,
    })
}

#[async_trait(?Send)]
impl ContentStore for PinataClient {
    async fn fetch_blob(&self, content_hash: &ContentHash) -> Result<Value, ExternalError> {
        let url = self.endpoint(&self.gateway_url, &format!("ipfs/{}", content_hash))?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Fetching {} failed: {}", content_hash, e))?;
        json_body(resp).await
    }

    async fn pin_blob(&self, blob: &Value) -> Result<ContentHash, ExternalError> {
        let url = self.endpoint(&self.api_url, "pinning/pinJSONToIPFS")?;
        let builder = self.client.post(url).json(&pin_json_body(blob));
        self.pin("JSON blob", builder).await
    }

    async fn pin_file(&self, upload: &Upload) -> Result<ContentHash, ExternalError> {
        let url = self.endpoint(&self.api_url, "pinning/pinFileToIPFS")?;
        let part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
        let builder = self.client.post(url).multipart(Form::new().part("file", part));
        self.pin(&format!("file `{}`", upload.file_name), builder)
            .await
    }
}
