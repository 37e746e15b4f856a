//!
//! src/fetch.rs
//!
//! Client for the external metadata provider. Issues exactly one request per
//! lookup and classifies its outcome into the catalog error taxonomy.
//!

use async_trait::async_trait;
use reqwest::{Client, header, redirect};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{HttpConfig, ProviderConfig};
use crate::errors::CatalogError;
use crate::normalize::RawProviderRecord;

/// Anything that can look up candidate records for a (name, artist) pair
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Candidate records in provider order, never empty on success
    async fn fetch_by_name_and_artist(&self, name: &str, artist_name: &str) ->
        Result<Vec<RawProviderRecord>, CatalogError>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, CatalogError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .build()
        .map_err(|e| CatalogError::Config(format!("build client: {e}")))
}

/// Builds the `query` parameter: the track name and a single-element
/// artist list, serialized as json
pub fn search_query(name: &str, artist_name: &str) -> String {
    serde_json::json!({
        "track": name,
        "artists": [artist_name],
    }).to_string()
}

/// Maps a transport failure. No response at all is an upstream outage,
/// anything else is ours.
fn classify_transport(e: reqwest::Error) -> CatalogError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        CatalogError::UpstreamUnavailable(e.to_string())
    } else {
        CatalogError::Internal(format!("provider request failed: {e}"))
    }
}

/// Pulls the candidate list out of a response body. An empty body, non-json
/// body, missing `data` array, or empty array all mean no result.
pub fn parse_records(body: &str) -> Result<Vec<RawProviderRecord>, CatalogError> {
    let no_result = || CatalogError::NotFound("Track not found".to_string());

    let payload: Value = serde_json::from_str(body).map_err(|_| no_result())?;
    let records = payload.get("data")
        .and_then(|v| v.as_array())
        .filter(|arr| !arr.is_empty())
        .ok_or_else(no_result)?;

    Ok(records.iter().map(RawProviderRecord::from_value).collect())
}

/// ACRCloud external metadata api
#[derive(Clone, Debug)]
pub struct AcrCloudClient {
    pub http: Client,
    pub endpoint: Url,
    api_key: String,
}

impl AcrCloudClient {
    pub fn new(http_config: &HttpConfig, cfg: &ProviderConfig) ->
        Result<Self, CatalogError> {

        let http = base_client(http_config)?;
        Ok( Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone(),
        })
    }

    /// GET {endpoint}?query={"track":..,"artists":[..]}&format=json&include_works=0
    pub fn search(&self, name: &str, artist_name: &str) -> reqwest::RequestBuilder {
        self.http.get(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .query(&[
                ("query", search_query(name, artist_name).as_str()),
                ("format", "json"),
                ("include_works", "0"),
            ])
    }
}

#[async_trait]
impl MetadataProvider for AcrCloudClient {
    async fn fetch_by_name_and_artist(&self, name: &str, artist_name: &str) ->
        Result<Vec<RawProviderRecord>, CatalogError> {

        let response = self.search(name, artist_name)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "provider.status");
            return Err(CatalogError::Internal(format!("provider returned status {status}")));
        }

        let body = response.text().await.map_err(classify_transport)?;
        let records = parse_records(&body)?;
        debug!(candidates = records.len(), "provider.records");
        Ok(records)
    }
}
