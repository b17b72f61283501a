use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Default base URL of the IP information service.
pub const DEFAULT_LOOKUP_URL: &str = "https://api.ipee.info/v1/info";
/// Default timeout for a single lookup request.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Metadata returned by the IP information service for one address.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentInfo {
    pub success: bool,
    #[serde(default, rename = "type")]
    pub ip_type: Option<String>,
    #[serde(default, rename = "class")]
    pub ip_class: Option<String>,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub subnet_mask: Option<String>,
    #[serde(default)]
    pub network_address: Option<String>,
    #[serde(default)]
    pub host_count: Option<u64>,
    #[serde(default)]
    pub asn: Option<u32>,
    #[serde(default)]
    pub as_name: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    /// Processing time reported by the service, in milliseconds
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("service reported no data for {0}")]
    Unsuccessful(IpAddr),
}

/// Source of per-address metadata.
#[async_trait]
pub trait Lookup: Send + Sync {
    async fn lookup(&self, ip_addr: IpAddr) -> Result<EnrichmentInfo, LookupError>;
}

/// Looks addresses up with `GET <base_url>/<ip>`.
#[derive(Clone, Debug)]
pub struct HttpLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<HttpLookup, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("lycaon/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpLookup {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, ip_addr: IpAddr) -> String {
        format!("{}/{}", self.base_url, ip_addr)
    }
}

#[async_trait]
impl Lookup for HttpLookup {
    async fn lookup(&self, ip_addr: IpAddr) -> Result<EnrichmentInfo, LookupError> {
        let response = self.client.get(self.url_for(ip_addr)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }
        let body = response.bytes().await?;
        let info: EnrichmentInfo = serde_json::from_slice(&body)?;
        if !info.success {
            return Err(LookupError::Unsuccessful(ip_addr));
        }
        Ok(info)
    }
}
