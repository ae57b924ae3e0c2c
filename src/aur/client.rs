use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{PackageInfo, SearchResult, SourceIndex};
use crate::error::IndexError;

/// Upper bound of names per `info` request, keeps URLs well below the
/// length servers accept.
const INFO_CHUNK: usize = 150;

pub struct AurClient {
    base_url: String,
    client: Client,
}

/// The RPC envelope around every answer.
#[derive(Deserialize)]
struct RpcResponse<T> {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

impl AurClient {
    /// Create a new index client.
    pub fn new(base_url: &str) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("blinky/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn rpc<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<Vec<T>, IndexError> {
        let url = format!("{}/rpc/", self.base_url);
        let response = self.client.get(&url).query(params).send()?;
        check_status(response.status().as_u16())?;
        let body = response.text()?;
        decode(&body)
    }
}

impl SourceIndex for AurClient {
    fn info(&self, names: &[String]) -> Result<Vec<PackageInfo>, IndexError> {
        let mut results = Vec::new();
        for chunk in names.chunks(INFO_CHUNK) {
            let mut params = vec![("v", "5"), ("type", "info")];
            params.extend(chunk.iter().map(|name| ("arg[]", name.as_str())));
            tracing::trace!("aur info: {}", chunk.join(" "));
            results.extend(self.rpc::<PackageInfo>(&params)?);
        }
        Ok(results)
    }

    fn search(&self, query: &str) -> Result<Vec<SearchResult>, IndexError> {
        self.rpc(&[("v", "5"), ("type", "search"), ("arg", query)])
    }

    fn download(&self, fetch_location: &str) -> Result<Vec<u8>, IndexError> {
        let url = format!("{}{}", self.base_url, fetch_location);
        tracing::debug!("downloading {}", url);
        let response = self.client.get(&url).send()?;
        check_status(response.status().as_u16())?;
        Ok(response.bytes()?.to_vec())
    }
}

fn check_status(status: u16) -> Result<(), IndexError> {
    match status {
        200..=299 => Ok(()),
        429 => Err(IndexError::RateLimited),
        503 => Err(IndexError::Unavailable),
        other => Err(IndexError::Status(other)),
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, IndexError> {
    let envelope: RpcResponse<T> =
        serde_json::from_str(body).map_err(|e| IndexError::Parse(e.to_string()))?;
    if envelope.kind == "error" {
        return Err(IndexError::Parse(
            envelope.error.unwrap_or_else(|| "unspecified error".to_string()),
        ));
    }
    Ok(envelope.results)
}
