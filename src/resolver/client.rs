//! Client for the third-party extraction API.

use std::collections::HashMap;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::ResolveError;

/// `type` value of a single-video record.
pub const VIDEO_TYPE: i64 = 1;

/// `type` value of an image-gallery record.
pub const GALLERY_TYPE: i64 = 2;

/// Normalized `data` object of a resolution response.
///
/// Only `title` is typed. The media fields stay raw JSON so a field the
/// active strategy never reads cannot fail the record; the rest (audio URL
/// variants and whatever else the API adds) are kept in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolutionData {
    /// Raw title, before sanitization.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<Value>,
    #[serde(default)]
    downurl: Option<Value>,
    #[serde(default)]
    pics: Option<Value>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ResolutionData {
    /// Record type, accepting both `1` and `"1"`.
    #[must_use]
    pub fn kind(&self) -> Option<i64> {
        match self.kind.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The `type` field as received, for error messages.
    #[must_use]
    pub fn raw_kind(&self) -> String {
        self.kind
            .as_ref()
            .map_or_else(|| "null".to_string(), ToString::to_string)
    }

    /// Primary media URL: `downurl` if it is a non-empty string.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.downurl
            .as_ref()
            .and_then(Value::as_str)
            .filter(|url| !url.trim().is_empty())
    }

    /// Non-empty string entries of `pics`, in order. Empty unless `pics` is
    /// an array.
    #[must_use]
    pub fn image_urls(&self) -> Vec<&str> {
        self.pics
            .as_ref()
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|url| !url.trim().is_empty())
            .collect()
    }

    /// A non-empty string field by name, looking at typed fields first.
    #[must_use]
    pub fn string_field(&self, key: &str) -> Option<&str> {
        if key == "downurl" {
            return self.download_url();
        }
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

/// Calls the extraction endpoint and decodes its `data` object.
///
/// The underlying [`reqwest::Client`] is shared with the download workers of
/// the same run; cloning this type is cheap.
#[derive(Debug, Clone)]
pub struct ResolutionClient {
    http: Client,
    endpoint: Url,
}

impl ResolutionClient {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidEndpoint`] if `endpoint` is not an
    /// absolute URL.
    pub fn new(http: Client, endpoint: &str) -> Result<Self, ResolveError> {
        let endpoint = Url::parse(endpoint).map_err(|_| ResolveError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
        })?;
        Ok(Self { http, endpoint })
    }

    /// Builds the query URL for `link`.
    fn query_url(&self, link: &str) -> Result<Url, ResolveError> {
        Url::parse_with_params(
            self.endpoint.as_str(),
            &[("url", link), ("token", ""), ("id", ""), ("user_id", "1")],
        )
        .map_err(|_| ResolveError::InvalidEndpoint {
            endpoint: self.endpoint.to_string(),
        })
    }

    /// Resolves one share link into its resolution record.
    ///
    /// Makes exactly one request; retrying belongs to the download stage.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Request`] on transport failure,
    /// [`ResolveError::Status`] for any status other than 200,
    /// [`ResolveError::Malformed`] if the body is not JSON, and
    /// [`ResolveError::MissingData`] if it has no `data` object.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn fetch(&self, link: &str) -> Result<ResolutionData, ResolveError> {
        let url = self.query_url(link)?;

        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ResolveError::request("timed out")
            } else {
                ResolveError::request(e.to_string())
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ResolveError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::request(e.to_string()))?;
        let data = parse_response(&body)?;
        debug!(kind = %data.raw_kind(), title = ?data.title, "resolution record received");
        Ok(data)
    }
}

/// Decodes a response body into its `data` object.
///
/// # Errors
///
/// See [`ResolutionClient::fetch`].
pub fn parse_response(body: &str) -> Result<ResolutionData, ResolveError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ResolveError::malformed(e.to_string()))?;
    let Some(data) = value.get("data").filter(|data| data.is_object()) else {
        return Err(ResolveError::MissingData);
    };
    serde_json::from_value(data.clone()).map_err(|e| ResolveError::malformed(e.to_string()))
}
