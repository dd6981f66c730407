//! ParcelScope policy collaborator over the Bizinfo support-project API.
//!
//! Implements [`pipeline::PolicyCollaborator`] by querying the public
//! `bizinfoApi.do` endpoint of bizinfo.go.kr, filtered by the region named in
//! the parcel's address.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Query construction, region extraction, response
//! decoding, HTML clean-up of project summaries and error classification all
//! live here. The [`pipeline`] crate sees only
//! [`pipeline::PolicyCollaborator`] and [`pipeline::PolicyRecord`].
//!
//! ## Request
//!
//! `GET {base_url}/uss/rss/bizinfoApi.do?crtfcKey=..&dataType=json&searchCnt=N`
//! plus `hashtags=<region>` when the address names a region and
//! `searchLclasId=<category>` when a category filter is configured.

mod region;

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use pipeline::{Collaborator, CollaboratorError, LandParcel, PolicyCollaborator, PolicyRecord};

pub use region::region_tag;

/// Default API origin.
pub const DEFAULT_BASE_URL: &str = "https://www.bizinfo.go.kr";

/// Origin prepended to the relative project links the API returns.
pub const PORTAL_ORIGIN: &str = "https://www.bizinfo.go.kr";

const API_PATH: &str = "/uss/rss/bizinfoApi.do";

const COLLABORATOR: Collaborator = Collaborator::Policy;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection and query settings for [`BizinfoPolicies`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BizinfoConfig {
    /// The `crtfcKey` issued by bizinfo.go.kr.
    pub api_key: String,
    pub base_url: String,
    /// Maximum number of projects requested (`searchCnt`).
    pub result_count: u32,
    /// Optional project category code (`searchLclasId`), e.g. `01` for finance.
    pub category: Option<String>,
    pub request_timeout: Duration,
}

impl BizinfoConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            result_count: 10,
            category: None,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Errors constructing a [`BizinfoPolicies`].
#[derive(Debug, Error)]
pub enum PolicyApiError {
    #[error("Bizinfo API key is empty")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(rename = "jsonArray")]
    items: Option<Vec<ApiItem>>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    #[serde(rename = "pblancNm", default)]
    name: Option<String>,
    #[serde(rename = "jrsdInsttNm", default)]
    organization: Option<String>,
    #[serde(rename = "bsnsSumryCn", default)]
    summary_html: Option<String>,
    #[serde(rename = "reqstBeginEndDe", default)]
    application_period: Option<String>,
    #[serde(rename = "pblancUrl", default)]
    url: Option<String>,
}

impl ApiItem {
    /// Converts to a [`PolicyRecord`]; items without a name are dropped.
    fn into_record(self) -> Option<PolicyRecord> {
        let name = non_empty(self.name)?;
        Some(PolicyRecord {
            name,
            description: self
                .summary_html
                .as_deref()
                .map(clean_summary)
                .unwrap_or_default(),
            organization: non_empty(self.organization),
            application_period: non_empty(self.application_period),
            details_url: non_empty(self.url).map(|url| absolute_url(&url)),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`PolicyCollaborator`] backed by the Bizinfo public API.
#[derive(Debug, Clone)]
pub struct BizinfoPolicies {
    client: reqwest::Client,
    config: BizinfoConfig,
}

impl BizinfoPolicies {
    pub fn new(config: BizinfoConfig) -> Result<Self, PolicyApiError> {
        if config.api_key.trim().is_empty() {
            return Err(PolicyApiError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("parcelscope/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    fn query(&self, region: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("crtfcKey", self.config.api_key.clone()),
            ("dataType", "json".to_string()),
            ("searchCnt", self.config.result_count.to_string()),
        ];
        if let Some(category) = &self.config.category {
            query.push(("searchLclasId", category.clone()));
        }
        if let Some(region) = region {
            query.push(("hashtags", region.to_string()));
        }
        query
    }

    fn transport_error(&self, err: reqwest::Error) -> CollaboratorError {
        if err.is_timeout() {
            CollaboratorError::Timeout {
                collaborator: COLLABORATOR,
                after: self.config.request_timeout,
            }
        } else if err.is_decode() {
            CollaboratorError::invalid_response(COLLABORATOR, err.to_string())
        } else {
            CollaboratorError::unavailable(COLLABORATOR, err.to_string())
        }
    }
}

#[async_trait]
impl PolicyCollaborator for BizinfoPolicies {
    #[instrument(skip_all)]
    async fn find_policies(
        &self,
        parcel: &LandParcel,
    ) -> Result<Vec<PolicyRecord>, CollaboratorError> {
        let region = region_tag(&parcel.address);
        debug!(region = region.unwrap_or("nationwide"), "querying support projects");

        let url = format!("{}{API_PATH}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&self.query(region))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(CollaboratorError::from_http_status(
                COLLABORATOR,
                status.as_u16(),
                retry_after,
                status.canonical_reason().unwrap_or_default(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        let decoded: ApiResponse = serde_json::from_str(&body)
            .map_err(|e| CollaboratorError::invalid_response(COLLABORATOR, e.to_string()))?;
        let items = decoded.items.ok_or_else(|| {
            CollaboratorError::invalid_response(COLLABORATOR, "response has no jsonArray")
        })?;

        let policies: Vec<PolicyRecord> =
            items.into_iter().filter_map(ApiItem::into_record).collect();
        debug!(count = policies.len(), "support projects received");
        Ok(policies)
    }
}

// ---------------------------------------------------------------------------
// Text clean-up
// ---------------------------------------------------------------------------

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Strips HTML tags and common entities and collapses whitespace.
pub fn clean_summary(html: &str) -> String {
    let text = TAG.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn absolute_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with('/') {
        format!("{PORTAL_ORIGIN}{url}")
    } else {
        format!("{PORTAL_ORIGIN}/{url}")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
