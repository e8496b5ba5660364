//! HttpAnalysisClient - reqwest で分析 API を叩く AnalysisJobClient

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::domain::{AnalysisRecord, AnalyticsEnvelope, ClientError, ProductId};
use crate::ports::AnalysisJobClient;

/// HTTP implementation of the analytics API contract.
///
/// - `GET  {base}/analytics/product/{id}?limit={history_limit}`
/// - `POST {base}/analytics/product/{id}/regenerate`
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    base_url: String,
    history_limit: u32,
}

impl HttpAnalysisClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, history_limit: u32) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            history_limit: history_limit.max(1),
        })
    }

    fn product_url(&self, product: &ProductId) -> String {
        format!("{}/analytics/product/{}", self.base_url, product.as_str())
    }
}

/// Map a non-success status onto the error taxonomy.
fn status_error(status: StatusCode) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized,
        other => ClientError::Http {
            status: other.as_u16(),
        },
    }
}

fn network_error(err: reqwest::Error) -> ClientError {
    ClientError::Network(err.to_string())
}

#[async_trait]
impl AnalysisJobClient for HttpAnalysisClient {
    async fn fetch_latest_analysis(
        &self,
        product: &ProductId,
        credential: &str,
    ) -> Result<Option<AnalysisRecord>, ClientError> {
        let url = self.product_url(product);
        debug!(%url, "fetching latest analysis");
        let resp = self
            .http
            .get(&url)
            .query(&[("limit", self.history_limit)])
            .bearer_auth(credential)
            .send()
            .await
            .map_err(network_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        let body = resp.bytes().await.map_err(network_error)?;
        AnalyticsEnvelope::decode(&body)?.into_latest(product)
    }

    async fn start_regeneration(&self, product: &ProductId, credential: &str) -> Result<(), ClientError> {
        let url = format!("{}/regenerate", self.product_url(product));
        debug!(%url, "requesting regeneration");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(network_error)?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status))
        }
    }
}
