//! Analysis records: one immutable snapshot of a backend analysis job.
//!
//! A record is fetched whole on every poll. The state machine never mutates
//! one; it only decides whether to adopt it.

use serde::{Deserialize, Serialize};

use super::product::ProductId;
use super::timestamp::EpochMs;
use crate::domain::errors::ClientError;

/// Backend job status.
///
/// The backend may emit arbitrary strings; anything unrecognised becomes
/// `Unknown`, which is never terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    InProgress,
    Completed,
    Failed,
    Error,
    Unknown,
}

impl AnalysisStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "in_progress" => AnalysisStatus::InProgress,
            "completed" => AnalysisStatus::Completed,
            "failed" => AnalysisStatus::Failed,
            "error" => AnalysisStatus::Error,
            _ => AnalysisStatus::Unknown,
        }
    }

    /// Terminal statuses may resolve a session (subject to the trigger check).
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::InProgress => "in_progress",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
            AnalysisStatus::Error => "error",
            AnalysisStatus::Unknown => "unknown",
        }
    }
}

/// One snapshot of a backend analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub product_id: ProductId,
    pub status: AnalysisStatus,

    /// Ordering key: `date`, else `updated_at`, else `created_at`.
    pub timestamp: Option<EpochMs>,

    /// Untouched analytics body, handed through to rendering collaborators.
    pub payload: serde_json::Value,
}

impl AnalysisRecord {
    /// Build a record from one element of the backend's `analytics` array.
    ///
    /// `fallback_product` is used when the element carries no `product_id`.
    pub fn from_json(
        value: serde_json::Value,
        fallback_product: &ProductId,
    ) -> Result<Self, ClientError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ClientError::Malformed("analytics entry is not an object".into()))?;

        let id = match obj.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let product_id = obj
            .get("product_id")
            .and_then(|v| v.as_str())
            .map(ProductId::new)
            .unwrap_or_else(|| fallback_product.clone());
        let status = obj
            .get("status")
            .and_then(|v| v.as_str())
            .map(AnalysisStatus::parse)
            .unwrap_or(AnalysisStatus::Unknown);

        // First non-empty field wins, even if it then fails to parse.
        let timestamp = ["date", "updated_at", "created_at"]
            .iter()
            .filter_map(|key| obj.get(*key).and_then(|v| v.as_str()))
            .find(|s| !s.trim().is_empty())
            .and_then(EpochMs::parse);

        Ok(Self {
            id,
            product_id,
            status,
            timestamp,
            payload: value,
        })
    }

    /// Identity used to deduplicate completion notices.
    pub fn completion_signature(&self) -> String {
        let ts = self
            .timestamp
            .map(|t| t.as_millis().to_string())
            .unwrap_or_default();
        format!("{}:{}:{}", self.product_id, self.id, ts)
    }
}

/// Response body of the "latest analysis" endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsEnvelope {
    pub analytics: Vec<serde_json::Value>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub product_id: Option<String>,
}

impl AnalyticsEnvelope {
    /// Decode a raw body. A body without an `analytics` array is malformed.
    pub fn decode(body: &[u8]) -> Result<Self, ClientError> {
        serde_json::from_slice(body).map_err(|e| ClientError::Malformed(e.to_string()))
    }

    /// The most recent record, or `None` when no analysis exists yet.
    pub fn into_latest(self, product: &ProductId) -> Result<Option<AnalysisRecord>, ClientError> {
        match self.analytics.into_iter().next() {
            Some(first) => AnalysisRecord::from_json(first, product).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::in_progress("in_progress", AnalysisStatus::InProgress)]
    #[case::completed("completed", AnalysisStatus::Completed)]
    #[case::upper("COMPLETED", AnalysisStatus::Completed)]
    #[case::failed("failed", AnalysisStatus::Failed)]
    #[case::error("error", AnalysisStatus::Error)]
    #[case::queued("queued", AnalysisStatus::Unknown)]
    #[case::empty("", AnalysisStatus::Unknown)]
    fn status_parsing(#[case] raw: &str, #[case] expected: AnalysisStatus) {
        assert_eq!(AnalysisStatus::parse(raw), expected);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(AnalysisStatus::Completed.is_terminal());
        assert!(AnalysisStatus::Failed.is_terminal());
        assert!(!AnalysisStatus::InProgress.is_terminal());
        assert!(!AnalysisStatus::Error.is_terminal());
        assert!(!AnalysisStatus::Unknown.is_terminal());
    }

    #[test]
    fn timestamp_prefers_date_then_updated_then_created() {
        let p = ProductId::new("p1");
        let r = AnalysisRecord::from_json(
            json!({
                "id": "a1",
                "status": "completed",
                "date": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-02T10:00:00Z",
                "created_at": "2024-05-03T10:00:00Z",
            }),
            &p,
        )
        .unwrap();
        assert_eq!(r.timestamp, EpochMs::parse("2024-05-01T10:00:00Z"));

        let r = AnalysisRecord::from_json(
            json!({
                "id": "a1",
                "status": "completed",
                "date": "",
                "updated_at": "2024-05-02T10:00:00Z",
                "created_at": "2024-05-03T10:00:00Z",
            }),
            &p,
        )
        .unwrap();
        assert_eq!(r.timestamp, EpochMs::parse("2024-05-02T10:00:00Z"));

        let r = AnalysisRecord::from_json(
            json!({ "id": 7, "status": "in_progress", "created_at": "2024-05-03" }),
            &p,
        )
        .unwrap();
        assert_eq!(r.id, "7");
        assert_eq!(r.timestamp, EpochMs::parse("2024-05-03"));
        assert_eq!(r.product_id, p);
    }

    #[test]
    fn payload_is_passed_through_untouched() {
        let body = json!({
            "id": "a1",
            "product_id": "p9",
            "status": "completed",
            "date": "2024-05-01",
            "analysis": { "geo_score": 71.5, "mentions": 12 },
        });
        let r = AnalysisRecord::from_json(body.clone(), &ProductId::new("p1")).unwrap();
        assert_eq!(r.payload, body);
        assert_eq!(r.product_id, ProductId::new("p9"));
    }

    #[test]
    fn empty_analytics_means_no_analysis_yet() {
        let env = AnalyticsEnvelope::decode(br#"{"analytics": [], "count": 0, "limit": 1}"#).unwrap();
        assert_eq!(env.into_latest(&ProductId::new("p1")).unwrap(), None);
    }

    #[test]
    fn first_element_is_latest() {
        let env = AnalyticsEnvelope::decode(
            br#"{"analytics": [{"id": "new", "status": "completed"}, {"id": "old", "status": "completed"}]}"#,
        )
        .unwrap();
        let latest = env.into_latest(&ProductId::new("p1")).unwrap().unwrap();
        assert_eq!(latest.id, "new");
    }

    #[test]
    fn missing_analytics_array_is_malformed() {
        let err = AnalyticsEnvelope::decode(br#"{"count": 0}"#).unwrap_err();
        assert!(matches!(err, ClientError::Malformed(_)));
    }
}
