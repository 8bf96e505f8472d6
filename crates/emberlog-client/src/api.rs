//! Paged query client for `GET /api/v1/incidents`.

use crate::error::{ClientError, ClientResult};
use emberlog_core::{ApiConfig, Incident, IncidentPage, IncidentQuery};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for page requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the incident collection endpoint.
#[derive(Debug, Clone)]
pub struct IncidentsApi {
    client: Client,
    incidents_url: String,
}

impl IncidentsApi {
    pub fn new(config: &ApiConfig) -> ClientResult<Self> {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(config: &ApiConfig, timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            incidents_url: config.incidents_url(),
        })
    }

    /// Fetch one page.
    ///
    /// Any non-success status, or a body without an `items` array, is an error.
    /// Items that fail validation are dropped and logged.
    pub async fn fetch_page(&self, query: &IncidentQuery) -> ClientResult<IncidentPage> {
        query.validate()?;

        let params = query.to_query_pairs();
        debug!(url = %self.incidents_url, ?params, "Fetching incidents page");

        let response = self
            .client
            .get(&self.incidents_url)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Incidents request failed");
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("body is not JSON: {e}")))?;

        let page = parse_page(body, query)?;
        info!(
            page = page.page,
            items = page.items.len(),
            total = ?page.total,
            "Fetched incidents page"
        );
        Ok(page)
    }
}

/// Decode a response body. `page`/`page_size` fall back to what was asked for.
pub fn parse_page(body: Value, query: &IncidentQuery) -> ClientResult<IncidentPage> {
    let Value::Object(mut body) = body else {
        return Err(ClientError::InvalidResponse("body is not an object".to_string()));
    };

    let items = match body.remove("items") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ClientError::InvalidResponse("'items' is not an array".to_string())),
        None => return Err(ClientError::InvalidResponse("missing 'items'".to_string())),
    };

    let mut incidents = Vec::with_capacity(items.len());
    let mut rejected = 0;
    for (idx, item) in items.into_iter().enumerate() {
        match Incident::from_value(item) {
            Ok(incident) => incidents.push(incident),
            Err(e) => {
                rejected += 1;
                warn!(idx, "Dropping malformed incident from page: {}", e);
            }
        }
    }

    let total = body.get("total").and_then(Value::as_u64);
    let page = body
        .get("page")
        .and_then(Value::as_u64)
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or(query.page);
    let page_size = body
        .get("page_size")
        .and_then(Value::as_u64)
        .and_then(|p| u32::try_from(p).ok())
        .filter(|p| *p > 0)
        .unwrap_or(query.page_size);

    Ok(IncidentPage {
        items: incidents,
        total,
        page,
        page_size,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberlog_core::QueryError;
    use serde_json::json;

    fn item(id: i64) -> Value {
        json!({
            "id": id,
            "dispatched_at": "2025-09-29T03:05:09Z",
            "incident_type": "MEDICAL",
            "address": "2401 E Van Buren St, Phoenix, AZ",
            "units": ["R1", "E1"],
            "channel": "PRWC J"
        })
    }

    #[test]
    fn test_parse_full_body() {
        let body = json!({ "items": [item(1), item(2)], "total": 42, "page": 2, "page_size": 2 });
        let page = parse_page(body, &IncidentQuery::for_page(2, 2)).unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, Some(42));
        assert_eq!(page.page, 2);
        assert_eq!(page.page_size, 2);
    }

    #[test]
    fn test_missing_total_and_paging_fields() {
        let body = json!({ "items": [item(1)] });
        let page = parse_page(body, &IncidentQuery::for_page(3, 25)).unwrap();

        assert_eq!(page.total, None);
        assert_eq!(page.page, 3);
        assert_eq!(page.page_size, 25);
    }

    #[test]
    fn test_malformed_items_dropped() {
        let mut bad = item(2);
        bad["units"] = json!("R1");
        let body = json!({ "items": [item(1), bad, item(3)], "total": 3 });

        let page = parse_page(body, &IncidentQuery::default()).unwrap();
        let ids: Vec<i64> = page.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(page.rejected, 1);
    }

    #[test]
    fn test_invalid_bodies() {
        let query = IncidentQuery::default();
        for body in [json!({ "total": 0 }), json!({ "items": {} }), json!([item(1)])] {
            let err = parse_page(body, &query).unwrap_err();
            assert!(matches!(err, ClientError::InvalidResponse(_)));
        }
    }

    #[tokio::test]
    async fn test_rejects_bad_paging_before_request() {
        // Nothing listens here; validation must fail first.
        let config = ApiConfig::new("http://127.0.0.1:9").unwrap();
        let api = IncidentsApi::new(&config).unwrap();

        let err = api.fetch_page(&IncidentQuery::for_page(0, 50)).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidQuery(QueryError::InvalidPage(0))
        ));
    }
}
