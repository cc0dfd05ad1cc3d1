//! OData client module
//!
//! HTTP client for the Dataverse OData v4 Web API: query-string assembly,
//! bearer authentication, protocol headers, and error classification.

use crate::auth::TokenProvider;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Formatted-value annotation requested on every read, so coded fields
/// arrive paired with their display labels.
const PREFER_ANNOTATIONS: &str =
    "odata.include-annotations=\"OData.Community.Display.V1.FormattedValue\"";

/// Gateway errors surfaced to the trigger layer
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication error: {0}")]
    Auth(#[from] crate::auth::AuthError),

    #[error("Upstream error ({0}): {1}")]
    Upstream(u16, String),

    #[error("Record not found")]
    NotFound,

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

/// `$expand` of a single-valued navigation property with a nested `$select`
#[derive(Debug, Clone)]
pub struct Expand {
    pub relation: String,
    pub select: Vec<String>,
}

/// Query options for OData requests. One instance is built per request kind
/// and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub select: Option<Vec<String>>,
    /// Filter clauses, joined with `and` in the given order
    pub filter: Vec<String>,
    pub expand: Option<Expand>,
}

impl QueryOptions {
    /// Build the query string. Parameter order is fixed in source so the
    /// same options always produce the same URL.
    pub fn to_query_string(&self) -> String {
        let mut params = Vec::new();

        if let Some(ref select) = self.select {
            params.push(format!("$select={}", select.join(",")));
        }

        if !self.filter.is_empty() {
            params.push(format!("$filter={}", self.filter.join(" and ")));
        }

        if let Some(ref expand) = self.expand {
            params.push(format!(
                "$expand={}($select={})",
                expand.relation,
                expand.select.join(",")
            ));
        }

        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

/// OData collection response envelope
#[derive(Debug, Deserialize)]
pub struct ODataResponse {
    #[serde(default)]
    pub value: Vec<Value>,
}

/// OData client for the Dataverse Web API
#[derive(Debug)]
pub struct ODataClient {
    auth: Arc<TokenProvider>,
    endpoint: String,
    http_client: Client,
}

impl ODataClient {
    /// Create a new OData client
    ///
    /// # Arguments
    /// * `auth` - token provider for the Dataverse resource
    /// * `endpoint` - service root URL (e.g., "https://org.crm.dynamics.com/api/data/v9.2/")
    pub fn new(auth: Arc<TokenProvider>, endpoint: String) -> Result<Self, GatewayError> {
        // Ensure endpoint ends with /
        let endpoint = if endpoint.ends_with('/') {
            endpoint
        } else {
            format!("{}/", endpoint)
        };

        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            auth,
            endpoint,
            http_client,
        })
    }

    /// Issue an authenticated GET with the mandatory OData headers
    async fn execute(&self, url: &str) -> Result<Response, GatewayError> {
        let token = self.auth.get_token().await?;

        let response = self
            .http_client
            .get(url)
            .header("Authorization", format!("Bearer {}", token.value))
            .header("Accept", "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header("Prefer", PREFER_ANNOTATIONS)
            .send()
            .await?;

        Ok(response)
    }

    /// Fetch a collection. The records arrive under the `value` envelope
    /// key, in upstream order.
    pub async fn fetch_collection(
        &self,
        entity_set: &str,
        options: &QueryOptions,
    ) -> Result<Vec<Value>, GatewayError> {
        let url = format!("{}{}{}", self.endpoint, entity_set, options.to_query_string());
        tracing::debug!("Fetching: {}", url);

        let response = self.execute(&url).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 404 is not an expected outcome for a collection read
            return Err(classify_status(status, body, false));
        }

        let envelope: ODataResponse = response.json().await.map_err(|e| {
            GatewayError::Transport(format!("Failed to parse OData response: {}", e))
        })?;

        tracing::debug!("Fetched {} records", envelope.value.len());
        Ok(envelope.value)
    }

    /// Fetch a single record by primary key. Yields [`GatewayError::NotFound`]
    /// when the CRM answers 404.
    pub async fn fetch_record(
        &self,
        entity_set: &str,
        id: &str,
        options: &QueryOptions,
    ) -> Result<Value, GatewayError> {
        let url = format!(
            "{}{}({}){}",
            self.endpoint,
            entity_set,
            id,
            options.to_query_string()
        );
        tracing::debug!("Fetching: {}", url);

        let response = self.execute(&url).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body, true));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("Failed to parse record: {}", e)))
    }
}

/// Map a non-success status to a gateway error. Only a direct record fetch
/// treats 404 as an absence; everything else is an upstream failure carrying
/// the status and body for diagnosis.
fn classify_status(status: StatusCode, body: String, single_record: bool) -> GatewayError {
    if status == StatusCode::NOT_FOUND && single_record {
        GatewayError::NotFound
    } else {
        tracing::error!("Upstream returned {}: {}", status, body);
        GatewayError::Upstream(status.as_u16(), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_options_empty() {
        let options = QueryOptions::default();
        assert_eq!(options.to_query_string(), "");
    }

    #[test]
    fn test_query_options_full() {
        let options = QueryOptions {
            select: Some(vec!["cr6ef_eventdate".to_string(), "statecode".to_string()]),
            filter: vec![
                "statecode eq 0".to_string(),
                "cr6ef_entrytype eq 100000001".to_string(),
            ],
            expand: Some(Expand {
                relation: "cr6ef_Event".to_string(),
                select: vec!["cr6ef_name".to_string(), "statuscode".to_string()],
            }),
        };

        assert_eq!(
            options.to_query_string(),
            "?$select=cr6ef_eventdate,statecode\
             &$filter=statecode eq 0 and cr6ef_entrytype eq 100000001\
             &$expand=cr6ef_Event($select=cr6ef_name,statuscode)"
        );
    }

    #[test]
    fn test_query_string_is_deterministic() {
        let options = QueryOptions {
            select: Some(vec!["a".to_string()]),
            filter: vec!["x eq 1".to_string(), "y eq 2".to_string()],
            expand: None,
        };
        assert_eq!(options.to_query_string(), options.to_query_string());
        // Clause order follows construction order, not any re-sort
        assert_eq!(
            options.to_query_string(),
            "?$select=a&$filter=x eq 1 and y eq 2"
        );
    }

    #[test]
    fn test_classify_404_single_record() {
        let err = classify_status(StatusCode::NOT_FOUND, String::new(), true);
        assert!(matches!(err, GatewayError::NotFound));
    }

    #[test]
    fn test_classify_404_collection_is_upstream() {
        let err = classify_status(StatusCode::NOT_FOUND, "gone".to_string(), false);
        assert!(matches!(err, GatewayError::Upstream(404, ref body) if body == "gone"));
    }

    #[test]
    fn test_classify_401_is_upstream_not_auth() {
        // A rejected CRM call with a previously accepted token is an
        // upstream failure; no fresh token is acquired for a retry.
        let err = classify_status(StatusCode::UNAUTHORIZED, "expired".to_string(), true);
        assert!(matches!(err, GatewayError::Upstream(401, _)));
    }

    #[test]
    fn test_classify_server_error() {
        let err = classify_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "boom".to_string(),
            false,
        );
        assert!(matches!(err, GatewayError::Upstream(500, ref body) if body == "boom"));
    }
}
