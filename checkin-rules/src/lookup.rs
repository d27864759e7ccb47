use std::sync::Arc;
use std::time::Duration;

use checkin_core::CoreConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::expr::{Lookup, LookupId};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("invalid lookup URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("lookup request failed: {0}")]
    Http(String),
    #[error("lookup endpoint answered with status {status}")]
    UnexpectedStatus { status: reqwest::StatusCode },
    #[error("failed to decode lookup response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub id: LookupId,
    pub text: String,
}

impl LookupResult {
    /// Materializes a picked result as an `objectList` entry of `kind`.
    pub fn into_lookup(self, kind: impl Into<String>) -> Lookup {
        Lookup::new(kind, self.id, self.text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub more: bool,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupPage {
    pub results: Vec<LookupResult>,
    #[serde(default)]
    pub pagination: Pagination,
    /// Query string echoed by the endpoint, when it does so.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Typed HTTP client for a paged product/variation search endpoint.
#[derive(Clone)]
pub struct LookupClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl LookupClient {
    pub fn new(endpoint: &str) -> Result<Self, LookupError> {
        let endpoint = Url::parse(endpoint).map_err(|err| LookupError::InvalidUrl {
            url: endpoint.to_string(),
            source: err,
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetches page `page` (1-based) of results for `query`.
    pub async fn search(&self, query: &str, page: u32) -> Result<LookupPage, LookupError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("page", &page.to_string());

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| LookupError::Http(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LookupError::UnexpectedStatus {
                status: response.status(),
            });
        }

        response
            .json::<LookupPage>()
            .await
            .map_err(|err| LookupError::Decode(err.to_string()))
    }
}

/// Autocomplete session where only the most recent query counts.
///
/// Responses for a query that has since been replaced are dropped, using the
/// echoed query string when the endpoint provides one.
#[derive(Clone)]
pub struct LookupSession {
    client: LookupClient,
    latest: Arc<Mutex<Option<String>>>,
    debounce: Duration,
}

impl LookupSession {
    pub fn new(client: LookupClient, debounce: Duration) -> Self {
        Self {
            client,
            latest: Arc::new(Mutex::new(None)),
            debounce,
        }
    }

    /// Session for the configured endpoint, if one is configured.
    pub fn from_config(config: &CoreConfig) -> Result<Option<Self>, LookupError> {
        let Some(url) = config.lookup_url() else {
            return Ok(None);
        };
        let client = LookupClient::new(url)?;
        Ok(Some(Self::new(
            client,
            Duration::from_millis(config.lookup_debounce_ms),
        )))
    }

    /// Records `query` as the one the user is currently typing.
    pub fn begin(&self, query: &str) {
        *self.latest.lock() = Some(query.to_string());
    }

    pub fn is_latest(&self, query: &str) -> bool {
        self.latest.lock().as_deref() == Some(query)
    }

    /// Debounced search. `Ok(None)` means the query was superseded before
    /// or while the request ran.
    pub async fn search_latest(
        &self,
        query: &str,
        page: u32,
    ) -> Result<Option<LookupPage>, LookupError> {
        self.begin(query);
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        if !self.is_latest(query) {
            debug!(query, "lookup superseded before request");
            return Ok(None);
        }

        let page = self.client.search(query, page).await?;
        let answered = page.query.as_deref().unwrap_or(query);
        if !self.is_latest(answered) {
            debug!(query = answered, "discarding stale lookup response");
            return Ok(None);
        }
        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_a_page_of_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("query", "GA"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": 12, "text": "GA Ticket"}],
                "pagination": {"more": true}
            })))
            .mount(&server)
            .await;

        let client =
            LookupClient::new(&format!("{}/items/select2", server.uri())).expect("client");
        let page = client.search("GA", 2).await.expect("page");
        assert!(page.pagination.more);
        assert_eq!(
            page.results[0].clone().into_lookup("product"),
            Lookup::new("product", LookupId::Int(12), "GA Ticket")
        );
    }

    #[tokio::test]
    async fn reports_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = LookupClient::new(&server.uri()).expect("client");
        let err = client.search("x", 1).await.unwrap_err();
        assert!(matches!(err, LookupError::UnexpectedStatus { .. }));
    }

    #[test]
    fn rejects_invalid_endpoint() {
        assert!(matches!(
            LookupClient::new("not a url"),
            Err(LookupError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn session_follows_core_config() {
        assert!(LookupSession::from_config(&CoreConfig::default())
            .expect("no endpoint")
            .is_none());

        let config = CoreConfig {
            lookup_url: Some("http://shop.local/items/select2".into()),
            lookup_debounce_ms: 10,
            ..CoreConfig::default()
        };
        let session = LookupSession::from_config(&config)
            .expect("valid endpoint")
            .expect("session");
        assert_eq!(session.client.endpoint().path(), "/items/select2");
        assert_eq!(session.debounce, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn drops_responses_for_superseded_queries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("query", "G"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"results": [{"id": 1, "text": "Gold"}]}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("query", "GA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": 12, "text": "GA Ticket"}]
            })))
            .mount(&server)
            .await;

        let client = LookupClient::new(&server.uri()).expect("client");
        let session = LookupSession::new(client, Duration::ZERO);

        let slow = session.search_latest("G", 1);
        let fast = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            session.search_latest("GA", 1).await
        };
        let (slow, fast) = tokio::join!(slow, fast);

        assert_eq!(slow.expect("slow request"), None);
        let page = fast.expect("fast request").expect("latest page");
        assert_eq!(page.results[0].text, "GA Ticket");
    }

    #[tokio::test]
    async fn echoed_query_decides_staleness() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [],
                "query": "older"
            })))
            .mount(&server)
            .await;

        let client = LookupClient::new(&server.uri()).expect("client");
        let session = LookupSession::new(client, Duration::ZERO);
        assert_eq!(session.search_latest("newer", 1).await.expect("search"), None);
    }
}
