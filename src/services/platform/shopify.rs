//! Shopify Admin GraphQL client
//!
//! Every call distinguishes four failure shapes: transport failure, non-2xx
//! status, unparseable body, and a top-level `errors` array. Throttling (HTTP
//! 429 or a `THROTTLED` error code) is retried with linear backoff, or after
//! the server's `Retry-After` seconds when given, capped at one minute.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::error::{PlatformError, UserError};
use super::graphql::{
    COLLECTIONS_QUERY, LOCATIONS_QUERY, METAFIELD_DEFINITIONS_QUERY, METAFIELD_DEFINITION_CREATE,
    PAGE_SIZE, PRODUCT_BY_HANDLE_QUERY, PRODUCT_SET_MUTATION, PUBLICATIONS_QUERY,
    PUBLISHABLE_PUBLISH_MUTATION,
};
use super::inputs::ProductSetInput;
use super::{
    Location, MetafieldDefinition, MetafieldOwnerType, ProductSetOutcome, Publication, TargetPlatform,
};
use crate::config::TargetConfig;

/// Max characters of a non-2xx body kept in the error
const ERROR_BODY_LIMIT: usize = 500;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Longest wait honored from a `Retry-After` header
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

pub struct ShopifyClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ShopifyClient {
    pub fn new(config: &TargetConfig) -> Result<Self> {
        if config.shop.trim().is_empty() {
            bail!("TARGET_SHOP must be set for the shopify backend");
        }
        if config.access_token.trim().is_empty() {
            bail!("TARGET_ACCESS_TOKEN must be set for the shopify backend");
        }

        let base = if config.shop.starts_with("http://") || config.shop.starts_with("https://") {
            config.shop.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", config.shop.trim_end_matches('/'))
        };
        let endpoint = format!("{}/admin/api/{}/graphql.json", base, config.api_version);

        Self::with_endpoint(&endpoint, &config.access_token, config.request_timeout, config.max_retries)
    }

    /// Client for an explicit GraphQL endpoint URL
    pub fn with_endpoint(endpoint: &str, access_token: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            access_token: access_token.to_string(),
            max_retries,
            retry_backoff: Duration::from_secs(2),
        })
    }

    /// Base delay between throttled attempts (multiplied by the attempt number)
    #[cfg(test)]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.retry_backoff * attempt)
    }

    /// POST one GraphQL document and decode `data` into `T`
    async fn execute<T: DeserializeOwned>(&self, label: &str, query: &str, variables: Value) -> Result<T, PlatformError> {
        let body = json!({ "query": query, "variables": variables });
        let attempts = self.max_retries + 1;

        for attempt in 1..=attempts {
            let response = self
                .http
                .post(&self.endpoint)
                .header(ACCESS_TOKEN_HEADER, &self.access_token)
                .json(&body)
                .send()
                .await
                .map_err(|source| PlatformError::Transport { label: label.to_string(), source })?;

            let status = response.status();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response
                .text()
                .await
                .map_err(|source| PlatformError::Transport { label: label.to_string(), source })?;

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < attempts {
                    let wait = self.backoff(attempt, retry_after);
                    warn!("{}: HTTP 429, retrying in {:?} (attempt {}/{})", label, wait, attempt, attempts);
                    tokio::time::sleep(wait).await;
                    continue;
                }
                return Err(PlatformError::Throttled { label: label.to_string(), attempts });
            }

            if !status.is_success() {
                return Err(PlatformError::Http {
                    label: label.to_string(),
                    status: status.as_u16(),
                    body: text.chars().take(ERROR_BODY_LIMIT).collect(),
                });
            }

            let envelope: Envelope = serde_json::from_str(&text)
                .map_err(|e| PlatformError::malformed(label, format!("invalid JSON: {}", e)))?;

            if !envelope.errors.is_empty() {
                if envelope.errors.iter().any(GraphQlErrorEntry::is_throttled) {
                    if attempt < attempts {
                        let wait = self.backoff(attempt, retry_after);
                        warn!("{}: THROTTLED, retrying in {:?} (attempt {}/{})", label, wait, attempt, attempts);
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    return Err(PlatformError::Throttled { label: label.to_string(), attempts });
                }
                return Err(PlatformError::GraphQl {
                    label: label.to_string(),
                    messages: envelope.errors.into_iter().map(|e| e.message).collect(),
                });
            }

            let data = envelope
                .data
                .filter(|d| !d.is_null())
                .ok_or_else(|| PlatformError::malformed(label, "response has no data"))?;

            return serde_json::from_value(data)
                .map_err(|e| PlatformError::malformed(label, format!("unexpected data shape: {}", e)));
        }

        Err(PlatformError::Throttled { label: label.to_string(), attempts })
    }

    /// Follow `pageInfo` cursors until the connection under `root` is exhausted
    async fn fetch_all<N: DeserializeOwned>(
        &self,
        label: &str,
        query: &str,
        root: &str,
        mut variables: Map<String, Value>,
    ) -> Result<Vec<N>, PlatformError> {
        variables.insert("first".to_string(), json!(PAGE_SIZE));
        let mut cursor: Option<String> = None;
        let mut nodes = Vec::new();
        let mut page = 0u32;

        loop {
            page += 1;
            variables.insert("cursor".to_string(), json!(cursor));
            let mut data: HashMap<String, Connection<N>> =
                self.execute(label, query, Value::Object(variables.clone())).await?;
            let connection = data
                .remove(root)
                .ok_or_else(|| PlatformError::malformed(label, format!("missing '{}'", root)))?;

            debug!("{}: page {} returned {} nodes", label, page, connection.nodes.len());
            nodes.extend(connection.nodes);

            match (connection.page_info.has_next_page, connection.page_info.end_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(nodes)
    }
}

// ==========================================================================
// Response shapes
// ==========================================================================

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphQlErrorEntry {
    #[serde(default)]
    message: String,
    #[serde(default)]
    extensions: Option<Value>,
}

impl GraphQlErrorEntry {
    fn is_throttled(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|e| e.get("code"))
            .and_then(Value::as_str)
            == Some("THROTTLED")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<N> {
    nodes: Vec<N>,
    page_info: PageInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Deserialize)]
struct CollectionNode {
    id: String,
    handle: String,
}

#[derive(Deserialize)]
struct TitleNode {
    title: Option<String>,
}

#[derive(Deserialize)]
struct AppNode {
    title: Option<String>,
    handle: Option<String>,
}

#[derive(Deserialize)]
struct PublicationNode {
    id: String,
    catalog: Option<TitleNode>,
    app: Option<AppNode>,
}

#[derive(Deserialize)]
struct LocationNode {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct TypeName {
    name: String,
}

#[derive(Deserialize)]
struct DefinitionNode {
    namespace: String,
    key: String,
    #[serde(rename = "type")]
    value_type: TypeName,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserErrorsPayload {
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionCreateData {
    metafield_definition_create: Option<UserErrorsPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductByHandleData {
    product_by_handle: Option<IdNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductSetPayload {
    product: Option<IdNode>,
    product_set_operation: Option<UserErrorsPayload>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductSetData {
    product_set: Option<ProductSetPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishData {
    publishable_publish: Option<UserErrorsPayload>,
}

#[async_trait]
impl TargetPlatform for ShopifyClient {
    async fn collection_ids_by_handle(&self) -> Result<HashMap<String, String>, PlatformError> {
        let nodes: Vec<CollectionNode> = self
            .fetch_all("collections", COLLECTIONS_QUERY, "collections", Map::new())
            .await?;
        Ok(nodes.into_iter().map(|n| (n.handle, n.id)).collect())
    }

    async fn publications(&self) -> Result<Vec<Publication>, PlatformError> {
        let nodes: Vec<PublicationNode> = self
            .fetch_all("publications", PUBLICATIONS_QUERY, "publications", Map::new())
            .await?;
        Ok(nodes
            .into_iter()
            .map(|n| Publication {
                id: n.id,
                catalog_title: n.catalog.and_then(|c| c.title),
                app_title: n.app.as_ref().and_then(|a| a.title.clone()),
                app_handle: n.app.and_then(|a| a.handle),
            })
            .collect())
    }

    async fn locations(&self) -> Result<Vec<Location>, PlatformError> {
        let nodes: Vec<LocationNode> = self
            .fetch_all("locations", LOCATIONS_QUERY, "locations", Map::new())
            .await?;
        Ok(nodes.into_iter().map(|n| Location { id: n.id, name: n.name }).collect())
    }

    async fn metafield_definitions(
        &self,
        owner: MetafieldOwnerType,
    ) -> Result<Vec<MetafieldDefinition>, PlatformError> {
        let mut variables = Map::new();
        variables.insert("ownerType".to_string(), json!(owner.as_str()));
        let label = format!("metafieldDefinitions {}", owner.as_str());

        let nodes: Vec<DefinitionNode> = self
            .fetch_all(&label, METAFIELD_DEFINITIONS_QUERY, "metafieldDefinitions", variables)
            .await?;
        Ok(nodes
            .into_iter()
            .map(|n| MetafieldDefinition {
                namespace: n.namespace,
                key: n.key,
                value_type: n.value_type.name,
            })
            .collect())
    }

    async fn create_metafield_definition(
        &self,
        owner: MetafieldOwnerType,
        definition: &MetafieldDefinition,
    ) -> Result<Vec<UserError>, PlatformError> {
        let label = format!("metafieldDefinitionCreate {}", definition.full_key());
        let variables = json!({
            "definition": {
                "ownerType": owner.as_str(),
                "namespace": definition.namespace,
                "key": definition.key,
                "type": definition.value_type,
                "name": definition.key,
                "pin": false,
            }
        });

        let data: DefinitionCreateData = self.execute(&label, METAFIELD_DEFINITION_CREATE, variables).await?;
        let payload = data
            .metafield_definition_create
            .ok_or_else(|| PlatformError::malformed(&label, "missing metafieldDefinitionCreate"))?;
        Ok(payload.user_errors)
    }

    async fn product_id_by_handle(&self, handle: &str) -> Result<Option<String>, PlatformError> {
        let label = format!("productByHandle {}", handle);
        let data: ProductByHandleData = self
            .execute(&label, PRODUCT_BY_HANDLE_QUERY, json!({ "handle": handle }))
            .await?;
        Ok(data.product_by_handle.map(|p| p.id))
    }

    async fn product_set(&self, input: &ProductSetInput) -> Result<ProductSetOutcome, PlatformError> {
        let label = format!("productSet {}", input.handle);
        let variables = json!({ "input": input, "synchronous": true });

        let data: ProductSetData = self.execute(&label, PRODUCT_SET_MUTATION, variables).await?;
        let payload = data
            .product_set
            .ok_or_else(|| PlatformError::malformed(&label, "missing productSet"))?;

        let mut user_errors = payload.user_errors;
        if let Some(operation) = payload.product_set_operation {
            user_errors.extend(operation.user_errors);
        }

        Ok(ProductSetOutcome {
            product_id: payload.product.map(|p| p.id),
            user_errors,
        })
    }

    async fn publish(&self, product_id: &str, publication_ids: &[String]) -> Result<Vec<UserError>, PlatformError> {
        let label = format!("publishablePublish {}", product_id);
        let input: Vec<Value> = publication_ids
            .iter()
            .map(|id| json!({ "publicationId": id }))
            .collect();

        let data: PublishData = self
            .execute(&label, PUBLISHABLE_PUBLISH_MUTATION, json!({ "id": product_id, "input": input }))
            .await?;
        let payload = data
            .publishable_publish
            .ok_or_else(|| PlatformError::malformed(&label, "missing publishablePublish"))?;
        Ok(payload.user_errors)
    }

    fn name(&self) -> &'static str {
        "shopify"
    }
}

/// Delay-seconds form of `Retry-After`, capped at `MAX_RETRY_AFTER`.
/// Anything that is not a representable non-negative duration is ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok().map(|wait| wait.min(MAX_RETRY_AFTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GQL_PATH: &str = "/admin/api/2025-07/graphql.json";

    fn client(server: &MockServer) -> ShopifyClient {
        ShopifyClient::with_endpoint(
            &format!("{}{}", server.uri(), GQL_PATH),
            "shpat_test",
            Duration::from_secs(5),
            2,
        )
        .unwrap()
        .with_retry_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn endpoint_is_built_from_shop_and_version() {
        let config = TargetConfig {
            shop: "demo.myshopify.com".into(),
            access_token: "token".into(),
            api_version: "2025-07".into(),
            ..TargetConfig::default()
        };
        let client = ShopifyClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "https://demo.myshopify.com/admin/api/2025-07/graphql.json");
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let config = TargetConfig {
            shop: "demo.myshopify.com".into(),
            ..TargetConfig::default()
        };
        assert!(ShopifyClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn non_success_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GQL_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let err = client(&server).product_id_by_handle("tee").await.unwrap_err();
        match err {
            PlatformError::Http { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid API key");
            }
            other => panic!("expected Http, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server).product_id_by_handle("tee").await.unwrap_err();
        assert!(matches!(err, PlatformError::Malformed { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn top_level_errors_array_is_graphql_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [{ "message": "Field 'productByHandle' doesn't exist" }]
            })))
            .mount(&server)
            .await;

        let err = client(&server).product_id_by_handle("tee").await.unwrap_err();
        match err {
            PlatformError::GraphQl { messages, .. } => {
                assert_eq!(messages, vec!["Field 'productByHandle' doesn't exist"]);
            }
            other => panic!("expected GraphQl, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn user_errors_are_data_not_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Shopify-Access-Token", "shpat_test"))
            .and(body_partial_json(serde_json::json!({ "variables": { "synchronous": true } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "productSet": {
                    "product": null,
                    "productSetOperation": { "id": "op", "status": "COMPLETE", "userErrors": [
                        { "code": "INVALID_VARIANT", "field": ["input", "variants", "0"], "message": "Bad variant" }
                    ]},
                    "userErrors": [{ "code": "TAKEN", "field": ["input", "handle"], "message": "Handle taken" }]
                }}
            })))
            .mount(&server)
            .await;

        let input = ProductSetInput { handle: "tee".into(), ..Default::default() };
        let outcome = client(&server).product_set(&input).await.unwrap();
        assert_eq!(outcome.product_id, None);
        assert_eq!(outcome.user_errors.len(), 2);
        assert_eq!(outcome.user_errors[0].code.as_deref(), Some("TAKEN"));
        assert_eq!(outcome.user_errors[1].code.as_deref(), Some("INVALID_VARIANT"));
    }

    #[tokio::test]
    async fn product_lookup_returns_id_or_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "variables": { "handle": "tee" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "productByHandle": { "id": "gid://shopify/Product/1" } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "variables": { "handle": "mug" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "productByHandle": null }
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client.product_id_by_handle("tee").await.unwrap().as_deref(),
            Some("gid://shopify/Product/1")
        );
        assert_eq!(client.product_id_by_handle("mug").await.unwrap(), None);
    }

    #[tokio::test]
    async fn collections_follow_cursor_until_last_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "variables": { "cursor": null } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "collections": {
                    "nodes": [{ "id": "gid://shopify/Collection/1", "handle": "summer" }],
                    "pageInfo": { "hasNextPage": true, "endCursor": "c1" }
                }}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "variables": { "cursor": "c1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "collections": {
                    "nodes": [{ "id": "gid://shopify/Collection/2", "handle": "sale" }],
                    "pageInfo": { "hasNextPage": false, "endCursor": "c2" }
                }}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let map = client(&server).collection_ids_by_handle().await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["sale"], "gid://shopify/Collection/2");
    }

    #[tokio::test]
    async fn throttled_responses_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "locations": {
                    "nodes": [{ "id": "gid://shopify/Location/1", "name": "Main" }],
                    "pageInfo": { "hasNextPage": false, "endCursor": null }
                }}
            })))
            .mount(&server)
            .await;

        let locations = client(&server).locations().await.unwrap();
        assert_eq!(locations, vec![Location { id: "gid://shopify/Location/1".into(), name: "Main".into() }]);
    }

    #[tokio::test]
    async fn throttling_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [{ "message": "Throttled", "extensions": { "code": "THROTTLED" } }]
            })))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server).locations().await.unwrap_err();
        assert!(matches!(err, PlatformError::Throttled { attempts: 3, .. }), "{:?}", err);
    }

    fn locations_body() -> serde_json::Value {
        serde_json::json!({
            "data": { "locations": {
                "nodes": [{ "id": "gid://shopify/Location/1", "name": "Main" }],
                "pageInfo": { "hasNextPage": false, "endCursor": null }
            }}
        })
    }

    async fn throttle_once(retry_after: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", retry_after))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(locations_body()))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn retry_after_is_capped_and_bad_values_ignored() {
        assert_eq!(parse_retry_after("0.25"), Some(Duration::from_millis(250)));
        assert_eq!(parse_retry_after(" 2 "), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after("86400"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("1e30"), None);
        assert_eq!(parse_retry_after("inf"), None);
        assert_eq!(parse_retry_after("NaN"), None);
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[tokio::test]
    async fn retry_after_header_is_honored() {
        let server = throttle_once("0.2").await;

        let started = Instant::now();
        let locations = client(&server).locations().await.unwrap();

        assert_eq!(locations.len(), 1);
        assert!(started.elapsed() >= Duration::from_millis(200), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn overflowing_retry_after_falls_back_to_backoff() {
        let server = throttle_once("1e30").await;

        let started = Instant::now();
        let locations = client(&server).locations().await.unwrap();

        assert_eq!(locations.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn garbage_retry_after_falls_back_to_backoff() {
        let server = throttle_once("soon").await;

        let locations = client(&server).locations().await.unwrap();
        assert_eq!(locations.len(), 1);
    }
}
