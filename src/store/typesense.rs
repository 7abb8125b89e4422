use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::config::TypesenseConfig;
use crate::record::{Document, SearchHit};

use super::{
    CollectionInfo, CollectionSchema, ImportResult, SchemaOutcome, StoreError, VectorStore,
    VECTOR_FIELD,
};

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// Largest page Typesense serves for one search.
pub const MAX_PER_PAGE: usize = 250;

/// Blocking client for a single Typesense node.
pub struct TypesenseClient {
    base_url: String,
    api_key: String,
    http: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct HealthResponse {
    ok: bool,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Deserialize)]
struct MultiSearchResponse {
    #[serde(default)]
    results: Vec<MultiSearchResult>,
}

#[derive(Deserialize)]
struct MultiSearchResult {
    #[serde(default)]
    hits: Vec<RawHit>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<u16>,
}

#[derive(Deserialize)]
struct RawHit {
    document: Document,
    #[serde(default)]
    vector_distance: Option<f32>,
}

impl TypesenseClient {
    /// Build a client and check the server answers `/health`.
    ///
    /// Fails fast on a missing API key or an unreachable server.
    pub fn connect(config: &TypesenseConfig) -> Result<Self, StoreError> {
        let api_key = config.require_api_key()?.to_string();

        let http = reqwest::blocking::Client::builder()
            .connect_timeout(config.connection_timeout())
            .timeout(config.request_timeout())
            .build()?;

        let client = Self {
            base_url: config.base_url(),
            api_key,
            http,
        };

        let health: HealthResponse = handle_response(client.get("/health").send()?)?;
        if !health.ok {
            return Err(StoreError::Unhealthy);
        }

        log::info!("Connected to Typesense at {}", client.base_url);
        Ok(client)
    }

    fn get(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        log::debug!("GET {}{}", self.base_url, url);
        self.http
            .get(format!("{}{}", self.base_url, url))
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn post(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        log::debug!("POST {}{}", self.base_url, url);
        self.http
            .post(format!("{}{}", self.base_url, url))
            .header(API_KEY_HEADER, &self.api_key)
    }
}

fn api_error(status: StatusCode, text: &str) -> StoreError {
    let message = serde_json::from_str::<ErrorResponse>(text)
        .map(|e| e.message)
        .unwrap_or_else(|_| text.to_string());

    StoreError::Api {
        status: status.as_u16(),
        message,
    }
}

fn handle_response<T>(response: reqwest::blocking::Response) -> Result<T, StoreError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let text = response.text()?;

    if !status.is_success() {
        return Err(api_error(status, &text));
    }

    serde_json::from_str::<T>(&text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        StoreError::Decode(err.to_string())
    })
}

/// Render the `vector_query` parameter, e.g. `embedding:([0.1,0.2], k:10)`.
pub fn vector_query(query: &[f32], k: usize) -> String {
    let values = query
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{VECTOR_FIELD}:([{values}], k:{k})")
}

impl VectorStore for TypesenseClient {
    fn create_collection(&self, schema: &CollectionSchema) -> Result<SchemaOutcome, StoreError> {
        let resp = self.post("/collections").json(schema).send()?;

        if resp.status() == StatusCode::CONFLICT {
            return Ok(SchemaOutcome::AlreadyExists);
        }

        handle_response::<serde_json::Value>(resp)?;
        Ok(SchemaOutcome::Created)
    }

    fn upsert_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<Vec<ImportResult>, StoreError> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        let body = documents
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .join("\n");

        let resp = self
            .post(&format!("/collections/{collection}/documents/import"))
            .query(&[("action", "upsert")])
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        let text = resp.text()?;
        if !status.is_success() {
            return Err(api_error(status, &text));
        }

        // One JSON object per line, in request order
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<ImportResult>(line)
                    .map_err(|e| StoreError::Decode(format!("{e}: {line}")))
            })
            .collect()
    }

    fn collection_info(&self, collection: &str) -> Result<CollectionInfo, StoreError> {
        let resp = self.get(&format!("/collections/{collection}")).send()?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        handle_response(resp)
    }

    fn vector_search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let k = if k > MAX_PER_PAGE {
            log::debug!("k={k} exceeds the page limit, returning the top {MAX_PER_PAGE}");
            MAX_PER_PAGE
        } else {
            k
        };

        let resp = self
            .post("/multi_search")
            .json(&json!({
                "searches": [{
                    "collection": collection,
                    "q": "*",
                    "vector_query": vector_query(query, k),
                    "per_page": k,
                    "exclude_fields": VECTOR_FIELD,
                }]
            }))
            .send()?;

        let response: MultiSearchResponse = handle_response(resp)?;
        let result = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("multi_search returned no results".to_string()))?;

        if let Some(error) = result.error {
            return Err(StoreError::Api {
                status: result.code.unwrap_or(400),
                message: error,
            });
        }

        Ok(result
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                document: hit.document,
                distance: hit.vector_distance,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_query_format() {
        assert_eq!(vector_query(&[0.5, -1.0, 0.25], 10), "embedding:([0.5,-1,0.25], k:10)");
    }

    #[test]
    fn test_connect_requires_api_key() {
        let config = TypesenseConfig::default();
        assert!(matches!(
            TypesenseClient::connect(&config),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_api_error_uses_message_field() {
        let err = api_error(StatusCode::BAD_REQUEST, r#"{"message": "Bad vector query"}"#);
        match err {
            StoreError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad vector query");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_falls_back_to_body() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, StoreError::Api { status: 502, ref message } if message == "upstream down"));
    }
}
