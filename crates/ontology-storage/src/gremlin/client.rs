//! Transport to a Gremlin-compatible server

use super::compile::Query;
use crate::error::EngineResult;
use async_trait::async_trait;
use serde_json::Value;

/// Submits compiled queries and returns their result lists
#[async_trait]
pub trait GremlinClient: Send + Sync {
    async fn submit(&self, query: &Query) -> EngineResult<Vec<Value>>;
}

#[cfg(feature = "gremlin")]
pub use http::HttpGremlinClient;

#[cfg(feature = "gremlin")]
mod http {
    use super::GremlinClient;
    use crate::error::EngineResult;
    use crate::gremlin::compile::Query;
    use crate::gremlin::graphson;
    use async_trait::async_trait;
    use reqwest::header::ACCEPT;
    use reqwest::Client;
    use serde_json::{json, Value};
    use std::time::Duration;

    const GRAPHSON_MIME: &str = "application/vnd.gremlin-v3.0+json;types=false";

    /// Gremlin Server's HTTP endpoint
    pub struct HttpGremlinClient {
        client: Client,
        url: String,
    }

    impl HttpGremlinClient {
        pub fn new(url: impl Into<String>, request_timeout: Duration) -> EngineResult<Self> {
            let client = Client::builder().timeout(request_timeout).build()?;
            Ok(Self {
                client,
                url: url.into(),
            })
        }
    }

    #[async_trait]
    impl GremlinClient for HttpGremlinClient {
        async fn submit(&self, query: &Query) -> EngineResult<Vec<Value>> {
            let body = json!({
                "gremlin": query.script,
                "bindings": query.bindings,
            });

            let response = self
                .client
                .post(&self.url)
                .header(ACCEPT, GRAPHSON_MIME)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let bytes = response.bytes().await?;
            if !status.is_success() {
                tracing::debug!("Gremlin server answered {}", status);
            }

            // Error statuses still carry the envelope with the server's message
            graphson::decode_response(&bytes)
        }
    }
}
