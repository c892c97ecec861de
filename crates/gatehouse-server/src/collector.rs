//! HTTP log collector.
//!
//! Each batch is one `POST` with a JSON array body:
//!
//! ```json
//! [{"TAG":"SERVICE","date_time":"2024-06-15 12:00:00","info":"SYNC message received from ID: 3"}]
//! ```
//!
//! Only `200 OK` counts as acceptance.

use async_trait::async_trait;
use gatehouse_core::{
    logbook::LogRecord,
    sync::{CollectError, Collector},
};
use reqwest::{Client, StatusCode, Url};

use crate::{CollectorConfig, ServerError};

/// Uploads log batches to an HTTP(S) endpoint.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: Client,
    url: Url,
}

impl HttpCollector {
    /// Build a collector for `config.url` with the configured timeout.
    pub fn new(config: &CollectorConfig) -> Result<Self, ServerError> {
        let url = Url::parse(&config.url)
            .map_err(|err| ServerError::Config(format!("collector url {:?}: {err}", config.url)))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| ServerError::Config(format!("http client: {err}")))?;
        Ok(Self { client, url })
    }

    /// Endpoint in use.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn push_batch(&self, records: &[LogRecord]) -> Result<(), CollectError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(records)
            .send()
            .await
            .map_err(|err| CollectError::Unreachable(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            tracing::debug!(records = records.len(), "batch uploaded");
            Ok(())
        } else {
            Err(CollectError::Rejected { status: status.as_u16() })
        }
    }
}
