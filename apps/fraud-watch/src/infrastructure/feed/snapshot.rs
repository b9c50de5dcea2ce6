//! HTTP Snapshot Fetcher
//!
//! Implements [`SnapshotSource`] against the prediction service's batch
//! endpoint. Accepts a bare JSON array or `{"transactions": [...]}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::application::ports::{FeedError, SnapshotSource, TimeWindow};
use crate::domain::transaction::TransactionRecord;
use crate::infrastructure::config::FeedSettings;

/// Snapshot adapter over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpSnapshotFetcher {
    client: Client,
    url: String,
    timeout: std::time::Duration,
}

impl HttpSnapshotFetcher {
    /// Create a fetcher sharing an existing client.
    #[must_use]
    pub fn new(client: Client, settings: &FeedSettings) -> Self {
        Self {
            client,
            url: settings.snapshot_url(),
            timeout: settings.timeout,
        }
    }

    /// Endpoint this fetcher reads from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotFetcher {
    async fn fetch(&self, window: Option<TimeWindow>) -> Result<Vec<TransactionRecord>, FeedError> {
        let mut request = self.client.get(&self.url).timeout(self.timeout);
        if let Some(window) = window {
            if let Some(from) = window.from {
                request = request.query(&[("from", from.to_rfc3339())]);
            }
            if let Some(to) = window.to {
                request = request.query(&[("to", to.to_rfc3339())]);
            }
        }

        let response = request.send().await.map_err(|e| FeedError::Transport {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Transport {
                message: format!("snapshot request returned {status}"),
            });
        }

        let body = response.bytes().await.map_err(|e| FeedError::Transport {
            message: e.to_string(),
        })?;

        let mut records = decode_snapshot(&body)?;
        if let Some(window) = window {
            records.retain(|r| window.contains(r.timestamp));
        }

        tracing::debug!(url = %self.url, count = records.len(), "Snapshot fetched");
        Ok(records)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotBody {
    List(Vec<serde_json::Value>),
    Wrapped { transactions: Vec<serde_json::Value> },
}

/// Decode a snapshot body. One invalid record fails the whole batch.
///
/// # Errors
///
/// Returns [`FeedError::Format`] naming the first offending record.
pub fn decode_snapshot(body: &[u8]) -> Result<Vec<TransactionRecord>, FeedError> {
    let values = match serde_json::from_slice::<SnapshotBody>(body) {
        Ok(SnapshotBody::List(values) | SnapshotBody::Wrapped {
            transactions: values,
        }) => values,
        Err(e) => {
            return Err(FeedError::Format {
                message: format!("expected a list of transactions: {e}"),
            });
        }
    };

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            TransactionRecord::deserialize(value).map_err(|e| FeedError::Format {
                message: format!("record {index}: {e}"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_array() {
        let body = br#"[{"id":"t1","source":"A","target":"B","amount":10}]"#;
        let records = decode_snapshot(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "t1");
    }

    #[test]
    fn wrapped_object() {
        let body = br#"{"transactions":[{"id":1,"source":"A","target":"B","amount":10}]}"#;
        assert_eq!(decode_snapshot(body).unwrap()[0].id, "1");
    }

    #[test]
    fn empty_list_is_success() {
        assert!(decode_snapshot(b"[]").unwrap().is_empty());
    }

    #[test]
    fn one_bad_record_fails_batch() {
        let body = br#"[
            {"id":"t1","source":"A","target":"B","amount":10},
            {"id":"t2","source":"","target":"B","amount":10}
        ]"#;
        let err = decode_snapshot(body).unwrap_err();
        assert!(matches!(err, FeedError::Format { ref message } if message.starts_with("record 1")));
    }

    #[test]
    fn non_list_body_is_format_error() {
        assert!(matches!(
            decode_snapshot(br#"{"status":"ok"}"#),
            Err(FeedError::Format { .. })
        ));
        assert!(matches!(
            decode_snapshot(b"<html>"),
            Err(FeedError::Format { .. })
        ));
    }
}
