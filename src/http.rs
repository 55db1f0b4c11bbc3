use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};

use crate::error::StoreError;
use crate::store::ObjectStore;

/// Reads summary text from an HTTP object endpoint laid out as
/// `{base_url}/{bucket}/{reference}`.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn object_url(&self, bucket: &str, reference: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            bucket.trim_matches('/'),
            reference.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_text(&self, bucket: &str, reference: &str) -> Result<String, StoreError> {
        let url = self.object_url(bucket, reference);
        debug!("Fetching object {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                reference: reference.to_string(),
            });
        }
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_joins_segments() {
        let store = HttpObjectStore::new("http://localhost:9000/");
        assert_eq!(
            store.object_url("sourced-articles", "/2024/03/01/a1/short.txt"),
            "http://localhost:9000/sourced-articles/2024/03/01/a1/short.txt"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let store = HttpObjectStore::new("http://127.0.0.1:9");
        let result = store.get_text("bucket", "missing").await;
        assert!(matches!(result, Err(StoreError::Http(_))));
    }
}
