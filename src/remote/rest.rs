use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::config::RemoteSettings;
use crate::http_client::{self, RetryConfig};

use super::{RemoteError, RemoteStore, UploadRecord};

const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;
const MAX_ACK_BYTES: usize = 64 * 1024;
const UPSERT_CONFLICT_COLUMNS: &str = "folder_name,device_id";

/// REST client for a PostgREST-style table API with an object storage API
/// mounted under `/storage/v1`.
pub struct RestRemote {
    base: Url,
    api_key: String,
    retry: RetryConfig,
    known_buckets: Mutex<HashSet<String>>,
}

impl RestRemote {
    pub fn new(settings: &RemoteSettings) -> Result<Self, RemoteError> {
        Self::with_retry(settings, RetryConfig::default())
    }

    pub(crate) fn with_retry(
        settings: &RemoteSettings,
        retry: RetryConfig,
    ) -> Result<Self, RemoteError> {
        let invalid = |reason: String| RemoteError::InvalidUrl {
            url: settings.url.clone(),
            reason,
        };
        let base = Url::parse(&settings.url).map_err(|err| invalid(err.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(invalid("expected an http(s) base URL".to_string()));
        }
        Ok(Self {
            base,
            api_key: settings.api_key.clone(),
            retry,
            known_buckets: Mutex::new(HashSet::new()),
        })
    }

    fn endpoint<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl {
                url: self.base.to_string(),
                reason: "URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: &str, url: &Url, timeout: Duration) -> ureq::Request {
        http_client::agent()
            .request_url(method, url)
            .timeout(timeout)
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
    }

    fn send_with_retry(
        &self,
        mut call: impl FnMut() -> Result<ureq::Response, ureq::Error>,
    ) -> Result<ureq::Response, RemoteError> {
        http_client::retry_with_backoff(
            self.retry,
            || call().map_err(map_ureq_error),
            RemoteError::is_transient,
        )
    }
}

impl RemoteStore for RestRemote {
    fn ensure_bucket(&self, bucket: &str) -> Result<(), RemoteError> {
        if self
            .known_buckets
            .lock()
            .is_ok_and(|known| known.contains(bucket))
        {
            return Ok(());
        }
        let url = self.endpoint(["storage", "v1", "bucket"])?;
        let body = json!({ "id": bucket, "name": bucket, "public": true });
        let result = self.send_with_retry(|| {
            self.request("POST", &url, http_client::METADATA_TIMEOUT)
                .send_json(&body)
        });
        match result {
            Ok(_) => info!(bucket, "Storage bucket created"),
            Err(RemoteError::Status { code: 409, .. }) => debug!(bucket, "Storage bucket exists"),
            Err(RemoteError::Status { body, .. })
                if body.to_ascii_lowercase().contains("already exists") =>
            {
                debug!(bucket, "Storage bucket exists");
            }
            Err(err) => return Err(err),
        }
        if let Ok(mut known) = self.known_buckets.lock() {
            known.insert(bucket.to_string());
        }
        Ok(())
    }

    fn upload_object(
        &self,
        bucket: &str,
        segments: &[&str],
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RemoteError> {
        let url = self.endpoint(
            ["storage", "v1", "object", bucket]
                .into_iter()
                .chain(segments.iter().copied()),
        )?;
        let response = self.send_with_retry(|| {
            self.request("POST", &url, http_client::TRANSFER_TIMEOUT)
                .set("Content-Type", content_type)
                .set("x-upsert", "true")
                .send_bytes(&bytes)
        })?;
        let ack = http_client::read_response_bytes(response, MAX_ACK_BYTES)
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        debug!(object = %url, ack_bytes = ack.len(), "Object stored");

        let public = self.endpoint(
            ["storage", "v1", "object", "public", bucket]
                .into_iter()
                .chain(segments.iter().copied()),
        )?;
        Ok(public.to_string())
    }

    fn upsert_record(&self, table: &str, record: &UploadRecord) -> Result<(), RemoteError> {
        let mut url = self.endpoint(["rest", "v1", table])?;
        url.query_pairs_mut()
            .append_pair("on_conflict", UPSERT_CONFLICT_COLUMNS);
        let body = serde_json::to_value(record)?;
        self.send_with_retry(|| {
            self.request("POST", &url, http_client::METADATA_TIMEOUT)
                .set("Prefer", "resolution=merge-duplicates,return=minimal")
                .send_json(&body)
        })?;
        Ok(())
    }
}

fn map_ureq_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(code, response) => RemoteError::Status {
            code,
            body: http_client::read_body_limited(response, MAX_ERROR_BODY_BYTES),
        },
        ureq::Error::Transport(err) => RemoteError::Transport(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{TestStatus, UploadMetadata};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    struct Captured {
        request_line: String,
        headers: Vec<String>,
        body: Vec<u8>,
    }

    impl Captured {
        fn header(&self, name: &str) -> Option<String> {
            let prefix = format!("{}:", name.to_ascii_lowercase());
            self.headers.iter().find_map(|line| {
                line.to_ascii_lowercase()
                    .starts_with(&prefix)
                    .then(|| line[prefix.len()..].trim().to_string())
            })
        }
    }

    /// Serve one request with `response` and hand the parsed request back.
    fn serve_once(response: &'static str) -> (String, mpsc::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut reader = BufReader::new(stream);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    break;
                }
                headers.push(line);
            }
            let length = headers
                .iter()
                .find_map(|line| {
                    line.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .map(|value| value.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            let mut body = vec![0u8; length];
            reader.read_exact(&mut body).unwrap();
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            let _ = tx.send(Captured {
                request_line: request_line.trim_end().to_string(),
                headers,
                body,
            });
        });
        (format!("http://{addr}"), rx)
    }

    fn remote(url: &str) -> RestRemote {
        let settings = RemoteSettings {
            url: url.to_string(),
            api_key: "key-123".to_string(),
            ..RemoteSettings::default()
        };
        RestRemote::with_retry(
            &settings,
            RetryConfig {
                max_attempts: 1,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
            },
        )
        .unwrap()
    }

    fn sample_record() -> UploadRecord {
        UploadRecord {
            folder_name: "Batch1".into(),
            device_id: "dev-1".into(),
            images: vec![],
            test_results: Some(json!({"result": [1]})),
            test_date: "2024-01-01T00:00:00Z".into(),
            test_status: TestStatus::Passed,
            upload_batch: "batch_1".into(),
            metadata: UploadMetadata {
                upload_timestamp: "2024-01-01T00:00:00Z".into(),
                total_images: 0,
                files_processed: vec![],
                folder_hash: "h".into(),
                image_urls: vec![],
                upload_batch_id: None,
                device_id: "dev-1".into(),
                device_name: "n".into(),
                device_type: "t".into(),
            },
            data_type: "image_analysis".into(),
        }
    }

    #[test]
    fn upsert_posts_to_table_with_merge_preference() {
        let (url, rx) = serve_once("HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n");
        remote(&url)
            .upsert_record("device_test", &sample_record())
            .unwrap();
        let captured = rx.recv().unwrap();
        assert_eq!(
            captured.request_line,
            "POST /rest/v1/device_test?on_conflict=folder_name%2Cdevice_id HTTP/1.1"
        );
        assert_eq!(captured.header("apikey").as_deref(), Some("key-123"));
        assert_eq!(
            captured.header("authorization").as_deref(),
            Some("Bearer key-123")
        );
        assert!(captured.header("prefer").unwrap().contains("merge-duplicates"));
        let body: serde_json::Value = serde_json::from_slice(&captured.body).unwrap();
        assert_eq!(body["folder_name"], "Batch1");
        assert_eq!(body["test_status"], "passed");
    }

    #[test]
    fn upload_encodes_segments_and_returns_public_url() {
        let (url, rx) = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}");
        let public = remote(&url)
            .upload_object(
                "images",
                &["dev-1", "Batch 1", "my shot.png"],
                b"png".to_vec(),
                "image/png",
            )
            .unwrap();
        let captured = rx.recv().unwrap();
        assert_eq!(
            captured.request_line,
            "POST /storage/v1/object/images/dev-1/Batch%201/my%20shot.png HTTP/1.1"
        );
        assert_eq!(captured.header("x-upsert").as_deref(), Some("true"));
        assert_eq!(captured.body, b"png");
        assert_eq!(
            public,
            format!("{url}/storage/v1/object/public/images/dev-1/Batch%201/my%20shot.png")
        );
    }

    #[test]
    fn existing_bucket_counts_as_success() {
        let (url, _rx) = serve_once(concat!(
            "HTTP/1.1 400 Bad Request\r\nContent-Length: 36\r\n\r\n",
            "{\"message\":\"Bucket already exists\"}\n",
        ));
        let remote = remote(&url);
        remote.ensure_bucket("images").unwrap();
        remote.ensure_bucket("images").unwrap();
    }

    #[test]
    fn conflict_status_counts_as_existing_bucket() {
        let (url, _rx) = serve_once("HTTP/1.1 409 Conflict\r\nContent-Length: 0\r\n\r\n");
        remote(&url).ensure_bucket("images").unwrap();
    }

    #[test]
    fn server_error_surfaces_status_and_body() {
        let (url, _rx) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\n\r\noops",
        );
        let err = remote(&url)
            .upsert_record("device_test", &sample_record())
            .unwrap_err();
        match err {
            RemoteError::Status { code, body } => {
                assert_eq!(code, 500);
                assert_eq!(body, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_http_urls() {
        let settings = RemoteSettings {
            url: "ftp://example.com".into(),
            ..RemoteSettings::default()
        };
        assert!(matches!(
            RestRemote::new(&settings),
            Err(RemoteError::InvalidUrl { .. })
        ));
    }
}
