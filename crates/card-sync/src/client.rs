//! HTTP client for the card notification service.
//!
//! All calls carry a bearer token. The engine decides what to do with
//! failures; this client only maps HTTP outcomes to [`SyncError`].

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::Duration;

use crate::engine::{RemoteServiceClient, TransportError};
use crate::error::{Result, SyncError};
use crate::types::*;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Client for the card notification service.
#[derive(Debug, Clone)]
pub struct NowServerClient {
    client: reqwest::Client,
    base_url: String,
}

impl NowServerClient {
    fn log_response(status: StatusCode, body: &str) {
        if status.is_success() {
            debug!("[CardSync] API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[CardSync] API response error ({}): {}", status, preview);
    }

    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root of the notification service, e.g. "https://cards.example.com/api"
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create headers for an API request.
    fn headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| SyncError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    /// Parse a JSON response body, requiring HTTP 200.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if status != StatusCode::OK {
            return Err(SyncError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "[CardSync] Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            SyncError::Json(e)
        })
    }

    /// Fetch cards for the given groups.
    ///
    /// GET /notifications?timeZoneOffsetMs=&requestTypes=<group>&uiLocale=
    pub async fn get_notifications(
        &self,
        token: &str,
        query: &NotificationsQuery,
    ) -> Result<NotificationsResponse> {
        let url = format!(
            "{}/notifications?{}",
            self.base_url,
            query.to_query_string()
        );
        debug!("[CardSync] Requesting cards: {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(token)?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Read the user's opt-in setting.
    ///
    /// GET /settings/optin
    pub async fn get_opt_in(&self, token: &str) -> Result<bool> {
        let url = format!("{}/settings/optin", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(token)?)
            .send()
            .await?;

        let parsed: OptInResponse = Self::parse_response(response).await?;
        Ok(parsed.value)
    }

    /// Tell the server a card was dismissed. Only HTTP 204 counts as success.
    ///
    /// DELETE /notifications/<id>?age=<ms>&chromeNotificationId=<id>&<extra params>
    pub async fn delete_notification(&self, token: &str, request: &DismissalRequest) -> Result<()> {
        let url = format!("{}/{}", self.base_url, request.to_path_and_query());
        debug!("[CardSync] Dismissing card: {}", url);

        let response = self
            .client
            .delete(&url)
            .headers(self.headers(token)?)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!("[CardSync] Dismissal acknowledged");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Self::log_response(status, &body);
        Err(SyncError::api(
            status.as_u16(),
            format!("Dismissal failed: {}", body),
        ))
    }
}

#[async_trait]
impl RemoteServiceClient for NowServerClient {
    async fn get_notifications(
        &self,
        token: &str,
        query: NotificationsQuery,
    ) -> std::result::Result<NotificationsResponse, TransportError> {
        NowServerClient::get_notifications(self, token, &query)
            .await
            .map_err(TransportError::from)
    }

    async fn get_opt_in(&self, token: &str) -> std::result::Result<bool, TransportError> {
        NowServerClient::get_opt_in(self, token)
            .await
            .map_err(TransportError::from)
    }

    async fn delete_notification(
        &self,
        token: &str,
        request: DismissalRequest,
    ) -> std::result::Result<(), TransportError> {
        NowServerClient::delete_notification(self, token, &request)
            .await
            .map_err(TransportError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiRetryClass;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        request_line: String,
        authorization: Option<String>,
    }

    #[derive(Debug, Clone)]
    struct MockResponse {
        status: u16,
        body: String,
    }

    fn header_end_offset(buffer: &[u8]) -> Option<usize> {
        buffer.windows(4).position(|window| window == b"\r\n\r\n")
    }

    async fn read_http_request(stream: &mut tokio::net::TcpStream) -> Option<CapturedRequest> {
        let mut buffer = Vec::new();
        loop {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                return None;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if header_end_offset(&buffer).is_some() {
                break;
            }
        }

        let header_end = header_end_offset(&buffer)?;
        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let mut lines = head.lines();
        let request_line = lines.next()?.to_string();

        let mut authorization = None;
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("authorization") {
                    authorization = Some(value.trim().to_string());
                }
            }
        }

        Some(CapturedRequest {
            request_line,
            authorization,
        })
    }

    fn status_text(status: u16) -> &'static str {
        match status {
            200 => "OK",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            405 => "Method Not Allowed",
            500 => "Internal Server Error",
            _ => "Error",
        }
    }

    async fn write_http_response(
        stream: &mut tokio::net::TcpStream,
        status: u16,
        body: &str,
    ) -> std::io::Result<()> {
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            status_text(status),
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await
    }

    async fn start_mock_server(
        responses: Vec<MockResponse>,
    ) -> (
        String,
        Arc<TokioMutex<Vec<CapturedRequest>>>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let captured = Arc::new(TokioMutex::new(Vec::<CapturedRequest>::new()));
        let scripted = Arc::new(TokioMutex::new(VecDeque::from(responses)));
        let captured_clone = Arc::clone(&captured);
        let scripted_clone = Arc::clone(&scripted);

        let handle = tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(value) => value,
                    Err(_) => break,
                };
                let captured_inner = Arc::clone(&captured_clone);
                let scripted_inner = Arc::clone(&scripted_clone);
                tokio::spawn(async move {
                    let Some(request) = read_http_request(&mut stream).await else {
                        return;
                    };
                    captured_inner.lock().await.push(request);

                    let response = scripted_inner.lock().await.pop_front().unwrap_or(
                        MockResponse {
                            status: 500,
                            body: "unexpected request".to_string(),
                        },
                    );
                    let _ = write_http_response(&mut stream, response.status, &response.body).await;
                });
            }
        });

        (format!("http://{}", addr), captured, handle)
    }

    #[tokio::test]
    async fn get_notifications_sends_query_and_bearer_token() {
        let body = r#"{"groups":{"A":{"nextPollSeconds":300,"requested":true}},"notifications":[{"notificationId":"n1","groupName":"A","chromeNotificationId":"c1","trigger":{"hideTimeSec":60}}]}"#;
        let (base_url, captured, server) = start_mock_server(vec![MockResponse {
            status: 200,
            body: body.to_string(),
        }])
        .await;
        let client = NowServerClient::new(&base_url).unwrap();
        let query = NotificationsQuery {
            time_zone_offset_ms: 0,
            request_types: vec!["A".to_string()],
            ui_locale: "en".to_string(),
        };

        let response = client.get_notifications("token-1", &query).await.unwrap();

        assert_eq!(response.notifications.len(), 1);
        assert_eq!(response.groups["A"].next_poll_seconds, Some(300));
        let requests = captured.lock().await;
        assert_eq!(
            requests[0].request_line,
            "GET /notifications?timeZoneOffsetMs=0&requestTypes=A&uiLocale=en HTTP/1.1"
        );
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer token-1"));
        server.abort();
    }

    #[tokio::test]
    async fn get_opt_in_reads_value() {
        let (base_url, _captured, server) = start_mock_server(vec![MockResponse {
            status: 200,
            body: r#"{"value":true}"#.to_string(),
        }])
        .await;
        let client = NowServerClient::new(&base_url).unwrap();

        assert!(client.get_opt_in("token").await.unwrap());
        server.abort();
    }

    #[tokio::test]
    async fn unauthorized_response_requires_reauth() {
        let (base_url, _captured, server) = start_mock_server(vec![MockResponse {
            status: 401,
            body: "{}".to_string(),
        }])
        .await;
        let client = NowServerClient::new(&base_url).unwrap();

        let err = client.get_opt_in("stale").await.unwrap_err();

        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.retry_class(), ApiRetryClass::ReauthRequired);
        server.abort();
    }

    #[tokio::test]
    async fn delete_notification_succeeds_only_on_no_content() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockResponse {
                status: 204,
                body: String::new(),
            },
            MockResponse {
                status: 405,
                body: String::new(),
            },
        ])
        .await;
        let client = NowServerClient::new(&base_url).unwrap();
        let request = DismissalRequest {
            notification_id: "n1".to_string(),
            chrome_notification_id: "c1".to_string(),
            age_ms: 10,
            parameters: BTreeMap::from([("k".to_string(), "v".to_string())]),
        };

        client.delete_notification("token", &request).await.unwrap();
        let err = client
            .delete_notification("token", &request)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(405));
        assert_eq!(err.retry_class(), ApiRetryClass::Permanent);
        let requests = captured.lock().await;
        assert_eq!(
            requests[0].request_line,
            "DELETE /notifications/n1?age=10&chromeNotificationId=c1&k=v HTTP/1.1"
        );
        server.abort();
    }
}
