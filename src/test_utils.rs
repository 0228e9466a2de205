use crate::harbor_api::{ApiClient, HarborApiError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A request as seen by the `MockClient`.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: reqwest::Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub expected_status: u16,
}

/// In memory `ApiClient` replaying queued `(status, body)` replies in order
/// and recording every request it receives.
#[derive(Default)]
pub struct MockClient {
    replies: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiClient for MockClient {
    async fn send_request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
        expected_status: u16,
    ) -> Result<String, HarborApiError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: path.to_string(),
            body,
            expected_status,
        });

        let (status, body) = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((500, String::from("no reply queued")));

        if status == expected_status {
            Ok(body)
        } else {
            Err(HarborApiError::ApiStatusError {
                expected: expected_status,
                status,
                body,
            })
        }
    }
}

/// Json array as returned by `GET /api/registries`.
pub fn registries_body(id: i64, name: &str, description: &str) -> String {
    serde_json::json!([{
        "id": id,
        "name": name,
        "url": "https://hub.docker.com",
        "type": "docker-hub",
        "insecure": false,
        "description": description,
        "credential": {
            "access_key": "user1",
            "access_secret": "*****",
            "type": "basic"
        },
        "status": "healthy"
    }])
    .to_string()
}
