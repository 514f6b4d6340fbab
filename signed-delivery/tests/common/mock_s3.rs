use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::{net::TcpListener, task::JoinHandle};

/// A request as seen by [`MockS3`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn has_query(&self, key: &str) -> bool {
        self.query.contains_key(key)
    }

    pub fn part_number(&self) -> Option<u32> {
        self.query.get("partNumber").and_then(|n| n.parse().ok())
    }
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    failing_part: Option<u32>,
}

/// Minimal S3 stand-in: path-style `PutObject` and the multipart calls
pub struct MockS3 {
    pub endpoint: String,
    state: MockState,
    handle: JoinHandle<()>,
}

impl MockS3 {
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    /// Every attempt to upload `part_number` answers 500
    pub async fn with_failing_part(part_number: u32) -> Self {
        Self::start_with(Some(part_number)).await
    }

    async fn start_with(failing_part: Option<u32>) -> Self {
        let state = MockState {
            failing_part,
            ..MockState::default()
        };

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock S3");
        let addr = listener.local_addr().expect("Failed to read mock S3 address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock S3 stopped");
        });

        Self {
            endpoint: format!("http://{addr}"),
            state,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_matching(&self, method: &Method) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == *method)
            .collect()
    }
}

impl Drop for MockS3 {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let query: HashMap<String, String> = uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let request = RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query,
        body,
    };
    state.requests.lock().unwrap().push(request.clone());

    let (bucket, key) = request
        .path
        .trim_start_matches('/')
        .split_once('/')
        .map(|(b, k)| (b.to_string(), k.to_string()))
        .unwrap_or_default();

    match method {
        Method::POST if request.has_query("uploads") => xml(format!(
            "<InitiateMultipartUploadResult><Bucket>{bucket}</Bucket><Key>{key}</Key><UploadId>upload-1</UploadId></InitiateMultipartUploadResult>"
        )),
        Method::POST if request.has_query("uploadId") => xml(format!(
            "<CompleteMultipartUploadResult><Location>/{bucket}/{key}</Location><Bucket>{bucket}</Bucket><Key>{key}</Key><ETag>\"etag-complete\"</ETag></CompleteMultipartUploadResult>"
        )),
        Method::PUT => match request.part_number() {
            Some(n) if state.failing_part == Some(n) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/xml")],
                "<Error><Code>InternalError</Code><Message>We encountered an internal error.</Message></Error>",
            )
                .into_response(),
            Some(n) => etag(&format!("\"etag-part-{n}\"")),
            None => etag("\"etag-single\""),
        },
        Method::DELETE => StatusCode::NO_CONTENT.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn xml(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}"),
    )
        .into_response()
}

fn etag(value: &str) -> Response {
    (StatusCode::OK, [(header::ETAG, value.to_string())]).into_response()
}
