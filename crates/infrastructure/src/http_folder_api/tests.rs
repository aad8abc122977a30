use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use grafsdk_application::FolderApi;
use grafsdk_core::AppError;
use grafsdk_domain::{Folder, FolderPermissionList};
use reqwest::StatusCode;
use url::Url;

use super::{HttpFolderApi, folder_endpoint, is_transient, status_error};
use crate::{GrafanaClientConfig, GrafanaCredentials};

fn base(value: &str) -> Url {
    Url::parse(value).unwrap_or_else(|_| unreachable!())
}

/// Local HTTP/1.1 server answering each connection with the next scripted
/// response; the last one repeats once the script runs out.
struct StubGrafana {
    base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubGrafana {
    fn start(script: &[(u16, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap_or_else(|_| unreachable!());
        let port = listener
            .local_addr()
            .map(|address| address.port())
            .unwrap_or_default();
        let script: Vec<(u16, String)> = script
            .iter()
            .map(|(status, body)| (*status, (*body).to_owned()))
            .collect();
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let server_hits = Arc::clone(&hits);
        let server_requests = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    break;
                };
                let head = read_request_head(&mut stream);
                let index = server_hits.fetch_add(1, Ordering::SeqCst);
                if let Ok(mut requests) = server_requests.lock() {
                    requests.push(head);
                }

                let (status, body) = script
                    .get(index)
                    .or_else(|| script.last())
                    .cloned()
                    .unwrap_or((500, String::new()));
                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            hits,
            requests,
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn authorization_headers(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| {
                requests
                    .iter()
                    .filter_map(|head| header_value(head, "authorization"))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn request_lines(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| {
                requests
                    .iter()
                    .filter_map(|head| head.lines().next().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn api(&self, credentials: GrafanaCredentials, backoff_ms: u64) -> HttpFolderApi {
        client_for(self.base_url.as_str(), credentials, backoff_ms)
    }
}

fn client_for(base_url: &str, credentials: GrafanaCredentials, backoff_ms: u64) -> HttpFolderApi {
    let config = GrafanaClientConfig::new(base_url, credentials)
        .unwrap_or_else(|_| unreachable!())
        .with_timeout(Duration::from_secs(5))
        .with_retry(3, backoff_ms);
    HttpFolderApi::new(config).unwrap_or_else(|_| unreachable!())
}

fn read_request_head(stream: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 4096];
    loop {
        let read = match stream.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        request.extend_from_slice(&buffer[..read]);

        let text = String::from_utf8_lossy(&request);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = header_value(&text[..header_end], "content-length")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= header_end + 4 + content_length {
                return text[..header_end].to_owned();
            }
        }
    }

    String::from_utf8_lossy(&request).into_owned()
}

fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_owned())
    })
}

fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap_or_else(|_| unreachable!());
    let port = listener
        .local_addr()
        .map(|address| address.port())
        .unwrap_or_default();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

#[test]
fn endpoint_appends_to_base_path() {
    let url = folder_endpoint(&base("https://grafana.local/monitoring/"), &["abc", "permissions"]);

    assert_eq!(
        url.map(|url| url.to_string()).ok(),
        Some("https://grafana.local/monitoring/api/folders/abc/permissions".to_owned())
    );
}

#[test]
fn endpoint_percent_encodes_uid_segments() {
    let url = folder_endpoint(&base("http://grafana.local"), &["a/b c"]);

    assert_eq!(
        url.map(|url| url.to_string()).ok(),
        Some("http://grafana.local/api/folders/a%2Fb%20c".to_owned())
    );
}

#[test]
fn endpoint_drops_base_query() {
    let url = folder_endpoint(&base("http://grafana.local/?orgId=1"), &[]);

    assert_eq!(
        url.map(|url| url.to_string()).ok(),
        Some("http://grafana.local/api/folders".to_owned())
    );
}

#[test]
fn status_errors_map_to_categories() {
    assert!(matches!(
        status_error("get folder", StatusCode::NOT_FOUND, r#"{"message":"Folder not found"}"#),
        AppError::NotFound(message) if message.ends_with("Folder not found")
    ));
    assert!(matches!(
        status_error("update folder", StatusCode::PRECONDITION_FAILED, ""),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        status_error("create folder", StatusCode::CONFLICT, ""),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        status_error("create folder", StatusCode::BAD_REQUEST, "bad"),
        AppError::Validation(message) if message.ends_with("bad")
    ));
    assert!(matches!(
        status_error("list folders", StatusCode::UNAUTHORIZED, ""),
        AppError::Unauthorized(_)
    ));
    assert!(matches!(
        status_error("list folders", StatusCode::FORBIDDEN, ""),
        AppError::Forbidden(_)
    ));
    assert!(matches!(
        status_error("list folders", StatusCode::BAD_GATEWAY, ""),
        AppError::Internal(_)
    ));
}

#[test]
fn only_server_errors_and_throttling_are_transient() {
    assert!(is_transient(StatusCode::SERVICE_UNAVAILABLE));
    assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
    assert!(!is_transient(StatusCode::NOT_FOUND));
    assert!(!is_transient(StatusCode::PRECONDITION_FAILED));
}

#[tokio::test]
async fn get_retries_server_errors_and_throttling_until_success() {
    let grafana = StubGrafana::start(&[
        (503, ""),
        (429, r#"{"message":"slow down"}"#),
        (200, r#"{"id":3,"uid":"ops","title":"Ops"}"#),
    ]);
    let api = grafana.api(GrafanaCredentials::Anonymous, 50);

    let folder = api.folder_by_uid("ops").await;

    assert_eq!(folder.map(|folder| folder.title).ok(), Some("Ops".to_owned()));
    assert_eq!(grafana.hits(), 3);
    assert!(
        grafana
            .request_lines()
            .iter()
            .all(|line| line == "GET /api/folders/ops HTTP/1.1")
    );
}

#[tokio::test]
async fn get_gives_up_after_max_attempts_with_last_status() {
    let grafana = StubGrafana::start(&[(502, r#"{"message":"upstream down"}"#)]);
    let api = grafana.api(GrafanaCredentials::Anonymous, 50);

    let result = api.list_folders(10).await;

    assert!(matches!(
        result,
        Err(AppError::Internal(message)) if message.ends_with("upstream down")
    ));
    assert_eq!(grafana.hits(), 3);
    assert_eq!(
        grafana.request_lines().first().map(String::as_str),
        Some("GET /api/folders?limit=10 HTTP/1.1")
    );
}

#[tokio::test]
async fn get_does_not_retry_client_errors() {
    let grafana = StubGrafana::start(&[(404, r#"{"message":"Folder not found"}"#)]);
    let api = grafana.api(GrafanaCredentials::Anonymous, 50);

    let result = api.folder_by_id(9).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(grafana.hits(), 1);
}

#[tokio::test]
async fn writes_are_sent_exactly_once() {
    let grafana = StubGrafana::start(&[(503, "")]);
    let api = grafana.api(GrafanaCredentials::Anonymous, 50);
    let folder = Folder {
        uid: "ops".to_owned(),
        ..Folder::with_title("Ops")
    };

    let created = api.create_folder(&folder).await;
    assert!(matches!(created, Err(AppError::Internal(_))));
    assert_eq!(grafana.hits(), 1);

    let updated = api.update_folder(&folder).await;
    assert!(matches!(updated, Err(AppError::Internal(_))));
    assert_eq!(grafana.hits(), 2);

    let deleted = api.delete_folder("ops").await;
    assert!(matches!(deleted, Err(AppError::Internal(_))));
    assert_eq!(grafana.hits(), 3);

    let replaced = api
        .replace_folder_permissions("ops", &FolderPermissionList::default_roles())
        .await;
    assert!(matches!(replaced, Err(AppError::Internal(_))));
    assert_eq!(grafana.hits(), 4);

    assert_eq!(
        grafana.request_lines(),
        vec![
            "POST /api/folders HTTP/1.1".to_owned(),
            "PUT /api/folders/ops HTTP/1.1".to_owned(),
            "DELETE /api/folders/ops HTTP/1.1".to_owned(),
            "POST /api/folders/ops/permissions HTTP/1.1".to_owned(),
        ]
    );
}

#[tokio::test]
async fn retry_backoff_grows_linearly() {
    let grafana = StubGrafana::start(&[(500, "")]);
    let api = grafana.api(GrafanaCredentials::Anonymous, 100);

    let started = Instant::now();
    let result = api.folder_permissions("ops").await;

    assert!(result.is_err());
    assert_eq!(grafana.hits(), 3);
    // 100 ms after the first attempt, 200 ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn transport_errors_are_retried_and_reported_as_internal() {
    let api = client_for(unused_local_url().as_str(), GrafanaCredentials::Anonymous, 50);

    let started = Instant::now();
    let result = api.folder_by_uid("ops").await;

    assert!(matches!(
        result,
        Err(AppError::Internal(message)) if message.contains("transport error")
    ));
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn api_key_is_sent_as_bearer_token() {
    let grafana = StubGrafana::start(&[(200, "[]")]);
    let api = grafana.api(GrafanaCredentials::ApiKey("glsa_token".to_owned()), 50);

    let folders = api.list_folders(5).await;

    assert_eq!(folders.map(|folders| folders.len()).ok(), Some(0));
    assert_eq!(
        grafana.authorization_headers(),
        vec!["Bearer glsa_token".to_owned()]
    );
}

#[tokio::test]
async fn basic_credentials_are_sent_base64_encoded() {
    let grafana = StubGrafana::start(&[(200, "[]")]);
    let api = grafana.api(
        GrafanaCredentials::Basic {
            username: "admin".to_owned(),
            password: "secret".to_owned(),
        },
        50,
    );

    let permissions = api.folder_permissions("ops").await;

    assert!(permissions.is_ok());
    assert_eq!(
        grafana.authorization_headers(),
        vec!["Basic YWRtaW46c2VjcmV0".to_owned()]
    );
}

#[tokio::test]
async fn anonymous_requests_carry_no_authorization() {
    let grafana = StubGrafana::start(&[(200, r#"{"message":"Folder Ops deleted"}"#)]);
    let api = grafana.api(GrafanaCredentials::Anonymous, 50);

    let message = api.delete_folder("ops").await;

    assert_eq!(
        message.map(|message| message.message).ok(),
        Some("Folder Ops deleted".to_owned())
    );
    assert!(grafana.authorization_headers().is_empty());
}

#[tokio::test]
async fn undecodable_success_body_is_internal_and_not_retried() {
    let grafana = StubGrafana::start(&[(200, "not json")]);
    let api = grafana.api(GrafanaCredentials::Anonymous, 50);

    let result = api.folder_by_uid("ops").await;

    assert!(matches!(
        result,
        Err(AppError::Internal(message)) if message.starts_with("failed to parse get folder response body")
    ));
    assert_eq!(grafana.hits(), 1);
}
