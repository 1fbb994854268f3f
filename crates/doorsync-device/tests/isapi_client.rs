//! Integration tests for IsapiClient
//!
//! A wiremock server plays the terminal. `DigestTerminal` answers `401` with
//! an MD5 challenge until a request carries a valid `Authorization` header,
//! which it verifies independently of the client's digest code.

use bytes::Bytes;
use doorsync_core::{Error, UserRecord};
use doorsync_device::{DeviceClient, DeviceConfig, IsapiClient};
use md5::{Digest, Md5};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const USERNAME: &str = "admin";
const PASSWORD: &str = "Tr0ub4dor&3";
const REALM: &str = "DS-K1T341";
const NONCE: &str = "4e6a4d324d6a49314d7a6b365a6d4e6a";

type Handler = Box<dyn Fn(&Request) -> ResponseTemplate + Send + Sync>;

/// Terminal endpoint guarded by Digest authentication.
struct DigestTerminal {
    handler: Handler,
    challenges: Arc<AtomicU32>,
}

impl DigestTerminal {
    fn new(handler: impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            challenges: Arc::new(AtomicU32::new(0)),
        }
    }

    fn ok_json(body: Value) -> Self {
        Self::new(move |_| ResponseTemplate::new(200).set_body_json(body.clone()))
    }

    fn challenge_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.challenges)
    }
}

impl Respond for DigestTerminal {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if authorized(request) {
            return (self.handler)(request);
        }
        self.challenges.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(401).insert_header(
            "WWW-Authenticate",
            format!(r#"Digest realm="{REALM}", qop="auth", nonce="{NONCE}", opaque="", algorithm=MD5"#),
        )
    }
}

fn authorized(request: &Request) -> bool {
    nonce_count_for(request, NONCE).is_some()
}

/// The `nc` of a valid `Authorization` header computed for `nonce`.
fn nonce_count_for(request: &Request, nonce: &str) -> Option<String> {
    let header = request
        .headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())?;
    let params = header.strip_prefix("Digest ")?;

    let params: HashMap<&str, &str> = params
        .split(", ")
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key, value.trim_matches('"')))
        .collect();

    let expected_uri = match request.url.query() {
        Some(query) => format!("{}?{}", request.url.path(), query),
        None => request.url.path().to_string(),
    };
    if params.get("uri") != Some(&expected_uri.as_str())
        || params.get("username") != Some(&USERNAME)
        || params.get("nonce") != Some(&nonce)
    {
        return None;
    }

    let (Some(nc), Some(cnonce), Some(response)) =
        (params.get("nc"), params.get("cnonce"), params.get("response"))
    else {
        return None;
    };

    let ha1 = md5_hex(&format!("{USERNAME}:{REALM}:{PASSWORD}"));
    let ha2 = md5_hex(&format!("{}:{}", request.method.as_str(), expected_uri));
    let expected = md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:auth:{ha2}"));
    (*response == expected).then(|| nc.to_string())
}

/// Terminal that rotates its nonce on demand and refuses replayed nonce counts.
#[derive(Clone, Default)]
struct RotatingTerminal {
    state: Arc<Mutex<RotationState>>,
}

#[derive(Default)]
struct RotationState {
    nonce: String,
    seen: HashSet<(String, String)>,
    stale_challenges: u32,
    replays: u32,
}

impl RotatingTerminal {
    fn new(nonce: &str) -> Self {
        let terminal = Self::default();
        terminal.rotate(nonce);
        terminal
    }

    fn rotate(&self, nonce: &str) {
        self.state.lock().unwrap().nonce = nonce.to_string();
    }

    fn challenge(nonce: &str, stale: bool) -> ResponseTemplate {
        let stale = if stale { "TRUE" } else { "FALSE" };
        ResponseTemplate::new(401).insert_header(
            "WWW-Authenticate",
            format!(r#"Digest realm="{REALM}", qop="auth", nonce="{nonce}", stale="{stale}""#),
        )
    }
}

impl Respond for RotatingTerminal {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let nonce = state.nonce.clone();

        match nonce_count_for(request, &nonce) {
            Some(nc) => {
                if state.seen.insert((nonce.clone(), nc)) {
                    ResponseTemplate::new(200).set_body_json(ok_status())
                } else {
                    state.replays += 1;
                    Self::challenge(&nonce, false)
                }
            }
            None if request.headers.contains_key("authorization") => {
                state.stale_challenges += 1;
                Self::challenge(&nonce, true)
            }
            None => Self::challenge(&nonce, false),
        }
    }
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

fn config(server: &MockServer) -> DeviceConfig {
    DeviceConfig::new(server.uri(), USERNAME, PASSWORD).timeout(Duration::from_secs(2))
}

fn client(server: &MockServer) -> IsapiClient {
    IsapiClient::new(config(server)).unwrap()
}

fn ok_status() -> Value {
    json!({"statusCode": 1, "statusString": "OK", "subStatusCode": "ok"})
}

/// First request is challenged, later ones reuse the challenge
#[tokio::test]
async fn test_digest_round_trip_then_preemptive() {
    let server = MockServer::start().await;
    let terminal = DigestTerminal::ok_json(ok_status());
    let challenges = terminal.challenge_counter();

    Mock::given(method("POST"))
        .and(path("/ISAPI/AccessControl/UserInfo/Record"))
        .and(query_param("format", "json"))
        .respond_with(terminal)
        .mount(&server)
        .await;

    let client = client(&server);
    let ack = client
        .create_user(&UserRecord::new("1001", "Ana", true))
        .await
        .unwrap();
    assert_eq!(ack.status, 200);

    client
        .create_user(&UserRecord::new("1002", "Bo", true))
        .await
        .unwrap();

    assert_eq!(challenges.load(Ordering::SeqCst), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

/// Rejected credentials surface as an authentication failure
#[tokio::test]
async fn test_wrong_password_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/ISAPI/AccessControl/UserInfoDetail/Delete"))
        .respond_with(DigestTerminal::ok_json(ok_status()))
        .mount(&server)
        .await;

    let client = IsapiClient::new(DeviceConfig::new(server.uri(), USERNAME, "wrong")).unwrap();
    let error = client.delete_user("1001").await.unwrap_err();

    assert!(error.is_auth(), "unexpected error: {error:?}");
    // Exactly one retry after the challenge
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

/// A 401 without a usable challenge is an authentication failure
#[tokio::test]
async fn test_401_without_challenge_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", r#"Basic realm="x""#))
        .mount(&server)
        .await;

    let error = client(&server).list_users().await.unwrap_err();
    assert!(error.is_auth());
}

/// The password never travels in clear text
#[tokio::test]
async fn test_password_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(DigestTerminal::ok_json(ok_status()))
        .mount(&server)
        .await;

    client(&server)
        .update_user(&UserRecord::new("1001", "Ana", false))
        .await
        .unwrap();

    for request in server.received_requests().await.unwrap() {
        for (_, value) in request.headers.iter() {
            assert!(!value.to_str().unwrap_or_default().contains(PASSWORD));
        }
        assert!(!String::from_utf8_lossy(&request.body).contains(PASSWORD));
    }
}

/// Search paging follows MORE and advances by the number of users received
#[tokio::test]
async fn test_list_users_follows_pages() {
    let server = MockServer::start().await;
    let terminal = DigestTerminal::new(|request| {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let condition = &body["UserInfoSearchCond"];
        assert_eq!(condition["maxResults"], 2);

        let page = match condition["searchResultPosition"].as_u64().unwrap() {
            0 => json!({
                "responseStatusStrg": "MORE",
                "numOfMatches": 2,
                "totalMatches": 3,
                "UserInfo": [
                    {"employeeNo": "1001", "name": "Ana", "Valid": {"enable": true}},
                    {"employeeNo": "1002", "name": "Bo", "Valid": {"enable": false}}
                ]
            }),
            2 => json!({
                "responseStatusStrg": "OK",
                "numOfMatches": 1,
                "totalMatches": 3,
                "UserInfo": [{"employeeNo": 1003, "name": "Cy"}]
            }),
            other => panic!("unexpected position {other}"),
        };
        ResponseTemplate::new(200).set_body_json(json!({ "UserInfoSearch": page }))
    });

    Mock::given(method("POST"))
        .and(path("/ISAPI/AccessControl/UserInfo/Search"))
        .respond_with(terminal)
        .mount(&server)
        .await;

    let client = IsapiClient::new(config(&server).page_size(2)).unwrap();
    let users = client.list_users().await.unwrap();

    assert_eq!(
        users,
        vec![
            UserRecord::new("1001", "Ana", true),
            UserRecord::new("1002", "Bo", false),
            UserRecord::new("1003", "Cy", true),
        ]
    );
}

/// An empty terminal answers NO MATCH without a user list
#[tokio::test]
async fn test_list_users_empty_device() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ISAPI/AccessControl/UserInfo/Search"))
        .respond_with(DigestTerminal::ok_json(json!({
            "UserInfoSearch": {"searchID": "x", "responseStatusStrg": "NO MATCH", "numOfMatches": 0, "totalMatches": 0}
        })))
        .mount(&server)
        .await;

    assert!(client(&server).list_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_users_invalid_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(DigestTerminal::new(|_| ResponseTemplate::new(200).set_body_string("<html>")))
        .mount(&server)
        .await;

    let error = client(&server).list_users().await.unwrap_err();
    assert!(matches!(error, Error::InvalidResponse(_)));
}

/// Non-2xx responses keep status and raw body
#[tokio::test]
async fn test_rejection_carries_raw_body() {
    let server = MockServer::start().await;
    let body = r#"{"statusCode":6,"statusString":"Invalid Content","subStatusCode":"employeeNoAlreadyExist"}"#;
    Mock::given(method("POST"))
        .and(path("/ISAPI/AccessControl/UserInfo/Record"))
        .respond_with(DigestTerminal::new(move |_| ResponseTemplate::new(400).set_body_string(body)))
        .mount(&server)
        .await;

    let error = client(&server)
        .create_user(&UserRecord::new("1001", "Ana", true))
        .await
        .unwrap_err();

    match error {
        Error::DeviceRejected { status, body: raw } => {
            assert_eq!(status, 400);
            assert_eq!(raw, body);
        }
        other => panic!("expected DeviceRejected, got {other:?}"),
    }
}

/// Face deletion targets the configured library and reports no-match bodies
#[tokio::test]
async fn test_delete_face_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/ISAPI/Intelligent/FDLib/FDSearch/Delete"))
        .and(query_param("FDID", "2"))
        .and(query_param("faceLibType", "staticFD"))
        .respond_with(DigestTerminal::new(|request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            assert_eq!(body, json!({"FPID": [{"value": "1001"}]}));
            ResponseTemplate::new(400)
                .set_body_string(r#"{"statusString":"Invalid Content","subStatusCode":"noMatch"}"#)
        }))
        .mount(&server)
        .await;

    let client = IsapiClient::new(config(&server).face_library("2", "staticFD")).unwrap();
    let error = client.delete_face("1001").await.unwrap_err();
    assert!(error.is_not_found());
}

/// Face upload is multipart with a JSON record and the image
#[tokio::test]
async fn test_upload_face_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ISAPI/Intelligent/FDLib/FaceDataRecord"))
        .respond_with(DigestTerminal::ok_json(ok_status()))
        .mount(&server)
        .await;

    let image = Bytes::from_static(b"\xff\xd8\xff\xe0fake-jpeg");
    client(&server)
        .upload_face("1001", image, "image/jpeg")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    // The unauthenticated attempt carries the full body as well.
    assert_eq!(requests.len(), 2);

    let upload = &requests[1];
    let content_type = upload.headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains(r#"name="FaceDataRecord""#));
    assert!(body.contains(r#"{"faceLibType":"blackFD","FDID":"1","FPID":"1001"}"#));
    assert!(body.contains(r#"name="img"; filename="1001.jpg""#));
    assert!(body.to_ascii_lowercase().contains("content-type: image/jpeg"));
    assert!(body.contains("fake-jpeg"));
}

/// Terminals behind an NVR are addressed by devIndex
#[tokio::test]
async fn test_dev_index_on_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(query_param("devIndex", "NVR-CH-3"))
        .respond_with(DigestTerminal::ok_json(ok_status()))
        .mount(&server)
        .await;

    let client = IsapiClient::new(config(&server).dev_index("NVR-CH-3")).unwrap();
    client.delete_user("1001").await.unwrap();
    client.delete_face("1001").await.unwrap();
}

#[tokio::test]
async fn test_slow_device_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = IsapiClient::new(config(&server).timeout(Duration::from_millis(100))).unwrap();
    let error = client.list_users().await.unwrap_err();
    assert!(matches!(error, Error::Timeout { duration_ms: 100 }));
}

#[tokio::test]
async fn test_unreachable_device_is_transport_error() {
    // Nothing listens on the discard port.
    let config = DeviceConfig::new("http://127.0.0.1:9", USERNAME, PASSWORD)
        .timeout(Duration::from_secs(2));
    let error = IsapiClient::new(config)
        .unwrap()
        .list_users()
        .await
        .unwrap_err();

    assert!(error.is_transport(), "unexpected error: {error:?}");
}

/// A rotated nonce is renewed once per request, and concurrent renewals
/// never reuse a nonce count
#[tokio::test]
async fn test_rotated_nonce_renewed_under_concurrency() {
    let server = MockServer::start().await;
    let terminal = RotatingTerminal::new("nonce-1");
    Mock::given(method("PUT"))
        .and(path("/ISAPI/AccessControl/UserInfo/Modify"))
        .respond_with(terminal.clone())
        .mount(&server)
        .await;

    let client = client(&server);
    let user = |no: &str| UserRecord::new(no, "Ana", true);
    client.update_user(&user("1")).await.unwrap();

    terminal.rotate("nonce-2");
    let (u2, u3, u4, u5) = (user("2"), user("3"), user("4"), user("5"));
    let (a, b, c, d) = tokio::join!(
        client.update_user(&u2),
        client.update_user(&u3),
        client.update_user(&u4),
        client.update_user(&u5),
    );
    for result in [a, b, c, d] {
        assert_eq!(result.unwrap().status, 200);
    }

    let state = terminal.state.lock().unwrap();
    assert_eq!(state.replays, 0);
    assert!((1..=4).contains(&state.stale_challenges));
    assert_eq!(state.seen.iter().filter(|(nonce, _)| nonce == "nonce-2").count(), 4);
}

/// A base URL path prefix is kept in front of every ISAPI path
#[tokio::test]
async fn test_base_url_path_prefix_kept() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/proxy/dev1/ISAPI/AccessControl/UserInfo/Modify"))
        .respond_with(DigestTerminal::ok_json(ok_status()))
        .expect(2)
        .mount(&server)
        .await;

    let config = DeviceConfig::new(format!("{}/proxy/dev1", server.uri()), USERNAME, PASSWORD)
        .timeout(Duration::from_secs(2));
    let ack = IsapiClient::new(config)
        .unwrap()
        .update_user(&UserRecord::new("1001", "Ana", true))
        .await
        .unwrap();

    assert_eq!(ack.status, 200);
}
