use serde::Deserialize;
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};
use watson_sdk::{
    CallArgs, Client, Credentials, Error, Multipart, Payload, ServiceKind, content_type_for_path,
    http::DEFAULT_USER_AGENT,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_string_contains, header, method, path, query_param},
};

fn basic() -> Credentials {
    Credentials::basic("user", "pass").unwrap()
}

fn client(server: &MockServer, kind: ServiceKind, credentials: Credentials) -> Client {
    Client::builder(credentials)
        .url(kind, format!("{}/{}/api", server.uri(), kind.name()))
        .iam_url(format!("{}/identity/token", server.uri()))
        .build()
        .unwrap()
}

async fn mount_iam(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "iam-token",
            "refresh_token": "unused",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .expect(expected)
        .mount(server)
        .await;
}

#[derive(Debug, Deserialize)]
struct WorkspaceList {
    workspaces: Vec<Workspace>,
}

#[derive(Debug, Deserialize)]
struct Workspace {
    workspace_id: String,
    name: String,
}

#[tokio::test]
async fn test_basic_auth_version_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/assistant/api/v1/workspaces"))
        .and(query_param("version", "2018-09-20"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .and(header("accept", "application/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-global-transaction-id", "tx-42")
                .set_body_json(json!({
                    "workspaces": [{"workspace_id": "ws-1", "name": "Car Dashboard", "language": "en"}],
                    "pagination": {"refresh_url": "/v1/workspaces"},
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, ServiceKind::Assistant, basic());
    let resp = client
        .assistant()
        .call::<WorkspaceList>("list_workspaces", CallArgs::new())
        .await
        .unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.result.workspaces.len(), 1);
    assert_eq!(resp.result.workspaces[0].workspace_id, "ws-1");
    assert_eq!(resp.result.workspaces[0].name, "Car Dashboard");
    assert_eq!(resp.custom_data.header("X-Global-Transaction-Id"), Some("tx-42"));
    assert!(resp.custom_data.raw_body.contains("pagination"));
}

#[tokio::test]
async fn test_iam_token_exchanged_once_across_calls() {
    let server = MockServer::start().await;
    mount_iam(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/assistant/api/v1/workspaces/abc/message"))
        .and(header("authorization", "Bearer iam-token"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"input": {"text": "hello"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"text": ["Hi there"]},
            "context": {"conversation_id": "c-1"},
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server, ServiceKind::Assistant, Credentials::api_key("key").unwrap());
    let assistant = client.assistant();

    for _ in 0..2 {
        let args = CallArgs::new()
            .arg("workspace_id", "abc")
            .json(&json!({"input": {"text": "hello"}}))
            .unwrap();
        let resp = assistant.call::<Value>("message", args).await.unwrap();
        assert_eq!(resp.result["output"]["text"][0], "Hi there");
    }
}

#[tokio::test]
async fn test_apikey_username_uses_bearer_flow() {
    let server = MockServer::start().await;
    mount_iam(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/discovery/api/v1/environments"))
        .and(header("authorization", "Bearer iam-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"environments": []})))
        .expect(1)
        .mount(&server)
        .await;

    let creds = Credentials::basic("apikey", "key").unwrap();
    let client = client(&server, ServiceKind::Discovery, creds);
    assert_ok!(
        client
            .discovery()
            .call::<Value>("list_environments", CallArgs::new())
            .await
    );
}

#[tokio::test]
async fn test_not_found_maps_to_api_error_with_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/assistant/api/v1/workspaces/missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_raw(r#"{"error":"not found","code":404}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let client = client(&server, ServiceKind::Assistant, basic());
    let err = client
        .assistant()
        .call::<Value>("get_workspace", CallArgs::new().arg("workspace_id", "missing"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    match &err {
        Error::Api {
            code,
            message,
            http_status,
            custom_data,
        } => {
            assert_eq!(*code, 404);
            assert_eq!(message, "not found");
            assert_eq!(*http_status, 404);
            assert_eq!(custom_data.raw_body, r#"{"error":"not found","code":404}"#);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_argument_makes_no_network_call() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, ServiceKind::Assistant, Credentials::api_key("key").unwrap());
    let err = client
        .assistant()
        .call::<Value>("message", CallArgs::new().arg("workspace_id", ""))
        .await
        .unwrap_err();
    assert!(err.is_argument(), "{err}");

    let err = client
        .assistant()
        .call::<Value>("message", CallArgs::new())
        .await
        .unwrap_err();
    assert!(err.is_argument(), "{err}");

    let err = client
        .personality_insights()
        .call::<Value>("profile", CallArgs::new())
        .await
        .unwrap_err();
    assert!(err.is_argument(), "{err}");

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_synthesize_returns_bytes() {
    let audio: Vec<u8> = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text-to-speech/api/v1/synthesize"))
        .and(query_param("voice", "en-US_AllisonV3Voice"))
        .and(header("accept", "audio/wav"))
        .and(body_json(json!({"text": "hello world"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(audio.clone(), "audio/wav"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, ServiceKind::TextToSpeech, basic());
    let args = CallArgs::new()
        .arg("voice", "en-US_AllisonV3Voice")
        .arg("Accept", "audio/wav")
        .json(&json!({"text": "hello world"}))
        .unwrap();
    let resp = client
        .text_to_speech()
        .call_bytes("synthesize", args)
        .await
        .unwrap();

    assert_eq!(resp.result.as_ref(), audio.as_slice());
    assert!(resp.custom_data.raw_body.is_empty());
    assert_eq!(resp.custom_data.header("content-type"), Some("audio/wav"));
}

#[tokio::test]
async fn test_call_payload_selects_by_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/text-to-speech/api/v1/voices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"voices": []})))
        .mount(&server)
        .await;

    let client = client(&server, ServiceKind::TextToSpeech, basic());
    let resp = assert_ok!(
        client
            .text_to_speech()
            .call_payload("list_voices", CallArgs::new())
            .await
    );
    assert_eq!(resp.result, Payload::Json(json!({"voices": []})));
}

#[tokio::test]
async fn test_compare_documents_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compare-comply/api/v1/comparison"))
        .and(query_param("version", "2018-10-15"))
        .and(body_string_contains(r#"name="file_1""#))
        .and(body_string_contains(r#"name="file_2""#))
        .and(body_string_contains("contract-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"label": "file_1"}, {"label": "file_2"}],
            "aligned_elements": [],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    std::fs::write(&a, b"%PDF-1.4 contract-a").unwrap();

    let form = Multipart::new()
        .file_path("file_1", &a)
        .unwrap()
        .file("file_2", "b.pdf", b"%PDF-1.4 contract-b".to_vec(), "application/pdf");

    let client = client(&server, ServiceKind::CompareComply, basic());
    let resp = client
        .compare_comply()
        .call::<Value>("compare_documents", CallArgs::new().multipart(form))
        .await
        .unwrap();
    assert_eq!(resp.result["documents"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_extension_upload_has_no_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/speech-to-text/api/v1/recognize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.xyz");
    std::fs::write(&clip, [0u8, 1, 2, 3]).unwrap();
    assert_eq!(content_type_for_path(&clip), "");

    let client = client(&server, ServiceKind::SpeechToText, basic());
    client
        .speech_to_text()
        .call::<Value>("recognize", CallArgs::new().file(&clip).unwrap())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("content-type").is_none());
    assert_eq!(requests[0].body, vec![0u8, 1, 2, 3]);
}

#[tokio::test]
async fn test_flac_upload_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/speech-to-text/api/v1/recognize"))
        .and(header("content-type", "audio/flac"))
        .and(query_param("model", "en-US_BroadbandModel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.flac");
    std::fs::write(&clip, b"fLaC").unwrap();

    let client = client(&server, ServiceKind::SpeechToText, basic());
    let args = CallArgs::new()
        .arg("model", "en-US_BroadbandModel")
        .file(&clip)
        .unwrap();
    assert_ok!(client.speech_to_text().call::<Value>("recognize", args).await);
}

#[tokio::test]
async fn test_learning_opt_out_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tone-analyzer/api/v3/tone"))
        .and(header("x-watson-learning-opt-out", "true"))
        .and(header("content-language", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"document_tone": {"tones": []}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder(basic())
        .url(ServiceKind::ToneAnalyzer, format!("{}/tone-analyzer/api", server.uri()))
        .learning_opt_out(true)
        .build()
        .unwrap();
    let args = CallArgs::new()
        .arg("Content-Language", "en")
        .json(&json!({"text": "I am happy"}))
        .unwrap();
    assert_ok!(client.tone_analyzer().call::<Value>("tone", args).await);
}

#[tokio::test]
async fn test_malformed_body_is_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/assistant/api/v1/workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"workspaces": 7}"#, "application/json"))
        .mount(&server)
        .await;

    let client = client(&server, ServiceKind::Assistant, basic());
    let err = assert_err!(
        client
            .assistant()
            .call::<WorkspaceList>("list_workspaces", CallArgs::new())
            .await
    );
    match err {
        Error::Serialization { custom_data, .. } => {
            assert_eq!(custom_data.raw_body, r#"{"workspaces": 7}"#);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let client = Client::builder(basic())
        .url(ServiceKind::Discovery, format!("{uri}/discovery/api"))
        .build()
        .unwrap();

    let err = client
        .discovery()
        .call::<Value>("list_environments", CallArgs::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn test_iam_failure_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorCode": "BXNIM0415E",
            "errorMessage": "Provided API key could not be found",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/discovery/api/v1/environments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, ServiceKind::Discovery, Credentials::api_key("bad").unwrap());
    let err = client
        .discovery()
        .call::<Value>("list_environments", CallArgs::new())
        .await
        .unwrap_err();
    assert!(err.is_auth_error());
    assert_eq!(err.http_status(), Some(400));
}

#[tokio::test]
async fn test_set_credentials_swaps_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/text-to-speech/api/v1/voices"))
        .and(header("authorization", "Bearer swapped"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"voices": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, ServiceKind::TextToSpeech, basic());
    let tts = client.text_to_speech();
    tts.set_credentials(Credentials::bearer_token("swapped").unwrap())
        .unwrap();
    assert_ok!(tts.call::<Value>("list_voices", CallArgs::new()).await);
}

#[tokio::test]
async fn test_set_credentials_api_key_uses_client_iam_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .and(header("user-agent", "my-app/1.0"))
        .and(body_string_contains("apikey=swapped-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "swapped-iam",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/text-to-speech/api/v1/voices"))
        .and(header("authorization", "Bearer swapped-iam"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"voices": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder(basic())
        .url(
            ServiceKind::TextToSpeech,
            format!("{}/text-to-speech/api", server.uri()),
        )
        .iam_url(format!("{}/identity/token", server.uri()))
        .user_agent("my-app/1.0")
        .build()
        .unwrap();
    let tts = client.text_to_speech();
    tts.set_credentials(Credentials::api_key("swapped-key").unwrap())
        .unwrap();
    assert_ok!(tts.call::<Value>("list_voices", CallArgs::new()).await);
}
