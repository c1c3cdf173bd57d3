//! API client integration tests against a mock local service.

use excerpo_core::credentials::CredentialStore;
use excerpo_core::model::{ContentBlock, CreateObjectRequest};
use excerpo_core::preferences::{PreferenceStore, Selection};
use excerpo_core::storage::Storage;
use excerpo_core::{AnytypeClient, ExcerpoError, ExportController};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn storage_in(dir: &TempDir) -> Storage {
    Storage::with_path(dir.path().join("storage.json"))
}

fn client_for(dir: &TempDir, server: &MockServer) -> AnytypeClient {
    let credentials = CredentialStore::new(storage_in(dir));
    AnytypeClient::with_base_url(credentials, server.uri()).unwrap()
}

fn paired_client_for(dir: &TempDir, server: &MockServer) -> AnytypeClient {
    let client = client_for(dir, server);
    client.credentials().set(Some("test_token")).unwrap();
    client
}

#[tokio::test]
async fn test_start_pairing_resolves_id_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/challenges"))
        .and(body_partial_json(serde_json::json!({"app_name": "excerpo"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "ch_1"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = client_for(&dir, &server).start_pairing().await.unwrap();
    assert_eq!(session.challenge_id, "ch_1");
}

#[tokio::test]
async fn test_start_pairing_falls_back_to_challenge_id_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/challenges"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"challenge_id": "ch_2"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = client_for(&dir, &server).start_pairing().await.unwrap();
    assert_eq!(session.challenge_id, "ch_2");
}

#[tokio::test]
async fn test_start_pairing_without_id_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/challenges"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"noise": true})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let result = client_for(&dir, &server).start_pairing().await;
    assert!(matches!(result, Err(ExcerpoError::Protocol(_))));
}

#[tokio::test]
async fn test_complete_pairing_stores_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/challenges"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "ch_1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/api_keys"))
        .and(body_partial_json(serde_json::json!({"challenge_id": "ch_1", "code": "1234"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"api_key": "key_abc"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&dir, &server);
    let session = client.start_pairing().await.unwrap();
    client.complete_pairing(&session, "1234").await.unwrap();

    assert_eq!(client.credentials().get().unwrap(), Some("key_abc".to_string()));
}

#[tokio::test]
async fn test_complete_pairing_without_key_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/challenges"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "ch_1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/api_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&dir, &server);
    let session = client.start_pairing().await.unwrap();
    let result = client.complete_pairing(&session, "1234").await;

    assert!(matches!(result, Err(ExcerpoError::Protocol(_))));
    assert!(client.credentials().get().unwrap().is_none());
}

#[tokio::test]
async fn test_list_spaces_sends_bearer_and_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spaces"))
        .and(header("Authorization", "Bearer test_token"))
        .and(header("Anytype-Version", "2025-05-20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "s1", "name": "Work"}]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let spaces = paired_client_for(&dir, &server).list_spaces().await.unwrap();
    assert_eq!(spaces.len(), 1);
    assert_eq!(spaces[0].id, "s1");
}

#[tokio::test]
async fn test_listing_without_data_field_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spaces/s1/types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let types = paired_client_for(&dir, &server).list_types("s1").await.unwrap();
    assert!(types.is_empty());
}

#[tokio::test]
async fn test_unauthorized_clears_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spaces"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = paired_client_for(&dir, &server);

    let result = client.list_spaces().await;
    assert!(matches!(result, Err(ExcerpoError::Unauthorized)));
    assert!(client.credentials().get().unwrap().is_none());
}

#[tokio::test]
async fn test_is_paired_false_and_cleared_on_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spaces"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = paired_client_for(&dir, &server);
    assert_eq!(client.credentials().get().unwrap(), Some("test_token".to_string()));

    assert!(!client.is_paired().await);
    assert!(client.credentials().get().unwrap().is_none());
}

#[tokio::test]
async fn test_is_paired_without_token_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    assert!(!client_for(&dir, &server).is_paired().await);
}

#[tokio::test]
async fn test_is_paired_round_trip_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = paired_client_for(&dir, &server);
    assert!(client.is_paired().await);
    assert_eq!(client.credentials().get().unwrap(), Some("test_token".to_string()));
}

#[tokio::test]
async fn test_request_failed_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spaces"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({"message": "space index offline"})),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let result = paired_client_for(&dir, &server).list_spaces().await;

    match result {
        Err(ExcerpoError::RequestFailed { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "space index offline");
        }
        other => panic!("expected RequestFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_object_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/spaces/s1/objects"))
        .and(body_partial_json(serde_json::json!({
            "name": "Clip",
            "type_key": "page",
            "body": "# Clip",
            "template_id": "tpl_1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"object": {"id": "o1"}})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let request = CreateObjectRequest {
        name: "Clip".into(),
        type_key: "page".into(),
        body: "# Clip".into(),
        template_id: Some("tpl_1".into()),
        properties: None,
    };
    paired_client_for(&dir, &server).create_object("s1", &request).await.unwrap();
}

#[tokio::test]
async fn test_check_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    assert!(client_for(&dir, &server).check_health().await);
}

fn blocks(titles: &[&str]) -> Vec<ContentBlock> {
    titles
        .iter()
        .enumerate()
        .map(|(i, t)| ContentBlock {
            title: t.to_string(),
            content: format!("# {}\n\nbody", t),
            source_index: i + 1,
        })
        .collect()
}

async fn controller_for(dir: &TempDir, server: &MockServer) -> ExportController {
    let client = paired_client_for(dir, server);
    let preferences = PreferenceStore::new(storage_in(dir));
    ExportController::new(client, preferences)
}

#[tokio::test]
async fn test_batch_export_continues_past_failures() {
    let server = MockServer::start().await;

    // Item "Two" fails; the loop must still submit items one and three.
    Mock::given(method("POST"))
        .and(path("/spaces/s1/objects"))
        .and(body_partial_json(serde_json::json!({"name": "Two"})))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"message": "no room"})))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/spaces/s1/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"object": {}})))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let controller = controller_for(&dir, &server).await;
    let destination = excerpo_core::ExportDestination {
        space_id: "s1".into(),
        type_id: "t1".into(),
        type_key: "page".into(),
        template_id: None,
        tag_ids: Vec::new(),
    };

    let report = controller
        .export_batch(&blocks(&["One", "Two", "Three"]), &destination, None)
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, 1);
    assert!(report.failures[0].1.contains("no room"));
}

#[tokio::test]
async fn test_batch_export_aborts_on_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/spaces/s1/objects"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let controller = controller_for(&dir, &server).await;
    let destination = excerpo_core::ExportDestination {
        space_id: "s1".into(),
        type_id: "t1".into(),
        type_key: "page".into(),
        template_id: None,
        tag_ids: Vec::new(),
    };

    let result = controller.export_batch(&blocks(&["One", "Two"]), &destination, None).await;
    assert!(matches!(result, Err(ExcerpoError::Unauthorized)));
    assert!(controller.client().credentials().get().unwrap().is_none());
}

#[tokio::test]
async fn test_resolve_destination_falls_back_when_type_is_stale() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "s1", "name": "Work"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/spaces/s1/types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "t2", "key": "note"}, {"id": "t3", "key": "page"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/spaces/s1/types/t2/templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let preferences = PreferenceStore::new(storage_in(&dir));
    preferences
        .set(
            excerpo_core::Category::Article,
            &Selection {
                space_id: Some("s1".into()),
                type_id: Some("t1".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let controller = ExportController::new(paired_client_for(&dir, &server), preferences);
    let destination = controller
        .resolve_destination(excerpo_core::Category::Article)
        .await
        .unwrap();

    // "t1" is gone from the fresh listing; the first available type wins.
    assert_eq!(destination.type_id, "t2");
    assert_eq!(destination.type_key, "note");

    // The effective selection is persisted back.
    let stored = controller
        .preferences()
        .get(excerpo_core::Category::Article)
        .unwrap()
        .unwrap();
    assert_eq!(stored.type_id.as_deref(), Some("t2"));
}

#[tokio::test]
async fn test_resolve_destination_drops_stale_template() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "s1"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/spaces/s1/types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "t1", "key": "page"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/spaces/s1/types/t1/templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "tpl_live"}]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let preferences = PreferenceStore::new(storage_in(&dir));
    preferences
        .set(
            excerpo_core::Category::Article,
            &Selection {
                space_id: Some("s1".into()),
                type_id: Some("t1".into()),
                template_id: Some("tpl_gone".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let controller = ExportController::new(paired_client_for(&dir, &server), preferences);
    let destination = controller
        .resolve_destination(excerpo_core::Category::Article)
        .await
        .unwrap();

    assert_eq!(destination.template_id, None);
}
