//! Typed client for the local knowledge-base HTTP API.
//!
//! Every request carries the fixed protocol-version header; authenticated
//! requests add the stored bearer token. A 401 on any authenticated call
//! clears the credential store before surfacing the distinguished
//! [`ExcerpoError::Unauthorized`] kind, so callers can reopen the pairing
//! flow instead of showing a generic failure.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::credentials::CredentialStore;
use crate::model::{
    ApiKeyResponse, ChallengeResponse, CreateObjectRequest, DataEnvelope, NewTag, ObjectType,
    PairingSession, Property, Space, Tag, Template,
};
use crate::{ExcerpoError, Result};

/// Default base URL of the local service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:31009/v1";

/// Application identifier presented during pairing.
pub const APP_NAME: &str = "excerpo";

const VERSION_HEADER: &str = "Anytype-Version";
const API_VERSION: &str = "2025-05-20";

enum Auth {
    Bearer,
    None,
}

/// Client for the local knowledge-base service.
///
/// The client owns its [`CredentialStore`]; construction is explicit and
/// the store is injected, never ambient.
pub struct AnytypeClient {
    http: reqwest::Client,
    base_url: String,
    app_name: String,
    credentials: CredentialStore,
}

impl AnytypeClient {
    /// Creates a client against the default local base URL.
    pub fn new(credentials: CredentialStore) -> Result<Self> {
        Self::with_base_url(credentials, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom base URL.
    pub fn with_base_url(credentials: CredentialStore, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_name: APP_NAME.to_string(),
            credentials,
        })
    }

    /// The injected credential store.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Probes the service's liveness endpoint.
    ///
    /// Any failure reads as "not running"; this never touches the stored
    /// credential.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).header(VERSION_HEADER, API_VERSION).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(error = %err, "health check failed");
                false
            }
        }
    }

    /// Requests a pairing challenge.
    ///
    /// The service has shipped the challenge id under two field names;
    /// resolution order is `id`, then `challenge_id`.
    pub async fn start_pairing(&self) -> Result<PairingSession> {
        let response: ChallengeResponse = self
            .send(Method::POST, "/auth/challenges", Some(json!({ "app_name": self.app_name })), Auth::None)
            .await?;

        let challenge_id = response
            .resolve()
            .ok_or_else(|| ExcerpoError::Protocol("challenge response carried no challenge id".into()))?;

        debug!("pairing challenge issued");
        Ok(PairingSession { challenge_id, app_name: self.app_name.clone() })
    }

    /// Exchanges the challenge and display code for a durable token.
    ///
    /// On success the token is stored; the session is spent either way.
    pub async fn complete_pairing(&self, session: &PairingSession, code: &str) -> Result<()> {
        let response: ApiKeyResponse = self
            .send(
                Method::POST,
                "/auth/api_keys",
                Some(json!({ "challenge_id": session.challenge_id, "code": code })),
                Auth::None,
            )
            .await?;

        let api_key = response
            .api_key
            .ok_or_else(|| ExcerpoError::Protocol("key exchange response carried no api key".into()))?;

        self.credentials.set(Some(&api_key))?;
        debug!("pairing completed, credential stored");
        Ok(())
    }

    /// True iff a token is stored and a live listing call accepts it.
    ///
    /// Pairing validation is a round-trip health check, not a local
    /// presence check: any failure clears the token and reads as unpaired.
    pub async fn is_paired(&self) -> bool {
        match self.credentials.get() {
            Ok(Some(_)) => {}
            _ => return false,
        }

        match self.list_spaces().await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "stored pairing failed validation");
                if self.credentials.clear().is_err() {
                    warn!("could not clear stale credential");
                }
                false
            }
        }
    }

    /// Clears the stored pairing credential.
    pub fn clear_pairing(&self) -> Result<()> {
        self.credentials.clear()
    }

    /// Lists the available spaces.
    pub async fn list_spaces(&self) -> Result<Vec<Space>> {
        let envelope: DataEnvelope<Space> = self.send(Method::GET, "/spaces", None, Auth::Bearer).await?;
        Ok(envelope.data)
    }

    /// Lists the object types of a space.
    pub async fn list_types(&self, space_id: &str) -> Result<Vec<ObjectType>> {
        let path = format!("/spaces/{}/types", space_id);
        let envelope: DataEnvelope<ObjectType> = self.send(Method::GET, &path, None, Auth::Bearer).await?;
        Ok(envelope.data)
    }

    /// Lists the templates of a type.
    pub async fn list_templates(&self, space_id: &str, type_id: &str) -> Result<Vec<Template>> {
        let path = format!("/spaces/{}/types/{}/templates", space_id, type_id);
        let envelope: DataEnvelope<Template> = self.send(Method::GET, &path, None, Auth::Bearer).await?;
        Ok(envelope.data)
    }

    /// Fetches one template in full.
    pub async fn get_template(&self, space_id: &str, type_id: &str, template_id: &str) -> Result<Value> {
        let path = format!("/spaces/{}/types/{}/templates/{}", space_id, type_id, template_id);
        self.send(Method::GET, &path, None, Auth::Bearer).await
    }

    /// Lists the properties of a space.
    pub async fn list_properties(&self, space_id: &str) -> Result<Vec<Property>> {
        let path = format!("/spaces/{}/properties", space_id);
        let envelope: DataEnvelope<Property> = self.send(Method::GET, &path, None, Auth::Bearer).await?;
        Ok(envelope.data)
    }

    /// Lists the tag options of a multi-select property.
    pub async fn list_tags(&self, space_id: &str, property_id: &str) -> Result<Vec<Tag>> {
        let path = format!("/spaces/{}/properties/{}/tags", space_id, property_id);
        let envelope: DataEnvelope<Tag> = self.send(Method::GET, &path, None, Auth::Bearer).await?;
        Ok(envelope.data)
    }

    /// Creates a tag option on a multi-select property.
    pub async fn create_tag(&self, space_id: &str, property_id: &str, tag: &NewTag) -> Result<Value> {
        let path = format!("/spaces/{}/properties/{}/tags", space_id, property_id);
        self.send(Method::POST, &path, Some(serde_json::to_value(tag)?), Auth::Bearer)
            .await
    }

    /// Creates an object in a space.
    pub async fn create_object(&self, space_id: &str, request: &CreateObjectRequest) -> Result<Value> {
        let path = format!("/spaces/{}/objects", space_id);
        self.send(Method::POST, &path, Some(serde_json::to_value(request)?), Auth::Bearer)
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        auth: Auth,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, path, "sending request");

        let mut request = self
            .http
            .request(method, &url)
            .header(VERSION_HEADER, API_VERSION)
            .header("Accept", "application/json");

        let authenticated = matches!(auth, Auth::Bearer);
        if authenticated && let Some(token) = self.credentials.get()? {
            request = request.bearer_auth(token);
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        if authenticated && status == StatusCode::UNAUTHORIZED {
            self.credentials.clear()?;
            return Err(ExcerpoError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExcerpoError::RequestFailed {
                status: status.as_u16(),
                message: server_message(&body),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(ExcerpoError::from)
    }
}

/// Pulls the server-provided message out of an error body when it is
/// parseable JSON, otherwise returns the raw text.
fn server_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for field in ["message", "error"] {
            if let Some(message) = value.get(field).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }
    body.trim().to_string()
}

/// Validates a pairing display code: exactly four ASCII digits.
pub fn validate_pairing_code(code: &str) -> Result<()> {
    let code = code.trim();
    if code.len() == 4 && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ExcerpoError::Validation("the pairing code is four digits".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use tempfile::TempDir;

    fn temp_client(base_url: &str) -> (TempDir, AnytypeClient) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::with_path(dir.path().join("storage.json"));
        let client = AnytypeClient::with_base_url(CredentialStore::new(storage), base_url).unwrap();
        (dir, client)
    }

    #[test]
    fn test_default_base_url() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::with_path(dir.path().join("storage.json"));
        let client = AnytypeClient::new(CredentialStore::new(storage)).unwrap();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let (_dir, client) = temp_client("http://localhost:9999/v1/");
        assert_eq!(client.base_url, "http://localhost:9999/v1");
    }

    #[test]
    fn test_server_message_from_json() {
        assert_eq!(server_message(r#"{"message": "no such space"}"#), "no such space");
        assert_eq!(server_message(r#"{"error": "bad request"}"#), "bad request");
    }

    #[test]
    fn test_server_message_from_raw_body() {
        assert_eq!(server_message("plain failure\n"), "plain failure");
        assert_eq!(server_message(r#"{"detail": "other"}"#), r#"{"detail": "other"}"#);
    }

    #[test]
    fn test_validate_pairing_code() {
        assert!(validate_pairing_code("1234").is_ok());
        assert!(validate_pairing_code(" 1234 ").is_ok());
        assert!(validate_pairing_code("123").is_err());
        assert!(validate_pairing_code("12345").is_err());
        assert!(validate_pairing_code("12a4").is_err());
        assert!(validate_pairing_code("").is_err());
    }
}
