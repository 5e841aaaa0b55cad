//! User directory client (`/user/abm/{run}`).

use async_trait::async_trait;
use gatewatch_core::config::DirectoryConfig;
use gatewatch_core::error::{GatewatchError, Result};
use gatewatch_core::traits::UserDirectory;
use gatewatch_core::types::DirectoryUser;
use serde::Deserialize;

/// Lenient wire shape: the directory answers unknown runs with an empty or
/// zeroed body rather than a 404.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AbmUser {
    external_id: i64,
    run: String,
    first_name: String,
    last_name: String,
}

pub struct HttpUserDirectory {
    base_url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl HttpUserDirectory {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            auth_token: config.auth_token.clone(),
            client: crate::build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn find_by_run(&self, run: &str) -> Result<Option<DirectoryUser>> {
        let url = crate::join_url(&self.base_url, &format!("user/abm/{run}"));
        let response = self
            .client
            .get(&url)
            .header("X-Auth-String", &self.auth_token)
            .send()
            .await
            .map_err(|e| GatewatchError::directory(format!("request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| GatewatchError::directory(format!("read body: {e}")))?;
        if !status.is_success() {
            return Err(GatewatchError::directory(format!("lookup failed: {status} {body}")));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }

        let user: AbmUser = serde_json::from_str(&body)
            .map_err(|e| GatewatchError::directory(format!("invalid response: {e}")))?;
        if user.external_id == 0 {
            return Ok(None);
        }

        Ok(Some(DirectoryUser {
            external_id: user.external_id,
            run: if user.run.is_empty() { run.to_string() } else { user.run },
            first_name: user.first_name,
            last_name: user.last_name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn directory(base_url: String) -> HttpUserDirectory {
        HttpUserDirectory::new(&DirectoryConfig {
            base_url,
            auth_token: "dir-token".into(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_find_by_run_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/abm/11111111-1"))
            .and(header("X-Auth-String", "dir-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "externalId": 42,
                "run": "11111111-1",
                "firstName": "Ana",
                "lastName": "Rojas"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = directory(server.uri()).find_by_run("11111111-1").await.unwrap().unwrap();
        assert_eq!(user.external_id, 42);
        assert_eq!(user.full_name(), "Ana Rojas");
    }

    #[tokio::test]
    async fn test_find_by_run_empty_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/abm/nobody"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(directory(server.uri()).find_by_run("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_run_zero_id_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/abm/nobody"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        assert!(directory(server.uri()).find_by_run("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_run_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = directory(server.uri()).find_by_run("x").await.unwrap_err();
        assert!(matches!(err, GatewatchError::Directory(_)));
    }
}
