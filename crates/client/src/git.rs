#![forbid(unsafe_code)]

//! Recursive item listing from the Azure DevOps Git REST API.

use crate::config::{ClientConfig, normalize_base_url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vil_core::{
    DependencyEvent, RepositoryItem, RepositoryListing, Severity, SnapshotError, Telemetry,
    encode_uri_component,
};

const GIT_API_VERSION: &str = "6.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    value: Vec<GitItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitItem {
    path: String,
    #[serde(default)]
    is_folder: bool,
    #[serde(default)]
    object_id: String,
}

pub struct GitItemsClient {
    agent: ureq::Agent,
    collection_url: String,
    token: Option<String>,
    telemetry: Arc<dyn Telemetry>,
}

impl GitItemsClient {
    pub fn new(collection_url: &str, token: Option<String>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            collection_url: normalize_base_url(collection_url),
            token: token.filter(|token| !token.trim().is_empty()),
            telemetry,
        }
    }

    pub fn from_config(config: &ClientConfig, telemetry: Arc<dyn Telemetry>) -> Self {
        Self::new(&config.git_base_url(), config.git_token.clone(), telemetry)
    }

    pub fn items_url(&self, repository: &str, project: &str, branch: &str) -> String {
        format!(
            "{}/{}/_apis/git/repositories/{}/items?recursionLevel=Full&versionDescriptor.version={}&versionDescriptor.versionType=branch&api-version={GIT_API_VERSION}",
            self.collection_url,
            encode_uri_component(project),
            encode_uri_component(repository),
            encode_uri_component(branch),
        )
    }

    fn fetch(&self, repository: &str, target: &str) -> Result<Vec<RepositoryItem>, SnapshotError> {
        let mut request = self.agent.get(target).set("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        let response = request.call().map_err(|err| match err {
            ureq::Error::Status(404, _) => SnapshotError::RepositoryNotFound {
                repository: repository.to_string(),
            },
            ureq::Error::Status(code, _) => {
                SnapshotError::Transport(format!("{target} answered with HTTP {code}"))
            }
            ureq::Error::Transport(transport) => SnapshotError::Transport(transport.to_string()),
        })?;
        let body: ItemsResponse = response
            .into_json()
            .map_err(|err| SnapshotError::Decode(err.to_string()))?;
        Ok(body
            .value
            .into_iter()
            .map(|item| RepositoryItem {
                path: item.path,
                is_folder: item.is_folder,
                object_id: item.object_id,
            })
            .collect())
    }
}

impl RepositoryListing for GitItemsClient {
    fn list_items(
        &self,
        repository: &str,
        project: &str,
        branch: &str,
    ) -> Result<Vec<RepositoryItem>, SnapshotError> {
        let target = self.items_url(repository, project, branch);
        self.telemetry
            .trace(&format!("Calling GET on {target}"), Severity::Verbose);
        let started = Instant::now();
        let result = self.fetch(repository, &target);
        let response_code = match &result {
            Ok(_) => 200,
            Err(SnapshotError::RepositoryNotFound { .. }) => 404,
            Err(_) => 500,
        };
        self.telemetry.dependency(&DependencyEvent {
            name: "getItems",
            target,
            kind: "GitAPI",
            response_code,
            duration: started.elapsed(),
            success: result.is_ok(),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vil_core::NoopTelemetry;

    #[test]
    fn items_url_encodes_segments() {
        let client = GitItemsClient::new(
            "https://dev.azure.com/contoso/",
            None,
            Arc::new(NoopTelemetry),
        );
        assert_eq!(
            client.items_url("my repo", "Fabrikam Fiber", "feature/x"),
            "https://dev.azure.com/contoso/Fabrikam%20Fiber/_apis/git/repositories/my%20repo/items?recursionLevel=Full&versionDescriptor.version=feature%2Fx&versionDescriptor.versionType=branch&api-version=6.0"
        );
    }

    #[test]
    fn item_fields_default_when_absent() {
        let body: ItemsResponse = serde_json::from_str(
            r#"{"count":2,"value":[{"path":"/","isFolder":true},{"path":"/a.rs","objectId":"abc","gitObjectType":"blob"}]}"#,
        )
        .expect("items");
        assert_eq!(body.value.len(), 2);
        assert!(body.value[0].is_folder);
        assert!(!body.value[1].is_folder);
        assert_eq!(body.value[1].object_id, "abc");
    }
}
