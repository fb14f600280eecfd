#![forbid(unsafe_code)]

use crate::config::{ClientConfig, normalize_base_url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vil_core::{
    API_VERSION, DependencyEvent, Link, LinkGateway, LinkPayload, ParentId, Severity, Telemetry,
    TransportError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP gateway to the link service.
pub struct LinkClient {
    agent: ureq::Agent,
    base_url: String,
    api_version: String,
    token: Option<String>,
    telemetry: Arc<dyn Telemetry>,
}

impl LinkClient {
    pub fn new(base_url: &str, token: Option<String>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            base_url: normalize_base_url(base_url),
            api_version: API_VERSION.to_string(),
            token: token.filter(|token| !token.trim().is_empty()),
            telemetry,
        }
    }

    pub fn from_config(config: &ClientConfig, telemetry: Arc<dyn Telemetry>) -> Self {
        Self::new(&config.base_url, config.token.clone(), telemetry)
            .with_api_version(&config.api_version)
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.trim().to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn links_url(&self, parent_id: ParentId) -> String {
        format!(
            "{}/api/versioneditem/{parent_id}?api-version={}",
            self.base_url, self.api_version
        )
    }

    pub fn delete_url(&self, parent_id: ParentId) -> String {
        format!(
            "{}/api/versioneditem/{parent_id}/delete?api-version={}",
            self.base_url, self.api_version
        )
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let request = self.agent.request(method, url).set("Accept", "application/json");
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    /// Wraps one call with a trace, a dependency event and, on failure, an exception.
    fn observe<T>(
        &self,
        name: &'static str,
        method: &str,
        target: &str,
        call: impl FnOnce() -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        self.telemetry
            .trace(&format!("Calling {method} on {target}"), Severity::Information);
        let started = Instant::now();
        let result = call();
        let duration = started.elapsed();
        let (response_code, success) = match &result {
            Ok(_) => (200, true),
            Err(err) => {
                self.telemetry.exception(err, Severity::Error);
                (err.response_code(), false)
            }
        };
        self.telemetry.dependency(&DependencyEvent {
            name,
            target: target.to_string(),
            kind: "RestAPI",
            response_code,
            duration,
            success,
        });
        result
    }
}

pub(crate) fn map_ureq_error(target: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(code, _) => TransportError::Status {
            target: target.to_string(),
            code,
        },
        ureq::Error::Transport(transport) => TransportError::Network {
            target: target.to_string(),
            message: transport.to_string(),
        },
    }
}

impl LinkGateway for LinkClient {
    fn fetch_links(&self, parent_id: ParentId) -> Result<Vec<Link>, TransportError> {
        let target = self.links_url(parent_id);
        self.observe("getVersionedItemLinks", "GET", &target, || {
            let response = self
                .request("GET", &target)
                .call()
                .map_err(|err| map_ureq_error(&target, err))?;
            let payloads: Vec<LinkPayload> =
                response
                    .into_json()
                    .map_err(|err| TransportError::Decode {
                        target: target.clone(),
                        message: err.to_string(),
                    })?;
            payloads
                .into_iter()
                .map(|payload| {
                    payload.into_link().map_err(|err| TransportError::Decode {
                        target: target.clone(),
                        message: err.to_string(),
                    })
                })
                .collect()
        })
    }

    fn save_link(&self, link: &Link) -> Result<(), TransportError> {
        let target = self.links_url(link.parent_id);
        self.observe("updateVersionedItemLink", "POST", &target, || {
            self.request("POST", &target)
                .send_json(LinkPayload::from(link))
                .map_err(|err| map_ureq_error(&target, err))?;
            Ok(())
        })
    }

    fn delete_link(&self, parent_id: ParentId, path: &str) -> Result<(), TransportError> {
        let target = self.delete_url(parent_id);
        self.observe("deleteVersionedItemLinks", "POST", &target, || {
            self.request("POST", &target)
                .set("Content-Type", "text/plain; charset=utf-8")
                .send_string(path)
                .map_err(|err| map_ureq_error(&target, err))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vil_core::NoopTelemetry;

    fn client(base_url: &str) -> LinkClient {
        LinkClient::new(base_url, None, Arc::new(NoopTelemetry))
    }

    #[test]
    fn trailing_slash_does_not_change_request_urls() {
        let with_slash = client("https://localhost/");
        let without = client("https://localhost");
        assert_eq!(with_slash.links_url(555), without.links_url(555));
        assert_eq!(with_slash.delete_url(555), without.delete_url(555));
        assert_eq!(
            without.links_url(555),
            "https://localhost/api/versioneditem/555?api-version=2020-07-15"
        );
        assert_eq!(
            without.delete_url(555),
            "https://localhost/api/versioneditem/555/delete?api-version=2020-07-15"
        );
    }

    #[test]
    fn blank_token_is_dropped() {
        let client = LinkClient::new(" https://h ", Some("  ".to_string()), Arc::new(NoopTelemetry));
        assert_eq!(client.base_url(), "https://h");
        assert!(client.token.is_none());
    }

    #[test]
    fn api_version_can_be_overridden() {
        let client = client("https://h").with_api_version("2021-01-01");
        assert!(client.links_url(1).ends_with("api-version=2021-01-01"));
    }
}
