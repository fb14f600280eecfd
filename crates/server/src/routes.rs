#![forbid(unsafe_code)]

use crate::auth::BearerAuth;
use crate::http::{HttpRequest, normalize_path, query_value};
use serde_json::json;
use std::sync::Arc;
use vil_core::{API_VERSION, LinkPayload, ParentId};
use vil_storage::{LinkStore, StoreError};

const ROUTE_PREFIX: &str = "/api/versioneditem/";

pub(crate) struct Response {
    pub(crate) status: &'static str,
    pub(crate) content_type: &'static str,
    pub(crate) body: Vec<u8>,
}

impl Response {
    fn empty_ok() -> Self {
        Self {
            status: "200 OK",
            content_type: "text/plain; charset=utf-8",
            body: Vec::new(),
        }
    }

    fn json(body: String) -> Self {
        Self {
            status: "200 OK",
            content_type: "application/json; charset=utf-8",
            body: body.into_bytes(),
        }
    }

    pub(crate) fn error(status: &'static str, code: &str, message: &str) -> Self {
        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        })
        .to_string();
        Self {
            status,
            content_type: "application/json; charset=utf-8",
            body: body.into_bytes(),
        }
    }

    pub(crate) fn status_code(&self) -> u16 {
        self.status
            .split_whitespace()
            .next()
            .and_then(|code| code.parse().ok())
            .unwrap_or(500)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Links(&'a str),
    Delete(&'a str),
}

fn match_route(path: &str) -> Option<Route<'_>> {
    let prefix = path.get(..ROUTE_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(ROUTE_PREFIX) {
        return None;
    }
    let rest = &path[ROUTE_PREFIX.len()..];
    match rest.split_once('/') {
        None if !rest.is_empty() => Some(Route::Links(rest)),
        Some((id, action)) if !id.is_empty() && action.eq_ignore_ascii_case("delete") => {
            Some(Route::Delete(id))
        }
        _ => None,
    }
}

pub(crate) struct Router {
    store: Arc<dyn LinkStore>,
    auth: BearerAuth,
}

impl Router {
    pub(crate) fn new(store: Arc<dyn LinkStore>, auth: BearerAuth) -> Self {
        Self { store, auth }
    }

    pub(crate) fn handle(&self, request: &HttpRequest) -> Response {
        let path = normalize_path(&request.target);
        let Some(route) = match_route(&path) else {
            return Response::error("404 Not Found", "NOT_FOUND", "Unknown route.");
        };

        let method = request.method.as_str();
        let allowed = match route {
            Route::Links(_) => method == "GET" || method == "POST",
            Route::Delete(_) => method == "POST",
        };
        if !allowed {
            return Response::error(
                "405 Method Not Allowed",
                "METHOD_NOT_ALLOWED",
                "Method not allowed.",
            );
        }

        if let Err(err) = self.auth.check(request.header("authorization")) {
            return Response::error("401 Unauthorized", "UNAUTHORIZED", &err.to_string());
        }

        if query_value(&request.target, "api-version") != Some(API_VERSION) {
            return Response::error(
                "400 Bad Request",
                "UNSUPPORTED_API_VERSION",
                &format!("api-version must be {API_VERSION}"),
            );
        }

        let raw_id = match route {
            Route::Links(id) | Route::Delete(id) => id,
        };
        let Ok(parent_id) = raw_id.parse::<ParentId>() else {
            return Response::error(
                "400 Bad Request",
                "INVALID_PARENT_ID",
                "parent id must be an integer",
            );
        };

        let result = match (route, method) {
            (Route::Links(_), "GET") => self.list(parent_id),
            (Route::Links(_), _) => self.upsert(parent_id, &request.body),
            (Route::Delete(_), _) => self.remove(parent_id, &request.body),
        };
        result.unwrap_or_else(|response| response)
    }

    fn list(&self, parent_id: ParentId) -> Result<Response, Response> {
        let links = self.store.get(parent_id).map_err(store_failure)?;
        let payloads: Vec<LinkPayload> = links.iter().map(LinkPayload::from).collect();
        let body = serde_json::to_string(&payloads).map_err(|err| {
            Response::error("500 Internal Server Error", "ENCODE", &err.to_string())
        })?;
        Ok(Response::json(body))
    }

    fn upsert(&self, parent_id: ParentId, body: &[u8]) -> Result<Response, Response> {
        let payload: LinkPayload = serde_json::from_slice(body).map_err(|err| {
            Response::error("400 Bad Request", "INVALID_LINK", &err.to_string())
        })?;
        let mut link = payload.into_link().map_err(|err| {
            Response::error("400 Bad Request", "INVALID_LINK", &err.to_string())
        })?;
        link.parent_id = parent_id;
        self.store
            .upsert(parent_id, link)
            .map_err(store_failure)?;
        Ok(Response::empty_ok())
    }

    fn remove(&self, parent_id: ParentId, body: &[u8]) -> Result<Response, Response> {
        let path = delete_path(body).ok_or_else(|| {
            Response::error("400 Bad Request", "INVALID_PATH", "body must be the path to delete")
        })?;
        self.store
            .remove(parent_id, &path)
            .map_err(store_failure)?;
        Ok(Response::empty_ok())
    }
}

/// Raw UTF-8 body as the path; a JSON string literal is unwrapped.
fn delete_path(body: &[u8]) -> Option<String> {
    let raw = std::str::from_utf8(body).ok()?.trim();
    let path = match serde_json::from_str::<String>(raw) {
        Ok(unwrapped) if raw.starts_with('"') => unwrapped.trim().to_string(),
        _ => raw.to_string(),
    };
    if path.is_empty() { None } else { Some(path) }
}

fn store_failure(err: StoreError) -> Response {
    match err {
        StoreError::InvalidInput(message) => {
            Response::error("400 Bad Request", "INVALID_INPUT", message)
        }
        other => {
            tracing::error!(error = %other, "link store failure");
            Response::error("500 Internal Server Error", "STORE_ERROR", &other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use vil_storage::MemoryLinkStore;

    fn router() -> Router {
        Router::new(Arc::new(MemoryLinkStore::new()), BearerAuth::new(None))
    }

    fn request(method: &str, target: &str, body: &str) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            target: target.to_string(),
            headers: vec![("Authorization".to_string(), "Bearer token".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    fn error_code(response: &Response) -> String {
        let value: Value = serde_json::from_slice(&response.body).expect("json error body");
        value["error"]["code"].as_str().unwrap_or_default().to_string()
    }

    #[test]
    fn routes_are_matched_case_insensitively() {
        assert_eq!(match_route("/api/versioneditem/5"), Some(Route::Links("5")));
        assert_eq!(
            match_route("/API/VersionedItem/5/Delete"),
            Some(Route::Delete("5"))
        );
        assert_eq!(match_route("/api/versioneditem/5/other"), None);
        assert_eq!(match_route("/api/versioneditem/"), None);
        assert_eq!(match_route("/api"), None);
    }

    #[test]
    fn delete_body_accepts_raw_and_json_string() {
        assert_eq!(delete_path(b"/a/b.py").as_deref(), Some("/a/b.py"));
        assert_eq!(delete_path(b"\"/a/b.py\"").as_deref(), Some("/a/b.py"));
        assert_eq!(delete_path(b"  \n"), None);
        assert_eq!(delete_path(b"\"\""), None);
    }

    #[test]
    fn post_then_get_returns_link_under_route_parent() {
        let router = router();
        let body = r#"{"workItemId":1,"path":"/python/somescript.py","comment":"commenta"}"#;
        let response = router.handle(&request(
            "POST",
            "/api/versioneditem/997?api-version=2020-07-15",
            body,
        ));
        assert_eq!(response.status_code(), 200);
        assert!(response.body.is_empty());

        let response = router.handle(&request(
            "GET",
            "/api/versioneditem/997?api-version=2020-07-15",
            "",
        ));
        let value: Value = serde_json::from_slice(&response.body).expect("json");
        assert_eq!(value[0]["workItemId"], 997);
        assert_eq!(value[0]["comment"], "commenta");
        assert_eq!(value[0]["linkStatus"], "OK");
    }

    #[test]
    fn rejections_carry_status_and_code() {
        let router = router();
        let cases = [
            ("GET", "/nope?api-version=2020-07-15", 404, "NOT_FOUND"),
            ("PUT", "/api/versioneditem/1?api-version=2020-07-15", 405, "METHOD_NOT_ALLOWED"),
            ("GET", "/api/versioneditem/1/delete?api-version=2020-07-15", 405, "METHOD_NOT_ALLOWED"),
            ("GET", "/api/versioneditem/1", 400, "UNSUPPORTED_API_VERSION"),
            ("GET", "/api/versioneditem/1?api-version=1.0", 400, "UNSUPPORTED_API_VERSION"),
            ("GET", "/api/versioneditem/abc?api-version=2020-07-15", 400, "INVALID_PARENT_ID"),
            ("POST", "/api/versioneditem/1?api-version=2020-07-15", 400, "INVALID_LINK"),
            ("POST", "/api/versioneditem/1/delete?api-version=2020-07-15", 400, "INVALID_PATH"),
        ];
        for (method, target, status, code) in cases {
            let response = router.handle(&request(method, target, ""));
            assert_eq!(response.status_code(), status, "{method} {target}");
            assert_eq!(error_code(&response), code, "{method} {target}");
        }
    }

    #[test]
    fn empty_link_path_is_bad_request() {
        let response = router().handle(&request(
            "POST",
            "/api/versioneditem/1?api-version=2020-07-15",
            r#"{"workItemId":1,"path":"  "}"#,
        ));
        assert_eq!(response.status_code(), 400);
        assert_eq!(error_code(&response), "INVALID_INPUT");
    }

    #[test]
    fn missing_bearer_is_unauthorized() {
        let mut req = request("GET", "/api/versioneditem/1?api-version=2020-07-15", "");
        req.headers.clear();
        let response = router().handle(&req);
        assert_eq!(response.status_code(), 401);
        assert_eq!(error_code(&response), "UNAUTHORIZED");
    }
}
