//! Single-page application forwarding.
//!
//! Client-side routes (`/admin/users`, `/account/settings`, ...) have no
//! server resource, so they are rewritten to `/index.html` before the rule
//! table sees them. Server namespaces and anything that looks like a file
//! (contains a `.`) are left alone.

use axum::http::uri::{PathAndQuery, Uri};

pub const INDEX: &str = "/index.html";

const SERVER_PREFIXES: [&str; 4] = ["/api", "/management", "/v3/api-docs", "/h2-console"];

/// Target path for a client-side route, or `None` if the path is served as-is.
pub fn forward_path(path: &str) -> Option<&'static str> {
    let client_route = path.starts_with('/')
        && !path.contains('.')
        && !SERVER_PREFIXES.iter().any(|prefix| path.starts_with(prefix));
    client_route.then_some(INDEX)
}

/// Rewrite a request URI to the index page, keeping the query string.
pub fn rewrite(uri: &Uri) -> Option<Uri> {
    let target = forward_path(uri.path())?;
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", target, query),
        None => target.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_routes_forward_to_index() {
        assert_eq!(forward_path("/"), Some(INDEX));
        assert_eq!(forward_path("/admin/users"), Some(INDEX));
        assert_eq!(forward_path("/account/settings"), Some(INDEX));
    }

    #[test]
    fn test_server_paths_untouched() {
        assert_eq!(forward_path("/api/account"), None);
        assert_eq!(forward_path("/apiary"), None);
        assert_eq!(forward_path("/management/health"), None);
        assert_eq!(forward_path("/v3/api-docs"), None);
        assert_eq!(forward_path("/h2-console"), None);
        assert_eq!(forward_path("/main.js"), None);
        assert_eq!(forward_path("/app/logo.png"), None);
    }

    #[test]
    fn test_rewrite_keeps_query() {
        let uri: Uri = "/admin/users?page=2&sort=id".parse().unwrap();
        let rewritten = rewrite(&uri).unwrap();
        assert_eq!(rewritten.path(), INDEX);
        assert_eq!(rewritten.query(), Some("page=2&sort=id"));

        let absolute: Uri = "http://example.com/admin".parse().unwrap();
        let rewritten = rewrite(&absolute).unwrap();
        assert_eq!(rewritten.to_string(), "http://example.com/index.html");

        assert!(rewrite(&"/api/users".parse().unwrap()).is_none());
    }
}
