//! Collaboration endpoint resolution.
//!
//! Derives the live-session websocket address from the service's base URL:
//! swap the request scheme for its stream equivalent, drop a trailing API
//! prefix segment, and append the collab mount path. Purely textual; never
//! fails for non-empty input.

use url::Url;

/// Resolve the websocket address for collaboration sessions from a base
/// service address.
///
/// - `https://host/api` → `wss://host/collab`
/// - `http://host/api/` → `ws://host/collab`
/// - `https://host` → `wss://host/collab`
///
/// If the input does not parse as a URL, falls back to naive suffix
/// concatenation so syntactically odd inputs still produce an address the
/// transport can reject with a proper error.
pub fn resolve_collab_url(base_url: &str, mount_path: &str) -> String {
    let ws_url = if let Some(rest) = base_url.strip_prefix("https") {
        format!("wss{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http") {
        format!("ws{}", rest)
    } else {
        base_url.to_string()
    };

    match Url::parse(&ws_url) {
        Ok(mut url) => {
            let mut path = url.path().trim_end_matches('/').to_string();
            if path.ends_with("/api") {
                path.truncate(path.len() - "/api".len());
            }
            let path = path.trim_end_matches('/');
            url.set_path(&format!("{}{}", path, mount_path));
            url.to_string()
        }
        Err(_) => {
            if ws_url.ends_with(mount_path) {
                ws_url
            } else {
                format!("{}{}", ws_url.trim_end_matches('/'), mount_path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(base: &str) -> String {
        resolve_collab_url(base, "/collab")
    }

    #[test]
    fn test_strips_api_suffix() {
        assert_eq!(resolve("https://host/api"), "wss://host/collab");
        assert_eq!(resolve("https://host/api/"), "wss://host/collab");
    }

    #[test]
    fn test_bare_host() {
        assert_eq!(resolve("https://host"), "wss://host/collab");
        assert_eq!(resolve("https://host/"), "wss://host/collab");
    }

    #[test]
    fn test_http_becomes_ws() {
        assert_eq!(resolve("http://host:3000/api"), "ws://host:3000/collab");
    }

    #[test]
    fn test_nested_prefix_preserved() {
        assert_eq!(
            resolve("https://host/wiki/api"),
            "wss://host/wiki/collab"
        );
        assert_eq!(resolve("https://host/wiki"), "wss://host/wiki/collab");
    }

    #[test]
    fn test_api_in_middle_not_stripped() {
        assert_eq!(
            resolve("https://host/api/v2"),
            "wss://host/api/v2/collab"
        );
    }

    #[test]
    fn test_fallback_on_unparsable_input() {
        assert_eq!(resolve("not a url"), "not a url/collab");
        assert_eq!(resolve("weird:///"), "weird:///collab");
    }

    #[test]
    fn test_custom_mount_path() {
        assert_eq!(
            resolve_collab_url("https://host/api", "/realtime"),
            "wss://host/realtime"
        );
    }
}
