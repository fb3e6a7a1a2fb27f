//! Channel address derivation.

use crate::error::SessionError;
use url::Url;

/// Derives the channel URL for `target` from the REST base.
///
/// `http` becomes `ws` and `https` becomes `wss`; the target is appended under
/// `ws/` and the credential travels as the `token` query parameter.
///
/// # Arguments
/// * `api_base` - REST base, e.g. `http://127.0.0.1:25401/api/v1/servers`
/// * `target` - Server identifier
/// * `token` - Bearer credential
///
/// # Returns
/// `{ws|wss}://{host}/{base path}/ws/{target}?token={token}`
pub fn channel_url(api_base: &str, target: &str, token: &str) -> Result<Url, SessionError> {
    let mut url = Url::parse(api_base)
        .map_err(|e| SessionError::Connection(format!("Invalid API base '{api_base}': {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(SessionError::Connection(format!(
                "Unsupported API scheme '{other}'"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| SessionError::Connection(format!("Cannot switch '{api_base}' to {scheme}")))?;

    url.path_segments_mut()
        .map_err(|_| SessionError::Connection(format!("API base '{api_base}' cannot carry a path")))?
        .pop_if_empty()
        .push("ws")
        .push(target);

    url.set_query(None);
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_base() {
        let url = channel_url("http://127.0.0.1:25401/api/v1/servers", "survival", "abc").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:25401/api/v1/servers/ws/survival?token=abc"
        );
    }

    #[test]
    fn test_https_base_with_trailing_slash() {
        let url = channel_url("https://panel.example.com/api/v1/servers/", "my server", "a+b").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/api/v1/servers/ws/my%20server");
        assert_eq!(
            url.query_pairs().find(|(k, _)| k == "token").map(|(_, v)| v.into_owned()),
            Some("a+b".to_string())
        );
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            channel_url("ftp://example.com/api", "s", "t"),
            Err(SessionError::Connection(_))
        ));
        assert!(channel_url("::not a url::", "s", "t").is_err());
    }
}
