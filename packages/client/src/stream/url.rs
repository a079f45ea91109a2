//! Stream URL derivation from the page origin.

use reqwest::Url;

use crate::error::StreamError;

/// Build the stream URL for `path` on the page `origin`.
///
/// `https` maps to `wss` and `http` to `ws`; `ws`/`wss` origins are kept.
/// Any path, query or fragment on the origin is replaced. A `token` becomes
/// the only query parameter.
pub fn stream_url(origin: &str, path: &str, token: Option<&str>) -> Result<Url, StreamError> {
    let mut url = Url::parse(origin)
        .map_err(|e| StreamError::InvalidOrigin(format!("{}: {}", origin, e)))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(StreamError::InvalidOrigin(format!(
                "{}: unsupported scheme '{}'",
                origin, other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| StreamError::InvalidOrigin(format!("{}: cannot switch to {}", origin, scheme)))?;

    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}
