//! Keeps secrets that ride in request URLs out of logs and tool results.
//!
//! Path and query parameters are caller-supplied and may carry tokens, so
//! only the origin and path of an upstream URL are ever shown.

use url::Url;

/// The origin and path of `url`, without userinfo, query or fragment.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}

/// Message of a transport failure, safe to hand back to the caller.
#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let msg = e.to_string();
    match e.url() {
        Some(u) => msg.replace(u.as_str(), &redact_url(u)),
        None => msg,
    }
}
