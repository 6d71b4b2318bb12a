use std::borrow::Cow;

use tracing::debug;

/// Placeholder that is replaced with the hostname in metric names and in the metric prefix.
pub const HOST_PLACEHOLDER: &str = "%HOST%";

const FALLBACK_HOSTNAME: &str = "localhost";

/// Queries the operating system for the hostname.
///
/// Falls back to `localhost` if the hostname cannot be determined.
pub(crate) fn resolve_hostname() -> String {
    match hostname::get() {
        Ok(hostname) if !hostname.is_empty() => hostname.to_string_lossy().into_owned(),
        Ok(_) => {
            debug!("Operating system reported an empty hostname. Falling back to '{}'.", FALLBACK_HOSTNAME);
            FALLBACK_HOSTNAME.to_string()
        }
        Err(e) => {
            debug!(error = %e, "Failed to query hostname. Falling back to '{}'.", FALLBACK_HOSTNAME);
            FALLBACK_HOSTNAME.to_string()
        }
    }
}

/// Replaces the first occurrence of [`HOST_PLACEHOLDER`] in `s` with `hostname`.
///
/// Borrows when there is nothing to replace.
pub(crate) fn substitute_host<'a>(s: &'a str, hostname: &str) -> Cow<'a, str> {
    if s.contains(HOST_PLACEHOLDER) {
        Cow::Owned(s.replacen(HOST_PLACEHOLDER, hostname, 1))
    } else {
        Cow::Borrowed(s)
    }
}
