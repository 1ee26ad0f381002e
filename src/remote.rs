//! Derives the `org/repo` identifier that namespaces registry entries.

const HTTPS_SCHEME: &str = "https://";
const GIT_SUFFIX: &str = ".git";

/// Turns a remote URL into `org/repo`.
///
/// Accepts `https://host/org/repo[.git]` and scp-like `user@host:org/repo[.git]`.
/// Anything else yields `None`. No case folding, trailing-slash cleanup or
/// percent-decoding is applied, so two spellings of the same remote produce
/// different identifiers.
pub(crate) fn derive_repo_identifier(remote_url: &str) -> Option<String> {
    let url = remote_url.strip_suffix(GIT_SUFFIX).unwrap_or(remote_url);

    let identifier = if url.starts_with(HTTPS_SCHEME) {
        https_identifier(url)?
    } else if is_scp_like(url) {
        let (_, path) = url.split_once(':')?;
        path.split('/').collect::<Vec<_>>().join("/")
    } else {
        return None;
    };

    if identifier.is_empty() {
        None
    } else {
        Some(identifier)
    }
}

fn https_identifier(url: &str) -> Option<String> {
    let path = &url[HTTPS_SCHEME.len()..];
    let segments: Vec<&str> = path.split('/').collect();
    // host plus at least two path segments
    if segments.len() < 3 {
        return None;
    }
    let tail = &segments[segments.len() - 2..];
    if tail.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    Some(tail.join("/"))
}

fn is_scp_like(url: &str) -> bool {
    if url.contains("://") {
        return false;
    }
    match (url.find('@'), url.find(':')) {
        (Some(at), Some(colon)) => at > 0 && at < colon,
        _ => false,
    }
}
