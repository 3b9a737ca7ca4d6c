//! Request classification for fetch interception.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Home page or a post page: `/` or `/posts/<anything>`.
static SHELL_ROUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(posts/.+)?$").expect("shell route pattern is valid"));

/// How an intercepted request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Same-origin navigation to a page the shell renders.
    Shell,
    /// Everything else: exact-match cache lookup, then network.
    Passthrough,
}

/// Classify `request` against the page's own `origin`.
pub fn classify(origin: &Url, request: &Url) -> RequestKind {
    if request.origin() == origin.origin() && SHELL_ROUTE.is_match(request.path()) {
        RequestKind::Shell
    } else {
        RequestKind::Passthrough
    }
}
