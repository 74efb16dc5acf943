//! URL utilities
//!
//! Pure helpers shared by the store, the bridge and the named route builder:
//! overlaying partial URL updates, producing same-document references and
//! normalizing navigation destinations.

use crate::error::RouterError;
use crate::params::QueryParams;
use percent_encoding::percent_decode_str;
use std::sync::OnceLock;
use url::{Position, Url};

/// Placeholder origin used when no host location exists
pub const NULL_ORIGIN: &str = "http://null";

/// Characters `decodeURI` leaves encoded
const URI_RESERVED: &[u8] = b";/?:@&=+$,#";

/// The placeholder origin as a URL.
pub fn null_origin() -> Url {
    static NULL: OnceLock<Url> = OnceLock::new();
    NULL.get_or_init(|| Url::parse(NULL_ORIGIN).expect("NULL_ORIGIN is a valid URL"))
        .clone()
}

/// Check whether `url` lives on the placeholder origin
pub fn is_null_origin(url: &Url) -> bool {
    url.origin() == null_origin().origin()
}

/// Partial URL update.
///
/// Only the fields a same-document navigation can change, plus an origin for
/// building URLs that live elsewhere. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlPatch {
    /// New path
    pub pathname: Option<String>,
    /// New query, replacing the whole existing query
    pub search_params: Option<QueryParams>,
    /// New fragment, with or without the leading `#`; empty removes it
    pub hash: Option<String>,
    /// New origin (`scheme://host[:port]`)
    pub origin: Option<String>,
}

impl UrlPatch {
    /// Create an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pathname
    #[must_use]
    pub fn pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = Some(pathname.into());
        self
    }

    /// Set the search params
    #[must_use]
    pub fn search_params(mut self, params: QueryParams) -> Self {
        self.search_params = Some(params);
        self
    }

    /// Set the hash
    #[must_use]
    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Set the origin
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// Where a navigation should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// An absolute URL, used as is
    Url(Url),
    /// A string resolved against the current location
    Href(String),
    /// Partial fields overlaid on the current location
    Patch(UrlPatch),
}

impl From<Url> for Destination {
    fn from(url: Url) -> Self {
        Destination::Url(url)
    }
}

impl From<&Url> for Destination {
    fn from(url: &Url) -> Self {
        Destination::Url(url.clone())
    }
}

impl From<&str> for Destination {
    fn from(href: &str) -> Self {
        Destination::Href(href.to_string())
    }
}

impl From<String> for Destination {
    fn from(href: String) -> Self {
        Destination::Href(href)
    }
}

impl From<UrlPatch> for Destination {
    fn from(patch: UrlPatch) -> Self {
        Destination::Patch(patch)
    }
}

/// Overlay `patch` onto `base`, returning a new URL.
///
/// Search params in the patch replace the base query entirely. An origin in
/// the patch re-roots the relative reference of `base` on that origin.
///
/// # Example
///
/// ```
/// use url::Url;
/// use url_navigator::{merge_url, QueryParams, UrlPatch};
///
/// let base = Url::parse("https://example.com/a?x=1#top").unwrap();
/// let merged = merge_url(
///     &base,
///     &UrlPatch::new()
///         .pathname("/b")
///         .search_params(QueryParams::new().with("y", "2")),
/// )
/// .unwrap();
///
/// assert_eq!(merged.as_str(), "https://example.com/b?y=2#top");
/// assert_eq!(base.as_str(), "https://example.com/a?x=1#top");
/// ```
pub fn merge_url(base: &Url, patch: &UrlPatch) -> Result<Url, RouterError> {
    let mut url = match &patch.origin {
        Some(origin) => Url::parse(origin)?.join(&relative_reference(base))?,
        None => base.clone(),
    };

    if let Some(hash) = &patch.hash {
        let hash = hash.strip_prefix('#').unwrap_or(hash);
        url.set_fragment((!hash.is_empty()).then_some(hash));
    }

    if let Some(pathname) = &patch.pathname {
        url.set_path(pathname);
    }

    if let Some(search) = &patch.search_params {
        url.set_query(None);
        if !search.is_empty() {
            url.query_pairs_mut().extend_pairs(search.iter());
        }
    }

    Ok(url)
}

/// Path, query and hash of `url`, decoded like `decodeURI`.
///
/// This is the same-document reference handed to history APIs.
///
/// ```
/// use url::Url;
/// use url_navigator::relative_reference;
///
/// let url = Url::parse("https://example.com/caf%C3%A9?q=a%26b#x").unwrap();
/// assert_eq!(relative_reference(&url), "/café?q=a%26b#x");
/// ```
pub fn relative_reference(url: &Url) -> String {
    decode_uri(&url[Position::BeforePath..])
}

/// Normalize a destination into an absolute URL relative to `current`.
pub fn resolve_destination(destination: &Destination, current: &Url) -> Result<Url, RouterError> {
    match destination {
        Destination::Url(url) => Ok(url.clone()),
        Destination::Href(href) => Ok(current.join(href)?),
        Destination::Patch(patch) => merge_url(current, patch),
    }
}

/// Decode percent-escapes except those of reserved characters.
///
/// Malformed UTF-8 leaves the input untouched.
fn decode_uri(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut run_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let reserved = input
                .get(i + 1..i + 3)
                .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .is_some_and(|byte| URI_RESERVED.contains(&byte));

            if reserved {
                match percent_decode_str(&input[run_start..i]).decode_utf8() {
                    Ok(decoded) => out.push_str(&decoded),
                    Err(_) => return input.to_string(),
                }
                out.push_str(&input[i..i + 3]);
                i += 3;
                run_start = i;
                continue;
            }
        }
        i += 1;
    }

    match percent_decode_str(&input[run_start..]).decode_utf8() {
        Ok(decoded) => out.push_str(&decoded),
        Err(_) => return input.to_string(),
    }

    out
}
