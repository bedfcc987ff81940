//! Href extraction and resolution for rendered pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use url::Url;

use crate::models::Link;

static HREF: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[href]").expect("href selector is valid"));

/// Schemes that are never fetched.
const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:"];

/// Collect the distinct raw `href` attributes in `html`, in document order.
///
/// The HTML parser may clone elements while repairing malformed markup, so
/// one written anchor can show up more than once in the tree.
pub fn extract_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    document
        .select(&HREF)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| seen.insert(*href))
        .map(str::to_string)
        .collect()
}

/// Returns true if `href` starts with a `{{ ... }}` placeholder.
///
/// Such hrefs only become absolute after substitution, so joining them
/// with the page URL would bury the placeholder inside a path.
pub fn is_templated_root(href: &str) -> bool {
    percent_decode_str(href.trim())
        .decode_utf8_lossy()
        .starts_with("{{")
}

/// Resolve `hrefs` against the page they were found on.
///
/// Hrefs that do not resolve to an absolute URL are dropped, as are
/// `mailto:` and `tel:` links. Hrefs starting with a placeholder are kept
/// verbatim until substitution.
pub fn resolve_links<'a>(page: &str, hrefs: impl IntoIterator<Item = &'a str>) -> Vec<Link> {
    let Ok(base) = Url::parse(page) else {
        tracing::debug!(%page, "Page URL is not absolute, skipping its links");
        return Vec::new();
    };

    hrefs
        .into_iter()
        .filter_map(|href| {
            if is_templated_root(href) {
                return Some(href.trim().to_string());
            }
            match base.join(href.trim()) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    tracing::debug!(%href, error = %e, "Dropping unresolvable href");
                    None
                }
            }
        })
        .filter(|link| !SKIPPED_SCHEMES.iter().any(|scheme| link.starts_with(scheme)))
        .collect()
}

/// Returns true if `link` shares scheme, host and port with `site`.
pub fn is_same_origin(link: &str, site: &Url) -> bool {
    Url::parse(link).is_ok_and(|url| url.origin() == site.origin())
}
