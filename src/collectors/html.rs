//! Small helpers shared by the per-site card parsers.

use scraper::{ElementRef, Selector};
use url::Url;

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Collapse whitespace runs to a single space and trim.
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalised text of the first match under `card`, `None` if absent or blank.
pub(crate) fn text_of(card: ElementRef<'_>, css: &str) -> Option<String> {
    let sel = selector(css)?;
    let text = squash(&card.select(&sel).next()?.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

pub(crate) fn attr_of(card: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    let value = card.select(&sel).next()?.value().attr(attr)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub(crate) fn has_match(card: ElementRef<'_>, css: &str) -> bool {
    selector(css).is_some_and(|sel| card.select(&sel).next().is_some())
}

/// Resolve `href` against `base` and drop the query string and fragment,
/// which carry tracking parameters that differ between sightings of a job.
pub(crate) fn canonical_url(base: &str, href: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?.join(href).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}
