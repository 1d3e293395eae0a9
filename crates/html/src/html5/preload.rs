//! Preload scanning: find fetchable resource references ahead of tree
//! construction.
//!
//! The scanner is stateless between calls. The worker runs it over each
//! chunk it produces, the coordinator over script-inserted text, and
//! [`PreloadDedup`] on the coordinator keeps both paths (and the fetches
//! real tree construction triggers) from issuing the same URL twice.

use std::collections::HashSet;

use core_types::{Priority, ResourceKind};
use serde::Serialize;
use url::Url;

use crate::html5::compact::{CompactAttr, CompactToken, attr, compact_batch, has_attr};
use crate::html5::rules;
use crate::html5::shared::{DocumentParseContext, InputStream, SourcePos};
use crate::html5::tokenizer::{Html5Tokenizer, TokenizerConfig};

/// Unresolved resource reference carried by one element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRef {
    pub url: String,
    pub kind: ResourceKind,
    pub priority: Priority,
}

/// Resolved fetch request for the loader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PreloadRequest {
    pub url: String,
    pub kind: ResourceKind,
    pub priority: Priority,
    pub pos: SourcePos,
}

/// The resource an element named `name` with `attrs` would fetch, if any.
pub fn resource_reference(name: &str, attrs: &[CompactAttr]) -> Option<ResourceRef> {
    let (url, kind, priority) = match name {
        "script" => {
            if !rules::is_classic_script_type(attr(attrs, "type"))
                && !attr(attrs, "type").is_some_and(|t| t.trim().eq_ignore_ascii_case("module"))
            {
                return None;
            }
            let priority = if has_attr(attrs, "async") || has_attr(attrs, "defer") {
                Priority::Medium
            } else {
                Priority::High
            };
            (attr(attrs, "src")?, ResourceKind::Script, priority)
        }
        "link" => {
            let rel = attr(attrs, "rel")?.to_ascii_lowercase();
            let href = attr(attrs, "href")?;
            let mut rels = rel.split(rules::is_html_whitespace).filter(|r| !r.is_empty());
            if rels.clone().any(|r| r == "stylesheet") {
                (href, ResourceKind::Style, Priority::High)
            } else if rels.clone().any(|r| r == "modulepreload") {
                (href, ResourceKind::Script, Priority::Medium)
            } else if rels.any(|r| r == "preload") {
                let (kind, priority) = match attr(attrs, "as")?.trim().to_ascii_lowercase().as_str() {
                    "script" => (ResourceKind::Script, Priority::Medium),
                    "style" => (ResourceKind::Style, Priority::High),
                    "font" => (ResourceKind::Font, Priority::High),
                    "image" => (ResourceKind::Image, Priority::Low),
                    "fetch" => (ResourceKind::Fetch, Priority::Medium),
                    _ => return None,
                };
                (href, kind, priority)
            } else {
                return None;
            }
        }
        "img" => (attr(attrs, "src")?, ResourceKind::Image, Priority::Low),
        _ => return None,
    };
    let url = url.trim_matches(rules::is_html_whitespace);
    if url.is_empty() || is_unfetchable(url) {
        return None;
    }
    Some(ResourceRef {
        url: url.to_string(),
        kind,
        priority,
    })
}

fn is_unfetchable(url: &str) -> bool {
    let scheme = url.split(':').next().unwrap_or("");
    url.contains(':')
        && (scheme.eq_ignore_ascii_case("data") || scheme.eq_ignore_ascii_case("javascript"))
}

#[derive(Clone, Debug, Default)]
pub struct PreloadScanner {
    base: Option<Url>,
}

impl PreloadScanner {
    /// Scanner resolving against `document_url`. An unparsable document URL
    /// is ignored (relative references are then reported verbatim).
    pub fn new(document_url: Option<&str>) -> Self {
        let base = document_url.and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(err) => {
                log::warn!(target: "html5.preload", "ignoring document url {raw:?}: {err}");
                None
            }
        });
        Self { base }
    }

    /// Canonical form of `raw`: joined onto the document URL when there is
    /// one, otherwise parsed as absolute or kept verbatim.
    pub fn resolve(&self, raw: &str) -> String {
        let resolved = match &self.base {
            Some(base) => base.join(raw),
            None => Url::parse(raw),
        };
        match resolved {
            Ok(url) => url.into(),
            Err(_) => raw.to_string(),
        }
    }

    pub fn request_for(&self, reference: &ResourceRef, pos: SourcePos) -> PreloadRequest {
        PreloadRequest {
            url: self.resolve(&reference.url),
            kind: reference.kind,
            priority: reference.priority,
            pos,
        }
    }

    pub fn scan_token(&self, token: &CompactToken) -> Option<PreloadRequest> {
        let name = token.start_tag_name()?;
        let reference = resource_reference(name, token.attrs())?;
        Some(self.request_for(&reference, token.pos))
    }

    pub fn scan(&self, tokens: &[CompactToken]) -> Vec<PreloadRequest> {
        tokens.iter().filter_map(|t| self.scan_token(t)).collect()
    }

    /// Scan raw markup from an arbitrary offset. The window is tokenized
    /// with a throwaway tokenizer, so positions are relative to `text`.
    pub fn scan_text(&self, text: &str) -> Vec<PreloadRequest> {
        let mut ctx = DocumentParseContext::new();
        let mut input = InputStream::from_text(text);
        let mut tokenizer = Html5Tokenizer::new(TokenizerConfig {
            emit_eof: false,
            max_tokens_per_pump: None,
        });
        tokenizer.finish(&mut input, &mut ctx);
        let batch = tokenizer.next_batch(&mut input);
        let tokens = compact_batch(&batch, &ctx.atoms);
        self.scan(&tokens)
    }
}

/// Set of URLs already handed to the loader.
#[derive(Clone, Debug, Default)]
pub struct PreloadDedup {
    issued: HashSet<String>,
}

impl PreloadDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time `url` is seen.
    pub fn admit(&mut self, url: &str) -> bool {
        if self.issued.contains(url) {
            return false;
        }
        self.issued.insert(url.to_string());
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.issued.contains(url)
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> PreloadScanner {
        PreloadScanner::new(Some("https://example.com/dir/page.html"))
    }

    #[test]
    fn finds_scripts_styles_and_images() {
        let found = scanner().scan_text(
            "<script src=a.js></script><link rel='Stylesheet icon' href=/s.css><img src=i.png>",
        );
        let summary: Vec<_> = found
            .iter()
            .map(|r| (r.url.as_str(), r.kind, r.priority))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("https://example.com/dir/a.js", ResourceKind::Script, Priority::High),
                ("https://example.com/s.css", ResourceKind::Style, Priority::High),
                ("https://example.com/dir/i.png", ResourceKind::Image, Priority::Low),
            ]
        );
    }

    #[test]
    fn preload_links_map_as_attribute() {
        let found =
            scanner().scan_text("<link rel=preload as=font href=f.woff2><link rel=preload href=x>");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ResourceKind::Font);
    }

    #[test]
    fn markup_inside_script_is_not_scanned() {
        let found = scanner().scan_text("<script>var s = '<img src=x.png>';</script>");
        assert!(found.is_empty());
    }

    #[test]
    fn async_scripts_are_medium_and_data_urls_skipped() {
        let found =
            scanner().scan_text("<script async src=a.js></script><img src='data:image/png,xx'>");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].priority, Priority::Medium);
    }

    #[test]
    fn scan_is_rerunnable_from_any_offset() {
        let text = "<p>x</p><img src=a.png><img src=b.png>";
        let offset = text.find("<img src=b").unwrap();
        let tail = scanner().scan_text(&text[offset..]);
        assert_eq!(tail.len(), 1);
        assert!(tail[0].url.ends_with("/b.png"));
        assert_eq!(scanner().scan_text(text).len(), 2);
    }

    #[test]
    fn without_base_relative_urls_are_verbatim() {
        let scanner = PreloadScanner::new(None);
        assert_eq!(scanner.resolve("a.js"), "a.js");
        assert_eq!(scanner.resolve("HTTP://X.org/a"), "http://x.org/a");
    }

    #[test]
    fn dedup_admits_once() {
        let mut dedup = PreloadDedup::new();
        assert!(dedup.admit("https://example.com/a.js"));
        assert!(!dedup.admit("https://example.com/a.js"));
        assert_eq!(dedup.len(), 1);
    }
}
