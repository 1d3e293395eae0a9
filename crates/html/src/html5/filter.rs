//! Content filter interface.
//!
//! A filter sees one token plus a small window of its neighbours and either
//! lets it pass or blocks it. Blocking never stops parsing: the tree builder
//! neutralizes the token (see `Html5TreeBuilder::process_blocked`) and the
//! coordinator reports it.

use serde::Serialize;

use crate::html5::compact::{CompactKind, CompactToken, attr};
use crate::html5::shared::SourcePos;

/// Number of neighbouring tokens on each side handed to a filter.
pub const FILTER_WINDOW: usize = 2;

/// Tokens around the one being checked, nearest last in `before` and nearest
/// first in `after`. Near chunk edges the windows are shorter.
#[derive(Clone, Copy, Debug)]
pub struct FilterContext<'a> {
    pub before: &'a [CompactToken],
    pub after: &'a [CompactToken],
}

impl<'a> FilterContext<'a> {
    /// Window around `tokens[index]`.
    pub fn around(tokens: &'a [CompactToken], index: usize) -> Self {
        let start = index.saturating_sub(FILTER_WINDOW);
        let end = (index + 1 + FILTER_WINDOW).min(tokens.len());
        Self {
            before: tokens.get(start..index).unwrap_or(&[]),
            after: tokens.get(index + 1..end).unwrap_or(&[]),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterVerdict {
    Pass,
    Block { reason: String },
}

pub trait ContentFilter: Send + Sync {
    fn check(&self, token: &CompactToken, context: &FilterContext<'_>) -> FilterVerdict;
}

/// A blocked token, as reported to the embedder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub pos: SourcePos,
    /// Tag name for tags, `#text`/`#comment` otherwise.
    pub tag: String,
    pub reason: String,
}

impl FilterReport {
    pub fn new(token: &CompactToken, reason: &str) -> Self {
        let tag = match &token.kind {
            CompactKind::StartTag { name, .. } | CompactKind::EndTag { name } => name.clone(),
            CompactKind::Character(_) => "#text".to_string(),
            CompactKind::Comment(_) => "#comment".to_string(),
            CompactKind::Doctype { .. } => "#doctype".to_string(),
            CompactKind::EndOfFile => "#eof".to_string(),
        };
        Self {
            pos: token.pos,
            tag,
            reason: reason.to_string(),
        }
    }
}

/// Check `tokens[index]` with its window.
pub fn check_at(filter: &dyn ContentFilter, tokens: &[CompactToken], index: usize) -> FilterVerdict {
    match tokens.get(index) {
        Some(token) => filter.check(token, &FilterContext::around(tokens, index)),
        None => FilterVerdict::Pass,
    }
}

/// Filter that lets everything through.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl ContentFilter for AllowAll {
    fn check(&self, _token: &CompactToken, _context: &FilterContext<'_>) -> FilterVerdict {
        FilterVerdict::Pass
    }
}

/// Blocks start tags by name and scripts whose `src` contains a listed host.
#[derive(Clone, Debug, Default)]
pub struct DenyList {
    tags: Vec<String>,
    script_hosts: Vec<String>,
}

impl DenyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_tag(mut self, name: &str) -> Self {
        self.tags.push(name.to_ascii_lowercase());
        self
    }

    pub fn deny_script_host(mut self, host: &str) -> Self {
        self.script_hosts.push(host.to_ascii_lowercase());
        self
    }
}

impl ContentFilter for DenyList {
    fn check(&self, token: &CompactToken, _context: &FilterContext<'_>) -> FilterVerdict {
        let CompactKind::StartTag { name, attrs, .. } = &token.kind else {
            return FilterVerdict::Pass;
        };
        if self.tags.iter().any(|t| t == name) {
            return FilterVerdict::Block {
                reason: format!("tag <{name}> is denied"),
            };
        }
        if name == "script" {
            if let Some(src) = attr(attrs, "src") {
                let src = src.to_ascii_lowercase();
                if let Some(host) = self.script_hosts.iter().find(|h| src.contains(h.as_str())) {
                    return FilterVerdict::Block {
                        reason: format!("script host {host} is denied"),
                    };
                }
            }
        }
        FilterVerdict::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html5::compact::CompactAttr;

    fn pos() -> SourcePos {
        SourcePos::START
    }

    #[test]
    fn window_is_clamped_at_edges() {
        let tokens: Vec<_> = (0..5).map(|i| CompactToken::text(&i.to_string(), pos())).collect();
        let first = FilterContext::around(&tokens, 0);
        assert!(first.before.is_empty());
        assert_eq!(first.after.len(), 2);
        let last = FilterContext::around(&tokens, 4);
        assert_eq!(last.before.len(), 2);
        assert!(last.after.is_empty());
    }

    #[test]
    fn deny_list_blocks_tags_and_script_hosts() {
        let filter = DenyList::new()
            .deny_tag("IFRAME")
            .deny_script_host("ads.example");
        let tokens = vec![
            CompactToken::start_tag("iframe", Vec::new(), pos()),
            CompactToken::start_tag(
                "script",
                vec![CompactAttr::new("src", Some("https://ADS.example/x.js"))],
                pos(),
            ),
            CompactToken::start_tag("div", Vec::new(), pos()),
        ];
        assert!(matches!(check_at(&filter, &tokens, 0), FilterVerdict::Block { .. }));
        assert!(matches!(check_at(&filter, &tokens, 1), FilterVerdict::Block { .. }));
        assert_eq!(check_at(&filter, &tokens, 2), FilterVerdict::Pass);
        assert_eq!(check_at(&AllowAll, &tokens, 0), FilterVerdict::Pass);
    }

    #[test]
    fn report_names_the_token() {
        let report = FilterReport::new(&CompactToken::text("x", pos()), "nope");
        assert_eq!(report.tag, "#text");
        assert_eq!(report.reason, "nope");
    }
}
