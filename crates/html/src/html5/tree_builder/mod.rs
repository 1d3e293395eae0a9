//! HTML5 tree builder.
//!
//! Consumes compact tokens and drives a [`TreeSink`]. The same builder runs
//! against the real [`crate::Document`] on the coordinator and against a
//! counting sink inside the worker-side simulator, so both sides share one
//! set of insertion-mode rules.
//!
//! Invariants:
//! - Tokens after the EOF token are ignored.
//! - A parser-blocking script suspends the builder on its end tag. The
//!   script's node is fully built at that point.
//! - Text appended to the same parent in sequence is coalesced by the sink,
//!   so the resulting tree does not depend on where text runs were split.

use crate::html5::compact::{CompactAttr, CompactKind, CompactToken, attr, has_attr};
use crate::html5::preload::{ResourceRef, resource_reference};
use crate::html5::rules;
use crate::html5::shared::{ParseError, ParseErrorCode, SourcePos};
use crate::types::NodeId;

mod modes;
mod stack;

#[cfg(test)]
mod tests;

pub use modes::InsertionMode;
use stack::{OpenElement, OpenElementsStack, ScopeKind};

/// Receiver of tree mutations.
pub trait TreeSink {
    /// Whether the sink materializes content. Sinks that only track
    /// structure let the builder skip text buffering and fetch collection.
    const KEEPS_CONTENT: bool;

    fn document(&self) -> NodeId;
    fn create_element(&mut self, name: &str, attrs: &[CompactAttr], inert: bool) -> NodeId;
    fn append(&mut self, parent: NodeId, child: NodeId);
    /// Append text, merging into a trailing text child of `parent`.
    fn append_text(&mut self, parent: NodeId, text: &str);
    fn append_comment(&mut self, parent: NodeId, text: &str);
    fn append_doctype(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>);
}

#[derive(Clone, Debug)]
pub struct TreeBuilderConfig {
    /// With scripting disabled no script ever suspends the builder.
    pub scripting: bool,
}

impl Default for TreeBuilderConfig {
    fn default() -> Self {
        Self { scripting: true }
    }
}

/// A parser-blocking script whose end tag was just processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingScript {
    pub node: NodeId,
    pub src: Option<String>,
    pub text: String,
    pub pos: SourcePos,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeBuilderStep {
    Continue,
    Suspend(PendingScript),
    Finished,
}

/// Handle-free projection of the builder state: what the worker-side
/// simulator predicts and what checkpoints carry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SimulatorState {
    pub mode: InsertionMode,
    pub original_mode: Option<InsertionMode>,
    pub open_elements: Vec<String>,
    pub head_seen: bool,
    pub finished: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeBuilderStats {
    pub tokens_processed: u64,
    pub elements_inserted: u64,
    pub scripts_suspended: u64,
    pub neutralized: u64,
}

#[derive(Debug)]
struct ScriptInProgress {
    node: NodeId,
    src: Option<String>,
    blocking: bool,
    text: String,
    pos: SourcePos,
}

struct StartTag<'a> {
    name: &'a str,
    attrs: &'a [CompactAttr],
    inert: bool,
    pos: SourcePos,
}

enum Flow {
    Done,
    Reprocess,
    Suspend(PendingScript),
    Stop,
}

pub struct Html5TreeBuilder {
    config: TreeBuilderConfig,
    mode: InsertionMode,
    original_mode: Option<InsertionMode>,
    open: OpenElementsStack,
    head: Option<NodeId>,
    script: Option<ScriptInProgress>,
    skip_newline: bool,
    fetches: Vec<ResourceRef>,
    errors: Vec<ParseError>,
    finished: bool,
    stats: TreeBuilderStats,
}

impl Html5TreeBuilder {
    pub fn new(config: TreeBuilderConfig) -> Self {
        Self {
            config,
            mode: InsertionMode::Initial,
            original_mode: None,
            open: OpenElementsStack::default(),
            head: None,
            script: None,
            skip_newline: false,
            fetches: Vec::new(),
            errors: Vec::new(),
            finished: false,
            stats: TreeBuilderStats::default(),
        }
    }

    /// Rebuild a builder from a projected state. Node handles are synthetic,
    /// so this is only meaningful for sinks that ignore node identity.
    pub(crate) fn from_state(config: TreeBuilderConfig, state: &SimulatorState) -> Self {
        let mut builder = Self::new(config);
        builder.mode = state.mode;
        builder.original_mode = state.original_mode;
        builder.finished = state.finished;
        for (i, name) in state.open_elements.iter().enumerate() {
            builder
                .open
                .push(OpenElement::new(NodeId(i as u32 + 1), name));
        }
        if state.head_seen {
            builder.head = Some(NodeId(u32::MAX));
        }
        builder
    }

    pub fn mode(&self) -> InsertionMode {
        self.mode
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> TreeBuilderStats {
        self.stats
    }

    pub fn max_depth(&self) -> u32 {
        self.open.max_depth()
    }

    pub fn simulator_state(&self) -> SimulatorState {
        SimulatorState {
            mode: self.mode,
            original_mode: self.original_mode,
            open_elements: self.open.names().map(str::to_string).collect(),
            head_seen: self.head.is_some(),
            finished: self.finished,
        }
    }

    /// Fetches triggered by inserted elements since the last call.
    pub fn drain_fetches(&mut self) -> Vec<ResourceRef> {
        std::mem::take(&mut self.fetches)
    }

    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    pub fn process<S: TreeSink>(&mut self, token: &CompactToken, sink: &mut S) -> TreeBuilderStep {
        self.process_token(token, false, sink)
    }

    /// Process a token the content filter blocked. A blocked start tag is
    /// inserted without attributes and marked inert; blocked text and
    /// comments are dropped. Other tokens are processed normally.
    pub fn process_blocked<S: TreeSink>(
        &mut self,
        token: &CompactToken,
        sink: &mut S,
    ) -> TreeBuilderStep {
        self.process_token(token, true, sink)
    }

    /// Run end-of-file processing. Idempotent.
    pub fn finish<S: TreeSink>(&mut self, pos: SourcePos, sink: &mut S) {
        if !self.finished {
            self.process(&CompactToken::eof(pos), sink);
        }
    }

    fn process_token<S: TreeSink>(
        &mut self,
        token: &CompactToken,
        blocked: bool,
        sink: &mut S,
    ) -> TreeBuilderStep {
        if self.finished {
            return TreeBuilderStep::Finished;
        }
        self.stats.tokens_processed += 1;
        if blocked {
            self.stats.neutralized += 1;
        }
        let skip_newline = std::mem::take(&mut self.skip_newline);
        match &token.kind {
            CompactKind::Character(text) => {
                if !blocked {
                    let text = match text.strip_prefix('\n') {
                        Some(rest) if skip_newline => rest,
                        _ => text.as_str(),
                    };
                    self.process_text(text, token.pos, sink);
                }
                TreeBuilderStep::Continue
            }
            CompactKind::Comment(text) => {
                if !blocked {
                    self.process_comment(text, sink);
                }
                TreeBuilderStep::Continue
            }
            CompactKind::Doctype {
                name,
                public_id,
                system_id,
                ..
            } => {
                if self.mode == InsertionMode::Initial {
                    sink.append_doctype(
                        name.as_deref().unwrap_or(""),
                        public_id.as_deref(),
                        system_id.as_deref(),
                    );
                    self.set_mode(InsertionMode::BeforeHtml);
                } else {
                    self.parse_error(ParseErrorCode::UnexpectedDoctype, token.pos);
                }
                TreeBuilderStep::Continue
            }
            CompactKind::StartTag { name, attrs, .. } => {
                let attrs: &[CompactAttr] = if blocked { &[] } else { attrs };
                let tag = StartTag {
                    name,
                    attrs,
                    inert: blocked,
                    pos: token.pos,
                };
                loop {
                    match self.start_tag(&tag, sink) {
                        Flow::Reprocess => continue,
                        flow => return self.finish_flow(flow),
                    }
                }
            }
            CompactKind::EndTag { name } => loop {
                match self.end_tag(name, token.pos, sink) {
                    Flow::Reprocess => continue,
                    flow => return self.finish_flow(flow),
                }
            },
            CompactKind::EndOfFile => loop {
                match self.eof(token.pos, sink) {
                    Flow::Reprocess => continue,
                    flow => return self.finish_flow(flow),
                }
            },
        }
    }

    fn finish_flow(&mut self, flow: Flow) -> TreeBuilderStep {
        match flow {
            Flow::Done | Flow::Reprocess => TreeBuilderStep::Continue,
            Flow::Suspend(script) => {
                self.stats.scripts_suspended += 1;
                TreeBuilderStep::Suspend(script)
            }
            Flow::Stop => {
                self.finished = true;
                self.open.clear();
                self.script = None;
                TreeBuilderStep::Finished
            }
        }
    }

    fn set_mode(&mut self, next: InsertionMode) {
        if self.mode == next {
            return;
        }
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "html5.tree_builder", "mode {:?} -> {:?}", self.mode, next);
        self.mode = next;
    }

    fn parse_error(&mut self, code: ParseErrorCode, pos: SourcePos) {
        self.errors.push(ParseError { code, pos });
    }

    // --- text and comments ---

    fn process_text<S: TreeSink>(&mut self, text: &str, pos: SourcePos, sink: &mut S) {
        let mut rest = text;
        while !rest.is_empty() {
            if self.mode.splits_leading_whitespace() {
                let ws = rules::leading_whitespace_len(rest);
                if ws > 0 {
                    if !matches!(
                        self.mode,
                        InsertionMode::Initial | InsertionMode::BeforeHtml | InsertionMode::BeforeHead
                    ) {
                        self.insert_text(&rest[..ws], sink);
                    }
                    rest = &rest[ws..];
                    continue;
                }
            }
            match self.mode {
                InsertionMode::Initial => self.set_mode(InsertionMode::BeforeHtml),
                InsertionMode::BeforeHtml => {
                    self.insert_implied("html", pos, sink);
                    self.set_mode(InsertionMode::BeforeHead);
                }
                InsertionMode::BeforeHead => {
                    self.insert_head(&[], pos, sink);
                    self.set_mode(InsertionMode::InHead);
                }
                InsertionMode::InHead => {
                    self.pop_head();
                    self.set_mode(InsertionMode::AfterHead);
                }
                InsertionMode::AfterHead => {
                    self.insert_implied("body", pos, sink);
                    self.set_mode(InsertionMode::InBody);
                }
                InsertionMode::AfterBody | InsertionMode::AfterAfterBody => {
                    self.parse_error(ParseErrorCode::UnexpectedText, pos);
                    self.set_mode(InsertionMode::InBody);
                }
                InsertionMode::InBody | InsertionMode::Text => {
                    self.insert_text(rest, sink);
                    if S::KEEPS_CONTENT && self.mode == InsertionMode::Text {
                        if let Some(script) = self.script.as_mut() {
                            script.text.push_str(rest);
                        }
                    }
                    return;
                }
            }
        }
    }

    fn insert_text<S: TreeSink>(&mut self, text: &str, sink: &mut S) {
        if !S::KEEPS_CONTENT {
            return;
        }
        let parent = self.insertion_parent(sink);
        sink.append_text(parent, text);
    }

    fn process_comment<S: TreeSink>(&mut self, text: &str, sink: &mut S) {
        if !S::KEEPS_CONTENT {
            return;
        }
        let parent = match self.mode {
            InsertionMode::Initial | InsertionMode::BeforeHtml | InsertionMode::AfterAfterBody => {
                sink.document()
            }
            InsertionMode::AfterBody => match self.open.get(0) {
                Some(html) => html.node,
                None => sink.document(),
            },
            _ => self.insertion_parent(sink),
        };
        sink.append_comment(parent, text);
    }

    // --- element insertion ---

    fn insertion_parent<S: TreeSink>(&self, sink: &S) -> NodeId {
        match self.open.current() {
            Some(entry) => entry.node,
            None => sink.document(),
        }
    }

    fn insert_element<S: TreeSink>(&mut self, tag: &StartTag<'_>, push: bool, sink: &mut S) -> NodeId {
        let parent = self.insertion_parent(sink);
        let node = sink.create_element(tag.name, tag.attrs, tag.inert);
        sink.append(parent, node);
        self.stats.elements_inserted += 1;
        if S::KEEPS_CONTENT && !tag.inert {
            if let Some(fetch) = resource_reference(tag.name, tag.attrs) {
                self.fetches.push(fetch);
            }
        }
        if push {
            self.open.push(OpenElement::new(node, tag.name));
        }
        node
    }

    fn insert_implied<S: TreeSink>(&mut self, name: &str, pos: SourcePos, sink: &mut S) -> NodeId {
        let tag = StartTag {
            name,
            attrs: &[],
            inert: false,
            pos,
        };
        self.insert_element(&tag, true, sink)
    }

    fn insert_head<S: TreeSink>(&mut self, attrs: &[CompactAttr], pos: SourcePos, sink: &mut S) {
        let tag = StartTag {
            name: "head",
            attrs,
            inert: false,
            pos,
        };
        let node = self.insert_element(&tag, true, sink);
        self.head = Some(node);
    }

    fn pop_head(&mut self) {
        if self.open.current_name() == Some("head") {
            self.open.pop();
        }
    }

    /// Insert a raw text element and switch to `Text` until its end tag.
    fn insert_raw_text<S: TreeSink>(&mut self, tag: &StartTag<'_>, sink: &mut S) -> NodeId {
        let node = self.insert_element(tag, true, sink);
        self.original_mode = Some(self.mode);
        self.set_mode(InsertionMode::Text);
        node
    }

    fn close_p_in_button_scope(&mut self) {
        if self.open.has_in_scope("p", ScopeKind::Button) {
            self.generate_implied_end_tags(Some("p"));
            self.open
                .pop_until_including_in_scope(|n| n == "p", ScopeKind::Button);
        }
    }

    fn generate_implied_end_tags(&mut self, except: Option<&str>) {
        while let Some(name) = self.open.current_name() {
            if !rules::has_implied_end_tag(name) || Some(name) == except {
                break;
            }
            self.open.pop();
        }
    }

    // --- start tags ---

    fn start_tag<S: TreeSink>(&mut self, tag: &StartTag<'_>, sink: &mut S) -> Flow {
        match self.mode {
            InsertionMode::Initial => {
                self.set_mode(InsertionMode::BeforeHtml);
                Flow::Reprocess
            }
            InsertionMode::BeforeHtml => {
                if tag.name == "html" {
                    self.insert_element(tag, true, sink);
                    self.set_mode(InsertionMode::BeforeHead);
                    return Flow::Done;
                }
                self.insert_implied("html", tag.pos, sink);
                self.set_mode(InsertionMode::BeforeHead);
                Flow::Reprocess
            }
            InsertionMode::BeforeHead => match tag.name {
                "html" => self.ignore_start(tag),
                "head" => {
                    self.insert_head(tag.attrs, tag.pos, sink);
                    self.set_mode(InsertionMode::InHead);
                    Flow::Done
                }
                _ => {
                    self.insert_head(&[], tag.pos, sink);
                    self.set_mode(InsertionMode::InHead);
                    Flow::Reprocess
                }
            },
            InsertionMode::InHead => match self.in_head_start(tag, sink) {
                Some(flow) => flow,
                None => {
                    self.pop_head();
                    self.set_mode(InsertionMode::AfterHead);
                    Flow::Reprocess
                }
            },
            InsertionMode::AfterHead => match tag.name {
                "html" | "head" => self.ignore_start(tag),
                "body" => {
                    self.insert_element(tag, true, sink);
                    self.set_mode(InsertionMode::InBody);
                    Flow::Done
                }
                name if rules::is_head_content(name) => {
                    self.parse_error(ParseErrorCode::UnexpectedStartTag, tag.pos);
                    let Some(head) = self.head else {
                        return self.in_body_start(tag, sink);
                    };
                    self.open.push(OpenElement::new(head, "head"));
                    let flow = self.in_head_start(tag, sink).unwrap_or(Flow::Done);
                    self.open.remove_node(head);
                    flow
                }
                _ => {
                    self.insert_implied("body", tag.pos, sink);
                    self.set_mode(InsertionMode::InBody);
                    Flow::Reprocess
                }
            },
            InsertionMode::InBody => self.in_body_start(tag, sink),
            InsertionMode::Text => {
                // The tokenizer keeps raw text elements closed over their
                // content, so a start tag here means the element was cut off.
                self.parse_error(ParseErrorCode::UnexpectedStartTag, tag.pos);
                self.close_text_element();
                Flow::Reprocess
            }
            InsertionMode::AfterBody | InsertionMode::AfterAfterBody => {
                if tag.name == "html" {
                    return self.ignore_start(tag);
                }
                self.parse_error(ParseErrorCode::UnexpectedStartTag, tag.pos);
                self.set_mode(InsertionMode::InBody);
                Flow::Reprocess
            }
        }
    }

    fn ignore_start(&mut self, tag: &StartTag<'_>) -> Flow {
        self.parse_error(ParseErrorCode::UnexpectedStartTag, tag.pos);
        Flow::Done
    }

    /// "In head" start tag rules. `None` means "anything else".
    fn in_head_start<S: TreeSink>(&mut self, tag: &StartTag<'_>, sink: &mut S) -> Option<Flow> {
        match tag.name {
            "html" | "head" => Some(self.ignore_start(tag)),
            "base" | "basefont" | "bgsound" | "link" | "meta" => {
                self.insert_element(tag, false, sink);
                Some(Flow::Done)
            }
            "title" | "noframes" | "style" => {
                self.insert_raw_text(tag, sink);
                Some(Flow::Done)
            }
            "script" => {
                let blocking = !tag.inert && is_parser_blocking(tag.attrs);
                let node = self.insert_raw_text(tag, sink);
                self.script = Some(ScriptInProgress {
                    node,
                    src: attr(tag.attrs, "src").map(str::to_string),
                    blocking,
                    text: String::new(),
                    pos: tag.pos,
                });
                Some(Flow::Done)
            }
            _ => None,
        }
    }

    fn in_body_start<S: TreeSink>(&mut self, tag: &StartTag<'_>, sink: &mut S) -> Flow {
        match tag.name {
            "html" | "body" | "head" => return self.ignore_start(tag),
            name if rules::is_head_content(name) => {
                return self.in_head_start(tag, sink).unwrap_or(Flow::Done);
            }
            "li" => {
                self.close_list_item(|n| n == "li");
                self.close_p_in_button_scope();
                self.insert_element(tag, true, sink);
            }
            "dd" | "dt" => {
                self.close_list_item(|n| n == "dd" || n == "dt");
                self.close_p_in_button_scope();
                self.insert_element(tag, true, sink);
            }
            "pre" | "listing" => {
                self.close_p_in_button_scope();
                self.insert_element(tag, true, sink);
                self.skip_newline = true;
            }
            name if rules::closes_p(name) || matches!(name, "form" | "plaintext") => {
                self.close_p_in_button_scope();
                self.insert_element(tag, true, sink);
            }
            name if rules::is_heading(name) => {
                self.close_p_in_button_scope();
                if self.open.current_name().is_some_and(rules::is_heading) {
                    self.parse_error(ParseErrorCode::UnexpectedStartTag, tag.pos);
                    self.open.pop();
                }
                self.insert_element(tag, true, sink);
            }
            "button" => {
                if self.open.has_in_scope("button", ScopeKind::InScope) {
                    self.parse_error(ParseErrorCode::UnexpectedStartTag, tag.pos);
                    self.generate_implied_end_tags(None);
                    self.open
                        .pop_until_including_in_scope(|n| n == "button", ScopeKind::InScope);
                }
                self.insert_element(tag, true, sink);
            }
            "hr" => {
                self.close_p_in_button_scope();
                self.insert_element(tag, false, sink);
            }
            "image" => {
                self.parse_error(ParseErrorCode::UnexpectedStartTag, tag.pos);
                let img = StartTag {
                    name: "img",
                    attrs: tag.attrs,
                    inert: tag.inert,
                    pos: tag.pos,
                };
                self.insert_element(&img, false, sink);
            }
            name if rules::is_void(name) => {
                self.insert_element(tag, false, sink);
            }
            "textarea" => {
                self.insert_raw_text(tag, sink);
                self.skip_newline = true;
            }
            "xmp" => {
                self.close_p_in_button_scope();
                self.insert_raw_text(tag, sink);
            }
            "iframe" | "noembed" => {
                self.insert_raw_text(tag, sink);
            }
            _ => {
                self.insert_element(tag, true, sink);
            }
        }
        Flow::Done
    }

    /// Shared `li`/`dd`/`dt` start tag walk: close the nearest open list item
    /// of the same family unless a special element other than `address`,
    /// `div` or `p` is in the way.
    fn close_list_item(&mut self, family: impl Fn(&str) -> bool) {
        for index in (0..self.open.len()).rev() {
            let Some(entry) = self.open.get(index) else {
                break;
            };
            let name = entry.name.clone();
            if family(&name) {
                self.generate_implied_end_tags(Some(&name));
                self.open.truncate(index);
                return;
            }
            if rules::is_special(&name) && !matches!(name.as_str(), "address" | "div" | "p") {
                return;
            }
        }
    }

    // --- end tags ---

    fn end_tag<S: TreeSink>(&mut self, name: &str, pos: SourcePos, sink: &mut S) -> Flow {
        let structural = matches!(name, "head" | "body" | "html" | "br");
        match self.mode {
            InsertionMode::Initial => {
                self.set_mode(InsertionMode::BeforeHtml);
                Flow::Reprocess
            }
            InsertionMode::BeforeHtml => {
                if !structural {
                    return self.ignore_end(pos);
                }
                self.insert_implied("html", pos, sink);
                self.set_mode(InsertionMode::BeforeHead);
                Flow::Reprocess
            }
            InsertionMode::BeforeHead => {
                if !structural {
                    return self.ignore_end(pos);
                }
                self.insert_head(&[], pos, sink);
                self.set_mode(InsertionMode::InHead);
                Flow::Reprocess
            }
            InsertionMode::InHead => match name {
                "head" => {
                    self.pop_head();
                    self.set_mode(InsertionMode::AfterHead);
                    Flow::Done
                }
                "body" | "html" | "br" => {
                    self.pop_head();
                    self.set_mode(InsertionMode::AfterHead);
                    Flow::Reprocess
                }
                _ => self.ignore_end(pos),
            },
            InsertionMode::AfterHead => {
                if !matches!(name, "body" | "html" | "br") {
                    return self.ignore_end(pos);
                }
                self.insert_implied("body", pos, sink);
                self.set_mode(InsertionMode::InBody);
                Flow::Reprocess
            }
            InsertionMode::InBody => self.in_body_end(name, pos, sink),
            InsertionMode::Text => self.text_end(name),
            InsertionMode::AfterBody => {
                if name == "html" {
                    self.set_mode(InsertionMode::AfterAfterBody);
                    return Flow::Done;
                }
                self.parse_error(ParseErrorCode::UnexpectedEndTag, pos);
                self.set_mode(InsertionMode::InBody);
                Flow::Reprocess
            }
            InsertionMode::AfterAfterBody => {
                self.parse_error(ParseErrorCode::UnexpectedEndTag, pos);
                self.set_mode(InsertionMode::InBody);
                Flow::Reprocess
            }
        }
    }

    fn ignore_end(&mut self, pos: SourcePos) -> Flow {
        self.parse_error(ParseErrorCode::UnexpectedEndTag, pos);
        Flow::Done
    }

    fn text_end(&mut self, name: &str) -> Flow {
        self.close_text_element();
        if name != "script" {
            return Flow::Done;
        }
        let Some(script) = self.script.take() else {
            return Flow::Done;
        };
        if script.blocking && self.config.scripting {
            return Flow::Suspend(PendingScript {
                node: script.node,
                src: script.src,
                text: script.text,
                pos: script.pos,
            });
        }
        Flow::Done
    }

    fn close_text_element(&mut self) {
        self.open.pop();
        let mode = self.original_mode.take().unwrap_or(InsertionMode::InBody);
        self.set_mode(mode);
    }

    fn in_body_end<S: TreeSink>(&mut self, name: &str, pos: SourcePos, sink: &mut S) -> Flow {
        match name {
            "body" | "html" => {
                if !self.open.has_in_scope("body", ScopeKind::InScope) {
                    return self.ignore_end(pos);
                }
                self.set_mode(InsertionMode::AfterBody);
                if name == "html" {
                    Flow::Reprocess
                } else {
                    Flow::Done
                }
            }
            "p" => {
                if !self.open.has_in_scope("p", ScopeKind::Button) {
                    self.parse_error(ParseErrorCode::UnexpectedEndTag, pos);
                    self.insert_implied("p", pos, sink);
                }
                self.close_p_in_button_scope();
                Flow::Done
            }
            "li" => {
                if !self.open.has_in_scope("li", ScopeKind::ListItem) {
                    return self.ignore_end(pos);
                }
                self.generate_implied_end_tags(Some("li"));
                self.open
                    .pop_until_including_in_scope(|n| n == "li", ScopeKind::ListItem);
                Flow::Done
            }
            "dd" | "dt" => {
                if !self.open.has_in_scope(name, ScopeKind::InScope) {
                    return self.ignore_end(pos);
                }
                self.generate_implied_end_tags(Some(name));
                self.open
                    .pop_until_including_in_scope(|n| n == name, ScopeKind::InScope);
                Flow::Done
            }
            "br" => {
                self.parse_error(ParseErrorCode::UnexpectedEndTag, pos);
                let br = StartTag {
                    name: "br",
                    attrs: &[],
                    inert: false,
                    pos,
                };
                self.insert_element(&br, false, sink);
                Flow::Done
            }
            name if rules::is_heading(name) => {
                if !self
                    .open
                    .has_any_in_scope(rules::is_heading, ScopeKind::InScope)
                {
                    return self.ignore_end(pos);
                }
                self.generate_implied_end_tags(None);
                self.open
                    .pop_until_including_in_scope(rules::is_heading, ScopeKind::InScope);
                Flow::Done
            }
            name if rules::is_block_end(name) => {
                if !self.open.has_in_scope(name, ScopeKind::InScope) {
                    return self.ignore_end(pos);
                }
                self.generate_implied_end_tags(None);
                self.open
                    .pop_until_including_in_scope(|n| n == name, ScopeKind::InScope);
                Flow::Done
            }
            _ => {
                self.any_other_end_tag(name, pos);
                Flow::Done
            }
        }
    }

    fn any_other_end_tag(&mut self, name: &str, pos: SourcePos) {
        for index in (0..self.open.len()).rev() {
            let Some(entry) = self.open.get(index) else {
                break;
            };
            if entry.name == name {
                self.generate_implied_end_tags(Some(name));
                self.open.truncate(index);
                return;
            }
            if rules::is_special(&entry.name) {
                break;
            }
        }
        self.parse_error(ParseErrorCode::UnexpectedEndTag, pos);
    }

    // --- end of file ---

    fn eof<S: TreeSink>(&mut self, pos: SourcePos, sink: &mut S) -> Flow {
        match self.mode {
            InsertionMode::Initial => {
                self.set_mode(InsertionMode::BeforeHtml);
                Flow::Reprocess
            }
            InsertionMode::BeforeHtml => {
                self.insert_implied("html", pos, sink);
                self.set_mode(InsertionMode::BeforeHead);
                Flow::Reprocess
            }
            InsertionMode::BeforeHead => {
                self.insert_head(&[], pos, sink);
                self.set_mode(InsertionMode::InHead);
                Flow::Reprocess
            }
            InsertionMode::InHead => {
                self.pop_head();
                self.set_mode(InsertionMode::AfterHead);
                Flow::Reprocess
            }
            InsertionMode::AfterHead => {
                self.insert_implied("body", pos, sink);
                self.set_mode(InsertionMode::InBody);
                Flow::Reprocess
            }
            InsertionMode::Text => {
                self.parse_error(ParseErrorCode::EofInText, pos);
                // A script cut off by EOF never runs.
                self.script = None;
                self.close_text_element();
                Flow::Reprocess
            }
            InsertionMode::InBody | InsertionMode::AfterBody | InsertionMode::AfterAfterBody => {
                let unclosed = self.open.names().any(|n| {
                    !rules::has_implied_end_tag(n) && !matches!(n, "body" | "html")
                });
                if unclosed {
                    self.parse_error(ParseErrorCode::UnclosedElements, pos);
                }
                Flow::Stop
            }
        }
    }
}

/// Whether a script element blocks the parser until it has run.
pub fn is_parser_blocking(attrs: &[CompactAttr]) -> bool {
    if !rules::is_classic_script_type(attr(attrs, "type")) {
        return false;
    }
    if has_attr(attrs, "async") {
        return false;
    }
    !(has_attr(attrs, "defer") && has_attr(attrs, "src"))
}
