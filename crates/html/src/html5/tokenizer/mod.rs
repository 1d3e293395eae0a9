//! HTML5 tokenizer public API.
//!
//! This is a streaming tokenizer: it consumes a decoded `InputStream` and emits
//! tokens in batches. The tokenizer is an explicit state machine and is
//! resumable at chunk boundaries.
//!
//! Invariants:
//! - Chunk-equivalence: feeding input in one chunk or many chunks yields the
//!   same token sequence, modulo where character runs are split.
//! - Self-driven raw text: after a `script`, `style`, `title`, `textarea`
//!   (and similar) start tag the tokenizer switches to the matching raw text
//!   state on its own, so tokenization is a pure function of
//!   (snapshot, input). No tree builder feedback is needed.
//! - Script pause: `push_input` returns right after an end tag that leaves
//!   script data, giving the caller a chance to run the script before
//!   anything after it is tokenized.
//! - Undecided lookahead (`<!-`, `</scr`, `&am`) is never consumed: the cursor
//!   stays pinned until more input or end of stream decides it.
//! - Span validity: token spans are only valid for the lifetime of the
//!   `TokenBatch` that resolved them, and must be resolved through the batch
//!   resolver.

use crate::entities::{self, ReferenceScan};
use crate::html5::shared::{
    DocumentParseContext, InputStream, ParseErrorCode, SourcePos, TextSpan, Token,
};
use emit::PendingText;
use input::{MatchResult, is_html_whitespace, is_tag_name_stop};
use snapshot::{PendingKind, PendingToken};

mod emit;
mod input;
mod snapshot;
mod states;

pub use snapshot::TokenizerSnapshot;
pub use states::{RawTextKind, TokenizerState};

/// Configuration for the tokenizer.
#[derive(Clone, Debug)]
pub struct TokenizerConfig {
    /// Emit an `EOF` token from `finish()`.
    pub emit_eof: bool,
    /// Stop `push_input` once this many tokens are buffered. The cursor then
    /// sits exactly at a token boundary.
    pub max_tokens_per_pump: Option<usize>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            emit_eof: true,
            max_tokens_per_pump: None,
        }
    }
}

/// Streaming tokenizer result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenizeResult {
    /// Progress was made and at least one token may be available.
    Progress,
    /// More input is required to continue.
    NeedMoreInput,
    /// EOF has been emitted and no further input will be consumed.
    EmittedEof,
}

/// Minimal tokenizer instrumentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenizerStats {
    pub steps: u64,
    pub state_transitions: u64,
    pub tokens_emitted: u64,
    pub budget_exhaustions: u64,
    pub script_pauses: u64,
}

/// Resolve text spans into `&str` for the current batch epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TextResolveError {
    #[error("invalid span {}..{}", span.start, span.end)]
    InvalidSpan { span: TextSpan },
}

pub trait TextResolver {
    fn resolve_span(&self, span: TextSpan) -> Result<&str, TextResolveError>;
}

/// Token batch bound to a single epoch.
///
/// Invariant: spans inside tokens are only valid for as long as this
/// `TokenBatch` exists (the batch holds an exclusive borrow of the input).
pub struct TokenBatch<'t> {
    tokens: Vec<Token>,
    positions: Vec<SourcePos>,
    input: &'t mut InputStream,
}

impl<'t> TokenBatch<'t> {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Tokens paired with the source position of their first character.
    pub fn iter_with_pos(&self) -> impl Iterator<Item = (&Token, SourcePos)> + '_ {
        self.tokens.iter().zip(self.positions.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn resolver(&self) -> impl TextResolver + '_ {
        InputResolver {
            input: &*self.input,
        }
    }
}

/// HTML5 tokenizer.
pub struct Html5Tokenizer {
    config: TokenizerConfig,
    state: TokenizerState,
    raw_kind: Option<RawTextKind>,
    cursor: usize,
    pos: SourcePos,
    tokens: Vec<Token>,
    positions: Vec<SourcePos>,
    pending: PendingToken,
    pending_text: Option<PendingText>,
    pause_requested: bool,
    input_id: Option<u64>,
    end_of_stream: bool,
    eof_emitted: bool,
    stats: TokenizerStats,
}

impl Html5Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        Self::from_snapshot(config, TokenizerSnapshot::initial())
    }

    /// Resume from `snapshot`. The restored tokenizer reads its next input
    /// from offset 0.
    pub fn from_snapshot(config: TokenizerConfig, snapshot: TokenizerSnapshot) -> Self {
        Self {
            config,
            state: snapshot.state,
            raw_kind: snapshot.raw_kind,
            cursor: 0,
            pos: snapshot.pos,
            tokens: Vec::new(),
            positions: Vec::new(),
            pending: snapshot.pending,
            pending_text: None,
            pause_requested: false,
            input_id: None,
            end_of_stream: false,
            eof_emitted: false,
            stats: TokenizerStats::default(),
        }
    }

    /// Capture the resumable state at the cursor.
    ///
    /// Only valid between pumps (character data is flushed at the end of
    /// every `push_input`).
    pub fn snapshot(&self) -> TokenizerSnapshot {
        debug_assert!(
            self.pending_text.is_none(),
            "snapshot taken with unflushed character data"
        );
        TokenizerSnapshot {
            state: self.state,
            raw_kind: self.raw_kind,
            pending: self.pending.clone(),
            pos: self.pos,
        }
    }

    /// Byte offset of the next unconsumed character in the bound input.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> TokenizerState {
        self.state
    }

    pub fn position(&self) -> SourcePos {
        self.pos
    }

    pub fn is_finished(&self) -> bool {
        self.eof_emitted
    }

    /// Consume decoded input and advance the tokenizer.
    ///
    /// The tokenizer processes available input until it needs more input,
    /// fills `max_tokens_per_pump`, or emits an end tag that leaves script
    /// data. Token spans refer to the decoded input buffer.
    pub fn push_input(
        &mut self,
        input: &mut InputStream,
        ctx: &mut DocumentParseContext,
    ) -> TokenizeResult {
        assert!(
            !self.end_of_stream,
            "Html5Tokenizer::push_input called after finish(); this violates end-of-stream contract"
        );
        self.bind(input);
        self.pump(input, ctx)
    }

    /// Mark end-of-stream, drain whatever is left and emit EOF.
    ///
    /// Lookahead that was waiting for more input is decided as if the input
    /// ended there. Unlike `push_input`, `finish` does not stop at script
    /// pauses; callers that need them must drain with `push_input` first.
    pub fn finish(
        &mut self,
        input: &mut InputStream,
        ctx: &mut DocumentParseContext,
    ) -> TokenizeResult {
        self.bind(input);
        self.end_of_stream = true;
        if self.eof_emitted {
            return TokenizeResult::EmittedEof;
        }
        while self.pump(input, ctx) == TokenizeResult::Progress {}
        self.flush_pending_text(input, ctx);
        if self.config.emit_eof {
            self.emit_token(Token::Eof, self.pos);
        }
        self.eof_emitted = true;
        TokenizeResult::EmittedEof
    }

    /// Drain the current batch of tokens and return a resolver bound to this epoch.
    ///
    /// Spans are valid for the lifetime of the returned `TokenBatch` (which holds
    /// an exclusive borrow of the input).
    pub fn next_batch<'t>(&mut self, input: &'t mut InputStream) -> TokenBatch<'t> {
        assert!(
            self.input_id.is_none() || self.input_id == Some(input.id()),
            "next_batch input must match the last push_input input"
        );
        let tokens = std::mem::take(&mut self.tokens);
        let positions = std::mem::take(&mut self.positions);
        TokenBatch {
            tokens,
            positions,
            input,
        }
    }

    /// Drop consumed input up to the cursor. Only legal with no batch or
    /// character run outstanding.
    pub fn compact_input(&mut self, input: &mut InputStream) -> usize {
        assert!(
            self.tokens.is_empty() && self.pending_text.is_none(),
            "compact_input called with live spans"
        );
        let removed = input.compact(self.cursor);
        self.cursor -= removed;
        removed
    }

    /// Return a copy of current instrumentation counters.
    pub fn stats(&self) -> TokenizerStats {
        self.stats
    }

    fn bind(&mut self, input: &InputStream) {
        if let Some(id) = self.input_id {
            assert_eq!(
                id,
                input.id(),
                "tokenizer is bound to a single InputStream instance"
            );
        } else {
            self.input_id = Some(input.id());
        }
    }

    fn pump(&mut self, input: &mut InputStream, ctx: &mut DocumentParseContext) -> TokenizeResult {
        ctx.counters.pumps = ctx.counters.pumps.saturating_add(1);
        let initial_token_count = self.tokens.len();
        let initial_cursor = self.cursor;
        let initial_state_transitions = self.stats.state_transitions;
        let mut remaining_budget = MAX_STEPS_PER_PUMP;
        let mut paused = false;

        while remaining_budget > 0 {
            remaining_budget -= 1;
            self.stats.steps = self.stats.steps.saturating_add(1);
            if self.step(input, ctx) == Step::NeedMoreInput {
                break;
            }
            if std::mem::take(&mut self.pause_requested) {
                self.stats.script_pauses = self.stats.script_pauses.saturating_add(1);
                paused = true;
                break;
            }
            if self
                .config
                .max_tokens_per_pump
                .is_some_and(|limit| self.tokens.len() >= limit)
            {
                break;
            }
        }

        if remaining_budget == 0 {
            self.stats.budget_exhaustions = self.stats.budget_exhaustions.saturating_add(1);
            #[cfg(any(test, feature = "debug-stats"))]
            log::trace!(
                target: "html5.tokenizer",
                "step budget exhausted in push_input: state={:?} cursor={} tokens={} (initial: cursor={} tokens={})",
                self.state,
                self.cursor,
                self.tokens.len(),
                initial_cursor,
                initial_token_count
            );
            let no_observable_progress = self.cursor == initial_cursor
                && self.tokens.len() == initial_token_count
                && self.stats.state_transitions == initial_state_transitions;
            assert!(
                !no_observable_progress,
                "tokenizer step budget exhausted without observable progress: state={:?} cursor={}",
                self.state, self.cursor
            );
        }

        self.flush_pending_text(input, ctx);
        ctx.counters.tokens_emitted = self.stats.tokens_emitted;

        let observable_progress = paused
            || self.cursor != initial_cursor
            || self.tokens.len() != initial_token_count
            || self.stats.state_transitions != initial_state_transitions;
        if observable_progress {
            TokenizeResult::Progress
        } else {
            TokenizeResult::NeedMoreInput
        }
    }

    fn transition_to(&mut self, next: TokenizerState) {
        if self.state == next {
            return;
        }
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "html5.tokenizer",
            "state {:?} -> {:?} @{}",
            self.state,
            next,
            self.cursor
        );
        self.state = next;
        self.stats.state_transitions = self.stats.state_transitions.saturating_add(1);
    }

    fn step(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) -> Step {
        self.assert_cursor_on_char_boundary(input);
        if !self.has_unconsumed_input(input) {
            return if self.end_of_stream {
                self.step_eof(ctx)
            } else {
                Step::NeedMoreInput
            };
        }
        match self.state {
            TokenizerState::Data => self.step_data(input, ctx),
            TokenizerState::RcData => self.step_raw(input, ctx, true),
            TokenizerState::RawText | TokenizerState::ScriptData => {
                self.step_raw(input, ctx, false)
            }
            TokenizerState::Plaintext => {
                self.begin_text();
                let len = self.rest(input).len();
                self.advance(input, len);
                Step::Progress
            }
            TokenizerState::TagOpen => self.step_tag_open(input, ctx),
            TokenizerState::EndTagOpen => self.step_end_tag_open(input, ctx),
            TokenizerState::TagName => self.step_tag_name(input, ctx),
            TokenizerState::BeforeAttributeName => self.step_before_attribute_name(input, ctx),
            TokenizerState::AttributeName => self.step_attribute_name(input, ctx),
            TokenizerState::AfterAttributeName => self.step_after_attribute_name(input, ctx),
            TokenizerState::BeforeAttributeValue => self.step_before_attribute_value(input, ctx),
            TokenizerState::AttributeValueDoubleQuoted => self.step_quoted_value(input, '"'),
            TokenizerState::AttributeValueSingleQuoted => self.step_quoted_value(input, '\''),
            TokenizerState::AttributeValueUnquoted => self.step_unquoted_value(input, ctx),
            TokenizerState::AfterAttributeValueQuoted => {
                self.step_after_attribute_value_quoted(input, ctx)
            }
            TokenizerState::SelfClosingStartTag => self.step_self_closing(input, ctx),
            TokenizerState::MarkupDeclarationOpen => self.step_markup_declaration_open(input),
            TokenizerState::Comment => self.step_comment(input),
            TokenizerState::BogusComment => self.step_bogus_comment(input),
            TokenizerState::Doctype => self.step_doctype(input, ctx),
        }
    }

    /// Input is exhausted and no more will come: close out the current state.
    fn step_eof(&mut self, ctx: &mut DocumentParseContext) -> Step {
        let pos = self.pending.pos;
        match self.state {
            TokenizerState::Data
            | TokenizerState::RcData
            | TokenizerState::RawText
            | TokenizerState::ScriptData
            | TokenizerState::Plaintext => return Step::NeedMoreInput,
            TokenizerState::TagOpen => {
                self.emit_text_owned("<", pos);
                self.pending = PendingToken::default();
            }
            TokenizerState::EndTagOpen => {
                self.emit_text_owned("</", pos);
                self.pending = PendingToken::default();
            }
            TokenizerState::TagName
            | TokenizerState::BeforeAttributeName
            | TokenizerState::AttributeName
            | TokenizerState::AfterAttributeName
            | TokenizerState::BeforeAttributeValue
            | TokenizerState::AttributeValueDoubleQuoted
            | TokenizerState::AttributeValueSingleQuoted
            | TokenizerState::AttributeValueUnquoted
            | TokenizerState::AfterAttributeValueQuoted
            | TokenizerState::SelfClosingStartTag => {
                self.report(ctx, ParseErrorCode::EofInTag, pos);
                self.pending = PendingToken::default();
            }
            TokenizerState::MarkupDeclarationOpen => {
                self.pending.begin(PendingKind::Comment);
                self.emit_comment();
                return Step::Progress;
            }
            TokenizerState::Comment => {
                self.report(ctx, ParseErrorCode::EofInComment, pos);
                self.emit_comment();
                return Step::Progress;
            }
            TokenizerState::BogusComment => {
                self.emit_comment();
                return Step::Progress;
            }
            TokenizerState::Doctype => {
                self.report(ctx, ParseErrorCode::EofInDoctype, pos);
                self.emit_doctype(ctx, true);
                return Step::Progress;
            }
        }
        self.transition_to(TokenizerState::Data);
        Step::Progress
    }

    fn step_data(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) -> Step {
        match self.peek(input) {
            Some('<') => {
                if self.pending_text.is_some() {
                    // Flush before touching `<` so the run ends exactly at the tag.
                    self.flush_pending_text(input, ctx);
                    return Step::Progress;
                }
                self.pending = PendingToken {
                    pos: self.pos,
                    ..PendingToken::default()
                };
                self.advance(input, 1);
                self.transition_to(TokenizerState::TagOpen);
                Step::Progress
            }
            Some('&') => self.consume_reference(input),
            Some(_) => {
                self.begin_text();
                let _ = self.consume_while(input, |ch| ch != '<' && ch != '&');
                Step::Progress
            }
            None => Step::NeedMoreInput,
        }
    }

    fn consume_reference(&mut self, input: &InputStream) -> Step {
        match entities::scan_reference(self.rest(input), self.end_of_stream) {
            ReferenceScan::Unit(len) => {
                self.begin_text();
                self.advance(input, len);
                Step::Progress
            }
            ReferenceScan::NeedMoreInput => Step::NeedMoreInput,
        }
    }

    /// RCDATA, RAWTEXT and script data: everything is text up to the end tag
    /// matching the element that opened the state.
    fn step_raw(
        &mut self,
        input: &InputStream,
        ctx: &mut DocumentParseContext,
        decode: bool,
    ) -> Step {
        match self.peek(input) {
            Some('<') => match self.match_appropriate_end_tag(input) {
                MatchResult::Matched => {
                    if self.pending_text.is_some() {
                        self.flush_pending_text(input, ctx);
                        return Step::Progress;
                    }
                    let Some(kind) = self.raw_kind.take() else {
                        self.transition_to(TokenizerState::Data);
                        return Step::Progress;
                    };
                    self.pending = PendingToken {
                        pos: self.pos,
                        ..PendingToken::default()
                    };
                    self.pending.begin(PendingKind::EndTag);
                    self.pending.name.push_str(kind.tag_name());
                    self.pending.closes_script = kind == RawTextKind::Script;
                    self.advance(input, kind.end_tag_prefix().len());
                    self.transition_to(TokenizerState::TagName);
                    Step::Progress
                }
                MatchResult::NeedMoreInput => Step::NeedMoreInput,
                MatchResult::NoMatch => {
                    self.begin_text();
                    self.advance(input, 1);
                    Step::Progress
                }
            },
            Some('&') if decode => self.consume_reference(input),
            Some(_) => {
                self.begin_text();
                let _ = self.consume_while(input, |ch| ch != '<' && !(decode && ch == '&'));
                Step::Progress
            }
            None => Step::NeedMoreInput,
        }
    }

    fn match_appropriate_end_tag(&self, input: &InputStream) -> MatchResult {
        let Some(kind) = self.raw_kind else {
            return MatchResult::NoMatch;
        };
        let prefix = kind.end_tag_prefix();
        match self.match_ascii_prefix_ci(input, prefix) {
            MatchResult::Matched => {}
            other => return other,
        }
        match self.rest(input)[prefix.len()..].chars().next() {
            Some(ch) if is_tag_name_stop(ch) => MatchResult::Matched,
            Some(_) => MatchResult::NoMatch,
            None if self.end_of_stream => MatchResult::NoMatch,
            None => MatchResult::NeedMoreInput,
        }
    }

    fn step_tag_open(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) -> Step {
        match self.peek(input) {
            Some('!') => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::MarkupDeclarationOpen);
            }
            Some('/') => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::EndTagOpen);
            }
            Some(ch) if ch.is_ascii_alphabetic() => {
                self.pending.begin(PendingKind::StartTag);
                self.transition_to(TokenizerState::TagName);
            }
            Some('?') => {
                self.report(
                    ctx,
                    ParseErrorCode::UnexpectedQuestionMarkInsteadOfTagName,
                    self.pending.pos,
                );
                self.pending.begin(PendingKind::Comment);
                self.transition_to(TokenizerState::BogusComment);
            }
            Some(_) => {
                // Not a tag: the `<` is character data, reprocess in Data.
                let pos = self.pending.pos;
                self.report(ctx, ParseErrorCode::InvalidFirstCharacterOfTagName, pos);
                self.pending = PendingToken::default();
                self.emit_text_owned("<", pos);
                self.transition_to(TokenizerState::Data);
            }
            None => return Step::NeedMoreInput,
        }
        Step::Progress
    }

    fn step_end_tag_open(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) -> Step {
        match self.peek(input) {
            Some(ch) if ch.is_ascii_alphabetic() => {
                self.pending.begin(PendingKind::EndTag);
                self.transition_to(TokenizerState::TagName);
            }
            Some('>') => {
                self.report(ctx, ParseErrorCode::MissingEndTagName, self.pending.pos);
                self.advance(input, 1);
                self.pending = PendingToken::default();
                self.transition_to(TokenizerState::Data);
            }
            Some(_) => {
                self.report(
                    ctx,
                    ParseErrorCode::InvalidFirstCharacterOfTagName,
                    self.pending.pos,
                );
                self.pending.begin(PendingKind::Comment);
                self.transition_to(TokenizerState::BogusComment);
            }
            None => return Step::NeedMoreInput,
        }
        Step::Progress
    }

    fn step_tag_name(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) -> Step {
        let (start, end) = self.consume_while(input, |ch| !is_tag_name_stop(ch));
        self.pending.name.push_str(&input.as_str()[start..end]);
        match self.peek(input) {
            Some('>') => {
                self.advance(input, 1);
                self.emit_tag(ctx);
            }
            Some('/') => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::SelfClosingStartTag);
            }
            Some(_) => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::BeforeAttributeName);
            }
            None if start == end => return Step::NeedMoreInput,
            None => {}
        }
        Step::Progress
    }

    fn step_before_attribute_name(
        &mut self,
        input: &InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        self.skip_whitespace(input);
        match self.peek(input) {
            Some('/') => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::SelfClosingStartTag);
            }
            Some('>') => {
                self.advance(input, 1);
                self.emit_tag(ctx);
            }
            Some('=') => {
                self.pending.start_attr();
                self.pending.attr_name_mut().push('=');
                self.advance(input, 1);
                self.transition_to(TokenizerState::AttributeName);
            }
            Some(_) => {
                self.pending.start_attr();
                self.transition_to(TokenizerState::AttributeName);
            }
            None => {}
        }
        Step::Progress
    }

    fn step_attribute_name(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) -> Step {
        let (start, end) = self.consume_while(input, |ch| {
            !(is_html_whitespace(ch) || ch == '/' || ch == '>' || ch == '=')
        });
        self.pending
            .attr_name_mut()
            .push_str(&input.as_str()[start..end]);
        match self.peek(input) {
            Some('/') => {
                self.pending.finish_attr();
                self.advance(input, 1);
                self.transition_to(TokenizerState::SelfClosingStartTag);
            }
            Some('>') => {
                self.advance(input, 1);
                self.emit_tag(ctx);
            }
            Some('=') => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::BeforeAttributeValue);
            }
            Some(_) => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::AfterAttributeName);
            }
            None if start == end => return Step::NeedMoreInput,
            None => {}
        }
        Step::Progress
    }

    fn step_after_attribute_name(
        &mut self,
        input: &InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        self.skip_whitespace(input);
        match self.peek(input) {
            Some('/') => {
                self.pending.finish_attr();
                self.advance(input, 1);
                self.transition_to(TokenizerState::SelfClosingStartTag);
            }
            Some('=') => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::BeforeAttributeValue);
            }
            Some('>') => {
                self.advance(input, 1);
                self.emit_tag(ctx);
            }
            Some(_) => {
                self.pending.start_attr();
                self.transition_to(TokenizerState::AttributeName);
            }
            None => {}
        }
        Step::Progress
    }

    fn step_before_attribute_value(
        &mut self,
        input: &InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        self.skip_whitespace(input);
        match self.peek(input) {
            Some('"') => {
                self.pending.attr_value_mut();
                self.advance(input, 1);
                self.transition_to(TokenizerState::AttributeValueDoubleQuoted);
            }
            Some('\'') => {
                self.pending.attr_value_mut();
                self.advance(input, 1);
                self.transition_to(TokenizerState::AttributeValueSingleQuoted);
            }
            Some('>') => {
                self.pending.attr_value_mut();
                self.advance(input, 1);
                self.emit_tag(ctx);
            }
            Some(_) => {
                self.pending.attr_value_mut();
                self.transition_to(TokenizerState::AttributeValueUnquoted);
            }
            None => {}
        }
        Step::Progress
    }

    fn step_quoted_value(&mut self, input: &InputStream, quote: char) -> Step {
        let (start, end) = self.consume_while(input, |ch| ch != quote);
        self.pending
            .attr_value_mut()
            .push_str(&input.as_str()[start..end]);
        if self.peek(input) == Some(quote) {
            self.advance(input, 1);
            self.pending.finish_attr();
            self.transition_to(TokenizerState::AfterAttributeValueQuoted);
            return Step::Progress;
        }
        if start == end {
            Step::NeedMoreInput
        } else {
            Step::Progress
        }
    }

    fn step_unquoted_value(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) -> Step {
        let (start, end) = self.consume_while(input, |ch| !is_html_whitespace(ch) && ch != '>');
        self.pending
            .attr_value_mut()
            .push_str(&input.as_str()[start..end]);
        match self.peek(input) {
            Some('>') => {
                self.advance(input, 1);
                self.emit_tag(ctx);
            }
            Some(_) => {
                self.advance(input, 1);
                self.pending.finish_attr();
                self.transition_to(TokenizerState::BeforeAttributeName);
            }
            None if start == end => return Step::NeedMoreInput,
            None => {}
        }
        Step::Progress
    }

    fn step_after_attribute_value_quoted(
        &mut self,
        input: &InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        match self.peek(input) {
            Some('/') => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::SelfClosingStartTag);
            }
            Some('>') => {
                self.advance(input, 1);
                self.emit_tag(ctx);
            }
            Some(ch) if is_html_whitespace(ch) => {
                self.advance(input, 1);
                self.transition_to(TokenizerState::BeforeAttributeName);
            }
            Some(_) => self.transition_to(TokenizerState::BeforeAttributeName),
            None => return Step::NeedMoreInput,
        }
        Step::Progress
    }

    fn step_self_closing(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) -> Step {
        match self.peek(input) {
            Some('>') => {
                self.advance(input, 1);
                self.pending.self_closing = true;
                self.emit_tag(ctx);
            }
            Some(_) => self.transition_to(TokenizerState::BeforeAttributeName),
            None => return Step::NeedMoreInput,
        }
        Step::Progress
    }

    fn step_markup_declaration_open(&mut self, input: &InputStream) -> Step {
        match self.match_ascii_prefix(input, b"--") {
            MatchResult::Matched => {
                self.advance(input, 2);
                self.pending.begin(PendingKind::Comment);
                self.transition_to(TokenizerState::Comment);
                return Step::Progress;
            }
            MatchResult::NeedMoreInput => return Step::NeedMoreInput,
            MatchResult::NoMatch => {}
        }
        match self.match_ascii_prefix_ci(input, b"DOCTYPE") {
            MatchResult::Matched => {
                self.advance(input, "DOCTYPE".len());
                self.pending.begin(PendingKind::Doctype);
                self.transition_to(TokenizerState::Doctype);
            }
            MatchResult::NeedMoreInput => return Step::NeedMoreInput,
            MatchResult::NoMatch => {
                self.pending.begin(PendingKind::Comment);
                self.transition_to(TokenizerState::BogusComment);
            }
        }
        Step::Progress
    }

    fn step_comment(&mut self, input: &InputStream) -> Step {
        let rest = self.rest(input);
        if self.pending.comment_start {
            // `<!-->` and `<!--->` close an empty comment.
            for abrupt in [">", "->"] {
                if rest.starts_with(abrupt) {
                    self.advance(input, abrupt.len());
                    self.emit_comment();
                    return Step::Progress;
                }
            }
            if rest == "-" && !self.end_of_stream {
                return Step::NeedMoreInput;
            }
        }
        if let Some(end) = memchr::memmem::find(rest.as_bytes(), b"-->") {
            self.pending.data.push_str(&rest[..end]);
            self.advance(input, end + 3);
            self.emit_comment();
            return Step::Progress;
        }
        // Hold back trailing dashes that may begin the closing `-->`.
        let held = if self.end_of_stream {
            0
        } else {
            rest.bytes().rev().take(2).take_while(|b| *b == b'-').count()
        };
        let take = rest.len() - held;
        if take == 0 {
            return Step::NeedMoreInput;
        }
        self.pending.data.push_str(&rest[..take]);
        self.pending.comment_start = false;
        self.advance(input, take);
        Step::Progress
    }

    fn step_bogus_comment(&mut self, input: &InputStream) -> Step {
        let (start, end) = self.consume_while(input, |ch| ch != '>');
        self.pending.data.push_str(&input.as_str()[start..end]);
        if self.peek(input) == Some('>') {
            self.advance(input, 1);
            self.emit_comment();
        }
        Step::Progress
    }

    fn step_doctype(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) -> Step {
        let (start, end) = self.consume_while(input, |ch| ch != '>');
        self.pending.data.push_str(&input.as_str()[start..end]);
        if self.peek(input) == Some('>') {
            self.advance(input, 1);
            self.emit_doctype(ctx, false);
        }
        Step::Progress
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Progress,
    NeedMoreInput,
}

const MAX_STEPS_PER_PUMP: usize = 16_384;

struct InputResolver<'t> {
    input: &'t InputStream,
}

impl<'t> TextResolver for InputResolver<'t> {
    fn resolve_span(&self, span: TextSpan) -> Result<&str, TextResolveError> {
        let text = self.input.as_str();
        if !(span.start <= span.end
            && span.end <= text.len()
            && text.is_char_boundary(span.start)
            && text.is_char_boundary(span.end))
        {
            return Err(TextResolveError::InvalidSpan { span });
        }
        Ok(&text[span.start..span.end])
    }
}

#[cfg(test)]
mod tests;
