//! Main-thread parse session.
//!
//! Owns the real document together with a tokenizer, its input and the tree
//! builder. In synchronous mode the session tokenizes network input itself;
//! in speculative mode it commits tokens that arrive pre-tokenized from the
//! worker and only tokenizes script-inserted text.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::dom::Document;
use crate::html5::compact::{CompactToken, compact_batch};
use crate::html5::filter::{ContentFilter, FilterReport, FilterVerdict, check_at};
use crate::html5::preload::ResourceRef;
use crate::html5::shared::{DocumentParseContext, InputStream, ParseError, SourcePos};
use crate::html5::tokenizer::{
    Html5Tokenizer, TokenizeResult, TokenizerConfig, TokenizerSnapshot,
};
use crate::html5::tree_builder::{
    Html5TreeBuilder, PendingScript, SimulatorState, TreeBuilderConfig, TreeBuilderStep,
};

/// Outcome of one session step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStep {
    /// One token was committed to the document.
    Committed,
    /// The tree builder reached a parser-blocking script.
    Suspended(PendingScript),
    /// The tokenizer has consumed all available input.
    NeedMoreInput,
    /// End of file was processed.
    Finished,
}

pub struct Html5ParseSession {
    ctx: DocumentParseContext,
    input: InputStream,
    tokenizer: Html5Tokenizer,
    builder: Html5TreeBuilder,
    document: Document,
    queue: VecDeque<CompactToken>,
    filter: Option<Arc<dyn ContentFilter>>,
    reports: Vec<FilterReport>,
}

impl Html5ParseSession {
    pub fn new(builder_config: TreeBuilderConfig) -> Self {
        Self {
            ctx: DocumentParseContext::new(),
            input: InputStream::new(),
            tokenizer: Html5Tokenizer::new(TokenizerConfig::default()),
            builder: Html5TreeBuilder::new(builder_config),
            document: Document::new(),
            queue: VecDeque::new(),
            filter: None,
            reports: Vec::new(),
        }
    }

    pub fn set_filter(&mut self, filter: Option<Arc<dyn ContentFilter>>) {
        self.filter = filter;
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn builder(&self) -> &Html5TreeBuilder {
        &self.builder
    }

    pub fn simulator_state(&self) -> SimulatorState {
        self.builder.simulator_state()
    }

    pub fn is_finished(&self) -> bool {
        self.builder.is_finished()
    }

    pub fn append(&mut self, text: &str) {
        self.input.append(text);
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.input.append_bytes(bytes);
    }

    pub fn mark_end_of_stream(&mut self) {
        self.input.mark_end_of_stream();
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.input.is_end_of_stream()
    }

    /// Open an insertion point right after the last consumed character.
    /// Called when a blocking script starts running.
    pub fn open_insertion_point(&mut self) {
        debug_assert!(self.queue.is_empty(), "insertion point opened mid-batch");
        self.input.set_insertion_point(Some(self.tokenizer.cursor()));
    }

    pub fn close_insertion_point(&mut self) {
        self.input.set_insertion_point(None);
    }

    /// Script-inserted text. Returns `false` when no insertion point is open.
    pub fn insert(&mut self, text: &str) -> bool {
        self.input.insert(text)
    }

    /// Restart tokenization from `snapshot` over `text`. Used to run
    /// script-inserted text through the main-thread tokenizer while network
    /// input is tokenized elsewhere.
    pub fn restart_tokenizer(&mut self, snapshot: TokenizerSnapshot, text: &str) {
        debug_assert!(self.queue.is_empty(), "tokenizer restarted with queued tokens");
        self.queue.clear();
        self.input = InputStream::from_text(text);
        self.tokenizer = Html5Tokenizer::from_snapshot(TokenizerConfig::default(), snapshot);
    }

    /// Position of the next character the tokenizer reads.
    pub fn position(&self) -> SourcePos {
        self.tokenizer.position()
    }

    pub fn tokenizer_snapshot(&self) -> TokenizerSnapshot {
        self.tokenizer.snapshot()
    }

    /// Input the tokenizer has not consumed yet, including text pinned as
    /// undecided lookahead. Only meaningful with no tokens queued.
    pub fn unconsumed(&self) -> &str {
        self.input
            .as_str()
            .get(self.tokenizer.cursor()..)
            .unwrap_or("")
    }

    /// Tokenize (if needed) and commit the next token.
    pub fn step(&mut self) -> SessionStep {
        if self.builder.is_finished() {
            return SessionStep::Finished;
        }
        if self.queue.is_empty() && !self.refill() {
            return SessionStep::NeedMoreInput;
        }
        let tokens = self.queue.make_contiguous();
        let verdict = match self.filter.as_deref() {
            Some(filter) => check_at(filter, tokens, 0),
            None => FilterVerdict::Pass,
        };
        let Some(token) = self.queue.pop_front() else {
            return SessionStep::NeedMoreInput;
        };
        apply_verdict(
            &mut self.builder,
            &mut self.document,
            &mut self.reports,
            &token,
            verdict,
        )
    }

    /// Commit a token tokenized elsewhere. `blocked` carries the filter's
    /// reason when the producer's filter check blocked it.
    pub fn commit(&mut self, token: &CompactToken, blocked: Option<&str>) -> SessionStep {
        if self.builder.is_finished() {
            return SessionStep::Finished;
        }
        let verdict = match blocked {
            Some(reason) => FilterVerdict::Block {
                reason: reason.to_string(),
            },
            None => FilterVerdict::Pass,
        };
        apply_verdict(
            &mut self.builder,
            &mut self.document,
            &mut self.reports,
            token,
            verdict,
        )
    }

    /// Run end-of-file processing without an EOF token. Idempotent.
    pub fn finish(&mut self) {
        let pos = self.tokenizer.position();
        self.builder.finish(pos, &mut self.document);
    }

    pub fn drain_fetches(&mut self) -> Vec<ResourceRef> {
        self.builder.drain_fetches()
    }

    pub fn take_reports(&mut self) -> Vec<FilterReport> {
        std::mem::take(&mut self.reports)
    }

    /// Tokenizer and tree-builder diagnostics since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<ParseError> {
        let mut out = self.ctx.take_errors();
        out.extend(self.builder.take_errors());
        out.sort_by_key(|e| e.pos);
        out
    }

    /// Tokenize until at least one token is queued or input runs out.
    /// Returns `false` when nothing could be produced.
    fn refill(&mut self) -> bool {
        while self.queue.is_empty() && !self.tokenizer.is_finished() {
            let exhausted =
                self.tokenizer.push_input(&mut self.input, &mut self.ctx) == TokenizeResult::NeedMoreInput;
            if exhausted && self.input.is_end_of_stream() {
                self.tokenizer.finish(&mut self.input, &mut self.ctx);
            }
            let batch = self.tokenizer.next_batch(&mut self.input);
            self.queue.extend(compact_batch(&batch, &self.ctx.atoms));
            drop(batch);
            if self.input.insertion_point().is_none() {
                self.tokenizer.compact_input(&mut self.input);
            }
            if exhausted && !self.tokenizer.is_finished() {
                break;
            }
        }
        !self.queue.is_empty()
    }
}

fn apply_verdict(
    builder: &mut Html5TreeBuilder,
    document: &mut Document,
    reports: &mut Vec<FilterReport>,
    token: &CompactToken,
    verdict: FilterVerdict,
) -> SessionStep {
    let step = match verdict {
        FilterVerdict::Pass => builder.process(token, document),
        FilterVerdict::Block { reason } => {
            log::debug!(target: "html5.session", "blocked token at {}: {reason}", token.pos);
            reports.push(FilterReport::new(token, &reason));
            builder.process_blocked(token, document)
        }
    };
    match step {
        TreeBuilderStep::Continue => SessionStep::Committed,
        TreeBuilderStep::Suspend(script) => SessionStep::Suspended(script),
        TreeBuilderStep::Finished => SessionStep::Finished,
    }
}
