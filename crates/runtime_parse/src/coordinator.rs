//! Main-thread parser.
//!
//! The coordinator owns the document. In speculative mode it commits tokens
//! from worker chunks and only tokenizes script output itself; in
//! synchronous mode it tokenizes network input too. After every parser-
//! blocking script it checks whether the worker's prediction still holds,
//! and if not, throws the buffered chunks away and restarts the worker from
//! a checkpoint of its own state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use bus::{Checkpoint, Chunk, ChunkEnd, InputCheckpoint, Revocation, WorkerEvent};
use core_types::{Generation, ParserId};
use html::html5::{
    FilterReport, Html5ParseSession, ParseError, PendingScript, PreloadDedup, PreloadRequest,
    PreloadScanner, SessionStep, SimulatorState, SourcePos, TokenizerSnapshot, TreeBuilderConfig,
};
use html::{Document, Node};
use serde::Serialize;
use tools::Utf8StreamDecoder;

use crate::config::ParserConfig;
use crate::error::PipelineError;
use crate::host::{
    Collaborators, ParseObserver, ResourceLoader, ScriptContext, ScriptHost, ScriptOutcome,
};
use crate::scheduler::{PumpSession, Scheduler};
use crate::stats::PipelineStats;
use crate::worker::{BackgroundWorker, WorkerConfig, WorkerHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    Uninitialized,
    Running,
    WaitingForScript,
    Stopping,
    Stopped,
    Detached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PumpStatus {
    /// The budget ran out; a resumption was scheduled.
    Yielded,
    WaitingForScript,
    /// Suspended by the embedder.
    Suspended,
    /// Waiting for the worker.
    AwaitingChunks,
    /// Everything received so far is parsed.
    NeedsInput,
    Finished,
    Stopped,
}

/// Where the running script was reached.
#[derive(Debug)]
enum ScriptOrigin {
    /// Last token of a worker chunk.
    Chunk(ChunkEnd),
    /// Text the coordinator tokenized itself.
    Session,
}

enum Advance {
    Committed(usize),
    Blocked(PumpStatus),
}

struct WorkerGone;

/// Coordinator-side state of the worker pipeline.
struct Speculation {
    worker: Option<WorkerHandle>,
    events: Option<Receiver<WorkerEvent>>,
    revoked: Revocation,
    generation: Generation,
    awaiting_resume: bool,
    buffered: VecDeque<Chunk>,
    buffered_tokens: usize,
    current: Option<Chunk>,
    cursor: usize,
    /// Set while script output is tokenized here: the chunk end worker
    /// speculation continues from.
    inserted: Option<ChunkEnd>,
    /// `unconsumed` of the last checkpoint.
    carried_text: String,
    network_sent: usize,
    /// Network length the worker had seen when it last ran dry.
    worker_idle: Option<usize>,
}

impl Speculation {
    fn new(worker: WorkerHandle, events: Receiver<WorkerEvent>, revoked: Revocation) -> Self {
        Self {
            worker: Some(worker),
            events: Some(events),
            revoked,
            generation: Generation::default(),
            awaiting_resume: false,
            buffered: VecDeque::new(),
            buffered_tokens: 0,
            current: None,
            cursor: 0,
            inserted: None,
            carried_text: String::new(),
            network_sent: 0,
            worker_idle: None,
        }
    }

    fn current_exhausted(&self) -> bool {
        self.current
            .as_ref()
            .is_none_or(|chunk| self.cursor >= chunk.len())
    }

    fn take_next_chunk(&mut self) -> Option<Chunk> {
        let chunk = self.buffered.pop_front()?;
        self.buffered_tokens = self.buffered_tokens.saturating_sub(chunk.len());
        Some(chunk)
    }

    /// A chunk ending in a blocking script is next in line.
    fn script_chunk_is_next(&self) -> bool {
        self.inserted.is_none()
            && self.current_exhausted()
            && self.buffered.front().is_some_and(|c| c.ends_in_script)
    }

    /// The last `carried` bytes of the last checkpoint's text.
    fn carried_tail(&self, carried: usize) -> &str {
        let start = self.carried_text.len().saturating_sub(carried);
        self.carried_text.get(start..).unwrap_or("")
    }

    /// Drop all buffered speculation. Returns the number of chunks dropped.
    fn discard(&mut self) -> usize {
        let current = usize::from(!self.current_exhausted());
        let dropped = self.buffered.len() + current;
        self.buffered.clear();
        self.buffered_tokens = 0;
        self.current = None;
        self.cursor = 0;
        self.inserted = None;
        dropped
    }

    fn idle_status(&self, end_of_stream: bool) -> PumpStatus {
        if !end_of_stream && !self.awaiting_resume && self.worker_idle == Some(self.network_sent)
        {
            PumpStatus::NeedsInput
        } else {
            PumpStatus::AwaitingChunks
        }
    }
}

pub struct Coordinator {
    id: ParserId,
    config: ParserConfig,
    lifecycle: Lifecycle,
    session: Html5ParseSession,
    speculation: Option<Speculation>,
    scheduler: Scheduler,
    script_host: Box<dyn ScriptHost>,
    loader: Box<dyn ResourceLoader>,
    observers: Vec<Arc<dyn ParseObserver>>,
    scanner: PreloadScanner,
    dedup: PreloadDedup,
    decoder: Utf8StreamDecoder,
    end_of_stream: bool,
    finished: bool,
    origin: Option<ScriptOrigin>,
    pending_writes: String,
    pump_depth: u32,
    script_nesting_level: u32,
    last_pos: SourcePos,
    reports: Vec<FilterReport>,
    diagnostics: Vec<ParseError>,
    stats: PipelineStats,
}

impl Coordinator {
    pub fn new(config: ParserConfig, collaborators: Collaborators) -> Result<Self, PipelineError> {
        config.validate()?;
        static NEXT_PARSER: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_PARSER.fetch_add(1, Ordering::Relaxed);
        let Collaborators {
            script_host,
            loader,
            filter,
            observers,
            wake,
        } = collaborators;

        let mut session = Html5ParseSession::new(TreeBuilderConfig {
            scripting: config.scripting,
        });
        session.set_filter(filter.clone());

        let speculation = if config.speculative {
            let (events_tx, events_rx) = mpsc::sync_channel(config.channel_capacity);
            let revoked = Revocation::new();
            let worker = BackgroundWorker::start(
                WorkerConfig {
                    parser: id,
                    chunk_token_limit: config.chunk_token_limit,
                    document_url: config.document_url.clone(),
                    preload: config.preload,
                    scripting: config.scripting,
                    filter,
                },
                String::new(),
                events_tx,
                revoked.clone(),
                wake.clone(),
            )
            .map_err(PipelineError::Spawn)?;
            Some(Speculation::new(worker, events_rx, revoked))
        } else {
            None
        };
        log::debug!(
            target: "parse.coordinator",
            "parser {id} created ({})",
            if config.speculative { "speculative" } else { "synchronous" }
        );

        Ok(Self {
            id,
            scanner: PreloadScanner::new(config.document_url.as_deref()),
            scheduler: Scheduler::new(config.scheduler.clone(), wake),
            config,
            lifecycle: Lifecycle::Uninitialized,
            session,
            speculation,
            script_host,
            loader,
            observers,
            dedup: PreloadDedup::new(),
            decoder: Utf8StreamDecoder::new(),
            end_of_stream: false,
            finished: false,
            origin: None,
            pending_writes: String::new(),
            pump_depth: 0,
            script_nesting_level: 0,
            last_pos: SourcePos::START,
            reports: Vec::new(),
            diagnostics: Vec::new(),
            stats: PipelineStats::default(),
        })
    }

    pub fn id(&self) -> ParserId {
        self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_speculative(&self) -> bool {
        self.speculation.is_some()
    }

    /// Current speculation generation. Always zero in synchronous mode.
    pub fn generation(&self) -> Generation {
        self.speculation
            .as_ref()
            .map_or(Generation::default(), |s| s.generation)
    }

    /// Chunks received but not started yet.
    pub fn buffered_chunks(&self) -> usize {
        self.speculation.as_ref().map_or(0, |s| s.buffered.len())
    }

    pub fn script_nesting_level(&self) -> u32 {
        self.script_nesting_level
    }

    pub fn document(&self) -> &Document {
        self.session.document()
    }

    pub fn dom(&self) -> Node {
        self.session.document().to_node()
    }

    pub fn take_filter_reports(&mut self) -> Vec<FilterReport> {
        std::mem::take(&mut self.reports)
    }

    pub fn diagnostics(&self) -> &[ParseError] {
        &self.diagnostics
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Feed decoded network text.
    pub fn append_input(&mut self, text: &str) {
        if self.is_terminal() {
            return self.misuse("append_input after stop");
        }
        if self.end_of_stream {
            return self.misuse("append_input after end of stream");
        }
        self.start_if_needed();
        self.feed(text);
    }

    /// Feed network bytes. A UTF-8 sequence split across calls is carried
    /// over.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        if self.is_terminal() {
            return self.misuse("append_bytes after stop");
        }
        if self.end_of_stream {
            return self.misuse("append_bytes after end of stream");
        }
        self.start_if_needed();
        let mut text = String::new();
        self.decoder.decode(bytes, &mut text);
        self.feed(&text);
    }

    /// No more network input. Calling it again has no effect.
    pub fn mark_end_of_stream(&mut self) {
        if self.end_of_stream {
            return;
        }
        if self.is_terminal() {
            return self.misuse("mark_end_of_stream after stop");
        }
        self.start_if_needed();
        let mut tail = String::new();
        self.decoder.finish(&mut tail);
        self.feed(&tail);
        self.end_of_stream = true;
        if self.lifecycle == Lifecycle::Running {
            self.lifecycle = Lifecycle::Stopping;
        }
        let Some(pipe) = self.speculation.as_ref() else {
            self.session.mark_end_of_stream();
            return;
        };
        let sent = pipe.worker.as_ref().map(|w| w.mark_end_of_stream());
        if !matches!(sent, Some(Ok(()))) {
            self.worker_lost();
        }
    }

    /// Script output. Only valid while a blocking script runs; the text is
    /// parsed at the insertion point once the script completes.
    pub fn insert(&mut self, text: &str) {
        if self.lifecycle != Lifecycle::WaitingForScript {
            return self.misuse("insert outside script execution");
        }
        self.pending_writes.push_str(text);
    }

    pub fn suspend(&mut self) {
        self.scheduler.suspend();
    }

    pub fn resume(&mut self) {
        self.scheduler.resume();
    }

    /// Parse until the budget runs out or the parser blocks.
    pub fn pump(&mut self) -> PumpStatus {
        if self.finished {
            return PumpStatus::Finished;
        }
        match self.lifecycle {
            Lifecycle::Stopped | Lifecycle::Detached => return PumpStatus::Stopped,
            Lifecycle::Uninitialized => return PumpStatus::NeedsInput,
            _ => {}
        }
        if self.pump_depth > 0 {
            log::warn!(target: "parse.coordinator", "re-entrant pump ignored");
            return PumpStatus::Yielded;
        }
        self.pump_depth += 1;
        let mut session = self.scheduler.begin_session();
        let status = self.pump_loop(&mut session);
        self.pump_depth -= 1;
        if session.tokens() > 0 {
            for observer in &self.observers {
                observer.tokens_processed(session.tokens());
            }
        }
        self.collect_diagnostics();
        status
    }

    /// Called once per script that returned `ScriptOutcome::Pending`, when
    /// it is done. Scripts that complete inside `ScriptHost::execute` resume
    /// on their own.
    pub fn resume_after_script_execution(&mut self) {
        if self.lifecycle != Lifecycle::WaitingForScript {
            return self.misuse("resume_after_script_execution without a running script");
        }
        self.lifecycle = if self.end_of_stream {
            Lifecycle::Stopping
        } else {
            Lifecycle::Running
        };
        let writes = std::mem::take(&mut self.pending_writes);
        if !writes.is_empty() && self.config.preload {
            for request in self.scanner.scan_text(&writes) {
                issue(&mut self.dedup, self.loader.as_mut(), &mut self.stats, request);
            }
        }
        match self.origin.take() {
            Some(ScriptOrigin::Chunk(end)) => self.resume_speculation(end, writes),
            Some(ScriptOrigin::Session) | None => {
                if !writes.is_empty() {
                    self.session.open_insertion_point();
                    self.session.insert(&writes);
                    self.session.close_insertion_point();
                }
            }
        }
        self.scheduler.schedule_resumption();
    }

    /// Abort: drop buffered chunks, revoke and join the worker. The
    /// document stays as it is.
    pub fn stop(&mut self) {
        self.terminate(Lifecycle::Stopped);
    }

    pub fn detach(&mut self) {
        self.terminate(Lifecycle::Detached);
    }

    fn terminate(&mut self, terminal: Lifecycle) {
        if self.is_terminal() {
            return;
        }
        let discarded = self.shut_down_worker();
        self.pending_writes.clear();
        self.origin = None;
        self.lifecycle = terminal;
        log::debug!(
            target: "parse.coordinator",
            "parser {} {terminal:?} with {discarded} chunks buffered",
            self.id
        );
    }

    fn is_terminal(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Stopped | Lifecycle::Detached)
    }

    fn misuse(&self, what: &str) {
        debug_assert!(false, "{what} (lifecycle {:?})", self.lifecycle);
        log::warn!(
            target: "parse.coordinator",
            "{what} ignored (lifecycle {:?})",
            self.lifecycle
        );
    }

    fn start_if_needed(&mut self) {
        if self.lifecycle != Lifecycle::Uninitialized {
            return;
        }
        self.lifecycle = Lifecycle::Running;
        for observer in &self.observers {
            observer.parse_started(1);
        }
    }

    fn feed(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let Some(pipe) = self.speculation.as_mut() else {
            self.session.append(text);
            return;
        };
        pipe.network_sent += text.len();
        pipe.worker_idle = None;
        let sent = pipe.worker.as_ref().map(|w| w.append_input(text.to_string()));
        if !matches!(sent, Some(Ok(()))) {
            self.worker_lost();
        }
    }

    fn pump_loop(&mut self, session: &mut PumpSession) -> PumpStatus {
        loop {
            if self.finished {
                return PumpStatus::Finished;
            }
            if self.receive().is_err() {
                return self.worker_lost();
            }
            if self.lifecycle == Lifecycle::WaitingForScript {
                return PumpStatus::WaitingForScript;
            }
            if self.scheduler.is_suspended() {
                return PumpStatus::Suspended;
            }
            let urgent = self
                .speculation
                .as_ref()
                .is_some_and(Speculation::script_chunk_is_next);
            if self.scheduler.yield_if_needed(session, urgent) {
                self.stats.yields += 1;
                return PumpStatus::Yielded;
            }
            match self.advance() {
                Advance::Committed(tokens) => session.record(tokens),
                Advance::Blocked(status) => return status,
            }
        }
    }

    /// Move worker events into the buffer while backpressure allows.
    fn receive(&mut self) -> Result<(), WorkerGone> {
        let Some(pipe) = self.speculation.as_mut() else {
            return Ok(());
        };
        loop {
            if !pipe.awaiting_resume && !self.scheduler.should_accept(pipe.buffered_tokens) {
                return Ok(());
            }
            let Some(events) = pipe.events.as_ref() else {
                return Ok(());
            };
            let event = match events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(WorkerGone),
            };
            match event {
                WorkerEvent::Chunk(chunk) => {
                    if chunk.generation != pipe.generation || pipe.awaiting_resume {
                        self.stats.stale_chunks_dropped += 1;
                        continue;
                    }
                    self.stats.chunks_received += 1;
                    for request in &chunk.preloads {
                        issue(
                            &mut self.dedup,
                            self.loader.as_mut(),
                            &mut self.stats,
                            request.clone(),
                        );
                    }
                    pipe.buffered_tokens += chunk.len();
                    pipe.buffered.push_back(chunk);
                }
                WorkerEvent::Resumed { generation } => {
                    if generation == pipe.generation {
                        pipe.awaiting_resume = false;
                    }
                }
                WorkerEvent::Idle {
                    generation,
                    network_len,
                } => {
                    if generation == pipe.generation && !pipe.awaiting_resume {
                        pipe.worker_idle = Some(network_len);
                    }
                }
                WorkerEvent::Stopped => {
                    log::debug!(target: "parse.coordinator", "worker for parser {} stopped", self.id);
                }
            }
        }
    }

    fn advance(&mut self) -> Advance {
        match self.speculation.as_ref() {
            None => self.advance_session(),
            Some(pipe) if pipe.inserted.is_some() => self.advance_session(),
            Some(_) => self.advance_chunk(),
        }
    }

    /// Commit one token the session tokenizes: network input in synchronous
    /// mode, script output in speculative mode.
    fn advance_session(&mut self) -> Advance {
        match self.session.step() {
            SessionStep::Committed => {
                self.after_commit(self.session.position());
                Advance::Committed(1)
            }
            SessionStep::Suspended(script) => {
                self.after_commit(script.pos);
                self.run_script(script, ScriptOrigin::Session)
            }
            SessionStep::NeedMoreInput => {
                if self.speculation.is_some() {
                    self.validate_inserted();
                    Advance::Committed(0)
                } else {
                    Advance::Blocked(PumpStatus::NeedsInput)
                }
            }
            SessionStep::Finished => {
                self.finalize();
                Advance::Blocked(PumpStatus::Finished)
            }
        }
    }

    /// Commit the next token of the current worker chunk.
    fn advance_chunk(&mut self) -> Advance {
        let end_of_stream = self.end_of_stream;
        let Some(pipe) = self.speculation.as_mut() else {
            return Advance::Blocked(PumpStatus::Stopped);
        };
        if pipe.awaiting_resume {
            return Advance::Blocked(PumpStatus::AwaitingChunks);
        }
        if pipe.current_exhausted() {
            let Some(mut chunk) = pipe.take_next_chunk() else {
                return Advance::Blocked(pipe.idle_status(end_of_stream));
            };
            self.diagnostics.append(&mut chunk.diagnostics);
            pipe.current = Some(chunk);
            pipe.cursor = 0;
        }
        let Some(chunk) = pipe.current.as_ref() else {
            return Advance::Committed(0);
        };
        let index = pipe.cursor;
        let Some(token) = chunk.tokens.get(index) else {
            return Advance::Committed(0);
        };
        pipe.cursor += 1;
        let step = self.session.commit(token, chunk.blocked_reason(index));
        let pos = token.pos;
        let end = match &step {
            SessionStep::Suspended(_) => {
                debug_assert_eq!(
                    index + 1,
                    chunk.len(),
                    "parser-blocking script in the middle of a chunk"
                );
                Some(chunk.end.clone())
            }
            _ => None,
        };
        self.after_commit(pos);
        match (step, end) {
            (SessionStep::Suspended(script), Some(end)) => {
                self.run_script(script, ScriptOrigin::Chunk(end))
            }
            (SessionStep::Finished, _) => {
                self.finalize();
                Advance::Blocked(PumpStatus::Finished)
            }
            _ => Advance::Committed(1),
        }
    }

    fn after_commit(&mut self, pos: SourcePos) {
        self.stats.tokens_committed += 1;
        self.last_pos = pos;
        let fetches = self.session.drain_fetches();
        if self.config.preload {
            for reference in fetches {
                let request = self.scanner.request_for(&reference, pos);
                issue(&mut self.dedup, self.loader.as_mut(), &mut self.stats, request);
            }
        }
        for report in self.session.take_reports() {
            self.stats.filtered_tokens += 1;
            for observer in &self.observers {
                observer.content_blocked(&report);
            }
            self.reports.push(report);
        }
    }

    fn run_script(&mut self, script: PendingScript, origin: ScriptOrigin) -> Advance {
        self.lifecycle = Lifecycle::WaitingForScript;
        self.origin = Some(origin);
        self.script_nesting_level += 1;
        self.stats.scripts_executed += 1;
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "parse.coordinator",
            "running script at {} (nesting {})",
            script.pos,
            self.script_nesting_level
        );
        let mut context = ScriptContext::new(self.script_nesting_level);
        let outcome = self.script_host.execute(&script, &mut context);
        self.pending_writes.push_str(&context.into_writes());
        self.script_nesting_level -= 1;
        match outcome {
            ScriptOutcome::Completed => {
                self.resume_after_script_execution();
                Advance::Committed(0)
            }
            ScriptOutcome::Pending => Advance::Blocked(PumpStatus::WaitingForScript),
        }
    }

    /// After a script reached from a chunk: keep the buffered chunks if the
    /// worker's prediction holds, otherwise rewind.
    fn resume_speculation(&mut self, end: ChunkEnd, writes: String) {
        if writes.is_empty() {
            let state = self.session.simulator_state();
            if state == end.simulator {
                self.stats.speculation_hits += 1;
                return;
            }
            let carried = match self.speculation.as_ref() {
                Some(pipe) => pipe.carried_tail(end.input.carried).to_string(),
                None => return,
            };
            self.rewind(end.tokenizer, state, end.input.network_offset, carried);
            return;
        }
        self.session.restart_tokenizer(end.tokenizer.clone(), &writes);
        if let Some(pipe) = self.speculation.as_mut() {
            pipe.inserted = Some(end);
        }
    }

    /// All script output has been tokenized. Speculation survives if the
    /// tokenizer came back to the state the worker continued from, nothing
    /// is left over, and the tree builder is where the simulator said.
    fn validate_inserted(&mut self) {
        let Some(pipe) = self.speculation.as_mut() else {
            return;
        };
        let Some(end) = pipe.inserted.take() else {
            return;
        };
        let snapshot = self.session.tokenizer_snapshot();
        let state = self.session.simulator_state();
        let leftover = self.session.unconsumed();
        if snapshot.continues_like(&end.tokenizer) && leftover.is_empty() && state == end.simulator
        {
            self.stats.speculation_hits += 1;
            return;
        }
        let mut unconsumed = leftover.to_string();
        unconsumed.push_str(pipe.carried_tail(end.input.carried));
        self.rewind(snapshot, state, end.input.network_offset, unconsumed);
    }

    fn rewind(
        &mut self,
        tokenizer: TokenizerSnapshot,
        simulator: SimulatorState,
        network_offset: usize,
        unconsumed: String,
    ) {
        let Some(pipe) = self.speculation.as_mut() else {
            return;
        };
        let discarded = pipe.discard();
        pipe.generation = pipe.generation.next();
        pipe.awaiting_resume = true;
        pipe.worker_idle = None;
        pipe.carried_text = unconsumed.clone();
        log::debug!(
            target: "parse.coordinator",
            "speculation mismatch at {}: discarded {discarded} chunks, resuming generation {} at network offset {network_offset}",
            self.last_pos,
            pipe.generation.0
        );
        let checkpoint = Checkpoint {
            generation: pipe.generation,
            tokenizer,
            simulator,
            input: InputCheckpoint {
                network_offset,
                carried: unconsumed.len(),
            },
            unconsumed,
        };
        let sent = pipe.worker.as_ref().map(|w| w.resume_from(checkpoint));
        self.stats.rewinds += 1;
        self.stats.speculation_discards += discarded as u64;
        for observer in &self.observers {
            observer.speculation_discarded(discarded);
        }
        if !matches!(sent, Some(Ok(()))) {
            self.worker_lost();
        }
    }

    /// Idempotent.
    fn finalize(&mut self) {
        if self.finished {
            return;
        }
        self.session.finish();
        self.finished = true;
        self.collect_diagnostics();
        self.diagnostics.sort_by_key(|d| d.pos);
        let line = if self.speculation.is_some() {
            self.last_pos.line
        } else {
            self.session.position().line
        };
        self.shut_down_worker();
        self.lifecycle = Lifecycle::Stopped;
        log::debug!(target: "parse.coordinator", "parser {} finished at line {line}", self.id);
        for observer in &self.observers {
            observer.parse_ended(line);
        }
    }

    fn collect_diagnostics(&mut self) {
        let mut fresh = self.session.take_diagnostics();
        self.diagnostics.append(&mut fresh);
    }

    /// Revoke the worker, drop its events and join it. Returns the number of
    /// chunks thrown away.
    fn shut_down_worker(&mut self) -> usize {
        let Some(pipe) = self.speculation.as_mut() else {
            return 0;
        };
        pipe.revoked.revoke();
        let discarded = pipe.discard();
        pipe.events = None;
        if let Some(worker) = pipe.worker.take() {
            worker.stop();
        }
        discarded
    }

    fn worker_lost(&mut self) -> PumpStatus {
        if self.finished || self.is_terminal() {
            return PumpStatus::Finished;
        }
        log::error!(
            target: "parse.coordinator",
            "worker for parser {} went away; finishing with what was received",
            self.id
        );
        self.finalize();
        PumpStatus::Finished
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shut_down_worker();
    }
}

fn issue(
    dedup: &mut PreloadDedup,
    loader: &mut dyn ResourceLoader,
    stats: &mut PipelineStats,
    request: PreloadRequest,
) {
    if dedup.admit(&request.url) {
        stats.preloads_issued += 1;
        loader.preload(request);
    }
}
