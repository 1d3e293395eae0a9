//! Background tokenizer thread.
//!
//! The worker owns a tokenizer, a tree-builder simulator and a preload
//! scanner. It tokenizes whatever network text it has been given, cuts the
//! token stream into chunks and posts them to the coordinator. It never sees
//! script output: after a mismatch the coordinator sends a checkpoint that
//! carries that text, and the worker restarts from it.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};

use bus::{
    Checkpoint, Chunk, ChunkEnd, ChunkStart, FilteredToken, InputCheckpoint, Revocation,
    WorkerCommand, WorkerEvent,
};
use core_types::{ChunkSeq, Generation, ParserId};
use html::html5::simulator::classify;
use html::html5::{
    CompactToken, ContentFilter, DocumentParseContext, FilterReport, FilterVerdict, Html5Tokenizer,
    InputStream, PreloadScanner, SimulatedToken, TokenizeResult, TokenizerConfig,
    TreeBuilderConfig, TreeBuilderSimulator, compact_batch,
};

use crate::error::PipelineError;
use crate::host::WakeHook;

#[derive(Clone)]
pub struct WorkerConfig {
    pub parser: ParserId,
    pub chunk_token_limit: usize,
    pub document_url: Option<String>,
    pub preload: bool,
    /// Must match the coordinator's tree builder.
    pub scripting: bool,
    pub filter: Option<Arc<dyn ContentFilter>>,
}

/// Coordinator-side handle to a running worker.
pub struct WorkerHandle {
    commands: Sender<WorkerCommand>,
    revoked: Revocation,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn append_input(&self, text: String) -> Result<(), PipelineError> {
        self.send(WorkerCommand::AppendInput(text))
    }

    pub fn mark_end_of_stream(&self) -> Result<(), PipelineError> {
        self.send(WorkerCommand::MarkEndOfStream)
    }

    pub fn resume_from(&self, checkpoint: Checkpoint) -> Result<(), PipelineError> {
        self.send(WorkerCommand::ResumeFrom(checkpoint))
    }

    /// Revoke, stop and join the thread. Callers drop the event receiver first: a
    /// worker blocked on a full event channel only wakes when it closes.
    pub fn stop(mut self) {
        self.revoked.revoke();
        let _ = self.commands.send(WorkerCommand::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!(target: "parse.worker", "parse worker panicked");
            }
        }
    }

    fn send(&self, command: WorkerCommand) -> Result<(), PipelineError> {
        self.commands
            .send(command)
            .map_err(|_| PipelineError::ChannelClosed)
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.revoked.revoke();
            let _ = self.commands.send(WorkerCommand::Stop);
        }
    }
}

/// Why the worker loop ended.
#[derive(Debug)]
enum Exit {
    Stop,
    Revoked,
    ChannelClosed,
}

pub struct BackgroundWorker {
    parser: ParserId,
    chunk_token_limit: usize,
    preload: bool,
    scripting: bool,
    filter: Option<Arc<dyn ContentFilter>>,
    scanner: PreloadScanner,

    commands: Receiver<WorkerCommand>,
    events: SyncSender<WorkerEvent>,
    revoked: Revocation,
    wake: Option<WakeHook>,

    generation: Generation,
    seq: ChunkSeq,
    /// Every byte of network text received so far.
    network: String,
    end_of_stream: bool,

    /// Network offset the current input starts at, after `carried_len`
    /// bytes of checkpoint text.
    base_offset: usize,
    carried_len: usize,
    /// Bytes dropped from the front of `input`.
    compacted: usize,

    ctx: DocumentParseContext,
    input: InputStream,
    tokenizer: Html5Tokenizer,
    simulator: TreeBuilderSimulator,

    chunk_start: ChunkStart,
    pending: Vec<CompactToken>,
    /// The final chunk of this generation has been posted.
    finished: bool,
    idle_reported: bool,
    chunks_posted: u64,
}

fn tokenizer_config() -> TokenizerConfig {
    TokenizerConfig {
        emit_eof: true,
        max_tokens_per_pump: Some(1),
    }
}

impl BackgroundWorker {
    /// Spawn the worker thread. Events go to `events`; `wake` runs after
    /// every successful post.
    pub fn start(
        config: WorkerConfig,
        initial_input: String,
        events: SyncSender<WorkerEvent>,
        revoked: Revocation,
        wake: Option<WakeHook>,
    ) -> io::Result<WorkerHandle> {
        let (commands_tx, commands_rx) = mpsc::channel();
        let name = format!("parse-worker-{}", config.parser);
        let worker = Self::new(config, commands_rx, events, revoked.clone(), wake);
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || worker.run(initial_input))?;
        Ok(WorkerHandle {
            commands: commands_tx,
            revoked,
            thread: Some(thread),
        })
    }

    fn new(
        config: WorkerConfig,
        commands: Receiver<WorkerCommand>,
        events: SyncSender<WorkerEvent>,
        revoked: Revocation,
        wake: Option<WakeHook>,
    ) -> Self {
        let tokenizer = Html5Tokenizer::new(tokenizer_config());
        Self {
            parser: config.parser,
            chunk_token_limit: config.chunk_token_limit.max(1),
            preload: config.preload,
            scripting: config.scripting,
            filter: config.filter,
            scanner: PreloadScanner::new(config.document_url.as_deref()),
            commands,
            events,
            revoked,
            wake,
            generation: Generation::default(),
            seq: 0,
            network: String::new(),
            end_of_stream: false,
            base_offset: 0,
            carried_len: 0,
            compacted: 0,
            ctx: DocumentParseContext::new(),
            input: InputStream::new(),
            chunk_start: ChunkStart {
                tokenizer: tokenizer.snapshot(),
                input: InputCheckpoint::default(),
            },
            tokenizer,
            simulator: TreeBuilderSimulator::with_config(TreeBuilderConfig {
                scripting: config.scripting,
            }),
            pending: Vec::new(),
            finished: false,
            idle_reported: false,
            chunks_posted: 0,
        }
    }

    fn run(mut self, initial_input: String) {
        log::debug!(target: "parse.worker", "worker for parser {} started", self.parser);
        if !initial_input.is_empty() {
            self.append(&initial_input);
        }
        let exit = match self.event_loop() {
            Ok(never) => match never {},
            Err(exit) => exit,
        };
        log::debug!(
            target: "parse.worker",
            "worker for parser {} exiting ({exit:?}) after {} chunks",
            self.parser,
            self.chunks_posted
        );
        if matches!(exit, Exit::Stop) {
            let _ = self.post(WorkerEvent::Stopped);
        }
    }

    fn event_loop(&mut self) -> Result<std::convert::Infallible, Exit> {
        loop {
            loop {
                match self.commands.try_recv() {
                    Ok(command) => self.apply(command)?,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return Err(Exit::ChannelClosed),
                }
            }
            if self.revoked.is_revoked() {
                return Err(Exit::Revoked);
            }
            if self.produce()? {
                continue;
            }
            self.report_idle()?;
            let command = self.commands.recv().map_err(|_| Exit::ChannelClosed)?;
            self.apply(command)?;
        }
    }

    fn apply(&mut self, command: WorkerCommand) -> Result<(), Exit> {
        match command {
            WorkerCommand::AppendInput(text) => self.append(&text),
            WorkerCommand::MarkEndOfStream => {
                self.end_of_stream = true;
                self.input.mark_end_of_stream();
                self.idle_reported = false;
            }
            WorkerCommand::ResumeFrom(checkpoint) => self.resume_from(checkpoint)?,
            WorkerCommand::Stop => return Err(Exit::Stop),
        }
        Ok(())
    }

    fn append(&mut self, text: &str) {
        if self.end_of_stream {
            log::warn!(target: "parse.worker", "input after end of stream ignored");
            return;
        }
        self.network.push_str(text);
        self.input.append(text);
        self.idle_reported = false;
    }

    /// Drop all in-flight state and continue from `checkpoint`.
    fn resume_from(&mut self, checkpoint: Checkpoint) -> Result<(), Exit> {
        let Checkpoint {
            generation,
            tokenizer,
            simulator,
            input,
            unconsumed,
        } = checkpoint;
        debug_assert_eq!(input.carried, unconsumed.len());
        let network = match self.network.get(input.network_offset..) {
            Some(rest) => rest,
            None => {
                log::error!(
                    target: "parse.worker",
                    "checkpoint offset {} outside network text of {} bytes",
                    input.network_offset,
                    self.network.len()
                );
                ""
            }
        };
        let mut text = String::with_capacity(unconsumed.len() + network.len());
        text.push_str(&unconsumed);
        text.push_str(network);
        self.input = InputStream::from_text(&text);
        if self.end_of_stream {
            self.input.mark_end_of_stream();
        }
        self.ctx = DocumentParseContext::new();
        self.tokenizer = Html5Tokenizer::from_snapshot(tokenizer_config(), tokenizer.clone());
        self.simulator = TreeBuilderSimulator::from_state(
            TreeBuilderConfig {
                scripting: self.scripting,
            },
            &simulator,
        );
        self.generation = generation;
        self.seq = 0;
        self.base_offset = input.network_offset;
        self.carried_len = unconsumed.len();
        self.compacted = 0;
        self.pending.clear();
        self.finished = false;
        self.idle_reported = false;
        self.chunk_start = ChunkStart {
            tokenizer,
            input: self.input_checkpoint(),
        };
        log::debug!(
            target: "parse.worker",
            "resuming generation {} at network offset {} with {} carried bytes",
            generation.0,
            input.network_offset,
            unconsumed.len()
        );
        self.post(WorkerEvent::Resumed { generation })
    }

    /// Tokenize one step, flushing a chunk when one is complete. Returns
    /// `false` when starved of input.
    fn produce(&mut self) -> Result<bool, Exit> {
        if self.finished {
            return Ok(false);
        }
        let exhausted = self.tokenizer.push_input(&mut self.input, &mut self.ctx)
            == TokenizeResult::NeedMoreInput;
        if exhausted && self.end_of_stream {
            self.tokenizer.finish(&mut self.input, &mut self.ctx);
        }
        let batch = self.tokenizer.next_batch(&mut self.input);
        let tokens = compact_batch(&batch, &self.ctx.atoms);
        drop(batch);
        self.compacted += self.tokenizer.compact_input(&mut self.input);

        let produced = !tokens.is_empty();
        let boundary = tokens.iter().any(|token| {
            matches!(
                classify(token),
                SimulatedToken::ScriptEnd | SimulatedToken::Uncertain
            )
        });
        self.pending.extend(tokens);

        let is_final = self.tokenizer.is_finished();
        let flush = is_final
            || boundary
            || self.pending.len() >= self.chunk_token_limit
            || (exhausted && !self.pending.is_empty());
        if flush {
            self.flush(is_final)?;
        }
        Ok(produced || !exhausted || is_final)
    }

    /// Filter, simulate and scan the pending tokens, then post them.
    fn flush(&mut self, is_final: bool) -> Result<(), Exit> {
        let tokens = std::mem::take(&mut self.pending);
        let mut filtered = Vec::new();
        let mut preloads = Vec::new();
        for (index, token) in tokens.iter().enumerate() {
            let verdict = match self.filter.as_deref() {
                Some(filter) => html::html5::filter::check_at(filter, &tokens, index),
                None => FilterVerdict::Pass,
            };
            match verdict {
                FilterVerdict::Pass => {
                    self.simulator.simulate(token);
                    if self.preload {
                        preloads.extend(self.scanner.scan_token(token));
                    }
                }
                FilterVerdict::Block { reason } => {
                    self.simulator.simulate_blocked(token);
                    filtered.push(FilteredToken {
                        index,
                        report: FilterReport::new(token, &reason),
                    });
                }
            }
        }

        let end = ChunkEnd {
            tokenizer: self.tokenizer.snapshot(),
            simulator: self.simulator.state(),
            input: self.input_checkpoint(),
        };
        let start = std::mem::replace(
            &mut self.chunk_start,
            ChunkStart {
                tokenizer: end.tokenizer.clone(),
                input: end.input,
            },
        );
        let chunk = Chunk {
            parser: self.parser,
            generation: self.generation,
            seq: self.seq,
            start,
            tokens,
            end,
            preloads,
            filtered,
            diagnostics: self.ctx.take_errors(),
            ends_in_script: self.simulator.predicted_suspension(),
            is_final,
        };
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "parse.worker",
            "chunk {}/{}: {} tokens, end {:?}{}",
            chunk.generation.0,
            chunk.seq,
            chunk.tokens.len(),
            chunk.end.input,
            if chunk.is_final { " (final)" } else { "" }
        );
        self.seq += 1;
        self.finished = is_final;
        self.chunks_posted += 1;
        self.post(WorkerEvent::Chunk(chunk))
    }

    fn report_idle(&mut self) -> Result<(), Exit> {
        if self.idle_reported || self.finished {
            return Ok(());
        }
        self.idle_reported = true;
        self.post(WorkerEvent::Idle {
            generation: self.generation,
            network_len: self.network.len(),
        })
    }

    /// Where the cursor is, in checkpoint terms.
    fn input_checkpoint(&self) -> InputCheckpoint {
        let consumed = self.compacted + self.tokenizer.cursor();
        if consumed < self.carried_len {
            InputCheckpoint {
                network_offset: self.base_offset,
                carried: self.carried_len - consumed,
            }
        } else {
            InputCheckpoint {
                network_offset: self.base_offset + (consumed - self.carried_len),
                carried: 0,
            }
        }
    }

    fn post(&self, event: WorkerEvent) -> Result<(), Exit> {
        if self.revoked.is_revoked() {
            return Err(Exit::Revoked);
        }
        self.events.send(event).map_err(|_| Exit::ChannelClosed)?;
        if let Some(wake) = &self.wake {
            if !self.revoked.is_revoked() {
                wake();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::html5::{CompactKind, DenyList, InsertionMode, TokenizerState};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn config(limit: usize) -> WorkerConfig {
        WorkerConfig {
            parser: 7,
            chunk_token_limit: limit,
            document_url: Some("https://example.com/".to_string()),
            preload: true,
            scripting: true,
            filter: None,
        }
    }

    fn start(config: WorkerConfig, input: &str) -> (WorkerHandle, Receiver<WorkerEvent>) {
        let (tx, rx) = mpsc::sync_channel(64);
        let handle =
            BackgroundWorker::start(config, input.to_string(), tx, Revocation::new(), None)
                .unwrap();
        (handle, rx)
    }

    /// Chunks up to and including the final one.
    fn collect(rx: &Receiver<WorkerEvent>) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        loop {
            match rx.recv_timeout(TIMEOUT).unwrap() {
                WorkerEvent::Chunk(chunk) => {
                    let last = chunk.is_final;
                    chunks.push(chunk);
                    if last {
                        return chunks;
                    }
                }
                WorkerEvent::Idle { .. } | WorkerEvent::Resumed { .. } => {}
                WorkerEvent::Stopped => panic!("worker stopped early"),
            }
        }
    }

    fn wait_idle(rx: &Receiver<WorkerEvent>) -> (Vec<Chunk>, usize) {
        let mut chunks = Vec::new();
        loop {
            match rx.recv_timeout(TIMEOUT).unwrap() {
                WorkerEvent::Chunk(chunk) => chunks.push(chunk),
                WorkerEvent::Idle { network_len, .. } => return (chunks, network_len),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn chunks_chain_and_end_with_eof() {
        let (handle, rx) = start(config(3), "<p>a</p><p>b</p><p>c</p>");
        handle.mark_end_of_stream().unwrap();
        let chunks = collect(&rx);
        assert!(chunks.len() >= 3);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end.tokenizer, pair[1].start.tokenizer);
            assert_eq!(pair[0].end.input, pair[1].start.input);
            assert_eq!(pair[1].seq, pair[0].seq + 1);
        }
        let last = chunks.last().unwrap();
        assert!(last.tokens.last().unwrap().is_eof());
        assert_eq!(last.end.input.network_offset, 24);
        handle.stop();
    }

    #[test]
    fn script_end_tag_closes_its_chunk() {
        let (handle, rx) = start(config(64), "<p>a<script>w()</script>b</p>");
        handle.mark_end_of_stream().unwrap();
        let chunks = collect(&rx);
        let script_chunk = chunks
            .iter()
            .find(|c| c.tokens.iter().any(|t| t.end_tag_name() == Some("script")))
            .unwrap();
        assert_eq!(
            script_chunk.tokens.last().unwrap().end_tag_name(),
            Some("script")
        );
        assert!(script_chunk.ends_in_script);
        assert_eq!(script_chunk.end.tokenizer.state(), TokenizerState::Data);
        assert_eq!(script_chunk.end.simulator.mode, InsertionMode::InBody);
        handle.stop();
    }

    #[test]
    fn scripting_off_predicts_no_blocking_script() {
        let config = WorkerConfig {
            scripting: false,
            ..config(64)
        };
        let (handle, rx) = start(config, "<p>a<script>w()</script>b</p>");
        handle.mark_end_of_stream().unwrap();
        let chunks = collect(&rx);
        let closes_script = |c: &Chunk| c.tokens.iter().any(|t| t.end_tag_name() == Some("script"));
        assert!(chunks.iter().any(closes_script));
        assert!(chunks.iter().all(|c| !c.ends_in_script));
        handle.stop();
    }

    #[test]
    fn split_tag_waits_for_more_input() {
        let (handle, rx) = start(config(64), "<di");
        let (chunks, network_len) = wait_idle(&rx);
        assert!(chunks.is_empty());
        assert_eq!(network_len, 3);
        handle.append_input("v>x</div>".to_string()).unwrap();
        handle.mark_end_of_stream().unwrap();
        let chunks = collect(&rx);
        let names: Vec<_> = chunks
            .iter()
            .flat_map(|c| c.tokens.iter())
            .filter_map(|t| t.tag_name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["div", "div"]);
        handle.stop();
    }

    #[test]
    fn preloads_and_filter_reports_travel_with_the_chunk() {
        let mut config = config(64);
        config.filter = Some(Arc::new(DenyList::new().deny_tag("iframe")));
        let (handle, rx) = start(config, "<img src=a.png><iframe src=b.html></iframe>");
        handle.mark_end_of_stream().unwrap();
        let chunks = collect(&rx);
        let preloads: Vec<_> = chunks.iter().flat_map(|c| c.preloads.iter()).collect();
        assert_eq!(preloads.len(), 1);
        assert_eq!(preloads[0].url, "https://example.com/a.png");
        let filtered: Vec<_> = chunks.iter().flat_map(|c| c.filtered.iter()).collect();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].report.tag, "iframe");
        handle.stop();
    }

    #[test]
    fn resume_reads_carried_text_before_network_text() {
        let (handle, rx) = start(config(64), "<p>a<script>w()</script>c</p>");
        let (chunks, _) = wait_idle(&rx);
        let script_chunk = chunks
            .iter()
            .find(|c| c.tokens.last().and_then(|t| t.end_tag_name()) == Some("script"))
            .unwrap()
            .clone();
        let generation = Generation(1);
        handle
            .resume_from(Checkpoint {
                generation,
                tokenizer: script_chunk.end.tokenizer.clone(),
                simulator: script_chunk.end.simulator.clone(),
                input: InputCheckpoint {
                    network_offset: script_chunk.end.input.network_offset,
                    carried: 3,
                },
                unconsumed: "<b>".to_string(),
            })
            .unwrap();
        handle.mark_end_of_stream().unwrap();
        let mut saw_resumed = false;
        let mut resumed_chunks = Vec::new();
        loop {
            match rx.recv_timeout(TIMEOUT).unwrap() {
                WorkerEvent::Resumed { generation: g } => {
                    assert_eq!(g, generation);
                    saw_resumed = true;
                }
                WorkerEvent::Chunk(chunk) if chunk.generation == generation => {
                    assert!(saw_resumed);
                    let last = chunk.is_final;
                    resumed_chunks.push(chunk);
                    if last {
                        break;
                    }
                }
                _ => {}
            }
        }
        let first = &resumed_chunks[0];
        assert_eq!(first.seq, 0);
        assert_eq!(first.start.input.carried, 3);
        assert_eq!(first.tokens[0].start_tag_name(), Some("b"));
        let texts: Vec<_> = resumed_chunks
            .iter()
            .flat_map(|c| c.tokens.iter())
            .filter_map(|t| match &t.kind {
                CompactKind::Character(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["c"]);
        handle.stop();
    }

    #[test]
    fn revoked_worker_posts_nothing() {
        let (tx, rx) = mpsc::sync_channel(64);
        let revoked = Revocation::new();
        revoked.revoke();
        let handle =
            BackgroundWorker::start(config(1), "<p>a</p>".to_string(), tx, revoked, None).unwrap();
        handle.stop();
        assert!(rx.try_recv().is_err());
    }
}
