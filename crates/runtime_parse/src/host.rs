//! Collaborators the coordinator calls out to.

use std::sync::{Arc, Mutex};

use html::html5::{ContentFilter, FilterReport, PendingScript, PreloadRequest};

/// Called whenever the coordinator wants to be pumped again: a worker event
/// arrived, or a yield scheduled a resumption.
pub type WakeHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptOutcome {
    Completed,
    /// The script is still running; the embedder calls
    /// `Coordinator::resume_after_script_execution` when it is done.
    Pending,
}

/// What a running script may do to the parser.
#[derive(Debug, Default)]
pub struct ScriptContext {
    writes: String,
    nesting_level: u32,
}

impl ScriptContext {
    pub(crate) fn new(nesting_level: u32) -> Self {
        Self {
            writes: String::new(),
            nesting_level,
        }
    }

    /// Insert markup at the insertion point.
    pub fn write(&mut self, text: &str) {
        self.writes.push_str(text);
    }

    pub fn writeln(&mut self, text: &str) {
        self.writes.push_str(text);
        self.writes.push('\n');
    }

    pub fn nesting_level(&self) -> u32 {
        self.nesting_level
    }

    pub(crate) fn into_writes(self) -> String {
        self.writes
    }
}

pub trait ScriptHost {
    fn execute(&mut self, script: &PendingScript, context: &mut ScriptContext) -> ScriptOutcome;
}

pub trait ResourceLoader {
    fn preload(&mut self, request: PreloadRequest);
}

/// Coarse notifications for tooling. Parsing behaves the same with or
/// without observers.
pub trait ParseObserver: Send + Sync {
    fn parse_started(&self, _line: u32) {}
    fn parse_ended(&self, _line: u32) {}
    fn tokens_processed(&self, _count: usize) {}
    fn speculation_discarded(&self, _chunks: usize) {}
    fn content_blocked(&self, _report: &FilterReport) {}
}

pub struct Collaborators {
    pub script_host: Box<dyn ScriptHost>,
    pub loader: Box<dyn ResourceLoader>,
    pub filter: Option<Arc<dyn ContentFilter>>,
    pub observers: Vec<Arc<dyn ParseObserver>>,
    pub wake: Option<WakeHook>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            script_host: Box::new(NoScripts),
            loader: Box::new(NullLoader),
            filter: None,
            observers: Vec::new(),
            wake: None,
        }
    }
}

/// Completes every script without doing anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoScripts;

impl ScriptHost for NoScripts {
    fn execute(&mut self, _script: &PendingScript, _context: &mut ScriptContext) -> ScriptOutcome {
        ScriptOutcome::Completed
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullLoader;

impl ResourceLoader for NullLoader {
    fn preload(&mut self, _request: PreloadRequest) {}
}

/// Loader that keeps every request. Clones share the same list.
#[derive(Clone, Debug, Default)]
pub struct RecordingLoader {
    requests: Arc<Mutex<Vec<PreloadRequest>>>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<PreloadRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ResourceLoader for RecordingLoader {
    fn preload(&mut self, request: PreloadRequest) {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }
    }
}

/// Script host for inline scripts made of `document.write(...)` and
/// `document.writeln(...)` calls with string literal arguments. Anything
/// else in a script is skipped.
#[derive(Clone, Debug, Default)]
pub struct DocumentWriteHost {
    executed: u64,
}

impl DocumentWriteHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }
}

impl ScriptHost for DocumentWriteHost {
    fn execute(&mut self, script: &PendingScript, context: &mut ScriptContext) -> ScriptOutcome {
        self.executed += 1;
        if script.src.is_none() {
            for (newline, text) in document_writes(&script.text) {
                if newline {
                    context.writeln(&text);
                } else {
                    context.write(&text);
                }
            }
        }
        ScriptOutcome::Completed
    }
}

/// `(is_writeln, literal)` for every `document.write[ln]('...')` call.
fn document_writes(source: &str) -> Vec<(bool, String)> {
    const CALL: &str = "document.write";
    let mut out = Vec::new();
    let mut rest = source;
    while let Some(at) = rest.find(CALL) {
        rest = &rest[at + CALL.len()..];
        let newline = rest.starts_with("ln");
        if newline {
            rest = &rest[2..];
        }
        let Some(args) = rest.trim_start().strip_prefix('(') else {
            continue;
        };
        let Some((literal, after)) = string_literal(args.trim_start()) else {
            continue;
        };
        if after.trim_start().starts_with(')') {
            out.push((newline, literal));
        }
        rest = after;
    }
    out
}

/// Parse a single- or double-quoted literal at the start of `text`.
fn string_literal(text: &str) -> Option<(String, &str)> {
    let mut chars = text.char_indices();
    let (_, quote) = chars.next().filter(|(_, c)| *c == '\'' || *c == '"')?;
    let mut value = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next()?.1 {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                other => value.push(other),
            },
            c if c == quote => return Some((value, &text[i + c.len_utf8()..])),
            c => value.push(c),
        }
    }
    None
}
