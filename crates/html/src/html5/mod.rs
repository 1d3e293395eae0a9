//! HTML5 parsing path.

pub mod compact;
pub mod filter;
pub mod preload;
pub(crate) mod rules;
mod session;
pub(crate) mod shared;
pub mod simulator;
pub mod tokenizer;
pub mod tree_builder;

// Public re-exports: consumers should import from `html::html5::*` rather than `shared::*`.
pub use compact::{CompactAttr, CompactError, CompactKind, CompactToken, compact_batch};
pub use filter::{
    AllowAll, ContentFilter, DenyList, FILTER_WINDOW, FilterContext, FilterReport, FilterVerdict,
};
pub use preload::{PreloadDedup, PreloadRequest, PreloadScanner, ResourceRef};
pub use session::{Html5ParseSession, SessionStep};
pub use shared::{
    AtomError, AtomId, AtomTable, Counters, DocumentParseContext, InputStream, ParseError,
    ParseErrorCode, SourcePos, Span, TextSpan, Token,
};
pub use simulator::{SimulatedToken, TreeBuilderSimulator};
pub use tokenizer::{
    Html5Tokenizer, RawTextKind, TextResolver, TokenBatch, TokenizeResult, TokenizerConfig,
    TokenizerSnapshot, TokenizerState,
};
pub use tree_builder::{
    Html5TreeBuilder, InsertionMode, PendingScript, SimulatorState, TreeBuilderConfig,
    TreeBuilderStep, TreeSink,
};
