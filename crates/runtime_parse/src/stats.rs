use serde::Serialize;

/// Pipeline counters for one parser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub chunks_received: u64,
    /// Chunks of an outdated generation, dropped on arrival.
    pub stale_chunks_dropped: u64,
    pub tokens_committed: u64,
    /// Scripts after which buffered speculation was kept.
    pub speculation_hits: u64,
    /// Buffered chunks thrown away by rewinds.
    pub speculation_discards: u64,
    pub rewinds: u64,
    pub preloads_issued: u64,
    pub scripts_executed: u64,
    pub yields: u64,
    pub filtered_tokens: u64,
}
