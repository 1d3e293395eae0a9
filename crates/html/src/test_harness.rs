//! Chunk plans for streaming-invariance tests.
//!
//! A plan splits one input into network chunks. Every plan must produce the
//! same tree as a one-shot parse; the helpers here build both sides and the
//! seeded generators produce plans for fuzzing and property tests.

use crate::html5::{Html5ParseSession, SessionStep, TreeBuilderConfig};
use crate::{Node, parse_document};
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoundaryPolicy {
    /// Enforce UTF-8 aligned boundaries between chunks.
    Utf8Aligned,
    /// Byte-stream mode; the input decoder must carry partial UTF-8 sequences.
    ByteStream,
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryPolicy::Utf8Aligned => f.write_str("utf8"),
            BoundaryPolicy::ByteStream => f.write_str("bytes"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChunkPlan {
    Fixed {
        size: usize,
        policy: BoundaryPolicy,
    },
    Sizes {
        sizes: Vec<usize>,
        policy: BoundaryPolicy,
    },
    Boundaries {
        indices: Vec<usize>,
        policy: BoundaryPolicy,
    },
}

impl fmt::Display for ChunkPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkPlan::Fixed { size, policy } => write!(f, "fixed size={size} policy={policy}"),
            ChunkPlan::Sizes { sizes, policy } => {
                write!(f, "sizes policy={policy} sizes={sizes:?}")
            }
            ChunkPlan::Boundaries { indices, policy } => {
                write!(f, "boundaries policy={policy} indices={indices:?}")
            }
        }
    }
}

impl ChunkPlan {
    pub fn fixed(size: usize) -> Self {
        Self::Fixed {
            size,
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn fixed_unaligned(size: usize) -> Self {
        Self::Fixed {
            size,
            policy: BoundaryPolicy::ByteStream,
        }
    }

    pub fn sizes_unaligned(sizes: impl Into<Vec<usize>>) -> Self {
        Self::Sizes {
            sizes: sizes.into(),
            policy: BoundaryPolicy::ByteStream,
        }
    }

    pub fn boundaries(indices: impl Into<Vec<usize>>) -> Self {
        Self::Boundaries {
            indices: indices.into(),
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn boundaries_unaligned(indices: impl Into<Vec<usize>>) -> Self {
        Self::Boundaries {
            indices: indices.into(),
            policy: BoundaryPolicy::ByteStream,
        }
    }

    pub fn policy(&self) -> BoundaryPolicy {
        match self {
            ChunkPlan::Fixed { policy, .. }
            | ChunkPlan::Sizes { policy, .. }
            | ChunkPlan::Boundaries { policy, .. } => *policy,
        }
    }

    /// Interior split points of this plan over `input`, sorted and unique.
    pub fn split_points(&self, input: &str) -> Vec<usize> {
        let len = input.len();
        let mut points = Vec::new();
        match self {
            ChunkPlan::Fixed { size, .. } => {
                assert!(*size > 0, "chunk size must be > 0");
                points.extend((1..).map(|i| i * size).take_while(|&end| end < len));
            }
            ChunkPlan::Sizes { sizes, .. } => {
                let mut offset = 0usize;
                for size in sizes {
                    assert!(*size > 0, "chunk size must be > 0");
                    offset += size;
                    if offset >= len {
                        break;
                    }
                    points.push(offset);
                }
            }
            ChunkPlan::Boundaries { indices, policy } => {
                points = filter_boundaries_by_policy(input, indices, *policy);
            }
        }
        points.sort_unstable();
        points.dedup();
        points
    }

    pub fn for_each_chunk(&self, input: &str, mut f: impl FnMut(&[u8])) {
        let bytes = input.as_bytes();
        let policy = self.policy();
        let mut last = 0usize;
        for idx in self.split_points(input) {
            assert_chunk_boundary(input, idx, policy);
            f(&bytes[last..idx]);
            last = idx;
        }
        if last < bytes.len() {
            f(&bytes[last..]);
        }
    }

    /// The chunks as owned byte vectors.
    pub fn chunks(&self, input: &str) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        self.for_each_chunk(input, |chunk| out.push(chunk.to_vec()));
        out
    }
}

fn assert_chunk_boundary(input: &str, idx: usize, policy: BoundaryPolicy) {
    if matches!(policy, BoundaryPolicy::Utf8Aligned) {
        assert!(
            input.is_char_boundary(idx),
            "chunk boundary must be UTF-8 aligned: {idx}"
        );
    }
}

pub(crate) fn filter_boundaries_by_policy(
    input: &str,
    indices: &[usize],
    policy: BoundaryPolicy,
) -> Vec<usize> {
    indices
        .iter()
        .copied()
        .filter(|&idx| idx > 0 && idx < input.len())
        .filter(|&idx| {
            !matches!(policy, BoundaryPolicy::Utf8Aligned) || input.is_char_boundary(idx)
        })
        .collect()
}

/// One-shot reference parse.
pub fn run_full(input: &str) -> Node {
    parse_document(input).to_node()
}

/// Parse `input` delivered in the chunks of `plan`, committing tokens as
/// soon as each chunk has been appended.
pub fn run_chunked(input: &str, plan: &ChunkPlan) -> Node {
    let mut session = Html5ParseSession::new(TreeBuilderConfig { scripting: false });
    plan.for_each_chunk(input, |chunk| {
        session.append_bytes(chunk);
        drain(&mut session);
    });
    session.mark_end_of_stream();
    drain(&mut session);
    session.finish();
    session.into_document().to_node()
}

fn drain(session: &mut Html5ParseSession) {
    while session.step() == SessionStep::Committed {}
}

pub fn default_chunk_plans() -> &'static [ChunkPlan] {
    static PLANS: std::sync::OnceLock<Vec<ChunkPlan>> = std::sync::OnceLock::new();
    PLANS.get_or_init(|| {
        let mut plans = vec![ChunkPlan::fixed(64)];
        for size in [1usize, 2, 3, 7] {
            plans.push(ChunkPlan::fixed_unaligned(size));
        }
        plans.push(ChunkPlan::sizes_unaligned(vec![1, 1, 2, 1, 4, 8, 16, 3, 7]));
        plans.push(ChunkPlan::boundaries_unaligned(vec![1, 2, 4, 5, 6, 7]));
        plans.push(ChunkPlan::boundaries(vec![3, 5]));
        plans
    })
}

/// Fixed sizes, every split point of short inputs, and splits around
/// markup-significant bytes.
pub fn deterministic_chunk_plans(input: &str) -> Vec<ChunkPlan> {
    let mut plans: Vec<ChunkPlan> = [1usize, 2, 3, 4, 7, 16, 64]
        .into_iter()
        .map(ChunkPlan::fixed_unaligned)
        .collect();
    if (2..=128).contains(&input.len()) {
        plans.push(ChunkPlan::boundaries_unaligned((1..input.len()).collect::<Vec<_>>()));
    }
    let semantic = semantic_boundaries(input, 256);
    if !semantic.is_empty() {
        plans.push(ChunkPlan::boundaries_unaligned(semantic));
    }
    plans
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FuzzMode {
    Sizes,
    Boundaries,
    Semantic,
    Mixed,
}

pub struct FuzzChunkPlan {
    pub plan: ChunkPlan,
    pub summary: String,
}

/// Seeded random plan. The same `(input, seed, mode)` always yields the
/// same plan, so failures reproduce from the printed summary.
pub fn random_chunk_plan(input: &str, seed: u64, mode: FuzzMode) -> FuzzChunkPlan {
    let mut rng = LcgRng::new(seed);
    let len = input.len();
    if len <= 1 {
        return FuzzChunkPlan {
            plan: ChunkPlan::fixed_unaligned(1),
            summary: format!("fixed_unaligned size=1 len={len} seed=0x{seed:016x}"),
        };
    }

    let mode = match mode {
        FuzzMode::Mixed => match rng.gen_index(3) {
            0 => FuzzMode::Sizes,
            1 => FuzzMode::Boundaries,
            _ => FuzzMode::Semantic,
        },
        mode => mode,
    };

    let plan = match mode {
        FuzzMode::Sizes => {
            let count = rng.gen_range_usize(1, len.min(32) + 1);
            ChunkPlan::sizes_unaligned(random_sizes(&mut rng, len, count))
        }
        FuzzMode::Semantic => {
            let base = semantic_boundaries(input, 128);
            let picked = random_semantic_boundaries(&mut rng, &base, len);
            if picked.is_empty() {
                ChunkPlan::fixed_unaligned(1)
            } else {
                ChunkPlan::boundaries_unaligned(picked)
            }
        }
        FuzzMode::Boundaries | FuzzMode::Mixed => {
            let count = rng.gen_range_usize(1, (len - 1).min(64) + 1);
            let mut indices: Vec<usize> =
                (0..count).map(|_| rng.gen_range_usize(1, len)).collect();
            indices.sort_unstable();
            indices.dedup();
            if rng.gen_ratio(1, 4) {
                let aligned =
                    filter_boundaries_by_policy(input, &indices, BoundaryPolicy::Utf8Aligned);
                if aligned.is_empty() {
                    ChunkPlan::boundaries_unaligned(indices)
                } else {
                    ChunkPlan::boundaries(aligned)
                }
            } else {
                ChunkPlan::boundaries_unaligned(indices)
            }
        }
    };
    let summary = format!("{plan} len={len} seed=0x{seed:016x}");
    FuzzChunkPlan { plan, summary }
}

/// Greedily drop split points while `fails` keeps failing. Returns a
/// boundary plan with the same policy as `plan`.
pub fn shrink_chunk_plan(
    input: &str,
    plan: &ChunkPlan,
    mut fails: impl FnMut(&ChunkPlan) -> bool,
) -> ChunkPlan {
    let policy = plan.policy();
    let mut points = plan.split_points(input);
    let mut i = 0usize;
    while i < points.len() {
        let mut candidate = points.clone();
        candidate.remove(i);
        let candidate_plan = ChunkPlan::Boundaries {
            indices: candidate.clone(),
            policy,
        };
        if fails(&candidate_plan) {
            points = candidate;
        } else {
            i += 1;
        }
    }
    ChunkPlan::Boundaries {
        indices: points,
        policy,
    }
}

fn semantic_boundaries(input: &str, max_points: usize) -> Vec<usize> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    for (idx, &byte) in bytes.iter().enumerate() {
        if matches!(
            byte,
            b'<' | b'>' | b'&' | b';' | b'"' | b'\'' | b'-' | b'/' | b'=' | b' '
        ) {
            out.extend([idx, idx + 1].into_iter().filter(|&i| i > 0 && i < bytes.len()));
        }
    }
    out.sort_unstable();
    out.dedup();
    out.truncate(max_points);
    out
}

fn random_sizes(rng: &mut LcgRng, len: usize, count: usize) -> Vec<usize> {
    let mut remaining = len;
    let mut sizes = Vec::with_capacity(count);
    for i in 0..count {
        if remaining == 0 {
            break;
        }
        let max_size = remaining.saturating_sub(count.saturating_sub(i + 1)).max(1);
        let biased_max = if rng.gen_ratio(7, 10) {
            max_size.clamp(1, 8)
        } else {
            max_size
        };
        let size = rng.gen_range_usize(1, biased_max + 1);
        sizes.push(size);
        remaining = remaining.saturating_sub(size);
    }
    sizes
}

fn random_semantic_boundaries(rng: &mut LcgRng, base: &[usize], len: usize) -> Vec<usize> {
    if base.is_empty() || len <= 1 {
        return Vec::new();
    }
    let pick_count = rng.gen_range_usize(1, base.len().min(32) + 1);
    let mut out: Vec<usize> = (0..pick_count)
        .map(|_| {
            let idx = base[rng.gen_index(base.len())];
            match rng.gen_index(4) {
                0 => idx.saturating_sub(1).max(1),
                1 => (idx + 1).min(len - 1),
                _ => idx,
            }
        })
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Small deterministic generator; plans must reproduce from a seed alone.
pub struct LcgRng {
    state: u64,
}

impl LcgRng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    pub fn gen_range_usize(&mut self, start: usize, end: usize) -> usize {
        assert!(start < end, "invalid range: {start}..{end}");
        let span = (end - start) as u64;
        ((self.next_u64() >> 11) % span) as usize + start
    }

    pub fn gen_index(&mut self, len: usize) -> usize {
        self.gen_range_usize(0, len)
    }

    pub fn gen_ratio(&mut self, numerator: u32, denominator: u32) -> bool {
        assert!(denominator > 0, "invalid denominator: {denominator}");
        (((self.next_u64() >> 11) % denominator as u64) as u32) < numerator
    }
}
