//! Worker-side tree-builder simulator.
//!
//! Runs the real insertion-mode rules against a sink that only hands out
//! node ids, so the worker knows the insertion mode and open-element names
//! at every chunk boundary without building any nodes. Tokens are also
//! classified for the worker's flush policy.

use crate::html5::compact::{CompactAttr, CompactToken};
use crate::html5::rules;
use crate::html5::tree_builder::{
    Html5TreeBuilder, SimulatorState, TreeBuilderConfig, TreeBuilderStep, TreeSink,
};
use crate::types::NodeId;

/// Token class as far as chunking and preloading care.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulatedToken {
    ScriptStart,
    ScriptEnd,
    StyleOrLink,
    Other,
    /// The token involves an element the simplified modes do not model.
    Uncertain,
}

/// Sink that records nothing but a node count.
#[derive(Clone, Debug, Default)]
pub struct ShadowSink {
    nodes: u32,
}

impl ShadowSink {
    pub fn node_count(&self) -> u32 {
        self.nodes
    }
}

impl TreeSink for ShadowSink {
    const KEEPS_CONTENT: bool = false;

    fn document(&self) -> NodeId {
        NodeId::ROOT
    }

    fn create_element(&mut self, _name: &str, _attrs: &[CompactAttr], _inert: bool) -> NodeId {
        self.nodes = self.nodes.wrapping_add(1);
        NodeId(self.nodes)
    }

    fn append(&mut self, _parent: NodeId, _child: NodeId) {}

    fn append_text(&mut self, _parent: NodeId, _text: &str) {}

    fn append_comment(&mut self, _parent: NodeId, _text: &str) {}

    fn append_doctype(&mut self, _name: &str, _public_id: Option<&str>, _system_id: Option<&str>) {}
}

pub struct TreeBuilderSimulator {
    builder: Html5TreeBuilder,
    sink: ShadowSink,
    predicted_suspension: bool,
}

impl Default for TreeBuilderSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilderSimulator {
    pub fn new() -> Self {
        Self::with_config(TreeBuilderConfig::default())
    }

    /// `config` must match the real builder's, or predictions drift.
    pub fn with_config(config: TreeBuilderConfig) -> Self {
        Self {
            builder: Html5TreeBuilder::new(config),
            sink: ShadowSink::default(),
            predicted_suspension: false,
        }
    }

    /// Resume from the state carried by a checkpoint.
    pub fn from_state(config: TreeBuilderConfig, state: &SimulatorState) -> Self {
        Self {
            builder: Html5TreeBuilder::from_state(config, state),
            sink: ShadowSink::default(),
            predicted_suspension: false,
        }
    }

    pub fn state(&self) -> SimulatorState {
        self.builder.simulator_state()
    }

    /// Whether the last simulated token would suspend the real builder on a
    /// parser-blocking script.
    pub fn predicted_suspension(&self) -> bool {
        self.predicted_suspension
    }

    pub fn simulate(&mut self, token: &CompactToken) -> SimulatedToken {
        let step = self.builder.process(token, &mut self.sink);
        self.predicted_suspension = trace_prediction(step);
        classify(token)
    }

    /// Simulate a token the content filter blocked, mirroring the
    /// coordinator's neutralization.
    pub fn simulate_blocked(&mut self, token: &CompactToken) -> SimulatedToken {
        let step = self.builder.process_blocked(token, &mut self.sink);
        self.predicted_suspension = trace_prediction(step);
        classify(token)
    }
}

fn trace_prediction(step: TreeBuilderStep) -> bool {
    #[cfg_attr(not(any(test, feature = "debug-stats")), allow(unused_variables))]
    let TreeBuilderStep::Suspend(script) = step else {
        return false;
    };
    #[cfg(any(test, feature = "debug-stats"))]
    log::trace!(target: "html5.simulator", "predicted blocking script at {}", script.pos);
    true
}

pub fn classify(token: &CompactToken) -> SimulatedToken {
    if let Some(name) = token.start_tag_name() {
        return match name {
            "script" => SimulatedToken::ScriptStart,
            "style" | "link" => SimulatedToken::StyleOrLink,
            name if rules::is_unmodelled(name) => SimulatedToken::Uncertain,
            _ => SimulatedToken::Other,
        };
    }
    if let Some(name) = token.end_tag_name() {
        return match name {
            "script" => SimulatedToken::ScriptEnd,
            name if rules::is_unmodelled(name) => SimulatedToken::Uncertain,
            _ => SimulatedToken::Other,
        };
    }
    SimulatedToken::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;
    use crate::html5::compact::compact_batch;
    use crate::html5::shared::{DocumentParseContext, InputStream};
    use crate::html5::tokenizer::{Html5Tokenizer, TokenizerConfig};
    use crate::html5::tree_builder::InsertionMode;

    fn tokens(html: &str) -> Vec<CompactToken> {
        let mut ctx = DocumentParseContext::new();
        let mut input = InputStream::from_text(html);
        let mut tok = Html5Tokenizer::new(TokenizerConfig::default());
        tok.finish(&mut input, &mut ctx);
        let batch = tok.next_batch(&mut input);
        compact_batch(&batch, &ctx.atoms)
    }

    #[test]
    fn simulator_tracks_the_real_builder_state() {
        let html = "<!doctype html><title>t</title><ul><li>a<li>b</ul><p>x<div>y</div><script>z</script>";
        let tokens = tokens(html);
        let mut sim = TreeBuilderSimulator::new();
        let mut builder = Html5TreeBuilder::new(TreeBuilderConfig::default());
        let mut doc = Document::new();
        for token in &tokens {
            sim.simulate(token);
            builder.process(token, &mut doc);
            assert_eq!(sim.state(), builder.simulator_state(), "diverged at {:?}", token);
        }
    }

    #[test]
    fn classification() {
        let classes: Vec<_> = tokens("<script></script><link><table><p></table>")
            .iter()
            .map(classify)
            .collect();
        assert_eq!(
            classes,
            vec![
                SimulatedToken::ScriptStart,
                SimulatedToken::ScriptEnd,
                SimulatedToken::StyleOrLink,
                SimulatedToken::Uncertain,
                SimulatedToken::Other,
                SimulatedToken::Uncertain,
                SimulatedToken::Other,
            ]
        );
    }

    #[test]
    fn resumes_from_state() {
        let all = tokens("<p>a<script>b</script>c</p>");
        let split = all
            .iter()
            .position(|t| t.end_tag_name() == Some("script"))
            .unwrap();
        let mut whole = TreeBuilderSimulator::new();
        let mut first = TreeBuilderSimulator::new();
        for t in &all[..=split] {
            whole.simulate(t);
            first.simulate(t);
        }
        let mut second =
            TreeBuilderSimulator::from_state(TreeBuilderConfig::default(), &first.state());
        for t in &all[split + 1..] {
            whole.simulate(t);
            second.simulate(t);
        }
        assert!(first.predicted_suspension());
        assert_eq!(whole.state(), second.state());
        assert!(second.state().finished);
    }

    #[test]
    fn scripting_off_never_predicts_a_suspension() {
        let mut sim = TreeBuilderSimulator::with_config(TreeBuilderConfig { scripting: false });
        let mut suspended = false;
        for t in &tokens("<p>a<script>b</script>c</p>") {
            sim.simulate(t);
            suspended |= sim.predicted_suspension();
        }
        assert!(!suspended);
        assert!(sim.state().finished);
    }

    #[test]
    fn script_content_enters_text_mode() {
        let mut sim = TreeBuilderSimulator::new();
        for t in tokens("<body><script>").iter().filter(|t| !t.is_eof()) {
            sim.simulate(t);
        }
        assert_eq!(sim.state().mode, InsertionMode::Text);
        assert_eq!(sim.state().original_mode, Some(InsertionMode::InBody));
    }
}
