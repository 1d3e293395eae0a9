pub mod dom;
#[cfg(any(test, feature = "dom-snapshot"))]
pub mod dom_snapshot;
pub mod html5;
#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

mod entities;
mod types;

pub use crate::dom::Document;
pub use crate::types::{Node, NodeId};

use crate::html5::{Html5ParseSession, SessionStep, TreeBuilderConfig};

/// Parse `html` in one pass on the calling thread, with scripting disabled.
///
/// This is the reference result: any chunking of the same text through the
/// streaming pipeline must produce the same tree.
pub fn parse_document(html: &str) -> Document {
    let mut session = Html5ParseSession::new(TreeBuilderConfig { scripting: false });
    session.append(html);
    session.mark_end_of_stream();
    loop {
        match session.step() {
            SessionStep::Committed => {}
            SessionStep::Finished | SessionStep::NeedMoreInput => break,
            SessionStep::Suspended(script) => {
                debug_assert!(false, "script at {} suspended with scripting off", script.pos);
            }
        }
    }
    session.finish();
    session.into_document()
}
