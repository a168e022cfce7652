//! Parse-until-empty accumulation.
//!
//! Some backends emit only a prefix of the tree per call; driving them here
//! makes every backend look like a single-pass parser to the pipeline. The
//! accumulation state (root, pass count, how the run ended) lives in this
//! function, not inside the backend.

use tagmill_core::{DocumentFragment, ParseContext, ParserBackend};
use tracing::warn;

/// How an accumulation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulationEnd {
    /// The backend reported exhaustion (an empty batch).
    Exhausted,
    /// The backend failed mid-stream; the fragment holds what was gathered.
    BackendError(String),
    /// The defensive pass cap fired before the backend reported exhaustion.
    PassCapReached,
}

#[derive(Debug)]
pub struct Accumulation {
    pub fragment: DocumentFragment,
    /// Batches that contributed nodes.
    pub passes: usize,
    pub end: AccumulationEnd,
}

impl Accumulation {
    pub fn is_partial(&self) -> bool {
        self.end != AccumulationEnd::Exhausted
    }
}

/// Drive `backend` over `input` until it reports exhaustion, merging every
/// batch as siblings under one root.
///
/// A mid-stream backend error keeps whatever was gathered so far; it is
/// logged and recorded, never escalated. `max_passes` bounds total calls
/// against a backend that never reports exhaustion.
pub fn accumulate(
    backend: &dyn ParserBackend,
    input: &str,
    ctx: ParseContext,
    max_passes: usize,
) -> Accumulation {
    let mut source = backend.begin(input, ctx);
    let mut fragment = DocumentFragment::default();
    let mut passes = 0usize;
    let max_calls = max_passes.max(1);

    for _ in 0..max_calls {
        match source.next_fragment() {
            Ok(nodes) if nodes.is_empty() => {
                return Accumulation {
                    fragment,
                    passes,
                    end: AccumulationEnd::Exhausted,
                };
            }
            Ok(nodes) => {
                passes += 1;
                fragment.children.extend(nodes);
            }
            Err(e) => {
                warn!(backend = backend.name(), error = %e, "parse stopped mid-stream; keeping partial fragment");
                return Accumulation {
                    fragment,
                    passes,
                    end: AccumulationEnd::BackendError(e.to_string()),
                };
            }
        }
    }

    warn!(backend = backend.name(), max_passes, "parse pass cap reached; keeping partial fragment");
    Accumulation {
        fragment,
        passes,
        end: AccumulationEnd::PassCapReached,
    }
}
