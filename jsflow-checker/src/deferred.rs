//! Call checks postponed until every function has a summary.

use indexmap::IndexMap;
use tracing::{debug, debug_span, trace};

use crate::ast::SourceSpan;
use crate::diagnostics::Diagnostics;
use crate::flow::{check_call, FunctionSummary};
use crate::registry::Registry;
use crate::types::{FunctionType, Lattice, Type};

/// Where a call happens and how it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub span: SourceSpan,
    pub callee_name: String,
    pub argument_spans: Vec<SourceSpan>,
    pub is_new: bool,
    /// Set in legacy mode for callees with undeclared formals: the fewest
    /// arguments accepted, with no upper bound.
    pub legacy_min_arity: Option<usize>,
}

impl CallSite {
    pub fn new(span: SourceSpan, callee_name: impl Into<String>) -> Self {
        Self {
            span,
            callee_name: callee_name.into(),
            argument_spans: Vec::new(),
            is_new: false,
            legacy_min_arity: None,
        }
    }

    pub fn argument_span(&self, index: usize) -> SourceSpan {
        self.argument_spans.get(index).copied().unwrap_or(self.span)
    }
}

#[derive(Debug, Clone)]
pub struct DeferredCheck {
    pub site: CallSite,
    /// Function literal id of the callee.
    pub callee: usize,
    pub arguments: Vec<Type>,
    pub receiver: Option<Type>,
}

/// Pending checks keyed by call site. Queuing the same site again replaces
/// the earlier entry, and replay drains the queue, so every site is checked
/// at most once.
#[derive(Debug, Default)]
pub struct DeferredChecks {
    queue: IndexMap<SourceSpan, DeferredCheck>,
}

impl DeferredChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&mut self, check: DeferredCheck) {
        trace!(callee = check.callee, line = check.site.span.line, "deferring call check");
        self.queue.insert(check.site.span, check);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, site: &SourceSpan) -> bool {
        self.queue.contains_key(site)
    }

    /// Checks every queued call against the callee's final summary, falling
    /// back to its declared signature. Returns how many checks ran.
    pub fn replay(
        &mut self,
        registry: &Registry,
        summaries: &IndexMap<usize, FunctionSummary>,
        diagnostics: &mut Diagnostics,
    ) -> usize {
        let span = debug_span!("deferred_replay", pending = self.queue.len());
        let _guard = span.enter();
        let lattice = Lattice::new(registry);
        let mut replayed = 0;
        for (_, check) in self.queue.drain(..) {
            let callee: FunctionType = match summaries.get(&check.callee) {
                Some(summary) => summary.function.clone(),
                None => match registry.function(check.callee) {
                    Some(decl) => decl.signature.to_function_type(),
                    None => continue,
                },
            };
            check_call(
                &lattice,
                diagnostics,
                &check.site,
                &callee,
                &check.arguments,
                check.receiver.as_ref(),
            );
            replayed += 1;
        }
        debug!(replayed, "deferred checks replayed");
        replayed
    }
}
