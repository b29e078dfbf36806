use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::ast::Program;
use crate::collector::collect;
use crate::diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
use crate::flow::{analyze, FunctionSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputMode {
    /// Input is already ES5; nothing needs transpiling.
    #[default]
    NoTranspilation,
    /// ES6 syntax is accepted but reported as requiring transpilation.
    Mixed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckOptions {
    pub input_mode: InputMode,
    pub report_unknown_types: bool,
    pub legacy_compatibility: bool,
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Sorted by position.
    pub diagnostics: Vec<Diagnostic>,
    pub summaries: IndexMap<usize, FunctionSummary>,
}

impl CheckOutcome {
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.level == DiagnosticLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.level == DiagnosticLevel::Warning)
    }

    pub fn summary_named(&self, name: &str) -> Option<&FunctionSummary> {
        self.summaries.values().find(|summary| summary.name == name)
    }
}

pub struct Checker {
    options: CheckOptions,
}

impl Checker {
    pub fn new(options: CheckOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    pub fn check(&self, program: &Program, externs: Option<&Program>) -> CheckOutcome {
        let span = info_span!("check", statements = program.statements.len());
        let _guard = span.enter();

        let mut diagnostics = Diagnostics::new();
        let collected = collect(
            program,
            externs,
            self.options.legacy_compatibility,
            &mut diagnostics,
        );
        info!(target: "checker", diagnostics = diagnostics.len(), "global collection finished");

        let mut flow = analyze(&collected.registry, &self.options, program);
        diagnostics.extend(flow.diagnostics);
        let replayed = flow
            .deferred
            .replay(&collected.registry, &flow.summaries, &mut diagnostics);
        info!(target: "checker", replayed, "deferred checks replayed");

        if !collected.suppressions.is_empty() {
            diagnostics.retain(|diagnostic| !collected.suppressions.suppresses(diagnostic));
        }
        diagnostics.dedup();
        diagnostics.sort_by_position();
        info!(
            target: "checker",
            diagnostics = diagnostics.len(),
            errors = diagnostics.has_errors(),
            "check finished"
        );

        CheckOutcome {
            diagnostics: diagnostics.into_entries(),
            summaries: flow.summaries,
        }
    }
}
