//! Flow-sensitive analysis of function bodies.
//!
//! Every function literal, and the program's top level, is a scope. Scopes
//! are analysed outer-first against the frozen registry. Each analysis
//! seeds an environment from the declared formals (or from the backward
//! inference pass for undeclared ones), walks the body forward while
//! narrowing on conditions and checking every operation, and finally
//! records a [`FunctionSummary`]. Calls to functions whose summary does not
//! exist yet are queued as deferred checks.

mod calls;
mod conditions;
mod env;
mod expressions;
mod inference;
mod properties;
mod scope;
mod statements;

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, debug_span};

use crate::annotations::AnnotationResolver;
use crate::ast::{FunctionLiteral, Program, SourceSpan};
use crate::checker::CheckOptions;
use crate::deferred::DeferredChecks;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::registry::{NominalId, ParamKind, Registry};
use crate::types::{FunctionType, Lattice, Type};

pub(crate) use calls::check_call;
use env::FlowEnv;
use inference::BackwardInference;
use scope::{LocalKind, ScopeId, ScopeTree};

/// Number of times a loop body is analysed before its exit is taken as
/// final. Only the last round reports diagnostics.
pub const MAX_LOOP_ROUNDS: usize = 3;

/// Checker-computed signature of a function after its body was analysed.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSummary {
    pub id: usize,
    pub name: String,
    pub function: FunctionType,
}

pub(crate) struct FlowResult {
    pub summaries: IndexMap<usize, FunctionSummary>,
    pub deferred: DeferredChecks,
    pub diagnostics: Diagnostics,
}

struct FlowState {
    diagnostics: Diagnostics,
    summaries: IndexMap<usize, FunctionSummary>,
    deferred: DeferredChecks,
    /// Join of every value a finished scope assigned to each local.
    assigned: HashMap<ScopeId, HashMap<String, Type>>,
    receivers: HashMap<ScopeId, Type>,
}

pub(crate) fn analyze(registry: &Registry, options: &CheckOptions, program: &Program) -> FlowResult {
    let mut diagnostics = Diagnostics::new();
    let tree = ScopeTree::build(program, registry, &mut diagnostics);
    let mut state = FlowState {
        diagnostics,
        summaries: IndexMap::new(),
        deferred: DeferredChecks::new(),
        assigned: HashMap::new(),
        receivers: HashMap::new(),
    };
    let order = tree.analysis_order();
    debug!(scopes = tree.len(), "flow analysis starting");
    for scope in order {
        let walker = ScopeWalker::new(&tree, &mut state, registry, options, scope);
        if let Some(summary) = walker.run() {
            state.summaries.insert(summary.id, summary);
        }
    }
    debug!(
        summaries = state.summaries.len(),
        deferred = state.deferred.len(),
        "flow analysis finished"
    );
    FlowResult {
        summaries: state.summaries,
        deferred: state.deferred,
        diagnostics: state.diagnostics,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpKind {
    Loop,
    Switch,
}

/// Environments leaving a loop or switch through `break`/`continue`.
struct JumpFrame {
    kind: JumpKind,
    breaks: Vec<FlowEnv>,
    continues: Vec<FlowEnv>,
}

impl JumpFrame {
    fn new(kind: JumpKind) -> Self {
        Self {
            kind,
            breaks: Vec::new(),
            continues: Vec::new(),
        }
    }
}

struct ScopeWalker<'s, 'a, 'p> {
    tree: &'s ScopeTree<'p>,
    state: &'s mut FlowState,
    registry: &'a Registry,
    lattice: Lattice<'a>,
    options: &'s CheckOptions,
    scope: ScopeId,
    receiver: Type,
    /// Nominal type being constructed, inside a constructor body.
    constructing: Option<NominalId>,
    declared_return: Option<Type>,
    returns: Vec<Type>,
    jumps: Vec<JumpFrame>,
    /// Environments seen inside each enclosing `try` block.
    try_frames: Vec<Vec<FlowEnv>>,
    muted: usize,
    assigned: HashMap<String, Type>,
}

impl<'s, 'a, 'p> ScopeWalker<'s, 'a, 'p> {
    fn new(
        tree: &'s ScopeTree<'p>,
        state: &'s mut FlowState,
        registry: &'a Registry,
        options: &'s CheckOptions,
        scope: ScopeId,
    ) -> Self {
        Self {
            tree,
            state,
            registry,
            lattice: Lattice::new(registry),
            options,
            scope,
            receiver: Type::Unknown,
            constructing: None,
            declared_return: None,
            returns: Vec::new(),
            jumps: Vec::new(),
            try_frames: Vec::new(),
            muted: 0,
            assigned: HashMap::new(),
        }
    }

    fn run(mut self) -> Option<FunctionSummary> {
        let tree = self.tree;
        let scope = tree.scope(self.scope);
        let span = debug_span!("scope", name = %scope.name);
        let _guard = span.enter();

        let mut env = FlowEnv::new();
        self.seed_locals(&mut env);
        let summary = match scope.function {
            None => {
                self.block(scope.body, &mut env);
                None
            }
            Some(function) => Some(self.run_function(function, env)),
        };
        self.state
            .assigned
            .insert(self.scope, std::mem::take(&mut self.assigned));
        summary
    }

    /// Hoisted declarations: functions hold their type from the start,
    /// variables are `undefined` until assigned unless declared.
    fn seed_locals(&mut self, env: &mut FlowEnv) {
        let tree = self.tree;
        for (name, local) in &tree.scope(self.scope).locals {
            let ty = match local.kind {
                LocalKind::Parameter => continue,
                LocalKind::Function(id) => self.function_value(id),
                LocalKind::Class | LocalKind::CatchParameter => Type::Unknown,
                LocalKind::Variable => local.declared.clone().unwrap_or_else(Type::undefined),
            };
            env.set(name, ty);
        }
    }

    fn run_function(&mut self, function: &FunctionLiteral, mut env: FlowEnv) -> FunctionSummary {
        let decl = self.registry.function(function.id);
        let signature = decl.map(|decl| decl.signature.clone()).unwrap_or_default();
        let name = decl
            .map(|decl| decl.name.clone())
            .unwrap_or_else(|| self.tree.scope(self.scope).name.clone());

        let undeclared: Vec<String> = function
            .parameters
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                signature
                    .params
                    .get(*index)
                    .map_or(true, |param| param.ty.is_none())
            })
            .map(|(_, parameter)| parameter.name.clone())
            .collect();
        let inferred = BackwardInference::new(self.registry, self.tree, self.scope, undeclared)
            .run(&function.body.statements);

        let mut summary_function = FunctionType::new(Vec::new(), Type::Unknown);
        for (index, parameter) in function.parameters.iter().enumerate() {
            let param = signature.params.get(index);
            let kind = param.map_or(ParamKind::Required, |param| param.kind);
            let ty = param
                .and_then(|param| param.ty.clone())
                .or_else(|| inferred.get(&parameter.name).cloned())
                .unwrap_or(Type::Unknown);
            let entry = match kind {
                ParamKind::Required => {
                    summary_function.required.push(ty.clone());
                    ty
                }
                ParamKind::Optional => {
                    summary_function.optional.push(ty.clone());
                    self.lattice.join(&ty, &Type::undefined())
                }
                ParamKind::Rest => {
                    summary_function.rest = Some(ty.clone());
                    Type::instance(NominalId::ARRAY, vec![ty])
                }
            };
            env.set(&parameter.name, entry);
        }

        self.receiver = if function.is_arrow {
            self.tree
                .scope(self.scope)
                .parent
                .and_then(|parent| self.state.receivers.get(&parent).cloned())
                .unwrap_or(Type::Unknown)
        } else {
            signature.receiver.clone().unwrap_or(Type::Unknown)
        };
        self.state.receivers.insert(self.scope, self.receiver.clone());
        if signature.constructs.is_some() {
            self.constructing = decl.and_then(|decl| decl.owner);
        } else {
            self.declared_return = signature.return_type.clone();
        }

        self.block(&function.body.statements, &mut env);

        let falls_off = env.is_live();
        if let Some(declared) = &self.declared_return {
            if falls_off && !self.lattice.is_subtype(&Type::undefined(), declared) {
                self.report(
                    DiagnosticKind::MissingReturnStatement,
                    format!(
                        "{} is declared to return {} but can reach its end without returning",
                        name,
                        self.describe(declared)
                    ),
                    function.span,
                );
            }
        }
        summary_function.return_type = match (&signature.return_type, &signature.constructs) {
            (Some(declared), _) => declared.clone(),
            (None, Some(_)) => Type::undefined(),
            (None, None) => {
                let mut edges = std::mem::take(&mut self.returns);
                if falls_off || edges.is_empty() {
                    edges.push(Type::undefined());
                }
                self.lattice.join_all(edges.iter())
            }
        };
        summary_function.receiver = signature.receiver.clone();
        summary_function.constructs = signature.constructs.clone();
        summary_function.type_params = signature.type_params.clone();
        debug!(
            function = function.id,
            summary = %summary_function_display(self.registry, &summary_function),
            "function summarized"
        );
        FunctionSummary {
            id: function.id,
            name,
            function: summary_function,
        }
    }

    fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: SourceSpan) {
        if self.muted == 0 {
            self.state.diagnostics.push(kind, message, span);
        }
    }

    fn describe(&self, ty: &Type) -> String {
        ty.describe(self.registry)
    }

    /// Adds the structural explanation of a mismatch, if there is one.
    fn mismatch(&self, headline: String, found: &Type, expected: &Type) -> String {
        match self.lattice.explain_mismatch(found, expected) {
            Some(detail) => format!("{headline}: {detail}"),
            None => headline,
        }
    }

    fn resolver(&self) -> AnnotationResolver<'a> {
        AnnotationResolver::new(self.registry)
            .with_qualified_templates(&self.tree.scope(self.scope).templates)
    }

    /// Type of a function literal: its summary once analysed, otherwise its
    /// declared signature.
    fn function_value(&self, id: usize) -> Type {
        if let Some(summary) = self.state.summaries.get(&id) {
            return Type::function(summary.function.clone());
        }
        match self.registry.function(id) {
            Some(decl) => Type::function(decl.signature.to_function_type()),
            None => Type::function(FunctionType::any()),
        }
    }

    /// Binds a local of the current scope and remembers the value for
    /// inner scopes that capture it.
    fn write_local(&mut self, env: &mut FlowEnv, name: &str, ty: Type) {
        let joined = match self.assigned.get(name) {
            Some(previous) => self.lattice.join(previous, &ty),
            None => ty.clone(),
        };
        self.assigned.insert(name.to_string(), joined);
        env.set(name, ty);
    }

    fn is_mixed_mode(&self) -> bool {
        self.options.input_mode == crate::checker::InputMode::Mixed
    }

    fn requires_transpilation(&mut self, what: &str, span: SourceSpan) {
        if self.is_mixed_mode() {
            self.report(
                DiagnosticKind::RequiresTranspilation,
                format!("{what} requires transpilation in mixed input mode"),
                span,
            );
        }
    }
}

fn summary_function_display(registry: &Registry, function: &FunctionType) -> String {
    Type::function(function.clone()).describe(registry)
}
