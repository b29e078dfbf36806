use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::annotations::AnnotationResolver;
use crate::ast::{
    ClassDeclaration, ExpressionKind, FunctionLiteral, Program, Statement, VarKind,
};
use crate::diagnostics::Diagnostics;
use crate::registry::Registry;
use crate::types::Type;
use crate::walk::{called_names, child_functions, walk_statements, Visitor};

pub(crate) type ScopeId = usize;

pub(crate) const ROOT: ScopeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalKind {
    Parameter,
    Variable,
    Function(usize),
    Class,
    CatchParameter,
}

#[derive(Debug, Clone)]
pub(crate) struct Local {
    pub kind: LocalKind,
    pub declared: Option<Type>,
    pub constant: bool,
    /// Function literal the name is bound to at its declaration.
    pub function: Option<usize>,
}

impl Local {
    fn new(kind: LocalKind) -> Self {
        Self {
            kind,
            declared: None,
            constant: false,
            function: None,
        }
    }
}

/// One function body, or the program's top level.
pub(crate) struct Scope<'p> {
    pub parent: Option<ScopeId>,
    pub function: Option<&'p FunctionLiteral>,
    pub body: &'p [Statement],
    pub name: String,
    pub locals: IndexMap<String, Local>,
    pub children: Vec<ScopeId>,
    /// Qualified template variables visible in the body.
    pub templates: Vec<String>,
}

pub(crate) struct ScopeTree<'p> {
    scopes: Vec<Scope<'p>>,
    by_function: HashMap<usize, ScopeId>,
}

impl<'p> ScopeTree<'p> {
    pub fn build(program: &'p Program, registry: &Registry, diagnostics: &mut Diagnostics) -> Self {
        let mut tree = Self {
            scopes: Vec::new(),
            by_function: HashMap::new(),
        };
        tree.add_scope(
            None,
            None,
            &program.statements,
            "<top-level>".to_string(),
            Vec::new(),
            registry,
            diagnostics,
        );
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn add_scope(
        &mut self,
        parent: Option<ScopeId>,
        function: Option<&'p FunctionLiteral>,
        body: &'p [Statement],
        name: String,
        templates: Vec<String>,
        registry: &Registry,
        diagnostics: &mut Diagnostics,
    ) -> ScopeId {
        let id = self.scopes.len();
        let mut locals = IndexMap::new();
        if let Some(function) = function {
            let signature = registry.function(function.id).map(|decl| &decl.signature);
            for (index, parameter) in function.parameters.iter().enumerate() {
                let mut local = Local::new(LocalKind::Parameter);
                local.declared = signature
                    .and_then(|signature| signature.params.get(index))
                    .and_then(|param| param.ty.clone());
                locals.insert(parameter.name.clone(), local);
            }
            self.by_function.insert(function.id, id);
        }
        let mut collector = LocalCollector {
            locals,
            registry,
            templates: &templates,
            top_level: parent.is_none(),
            diagnostics: &mut *diagnostics,
        };
        walk_statements(body, &mut collector);
        let locals = collector.locals;

        self.scopes.push(Scope {
            parent,
            function,
            body,
            name,
            locals,
            children: Vec::new(),
            templates: templates.clone(),
        });

        for child in child_functions(body) {
            let decl = registry.function(child.id);
            let child_name = decl
                .map(|decl| decl.name.clone())
                .unwrap_or_else(|| format!("<anonymous@{}>", child.span.line));
            let mut child_templates = templates.clone();
            if let Some(decl) = decl {
                if let Some(owner) = decl.owner {
                    child_templates.extend(registry.nominal(owner).type_params.iter().cloned());
                }
                child_templates.extend(decl.signature.type_params.iter().cloned());
            }
            child_templates.dedup();
            let child_id = self.add_scope(
                Some(id),
                Some(child),
                &child.body.statements,
                child_name,
                child_templates,
                registry,
                diagnostics,
            );
            self.scopes[id].children.push(child_id);
        }
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope<'p> {
        &self.scopes[id]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn scope_of_function(&self, function: usize) -> Option<ScopeId> {
        self.by_function.get(&function).copied()
    }

    /// Finds the scope declaring `name`, starting at `scope` and walking out.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Local)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let candidate = &self.scopes[id];
            if let Some(local) = candidate.locals.get(name) {
                return Some((id, local));
            }
            current = candidate.parent;
        }
        None
    }

    /// Outer scopes before inner ones. Among siblings, a function called by
    /// name from another sibling goes first unless they call each other.
    pub fn analysis_order(&self) -> Vec<ScopeId> {
        let mut order = Vec::with_capacity(self.scopes.len());
        self.visit(ROOT, &mut order);
        order
    }

    fn visit(&self, id: ScopeId, order: &mut Vec<ScopeId>) {
        order.push(id);
        for child in self.ordered_children(id) {
            self.visit(child, order);
        }
    }

    fn ordered_children(&self, id: ScopeId) -> Vec<ScopeId> {
        let scope = &self.scopes[id];
        let mut by_name: HashMap<&str, ScopeId> = HashMap::new();
        for (name, local) in &scope.locals {
            let function = match local.kind {
                LocalKind::Function(function) => Some(function),
                _ => local.function,
            };
            if let Some(child) = function.and_then(|function| self.scope_of_function(function)) {
                by_name.insert(name.as_str(), child);
            }
        }
        let mut ordered = Vec::with_capacity(scope.children.len());
        let mut placed = HashSet::new();
        let mut visiting = HashSet::new();
        for child in &scope.children {
            self.place(*child, &by_name, &mut placed, &mut visiting, &mut ordered);
        }
        ordered
    }

    fn place(
        &self,
        child: ScopeId,
        by_name: &HashMap<&str, ScopeId>,
        placed: &mut HashSet<ScopeId>,
        visiting: &mut HashSet<ScopeId>,
        ordered: &mut Vec<ScopeId>,
    ) {
        if placed.contains(&child) || !visiting.insert(child) {
            return;
        }
        for callee in called_names(self.scopes[child].body) {
            if let Some(&callee) = by_name.get(callee) {
                if callee != child {
                    self.place(callee, by_name, placed, visiting, ordered);
                }
            }
        }
        visiting.remove(&child);
        placed.insert(child);
        ordered.push(child);
    }
}

/// Gathers the names a body declares, without entering nested functions.
/// Block scoping is not modelled: `let` and `const` bind function-wide.
struct LocalCollector<'a, 'd> {
    locals: IndexMap<String, Local>,
    registry: &'a Registry,
    templates: &'a [String],
    top_level: bool,
    diagnostics: &'d mut Diagnostics,
}

impl LocalCollector<'_, '_> {
    fn is_registered(&self, name: &str) -> bool {
        self.top_level && self.registry.lookup(name).is_some()
    }

    fn insert(&mut self, name: &str, local: Local) {
        self.locals.entry(name.to_string()).or_insert(local);
    }
}

impl<'p> Visitor<'p> for LocalCollector<'_, '_> {
    fn statement(&mut self, statement: &'p Statement) -> bool {
        match statement {
            Statement::Var(var) => {
                for declarator in &var.declarations {
                    let name = declarator.name.name.as_str();
                    if self.is_registered(name) {
                        continue;
                    }
                    let jsdoc = var.jsdoc_for(declarator);
                    let mut local = Local::new(LocalKind::Variable);
                    local.constant =
                        var.kind == VarKind::Const || jsdoc.is_some_and(|doc| doc.is_const);
                    if let Some(annotation) = jsdoc.and_then(|doc| doc.type_annotation.as_ref()) {
                        let resolver = AnnotationResolver::new(self.registry)
                            .with_qualified_templates(self.templates);
                        local.declared = Some(resolver.resolve_or_unknown(annotation, self.diagnostics));
                    }
                    if let Some(ExpressionKind::Function(function)) =
                        declarator.initializer.as_ref().map(|init| &init.kind)
                    {
                        local.function = Some(function.id);
                    }
                    self.insert(name, local);
                }
            }
            Statement::Function(declaration) => {
                let name = declaration.name.name.as_str();
                if !self.is_registered(name) {
                    let mut local = Local::new(LocalKind::Function(declaration.function.id));
                    local.function = Some(declaration.function.id);
                    self.insert(name, local);
                }
            }
            Statement::ForIn(statement) if statement.declaration.is_some() => {
                let local = Local::new(LocalKind::Variable);
                self.insert(&statement.variable.name, local);
            }
            Statement::Try(statement) => {
                if let Some(parameter) = statement
                    .handler
                    .as_ref()
                    .and_then(|handler| handler.parameter.as_ref())
                {
                    let local = Local::new(LocalKind::CatchParameter);
                    self.insert(&parameter.name, local);
                }
            }
            _ => {}
        }
        true
    }

    fn class(&mut self, class: &'p ClassDeclaration) -> bool {
        if !self.is_registered(&class.name.name) {
            self.insert(&class.name.name, Local::new(LocalKind::Class));
        }
        false
    }

    fn function(&mut self, _function: &'p FunctionLiteral) -> bool {
        false
    }
}
