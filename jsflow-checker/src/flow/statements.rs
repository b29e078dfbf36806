use super::conditions::Branches;
use super::env::FlowEnv;
use super::scope::Local;
use super::{JumpFrame, JumpKind, ScopeWalker, MAX_LOOP_ROUNDS};
use crate::ast::{
    Block, ForInStatement, ForStatement, ReturnStatement, SourceSpan, Statement, SwitchStatement,
    TryStatement, VarKind, VarStatement,
};
use crate::diagnostics::DiagnosticKind;
use crate::types::Type;

/// What one analysis of a loop body produced.
struct LoopRound {
    /// Environment flowing back to the loop head.
    back: FlowEnv,
    exit: FlowEnv,
}

impl ScopeWalker<'_, '_, '_> {
    pub(super) fn block(&mut self, statements: &[Statement], env: &mut FlowEnv) {
        for statement in statements {
            self.statement(statement, env);
            if let Some(frame) = self.try_frames.last_mut() {
                frame.push(env.clone());
            }
        }
    }

    fn statement(&mut self, statement: &Statement, env: &mut FlowEnv) {
        match statement {
            Statement::Var(var) => self.var_statement(var, env),
            Statement::Function(_) | Statement::Empty(_) => {}
            Statement::Class(class) => self.requires_transpilation("class declaration", class.span),
            Statement::Expression(statement) => {
                self.infer(&statement.expression, env);
            }
            Statement::Return(statement) => self.return_statement(statement, env),
            Statement::If(statement) => {
                let entry = std::mem::replace(env, FlowEnv::dead());
                let branches = self.branch_on(&statement.condition, entry);
                let mut consequent = branches.when_true;
                self.statement(&statement.consequent, &mut consequent);
                let mut alternative = branches.when_false;
                if let Some(alternative_statement) = &statement.alternative {
                    self.statement(alternative_statement, &mut alternative);
                }
                *env = consequent.join(&alternative, &self.lattice);
            }
            Statement::While(statement) => {
                self.run_loop(env, |walker, entry| {
                    let branches = walker.branch_on(&statement.condition, entry);
                    walker.jumps.push(JumpFrame::new(JumpKind::Loop));
                    let mut body = branches.when_true;
                    walker.statement(&statement.body, &mut body);
                    walker.finish_round(body, branches.when_false)
                });
            }
            Statement::DoWhile(statement) => {
                self.run_loop(env, |walker, entry| {
                    walker.jumps.push(JumpFrame::new(JumpKind::Loop));
                    let mut body = entry;
                    walker.statement(&statement.body, &mut body);
                    let frame = walker.jumps.pop();
                    let mut continued = body;
                    if let Some(frame) = &frame {
                        for env in &frame.continues {
                            continued = continued.join(env, &walker.lattice);
                        }
                    }
                    let branches = walker.branch_on(&statement.condition, continued);
                    let mut exit = branches.when_false;
                    if let Some(frame) = &frame {
                        for env in &frame.breaks {
                            exit = exit.join(env, &walker.lattice);
                        }
                    }
                    LoopRound {
                        back: branches.when_true,
                        exit,
                    }
                });
            }
            Statement::For(statement) => self.for_statement(statement, env),
            Statement::ForIn(statement) => self.for_in_statement(statement, env),
            Statement::Block(block) => self.block(&block.statements, env),
            Statement::Break(_) => {
                if let Some(frame) = self.jumps.last_mut() {
                    frame.breaks.push(env.clone());
                }
                env.kill();
            }
            Statement::Continue(_) => {
                if let Some(frame) = self
                    .jumps
                    .iter_mut()
                    .rev()
                    .find(|frame| frame.kind == JumpKind::Loop)
                {
                    frame.continues.push(env.clone());
                }
                env.kill();
            }
            Statement::Throw(statement) => {
                self.infer(&statement.expression, env);
                if let Some(frame) = self.try_frames.last_mut() {
                    frame.push(env.clone());
                }
                env.kill();
            }
            Statement::Try(statement) => self.try_statement(statement, env),
            Statement::Switch(statement) => self.switch_statement(statement, env),
        }
    }

    fn var_statement(&mut self, var: &VarStatement, env: &mut FlowEnv) {
        if var.kind != VarKind::Var {
            self.requires_transpilation("let and const declarations", var.span);
        }
        let tree = self.tree;
        for declarator in &var.declarations {
            let Some(initializer) = &declarator.initializer else {
                continue;
            };
            let value = self.infer(initializer, env);
            let name = &declarator.name.name;
            if let Some((scope, local)) = tree.resolve(self.scope, name) {
                if scope == self.scope {
                    self.assign_local(env, name, local, value, initializer.span, true);
                }
            }
        }
    }

    /// Binds a current-scope local, checking constness and the declared type.
    pub(super) fn assign_local(
        &mut self,
        env: &mut FlowEnv,
        name: &str,
        local: &Local,
        value: Type,
        span: SourceSpan,
        declaring: bool,
    ) {
        if local.constant && !declaring {
            self.report(
                DiagnosticKind::ConstReassigned,
                format!("constant {name} assigned a value more than once"),
                span,
            );
        }
        let stored = match &local.declared {
            Some(declared) if !self.lattice.is_subtype(&value, declared) => {
                let message = self.mismatch(
                    format!(
                        "assignment to {name}: found {}, required {}",
                        self.describe(&value),
                        self.describe(declared)
                    ),
                    &value,
                    declared,
                );
                self.report(DiagnosticKind::MistypedAssignRhs, message, span);
                declared.clone()
            }
            Some(declared) if value.is_unknown() || value.is_bottom() => declared.clone(),
            _ => value,
        };
        self.write_local(env, name, stored);
    }

    fn return_statement(&mut self, statement: &ReturnStatement, env: &mut FlowEnv) {
        let ty = match &statement.expression {
            Some(expression) => self.infer(expression, env),
            None => Type::undefined(),
        };
        if let Some(declared) = self.declared_return.clone() {
            if !self.lattice.is_subtype(&ty, &declared) {
                let message = self.mismatch(
                    format!(
                        "returning {} where {} is declared",
                        self.describe(&ty),
                        self.describe(&declared)
                    ),
                    &ty,
                    &declared,
                );
                self.report(DiagnosticKind::ReturnTypeMismatch, message, statement.span);
            }
        }
        // Early loop rounds see provisional types.
        if env.is_live() && self.muted == 0 {
            self.returns.push(ty);
        }
        env.kill();
    }

    fn for_statement(&mut self, statement: &ForStatement, env: &mut FlowEnv) {
        if let Some(init) = &statement.init {
            self.statement(init, env);
        }
        self.run_loop(env, |walker, entry| {
            let branches = match &statement.condition {
                Some(condition) => walker.branch_on(condition, entry),
                None => Branches {
                    ty: Type::boolean(),
                    when_true: entry,
                    when_false: FlowEnv::dead(),
                },
            };
            walker.jumps.push(JumpFrame::new(JumpKind::Loop));
            let mut body = branches.when_true;
            walker.statement(&statement.body, &mut body);
            let mut round = walker.finish_round(body, branches.when_false);
            if let Some(update) = &statement.update {
                walker.infer(update, &mut round.back);
            }
            round
        });
    }

    fn for_in_statement(&mut self, statement: &ForInStatement, env: &mut FlowEnv) {
        if matches!(statement.declaration, Some(VarKind::Let | VarKind::Const)) {
            self.requires_transpilation("let and const declarations", statement.span);
        }
        let object = self.infer(&statement.object, env);
        if object.is_scalar_only() && !object.is_null_or_undefined() && !object.primitives().is_empty() {
            self.report(
                DiagnosticKind::InvalidOperandType,
                format!("for-in over {}, which has no properties", self.describe(&object)),
                statement.object.span,
            );
        }
        self.run_loop(env, |walker, entry| {
            let exit = entry.clone();
            walker.jumps.push(JumpFrame::new(JumpKind::Loop));
            let mut body = entry;
            walker.assign_name(&statement.variable, Type::string(), statement.variable.span, &mut body);
            walker.statement(&statement.body, &mut body);
            walker.finish_round(body, exit)
        });
    }

    /// Pops the loop's jump frame and joins `continue`s into the back edge
    /// and `break`s into the exit.
    fn finish_round(&mut self, body: FlowEnv, exit: FlowEnv) -> LoopRound {
        let frame = self.jumps.pop();
        let mut back = body;
        let mut exit = exit;
        if let Some(frame) = frame {
            for env in &frame.continues {
                back = back.join(env, &self.lattice);
            }
            for env in &frame.breaks {
                exit = exit.join(env, &self.lattice);
            }
        }
        LoopRound { back, exit }
    }

    /// Analyses a loop body until the head environment stops changing or
    /// the round limit is hit. Only the final round reports diagnostics.
    fn run_loop(&mut self, env: &mut FlowEnv, mut round: impl FnMut(&mut Self, FlowEnv) -> LoopRound) {
        let initial = env.clone();
        let mut entry = initial.clone();
        for _ in 1..MAX_LOOP_ROUNDS {
            self.muted += 1;
            let result = round(self, entry.clone());
            self.muted -= 1;
            let next = initial.join(&result.back, &self.lattice);
            if next == entry {
                break;
            }
            entry = next;
        }
        let result = round(self, entry);
        *env = result.exit;
    }

    fn try_statement(&mut self, statement: &TryStatement, env: &mut FlowEnv) {
        self.try_frames.push(vec![env.clone()]);
        let mut body = env.clone();
        self.block(&statement.block.statements, &mut body);
        let snapshots = self.try_frames.pop().unwrap_or_default();

        let mut after = match &statement.handler {
            Some(handler) => {
                let mut caught = FlowEnv::join_all(snapshots.iter(), &self.lattice);
                caught.revive();
                if let Some(parameter) = &handler.parameter {
                    self.write_local(&mut caught, &parameter.name, Type::Unknown);
                }
                self.block(&handler.body.statements, &mut caught);
                body.join(&caught, &self.lattice)
            }
            None => {
                if let Some(outer) = self.try_frames.last_mut() {
                    outer.extend(snapshots.iter().cloned());
                }
                body
            }
        };

        if let Some(finalizer) = &statement.finalizer {
            self.finally_block(finalizer, &snapshots, &mut after);
        }
        *env = after;
    }

    fn finally_block(&mut self, finalizer: &Block, snapshots: &[FlowEnv], after: &mut FlowEnv) {
        if after.is_live() {
            self.block(&finalizer.statements, after);
            return;
        }
        // Every normal path left the try; the finalizer still runs on the
        // abrupt ones.
        let mut abrupt = FlowEnv::join_all(snapshots.iter(), &self.lattice);
        abrupt.revive();
        self.block(&finalizer.statements, &mut abrupt);
    }

    fn switch_statement(&mut self, statement: &SwitchStatement, env: &mut FlowEnv) {
        self.infer(&statement.discriminant, env);
        self.jumps.push(JumpFrame::new(JumpKind::Switch));
        let mut falling = FlowEnv::dead();
        let mut has_default = false;
        for case in &statement.cases {
            let mut entry = env.clone();
            match &case.test {
                Some(test) => {
                    self.infer(test, &mut entry);
                }
                None => has_default = true,
            }
            let mut case_env = entry.join(&falling, &self.lattice);
            self.block(&case.body, &mut case_env);
            falling = case_env;
        }
        let mut exit = falling;
        if let Some(frame) = self.jumps.pop() {
            for broken in &frame.breaks {
                exit = exit.join(broken, &self.lattice);
            }
        }
        if !has_default {
            exit = exit.join(env, &self.lattice);
        }
        *env = exit;
    }
}
