mod annotations;
mod ast;
pub mod builder;
mod checker;
mod collector;
mod deferred;
mod diagnostics;
mod flow;
pub mod registry;
mod source;
pub mod types;
mod walk;

pub use crate::ast::{
    AccessDiscipline, ArrayLiteral, AssignmentExpression, BinaryExpression, BinaryOperator, Block,
    CallExpression, CastExpression, CatchClause, ClassDeclaration, ClassMember, ClassMemberKind,
    ConditionalExpression, DeclarationKind, DoWhileStatement, Expression, ExpressionKind,
    ExpressionStatement, ForInStatement, ForStatement, FunctionAnnotation, FunctionDeclaration,
    FunctionLiteral, Identifier, IfStatement, IndexExpression, JsDoc, Literal, LogicalExpression,
    LogicalOperator, MemberExpression, ObjectLiteral, ObjectProperty, ParamTag, Program,
    RecordField, ReturnStatement, SourceSpan, Statement, SwitchCase, SwitchStatement,
    ThrowStatement, TryStatement, TypeAnnotation, TypeAnnotationKind, UnaryExpression,
    UnaryOperator, UpdateExpression, UpdateOperator, VarDeclarator, VarKind, VarStatement,
    WhileStatement,
};
pub use crate::builder::{AstBuilder, Doc};
pub use crate::checker::{CheckOptions, CheckOutcome, Checker, InputMode};
pub use crate::collector::{collect, CollectedProgram};
pub use crate::deferred::{CallSite, DeferredCheck, DeferredChecks};
pub use crate::diagnostics::{
    Diagnostic, DiagnosticFamily, DiagnosticKind, DiagnosticLevel, Diagnostics, Suppressions,
};
pub use crate::flow::{FunctionSummary, MAX_LOOP_ROUNDS};
pub use crate::registry::Registry;
pub use crate::source::{load_program, SourceFile, SourceFormat};
