use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceSpan {
    pub fn new(line: usize, column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }

    pub fn single_point(line: usize, column: usize) -> Self {
        Self::new(line, column, line, column)
    }

    pub fn union(a: &Self, b: &Self) -> Self {
        if a.line == 0 {
            return *b;
        }
        if b.line == 0 {
            return *a;
        }

        let (start_line, start_column) =
            if (a.line < b.line) || (a.line == b.line && a.column <= b.column) {
                (a.line, a.column)
            } else {
                (b.line, b.column)
            };

        let (end_line, end_column) = if (a.end_line > b.end_line)
            || (a.end_line == b.end_line && a.end_column >= b.end_column)
        {
            (a.end_line, a.end_column)
        } else {
            (b.end_line, b.end_column)
        };

        Self::new(start_line, start_column, end_line, end_column)
    }

    /// Whether `other` lies entirely inside this span. Spans with line 0 are
    /// synthetic and contain nothing.
    pub fn contains(&self, other: &Self) -> bool {
        if self.line == 0 || other.line == 0 {
            return false;
        }
        let starts_after = (other.line, other.column) >= (self.line, self.column);
        let ends_before = (other.end_line, other.end_column) <= (self.end_line, self.end_column);
        starts_after && ends_before
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Var(VarStatement),
    Function(FunctionDeclaration),
    Class(ClassDeclaration),
    Expression(ExpressionStatement),
    Return(ReturnStatement),
    If(IfStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    For(ForStatement),
    ForIn(ForInStatement),
    Block(Block),
    Break(SourceSpan),
    Continue(SourceSpan),
    Throw(ThrowStatement),
    Try(TryStatement),
    Switch(SwitchStatement),
    Empty(SourceSpan),
}

impl Statement {
    pub fn span(&self) -> SourceSpan {
        match self {
            Statement::Var(var) => var.span,
            Statement::Function(function) => function.function.span,
            Statement::Class(class) => class.span,
            Statement::Expression(statement) => statement.expression.span,
            Statement::Return(statement) => statement.span,
            Statement::If(statement) => statement.span,
            Statement::While(statement) => statement.span,
            Statement::DoWhile(statement) => statement.span,
            Statement::For(statement) => statement.span,
            Statement::ForIn(statement) => statement.span,
            Statement::Block(block) => block.span,
            Statement::Throw(statement) => statement.span,
            Statement::Try(statement) => statement.span,
            Statement::Switch(statement) => statement.span,
            Statement::Break(span) | Statement::Continue(span) | Statement::Empty(span) => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarStatement {
    pub kind: VarKind,
    pub declarations: Vec<VarDeclarator>,
    #[serde(default)]
    pub jsdoc: Option<JsDoc>,
    #[serde(default)]
    pub span: SourceSpan,
}

impl VarStatement {
    /// The JSDoc governing one declarator: its own comment, or the statement's
    /// comment when the statement declares a single name.
    pub fn jsdoc_for<'a>(&'a self, declarator: &'a VarDeclarator) -> Option<&'a JsDoc> {
        declarator.jsdoc.as_ref().or_else(|| {
            if self.declarations.len() == 1 {
                self.jsdoc.as_ref()
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDeclarator {
    pub name: Identifier,
    #[serde(default)]
    pub jsdoc: Option<JsDoc>,
    #[serde(default)]
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: Identifier,
    pub function: FunctionLiteral,
}

/// A function body. `id` is assigned by the parser and is unique per program
/// (externs included); it identifies the function scope across passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionLiteral {
    pub id: usize,
    #[serde(default)]
    pub name: Option<String>,
    pub parameters: Vec<Identifier>,
    pub body: Block,
    #[serde(default)]
    pub jsdoc: Option<JsDoc>,
    #[serde(default)]
    pub is_arrow: bool,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDeclaration {
    pub name: Identifier,
    #[serde(default)]
    pub superclass: Option<Expression>,
    pub members: Vec<ClassMember>,
    #[serde(default)]
    pub jsdoc: Option<JsDoc>,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassMemberKind {
    Constructor,
    Method,
    StaticMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMember {
    pub name: String,
    pub kind: ClassMemberKind,
    pub function: FunctionLiteral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
    #[serde(default)]
    pub jsdoc: Option<JsDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStatement {
    #[serde(default)]
    pub span: SourceSpan,
    #[serde(default)]
    pub expression: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Expression,
    pub consequent: Box<Statement>,
    #[serde(default)]
    pub alternative: Option<Box<Statement>>,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: Box<Statement>,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoWhileStatement {
    pub body: Box<Statement>,
    pub condition: Expression,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStatement {
    #[serde(default)]
    pub init: Option<Box<Statement>>,
    #[serde(default)]
    pub condition: Option<Expression>,
    #[serde(default)]
    pub update: Option<Expression>,
    pub body: Box<Statement>,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForInStatement {
    pub variable: Identifier,
    #[serde(default)]
    pub declaration: Option<VarKind>,
    pub object: Expression,
    pub body: Box<Statement>,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowStatement {
    pub expression: Expression,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryStatement {
    pub block: Block,
    #[serde(default)]
    pub handler: Option<CatchClause>,
    #[serde(default)]
    pub finalizer: Option<Block>,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    #[serde(default)]
    pub parameter: Option<Identifier>,
    pub body: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for `default:`.
    #[serde(default)]
    pub test: Option<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    #[serde(default)]
    pub span: SourceSpan,
}

impl Identifier {
    pub fn new(name: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Not,
    Negative,
    Positive,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Instanceof,
    In,
}

impl BinaryOperator {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
                | BinaryOperator::BitAnd
                | BinaryOperator::BitOr
                | BinaryOperator::BitXor
                | BinaryOperator::ShiftLeft
                | BinaryOperator::ShiftRight
                | BinaryOperator::UnsignedShiftRight
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOperator::Less
                | BinaryOperator::LessEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::StrictEqual
                | BinaryOperator::StrictNotEqual
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::UnsignedShiftRight => ">>>",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::StrictEqual => "===",
            BinaryOperator::StrictNotEqual => "!==",
            BinaryOperator::Instanceof => "instanceof",
            BinaryOperator::In => "in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default)]
    pub span: SourceSpan,
    pub kind: ExpressionKind,
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: SourceSpan) -> Self {
        Self { span, kind }
    }

    /// The dotted name this expression spells (`a.b.c`, `this.x`), if any.
    pub fn qualified_name(&self) -> Option<String> {
        match &self.kind {
            ExpressionKind::Identifier(identifier) => Some(identifier.name.clone()),
            ExpressionKind::This => Some("this".to_string()),
            ExpressionKind::Member(member) => member
                .object
                .qualified_name()
                .map(|object| format!("{}.{}", object, member.property)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionKind {
    Literal(Literal),
    Identifier(Identifier),
    This,
    Member(MemberExpression),
    Index(IndexExpression),
    Call(CallExpression),
    New(CallExpression),
    Function(FunctionLiteral),
    Object(ObjectLiteral),
    Array(ArrayLiteral),
    Unary(UnaryExpression),
    Update(UpdateExpression),
    Binary(BinaryExpression),
    Logical(LogicalExpression),
    Conditional(ConditionalExpression),
    Assignment(AssignmentExpression),
    Cast(CastExpression),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub property: String,
    #[serde(default)]
    pub property_span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexExpression {
    pub object: Box<Expression>,
    pub index: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectLiteral {
    pub properties: Vec<ObjectProperty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub key: String,
    pub value: Expression,
    #[serde(default)]
    pub jsdoc: Option<JsDoc>,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayLiteral {
    pub elements: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateExpression {
    pub operator: UpdateOperator,
    pub prefix: bool,
    pub target: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalExpression {
    pub operator: LogicalOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternative: Box<Expression>,
}

/// `target = value`, or `target op= value` when `operator` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentExpression {
    #[serde(default)]
    pub operator: Option<BinaryOperator>,
    pub target: Box<Expression>,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastExpression {
    pub annotation: TypeAnnotation,
    pub expression: Box<Expression>,
}

// Annotation comments

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Constructor,
    Interface,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDiscipline {
    Struct,
    Dict,
    Unrestricted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JsDoc {
    pub type_annotation: Option<TypeAnnotation>,
    pub params: Vec<ParamTag>,
    pub return_type: Option<TypeAnnotation>,
    pub this_type: Option<TypeAnnotation>,
    pub templates: Vec<String>,
    pub kind: Option<DeclarationKind>,
    pub extends: Vec<TypeAnnotation>,
    pub implements: Vec<TypeAnnotation>,
    pub is_enum: bool,
    pub enum_type: Option<TypeAnnotation>,
    pub typedef: Option<TypeAnnotation>,
    pub is_typedef: bool,
    pub is_const: bool,
    pub is_abstract: bool,
    pub access: Option<AccessDiscipline>,
    pub suppressions: Vec<String>,
    pub span: SourceSpan,
}

impl JsDoc {
    pub fn param(&self, name: &str) -> Option<&TypeAnnotation> {
        self.params
            .iter()
            .find(|param| param.name == name)
            .map(|param| &param.annotation)
    }

    /// Whether the comment says anything about a function signature.
    pub fn has_function_info(&self) -> bool {
        !self.params.is_empty()
            || self.return_type.is_some()
            || self.this_type.is_some()
            || !self.templates.is_empty()
            || self.kind.is_some()
    }

    pub fn is_nominal_declaration(&self) -> bool {
        self.kind.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamTag {
    pub name: String,
    pub annotation: TypeAnnotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAnnotation {
    pub kind: TypeAnnotationKind,
    #[serde(default)]
    pub span: SourceSpan,
}

impl TypeAnnotation {
    pub fn new(kind: TypeAnnotationKind) -> Self {
        Self {
            kind,
            span: SourceSpan::default(),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.kind, TypeAnnotationKind::Optional(_))
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, TypeAnnotationKind::Rest(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeAnnotationKind {
    /// `*`
    Any,
    /// `?`
    Unknown,
    Named {
        name: String,
        #[serde(default)]
        arguments: Vec<TypeAnnotation>,
    },
    Nullable(Box<TypeAnnotation>),
    NonNull(Box<TypeAnnotation>),
    Optional(Box<TypeAnnotation>),
    Rest(Box<TypeAnnotation>),
    Union(Vec<TypeAnnotation>),
    Record(Vec<RecordField>),
    Function(FunctionAnnotation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    #[serde(default)]
    pub annotation: Option<TypeAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionAnnotation {
    #[serde(default)]
    pub this_type: Option<Box<TypeAnnotation>>,
    #[serde(default)]
    pub new_type: Option<Box<TypeAnnotation>>,
    pub parameters: Vec<TypeAnnotation>,
    #[serde(default)]
    pub return_type: Option<Box<TypeAnnotation>>,
}
