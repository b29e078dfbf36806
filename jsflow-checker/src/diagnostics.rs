use serde::{Deserialize, Serialize};

use crate::ast::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticFamily {
    ValueMismatch,
    DeclarationConflict,
    StructuralMisuse,
    Generics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticKind {
    // value/operator mismatches
    MistypedAssignRhs,
    InvalidArgumentType,
    ReturnTypeMismatch,
    MissingReturnStatement,
    InvalidOperandType,
    InvalidIndexType,
    InvalidCast,
    InvalidThisType,
    ConstReassigned,
    ConstPropertyReassigned,
    WrongArgumentCount,
    UnknownExpressionType,
    // declaration conflicts
    RedeclaredProperty,
    InvalidPropertyOverride,
    InterfaceMemberNotImplemented,
    SuperInterfaceConflict,
    AbstractMethodInConcreteClass,
    AbstractMethodNotImplemented,
    StructDictInheritanceMismatch,
    InheritanceCycle,
    ConstWithoutInitializer,
    EnumInitializerNotObjectLiteral,
    DuplicateEnumKey,
    InvalidEnumBackingType,
    EnumMemberTypeMismatch,
    CyclicTypedef,
    MalformedTypedef,
    DuplicateTypeDeclaration,
    MisplacedAnnotation,
    RequiredAfterOptional,
    RestNotLast,
    UnrecognizedTypeName,
    IncompatibleReceiverUnion,
    UninhabitableType,
    RequiresTranspilation,
    // structural misuse
    NotCallable,
    NotAConstructor,
    ConstructorCalledWithoutNew,
    CannotInstantiateInterface,
    CannotInstantiateAbstractClass,
    NullableDereference,
    PropertyAccessOnNonObject,
    InexistentProperty,
    PossiblyInexistentProperty,
    IllegalPropertyCreationOnStruct,
    IllegalBracketAccessOnStruct,
    IllegalDotAccessOnDict,
    UndefinedName,
    InvalidInstanceofTarget,
    // generics misuse
    GenericArgumentsOnNonGenericType,
    WrongTypeArgumentCount,
    NotUniqueInstantiation,
    ConflictingExtendedType,
    ImplementsNonInterface,
}

impl DiagnosticKind {
    /// Stable name, usable in `@suppress {...}`.
    pub fn name(self) -> &'static str {
        match self {
            DiagnosticKind::MistypedAssignRhs => "mistypedAssignRhs",
            DiagnosticKind::InvalidArgumentType => "invalidArgumentType",
            DiagnosticKind::ReturnTypeMismatch => "returnTypeMismatch",
            DiagnosticKind::MissingReturnStatement => "missingReturnStatement",
            DiagnosticKind::InvalidOperandType => "invalidOperandType",
            DiagnosticKind::InvalidIndexType => "invalidIndexType",
            DiagnosticKind::InvalidCast => "invalidCast",
            DiagnosticKind::InvalidThisType => "invalidThisType",
            DiagnosticKind::ConstReassigned => "constReassigned",
            DiagnosticKind::ConstPropertyReassigned => "constPropertyReassigned",
            DiagnosticKind::WrongArgumentCount => "wrongArgumentCount",
            DiagnosticKind::UnknownExpressionType => "unknownExpressionType",
            DiagnosticKind::RedeclaredProperty => "redeclaredProperty",
            DiagnosticKind::InvalidPropertyOverride => "invalidPropertyOverride",
            DiagnosticKind::InterfaceMemberNotImplemented => "interfaceMemberNotImplemented",
            DiagnosticKind::SuperInterfaceConflict => "superInterfaceConflict",
            DiagnosticKind::AbstractMethodInConcreteClass => "abstractMethodInConcreteClass",
            DiagnosticKind::AbstractMethodNotImplemented => "abstractMethodNotImplemented",
            DiagnosticKind::StructDictInheritanceMismatch => "structDictInheritanceMismatch",
            DiagnosticKind::InheritanceCycle => "inheritanceCycle",
            DiagnosticKind::ConstWithoutInitializer => "constWithoutInitializer",
            DiagnosticKind::EnumInitializerNotObjectLiteral => "enumInitializerNotObjectLiteral",
            DiagnosticKind::DuplicateEnumKey => "duplicateEnumKey",
            DiagnosticKind::InvalidEnumBackingType => "invalidEnumBackingType",
            DiagnosticKind::EnumMemberTypeMismatch => "enumMemberTypeMismatch",
            DiagnosticKind::CyclicTypedef => "cyclicTypedef",
            DiagnosticKind::MalformedTypedef => "malformedTypedef",
            DiagnosticKind::DuplicateTypeDeclaration => "duplicateTypeDeclaration",
            DiagnosticKind::MisplacedAnnotation => "misplacedAnnotation",
            DiagnosticKind::RequiredAfterOptional => "requiredAfterOptional",
            DiagnosticKind::RestNotLast => "restNotLast",
            DiagnosticKind::UnrecognizedTypeName => "unrecognizedTypeName",
            DiagnosticKind::IncompatibleReceiverUnion => "incompatibleReceiverUnion",
            DiagnosticKind::UninhabitableType => "uninhabitableType",
            DiagnosticKind::RequiresTranspilation => "requiresTranspilation",
            DiagnosticKind::NotCallable => "notCallable",
            DiagnosticKind::NotAConstructor => "notAConstructor",
            DiagnosticKind::ConstructorCalledWithoutNew => "constructorCalledWithoutNew",
            DiagnosticKind::CannotInstantiateInterface => "cannotInstantiateInterface",
            DiagnosticKind::CannotInstantiateAbstractClass => "cannotInstantiateAbstractClass",
            DiagnosticKind::NullableDereference => "nullableDereference",
            DiagnosticKind::PropertyAccessOnNonObject => "propertyAccessOnNonObject",
            DiagnosticKind::InexistentProperty => "inexistentProperty",
            DiagnosticKind::PossiblyInexistentProperty => "possiblyInexistentProperty",
            DiagnosticKind::IllegalPropertyCreationOnStruct => "illegalPropertyCreationOnStruct",
            DiagnosticKind::IllegalBracketAccessOnStruct => "illegalBracketAccessOnStruct",
            DiagnosticKind::IllegalDotAccessOnDict => "illegalDotAccessOnDict",
            DiagnosticKind::UndefinedName => "undefinedName",
            DiagnosticKind::InvalidInstanceofTarget => "invalidInstanceofTarget",
            DiagnosticKind::GenericArgumentsOnNonGenericType => "genericArgumentsOnNonGenericType",
            DiagnosticKind::WrongTypeArgumentCount => "wrongTypeArgumentCount",
            DiagnosticKind::NotUniqueInstantiation => "notUniqueInstantiation",
            DiagnosticKind::ConflictingExtendedType => "conflictingExtendedType",
            DiagnosticKind::ImplementsNonInterface => "implementsNonInterface",
        }
    }

    pub fn family(self) -> DiagnosticFamily {
        use DiagnosticKind::*;
        match self {
            MistypedAssignRhs | InvalidArgumentType | ReturnTypeMismatch
            | MissingReturnStatement | InvalidOperandType | InvalidIndexType | InvalidCast
            | InvalidThisType | ConstReassigned | ConstPropertyReassigned | WrongArgumentCount
            | UnknownExpressionType => DiagnosticFamily::ValueMismatch,
            RedeclaredProperty
            | InvalidPropertyOverride
            | InterfaceMemberNotImplemented
            | SuperInterfaceConflict
            | AbstractMethodInConcreteClass
            | AbstractMethodNotImplemented
            | StructDictInheritanceMismatch
            | InheritanceCycle
            | ConstWithoutInitializer
            | EnumInitializerNotObjectLiteral
            | DuplicateEnumKey
            | InvalidEnumBackingType
            | EnumMemberTypeMismatch
            | CyclicTypedef
            | MalformedTypedef
            | DuplicateTypeDeclaration
            | MisplacedAnnotation
            | RequiredAfterOptional
            | RestNotLast
            | UnrecognizedTypeName
            | IncompatibleReceiverUnion
            | UninhabitableType
            | RequiresTranspilation => DiagnosticFamily::DeclarationConflict,
            NotCallable
            | NotAConstructor
            | ConstructorCalledWithoutNew
            | CannotInstantiateInterface
            | CannotInstantiateAbstractClass
            | NullableDereference
            | PropertyAccessOnNonObject
            | InexistentProperty
            | PossiblyInexistentProperty
            | IllegalPropertyCreationOnStruct
            | IllegalBracketAccessOnStruct
            | IllegalDotAccessOnDict
            | UndefinedName
            | InvalidInstanceofTarget => DiagnosticFamily::StructuralMisuse,
            GenericArgumentsOnNonGenericType
            | WrongTypeArgumentCount
            | NotUniqueInstantiation
            | ConflictingExtendedType
            | ImplementsNonInterface => DiagnosticFamily::Generics,
        }
    }

    /// Coarse suppression group a kind belongs to.
    pub fn group(self) -> &'static str {
        use DiagnosticKind::*;
        match self {
            InexistentProperty | PossiblyInexistentProperty => "missingProperties",
            MissingReturnStatement => "missingReturn",
            ConstReassigned | ConstPropertyReassigned | ConstWithoutInitializer => "const",
            UnknownExpressionType => "reportUnknownTypes",
            IllegalPropertyCreationOnStruct
            | IllegalBracketAccessOnStruct
            | IllegalDotAccessOnDict
            | StructDictInheritanceMismatch => "strictAccess",
            UndefinedName => "undefinedVars",
            RequiresTranspilation => "transpilation",
            _ => "checkTypes",
        }
    }

    pub fn default_level(self) -> DiagnosticLevel {
        match self {
            DiagnosticKind::UnknownExpressionType
            | DiagnosticKind::PossiblyInexistentProperty
            | DiagnosticKind::RequiresTranspilation => DiagnosticLevel::Warning,
            _ => DiagnosticLevel::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub level: DiagnosticLevel,
    pub span: Option<SourceSpan>,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push<S: Into<String>>(&mut self, kind: DiagnosticKind, message: S, span: SourceSpan) {
        self.push_with_level(kind, kind.default_level(), message, Some(span));
    }

    pub fn push_with_level<S: Into<String>>(
        &mut self,
        kind: DiagnosticKind,
        level: DiagnosticLevel,
        message: S,
        span: Option<SourceSpan>,
    ) {
        self.entries.push(Diagnostic {
            kind,
            message: message.into(),
            level,
            span,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|diagnostic| diagnostic.level == DiagnosticLevel::Error)
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Diagnostic] {
        &mut self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.entries
            .iter()
            .filter(|diagnostic| diagnostic.kind == kind)
            .count()
    }

    pub(crate) fn retain<F: FnMut(&Diagnostic) -> bool>(&mut self, keep: F) {
        self.entries.retain(keep);
    }

    /// Orders diagnostics by position; diagnostics without a span sort last.
    /// Equal positions keep their emission order.
    pub(crate) fn sort_by_position(&mut self) {
        self.entries.sort_by_key(|diagnostic| match diagnostic.span {
            Some(span) => (0, span.line, span.column),
            None => (1, 0, 0),
        });
    }

    /// Drops exact repeats (same kind, span and message).
    pub(crate) fn dedup(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.entries.retain(|diagnostic| {
            seen.insert((diagnostic.kind, diagnostic.span, diagnostic.message.clone()))
        });
    }
}

/// Lexical `@suppress {...}` regions collected from annotations.
#[derive(Debug, Default, Clone)]
pub struct Suppressions {
    regions: Vec<(SourceSpan, Vec<String>)>,
}

impl Suppressions {
    pub fn add(&mut self, span: SourceSpan, names: &[String]) {
        if names.is_empty() {
            return;
        }
        self.regions.push((span, names.to_vec()));
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn suppresses(&self, diagnostic: &Diagnostic) -> bool {
        let Some(span) = diagnostic.span else {
            return false;
        };
        self.regions.iter().any(|(region, names)| {
            region.contains(&span)
                && names.iter().any(|name| {
                    name == diagnostic.kind.name() || name == diagnostic.kind.group()
                })
        })
    }
}
