//! Type values.
//!
//! A [`Type`] is bottom, top (`*`), unknown (`?`), or a normalized union of
//! members: a set of primitive tags, enum-member types, template type
//! variables and object types. Operations that need to know about declared
//! nominal types (join, subtyping, narrowing, unification) live on
//! [`Lattice`], which borrows the [`Registry`].

mod explain;
mod lattice;
mod unify;

use std::fmt;
use std::ops::{BitAnd, BitOr};

use indexmap::IndexMap;

use crate::registry::{EnumId, NamespaceId, NominalId, Registry};

pub use lattice::{Lattice, TypeTag};
pub use unify::{Substitution, UnifyError};

pub(crate) use unify::substitute_syntactic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct PrimitiveSet(u8);

impl PrimitiveSet {
    pub const EMPTY: PrimitiveSet = PrimitiveSet(0);
    pub const NULL: PrimitiveSet = PrimitiveSet(1);
    pub const UNDEFINED: PrimitiveSet = PrimitiveSet(1 << 1);
    pub const TRUE: PrimitiveSet = PrimitiveSet(1 << 2);
    pub const FALSE: PrimitiveSet = PrimitiveSet(1 << 3);
    pub const BOOLEAN: PrimitiveSet = PrimitiveSet((1 << 2) | (1 << 3));
    pub const NUMBER: PrimitiveSet = PrimitiveSet(1 << 4);
    pub const STRING: PrimitiveSet = PrimitiveSet(1 << 5);
    pub const NULL_OR_UNDEFINED: PrimitiveSet = PrimitiveSet(1 | (1 << 1));
    pub const ALL: PrimitiveSet = PrimitiveSet(0b11_1111);

    /// Single-tag sets, in display order.
    pub const TAGS: [PrimitiveSet; 6] = [
        PrimitiveSet::NULL,
        PrimitiveSet::UNDEFINED,
        PrimitiveSet::TRUE,
        PrimitiveSet::FALSE,
        PrimitiveSet::NUMBER,
        PrimitiveSet::STRING,
    ];

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: PrimitiveSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: PrimitiveSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn without(self, other: PrimitiveSet) -> PrimitiveSet {
        PrimitiveSet(self.0 & !other.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> PrimitiveSet {
        PrimitiveSet(bits & Self::ALL.0)
    }
}

impl BitOr for PrimitiveSet {
    type Output = PrimitiveSet;

    fn bitor(self, rhs: PrimitiveSet) -> PrimitiveSet {
        PrimitiveSet(self.0 | rhs.0)
    }
}

impl BitAnd for PrimitiveSet {
    type Output = PrimitiveSet;

    fn bitand(self, rhs: PrimitiveSet) -> PrimitiveSet {
        PrimitiveSet(self.0 & rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Bottom,
    /// `*`: every value; only `*` and `?` are supertypes of it.
    Top,
    /// `?`: the gradual type, compatible in both directions.
    Unknown,
    /// A normalized, non-empty set of members. Single members are unions of
    /// one.
    Union(Box<UnionType>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnionType {
    pub primitives: PrimitiveSet,
    /// Sorted, unique.
    pub enums: Vec<EnumId>,
    /// Qualified template variable names (`Owner#T`), sorted, unique.
    pub type_vars: Vec<String>,
    /// At most one member per [`ObjectIdentity`], sorted by identity.
    pub objects: Vec<ObjectType>,
}

impl UnionType {
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
            && self.enums.is_empty()
            && self.type_vars.is_empty()
            && self.objects.is_empty()
    }

    fn member_count(&self) -> usize {
        PrimitiveSet::TAGS
            .iter()
            .filter(|tag| self.primitives.contains(**tag))
            .count()
            + self.enums.len()
            + self.type_vars.len()
            + self.objects.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectType {
    Instance(NominalInstance),
    Record(RecordType),
    Function(FunctionType),
    /// A namespace value: a real or incidental namespace object, a
    /// constructor (with its statics) or an enum object.
    Namespace(NamespaceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObjectIdentity {
    Nominal(NominalId),
    Namespace(NamespaceId),
    Record,
    Function,
}

impl ObjectType {
    pub fn identity(&self) -> ObjectIdentity {
        match self {
            ObjectType::Instance(instance) => ObjectIdentity::Nominal(instance.id),
            ObjectType::Namespace(id) => ObjectIdentity::Namespace(*id),
            ObjectType::Record(_) => ObjectIdentity::Record,
            ObjectType::Function(_) => ObjectIdentity::Function,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NominalInstance {
    pub id: NominalId,
    pub args: Vec<Type>,
}

impl NominalInstance {
    pub fn new(id: NominalId, args: Vec<Type>) -> Self {
        Self { id, args }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub ty: Type,
    pub optional: bool,
    pub declared: bool,
    pub constant: bool,
}

impl Property {
    pub fn declared(ty: Type) -> Self {
        Self {
            ty,
            optional: false,
            declared: true,
            constant: false,
        }
    }

    pub fn inferred(ty: Type) -> Self {
        Self {
            ty,
            optional: false,
            declared: false,
            constant: false,
        }
    }

    pub fn optional(ty: Type) -> Self {
        Self {
            ty,
            optional: true,
            declared: true,
            constant: false,
        }
    }
}

/// A structural object type.
///
/// `exact` records come from object literals: every property is known.
/// `loose` records are provisional shapes built from property uses on an
/// undeclared parameter; they are compatible with any object whose matching
/// fields agree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordType {
    pub properties: IndexMap<String, Property>,
    pub exact: bool,
    pub loose: bool,
}

impl RecordType {
    pub fn new(properties: IndexMap<String, Property>) -> Self {
        Self {
            properties,
            exact: false,
            loose: false,
        }
    }

    pub fn exact(properties: IndexMap<String, Property>) -> Self {
        Self {
            properties,
            exact: true,
            loose: false,
        }
    }

    pub fn loose() -> Self {
        Self {
            properties: IndexMap::new(),
            exact: false,
            loose: true,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub required: Vec<Type>,
    pub optional: Vec<Type>,
    pub rest: Option<Type>,
    pub return_type: Type,
    pub receiver: Option<Type>,
    /// Instance type produced by `new`; set for constructors only.
    pub constructs: Option<Type>,
    pub type_params: Vec<String>,
    /// Placeholder for "some function": compatible with every function.
    pub loose: bool,
}

impl FunctionType {
    pub fn new(required: Vec<Type>, return_type: Type) -> Self {
        Self {
            required,
            optional: Vec::new(),
            rest: None,
            return_type,
            receiver: None,
            constructs: None,
            type_params: Vec::new(),
            loose: false,
        }
    }

    /// The top of the function types.
    pub fn any() -> Self {
        Self {
            required: Vec::new(),
            optional: Vec::new(),
            rest: Some(Type::Unknown),
            return_type: Type::Unknown,
            receiver: None,
            constructs: None,
            type_params: Vec::new(),
            loose: true,
        }
    }

    pub fn min_arity(&self) -> usize {
        self.required.len()
    }

    pub fn max_arity(&self) -> Option<usize> {
        if self.rest.is_some() {
            None
        } else {
            Some(self.required.len() + self.optional.len())
        }
    }

    /// Type of the formal at `index`, falling back to the rest type.
    pub fn param(&self, index: usize) -> Option<&Type> {
        if index < self.required.len() {
            return self.required.get(index);
        }
        let optional_index = index - self.required.len();
        if optional_index < self.optional.len() {
            return self.optional.get(optional_index);
        }
        self.rest.as_ref()
    }

    pub fn positional_len(&self) -> usize {
        self.required.len() + self.optional.len()
    }

    pub fn is_constructor(&self) -> bool {
        self.constructs.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::Unknown
    }
}

impl Type {
    pub fn primitive(set: PrimitiveSet) -> Type {
        if set.is_empty() {
            return Type::Bottom;
        }
        Type::Union(Box::new(UnionType {
            primitives: set,
            ..UnionType::default()
        }))
    }

    pub fn null() -> Type {
        Type::primitive(PrimitiveSet::NULL)
    }

    pub fn undefined() -> Type {
        Type::primitive(PrimitiveSet::UNDEFINED)
    }

    pub fn boolean() -> Type {
        Type::primitive(PrimitiveSet::BOOLEAN)
    }

    pub fn number() -> Type {
        Type::primitive(PrimitiveSet::NUMBER)
    }

    pub fn string() -> Type {
        Type::primitive(PrimitiveSet::STRING)
    }

    pub fn object(object: ObjectType) -> Type {
        Type::Union(Box::new(UnionType {
            objects: vec![object],
            ..UnionType::default()
        }))
    }

    pub fn instance(id: NominalId, args: Vec<Type>) -> Type {
        Type::object(ObjectType::Instance(NominalInstance::new(id, args)))
    }

    pub fn record(record: RecordType) -> Type {
        Type::object(ObjectType::Record(record))
    }

    pub fn function(function: FunctionType) -> Type {
        Type::object(ObjectType::Function(function))
    }

    pub fn namespace(id: NamespaceId) -> Type {
        Type::object(ObjectType::Namespace(id))
    }

    pub fn enum_member(id: EnumId) -> Type {
        Type::Union(Box::new(UnionType {
            enums: vec![id],
            ..UnionType::default()
        }))
    }

    pub fn type_var(name: impl Into<String>) -> Type {
        Type::Union(Box::new(UnionType {
            type_vars: vec![name.into()],
            ..UnionType::default()
        }))
    }

    pub(crate) fn from_union(union: UnionType) -> Type {
        if union.is_empty() {
            Type::Bottom
        } else {
            Type::Union(Box::new(union))
        }
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Type::Bottom)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Type::Top)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn as_union(&self) -> Option<&UnionType> {
        match self {
            Type::Union(union) => Some(union),
            _ => None,
        }
    }

    pub fn primitives(&self) -> PrimitiveSet {
        self.as_union()
            .map(|union| union.primitives)
            .unwrap_or(PrimitiveSet::EMPTY)
    }

    pub fn objects(&self) -> &[ObjectType] {
        self.as_union()
            .map(|union| union.objects.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_objects(&self) -> bool {
        !self.objects().is_empty()
    }

    /// Whether the type is exactly the given primitive set.
    pub fn is_primitive(&self, set: PrimitiveSet) -> bool {
        match self {
            Type::Union(union) => {
                union.primitives == set
                    && union.enums.is_empty()
                    && union.type_vars.is_empty()
                    && union.objects.is_empty()
            }
            _ => false,
        }
    }

    pub fn is_number(&self) -> bool {
        self.is_primitive(PrimitiveSet::NUMBER)
    }

    pub fn is_string(&self) -> bool {
        self.is_primitive(PrimitiveSet::STRING)
    }

    pub fn is_scalar_only(&self) -> bool {
        match self {
            Type::Union(union) => union.objects.is_empty() && union.type_vars.is_empty(),
            _ => false,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.primitives().intersects(PrimitiveSet::NULL_OR_UNDEFINED)
    }

    pub fn is_null_or_undefined(&self) -> bool {
        match self {
            Type::Union(union) => {
                !union.primitives.is_empty()
                    && PrimitiveSet::NULL_OR_UNDEFINED.contains(union.primitives)
                    && union.enums.is_empty()
                    && union.type_vars.is_empty()
                    && union.objects.is_empty()
            }
            _ => false,
        }
    }

    /// Removes `null` and `undefined` without touching other members.
    pub fn without_null_or_undefined(&self) -> Type {
        match self {
            Type::Union(union) => {
                let mut union = (**union).clone();
                union.primitives = union.primitives.without(PrimitiveSet::NULL_OR_UNDEFINED);
                Type::from_union(union)
            }
            other => other.clone(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.as_union().map(UnionType::member_count).unwrap_or(1)
    }

    /// Splits the type into one type per member.
    pub fn members(&self) -> Vec<Type> {
        let Some(union) = self.as_union() else {
            return vec![self.clone()];
        };
        let mut members = Vec::new();
        for tag in PrimitiveSet::TAGS {
            if union.primitives.contains(tag) {
                members.push(Type::primitive(tag));
            }
        }
        members.extend(union.enums.iter().map(|id| Type::enum_member(*id)));
        members.extend(union.type_vars.iter().map(|name| Type::type_var(name.clone())));
        members.extend(union.objects.iter().cloned().map(Type::object));
        members
    }

    /// The first function member, if any.
    pub fn function_member(&self) -> Option<&FunctionType> {
        self.objects().iter().find_map(|object| match object {
            ObjectType::Function(function) => Some(function),
            _ => None,
        })
    }

    pub fn contains_type_vars(&self) -> bool {
        match self {
            Type::Union(union) => {
                !union.type_vars.is_empty()
                    || union.objects.iter().any(|object| match object {
                        ObjectType::Instance(instance) => {
                            instance.args.iter().any(Type::contains_type_vars)
                        }
                        ObjectType::Record(record) => record
                            .properties
                            .values()
                            .any(|property| property.ty.contains_type_vars()),
                        ObjectType::Function(function) => {
                            function.required.iter().any(Type::contains_type_vars)
                                || function.optional.iter().any(Type::contains_type_vars)
                                || function.rest.as_ref().is_some_and(Type::contains_type_vars)
                                || function.return_type.contains_type_vars()
                        }
                        ObjectType::Namespace(_) => false,
                    })
            }
            _ => false,
        }
    }

    /// Human-readable rendering, resolving registry ids to names.
    pub fn describe(&self, registry: &Registry) -> String {
        TypeDisplay {
            ty: self,
            registry,
        }
        .to_string()
    }

    pub fn display<'a>(&'a self, registry: &'a Registry) -> TypeDisplay<'a> {
        TypeDisplay { ty: self, registry }
    }
}

pub fn literal_type(literal: &crate::ast::Literal) -> Type {
    use crate::ast::Literal;
    match literal {
        Literal::Number(_) => Type::number(),
        Literal::String(_) => Type::string(),
        Literal::Boolean(_) => Type::boolean(),
        Literal::Null => Type::null(),
        Literal::Undefined => Type::undefined(),
    }
}

pub struct TypeDisplay<'a> {
    ty: &'a Type,
    registry: &'a Registry,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self.ty, self.registry)
    }
}

fn short_var_name(name: &str) -> &str {
    name.rsplit('#').next().unwrap_or(name)
}

fn write_type(f: &mut fmt::Formatter<'_>, ty: &Type, registry: &Registry) -> fmt::Result {
    let union = match ty {
        Type::Bottom => return f.write_str("bottom"),
        Type::Top => return f.write_str("*"),
        Type::Unknown => return f.write_str("?"),
        Type::Union(union) => union,
    };

    let mut parts: Vec<String> = Vec::new();
    if union.primitives.contains(PrimitiveSet::BOOLEAN) {
        for (tag, name) in [
            (PrimitiveSet::NULL, "null"),
            (PrimitiveSet::UNDEFINED, "undefined"),
        ] {
            if union.primitives.contains(tag) {
                parts.push(name.to_string());
            }
        }
        parts.push("boolean".to_string());
    } else {
        for (tag, name) in [
            (PrimitiveSet::NULL, "null"),
            (PrimitiveSet::UNDEFINED, "undefined"),
            (PrimitiveSet::TRUE, "true"),
            (PrimitiveSet::FALSE, "false"),
        ] {
            if union.primitives.contains(tag) {
                parts.push(name.to_string());
            }
        }
    }
    if union.primitives.contains(PrimitiveSet::NUMBER) {
        parts.push("number".to_string());
    }
    if union.primitives.contains(PrimitiveSet::STRING) {
        parts.push("string".to_string());
    }
    for id in &union.enums {
        parts.push(registry.enum_decl(*id).name.clone());
    }
    for name in &union.type_vars {
        parts.push(short_var_name(name).to_string());
    }
    for object in &union.objects {
        parts.push(describe_object(object, registry));
    }

    if parts.len() > 1 {
        write!(f, "({})", parts.join("|"))
    } else {
        f.write_str(&parts.join("|"))
    }
}

fn describe_object(object: &ObjectType, registry: &Registry) -> String {
    match object {
        ObjectType::Instance(instance) => {
            let name = &registry.nominal(instance.id).name;
            if instance.args.is_empty() {
                name.clone()
            } else {
                let args = instance
                    .args
                    .iter()
                    .map(|arg| arg.describe(registry))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{name}<{args}>")
            }
        }
        ObjectType::Record(record) => {
            if record.properties.is_empty() {
                return if record.loose {
                    "{...}".to_string()
                } else {
                    "{}".to_string()
                };
            }
            let fields = record
                .properties
                .iter()
                .map(|(name, property)| {
                    let marker = if property.optional { "=" } else { "" };
                    format!("{}: {}{}", name, property.ty.describe(registry), marker)
                })
                .collect::<Vec<_>>()
                .join(", ");
            if record.loose {
                format!("{{{fields}, ...}}")
            } else {
                format!("{{{fields}}}")
            }
        }
        ObjectType::Function(function) => describe_function(function, registry),
        ObjectType::Namespace(id) => {
            let namespace = registry.namespace(*id);
            match namespace.kind {
                crate::registry::NamespaceKind::Constructor(nominal) => {
                    format!("function(new:{})", registry.nominal(nominal).name)
                }
                crate::registry::NamespaceKind::Enum(_) => {
                    format!("enum{{{}}}", namespace.name)
                }
                _ => format!("namespace{{{}}}", namespace.name),
            }
        }
    }
}

fn describe_function(function: &FunctionType, registry: &Registry) -> String {
    if function.loose {
        return "Function".to_string();
    }
    let mut params = Vec::new();
    if let Some(constructs) = &function.constructs {
        params.push(format!("new:{}", constructs.describe(registry)));
    } else if let Some(receiver) = &function.receiver {
        params.push(format!("this:{}", receiver.describe(registry)));
    }
    params.extend(function.required.iter().map(|param| param.describe(registry)));
    params.extend(
        function
            .optional
            .iter()
            .map(|param| format!("{}=", param.describe(registry))),
    );
    if let Some(rest) = &function.rest {
        params.push(format!("...{}", rest.describe(registry)));
    }
    let prefix = if function.type_params.is_empty() {
        String::new()
    } else {
        let names = function
            .type_params
            .iter()
            .map(|name| short_var_name(name))
            .collect::<Vec<_>>()
            .join(",");
        format!("<{names}>")
    };
    format!(
        "{}function({}): {}",
        prefix,
        params.join(", "),
        function.return_type.describe(registry)
    )
}
