//! Global type registry.
//!
//! Holds every nominal type, namespace, enum and typedef declared by the
//! program, plus the declared signatures of functions. Entities live in
//! arenas and refer to each other by id, so cyclic structures (a class whose
//! method returns the class, an interface extending itself through a chain)
//! need no shared ownership. The registry is mutated only while declarations
//! are collected; afterwards it is frozen and handed to the flow pass by
//! shared reference.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use crate::ast::{AccessDiscipline, SourceSpan, TypeAnnotation};
use crate::types::{FunctionType, NominalInstance, Property, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NominalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypedefId(pub u32);

impl NominalId {
    pub const OBJECT: NominalId = NominalId(0);
    pub const FUNCTION: NominalId = NominalId(1);
    pub const ARRAY: NominalId = NominalId(2);
}

impl NamespaceId {
    /// The global object.
    pub const GLOBAL: NamespaceId = NamespaceId(0);
}

/// Template variable of the builtin `Array`.
pub const ARRAY_ELEMENT: &str = "Array#T";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NominalKind {
    Class,
    Interface,
    /// Structural interface.
    Record,
}

impl NominalKind {
    pub fn is_interface(self) -> bool {
        matches!(self, NominalKind::Interface | NominalKind::Record)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub ty: Type,
    pub declared: bool,
    pub constant: bool,
    pub optional: bool,
    pub is_abstract: bool,
    /// Function literal id when the property is a method with a body.
    pub function: Option<usize>,
    pub span: SourceSpan,
}

impl PropertyDecl {
    pub fn new(ty: Type, declared: bool, span: SourceSpan) -> Self {
        Self {
            ty,
            declared,
            constant: false,
            optional: false,
            is_abstract: false,
            function: None,
            span,
        }
    }

    pub fn as_property(&self) -> Property {
        Property {
            ty: self.ty.clone(),
            optional: self.optional,
            declared: self.declared,
            constant: self.constant,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NominalType {
    pub name: String,
    pub kind: NominalKind,
    /// Qualified template variable names.
    pub type_params: Vec<String>,
    pub superclass: Option<NominalInstance>,
    pub interfaces: Vec<NominalInstance>,
    /// Own instance and prototype properties, in declaration order.
    pub properties: IndexMap<String, PropertyDecl>,
    pub access: AccessDiscipline,
    pub is_abstract: bool,
    pub constructor: Option<FunctionType>,
    /// Namespace holding the constructor's static properties.
    pub statics: NamespaceId,
    pub span: SourceSpan,
    pub builtin: bool,
}

impl NominalType {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn supertypes(&self) -> impl Iterator<Item = &NominalInstance> {
        self.superclass.iter().chain(self.interfaces.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceKind {
    Global,
    /// Declared with `@const` or an object literal; never widened.
    Real,
    /// Created implicitly by a qualified declaration such as `a.b.C = ...`.
    Incidental,
    Constructor(NominalId),
    Enum(EnumId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NamespaceMember {
    Value(PropertyDecl),
    Namespace(NamespaceId),
    Typedef(TypedefId),
}

#[derive(Debug, Clone)]
pub struct Namespace {
    pub name: String,
    pub kind: NamespaceKind,
    pub members: IndexMap<String, NamespaceMember>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub backing: Type,
    pub members: IndexMap<String, SourceSpan>,
    pub namespace: NamespaceId,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct TypedefDecl {
    pub name: String,
    pub annotation: Option<TypeAnnotation>,
    pub resolved: Option<Type>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration {
    Nominal(NominalId),
    Namespace(NamespaceId),
    Enum(EnumId),
    Typedef(TypedefId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Required,
    Optional,
    Rest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredParam {
    pub name: String,
    pub ty: Option<Type>,
    pub kind: ParamKind,
}

/// What the annotations say about a function, before any body is analysed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeclaredSignature {
    pub params: Vec<DeclaredParam>,
    pub return_type: Option<Type>,
    pub receiver: Option<Type>,
    pub constructs: Option<Type>,
    pub type_params: Vec<String>,
}

impl DeclaredSignature {
    /// Every formal and the return type carry an annotation.
    pub fn is_complete(&self) -> bool {
        self.return_type.is_some() && self.params.iter().all(|param| param.ty.is_some())
    }

    pub fn has_undeclared_params(&self) -> bool {
        self.params.iter().any(|param| param.ty.is_none())
    }

    /// The declared shape with `?` standing in for anything unannotated.
    pub fn to_function_type(&self) -> FunctionType {
        let mut function = FunctionType::new(Vec::new(), Type::Unknown);
        for param in &self.params {
            let ty = param.ty.clone().unwrap_or(Type::Unknown);
            match param.kind {
                ParamKind::Required => function.required.push(ty),
                ParamKind::Optional => function.optional.push(ty),
                ParamKind::Rest => function.rest = Some(ty),
            }
        }
        function.return_type = match (&self.return_type, &self.constructs) {
            (Some(ty), _) => ty.clone(),
            (None, Some(_)) => Type::undefined(),
            (None, None) => Type::Unknown,
        };
        function.receiver = self.receiver.clone();
        function.constructs = self.constructs.clone();
        function.type_params = self.type_params.clone();
        function
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub id: usize,
    pub name: String,
    pub signature: DeclaredSignature,
    /// Method owner, for prototype methods and constructors.
    pub owner: Option<NominalId>,
    pub from_externs: bool,
    pub span: SourceSpan,
}

/// A property found on a nominal type or one of its supertypes, with the
/// owner's template variables already substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyLookup {
    pub decl: PropertyDecl,
    pub owner: NominalId,
}

#[derive(Debug, Default)]
pub struct Registry {
    nominals: Vec<NominalType>,
    namespaces: Vec<Namespace>,
    enums: Vec<EnumDecl>,
    typedefs: Vec<TypedefDecl>,
    declarations: HashMap<String, Declaration>,
    functions: HashMap<usize, FunctionDecl>,
    frozen: bool,
}

impl Registry {
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.namespaces.push(Namespace {
            name: "global".to_string(),
            kind: NamespaceKind::Global,
            members: IndexMap::new(),
            span: SourceSpan::default(),
        });
        registry.install_builtins();
        registry
    }

    fn install_builtins(&mut self) {
        let object = self.add_nominal("Object", NominalKind::Class, SourceSpan::default());
        let function = self.add_nominal("Function", NominalKind::Class, SourceSpan::default());
        let array = self.add_nominal("Array", NominalKind::Class, SourceSpan::default());
        debug_assert_eq!(object, NominalId::OBJECT);
        debug_assert_eq!(function, NominalId::FUNCTION);
        debug_assert_eq!(array, NominalId::ARRAY);

        for id in [object, function, array] {
            let nominal = &mut self.nominals[id.0 as usize];
            nominal.builtin = true;
            nominal.access = AccessDiscipline::Unrestricted;
        }
        let object_instance = NominalInstance::new(NominalId::OBJECT, Vec::new());
        self.nominals[function.0 as usize].superclass = Some(object_instance.clone());

        let array_nominal = &mut self.nominals[array.0 as usize];
        array_nominal.superclass = Some(object_instance);
        array_nominal.type_params = vec![ARRAY_ELEMENT.to_string()];
        array_nominal.properties.insert(
            "length".to_string(),
            PropertyDecl::new(Type::number(), true, SourceSpan::default()),
        );
        let mut push = FunctionType::new(Vec::new(), Type::number());
        push.rest = Some(Type::type_var(ARRAY_ELEMENT));
        push.receiver = Some(Type::instance(
            NominalId::ARRAY,
            vec![Type::type_var(ARRAY_ELEMENT)],
        ));
        array_nominal.properties.insert(
            "push".to_string(),
            PropertyDecl::new(Type::function(push), true, SourceSpan::default()),
        );
        let mut constructor = FunctionType::new(Vec::new(), Type::undefined());
        constructor.rest = Some(Type::Unknown);
        constructor.constructs = Some(Type::instance(
            NominalId::ARRAY,
            vec![Type::type_var(ARRAY_ELEMENT)],
        ));
        constructor.type_params = vec![ARRAY_ELEMENT.to_string()];
        array_nominal.constructor = Some(constructor);

        let mut object_constructor = FunctionType::new(Vec::new(), Type::undefined());
        object_constructor.optional = vec![Type::Unknown];
        object_constructor.constructs = Some(Type::instance(NominalId::OBJECT, Vec::new()));
        self.nominals[object.0 as usize].constructor = Some(object_constructor);
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Creates a nominal type together with its constructor namespace and
    /// binds its name in the global declaration table.
    pub fn add_nominal(&mut self, name: &str, kind: NominalKind, span: SourceSpan) -> NominalId {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        let id = NominalId(self.nominals.len() as u32);
        let statics = NamespaceId(self.namespaces.len() as u32);
        self.namespaces.push(Namespace {
            name: name.to_string(),
            kind: NamespaceKind::Constructor(id),
            members: IndexMap::new(),
            span,
        });
        let access = match kind {
            NominalKind::Class => AccessDiscipline::Unrestricted,
            NominalKind::Interface | NominalKind::Record => AccessDiscipline::Struct,
        };
        self.nominals.push(NominalType {
            name: name.to_string(),
            kind,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            properties: IndexMap::new(),
            access,
            is_abstract: false,
            constructor: None,
            statics,
            span,
            builtin: false,
        });
        self.declarations
            .insert(name.to_string(), Declaration::Nominal(id));
        id
    }

    pub fn add_namespace(&mut self, name: &str, kind: NamespaceKind, span: SourceSpan) -> NamespaceId {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        let id = NamespaceId(self.namespaces.len() as u32);
        self.namespaces.push(Namespace {
            name: name.to_string(),
            kind,
            members: IndexMap::new(),
            span,
        });
        self.declarations
            .insert(name.to_string(), Declaration::Namespace(id));
        id
    }

    pub fn add_enum(&mut self, name: &str, backing: Type, span: SourceSpan) -> EnumId {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        let id = EnumId(self.enums.len() as u32);
        let namespace = NamespaceId(self.namespaces.len() as u32);
        self.namespaces.push(Namespace {
            name: name.to_string(),
            kind: NamespaceKind::Enum(id),
            members: IndexMap::new(),
            span,
        });
        self.enums.push(EnumDecl {
            name: name.to_string(),
            backing,
            members: IndexMap::new(),
            namespace,
            span,
        });
        self.declarations.insert(name.to_string(), Declaration::Enum(id));
        id
    }

    pub fn add_typedef(
        &mut self,
        name: &str,
        annotation: Option<TypeAnnotation>,
        span: SourceSpan,
    ) -> TypedefId {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        let id = TypedefId(self.typedefs.len() as u32);
        self.typedefs.push(TypedefDecl {
            name: name.to_string(),
            annotation,
            resolved: None,
            span,
        });
        self.declarations
            .insert(name.to_string(), Declaration::Typedef(id));
        id
    }

    pub fn add_function(&mut self, decl: FunctionDecl) {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        self.functions.insert(decl.id, decl);
    }

    pub fn lookup(&self, qualified_name: &str) -> Option<Declaration> {
        self.declarations.get(qualified_name).copied()
    }

    pub fn declare(&mut self, qualified_name: &str, declaration: Declaration) {
        self.declarations
            .insert(qualified_name.to_string(), declaration);
    }

    pub fn nominal(&self, id: NominalId) -> &NominalType {
        &self.nominals[id.0 as usize]
    }

    pub fn nominal_mut(&mut self, id: NominalId) -> &mut NominalType {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        &mut self.nominals[id.0 as usize]
    }

    pub fn nominal_ids(&self) -> impl Iterator<Item = NominalId> {
        (0..self.nominals.len() as u32).map(NominalId)
    }

    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.0 as usize]
    }

    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        &mut self.namespaces[id.0 as usize]
    }

    pub fn namespace_ids(&self) -> impl Iterator<Item = NamespaceId> {
        (0..self.namespaces.len() as u32).map(NamespaceId)
    }

    pub fn enum_decl(&self, id: EnumId) -> &EnumDecl {
        &self.enums[id.0 as usize]
    }

    pub fn enum_mut(&mut self, id: EnumId) -> &mut EnumDecl {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        &mut self.enums[id.0 as usize]
    }

    pub fn enum_backing(&self, id: EnumId) -> &Type {
        &self.enum_decl(id).backing
    }

    pub fn typedef(&self, id: TypedefId) -> &TypedefDecl {
        &self.typedefs[id.0 as usize]
    }

    pub fn typedef_mut(&mut self, id: TypedefId) -> &mut TypedefDecl {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        &mut self.typedefs[id.0 as usize]
    }

    pub fn typedef_ids(&self) -> impl Iterator<Item = TypedefId> {
        (0..self.typedefs.len() as u32).map(TypedefId)
    }

    pub fn function(&self, id: usize) -> Option<&FunctionDecl> {
        self.functions.get(&id)
    }

    pub fn function_mut(&mut self, id: usize) -> Option<&mut FunctionDecl> {
        debug_assert!(!self.frozen, "registry mutated after freeze");
        self.functions.get_mut(&id)
    }

    pub fn global(&self, name: &str) -> Option<&NamespaceMember> {
        self.namespace(NamespaceId::GLOBAL).members.get(name)
    }

    /// The value type of a namespace member.
    pub fn member_type(&self, member: &NamespaceMember) -> Option<Type> {
        match member {
            NamespaceMember::Value(decl) => Some(decl.ty.clone()),
            NamespaceMember::Namespace(id) => Some(Type::namespace(*id)),
            NamespaceMember::Typedef(_) => None,
        }
    }

    /// Maps the nominal's template variables to the instance's arguments.
    /// Missing arguments map to `?`.
    pub fn substitution_for(&self, instance: &NominalInstance) -> HashMap<String, Type> {
        let nominal = self.nominal(instance.id);
        nominal
            .type_params
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let arg = instance.args.get(index).cloned().unwrap_or(Type::Unknown);
                (name.clone(), arg)
            })
            .collect()
    }

    /// Direct supertypes of an instance, instantiated with its arguments.
    /// Classes without an explicit superclass extend `Object`.
    pub fn supertypes_of(&self, instance: &NominalInstance) -> Vec<NominalInstance> {
        let nominal = self.nominal(instance.id);
        let mapping = self.substitution_for(instance);
        let mut supertypes: Vec<NominalInstance> = nominal
            .supertypes()
            .map(|supertype| NominalInstance {
                id: supertype.id,
                args: supertype
                    .args
                    .iter()
                    .map(|arg| substitute_vars(arg, &mapping))
                    .collect(),
            })
            .collect();
        if nominal.superclass.is_none()
            && nominal.kind == NominalKind::Class
            && instance.id != NominalId::OBJECT
        {
            supertypes.push(NominalInstance::new(NominalId::OBJECT, Vec::new()));
        }
        supertypes
    }

    /// Whether `sub` reaches `sup` through superclass and interface edges.
    pub fn inherits(&self, sub: NominalId, sup: NominalId) -> bool {
        if sub == sup || sup == NominalId::OBJECT && self.nominal(sub).kind == NominalKind::Class {
            return true;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([sub]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if current == sup {
                return true;
            }
            for supertype in self.nominal(current).supertypes() {
                queue.push_back(supertype.id);
            }
        }
        false
    }

    /// Views `instance` as an instance of its ancestor `target`.
    pub fn upcast(&self, instance: &NominalInstance, target: NominalId) -> Option<NominalInstance> {
        if instance.id == target {
            return Some(instance.clone());
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([instance.clone()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.id) {
                continue;
            }
            if current.id == target {
                return Some(current);
            }
            queue.extend(self.supertypes_of(&current));
        }
        None
    }

    /// Superclass chain starting at `id` itself, ending at the root.
    pub fn superclass_chain(&self, id: NominalId) -> Vec<NominalId> {
        let mut chain = vec![id];
        let mut seen = HashSet::from([id]);
        let mut current = id;
        while let Some(parent) = &self.nominal(current).superclass {
            if !seen.insert(parent.id) {
                break;
            }
            chain.push(parent.id);
            current = parent.id;
        }
        chain
    }

    /// Nearest common superclass of two classes, not counting `Object`.
    pub fn common_superclass(&self, a: NominalId, b: NominalId) -> Option<NominalId> {
        if self.nominal(a).kind != NominalKind::Class || self.nominal(b).kind != NominalKind::Class {
            return None;
        }
        let other: HashSet<NominalId> = self.superclass_chain(b).into_iter().collect();
        self.superclass_chain(a)
            .into_iter()
            .find(|candidate| *candidate != NominalId::OBJECT && other.contains(candidate))
    }

    /// Breadth-first property lookup: own properties first, then each
    /// supertype level in declaration order.
    pub fn lookup_property(&self, instance: &NominalInstance, name: &str) -> Option<PropertyLookup> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([instance.clone()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.id) {
                continue;
            }
            if let Some(decl) = self.nominal(current.id).properties.get(name) {
                let mapping = self.substitution_for(&current);
                let mut decl = decl.clone();
                decl.ty = substitute_vars(&decl.ty, &mapping);
                return Some(PropertyLookup {
                    decl,
                    owner: current.id,
                });
            }
            queue.extend(self.supertypes_of(&current));
        }
        None
    }

    /// Every property visible on the instance, nearest declaration wins.
    pub fn all_properties(&self, instance: &NominalInstance) -> IndexMap<String, PropertyLookup> {
        let mut properties = IndexMap::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([instance.clone()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.id) {
                continue;
            }
            let mapping = self.substitution_for(&current);
            for (name, decl) in &self.nominal(current.id).properties {
                if properties.contains_key(name) {
                    continue;
                }
                let mut decl = decl.clone();
                decl.ty = substitute_vars(&decl.ty, &mapping);
                properties.insert(
                    name.clone(),
                    PropertyLookup {
                        decl,
                        owner: current.id,
                    },
                );
            }
            queue.extend(self.supertypes_of(&current));
        }
        properties
    }

    /// The effective access discipline: inherited from the nearest ancestor
    /// that is not unrestricted.
    pub fn access_of(&self, id: NominalId) -> AccessDiscipline {
        for ancestor in self.superclass_chain(id) {
            match self.nominal(ancestor).access {
                AccessDiscipline::Unrestricted => continue,
                other => return other,
            }
        }
        AccessDiscipline::Unrestricted
    }

    /// Signature of `new C(...)` for a constructor namespace.
    pub fn constructor_of(&self, namespace: NamespaceId) -> Option<(NominalId, FunctionType)> {
        match self.namespace(namespace).kind {
            NamespaceKind::Constructor(id) => {
                let nominal = self.nominal(id);
                let constructor = nominal.constructor.clone().unwrap_or_else(|| {
                    let mut function = FunctionType::new(Vec::new(), Type::undefined());
                    function.constructs = Some(self.instance_of_self(id));
                    function.type_params = nominal.type_params.clone();
                    function
                });
                Some((id, constructor))
            }
            _ => None,
        }
    }

    /// `C<T...>` with the nominal's own template variables as arguments.
    pub fn instance_of_self(&self, id: NominalId) -> Type {
        let args = self
            .nominal(id)
            .type_params
            .iter()
            .map(|name| Type::type_var(name.clone()))
            .collect();
        Type::instance(id, args)
    }

    pub fn namespace_property(&self, namespace: NamespaceId, name: &str) -> Option<Type> {
        let namespace_ref = self.namespace(namespace);
        if let Some(member) = namespace_ref.members.get(name) {
            return self.member_type(member);
        }
        if let NamespaceKind::Enum(id) = namespace_ref.kind {
            if self.enum_decl(id).members.contains_key(name) {
                return Some(Type::enum_member(id));
            }
        }
        None
    }
}

/// Replaces template variables by name. Variables without a mapping are left
/// as they are.
pub(crate) fn substitute_vars(ty: &Type, mapping: &HashMap<String, Type>) -> Type {
    if mapping.is_empty() {
        return ty.clone();
    }
    crate::types::substitute_syntactic(ty, mapping)
}
