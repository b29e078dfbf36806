use std::collections::HashSet;

use indexmap::IndexMap;

use super::{
    FunctionType, NominalInstance, ObjectType, PrimitiveSet, Property, RecordType, Substitution,
    Type, UnionType,
};
use crate::registry::{NamespaceKind, NamespaceMember, NominalId, NominalKind, Registry};

/// Result of a `typeof` comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Number,
    String,
    Boolean,
    Undefined,
    Object,
    Function,
}

impl TypeTag {
    pub fn from_typeof(name: &str) -> Option<TypeTag> {
        match name {
            "number" => Some(TypeTag::Number),
            "string" => Some(TypeTag::String),
            "boolean" => Some(TypeTag::Boolean),
            "undefined" => Some(TypeTag::Undefined),
            "object" => Some(TypeTag::Object),
            "function" => Some(TypeTag::Function),
            _ => None,
        }
    }

    fn primitives(self) -> PrimitiveSet {
        match self {
            TypeTag::Number => PrimitiveSet::NUMBER,
            TypeTag::String => PrimitiveSet::STRING,
            TypeTag::Boolean => PrimitiveSet::BOOLEAN,
            TypeTag::Undefined => PrimitiveSet::UNDEFINED,
            TypeTag::Object => PrimitiveSet::NULL,
            TypeTag::Function => PrimitiveSet::EMPTY,
        }
    }

    /// Everything a value with this tag may be.
    pub fn to_type(self) -> Type {
        match self {
            TypeTag::Function => Type::function(FunctionType::any()),
            TypeTag::Object => Type::from_union(UnionType {
                primitives: PrimitiveSet::NULL,
                objects: vec![ObjectType::Instance(NominalInstance::new(
                    NominalId::OBJECT,
                    Vec::new(),
                ))],
                ..UnionType::default()
            }),
            other => Type::primitive(other.primitives()),
        }
    }
}

type Assumptions = HashSet<(NominalId, NominalId)>;

/// Lattice operations over [`Type`], resolved against a registry.
#[derive(Clone, Copy)]
pub struct Lattice<'r> {
    registry: &'r Registry,
    bivariant_params: bool,
}

impl<'r> Lattice<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            bivariant_params: false,
        }
    }

    /// Accept function parameters related in either direction.
    pub fn with_bivariant_params(mut self, enabled: bool) -> Self {
        self.bivariant_params = enabled;
        self
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn join(&self, a: &Type, b: &Type) -> Type {
        join_with(Some(self.registry), a, b)
    }

    pub fn join_all<'t>(&self, types: impl IntoIterator<Item = &'t Type>) -> Type {
        types
            .into_iter()
            .fold(Type::Bottom, |acc, ty| self.join(&acc, ty))
    }

    pub fn meet(&self, a: &Type, b: &Type) -> Type {
        match (a, b) {
            (Type::Bottom, _) | (_, Type::Bottom) => Type::Bottom,
            (Type::Top, other) | (other, Type::Top) => other.clone(),
            (Type::Unknown, other) | (other, Type::Unknown) => other.clone(),
            (Type::Union(x), Type::Union(y)) => {
                let mut union = UnionType {
                    primitives: x.primitives & y.primitives,
                    ..UnionType::default()
                };
                for id in &x.enums {
                    if y.enums.contains(id) || self.is_subtype(&Type::enum_member(*id), b) {
                        union.enums.push(*id);
                    }
                }
                for id in &y.enums {
                    if !union.enums.contains(id) && self.is_subtype(&Type::enum_member(*id), a) {
                        union.enums.push(*id);
                    }
                }
                union.enums.sort();
                union.type_vars = x
                    .type_vars
                    .iter()
                    .filter(|name| y.type_vars.contains(name))
                    .cloned()
                    .collect();
                let mut objects = Vec::new();
                for left in &x.objects {
                    for right in &y.objects {
                        if let Some(object) = self.meet_objects(left, right) {
                            objects.push(object);
                        }
                    }
                }
                union.objects = normalize_objects(Some(self.registry), objects);
                Type::from_union(union)
            }
        }
    }

    fn meet_objects(&self, a: &ObjectType, b: &ObjectType) -> Option<ObjectType> {
        match (a, b) {
            (ObjectType::Instance(x), ObjectType::Instance(y)) if x.id == y.id => {
                let mut args = Vec::new();
                for index in 0..x.args.len().max(y.args.len()) {
                    let left = x.args.get(index).unwrap_or(&Type::Unknown);
                    let right = y.args.get(index).unwrap_or(&Type::Unknown);
                    let arg = self.meet(left, right);
                    if arg.is_bottom() {
                        return None;
                    }
                    args.push(arg);
                }
                Some(ObjectType::Instance(NominalInstance::new(x.id, args)))
            }
            (ObjectType::Record(x), ObjectType::Record(y)) => {
                self.meet_records(x, y).map(ObjectType::Record)
            }
            (ObjectType::Namespace(x), ObjectType::Namespace(y)) => {
                (x == y).then(|| a.clone())
            }
            (ObjectType::Function(x), ObjectType::Function(y)) if x == y => Some(a.clone()),
            _ => {
                let mut assumed = Assumptions::new();
                if self.object_subtype(a, b, &mut assumed) {
                    return Some(a.clone());
                }
                if self.object_subtype(b, a, &mut assumed) {
                    return Some(b.clone());
                }
                match (a, b) {
                    (ObjectType::Instance(_), ObjectType::Record(record))
                    | (ObjectType::Record(record), ObjectType::Instance(_))
                        if record.loose =>
                    {
                        Some(if matches!(a, ObjectType::Instance(_)) {
                            a.clone()
                        } else {
                            b.clone()
                        })
                    }
                    _ => None,
                }
            }
        }
    }

    fn meet_records(&self, x: &RecordType, y: &RecordType) -> Option<RecordType> {
        let mut properties = IndexMap::new();
        for (name, left) in &x.properties {
            match y.properties.get(name) {
                Some(right) => {
                    let ty = self.meet(&left.ty, &right.ty);
                    if ty.is_bottom() && !(left.optional && right.optional) {
                        return None;
                    }
                    properties.insert(
                        name.clone(),
                        Property {
                            ty,
                            optional: left.optional && right.optional,
                            declared: left.declared || right.declared,
                            constant: left.constant || right.constant,
                        },
                    );
                }
                None if y.exact && !left.optional => return None,
                None => {
                    properties.insert(name.clone(), left.clone());
                }
            }
        }
        for (name, right) in &y.properties {
            if properties.contains_key(name) {
                continue;
            }
            if x.exact && !right.optional {
                return None;
            }
            properties.insert(name.clone(), right.clone());
        }
        Some(RecordType {
            properties,
            exact: x.exact || y.exact,
            loose: x.loose && y.loose,
        })
    }

    pub fn is_subtype(&self, a: &Type, b: &Type) -> bool {
        let mut assumed = Assumptions::new();
        self.subtype(a, b, &mut assumed)
    }

    fn subtype(&self, a: &Type, b: &Type, assumed: &mut Assumptions) -> bool {
        match (a, b) {
            (Type::Bottom, _) => true,
            (_, Type::Top) | (_, Type::Unknown) | (Type::Unknown, _) => true,
            (Type::Top, _) | (_, Type::Bottom) => false,
            (Type::Union(x), Type::Union(y)) => {
                if !y.primitives.contains(x.primitives) {
                    return false;
                }
                if !x.type_vars.iter().all(|name| y.type_vars.contains(name)) {
                    return false;
                }
                for id in &x.enums {
                    if y.enums.contains(id) {
                        continue;
                    }
                    let backing = self.registry.enum_backing(*id).clone();
                    if !self.subtype(&backing, b, assumed) {
                        return false;
                    }
                }
                x.objects.iter().all(|left| {
                    y.objects
                        .iter()
                        .any(|right| self.object_subtype(left, right, assumed))
                })
            }
        }
    }

    fn object_subtype(&self, a: &ObjectType, b: &ObjectType, assumed: &mut Assumptions) -> bool {
        match (a, b) {
            (_, ObjectType::Instance(target)) if target.id == NominalId::OBJECT => true,
            (ObjectType::Instance(source), ObjectType::Instance(target)) => {
                self.instance_subtype(source, target, assumed)
            }
            (ObjectType::Function(_), ObjectType::Instance(target)) => {
                target.id == NominalId::FUNCTION
            }
            (ObjectType::Instance(source), ObjectType::Function(target)) => {
                source.id == NominalId::FUNCTION && target.loose
            }
            (ObjectType::Namespace(id), ObjectType::Instance(target)) => {
                if target.id == NominalId::FUNCTION {
                    return matches!(
                        self.registry.namespace(*id).kind,
                        NamespaceKind::Constructor(_)
                    );
                }
                self.structural_to_nominal(a, target, assumed)
            }
            (ObjectType::Record(record), ObjectType::Instance(target)) => {
                let nominal = self.registry.nominal(target.id);
                if nominal.kind == NominalKind::Record || record.loose {
                    self.structural_to_nominal(a, target, assumed)
                } else {
                    false
                }
            }
            (ObjectType::Record(x), ObjectType::Record(y)) => self.structural(
                &x.properties,
                x.loose,
                &y.properties,
                y.loose,
                assumed,
            ),
            (ObjectType::Function(x), ObjectType::Function(y)) => {
                self.function_subtype(x, y, assumed)
            }
            (ObjectType::Namespace(x), ObjectType::Namespace(y)) => x == y,
            (ObjectType::Namespace(id), ObjectType::Function(target)) => {
                match self.registry.constructor_of(*id) {
                    Some((_, constructor)) => {
                        target.loose || self.function_subtype(&constructor, target, assumed)
                    }
                    None => false,
                }
            }
            (_, ObjectType::Record(target)) => {
                let Some((properties, loose)) = self.properties_of_object(a) else {
                    return false;
                };
                self.structural(&properties, loose, &target.properties, target.loose, assumed)
            }
            _ => false,
        }
    }

    fn structural_to_nominal(
        &self,
        source: &ObjectType,
        target: &NominalInstance,
        assumed: &mut Assumptions,
    ) -> bool {
        let Some((properties, loose)) = self.properties_of_object(source) else {
            return false;
        };
        let target_properties = self.instance_properties(target);
        self.structural(&properties, loose, &target_properties, false, assumed)
    }

    fn instance_subtype(
        &self,
        source: &NominalInstance,
        target: &NominalInstance,
        assumed: &mut Assumptions,
    ) -> bool {
        if let Some(upcast) = self.registry.upcast(source, target.id) {
            let count = upcast.args.len().max(target.args.len());
            return (0..count).all(|index| {
                let left = upcast.args.get(index).unwrap_or(&Type::Unknown);
                let right = target.args.get(index).unwrap_or(&Type::Unknown);
                self.subtype(left, right, assumed)
            });
        }
        if self.registry.nominal(target.id).kind != NominalKind::Record {
            return false;
        }
        if !assumed.insert((source.id, target.id)) {
            return true;
        }
        let source_properties = self.instance_properties(source);
        let target_properties = self.instance_properties(target);
        self.structural(&source_properties, false, &target_properties, false, assumed)
    }

    fn structural(
        &self,
        source: &IndexMap<String, Property>,
        source_loose: bool,
        target: &IndexMap<String, Property>,
        target_loose: bool,
        assumed: &mut Assumptions,
    ) -> bool {
        for (name, expected) in target {
            match source.get(name) {
                Some(found) => {
                    if found.optional && !expected.optional {
                        return false;
                    }
                    let expected_ty = if expected.optional {
                        join_with(Some(self.registry), &expected.ty, &Type::undefined())
                    } else {
                        expected.ty.clone()
                    };
                    if !self.subtype(&found.ty, &expected_ty, assumed) {
                        return false;
                    }
                }
                None => {
                    if !(expected.optional || source_loose || target_loose) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn function_subtype(&self, f: &FunctionType, g: &FunctionType, assumed: &mut Assumptions) -> bool {
        if f.loose || g.loose {
            return true;
        }
        let f = erase_type_params(f);
        let g = erase_type_params(g);
        match (&f.constructs, &g.constructs) {
            (Some(left), Some(right)) => {
                if !self.subtype(left, right, assumed) {
                    return false;
                }
            }
            (None, None) => {}
            _ => return false,
        }
        if f.min_arity() > g.min_arity() {
            return false;
        }
        match (f.max_arity(), g.max_arity()) {
            (Some(left), Some(right)) if left < right => return false,
            (Some(_), None) => return false,
            _ => {}
        }
        let count = f.positional_len().max(g.positional_len());
        for index in 0..count {
            if let (Some(left), Some(right)) = (f.param(index), g.param(index)) {
                if !self.param_compatible(left, right, assumed) {
                    return false;
                }
            }
        }
        if let (Some(left), Some(right)) = (&f.rest, &g.rest) {
            if !self.param_compatible(left, right, assumed) {
                return false;
            }
        }
        if let (Some(left), Some(right)) = (&f.receiver, &g.receiver) {
            if !self.param_compatible(left, right, assumed) {
                return false;
            }
        }
        self.subtype(&f.return_type, &g.return_type, assumed)
    }

    fn param_compatible(&self, sub_param: &Type, super_param: &Type, assumed: &mut Assumptions) -> bool {
        self.subtype(super_param, sub_param, assumed)
            || (self.bivariant_params && self.subtype(sub_param, super_param, assumed))
    }

    /// Property table of an object, if it has a known shape. The flag says
    /// whether missing properties are tolerated.
    pub(crate) fn properties_of_object(
        &self,
        object: &ObjectType,
    ) -> Option<(IndexMap<String, Property>, bool)> {
        match object {
            ObjectType::Record(record) => Some((record.properties.clone(), record.loose)),
            ObjectType::Instance(instance) => Some((self.instance_properties(instance), false)),
            ObjectType::Namespace(id) => {
                let namespace = self.registry.namespace(*id);
                let mut properties = IndexMap::new();
                for (name, member) in &namespace.members {
                    let property = match member {
                        NamespaceMember::Value(decl) => decl.as_property(),
                        NamespaceMember::Namespace(inner) => Property::declared(Type::namespace(*inner)),
                        NamespaceMember::Typedef(_) => continue,
                    };
                    properties.insert(name.clone(), property);
                }
                Some((properties, false))
            }
            ObjectType::Function(_) => Some((IndexMap::new(), false)),
        }
    }

    pub(crate) fn instance_properties(&self, instance: &NominalInstance) -> IndexMap<String, Property> {
        self.registry
            .all_properties(instance)
            .into_iter()
            .map(|(name, lookup)| (name, lookup.decl.as_property()))
            .collect()
    }

    /// Narrows `original` to the values that also satisfy `test`.
    ///
    /// Narrowings that cannot be proven but are plausible (an interface
    /// tested against a class, `Object` tested against anything) keep the
    /// tested type instead of collapsing to bottom.
    pub fn specialize(&self, original: &Type, test: &Type) -> Type {
        match (original, test) {
            (_, Type::Top) | (_, Type::Unknown) => original.clone(),
            (Type::Bottom, _) | (_, Type::Bottom) => Type::Bottom,
            (Type::Unknown, _) | (Type::Top, _) => test.clone(),
            (Type::Union(o), Type::Union(t)) => {
                if self.is_subtype(original, test) {
                    return original.clone();
                }
                let mut union = UnionType {
                    primitives: o.primitives & t.primitives,
                    ..UnionType::default()
                };
                for id in &o.enums {
                    let backing = self.registry.enum_backing(*id).primitives();
                    if t.enums.contains(id) || t.primitives.intersects(backing) {
                        union.enums.push(*id);
                    }
                }
                for id in &t.enums {
                    let backing = self.registry.enum_backing(*id).primitives();
                    if !union.enums.contains(id) && o.primitives.intersects(backing) {
                        union.enums.push(*id);
                    }
                }
                union.enums.sort();

                let mut narrowed_var = false;
                for name in &o.type_vars {
                    if t.type_vars.contains(name) {
                        union.type_vars.push(name.clone());
                    } else {
                        narrowed_var = true;
                    }
                }
                let mut objects = Vec::new();
                for left in &o.objects {
                    for right in &t.objects {
                        if let Some(object) = self.specialize_object(left, right) {
                            objects.push(object);
                        }
                    }
                }
                if narrowed_var {
                    union.primitives = union.primitives | t.primitives;
                    objects.extend(t.objects.iter().cloned());
                }
                union.objects = normalize_objects(Some(self.registry), objects);
                let result = Type::from_union(union);
                if result.is_bottom() && self.plausibly_related(o, t) {
                    let fallback = UnionType {
                        objects: t.objects.clone(),
                        ..UnionType::default()
                    };
                    return Type::from_union(fallback);
                }
                result
            }
        }
    }

    fn plausibly_related(&self, original: &UnionType, test: &UnionType) -> bool {
        if test.objects.is_empty() {
            return false;
        }
        original.objects.iter().any(|object| match object {
            ObjectType::Instance(instance) => {
                instance.id == NominalId::OBJECT
                    || self.registry.nominal(instance.id).kind.is_interface()
            }
            ObjectType::Record(record) => record.loose,
            _ => false,
        })
    }

    fn specialize_object(&self, original: &ObjectType, test: &ObjectType) -> Option<ObjectType> {
        let mut assumed = Assumptions::new();
        match (original, test) {
            (_, ObjectType::Instance(target)) if target.id == NominalId::OBJECT => {
                Some(original.clone())
            }
            (ObjectType::Instance(source), _) if source.id == NominalId::OBJECT => {
                Some(test.clone())
            }
            (ObjectType::Instance(source), ObjectType::Instance(target)) => {
                if self.instance_subtype(source, target, &mut assumed) {
                    Some(original.clone())
                } else if self.instance_subtype(target, source, &mut assumed) {
                    Some(test.clone())
                } else if self.registry.nominal(source.id).kind.is_interface() {
                    Some(test.clone())
                } else if self.registry.nominal(target.id).kind.is_interface() {
                    Some(original.clone())
                } else {
                    None
                }
            }
            (ObjectType::Instance(source), ObjectType::Record(record)) => {
                let unrestricted = self.registry.access_of(source.id)
                    == crate::ast::AccessDiscipline::Unrestricted;
                if record.loose || unrestricted || self.object_subtype(original, test, &mut assumed)
                {
                    Some(original.clone())
                } else {
                    None
                }
            }
            (ObjectType::Record(record), ObjectType::Instance(_)) => {
                if record.loose || self.object_subtype(test, original, &mut assumed) {
                    Some(test.clone())
                } else {
                    None
                }
            }
            (ObjectType::Record(x), ObjectType::Record(y)) => {
                self.specialize_records(x, y).map(ObjectType::Record)
            }
            (ObjectType::Function(f), ObjectType::Function(g)) => {
                if g.loose {
                    Some(original.clone())
                } else if f.loose {
                    Some(test.clone())
                } else if self.function_subtype(f, g, &mut assumed) {
                    Some(original.clone())
                } else if self.function_subtype(g, f, &mut assumed) {
                    Some(test.clone())
                } else {
                    None
                }
            }
            (ObjectType::Function(_), ObjectType::Instance(target))
                if target.id == NominalId::FUNCTION =>
            {
                Some(original.clone())
            }
            (ObjectType::Instance(source), ObjectType::Function(_))
                if source.id == NominalId::FUNCTION =>
            {
                Some(test.clone())
            }
            (ObjectType::Namespace(x), ObjectType::Namespace(y)) => {
                (x == y).then(|| original.clone())
            }
            (ObjectType::Namespace(_), ObjectType::Record(record)) => {
                if record.loose || self.object_subtype(original, test, &mut assumed) {
                    Some(original.clone())
                } else {
                    None
                }
            }
            (ObjectType::Namespace(_), _) => self
                .object_subtype(original, test, &mut assumed)
                .then(|| original.clone()),
            _ => None,
        }
    }

    fn specialize_records(&self, x: &RecordType, y: &RecordType) -> Option<RecordType> {
        let mut properties = x.properties.clone();
        for (name, tested) in &y.properties {
            match x.properties.get(name) {
                Some(existing) => {
                    let ty = self.specialize(&existing.ty, &tested.ty);
                    if ty.is_bottom() && !existing.optional {
                        return None;
                    }
                    properties.insert(
                        name.clone(),
                        Property {
                            ty,
                            optional: existing.optional && tested.optional,
                            ..existing.clone()
                        },
                    );
                }
                None if x.exact => {
                    if !tested.optional {
                        return None;
                    }
                }
                None => {
                    properties.insert(name.clone(), tested.clone());
                }
            }
        }
        Some(RecordType {
            properties,
            exact: x.exact,
            loose: x.loose && y.loose,
        })
    }

    /// Removes every member of `removed` from `original`.
    pub fn exclude(&self, original: &Type, removed: &Type) -> Type {
        match (original, removed) {
            (Type::Unknown, _) | (Type::Top, _) => original.clone(),
            (Type::Bottom, _) => Type::Bottom,
            (_, Type::Bottom) | (_, Type::Unknown) => original.clone(),
            (_, Type::Top) => Type::Bottom,
            (Type::Union(o), Type::Union(r)) => {
                let mut assumed = Assumptions::new();
                let union = UnionType {
                    primitives: o.primitives.without(r.primitives),
                    enums: o
                        .enums
                        .iter()
                        .filter(|id| !r.enums.contains(id))
                        .copied()
                        .collect(),
                    type_vars: o
                        .type_vars
                        .iter()
                        .filter(|name| !r.type_vars.contains(name))
                        .cloned()
                        .collect(),
                    objects: o
                        .objects
                        .iter()
                        .filter(|object| {
                            !r.objects
                                .iter()
                                .any(|other| self.object_subtype(object, other, &mut assumed))
                        })
                        .cloned()
                        .collect(),
                };
                Type::from_union(union)
            }
        }
    }

    /// Values of `ty` that may be truthy.
    pub fn truthy(&self, ty: &Type) -> Type {
        match ty {
            Type::Union(union) => {
                let mut union = (**union).clone();
                union.primitives = union
                    .primitives
                    .without(PrimitiveSet::NULL_OR_UNDEFINED | PrimitiveSet::FALSE);
                Type::from_union(union)
            }
            other => other.clone(),
        }
    }

    /// Values of `ty` that may be falsy.
    pub fn falsy(&self, ty: &Type) -> Type {
        match ty {
            Type::Union(union) => {
                let falsy_primitives = PrimitiveSet::NULL_OR_UNDEFINED
                    | PrimitiveSet::FALSE
                    | PrimitiveSet::NUMBER
                    | PrimitiveSet::STRING;
                let narrowed = UnionType {
                    primitives: union.primitives & falsy_primitives,
                    enums: union
                        .enums
                        .iter()
                        .filter(|id| {
                            self.registry
                                .enum_backing(**id)
                                .primitives()
                                .intersects(falsy_primitives)
                        })
                        .copied()
                        .collect(),
                    type_vars: union.type_vars.clone(),
                    objects: Vec::new(),
                };
                Type::from_union(narrowed)
            }
            other => other.clone(),
        }
    }

    /// Narrowing for `typeof x == tag` (`positive`) or `!=`.
    pub fn narrow_typeof(&self, ty: &Type, tag: TypeTag, positive: bool) -> Type {
        let union = match ty {
            Type::Bottom => return Type::Bottom,
            Type::Unknown | Type::Top => {
                return if positive { tag.to_type() } else { ty.clone() };
            }
            Type::Union(union) => union,
        };
        let tag_primitives = tag.primitives();
        let mut result = UnionType {
            primitives: if positive {
                union.primitives & tag_primitives
            } else {
                union.primitives.without(tag_primitives)
            },
            ..UnionType::default()
        };
        result.enums = union
            .enums
            .iter()
            .filter(|id| {
                let matches = self
                    .registry
                    .enum_backing(**id)
                    .primitives()
                    .intersects(tag_primitives);
                matches == positive
            })
            .copied()
            .collect();
        let mut objects = Vec::new();
        for object in &union.objects {
            if let ObjectType::Instance(instance) = object {
                if instance.id == NominalId::OBJECT {
                    match (tag, positive) {
                        (TypeTag::Function, true) => {
                            objects.push(ObjectType::Function(FunctionType::any()))
                        }
                        (TypeTag::Object, _) | (TypeTag::Function, false) => {
                            objects.push(object.clone())
                        }
                        (_, false) => objects.push(object.clone()),
                        (_, true) => {}
                    }
                    continue;
                }
            }
            let matches = match tag {
                TypeTag::Function => self.is_function_object(object),
                TypeTag::Object => !self.is_function_object(object),
                _ => false,
            };
            if matches == positive {
                objects.push(object.clone());
            }
        }
        if positive && !union.type_vars.is_empty() {
            let tagged = tag.to_type();
            if let Some(tagged) = tagged.as_union() {
                result.primitives = result.primitives | tagged.primitives;
                objects.extend(tagged.objects.iter().cloned());
            }
        } else if !positive {
            result.type_vars = union.type_vars.clone();
        }
        result.objects = normalize_objects(Some(self.registry), objects);
        Type::from_union(result)
    }

    fn is_function_object(&self, object: &ObjectType) -> bool {
        match object {
            ObjectType::Function(_) => true,
            ObjectType::Instance(instance) => instance.id == NominalId::FUNCTION,
            ObjectType::Namespace(id) => matches!(
                self.registry.namespace(*id).kind,
                NamespaceKind::Constructor(_)
            ),
            ObjectType::Record(_) => false,
        }
    }

    pub fn substitute(&self, ty: &Type, mapping: &Substitution) -> Type {
        super::unify::substitute_with(Some(self.registry), ty, mapping)
    }
}

fn erase_type_params(function: &FunctionType) -> FunctionType {
    if function.type_params.is_empty() {
        return function.clone();
    }
    let mapping: Substitution = function
        .type_params
        .iter()
        .map(|name| (name.clone(), Type::Unknown))
        .collect();
    let apply = |ty: &Type| super::unify::substitute_with(None, ty, &mapping);
    FunctionType {
        required: function.required.iter().map(apply).collect(),
        optional: function.optional.iter().map(apply).collect(),
        rest: function.rest.as_ref().map(apply),
        return_type: apply(&function.return_type),
        receiver: function.receiver.as_ref().map(apply),
        constructs: function.constructs.as_ref().map(apply),
        type_params: Vec::new(),
        loose: function.loose,
    }
}

fn merge_sorted<T: Ord + Clone>(left: &[T], right: &[T]) -> Vec<T> {
    let mut merged: Vec<T> = left.iter().chain(right.iter()).cloned().collect();
    merged.sort();
    merged.dedup();
    merged
}

/// Join, optionally aware of the registry. Without one, nominal types are
/// merged only when they share an id.
pub(crate) fn join_with(registry: Option<&Registry>, a: &Type, b: &Type) -> Type {
    match (a, b) {
        (Type::Bottom, other) | (other, Type::Bottom) => other.clone(),
        (Type::Top, _) | (_, Type::Top) => Type::Top,
        (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
        (Type::Union(x), Type::Union(y)) => {
            let mut objects = x.objects.clone();
            objects.extend(y.objects.iter().cloned());
            let mut union = UnionType {
                primitives: x.primitives | y.primitives,
                enums: merge_sorted(&x.enums, &y.enums),
                type_vars: merge_sorted(&x.type_vars, &y.type_vars),
                objects: normalize_objects(registry, objects),
            };
            if let Some(registry) = registry {
                absorb_enums(registry, &mut union);
            }
            Type::from_union(union)
        }
    }
}

/// Drops enum members whose backing type is already covered by the rest of
/// the union.
fn absorb_enums(registry: &Registry, union: &mut UnionType) {
    if union.enums.is_empty() {
        return;
    }
    let rest = Type::from_union(UnionType {
        enums: Vec::new(),
        ..union.clone()
    });
    if rest.is_bottom() {
        return;
    }
    let lattice = Lattice::new(registry);
    union
        .enums
        .retain(|id| !lattice.is_subtype(registry.enum_backing(*id), &rest));
}

pub(crate) fn normalize_objects(registry: Option<&Registry>, objects: Vec<ObjectType>) -> Vec<ObjectType> {
    let mut result: Vec<ObjectType> = Vec::new();
    for object in objects {
        let mut pending = object;
        loop {
            let merged = result
                .iter()
                .enumerate()
                .find_map(|(index, existing)| {
                    combine_objects(registry, existing, &pending).map(|combined| (index, combined))
                });
            match merged {
                Some((index, combined)) => {
                    result.remove(index);
                    pending = combined;
                }
                None => {
                    result.push(pending);
                    break;
                }
            }
        }
    }
    result.sort_by_key(ObjectType::identity);
    result
}

fn combine_objects(registry: Option<&Registry>, a: &ObjectType, b: &ObjectType) -> Option<ObjectType> {
    match (a, b) {
        (ObjectType::Instance(x), ObjectType::Instance(y)) if x.id == y.id => {
            let count = x.args.len().max(y.args.len());
            let args = (0..count)
                .map(|index| {
                    let left = x.args.get(index).unwrap_or(&Type::Unknown);
                    let right = y.args.get(index).unwrap_or(&Type::Unknown);
                    join_with(registry, left, right)
                })
                .collect();
            Some(ObjectType::Instance(NominalInstance::new(x.id, args)))
        }
        (ObjectType::Instance(x), ObjectType::Instance(y)) => {
            let registry = registry?;
            let lattice = Lattice::new(registry);
            let mut assumed = Assumptions::new();
            if lattice.instance_subtype(x, y, &mut assumed) {
                return Some(b.clone());
            }
            if lattice.instance_subtype(y, x, &mut assumed) {
                return Some(a.clone());
            }
            let ancestor = registry.common_superclass(x.id, y.id)?;
            let left = registry.upcast(x, ancestor)?;
            let right = registry.upcast(y, ancestor)?;
            combine_objects(
                Some(registry),
                &ObjectType::Instance(left),
                &ObjectType::Instance(right),
            )
        }
        (ObjectType::Record(x), ObjectType::Record(y)) => {
            Some(ObjectType::Record(join_records(registry, x, y)))
        }
        (ObjectType::Function(x), ObjectType::Function(y)) => {
            Some(ObjectType::Function(join_functions(registry, x, y)))
        }
        (ObjectType::Namespace(x), ObjectType::Namespace(y)) if x == y => Some(a.clone()),
        _ => None,
    }
}

fn join_records(registry: Option<&Registry>, x: &RecordType, y: &RecordType) -> RecordType {
    let mut properties = IndexMap::new();
    for (name, left) in &x.properties {
        let property = match y.properties.get(name) {
            Some(right) => Property {
                ty: join_with(registry, &left.ty, &right.ty),
                optional: left.optional || right.optional,
                declared: left.declared && right.declared,
                constant: left.constant && right.constant,
            },
            None if y.loose => left.clone(),
            None => Property {
                optional: true,
                ..left.clone()
            },
        };
        properties.insert(name.clone(), property);
    }
    for (name, right) in &y.properties {
        if properties.contains_key(name) {
            continue;
        }
        let property = if x.loose {
            right.clone()
        } else {
            Property {
                optional: true,
                ..right.clone()
            }
        };
        properties.insert(name.clone(), property);
    }
    RecordType {
        properties,
        exact: x.exact && y.exact,
        loose: x.loose || y.loose,
    }
}

fn join_functions(registry: Option<&Registry>, x: &FunctionType, y: &FunctionType) -> FunctionType {
    if x == y {
        return x.clone();
    }
    let same_shape = x.required.len() == y.required.len()
        && x.optional.len() == y.optional.len()
        && x.rest.is_some() == y.rest.is_some()
        && x.constructs.is_some() == y.constructs.is_some()
        && x.type_params.is_empty()
        && y.type_params.is_empty();
    if x.loose || y.loose || !same_shape {
        return FunctionType::any();
    }
    let meet = |left: &Type, right: &Type| match registry {
        Some(registry) => Lattice::new(registry).meet(left, right),
        None if left == right => left.clone(),
        None => Type::Unknown,
    };
    FunctionType {
        required: x
            .required
            .iter()
            .zip(&y.required)
            .map(|(left, right)| meet(left, right))
            .collect(),
        optional: x
            .optional
            .iter()
            .zip(&y.optional)
            .map(|(left, right)| meet(left, right))
            .collect(),
        rest: match (&x.rest, &y.rest) {
            (Some(left), Some(right)) => Some(meet(left, right)),
            _ => None,
        },
        return_type: join_with(registry, &x.return_type, &y.return_type),
        receiver: match (&x.receiver, &y.receiver) {
            (Some(left), Some(right)) => Some(meet(left, right)),
            _ => None,
        },
        constructs: match (&x.constructs, &y.constructs) {
            (Some(left), Some(right)) => Some(join_with(registry, left, right)),
            _ => None,
        },
        type_params: Vec::new(),
        loose: false,
    }
}
