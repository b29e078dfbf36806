use std::collections::HashMap;

use thiserror::Error;

use super::lattice::{join_with, normalize_objects};
use super::{FunctionType, Lattice, NominalInstance, ObjectType, RecordType, Type, UnionType};
use crate::registry::Registry;

/// Bindings for template variables, keyed by qualified name.
pub type Substitution = HashMap<String, Type>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnifyError {
    #[error("type variable `{var}` has no unique instantiation")]
    NotUnique {
        var: String,
        first: Type,
        second: Type,
    },
}

impl<'r> Lattice<'r> {
    /// Binds the free `params` of `template` so that `concrete` fits it.
    ///
    /// Each call extends `bindings`; a variable bound twice keeps the wider of
    /// the two types when they are related and fails otherwise.
    pub fn unify(
        &self,
        template: &Type,
        concrete: &Type,
        params: &[String],
        bindings: &mut Substitution,
    ) -> Result<(), UnifyError> {
        if params.is_empty() || concrete.is_bottom() || concrete.is_unknown() {
            return Ok(());
        }
        let Type::Union(template_union) = template else {
            return Ok(());
        };
        let free_vars: Vec<&String> = template_union
            .type_vars
            .iter()
            .filter(|name| params.contains(name))
            .collect();
        let Type::Union(concrete_union) = concrete else {
            for var in free_vars {
                self.bind(var, concrete, bindings)?;
            }
            return Ok(());
        };

        let mut matched = vec![false; concrete_union.objects.len()];
        for template_object in &template_union.objects {
            if !object_mentions(template_object, params) {
                continue;
            }
            for (index, concrete_object) in concrete_union.objects.iter().enumerate() {
                if let Some(result) =
                    self.unify_object(template_object, concrete_object, params, bindings)
                {
                    result?;
                    matched[index] = true;
                }
            }
        }
        if free_vars.is_empty() {
            return Ok(());
        }

        let fixed_objects: Vec<&ObjectType> = template_union
            .objects
            .iter()
            .filter(|object| !object_mentions(object, params))
            .collect();
        let remainder = UnionType {
            primitives: concrete_union
                .primitives
                .without(template_union.primitives),
            enums: concrete_union
                .enums
                .iter()
                .filter(|id| !template_union.enums.contains(id))
                .copied()
                .collect(),
            type_vars: concrete_union.type_vars.clone(),
            objects: concrete_union
                .objects
                .iter()
                .enumerate()
                .filter(|(index, object)| {
                    !matched[*index]
                        && !fixed_objects.iter().any(|fixed| {
                            self.is_subtype(
                                &Type::object((*object).clone()),
                                &Type::object((*fixed).clone()),
                            )
                        })
                })
                .map(|(_, object)| object.clone())
                .collect(),
        };
        let remainder = Type::from_union(remainder);
        if remainder.is_bottom() {
            return Ok(());
        }
        // With several bare variables in one union the split is ambiguous;
        // leave them unbound.
        if let [var] = free_vars.as_slice() {
            self.bind(var, &remainder, bindings)?;
        }
        Ok(())
    }

    fn bind(&self, var: &str, ty: &Type, bindings: &mut Substitution) -> Result<(), UnifyError> {
        match bindings.get(var) {
            None => {
                bindings.insert(var.to_string(), ty.clone());
                Ok(())
            }
            Some(existing) if existing.is_unknown() => {
                bindings.insert(var.to_string(), ty.clone());
                Ok(())
            }
            Some(existing) => {
                if self.is_subtype(ty, existing) {
                    return Ok(());
                }
                if self.is_subtype(existing, ty) {
                    bindings.insert(var.to_string(), ty.clone());
                    return Ok(());
                }
                Err(UnifyError::NotUnique {
                    var: var.to_string(),
                    first: existing.clone(),
                    second: ty.clone(),
                })
            }
        }
    }

    /// `None` when the two objects have unrelated shapes.
    fn unify_object(
        &self,
        template: &ObjectType,
        concrete: &ObjectType,
        params: &[String],
        bindings: &mut Substitution,
    ) -> Option<Result<(), UnifyError>> {
        match (template, concrete) {
            (ObjectType::Instance(expected), ObjectType::Instance(found)) => {
                let found = self.registry().upcast(found, expected.id)?;
                Some(self.unify_args(&expected.args, &found.args, params, bindings))
            }
            (ObjectType::Record(expected), _) => {
                let (properties, _) = self.properties_of_object(concrete)?;
                Some(self.unify_record(expected, &properties, params, bindings))
            }
            (ObjectType::Function(expected), ObjectType::Function(found)) => {
                Some(self.unify_function(expected, found, params, bindings))
            }
            (ObjectType::Function(expected), ObjectType::Namespace(id)) => {
                let (_, constructor) = self.registry().constructor_of(*id)?;
                Some(self.unify_function(expected, &constructor, params, bindings))
            }
            _ => None,
        }
    }

    fn unify_args(
        &self,
        expected: &[Type],
        found: &[Type],
        params: &[String],
        bindings: &mut Substitution,
    ) -> Result<(), UnifyError> {
        for (template, concrete) in expected.iter().zip(found) {
            self.unify(template, concrete, params, bindings)?;
        }
        Ok(())
    }

    fn unify_record(
        &self,
        expected: &RecordType,
        found: &indexmap::IndexMap<String, super::Property>,
        params: &[String],
        bindings: &mut Substitution,
    ) -> Result<(), UnifyError> {
        for (name, property) in &expected.properties {
            if let Some(found_property) = found.get(name) {
                self.unify(&property.ty, &found_property.ty, params, bindings)?;
            }
        }
        Ok(())
    }

    fn unify_function(
        &self,
        expected: &FunctionType,
        found: &FunctionType,
        params: &[String],
        bindings: &mut Substitution,
    ) -> Result<(), UnifyError> {
        if found.loose {
            return Ok(());
        }
        let count = expected.positional_len().min(found.positional_len());
        for index in 0..count {
            if let (Some(template), Some(concrete)) = (expected.param(index), found.param(index)) {
                self.unify(template, concrete, params, bindings)?;
            }
        }
        if let (Some(template), Some(concrete)) = (&expected.rest, &found.rest) {
            self.unify(template, concrete, params, bindings)?;
        }
        self.unify(&expected.return_type, &found.return_type, params, bindings)
    }

    /// Applies `bindings` to a generic function; unbound variables become `?`.
    pub fn instantiate(&self, function: &FunctionType, bindings: &Substitution) -> FunctionType {
        let mut mapping = bindings.clone();
        for name in &function.type_params {
            mapping.entry(name.clone()).or_insert(Type::Unknown);
        }
        let mut instantiated = FunctionType {
            type_params: Vec::new(),
            ..function.clone()
        };
        instantiated.required = function
            .required
            .iter()
            .map(|ty| self.substitute(ty, &mapping))
            .collect();
        instantiated.optional = function
            .optional
            .iter()
            .map(|ty| self.substitute(ty, &mapping))
            .collect();
        instantiated.rest = function.rest.as_ref().map(|ty| self.substitute(ty, &mapping));
        instantiated.return_type = self.substitute(&function.return_type, &mapping);
        instantiated.receiver = function
            .receiver
            .as_ref()
            .map(|ty| self.substitute(ty, &mapping));
        instantiated.constructs = function
            .constructs
            .as_ref()
            .map(|ty| self.substitute(ty, &mapping));
        instantiated
    }
}

fn object_mentions(object: &ObjectType, params: &[String]) -> bool {
    let ty = Type::object(object.clone());
    mentions(&ty, params)
}

fn mentions(ty: &Type, params: &[String]) -> bool {
    let Type::Union(union) = ty else {
        return false;
    };
    if union.type_vars.iter().any(|name| params.contains(name)) {
        return true;
    }
    union.objects.iter().any(|object| match object {
        ObjectType::Instance(instance) => instance.args.iter().any(|arg| mentions(arg, params)),
        ObjectType::Record(record) => record
            .properties
            .values()
            .any(|property| mentions(&property.ty, params)),
        ObjectType::Function(function) => {
            function.required.iter().any(|ty| mentions(ty, params))
                || function.optional.iter().any(|ty| mentions(ty, params))
                || function.rest.as_ref().is_some_and(|ty| mentions(ty, params))
                || mentions(&function.return_type, params)
        }
        ObjectType::Namespace(_) => false,
    })
}

/// Replaces template variables without consulting the registry.
pub(crate) fn substitute_syntactic(ty: &Type, mapping: &Substitution) -> Type {
    substitute_with(None, ty, mapping)
}

pub(crate) fn substitute_with(registry: Option<&Registry>, ty: &Type, mapping: &Substitution) -> Type {
    let Type::Union(union) = ty else {
        return ty.clone();
    };
    let (mapped, kept): (Vec<&String>, Vec<&String>) = union
        .type_vars
        .iter()
        .partition(|name| mapping.contains_key(*name));
    let mut result = Type::from_union(UnionType {
        primitives: union.primitives,
        enums: union.enums.clone(),
        type_vars: kept.into_iter().cloned().collect(),
        objects: Vec::new(),
    });
    for name in mapped {
        if let Some(replacement) = mapping.get(name) {
            result = join_with(registry, &result, replacement);
        }
    }
    let objects: Vec<ObjectType> = union
        .objects
        .iter()
        .map(|object| substitute_object(registry, object, mapping))
        .collect();
    if objects.is_empty() {
        return result;
    }
    let objects = Type::from_union(UnionType {
        objects: normalize_objects(registry, objects),
        ..UnionType::default()
    });
    join_with(registry, &result, &objects)
}

fn substitute_object(registry: Option<&Registry>, object: &ObjectType, mapping: &Substitution) -> ObjectType {
    let apply = |ty: &Type| substitute_with(registry, ty, mapping);
    match object {
        ObjectType::Instance(instance) => ObjectType::Instance(NominalInstance::new(
            instance.id,
            instance.args.iter().map(apply).collect(),
        )),
        ObjectType::Record(record) => {
            let mut record = record.clone();
            for property in record.properties.values_mut() {
                property.ty = apply(&property.ty);
            }
            ObjectType::Record(record)
        }
        ObjectType::Function(function) => {
            let shadowed = function
                .type_params
                .iter()
                .any(|name| mapping.contains_key(name));
            let owned;
            let mapping = if shadowed {
                owned = mapping
                    .iter()
                    .filter(|(name, _)| !function.type_params.contains(name))
                    .map(|(name, ty)| (name.clone(), ty.clone()))
                    .collect::<Substitution>();
                &owned
            } else {
                mapping
            };
            let apply = |ty: &Type| substitute_with(registry, ty, mapping);
            ObjectType::Function(FunctionType {
                required: function.required.iter().map(apply).collect(),
                optional: function.optional.iter().map(apply).collect(),
                rest: function.rest.as_ref().map(apply),
                return_type: apply(&function.return_type),
                receiver: function.receiver.as_ref().map(apply),
                constructs: function.constructs.as_ref().map(apply),
                type_params: function.type_params.clone(),
                loose: function.loose,
            })
        }
        ObjectType::Namespace(id) => ObjectType::Namespace(*id),
    }
}
