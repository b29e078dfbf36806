use super::{FunctionType, Lattice, ObjectType, Type};

impl<'r> Lattice<'r> {
    /// Describes where `found` departs from `expected`, for diagnostics.
    /// Returns `None` when the types are compatible or the top-level message
    /// already says everything.
    pub fn explain_mismatch(&self, found: &Type, expected: &Type) -> Option<String> {
        if self.is_subtype(found, expected) {
            return None;
        }
        let registry = self.registry();
        if found.member_count() > 1 {
            let offending = found
                .members()
                .into_iter()
                .find(|member| !self.is_subtype(member, expected))?;
            let mut text = format!(
                "the union member {} is not a subtype of {}",
                offending.describe(registry),
                expected.describe(registry)
            );
            if let Some(detail) = self.explain_mismatch(&offending, expected) {
                text.push_str("; ");
                text.push_str(&detail);
            }
            return Some(text);
        }
        let found_object = found.objects().first()?;
        let mut lines = Vec::new();
        for expected_object in expected.objects() {
            if let Some(line) = self.explain_object(found_object, expected_object) {
                lines.push(line);
            }
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("; "))
        }
    }

    fn explain_object(&self, found: &ObjectType, expected: &ObjectType) -> Option<String> {
        let registry = self.registry();
        match (found, expected) {
            (ObjectType::Instance(left), ObjectType::Instance(right)) if left.id == right.id => {
                let index = left
                    .args
                    .iter()
                    .zip(&right.args)
                    .position(|(found_arg, expected_arg)| !self.is_subtype(found_arg, expected_arg))?;
                Some(format!(
                    "type argument {} is {} where {} was expected",
                    index + 1,
                    left.args[index].describe(registry),
                    right.args[index].describe(registry)
                ))
            }
            (ObjectType::Function(left), ObjectType::Function(right)) => {
                self.explain_function(left, right)
            }
            (_, ObjectType::Record(_)) | (_, ObjectType::Instance(_)) => {
                let (found_properties, found_loose) = self.properties_of_object(found)?;
                let expected_properties = match expected {
                    ObjectType::Record(record) => record.properties.clone(),
                    ObjectType::Instance(instance) => {
                        if !registry.nominal(instance.id).kind.is_interface()
                            && !matches!(found, ObjectType::Record(_))
                        {
                            return None;
                        }
                        self.instance_properties(instance)
                    }
                    _ => return None,
                };
                let mut problems = Vec::new();
                for (name, property) in &expected_properties {
                    match found_properties.get(name) {
                        None if !property.optional && !found_loose => {
                            problems.push(format!("property {name} is missing"));
                        }
                        None => {}
                        Some(found_property) => {
                            if found_property.optional && !property.optional {
                                problems.push(format!("property {name} is optional but required"));
                            } else if !self.is_subtype(&found_property.ty, &property.ty) {
                                problems.push(format!(
                                    "property {} has type {} where {} was expected",
                                    name,
                                    found_property.ty.describe(registry),
                                    property.ty.describe(registry)
                                ));
                            }
                        }
                    }
                }
                if problems.is_empty() {
                    None
                } else {
                    Some(problems.join(", "))
                }
            }
            _ => None,
        }
    }

    fn explain_function(&self, found: &FunctionType, expected: &FunctionType) -> Option<String> {
        let registry = self.registry();
        if found.min_arity() > expected.min_arity() {
            return Some(format!(
                "the function requires {} arguments but callers pass at least {}",
                found.min_arity(),
                expected.min_arity()
            ));
        }
        for index in 0..expected.positional_len() {
            if let (Some(found_param), Some(expected_param)) =
                (found.param(index), expected.param(index))
            {
                if !self.is_subtype(expected_param, found_param) {
                    return Some(format!(
                        "parameter {} accepts {} but {} may be passed",
                        index + 1,
                        found_param.describe(registry),
                        expected_param.describe(registry)
                    ));
                }
            }
        }
        if !self.is_subtype(&found.return_type, &expected.return_type) {
            return Some(format!(
                "the return type {} is not a subtype of {}",
                found.return_type.describe(registry),
                expected.return_type.describe(registry)
            ));
        }
        None
    }
}
