//! Property-based tests for the type lattice.
//!
//! Types are drawn from primitive sets, small structural records, arrays,
//! function types, `Object` and the special bottom, top and unknown types,
//! then checked against the laws join, meet and subtyping must obey.

use indexmap::IndexMap;
use jsflow_checker::registry::NominalId;
use jsflow_checker::types::{FunctionType, Lattice, PrimitiveSet, Property, RecordType, Type};
use jsflow_checker::Registry;
use proptest::prelude::*;

fn primitive() -> impl Strategy<Value = Type> {
    (1u8..64).prop_map(|bits| Type::primitive(PrimitiveSet::from_bits(bits)))
}

fn record() -> impl Strategy<Value = Type> {
    prop::collection::vec(
        (prop::sample::select(vec!["a", "b", "c"]), primitive(), any::<bool>()),
        0..3,
    )
    .prop_map(|fields| {
        let mut properties = IndexMap::new();
        for (name, ty, optional) in fields {
            let property = if optional {
                Property::optional(ty)
            } else {
                Property::declared(ty)
            };
            properties.insert(name.to_string(), property);
        }
        Type::record(RecordType::new(properties))
    })
}

fn arb_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        4 => primitive(),
        3 => record(),
        2 => (primitive(), record()).prop_map(|(left, right)| {
            let registry = Registry::new();
            Lattice::new(&registry).join(&left, &right)
        }),
        1 => Just(Type::Bottom),
        1 => Just(Type::Top),
        1 => Just(Type::Unknown),
    ]
}

fn array() -> impl Strategy<Value = Type> {
    primitive().prop_map(|element| Type::instance(NominalId::ARRAY, vec![element]))
}

fn function() -> impl Strategy<Value = Type> {
    (prop::collection::vec(primitive(), 0..3), primitive())
        .prop_map(|(params, ret)| Type::function(FunctionType::new(params, ret)))
}

/// Everything `arb_type` draws plus nominal and function members.
fn wide_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        3 => arb_type(),
        2 => array(),
        2 => function(),
        1 => Just(Type::instance(NominalId::OBJECT, vec![])),
        2 => (primitive(), prop_oneof![array(), function()]).prop_map(|(left, right)| {
            let registry = Registry::new();
            Lattice::new(&registry).join(&left, &right)
        }),
    ]
}

fn equivalent(lattice: &Lattice<'_>, a: &Type, b: &Type) -> bool {
    lattice.is_subtype(a, b) && lattice.is_subtype(b, a)
}

proptest! {
    #[test]
    fn subtyping_is_reflexive(ty in arb_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        prop_assert!(lattice.is_subtype(&ty, &ty));
    }

    #[test]
    fn join_is_an_upper_bound(a in arb_type(), b in arb_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let joined = lattice.join(&a, &b);
        prop_assert!(lattice.is_subtype(&a, &joined), "{:?} not below {:?}", a, joined);
        prop_assert!(lattice.is_subtype(&b, &joined), "{:?} not below {:?}", b, joined);
    }

    #[test]
    fn join_is_commutative_up_to_equivalence(a in arb_type(), b in arb_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let left = lattice.join(&a, &b);
        let right = lattice.join(&b, &a);
        prop_assert!(lattice.is_subtype(&left, &right));
        prop_assert!(lattice.is_subtype(&right, &left));
    }

    #[test]
    fn join_with_bottom_is_identity(ty in arb_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        prop_assert_eq!(lattice.join(&ty, &Type::Bottom), ty);
    }

    #[test]
    fn meet_is_a_lower_bound(a in arb_type(), b in arb_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let met = lattice.meet(&a, &b);
        prop_assert!(lattice.is_subtype(&met, &a), "{:?} not below {:?}", met, a);
        prop_assert!(lattice.is_subtype(&met, &b), "{:?} not below {:?}", met, b);
    }

    #[test]
    fn primitive_subtyping_is_set_inclusion(a in 1u8..64, b in 1u8..64) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let left = PrimitiveSet::from_bits(a);
        let right = PrimitiveSet::from_bits(b);
        prop_assert_eq!(
            lattice.is_subtype(&Type::primitive(left), &Type::primitive(right)),
            right.contains(left)
        );
    }

    #[test]
    fn truthy_and_falsy_cover_the_type(bits in 1u8..64) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let ty = Type::primitive(PrimitiveSet::from_bits(bits));
        let rejoined = lattice.join(&lattice.truthy(&ty), &lattice.falsy(&ty));
        prop_assert!(lattice.is_subtype(&ty, &rejoined));
    }

    #[test]
    fn excluding_null_leaves_a_non_nullable_type(bits in 1u8..64) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let ty = Type::primitive(PrimitiveSet::from_bits(bits));
        let rest = lattice.exclude(&ty, &Type::null());
        prop_assert!(!rest.primitives().intersects(PrimitiveSet::NULL));
        prop_assert!(lattice.is_subtype(&rest, &ty));
    }

    #[test]
    fn top_and_bottom_bound_every_type(ty in wide_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        prop_assert!(lattice.is_subtype(&ty, &Type::Top));
        prop_assert!(lattice.is_subtype(&Type::Bottom, &ty));
    }

    #[test]
    fn meet_with_top_is_identity(ty in wide_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        prop_assert_eq!(lattice.meet(&ty, &Type::Top), ty);
    }

    #[test]
    fn meet_is_commutative_up_to_equivalence(a in wide_type(), b in wide_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let left = lattice.meet(&a, &b);
        let right = lattice.meet(&b, &a);
        prop_assert!(equivalent(&lattice, &left, &right), "{:?} vs {:?}", left, right);
    }

    #[test]
    fn wide_join_is_an_upper_bound(a in wide_type(), b in wide_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let joined = lattice.join(&a, &b);
        prop_assert!(lattice.is_subtype(&a, &joined), "{:?} not below {:?}", a, joined);
        prop_assert!(lattice.is_subtype(&b, &joined), "{:?} not below {:?}", b, joined);
    }

    #[test]
    fn join_is_idempotent_and_associative(a in wide_type(), b in wide_type(), c in wide_type()) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        prop_assert!(equivalent(&lattice, &lattice.join(&a, &a), &a));
        let left = lattice.join(&lattice.join(&a, &b), &c);
        let right = lattice.join(&a, &lattice.join(&b, &c));
        prop_assert!(equivalent(&lattice, &left, &right), "{:?} vs {:?}", left, right);
    }

    #[test]
    fn specializing_to_an_excluded_member_is_bottom(bits in 1u8..64, removed in 1u8..64) {
        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let union = Type::primitive(PrimitiveSet::from_bits(bits));
        let member = Type::primitive(PrimitiveSet::from_bits(removed));
        let rest = lattice.exclude(&union, &member);
        prop_assert!(!rest.primitives().intersects(PrimitiveSet::from_bits(removed)));
        prop_assert_eq!(lattice.specialize(&rest, &member), Type::Bottom);
    }
}
