pub mod collection;
pub mod convert;
pub mod math;
pub mod string;

use crate::registry::Registry;

/// The standard library of built-in functions, grounded in FHIRPath's
/// function catalog and the CQL collection/arithmetic operators.
pub fn build_standard_registry() -> Registry {
    let mut r = Registry::new();

    r.register(collection::UnionFn)
        .register(collection::IntersectFn)
        .register(collection::ExceptFn)
        .register(collection::CountFn)
        .register(collection::EmptyFn)
        .register(collection::ExistsFn)
        .register(collection::FirstFn)
        .register(collection::LastFn)
        .register(collection::DistinctFn)
        .register(collection::FlattenFn)
        .register(collection::ContainsFn);

    r.register(string::UpperFn)
        .register(string::LowerFn)
        .register(string::TrimFn)
        .register(string::LengthFn)
        .register(string::StartsWithFn)
        .register(string::EndsWithFn)
        .register(string::IndexOfFn)
        .register(string::SubstringFn)
        .register(string::ReplaceFn)
        .register(string::SplitFn);

    r.register(math::AbsFn)
        .register(math::CeilingFn)
        .register(math::FloorFn)
        .register(math::TruncateFn)
        .register(math::RoundFn)
        .register(math::SqrtFn)
        .register(math::LnFn)
        .register(math::ExpFn)
        .register(math::LogFn)
        .register(math::PowerFn);

    r.register(convert::ToStringFn)
        .register(convert::ToIntegerFn)
        .register(convert::ToDecimalFn)
        .register(convert::ToBooleanFn);

    r
}
