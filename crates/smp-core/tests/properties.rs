//! Property-based tests for identifier equality and migration codes
//!
//! 1. Equality and hashing agree for scheme-aware identifiers
//! 2. Case-insensitive schemes ignore value case, case-sensitive ones do not
//! 3. Generated migration codes always have the required composition

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use proptest::prelude::*;
use smp_core::{
    generate_migration_code, IdScheme, Identifier, MIGRATION_CODE_LENGTH, MIGRATION_SYMBOLS,
    NO_PROCESS,
};

fn hash_of(id: &Identifier) -> u64 {
    let mut h = DefaultHasher::new();
    id.hash(&mut h);
    h.finish()
}

// =============================================================================
// IDENTIFIER EQUALITY
// =============================================================================

proptest! {
    #[test]
    fn prop_case_insensitive_scheme_ignores_case(
        scheme_id in "[a-z][a-z0-9-]{2,20}",
        value in "[0-9]{4}:[a-zA-Z0-9]{1,16}",
    ) {
        let scheme = IdScheme::new(scheme_id, false).unwrap();
        let upper = Identifier::with_scheme(scheme.clone(), value.to_uppercase()).unwrap();
        let lower = Identifier::with_scheme(scheme, value.to_lowercase()).unwrap();

        prop_assert_eq!(&upper, &lower);
        prop_assert_eq!(hash_of(&upper), hash_of(&lower));
        prop_assert_eq!(upper.to_string(), lower.to_string());
    }

    #[test]
    fn prop_case_sensitive_scheme_honours_case(
        scheme_id in "[a-z][a-z0-9-]{2,20}",
        value in "[a-z]{1,16}",
    ) {
        let scheme = IdScheme::new(scheme_id, true).unwrap();
        let upper = Identifier::with_scheme(scheme.clone(), value.to_uppercase()).unwrap();
        let lower = Identifier::with_scheme(scheme, value.clone()).unwrap();

        prop_assert_ne!(&upper, &lower);
        prop_assert!(upper.to_string().ends_with(&value.to_uppercase()));
    }

    #[test]
    fn prop_equal_implies_same_hash_and_symmetric(
        a_scheme in prop::option::of(("[a-c]{1,2}", any::<bool>())),
        b_scheme in prop::option::of(("[a-c]{1,2}", any::<bool>())),
        a_value in "[aAbB]{1,3}",
        b_value in "[aAbB]{1,3}",
    ) {
        let make = |s: Option<(String, bool)>, v: String| {
            let scheme = s.map(|(id, cs)| IdScheme::new(id, cs).unwrap());
            Identifier::new(scheme, v).unwrap()
        };
        let a = make(a_scheme, a_value);
        let b = make(b_scheme, b_value);

        prop_assert_eq!(a == b, b == a);
        if a == b {
            prop_assert_eq!(hash_of(&a), hash_of(&b));
            prop_assert_eq!(a.canonical_string(), b.canonical_string());
        }
    }

    #[test]
    fn prop_no_process_equal_across_schemes(
        a in "[a-z]{3,10}",
        b in "[a-z]{3,10}",
        a_cs in any::<bool>(),
        b_cs in any::<bool>(),
    ) {
        let x = Identifier::with_scheme(IdScheme::new(a, a_cs).unwrap(), NO_PROCESS).unwrap();
        let y = Identifier::with_scheme(IdScheme::new(b, b_cs).unwrap(), NO_PROCESS).unwrap();

        prop_assert_eq!(&x, &y);
        prop_assert_eq!(hash_of(&x), hash_of(&y));
    }
}

// =============================================================================
// MIGRATION CODES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_migration_code_composition(_seed in any::<u8>()) {
        let code = generate_migration_code();

        prop_assert_eq!(code.chars().count(), MIGRATION_CODE_LENGTH);
        prop_assert!(code.chars().filter(|c| c.is_ascii_uppercase()).count() >= 2);
        prop_assert!(code.chars().filter(|c| c.is_ascii_lowercase()).count() >= 2);
        prop_assert!(code.chars().filter(|c| c.is_ascii_digit()).count() >= 2);
        prop_assert!(code.chars().filter(|c| MIGRATION_SYMBOLS.contains(*c)).count() >= 2);
        prop_assert!(code.chars().all(|c| c.is_ascii_alphanumeric() || MIGRATION_SYMBOLS.contains(c)));
    }
}
