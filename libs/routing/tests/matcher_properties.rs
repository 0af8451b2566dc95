//! Property tests for wildcard matching

use proptest::prelude::*;
use routing::{matches, AddressPattern};

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,6}"
}

fn address() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(segment(), 1..8)
}

/// Reference matcher: plain recursion over both segment lists
fn reference(address: &[String], pattern: &[String]) -> bool {
    match pattern.split_first() {
        None => address.is_empty(),
        Some((token, rest)) if token == "#" => {
            (0..=address.len()).any(|skip| reference(&address[skip..], rest))
        }
        Some((token, rest)) => match address.split_first() {
            Some((segment, tail)) => (token == "*" || token == segment) && reference(tail, rest),
            None => false,
        },
    }
}

fn pattern_from(address: &[String], mask: &[u8]) -> Vec<String> {
    address
        .iter()
        .zip(mask.iter().cycle())
        .map(|(segment, m)| match m % 4 {
            0 => "*".to_string(),
            1 => "#".to_string(),
            _ => segment.clone(),
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_literal_patterns_match_only_identical(a in address(), b in address()) {
        let result = matches(&a.join("."), &b.join(".")).unwrap();
        prop_assert_eq!(result, a == b);
    }

    #[test]
    fn prop_any_words_matches_everything(a in address()) {
        prop_assert!(matches(&a.join("."), "#").unwrap());
    }

    #[test]
    fn prop_address_matches_its_wildcarded_self(a in address(), mask in proptest::collection::vec(any::<u8>(), 1..8)) {
        let pattern = pattern_from(&a, &mask);
        prop_assert!(matches(&a.join("."), &pattern.join(".")).unwrap());
    }

    #[test]
    fn prop_agrees_with_reference(
        pattern in proptest::collection::vec(
            prop_oneof![Just("*".to_string()), Just("#".to_string()), "[a-c]{1}"],
            1..6,
        ),
        b in proptest::collection::vec("[a-c]{1}", 1..6),
    ) {
        // Small alphabet so literals actually line up
        let expected = reference(&b, &pattern);
        let parsed = AddressPattern::new(&pattern.join(".")).unwrap();
        let query = AddressPattern::new(&b.join(".")).unwrap();
        prop_assert_eq!(parsed.matches(&query), expected);
    }
}

#[test]
fn test_documented_backtracking_cases() {
    assert!(matches("a.b.c.d.e.f", "a.#.c.d.*.f").unwrap());
    assert!(!matches("a.b.c.d.e.x", "a.#.c.d.*.f").unwrap());
    assert!(matches("x.b.y", "#.b.#").unwrap());
}
