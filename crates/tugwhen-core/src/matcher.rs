//! Wildcard matching of call keys against specification keys.
//!
//! Both keys come from the same signature, so they line up parameter by
//! parameter. Per parameter, with `spec` the registered value and `call` the
//! incoming one:
//!
//! - `spec` is the wildcard: match
//! - both are sequences of equal length: element-wise recursive match
//! - both are sets of equal size: every spec element matches a distinct call
//!   element
//! - otherwise: exact equality
//!
//! `**kwargs` groups are compared by keyword name, not position, so the call
//! order of keyword arguments never matters. Whether the call may carry
//! keywords the specification does not mention is governed by
//! [`KeywordMatch`].

use serde::{Deserialize, Serialize};

use crate::key::{CanonicalKey, CanonicalValue};
use crate::signature::ParamKind;

/// How `**kwargs` key sets are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMatch {
    /// Call and specification must name exactly the same extra keywords.
    #[default]
    Exact,
    /// The call may carry extra keywords the specification does not mention.
    Subset,
}

impl KeywordMatch {
    /// Parse a keyword match mode from its name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Some(KeywordMatch::Exact),
            "subset" => Some(KeywordMatch::Subset),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeywordMatch::Exact => "exact",
            KeywordMatch::Subset => "subset",
        }
    }
}

/// Returns true if `call` satisfies the specification `spec`.
pub fn matches(call: &CanonicalKey, spec: &CanonicalKey, keywords: KeywordMatch) -> bool {
    if call.len() != spec.len() {
        return false;
    }
    call.entries()
        .iter()
        .zip(spec.entries())
        .all(|(call_entry, spec_entry)| {
            call_entry.name == spec_entry.name
                && match call_entry.kind {
                    ParamKind::KwArgs => {
                        keywords_match(&spec_entry.value, &call_entry.value, keywords)
                    }
                    _ => values_match(&spec_entry.value, &call_entry.value),
                }
        })
}

/// Recursive value match, wildcards allowed on the spec side only.
pub fn values_match(spec: &CanonicalValue, call: &CanonicalValue) -> bool {
    match (spec, call) {
        (CanonicalValue::Wildcard, _) => true,
        (CanonicalValue::Seq(expected), CanonicalValue::Seq(actual)) => {
            expected.len() == actual.len()
                && expected
                    .iter()
                    .zip(actual)
                    .all(|(s, c)| values_match(s, c))
        }
        (CanonicalValue::Set(expected), CanonicalValue::Set(actual)) => {
            expected.len() == actual.len()
                && assign(expected, actual, &mut vec![false; actual.len()])
        }
        _ => spec == call,
    }
}

/// Find a one-to-one assignment of spec elements to call elements.
fn assign(spec: &[CanonicalValue], call: &[CanonicalValue], used: &mut [bool]) -> bool {
    let Some((first, rest)) = spec.split_first() else {
        return true;
    };
    for (i, candidate) in call.iter().enumerate() {
        if !used[i] && values_match(first, candidate) {
            used[i] = true;
            if assign(rest, call, used) {
                return true;
            }
            used[i] = false;
        }
    }
    false
}

fn keywords_match(spec: &CanonicalValue, call: &CanonicalValue, mode: KeywordMatch) -> bool {
    let (CanonicalValue::Seq(spec_pairs), CanonicalValue::Seq(call_pairs)) = (spec, call) else {
        return values_match(spec, call);
    };
    if mode == KeywordMatch::Exact && spec_pairs.len() != call_pairs.len() {
        return false;
    }
    spec_pairs.iter().all(|pair| match pair.as_pair() {
        Some((name, expected)) => call_pairs
            .iter()
            .filter_map(CanonicalValue::as_pair)
            .find(|(call_name, _)| *call_name == name)
            .is_some_and(|(_, actual)| values_match(expected, actual)),
        None => false,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::bind::{bind, CallArgs};
    use crate::signature::{Parameter, Signature};
    use crate::value::{Value, ANY};

    fn f_sig() -> Signature {
        Signature::new(vec![
            Parameter::regular("a"),
            Parameter::regular("b"),
            Parameter::keyword_only("c"),
            Parameter::keyword_only("d"),
        ])
        .unwrap()
    }

    fn variadic() -> Signature {
        Signature::new(vec![Parameter::var_args("args"), Parameter::kwargs("kwargs")]).unwrap()
    }

    fn key(sig: &Signature, call: CallArgs) -> CanonicalKey {
        CanonicalKey::build(&bind(sig, &call).unwrap()).unwrap()
    }

    fn check(sig: &Signature, spec: CallArgs, call: CallArgs) -> bool {
        matches(&key(sig, call), &key(sig, spec), KeywordMatch::Exact)
    }

    mod scalars {
        use super::*;

        #[test]
        fn identical_concrete_call_matches() {
            assert!(check(&f_sig(), args!(1, 2, c = 3, d = 4), args!(1, 2, c = 3, d = 4)));
        }

        #[test]
        fn any_single_difference_fails() {
            let spec = || args!(1, 2, c = 3, d = 4);
            assert!(!check(&f_sig(), spec(), args!(9, 2, c = 3, d = 4)));
            assert!(!check(&f_sig(), spec(), args!(1, 9, c = 3, d = 4)));
            assert!(!check(&f_sig(), spec(), args!(1, 2, c = 9, d = 4)));
            assert!(!check(&f_sig(), spec(), args!(1, 2, c = 3, d = 9)));
        }

        #[test]
        fn wildcard_position_matches_anything() {
            let spec = || args!(ANY, 2, c = 3, d = 4);
            assert!(check(&f_sig(), spec(), args!(99, 2, c = 3, d = 4)));
            assert!(check(&f_sig(), spec(), args!("str", 2, c = 3, d = 4)));
            assert!(check(&f_sig(), spec(), args!(Value::list([1, 2]), 2, c = 3, d = 4)));
            assert!(!check(&f_sig(), spec(), args!(99, 3, c = 3, d = 4)));
        }

        #[test]
        fn types_are_not_coerced() {
            assert!(!check(&f_sig(), args!(1, 2, c = 3, d = 4), args!(1.0, 2, c = 3, d = 4)));
        }
    }

    mod nested {
        use super::*;

        fn one() -> Signature {
            Signature::new(vec![Parameter::regular("x")]).unwrap()
        }

        #[test]
        fn wildcard_inside_list() {
            let spec = || args!(Value::list([Value::from(1), ANY, Value::from(3)]));
            assert!(check(&one(), spec(), args!(Value::list([1, 2, 3]))));
            assert!(check(&one(), spec(), args!(Value::list([1.into(), Value::list(["deep"]), 3.into()]))));
            assert!(!check(&one(), spec(), args!(Value::list([1, 2, 4]))));
        }

        #[test]
        fn sequences_must_have_equal_length() {
            let spec = || args!(Value::list([1.into(), ANY]));
            assert!(!check(&one(), spec(), args!(Value::list([1, 2, 3]))));
            assert!(!check(&one(), spec(), args!(Value::list([1]))));
        }

        #[test]
        fn wildcard_inside_dict_value() {
            let spec = || args!(Value::dict([("id", Value::from(7)), ("at", ANY)]));
            assert!(check(&one(), spec(), args!(Value::dict([("id", Value::from(7)), ("at", Value::from("now"))]))));
            assert!(!check(&one(), spec(), args!(Value::dict([("id", Value::from(8)), ("at", Value::from("now"))]))));
        }

        #[test]
        fn wildcard_inside_set_is_order_independent() {
            let spec = || args!(Value::set([ANY, Value::from(2)]));
            assert!(check(&one(), spec(), args!(Value::set([2, 5]))));
            assert!(check(&one(), spec(), args!(Value::set([5, 2]))));
            assert!(!check(&one(), spec(), args!(Value::set([5, 6]))));
            assert!(!check(&one(), spec(), args!(Value::set([2]))));
        }

        #[test]
        fn wildcard_replaces_whole_structure() {
            assert!(check(&one(), args!(ANY), args!(Value::dict([("a", 1)]))));
        }

        #[test]
        fn structure_against_scalar_fails() {
            assert!(!check(&one(), args!(Value::list([ANY])), args!(1)));
        }
    }

    mod variadics {
        use super::*;

        #[test]
        fn args_and_kwargs_match_exactly() {
            let spec = || args!(1, 2, a = 2);
            assert!(check(&variadic(), spec(), args!(1, 2, a = 2)));
            assert!(!check(&variadic(), spec(), args!(1, 2, a = 3)));
            assert!(!check(&variadic(), spec(), args!(2, 1, a = 2)));
            assert!(!check(&variadic(), spec(), args!(1, a = 2)));
        }

        #[test]
        fn wildcard_inside_var_args() {
            let spec = || args!(2, ANY, 4, a = 1);
            assert!(check(&variadic(), spec(), args!(2, 3, 4, a = 1)));
            assert!(check(&variadic(), spec(), args!(2, "x", 4, a = 1)));
            assert!(!check(&variadic(), spec(), args!(3, 2, 4, a = 1)));
        }

        #[test]
        fn kwargs_compare_by_name_not_order() {
            let sig =
                Signature::new(vec![Parameter::regular("a"), Parameter::kwargs("kwargs")]).unwrap();
            let spec = || args!(1, kwarg_a = ANY, kwarg_b = "bbb");
            assert!(check(&sig, spec(), args!(1, kwarg_b = "bbb", kwarg_a = "aaa")));
            assert!(check(&sig, spec(), args!(1, kwarg_a = "aaa", kwarg_b = "bbb")));
            assert!(!check(&sig, spec(), args!(2, kwarg_a = "aaa", kwarg_b = "bbb")));
            assert!(!check(&sig, spec(), args!(1, kwarg_a = "aaa", kwarg_b = "ccc")));
        }

        #[test]
        fn exact_mode_rejects_extra_keywords() {
            let call = key(&variadic(), args!(a = 1, b = 2));
            let spec = key(&variadic(), args!(a = 1));
            assert!(!matches(&call, &spec, KeywordMatch::Exact));
        }

        #[test]
        fn subset_mode_allows_extra_keywords() {
            let call = key(&variadic(), args!(a = 1, b = 2));
            let spec = key(&variadic(), args!(a = 1));
            assert!(matches(&call, &spec, KeywordMatch::Subset));

            let missing = key(&variadic(), args!(b = 2));
            assert!(!matches(&missing, &spec, KeywordMatch::Subset));
        }
    }

    mod keyword_match {
        use super::*;

        #[test]
        fn parses_names() {
            assert_eq!(KeywordMatch::parse("exact"), Some(KeywordMatch::Exact));
            assert_eq!(KeywordMatch::parse(" Subset "), Some(KeywordMatch::Subset));
            assert_eq!(KeywordMatch::parse("loose"), None);
            assert_eq!(KeywordMatch::default().as_str(), "exact");
        }
    }
}
