//! # Queue-Family Assignment
//!
//! Maps an ordered list of required queue families `R` onto the target's
//! reported families `T`.
//!
//! 1. `|R| > |T|` fails immediately.
//! 2. Pre-check: every `R[i]` must be satisfied by at least one `T[j]`. A
//!    group nothing satisfies is reported on its own ([`DiagnosticKind::Missing`]).
//! 3. `|T|` above the configured bound is rejected
//!    ([`DiagnosticKind::BoundExceeded`]); the search is factorial.
//! 4. Search permutations of `0..|T|` in lexicographic order and accept the
//!    first where every `R[i]` is satisfied by `T[p[i]]`. When none exists the
//!    single [`DiagnosticKind::Exhausted`] diagnostic is returned.
//!
//! The accepted assignment carries over: each assigned family is `T[p[i]]`
//! with the members `R[i]` sets laid over it. Reported families past
//! `|R|` are dropped.

use devcap_core::diagnostic::index_path;
use devcap_core::{Diagnostic, DiagnosticKind, Value};
use devcap_profile::StructValues;

use crate::walker::{overlay, FieldWalker};

/// An accepted assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Full permutation of reported indices; `permutation[i]` serves `R[i]`.
    pub permutation: Vec<usize>,
    /// One fully populated family per required group.
    pub families: Vec<StructValues>,
}

/// Assign reported families to required ones.
pub fn assign(
    walker: &FieldWalker<'_>,
    path: &str,
    required: &[StructValues],
    reported: &[StructValues],
    bound: usize,
) -> Result<Assignment, Vec<Diagnostic>> {
    let (r, t) = (required.len(), reported.len());
    if r == 0 {
        return Ok(Assignment {
            permutation: (0..t).collect(),
            families: Vec::new(),
        });
    }
    if r > t {
        return Err(vec![Diagnostic {
            declared: Some(count(r)),
            actual: Some(count(t)),
            ..Diagnostic::missing(path, None)
        }
        .with_note("fewer queue families reported than required")]);
    }

    // satisfies[i][j]: T[j] satisfies R[i].
    let satisfies: Vec<Vec<bool>> = required
        .iter()
        .map(|want| reported.iter().map(|have| walker.satisfies(want, have)).collect())
        .collect();

    let unmatched: Vec<Diagnostic> = satisfies
        .iter()
        .enumerate()
        .filter(|(_, row)| !row.iter().any(|&ok| ok))
        .map(|(i, _)| {
            Diagnostic::missing(index_path(path, i), None)
                .with_note("no reported queue family satisfies this group")
        })
        .collect();
    if !unmatched.is_empty() {
        return Err(unmatched);
    }

    if t > bound {
        tracing::warn!(reported = t, bound, "queue family search bound exceeded");
        return Err(vec![Diagnostic {
            declared: Some(count(bound)),
            actual: Some(count(t)),
            ..Diagnostic::new(path, DiagnosticKind::BoundExceeded)
        }
        .with_note("reported queue family count exceeds the assignment search bound")]);
    }

    tracing::debug!(required = r, reported = t, "searching queue family assignment");
    let mut prefix = Vec::with_capacity(r);
    let mut used = vec![false; t];
    if !search(&satisfies, &mut prefix, &mut used) {
        tracing::debug!(required = r, reported = t, "queue family assignment exhausted");
        return Err(vec![Diagnostic::new(path, DiagnosticKind::Exhausted).with_note(
            "every required queue family is individually satisfiable, but not simultaneously",
        )]);
    }

    let families = prefix
        .iter()
        .zip(required)
        .map(|(&j, want)| overlay(&reported[j], want))
        .collect();
    // The lexicographically first full permutation with this prefix.
    let mut permutation = prefix;
    permutation.extend((0..t).filter(|j| !used[*j]));
    Ok(Assignment {
        permutation,
        families,
    })
}

/// Depth-first over positions, smallest unused index first.
fn search(satisfies: &[Vec<bool>], prefix: &mut Vec<usize>, used: &mut [bool]) -> bool {
    let i = prefix.len();
    let Some(row) = satisfies.get(i) else {
        return true;
    };
    for j in 0..used.len() {
        if used[j] || !row[j] {
            continue;
        }
        used[j] = true;
        prefix.push(j);
        if search(satisfies, prefix, used) {
            return true;
        }
        prefix.pop();
        used[j] = false;
    }
    false
}

fn count(n: usize) -> Value {
    Value::Uint(u64::try_from(n).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcap_core::Fields;
    use devcap_registry::Registry;
    use serde_json::json;

    const A: u64 = 0b01;
    const B: u64 = 0b10;

    fn registry() -> Registry {
        Registry::from_json(&json!({
            "structs": [ { "name": "Queue", "members": [
                { "name": "flags", "type": "uint", "limit": "bitmask" },
                { "name": "count", "type": "uint", "limit": "max" } ] } ]
        }))
        .unwrap()
    }

    fn family(reg: &Registry, flags: u64, count: u64) -> StructValues {
        StructValues::from([(
            reg.resolve("Queue").unwrap(),
            Fields::from([
                ("flags".to_string(), Value::Uint(flags)),
                ("count".to_string(), Value::Uint(count)),
            ]),
        )])
    }

    #[test]
    fn lexicographically_first_permutation() {
        let reg = registry();
        let walker = FieldWalker::new(&reg);
        let required = [family(&reg, A, 1)];
        let reported = [family(&reg, A, 1), family(&reg, A, 1), family(&reg, B, 1)];
        let got = assign(&walker, "q", &required, &reported, 8).unwrap();
        assert_eq!(got.permutation, vec![0, 1, 2]);
    }

    #[test]
    fn search_backtracks() {
        let reg = registry();
        let walker = FieldWalker::new(&reg);
        // R[0] fits either, R[1] only fits T[0].
        let required = [family(&reg, A, 1), family(&reg, A | B, 1)];
        let reported = [family(&reg, A | B, 1), family(&reg, A, 1)];
        let got = assign(&walker, "q", &required, &reported, 8).unwrap();
        assert_eq!(got.permutation, vec![1, 0]);
    }

    #[test]
    fn too_few_reported() {
        let reg = registry();
        let walker = FieldWalker::new(&reg);
        let required = [family(&reg, A, 1), family(&reg, B, 1)];
        let reported = [family(&reg, A | B, 4)];
        let err = assign(&walker, "q", &required, &reported, 8).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].kind, DiagnosticKind::Missing);
    }

    #[test]
    fn unmatched_group_reported_per_group() {
        let reg = registry();
        let walker = FieldWalker::new(&reg);
        let required = [family(&reg, A, 1), family(&reg, 0b100, 1)];
        let reported = [family(&reg, A, 1), family(&reg, B, 1)];
        let err = assign(&walker, "q", &required, &reported, 8).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].path, "q[1]");
        assert_eq!(err[0].kind, DiagnosticKind::Missing);
    }

    #[test]
    fn simultaneous_failure_is_exhaustion() {
        let reg = registry();
        let walker = FieldWalker::new(&reg);
        let required = [family(&reg, A, 1), family(&reg, A, 1)];
        let reported = [family(&reg, A, 1), family(&reg, B, 1)];
        let err = assign(&walker, "q", &required, &reported, 8).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].kind, DiagnosticKind::Exhausted);
    }

    #[test]
    fn bound_rejects_large_inputs() {
        let reg = registry();
        let walker = FieldWalker::new(&reg);
        let required = [family(&reg, A, 1)];
        let reported: Vec<_> = (0..5).map(|_| family(&reg, A, 1)).collect();
        let err = assign(&walker, "q", &required, &reported, 4).unwrap_err();
        assert_eq!(err[0].kind, DiagnosticKind::BoundExceeded);
        assert!(assign(&walker, "q", &required, &reported, 5).is_ok());
    }

    #[test]
    fn empty_requirement_always_assigns() {
        let reg = registry();
        let walker = FieldWalker::new(&reg);
        let got = assign(&walker, "q", &[], &[family(&reg, A, 1)], 8).unwrap();
        assert!(got.families.is_empty());
    }
}
