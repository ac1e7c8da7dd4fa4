//! Weight Resolver - Highest Matching Definition
//!
//! Groups and tabs are both picked the same way: filter the configured set
//! down to the definitions whose permission the subject holds, then keep the
//! heaviest one. An empty permission matches everyone.
//!
//! Ties go to the definition registered first, so the scan only replaces the
//! current best on a strictly greater weight.

/// A definition that takes part in weighted selection
pub trait Weighted {
    /// Selection weight; larger wins
    fn weight(&self) -> i32;

    /// Permission the subject must hold; empty always matches
    fn permission(&self) -> &str;
}

/// Pick the heaviest definition whose permission satisfies `holds`
///
/// `holds` is only asked about non-empty permissions.
pub fn resolve_highest<'a, T, F>(definitions: &'a [T], mut holds: F) -> Option<&'a T>
where
    T: Weighted,
    F: FnMut(&str) -> bool,
{
    let mut best: Option<&T> = None;
    for definition in definitions {
        let permission = definition.permission();
        if !permission.is_empty() && !holds(permission) {
            continue;
        }
        if best.map_or(true, |current| definition.weight() > current.weight()) {
            best = Some(definition);
        }
    }
    best
}
