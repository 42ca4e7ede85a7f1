//! First-write-wins selection for trends.
//!
//! Hashflags need no pre-check (the store overwrites on conflict) and geo-trend batches are
//! append-only, so only trends pass through here.

use std::collections::HashSet;

use crate::models::TrendRecord;

/// Natural key of a trend row: (`name`, `location_id`).
pub type TrendKey = (String, String);

pub fn trend_key(t: &TrendRecord) -> TrendKey {
    (t.name.clone(), t.location_id.clone())
}

/// Rows of `incoming` whose key is neither in `existing` nor already taken earlier in the
/// batch. Order is preserved.
pub fn select_new_trends(
    existing: &HashSet<TrendKey>,
    incoming: Vec<TrendRecord>,
) -> Vec<TrendRecord> {
    let mut seen: HashSet<TrendKey> = HashSet::with_capacity(incoming.len());
    incoming
        .into_iter()
        .filter(|t| {
            let key = trend_key(t);
            !existing.contains(&key) && seen.insert(key)
        })
        .collect()
}

/// Single-location variant: `existing_names` are the names already stored for the location
/// the rows belong to.
pub fn select_new_for_location(
    existing_names: &HashSet<String>,
    incoming: Vec<TrendRecord>,
) -> Vec<TrendRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(incoming.len());
    incoming
        .into_iter()
        .filter(|t| !existing_names.contains(&t.name) && seen.insert(t.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend(name: &str, loc: &str) -> TrendRecord {
        TrendRecord {
            name: name.into(),
            position: 0,
            description: String::new(),
            domain_context: String::new(),
            url: String::new(),
            impression_id: String::new(),
            related_terms: Vec::new(),
            location_id: loc.into(),
        }
    }

    #[test]
    fn same_name_at_other_location_is_new() {
        let existing: HashSet<TrendKey> = [("A".to_string(), "loc1".to_string())].into();
        let incoming = vec![trend("A", "loc1"), trend("B", "loc1"), trend("A", "loc2")];
        let keys: Vec<TrendKey> = select_new_trends(&existing, incoming)
            .iter()
            .map(trend_key)
            .collect();
        assert_eq!(
            keys,
            vec![
                ("B".to_string(), "loc1".to_string()),
                ("A".to_string(), "loc2".to_string())
            ]
        );
    }

    #[test]
    fn duplicate_names_within_a_batch_keep_the_first() {
        let mut first = trend("#Dup", "loc1");
        first.position = 1;
        let mut second = trend("#Dup", "loc1");
        second.position = 9;
        let out = select_new_for_location(&HashSet::new(), vec![first, second]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].position, 1);
    }

    #[test]
    fn existing_names_are_skipped_for_the_location() {
        let existing: HashSet<String> = ["#Python".to_string()].into();
        let out = select_new_for_location(
            &existing,
            vec![trend("#Python", "loc1"), trend("#JavaScript", "loc1")],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "#JavaScript");
    }
}
