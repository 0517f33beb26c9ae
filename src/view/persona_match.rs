// src/view/persona_match.rs
use crate::models::{PersonaCatalogEntry, PersonaReviewSet};
use std::collections::HashSet;

/// Catalog entries identified for at least one image.
///
/// Matching is exact id equality against the union of every present set's
/// identified ids. Ids the catalog does not know are dropped. Output follows
/// catalog order and lists each id once.
pub fn match_personas<'a, I>(catalog: &[PersonaCatalogEntry], sets: I) -> Vec<PersonaCatalogEntry>
where
    I: IntoIterator<Item = &'a PersonaReviewSet>,
{
    let identified: HashSet<&str> = sets
        .into_iter()
        .flat_map(|set| set.identified_personas.iter().map(String::as_str))
        .collect();

    let mut seen = HashSet::new();
    catalog
        .iter()
        .filter(|entry| identified.contains(entry.id.as_str()))
        .filter(|entry| seen.insert(entry.id.as_str()))
        .cloned()
        .collect()
}
