//! Snapshot reconciliation
//!
//! Turns one backend snapshot into the lookup map the cache serves from:
//! keys are trimmed and case-folded, hidden paths dropped, collisions
//! poisoned and bare directory keys aliased to their `index.html` leaf.
//! The result is built as a whole new map so the caller can swap it in
//! atomically.

use crate::entry::Entry;
use crate::snapshot::Snapshot;
use std::collections::{BTreeMap, HashMap};

/// Marker shown in diagnostics for a poisoned key
pub(crate) const AMBIGUOUS_MARKER: &str = "(ambiguous: multiple sources)";

const INDEX_SUFFIX: &str = "/index.html";

/// Canonical lookup form of a request path or source path
pub fn normalize_key(path: &str) -> String {
    path.trim().to_lowercase()
}

fn has_hidden_segment(key: &str) -> bool {
    key.contains("/.")
}

pub(crate) struct Reconciled {
    pub map: HashMap<String, Entry>,
    /// key -> source display path, serialized for the diagnostics endpoint
    pub listing: BTreeMap<String, String>,
}

/// Reconcile a snapshot against the previous live map
///
/// An entry whose key and display path are unchanged from `previous` keeps
/// its prior `Arc` identity, so per-entry fetch state (validators) carried
/// by the content source survives across cycles.
pub(crate) fn reconcile(snapshot: Snapshot, previous: &HashMap<String, Entry>) -> Reconciled {
    let mut map: HashMap<String, Entry> = HashMap::new();
    let mut listing = BTreeMap::new();
    let mut indexable = Vec::new();

    for candidate in snapshot.into_candidates() {
        let key = normalize_key(&candidate.path);
        if has_hidden_segment(&key) {
            continue;
        }
        if key.ends_with(INDEX_SUFFIX) {
            indexable.push(key.clone());
        }
        if map.contains_key(&key) {
            map.insert(key.clone(), Entry::Ambiguous);
            listing.insert(key, AMBIGUOUS_MARKER.to_string());
            continue;
        }
        let content = match previous.get(&key) {
            Some(Entry::Valid(prior)) if prior.display_path() == candidate.content.display_path() => {
                prior.clone()
            }
            _ => candidate.content,
        };
        listing.insert(key.clone(), content.display_path().to_string());
        map.insert(key, Entry::Valid(content));
    }

    // Alias each bare directory key to its index leaf. Ambiguous index
    // entries are never promoted.
    for key in indexable {
        let content = match map.get(&key) {
            Some(Entry::Valid(content)) => content.clone(),
            _ => continue,
        };
        let parent = match key.rfind('/') {
            Some(0) => "/",
            Some(pos) => &key[..pos],
            None => continue,
        };
        if !map.contains_key(parent) {
            listing.insert(parent.to_string(), content.display_path().to_string());
            map.insert(parent.to_string(), Entry::Valid(content));
        }
    }

    Reconciled { map, listing }
}
