//! Candidate pairing between lost and found items.
//!
//! Matching is recomputed from the full item set on every call and never persisted. The cost is
//! O(|lost| x |found|), which is fine for a single facility's item board but will need an index
//! if the item set grows into the thousands.

use serde::{Deserialize, Serialize};

use super::domain::{ItemType, LostFoundDetail};

/// Which predicates held for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    ItemName,
    Location,
    Description,
}

impl MatchReason {
    pub const fn label(self) -> &'static str {
        match self {
            MatchReason::ItemName => "item_name",
            MatchReason::Location => "location",
            MatchReason::Description => "description",
        }
    }
}

/// Containment direction for the name and description predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Found text must appear inside the lost text, so a short found label like "backpack"
    /// pairs with a detailed lost description like "blue backpack".
    #[default]
    Directional,
    /// Either text may contain the other.
    Symmetric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateMatch {
    pub lost: LostFoundDetail,
    pub found: LostFoundDetail,
    pub reasons: Vec<MatchReason>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn text_matches(lost: &str, found: &str, mode: MatchMode) -> bool {
    match mode {
        MatchMode::Directional => contains_ignore_case(lost, found),
        MatchMode::Symmetric => {
            contains_ignore_case(found, lost) || contains_ignore_case(lost, found)
        }
    }
}

fn reasons_for(
    lost: &LostFoundDetail,
    found: &LostFoundDetail,
    mode: MatchMode,
) -> Vec<MatchReason> {
    let mut reasons = Vec::new();
    if text_matches(&lost.item_name, &found.item_name, mode) {
        reasons.push(MatchReason::ItemName);
    }
    if !lost.location.trim().is_empty() && lost.location == found.location {
        reasons.push(MatchReason::Location);
    }
    if text_matches(&lost.description, &found.description, mode) {
        reasons.push(MatchReason::Description);
    }
    reasons
}

/// Pairs every lost item with every found item that satisfies at least one predicate.
///
/// Each pair appears once, in lost-then-found input order, with every predicate that held.
/// Blank names, locations, and descriptions never count as evidence.
pub fn find_matches(items: &[LostFoundDetail], mode: MatchMode) -> Vec<CandidateMatch> {
    let (lost, found): (Vec<&LostFoundDetail>, Vec<&LostFoundDetail>) = items
        .iter()
        .partition(|item| item.item_type == ItemType::Lost);

    let mut matches = Vec::new();
    for lost_item in &lost {
        for found_item in &found {
            let reasons = reasons_for(lost_item, found_item, mode);
            if !reasons.is_empty() {
                matches.push(CandidateMatch {
                    lost: (*lost_item).clone(),
                    found: (*found_item).clone(),
                    reasons,
                });
            }
        }
    }
    matches
}
