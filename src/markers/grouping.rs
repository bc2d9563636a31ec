//! Conceptual grouping of marked word indices
//!
//! A learner marks individual words, but a run of adjacent marked words is
//! one vocabulary unit ("don't understand" rather than "don't" + "understand").
//! Groups are derived on read and never stored; the first index of a run is
//! the stable key used for vocabulary annotations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A maximal run of consecutive marked indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptualGroup {
    /// Sorted, contiguous
    pub indices: Vec<usize>,
    pub main_index: usize,
    pub is_phrase: bool,
}

impl ConceptualGroup {
    fn from_run(indices: Vec<usize>) -> Self {
        Self {
            main_index: indices[0],
            is_phrase: indices.len() > 1,
            indices,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        match (self.indices.first(), self.indices.last()) {
            (Some(&first), Some(&last)) => first <= index && index <= last,
            _ => false,
        }
    }

    /// Display text for the group: cleaned tokens joined by spaces.
    /// Indices past the end of `tokens` are skipped.
    pub fn text(&self, tokens: &[&str]) -> String {
        self.indices
            .iter()
            .filter_map(|&i| tokens.get(i))
            .map(|token| clean_token(token))
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split text into the tokens that marked indices refer to
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Strip leading and trailing punctuation so it does not leak into
/// vocabulary entries. Inner punctuation ("don't", "well-known") is kept.
pub fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Group marked indices into maximal consecutive runs.
///
/// Input may be unsorted and contain duplicates.
pub fn group_indices<I>(indices: I) -> Vec<ConceptualGroup>
where
    I: IntoIterator<Item = usize>,
{
    let sorted: BTreeSet<usize> = indices.into_iter().collect();

    let mut groups = Vec::new();
    let mut run: Vec<usize> = Vec::new();

    for index in sorted {
        match run.last() {
            Some(&prev) if prev + 1 == index => run.push(index),
            Some(_) => {
                groups.push(ConceptualGroup::from_run(std::mem::take(&mut run)));
                run.push(index);
            }
            None => run.push(index),
        }
    }

    if !run.is_empty() {
        groups.push(ConceptualGroup::from_run(run));
    }

    groups
}

/// Flatten groups back into the indices they cover
pub fn flatten_groups(groups: &[ConceptualGroup]) -> Vec<usize> {
    groups
        .iter()
        .flat_map(|g| g.indices.iter().copied())
        .collect()
}

/// Anchor (main index) of the group containing `index`, if it is marked
pub fn anchor_of(groups: &[ConceptualGroup], index: usize) -> Option<usize> {
    groups
        .iter()
        .find(|g| g.indices.binary_search(&index).is_ok())
        .map(|g| g.main_index)
}
