//! Definition index
//!
//! Folds scanned documents into one [`Requirement`] per identifier. The
//! first definition in canonical (directory, file name) order is canonical;
//! every later definition of the same identifier becomes part of a
//! [`Conflict`]. References never create entries, but they are remembered
//! per requirement and identifiers that are only ever referenced are listed
//! as orphans. Test case identifiers named in test sources can be attached
//! afterwards with [`Catalog::with_test_cases`].

use crate::annotations::TestCase;
use crate::documents::{Location, ScannedDocument};
use crate::grammar::{Category, Identifier, Priority};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::warn;

/// The canonical record for one defined identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub id: Identifier,
    pub title: String,
    /// Stated priority, or [`Priority::DEFAULT`]
    pub priority: Priority,
    pub acceptance_criteria: Vec<String>,
    /// Canonical definition site
    pub defined_at: Location,
    /// Files mentioning this identifier without defining it
    pub referenced_from: BTreeSet<PathBuf>,
    /// Identifiers mentioned within the defining section
    pub references: BTreeSet<Identifier>,
    /// Short hash of the defining section's text
    pub hash: String,
}

impl Requirement {
    pub fn category(&self) -> Category {
        self.id.category()
    }
}

/// An identifier defined more than once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub id: Identifier,
    /// Location of the definition that won
    pub canonical: Location,
    /// Locations of every later definition, in canonical order
    pub duplicates: Vec<Location>,
}

impl Conflict {
    /// Number of conflicting definitions (total definitions minus one)
    pub fn count(&self) -> usize {
        self.duplicates.len()
    }
}

/// An identifier that is referenced but never defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub id: Identifier,
    /// First place it was mentioned
    pub first_seen: Location,
}

/// Read-only index of every definition in the corpus
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    requirements: BTreeMap<String, Requirement>,
    conflicts: Vec<Conflict>,
    orphans: Vec<Orphan>,
    test_cases: Vec<TestCase>,
}

impl Catalog {
    /// Fold documents into a catalog.
    ///
    /// Documents are expected in canonical order (the scanners guarantee it);
    /// the result depends on nothing but that order.
    pub fn build<'a>(documents: impl IntoIterator<Item = &'a ScannedDocument>) -> Self {
        let mut requirements: BTreeMap<String, Requirement> = BTreeMap::new();
        let mut conflicts: BTreeMap<String, Conflict> = BTreeMap::new();
        let mut mentions: BTreeMap<String, (Identifier, Location, BTreeSet<PathBuf>)> =
            BTreeMap::new();

        for doc in documents {
            for occ in &doc.occurrences {
                let key = occ.id.as_str().to_string();

                if !occ.is_definition() {
                    mentions
                        .entry(key)
                        .or_insert_with(|| (occ.id.clone(), occ.location.clone(), BTreeSet::new()))
                        .2
                        .insert(occ.location.file.clone());
                    continue;
                }

                if let Some(existing) = requirements.get(&key) {
                    warn!(
                        "Duplicate definition of {} at {} (first defined at {})",
                        key, occ.location, existing.defined_at
                    );
                    conflicts
                        .entry(key)
                        .or_insert_with(|| Conflict {
                            id: occ.id.clone(),
                            canonical: existing.defined_at.clone(),
                            duplicates: Vec::new(),
                        })
                        .duplicates
                        .push(occ.location.clone());
                    continue;
                }

                let details = occ.details.clone().unwrap_or_default();
                requirements.insert(
                    key,
                    Requirement {
                        id: occ.id.clone(),
                        title: details.title,
                        priority: details.priority.unwrap_or_default(),
                        acceptance_criteria: details.acceptance_criteria,
                        defined_at: occ.location.clone(),
                        referenced_from: BTreeSet::new(),
                        references: details.references,
                        hash: details.hash,
                    },
                );
            }
        }

        let mut orphans = Vec::new();
        for (key, (id, first_seen, files)) in mentions {
            match requirements.get_mut(&key) {
                Some(req) => req.referenced_from = files,
                None => orphans.push(Orphan { id, first_seen }),
            }
        }

        Self {
            requirements,
            conflicts: conflicts.into_values().collect(),
            orphans,
            test_cases: Vec::new(),
        }
    }

    /// Attach test cases named in test sources.
    ///
    /// The first case per identifier is kept, and identifiers a document
    /// already defines are skipped.
    pub fn with_test_cases(mut self, cases: impl IntoIterator<Item = TestCase>) -> Self {
        let mut seen: BTreeSet<String> =
            self.test_cases.iter().map(|c| c.id.clone()).collect();
        for case in cases {
            if self.requirements.contains_key(&case.id) || !seen.insert(case.id.clone()) {
                continue;
            }
            self.test_cases.push(case);
        }
        self.test_cases.sort_by(|a, b| a.id.cmp(&b.id));
        self
    }

    /// Look up a requirement by identifier text
    pub fn get(&self, id: &str) -> Option<&Requirement> {
        self.requirements.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.requirements.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Requirements sorted by identifier
    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.values()
    }

    /// Conflicts sorted by identifier
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Orphan references sorted by identifier
    pub fn orphans(&self) -> &[Orphan] {
        &self.orphans
    }

    /// Test cases sorted by identifier
    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    /// Conflict count per identifier (identifiers without conflicts omitted)
    pub fn conflict_counts(&self) -> BTreeMap<&str, usize> {
        self.conflicts
            .iter()
            .map(|c| (c.id.as_str(), c.count()))
            .collect()
    }
}
