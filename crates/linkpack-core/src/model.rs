// crates/linkpack-core/src/model.rs
// ============================================================================
// Module: Linkpack Package Model
// Description: Package records, the per-invocation package index, artifact maps.
// Purpose: Hold every piece of state a single pipeline invocation owns.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`PackageIndex`] is built once per pipeline invocation and owned by it;
//! nothing here is cached across invocations.
//! Invariants:
//! - Package names are unique within an index.
//! - Artifact paths are fixed at load time and never change afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::PathBuf;

use crate::manifest::Manifest;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Mapping from package name to packed artifact path.
pub type ArtifactMap = BTreeMap<String, PathBuf>;

/// One local package discovered in the repository.
///
/// # Invariants
/// - `name` equals the manifest's declared name at load time.
/// - `source_dir` is only referenced, never written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    /// Declared package name.
    pub name: String,
    /// Manifest file location in the working copy.
    pub manifest_path: PathBuf,
    /// Package directory in the origin repository.
    pub source_dir: PathBuf,
    /// Package directory in the repository being prepared.
    pub working_dir: PathBuf,
    /// Parsed manifest, rewritten in memory before persisting.
    pub manifest: Manifest,
    /// Where the packed archive is written.
    pub artifact_path: PathBuf,
}

/// Outcome of inserting a record into the index.
#[derive(Debug)]
pub enum InsertOutcome {
    /// The record was inserted.
    Inserted,
    /// A record with the same name already exists; the new one was rejected.
    Duplicate(Box<PackageRecord>),
}

/// Per-invocation package index keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIndex {
    /// Records keyed by package name.
    records: BTreeMap<String, PackageRecord>,
}

impl PackageIndex {
    /// Creates an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Inserts a record unless its name is already taken.
    pub fn insert(&mut self, record: PackageRecord) -> InsertOutcome {
        match self.records.entry(record.name.clone()) {
            btree_map::Entry::Occupied(_) => InsertOutcome::Duplicate(Box::new(record)),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                InsertOutcome::Inserted
            }
        }
    }

    /// Returns the record for a package name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.records.get(name)
    }

    /// Returns true when a package with the name is indexed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Returns the number of indexed packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when no packages are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in name order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.values()
    }

    /// Iterates records mutably in name order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PackageRecord> {
        self.records.values_mut()
    }

    /// Returns the name-to-artifact mapping for every indexed package.
    #[must_use]
    pub fn artifact_map(&self) -> ArtifactMap {
        self.records
            .iter()
            .map(|(name, record)| (name.clone(), record.artifact_path.clone()))
            .collect()
    }
}
