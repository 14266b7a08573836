//! Job-id reconciliation between manifests and take-off files.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{JobFileIndex, ManifestRow, TakeoffFile};

// ---------------------------------------------------------------------------
// Valid job ids
// ---------------------------------------------------------------------------

/// Job ids declared by every manifest loaded so far. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidJobIdSet {
    ids: BTreeSet<String>,
}

impl ValidJobIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union in more ids. Returns how many were new.
    pub fn extend<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.ids.len();
        for id in ids {
            let id = id.as_ref().trim();
            if !id.is_empty() {
                self.ids.insert(id.to_string());
            }
        }
        self.ids.len() - before
    }

    pub fn extend_rows(&mut self, rows: &[ManifestRow]) -> usize {
        self.extend(rows.iter().map(|r| r.job_id.as_str()))
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.ids.contains(job_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(|s| s.as_str())
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// A job id claimed by a later batch while already owned by an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchConflict {
    pub job_id: String,
    /// Batch that keeps the job.
    pub owner: String,
    /// Batch whose claim was ignored.
    pub claimant: String,
}

/// Batch name → owned job ids, in registration order.
///
/// A job id belongs to the first batch that registered it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPartition {
    batches: Vec<(String, Vec<String>)>,
    owner: BTreeMap<String, usize>,
}

impl BatchPartition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch's job ids. Ids owned by an earlier batch are reported
    /// as conflicts; re-registering the same batch only adds its new ids.
    pub fn register<I, S>(&mut self, batch: &str, ids: I) -> Vec<BatchConflict>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let slot = match self.batches.iter().position(|(name, _)| name == batch) {
            Some(i) => i,
            None => {
                self.batches.push((batch.to_string(), Vec::new()));
                self.batches.len() - 1
            }
        };

        let mut conflicts = Vec::new();
        let mut reported: BTreeSet<String> = BTreeSet::new();
        for id in ids {
            let id = id.as_ref().trim();
            if id.is_empty() {
                continue;
            }
            match self.owner.get(id) {
                Some(&owner) if owner == slot => {}
                Some(&owner) => {
                    // one report per job per claimant
                    if reported.insert(id.to_string()) {
                        conflicts.push(BatchConflict {
                            job_id: id.to_string(),
                            owner: self.batches[owner].0.clone(),
                            claimant: batch.to_string(),
                        });
                    }
                }
                None => {
                    self.owner.insert(id.to_string(), slot);
                    self.batches[slot].1.push(id.to_string());
                }
            }
        }
        conflicts
    }

    pub fn register_rows(&mut self, batch: &str, rows: &[ManifestRow]) -> Vec<BatchConflict> {
        self.register(batch, rows.iter().map(|r| r.job_id.as_str()))
    }

    /// Batch owning `job_id`, if any.
    pub fn batch_of(&self, job_id: &str) -> Option<&str> {
        self.owner.get(job_id).map(|&i| self.batches[i].0.as_str())
    }

    pub fn jobs(&self, batch: &str) -> Option<&[String]> {
        self.batches
            .iter()
            .find(|(name, _)| name == batch)
            .map(|(_, ids)| ids.as_slice())
    }

    /// Batch names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.batches.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// batch name → job ids.
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.batches.iter().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `(job_id, file_name)` from a storage path `.../{job}/{file}`.
///
/// Only the last two segments matter. Both `/` and `\` separate segments.
pub fn job_path(path: &str) -> Option<(String, String)> {
    // "." segments carry no job information
    let segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    match segments.as_slice() {
        [.., parent, leaf] => Some((parent.to_string(), leaf.to_string())),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Whether take-off files must be listed in a manifest to be indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Only jobs in the valid job-id set are indexed.
    #[default]
    Manifest,
    /// Every take-off file is indexed.
    Unfiltered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files_indexed: usize,
    /// Files skipped because their job id is not in any manifest.
    pub files_excluded: usize,
}

/// Build a fresh index from processed files.
pub fn build_index<'a, I>(files: I, valid: &ValidJobIdSet, policy: FilterPolicy) -> (JobFileIndex, IndexStats)
where
    I: IntoIterator<Item = &'a TakeoffFile>,
{
    let mut index = JobFileIndex::new();
    let mut stats = IndexStats::default();

    for file in files {
        if policy == FilterPolicy::Manifest && !valid.contains(&file.job_id) {
            stats.files_excluded += 1;
            continue;
        }
        index.insert(&file.job_id, &file.file_name, file.groups.clone());
        stats.files_indexed += 1;
    }

    (index, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(job: &str, name: &str) -> TakeoffFile {
        TakeoffFile {
            job_id: job.into(),
            file_name: name.into(),
            groups: Vec::new(),
        }
    }

    #[test]
    fn union_across_manifests() {
        let mut valid = ValidJobIdSet::new();
        assert_eq!(valid.extend(["100", "200"]), 2);
        assert_eq!(valid.extend(["200", "300"]), 1);
        assert_eq!(valid.iter().collect::<Vec<_>>(), vec!["100", "200", "300"]);
        // reloading A changes nothing
        assert_eq!(valid.extend(["100", "200"]), 0);
        assert_eq!(valid.len(), 3);
    }

    #[test]
    fn blank_ids_never_enter_the_set() {
        let mut valid = ValidJobIdSet::new();
        valid.extend(["", "  ", " 42 "]);
        assert_eq!(valid.len(), 1);
        assert!(valid.contains("42"));
    }

    #[test]
    fn first_registered_batch_wins() {
        let mut batches = BatchPartition::new();
        assert!(batches.register("mesa2", ["100", "200"]).is_empty());
        let conflicts = batches.register("mesa3", ["200", "300", "200"]);

        assert_eq!(
            conflicts,
            vec![BatchConflict {
                job_id: "200".into(),
                owner: "mesa2".into(),
                claimant: "mesa3".into(),
            }]
        );
        assert_eq!(batches.batch_of("200"), Some("mesa2"));
        assert_eq!(batches.jobs("mesa3").unwrap(), &["300".to_string()]);
        assert_eq!(batches.names().collect::<Vec<_>>(), vec!["mesa2", "mesa3"]);
    }

    #[test]
    fn partition_as_map() {
        let mut batches = BatchPartition::new();
        batches.register("mesa3", ["300", "100"]);
        batches.register("mesa2", ["100", "200"]);
        let map = batches.to_map();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["mesa2", "mesa3"]);
        assert_eq!(map["mesa3"], vec!["300".to_string(), "100".to_string()]);
        assert_eq!(map["mesa2"], vec!["200".to_string()]);
    }

    #[test]
    fn reregistering_batch_is_idempotent() {
        let mut batches = BatchPartition::new();
        batches.register("mesa2", ["100"]);
        assert!(batches.register("mesa2", ["100", "101"]).is_empty());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches.jobs("mesa2").unwrap().len(), 2);
    }

    #[test]
    fn job_path_uses_last_two_segments() {
        assert_eq!(job_path("uploads/2024/J100/wall-a.xml"), Some(("J100".into(), "wall-a.xml".into())));
        assert_eq!(job_path("J100/wall-a.xml"), Some(("J100".into(), "wall-a.xml".into())));
        assert_eq!(job_path(r"C:\jobs\J7\w.xml"), Some(("J7".into(), "w.xml".into())));
        assert_eq!(job_path("./J7/./w.xml"), Some(("J7".into(), "w.xml".into())));
        assert_eq!(job_path("wall-a.xml"), None);
        assert_eq!(job_path(""), None);
    }

    #[test]
    fn manifest_policy_drops_unknown_jobs() {
        let mut valid = ValidJobIdSet::new();
        valid.extend(["100"]);
        let files = vec![file("100", "a.xml"), file("999", "b.xml"), file("100", "c.xml")];

        let (index, stats) = build_index(&files, &valid, FilterPolicy::Manifest);
        assert_eq!(stats, IndexStats { files_indexed: 2, files_excluded: 1 });
        assert!(!index.contains_job("999"));
        assert_eq!(index.file_count(), 2);
    }

    #[test]
    fn unfiltered_policy_keeps_everything() {
        let files = vec![file("100", "a.xml"), file("999", "b.xml")];
        let (index, stats) = build_index(&files, &ValidJobIdSet::new(), FilterPolicy::Unfiltered);
        assert_eq!(stats.files_excluded, 0);
        assert_eq!(index.job_count(), 2);
    }
}
