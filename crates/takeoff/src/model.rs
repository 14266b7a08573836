use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// One framing member as read from a take-off document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRecord {
    #[serde(rename = "type")]
    pub member_type: String,
    pub name: String,
    pub description: String,
    /// Raw length in decimal inches.
    pub length: f64,
    pub units: String,
}

/// A member with its canonical `feet-inches-sixteenths` length attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMember {
    #[serde(flatten)]
    pub record: MemberRecord,
    pub converted_length: String,
}

/// Structural grouping key. `description` is only set in fine grouping mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub member_type: String,
    pub length: OrderedFloat<f64>,
    pub description: Option<String>,
}

/// Members sharing a [`GroupKey`], represented by the first one seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedMember {
    #[serde(rename = "type")]
    pub member_type: String,
    pub name: String,
    pub description: String,
    pub length: f64,
    pub units: String,
    pub converted_length: String,
    pub count: usize,
}

impl GroupedMember {
    pub(crate) fn first(member: &NormalizedMember) -> Self {
        Self {
            member_type: member.record.member_type.clone(),
            name: member.record.name.clone(),
            description: member.record.description.clone(),
            length: member.record.length,
            units: member.record.units.clone(),
            converted_length: member.converted_length.clone(),
            count: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// A processed take-off file, ready to be placed in a [`JobFileIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct TakeoffFile {
    pub job_id: String,
    pub file_name: String,
    pub groups: Vec<GroupedMember>,
}

/// job id → file name → ordered groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobFileIndex {
    jobs: BTreeMap<String, BTreeMap<String, Vec<GroupedMember>>>,
}

impl JobFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file's groups, replacing any earlier entry for the same (job, file).
    pub fn insert(&mut self, job_id: &str, file_name: &str, groups: Vec<GroupedMember>) {
        self.jobs
            .entry(job_id.to_string())
            .or_default()
            .insert(file_name.to_string(), groups);
    }

    pub fn get(&self, job_id: &str, file_name: &str) -> Option<&[GroupedMember]> {
        self.jobs
            .get(job_id)
            .and_then(|files| files.get(file_name))
            .map(|g| g.as_slice())
    }

    pub fn job(&self, job_id: &str) -> Option<&BTreeMap<String, Vec<GroupedMember>>> {
        self.jobs.get(job_id)
    }

    /// Jobs with their files, in job-id order.
    pub fn jobs(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, Vec<GroupedMember>>)> {
        self.jobs.iter().map(|(job, files)| (job.as_str(), files))
    }

    pub fn job_ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(|k| k.as_str())
    }

    pub fn contains_job(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn file_count(&self) -> usize {
        self.jobs.values().map(|files| files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Every group in the index as (job id, file name, group), in key order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &str, &GroupedMember)> {
        self.jobs.iter().flat_map(|(job, files)| {
            files.iter().flat_map(move |(file, groups)| {
                groups.iter().map(move |g| (job.as_str(), file.as_str(), g))
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Manifests
// ---------------------------------------------------------------------------

/// One delivery line from a manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestRow {
    /// 1-based row number in the source sheet.
    pub row: usize,
    pub job_id: String,
    pub bundle: String,
    /// Footage token after composite-form normalization.
    pub footage: String,
}

impl ManifestRow {
    pub fn new(row: usize, job_id: &str, bundle: &str, footage: &str) -> Self {
        Self {
            row,
            job_id: job_id.trim().to_string(),
            bundle: bundle.trim().to_string(),
            footage: footage_token(footage),
        }
    }

    /// Footage as a number, if the token is numeric.
    pub fn footage_value(&self) -> Option<f64> {
        self.footage.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// All rows read from one manifest, under the batch name it defines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestBatch {
    pub name: String,
    pub rows: Vec<ManifestRow>,
}

/// `"X/Y"` → `"Y"` (after the first slash, trimmed); anything else is trimmed as-is.
pub fn footage_token(raw: &str) -> String {
    match raw.split_once('/') {
        Some((_, after)) => after.trim().to_string(),
        None => raw.trim().to_string(),
    }
}
