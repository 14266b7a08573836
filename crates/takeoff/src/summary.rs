//! Rule-driven category totals per batch.
//!
//! Every grouped member in the index is offered to every rule once. Category
//! rules add the member's count into a per-length (optionally per-description)
//! map; interest rules add it into a single number when the member sits at one
//! exact canonical length. The fold is stateless: the same index, partition and
//! rules always produce the same report.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::batch::BatchPartition;
use crate::length::reconstruct;
use crate::model::{GroupedMember, JobFileIndex, ManifestBatch};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKeyMode {
    #[default]
    Length,
    LengthDescription,
}

/// Count members of one type into `categories[label]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryRule {
    pub label: String,
    #[serde(rename = "type")]
    pub member_type: String,
    #[serde(default)]
    pub key: SummaryKeyMode,
}

/// Count members of one type at exactly one converted length into `interest[label]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterestRule {
    pub label: String,
    #[serde(rename = "type")]
    pub member_type: String,
    pub length: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRules {
    pub categories: Vec<CategoryRule>,
    pub interest: Vec<InterestRule>,
}

impl Default for SummaryRules {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            interest: default_interest(),
        }
    }
}

pub fn default_categories() -> Vec<CategoryRule> {
    ["stud", "king stud", "jack", "header"]
        .iter()
        .map(|t| CategoryRule {
            label: t.to_string(),
            member_type: t.to_uppercase(),
            key: SummaryKeyMode::Length,
        })
        .collect()
}

pub fn default_interest() -> Vec<InterestRule> {
    vec![
        InterestRule {
            label: "headers_3_3_0".into(),
            member_type: "HEADER".into(),
            length: "3-3-0".into(),
        },
        InterestRule {
            label: "jacks_6_9_6".into(),
            member_type: "JACK".into(),
            length: "6-9-6".into(),
        },
    ]
}

fn same_type(a: &str, b: &str) -> bool {
    a.to_uppercase() == b.to_uppercase()
}

impl CategoryRule {
    pub fn matches(&self, group: &GroupedMember) -> bool {
        same_type(&group.member_type, &self.member_type)
    }

    pub fn key_for(&self, group: &GroupedMember) -> SummaryKey {
        SummaryKey {
            length: group.converted_length.clone(),
            description: match self.key {
                SummaryKeyMode::Length => None,
                SummaryKeyMode::LengthDescription => Some(group.description.clone()),
            },
        }
    }
}

impl InterestRule {
    pub fn matches(&self, group: &GroupedMember) -> bool {
        group.converted_length == self.length && same_type(&group.member_type, &self.member_type)
    }
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Category bucket key. Orders longest first, then by description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    pub length: String,
    pub description: Option<String>,
}

impl SummaryKey {
    pub fn length(length: &str) -> Self {
        Self {
            length: length.to_string(),
            description: None,
        }
    }

    pub fn with_description(length: &str, description: &str) -> Self {
        Self {
            length: length.to_string(),
            description: Some(description.to_string()),
        }
    }
}

impl Ord for SummaryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = reconstruct(&self.length).unwrap_or(f64::NEG_INFINITY);
        let b = reconstruct(&other.length).unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
            .then_with(|| self.length.cmp(&other.length))
            .then_with(|| self.description.cmp(&other.description))
    }
}

impl PartialOrd for SummaryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Counts per key for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTotals {
    counts: BTreeMap<SummaryKey, usize>,
}

impl CategoryTotals {
    pub fn add(&mut self, key: SummaryKey, count: usize) {
        *self.counts.entry(key).or_insert(0) += count;
    }

    pub fn get(&self, key: &SummaryKey) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Count at a length, summed over descriptions.
    pub fn at_length(&self, length: &str) -> usize {
        self.counts
            .iter()
            .filter(|(k, _)| k.length == length)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SummaryKey, usize)> {
        self.counts.iter().map(|(k, n)| (k, *n))
    }
}

// JSON object keys must be strings, so totals serialize as a list of entries.
impl Serialize for CategoryTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Entry<'a>(&'a SummaryKey, usize);

        impl Serialize for Entry<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let fields = if self.0.description.is_some() { 3 } else { 2 };
                let mut s = serializer.serialize_struct("Entry", fields)?;
                s.serialize_field("length", &self.0.length)?;
                if let Some(ref d) = self.0.description {
                    s.serialize_field("description", d)?;
                }
                s.serialize_field("count", &self.1)?;
                s.end()
            }
        }

        serializer.collect_seq(self.counts.iter().map(|(k, n)| Entry(k, *n)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub jobs: usize,
    pub files: usize,
    /// Every grouped member in scope, counted once, matched by a rule or not.
    pub members: usize,
    pub categories: BTreeMap<String, CategoryTotals>,
    pub interest: BTreeMap<String, usize>,
    /// Sum of numeric manifest footage for jobs owned by this batch.
    pub manifest_footage: f64,
}

impl BatchSummary {
    /// All rule labels present with zero counts.
    pub fn empty(rules: &SummaryRules) -> Self {
        Self {
            jobs: 0,
            files: 0,
            members: 0,
            categories: rules
                .categories
                .iter()
                .map(|r| (r.label.clone(), CategoryTotals::default()))
                .collect(),
            interest: rules.interest.iter().map(|r| (r.label.clone(), 0)).collect(),
            manifest_footage: 0.0,
        }
    }

    pub fn category(&self, label: &str) -> Option<&CategoryTotals> {
        self.categories.get(label)
    }

    pub fn interest_total(&self, label: &str) -> usize {
        self.interest.get(label).copied().unwrap_or(0)
    }

    fn fold(&mut self, group: &GroupedMember, rules: &SummaryRules) {
        self.members += group.count;
        for rule in &rules.categories {
            if rule.matches(group) {
                if let Some(totals) = self.categories.get_mut(&rule.label) {
                    totals.add(rule.key_for(group), group.count);
                }
            }
        }
        for rule in &rules.interest {
            if rule.matches(group) {
                *self.interest.entry(rule.label.clone()).or_insert(0) += group.count;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    /// One entry per registered batch, including batches with no indexed jobs.
    pub batches: BTreeMap<String, BatchSummary>,
    /// Indexed jobs owned by no batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unbatched: Option<BatchSummary>,
    pub overall: BatchSummary,
}

impl SummaryReport {
    pub fn batch(&self, name: &str) -> Option<&BatchSummary> {
        self.batches.get(name)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// Fold
// ---------------------------------------------------------------------------

/// Fold the whole index into per-batch, unbatched and overall summaries.
pub fn summarize(
    index: &JobFileIndex,
    batches: &BatchPartition,
    manifests: &[ManifestBatch],
    rules: &SummaryRules,
) -> SummaryReport {
    let mut overall = BatchSummary::empty(rules);
    let mut per_batch: BTreeMap<String, BatchSummary> = batches
        .names()
        .map(|name| (name.to_string(), BatchSummary::empty(rules)))
        .collect();
    let mut unbatched: Option<BatchSummary> = None;

    for (job_id, files) in index.jobs() {
        let target = match batches.batch_of(job_id).and_then(|b| per_batch.get_mut(b)) {
            Some(summary) => summary,
            None => unbatched.get_or_insert_with(|| BatchSummary::empty(rules)),
        };
        target.jobs += 1;
        overall.jobs += 1;

        for groups in files.values() {
            target.files += 1;
            overall.files += 1;
            for group in groups {
                target.fold(group, rules);
                overall.fold(group, rules);
            }
        }
    }

    for manifest in manifests {
        for row in &manifest.rows {
            // footage follows job ownership, so overlapping manifests count once
            if batches.batch_of(&row.job_id) != Some(manifest.name.as_str()) {
                continue;
            }
            if let (Some(feet), Some(summary)) = (row.footage_value(), per_batch.get_mut(&manifest.name)) {
                summary.manifest_footage += feet;
                overall.manifest_footage += feet;
            }
        }
    }

    SummaryReport {
        batches: per_batch,
        unbatched,
        overall,
    }
}
