//! Deduplication and ordering of a file's members.

use std::cmp::Ordering;
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde::Deserialize;

use crate::length::{normalize_with, LengthConfig};
use crate::model::{GroupKey, GroupedMember, MemberRecord, NormalizedMember};

pub const DEFAULT_TYPE_ORDER: &[&str] = &["STUD", "KING STUD", "JACK", "HEADER", "SILL", "HEADER CRIPPLE"];

/// Which fields make two members "the same" for counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// (type, length)
    #[default]
    Coarse,
    /// (type, length, description): keeps species/grade variants apart.
    Fine,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupingConfig {
    #[serde(default)]
    pub mode: GroupMode,
    /// Types listed here sort first, in this order. Matched case-insensitively.
    #[serde(default = "default_type_order")]
    pub type_order: Vec<String>,
}

fn default_type_order() -> Vec<String> {
    DEFAULT_TYPE_ORDER.iter().map(|s| s.to_string()).collect()
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            mode: GroupMode::default(),
            type_order: default_type_order(),
        }
    }
}

pub fn group_key(member_type: &str, length: f64, description: &str, mode: GroupMode) -> GroupKey {
    GroupKey {
        member_type: member_type.to_string(),
        length: OrderedFloat(length),
        description: match mode {
            GroupMode::Coarse => None,
            GroupMode::Fine => Some(description.to_string()),
        },
    }
}

impl GroupedMember {
    pub fn key(&self, mode: GroupMode) -> GroupKey {
        group_key(&self.member_type, self.length, &self.description, mode)
    }
}

/// Attach the canonical length string to each record.
pub fn normalize_members(records: Vec<MemberRecord>, length: &LengthConfig) -> Vec<NormalizedMember> {
    records
        .into_iter()
        .map(|record| {
            let converted_length = normalize_with(record.length, length);
            NormalizedMember { record, converted_length }
        })
        .collect()
}

/// Collapse members sharing a key into counted groups, first-seen order.
pub fn group_members(members: &[NormalizedMember], mode: GroupMode) -> Vec<GroupedMember> {
    let mut slots: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<GroupedMember> = Vec::new();

    for member in members {
        let r = &member.record;
        let key = group_key(&r.member_type, r.length, &r.description, mode);
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push(GroupedMember::first(member));
            groups.len() - 1
        });
        groups[slot].count += 1;
    }

    groups
}

/// Ordering over groups for reporting.
///
/// Listed types first by list position, then unlisted types alphabetically
/// (case-insensitive, exact string breaks ties), then longest first, then
/// description in fine mode.
pub struct TypeOrder {
    priority: HashMap<String, usize>,
}

impl TypeOrder {
    pub fn new<S: AsRef<str>>(types: &[S]) -> Self {
        let mut priority = HashMap::new();
        for (i, t) in types.iter().enumerate() {
            // A type listed twice keeps its first position
            priority.entry(t.as_ref().to_uppercase()).or_insert(i);
        }
        Self { priority }
    }

    fn rank(&self, member_type: &str) -> Option<usize> {
        self.priority.get(&member_type.to_uppercase()).copied()
    }

    pub fn compare(&self, a: &GroupedMember, b: &GroupedMember) -> Ordering {
        let by_rank = match (self.rank(&a.member_type), self.rank(&b.member_type)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        by_rank
            .then_with(|| a.member_type.to_lowercase().cmp(&b.member_type.to_lowercase()))
            .then_with(|| a.member_type.cmp(&b.member_type))
            .then_with(|| b.length.total_cmp(&a.length))
            .then_with(|| a.description.cmp(&b.description))
    }
}

pub fn sort_groups(groups: &mut [GroupedMember], order: &TypeOrder) {
    groups.sort_by(|a, b| order.compare(a, b));
}

/// Normalize, group and sort one file's extracted members.
pub fn process_members(
    records: Vec<MemberRecord>,
    grouping: &GroupingConfig,
    length: &LengthConfig,
) -> Vec<GroupedMember> {
    let normalized = normalize_members(records, length);
    let mut groups = group_members(&normalized, grouping.mode);
    sort_groups(&mut groups, &TypeOrder::new(&grouping.type_order));
    groups
}
