use std::collections::HashSet;

use serde::Deserialize;

use crate::batch::FilterPolicy;
use crate::error::FrameError;
use crate::group::GroupingConfig;
use crate::length::{is_canonical, LengthConfig};
use crate::summary::{default_categories, default_interest, CategoryRule, InterestRule, SummaryRules};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrameConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub filter: FilterPolicy,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub length: LengthConfig,
    #[serde(default)]
    pub manifests: Vec<ManifestSource>,
    #[serde(default)]
    pub takeoffs: Vec<TakeoffSource>,
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,
    #[serde(default = "default_interest")]
    pub interest: Vec<InterestRule>,
}

fn default_name() -> String {
    "framecount".into()
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            filter: FilterPolicy::default(),
            grouping: GroupingConfig::default(),
            length: LengthConfig::default(),
            manifests: Vec::new(),
            takeoffs: Vec::new(),
            categories: default_categories(),
            interest: default_interest(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A delivery manifest. Its `name` is also the batch it defines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestSource {
    pub name: String,
    pub file: String,
    pub job_column: ColumnRef,
    pub bundle_column: ColumnRef,
    pub footage_column: ColumnRef,
    /// Leading rows skipped before data.
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    /// Worksheet name; first sheet when absent.
    #[serde(default)]
    pub sheet: Option<String>,
}

fn default_header_rows() -> usize {
    1
}

impl ManifestSource {
    /// Delivery list layout: job C, bundle D, footage E.
    pub fn mesa2(file: &str) -> Self {
        Self::with_columns("mesa2", file, 2, 3, 4)
    }

    /// Delivery list layout: job B, bundle C, footage E.
    pub fn mesa3(file: &str) -> Self {
        Self::with_columns("mesa3", file, 1, 2, 4)
    }

    pub fn with_columns(name: &str, file: &str, job: usize, bundle: usize, footage: usize) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            job_column: ColumnRef::Index(job),
            bundle_column: ColumnRef::Index(bundle),
            footage_column: ColumnRef::Index(footage),
            header_rows: default_header_rows(),
            sheet: None,
        }
    }
}

/// A directory tree of `{job}/{file}.xml` take-offs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TakeoffSource {
    pub root: String,
}

/// A column given as a 0-based index or a spreadsheet letter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Letter(String),
}

impl ColumnRef {
    /// 0-based column index. `"A"` = 0, `"Z"` = 25, `"AA"` = 26.
    pub fn index(&self) -> Result<usize, FrameError> {
        match self {
            Self::Index(i) => Ok(*i),
            Self::Letter(letters) => column_letters_to_index(letters)
                .ok_or_else(|| FrameError::InvalidColumn(letters.clone())),
        }
    }
}

fn column_letters_to_index(letters: &str) -> Option<usize> {
    let letters = letters.trim();
    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut col: usize = 0;
    for ch in letters.chars() {
        col = col * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(col - 1)
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl FrameConfig {
    pub fn from_toml(input: &str) -> Result<Self, FrameError> {
        let config: FrameConfig =
            toml::from_str(input).map_err(|e| FrameError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        let mut names = HashSet::new();
        for source in &self.manifests {
            if source.name.trim().is_empty() {
                return Err(FrameError::ConfigValidation(format!(
                    "manifest '{}': name must not be empty",
                    source.file
                )));
            }
            if !names.insert(source.name.as_str()) {
                return Err(FrameError::ConfigValidation(format!(
                    "duplicate manifest name '{}'",
                    source.name
                )));
            }
            for col in [&source.job_column, &source.bundle_column, &source.footage_column] {
                col.index()?;
            }
        }

        let mut labels = HashSet::new();
        for rule in &self.categories {
            if !labels.insert(rule.label.as_str()) {
                return Err(FrameError::ConfigValidation(format!(
                    "duplicate category label '{}'",
                    rule.label
                )));
            }
        }

        let mut labels = HashSet::new();
        for rule in &self.interest {
            if !labels.insert(rule.label.as_str()) {
                return Err(FrameError::ConfigValidation(format!(
                    "duplicate interest label '{}'",
                    rule.label
                )));
            }
            if !is_canonical(&rule.length) {
                return Err(FrameError::ConfigValidation(format!(
                    "interest '{}': length '{}' is not feet-inches-sixteenths",
                    rule.label, rule.length
                )));
            }
        }

        Ok(())
    }

    pub fn summary_rules(&self) -> SummaryRules {
        SummaryRules {
            categories: self.categories.clone(),
            interest: self.interest.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
