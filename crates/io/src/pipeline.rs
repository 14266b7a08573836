//! Config-driven take-off reconciliation.
//!
//! `Pipeline` owns every piece of mutable state: the valid job-id set, the batch
//! partition, loaded manifests, staged take-off files and the job index built
//! from them. The index is rebuilt from staged files after every manifest load
//! and every ingestion, so the order in which sources arrive never changes the
//! result.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use framecount_takeoff::batch::{build_index, BatchPartition, IndexStats, ValidJobIdSet};
use framecount_takeoff::config::{FrameConfig, ManifestSource};
use framecount_takeoff::extract::{extract_document, ExtractStatus};
use framecount_takeoff::group::process_members;
use framecount_takeoff::model::{GroupedMember, JobFileIndex, ManifestBatch, ManifestRow, TakeoffFile};
use framecount_takeoff::summary::{summarize, SummaryReport};
use framecount_takeoff::FrameError;

use crate::manifest::load_manifest;
use crate::takeoff::discover;

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A recoverable problem met while loading. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Document is not well-formed; it contributes no members.
    MalformedDocument {
        job_id: String,
        file_name: String,
        reason: String,
    },
    /// Document parsed but holds no members after plate filtering.
    EmptyDocument { job_id: String, file_name: String },
    /// Members whose length text could not be read as a number.
    BadLengths {
        job_id: String,
        file_name: String,
        count: usize,
    },
    /// Manifest row left out of the valid job-id set.
    ManifestRow {
        manifest: String,
        row: usize,
        reason: String,
    },
    /// Job already owned by an earlier batch.
    BatchConflict {
        job_id: String,
        owner: String,
        claimant: String,
    },
    /// File found during a walk that could not be read.
    UnreadableFile { path: String, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedDocument { job_id, file_name, reason } => {
                write!(f, "{job_id}/{file_name}: malformed document: {reason}")
            }
            Self::EmptyDocument { job_id, file_name } => {
                write!(f, "{job_id}/{file_name}: no members")
            }
            Self::BadLengths { job_id, file_name, count } => {
                write!(f, "{job_id}/{file_name}: {count} member(s) with unreadable length")
            }
            Self::ManifestRow { manifest, row, reason } => {
                write!(f, "manifest '{manifest}' row {row}: {reason}")
            }
            Self::BatchConflict { job_id, owner, claimant } => {
                write!(f, "job {job_id} claimed by '{claimant}' but owned by '{owner}'")
            }
            Self::UnreadableFile { path, reason } => write!(f, "{path}: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub valid_ids: ValidJobIdSet,
    pub batches: BatchPartition,
    /// Latest rows per manifest, in load order.
    pub manifests: Vec<ManifestBatch>,
    /// (job id, file name) → processed file. Re-ingesting replaces.
    pub staged: BTreeMap<(String, String), TakeoffFile>,
    pub index: JobFileIndex,
    pub index_stats: IndexStats,
    /// Problems per manifest name, replaced when that manifest is registered again.
    pub manifest_diagnostics: BTreeMap<String, Vec<Diagnostic>>,
    /// Problems per staged file, replaced when that file is ingested again.
    pub file_diagnostics: BTreeMap<(String, String), Vec<Diagnostic>>,
    /// Walked paths that could not be read.
    pub unreadable: BTreeMap<String, Diagnostic>,
    /// All of the above: manifests in load order, then files, then unreadable paths.
    pub diagnostics: Vec<Diagnostic>,
}

/// Everything a run produced, ready to serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub name: String,
    pub summary: SummaryReport,
    pub index: IndexStats,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Pipeline {
    config: FrameConfig,
    base_dir: PathBuf,
    state: PipelineState,
}

impl Pipeline {
    /// Relative paths in `config` resolve against the current directory.
    pub fn new(config: FrameConfig) -> Self {
        Self::with_base_dir(config, ".")
    }

    pub fn with_base_dir(config: FrameConfig, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
            state: PipelineState::default(),
        }
    }

    /// Read a TOML config. Relative paths in it resolve against its directory.
    pub fn from_config_file(path: &Path) -> Result<Self, FrameError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| FrameError::Io(format!("cannot read config {}: {e}", path.display())))?;
        let config = FrameConfig::from_toml(&input)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::with_base_dir(config, base_dir))
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn index(&self) -> &JobFileIndex {
        &self.state.index
    }

    pub fn index_stats(&self) -> IndexStats {
        self.state.index_stats
    }

    pub fn valid_ids(&self) -> &ValidJobIdSet {
        &self.state.valid_ids
    }

    pub fn batches(&self) -> &BatchPartition {
        &self.state.batches
    }

    pub fn manifests(&self) -> &[ManifestBatch] {
        &self.state.manifests
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.state.diagnostics
    }

    // -- Manifests ----------------------------------------------------------

    /// Read a manifest file and register its rows as a batch.
    /// Returns how many job ids were new.
    pub fn load_manifest(&mut self, source: &ManifestSource) -> Result<usize, FrameError> {
        let load = load_manifest(source, &self.base_dir)?;
        let diagnostics = load
            .diagnostics
            .into_iter()
            .map(|row| Diagnostic::ManifestRow {
                manifest: source.name.clone(),
                row: row.row,
                reason: row.reason,
            })
            .collect();
        Ok(self.register_batch(&load.batch.name, load.batch.rows, diagnostics))
    }

    /// Union a manifest's job ids into the valid set and register it as a batch.
    /// Loading the same manifest again is a no-op. Returns how many ids were new.
    pub fn register_manifest(&mut self, name: &str, rows: Vec<ManifestRow>) -> usize {
        self.register_batch(name, rows, Vec::new())
    }

    fn register_batch(&mut self, name: &str, rows: Vec<ManifestRow>, mut diagnostics: Vec<Diagnostic>) -> usize {
        let added = self.state.valid_ids.extend_rows(&rows);
        let conflicts = self.state.batches.register_rows(name, &rows);
        diagnostics.extend(conflicts.into_iter().map(|c| Diagnostic::BatchConflict {
            job_id: c.job_id,
            owner: c.owner,
            claimant: c.claimant,
        }));
        warn_all(&diagnostics);
        self.state
            .manifest_diagnostics
            .insert(name.to_string(), diagnostics);

        log::info!(
            "Loaded manifest '{}': {} rows, {} new job ids ({} total)",
            name,
            rows.len(),
            added,
            self.state.valid_ids.len()
        );

        let batch = ManifestBatch { name: name.to_string(), rows };
        match self.state.manifests.iter_mut().find(|m| m.name == name) {
            Some(existing) => *existing = batch,
            None => self.state.manifests.push(batch),
        }

        self.rebuild_index();
        self.refresh_diagnostics();
        added
    }

    // -- Take-offs ----------------------------------------------------------

    /// Extract, normalize and group one document, stage it and re-index.
    /// Returns the number of groups staged for the file.
    pub fn ingest_document(&mut self, job_id: &str, file_name: &str, text: &str) -> usize {
        let (groups, diagnostics) = self.process_document(job_id, file_name, text);
        let count = groups.len();
        self.stage(job_id, file_name, groups, diagnostics);
        self.rebuild_index();
        self.refresh_diagnostics();
        count
    }

    /// Ingest every take-off file under `root`. Returns the number of files ingested.
    pub fn ingest_directory(&mut self, root: &Path) -> Result<usize, FrameError> {
        let discovery = discover(root)?;

        for skipped in discovery.skipped {
            let path = skipped.path.display().to_string();
            let diagnostic = Diagnostic::UnreadableFile {
                path: path.clone(),
                reason: skipped.reason,
            };
            log::warn!("{}", diagnostic);
            self.state.unreadable.insert(path, diagnostic);
        }

        let ingested = discovery.documents.len();
        for doc in discovery.documents {
            self.state.unreadable.remove(&doc.path.display().to_string());
            let (groups, diagnostics) = self.process_document(&doc.job_id, &doc.file_name, &doc.text);
            self.stage(&doc.job_id, &doc.file_name, groups, diagnostics);
        }
        self.rebuild_index();
        self.refresh_diagnostics();

        log::info!(
            "Ingested {} take-off file(s) from {} ({} indexed, {} excluded)",
            ingested,
            root.display(),
            self.state.index_stats.files_indexed,
            self.state.index_stats.files_excluded
        );
        Ok(ingested)
    }

    // -- Run ----------------------------------------------------------------

    /// Start from an empty state, load every configured manifest then every
    /// take-off root, and summarize.
    pub fn run(&mut self) -> Result<SummaryReport, FrameError> {
        self.state = PipelineState::default();

        let manifests = self.config.manifests.clone();
        for source in &manifests {
            self.load_manifest(source)?;
        }

        let roots: Vec<PathBuf> = self
            .config
            .takeoffs
            .iter()
            .map(|t| self.base_dir.join(&t.root))
            .collect();
        for root in &roots {
            self.ingest_directory(root)?;
        }

        Ok(self.summarize())
    }

    pub fn summarize(&self) -> SummaryReport {
        summarize(
            &self.state.index,
            &self.state.batches,
            &self.state.manifests,
            &self.config.summary_rules(),
        )
    }

    pub fn report(&self) -> PipelineReport {
        PipelineReport {
            name: self.config.name.clone(),
            summary: self.summarize(),
            index: self.state.index_stats,
            diagnostics: self.state.diagnostics.clone(),
        }
    }

    pub fn write_report(&self, path: &Path) -> Result<(), FrameError> {
        let json = serde_json::to_string_pretty(&self.report())
            .map_err(|e| FrameError::Io(format!("JSON serialization error: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| FrameError::Io(format!("cannot write {}: {e}", path.display())))
    }

    /// Rebuild the job index from every staged file under the current valid set.
    pub fn rebuild_index(&mut self) {
        let (index, stats) = build_index(
            self.state.staged.values(),
            &self.state.valid_ids,
            self.config.filter,
        );
        self.state.index = index;
        self.state.index_stats = stats;
    }

    // -- Internals ----------------------------------------------------------

    fn process_document(&self, job_id: &str, file_name: &str, text: &str) -> (Vec<GroupedMember>, Vec<Diagnostic>) {
        let extraction = extract_document(text);
        log::debug!(
            "{}/{}: {} member element(s), {} plate(s) dropped",
            job_id,
            file_name,
            extraction.elements,
            extraction.plates_dropped
        );

        let mut diagnostics = Vec::new();
        match &extraction.status {
            ExtractStatus::Malformed { reason } => diagnostics.push(Diagnostic::MalformedDocument {
                job_id: job_id.to_string(),
                file_name: file_name.to_string(),
                reason: reason.clone(),
            }),
            ExtractStatus::Parsed if extraction.members.is_empty() => {
                diagnostics.push(Diagnostic::EmptyDocument {
                    job_id: job_id.to_string(),
                    file_name: file_name.to_string(),
                })
            }
            ExtractStatus::Parsed => {}
        }
        if extraction.bad_lengths > 0 {
            diagnostics.push(Diagnostic::BadLengths {
                job_id: job_id.to_string(),
                file_name: file_name.to_string(),
                count: extraction.bad_lengths,
            });
        }
        warn_all(&diagnostics);

        let groups = process_members(extraction.members, &self.config.grouping, &self.config.length);
        (groups, diagnostics)
    }

    /// Stage a file and its problems, replacing what an earlier ingestion left.
    fn stage(&mut self, job_id: &str, file_name: &str, groups: Vec<GroupedMember>, diagnostics: Vec<Diagnostic>) {
        let key = (job_id.to_string(), file_name.to_string());
        let file = TakeoffFile {
            job_id: job_id.to_string(),
            file_name: file_name.to_string(),
            groups,
        };
        self.state.staged.insert(key.clone(), file);
        if diagnostics.is_empty() {
            self.state.file_diagnostics.remove(&key);
        } else {
            self.state.file_diagnostics.insert(key, diagnostics);
        }
    }

    fn refresh_diagnostics(&mut self) {
        let state = &mut self.state;
        let mut all: Vec<Diagnostic> = Vec::new();
        for manifest in &state.manifests {
            if let Some(found) = state.manifest_diagnostics.get(&manifest.name) {
                all.extend(found.iter().cloned());
            }
        }
        all.extend(state.file_diagnostics.values().flatten().cloned());
        all.extend(state.unreadable.values().cloned());
        state.diagnostics = all;
    }
}

fn warn_all(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        log::warn!("{}", d);
    }
}
