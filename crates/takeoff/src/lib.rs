//! `framecount-takeoff` — Framing take-off engine.
//!
//! Pure engine crate: receives document text and manifest rows, returns grouped
//! members, job indexes and batch summaries. No filesystem access.

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod group;
pub mod length;
pub mod model;
pub mod summary;

pub use batch::{build_index, job_path, BatchPartition, FilterPolicy, ValidJobIdSet};
pub use config::{FrameConfig, ManifestSource};
pub use error::FrameError;
pub use extract::{extract_document, extract_members, ExtractStatus, Extraction};
pub use group::{process_members, GroupMode};
pub use length::normalize;
pub use model::{GroupedMember, JobFileIndex, ManifestBatch, ManifestRow, MemberRecord, TakeoffFile};
pub use summary::{summarize, SummaryReport, SummaryRules};
