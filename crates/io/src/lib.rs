//! `framecount-io` — File ingestion and the take-off pipeline.
//!
//! Reads delivery manifests (xlsx/xls/ods/csv) and take-off directories, and
//! drives the engine in `framecount-takeoff` through [`Pipeline`].

pub mod csv;
pub mod manifest;
pub mod pipeline;
pub mod takeoff;
pub mod xlsx;

pub use manifest::{load_manifest, ManifestLoad, RowDiagnostic};
pub use pipeline::{Diagnostic, Pipeline, PipelineReport, PipelineState};
pub use takeoff::{discover, Discovery, TakeoffDocument};
