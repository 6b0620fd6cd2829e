//! Outcome attainment engine: turns assessment scores and survey responses
//! into course outcome (CO), program outcome (PO) and program-specific outcome
//! (PSO) attainment for accreditation reporting.
//!
//! Data flows one way: raw scores → component statistics → per-exam CO levels
//! → direct → overall → PO/PSO. Every formula module is pure; only [`store`]
//! and [`pipeline`] touch I/O.

pub mod components;
pub mod config;
pub mod copo;
pub mod db;
pub mod direct;
pub mod error;
pub mod indirect;
pub mod ingest;
pub mod level;
pub mod models;
pub mod overall;
pub mod pipeline;
pub mod report;
pub mod sheet;
pub mod store;
pub mod telemetry;

pub use error::{EngineError, StoreError};
pub use models::{Attainment, AttainmentKey, AttainmentRecord, AttainmentType, ExamType, SubjectId};
