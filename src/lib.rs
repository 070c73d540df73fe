//! Guided statistical analysis wizard.
//!
//! The statistical computation itself is remote; this crate owns the control
//! logic around it: step-gated navigation, readiness validation, single-flight
//! request coordination with a config-keyed result cache, and multi-format
//! export of cached results.

pub mod analyses;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod model;
pub mod remote;
pub mod session;
pub mod validation;
pub mod wizard;
