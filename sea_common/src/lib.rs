//! # SEA Common Library
//!
//! Shared types for the SEA test-rig controller: configuration structures,
//! hardware collaborator traits, and the run-record contract handed to the
//! post-run exporter.
//!
//! This crate carries no control logic. Everything algorithmic lives in
//! `sea_control_unit`; everything hardware-specific lives behind the traits
//! in [`rig`].

pub mod config;
pub mod consts;
pub mod recorder;
pub mod rig;
