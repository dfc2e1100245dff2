#![doc = "docsync-core: core logic library for docsync."]

//! This crate contains the incremental synchronisation engine: deciding which
//! units of a remote content source need regeneration, regenerating them, and
//! packaging the result as one branch, one commit and one merge proposal.
//!
//! # Usage
//! Drive [`synchronise::synchronise`] with implementations of the traits in
//! [`contract`]. The CLI crate provides the HTTP-backed content source and
//! transformer; [`git::GitCli`] and [`forge`] provide version control.

pub mod config;
pub mod contract;
pub mod diff;
pub mod error;
pub mod forge;
pub mod git;
pub mod metadata;
pub mod process;
pub mod publish;
pub mod reference;
pub mod synchronise;
