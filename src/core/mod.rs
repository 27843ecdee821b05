//! Core modules for schema evolution of the primary store.
//!
//! Leaves first: `introspect` and `operation` know nothing about versions;
//! `catalog`, `ledger` and `backup` build on them; `runner` orchestrates a run
//! and `migration` is the startup entry point.

pub mod backup;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod introspect;
pub mod ledger;
pub mod logging;
pub mod migration;
pub mod operation;
pub mod output;
pub mod runner;
pub mod schemas;
pub mod time;
pub mod validate;
