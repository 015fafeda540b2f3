#![doc = "billing-lake-core: core logic library for billing-lake."]

//! Path rewriting, scope resolution, month planning and the export pipelines
//! that move billing data into the lake. All I/O goes through the traits in
//! [`contract`]; the CLI crate provides the concrete clients.

pub mod backfill;
pub mod config;
pub mod contract;
pub mod export;
pub mod fanout;
pub mod notification;
pub mod paths;
pub mod reports;
pub mod rewrite;
pub mod scope;
pub mod segment;
