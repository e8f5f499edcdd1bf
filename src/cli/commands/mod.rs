//! CLI commands for litaudit.
//!
//! Each submodule implements a single CLI command with its argument
//! parsing and execution logic.

/// Shell completion scripts.
pub mod completions;

/// Configuration viewing and management.
pub mod config;

/// Record a screening decision.
pub mod decide;

/// Correct a recorded audit entry.
pub mod edit;

/// Show audit entries of an item.
pub mod inspect;

/// Migrate legacy audit notes.
pub mod migrate;

/// List undecided items of a collection.
pub mod pending;

/// Bulk-remove notes, tags or attachments.
pub mod purge;

/// Check collection metadata for gaps.
pub mod quality;

/// Screening outcome counts for a collection.
pub mod report;
