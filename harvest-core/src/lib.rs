#![warn(missing_docs)]
//! # harvest-core
//!
//! Core types for the Harvest extraction-routine cache.
//!
//! Harvest turns arbitrary web pages into structured data by reusing a
//! previously generated extraction routine whenever a page's URL matches a
//! pattern seen before. This crate holds the pure, I/O-free pieces:
//!
//! - the **segment classifier** ([`classify`]) that decides per path
//!   segment whether it is a semantic literal or a variable identifier
//! - the **pattern builder** ([`PatternBuilder`]) that collapses a URL
//!   into its canonical cache key ([`PatternKey`])
//! - the entry types ([`CacheEntry`], [`Routine`])
//! - the capability traits the cache is parameterized over:
//!   [`Dictionary`] (word-likelihood oracle) and [`Generator`] (the
//!   external routine-generation backend)
//!
//! Storage and single-flight coordination live in `harvest-store` and
//! `harvest` respectively.

pub mod dictionary;
pub mod entry;
pub mod generator;
pub mod pattern;
pub mod segment;

pub use dictionary::{Dictionary, StaticDictionary};
pub use entry::{CacheEntry, Routine};
pub use generator::{GenerateError, Generator};
pub use pattern::{PatternBuilder, PatternKey, VARIABLE};
pub use segment::{SegmentKind, classify};
