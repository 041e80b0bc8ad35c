//! Type-aware filtering of tabular candidate records.
//!
//! Load a table with [`data::loader`], let [`data::inference`] decide each
//! column's semantic type, build a [`filter::FilterGroup`] of criteria and
//! evaluate it with a [`filter::FilterEngine`]. [`state::Session`] ties these
//! together for interactive front ends.

pub mod config;
pub mod data;
pub mod filter;
pub mod state;
