//! Keeps a multi-language tree of drawings (SVG) and prose (Markdown) in sync
//! with a canonical source tree, and round-trips the missing translations
//! through editable task files.
//!
//! The pipeline is plan ([`diff`]) → execute ([`sync`]) → extract
//! ([`extract`]) → persist ([`task`]) → fill (by hand or [`translator`]) →
//! merge ([`apply`]). Every mutating step is recorded in the event log
//! ([`journal`]).

pub mod apply;
pub mod claude;
pub mod cli;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod extract;
pub mod fsops;
pub mod journal;
pub mod model;
pub mod reporter;
pub mod resolve;
pub mod sync;
pub mod task;
pub mod translator;

pub use error::{Result, TranslateError};
