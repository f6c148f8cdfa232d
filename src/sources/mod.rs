//! # Event sources.
//!
//! - [`Source`] / [`SyncingSource`] - traits for key producers
//! - [`WatchSource`] - a registered source tagged with its capability
//! - [`SourceFn`] / [`SyncingSourceFn`] - closure-backed sources
//! - [`ChannelSource`] - forwards keys from an `mpsc` channel
//! - [`ListSource`] - initial listing with an observable sync point

mod channel;
mod list;
mod source;
mod source_fn;

pub use channel::ChannelSource;
pub use list::ListSource;
pub use source::{Source, SourceRef, SyncingSource, SyncingSourceRef, WatchSource};
pub use source_fn::{SourceFn, SyncingSourceFn};
