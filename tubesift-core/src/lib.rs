#![doc = "tubesift-core: core logic library for tubesift."]

//! This crate contains the whole pipeline that turns a user's subscriptions into
//! playlist additions: candidate collection, metadata enrichment, the filter
//! stages and the publisher. Transport (HTTP, OAuth, the command line) lives in
//! the `tubesift` crate and reaches this crate only through the traits in
//! [`contract`].
//!
//! # Usage
//! Build a [`config::Settings`], implement (or mock) [`contract::ContentApi`] and
//! [`contract::StreamProbe`], then call [`synchronise::synchronise`].

pub mod batch;
pub mod candidate;
pub mod collect;
pub mod config;
pub mod contract;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod publish;
pub mod retry;
pub mod synchronise;
pub mod text;

/// Tracing targets used for user-facing output. The binary maps the
/// `verbosity` setting onto these.
pub mod targets {
    /// Always shown: run banners and summaries.
    pub const RUN: &str = "tubesift::run";
    /// Videos added, withheld or skipped.
    pub const VIDEOS: &str = "tubesift::videos";
    /// Credential loading and refreshing.
    pub const CREDENTIALS: &str = "tubesift::credentials";
    /// One line per successful remote call.
    pub const FUNC: &str = "tubesift::func";
}
