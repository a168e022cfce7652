//! Tolerant decode-and-parse for untrusted web content.
//!
//! Data flows strictly forward: raw bytes → encoding decision → decoded text
//! → accumulated fragment → packaged document. [`ParsePipeline`] is the
//! entry point; everything else is a stage it composes.

pub mod accumulate;
pub mod dom;
pub mod encoding;
pub mod extract;
pub mod pipeline;
pub mod sax;
pub mod sniff;

pub use pipeline::ParsePipeline;
