//! Names of the fields recorded on the `publish_run` span after it opens

pub const DOCUMENT: &str = "document";
pub const SUCCESS: &str = "success";
pub const PUBLISHED: &str = "published";
pub const EXPECTED: &str = "expected";

/// Span names
pub mod spans {
    pub const PUBLISH_RUN: &str = "publish_run";
}
