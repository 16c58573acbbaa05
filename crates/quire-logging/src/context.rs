//! Run correlation for publish invocations
//!
//! Every publish run gets a [`RunContext`] with a fresh run id. Its span
//! wraps the whole run, so every log line emitted while compiling, probing
//! and disseminating carries the same `run_id` in the JSONL output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

use crate::fields;

/// Identity of one publish run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    /// Title (or other label) of the document being published
    pub document: String,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
}

impl RunContext {
    pub fn new(document: impl Into<String>) -> Self {
        Self::with_run_id(Uuid::new_v4(), document)
    }

    /// Reuse an existing run id, e.g. one handed in by a caller's own tracing
    pub fn with_run_id(run_id: Uuid, document: impl Into<String>) -> Self {
        Self {
            run_id,
            document: document.into(),
            started_at: Utc::now(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The `publish_run` span for this run
    ///
    /// `success`, `published` and `expected` start empty and are filled in
    /// with [`RunContext::record_result`] once the run settles.
    pub fn span(&self) -> Span {
        let span = tracing::info_span!(
            "publish_run",
            run_id = %self.run_id,
            document = tracing::field::Empty,
            dry_run = self.dry_run,
            success = tracing::field::Empty,
            published = tracing::field::Empty,
            expected = tracing::field::Empty,
        );
        if !self.document.is_empty() {
            span.record(fields::DOCUMENT, self.document.as_str());
        }
        span
    }

    /// Name the document once it is known, e.g. after its title is parsed
    pub fn set_document(&mut self, span: &Span, document: impl Into<String>) {
        self.document = document.into();
        span.record(fields::DOCUMENT, self.document.as_str());
    }

    pub fn record_result(span: &Span, success: bool, published: usize, expected: usize) {
        span.record(fields::SUCCESS, success);
        span.record(fields::PUBLISHED, published);
        span.record(fields::EXPECTED, expected);
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_new_contexts_are_distinct() {
        let a = RunContext::new("Book");
        let b = RunContext::new("Book");
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.document, "Book");
        assert!(!a.dry_run);
    }

    #[test]
    fn test_with_run_id() {
        let id = Uuid::new_v4();
        let ctx = RunContext::with_run_id(id, "Doc").dry_run(true);
        assert_eq!(ctx.run_id, id);
        assert!(ctx.dry_run);
    }

    #[test]
    fn test_events_inside_span_carry_run_id() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(move || writer.clone()),
        );

        let ctx = RunContext::new("Book");
        tracing::subscriber::with_default(subscriber, || {
            let span = ctx.span();
            let _entered = span.enter();
            tracing::info!(identifier = "s1", "published");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains(&ctx.run_id.to_string()));
        assert!(output.contains(fields::spans::PUBLISH_RUN));
        assert!(output.contains("\"identifier\":\"s1\""));
    }

    #[test]
    fn test_document_named_after_span_creation() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(move || writer.clone()),
        );

        tracing::subscriber::with_default(subscriber, || {
            let mut ctx = RunContext::new("");
            let span = ctx.span();
            ctx.set_document(&span, "Late Title");
            let _entered = span.enter();
            tracing::info!("compiled");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("\"document\":\"Late Title\""));
    }

    #[test]
    fn test_record_result_fills_span_fields() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(move || writer.clone()),
        );

        tracing::subscriber::with_default(subscriber, || {
            let span = RunContext::new("Book").span();
            RunContext::record_result(&span, true, 4, 4);
            let _entered = span.enter();
            tracing::info!("done");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("\"success\":true"));
        assert!(output.contains("\"published\":4"));
    }
}
