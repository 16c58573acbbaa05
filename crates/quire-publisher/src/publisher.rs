//! The publish run coordinator
//!
//! A run compiles the document, signs every planned event, selects live
//! relays and then disseminates the plan strictly in order: an event is
//! dispatched only once every relay task of the previous event has
//! settled, so children are always terminal before their index. The whole
//! dispatch loop runs under one deadline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use quire_compiler::{CompileOptions, Compiler, Metadata};
use quire_core::{
    Clock, ConfigError, EventOutcome, KindRole, PublicKey, Reference, RelayClient, RelayUrl,
    SignedEvent, Signer, TimeoutError,
};
use quire_logging::RunContext;
use quire_relay::{Disseminator, RelayError, RelayResult, RelaySelector, RelaySpec};
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, Span, debug, error, info, instrument, warn};

use crate::config::PublisherConfig;
use crate::error::{PublisherError, PublisherResult};
use crate::fetch::{Publication, keep_newest, newest, reference_filters};
use crate::report::{PlannedEvent, PublishReport, ReportError};

/// Compiles documents and publishes them to relays
pub struct Publisher<C: RelayClient> {
    config: PublisherConfig,
    compiler: Compiler,
    selector: RelaySelector<C>,
    disseminator: Disseminator<C>,
    signer: Signer,
    clock: Arc<dyn Clock>,
}

impl<C: RelayClient> Publisher<C> {
    /// Create a publisher. Fails if the configuration is invalid.
    pub fn new(
        config: PublisherConfig,
        client: Arc<C>,
        signer: Signer,
        clock: Arc<dyn Clock>,
    ) -> PublisherResult<Self> {
        config.validate()?;
        Ok(Self {
            compiler: Compiler::new(config.compile.clone()),
            selector: RelaySelector::new(
                Arc::clone(&client),
                config.relay_categories.clone(),
                config.selector.clone(),
            ),
            disseminator: Disseminator::new(client, config.dissemination.clone()),
            config,
            signer,
            clock,
        })
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Public key every event is published under
    pub fn author(&self) -> PublicKey {
        self.signer.public_key()
    }

    /// Compile, sign and publish a document
    ///
    /// Parse, plan, signing and relay selection failures abort the call
    /// before anything is published. After that the report carries every
    /// event's outcome, including quorum misses and a run timeout.
    pub async fn publish_document(
        &self,
        text: &str,
        options: &CompileOptions,
    ) -> PublisherResult<PublishReport> {
        self.run(text, options, false).await
    }

    /// Compile a document and report the plan without contacting any relay
    pub async fn dry_run(&self, text: &str, options: &CompileOptions) -> PublisherResult<PublishReport> {
        self.run(text, options, true).await
    }

    async fn run(
        &self,
        text: &str,
        options: &CompileOptions,
        dry_run: bool,
    ) -> PublisherResult<PublishReport> {
        let mut ctx = RunContext::new(String::new()).dry_run(dry_run);
        let span = ctx.span();
        self.execute(&mut ctx, span.clone(), text, options)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        ctx: &mut RunContext,
        span: Span,
        text: &str,
        options: &CompileOptions,
    ) -> PublisherResult<PublishReport> {
        let deadline = Instant::now() + self.config.run_timeout;
        let author = self.author();
        let compilation = self
            .compiler
            .compile(text, options, author, self.clock.as_ref())?;
        ctx.set_document(&span, compilation.document.title.clone());

        let plan = &compilation.plan;
        let root_position = plan.root_position();
        let planned = plan
            .events()
            .iter()
            .enumerate()
            .map(|(position, record)| {
                PlannedEvent::from_record(position, record, position == root_position)
            })
            .collect();
        let mut report = PublishReport::new(ctx.run_id, &compilation.document.title, planned);
        report.dry_run = ctx.dry_run;
        report.warnings = compilation.document.warnings.clone();

        if ctx.dry_run {
            report.finalize();
            info!(events = report.total_expected_events, "Dry run complete, no relays contacted");
            RunContext::record_result(&span, report.success, 0, report.total_expected_events);
            return Ok(report);
        }

        let events = plan
            .events()
            .iter()
            .map(|record| record.to_unsigned(author).sign(&self.signer))
            .collect::<Result<Vec<_>, _>>()?;
        for (planned, event) in report.plan.iter_mut().zip(&events) {
            planned.event_id = Some(event.id);
        }

        let spec = self.relay_spec(options, &compilation.document.metadata)?;
        let endpoints = self.selector.select(&spec).await?;
        report.relays = endpoints.iter().map(|e| e.url.clone()).collect();

        let relays = report.relays.clone();
        self.dispatch(&mut report, &events, &relays, root_position, deadline)
            .await;
        report.finalize();
        RunContext::record_result(
            &span,
            report.success,
            report.total_published_events,
            report.total_expected_events,
        );

        if report.success {
            info!(
                published = report.total_published_events,
                expected = report.total_expected_events,
                "Publication durable"
            );
        } else {
            warn!(
                published = report.total_published_events,
                expected = report.total_expected_events,
                errors = report.errors.len(),
                "Publication not durable"
            );
        }
        Ok(report)
    }

    /// Relays named by the options, else by the document, else the configured default
    fn relay_spec(&self, options: &CompileOptions, metadata: &Metadata) -> Result<RelaySpec, ConfigError> {
        match options.relays.as_deref().or_else(|| metadata.relays()) {
            Some(raw) => RelaySpec::parse(raw),
            None => Ok(self.config.default_relays.clone()),
        }
    }

    /// Disseminate `events` in plan order until `deadline`
    ///
    /// When the deadline passes, the in-flight event and every later one
    /// are reported as unexecuted. Outcomes already reached are kept.
    async fn dispatch(
        &self,
        report: &mut PublishReport,
        events: &[SignedEvent],
        relays: &[RelayUrl],
        root_position: usize,
        deadline: Instant,
    ) {
        for (position, event) in events.iter().enumerate() {
            let root = position == root_position;
            let publish = self.disseminator.publish(event, relays, self.config.quorum);
            match timeout_at(deadline, publish).await {
                Ok(result) => {
                    let identifier = event.identifier().unwrap_or_default();
                    self.handle_outcome(report, identifier, result, root);
                }
                Err(_) => {
                    let error = TimeoutError {
                        timeout: self.config.run_timeout,
                        unexecuted: report.plan[position..]
                            .iter()
                            .map(|p| p.identifier.clone())
                            .collect(),
                    };
                    error!(
                        unexecuted = error.unexecuted.len(),
                        timeout = ?error.timeout,
                        "Run deadline passed"
                    );
                    report.errors.push(ReportError::timeout(&error));
                    self.disseminator.release(relays).await;
                    return;
                }
            }
        }
    }

    /// Record one event's result. A quorum miss on the root fails the
    /// run; anywhere else it is a warning.
    fn handle_outcome(
        &self,
        report: &mut PublishReport,
        identifier: &str,
        result: RelayResult<EventOutcome>,
        root: bool,
    ) {
        match result {
            Ok(outcome) => {
                debug!(
                    identifier = %outcome.identifier,
                    success_count = outcome.success_count,
                    "Event durable"
                );
                report.outcomes.push(outcome);
            }
            Err(RelayError::QuorumNotMet(e)) => {
                if root {
                    error!(
                        identifier = %e.outcome.identifier,
                        success_count = e.outcome.success_count,
                        quorum = e.outcome.quorum,
                        "Root event did not reach quorum"
                    );
                } else {
                    warn!(
                        identifier = %e.outcome.identifier,
                        success_count = e.outcome.success_count,
                        quorum = e.outcome.quorum,
                        "Event did not reach quorum"
                    );
                }
                report.errors.push(ReportError::quorum_not_met(&e, root));
                report.outcomes.push(*e.outcome);
            }
            Err(e) => {
                error!(identifier, error = %e, "Dissemination failed");
                report.errors.push(ReportError::Dissemination {
                    identifier: identifier.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Fetch an index and everything it references, nested indexes included
    ///
    /// Queries `relays` directly without probing. Each level of the
    /// publication costs one query carrying one filter per referenced kind.
    #[instrument(skip_all, fields(author = %author.short_id(), identifier = %index_identifier))]
    pub async fn fetch_publication(
        &self,
        author: PublicKey,
        index_identifier: &str,
        relays: &RelaySpec,
    ) -> PublisherResult<Publication> {
        let urls = relays.resolve(&self.config.relay_categories)?;
        let index_kind = self
            .config
            .compile
            .index_kind()
            .ok_or(ConfigError::UnregisteredKind(KindRole::PublicationIndex.default_kind()))?;
        let wanted = Reference::new(index_kind, author, index_identifier);

        let found = self
            .disseminator
            .query(&reference_filters(std::slice::from_ref(&wanted)), &urls)
            .await?;
        let index = newest(
            found
                .events
                .iter()
                .filter(|e| e.address().as_ref() == Some(&wanted)),
        )
        .cloned()
        .ok_or_else(|| PublisherError::NotFound {
            kind: index_kind,
            identifier: index_identifier.to_string(),
        })?;

        let mut resolved: HashMap<Reference, SignedEvent> = HashMap::new();
        let mut requested: HashSet<Reference> = HashSet::from([wanted]);
        let mut frontier = index.references();
        while !frontier.is_empty() {
            let pending: Vec<Reference> = frontier
                .drain(..)
                .filter(|r| requested.insert(r.clone()))
                .collect();
            if pending.is_empty() {
                break;
            }
            let result = self
                .disseminator
                .query(&reference_filters(&pending), &urls)
                .await?;
            for event in result.events {
                if event.address().is_some_and(|a| pending.contains(&a)) {
                    keep_newest(&mut resolved, event);
                }
            }
            for reference in &pending {
                if let Some(event) = resolved.get(reference) {
                    frontier.extend(event.references());
                }
            }
            debug!(requested = pending.len(), resolved = resolved.len(), "Fetched publication level");
        }

        let publication = Publication::assemble(index, &resolved);
        info!(
            sections = publication.sections.len(),
            missing = publication.missing.len(),
            "Fetched publication"
        );
        Ok(publication)
    }
}
