//! End-to-end publish runs against the in-memory relay network

use std::sync::Arc;
use std::time::Duration;

use quire_compiler::CompileOptions;
use quire_core::identity::testing::TestSigner;
use quire_core::{
    Disposition, FixedClock, KIND_LONG_FORM, MockRelayBehavior, MockRelayNetwork, ParseError,
    RelayUrl,
};
use quire_publisher::{Publisher, PublisherConfig, PublisherError, ReportError};
use quire_relay::{DisseminationConfig, RelayCategories, RelayError, RelaySpec, SelectorConfig};
use tempfile::TempDir;

const BOOK: &str =
    "= Book\nauthor: Ada\n\n== Ch1\n\n=== S1\n\nFirst section.\n\n=== S2\n\nSecond section.\n";
const HELLO: &str = "= Title\nauthor: A\n\nHello";

fn book_options() -> CompileOptions {
    CompileOptions::new()
        .with_content_level(3)
        .with_auto_update(true)
}

fn categories(urls: &[&RelayUrl]) -> RelayCategories {
    RelayCategories::new()
        .with_category("default", urls.iter().map(|u| u.as_str()))
        .unwrap()
}

fn config(categories: RelayCategories, quorum: usize) -> PublisherConfig {
    PublisherConfig::default()
        .with_relay_categories(categories)
        .with_selector(SelectorConfig::default().with_fallback_relay(None))
        .with_dissemination(
            DisseminationConfig::default()
                .with_backoff(Duration::from_millis(1), Duration::from_millis(4)),
        )
        .with_quorum(quorum)
}

fn publisher(network: &MockRelayNetwork, config: PublisherConfig) -> Publisher<MockRelayNetwork> {
    Publisher::new(
        config,
        Arc::new(network.clone()),
        TestSigner::signer(7),
        Arc::new(FixedClock::at(1_700_000_000)),
    )
    .unwrap()
}

fn stored_identifiers(network: &MockRelayNetwork, relay: &RelayUrl) -> Vec<String> {
    network
        .stored_events(relay)
        .iter()
        .filter_map(|e| e.identifier().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn book_is_published_leaves_first() {
    let network = MockRelayNetwork::new();
    let a = network.add_relay("wss://a.test");
    let b = network.add_relay("wss://b.test");
    let publisher = publisher(&network, config(categories(&[&a, &b]), 2));

    let report = publisher.publish_document(BOOK, &book_options()).await.unwrap();

    assert!(report.success);
    assert!(!report.dry_run);
    assert_eq!(report.document_title, "Book");
    assert_eq!(report.total_expected_events, 4);
    assert_eq!(report.total_published_events, 4);
    assert!(report.errors.is_empty());
    assert_eq!(report.relays, vec![a.clone(), b.clone()]);

    let planned: Vec<_> = report.plan.iter().map(|p| p.identifier.as_str()).collect();
    assert_eq!(planned, vec!["s1", "s2", "ch1", "book"]);
    assert!(report.plan[3].root);
    assert!(report.plan.iter().all(|p| p.event_id.is_some()));
    assert!(report.outcomes.iter().all(|o| o.disposition == Disposition::Durable));

    // Dispatch order is plan order on every relay
    assert_eq!(stored_identifiers(&network, &a), vec!["s1", "s2", "ch1", "book"]);
    assert_eq!(stored_identifiers(&network, &b), vec!["s1", "s2", "ch1", "book"]);
    assert!(network.open_connections().is_empty());
}

#[tokio::test]
async fn simple_article_is_one_long_form_event() {
    let network = MockRelayNetwork::new();
    let relay = network.add_relay("wss://a.test");
    let publisher = publisher(&network, config(categories(&[&relay]), 1));

    let report = publisher
        .publish_document(HELLO, &CompileOptions::new().with_content_level(1))
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.total_expected_events, 1);
    assert_eq!(report.plan[0].kind, KIND_LONG_FORM);
    assert_eq!(report.plan[0].identifier, "title-1700000000");

    let stored = network.stored_events(&relay);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "Hello");
    assert_eq!(stored[0].pubkey, publisher.author());
}

#[tokio::test]
async fn dry_run_makes_no_network_contact() {
    let network = MockRelayNetwork::new();
    let relay = network.add_relay("wss://a.test");
    let publisher = publisher(&network, config(categories(&[&relay]), 1));

    let report = publisher.dry_run(BOOK, &book_options()).await.unwrap();

    assert!(report.dry_run);
    assert!(report.success);
    assert_eq!(report.total_expected_events, 4);
    assert_eq!(report.total_published_events, 0);
    assert!(report.outcomes.is_empty());
    assert!(report.relays.is_empty());
    assert!(report.plan.iter().all(|p| p.event_id.is_none()));
    assert_eq!(network.connect_attempts(&relay), 0);
    assert_eq!(network.query_count(&relay), 0);
    assert_eq!(network.publish_attempts(&relay), 0);
}

#[tokio::test]
async fn non_root_quorum_miss_is_a_warning() {
    let network = MockRelayNetwork::new();
    let a = network.add_relay("wss://a.test");
    // Rejects exactly the three attempts spent on the first event
    let b = network.add_relay_with("wss://b.test", MockRelayBehavior::failing_first(3));
    let publisher = publisher(&network, config(categories(&[&a, &b]), 2));

    let report = publisher.publish_document(BOOK, &book_options()).await.unwrap();

    assert!(report.success);
    assert_eq!(report.total_published_events, 4);
    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        ReportError::QuorumNotMet {
            identifier,
            root,
            success_count,
            failures,
            ..
        } => {
            assert_eq!(identifier, "s1");
            assert!(!root);
            assert_eq!(*success_count, 1);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, b.to_string());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        report.outcome("s1").unwrap().disposition,
        Disposition::PartiallyPublished
    );
    assert_eq!(report.retry_identifiers(), vec!["s1"]);
}

#[tokio::test]
async fn root_quorum_miss_fails_the_run() {
    let network = MockRelayNetwork::new();
    let relay = network.add_relay_with("wss://a.test", MockRelayBehavior::rejecting());
    let publisher = publisher(&network, config(categories(&[&relay]), 1));

    let report = publisher
        .publish_document(HELLO, &CompileOptions::new().with_content_level(1))
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.total_published_events, 0);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].disposition, Disposition::Failed);
    assert_eq!(report.outcomes[0].outcomes[0].attempts, 3);
    assert!(matches!(
        report.errors.as_slice(),
        [ReportError::QuorumNotMet { root: true, .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn run_timeout_keeps_finished_outcomes() {
    let network = MockRelayNetwork::new();
    let slow = MockRelayBehavior::healthy().with_latency(Duration::from_secs(1));
    let relay = network.add_relay_with("wss://slow.test", slow);
    // Liveness check takes 2s, each event 2s: the deadline lands inside the second event
    let publisher = publisher(
        &network,
        config(categories(&[&relay]), 1).with_run_timeout(Duration::from_secs(5)),
    );

    let report = publisher.publish_document(BOOK, &book_options()).await.unwrap();

    assert!(!report.success);
    assert!(report.timed_out());
    assert_eq!(report.total_published_events, 1);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].identifier, "s1");

    let timeout = report
        .errors
        .iter()
        .find_map(|e| e.clone().into_timeout_error())
        .unwrap();
    assert_eq!(timeout.timeout, Duration::from_secs(5));
    assert_eq!(timeout.unexecuted, vec!["s2", "ch1", "book"]);
    assert_eq!(report.retry_identifiers(), vec!["s2", "ch1", "book"]);
    // The in-flight delivery was cut off mid-publish
    assert!(network.open_connections().is_empty());
    assert!(network.disconnects(&relay) >= 2);
}

#[tokio::test]
async fn relay_spec_precedence() {
    let network = MockRelayNetwork::new();
    let configured = network.add_relay("wss://configured.test");
    let from_metadata = network.add_relay("wss://metadata.test");
    let from_options = network.add_relay("wss://options.test");
    let publisher = publisher(&network, config(categories(&[&configured]), 1));
    let with_metadata = "= Title\nrelays: wss://metadata.test\n\nHello";
    let options = CompileOptions::new().with_content_level(1);

    let report = publisher.publish_document(HELLO, &options).await.unwrap();
    assert_eq!(report.relays, vec![configured]);

    let report = publisher.publish_document(with_metadata, &options).await.unwrap();
    assert_eq!(report.relays, vec![from_metadata]);

    let report = publisher
        .publish_document(with_metadata, &options.clone().with_relays("wss://options.test"))
        .await
        .unwrap();
    assert_eq!(report.relays, vec![from_options]);
}

#[tokio::test]
async fn unreachable_relays_abort_before_publishing() {
    let network = MockRelayNetwork::new();
    let down = network.add_relay_with("wss://down.test", MockRelayBehavior::unreachable());
    let publisher = publisher(&network, config(categories(&[&down]), 1));

    let err = publisher
        .publish_document(BOOK, &book_options())
        .await
        .unwrap_err();

    match err {
        PublisherError::Relay(RelayError::NoReachableRelays(e)) => {
            assert_eq!(e.probed, vec![down.to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(network.publish_attempts(&down), 0);
}

#[tokio::test]
async fn parse_errors_abort_before_network() {
    let network = MockRelayNetwork::new();
    let relay = network.add_relay("wss://a.test");
    let publisher = publisher(&network, config(categories(&[&relay]), 1));

    let err = publisher
        .publish_document("just some text", &CompileOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PublisherError::Parse(ParseError::MissingTitle)));
    assert_eq!(network.connect_attempts(&relay), 0);
}

#[tokio::test]
async fn published_book_can_be_fetched_back() {
    let network = MockRelayNetwork::new();
    let a = network.add_relay("wss://a.test");
    let b = network.add_relay("wss://b.test");
    let publisher = publisher(&network, config(categories(&[&a, &b]), 2));
    publisher.publish_document(BOOK, &book_options()).await.unwrap();

    let publication = publisher
        .fetch_publication(publisher.author(), "book", &RelaySpec::default())
        .await
        .unwrap();

    assert_eq!(publication.index.identifier(), Some("book"));
    assert_eq!(publication.identifiers(), vec!["ch1", "s1", "s2"]);
    assert!(publication.is_complete());
    assert_eq!(publication.sections[1].content, "First section.");
    assert!(network.open_connections().is_empty());

    let missing = publisher
        .fetch_publication(publisher.author(), "no-such-book", &RelaySpec::default())
        .await
        .unwrap_err();
    assert!(matches!(missing, PublisherError::NotFound { .. }));
}

#[tokio::test]
async fn fetch_reports_missing_sections() {
    let network = MockRelayNetwork::new();
    let relay = network.add_relay("wss://a.test");
    let publisher = publisher(&network, config(categories(&[&relay]), 1));
    publisher.publish_document(BOOK, &book_options()).await.unwrap();

    // A second relay that only holds the index
    let partial = network.add_relay("wss://partial.test");
    for event in network.stored_events(&relay) {
        if event.identifier() == Some("book") {
            network.seed_event(&partial, event);
        }
    }

    let publication = publisher
        .fetch_publication(publisher.author(), "book", &RelaySpec::Url(partial))
        .await
        .unwrap();
    assert!(publication.sections.is_empty());
    assert_eq!(publication.missing.len(), 1);
    assert_eq!(publication.missing[0].identifier, "ch1");
}

#[tokio::test]
async fn publisher_from_config_file() {
    let network = MockRelayNetwork::new();
    network.add_relay("wss://a.test");
    network.add_relay("wss://b.test");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quire.toml");
    std::fs::write(
        &path,
        r#"
quorum = 2
run_timeout = "1m"

[selector]
probe_timeout = "2s"

[categories]
default = ["wss://a.test", "wss://b.test/"]

[dissemination]
base_backoff = "1ms"
max_backoff = "4ms"
"#,
    )
    .unwrap();

    let config = PublisherConfig::from_file(&path).unwrap();
    assert_eq!(config.selector.probe_timeout, Duration::from_secs(2));
    let publisher = publisher(&network, config);

    let report = publisher.publish_document(BOOK, &book_options()).await.unwrap();
    assert!(report.success);
    assert_eq!(report.relays.len(), 2);
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let network = MockRelayNetwork::new();
    let result = Publisher::new(
        PublisherConfig::default().with_quorum(0),
        Arc::new(network),
        TestSigner::signer(7),
        Arc::new(FixedClock::at(0)),
    );
    assert!(matches!(
        result,
        Err(PublisherError::Config(quire_core::ConfigError::InvalidQuorum(0)))
    ));
}
