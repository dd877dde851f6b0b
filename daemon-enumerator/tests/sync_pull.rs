//! Integration tests for blocking, one-at-a-time enumeration.
//!
//! A pusher thread plays the daemon: it dispatches `Info` and `Done` messages
//! through the endpoint registry while the test thread pulls entries.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use daemon_enumerator::{
    Container, EndpointMap, Enumerator, EnumeratorBuilder, EnumeratorError, EnumeratorMessage,
    FileInfo, InMemoryMetadataStore, JsonCodec, MessageCodec, MetaValue, Mode, NextFile,
};

const WAIT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn records(names: &[&str]) -> EnumeratorMessage {
    let codec = JsonCodec;
    EnumeratorMessage::Info(
        names
            .iter()
            .map(|n| {
                codec
                    .encode(&FileInfo::with_name(*n))
                    .expect("encode should succeed")
            })
            .collect(),
    )
}

fn drain(enumerator: &Enumerator) -> Vec<String> {
    let mut names = Vec::new();
    loop {
        match enumerator.next_one(WAIT).expect("sync pull") {
            NextFile::Entry(info) => names.push(info.name().unwrap_or_default().to_string()),
            NextFile::EndOfStream => return names,
            NextFile::TimedOut => panic!("timed out after {:?}", names),
        }
    }
}

#[test]
fn test_entries_come_out_in_push_order() {
    init_tracing();
    let registry = Arc::new(EndpointMap::new());
    let enumerator = Enumerator::create(
        Container::new("home", "/"),
        "standard::name",
        Mode::Sync,
        registry.clone(),
    )
    .expect("build should succeed");
    let path = enumerator.endpoint().clone();

    let pusher = {
        let registry = registry.clone();
        thread::spawn(move || {
            for batch in [&["a", "b"][..], &["c"][..], &["d", "e", "f"][..]] {
                thread::sleep(Duration::from_millis(5));
                registry
                    .dispatch(&path, records(batch))
                    .expect("dispatch should succeed");
            }
            registry
                .dispatch(&path, EnumeratorMessage::Done)
                .expect("dispatch should succeed");
        })
    };

    assert_eq!(drain(&enumerator), vec!["a", "b", "c", "d", "e", "f"]);
    pusher.join().expect("pusher thread panicked");
}

#[test]
fn test_buffered_entry_returned_without_waiting() {
    let registry = Arc::new(EndpointMap::new());
    let enumerator = Enumerator::create(
        Container::new("home", "/"),
        "*",
        Mode::Sync,
        registry.clone(),
    )
    .expect("build should succeed");

    registry
        .dispatch(enumerator.endpoint(), records(&["ready"]))
        .expect("dispatch should succeed");

    let next = enumerator
        .next_one(Duration::ZERO)
        .expect("sync pull")
        .into_entry();
    assert_eq!(next.as_ref().and_then(FileInfo::name), Some("ready"));
}

#[test]
fn test_timeout_then_retry() {
    let registry = Arc::new(EndpointMap::new());
    let enumerator = Enumerator::create(
        Container::new("home", "/"),
        "*",
        Mode::Sync,
        registry.clone(),
    )
    .expect("build should succeed");

    assert_eq!(
        enumerator
            .next_one(Duration::from_millis(20))
            .expect("sync pull"),
        NextFile::TimedOut
    );

    registry
        .dispatch(enumerator.endpoint(), records(&["late"]))
        .expect("dispatch should succeed");

    let next = enumerator.next_one(WAIT).expect("sync pull").into_entry();
    assert_eq!(next.as_ref().and_then(FileInfo::name), Some("late"));
}

#[test]
fn test_end_of_stream_is_sticky() {
    let registry = Arc::new(EndpointMap::new());
    let enumerator = Enumerator::create(
        Container::new("home", "/"),
        "*",
        Mode::Sync,
        registry.clone(),
    )
    .expect("build should succeed");

    registry
        .dispatch(enumerator.endpoint(), EnumeratorMessage::Done)
        .expect("dispatch should succeed");

    for _ in 0..3 {
        assert_eq!(
            enumerator.next_one(WAIT).expect("sync pull"),
            NextFile::EndOfStream
        );
    }
}

#[test]
fn test_info_after_done_is_ignored() {
    let registry = Arc::new(EndpointMap::new());
    let enumerator = Enumerator::create(
        Container::new("home", "/"),
        "*",
        Mode::Sync,
        registry.clone(),
    )
    .expect("build should succeed");
    let path = enumerator.endpoint().clone();

    registry.dispatch(&path, records(&["a"])).expect("dispatch");
    registry
        .dispatch(&path, EnumeratorMessage::Done)
        .expect("dispatch");
    registry.dispatch(&path, records(&["b"])).expect("dispatch");

    assert_eq!(drain(&enumerator), vec!["a"]);
}

#[test]
fn test_waiting_ignores_other_endpoints() {
    let registry = Arc::new(EndpointMap::new());
    let waiting = Enumerator::create(
        Container::new("home", "/"),
        "*",
        Mode::Sync,
        registry.clone(),
    )
    .expect("build should succeed");
    let other = Enumerator::create(
        Container::new("home", "/other"),
        "*",
        Mode::Sync,
        registry.clone(),
    )
    .expect("build should succeed");

    let pusher = {
        let registry = registry.clone();
        let path = other.endpoint().clone();
        thread::spawn(move || {
            registry
                .dispatch(&path, records(&["x"]))
                .expect("dispatch should succeed");
            registry
                .dispatch(&path, EnumeratorMessage::Done)
                .expect("dispatch should succeed");
        })
    };
    pusher.join().expect("pusher thread panicked");

    assert_eq!(
        waiting
            .next_one(Duration::from_millis(20))
            .expect("sync pull"),
        NextFile::TimedOut
    );
    assert_eq!(other.buffered(), 1);
}

#[test]
fn test_batch_pull_rejected_in_sync_mode() {
    let registry = Arc::new(EndpointMap::new());
    let enumerator = Enumerator::create(
        Container::new("home", "/"),
        "*",
        Mode::Sync,
        registry.clone(),
    )
    .expect("build should succeed");

    registry
        .dispatch(enumerator.endpoint(), records(&["a"]))
        .expect("dispatch should succeed");

    let result = enumerator.next_batch(1, None, WAIT);
    assert!(matches!(
        result,
        Err(EnumeratorError::WrongMode { mode: Mode::Sync })
    ));
    assert_eq!(enumerator.buffered(), 1);
}

#[test]
fn test_metadata_added_when_requested() {
    let store = Arc::new(InMemoryMetadataStore::new());
    store.set("home", "/a", "color", MetaValue::String("red".into()));

    let registry = Arc::new(EndpointMap::new());
    let enumerator = EnumeratorBuilder::new(Container::new("home", "/"), registry.clone())
        .attributes("standard::name,metadata::*")
        .metadata_store(store.clone())
        .build()
        .expect("build should succeed");

    registry
        .dispatch(enumerator.endpoint(), records(&["a", "b"]))
        .expect("dispatch should succeed");

    let a = enumerator
        .next_one(WAIT)
        .expect("sync pull")
        .into_entry()
        .expect("entry a");
    let b = enumerator
        .next_one(WAIT)
        .expect("sync pull")
        .into_entry()
        .expect("entry b");

    assert_eq!(a.get_string("metadata::color"), Some("red"));
    assert!(!b.has_attribute("metadata::color"));
}

#[test]
fn test_metadata_skipped_when_not_requested() {
    let store = Arc::new(InMemoryMetadataStore::new());
    store.set("home", "/a", "color", MetaValue::String("red".into()));

    let registry = Arc::new(EndpointMap::new());
    let enumerator = EnumeratorBuilder::new(Container::new("home", "/"), registry.clone())
        .attributes("standard::name")
        .metadata_store(store)
        .build()
        .expect("build should succeed");

    registry
        .dispatch(enumerator.endpoint(), records(&["a"]))
        .expect("dispatch should succeed");

    let a = enumerator
        .next_one(WAIT)
        .expect("sync pull")
        .into_entry()
        .expect("entry a");
    assert_eq!(a.name(), Some("a"));
    assert!(!a.has_attribute("metadata::color"));
}

#[test]
fn test_corrupt_record_does_not_poison_batch() {
    let registry = Arc::new(EndpointMap::new());
    let enumerator = Enumerator::create(
        Container::new("home", "/"),
        "*",
        Mode::Sync,
        registry.clone(),
    )
    .expect("build should succeed");
    let path = enumerator.endpoint().clone();

    registry
        .dispatch(
            &path,
            EnumeratorMessage::Info(vec![
                br#"{"standard::name":"a"}"#.to_vec(),
                b"{not json".to_vec(),
                br#"{"standard::name":"c"}"#.to_vec(),
            ]),
        )
        .expect("dispatch");
    registry
        .dispatch(&path, EnumeratorMessage::Done)
        .expect("dispatch");

    assert_eq!(drain(&enumerator), vec!["a", "c"]);
    assert_eq!(enumerator.records_dropped(), 1);
}
