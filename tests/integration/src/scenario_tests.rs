//! End-to-end scenarios through the threaded engine
//!
//! Each test drives the engine the way a front end does: requests go in
//! through the command API, results come back as published snapshots.

use crossbeam_channel::{Receiver, unbounded};
use modlink_core::{
    ClassificationSnapshot, Engine, EngineConfig, EngineOptions, ImportAction, ImportMode,
    Reconciler, RemovalAction,
};
use modlink_fs::checksum::{compute_content_checksum, compute_file_checksum};
use modlink_test_utils::TestMirror;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Test Infrastructure
// =============================================================================

/// An engine over a mirror, with every published snapshot forwarded to a
/// channel.
struct Harness {
    mirror: TestMirror,
    engine: Engine,
    snapshots: Receiver<Arc<ClassificationSnapshot>>,
}

impl Harness {
    fn start(mirror: TestMirror) -> Self {
        let reconciler = Reconciler::new(
            &EngineConfig::with_roots(Some(mirror.library()), mirror.managed()),
            mirror.store_path(),
        );
        let engine = Engine::start(
            reconciler,
            EngineOptions {
                watch: false,
                debounce: Duration::from_millis(20),
            },
        )
        .unwrap();
        let (tx, snapshots) = unbounded();
        engine.subscribe(move |snapshot| {
            let _ = tx.send(snapshot);
        });
        let harness = Self {
            mirror,
            engine,
            snapshots,
        };
        harness.settle();
        harness
    }

    /// Wait for the next snapshot that satisfies `check`.
    fn next(&self, check: impl Fn(&ClassificationSnapshot) -> bool) -> Arc<ClassificationSnapshot> {
        let current = self.engine.current_classification();
        if current.generation > 0 && check(&current) {
            return current;
        }
        loop {
            let snapshot = self
                .snapshots
                .recv_timeout(TIMEOUT)
                .expect("timed out waiting for a snapshot");
            if check(&snapshot) {
                return snapshot;
            }
        }
    }

    /// Wait for the first pass.
    fn settle(&self) -> Arc<ClassificationSnapshot> {
        self.next(|s| s.generation > 0)
    }

    fn import(&self, source: &std::path::Path, mode: ImportMode) -> modlink_core::ImportReport {
        let reply = self
            .engine
            .request_import(vec![source.to_path_buf()], mode)
            .unwrap();
        reply.recv_timeout(TIMEOUT).unwrap().unwrap()
    }

    /// Import, then wait for the snapshot published afterwards.
    fn import_and_classify(
        &self,
        source: &std::path::Path,
        mode: ImportMode,
    ) -> Arc<ClassificationSnapshot> {
        let before = self.engine.current_classification().generation;
        let report = self.import(source, mode);
        assert_eq!(report.failed().count(), 0, "import failed: {report:?}");
        self.next(|s| s.generation > before)
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[cfg(unix)]
#[test]
fn scenario_link_then_copy_same_source() {
    let mirror = TestMirror::new();
    let source = mirror.write_library_file("megawads/MAP01.wad", b"H1 content");
    let h = Harness::start(mirror);

    let snapshot = h.import_and_classify(&source, ImportMode::Linked);
    assert!(h.mirror.is_managed_link("MAP01.wad"));
    assert_eq!(snapshot.classification_of("MAP01.wad").unwrap().tag(), "linked");

    let snapshot = h.import_and_classify(&source, ImportMode::Copied);
    assert!(!h.mirror.is_managed_link("MAP01.wad"));
    assert_eq!(snapshot.classification_of("MAP01.wad").unwrap().tag(), "copied");
    assert_eq!(snapshot.entries.len(), 1);
}

#[test]
fn scenario_unrelated_name_collision() {
    let mirror = TestMirror::new();
    mirror.write_managed_file("BOSS.wad", b"H2 unrelated");
    let source = mirror.write_library_file("bosses/BOSS.wad", b"H3 ours");
    let h = Harness::start(mirror);
    assert!(h.settle().classification_of("BOSS.wad").unwrap().is_foreign());

    let report = h.import(&source, ImportMode::Copied);
    let success = report.succeeded().next().unwrap();
    assert_eq!(success.name, "BOSS-2.wad");
    assert_eq!(success.action, ImportAction::Renamed);

    let snapshot = h.next(|s| s.get("BOSS-2.wad").is_some());
    h.mirror.assert_managed_content("BOSS.wad", b"H2 unrelated");
    h.mirror.assert_managed_content("BOSS-2.wad", b"H3 ours");
    assert!(snapshot.classification_of("BOSS.wad").unwrap().is_foreign());
    assert!(snapshot.classification_of("BOSS-2.wad").unwrap().is_copied());
}

#[test]
fn scenario_manual_drop_is_healed() {
    let mirror = TestMirror::new();
    mirror.write_library_file("megawads/MAP01.wad", b"H1 content");
    mirror.write_managed_file("MAP01.wad", b"H1 content");

    let h = Harness::start(mirror);
    let snapshot = h.settle();

    assert!(snapshot.classification_of("MAP01.wad").unwrap().is_copied());
    let store: serde_json::Value =
        serde_json::from_slice(&std::fs::read(h.mirror.store_path()).unwrap()).unwrap();
    assert_eq!(store["records"]["MAP01.wad"]["mode"], "copied");
    assert_eq!(
        store["records"]["MAP01.wad"]["fingerprint"],
        compute_content_checksum(b"H1 content")
    );
}

#[cfg(unix)]
#[test]
fn scenario_deleting_link_keeps_library_file() {
    let mirror = TestMirror::new();
    let source = mirror.write_library_file("MAP01.wad", b"H1 content");
    let h = Harness::start(mirror);
    let imported = h.import_and_classify(&source, ImportMode::Linked);

    let reply = h.engine.request_delete(vec!["MAP01.wad".into()]).unwrap();
    let report = reply.recv_timeout(TIMEOUT).unwrap().unwrap();

    assert_eq!(report.outcomes[0].result, Ok(RemovalAction::Removed));
    let snapshot = h.next(|s| s.generation > imported.generation);
    assert!(snapshot.entries.is_empty());
    assert_eq!(std::fs::read(&source).unwrap(), b"H1 content");
}

#[test]
fn scenario_copied_import_is_byte_for_byte() {
    let mirror = TestMirror::new();
    let content: Vec<u8> = (0..=255u8).cycle().take(300_000).collect();
    let source = mirror.write_library_file("big/textures.pk3", &content);
    let h = Harness::start(mirror);

    h.import_and_classify(&source, ImportMode::Copied);

    assert_eq!(
        compute_file_checksum(&h.mirror.managed().join("textures.pk3")).unwrap(),
        compute_file_checksum(&source).unwrap()
    );
}

#[test]
fn scenario_reimport_changes_nothing() {
    let mirror = TestMirror::new();
    let source = mirror.write_library_file("MAP01.wad", b"H1 content");
    let h = Harness::start(mirror);
    let first = h.import_and_classify(&source, ImportMode::Copied);

    let report = h.import(&source, ImportMode::Copied);
    let second = h.next(|s| s.generation > first.generation);

    assert_eq!(report.succeeded().next().unwrap().action, ImportAction::Refreshed);
    assert_eq!(h.mirror.managed_names(), vec!["MAP01.wad"]);
    assert_eq!(first.entries, second.entries);
}

#[test]
fn scenario_repointing_roots_starts_over() {
    let mirror = TestMirror::new();
    mirror.write_library_file("A.wad", b"a");
    let other = tempfile::tempdir().unwrap();
    std::fs::write(other.path().join("B.wad"), b"b").unwrap();
    std::fs::write(other.path().join("C.wad"), b"c").unwrap();
    let h = Harness::start(mirror);
    assert_eq!(h.settle().index_size, 1);

    h.engine
        .set_roots(Some(other.path().to_path_buf()), h.mirror.managed())
        .unwrap();

    let snapshot = h.next(|s| s.index_size == 2);
    assert!(snapshot.warnings.is_empty());
}
