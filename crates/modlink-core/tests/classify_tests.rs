//! Tests for classification passes over a real managed directory

use modlink_core::{
    Classification, EngineConfig, ImportMode, ProvenanceBasis, ProvenanceRecord, Reconciler,
};
use modlink_test_utils::TestMirror;
use pretty_assertions::assert_eq;

fn reconciler(mirror: &TestMirror) -> Reconciler {
    Reconciler::new(
        &EngineConfig::with_roots(Some(mirror.library()), mirror.managed()),
        mirror.store_path(),
    )
}

#[test]
fn test_manual_drop_matching_library_is_healed() {
    let mirror = TestMirror::new();
    let source = mirror.write_library_file("megawads/MAP01.wad", b"H1");
    mirror.write_managed_file("MAP01.wad", b"H1");
    let r = reconciler(&mirror);

    let snapshot = r.reconcile(true, false).unwrap();

    assert_eq!(
        snapshot.classification_of("MAP01.wad"),
        Some(&Classification::Copied {
            source: source.clone(),
            basis: ProvenanceBasis::Inferred
        })
    );
    let record = &r.records()["MAP01.wad"];
    assert_eq!(record.source, source);
    assert_eq!(record.mode, ImportMode::Copied);

    // Once healed, the record is the basis
    let snapshot = r.reconcile(false, false).unwrap();
    assert!(matches!(
        snapshot.classification_of("MAP01.wad"),
        Some(Classification::Copied {
            basis: ProvenanceBasis::Recorded,
            ..
        })
    ));
}

#[test]
fn test_unknown_file_is_foreign() {
    let mirror = TestMirror::new();
    mirror.write_library_file("MAP01.wad", b"H1");
    mirror.write_managed_file("autoexec.cfg", b"bind");
    let r = reconciler(&mirror);

    let snapshot = r.reconcile(true, false).unwrap();

    assert_eq!(snapshot.classification_of("autoexec.cfg"), Some(&Classification::Foreign));
    assert!(r.records().is_empty());
}

#[test]
fn test_classification_is_repeatable() {
    let mirror = TestMirror::new();
    mirror.write_library_file("a/Zeta.wad", b"z");
    mirror.write_managed_file("Zeta.wad", b"z");
    mirror.write_managed_file("alpha.wad", b"a");
    mirror.write_managed_file("Beta.wad", b"b");
    let r = reconciler(&mirror);

    let first = r.reconcile(true, false).unwrap();
    let second = r.reconcile(true, true).unwrap();

    assert_eq!(first.names(), vec!["alpha.wad", "Beta.wad", "Zeta.wad"]);
    assert_eq!(first.entries, second.entries);
}

#[test]
fn test_vanished_entry_record_is_pruned() {
    let mirror = TestMirror::new();
    let source = mirror.write_library_file("MAP01.wad", b"H1");
    let r = reconciler(&mirror);
    r.import(&[source], ImportMode::Copied).unwrap();

    std::fs::remove_file(mirror.managed().join("MAP01.wad")).unwrap();
    r.reconcile(false, false).unwrap();

    assert!(r.records().is_empty());
}

#[test]
fn test_edited_copy_without_library_match_drops_record() {
    let mirror = TestMirror::new();
    let source = mirror.write_library_file("MAP01.wad", b"H1");
    let r = reconciler(&mirror);
    r.import(&[source], ImportMode::Copied).unwrap();

    std::fs::write(mirror.managed().join("MAP01.wad"), b"edited").unwrap();
    let snapshot = r.reconcile(true, true).unwrap();

    assert_eq!(snapshot.classification_of("MAP01.wad"), Some(&Classification::Foreign));
    assert!(r.records().get("MAP01.wad").is_none());
}

#[test]
fn test_renamed_copy_matches_by_content_alone() {
    let mirror = TestMirror::new();
    mirror.write_library_file("b/SECOND.wad", b"same");
    let first = mirror.write_library_file("a/FIRST.wad", b"same");
    mirror.write_managed_file("renamed.wad", b"same");
    let r = reconciler(&mirror);

    let snapshot = r.reconcile(true, false).unwrap();

    assert_eq!(
        snapshot.classification_of("renamed.wad"),
        Some(&Classification::Copied {
            source: first,
            basis: ProvenanceBasis::Inferred
        })
    );
}

#[cfg(unix)]
#[test]
fn test_extension_filter_limits_files_but_not_links() {
    let mirror = TestMirror::new();
    mirror.write_managed_file("kexengine.cfg", b"cfg");
    mirror.write_managed_file("MOD.wad", b"wad");
    mirror.link_managed("notes.txt", &mirror.library().join("notes.txt"));
    let mut config = EngineConfig::with_roots(Some(mirror.library()), mirror.managed());
    config.extensions = vec!["wad".to_string()];
    let r = Reconciler::new(&config, mirror.store_path());

    let snapshot = r.reconcile(true, false).unwrap();

    assert!(snapshot.get("kexengine.cfg").is_none());
    assert!(snapshot.get("MOD.wad").is_some());
    assert!(snapshot.get("notes.txt").is_some());
}

#[cfg(unix)]
#[test]
fn test_dangling_link_is_linked_and_broken() {
    let mirror = TestMirror::new();
    let target = mirror.library().join("deleted.wad");
    mirror.link_managed("deleted.wad", &target);
    let r = reconciler(&mirror);

    let snapshot = r.reconcile(true, false).unwrap();

    assert_eq!(
        snapshot.classification_of("deleted.wad"),
        Some(&Classification::Linked {
            target: Some(target),
            broken: true
        })
    );
    assert_eq!(snapshot.broken_links().count(), 1);
}

#[test]
fn test_subdirectories_and_temp_artifacts_are_skipped() {
    let mirror = TestMirror::new();
    std::fs::create_dir(mirror.managed().join("saves")).unwrap();
    let temp = modlink_fs::io::temp_path_for(&mirror.managed().join("MAP01.wad"));
    std::fs::write(&temp, b"partial").unwrap();
    mirror.write_managed_file("MAP01.wad", b"done");
    let r = reconciler(&mirror);

    let snapshot = r.reconcile(false, false).unwrap();

    assert_eq!(snapshot.names(), vec!["MAP01.wad"]);
}

#[test]
fn test_legacy_store_records_are_revalidated() {
    let mirror = TestMirror::new();
    let source = mirror.write_library_file("MAP01.wad", b"H1");
    mirror.write_managed_file("MAP01.wad", b"H1");
    let legacy = serde_json::json!({
        "MAP01.wad": {"source": source, "mode": "copy", "md5": "0123"}
    });
    std::fs::write(mirror.store_path(), legacy.to_string()).unwrap();
    let r = reconciler(&mirror);
    assert_eq!(r.records()["MAP01.wad"].fingerprint, "md5:0123");

    let snapshot = r.reconcile(true, false).unwrap();

    assert!(snapshot.classification_of("MAP01.wad").unwrap().is_copied());
    let record: &ProvenanceRecord = &r.records()["MAP01.wad"];
    assert!(record.fingerprint.starts_with("sha256:"));
}

#[test]
fn test_managed_directory_nested_in_library_is_not_indexed() {
    let mirror = TestMirror::new();
    let source = mirror.write_library_file("MAP01.wad", b"H1");
    mirror.write_managed_file("MAP01.wad", b"H1");
    mirror.write_managed_file("FOREIGN.wad", b"dropped by hand");
    let r = Reconciler::new(
        &EngineConfig::with_roots(Some(mirror.root().to_path_buf()), mirror.managed()),
        mirror.store_path(),
    );

    let snapshot = r.reconcile(true, false).unwrap();

    assert_eq!(snapshot.classification_of("FOREIGN.wad"), Some(&Classification::Foreign));
    assert_eq!(
        snapshot.classification_of("MAP01.wad"),
        Some(&Classification::Copied {
            source,
            basis: ProvenanceBasis::Inferred
        })
    );
    assert!(
        r.current_index()
            .entries()
            .all(|e| !e.path.starts_with(mirror.managed()))
    );
    assert!(!r.records().contains_key("FOREIGN.wad"));
}

#[test]
fn test_hidden_user_tmp_file_is_classified() {
    let mirror = TestMirror::new();
    mirror.write_managed_file(".notes.tmp", b"scratch");
    let r = reconciler(&mirror);

    let snapshot = r.reconcile(false, false).unwrap();

    assert_eq!(snapshot.classification_of(".notes.tmp"), Some(&Classification::Foreign));
}
