//! State that has to survive restarts and upgrades
//!
//! Each test builds a fresh `Reconciler` per "run" against the same state
//! directory, the way separate process launches would.

use modlink_core::{
    Classification, EngineConfig, EngineWarning, ImportMode, ProvenanceBasis, Reconciler,
    StatePaths,
};
use modlink_test_utils::TestMirror;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn launch(paths: &StatePaths) -> Reconciler {
    paths.migrate_legacy();
    let config = EngineConfig::load(&paths.config_file()).unwrap();
    Reconciler::new(&config, paths.store_file())
}

fn save_roots(mirror: &TestMirror, paths: &StatePaths) {
    EngineConfig::with_roots(Some(mirror.library()), mirror.managed())
        .save(&paths.config_file())
        .unwrap();
}

#[test]
fn provenance_survives_restart() {
    let mirror = TestMirror::new();
    let paths = StatePaths::at(mirror.state());
    save_roots(&mirror, &paths);
    let source = mirror.write_library_file("megawads/MAP01.wad", b"H1");

    launch(&paths)
        .import(&[source.clone()], ImportMode::Copied)
        .unwrap();

    let snapshot = launch(&paths).reconcile(true, false).unwrap();
    assert_eq!(
        snapshot.classification_of("MAP01.wad"),
        Some(&Classification::Copied {
            source,
            basis: ProvenanceBasis::Recorded,
        })
    );
}

#[test]
fn classification_is_stable_across_launches() {
    let mirror = TestMirror::new();
    let paths = StatePaths::at(mirror.state());
    save_roots(&mirror, &paths);
    mirror.write_library_file("a/ONE.wad", b"one");
    mirror.write_library_file("b/TWO.wad", b"two");
    mirror.write_managed_file("ONE.wad", b"one");
    mirror.write_managed_file("two.WAD", b"two");
    mirror.write_managed_file("readme.txt", b"hello");

    let first = launch(&paths).reconcile(true, false).unwrap();
    let second = launch(&paths).reconcile(true, false).unwrap();

    assert_eq!(first.entries, second.entries);
    assert_eq!(first.names(), vec!["ONE.wad", "readme.txt", "two.WAD"]);
}

#[test]
fn legacy_install_is_migrated_and_kept() {
    let mirror = TestMirror::new();
    let install = mirror.root().join("install");
    std::fs::create_dir_all(&install).unwrap();
    mirror.write_library_file("MAP01.wad", b"H1");
    mirror.write_managed_file("MAP01.wad", b"H1");
    std::fs::write(
        install.join("provenance.json"),
        serde_json::json!({
            "MAP01.wad": {
                "source": mirror.library().join("MAP01.wad"),
                "mode": "copy",
                "md5": "0123456789abcdef0123456789abcdef"
            }
        })
        .to_string(),
    )
    .unwrap();
    let paths = StatePaths::at(mirror.state().join("user")).with_legacy_dir(&install);
    save_roots(&mirror, &paths);

    let snapshot = launch(&paths).reconcile(true, false).unwrap();

    assert!(snapshot.warnings.is_empty(), "{:?}", snapshot.warnings);
    assert!(snapshot.classification_of("MAP01.wad").unwrap().is_copied());
    assert!(install.join("provenance.json").exists());
    let upgraded: serde_json::Value =
        serde_json::from_slice(&std::fs::read(paths.store_file()).unwrap()).unwrap();
    assert_eq!(upgraded["version"], 1);
    assert!(
        upgraded["records"]["MAP01.wad"]["fingerprint"]
            .as_str()
            .unwrap()
            .starts_with("sha256:")
    );
}

#[test]
fn newer_state_is_not_overwritten_by_legacy() {
    let mirror = TestMirror::new();
    let install = mirror.root().join("install");
    std::fs::create_dir_all(&install).unwrap();
    std::fs::write(install.join("config.toml"), "managed_root = \"/old\"\n").unwrap();
    let paths = StatePaths::at(mirror.state()).with_legacy_dir(&install);
    save_roots(&mirror, &paths);

    let config = EngineConfig::load(&paths.config_file()).unwrap();
    launch(&paths);

    assert_eq!(EngineConfig::load(&paths.config_file()).unwrap(), config);
    assert_eq!(config.managed_root, mirror.managed());
}

#[rstest]
#[case::garbage(b"not json at all".as_slice())]
#[case::truncated(br#"{"version": 1, "records": {"#.as_slice())]
#[case::wrong_shape(b"[1, 2, 3]".as_slice())]
fn corrupt_store_resets_without_blocking(#[case] content: &[u8]) {
    let mirror = TestMirror::new();
    let paths = StatePaths::at(mirror.state());
    save_roots(&mirror, &paths);
    std::fs::write(paths.store_file(), content).unwrap();
    let source = mirror.write_library_file("A.wad", b"a");

    let reconciler = launch(&paths);
    let snapshot = reconciler.reconcile(true, false).unwrap();
    let report = reconciler.import(&[source], ImportMode::Copied).unwrap();

    assert!(matches!(
        snapshot.warnings.as_slice(),
        [EngineWarning::StoreReset { .. }]
    ));
    assert_eq!(report.failed().count(), 0);
    assert!(reconciler.records().contains_key("A.wad"));
}
