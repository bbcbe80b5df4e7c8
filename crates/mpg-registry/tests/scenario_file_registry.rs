//! File-backed registry: state persists across instances and writes are
//! visible to a fresh reader.

use mpg_registry::{
    FileRegistry, MetricsSource, ModelRegistry, ModelVersion, RegistryError, RegistryState,
};

fn seeded(dir: &tempfile::TempDir) -> FileRegistry {
    let mut state = RegistryState::default();
    state.register(
        ModelVersion::new("iris", "1")
            .with_metric("accuracy", 0.90)
            .with_metric("f1_macro", 0.88),
    );
    state.register(
        ModelVersion::new("iris", "2")
            .with_metric("accuracy", 0.95)
            .with_metric("f1_macro", 0.93),
    );

    let reg = FileRegistry::new(dir.path().join("registry.json"));
    reg.save(&state).unwrap();
    reg
}

#[test]
fn alias_write_is_visible_to_a_new_instance() {
    let dir = tempfile::tempdir().unwrap();
    let reg = seeded(&dir);

    reg.set_alias("iris", "production", "2").unwrap();
    reg.set_tag("iris", "2", "decision", "promoted").unwrap();

    let reader = FileRegistry::new(reg.path());
    let champ = reader.resolve_alias("iris", "production").unwrap();
    assert_eq!(champ.version, "2");
    assert_eq!(champ.tags.get("decision").map(String::as_str), Some("promoted"));
    assert_eq!(reader.get_metrics(&champ).unwrap().get("accuracy"), Some(&0.95));
}

#[test]
fn no_temp_file_is_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let reg = seeded(&dir);
    reg.set_alias("iris", "production", "1").unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn missing_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let reg = FileRegistry::new(dir.path().join("absent.json"));
    assert!(matches!(
        reg.list_versions("iris"),
        Err(RegistryError::Unavailable(_))
    ));
}

#[test]
fn corrupt_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    std::fs::write(&path, "{ not json").unwrap();
    let reg = FileRegistry::new(&path);
    assert!(matches!(reg.list_versions("iris"), Err(RegistryError::Decode(_))));
}

#[test]
fn failed_write_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let reg = seeded(&dir);
    let before = std::fs::read_to_string(reg.path()).unwrap();

    let err = reg.set_alias("iris", "production", "99").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(std::fs::read_to_string(reg.path()).unwrap(), before);
}
