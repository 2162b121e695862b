use filpal_core::store::{ALLOWED_PARAMS, hotend_temp};
use filpal_core::{FilpalError, FitResult, ParamValue, ParameterStore, Profile};
use rstest::rstest;
use std::collections::BTreeMap;
use std::fs;

const SEEDED: &str = r#"
[loaded]
fila_id = "PLA-1"

[PLA-1]
filament_type = "PLA"
hotend_min_temp = 190
hotend_max_temp = 230
custom_note = "dry first"

[PLA-1.M104]
S = [205.0, 210.0, 215.0]
"#;

fn seeded() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fil.pal");
    fs::write(&path, SEEDED).unwrap();
    (dir, path)
}

#[test]
fn reads_profiles_and_loaded_pointer() {
    let (_dir, path) = seeded();
    let store = ParameterStore::open(&path).unwrap();
    assert_eq!(store.loaded_id(), Some("PLA-1"));
    let p = store.get_loaded_profile().unwrap();
    assert_eq!(p["hotend_min_temp"], ParamValue::Number(190.0));
    assert_eq!(p["filament_type"], ParamValue::Text("PLA".into()));
    assert_eq!(p["M104"].series("S"), Some(&[205.0, 210.0, 215.0][..]));
    assert_eq!(hotend_temp(p), Some(210.0));
    assert!(store.ids().all(|id| id != "loaded"));
}

#[test]
fn unknown_profile_is_not_found() {
    let (_dir, path) = seeded();
    let store = ParameterStore::open(&path).unwrap();
    assert_eq!(
        store.get_profile("PETG-9").unwrap_err(),
        FilpalError::NotFound("PETG-9".into())
    );
}

#[test]
fn missing_file_is_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParameterStore::open(dir.path().join("fil.pal")).unwrap();
    assert_eq!(store.loaded_id(), None);
    assert_eq!(store.get_loaded_profile().unwrap_err(), FilpalError::NoLoadedFilament);
}

#[test]
fn malformed_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fil.pal");
    fs::write(&path, "[PLA-1\nbroken").unwrap();
    assert!(matches!(ParameterStore::open(&path), Err(FilpalError::Config(_))));
}

#[test]
fn rejects_unknown_parameter_and_leaves_file_unchanged() {
    let (_dir, path) = seeded();
    let before = fs::read(&path).unwrap();
    let mut store = ParameterStore::open(&path).unwrap();
    let batch = Profile::from([
        ("fan_min".to_string(), ParamValue::Number(30.0)),
        ("bogus_param".to_string(), ParamValue::Number(1.0)),
    ]);
    let err = store.set_values("PLA-1", &batch).unwrap_err();
    assert_eq!(err, FilpalError::UnrecognizedParameter("bogus_param".into()));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!store.get_profile("PLA-1").unwrap().contains_key("fan_min"));
}

#[rstest]
#[case("fan_max")]
#[case("z_offset")]
#[case("custom_note")]
fn accepts_allowed_or_existing_keys(#[case] key: &str) {
    let (_dir, path) = seeded();
    let mut store = ParameterStore::open(&path).unwrap();
    let batch = Profile::from([(key.to_string(), ParamValue::Number(1.5))]);
    store.set_values("PLA-1", &batch).unwrap();

    let reopened = ParameterStore::open(&path).unwrap();
    assert_eq!(reopened.get_profile("PLA-1").unwrap()[key], ParamValue::Number(1.5));
    assert_eq!(reopened.loaded_id(), Some("PLA-1"));
}

#[test]
fn allowed_set_covers_documented_parameters() {
    for key in ["hotend_min_temp", "retraction", "fan_min", "filament_type", "flowrate"] {
        assert!(ALLOWED_PARAMS.contains(&key));
    }
}

#[test]
fn set_loaded_creates_profile() {
    let (_dir, path) = seeded();
    let mut store = ParameterStore::open(&path).unwrap();
    store.set_loaded("PETG-2").unwrap();
    assert_eq!(store.loaded_id(), Some("PETG-2"));
    assert!(store.get_loaded_profile().unwrap().is_empty());

    let reopened = ParameterStore::open(&path).unwrap();
    assert_eq!(reopened.loaded_id(), Some("PETG-2"));
    assert!(reopened.get_profile("PLA-1").is_ok());
}

#[test]
fn reserved_section_name_cannot_be_a_filament() {
    let (_dir, path) = seeded();
    let mut store = ParameterStore::open(&path).unwrap();
    assert!(matches!(store.set_loaded("loaded"), Err(FilpalError::InvalidArgument(_))));
}

#[test]
fn corrections_round_trip_through_the_file() {
    let (_dir, path) = seeded();
    let mut store = ParameterStore::open(&path).unwrap();
    let fit = FitResult::new(1.5, 0.98, 0.0001);
    let bed = FitResult::new(0.0, 1.1, 0.0);
    store
        .record_corrections("PLA-1", &[("M104", fit), ("M140", bed)])
        .unwrap();

    let reopened = ParameterStore::open(&path).unwrap();
    let p = reopened.get_profile("PLA-1").unwrap();
    assert_eq!(filpal_core::store::stored_correction(p, "M104"), Some(fit));
    assert_eq!(filpal_core::store::stored_correction(p, "M140"), Some(bed));
    assert_eq!(
        p["correction_M104"],
        ParamValue::List(vec![1.5, 0.98, 0.0001])
    );
}

#[test]
fn corrections_need_an_existing_profile() {
    let (_dir, path) = seeded();
    let before = fs::read(&path).unwrap();
    let mut store = ParameterStore::open(&path).unwrap();
    let err = store
        .record_corrections("PETG-9", &[("M104", FitResult::new(0.0, 1.0, 0.0))])
        .unwrap_err();
    assert_eq!(err, FilpalError::NotFound("PETG-9".into()));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn set_values_on_unknown_profile_is_not_found() {
    let (_dir, path) = seeded();
    let before = fs::read(&path).unwrap();
    let mut store = ParameterStore::open(&path).unwrap();
    let batch = Profile::from([("fan_min".to_string(), ParamValue::Number(30.0))]);
    let err = store.set_values("PLA-l", &batch).unwrap_err();
    assert_eq!(err, FilpalError::NotFound("PLA-l".into()));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(store.ids().all(|id| id != "PLA-l"));
}

#[test]
fn series_values_accepted_for_command_targets() {
    let (_dir, path) = seeded();
    let mut store = ParameterStore::open(&path).unwrap();
    let batch = Profile::from([(
        "M140".to_string(),
        ParamValue::Series(BTreeMap::from([("S".to_string(), vec![60.0, 65.0])])),
    )]);
    store.set_values("PLA-1", &batch).unwrap();
    let reopened = ParameterStore::open(&path).unwrap();
    assert_eq!(
        reopened.get_profile("PLA-1").unwrap()["M140"].series("S"),
        Some(&[60.0, 65.0][..])
    );
}
