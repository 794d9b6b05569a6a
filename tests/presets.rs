use voxlift_core::{OutputFormat, Preset, PresetStore, ProcessingOptions};

fn sample_options() -> ProcessingOptions {
    ProcessingOptions {
        use_separation: true,
        separation_model: "htdemucs_ft".into(),
        eq_low_db: 3.0,
        eq_mid_db: -2.0,
        eq_high_db: 6.0,
        use_gate: false,
        gate_threshold_dbfs: -35.0,
        output_format: OutputFormat::Flac,
        ..Default::default()
    }
}

#[test]
fn save_and_load_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let store = PresetStore::new(tmp.path().join("presets.yaml"));

    let preset = Preset::from(&sample_options());
    store.save("warm vocals", &preset).unwrap();

    let loaded = store.get("warm vocals").unwrap().unwrap();
    assert_eq!(loaded, preset);
    assert_eq!(store.names().unwrap(), vec!["warm vocals".to_string()]);
}

#[test]
fn missing_store_is_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let store = PresetStore::new(tmp.path().join("nope.yaml"));
    assert!(store.load().unwrap().is_empty());
    assert!(store.get("anything").unwrap().is_none());
}

#[test]
fn delete_removes_only_the_named_preset() {
    let tmp = tempfile::tempdir().unwrap();
    let store = PresetStore::new(tmp.path().join("presets.yaml"));

    let preset = Preset::from(&sample_options());
    store.save("one", &preset).unwrap();
    store.save("two", &preset).unwrap();

    assert!(store.delete("one").unwrap());
    assert!(!store.delete("one").unwrap());
    assert_eq!(store.names().unwrap(), vec!["two".to_string()]);
}

#[test]
fn apply_to_keeps_transient_fields() {
    let options = sample_options();
    let preset = Preset::from(&options);

    let base = ProcessingOptions {
        output_format: OutputFormat::Mp3,
        parallel_processing: true,
        low_memory: true,
        ..Default::default()
    };
    let applied = preset.apply_to(&base);

    // Chain fields come from the preset...
    assert_eq!(applied.separation_model, "htdemucs_ft");
    assert_eq!(applied.eq_high_db, 6.0);
    assert!(!applied.use_gate);
    // ...while per-run fields stay with the caller.
    assert_eq!(applied.output_format, OutputFormat::Mp3);
    assert!(applied.parallel_processing);
    assert!(applied.low_memory);
}

#[test]
fn overwriting_a_preset_replaces_it() {
    let tmp = tempfile::tempdir().unwrap();
    let store = PresetStore::new(tmp.path().join("presets.yaml"));

    let mut options = sample_options();
    store.save("p", &Preset::from(&options)).unwrap();

    options.eq_low_db = -9.0;
    store.save("p", &Preset::from(&options)).unwrap();

    let loaded = store.get("p").unwrap().unwrap();
    assert_eq!(loaded.eq_low_db, -9.0);
    assert_eq!(store.names().unwrap().len(), 1);
}
