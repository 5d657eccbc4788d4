use std::fs;
use std::path::PathBuf;

use consonance_sweep::config::{AppConfig, KernelConfig, OvertoneConfig, SweepConfig};
use consonance_sweep::core::notes::SweepMode;
use consonance_sweep::core::snapping::SnapOption;

fn unique_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "consonance_sweep_config_restore_{}_{}",
        name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    path
}

fn assert_close(a: f32, b: f32, label: &str) {
    let diff = (a - b).abs();
    assert!(diff <= 1e-6, "{label} mismatch: {a} vs {b}");
}

fn assert_config_eq(actual: &AppConfig, expected: &AppConfig) {
    assert_eq!(actual.sweep.edo, expected.sweep.edo);
    assert_eq!(actual.sweep.max_x, expected.sweep.max_x);
    assert_eq!(actual.sweep.negative_x, expected.sweep.negative_x);
    assert_close(
        actual.sweep.snapping_distance,
        expected.sweep.snapping_distance,
        "sweep.snapping_distance",
    );
    assert_eq!(actual.sweep.snapping, expected.sweep.snapping);
    assert_close(
        actual.sweep.main_frequency,
        expected.sweep.main_frequency,
        "sweep.main_frequency",
    );
    assert_close(actual.sweep.volume, expected.sweep.volume, "sweep.volume");
    assert_eq!(actual.sweep.mode, expected.sweep.mode);
    assert_eq!(actual.sweep.added_notes, expected.sweep.added_notes);
    assert_eq!(actual.sweep.saved_chords, expected.sweep.saved_chords);
    assert_eq!(actual.overtone, expected.overtone);
    assert_close(actual.kernel.r, expected.kernel.r, "kernel.r");
    assert_close(actual.kernel.v, expected.kernel.v, "kernel.v");
    assert_close(actual.kernel.t, expected.kernel.t, "kernel.t");
    assert_close(actual.kernel.rm, expected.kernel.rm, "kernel.rm");
    assert_eq!(actual.kernel.resolution, expected.kernel.resolution);
}

#[test]
fn serialized_config_restores() {
    let expected = AppConfig {
        sweep: SweepConfig {
            edo: 19,
            max_x: 2400,
            negative_x: true,
            snapping_distance: 7.5,
            snapping: vec![SnapOption::Valley, SnapOption::Edo],
            main_frequency: 220.0,
            volume: 3.25,
            mode: SweepMode::Chord,
            added_notes: vec![386, 702],
            saved_chords: vec![vec![0, 386, 702], vec![100, 486, 802]],
        },
        overtone: OvertoneConfig {
            formula_cent: "log2(i) * 1.002".to_string(),
            formula_intensity: "1/i^2".to_string(),
            max_i: 16,
        },
        kernel: KernelConfig {
            r: 40.0,
            v: 1.5,
            t: 80.0,
            rm: 1000.0,
            resolution: 1500,
        },
    };

    let text = toml::to_string(&expected).expect("serialize config");
    let path = unique_path("roundtrip.toml");
    fs::write(&path, text).expect("write config");

    let restored = AppConfig::load(&path.to_string_lossy()).expect("reload config");
    assert_config_eq(&restored, &expected);

    let _ = fs::remove_file(&path);
}

#[test]
fn missing_file_is_created_and_reused() {
    let path = unique_path("fresh.toml");
    let path_str = path.to_string_lossy().to_string();
    let _ = fs::remove_file(&path);

    let first = AppConfig::load_or_default(&path_str);
    assert!(path.exists());
    let second = AppConfig::load_or_default(&path_str);
    assert_config_eq(&second, &first);
    assert_config_eq(&second, &AppConfig::default());

    let _ = fs::remove_file(&path);
}

#[test]
fn unknown_snap_option_is_a_parse_error() {
    let path = unique_path("bad_snap.toml");
    fs::write(&path, "[sweep]\nsnapping = [\"nearest\"]\n").expect("write config");
    assert!(AppConfig::load(&path.to_string_lossy()).is_err());
    let _ = fs::remove_file(&path);
}
