//! Startup loading of the three artifacts from disk.

use inference_gateway::config::ArtifactPaths;
use inference_gateway::features::FeatureVector;
use inference_gateway::{ModelRegistry, StartupError};
use std::path::{Path, PathBuf};

const MODEL: &str = include_str!("../models/agrosmart_rf_crop_model.json");
const ORDER: &str = r#"["N", "P", "K", "temperature", "humidity", "ph", "rainfall"]"#;

struct Fixture { _dir: tempfile::TempDir, paths: ArtifactPaths }

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p
}

fn fixture(model: &str, labels: &str, order: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths {
        model_path: write(dir.path(), "model.json", model),
        label_encoder_path: write(dir.path(), "labels.json", labels),
        feature_order_path: write(dir.path(), "order.json", order),
        model_sha256: None,
    };
    Fixture { _dir: dir, paths }
}

#[test]
fn loads_plain_label_arrays() {
    let f = fixture(MODEL, r#"["chickpea", "maize", "rice"]"#, ORDER);
    let reg = ModelRegistry::load(&f.paths).unwrap();
    assert_eq!(reg.labels(), ["chickpea", "maize", "rice"]);
    assert_eq!(reg.feature_order()[5], "ph");
    let (id, proba) = reg.predict_category(&FeatureVector::from(vec![90.0, 42.0, 43.0, 20.8, 82.0, 6.5, 202.9])).unwrap();
    assert_eq!(reg.decode_label(id).unwrap(), "rice");
    assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn missing_artifact_is_fatal() {
    let mut f = fixture(MODEL, r#"{"classes": ["chickpea", "maize", "rice"]}"#, ORDER);
    f.paths.label_encoder_path = f.paths.label_encoder_path.with_file_name("absent.json");
    assert!(matches!(ModelRegistry::load(&f.paths), Err(StartupError::Io { .. })));
}

#[test]
fn malformed_artifacts_are_fatal() {
    let f = fixture(MODEL, r#"{"classes": ["chickpea", "maize", "rice"]}"#, r#"{"order": "N,P"}"#);
    assert!(matches!(ModelRegistry::load(&f.paths), Err(StartupError::Malformed { .. })));
    let f = fixture("{\"trees\": 3}", r#"["chickpea", "maize", "rice"]"#, ORDER);
    assert!(matches!(ModelRegistry::load(&f.paths), Err(StartupError::Malformed { .. })));
}

#[test]
fn shape_mismatches_are_fatal() {
    let f = fixture(MODEL, r#"["chickpea", "maize"]"#, ORDER);
    assert!(matches!(ModelRegistry::load(&f.paths), Err(StartupError::Inconsistent(_))));
    let f = fixture(MODEL, r#"["chickpea", "maize", "rice"]"#, r#"["N", "P", "K", "temperature", "humidity", "ph"]"#);
    assert!(matches!(ModelRegistry::load(&f.paths), Err(StartupError::Inconsistent(_))));
}

#[test]
fn model_digest_is_checked_when_configured() {
    use sha2::{Digest, Sha256};
    let mut f = fixture(MODEL, r#"["chickpea", "maize", "rice"]"#, ORDER);
    f.paths.model_sha256 = Some("deadbeef".into());
    assert!(matches!(ModelRegistry::load(&f.paths), Err(StartupError::DigestMismatch { .. })));
    let digest = format!("{:x}", Sha256::digest(MODEL.as_bytes()));
    f.paths.model_sha256 = Some(digest.to_uppercase());
    assert!(ModelRegistry::load(&f.paths).is_ok());
}
