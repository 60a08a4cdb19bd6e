//! Immutable model artifacts shared by every request.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use crate::classifier::{load_classifier, Classifier};
use crate::config::ArtifactPaths;
use crate::error::{ClassifierError, LookupError, StartupError};
use crate::features::{FeatureVector, REQUIRED_FIELDS};

/// Index into the label table. Internal to the service.
pub type CategoryId = usize;

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelArtifact {
    Plain(Vec<String>),
    Encoder { classes: Vec<String> },
}

/// Owns the classifier, the label-encoding table and the canonical feature order.
///
/// Nothing is mutated after construction, so one instance is shared through an `Arc`
/// by all handlers without locking.
pub struct ModelRegistry {
    classifier: Arc<dyn Classifier>,
    labels: Vec<String>,
    feature_order: Vec<String>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("labels", &self.labels)
            .field("feature_order", &self.feature_order)
            .finish_non_exhaustive()
    }
}

impl ModelRegistry {
    /// Reads all three artifacts. Any failure here is fatal for the process.
    pub fn load(paths: &ArtifactPaths) -> Result<Self, StartupError> {
        let feature_order: Vec<String> = read_json(&paths.feature_order_path)?;
        let labels = match read_json::<LabelArtifact>(&paths.label_encoder_path)? {
            LabelArtifact::Plain(l) => l,
            LabelArtifact::Encoder { classes } => classes,
        };
        if let Some(expected) = paths.model_sha256.as_deref().filter(|s| !s.is_empty()) {
            verify_digest(&paths.model_path, expected)?;
        }
        let classifier = load_classifier(&paths.model_path, feature_order.len())?;
        let registry = Self::from_parts(classifier, labels, feature_order)?;
        info!(model = %paths.model_path.display(), features = ?registry.feature_order, labels = registry.labels.len(), "model registry loaded");
        Ok(registry)
    }

    /// Assembles a registry from already loaded parts, checking they agree with each other.
    pub fn from_parts(classifier: Arc<dyn Classifier>, labels: Vec<String>, feature_order: Vec<String>) -> Result<Self, StartupError> {
        if feature_order.len() != classifier.n_features() {
            return Err(StartupError::Inconsistent(format!(
                "feature order lists {} features, classifier expects {}", feature_order.len(), classifier.n_features())));
        }
        let mut seen = HashSet::new();
        for name in &feature_order {
            if !REQUIRED_FIELDS.contains(&name.as_str()) {
                return Err(StartupError::Inconsistent(format!("feature order names unknown field {name}")));
            }
            if !seen.insert(name.as_str()) {
                return Err(StartupError::Inconsistent(format!("feature order repeats {name}")));
            }
        }
        if seen.len() != REQUIRED_FIELDS.len() {
            return Err(StartupError::Inconsistent(format!(
                "feature order covers {} of {} request fields", seen.len(), REQUIRED_FIELDS.len())));
        }
        if labels.is_empty() {
            return Err(StartupError::Inconsistent("label table is empty".into()));
        }
        if labels.len() != classifier.n_classes() {
            return Err(StartupError::Inconsistent(format!(
                "label table has {} entries, classifier emits {} classes", labels.len(), classifier.n_classes())));
        }
        let mut uniq = HashSet::new();
        if let Some(dup) = labels.iter().find(|l| !uniq.insert(l.as_str())) {
            return Err(StartupError::Inconsistent(format!("label {dup} appears twice")));
        }
        Ok(Self { classifier, labels, feature_order })
    }

    /// Runs the classifier. The predicted id is the first index holding the maximum probability.
    pub fn predict_category(&self, vector: &FeatureVector) -> Result<(CategoryId, Vec<f64>), ClassifierError> {
        let proba = self.classifier.predict_proba(vector.as_slice())?;
        let id = proba.iter().enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, p)| match best {
                Some((_, bp)) if bp >= *p => best,
                _ => Some((i, *p)),
            })
            .map(|(i, _)| i)
            .ok_or(ClassifierError::EmptyDistribution)?;
        Ok((id, proba))
    }

    pub fn decode_label(&self, id: CategoryId) -> Result<&str, LookupError> {
        self.labels.get(id).map(String::as_str).ok_or(LookupError(id))
    }

    pub fn feature_order(&self) -> &[String] { &self.feature_order }

    pub fn labels(&self) -> &[String] { &self.labels }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StartupError> {
    let bytes = std::fs::read(path).map_err(|source| StartupError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_slice(&bytes).map_err(|e| StartupError::malformed(path, e))
}

fn verify_digest(path: &Path, expected: &str) -> Result<(), StartupError> {
    let bytes = std::fs::read(path).map_err(|source| StartupError::Io { path: path.to_path_buf(), source })?;
    let mut h = Sha256::new();
    h.update(&bytes);
    let got = format!("{:x}", h.finalize());
    if !expected.eq_ignore_ascii_case(&got) {
        return Err(StartupError::DigestMismatch { path: path.to_path_buf(), expected: expected.to_string(), actual: got });
    }
    Ok(())
}
