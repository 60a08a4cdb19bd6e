//! Trained classifier artifacts.
//!
//! The classifier is opaque to the rest of the service: it maps a feature vector to a
//! probability distribution over category ids. Two artifact kinds are understood:
//!
//! - a tree ensemble serialized as JSON (default, see [`ForestClassifier`]);
//! - an ONNX export, behind the `onnx` cargo feature.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use crate::error::{ClassifierError, StartupError};

#[cfg(feature = "onnx")] mod onnx;
#[cfg(feature = "onnx")] pub use onnx::OnnxClassifier;

pub trait Classifier: Send + Sync {
    fn n_features(&self) -> usize;
    fn n_classes(&self) -> usize;
    /// One probability per category id, summing to 1.
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError>;
}

/// Loads the classifier at `path`, picking the runtime from the file extension.
pub fn load_classifier(path: &Path, n_features: usize) -> Result<Arc<dyn Classifier>, StartupError> {
    let is_onnx = path.extension().map(|e| e.eq_ignore_ascii_case("onnx")).unwrap_or(false);
    if is_onnx {
        #[cfg(feature = "onnx")]
        { return Ok(Arc::new(OnnxClassifier::load(path, n_features)?)); }
        #[cfg(not(feature = "onnx"))]
        {
            let _ = n_features;
            return Err(StartupError::malformed(path, "onnx model given but the gateway was built without the `onnx` feature"));
        }
    }
    let bytes = std::fs::read(path).map_err(|source| StartupError::Io { path: path.to_path_buf(), source })?;
    let forest = ForestClassifier::from_slice(&bytes).map_err(|reason| StartupError::malformed(path, reason))?;
    Ok(Arc::new(forest))
}

/// Slack allowed on the sum of an exported model's f32 probabilities.
#[cfg(any(feature = "onnx", test))]
const SUM_TOLERANCE: f64 = 1e-3;

/// Rejects outputs that cannot be a distribution over category ids.
#[cfg(any(feature = "onnx", test))]
pub(crate) fn check_distribution(proba: &[f64]) -> Result<(), String> {
    if proba.is_empty() { return Err("model produced no probabilities".into()); }
    if proba.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err("model produced non-finite or negative probabilities".into());
    }
    let sum: f64 = proba.iter().sum();
    if (sum - 1.0).abs() > SUM_TOLERANCE { return Err(format!("model probabilities sum to {sum}, not 1")); }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ForestArtifact {
    n_features: usize,
    n_classes: usize,
    trees: Vec<TreeArtifact>,
}

/// One fitted tree in the flat parallel-array layout (`-1` children mark a leaf).
#[derive(Debug, Deserialize)]
struct TreeArtifact {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
enum Node {
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { proba: Vec<f64> },
}

#[derive(Debug, Clone)]
struct Tree { nodes: Vec<Node> }

impl Tree {
    fn leaf(&self, x: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                // split inputs are compared at f32 precision, like the fitted thresholds
                Node::Split { feature, threshold, left, right } => {
                    idx = if (x[*feature] as f32) as f64 <= *threshold { *left } else { *right };
                }
                Node::Leaf { proba } => return proba,
            }
        }
    }
}

/// Random forest: the distribution is the mean of the per-tree leaf distributions.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    n_features: usize,
    n_classes: usize,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let art: ForestArtifact = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        if art.n_features == 0 { return Err("n_features must be positive".into()); }
        if art.n_classes == 0 { return Err("n_classes must be positive".into()); }
        if art.trees.is_empty() { return Err("forest has no trees".into()); }
        let trees = art.trees.into_iter().enumerate()
            .map(|(i, t)| build_tree(t, art.n_features, art.n_classes).map_err(|e| format!("tree {i}: {e}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { n_features: art.n_features, n_classes: art.n_classes, trees })
    }

    pub fn n_trees(&self) -> usize { self.trees.len() }
}

fn build_tree(t: TreeArtifact, n_features: usize, n_classes: usize) -> Result<Tree, String> {
    let n = t.children_left.len();
    if n == 0 { return Err("no nodes".into()); }
    if t.children_right.len() != n || t.feature.len() != n || t.threshold.len() != n || t.value.len() != n {
        return Err("node arrays differ in length".into());
    }
    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        let (l, r) = (t.children_left[i], t.children_right[i]);
        if l == -1 && r == -1 {
            let counts = &t.value[i];
            if counts.len() != n_classes { return Err(format!("node {i}: leaf has {} classes, expected {n_classes}", counts.len())); }
            if counts.iter().any(|c| !c.is_finite() || *c < 0.0) { return Err(format!("node {i}: leaf values must be finite and non-negative")); }
            let total: f64 = counts.iter().sum();
            if total <= 0.0 { return Err(format!("node {i}: leaf is empty")); }
            nodes.push(Node::Leaf { proba: counts.iter().map(|c| c / total).collect() });
            continue;
        }
        // children always come after their parent, which also rules out cycles
        let child = |c: i64| -> Result<usize, String> {
            usize::try_from(c).ok().filter(|c| *c > i && *c < n).ok_or_else(|| format!("node {i}: bad child index {c}"))
        };
        let feature = usize::try_from(t.feature[i]).ok().filter(|f| *f < n_features)
            .ok_or_else(|| format!("node {i}: bad feature index {}", t.feature[i]))?;
        if !t.threshold[i].is_finite() { return Err(format!("node {i}: threshold is not finite")); }
        nodes.push(Node::Split { feature, threshold: t.threshold[i], left: child(l)?, right: child(r)? });
    }
    Ok(Tree { nodes })
}

impl Classifier for ForestClassifier {
    fn n_features(&self) -> usize { self.n_features }
    fn n_classes(&self) -> usize { self.n_classes }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        if features.len() != self.n_features {
            return Err(ClassifierError::Arity { expected: self.n_features, actual: features.len() });
        }
        let mut acc = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (a, p) in acc.iter_mut().zip(tree.leaf(features)) { *a += p; }
        }
        let n = self.trees.len() as f64;
        acc.iter_mut().for_each(|a| *a /= n);
        Ok(acc)
    }
}
