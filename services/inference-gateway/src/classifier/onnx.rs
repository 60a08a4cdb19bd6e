use std::path::Path;
use tract_onnx::prelude::*;
use crate::error::{ClassifierError, StartupError};
use super::{check_distribution, Classifier};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// ONNX export of the classifier, run with tract.
///
/// The last graph output must be the `[1, n_classes]` probability tensor
/// (exporters emit `label` first and `probabilities` second).
pub struct OnnxClassifier {
    plan: Plan,
    n_features: usize,
    n_classes: usize,
}

impl OnnxClassifier {
    pub fn load(path: &Path, n_features: usize) -> Result<Self, StartupError> {
        let bad = |e: anyhow::Error| StartupError::malformed(path, e);
        let plan = tract_onnx::onnx()
            .model_for_path(path).map_err(bad)?
            .with_input_fact(0, f32::fact([1, n_features]).into()).map_err(bad)?
            .into_optimized().map_err(bad)?
            .into_runnable().map_err(bad)?;
        let mut this = Self { plan, n_features, n_classes: 0 };
        // warmup doubles as output shape discovery
        let warm = this.run(&vec![0.0; n_features]).map_err(|e| StartupError::malformed(path, e))?;
        check_distribution(&warm).map_err(|reason| StartupError::malformed(path, reason))?;
        this.n_classes = warm.len();
        Ok(this)
    }

    fn run(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        let runtime = |e: anyhow::Error| ClassifierError::Runtime(e.to_string());
        let input: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let tensor = Tensor::from_shape(&[1, self.n_features], &input).map_err(runtime)?;
        let outputs = self.plan.run(tvec!(tensor.into())).map_err(runtime)?;
        let probs = outputs.last().ok_or_else(|| ClassifierError::Runtime("model has no outputs".into()))?;
        let view = probs.to_array_view::<f32>().map_err(runtime)?;
        Ok(view.iter().map(|p| *p as f64).collect())
    }
}

impl Classifier for OnnxClassifier {
    fn n_features(&self) -> usize { self.n_features }
    fn n_classes(&self) -> usize { self.n_classes }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        if features.len() != self.n_features {
            return Err(ClassifierError::Arity { expected: self.n_features, actual: features.len() });
        }
        self.run(features)
    }
}
