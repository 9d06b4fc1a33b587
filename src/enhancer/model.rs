//! Model-backed enhancement with transparent statistical fallback

use std::collections::BTreeMap;
use std::sync::Arc;

use super::engine::{InferenceEngine, InferenceError, ModelInputs, Tensor};
use super::statistical::StatisticalFallback;
use crate::processing::{Normalizer, TimeLocationFeatures};
use crate::types::Forecast;

pub struct ModelBacked {
    engine: Arc<dyn InferenceEngine>,
    normalizer: Normalizer,
    fallback: StatisticalFallback,
}

impl std::fmt::Debug for ModelBacked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBacked")
            .field("engine", &self.engine.backend_name())
            .finish_non_exhaustive()
    }
}

impl ModelBacked {
    pub fn new(engine: Arc<dyn InferenceEngine>, fallback: StatisticalFallback) -> Self {
        Self {
            engine,
            normalizer: Normalizer::new(),
            fallback,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.engine.backend_name()
    }

    /// Run the engine; on any failure log at warn and use the statistical
    /// strategy instead.
    pub fn enhance(
        &self,
        forecast: &Forecast,
        features: &TimeLocationFeatures,
        variables: &[String],
    ) -> BTreeMap<String, Vec<f64>> {
        match self.infer(forecast, features, variables) {
            Ok(enhanced) => {
                tracing::debug!(
                    backend = self.engine.backend_name(),
                    variables = enhanced.len(),
                    samples = forecast.len(),
                    "model inference succeeded"
                );
                enhanced
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.engine.backend_name(),
                    error = %e,
                    "model inference failed, using statistical fallback"
                );
                self.fallback.enhance(forecast, features, variables)
            }
        }
    }

    fn infer(
        &self,
        forecast: &Forecast,
        features: &TimeLocationFeatures,
        variables: &[String],
    ) -> Result<BTreeMap<String, Vec<f64>>, InferenceError> {
        let mut columns = Vec::with_capacity(variables.len());
        for name in variables {
            let raw = forecast
                .values(name)
                .ok_or_else(|| InferenceError::MissingVariable(name.clone()))?;
            columns.push(self.normalizer.normalize(name, raw));
        }

        let inputs = ModelInputs {
            variables: Tensor::from_columns(&columns)?,
            auxiliary: Tensor::from_rows(&features.rows()),
            channels: variables.to_vec(),
        };

        let outputs = self.engine.run(&inputs)?;
        let first = outputs.into_iter().next().ok_or(InferenceError::NoOutput)?;

        let expected = (forecast.len(), variables.len());
        if first.shape() != expected {
            return Err(InferenceError::ShapeMismatch {
                expected,
                actual: first.shape(),
            });
        }
        if first.data().iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite);
        }

        let mut enhanced = BTreeMap::new();
        for (col, name) in variables.iter().enumerate() {
            let values = self.normalizer.denormalize(name, &first.column(col));
            if values.iter().any(|v| !v.is_finite()) {
                return Err(InferenceError::NonFinite);
            }
            enhanced.insert(name.clone(), values);
        }
        Ok(enhanced)
    }
}
