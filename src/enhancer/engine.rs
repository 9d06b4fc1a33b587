//! Black-box inference engine contract
//!
//! The learned model lives outside this crate. It receives the normalized
//! variable tensor plus the auxiliary time/location tensor and returns one or
//! more output tensors; only the first is read.

/// Dense row-major 2-D tensor (samples × channels).
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Tensor {
    /// Build from row-major data. Fails if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, InferenceError> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(InferenceError::ShapeMismatch {
                expected: (rows, cols),
                actual: (data.len(), 1),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Stack equal-length columns side by side.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self, InferenceError> {
        let rows = columns.first().map_or(0, Vec::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
            return Err(InferenceError::ShapeMismatch {
                expected: (rows, columns.len()),
                actual: (bad.len(), columns.len()),
            });
        }
        let data = (0..rows)
            .flat_map(|r| columns.iter().map(move |c| c[r]))
            .collect();
        Ok(Self {
            rows,
            cols: columns.len(),
            data,
        })
    }

    pub fn from_rows<const N: usize>(rows: &[[f64; N]]) -> Self {
        Self {
            rows: rows.len(),
            cols: N,
            data: rows.iter().flatten().copied().collect(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Copy out one column. Returns an empty vector for an out-of-range index.
    pub fn column(&self, col: usize) -> Vec<f64> {
        if col >= self.cols {
            return Vec::new();
        }
        self.data.iter().skip(col).step_by(self.cols).copied().collect()
    }
}

/// Inputs for one inference call.
#[derive(Debug, Clone)]
pub struct ModelInputs {
    /// Normalized variables, samples × configured variables
    pub variables: Tensor,
    /// Auxiliary features, samples × 6 (see `processing::AUX_FEATURE_NAMES`)
    pub auxiliary: Tensor,
    /// Channel names of `variables`, in column order
    pub channels: Vec<String>,
}

/// Inference failure. Never surfaced past the enhancer; it triggers the
/// statistical fallback.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference engine failed: {0}")]
    Engine(String),
    #[error("inference engine returned no output tensors")]
    NoOutput,
    #[error("output shape {actual:?} does not match expected {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("output contains non-finite values")]
    NonFinite,
    #[error("configured variable '{0}' is missing from the forecast")]
    MissingVariable(String),
}

/// Unified trait for inference backends.
///
/// Implementations block the calling thread; async callers run enhancement
/// on the blocking pool.
pub trait InferenceEngine: Send + Sync {
    /// Run the model on normalized inputs.
    fn run(&self, inputs: &ModelInputs) -> Result<Vec<Tensor>, InferenceError>;

    /// Get the backend name for logging
    fn backend_name(&self) -> &'static str;
}
