//! Domain error types.

/// Top-level error type for mispricer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MispricerError {
    #[error("data source error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{code}: missing field {field}")]
    MissingField { code: String, field: &'static str },

    #[error("{code}: zero denominator in {field}")]
    ZeroDenominator { code: String, field: &'static str },

    #[error("{code}: non-finite value in {field}")]
    NonFinite { code: String, field: &'static str },

    #[error("insufficient data for {code}: have {observations} observations, need {minimum}")]
    InsufficientData {
        code: String,
        observations: usize,
        minimum: usize,
    },

    #[error("{code}: return series misaligned with benchmark ({actual} points vs {expected})")]
    MisalignedSeries {
        code: String,
        expected: usize,
        actual: usize,
    },

    #[error("benchmark {name} has zero variance, beta is undefined")]
    DegenerateBenchmark { name: String },

    #[error("degenerate weights: {reason}")]
    DegenerateWeights { reason: String },

    #[error("empty selection after {stage}")]
    EmptySelection { stage: String },

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MispricerError {
    fn from(err: std::io::Error) -> Self {
        MispricerError::Io(err.to_string())
    }
}

impl MispricerError {
    /// True for errors scoped to a single instrument; the batch continues
    /// without that instrument.
    pub fn is_per_instrument(&self) -> bool {
        matches!(
            self,
            MispricerError::MissingField { .. }
                | MispricerError::ZeroDenominator { .. }
                | MispricerError::NonFinite { .. }
                | MispricerError::InsufficientData { .. }
                | MispricerError::MisalignedSeries { .. }
        )
    }
}

/// An instrument removed from a batch, with the reason it was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedInstrument {
    pub code: String,
    pub reason: MispricerError,
}

impl From<&MispricerError> for std::process::ExitCode {
    fn from(err: &MispricerError) -> Self {
        let code: u8 = match err {
            MispricerError::Io(_) => 1,
            MispricerError::ConfigParse { .. }
            | MispricerError::ConfigMissing { .. }
            | MispricerError::ConfigInvalid { .. } => 2,
            MispricerError::Data { .. } => 3,
            MispricerError::MissingField { .. }
            | MispricerError::ZeroDenominator { .. }
            | MispricerError::NonFinite { .. }
            | MispricerError::InsufficientData { .. }
            | MispricerError::MisalignedSeries { .. }
            | MispricerError::EmptySelection { .. } => 5,
            MispricerError::DegenerateBenchmark { .. } | MispricerError::DegenerateWeights { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
