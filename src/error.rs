use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: String,
        found: String,
    },

    #[error("invalid shape in {context}: {detail}")]
    InvalidShape {
        context: &'static str,
        detail: String,
    },

    #[error("non-finite score {value} at ({row}, {col})")]
    NonFiniteScore { row: usize, col: usize, value: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("pair {index}: {source}")]
    InPair {
        index: usize,
        #[source]
        source: Box<MatchError>,
    },
}

impl MatchError {
    pub(crate) fn mismatch(
        context: &'static str,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        MatchError::DimensionMismatch {
            context,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn in_pair(self, index: usize) -> Self {
        MatchError::InPair {
            index,
            source: Box::new(self),
        }
    }

    pub(crate) fn shape(context: &'static str, detail: impl Into<String>) -> Self {
        MatchError::InvalidShape {
            context,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;

/// Checks that `n1 × n2` real counts are non-zero and fit inside a `rows × cols` buffer.
pub(crate) fn check_real_counts(
    context: &'static str,
    rows: usize,
    cols: usize,
    n1: usize,
    n2: usize,
) -> Result<()> {
    if n1 == 0 || n2 == 0 {
        return Err(MatchError::shape(
            context,
            format!("real node counts must be non-zero, got n1={n1}, n2={n2}"),
        ));
    }
    if n1 > rows || n2 > cols {
        return Err(MatchError::shape(
            context,
            format!("real counts n1={n1}, n2={n2} exceed matrix shape {rows}x{cols}"),
        ));
    }
    Ok(())
}
