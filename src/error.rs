//! Crate-wide error type.
//!
//! Every failure is surfaced as a typed `SkyError`; nothing is retried
//! internally and no partial output is returned. Callers decide whether a
//! failure aborts the whole synthesis run.

/// Errors produced while building components or synthesizing maps.
#[derive(Debug, Clone, PartialEq)]
pub enum SkyError {
    /// A required component parameter was absent at build time.
    ConfigurationMissing {
        component: &'static str,
        field: &'static str,
    },
    /// A covariance inversion was numerically unstable at the requested
    /// tolerance.
    SingularMatrix { residual: f64 },
    /// A requested multipole or expansion order exceeds what the harmonic
    /// transform supports at this resolution.
    OutOfRange { requested: usize, supported: usize },
    /// An array length is inconsistent with the requested resolution or
    /// multipole range.
    DimensionMismatch { expected: usize, got: usize },
}

pub type SkyResult<T> = Result<T, SkyError>;

impl std::fmt::Display for SkyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkyError::ConfigurationMissing { component, field } => {
                write!(f, "{component} attribute '{field}' not set")
            }
            SkyError::SingularMatrix { residual } => {
                write!(
                    f,
                    "matrix inversion numerically unstable (residual {residual:e})"
                )
            }
            SkyError::OutOfRange {
                requested,
                supported,
            } => {
                write!(
                    f,
                    "requested multipole {requested} exceeds supported maximum {supported}"
                )
            }
            SkyError::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {expected}, got {got}")
            }
        }
    }
}

impl std::error::Error for SkyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_missing_field() {
        let err = SkyError::ConfigurationMissing {
            component: "Dust",
            field: "corr_len",
        };
        let msg = err.to_string();
        assert!(msg.contains("Dust"));
        assert!(msg.contains("corr_len"));
    }

    #[test]
    fn errors_compare_by_value() {
        assert_eq!(
            SkyError::DimensionMismatch {
                expected: 3,
                got: 2
            },
            SkyError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        );
        assert_ne!(
            SkyError::OutOfRange {
                requested: 10,
                supported: 5
            },
            SkyError::OutOfRange {
                requested: 11,
                supported: 5
            }
        );
    }
}
