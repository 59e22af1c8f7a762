use thiserror::Error;

/// Reasons a least-squares fit is reported as not converged.
///
/// A fit that converged with large standard errors is a successful fit; every
/// variant here means the error vector could not be computed at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitFailure {
    #[error("iteration budget of {0} exhausted")]
    IterationLimit(usize),

    #[error("parameter covariance is singular")]
    SingularCovariance,

    #[error("parameter covariance is not positive semi-definite")]
    NotPositiveSemiDefinite,

    #[error("{points} samples cannot constrain {params} parameters")]
    Underdetermined { points: usize, params: usize },

    #[error("model produced a non-finite residual")]
    NonFiniteResidual,

    #[error("no step lowered the residual from the initial guess")]
    Stalled,
}

#[derive(Error, Debug)]
pub enum SpecFitError {
    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Directory traversal error: {0}")]
    WalkDirError(#[from] walkdir::Error),

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),

    #[error("Malformed numeric token {token:?} in {path} at line {line}")]
    ParseError {
        path: String,
        line: usize,
        token: String,
    },

    #[error("Model {model} expects a multiple of {block} parameters, got {got}")]
    InvalidParameterCount {
        model: String,
        block: usize,
        got: usize,
    },

    #[error("Fit did not converge: {0}")]
    FitDidNotConverge(FitFailure),

    #[error("No file matched the group key: {0}")]
    EmptyGroup(String),

    #[error("Length mismatch in {context}: {left} vs {right}")]
    DimensionMismatch {
        context: String,
        left: usize,
        right: usize,
    },

    #[error("Column {index} requested but only {available} columns were parsed")]
    MissingColumn { index: usize, available: usize },

    #[error("Path {path} matches several keys: {keys:?}")]
    AmbiguousKey { path: String, keys: Vec<String> },

    #[error("Operation requires at least one sample")]
    EmptySample,

    #[error("Invalid parameter bounds: {0}")]
    InvalidBounds(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid fit method: {0}")]
    InvalidFitMethod(String),

    #[error("No line-shape guess available for model {0}")]
    UnsupportedGuess(String),

    #[error("Sample spacing must be finite and non-zero, got {0}")]
    InvalidSpacing(f64),

    #[error("Invalid file glob: {0}")]
    GlobError(#[from] globset::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<FitFailure> for SpecFitError {
    fn from(failure: FitFailure) -> Self {
        SpecFitError::FitDidNotConverge(failure)
    }
}

impl PartialEq for SpecFitError {
    fn eq(&self, other: &Self) -> bool {
        use SpecFitError::*;
        match (self, other) {
            // not comparable: equal when the variant matches
            (IoError(_), IoError(_)) => true,
            (WalkDirError(_), WalkDirError(_)) => true,
            (GlobError(_), GlobError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (JsonError(_), JsonError(_)) => true,

            (Utf8PathError(a), Utf8PathError(b)) => a == b,
            (
                ParseError {
                    path: pa,
                    line: la,
                    token: ta,
                },
                ParseError {
                    path: pb,
                    line: lb,
                    token: tb,
                },
            ) => pa == pb && la == lb && ta == tb,
            (
                InvalidParameterCount {
                    model: ma,
                    block: ba,
                    got: ga,
                },
                InvalidParameterCount {
                    model: mb,
                    block: bb,
                    got: gb,
                },
            ) => ma == mb && ba == bb && ga == gb,
            (FitDidNotConverge(a), FitDidNotConverge(b)) => a == b,
            (EmptyGroup(a), EmptyGroup(b)) => a == b,
            (
                DimensionMismatch {
                    context: ca,
                    left: la,
                    right: ra,
                },
                DimensionMismatch {
                    context: cb,
                    left: lb,
                    right: rb,
                },
            ) => ca == cb && la == lb && ra == rb,
            (
                MissingColumn {
                    index: ia,
                    available: aa,
                },
                MissingColumn {
                    index: ib,
                    available: ab,
                },
            ) => ia == ib && aa == ab,
            (AmbiguousKey { path: pa, keys: ka }, AmbiguousKey { path: pb, keys: kb }) => {
                pa == pb && ka == kb
            }
            (EmptySample, EmptySample) => true,
            (InvalidBounds(a), InvalidBounds(b)) => a == b,
            (InvalidConfig(a), InvalidConfig(b)) => a == b,
            (InvalidFitMethod(a), InvalidFitMethod(b)) => a == b,
            (UnsupportedGuess(a), UnsupportedGuess(b)) => a == b,
            (InvalidSpacing(a), InvalidSpacing(b)) => a == b,

            _ => false,
        }
    }
}
