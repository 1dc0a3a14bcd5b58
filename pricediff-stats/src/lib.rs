//! # pricediff Stats
//!
//! Difference-in-Differences estimation for pricing experiments: the OLS
//! fit, the pre-period trend inspector, the regression summary table, and
//! the plain-language interpretation of the coefficients.

pub mod did;
pub mod interpret;
pub mod ols;
pub mod summary;
pub mod trend;

// Re-export commonly used types at the crate root.
pub use did::{
    CellCounts, CellMeans, ConfidenceInterval, DidAnalyzer, DidResult, FitStatistics, Term,
    TermEstimate, formula,
};
pub use interpret::{Interpretation, Interpreter, NarrativeStyle, TermParagraph};
pub use summary::RegressionSummary;
pub use trend::{TrendInspector, TrendOutcome, TrendPoint, TrendSeries};
