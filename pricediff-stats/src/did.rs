//! Difference-in-Differences (DiD) estimator.
//!
//! Fits `y = α + β₁·treatment + β₂·post + δ·(treatment×post) + ε` by OLS,
//! where δ is the DiD estimate: the change in the treatment group's outcome
//! after the intervention, net of the control group's change.
//!
//! For a 2×2 design δ equals
//! `(Ȳ_treat,post − Ȳ_treat,pre) − (Ȳ_ctrl,post − Ȳ_ctrl,pre)`; the cell means
//! are reported alongside the regression so the identity can be checked.

use nalgebra::{DMatrix, DVector};
use pricediff_core::config::AnalysisConfig;
use pricediff_core::data::{DataTable, DidFrame, SchemaOptions};
use pricediff_core::FitError;
use serde::{Deserialize, Serialize};

use crate::ols::{OlsCoefficient, OlsFit, fit_ols};

/// The four terms of the DiD regression, in design-column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Intercept,
    Treatment,
    Post,
    Interaction,
}

impl Term {
    pub const ALL: [Term; 4] = [Term::Intercept, Term::Treatment, Term::Post, Term::Interaction];

    /// Name used in the regression output.
    pub fn label(&self) -> &'static str {
        match self {
            Term::Intercept => "Intercept",
            Term::Treatment => "treatment",
            Term::Post => "post",
            Term::Interaction => "treatment:post",
        }
    }

    fn index(&self) -> usize {
        match self {
            Term::Intercept => 0,
            Term::Treatment => 1,
            Term::Post => 2,
            Term::Interaction => 3,
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Two-sided confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

impl ConfidenceInterval {
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Sentinel used wherever a number is not available.
pub const NOT_AVAILABLE: &str = "N/A";

/// Estimate of one term. Every field is `None` when the term was not estimable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermEstimate {
    pub term: Term,
    pub estimate: Option<f64>,
    pub std_error: Option<f64>,
    pub t_stat: Option<f64>,
    pub p_value: Option<f64>,
    pub conf_int: Option<ConfidenceInterval>,
}

impl TermEstimate {
    fn from_ols(term: Term, coefficient: Option<&OlsCoefficient>) -> Self {
        match coefficient {
            Some(c) => Self {
                term,
                estimate: Some(c.estimate),
                std_error: c.std_error,
                t_stat: c.t_stat,
                p_value: c.p_value,
                conf_int: c.conf_int.map(|(low, high)| ConfidenceInterval { low, high }),
            },
            None => Self {
                term,
                estimate: None,
                std_error: None,
                t_stat: None,
                p_value: None,
                conf_int: None,
            },
        }
    }

    pub fn is_estimable(&self) -> bool {
        self.estimate.is_some()
    }

    /// `[low, high]` to two decimals, or `[N/A, N/A]`.
    pub fn format_ci(&self) -> String {
        match self.conf_int {
            Some(ci) => format!("[{:.2}, {:.2}]", ci.low, ci.high),
            None => format!("[{NOT_AVAILABLE}, {NOT_AVAILABLE}]"),
        }
    }

    /// Point estimate to two decimals, or the sentinel.
    pub fn format_estimate(&self) -> String {
        match self.estimate {
            Some(v) => format!("{v:.2}"),
            None => NOT_AVAILABLE.to_string(),
        }
    }
}

/// Mean outcome in each treatment × period cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMeans {
    pub control_pre: Option<f64>,
    pub control_post: Option<f64>,
    pub treated_pre: Option<f64>,
    pub treated_post: Option<f64>,
    pub counts: CellCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCounts {
    pub control_pre: usize,
    pub control_post: usize,
    pub treated_pre: usize,
    pub treated_post: usize,
}

impl CellMeans {
    fn from_frame(frame: &DidFrame) -> Self {
        let mut sums = [0.0_f64; 4];
        let mut counts = [0usize; 4];
        for obs in frame.observations() {
            let cell = usize::from(obs.treatment) * 2 + usize::from(obs.post);
            sums[cell] += obs.outcome;
            counts[cell] += 1;
        }
        let mean = |i: usize| (counts[i] > 0).then(|| sums[i] / counts[i] as f64);
        Self {
            control_pre: mean(0),
            control_post: mean(1),
            treated_pre: mean(2),
            treated_post: mean(3),
            counts: CellCounts {
                control_pre: counts[0],
                control_post: counts[1],
                treated_pre: counts[2],
                treated_post: counts[3],
            },
        }
    }

    /// `(Ȳ_T,post − Ȳ_T,pre) − (Ȳ_C,post − Ȳ_C,pre)` when all four cells are populated.
    pub fn difference_in_differences(&self) -> Option<f64> {
        Some(
            (self.treated_post? - self.treated_pre?) - (self.control_post? - self.control_pre?),
        )
    }
}

/// Whole-model statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    pub n_obs: usize,
    pub df_model: usize,
    pub df_resid: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_pvalue: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub rss: f64,
    /// Residuals are at rounding level, so no p-values were computed.
    #[serde(default)]
    pub perfect_fit: bool,
}

impl From<&OlsFit> for FitStatistics {
    fn from(fit: &OlsFit) -> Self {
        Self {
            n_obs: fit.n_obs,
            df_model: fit.df_model,
            df_resid: fit.df_resid,
            r_squared: fit.r_squared,
            adj_r_squared: fit.adj_r_squared,
            f_statistic: fit.f_statistic,
            f_pvalue: fit.f_pvalue,
            log_likelihood: fit.log_likelihood,
            aic: fit.aic,
            bic: fit.bic,
            rss: fit.rss,
            perfect_fit: fit.perfect_fit,
        }
    }
}

/// Result of a DiD fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidResult {
    pub outcome: String,
    pub confidence_level: f64,
    /// One estimate per [`Term`], in [`Term::ALL`] order.
    pub terms: Vec<TermEstimate>,
    pub statistics: FitStatistics,
    pub cell_means: CellMeans,
    /// Rows left out because their outcome was missing.
    pub dropped_rows: usize,
}

impl DidResult {
    pub fn term(&self, term: Term) -> &TermEstimate {
        &self.terms[term.index()]
    }

    pub fn intercept(&self) -> &TermEstimate {
        self.term(Term::Intercept)
    }

    pub fn treatment(&self) -> &TermEstimate {
        self.term(Term::Treatment)
    }

    pub fn post(&self) -> &TermEstimate {
        self.term(Term::Post)
    }

    /// The treatment×post coefficient: the causal estimate.
    pub fn did(&self) -> &TermEstimate {
        self.term(Term::Interaction)
    }

    /// Terms that could not be estimated.
    pub fn unestimable_terms(&self) -> Vec<Term> {
        self.terms
            .iter()
            .filter(|t| !t.is_estimable())
            .map(|t| t.term)
            .collect()
    }

    pub fn formula(&self) -> String {
        formula(&self.outcome)
    }
}

/// Model formula in Wilkinson notation.
pub fn formula(outcome: &str) -> String {
    format!("{outcome} ~ treatment + post + treatment:post")
}

/// Fits the DiD regression.
#[derive(Debug, Clone)]
pub struct DidAnalyzer {
    confidence_level: f64,
    schema: SchemaOptions,
}

impl Default for DidAnalyzer {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            schema: SchemaOptions::default(),
        }
    }
}

impl DidAnalyzer {
    pub fn new(confidence_level: f64) -> Result<Self, FitError> {
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(FitError::computation(format!(
                "confidence level {confidence_level} is not in (0, 1)"
            )));
        }
        Ok(Self {
            confidence_level,
            schema: SchemaOptions::default(),
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, FitError> {
        Ok(Self::new(config.confidence_level)?.with_schema(SchemaOptions::from(config)))
    }

    pub fn with_schema(mut self, schema: SchemaOptions) -> Self {
        self.schema = schema;
        self
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    pub fn schema(&self) -> &SchemaOptions {
        &self.schema
    }

    /// Validate `table`, project it onto `outcome`, and fit.
    pub fn fit(&self, table: &DataTable, outcome: &str) -> Result<DidResult, FitError> {
        let frame = DidFrame::from_table(table, outcome, &self.schema)?;
        self.fit_frame(&frame)
    }

    /// Fit an already validated frame.
    pub fn fit_frame(&self, frame: &DidFrame) -> Result<DidResult, FitError> {
        let n = frame.len();
        let mut x_data = Vec::with_capacity(n * 4);
        let mut y_data = Vec::with_capacity(n);
        for obs in frame.observations() {
            let d = f64::from(u8::from(obs.treatment));
            let p = f64::from(u8::from(obs.post));
            x_data.extend_from_slice(&[1.0, d, p, d * p]);
            y_data.push(obs.outcome);
        }
        let x = DMatrix::from_row_slice(n, 4, &x_data);
        let y = DVector::from_vec(y_data);

        let fit = fit_ols(&x, &y, self.confidence_level)?;
        let terms: Vec<TermEstimate> = Term::ALL
            .iter()
            .map(|&term| TermEstimate::from_ols(term, fit.coefficients[term.index()].as_ref()))
            .collect();

        let result = DidResult {
            outcome: frame.outcome().to_string(),
            confidence_level: self.confidence_level,
            terms,
            statistics: FitStatistics::from(&fit),
            cell_means: CellMeans::from_frame(frame),
            dropped_rows: frame.dropped_rows(),
        };

        let unestimable = result.unestimable_terms();
        if !unestimable.is_empty() {
            tracing::warn!(
                outcome = %result.outcome,
                terms = ?unestimable.iter().map(Term::label).collect::<Vec<_>>(),
                "some terms are not estimable"
            );
        }
        tracing::info!(
            outcome = %result.outcome,
            n_obs = n,
            did = ?result.did().estimate,
            "DiD model fitted"
        );
        Ok(result)
    }
}
