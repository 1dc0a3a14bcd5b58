//! Fixed-width regression table in the familiar "OLS Regression Results" layout.

use std::fmt::Write as _;

use crate::did::{DidResult, Term};

const WIDTH: usize = 80;

/// Text summary of a [`DidResult`].
#[derive(Debug, Clone)]
pub struct RegressionSummary<'a> {
    result: &'a DidResult,
}

impl<'a> RegressionSummary<'a> {
    pub fn new(result: &'a DidResult) -> Self {
        Self { result }
    }

    pub fn render(&self) -> String {
        let r = self.result;
        let s = &r.statistics;
        let mut out = String::new();

        let _ = writeln!(out, "{:^WIDTH$}", "OLS Regression Results");
        let _ = writeln!(out, "{}", "=".repeat(WIDTH));
        let header = [
            (("Dep. Variable:", r.outcome.clone()), ("R-squared:", stat(s.r_squared, 3))),
            (("Model:", "OLS".to_string()), ("Adj. R-squared:", stat(s.adj_r_squared, 3))),
            (
                ("Method:", "Least Squares".to_string()),
                ("F-statistic:", stat(s.f_statistic, 3)),
            ),
            (
                ("No. Observations:", s.n_obs.to_string()),
                ("Prob (F-statistic):", stat(s.f_pvalue, 3)),
            ),
            (
                ("Df Residuals:", s.df_resid.to_string()),
                ("Log-Likelihood:", stat(s.log_likelihood, 2)),
            ),
            (("Df Model:", s.df_model.to_string()), ("AIC:", stat(s.aic, 2))),
            (
                ("Covariance Type:", "nonrobust".to_string()),
                ("BIC:", stat(s.bic, 2)),
            ),
        ];
        for ((lk, lv), (rk, rv)) in header {
            let _ = writeln!(out, "{lk:<20}{lv:>18}  {rk:<20}{rv:>20}");
        }
        let _ = writeln!(out, "{}", "=".repeat(WIDTH));

        let (lo, hi) = ci_labels(r.confidence_level);
        let _ = writeln!(
            out,
            "{:<16}{:>10}{:>10}{:>10}{:>10}{:>12}{:>12}",
            "", "coef", "std err", "t", "P>|t|", lo, hi
        );
        let _ = writeln!(out, "{}", "-".repeat(WIDTH));
        for t in &r.terms {
            let row = match t.estimate {
                None => format!(
                    "{:<16}{:>10}{:>10}{:>10}{:>10}{:>12}{:>12}",
                    t.term.label(),
                    "N/A",
                    "N/A",
                    "N/A",
                    "N/A",
                    "N/A",
                    "N/A"
                ),
                Some(estimate) => {
                    let opt = |v: Option<f64>, p: usize| stat(v.unwrap_or(f64::NAN), p);
                    let (low, high) = t
                        .conf_int
                        .map(|ci| (ci.low, ci.high))
                        .unwrap_or((f64::NAN, f64::NAN));
                    format!(
                        "{:<16}{:>10}{:>10}{:>10}{:>10}{:>12}{:>12}",
                        t.term.label(),
                        stat(estimate, 4),
                        opt(t.std_error, 3),
                        opt(t.t_stat, 3),
                        opt(t.p_value, 3),
                        stat(low, 3),
                        stat(high, 3)
                    )
                }
            };
            let _ = writeln!(out, "{row}");
        }
        let _ = writeln!(out, "{}", "=".repeat(WIDTH));

        let _ = writeln!(out, "Notes:");
        let _ = writeln!(
            out,
            "[1] Standard Errors assume that the covariance matrix of the errors is correctly\nspecified."
        );
        let mut note = 2;
        let unestimable = r.unestimable_terms();
        if !unestimable.is_empty() {
            let names: Vec<&str> = unestimable.iter().map(Term::label).collect();
            let _ = writeln!(
                out,
                "[{note}] Not estimable (collinear with other terms): {}.",
                names.join(", ")
            );
            note += 1;
        }
        if s.df_resid == 0 {
            let _ = writeln!(
                out,
                "[{note}] No residual degrees of freedom; inference is unavailable."
            );
        } else if s.perfect_fit {
            let _ = writeln!(
                out,
                "[{note}] The model reproduces the data exactly; p-values are unavailable."
            );
        }
        out
    }
}

impl std::fmt::Display for RegressionSummary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Lower and upper CI column labels, e.g. `[0.025` and `0.975]`.
fn ci_labels(confidence_level: f64) -> (String, String) {
    let alpha = 1.0 - confidence_level;
    (
        format!("[{}", trim_float(alpha / 2.0)),
        format!("{}]", trim_float(1.0 - alpha / 2.0)),
    )
}

fn trim_float(v: f64) -> String {
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0');
    s.trim_end_matches('.').to_string()
}

/// Formats a statistic with `precision` decimals; large or tiny magnitudes go scientific.
fn stat(v: f64, precision: usize) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = v.abs();
    if magnitude != 0.0 && (magnitude >= 1e6 || magnitude < 1e-4) {
        format!("{v:.2e}")
    } else {
        format!("{v:.precision$}")
    }
}
