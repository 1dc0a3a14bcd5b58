//! Ordinary least squares with classical (non-robust) inference.
//!
//! Columns that are linear combinations of earlier columns are detected with a
//! pivoted Gram–Schmidt pass and left out of the fit, so a rank-deficient
//! design yields `None` for the aliased coefficients instead of an error.

use nalgebra::{DMatrix, DVector};
use pricediff_core::FitError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

/// Relative residual norm below which a column counts as aliased.
const ALIAS_TOLERANCE: f64 = 1e-10;

/// Estimate and inference for one estimable column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OlsCoefficient {
    pub estimate: f64,
    /// `None` when there are no residual degrees of freedom.
    pub std_error: Option<f64>,
    pub t_stat: Option<f64>,
    pub p_value: Option<f64>,
    pub conf_int: Option<(f64, f64)>,
}

/// Result of an OLS fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsFit {
    /// One entry per design column; `None` marks an aliased column.
    pub coefficients: Vec<Option<OlsCoefficient>>,
    pub n_obs: usize,
    pub df_model: usize,
    pub df_resid: usize,
    pub rss: f64,
    pub tss: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_pvalue: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub confidence_level: f64,
    /// The fitted values reproduce `y` up to rounding; t, p and F carry no information.
    pub perfect_fit: bool,
}

impl OlsFit {
    /// Number of columns that entered the fit.
    pub fn rank(&self) -> usize {
        self.coefficients.iter().filter(|c| c.is_some()).count()
    }
}

/// Indices of columns that are not linear combinations of earlier ones.
pub fn estimable_columns(x: &DMatrix<f64>) -> Vec<usize> {
    let mut basis: Vec<DVector<f64>> = Vec::with_capacity(x.ncols());
    let mut kept = Vec::with_capacity(x.ncols());

    for j in 0..x.ncols() {
        let column = x.column(j).clone_owned();
        let norm0 = column.norm();
        if norm0 == 0.0 {
            continue;
        }
        let mut v = column;
        // Two projection passes keep the residual orthogonal in floating point.
        for _ in 0..2 {
            for q in &basis {
                let proj = q.dot(&v);
                v.axpy(-proj, q, 1.0);
            }
        }
        let norm = v.norm();
        if norm <= ALIAS_TOLERANCE * norm0 {
            continue;
        }
        basis.push(v / norm);
        kept.push(j);
    }
    kept
}

/// Fit `y = X·β + ε` by least squares.
///
/// `X` must include the constant column first; R² and the F test are
/// computed against the intercept-only model.
pub fn fit_ols(x: &DMatrix<f64>, y: &DVector<f64>, confidence_level: f64) -> Result<OlsFit, FitError> {
    let n = x.nrows();
    let p = x.ncols();
    if n == 0 || p == 0 {
        return Err(FitError::schema("design matrix must be non-empty"));
    }
    if y.len() != n {
        return Err(FitError::computation(format!(
            "y has {} rows, design has {n}",
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::schema("design and outcome must be finite"));
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(FitError::computation(format!(
            "confidence level {confidence_level} is not in (0, 1)"
        )));
    }

    let kept = estimable_columns(x);
    let k = kept.len();
    if k == 0 {
        return Err(FitError::computation("no estimable columns in design"));
    }
    if k < p {
        tracing::debug!(rank = k, columns = p, "design is rank deficient");
    }

    let xr = x.select_columns(kept.iter());
    let xtx = xr.transpose() * &xr;
    let xty = xr.transpose() * y;
    let chol = xtx
        .cholesky()
        .ok_or_else(|| FitError::computation("X'X is not positive definite"))?;
    let beta = chol.solve(&xty);
    let xtx_inv = chol.inverse();

    let resid = y - &xr * &beta;
    let rss = resid.norm_squared();
    let y_mean = y.mean();
    let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let df_resid = n - k;
    let df_model = k - 1;

    // Residuals at rounding level make se a noise ratio; pin it to zero instead.
    let perfect_fit = rss <= f64::EPSILON * tss.max(1.0) * n as f64;
    if perfect_fit && df_resid > 0 {
        tracing::debug!(rss, tss, "exact fit, inference is degenerate");
    }

    let sigma2 = (df_resid > 0).then(|| if perfect_fit { 0.0 } else { rss / df_resid as f64 });
    let t_dist = if df_resid > 0 {
        Some(
            StudentsT::new(0.0, 1.0, df_resid as f64)
                .map_err(|e| FitError::computation(format!("t distribution: {e}")))?,
        )
    } else {
        None
    };
    let t_crit = t_dist
        .as_ref()
        .map(|t| t.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0));

    let mut coefficients = vec![None; p];
    for (r, &col) in kept.iter().enumerate() {
        let estimate = beta[r];
        let std_error = sigma2.map(|s2| (s2 * xtx_inv[(r, r)]).max(0.0).sqrt());
        let t_stat = if perfect_fit {
            None
        } else {
            std_error.map(|se| estimate / se)
        };
        let p_value = match (t_stat, t_dist.as_ref()) {
            (Some(t), Some(dist)) => Some(two_sided_p(t, dist)),
            _ => None,
        };
        let conf_int = match (std_error, t_crit) {
            (Some(se), Some(q)) => Some((estimate - q * se, estimate + q * se)),
            _ => None,
        };
        coefficients[col] = Some(OlsCoefficient {
            estimate,
            std_error,
            t_stat,
            p_value,
            conf_int,
        });
    }

    let nf = n as f64;
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { f64::NAN };
    let adj_r_squared = if df_resid > 0 {
        1.0 - (nf - 1.0) / df_resid as f64 * (1.0 - r_squared)
    } else {
        f64::NAN
    };
    let f_statistic = if df_model > 0 && df_resid > 0 && !perfect_fit {
        ((tss - rss) / df_model as f64) / (rss / df_resid as f64)
    } else {
        f64::NAN
    };
    let f_pvalue = f_upper_tail(f_statistic, df_model, df_resid)?;
    let log_likelihood = -nf / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (rss / nf).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * k as f64;
    let bic = -2.0 * log_likelihood + k as f64 * nf.ln();

    tracing::debug!(n_obs = n, rank = k, rss, r_squared, "OLS fit complete");

    Ok(OlsFit {
        coefficients,
        n_obs: n,
        df_model,
        df_resid,
        rss,
        tss,
        r_squared,
        adj_r_squared,
        f_statistic,
        f_pvalue,
        log_likelihood,
        aic,
        bic,
        confidence_level,
        perfect_fit,
    })
}

fn two_sided_p(t: f64, dist: &StudentsT) -> f64 {
    if t.is_nan() {
        f64::NAN
    } else if t.is_infinite() {
        0.0
    } else {
        (2.0 * dist.cdf(-t.abs())).min(1.0)
    }
}

fn f_upper_tail(f: f64, df_model: usize, df_resid: usize) -> Result<f64, FitError> {
    if f.is_nan() || df_model == 0 || df_resid == 0 {
        return Ok(f64::NAN);
    }
    if f.is_infinite() {
        return Ok(0.0);
    }
    let dist = FisherSnedecor::new(df_model as f64, df_resid as f64)
        .map_err(|e| FitError::computation(format!("F distribution: {e}")))?;
    Ok(1.0 - dist.cdf(f.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn design(rows: &[[f64; 2]]) -> DMatrix<f64> {
        let data: Vec<f64> = rows.iter().flat_map(|r| [1.0, r[0], r[1]]).collect();
        DMatrix::from_row_slice(rows.len(), 3, &data)
    }

    #[test]
    fn test_simple_line_exact() {
        // y = 1 + 2x
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let y = DVector::from_vec(vec![1.0, 3.0, 5.0, 7.0]);
        let fit = fit_ols(&x, &y, 0.95).unwrap();
        let b0 = fit.coefficients[0].unwrap();
        let b1 = fit.coefficients[1].unwrap();
        assert_relative_eq!(b0.estimate, 1.0, epsilon = 1e-10);
        assert_relative_eq!(b1.estimate, 2.0, epsilon = 1e-10);
        assert_eq!(fit.df_resid, 2);
        assert_eq!(fit.df_model, 1);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert!(fit.rss < 1e-20);
        assert!(fit.perfect_fit);
        // No t ratio from rounding noise: se is pinned to zero and p is absent.
        assert_eq!(b1.std_error, Some(0.0));
        assert!(b1.t_stat.is_none());
        assert!(b1.p_value.is_none());
        assert_eq!(b1.conf_int, Some((b1.estimate, b1.estimate)));
        assert!(fit.f_pvalue.is_nan());
    }

    #[test]
    fn test_constant_outcome_is_perfect_fit() {
        let x = design(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]);
        let y = DVector::from_vec(vec![4.2; 5]);
        let fit = fit_ols(&x, &y, 0.95).unwrap();
        assert!(fit.perfect_fit);
        assert_eq!(fit.df_resid, 2);
        for c in fit.coefficients.iter().flatten() {
            assert!(c.p_value.is_none());
        }
    }

    #[test]
    fn test_known_standard_errors() {
        // x = 1..5, y = [2, 4, 5, 4, 5]: slope 0.6, intercept 2.2, se(slope) = sqrt(0.6/3 / 10)
        let x = DMatrix::from_row_slice(
            5,
            2,
            &[1.0, 1.0, 1.0, 2.0, 1.0, 3.0, 1.0, 4.0, 1.0, 5.0],
        );
        let y = DVector::from_vec(vec![2.0, 4.0, 5.0, 4.0, 5.0]);
        let fit = fit_ols(&x, &y, 0.95).unwrap();
        let slope = fit.coefficients[1].unwrap();
        assert_relative_eq!(slope.estimate, 0.6, epsilon = 1e-10);
        assert_relative_eq!(fit.coefficients[0].unwrap().estimate, 2.2, epsilon = 1e-10);
        assert_relative_eq!(fit.rss, 2.4, epsilon = 1e-10);
        let se = (2.4 / 3.0 / 10.0_f64).sqrt();
        assert_relative_eq!(slope.std_error.unwrap(), se, epsilon = 1e-10);
        assert_relative_eq!(fit.r_squared, 0.6, epsilon = 1e-10);
        let (lo, hi) = slope.conf_int.unwrap();
        assert!(lo < slope.estimate && slope.estimate < hi);
        // t_{0.975, 3} = 3.182446
        assert_relative_eq!(hi - slope.estimate, 3.182446 * se, epsilon = 1e-5);
        let p = slope.p_value.unwrap();
        assert!(p > 0.05 && p < 0.2, "p = {p}");
        assert!(!fit.perfect_fit);
        assert_relative_eq!(fit.f_pvalue, p, epsilon = 1e-6);
    }

    #[test]
    fn test_aliased_column_is_dropped() {
        // Third column duplicates the second.
        let x = DMatrix::from_row_slice(
            4,
            3,
            &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        );
        let y = DVector::from_vec(vec![1.0, 2.0, 1.5, 2.5]);
        let fit = fit_ols(&x, &y, 0.95).unwrap();
        assert!(fit.coefficients[0].is_some());
        assert!(fit.coefficients[1].is_some());
        assert!(fit.coefficients[2].is_none());
        assert_eq!(fit.rank(), 2);
        assert_eq!(fit.df_resid, 2);
    }

    #[test]
    fn test_zero_column_is_dropped() {
        let x = design(&[[0.0, 0.0], [1.0, 0.0], [0.0, 0.0], [1.0, 0.0]]);
        assert_eq!(estimable_columns(&x), vec![0, 1]);
    }

    #[test]
    fn test_saturated_fit_has_no_inference() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        let y = DVector::from_vec(vec![3.0, 5.0]);
        let fit = fit_ols(&x, &y, 0.95).unwrap();
        assert_eq!(fit.df_resid, 0);
        let b1 = fit.coefficients[1].unwrap();
        assert_relative_eq!(b1.estimate, 2.0, epsilon = 1e-12);
        assert!(b1.std_error.is_none());
        assert!(b1.conf_int.is_none());
        assert!(b1.p_value.is_none());
        assert!(fit.f_statistic.is_nan());
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let y = DVector::from_vec(vec![1.0, f64::NAN]);
        assert!(fit_ols(&x, &y, 0.95).is_err());
    }

    #[test]
    fn test_rejects_bad_confidence_level() {
        let x = DMatrix::from_row_slice(3, 1, &[1.0, 1.0, 1.0]);
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(fit_ols(&x, &y, 1.0).is_err());
    }

    #[test]
    fn test_information_criteria() {
        let x = DMatrix::from_row_slice(
            5,
            2,
            &[1.0, 1.0, 1.0, 2.0, 1.0, 3.0, 1.0, 4.0, 1.0, 5.0],
        );
        let y = DVector::from_vec(vec![2.0, 4.0, 5.0, 4.0, 5.0]);
        let fit = fit_ols(&x, &y, 0.95).unwrap();
        let n = 5.0_f64;
        let llf = -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (2.4 / n).ln() + 1.0);
        assert_relative_eq!(fit.log_likelihood, llf, epsilon = 1e-10);
        assert_relative_eq!(fit.aic, -2.0 * llf + 4.0, epsilon = 1e-10);
        assert_relative_eq!(fit.bic, -2.0 * llf + 2.0 * n.ln(), epsilon = 1e-10);
    }
}
