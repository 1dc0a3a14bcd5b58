//! Plain-language interpretation of a DiD fit.
//!
//! The logic (which sentence applies for which sign) is fixed; the wording
//! of the subject and the group names comes from a [`NarrativeStyle`].

use pricediff_core::config::{AnalysisConfig, ReportConfig};
use serde::{Deserialize, Serialize};

use crate::did::{DidResult, Term, TermEstimate};

/// Sentinel shown in prose when a term has no estimate.
pub const NOT_AVAILABLE_TEXT: &str = "not available";

/// Estimates within this fraction of the largest estimate are described as "no change".
const RELATIVE_ZERO: f64 = 1e-9;

/// Wording used by the interpretation templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeStyle {
    pub title: String,
    /// The intervention, e.g. "price change".
    pub subject: String,
    pub treatment_label: String,
    pub control_label: String,
    /// Threshold for the significance verdict.
    pub significance_level: f64,
}

impl Default for NarrativeStyle {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default(), &AnalysisConfig::default())
    }
}

impl NarrativeStyle {
    pub fn from_config(report: &ReportConfig, analysis: &AnalysisConfig) -> Self {
        Self {
            title: report.title.clone(),
            subject: report.subject.clone(),
            treatment_label: report.treatment_label.clone(),
            control_label: report.control_label.clone(),
            significance_level: analysis.significance_level,
        }
    }
}

/// One interpretation paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermParagraph {
    pub term: Term,
    /// e.g. `Treatment x Post (DiD) = 4.00`
    pub heading: String,
    /// e.g. `95% CI: [1.20, 6.80]`
    pub interval: String,
    pub body: String,
}

/// Paragraphs for the four terms plus the overall verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub paragraphs: Vec<TermParagraph>,
    pub verdict: String,
}

impl Interpretation {
    pub fn paragraph(&self, term: Term) -> Option<&TermParagraph> {
        self.paragraphs.iter().find(|p| p.term == term)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Positive,
    Negative,
    Zero,
}

impl Sign {
    fn of(value: f64, tolerance: f64) -> Self {
        if value > tolerance {
            Sign::Positive
        } else if value < -tolerance {
            Sign::Negative
        } else {
            Sign::Zero
        }
    }
}

/// Zero band for sign phrasing, scaled by the largest estimated coefficient.
fn zero_tolerance(result: &DidResult) -> f64 {
    let scale = result
        .terms
        .iter()
        .filter_map(|t| t.estimate)
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    RELATIVE_ZERO * scale
}

/// Turns a [`DidResult`] into prose using a [`NarrativeStyle`].
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    style: NarrativeStyle,
}

impl Interpreter {
    pub fn new(style: NarrativeStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &NarrativeStyle {
        &self.style
    }

    pub fn interpret(&self, result: &DidResult) -> Interpretation {
        let tol = zero_tolerance(result);
        let paragraphs = Term::ALL
            .iter()
            .map(|&term| self.paragraph(result, result.term(term), tol))
            .collect();
        Interpretation {
            paragraphs,
            verdict: self.verdict(result, tol),
        }
    }

    fn paragraph(&self, result: &DidResult, estimate: &TermEstimate, tol: f64) -> TermParagraph {
        let heading = format!(
            "{} = {}",
            display_name(estimate.term),
            estimate
                .estimate
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| NOT_AVAILABLE_TEXT.to_string())
        );
        let interval = format!(
            "{:.0}% CI: {}",
            result.confidence_level * 100.0,
            estimate.format_ci()
        );
        let body = match estimate.estimate {
            None => self.unavailable_body(estimate.term),
            Some(value) => match estimate.term {
                Term::Intercept => self.intercept_body(value, &result.outcome),
                Term::Treatment => self.treatment_body(value, tol, &result.outcome),
                Term::Post => self.post_body(value, tol, &result.outcome),
                Term::Interaction => self.interaction_body(value, tol, &result.outcome),
            },
        };
        TermParagraph {
            term: estimate.term,
            heading,
            interval,
            body,
        }
    }

    fn intercept_body(&self, value: f64, outcome: &str) -> String {
        let s = &self.style;
        format!(
            "This is the baseline level for the {control} before the {subject}. \
             On a typical day in the pre-period, the {control} averages around {value:.1} {outcome}.",
            control = s.control_label,
            subject = s.subject,
        )
    }

    fn treatment_body(&self, value: f64, tol: f64, outcome: &str) -> String {
        let s = &self.style;
        let lead = format!(
            "This is the pre-existing gap between groups before the {}.",
            s.subject
        );
        let detail = match Sign::of(value, tol) {
            Sign::Negative => format!(
                "The {treat} was lower than the {control} before the change, by about {:.2} {outcome}.",
                value.abs(),
                treat = s.treatment_label,
                control = s.control_label,
            ),
            Sign::Positive => format!(
                "The {treat} was higher than the {control} before the change, by about {value:.2} {outcome}.",
                treat = s.treatment_label,
                control = s.control_label,
            ),
            Sign::Zero => format!(
                "The {treat} and the {control} started at the same level before the change.",
                treat = s.treatment_label,
                control = s.control_label,
            ),
        };
        format!("{lead} {detail}")
    }

    fn post_body(&self, value: f64, tol: f64, outcome: &str) -> String {
        let s = &self.style;
        let movement = match Sign::of(value, tol) {
            Sign::Positive => format!("rose by about {value:.2}"),
            Sign::Negative => format!("fell by about {:.2}", value.abs()),
            Sign::Zero => "did not move".to_string(),
        };
        format!(
            "This is the common shift affecting both groups after the {subject} date, \
             independent of treatment. For the {control}, which did not get the change, {outcome} {movement}. \
             Think of it as general market movement affecting everyone in the post period.",
            subject = s.subject,
            control = s.control_label,
        )
    }

    fn interaction_body(&self, value: f64, tol: f64, outcome: &str) -> String {
        let s = &self.style;
        let lead = format!(
            "This is the extra change in {outcome} the {treat} experienced, above and beyond \
             the common shift captured by 'post'. It is the headline estimate of the effect of the {subject}.",
            treat = s.treatment_label,
            subject = s.subject,
        );
        let detail = match Sign::of(value, tol) {
            Sign::Positive => format!(
                "Positive: the {treat} improved more (or declined less) than the {control} after the {subject}.",
                treat = s.treatment_label,
                control = s.control_label,
                subject = s.subject,
            ),
            Sign::Negative => format!(
                "Negative: the {treat} declined more (or grew less) than the {control} after the {subject}.",
                treat = s.treatment_label,
                control = s.control_label,
                subject = s.subject,
            ),
            Sign::Zero => format!(
                "Zero: the {treat} changed by the same amount as the {control} after the {subject}.",
                treat = s.treatment_label,
                control = s.control_label,
                subject = s.subject,
            ),
        };
        format!("{lead} {detail}")
    }

    fn unavailable_body(&self, term: Term) -> String {
        let s = &self.style;
        let what = match term {
            Term::Intercept => format!("The baseline level for the {}", s.control_label),
            Term::Treatment => "The pre-existing gap between groups".to_string(),
            Term::Post => "The common shift after the change date".to_string(),
            Term::Interaction => format!("The effect of the {}", s.subject),
        };
        format!(
            "{what} is {NOT_AVAILABLE_TEXT}: it cannot be separated from the other terms with this data \
             (for example, every row belongs to the same group or period)."
        )
    }

    fn verdict(&self, result: &DidResult, tol: f64) -> String {
        let s = &self.style;
        let did = result.did();
        let outcome = &result.outcome;
        let Some(value) = did.estimate else {
            return format!(
                "In simpler terms: the treatment:post effect is {NOT_AVAILABLE_TEXT}, \
                 so this data cannot say whether the {} helped or hurt {outcome}.",
                s.subject
            );
        };
        let sign = Sign::of(value, tol);
        let Some(p) = did.p_value.filter(|p| !p.is_nan()) else {
            return self.untestable_verdict(result, value, sign);
        };
        let alpha = s.significance_level;
        if p >= alpha {
            return format!(
                "In simpler terms: treatment:post is not statistically distinguishable from zero \
                 (p = {p:.3} >= {alpha}). The data do not show a clear effect of the {subject} on {outcome}.",
                subject = s.subject,
            );
        }
        match sign {
            Sign::Negative => format!(
                "In simpler terms: treatment:post is significantly negative (p = {p:.3} < {alpha}). \
                 The {subject} likely reduced {outcome} more than if nothing had changed.",
                subject = s.subject,
            ),
            Sign::Positive => format!(
                "In simpler terms: treatment:post is significantly positive (p = {p:.3} < {alpha}). \
                 The {subject} is associated with a better {outcome} trajectory for the {treat} \
                 than for the {control}.",
                subject = s.subject,
                treat = s.treatment_label,
                control = s.control_label,
            ),
            Sign::Zero => format!(
                "In simpler terms: the treatment:post estimate is effectively zero at the scale of \
                 {outcome} (p = {p:.3} is not meaningful for a zero effect). The {subject} shows no \
                 difference between the {treat} and the {control}.",
                subject = s.subject,
                treat = s.treatment_label,
                control = s.control_label,
            ),
        }
    }

    /// Verdict when the DiD term has an estimate but no usable p-value.
    fn untestable_verdict(&self, result: &DidResult, value: f64, sign: Sign) -> String {
        let s = &self.style;
        let stats = &result.statistics;
        if stats.df_resid == 0 {
            return format!(
                "In simpler terms: the treatment:post estimate is {value:.2}, but there is not enough \
                 data left over to judge its statistical significance, so treat it as indicative only."
            );
        }
        if stats.perfect_fit {
            let shape = match sign {
                Sign::Zero => format!(
                    "The {treat} and the {control} moved by exactly the same amount after the {subject}.",
                    treat = s.treatment_label,
                    control = s.control_label,
                    subject = s.subject,
                ),
                _ => "Check whether the data were aggregated or simulated before relying on it.".to_string(),
            };
            return format!(
                "In simpler terms: the model reproduces every observation exactly, so there is no \
                 residual noise to test the treatment:post estimate of {value:.2} against. {shape}"
            );
        }
        format!(
            "In simpler terms: the treatment:post estimate is {value:.2}, but its p-value could not be \
             computed, so treat it as indicative only."
        )
    }
}

fn display_name(term: Term) -> &'static str {
    match term {
        Term::Intercept => "Intercept",
        Term::Treatment => "Treatment",
        Term::Post => "Post",
        Term::Interaction => "Treatment x Post (DiD)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::{CellMeans, ConfidenceInterval, DidAnalyzer, FitStatistics};
    use chrono::{Duration, NaiveDate};
    use pricediff_core::data::{DidFrame, Observation};

    fn term(term: Term, estimate: Option<f64>, p_value: Option<f64>) -> TermEstimate {
        TermEstimate {
            term,
            estimate,
            std_error: estimate.map(|_| 0.5),
            t_stat: None,
            p_value,
            conf_int: estimate.map(|v| ConfidenceInterval {
                low: v - 1.0,
                high: v + 1.0,
            }),
        }
    }

    fn result(values: [Option<f64>; 4], did_p: Option<f64>) -> DidResult {
        DidResult {
            outcome: "quantity_sold".into(),
            confidence_level: 0.95,
            terms: vec![
                term(Term::Intercept, values[0], Some(0.0)),
                term(Term::Treatment, values[1], Some(0.5)),
                term(Term::Post, values[2], Some(0.5)),
                term(Term::Interaction, values[3], did_p),
            ],
            statistics: FitStatistics {
                n_obs: 40,
                df_model: 3,
                df_resid: 36,
                r_squared: 0.5,
                adj_r_squared: 0.45,
                f_statistic: 12.0,
                f_pvalue: 0.001,
                log_likelihood: -50.0,
                aic: 108.0,
                bic: 114.0,
                rss: 10.0,
                perfect_fit: false,
            },
            cell_means: CellMeans::default(),
            dropped_rows: 0,
        }
    }

    #[test]
    fn test_positive_did_paragraph() {
        let r = result([Some(10.0), Some(-2.0), Some(2.0), Some(4.0)], Some(0.01));
        let text = Interpreter::default().interpret(&r);
        let did = text.paragraph(Term::Interaction).unwrap();
        assert_eq!(did.heading, "Treatment x Post (DiD) = 4.00");
        assert_eq!(did.interval, "95% CI: [3.00, 5.00]");
        assert!(did.body.contains("improved more (or declined less)"));
        assert!(text.verdict.contains("significantly positive"));
    }

    #[test]
    fn test_negative_did_paragraph() {
        let r = result([Some(10.0), Some(1.0), Some(2.0), Some(-3.0)], Some(0.001));
        let text = Interpreter::default().interpret(&r);
        let did = text.paragraph(Term::Interaction).unwrap();
        assert!(did.body.contains("declined more (or grew less)"));
        assert!(text.verdict.contains("significantly negative"));
    }

    #[test]
    fn test_treatment_sign_phrasing() {
        let lower = result([Some(10.0), Some(-2.0), Some(0.0), Some(1.0)], Some(0.5));
        let text = Interpreter::default().interpret(&lower);
        let body = &text.paragraph(Term::Treatment).unwrap().body;
        assert!(body.contains("was lower than the control group"));
        assert!(body.contains("by about 2.00 quantity_sold"));

        let higher = result([Some(10.0), Some(3.0), Some(0.0), Some(1.0)], Some(0.5));
        let text = Interpreter::default().interpret(&higher);
        assert!(text
            .paragraph(Term::Treatment)
            .unwrap()
            .body
            .contains("was higher than the control group"));
        assert!(text
            .paragraph(Term::Post)
            .unwrap()
            .body
            .contains("did not move"));
        assert!(text.verdict.contains("not statistically distinguishable"));
    }

    #[test]
    fn test_intercept_baseline() {
        let r = result([Some(10.04), Some(0.0), Some(0.0), Some(0.0)], Some(0.9));
        let text = Interpreter::default().interpret(&r);
        let p = text.paragraph(Term::Intercept).unwrap();
        assert_eq!(p.heading, "Intercept = 10.04");
        assert!(p.body.contains("averages around 10.0 quantity_sold"));
    }

    #[test]
    fn test_missing_terms_render_sentinel() {
        let r = result([Some(10.0), None, Some(1.0), None], None);
        let text = Interpreter::default().interpret(&r);
        let did = text.paragraph(Term::Interaction).unwrap();
        assert_eq!(did.heading, "Treatment x Post (DiD) = not available");
        assert_eq!(did.interval, "95% CI: [N/A, N/A]");
        assert!(did.body.contains("not available"));
        assert!(text.paragraph(Term::Treatment).unwrap().body.contains("not available"));
        assert!(text.verdict.contains("not available"));
    }

    #[test]
    fn test_no_p_value_verdict() {
        let r = result([Some(10.0), Some(-2.0), Some(2.0), Some(4.0)], None);
        let text = Interpreter::default().interpret(&r);
        assert!(text.verdict.contains("p-value could not be computed"));
        assert!(text.verdict.contains("indicative only"));
        assert!(!text.verdict.contains("not enough data"));
    }

    #[test]
    fn test_saturated_verdict() {
        let mut r = result([Some(10.0), Some(-2.0), Some(2.0), Some(4.0)], None);
        r.statistics.df_resid = 0;
        let text = Interpreter::default().interpret(&r);
        assert!(text.verdict.contains("not enough data left over"));
    }

    #[test]
    fn test_exact_fit_verdict() {
        let mut r = result([Some(10.0), Some(-2.0), Some(1.3), Some(0.0)], Some(f64::NAN));
        r.statistics.perfect_fit = true;
        let text = Interpreter::default().interpret(&r);
        assert!(text.verdict.contains("reproduces every observation exactly"));
        assert!(text.verdict.contains("moved by exactly the same amount"));
        assert!(!text.verdict.contains("not enough data"));
    }

    #[test]
    fn test_zero_effect_with_small_p_is_not_positive() {
        let r = result([Some(10.0), Some(-2.0), Some(1.3), Some(0.0)], Some(0.001));
        let text = Interpreter::default().interpret(&r);
        assert!(text.verdict.contains("effectively zero"));
        assert!(!text.verdict.contains("significantly positive"));
        assert!(!text.verdict.contains("significantly negative"));
        assert!(text.paragraph(Term::Interaction).unwrap().body.contains("Zero:"));
    }

    #[test]
    fn test_sign_tolerance_follows_estimate_scale() {
        // Tiny but real effects on a tiny outcome keep their sign.
        let tiny = result([Some(2e-9), Some(1e-9), Some(1e-9), Some(5e-10)], Some(0.01));
        let text = Interpreter::default().interpret(&tiny);
        assert!(text.paragraph(Term::Interaction).unwrap().body.contains("improved more"));
        assert!(text.verdict.contains("significantly positive"));

        // Rounding residue on a large outcome reads as no change.
        let large = result([Some(1e6), Some(5.0), Some(3.0), Some(1e-8)], Some(0.01));
        let text = Interpreter::default().interpret(&large);
        assert!(text.paragraph(Term::Interaction).unwrap().body.contains("Zero:"));
        assert!(text.verdict.contains("effectively zero"));
    }

    #[test]
    fn test_noise_free_parallel_trends_never_significant() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        for k in 0..400 {
            let base = k as f64 * 0.37;
            let mut rows = Vec::new();
            for day in 0..3 {
                let cells = [
                    (false, false, base),
                    (true, false, base - 2.0),
                    (false, true, base + 1.3),
                    (true, true, base - 0.7),
                ];
                for (treatment, post, outcome) in cells {
                    let offset = if post { 31 } else { 0 } + day;
                    rows.push(Observation {
                        date: start + Duration::days(offset),
                        treatment,
                        post,
                        outcome,
                        unit: None,
                    });
                }
            }
            let frame = DidFrame::from_observations("y", rows).unwrap();
            let fit = DidAnalyzer::default().fit_frame(&frame).unwrap();
            assert!(fit.statistics.perfect_fit, "base = {base}");
            let text = Interpreter::default().interpret(&fit);
            let body = &text.paragraph(Term::Interaction).unwrap().body;
            assert!(body.contains("Zero:"), "base = {base}: {body}");
            assert!(!text.verdict.contains("significantly"), "base = {base}: {}", text.verdict);
        }
    }

    #[test]
    fn test_custom_style() {
        let style = NarrativeStyle {
            title: "Discount study".into(),
            subject: "discount".into(),
            treatment_label: "discounted stores".into(),
            control_label: "regular stores".into(),
            significance_level: 0.1,
        };
        let r = result([Some(10.0), Some(-2.0), Some(2.0), Some(4.0)], Some(0.08));
        let text = Interpreter::new(style).interpret(&r);
        let did = &text.paragraph(Term::Interaction).unwrap().body;
        assert!(did.contains("the discounted stores improved more"));
        assert!(did.contains("after the discount"));
        // 0.08 < 0.1 under this style.
        assert!(text.verdict.contains("significantly positive"));
    }

    #[test]
    fn test_paragraph_order_matches_terms() {
        let r = result([Some(1.0), Some(1.0), Some(1.0), Some(1.0)], Some(0.5));
        let text = Interpreter::default().interpret(&r);
        let order: Vec<Term> = text.paragraphs.iter().map(|p| p.term).collect();
        assert_eq!(order, Term::ALL.to_vec());
    }
}
