//! Report assembly.
//!
//! [`build_report`] depends only on its arguments: the table, the request
//! (outcome column and intervention date) and the configuration. Rendering
//! happens elsewhere.

use chrono::NaiveDate;
use pricediff_core::data::{DataTable, DidFrame, SchemaOptions, min_table_date, outcome_candidates};
use pricediff_core::{FitError, PricediffConfig};
use pricediff_stats::{
    DidAnalyzer, DidResult, Interpretation, Interpreter, NarrativeStyle, RegressionSummary,
    TrendInspector, TrendOutcome,
};
use serde::{Deserialize, Serialize};

/// Shown when no pre-period rows exist.
pub const NO_PRE_PERIOD_WARNING: &str =
    "No data before that intervention date, so we can't plot pre-treatment trends.";

/// What to analyze. Unset fields fall back to the data.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub outcome: Option<String>,
    pub intervention_date: Option<NaiveDate>,
}

/// First rows of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

/// One glossary entry: column name and meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub column: String,
    pub meaning: String,
}

/// Parallel-trends section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSection {
    pub intervention_date: NaiveDate,
    pub intro: String,
    pub outcome: TrendOutcome,
    /// How to read the chart; empty when there is no series.
    pub guidance: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub intro: String,
    pub preview: TablePreview,
    pub glossary: Vec<GlossaryEntry>,
    pub outcome: String,
    pub outcome_candidates: Vec<String>,
    pub formula: String,
    /// Fixed-width regression table.
    pub summary: String,
    pub result: DidResult,
    pub interpretation: Interpretation,
    pub trend: TrendSection,
    pub closing: String,
    pub warnings: Vec<String>,
}

/// Fit, interpret and inspect trends for one table.
pub fn build_report(
    table: &DataTable,
    request: &ReportRequest,
    config: &PricediffConfig,
) -> Result<Report, FitError> {
    let options = SchemaOptions::from(&config.analysis);
    let candidates = outcome_candidates(table, &options);
    let outcome = match &request.outcome {
        Some(outcome) => outcome.clone(),
        None => candidates.first().cloned().ok_or_else(|| {
            FitError::schema(format!(
                "no outcome column besides the structural ones (found: {})",
                table.columns().join(", ")
            ))
        })?,
    };

    let frame = DidFrame::from_table(table, &outcome, &options)?;
    let result = DidAnalyzer::from_config(&config.analysis)?.fit_frame(&frame)?;

    let style = NarrativeStyle::from_config(&config.report, &config.analysis);
    let interpretation = Interpreter::new(style.clone()).interpret(&result);
    let summary = RegressionSummary::new(&result).render();

    let intervention_date = request
        .intervention_date
        .or_else(|| min_table_date(table, &options))
        .or_else(|| frame.min_date())
        .ok_or_else(|| FitError::computation("no dates available for the intervention date"))?;
    let trend_outcome = TrendInspector::new().aggregate(&frame, intervention_date);

    let mut warnings = Vec::new();
    if frame.dropped_rows() > 0 {
        warnings.push(format!(
            "{} row(s) with a missing '{outcome}' value were left out.",
            frame.dropped_rows()
        ));
    }
    let unestimable = result.unestimable_terms();
    if !unestimable.is_empty() {
        let names: Vec<&str> = unestimable.iter().map(|t| t.label()).collect();
        warnings.push(format!(
            "Not estimable with this data: {}.",
            names.join(", ")
        ));
    }
    if result.statistics.df_resid == 0 {
        warnings.push(
            "No residual degrees of freedom: standard errors and confidence intervals are unavailable."
                .to_string(),
        );
    }
    if trend_outcome.is_empty() {
        warnings.push(NO_PRE_PERIOD_WARNING.to_string());
    }

    let guidance = if trend_outcome.is_empty() {
        Vec::new()
    } else {
        vec![
            "If these lines move roughly in parallel (though offset), the assumption is likely satisfied."
                .to_string(),
            format!(
                "If they diverge a lot before the {}, the DiD estimate might be biased.",
                style.subject
            ),
        ]
    };

    tracing::info!(
        outcome = %outcome,
        %intervention_date,
        warnings = warnings.len(),
        "report assembled"
    );

    Ok(Report {
        title: style.title.clone(),
        intro: intro_text(&style),
        preview: TablePreview {
            columns: table.columns().to_vec(),
            rows: table.head(config.analysis.preview_rows).to_vec(),
            total_rows: table.row_count(),
        },
        glossary: glossary(&style, &options, table, &outcome),
        formula: result.formula(),
        outcome,
        outcome_candidates: candidates,
        summary,
        result,
        interpretation,
        trend: TrendSection {
            intervention_date,
            intro: format!(
                "Before trusting these results, check that the {} and the {} were moving similarly \
                 before the {}. This is the \"parallel trends\" assumption.",
                style.treatment_label, style.control_label, style.subject
            ),
            outcome: trend_outcome,
            guidance,
        },
        closing: format!(
            "Think of 'treatment:post' as the crucial measure of whether the {} helped or hurt \
             compared to not making it.",
            style.subject
        ),
        warnings,
    })
}

fn intro_text(style: &NarrativeStyle) -> String {
    format!(
        "This report shows how the {subject} (the \"treatment\") affects an outcome such as sales \
         or revenue, compared to units that did not receive it (the \"control\").",
        subject = style.subject
    )
}

fn glossary(
    style: &NarrativeStyle,
    options: &SchemaOptions,
    table: &DataTable,
    outcome: &str,
) -> Vec<GlossaryEntry> {
    let mut entries = vec![
        GlossaryEntry {
            column: "date".into(),
            meaning: "the day of each observation".into(),
        },
        GlossaryEntry {
            column: "treatment".into(),
            meaning: format!(
                "1 if the row belongs to the {}, 0 if it belongs to the {}",
                style.treatment_label, style.control_label
            ),
        },
        GlossaryEntry {
            column: "post".into(),
            meaning: format!("1 if the date is after the {}, 0 if before", style.subject),
        },
    ];
    if table.has_column(&options.unit_column) {
        entries.push(GlossaryEntry {
            column: options.unit_column.clone(),
            meaning: "identifier of the unit (for example a product) observed".into(),
        });
    }
    entries.push(GlossaryEntry {
        column: outcome.to_string(),
        meaning: "the outcome being analyzed".into(),
    });
    entries
}
