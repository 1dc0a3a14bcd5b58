//! Report renderers: plain text, Markdown and JSON.

use pricediff_core::{PricediffError, ReportFormat};
use pricediff_stats::{TrendOutcome, TrendSeries};
use unicode_width::UnicodeWidthStr;

use crate::report::{NO_PRE_PERIOD_WARNING, Report, TablePreview};

/// Turns a [`Report`] into a printable document.
pub trait ReportRenderer {
    fn render(&self, report: &Report) -> Result<String, PricediffError>;
}

/// Pick the renderer for a configured format.
pub fn renderer_for(format: ReportFormat, wrap_width: usize) -> Box<dyn ReportRenderer> {
    match format {
        ReportFormat::Text => Box::new(TextRenderer::new(wrap_width)),
        ReportFormat::Markdown => Box::new(MarkdownRenderer),
        ReportFormat::Json => Box::new(JsonRenderer),
    }
}

fn group_name(treatment: bool) -> &'static str {
    if treatment { "treatment" } else { "control" }
}

/// Rows of the pre-period trend table: date, group, mean, n.
fn trend_rows(series: &TrendSeries) -> Vec<Vec<String>> {
    series
        .points
        .iter()
        .map(|p| {
            vec![
                p.date.to_string(),
                group_name(p.treatment).to_string(),
                format!("{:.2}", p.mean_outcome),
                p.count.to_string(),
            ]
        })
        .collect()
}

fn trend_header(series: &TrendSeries) -> Vec<String> {
    vec![
        "date".to_string(),
        "group".to_string(),
        format!("avg {}", series.outcome),
        "n".to_string(),
    ]
}

/// Terminal-friendly text, wrapped to a fixed width.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    width: usize,
}

impl TextRenderer {
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    fn heading(&self, out: &mut String, text: &str) {
        out.push('\n');
        out.push_str(text);
        out.push('\n');
        out.push_str(&"-".repeat(UnicodeWidthStr::width(text)));
        out.push('\n');
    }

    fn paragraph(&self, out: &mut String, text: &str) {
        out.push_str(&textwrap::fill(text, self.width));
        out.push('\n');
    }

    fn bullet(&self, out: &mut String, text: &str) {
        let options = textwrap::Options::new(self.width)
            .initial_indent("  - ")
            .subsequent_indent("    ");
        out.push_str(&textwrap::fill(text, options));
        out.push('\n');
    }

    fn preview(&self, out: &mut String, preview: &TablePreview) {
        out.push_str(&aligned_table(&preview.columns, &preview.rows));
        if preview.total_rows > preview.rows.len() {
            out.push_str(&format!(
                "({} of {} rows shown)\n",
                preview.rows.len(),
                preview.total_rows
            ));
        }
    }
}

impl ReportRenderer for TextRenderer {
    fn render(&self, report: &Report) -> Result<String, PricediffError> {
        let mut out = String::new();
        out.push_str(&report.title);
        out.push('\n');
        out.push_str(&"=".repeat(UnicodeWidthStr::width(report.title.as_str())));
        out.push('\n');
        self.paragraph(&mut out, &report.intro);

        self.heading(&mut out, "1. Your data");
        self.preview(&mut out, &report.preview);
        out.push('\n');
        for entry in &report.glossary {
            self.bullet(&mut out, &format!("{}: {}", entry.column, entry.meaning));
        }

        self.heading(&mut out, "2. Difference-in-Differences model");
        self.paragraph(&mut out, &format!("Regression formula: {}", report.formula));
        out.push('\n');
        out.push_str(&report.summary);

        self.heading(&mut out, "3. Interpretation");
        for p in &report.interpretation.paragraphs {
            out.push_str(&p.heading);
            out.push('\n');
            self.bullet(&mut out, &p.interval);
            self.paragraph(&mut out, &p.body);
            out.push('\n');
        }
        self.paragraph(&mut out, &report.interpretation.verdict);

        self.heading(&mut out, "4. Parallel trends (pre-treatment)");
        self.paragraph(&mut out, &report.trend.intro);
        self.paragraph(
            &mut out,
            &format!("Intervention date: {}", report.trend.intervention_date),
        );
        match &report.trend.outcome {
            TrendOutcome::Empty { .. } => {
                self.paragraph(&mut out, &format!("Warning: {NO_PRE_PERIOD_WARNING}"));
            }
            TrendOutcome::Series(series) => {
                out.push('\n');
                out.push_str(&aligned_table(&trend_header(series), &trend_rows(series)));
                out.push('\n');
                for line in &report.trend.guidance {
                    self.bullet(&mut out, line);
                }
            }
        }

        let other_warnings: Vec<&String> = report
            .warnings
            .iter()
            .filter(|w| w.as_str() != NO_PRE_PERIOD_WARNING)
            .collect();
        if !other_warnings.is_empty() {
            self.heading(&mut out, "Warnings");
            for w in other_warnings {
                self.bullet(&mut out, w);
            }
        }

        out.push('\n');
        out.push_str(&"-".repeat(self.width.min(80)));
        out.push('\n');
        self.paragraph(&mut out, &report.closing);
        Ok(out)
    }
}

/// Left-aligned columns padded by display width.
fn aligned_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.as_str().width()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.as_str().width());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| {
                let pad = w.saturating_sub(cell.as_str().width());
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(header);
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&format!("{}\n", rule.join("  ")));
    for row in rows {
        out.push_str(&line(row));
    }
    out
}

/// GitHub-flavored Markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

fn md_escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}

fn md_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let head: Vec<String> = header.iter().map(|h| md_escape(h)).collect();
    out.push_str(&format!("| {} |\n", head.join(" | ")));
    out.push_str(&format!("|{}\n", " --- |".repeat(header.len())));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| md_escape(c)).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

impl ReportRenderer for MarkdownRenderer {
    fn render(&self, report: &Report) -> Result<String, PricediffError> {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n{}\n\n", report.title, report.intro));

        out.push_str("## 1. Your data\n\n");
        out.push_str(&md_table(&report.preview.columns, &report.preview.rows));
        if report.preview.total_rows > report.preview.rows.len() {
            out.push_str(&format!(
                "\n_{} of {} rows shown._\n",
                report.preview.rows.len(),
                report.preview.total_rows
            ));
        }
        out.push('\n');
        for entry in &report.glossary {
            out.push_str(&format!("- **{}**: {}\n", entry.column, entry.meaning));
        }

        out.push_str("\n## 2. Difference-in-Differences model\n\n");
        out.push_str(&format!(
            "**Using this regression formula**: `{}`\n\n",
            report.formula
        ));
        out.push_str(&format!("```text\n{}```\n", report.summary));

        out.push_str("\n## 3. Interpretation\n\n");
        for p in &report.interpretation.paragraphs {
            out.push_str(&format!("**{}**\n\n- {}\n\n{}\n\n", p.heading, p.interval, p.body));
        }
        out.push_str(&format!("> {}\n", report.interpretation.verdict));

        out.push_str("\n## 4. Parallel trends (pre-treatment)\n\n");
        out.push_str(&format!(
            "{}\n\nIntervention date: `{}`\n\n",
            report.trend.intro, report.trend.intervention_date
        ));
        match &report.trend.outcome {
            TrendOutcome::Empty { .. } => {
                out.push_str(&format!("> **Warning:** {NO_PRE_PERIOD_WARNING}\n"));
            }
            TrendOutcome::Series(series) => {
                out.push_str(&md_table(&trend_header(series), &trend_rows(series)));
                out.push('\n');
                for line in &report.trend.guidance {
                    out.push_str(&format!("- {line}\n"));
                }
            }
        }

        let other_warnings: Vec<&String> = report
            .warnings
            .iter()
            .filter(|w| w.as_str() != NO_PRE_PERIOD_WARNING)
            .collect();
        if !other_warnings.is_empty() {
            out.push_str("\n## Warnings\n\n");
            for w in other_warnings {
                out.push_str(&format!("- {w}\n"));
            }
        }

        out.push_str(&format!("\n---\n\n{}\n", report.closing));
        Ok(out)
    }
}

/// Machine-readable report.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn render(&self, report: &Report) -> Result<String, PricediffError> {
        let mut json = serde_json::to_string_pretty(report)?;
        json.push('\n');
        Ok(json)
    }
}
