//! Console rendering of evaluation results.

use crate::evaluate::{EvaluationResult, StateEvaluation, VariantComparison};
use crate::labels::Label;
use crate::stats::CorrectionComparison;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use std::fmt::Display;

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "YES" } else { "NO" }
}

/// Summary, per-class scores and the confusion matrix of one evaluation.
pub fn render_evaluation(result: &EvaluationResult) -> String {
    let mut summary = table(vec!["Metric", "Value"]);
    summary
        .add_row(vec!["Predictions".to_string(), result.total_predictions.to_string()])
        .add_row(vec!["Correct".to_string(), result.correct_predictions.to_string()])
        .add_row(vec!["Accuracy".to_string(), pct(result.accuracy)])
        .add_row(vec!["Directional accuracy".to_string(), pct(result.directional_accuracy)])
        .add_row(vec!["Hold accuracy".to_string(), pct(result.hold_accuracy)])
        .add_row(vec!["Precision (weighted)".to_string(), format!("{:.4}", result.precision)])
        .add_row(vec!["Recall (weighted)".to_string(), format!("{:.4}", result.recall)])
        .add_row(vec!["F1 (weighted)".to_string(), format!("{:.4}", result.f1)])
        .add_row(vec![
            "Chi-square".to_string(),
            format!("{:.4} (dof {})", result.chi2_statistic, result.degrees_of_freedom),
        ])
        .add_row(vec!["p-value".to_string(), format!("{:.6}", result.p_value)])
        .add_row(vec![
            format!("Adjusted p-value ({})", result.correction),
            format!("{:.6}", result.adjusted_p_value),
        ])
        .add_row(vec![
            format!("Significant (alpha {})", result.alpha),
            yes_no(result.significant).to_string(),
        ]);

    let mut classes = table(vec!["Class", "Precision", "Recall", "F1", "Support"]);
    for scores in &result.class_scores {
        classes.add_row(vec![
            Cell::new(scores.label.name()),
            Cell::new(format!("{:.4}", scores.precision)),
            Cell::new(format!("{:.4}", scores.recall)),
            Cell::new(format!("{:.4}", scores.f1)),
            Cell::new(scores.support),
        ]);
    }

    let mut matrix = table(vec!["Actual \\ Predicted", "Sell", "Hold", "Buy"]);
    for label in Label::ALL {
        let row = result.confusion_matrix.counts[label.index()];
        matrix.add_row(vec![
            Cell::new(label.name()),
            Cell::new(row[0]),
            Cell::new(row[1]),
            Cell::new(row[2]),
        ]);
    }

    format!("{summary}\n\n{classes}\n\nConfusion matrix\n{matrix}")
}

/// Per-state results, at most `limit` rows.
pub fn render_states<K: Display>(states: &[StateEvaluation<K>], limit: usize) -> String {
    let mut out = table(vec!["State", "Samples", "Accuracy", "F1", "p-value", "Adjusted", "Significant"]);
    for s in states.iter().take(limit) {
        out.add_row(vec![
            s.state.to_string(),
            s.sample_count.to_string(),
            pct(s.accuracy),
            format!("{:.4}", s.f1),
            format!("{:.6}", s.p_value),
            format!("{:.6}", s.adjusted_p_value),
            yes_no(s.significant).to_string(),
        ]);
    }
    let significant = states.iter().filter(|s| s.significant).count();
    format!("{out}\n{significant} of {} states significant", states.len())
}

pub fn render_variants(rows: &[VariantComparison]) -> String {
    let mut out = table(vec!["Variant", "Accuracy", "Precision", "Recall", "F1", "p-value"]);
    for row in rows {
        out.add_row(vec![
            row.name.clone(),
            pct(row.accuracy),
            format!("{:.4}", row.precision),
            format!("{:.4}", row.recall),
            format!("{:.4}", row.f1),
            format!("{:.6}", row.p_value),
        ]);
    }
    out.to_string()
}

pub fn render_corrections(cmp: &CorrectionComparison) -> String {
    let mut out = table(vec!["Test", "p-value", "Bonferroni", "BH q-value"]);
    for (i, p) in cmp.original_p_values.iter().enumerate() {
        out.add_row(vec![
            (i + 1).to_string(),
            format!("{p:.6}"),
            mark(cmp.bonferroni.adjusted[i], cmp.bonferroni.significant[i]),
            mark(cmp.benjamini_hochberg.adjusted[i], cmp.benjamini_hochberg.significant[i]),
        ]);
    }
    format!(
        "{out}\nalpha {}: Bonferroni rejects {} of {}, Benjamini-Hochberg rejects {}",
        cmp.alpha,
        cmp.bonferroni.n_significant(),
        cmp.n_tests,
        cmp.benjamini_hochberg.n_significant(),
    )
}

fn mark(value: f64, significant: bool) -> String {
    if significant { format!("{value:.6} *") } else { format!("{value:.6}") }
}
