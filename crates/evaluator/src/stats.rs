//! Significance testing: chi-square independence and multiple-testing corrections.

use crate::error::EvaluatorError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const MAX_ITERATIONS: usize = 500;
const EPSILON: f64 = 1e-14;
const FLOAT_MIN: f64 = 1e-300;

/// Result of a chi-square test of independence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareTest {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
}

/// Chi-square test of independence on a contingency table.
///
/// All-zero rows and columns are dropped first. Yates' continuity correction is
/// applied when one degree of freedom remains. A table that collapses below
/// 2x2 carries no evidence and yields `statistic = 0, p = 1`.
pub fn chi_square_independence<const R: usize, const C: usize>(table: &[[u64; C]; R]) -> ChiSquareTest {
    let rows: Vec<usize> = (0..R).filter(|&i| table[i].iter().any(|&v| v > 0)).collect();
    let cols: Vec<usize> = (0..C).filter(|&j| rows.iter().any(|&i| table[i][j] > 0)).collect();

    if rows.len() < 2 || cols.len() < 2 {
        return ChiSquareTest {
            statistic: 0.0,
            p_value: 1.0,
            degrees_of_freedom: 0,
        };
    }

    let row_totals: Vec<f64> = rows
        .iter()
        .map(|&i| cols.iter().map(|&j| table[i][j] as f64).sum())
        .collect();
    let col_totals: Vec<f64> = cols
        .iter()
        .map(|&j| rows.iter().map(|&i| table[i][j] as f64).sum())
        .collect();
    let total: f64 = row_totals.iter().sum();
    let dof = (rows.len() - 1) * (cols.len() - 1);

    let mut statistic = 0.0;
    for (ri, &i) in rows.iter().enumerate() {
        for (ci, &j) in cols.iter().enumerate() {
            let expected = row_totals[ri] * col_totals[ci] / total;
            let mut diff = (table[i][j] as f64 - expected).abs();
            if dof == 1 {
                diff = (diff - 0.5).max(0.0);
            }
            statistic += diff * diff / expected;
        }
    }

    ChiSquareTest {
        statistic,
        p_value: chi_square_survival(statistic, dof),
        degrees_of_freedom: dof,
    }
}

/// `P(X >= x)` for a chi-square variable with `dof` degrees of freedom.
pub fn chi_square_survival(x: f64, dof: usize) -> f64 {
    if dof == 0 || x <= 0.0 {
        return 1.0;
    }
    regularized_gamma_q(dof as f64 / 2.0, x / 2.0).clamp(0.0, 1.0)
}

/// Upper regularized incomplete gamma function `Q(a, x)`, for `a > 0`.
pub fn regularized_gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        1.0 - gamma_series(a, x)
    } else {
        gamma_continued_fraction(a, x)
    }
}

/// Lower regularized gamma `P(a, x)` by its power series.
fn gamma_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut term = 1.0 / a;
    let mut sum = term;
    for _ in 0..MAX_ITERATIONS {
        ap += 1.0;
        term *= x / ap;
        sum += term;
        if term.abs() < sum.abs() * EPSILON {
            break;
        }
    }
    sum * (a * x.ln() - x - ln_gamma(a)).exp()
}

/// `Q(a, x)` by Lentz's continued fraction.
fn gamma_continued_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FLOAT_MIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..MAX_ITERATIONS {
        let n = i as f64;
        let an = -n * (n - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FLOAT_MIN {
            d = FLOAT_MIN;
        }
        c = b + an / c;
        if c.abs() < FLOAT_MIN {
            c = FLOAT_MIN;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    (a * x.ln() - x - ln_gamma(a)).exp() * h
}

/// Lanczos approximation (g = 7), valid for `x >= 0.5`.
pub fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    let x = x - 1.0;
    let mut series = COEFFICIENTS[0];
    for (i, coefficient) in COEFFICIENTS.iter().enumerate().skip(1) {
        series += coefficient / (x + i as f64);
    }
    let t = x + G + 0.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// Adjusted p-values and rejection flags, in the caller's original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedPValues {
    pub adjusted: Vec<f64>,
    pub significant: Vec<bool>,
}

impl CorrectedPValues {
    pub fn n_significant(&self) -> usize {
        self.significant.iter().filter(|&&s| s).count()
    }
}

fn check_inputs(p_values: &[f64], alpha: f64) -> Result<(), EvaluatorError> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(EvaluatorError::InvalidAlpha(alpha));
    }
    if let Some(&p) = p_values.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(EvaluatorError::InvalidPValue(p));
    }
    Ok(())
}

/// Bonferroni: `adjusted = min(p * n, 1)`, significant when `adjusted < alpha`.
pub fn bonferroni(p_values: &[f64], alpha: f64) -> Result<CorrectedPValues, EvaluatorError> {
    check_inputs(p_values, alpha)?;
    let n = p_values.len() as f64;
    let adjusted: Vec<f64> = p_values.iter().map(|p| (p * n).min(1.0)).collect();
    let significant = adjusted.iter().map(|&q| q < alpha).collect();
    Ok(CorrectedPValues { adjusted, significant })
}

/// Benjamini-Hochberg step-up procedure.
///
/// q-values are `min(p_(i) * n / i, q_(i+1))` from the largest p downwards.
/// Every hypothesis ranked at or below the largest `i` with
/// `p_(i) <= i * alpha / n` is significant. Equal p-values keep their input order.
pub fn benjamini_hochberg(p_values: &[f64], alpha: f64) -> Result<CorrectedPValues, EvaluatorError> {
    check_inputs(p_values, alpha)?;
    let n = p_values.len();
    let mut order: Vec<usize> = (0..n).collect();
    // stable: ties stay in index order
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let mut adjusted = vec![0.0; n];
    let mut running = 1.0_f64;
    for (rank0, &idx) in order.iter().enumerate().rev() {
        let rank = (rank0 + 1) as f64;
        running = running.min(p_values[idx] * n as f64 / rank).min(1.0);
        adjusted[idx] = running;
    }

    let mut significant = vec![false; n];
    let cutoff = order
        .iter()
        .enumerate()
        .rev()
        .find(|&(rank0, &idx)| p_values[idx] <= (rank0 + 1) as f64 * alpha / n as f64)
        .map(|(rank0, _)| rank0 + 1);
    if let Some(k) = cutoff {
        for &idx in &order[..k] {
            significant[idx] = true;
        }
    }

    Ok(CorrectedPValues { adjusted, significant })
}

/// Both corrections applied to the same family of tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionComparison {
    pub original_p_values: Vec<f64>,
    pub alpha: f64,
    pub n_tests: usize,
    pub bonferroni: CorrectedPValues,
    pub benjamini_hochberg: CorrectedPValues,
}

pub fn compare_corrections(p_values: &[f64], alpha: f64) -> Result<CorrectionComparison, EvaluatorError> {
    Ok(CorrectionComparison {
        original_p_values: p_values.to_vec(),
        alpha,
        n_tests: p_values.len(),
        bonferroni: bonferroni(p_values, alpha)?,
        benjamini_hochberg: benjamini_hochberg(p_values, alpha)?,
    })
}
