use crate::utils;
use log::warn;
use serde::{Deserialize, Serialize};

/// One point of an ROC curve.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
}

/// Classification metrics of one (fold, signature-type) pair, treating the
/// time-score as a continuous classifier score.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ValidationResult {
    pub cell_type: String,
    pub fold: usize,
    pub is_random: bool,
    pub auc: f64,
    pub threshold: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub precision: f64,
    pub accuracy: f64,
    /// curve points ordered by ascending threshold: starts at the (1,1)
    /// anchor (everything positive) and ends at the (0,0) anchor
    pub roc: Vec<RocPoint>,
}

/// Score distribution of one elapsed-time category.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TimeTrend {
    pub cell_type: String,
    pub time_point: String,
    pub n: usize,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
}

/// Rank-based (Mann-Whitney) AUC with tie correction.
pub fn compute_auc(scores: &[f64], y: &[u8]) -> f64 {
    let n_pos = y.iter().filter(|&&l| l == 1).count() as f64;
    let n_neg = y.iter().filter(|&&l| l == 0).count() as f64;
    if n_pos == 0.0 || n_neg == 0.0 {
        return 0.5;
    }

    let mut combined: Vec<(f64, u8)> = scores.iter().cloned().zip(y.iter().cloned()).collect();
    combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    // average ranks over ties
    let mut ranks = vec![0.0; combined.len()];
    let mut i = 0;
    while i < combined.len() {
        let start = i;
        while i + 1 < combined.len() && combined[i].0 == combined[i + 1].0 {
            i += 1;
        }
        let rank = (start + i + 2) as f64 / 2.0;
        for r in ranks.iter_mut().take(i + 1).skip(start) {
            *r = rank;
        }
        i += 1;
    }

    let rank_sum_pos: f64 = combined
        .iter()
        .zip(ranks.iter())
        .filter(|((_, label), _)| *label == 1)
        .map(|(_, &rank)| rank)
        .sum();

    (rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

/// Evaluate the scores of one held-out fold: full ROC sweep (prediction rule
/// `score > threshold`), AUC, and confusion metrics at the operating point.
/// The operating threshold is the best Youden's J over all candidate
/// thresholds unless a fixed one is supplied.
pub fn validate_fold(
    scores: &[f64],
    y: &[u8],
    cell_type: &str,
    fold: usize,
    is_random: bool,
    fixed_threshold: Option<f64>,
) -> ValidationResult {
    let total_pos = y.iter().filter(|&&l| l == 1).count();
    let total_neg = y.iter().filter(|&&l| l == 0).count();

    if total_pos == 0 || total_neg == 0 {
        warn!(
            "fold #{} of '{}' has a single label ({} affected / {} unaffected); metrics are degenerate",
            fold + 1,
            cell_type,
            total_pos,
            total_neg
        );
        return ValidationResult {
            cell_type: cell_type.to_string(),
            fold,
            is_random,
            auc: 0.5,
            threshold: 0.0,
            sensitivity: 0.0,
            specificity: 0.0,
            precision: 0.0,
            accuracy: 0.0,
            roc: vec![RocPoint { fpr: 1.0, tpr: 1.0 }, RocPoint { fpr: 0.0, tpr: 0.0 }],
        };
    }

    let mut combined: Vec<(f64, u8)> = scores.iter().cloned().zip(y.iter().cloned()).collect();
    combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    // threshold below every score: everything classified positive
    let mut tp = total_pos;
    let mut fp = total_neg;
    let mut tn = 0usize;
    let mut fn_count = 0usize;

    let mut roc = vec![RocPoint { fpr: 1.0, tpr: 1.0 }];
    // (threshold, tp, fp, tn, fn)
    let mut candidates: Vec<(f64, usize, usize, usize, usize)> = Vec::new();

    let mut i = 0;
    while i < combined.len() {
        let threshold = combined[i].0;
        // move every sample scoring exactly `threshold` to the negative side
        while i < combined.len() && combined[i].0 == threshold {
            match combined[i].1 {
                1 => {
                    tp -= 1;
                    fn_count += 1;
                }
                0 => {
                    fp -= 1;
                    tn += 1;
                }
                _ => (),
            }
            i += 1;
        }
        roc.push(RocPoint {
            fpr: fp as f64 / total_neg as f64,
            tpr: tp as f64 / total_pos as f64,
        });
        candidates.push((threshold, tp, fp, tn, fn_count));
    }

    let chosen = match fixed_threshold {
        Some(t) => {
            let mut tp = 0;
            let mut fp = 0;
            let mut tn = 0;
            let mut fn_count = 0;
            for (&score, &label) in scores.iter().zip(y.iter()) {
                match label {
                    1 => {
                        if score > t {
                            tp += 1
                        } else {
                            fn_count += 1
                        }
                    }
                    0 => {
                        if score > t {
                            fp += 1
                        } else {
                            tn += 1
                        }
                    }
                    _ => (),
                }
            }
            (t, tp, fp, tn, fn_count)
        }
        None => {
            let mut best = candidates[0];
            let mut best_youden = f64::NEG_INFINITY;
            for &(threshold, tp, fp, tn, fn_count) in &candidates {
                let sensitivity = tp as f64 / total_pos as f64;
                let specificity = tn as f64 / total_neg as f64;
                let youden = sensitivity + specificity - 1.0;
                if youden > best_youden {
                    best_youden = youden;
                    best = (threshold, tp, fp, tn, fn_count);
                }
            }
            best
        }
    };

    let (threshold, tp, fp, tn, fn_count) = chosen;
    let sensitivity = if tp + fn_count > 0 { tp as f64 / (tp + fn_count) as f64 } else { 0.0 };
    let specificity = if fp + tn > 0 { tn as f64 / (fp + tn) as f64 } else { 0.0 };
    let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
    let accuracy = (tp + tn) as f64 / (tp + tn + fp + fn_count) as f64;

    ValidationResult {
        cell_type: cell_type.to_string(),
        fold,
        is_random,
        auc: compute_auc(scores, y),
        threshold,
        sensitivity,
        specificity,
        precision,
        accuracy,
        roc,
    }
}

/// Descriptive statistics of the score per elapsed-time category, in the
/// configured category order. The caller reads the monotony of the means off
/// this table; no single summary statistic is condensed out of it.
pub fn time_trend(
    cell_type: &str,
    time_order: &[String],
    time_points: &[String],
    scores: &[f64],
) -> Vec<TimeTrend> {
    let mut trends = Vec::new();
    for category in time_order {
        let mut group: Vec<f64> = time_points
            .iter()
            .zip(scores.iter())
            .filter(|(tp, _)| *tp == category)
            .map(|(_, &s)| s)
            .collect();
        if group.is_empty() {
            continue;
        }
        let (mean, std) = utils::mean_and_std(&group);
        let median = utils::median(&mut group);
        trends.push(TimeTrend {
            cell_type: cell_type.to_string(),
            time_point: category.clone(),
            n: group.len(),
            mean,
            std,
            median,
        });
    }
    trends
}
