use rand_chacha::ChaCha8Rng;
use rand::Rng;
use statrs::distribution::{ContinuousCDF, StudentsT};

pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Welch two-sample t-test between two groups of expression values.
///
/// Returns (delta, p_value) where delta is mean(class_1) - mean(class_0),
/// i.e. the signed log-fold-change when the inputs are log-normalised.
/// Degenerate inputs (a group of size < 2, zero variance in both groups)
/// yield p = 1.0 so the gene sinks to the bottom of the ranking instead of
/// aborting the whole test.
pub fn welch_t_test(class_0: &[f64], class_1: &[f64]) -> (f64, f64) {
    let n0 = class_0.len() as f64;
    let n1 = class_1.len() as f64;

    let mean_0 = class_0.iter().copied().sum::<f64>() / n0;
    let mean_1 = class_1.iter().copied().sum::<f64>() / n1;
    let delta = mean_1 - mean_0;

    if class_0.len() < 2 || class_1.len() < 2 {
        return (delta, 1.0);
    }

    let var0 = class_0.iter().map(|x| (x - mean_0).powi(2)).sum::<f64>() / (n0 - 1.0);
    let var1 = class_1.iter().map(|x| (x - mean_1).powi(2)).sum::<f64>() / (n1 - 1.0);

    let se2 = var0 / n0 + var1 / n1;
    if se2 <= 0.0 {
        return (delta, 1.0);
    }

    let t_stat = delta / se2.sqrt();

    // Welch-Satterthwaite degrees of freedom
    let df = se2.powi(2)
        / ((var0 / n0).powi(2) / (n0 - 1.0) + (var1 / n1).powi(2) / (n1 - 1.0));
    if !df.is_finite() || df < 1.0 {
        return (delta, 1.0);
    }

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => {
            let upper_tail = 1.0 - t_dist.cdf(t_stat.abs());
            (delta, 2.0 * upper_tail)
        }
        Err(_) => (delta, 1.0),
    }
}

/// Benjamini-Hochberg adjustment, returning adjusted p-values in the input
/// order: q_i = min(1, min over j>=i of p_(j) * n / j) for p sorted ascending.
pub fn adjust_pvalues_bh(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        pvalues[b]
            .partial_cmp(&pvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // walk from the largest p-value down, keeping a running minimum
    let mut adjusted = vec![0.0; n];
    let mut running_min = f64::MAX;
    for (step, &idx) in order.iter().enumerate() {
        let rank = n - step; // rank of this p-value in ascending order
        let q = pvalues[idx] * n as f64 / rank as f64;
        if q < running_min {
            running_min = q;
        }
        adjusted[idx] = running_min.min(1.0);
    }

    adjusted
}

/// Weighted sampling without replacement: draws `k` items from `pool` where
/// each item's selection probability is proportional to its weight. A pool
/// with zero total weight falls back to uniform draws.
pub fn weighted_sample_without_replacement(
    pool: &[usize],
    weights: &[f64],
    k: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<usize> {
    assert_eq!(pool.len(), weights.len());
    assert!(k <= pool.len());

    let mut remaining: Vec<(usize, f64)> =
        pool.iter().copied().zip(weights.iter().copied()).collect();
    let mut drawn = Vec::with_capacity(k);

    for _ in 0..k {
        let total: f64 = remaining.iter().map(|&(_, w)| w).sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            let mut pick = remaining.len() - 1;
            for (pos, &(_, w)) in remaining.iter().enumerate() {
                if target < w {
                    pick = pos;
                    break;
                }
                target -= w;
            }
            pick
        } else {
            rng.gen_range(0..remaining.len())
        };
        drawn.push(remaining.swap_remove(chosen).0);
    }

    drawn
}
