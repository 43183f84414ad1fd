use crate::data::Data;
use crate::signature::SignatureEntry;
use crate::utils;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-cell time-scores for one (population, signature) pair.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ScoreOutcome {
    /// one scalar per cell of the scored population, in cell order
    pub scores: Vec<f64>,
    /// signature genes absent from the scoring matrix, skipped by policy
    pub skipped_genes: usize,
}

/// Compute the time-score of every cell in `data` for one signature.
///
/// Genes are ranked by decreasing |logFC| (ties broken by gene name so the
/// result is invariant to the order entries are supplied in), and rank r of
/// L genes maps to weight `1 - (r - 1)/L`, carrying the sign of the
/// log-fold-change. Each gene's expression is standardised across the scored
/// population; a gene with zero standard deviation contributes nothing. The
/// score of a cell is the sum of signed weight times z-score.
///
/// Signature genes missing from the matrix are skipped and counted, never
/// fatal; control entries without a log-fold-change rank below all real
/// entries with a positive sign.
pub fn score_cells(data: &Data, entries: &[SignatureEntry]) -> ScoreOutcome {
    let mut scores = vec![0.0; data.cell_len];
    if entries.is_empty() {
        return ScoreOutcome { scores, skipped_genes: 0 };
    }

    let gene_index: HashMap<&str, usize> = data
        .genes
        .iter()
        .enumerate()
        .map(|(i, g)| (g.as_str(), i))
        .collect();

    // rank over the full signature, before dropping absent genes, so weights
    // do not depend on the scoring matrix
    let mut ranked: Vec<&SignatureEntry> = entries.iter().collect();
    ranked.sort_by(|a, b| {
        let fc_a = a.log_fc.map(f64::abs).unwrap_or(0.0);
        let fc_b = b.log_fc.map(f64::abs).unwrap_or(0.0);
        fc_b.partial_cmp(&fc_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.gene.cmp(&b.gene))
    });

    let length = ranked.len() as f64;
    let mut skipped_genes = 0;

    for (rank0, entry) in ranked.iter().enumerate() {
        let gene = match gene_index.get(entry.gene.as_str()) {
            Some(&g) => g,
            None => {
                skipped_genes += 1;
                continue;
            }
        };

        let weight = 1.0 - rank0 as f64 / length;
        let signed_weight = if entry.log_fc.unwrap_or(0.0) < 0.0 {
            -weight
        } else {
            weight
        };

        let values = data.gene_values(gene);
        let (mean, std) = utils::mean_and_std(&values);
        if std == 0.0 {
            // constant gene carries no information for this population
            continue;
        }

        for (cell, score) in scores.iter_mut().enumerate() {
            *score += signed_weight * (data.value(cell, gene) - mean) / std;
        }
    }

    if skipped_genes > 0 {
        warn!(
            "{} of {} signature genes are absent from the scoring matrix and were skipped",
            skipped_genes,
            entries.len()
        );
    }

    ScoreOutcome { scores, skipped_genes }
}
