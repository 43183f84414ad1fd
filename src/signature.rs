use crate::data::Data;
use crate::error::CryosigError;
use crate::utils;
use log::info;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One gene of a signature. Real entries carry the signed log-fold-change
/// and BH-adjusted p-value of the differential-expression test; random
/// control entries carry neither.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignatureEntry {
    pub gene: String,
    pub log_fc: Option<f64>,
    pub p_adj: Option<f64>,
    pub is_random: bool,
}

/// Ranked gene signature discovered on one training fold, together with its
/// same-length random control: `entries` holds the top_n real genes ordered
/// by ascending adjusted p-value (ties by descending |logFC|), followed by
/// top_n genes drawn uniformly without replacement from the gene universe.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Signature {
    pub cell_type: String,
    pub fold: usize,
    pub entries: Vec<SignatureEntry>,
}

impl Signature {
    /// Run the per-gene two-group test on a training fold and build the
    /// signature plus its random control.
    pub fn discover(
        train: &Data,
        cell_type: &str,
        fold: usize,
        top_n: usize,
        thread_number: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Signature, CryosigError> {
        let affected: Vec<usize> = (0..train.cell_len).filter(|&i| train.y[i] == 1).collect();
        let unaffected: Vec<usize> = (0..train.cell_len).filter(|&i| train.y[i] == 0).collect();

        if affected.is_empty() || unaffected.is_empty() {
            return Err(CryosigError::InsufficientData {
                cell_type: cell_type.to_string(),
                fold,
                reason: format!(
                    "{} affected / {} unaffected cells in training set",
                    affected.len(),
                    unaffected.len()
                ),
            });
        }

        if train.gene_len < top_n {
            return Err(CryosigError::InsufficientData {
                cell_type: cell_type.to_string(),
                fold,
                reason: format!(
                    "{} genes in the matrix cannot fill a signature of {}",
                    train.gene_len, top_n
                ),
            });
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_number)
            .build()
            .map_err(|e| CryosigError::InsufficientData {
                cell_type: cell_type.to_string(),
                fold,
                reason: format!("thread pool: {}", e),
            })?;

        let results: Vec<(f64, f64)> = pool.install(|| {
            (0..train.gene_len)
                .into_par_iter()
                .map(|gene| {
                    let class_0: Vec<f64> = unaffected.iter().map(|&i| train.value(i, gene)).collect();
                    let class_1: Vec<f64> = affected.iter().map(|&i| train.value(i, gene)).collect();
                    utils::welch_t_test(&class_0, &class_1)
                })
                .collect()
        });

        let pvalues: Vec<f64> = results.iter().map(|&(_, p)| p).collect();
        let adjusted = utils::adjust_pvalues_bh(&pvalues);

        let mut order: Vec<usize> = (0..train.gene_len).collect();
        order.sort_by(|&a, &b| {
            adjusted[a]
                .partial_cmp(&adjusted[b])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    results[b]
                        .0
                        .abs()
                        .partial_cmp(&results[a].0.abs())
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.cmp(&b))
        });

        let mut entries: Vec<SignatureEntry> = order
            .iter()
            .take(top_n)
            .map(|&gene| SignatureEntry {
                gene: train.genes[gene].clone(),
                log_fc: Some(results[gene].0),
                p_adj: Some(adjusted[gene]),
                is_random: false,
            })
            .collect();

        // uniform draw over the full gene universe; overlap with the real
        // signature is allowed
        let control = rand::seq::index::sample(rng, train.gene_len, top_n);
        entries.extend(control.iter().map(|gene| SignatureEntry {
            gene: train.genes[gene].clone(),
            log_fc: None,
            p_adj: None,
            is_random: true,
        }));

        info!(
            "Signature for '{}' fold #{}: {} real + {} random genes",
            cell_type,
            fold + 1,
            top_n,
            top_n
        );

        Ok(Signature {
            cell_type: cell_type.to_string(),
            fold,
            entries,
        })
    }

    pub fn real_entries(&self) -> Vec<SignatureEntry> {
        self.entries.iter().filter(|e| !e.is_random).cloned().collect()
    }

    pub fn random_entries(&self) -> Vec<SignatureEntry> {
        self.entries.iter().filter(|e| e.is_random).cloned().collect()
    }

    pub fn real_genes(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|e| !e.is_random)
            .map(|e| e.gene.clone())
            .collect()
    }
}

/// Intersection of the per-fold real gene sets: the stabilized signature for
/// one cell type. A pure set operation; an empty intersection is a valid
/// outcome (the signature did not replicate across folds), not an error.
pub fn metasignature(signatures: &[Signature]) -> Vec<String> {
    let mut iter = signatures.iter();
    let mut intersection = match iter.next() {
        Some(first) => first.real_genes(),
        None => return Vec::new(),
    };
    for signature in iter {
        let genes = signature.real_genes();
        intersection = intersection.intersection(&genes).cloned().collect();
    }
    intersection.into_iter().collect()
}
