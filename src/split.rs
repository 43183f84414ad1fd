use crate::data::Data;
use crate::error::CryosigError;
use crate::utils;
use log::debug;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// K-fold split of one cell type's population: K disjoint test folds whose
/// union is the full population, each approximately balanced in label
/// composition, plus the complementary training set for each fold.
///
/// Balancing uses iterative weighted sampling without replacement: at each
/// of the first K-1 steps every remaining cell is weighted by the empirical
/// frequency of the opposite label in the remaining pool, so minority-label
/// cells are drawn preferentially and every fold sees both labels even on
/// imbalanced populations. The last fold takes whatever remains.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FoldSplit {
    pub test_folds: Vec<Data>,
    pub train_sets: Vec<Data>,
    /// test-set cell indices per fold, relative to the input Data
    pub test_indices: Vec<Vec<usize>>,
}

impl FoldSplit {
    pub fn new(
        data: &Data,
        cell_type: &str,
        folds: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<FoldSplit, CryosigError> {
        if data.cell_len < folds {
            return Err(CryosigError::InvalidInput {
                cell_type: cell_type.to_string(),
                reason: format!("{} cells cannot be split into {} folds", data.cell_len, folds),
            });
        }

        let fold_size = data.cell_len / folds;
        let mut pool: Vec<usize> = (0..data.cell_len).collect();
        let mut test_indices: Vec<Vec<usize>> = Vec::with_capacity(folds);

        for fold in 0..folds - 1 {
            let n_affected = pool.iter().filter(|&&i| data.y[i] == 1).count() as f64;
            let n_unaffected = pool.iter().filter(|&&i| data.y[i] == 0).count() as f64;
            let remaining = pool.len() as f64;

            // weight of a cell = frequency of the opposite label in the pool
            let weights: Vec<f64> = pool
                .iter()
                .map(|&i| {
                    if data.y[i] == 1 {
                        n_unaffected / remaining
                    } else {
                        n_affected / remaining
                    }
                })
                .collect();

            let mut drawn = utils::weighted_sample_without_replacement(&pool, &weights, fold_size, rng);
            drawn.sort();
            debug!(
                "fold #{}: drew {} cells ({} affected)",
                fold + 1,
                drawn.len(),
                drawn.iter().filter(|&&i| data.y[i] == 1).count()
            );
            pool.retain(|i| !drawn.contains(i));
            test_indices.push(drawn);
        }

        // the final fold receives all remaining cells
        test_indices.push(pool);

        let test_folds: Vec<Data> = test_indices.iter().map(|i| data.subset(i.clone())).collect();

        let train_sets: Vec<Data> = test_indices
            .iter()
            .map(|test| {
                let complement: Vec<usize> =
                    (0..data.cell_len).filter(|i| !test.contains(i)).collect();
                data.subset(complement)
            })
            .collect();

        Ok(FoldSplit {
            test_folds,
            train_sets,
            test_indices,
        })
    }

    /// Train and test barcodes per fold, for reproducibility audits.
    pub fn get_ids(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.train_sets
            .iter()
            .zip(self.test_folds.iter())
            .map(|(train, test)| (train.cells.clone(), test.cells.clone()))
            .collect()
    }
}
