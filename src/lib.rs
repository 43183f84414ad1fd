#![allow(non_snake_case)]

pub mod data;
pub mod error;
pub mod experiment;
pub mod param;
pub mod score;
pub mod signature;
pub mod split;
pub mod utils;
pub mod validation;

use crate::data::Data;
use crate::error::CryosigError;
use crate::experiment::{CellScore, CellTypeResult, Experiment};
use crate::param::Param;
use crate::signature::Signature;
use crate::split::FoldSplit;
use chrono::Local;
use log::{error, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::error::Error;
use std::time::Instant;

/// Load the dataset named in `param` and run the full pipeline on it.
pub fn run(param: &Param) -> Result<Experiment, Box<dyn Error>> {
    let mut data = Data::new();
    data.set_classes(param.data.classes.clone());
    if !param.data.time_order.is_empty() {
        data.set_time_order(param.data.time_order.clone());
    }
    data.load_data(&param.data.X, &param.data.meta)?;
    info!("{:?}", data);

    run_on_data(&data, param)
}

/// Run the pipeline on an already loaded dataset: per cell type, a balanced
/// K-fold split, per-fold signature discovery with a random control, the
/// cross-fold metasignature, held-out time-scores and their validation, and
/// the score trend along the elapsed-time axis.
///
/// A cell type that cannot be processed is logged and skipped; the remaining
/// cell types still run.
pub fn run_on_data(data: &Data, param: &Param) -> Result<Experiment, Box<dyn Error>> {
    let start = Instant::now();
    let labeled = data.remove_unlabeled();
    let mut rng = ChaCha8Rng::seed_from_u64(param.general.seed);

    let mut results = Vec::new();
    for cell_type in labeled.cell_type_names() {
        let population = labeled.subset(labeled.cell_type_indices(&cell_type));
        info!("Processing cell type '{}' ({} cells)", cell_type, population.cell_len);
        match run_cell_type(&population, &cell_type, param, &mut rng) {
            Ok(result) => results.push(result),
            Err(e) => error!("Skipping cell type: {}", e),
        }
    }

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    Ok(Experiment {
        id: format!("cryosig_{}", timestamp),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp,
        parameters: param.clone(),
        gene_universe: data.genes.clone(),
        results,
        execution_time: start.elapsed().as_secs_f64(),
    })
}

/// Pipeline for one cell type. `data` holds that cell type's labeled cells
/// only. Each cell's exported score comes from the fold in which it was held
/// out, so no cell is ever scored by a signature trained on itself.
fn run_cell_type(
    data: &Data,
    cell_type: &str,
    param: &Param,
    rng: &mut ChaCha8Rng,
) -> Result<CellTypeResult, CryosigError> {
    let folds = param.split.folds;
    let split = FoldSplit::new(data, cell_type, folds, rng)?;

    let mut signatures = Vec::with_capacity(folds);
    for fold in 0..folds {
        signatures.push(Signature::discover(
            &split.train_sets[fold],
            cell_type,
            fold,
            param.signature.top_n,
            param.general.thread_number,
            rng,
        )?);
    }

    let metasignature = signature::metasignature(&signatures);
    info!(
        "Metasignature for '{}': {} genes shared by all {} folds",
        cell_type,
        metasignature.len(),
        folds
    );

    let mut validations = Vec::with_capacity(2 * folds);
    let mut held_out_real = vec![0.0; data.cell_len];
    let mut held_out_random = vec![0.0; data.cell_len];

    for (fold, sig) in signatures.iter().enumerate() {
        // scores over the full cell-type population; the z-score reference is
        // the same for every fold
        let real = score::score_cells(data, &sig.real_entries());
        let random = score::score_cells(data, &sig.random_entries());

        let test = &split.test_indices[fold];
        let test_y: Vec<u8> = test.iter().map(|&i| data.y[i]).collect();
        let test_real: Vec<f64> = test.iter().map(|&i| real.scores[i]).collect();
        let test_random: Vec<f64> = test.iter().map(|&i| random.scores[i]).collect();

        validations.push(validation::validate_fold(
            &test_real,
            &test_y,
            cell_type,
            fold,
            false,
            param.validation.threshold,
        ));
        validations.push(validation::validate_fold(
            &test_random,
            &test_y,
            cell_type,
            fold,
            true,
            param.validation.threshold,
        ));

        for &i in test {
            held_out_real[i] = real.scores[i];
            held_out_random[i] = random.scores[i];
        }
    }

    let time_trends = validation::time_trend(cell_type, &data.time_order, &data.time_points, &held_out_real);

    let scores = (0..data.cell_len)
        .map(|i| CellScore {
            barcode: data.cells[i].clone(),
            time_point: data.time_points[i].clone(),
            label: data.y[i],
            score: held_out_real[i],
            random_score: held_out_random[i],
        })
        .collect();

    Ok(CellTypeResult {
        cell_type: cell_type.to_string(),
        fold_ids: split.get_ids(),
        signatures,
        metasignature,
        scores,
        validations,
        time_trends,
    })
}
