use cryosig::data::Data;
use cryosig::param::Param;
use cryosig::run_on_data;
use std::collections::HashMap;
use std::collections::HashSet;

/// Synthetic dataset with a strong planted up-shift on the first 8 genes of
/// affected cells, one third of cells affected, time categories cycling
/// through 0h/2h/8h.
fn synthetic_data(n_cells: usize, n_genes: usize) -> Data {
    let mut x: HashMap<(usize, usize), f64> = HashMap::new();
    let mut y: Vec<u8> = Vec::new();
    let time_order = vec!["0h".to_string(), "2h".to_string(), "8h".to_string()];
    let mut time_points = Vec::new();

    for cell in 0..n_cells {
        let label: u8 = if cell % 3 == 2 { 1 } else { 0 };
        y.push(label);
        time_points.push(time_order[cell % 3].clone());
        for gene in 0..n_genes {
            let mut value = ((cell * 7 + gene * 13) % 97) as f64 / 97.0;
            if label == 1 && gene < 8 {
                value += 3.0;
            }
            if value != 0.0 {
                x.insert((cell, gene), value);
            }
        }
    }

    Data {
        X: x,
        y,
        cells: (0..n_cells).map(|i| format!("CELL{:04}", i)).collect(),
        genes: (0..n_genes).map(|i| format!("GENE{:04}", i)).collect(),
        cell_types: vec!["T".to_string(); n_cells],
        time_points,
        time_order,
        classes: vec!["unaffected".to_string(), "affected".to_string()],
        gene_len: n_genes,
        cell_len: n_cells,
    }
}

fn pipeline_param() -> Param {
    let mut param = Param::default();
    param.split.folds = 3;
    param.signature.top_n = 10;
    param
}

#[test]
fn test_pipeline_recovers_planted_signal() {
    let data = synthetic_data(90, 50);
    let experiment = run_on_data(&data, &pipeline_param()).unwrap();

    assert_eq!(experiment.results.len(), 1);
    let result = &experiment.results[0];
    assert_eq!(result.cell_type, "T");
    assert_eq!(result.signatures.len(), 3, "one signature per fold");
    for signature in &result.signatures {
        assert_eq!(
            signature.entries.len(),
            20,
            "each signature holds top_n real plus top_n control entries"
        );
    }

    // the planted genes carry a shift of +3 on log-normalised values and must
    // survive the cross-fold intersection
    let metasignature: HashSet<&str> = result.metasignature.iter().map(String::as_str).collect();
    for gene in 0..8 {
        let name = format!("GENE{:04}", gene);
        assert!(
            metasignature.contains(name.as_str()),
            "planted gene {} missing from the metasignature {:?}",
            name,
            result.metasignature
        );
    }

    // the metasignature is contained in every fold's real gene set
    for signature in &result.signatures {
        let real = signature.real_genes();
        for gene in &result.metasignature {
            assert!(real.contains(gene), "metasignature gene {} absent from fold #{}", gene, signature.fold + 1);
        }
    }
}

#[test]
fn test_pipeline_validation_separates_real_from_random() {
    let data = synthetic_data(90, 50);
    let experiment = run_on_data(&data, &pipeline_param()).unwrap();
    let result = &experiment.results[0];

    let real: Vec<_> = result.validations.iter().filter(|v| !v.is_random).collect();
    let random: Vec<_> = result.validations.iter().filter(|v| v.is_random).collect();
    assert_eq!(real.len(), 3, "one real validation per fold");
    assert_eq!(random.len(), 3, "one random-control validation per fold");

    for v in &real {
        assert!(
            v.auc > 0.8,
            "the real signature should rank held-out affected cells clearly, fold #{} AUC {}",
            v.fold + 1,
            v.auc
        );
        assert!(v.roc.first().map(|p| p.fpr == 1.0 && p.tpr == 1.0).unwrap_or(false));
        assert!(v.roc.last().map(|p| p.fpr == 0.0 && p.tpr == 0.0).unwrap_or(false));
    }

    let mean = |vs: &[&cryosig::validation::ValidationResult]| {
        vs.iter().map(|v| v.auc).sum::<f64>() / vs.len() as f64
    };
    assert!(
        mean(&real) > mean(&random),
        "the real signature must dominate its uniform random control on average"
    );
}

#[test]
fn test_pipeline_scores_are_held_out_and_separate_labels() {
    let data = synthetic_data(90, 50);
    let experiment = run_on_data(&data, &pipeline_param()).unwrap();
    let result = &experiment.results[0];

    assert_eq!(result.scores.len(), 90, "every labeled cell carries exactly one held-out score");

    let affected: Vec<f64> = result.scores.iter().filter(|s| s.label == 1).map(|s| s.score).collect();
    let unaffected: Vec<f64> = result.scores.iter().filter(|s| s.label == 0).map(|s| s.score).collect();
    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    assert!(
        mean(&affected) > mean(&unaffected) + 1.0,
        "held-out time-scores must separate affected from unaffected cells"
    );
}

#[test]
fn test_pipeline_time_trend_follows_configured_order() {
    let data = synthetic_data(90, 50);
    let experiment = run_on_data(&data, &pipeline_param()).unwrap();
    let result = &experiment.results[0];

    let order: Vec<&str> = result.time_trends.iter().map(|t| t.time_point.as_str()).collect();
    assert_eq!(order, vec!["0h", "2h", "8h"], "trend rows follow the configured time order");
    for t in &result.time_trends {
        assert_eq!(t.n, 30, "each time category holds a third of the cells");
    }
    // affected cells all sit at 8h in this fixture, so the mean score must
    // rise along the time axis
    assert!(result.time_trends[2].mean > result.time_trends[0].mean);
}

#[test]
fn test_pipeline_fold_ids_partition_barcodes() {
    let data = synthetic_data(90, 50);
    let experiment = run_on_data(&data, &pipeline_param()).unwrap();
    let result = &experiment.results[0];

    assert_eq!(result.fold_ids.len(), 3);
    let mut all_test: Vec<&str> = result
        .fold_ids
        .iter()
        .flat_map(|(_, test)| test.iter().map(String::as_str))
        .collect();
    all_test.sort();
    let unique: HashSet<&&str> = all_test.iter().collect();
    assert_eq!(unique.len(), 90, "the test folds must partition the barcodes");

    for (train, test) in &result.fold_ids {
        let train: HashSet<&String> = train.iter().collect();
        let test: HashSet<&String> = test.iter().collect();
        assert!(train.is_disjoint(&test), "no barcode may sit in both train and test of one fold");
        assert_eq!(train.len() + test.len(), 90);
    }
}

#[test]
fn test_pipeline_reproducible_under_seed() {
    let data = synthetic_data(60, 40);
    let param = pipeline_param();

    let a = run_on_data(&data, &param).unwrap();
    let b = run_on_data(&data, &param).unwrap();

    assert_eq!(a.results[0].metasignature, b.results[0].metasignature);
    for (x, y) in a.results[0].scores.iter().zip(b.results[0].scores.iter()) {
        assert_eq!(x.score, y.score, "two runs with the same seed must agree on every score");
        assert_eq!(x.random_score, y.random_score);
    }
    for (x, y) in a.results[0].validations.iter().zip(b.results[0].validations.iter()) {
        assert_eq!(x.auc, y.auc);
        assert_eq!(x.threshold, y.threshold);
    }
}
