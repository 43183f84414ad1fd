use crate::param::Param;
use crate::signature::Signature;
use crate::validation::{TimeTrend, ValidationResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Held-out time-scores of one cell: each cell is scored by the signature of
/// the fold in which it sat in the test set.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CellScore {
    pub barcode: String,
    pub time_point: String,
    pub label: u8,
    pub score: f64,
    pub random_score: f64,
}

/// Everything the pipeline produced for one cell type.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CellTypeResult {
    pub cell_type: String,
    /// train/test barcodes per fold, for reproducibility audits
    pub fold_ids: Vec<(Vec<String>, Vec<String>)>,
    pub signatures: Vec<Signature>,
    pub metasignature: Vec<String>,
    pub scores: Vec<CellScore>,
    /// two entries per fold: real signature and random control
    pub validations: Vec<ValidationResult>,
    pub time_trends: Vec<TimeTrend>,
}

/// A full pipeline run: inputs snapshot, per-cell-type results, provenance.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Experiment {
    pub id: String,
    pub version: String,
    pub timestamp: String,
    pub parameters: Param,
    pub gene_universe: Vec<String>,
    pub results: Vec<CellTypeResult>,
    pub execution_time: f64,
}

/// One row of the table an external gene-set enrichment service returns for
/// a metasignature.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EnrichmentRecord {
    pub term_id: String,
    pub term_name: String,
    pub odds_ratio: f64,
    pub p_value: f64,
    pub term_size: usize,
}

/// External enrichment collaborator: receives a metasignature and the gene
/// universe it was drawn from, returns an enrichment table.
pub trait Enricher {
    fn enrich(&self, genes: &[String], universe: &[String]) -> Vec<EnrichmentRecord>;
}

impl Experiment {
    /// Run every non-empty metasignature through an enrichment collaborator.
    pub fn enrich_metasignatures(&self, enricher: &dyn Enricher) -> Vec<(String, Vec<EnrichmentRecord>)> {
        self.results
            .iter()
            .filter(|r| !r.metasignature.is_empty())
            .map(|r| {
                (
                    r.cell_type.clone(),
                    enricher.enrich(&r.metasignature, &self.gene_universe),
                )
            })
            .collect()
    }

    pub fn display_results(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Experiment {} (cryosig {})", self.id, self.version);
        let _ = writeln!(out, "Completed in {:.2}s\n", self.execution_time);

        for result in &self.results {
            let _ = writeln!(out, "Cell type: {}", result.cell_type);
            let _ = writeln!(
                out,
                "  Metasignature: {} genes shared by all {} folds",
                result.metasignature.len(),
                result.signatures.len()
            );

            let mut real_aucs = Vec::new();
            let mut random_aucs = Vec::new();
            for v in &result.validations {
                if v.is_random {
                    random_aucs.push(v.auc);
                } else {
                    real_aucs.push(v.auc);
                    let _ = writeln!(
                        out,
                        "  Fold #{}: AUC {:.3} | accuracy {:.3} | sensitivity {:.3} | specificity {:.3} | precision {:.3}",
                        v.fold + 1,
                        v.auc,
                        v.accuracy,
                        v.sensitivity,
                        v.specificity,
                        v.precision
                    );
                }
            }

            let mean = |values: &[f64]| {
                if values.is_empty() {
                    0.5
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            };
            let real_mean = mean(&real_aucs);
            let random_mean = mean(&random_aucs);
            let verdict = if real_mean >= random_mean {
                "real signature dominates the random control"
            } else {
                "WARNING: random control dominates the real signature"
            };
            let _ = writeln!(
                out,
                "  Mean AUC: real {:.3} vs random {:.3} -> {}",
                real_mean, random_mean, verdict
            );

            if !result.time_trends.is_empty() {
                let _ = writeln!(out, "  Score by elapsed-time category:");
                for t in &result.time_trends {
                    let _ = writeln!(
                        out,
                        "    {:<8} n={:<5} mean {:>8.3} | std {:>7.3} | median {:>8.3}",
                        t.time_point, t.n, t.mean, t.std, t.median
                    );
                }
            }
            let _ = writeln!(out);
        }

        out
    }

    /// Write every output table of the run as TSV files under `dir`.
    pub fn export_tables(&self, dir: &str) -> Result<(), Box<dyn Error>> {
        std::fs::create_dir_all(dir)?;
        self.export_signatures(Path::new(dir).join("signatures.tsv"))?;
        self.export_metasignatures(Path::new(dir).join("metasignatures.tsv"))?;
        self.export_scores(Path::new(dir).join("scores.tsv"))?;
        self.export_validation(Path::new(dir).join("validation.tsv"))?;
        self.export_roc(Path::new(dir).join("roc.tsv"))?;
        self.export_time_trends(Path::new(dir).join("time_trends.tsv"))?;
        info!("Result tables written to {}", dir);
        Ok(())
    }

    fn export_signatures<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record(["cell_type", "fold", "rank", "gene", "log_fc", "p_adj", "is_random"])?;
        for result in &self.results {
            for signature in &result.signatures {
                for (rank, entry) in signature.entries.iter().enumerate() {
                    writer.write_record([
                        result.cell_type.clone(),
                        signature.fold.to_string(),
                        (rank + 1).to_string(),
                        entry.gene.clone(),
                        entry.log_fc.map(|v| v.to_string()).unwrap_or_default(),
                        entry.p_adj.map(|v| v.to_string()).unwrap_or_default(),
                        entry.is_random.to_string(),
                    ])?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }

    fn export_metasignatures<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record(["cell_type", "gene"])?;
        for result in &self.results {
            for gene in &result.metasignature {
                writer.write_record([result.cell_type.as_str(), gene.as_str()])?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    fn export_scores<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record(["cell_type", "barcode", "time_point", "label", "score", "random_score"])?;
        for result in &self.results {
            for cell in &result.scores {
                writer.write_record([
                    result.cell_type.clone(),
                    cell.barcode.clone(),
                    cell.time_point.clone(),
                    cell.label.to_string(),
                    cell.score.to_string(),
                    cell.random_score.to_string(),
                ])?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    fn export_validation<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record([
            "cell_type",
            "fold",
            "signature",
            "auc",
            "threshold",
            "sensitivity",
            "specificity",
            "precision",
            "accuracy",
        ])?;
        for result in &self.results {
            for v in &result.validations {
                writer.write_record([
                    v.cell_type.clone(),
                    v.fold.to_string(),
                    if v.is_random { "random" } else { "real" }.to_string(),
                    v.auc.to_string(),
                    v.threshold.to_string(),
                    v.sensitivity.to_string(),
                    v.specificity.to_string(),
                    v.precision.to_string(),
                    v.accuracy.to_string(),
                ])?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    fn export_roc<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record(["cell_type", "fold", "signature", "fpr", "tpr"])?;
        for result in &self.results {
            for v in &result.validations {
                for point in &v.roc {
                    writer.write_record([
                        v.cell_type.clone(),
                        v.fold.to_string(),
                        if v.is_random { "random" } else { "real" }.to_string(),
                        point.fpr.to_string(),
                        point.tpr.to_string(),
                    ])?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }

    fn export_time_trends<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record(["cell_type", "time_point", "n", "mean", "std", "median"])?;
        for result in &self.results {
            for t in &result.time_trends {
                writer.write_record([
                    t.cell_type.clone(),
                    t.time_point.clone(),
                    t.n.to_string(),
                    t.mean.to_string(),
                    t.std.to_string(),
                    t.median.to_string(),
                ])?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Optional JSON checkpoint; the in-memory Experiment remains the primary
    /// data path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Experiment, Box<dyn Error>> {
        let file = File::open(path)?;
        let experiment = serde_json::from_reader(BufReader::new(file))?;
        Ok(experiment)
    }
}

// unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SignatureEntry;
    use crate::validation::RocPoint;

    fn test_experiment() -> Experiment {
        Experiment {
            id: "test_2026-01-01_00-00-00".to_string(),
            version: "0.1.0".to_string(),
            timestamp: "2026-01-01_00-00-00".to_string(),
            parameters: Param::default(),
            gene_universe: vec!["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()],
            results: vec![CellTypeResult {
                cell_type: "T".to_string(),
                fold_ids: vec![(vec!["bc1".to_string()], vec!["bc2".to_string()])],
                signatures: vec![Signature {
                    cell_type: "T".to_string(),
                    fold: 0,
                    entries: vec![
                        SignatureEntry {
                            gene: "A".to_string(),
                            log_fc: Some(1.2),
                            p_adj: Some(0.01),
                            is_random: false,
                        },
                        SignatureEntry {
                            gene: "C".to_string(),
                            log_fc: None,
                            p_adj: None,
                            is_random: true,
                        },
                    ],
                }],
                metasignature: vec!["A".to_string()],
                scores: vec![CellScore {
                    barcode: "bc2".to_string(),
                    time_point: "8h".to_string(),
                    label: 1,
                    score: 1.4,
                    random_score: -0.2,
                }],
                validations: vec![
                    ValidationResult {
                        cell_type: "T".to_string(),
                        fold: 0,
                        is_random: false,
                        auc: 0.9,
                        threshold: 0.2,
                        sensitivity: 0.8,
                        specificity: 0.9,
                        precision: 0.85,
                        accuracy: 0.88,
                        roc: vec![RocPoint { fpr: 1.0, tpr: 1.0 }, RocPoint { fpr: 0.0, tpr: 0.0 }],
                    },
                    ValidationResult {
                        cell_type: "T".to_string(),
                        fold: 0,
                        is_random: true,
                        auc: 0.5,
                        threshold: 0.0,
                        sensitivity: 0.5,
                        specificity: 0.5,
                        precision: 0.5,
                        accuracy: 0.5,
                        roc: vec![RocPoint { fpr: 1.0, tpr: 1.0 }, RocPoint { fpr: 0.0, tpr: 0.0 }],
                    },
                ],
                time_trends: vec![TimeTrend {
                    cell_type: "T".to_string(),
                    time_point: "8h".to_string(),
                    n: 1,
                    mean: 1.4,
                    std: 0.0,
                    median: 1.4,
                }],
            }],
            execution_time: 0.1,
        }
    }

    struct MockEnricher;

    impl Enricher for MockEnricher {
        fn enrich(&self, genes: &[String], universe: &[String]) -> Vec<EnrichmentRecord> {
            vec![EnrichmentRecord {
                term_id: "GO:0000001".to_string(),
                term_name: format!("{} of {} genes", genes.len(), universe.len()),
                odds_ratio: 2.0,
                p_value: 0.01,
                term_size: 10,
            }]
        }
    }

    #[test]
    fn test_display_results_reports_dominance() {
        let exp = test_experiment();
        let report = exp.display_results();
        assert!(report.contains("Cell type: T"));
        assert!(report.contains("real signature dominates the random control"));
        assert!(report.contains("Metasignature: 1 genes"));
    }

    #[test]
    fn test_display_results_flags_dominated_signature() {
        let mut exp = test_experiment();
        exp.results[0].validations[0].auc = 0.4;
        let report = exp.display_results();
        assert!(
            report.contains("random control dominates"),
            "a dominated real signature must be flagged in the report"
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let exp = test_experiment();
        let dir = std::env::temp_dir().join("cryosig_test_roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("exp.json");

        exp.save(&path).unwrap();
        let loaded = Experiment::load(&path).unwrap();

        assert_eq!(loaded.id, exp.id);
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.results[0].metasignature, exp.results[0].metasignature);
        assert_eq!(loaded.results[0].validations[0].auc, 0.9);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_export_tables_writes_all_files() {
        let exp = test_experiment();
        let dir = std::env::temp_dir().join("cryosig_test_export");
        exp.export_tables(dir.to_str().unwrap()).unwrap();

        for name in [
            "signatures.tsv",
            "metasignatures.tsv",
            "scores.tsv",
            "validation.tsv",
            "roc.tsv",
            "time_trends.tsv",
        ] {
            assert!(dir.join(name).exists(), "{} must be written", name);
        }

        let signatures = std::fs::read_to_string(dir.join("signatures.tsv")).unwrap();
        assert!(signatures.contains("GENE") || signatures.contains('A'), "signature table must list genes");
        let validation = std::fs::read_to_string(dir.join("validation.tsv")).unwrap();
        assert!(validation.contains("real"));
        assert!(validation.contains("random"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_enrich_metasignatures_supplies_universe() {
        let exp = test_experiment();
        let tables = exp.enrich_metasignatures(&MockEnricher);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].0, "T");
        assert_eq!(tables[0].1[0].term_name, "1 of 4 genes", "the enricher must receive the metasignature and the full gene universe");
    }

    #[test]
    fn test_enrich_skips_empty_metasignatures() {
        let mut exp = test_experiment();
        exp.results[0].metasignature.clear();
        let tables = exp.enrich_metasignatures(&MockEnricher);
        assert!(tables.is_empty(), "an empty metasignature has nothing to enrich");
    }
}
