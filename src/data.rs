use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use log::{info, warn};

/// Label value for cells whose metadata matched neither configured class.
pub const UNLABELED: u8 = 2;

/// Gene-by-cell expression dataset with per-cell metadata.
///
/// `X` holds the log-normalised expression values keyed by (cell, gene);
/// zeros are not stored. Gene identifiers are unique and stable across all
/// derived subsets, and subsetting never reorders the remaining cells or
/// genes relative to each other.
#[derive(Clone, Serialize, Deserialize)]
pub struct Data {
    pub X: HashMap<(usize, usize), f64>, // (cell, gene) -> log-normalised value
    pub y: Vec<u8>,                      // 0 = unaffected, 1 = affected, 2 = unlabeled
    pub cells: Vec<String>,              // barcodes
    pub genes: Vec<String>,
    pub cell_types: Vec<String>,         // categorical, per cell
    pub time_points: Vec<String>,        // ordered categorical, per cell
    pub time_order: Vec<String>,         // category order for the time axis
    pub classes: Vec<String>,            // [negative, positive] label names
    pub gene_len: usize,
    pub cell_len: usize,
}

impl Data {
    pub fn new() -> Data {
        Data {
            X: HashMap::new(),
            y: Vec::new(),
            cells: Vec::new(),
            genes: Vec::new(),
            cell_types: Vec::new(),
            time_points: Vec::new(),
            time_order: Vec::new(),
            classes: Vec::new(),
            gene_len: 0,
            cell_len: 0,
        }
    }

    /// Check if another dataset is compatible with the current one
    pub fn check_compatibility(&self, other: &Data) -> bool {
        self.genes == other.genes
    }

    /// Load the expression matrix from `X.tsv` (genes in rows, first row =
    /// barcodes) and per-cell metadata from `meta.tsv` (barcode, cell_type,
    /// time_point, label).
    pub fn load_data(&mut self, x_path: &str, meta_path: &str) -> Result<(), Box<dyn Error>> {
        info!("Loading files {} and {}...", x_path, meta_path);

        let file_x = File::open(x_path)?;
        let mut reader_x = BufReader::new(file_x);

        // first line carries the cell barcodes
        let mut first_line = String::new();
        reader_x.read_line(&mut first_line)?;
        let trimmed_first_line = first_line
            .strip_suffix("\r\n")
            .or_else(|| first_line.strip_suffix('\n'))
            .unwrap_or(&first_line);
        self.cells = trimmed_first_line.split('\t').skip(1).map(String::from).collect();

        for (gene, line) in reader_x.lines().enumerate() {
            let line = line?;
            let mut fields = line.trim_end_matches(['\r', '\n']).split('\t');

            if let Some(gene_name) = fields.next() {
                self.genes.push(gene_name.to_string());
            }

            for (cell, value) in fields.enumerate() {
                if let Ok(num_val) = value.parse::<f64>() {
                    if num_val != 0.0 {
                        self.X.insert((cell, gene), num_val);
                    }
                }
            }
        }

        // per-cell metadata, keyed by barcode
        let mut meta_map: HashMap<String, (String, String, String)> = HashMap::new();
        let mut meta_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(meta_path)?;
        for record in meta_reader.records() {
            let record = record?;
            if record.len() < 4 {
                return Err(format!(
                    "metadata row has {} fields, expected barcode/cell_type/time_point/label",
                    record.len()
                )
                .into());
            }
            meta_map.insert(
                record[0].to_string(),
                (record[1].to_string(), record[2].to_string(), record[3].to_string()),
            );
        }

        for barcode in &self.cells {
            match meta_map.get(barcode) {
                Some((cell_type, time_point, label)) => {
                    self.cell_types.push(cell_type.clone());
                    self.time_points.push(time_point.clone());
                    self.y.push(self.parse_label(label, barcode));
                }
                None => {
                    warn!("No metadata available for {}. Marking this cell as unlabeled.", barcode);
                    self.cell_types.push("unknown".to_string());
                    self.time_points.push("unknown".to_string());
                    self.y.push(UNLABELED);
                }
            }
        }

        if self.time_order.is_empty() {
            self.time_order = self.observed_time_order();
        }

        self.gene_len = self.genes.len();
        self.cell_len = self.cells.len();

        Ok(())
    }

    fn parse_label(&self, label: &str, barcode: &str) -> u8 {
        if self.classes.len() == 2 {
            if label == self.classes[0] {
                return 0;
            }
            if label == self.classes[1] {
                return 1;
            }
        }
        warn!(
            "Unknown label '{}' for {}. Marking this cell as unlabeled.",
            label, barcode
        );
        UNLABELED
    }

    pub fn set_classes(&mut self, classes: Vec<String>) {
        self.classes = classes;
    }

    pub fn set_time_order(&mut self, time_order: Vec<String>) {
        self.time_order = time_order;
    }

    /// Time categories in order of first appearance.
    fn observed_time_order(&self) -> Vec<String> {
        let mut order = Vec::new();
        for tp in &self.time_points {
            if !order.contains(tp) {
                order.push(tp.clone());
            }
        }
        order
    }

    /// Expression value for one (cell, gene); absent entries are zeros.
    pub fn value(&self, cell: usize, gene: usize) -> f64 {
        *self.X.get(&(cell, gene)).unwrap_or(&0.0)
    }

    /// Dense expression vector of one gene across all cells.
    pub fn gene_values(&self, gene: usize) -> Vec<f64> {
        (0..self.cell_len).map(|cell| self.value(cell, gene)).collect()
    }

    /// Distinct cell types in order of first appearance.
    pub fn cell_type_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for ct in &self.cell_types {
            if !names.contains(ct) {
                names.push(ct.clone());
            }
        }
        names
    }

    pub fn cell_type_indices(&self, cell_type: &str) -> Vec<usize> {
        (0..self.cell_len)
            .filter(|&i| self.cell_types[i] == cell_type)
            .collect()
    }

    /// filter Data for some cells (represented by a Vector of indices);
    /// the relative order of the kept cells and of all genes is preserved
    pub fn subset(&self, cells: Vec<usize>) -> Data {
        let mut x: HashMap<(usize, usize), f64> = HashMap::new();
        for (new_cell, cell) in cells.iter().enumerate() {
            for gene in 0..self.gene_len {
                if let Some(v) = self.X.get(&(*cell, gene)) {
                    x.insert((new_cell, gene), *v);
                }
            }
        }

        Data {
            X: x,
            y: cells.iter().map(|i| self.y[*i]).collect(),
            cells: cells.iter().map(|i| self.cells[*i].clone()).collect(),
            genes: self.genes.clone(),
            cell_types: cells.iter().map(|i| self.cell_types[*i].clone()).collect(),
            time_points: cells.iter().map(|i| self.time_points[*i].clone()).collect(),
            time_order: self.time_order.clone(),
            classes: self.classes.clone(),
            gene_len: self.gene_len,
            cell_len: cells.len(),
        }
    }

    /// Drop cells whose label matched neither configured class.
    pub fn remove_unlabeled(&self) -> Data {
        let kept: Vec<usize> = (0..self.cell_len).filter(|&i| self.y[i] != UNLABELED).collect();
        if kept.len() < self.cell_len {
            warn!("Removing {} unlabeled cells...", self.cell_len - kept.len());
        }
        self.subset(kept)
    }
}

/// Implement a custom Debug trait for Data
impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Genes: {}   Cells: {}", self.gene_len, self.cell_len)?;

        let cells_string = self.cells.join("\t");
        let truncated_cells = if cells_string.len() > 100 {
            format!("{}...", &cells_string[..97])
        } else {
            cells_string
        };

        writeln!(f, "X:                  {}", truncated_cells)?;
        // Limit to the first 20 rows
        for gene in (0..self.gene_len).take(20) {
            let gene_name = &self.genes[gene];
            let row_display: String = (0..self.cell_len)
                .map(|cell| {
                    if self.X.contains_key(&(cell, gene)) {
                        format!("{:.2}", self.X[&(cell, gene)])
                    } else {
                        "".to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join("\t");

            let truncated_row = if row_display.len() > 80 {
                format!("{}...", &row_display[..77])
            } else {
                row_display
            };

            writeln!(f, "{:<20} {}", gene_name, truncated_row)?;
        }

        writeln!(f, "\ncells:")?;
        for i in (0..self.cell_len).take(20) {
            writeln!(
                f,
                "{}\t{}\t{}\t{}",
                self.cells[i], self.cell_types[i], self.time_points[i], self.y[i]
            )?;
        }

        Ok(())
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the Display formatter
        write!(f, "{}", self)
    }
}

#[cfg(test)]
impl Data {
    /// Small fixed dataset shared by unit tests across modules.
    pub fn test() -> Data {
        let mut x: HashMap<(usize, usize), f64> = HashMap::new();
        x.insert((0, 0), 0.9);
        x.insert((0, 1), 0.01);
        x.insert((1, 1), 0.91);
        x.insert((2, 2), 0.35);
        x.insert((3, 0), 0.12);
        x.insert((3, 1), 0.75);
        x.insert((4, 0), 0.01);
        x.insert((5, 1), 0.9);

        Data {
            X: x,
            y: vec![0, 1, 0, 1, 1, 1],
            cells: vec![
                "AAAC-1".to_string(),
                "AAAG-1".to_string(),
                "AACT-1".to_string(),
                "AAGC-1".to_string(),
                "AATG-1".to_string(),
                "ACAA-1".to_string(),
            ],
            genes: vec!["GENE1".to_string(), "GENE2".to_string(), "GENE3".to_string()],
            cell_types: vec!["T".to_string(); 6],
            time_points: vec![
                "0h".to_string(),
                "8h".to_string(),
                "0h".to_string(),
                "8h".to_string(),
                "2h".to_string(),
                "2h".to_string(),
            ],
            time_order: vec!["0h".to_string(), "2h".to_string(), "8h".to_string()],
            classes: vec!["unaffected".to_string(), "affected".to_string()],
            gene_len: 3,
            cell_len: 6,
        }
    }

    /// Deterministic synthetic dataset with a planted up-shift on the first
    /// five genes of affected cells. Labels alternate 2:1 unaffected:affected.
    pub fn specific_test(n_cells: usize, n_genes: usize) -> Data {
        let mut x: HashMap<(usize, usize), f64> = HashMap::new();
        let mut y: Vec<u8> = Vec::new();
        let time_order = vec!["0h".to_string(), "2h".to_string(), "8h".to_string()];
        let mut time_points = Vec::new();

        for cell in 0..n_cells {
            let label: u8 = if cell % 3 == 2 { 1 } else { 0 };
            y.push(label);
            time_points.push(time_order[cell % 3].clone());
            for gene in 0..n_genes {
                // smooth deterministic background in [0, 1)
                let mut value = ((cell * 7 + gene * 13) % 97) as f64 / 97.0;
                if label == 1 && gene < 5 {
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
}
