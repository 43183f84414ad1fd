use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub split: Split,
    #[serde(default)]
    pub signature: Signature,
    #[serde(default)]
    pub validation: Validation,
    #[serde(default)]
    pub output: Output,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "one_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub X: String,
    #[serde(default = "empty_string")]
    pub meta: String,
    #[serde(default = "class_names_default")]
    pub classes: Vec<String>,
    #[serde(default = "time_order_default")]
    pub time_order: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Split {
    #[serde(default = "folds_default")]
    pub folds: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Signature {
    #[serde(default = "top_n_default")]
    pub top_n: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Validation {
    /// Fixed operating threshold; when absent the best Youden's J threshold
    /// of each fold is used.
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Output {
    #[serde(default = "empty_string")]
    pub dir: String,
    #[serde(default = "empty_string")]
    pub save_exp: String,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Split {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Signature {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Validation {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Output {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Param {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn get(param_file: String) -> Result<Param, Box<dyn Error>> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let mut config: Param = serde_yaml::from_reader(param_reader)?;

    validate(&mut config)?;

    Ok(config)
}

pub fn validate(param: &mut Param) -> Result<(), String> {
    if param.split.folds == 0 {
        return Err("Invalid split.folds=0. At least one fold is required.".to_string());
    }

    if param.signature.top_n == 0 {
        return Err("Invalid signature.top_n=0. The signature must keep at least one gene.".to_string());
    }

    if param.data.classes.len() != 2 {
        return Err(format!(
            "Invalid data.classes: expected exactly 2 label names, got {}.",
            param.data.classes.len()
        ));
    }

    if let Some(threshold) = param.validation.threshold {
        if !threshold.is_finite() {
            return Err(format!(
                "Invalid validation.threshold={}. Must be a finite value.",
                threshold
            ));
        }
    }

    if param.split.folds < 3 {
        warn!(
            "split.folds={} gives large test folds and little training data per fold.",
            param.split.folds
        );
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    4815162342
}
fn empty_string() -> String {
    "".to_string()
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn folds_default() -> usize {
    3
}
fn top_n_default() -> usize {
    300
}
fn one_default() -> usize {
    1
}
fn class_names_default() -> Vec<String> {
    vec!["unaffected".to_string(), "affected".to_string()]
}
fn time_order_default() -> Vec<String> {
    Vec::new()
}

// unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_param_is_valid() {
        let mut param = Param::default();
        assert_eq!(param.general.seed, 4815162342);
        assert_eq!(param.split.folds, 3);
        assert_eq!(param.signature.top_n, 300);
        assert_eq!(param.data.classes, vec!["unaffected", "affected"]);
        assert!(param.validation.threshold.is_none());
        assert!(validate(&mut param).is_ok(), "the default parameter set must validate");
    }

    #[test]
    fn test_validate_rejects_zero_folds() {
        let mut param = Param::default();
        param.split.folds = 0;
        assert!(validate(&mut param).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_top_n() {
        let mut param = Param::default();
        param.signature.top_n = 0;
        assert!(validate(&mut param).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_classes() {
        let mut param = Param::default();
        param.data.classes = vec!["affected".to_string()];
        assert!(validate(&mut param).is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_threshold() {
        let mut param = Param::default();
        param.validation.threshold = Some(f64::NAN);
        assert!(validate(&mut param).is_err());
        param.validation.threshold = Some(0.25);
        assert!(validate(&mut param).is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_with_partial_sections() {
        let yaml = "split:\n  folds: 5\nsignature:\n  top_n: 100\n";
        let param: Param = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(param.split.folds, 5);
        assert_eq!(param.signature.top_n, 100);
        assert_eq!(param.general.seed, 4815162342, "omitted sections must take their defaults");
    }
}
