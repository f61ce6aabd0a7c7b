use crate::error::{GeneticError, Result};
use log::{info, warn};
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Labeled categorical dataset: every cell is a small category code
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    pub X: Vec<Vec<u8>>,          // sample-major category codes
    pub y: Vec<u8>,               // binary class of each sample
    pub features: Vec<String>,    // feature names
    pub samples: Vec<String>,
    pub levels: Vec<Vec<String>>, // category labels of each feature, indexed by code
    pub feature_len: usize,
    pub sample_len: usize,
    pub classes: Vec<String>,
}

impl Data {
    pub fn new() -> Data {
        Data {
            X: Vec::new(),
            y: Vec::new(),
            features: Vec::new(),
            samples: Vec::new(),
            levels: Vec::new(),
            feature_len: 0,
            sample_len: 0,
            classes: Vec::new(),
        }
    }

    /// Build a dataset directly from codes, naming features and samples by position
    pub fn from_codes(X: Vec<Vec<u8>>, y: Vec<u8>) -> Result<Data> {
        if X.len() != y.len() {
            return Err(GeneticError::InvalidData(format!(
                "{} rows of features but {} labels",
                X.len(),
                y.len()
            )));
        }
        let feature_len = X.first().map_or(0, |row| row.len());
        if X.iter().any(|row| row.len() != feature_len) {
            return Err(GeneticError::InvalidData("rows have different lengths".to_string()));
        }
        if let Some(bad) = y.iter().find(|&&c| c > 1) {
            return Err(GeneticError::InvalidData(format!("label {} is not binary", bad)));
        }

        let levels = (0..feature_len)
            .map(|j| {
                let max = X.iter().map(|row| row[j]).max().unwrap_or(0);
                (0..=max).map(|c| c.to_string()).collect()
            })
            .collect();

        Ok(Data {
            feature_len,
            sample_len: X.len(),
            features: (0..feature_len).map(|j| format!("f{}", j)).collect(),
            samples: (0..X.len()).map(|i| format!("s{}", i)).collect(),
            levels,
            X,
            y,
            classes: vec!["0".to_string(), "1".to_string()],
        })
    }

    /// Load data from tab-separated `X` and `y` files.
    ///
    /// With `features_in_rows`, X has a header of sample names and one line per feature,
    /// otherwise a header of feature names and one line per sample. Cell values are
    /// arbitrary strings, encoded per feature in sorted order. y has a header and
    /// `sample<TAB>label` lines where the label is `0`, `1` or one of `classes`.
    pub fn load_data(&mut self, X_path: &str, y_path: &str, features_in_rows: bool, classes: &[String]) -> Result<()> {
        info!("Loading files {} and {}...", X_path, y_path);

        let table = read_tsv(X_path)?;
        let mut rows = table.into_iter();
        let header = rows
            .next()
            .ok_or_else(|| GeneticError::InvalidData(format!("{} is empty", X_path)))?;
        let columns: Vec<String> = header.into_iter().skip(1).collect();

        let mut row_names = Vec::new();
        let mut cells: Vec<Vec<String>> = Vec::new();
        for (line, row) in rows.enumerate() {
            if row.len() != columns.len() + 1 {
                return Err(GeneticError::InvalidData(format!(
                    "{} line {}: expected {} values, found {}",
                    X_path,
                    line + 2,
                    columns.len(),
                    row.len().saturating_sub(1)
                )));
            }
            let mut fields = row.into_iter();
            row_names.push(fields.next().unwrap_or_default());
            cells.push(fields.collect());
        }

        // cells_by_feature[j][i] is the raw value of feature j for sample i
        let (features, samples, cells_by_feature) = if features_in_rows {
            (row_names, columns, cells)
        } else {
            let transposed = (0..columns.len())
                .map(|j| cells.iter().map(|row| row[j].clone()).collect())
                .collect();
            (columns, row_names, transposed)
        };

        let mut levels = Vec::with_capacity(features.len());
        let mut codes_by_feature = Vec::with_capacity(features.len());
        for (j, values) in cells_by_feature.iter().enumerate() {
            let distinct: Vec<String> = values.iter().cloned().collect::<BTreeSet<String>>().into_iter().collect();
            if distinct.len() > 256 {
                return Err(GeneticError::InvalidData(format!(
                    "feature {} has {} distinct values, at most 256 are supported",
                    features[j],
                    distinct.len()
                )));
            }
            let code: HashMap<&str, u8> = distinct.iter().enumerate().map(|(c, v)| (v.as_str(), c as u8)).collect();
            codes_by_feature.push(values.iter().map(|v| code[v.as_str()]).collect::<Vec<u8>>());
            levels.push(distinct);
        }

        let labels = read_labels(y_path, classes)?;

        let mut X = Vec::new();
        let mut y = Vec::new();
        let mut kept_samples = Vec::new();
        for (i, sample_name) in samples.iter().enumerate() {
            match labels.get(sample_name) {
                Some(&class) => {
                    X.push(codes_by_feature.iter().map(|column| column[i]).collect());
                    y.push(class);
                    kept_samples.push(sample_name.clone());
                }
                None => warn!("No usable y value for {}. Dropping this sample.", sample_name),
            }
        }

        self.feature_len = features.len();
        self.sample_len = kept_samples.len();
        self.features = features;
        self.samples = kept_samples;
        self.levels = levels;
        self.X = X;
        self.y = y;
        self.classes = if classes.len() == 2 {
            classes.to_vec()
        } else {
            vec!["0".to_string(), "1".to_string()]
        };

        Ok(())
    }

    /// filter Data for some samples (represented by a Vector of indices)
    pub fn subset(&self, samples: Vec<usize>) -> Data {
        Data {
            X: samples.iter().map(|&i| self.X[i].clone()).collect(),
            y: samples.iter().map(|&i| self.y[i]).collect(),
            features: self.features.clone(),
            samples: samples.iter().map(|&i| self.samples[i].clone()).collect(),
            levels: self.levels.clone(),
            feature_len: self.feature_len,
            sample_len: samples.len(),
            classes: self.classes.clone(),
        }
    }

    /// keep only the given feature columns, in the given order
    pub fn restrict(&self, features: &[usize]) -> Data {
        Data {
            X: self.X.iter().map(|row| features.iter().map(|&j| row[j]).collect()).collect(),
            y: self.y.clone(),
            features: features.iter().map(|&j| self.features[j].clone()).collect(),
            samples: self.samples.clone(),
            levels: features.iter().map(|&j| self.levels[j].clone()).collect(),
            feature_len: features.len(),
            sample_len: self.sample_len,
            classes: self.classes.clone(),
        }
    }

    /// number of samples in class 0 and class 1
    pub fn class_counts(&self) -> (usize, usize) {
        let n1 = self.y.iter().filter(|&&c| c == 1).count();
        (self.y.len() - n1, n1)
    }

    /// Randomly drops majority-class samples until both classes have the same size.
    /// Returns the number of removed samples.
    pub fn balance(&mut self, rng: &mut ChaCha8Rng) -> usize {
        let (n0, n1) = self.class_counts();
        if n0 == n1 {
            return 0;
        }
        let majority = if n0 > n1 { 0 } else { 1 };
        let excess = n0.abs_diff(n1);

        let majority_indices: Vec<usize> = (0..self.sample_len).filter(|&i| self.y[i] == majority).collect();
        let removed: BTreeSet<usize> = sample(rng, majority_indices.len(), excess)
            .into_iter()
            .map(|k| majority_indices[k])
            .collect();

        let kept: Vec<usize> = (0..self.sample_len).filter(|i| !removed.contains(i)).collect();
        *self = self.subset(kept);

        info!("Balanced classes by removing {} samples of class {}", excess, majority);
        excess
    }
}

fn read_tsv(path: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|field| field.trim().to_string()).collect());
    }
    Ok(rows)
}

fn read_labels(y_path: &str, classes: &[String]) -> Result<HashMap<String, u8>> {
    let mut labels = HashMap::new();
    for row in read_tsv(y_path)?.into_iter().skip(1) {
        if row.len() < 2 {
            continue;
        }
        let class = match row[1].as_str() {
            "0" => Some(0),
            "1" => Some(1),
            other => classes.iter().position(|c| c == other).filter(|&p| p < 2).map(|p| p as u8),
        };
        match class {
            Some(class) => {
                labels.insert(row[0].clone(), class);
            }
            None => warn!("Unknown label {:?} for sample {}", row[1], row[0]),
        }
    }
    Ok(labels)
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Features: {}   Samples: {}", self.feature_len, self.sample_len)?;

        let samples_string = self.samples.iter().take(20).cloned().collect::<Vec<_>>().join("\t");
        writeln!(f, "X:                  {}", samples_string)?;
        for j in (0..self.feature_len).take(20) {
            let row_display: String = self
                .X
                .iter()
                .take(20)
                .map(|row| self.levels[j][row[j] as usize].clone())
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(f, "{:<20} {}", self.features[j], row_display)?;
        }

        writeln!(f, "\ny:")?;
        for (sample, class) in self.samples.iter().zip(self.y.iter()).take(20) {
            writeln!(f, "{}\t{}", sample, class)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn create_test_data() -> Data {
        Data::from_codes(
            vec![
                vec![0, 1, 2],
                vec![1, 1, 0],
                vec![2, 0, 1],
                vec![0, 0, 0],
                vec![1, 2, 2],
                vec![2, 2, 1],
            ],
            vec![0, 1, 0, 1, 1, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_load_data() {
        let mut data = Data::new();
        data.load_data("./samples/tests/X.tsv", "./samples/tests/y.tsv", true, &[]).unwrap();

        assert_eq!(data.features, ["rs001", "rs002", "rs003", "rs004", "rs005"], "features should follow the X file order");
        assert_eq!(data.sample_len, 11, "the sample without a label should be dropped");
        assert_eq!(data.feature_len, 5);
        assert!(!data.samples.contains(&"P12".to_string()), "P12 has no label and must be dropped");
        assert_eq!(data.levels[0], ["AA", "AG", "GG"], "levels should be sorted");
        assert_eq!(data.X[0][0], 0, "P01 has AA on rs001, the first level");
        assert_eq!(data.class_counts(), (5, 6));
    }

    #[test]
    fn test_load_data_transposed_with_class_names() {
        let mut data = Data::new();
        let classes = vec!["control".to_string(), "case".to_string()];
        data.load_data("./samples/tests/X_by_sample.tsv", "./samples/tests/y_named.tsv", false, &classes).unwrap();

        assert_eq!(data.features, ["rs001", "rs002", "rs003"]);
        assert_eq!(data.samples, ["P01", "P02", "P03", "P04"]);
        assert_eq!(data.y, [0, 1, 1, 0], "class names should map to their position in classes");
        assert_eq!(data.classes, classes);
    }

    #[test]
    fn test_load_data_missing_file() {
        let mut data = Data::new();
        assert!(data.load_data("./samples/tests/nope.tsv", "./samples/tests/y.tsv", true, &[]).is_err());
    }

    #[test]
    fn test_from_codes_rejects_mismatched_lengths() {
        assert!(Data::from_codes(vec![vec![0, 1]], vec![0, 1]).is_err());
        assert!(Data::from_codes(vec![vec![0, 1], vec![1]], vec![0, 1]).is_err());
        assert!(Data::from_codes(vec![vec![0]], vec![2]).is_err(), "labels must be binary");
    }

    #[test]
    fn test_subset_indices() {
        let data = create_test_data();
        let subset = data.subset(vec![4, 0]);
        assert_eq!(subset.sample_len, 2);
        assert_eq!(subset.X, vec![vec![1, 2, 2], vec![0, 1, 2]]);
        assert_eq!(subset.y, vec![1, 0]);
        assert_eq!(subset.samples, vec!["s4", "s0"]);
    }

    #[test]
    fn test_subset_empty_set() {
        let data = create_test_data();
        let subset = data.subset(vec![]);
        assert_eq!(subset.sample_len, 0);
        assert_eq!(subset.feature_len, 3, "features are kept even with no sample");
    }

    #[test]
    fn test_restrict_keeps_given_order() {
        let data = create_test_data();
        let restricted = data.restrict(&[2, 0]);
        assert_eq!(restricted.feature_len, 2);
        assert_eq!(restricted.features, vec!["f2", "f0"]);
        assert_eq!(restricted.X[0], vec![2, 0]);
        assert_eq!(restricted.y, data.y, "labels are untouched by column restriction");
    }

    #[test]
    fn test_balance_removes_majority_excess() {
        let X = vec![vec![0u8]; 100];
        let y: Vec<u8> = (0..100).map(|i| if i < 70 { 1 } else { 0 }).collect();
        let mut data = Data::from_codes(X, y).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let removed = data.balance(&mut rng);

        assert_eq!(removed, 40, "exactly |70-30| rows should be removed");
        assert_eq!(data.class_counts(), (30, 30), "classes should be equal after balancing");
        assert_eq!(data.sample_len, 60);
        assert_eq!(data.X.len(), 60);
    }

    #[test]
    fn test_balance_noop_when_balanced() {
        let mut data = Data::from_codes(vec![vec![0], vec![1]], vec![0, 1]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(data.balance(&mut rng), 0);
        assert_eq!(data.sample_len, 2);
    }
}
