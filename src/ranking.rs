use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};

/// A feature combination found inside the best subsets of several runs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedInteraction {
    pub features: Vec<String>,
    pub count: usize,
    /// count / number of runs
    pub frequency: f64,
}

impl RankedInteraction {
    pub fn key(&self) -> String {
        self.features.join("-")
    }
}

/// All k-element index combinations of 0..n, in lexicographic order
pub fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut result = Vec::new();
    if k == 0 || k > n {
        return result;
    }
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        result.push(current.clone());
        // rightmost position that can still move forward
        let Some(i) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            return result;
        };
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

/// Counts every combination of two or more features within each subset (features sorted by name)
/// and keeps those seen in at least two runs, most frequent first.
pub fn combinatorial_ranking(subsets: &[Vec<String>], runs: usize) -> Vec<RankedInteraction> {
    let mut counts: HashMap<Vec<String>, usize> = HashMap::new();

    for subset in subsets {
        let mut names = subset.clone();
        names.sort();
        names.dedup();
        for k in 2..=names.len() {
            for indices in combinations(names.len(), k) {
                let combination: Vec<String> = indices.iter().map(|&i| names[i].clone()).collect();
                *counts.entry(combination).or_insert(0) += 1;
            }
        }
    }

    let mut ranking: Vec<RankedInteraction> = counts
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .map(|(features, count)| RankedInteraction {
            features,
            count,
            frequency: if runs == 0 { 0.0 } else { count as f64 / runs as f64 },
        })
        .collect();

    ranking.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key().cmp(&b.key())));
    ranking
}

pub fn format_ranking(ranking: &[RankedInteraction]) -> String {
    let mut text = String::from("==============  Combinatorial Ranking  =============\n");
    for interaction in ranking {
        text.push_str(&format!("{}\t{}\n", interaction.key(), interaction.frequency));
    }
    text
}

pub fn write_ranking(path: &str, ranking: &[RankedInteraction]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(format_ranking(ranking).as_bytes())?;
    writer.flush()?;
    Ok(())
}
