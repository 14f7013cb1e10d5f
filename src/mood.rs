//! Mood classifier: TF-IDF features scored by multinomial naive Bayes.
//!
//! The fitted model is a JSON artifact. [`MoodClassifier::fit`] reproduces the
//! offline training step: lowercase, tokens of two or more word characters,
//! smoothed IDF, L2-normalized rows, Laplace/Lidstone smoothing with `alpha`.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::error::RecommendError;

/// Token pattern: runs of two or more word characters.
const TOKEN_PATTERN: &str = r"\b\w\w+\b";

/// A labeled training example.
#[derive(Debug, Clone, Deserialize)]
pub struct Sample {
    pub text: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelData {
    labels: Vec<String>,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    class_log_prior: Vec<f64>,
    /// `labels.len()` rows of `vocabulary.len()` log-probabilities.
    feature_log_prob: Vec<Vec<f64>>,
}

pub struct MoodClassifier {
    model: ModelData,
    tokens: Regex,
}

impl MoodClassifier {
    fn from_model(model: ModelData) -> Result<Self> {
        let vocab = model.vocabulary.len();
        anyhow::ensure!(!model.labels.is_empty(), "model has no labels");
        anyhow::ensure!(model.idf.len() == vocab, "idf length {} != vocabulary {vocab}", model.idf.len());
        anyhow::ensure!(
            model.class_log_prior.len() == model.labels.len()
                && model.feature_log_prob.len() == model.labels.len(),
            "per-class arrays do not match {} labels",
            model.labels.len()
        );
        anyhow::ensure!(
            model.feature_log_prob.iter().all(|row| row.len() == vocab),
            "feature_log_prob rows must have {vocab} entries"
        );
        anyhow::ensure!(
            model.vocabulary.values().all(|&i| i < vocab),
            "vocabulary index out of range"
        );
        Ok(Self {
            model,
            tokens: Regex::new(TOKEN_PATTERN)?,
        })
    }

    /// Load a fitted model from its JSON artifact.
    pub fn load(path: &Path) -> std::result::Result<Self, RecommendError> {
        let artifact = format!("mood model {}", path.display());
        let json =
            std::fs::read_to_string(path).map_err(|e| RecommendError::artifact(&artifact, e))?;
        let model: ModelData =
            serde_json::from_str(&json).map_err(|e| RecommendError::artifact(&artifact, e))?;
        let classifier =
            Self::from_model(model).map_err(|e| RecommendError::artifact(&artifact, e))?;
        tracing::info!(
            labels = classifier.labels().len(),
            vocabulary = classifier.model.vocabulary.len(),
            "mood model loaded"
        );
        Ok(classifier)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.model)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Fit on `samples`. Labels and vocabulary are kept in sorted order.
    pub fn fit(samples: &[Sample], alpha: f64) -> Result<Self> {
        anyhow::ensure!(!samples.is_empty(), "no training samples");
        anyhow::ensure!(alpha > 0.0, "alpha must be positive, got {alpha}");
        let tokens = Regex::new(TOKEN_PATTERN)?;

        let labels: Vec<String> = samples
            .iter()
            .map(|s| s.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let label_index: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let counts: Vec<HashMap<String, f64>> = samples
            .iter()
            .map(|s| term_counts(&tokens, &s.text))
            .collect();
        let vocabulary: BTreeMap<String, usize> = counts
            .iter()
            .flat_map(|c| c.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, term)| (term, i))
            .collect();
        let vocab = vocabulary.len();
        anyhow::ensure!(vocab > 0, "training texts contain no tokens");

        let n = samples.len() as f64;
        let mut df = vec![0.0f64; vocab];
        for c in &counts {
            for term in c.keys() {
                df[vocabulary[term]] += 1.0;
            }
        }
        let idf: Vec<f64> = df.iter().map(|d| ((1.0 + n) / (1.0 + d)).ln() + 1.0).collect();

        let mut feature_count = vec![vec![0.0f64; vocab]; labels.len()];
        let mut class_count = vec![0.0f64; labels.len()];
        for (sample, c) in samples.iter().zip(&counts) {
            let class = label_index[sample.label.as_str()];
            class_count[class] += 1.0;
            for (index, weight) in tfidf(c, &vocabulary, &idf) {
                feature_count[class][index] += weight;
            }
        }

        let feature_log_prob = feature_count
            .iter()
            .map(|row| {
                let total: f64 = row.iter().sum::<f64>() + alpha * vocab as f64;
                row.iter().map(|c| ((c + alpha) / total).ln()).collect()
            })
            .collect();
        let class_log_prior = class_count.iter().map(|c| (c / n).ln()).collect();

        tracing::info!(samples = samples.len(), labels = labels.len(), vocabulary = vocab, "mood model fitted");

        Self::from_model(ModelData {
            labels,
            vocabulary,
            idf,
            class_log_prior,
            feature_log_prob,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.model.labels
    }

    /// Most likely label for `text`. Ties go to the earliest label.
    pub fn classify(&self, text: &str) -> &str {
        let counts = term_counts(&self.tokens, text);
        let features = tfidf(&counts, &self.model.vocabulary, &self.model.idf);

        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (class, prior) in self.model.class_log_prior.iter().enumerate() {
            let row = &self.model.feature_log_prob[class];
            let score = prior + features.iter().map(|&(i, w)| w * row[i]).sum::<f64>();
            if score > best_score {
                best = class;
                best_score = score;
            }
        }
        &self.model.labels[best]
    }

    /// Fraction of `samples` whose label is predicted correctly.
    pub fn evaluate(&self, samples: &[Sample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let correct = samples
            .iter()
            .filter(|s| self.classify(&s.text) == s.label)
            .count();
        correct as f64 / samples.len() as f64
    }
}

fn term_counts(tokens: &Regex, text: &str) -> HashMap<String, f64> {
    let lowered = text.to_lowercase();
    let mut counts = HashMap::new();
    for m in tokens.find_iter(&lowered) {
        *counts.entry(m.as_str().to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Sparse, L2-normalized TF-IDF vector over the known vocabulary.
fn tfidf(
    counts: &HashMap<String, f64>,
    vocabulary: &BTreeMap<String, usize>,
    idf: &[f64],
) -> Vec<(usize, f64)> {
    let mut features: Vec<(usize, f64)> = counts
        .iter()
        .filter_map(|(term, tf)| vocabulary.get(term).map(|&i| (i, tf * idf[i])))
        .collect();
    let norm = features.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, w) in &mut features {
            *w /= norm;
        }
    }
    features.sort_by_key(|&(i, _)| i);
    features
}

/// Deterministic hold-out split: every `every`-th sample goes to the test set.
pub fn holdout_split(samples: Vec<Sample>, every: usize) -> (Vec<Sample>, Vec<Sample>) {
    if every < 2 {
        return (samples, Vec::new());
    }
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (i, sample) in samples.into_iter().enumerate() {
        if (i + 1) % every == 0 {
            test.push(sample);
        } else {
            train.push(sample);
        }
    }
    (train, test)
}

/// Read `(text, label)` samples from a headered CSV.
pub fn read_samples(path: &Path, text_column: &str, label_column: &str) -> Result<Vec<Sample>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("missing column {name:?} in {}", path.display()))
    };
    let text_at = find(text_column)?;
    let label_at = find(label_column)?;

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record?;
        samples.push(Sample {
            text: record.get(text_at).unwrap_or_default().to_string(),
            label: record.get(label_at).unwrap_or_default().to_string(),
        });
    }
    Ok(samples)
}
