//! CLI `mood` commands: classify text and train the mood model.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::AppConfig;
use crate::mood::{self, MoodClassifier};

/// Print the predicted mood label for `text`.
pub fn classify(config: &AppConfig, text: &str) -> Result<()> {
    let classifier = MoodClassifier::load(&config.resolved_classifier_path())
        .context("failed to load mood model")?;
    println!("{}", classifier.classify(text));
    Ok(())
}

/// Fit the mood model on a labeled CSV and save it to the configured path.
///
/// With `holdout >= 2`, every `holdout`-th row is kept out of training and
/// used to report accuracy.
pub fn train(
    config: &AppConfig,
    file: &Path,
    text_column: &str,
    label_column: &str,
    holdout: usize,
) -> Result<()> {
    let samples = mood::read_samples(file, text_column, label_column)?;
    println!("Read {} labeled rows from {}", samples.len(), file.display());

    let (train, test) = mood::holdout_split(samples, holdout);
    let classifier = MoodClassifier::fit(&train, config.classifier.alpha)?;

    println!("Labels: {}", classifier.labels().join(", "));
    println!(
        "Training accuracy: {:.2}",
        classifier.evaluate(&train)
    );
    if !test.is_empty() {
        println!(
            "Hold-out accuracy: {:.2} ({} rows)",
            classifier.evaluate(&test),
            test.len()
        );
    }

    let path = config.resolved_classifier_path();
    classifier.save(&path)?;
    println!("Model saved to {}", path.display());
    Ok(())
}
