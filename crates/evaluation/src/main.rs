use anyhow::Context;
use clap::{Parser, Subcommand};
use common::{Environment, setup_logging};
use evaluation::{TrainingHistory, discover, evaluate};
use indicatif::{ProgressBar, ProgressStyle};
use inference::{Classifier, ImageClassifier, InferenceConfig, OrtBackend};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "evaluate", about = "Offline evaluation of the stage classifier")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a labelled test set and print accuracy, per-class scores
    /// and the confusion matrix.
    Report {
        /// Directory with one sub-directory of images per label.
        #[arg(long)]
        dataset: PathBuf,
        /// Also write the confusion matrix as a heatmap PDF.
        #[arg(long)]
        matrix_pdf: Option<PathBuf>,
    },
    /// Chart training curves into a PDF.
    History {
        /// JSON with `accuracy`, `val_accuracy`, `loss` and `val_loss` arrays.
        #[arg(long, default_value = "training_history.json")]
        input: PathBuf,
        #[arg(long, default_value = "training_history.pdf")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(Environment::from_env());

    match cli.command {
        Command::Report {
            dataset,
            matrix_pdf,
        } => report(dataset, matrix_pdf),
        Command::History { input, output } => history(input, output),
    }
}

fn report(dataset: PathBuf, matrix_pdf: Option<PathBuf>) -> anyhow::Result<()> {
    let config = InferenceConfig::from_env();
    let classifier = Classifier::<OrtBackend>::load(&config);
    anyhow::ensure!(
        classifier.is_available(),
        "model {} could not be loaded",
        config.model_path
    );
    classifier.verify()?;

    let images = discover(&dataset)?;
    anyhow::ensure!(!images.is_empty(), "no labelled images under {}", dataset.display());

    let progress = ProgressBar::new(images.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {elapsed_precise}")?
            .progress_chars("=>-"),
    );

    let result = evaluate(&classifier, &images, &progress);
    let accuracy = result
        .matrix
        .accuracy()
        .context("no image could be classified")?;

    println!("Overall Accuracy: {:.2}%", accuracy * 100.0);
    println!();
    println!("Classification Report:");
    println!("{}", result.matrix.report());
    println!("Confusion Matrix:");
    println!("{}", result.matrix);

    if !result.failures.is_empty() {
        println!("Skipped {} unreadable image(s).", result.failures.len());
    }

    if let Some(output) = matrix_pdf {
        let pdf = result.matrix.render_pdf()?;
        std::fs::write(&output, pdf).with_context(|| format!("writing {}", output.display()))?;
        tracing::info!(output = %output.display(), "Confusion matrix charted");
    }
    Ok(())
}

fn history(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let history = TrainingHistory::load(&input)?;
    let pdf = history.render_pdf()?;
    std::fs::write(&output, pdf).with_context(|| format!("writing {}", output.display()))?;

    tracing::info!(epochs = history.epochs(), output = %output.display(), "Training history charted");
    Ok(())
}
