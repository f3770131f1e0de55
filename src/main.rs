//! Image Classifier CLI
//!
//! Offline entry point for debugging a model: classify local images without
//! going through the HTTP server.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use image_classifier::utils::logging::{init_logging, LogConfig};
use image_classifier::{has_image_extension, load_predictor, LabelFormat, LabelSet, Prediction};

/// Classify images with a pretrained model
#[derive(Parser, Debug)]
#[command(name = "image_classifier")]
#[command(version)]
#[command(about = "Classify images offline with a pretrained ONNX model", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run inference on images or directories of images
    Predict {
        /// Image files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Path to the model file or model directory
        #[arg(short, long, default_value = "model")]
        model: PathBuf,

        /// Path to the label file
        #[arg(short, long, default_value = "labels.txt")]
        labels: PathBuf,

        /// Label file layout
        #[arg(long, value_enum, default_value_t = LabelFormat::Indexed)]
        label_format: LabelFormat,

        /// Print one JSON object per image instead of text
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print the labels as they will be mapped to model outputs
    Labels {
        /// Path to the label file
        #[arg(short, long, default_value = "labels.txt")]
        labels: PathBuf,

        /// Label file layout
        #[arg(long, value_enum, default_value_t = LabelFormat::Indexed)]
        label_format: LabelFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_verbosity(cli.verbose)).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Predict {
            inputs,
            model,
            labels,
            label_format,
            json,
        } => run_predict(&inputs, &model, &labels, label_format, json),
        Commands::Labels {
            labels,
            label_format,
        } => run_labels(&labels, label_format),
    }
}

fn run_predict(
    inputs: &[PathBuf],
    model: &Path,
    labels: &Path,
    label_format: LabelFormat,
    json: bool,
) -> Result<()> {
    let predictor = load_predictor(model, labels, label_format)
        .with_context(|| format!("loading model {:?} with labels {:?}", model, labels))?;
    info!("Loaded labels: {:?}", predictor.labels().iter().collect::<Vec<_>>());

    let files = collect_images(inputs)?;
    if files.is_empty() {
        bail!("no images found in {:?}", inputs);
    }

    let mut failures = 0usize;
    for file in &files {
        info!("Predicting image: {:?}", file);
        match predictor.predict_file(file) {
            Ok(prediction) if json => print_json(file, &prediction)?,
            Ok(prediction) => print_text(file, &prediction),
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", "error".red().bold(), file.display(), e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} images failed", failures, files.len());
    }
    Ok(())
}

fn run_labels(labels: &Path, label_format: LabelFormat) -> Result<()> {
    let set = LabelSet::load(labels, label_format)?;
    println!("{} labels ({} format):", set.len(), label_format);
    for (index, label) in set.iter().enumerate() {
        println!("  {:>3}  {}", index, label);
    }
    Ok(())
}

/// Expand directories into their image files, sorted by name
fn collect_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("reading directory {:?}", input))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn print_text(file: &Path, prediction: &Prediction) {
    println!("{}", file.display().to_string().bold());
    let label = if prediction.is_out_of_range() {
        prediction.label.yellow()
    } else {
        prediction.label.green()
    };
    println!(
        "  Predicted Class: {}, Confidence: {:.4}",
        label, prediction.confidence
    );
}

fn print_json(file: &Path, prediction: &Prediction) -> Result<()> {
    let value = serde_json::json!({
        "image": file,
        "class": prediction.label,
        "confidence": prediction.confidence,
    });
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}
