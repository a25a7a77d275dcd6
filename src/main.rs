//! SafeSpace Stress CLI
//!
//! Feature extraction and late fusion for multimodal stress inference.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use safespace_stress::{
    audit::{create_shared_log_with_persistence, SharedAuditLog},
    config::Config,
    core::{
        average_probabilities, explain, Decision, Evidence, FeatureExtractor, FusionEngine,
        Modality, ReportBuilder, SensorRecord,
    },
    input::{
        parse_probabilities, parse_questionnaire, parse_voice_probabilities, read_batch_rows,
        read_window_probabilities_path, write_feature_matrix_csv,
    },
    VERSION,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "safespace-stress")]
#[command(version = VERSION)]
#[command(about = "Multimodal stress inference: feature extraction and late fusion", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract windowed features from a sensor CSV
    Extract {
        /// CSV with one column per sensor channel
        #[arg(long, short)]
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format (json or csv)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Fuse per-modality class probabilities into one decision
    Fuse {
        /// Physiological probabilities, e.g. "0.1,0.2,0.7"
        #[arg(long)]
        phys: Option<String>,

        /// Questionnaire model probabilities
        #[arg(long)]
        text: Option<String>,

        /// Voice model probabilities (must sum to 1)
        #[arg(long)]
        voice: Option<String>,

        /// Ignore the configured class priors
        #[arg(long)]
        no_priors: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Build a full stress report from per-window and per-modality probabilities
    Predict {
        /// CSV of per-window physiological class probabilities
        #[arg(long)]
        window_probs: PathBuf,

        /// Questionnaire model probabilities
        #[arg(long)]
        text_probs: String,

        /// Raw DASS-21 stress responses (7 values in 0..=3), recorded in the report
        #[arg(long)]
        questionnaire: Option<String>,

        /// Voice model probabilities (must sum to 1)
        #[arg(long)]
        voice: Option<String>,

        /// Sensor CSV the window probabilities came from; its extraction
        /// metadata is recorded in the report
        #[arg(long)]
        sensors: Option<PathBuf>,

        /// Report file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Fuse a 9-column probability matrix, one decision per row
    Batch {
        /// CSV with phys, text, voice x Low, Medium, High columns
        #[arg(long, short)]
        input: PathBuf,

        /// Ignore the configured class priors
        #[arg(long)]
        no_priors: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the feature names in vector order
    Features,

    /// Show configuration
    Config {
        /// Write the default configuration to the config file
        #[arg(long)]
        init: bool,
    },

    /// Show audit statistics
    Stats,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("safespace_stress=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Commands::Config { init } = cli.command {
        if let Err(e) = cmd_config(cli.config.as_deref(), init) {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.ensure_directories() {
        tracing::warn!(error = %e, "could not create data directories");
    }
    let audit = create_shared_log_with_persistence(config.data_path.join("audit.json"));

    let result = match cli.command {
        Commands::Extract {
            input,
            output,
            format,
        } => cmd_extract(&config, &audit, &input, output.as_deref(), &format),
        Commands::Fuse {
            phys,
            text,
            voice,
            no_priors,
            json,
        } => cmd_fuse(&config, &audit, phys, text, voice, no_priors, json),
        Commands::Predict {
            window_probs,
            text_probs,
            questionnaire,
            voice,
            sensors,
            output,
        } => cmd_predict(
            &config,
            &audit,
            &window_probs,
            &text_probs,
            questionnaire.as_deref(),
            voice.as_deref(),
            sensors.as_deref(),
            output.as_deref(),
        ),
        Commands::Batch {
            input,
            no_priors,
            json,
        } => cmd_batch(&config, &audit, &input, no_priors, json),
        Commands::Features => cmd_features(&config),
        Commands::Stats => {
            println!("{}", audit.summary());
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    };

    if let Err(e) = &result {
        audit.record_rejection();
        eprintln!("Error: {e:#}");
    }
    if let Err(e) = audit.save() {
        tracing::warn!(error = %e, "could not save audit stats");
    }
    if result.is_err() {
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}

fn cmd_extract(
    config: &Config,
    audit: &SharedAuditLog,
    input: &Path,
    output: Option<&Path>,
    format: &str,
) -> Result<()> {
    if format != "json" && format != "csv" {
        bail!("unknown format '{format}', expected json or csv");
    }

    let record = SensorRecord::from_csv_path(input)
        .with_context(|| format!("failed to read sensor CSV {}", input.display()))?;
    let extractor = FeatureExtractor::new(config.extraction.clone())?;
    let matrix = extractor.extract(&record)?;
    audit.record_extraction(matrix.n_windows() as u64, &matrix.degenerate);

    match (format, output) {
        ("csv", Some(path)) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_feature_matrix_csv(&matrix, file)?;
        }
        ("csv", None) => write_feature_matrix_csv(&matrix, std::io::stdout().lock())?,
        (_, Some(path)) => {
            let json = serde_json::to_string_pretty(&matrix)?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        (_, None) => println!("{}", serde_json::to_string_pretty(&matrix)?),
    }

    if let Some(path) = output {
        println!(
            "Extracted {} window(s) x {} feature(s) to {}",
            matrix.n_windows(),
            matrix.n_features(),
            path.display()
        );
        if matrix.degenerate.total() > 0 {
            println!("Zero-filled substitutions: {}", matrix.degenerate.total());
        }
    }
    Ok(())
}

fn cmd_fuse(
    config: &Config,
    audit: &SharedAuditLog,
    phys: Option<String>,
    text: Option<String>,
    voice: Option<String>,
    no_priors: bool,
    json: bool,
) -> Result<()> {
    let mut evidence = Evidence::new();
    if let Some(phys) = phys {
        evidence.insert(Modality::Phys, &parse_probabilities(&phys).context("--phys")?)?;
    }
    if let Some(text) = text {
        evidence.insert(Modality::Text, &parse_probabilities(&text).context("--text")?)?;
    }
    if let Some(voice) = voice {
        evidence.insert(Modality::Voice, &parse_voice_probabilities(&voice).context("--voice")?)?;
    }
    if evidence.is_empty() {
        tracing::warn!("no modality probabilities given, decision will be uniform");
    }

    let engine = FusionEngine::from_config(&config.fusion)?;
    let priors = if no_priors { None } else { engine.class_priors() };
    let decision = engine.decide_with(&evidence, priors);
    let explanation = explain(&engine, &evidence, &decision);
    audit.record_fusion();

    if json {
        let out = serde_json::json!({
            "decision": decision,
            "explanation": explanation,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_decision(&decision);
    println!();
    println!("Modality contributions:");
    for c in &explanation.contributions {
        println!(
            "  {:<14} predicts {:<6} confidence {:.3}  entropy {:.3}  score {:.3}  share {:.1}%",
            c.description,
            c.predicted.label(),
            c.confidence,
            c.entropy,
            c.contribution_score,
            c.effective_share * 100.0
        );
    }
    println!();
    println!("{}", explanation.summary);
    Ok(())
}

fn print_decision(decision: &Decision) {
    println!("Stress level: {}", decision.level);
    println!("Confidence:   {:.3}", decision.confidence);
    println!(
        "Fused:        Low {:.3}  Medium {:.3}  High {:.3}",
        decision.fused[0], decision.fused[1], decision.fused[2]
    );
    if decision.scores != decision.fused {
        println!(
            "After priors: Low {:.3}  Medium {:.3}  High {:.3}",
            decision.scores[0], decision.scores[1], decision.scores[2]
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_predict(
    config: &Config,
    audit: &SharedAuditLog,
    window_probs: &Path,
    text_probs: &str,
    questionnaire: Option<&str>,
    voice: Option<&str>,
    sensors: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let windows = read_window_probabilities_path(window_probs)
        .with_context(|| format!("failed to read {}", window_probs.display()))?;
    let phys = average_probabilities(&windows)?;
    tracing::info!(windows = windows.len(), ?phys, "averaged physiological probabilities");

    let mut evidence = Evidence::new().with(Modality::Phys, &phys)?;
    evidence.insert(
        Modality::Text,
        &parse_probabilities(text_probs).context("--text-probs")?,
    )?;
    if let Some(voice) = voice {
        evidence.insert(Modality::Voice, &parse_voice_probabilities(voice).context("--voice")?)?;
    }

    let mut builder = ReportBuilder::new();
    if let Some(path) = sensors {
        let record = SensorRecord::from_csv_path(path)
            .with_context(|| format!("failed to read sensor CSV {}", path.display()))?;
        let matrix = FeatureExtractor::new(config.extraction.clone())?.extract(&record)?;
        audit.record_extraction(matrix.n_windows() as u64, &matrix.degenerate);
        if matrix.n_windows() != windows.len() {
            tracing::warn!(
                feature_windows = matrix.n_windows(),
                probability_windows = windows.len(),
                "window counts differ between sensor record and probabilities"
            );
        }
        builder = builder.with_feature_matrix(&matrix);
    }
    builder = builder.with_physio_windows(windows.len());
    if let Some(values) = questionnaire {
        builder = builder.with_questionnaire(parse_questionnaire(values).context("--questionnaire")?);
    }

    let engine = FusionEngine::from_config(&config.fusion)?;
    let report = builder.build(&engine, &evidence);
    audit.record_fusion();

    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", report.explanation.summary);
            println!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_batch(
    config: &Config,
    audit: &SharedAuditLog,
    input: &Path,
    no_priors: bool,
    json: bool,
) -> Result<()> {
    let file = std::fs::File::open(input)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let rows = read_batch_rows(file)?;

    let engine = FusionEngine::from_config(&config.fusion)?;
    let priors = if no_priors { None } else { engine.class_priors() };
    let decisions = engine.decide_batch(&rows, priors)?;
    audit.record_fusions(decisions.len() as u64);

    if json {
        println!("{}", serde_json::to_string_pretty(&decisions)?);
        return Ok(());
    }

    for (i, decision) in decisions.iter().enumerate() {
        println!(
            "{:>5}  {:<6}  confidence {:.3}  [{:.3}, {:.3}, {:.3}]",
            i + 1,
            decision.level.label(),
            decision.confidence,
            decision.fused[0],
            decision.fused[1],
            decision.fused[2]
        );
    }
    Ok(())
}

fn cmd_features(config: &Config) -> Result<()> {
    let extractor = FeatureExtractor::new(config.extraction.clone())?;
    for (i, name) in extractor.feature_names().iter().enumerate() {
        println!("{i:>4}  {name}");
    }
    println!();
    println!(
        "{} features per window ({} channel(s), {}s windows, {}s stride)",
        extractor.feature_len(),
        config.extraction.channels.len(),
        config.extraction.window.as_secs_f64(),
        config.extraction.stride.as_secs_f64()
    );
    Ok(())
}

fn cmd_config(path: Option<&Path>, init: bool) -> Result<()> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    let config = if init {
        let config = Config::default();
        config
            .save_to(&config_path)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("Wrote default configuration to {}", config_path.display());
        config
    } else {
        load_config(path)?
    };

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", config_path.display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
