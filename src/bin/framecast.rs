use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use walkdir::WalkDir;

const SOURCE_EXTENSIONS: [&str; 4] = ["tsx", "jsx", "ts", "js"];

#[derive(Parser, Debug)]
#[command(name = "framecast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite one artifact and print the result.
    Transform(TransformArgs),
    /// Print the classification profile of one artifact.
    Classify(ClassifyArgs),
    /// Transform every source file under a directory and print a summary line per file.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct TransformArgs {
    /// Input artifact.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Options JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full JSON result instead of the output text.
    #[arg(long)]
    report: bool,
}

#[derive(Parser, Debug)]
struct ClassifyArgs {
    /// Input artifact.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Directory to walk.
    #[arg(long)]
    dir: PathBuf,

    /// Options JSON file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchLine<'r> {
    path: String,
    used_fallback: bool,
    fallback_reason: Option<&'r str>,
    category: Option<&'static str>,
    bindings: usize,
    enhancements: usize,
    findings: usize,
    output_digest: &'r str,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Transform(args) => cmd_transform(args),
        Command::Classify(args) => cmd_classify(args),
        Command::Batch(args) => cmd_batch(args),
    }
}

fn read_options(path: Option<&Path>) -> anyhow::Result<framecast::TransformOptions> {
    let Some(path) = path else {
        return Ok(framecast::TransformOptions::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read options '{}'", path.display()))?;
    let options = framecast::TransformOptions::from_json(&json)
        .with_context(|| format!("parse options '{}'", path.display()))?;
    Ok(options)
}

/// The configured dialect wins over the file extension, which wins over sniffing.
fn read_artifact(path: &Path, dialect: Option<framecast::Dialect>) -> anyhow::Result<framecast::SourceArtifact> {
    let bytes = std::fs::read(path).with_context(|| format!("read artifact '{}'", path.display()))?;
    let artifact = framecast::SourceArtifact::from_bytes(&bytes)
        .with_context(|| format!("decode artifact '{}'", path.display()))?;
    Ok(match dialect.or_else(|| framecast::Dialect::from_path(path)) {
        Some(dialect) => framecast::SourceArtifact::with_dialect(artifact.text(), dialect),
        None => artifact,
    })
}

fn cmd_transform(args: TransformArgs) -> anyhow::Result<()> {
    let options = read_options(args.config.as_deref())?;
    let artifact = read_artifact(&args.in_path, options.dialect)?;
    let result = framecast::transform_artifact(&artifact, &options);

    if args.report {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", result.output_text);
    }
    Ok(())
}

fn cmd_classify(args: ClassifyArgs) -> anyhow::Result<()> {
    let artifact = read_artifact(&args.in_path, None)?;
    let profile = framecast::classify_text(artifact.text(), Some(artifact.dialect()))
        .with_context(|| format!("parse '{}'", args.in_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let options = read_options(args.config.as_deref())?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(&args.dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk '{}'", args.dir.display()))?;
        let is_source = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext));
        if entry.file_type().is_file() && is_source {
            paths.push(entry.into_path());
        }
    }

    let artifacts = paths
        .iter()
        .map(|path| read_artifact(path, options.dialect))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let results = framecast::transform_batch(&artifacts, &options);

    for (path, result) in paths.iter().zip(&results) {
        let line = BatchLine {
            path: path.display().to_string(),
            used_fallback: result.used_fallback,
            fallback_reason: result.fallback_reason.as_deref(),
            category: result.classification.as_ref().map(|c| c.primary_category.name()),
            bindings: result.bindings.len(),
            enhancements: result.applied_enhancements.len(),
            findings: result.findings.len(),
            output_digest: &result.output_digest,
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    tracing::info!(target: "framecast", files = results.len(), "batch complete");
    Ok(())
}
