//! gplink CLI - Decode score files and evaluate predictions
//!
//! Usage:
//!   gplink spans <file>
//!   gplink triples <file>
//!   gplink tags <file>
//!   gplink classify <file>
//!   gplink eval <file>
//!
//! Score files are JSON documents written by an external encoder. Results
//! are printed to stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};

use gplink_core::{AppConfig, DecodeConfig, LoggingConfig, SubjectEnd};
use gplink_extractor::{
    bio_entities, ChunkF1, ClassificationDecoder, LabelScore, LabelVocab, Metric, MetricsReport,
    ScoreGrid, SequenceTagDecoder, Span, SpanDecoder, TaggedEntity, Triple, TripleDecoder,
};

#[derive(Parser)]
#[command(name = "gplink")]
#[command(about = "Decode global-pointer, GPLinker, BIO and classification outputs")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Score threshold (scores strictly above are positive)
    #[arg(long, global = true, allow_hyphen_values = true)]
    threshold: Option<f32>,

    /// Leading special tokens to strip from decoded offsets
    #[arg(long, global = true)]
    prefix_tokens: Option<usize>,

    /// Subject-end field of decoded triples (head or tail)
    #[arg(long, global = true)]
    subject_end: Option<SubjectEnd>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode entity spans from a global-pointer grid
    Spans {
        /// JSON file with `labels`, `scores` [C][L][L] and optional `mask` [L]
        file: PathBuf,
    },
    /// Decode relation triples from GPLinker grids
    Triples {
        /// JSON file with `predicates`, `span_scores`, `head_scores`,
        /// `tail_scores` and optional `mask`
        file: PathBuf,
    },
    /// Decode entities from a BIO tag sequence
    Tags {
        /// JSON file with `tags`, or `labels` and `ids`
        file: PathBuf,
    },
    /// Rank classification labels
    Classify {
        /// JSON file with `labels` and `logits`
        file: PathBuf,
    },
    /// Chunk F1 of predicted against gold BIO sequences
    Eval {
        /// JSON lines file, one `{"predicted": [...], "gold": [...]}` per line
        file: PathBuf,

        /// Exit with an error when F1 is below this value
        #[arg(long)]
        min_f1: Option<f32>,
    },
}

#[derive(Debug, Deserialize)]
struct SpansInput {
    labels: Vec<String>,
    scores: Vec<Vec<Vec<f32>>>,
    #[serde(default)]
    mask: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
struct TriplesInput {
    predicates: Vec<String>,
    span_scores: Vec<Vec<Vec<f32>>>,
    head_scores: Vec<Vec<Vec<f32>>>,
    tail_scores: Vec<Vec<Vec<f32>>>,
    #[serde(default)]
    mask: Option<Vec<i64>>,
}

/// Either tag names, or tag ids with their vocabulary
#[derive(Debug, Deserialize)]
struct TagsInput {
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    labels: Option<Vec<String>>,
    #[serde(default)]
    ids: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize)]
struct ClassifyInput {
    labels: Vec<String>,
    logits: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EvalLine {
    predicted: Vec<String>,
    gold: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
    precision: f32,
    recall: f32,
    f1: f32,
    examples: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging);

    tracing::debug!("Decode configuration: {:?}", config.decode);

    let output = match &cli.command {
        Commands::Spans { file } => {
            serde_json::to_string_pretty(&decode_spans(&read_input(file)?, &config.decode)?)?
        }
        Commands::Triples { file } => {
            serde_json::to_string_pretty(&decode_triples(&read_input(file)?, &config.decode)?)?
        }
        Commands::Tags { file } => {
            serde_json::to_string_pretty(&decode_tags(&read_input(file)?)?)?
        }
        Commands::Classify { file } => {
            serde_json::to_string_pretty(&classify(&read_input(file)?)?)?
        }
        Commands::Eval { file, min_f1 } => {
            let report = evaluate(&read_input(file)?)?;
            eprintln!("{}", report.report());

            let counts = report
                .sections
                .first()
                .map(|(_, counts)| *counts)
                .unwrap_or_default();
            let output = serde_json::to_string_pretty(&EvalOutput {
                precision: counts.precision(),
                recall: counts.recall(),
                f1: counts.f1_score(),
                examples: report.num_examples,
            })?;

            if let Some(min_f1) = min_f1 {
                if !report.meets(*min_f1) {
                    println!("{}", output);
                    bail!("chunk F1 {:.4} is below {:.4}", counts.f1_score(), min_f1);
                }
            }
            output
        }
    };

    println!("{}", output);
    Ok(())
}

/// Defaults, then the config file, then the environment, then flags
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let mut config = config.with_env_override()?;

    if let Some(threshold) = cli.threshold {
        config.decode.threshold = threshold;
    }
    if let Some(prefix_tokens) = cli.prefix_tokens {
        config.decode.prefix_tokens = prefix_tokens;
    }
    if let Some(subject_end) = cli.subject_end {
        config.decode.subject_end = subject_end;
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Convert nested JSON rows into a `[C, L, L]` array, rejecting ragged input
fn to_array3(name: &str, nested: Vec<Vec<Vec<f32>>>) -> anyhow::Result<Array3<f32>> {
    let channels = nested.len();
    let rows = nested.first().map_or(0, Vec::len);
    let cols = nested.first().and_then(|c| c.first()).map_or(0, Vec::len);

    let mut values = Vec::with_capacity(channels * rows * cols);
    for (c, channel) in nested.into_iter().enumerate() {
        if channel.len() != rows {
            bail!("{name}: channel {c} has {} rows, expected {rows}", channel.len());
        }
        for (r, row) in channel.into_iter().enumerate() {
            if row.len() != cols {
                bail!(
                    "{name}: row {r} of channel {c} has {} columns, expected {cols}",
                    row.len()
                );
            }
            values.extend(row);
        }
    }

    Array3::from_shape_vec((channels, rows, cols), values)
        .with_context(|| format!("{name}: invalid shape"))
}

fn attach_mask<'a>(grid: ScoreGrid<'a>, mask: Option<&[i64]>) -> anyhow::Result<ScoreGrid<'a>> {
    Ok(match mask {
        Some(mask) => grid.with_attention_mask(mask)?,
        None => grid,
    })
}

fn decode_spans(input: &str, config: &DecodeConfig) -> anyhow::Result<Vec<Span>> {
    let input: SpansInput = serde_json::from_str(input).context("Invalid spans input")?;
    let scores = to_array3("scores", input.scores)?;
    let grid = attach_mask(ScoreGrid::new(scores.view())?, input.mask.as_deref())?;

    let decoder = SpanDecoder::from_config(LabelVocab::new(input.labels)?, config);
    let spans = decoder.decode(&grid)?;

    Ok(spans
        .iter()
        .filter_map(|span| span.without_prefix(config.prefix_tokens))
        .collect())
}

fn decode_triples(input: &str, config: &DecodeConfig) -> anyhow::Result<Vec<Triple>> {
    let input: TriplesInput = serde_json::from_str(input).context("Invalid triples input")?;
    let spans = to_array3("span_scores", input.span_scores)?;
    let heads = to_array3("head_scores", input.head_scores)?;
    let tails = to_array3("tail_scores", input.tail_scores)?;

    let span_grid = attach_mask(ScoreGrid::new(spans.view())?, input.mask.as_deref())?;
    let head_grid = ScoreGrid::new(heads.view())?;
    let tail_grid = ScoreGrid::new(tails.view())?;

    let decoder = TripleDecoder::from_config(LabelVocab::new(input.predicates)?, config);
    let triples = decoder.decode(&span_grid, &head_grid, &tail_grid)?;

    let mut triples: Vec<Triple> = triples
        .iter()
        .filter_map(|triple| triple.without_prefix(config.prefix_tokens))
        .collect();
    triples.sort();
    Ok(triples)
}

fn decode_tags(input: &str) -> anyhow::Result<Vec<TaggedEntity>> {
    let input: TagsInput = serde_json::from_str(input).context("Invalid tags input")?;

    match input {
        TagsInput {
            tags: Some(tags),
            ids: None,
            ..
        } => Ok(bio_entities(&tags)?),
        TagsInput {
            tags: None,
            labels: Some(labels),
            ids: Some(ids),
        } => Ok(SequenceTagDecoder::new(LabelVocab::new(labels)?).decode_ids(&ids)?),
        _ => bail!("tags input needs either `tags` or both `labels` and `ids`"),
    }
}

fn classify(input: &str) -> anyhow::Result<Vec<LabelScore>> {
    let input: ClassifyInput = serde_json::from_str(input).context("Invalid classify input")?;
    let decoder = ClassificationDecoder::new(LabelVocab::new(input.labels)?);

    Ok(decoder.decode(Array1::from(input.logits).view())?)
}

fn evaluate(input: &str) -> anyhow::Result<MetricsReport> {
    let mut metric = ChunkF1::new();

    for (number, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line: EvalLine = serde_json::from_str(line)
            .with_context(|| format!("Invalid eval record on line {}", number + 1))?;
        metric
            .accumulate(&line.predicted, &line.gold)
            .with_context(|| format!("Cannot score line {}", number + 1))?;
    }

    let mut report = MetricsReport::new(metric.examples());
    report.add("Chunk Extraction", metric.counts());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_to_array3_rejects_ragged_rows() {
        let ragged = vec![vec![vec![0.0, 1.0], vec![0.0]]];
        assert!(to_array3("scores", ragged).is_err());

        let ragged_channels = vec![vec![vec![0.0]], vec![]];
        assert!(to_array3("scores", ragged_channels).is_err());

        let ok = to_array3("scores", vec![vec![vec![0.0, 1.0], vec![2.0, 3.0]]]).unwrap();
        assert_eq!(ok.shape(), &[1, 2, 2]);
        assert_eq!(ok[[0, 1, 0]], 2.0);
    }

    #[test]
    fn test_decode_spans_strips_prefix() {
        let input = r#"{
            "labels": ["PER"],
            "scores": [[[5.0, -1.0, -1.0], [-1.0, 2.0, -1.0], [-1.0, -1.0, 3.0]]],
            "mask": [1, 1, 0]
        }"#;

        let spans = decode_spans(input, &DecodeConfig::default()).unwrap();
        assert_eq!(spans, vec![Span::new(0, 0, "PER")]);
    }

    #[test]
    fn test_decode_triples_sorted() {
        let input = r#"{
            "predicates": ["p"],
            "span_scores": [[[-1, 1], [-1, 1]], [[1, -1], [-1, 1]]],
            "head_scores": [[[1, 1], [1, 1]]],
            "tail_scores": [[[1, 1], [1, 1]]]
        }"#;
        let config = DecodeConfig {
            prefix_tokens: 0,
            ..DecodeConfig::default()
        };

        let triples = decode_triples(input, &config).unwrap();
        let mut sorted = triples.clone();
        sorted.sort();
        assert_eq!(triples, sorted);
        assert!(triples.contains(&Triple::new((0, 0), "p", (0, 0))));
        assert!(triples.contains(&Triple::new((1, 1), "p", (1, 1))));
    }

    #[test]
    fn test_decode_tags() {
        let entities = decode_tags(r#"{"tags": ["O", "B-ORG", "I-ORG", "O"]}"#).unwrap();
        assert_eq!(entities, vec![TaggedEntity::new("ORG", 1, 2)]);

        let by_id = decode_tags(r#"{"labels": ["O", "B-ORG", "I-ORG"], "ids": [0, 1, 2, 0]}"#);
        assert_eq!(by_id.unwrap(), entities);

        assert!(decode_tags(r#"{"tags": ["B-"]}"#).is_err());
        assert!(decode_tags(r#"{"ids": [0]}"#).is_err());
    }

    #[test]
    fn test_classify() {
        let ranked = classify(r#"{"labels": ["a", "b"], "logits": [0.0, 2.0]}"#).unwrap();
        assert_eq!(ranked[0].label, "b");
    }

    #[test]
    fn test_evaluate_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"predicted": ["B-PER", "I-PER", "O"], "gold": ["B-PER", "I-PER", "O"]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"predicted": ["O", "B-LOC"], "gold": ["O", "O"]}}"#).unwrap();

        let report = evaluate(&read_input(file.path()).unwrap()).unwrap();
        assert_eq!(report.num_examples, 2);

        let counts = report.sections[0].1;
        assert_eq!(counts.true_positives, 1);
        assert_eq!(counts.false_positives, 1);
        assert_eq!(counts.false_negatives, 0);
    }

    #[test]
    fn test_evaluate_reports_bad_line() {
        let err = evaluate("{\"predicted\": [\"O\"], \"gold\": []}").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_cli_flags_override_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[decode]\nthreshold = 0.5\nprefix_tokens = 2").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from([
            "gplink",
            "--config",
            path.as_str(),
            "--threshold",
            "-0.25",
            "--subject-end",
            "tail",
            "spans",
            "scores.json",
        ]);

        let config = load_config(&cli).unwrap();
        assert_eq!(config.decode.threshold, -0.25);
        assert_eq!(config.decode.subject_end, SubjectEnd::Tail);
    }
}
