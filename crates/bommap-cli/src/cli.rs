//! CLI argument definitions for the BOM mapping studio.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use bommap_map::DEFAULT_SCORE_THRESHOLD;

#[derive(Parser)]
#[command(
    name = "bommap",
    version,
    about = "BOM Mapping Studio - map spreadsheet columns onto a target schema",
    long_about = "Map arbitrary spreadsheet/tabular files onto a target column schema.\n\n\
                  Proposes fuzzy header mappings, derives tag and specification columns\n\
                  from ordered formula rules, generates composite Factwise IDs and\n\
                  exports the transformed table as CSV."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the header row of a tabular file.
    Headers(HeadersArgs),

    /// Propose a fuzzy mapping from a source file onto a target schema.
    Map(MapArgs),

    /// Run the full transformation and preview one page of the result.
    Transform(TransformArgs),

    /// Transform and export the result as CSV through a processing job.
    Export(ExportArgs),

    /// Inspect a template bundle file.
    Templates(TemplatesArgs),
}

#[derive(Parser)]
pub struct HeadersArgs {
    /// Tabular file to read (.xlsx or .csv).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Worksheet name (first sheet when omitted; ignored for CSV).
    #[arg(long = "sheet")]
    pub sheet: Option<String>,

    /// 1-based row the headers live in.
    #[arg(long = "header-row", value_name = "N", default_value_t = 1)]
    pub header_row: u32,
}

/// Source/target file pair shared by the workflow subcommands.
#[derive(Parser)]
pub struct WorkflowArgs {
    /// Source spreadsheet (.xlsx or .csv).
    #[arg(long = "source", value_name = "FILE")]
    pub source: PathBuf,

    /// Target schema file; its header row defines the output columns.
    #[arg(long = "target", value_name = "FILE")]
    pub target: PathBuf,

    /// Worksheet name in the source file.
    #[arg(long = "source-sheet")]
    pub source_sheet: Option<String>,

    /// 1-based header row in the source file.
    #[arg(long = "source-header-row", value_name = "N", default_value_t = 1)]
    pub source_header_row: u32,

    /// Worksheet name in the target file.
    #[arg(long = "target-sheet")]
    pub target_sheet: Option<String>,

    /// 1-based header row in the target file.
    #[arg(long = "target-header-row", value_name = "N", default_value_t = 1)]
    pub target_header_row: u32,

    /// Template bundle JSON applied to the session at upload.
    #[arg(long = "template", value_name = "FILE")]
    pub template: Option<PathBuf>,
}

#[derive(Parser)]
pub struct MapArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Minimum score for a pair to be proposed.
    #[arg(long = "threshold", default_value_t = DEFAULT_SCORE_THRESHOLD)]
    pub threshold: f64,

    /// Sample values shown per mapped source column.
    #[arg(long = "samples", value_name = "N", default_value_t = 3)]
    pub samples: usize,
}

/// Rule and derivation options shared by transform and export.
#[derive(Parser)]
pub struct RuleArgs {
    /// Formula rules JSON file (ordered array of rules).
    #[arg(long = "rules", value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Default values JSON file (object of target header to literal).
    #[arg(long = "defaults", value_name = "FILE")]
    pub defaults: Option<PathBuf>,

    /// Comma-separated target headers composing the Factwise ID.
    #[arg(long = "factwise", value_name = "COLS")]
    pub factwise: Option<String>,

    /// Separator between Factwise ID segments.
    #[arg(long = "separator", default_value = "-")]
    pub separator: String,

    /// Fail when a rule references a column missing from the output.
    #[arg(long = "strict")]
    pub strict: bool,
}

#[derive(Parser)]
pub struct TransformArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// 1-based page of the transformed table to show.
    #[arg(long = "page", value_name = "N", default_value_t = 1)]
    pub page: usize,

    /// Rows per page.
    #[arg(long = "page-size", value_name = "N", default_value_t = 20)]
    pub page_size: usize,
}

#[derive(Parser)]
pub struct ExportArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Directory the blob store writes uploads and exports under.
    #[arg(long = "output-dir", value_name = "DIR", default_value = "output")]
    pub output_dir: PathBuf,
}

#[derive(Parser)]
pub struct TemplatesArgs {
    /// Template bundle JSON file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
