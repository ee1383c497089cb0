//! CLI interface module
//!
//! Provides command-line interface using clap derive macros.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use crate::config::CliOverrides;

/// Exit codes for the CLI
///
/// These codes follow standard Unix conventions and provide specific error
/// categories for scripting and automation. Individual page failures do not
/// affect the exit code; they are reported, not fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidArgs = 2,
    /// Input path missing, or a directory without any page images
    InputNotFound = 3,
    OutputError = 4,
    ProcessingError = 5,
    /// Recognition engine failed to initialize
    EngineError = 6,
}

impl ExitCode {
    /// Convert to process exit code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Get human-readable description
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::InvalidArgs => "Invalid arguments",
            ExitCode::InputNotFound => "Input file or directory not found",
            ExitCode::OutputError => "Output error (permission denied, disk full, etc.)",
            ExitCode::ProcessingError => "Processing error",
            ExitCode::EngineError => "Recognition engine initialization error",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.code()
    }
}

/// Text extraction for scanned book pages
#[derive(Parser, Debug)]
#[command(name = "bookscan-ocr")]
#[command(version)]
#[command(about = "Extract text from scanned book pages", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a page image or a directory of pages
    Process(ProcessArgs),
    /// Show system information
    Info,
}

/// Arguments for the process command
#[derive(clap::Args, Debug)]
pub struct ProcessArgs {
    /// Input image file or directory of page images
    pub input: PathBuf,

    /// Output directory for reports and artifacts
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Book type: modern or ancient (unrecognized tags fall back to modern)
    #[arg(short, long = "book-type")]
    pub book_type: Option<String>,

    /// Recognition languages, comma-separated (e.g. es,en)
    #[arg(short, long, value_delimiter = ',')]
    pub lang: Vec<String>,

    /// Recognition engine executable
    #[arg(long)]
    pub engine: Option<PathBuf>,

    /// GPU device id (CPU when omitted)
    #[arg(long)]
    pub gpu: Option<u32>,

    /// Save the preprocessed image for each page
    #[arg(long)]
    pub save_preprocessed: bool,

    /// Skip preprocessing and recognize the raw image
    #[arg(long)]
    pub no_preprocess: bool,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl ProcessArgs {
    /// CLI overrides for merging with the configuration file
    pub fn to_overrides(&self) -> CliOverrides {
        CliOverrides {
            book_type: self.book_type.clone(),
            languages: if self.lang.is_empty() {
                None
            } else {
                Some(self.lang.clone())
            },
            engine_command: self.engine.clone(),
            gpu_id: self.gpu,
            preprocess: if self.no_preprocess { Some(false) } else { None },
            save_preprocessed: if self.save_preprocessed {
                Some(true)
            } else {
                None
            },
            output_dir: self.output.clone(),
            verbose: if self.verbose > 0 {
                Some(self.verbose)
            } else {
                None
            },
        }
    }
}

/// Create a progress bar for page processing
pub fn create_page_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb
}

/// Create a spinner with a message
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb
}
