//! bookscan-ocr - Text extraction for scanned book pages
//!
//! CLI entry point

use bookscan_ocr::{
    cli::{create_page_progress_bar, create_spinner},
    report, util, BookError, BookOptions, Cli, Commands, Config, ExitCode, OcrPipeline,
    PageOptions, ProcessArgs, ProgressCallback, RecognizerConfig, RunSettings,
    SubprocessRecognizer,
};
use clap::Parser;
use indicatif::ProgressBar;
use std::time::Instant;

fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Process(args) => run_process(&args),
        Commands::Info => run_info(),
    };

    std::process::exit(code.code());
}

// ============ Progress Callback Implementations ============

/// Verbose progress callback for CLI output
struct VerboseProgress {
    verbose_level: u8,
}

impl VerboseProgress {
    fn new(verbose_level: u8) -> Self {
        Self { verbose_level }
    }
}

impl ProgressCallback for VerboseProgress {
    fn on_step_start(&self, step: &str) {
        if self.verbose_level > 0 {
            println!("  {}", step);
        }
    }

    fn on_step_progress(&self, current: usize, total: usize) {
        if self.verbose_level > 0 {
            println!("    Progress: {}/{}", current, total);
        }
    }

    fn on_step_complete(&self, step: &str, message: &str) {
        if self.verbose_level > 0 {
            println!("    {}: {}", step, message);
        }
    }

    fn on_debug(&self, message: &str) {
        if self.verbose_level > 1 {
            println!("    [DEBUG] {}", message);
        }
    }
}

/// Progress-bar callback for quiet multi-page runs
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        Self {
            bar: create_page_progress_bar(0),
        }
    }
}

impl ProgressCallback for BarProgress {
    fn on_step_start(&self, step: &str) {
        self.bar.set_message(step.to_string());
    }

    fn on_step_progress(&self, current: usize, total: usize) {
        if self.bar.length() == Some(0) {
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(current as u64);
    }

    fn on_step_complete(&self, _step: &str, _message: &str) {}

    fn on_debug(&self, _message: &str) {}
}

// ============ Process Command ============

fn run_process(args: &ProcessArgs) -> ExitCode {
    let start_time = Instant::now();

    if !args.input.exists() {
        eprintln!("Error: Input path does not exist: {}", args.input.display());
        return ExitCode::InputNotFound;
    }

    // Load config file if specified, otherwise use the default search path
    let file_config = match &args.config {
        Some(config_path) => match Config::load_from_path(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                Config::default()
            }
        },
        None => Config::load().unwrap_or_default(),
    };

    let settings = file_config.merge_with_cli(&args.to_overrides());

    if let Err(e) = util::ensure_dir_writable(&settings.output_dir) {
        eprintln!("Error: {}", e);
        return ExitCode::OutputError;
    }

    let recognizer_config = RecognizerConfig::builder()
        .command(settings.engine_command.clone())
        .languages(settings.languages.clone())
        .device(settings.device)
        .timeout(settings.timeout)
        .build();

    let spinner =
        (settings.verbose == 0).then(|| create_spinner("Initializing recognition engine..."));
    let recognizer = SubprocessRecognizer::new(recognizer_config);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let recognizer = match recognizer {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::EngineError;
        }
    };

    let pipeline = OcrPipeline::new(recognizer, settings.book_type, settings.languages.clone());

    let code = if args.input.is_dir() {
        process_directory(&pipeline, args, &settings)
    } else {
        process_single_image(&pipeline, args, &settings)
    };

    if code == ExitCode::Success {
        println!(
            "Completed in {}",
            util::format_duration(start_time.elapsed().as_secs_f64())
        );
    }
    code
}

fn process_directory(
    pipeline: &OcrPipeline<SubprocessRecognizer>,
    args: &ProcessArgs,
    settings: &RunSettings,
) -> ExitCode {
    let options = BookOptions {
        preprocess: settings.preprocess,
        save_preprocessed: settings.save_preprocessed,
        output_dir: Some(settings.output_dir.clone()),
        extensions: settings.extensions.clone(),
    };

    let result = if settings.verbose > 0 {
        pipeline.process_book(&args.input, &options, &VerboseProgress::new(settings.verbose))
    } else {
        let progress = BarProgress::new();
        let result = pipeline.process_book(&args.input, &options, &progress);
        progress.bar.finish_and_clear();
        result
    };

    match result {
        Ok(book) => {
            println!(
                "Pages processed: {}/{}",
                book.book_info.successful_pages, book.book_info.total_pages
            );
            println!("Total words: {}", book.statistics.total_words);
            println!(
                "Average confidence: {:.2}%",
                book.statistics.average_confidence * 100.0
            );

            for page in book.pages.iter().filter(|p| !p.is_success()) {
                eprintln!("Page {} ({}) failed", page.page_number(), page.filename());
            }

            println!("Results written to {}", settings.output_dir.display());
            ExitCode::Success
        }
        Err(BookError::NoImagesFound(dir)) => {
            eprintln!("Error: No page images found in {}", dir.display());
            ExitCode::InputNotFound
        }
        Err(BookError::InvalidInput(path)) => {
            eprintln!("Error: Not a directory: {}", path.display());
            ExitCode::InvalidArgs
        }
        Err(BookError::Report(e)) => {
            eprintln!("Error: {}", e);
            ExitCode::OutputError
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::GeneralError
        }
    }
}

fn process_single_image(
    pipeline: &OcrPipeline<SubprocessRecognizer>,
    args: &ProcessArgs,
    settings: &RunSettings,
) -> ExitCode {
    let options = PageOptions {
        preprocess: settings.preprocess,
        save_preprocessed: settings.save_preprocessed,
        output_dir: Some(settings.output_dir.clone()),
    };

    let progress = VerboseProgress::new(settings.verbose);
    match pipeline.process_page(&args.input, &options, &progress) {
        Ok(page) => {
            if settings.verbose > 0 {
                println!("\n--- EXTRACTED TEXT ---\n{}\n", page.text);
            }
            println!("Detections: {}", page.metrics.detection_count);
            println!("Words: {}", page.metrics.word_count);
            println!(
                "Average confidence: {:.2}%",
                page.metrics.average_confidence * 100.0
            );

            if let Err(e) = report::write_page(&page, &settings.output_dir) {
                eprintln!("Error: {}", e);
                return ExitCode::OutputError;
            }

            println!("Results written to {}", settings.output_dir.display());
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::ProcessingError
        }
    }
}

// ============ Info Command ============

fn run_info() -> ExitCode {
    println!("bookscan-ocr {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("System Information");
    println!("  Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    println!(
        "  Default engine: {}",
        RecognizerConfig::default().command.display()
    );
    println!(
        "  Default languages: {}",
        RecognizerConfig::default().languages.join(", ")
    );
    ExitCode::Success
}
