use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use memo_extractor::export::DEFAULT_SHEET_NAME;
use memo_extractor::export::EXPORT_FILE_NAME;
use memo_extractor::helpers::logging::setup_logging;
use memo_extractor::read_workbook;
use memo_extractor::render_preview;
use memo_extractor::save_workbook;
use memo_extractor::ExtractionRun;
use memo_extractor::ExtractorConfig;
use memo_extractor::LabelMatching;
use std::path::PathBuf;

/// Extract memo fields from document tables into one spreadsheet
#[derive(Parser, Debug)]
#[command(name = "memo_extractor", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process documents and export the consolidated workbook.
    Extract {
        /// Documents to process (.docx, .docm, .odt); glob patterns are expanded
        #[arg(required = true)]
        files: Vec<String>,

        /// Path of the exported workbook
        #[arg(short, long, default_value = EXPORT_FILE_NAME)]
        output: PathBuf,

        /// Name of the worksheet
        #[arg(long, default_value = DEFAULT_SHEET_NAME)]
        sheet_name: String,

        /// Require labels to stand as whole words instead of matching any substring
        #[arg(long)]
        word_boundary: bool,

        /// Do not print the preview table
        #[arg(long)]
        no_preview: bool,

        /// Preview cell width in characters
        #[arg(long, default_value_t = 24)]
        max_width: usize,
    },

    /// Print the first worksheet of an exported workbook.
    Show {
        workbook: PathBuf,

        /// Preview cell width in characters
        #[arg(long, default_value_t = 24)]
        max_width: usize,
    },
}

fn main() -> Result<()> {
    setup_logging("info");
    let cli = Cli::parse();
    tracing::debug!("Parsed arguments: {:?}", cli);

    match cli.command {
        Command::Extract { files, output, sheet_name, word_boundary, no_preview, max_width } => {
            let config = ExtractorConfig {
                matching: if word_boundary { LabelMatching::WordBoundary } else { LabelMatching::Substring },
                sheet_name,
                output,
                ..ExtractorConfig::default()
            };
            extract(&config, &files, no_preview, max_width)
        }
        Command::Show { workbook, max_width } => {
            let workbook = read_workbook(&workbook)
                .with_context(|| format!("Failed to read workbook '{}'", workbook.display()))?;
            tracing::info!("Sheet '{}' has {} row(s)", workbook.sheet_name, workbook.rows.len());
            print!("{}", render_preview(&workbook.header, &workbook.rows, max_width));
            Ok(())
        }
    }
}

fn extract(config: &ExtractorConfig, files: &[String], no_preview: bool, max_width: usize) -> Result<()> {
    let mut run = ExtractionRun::new(config).context("Invalid extraction settings")?;
    for pattern in files {
        tracing::info!("Processing '{}'", pattern);
        run.process_pattern(pattern);
    }

    let report = run.finish().context("Nothing to export")?;
    if !no_preview {
        let header = report.dataset.header();
        let rows: Vec<Vec<&str>> = report.dataset.rows().collect();
        print!("{}", render_preview(&header, &rows, max_width));
    }

    save_workbook(&report.dataset, &config.sheet_name, &config.output)
        .with_context(|| format!("Failed to export '{}'", config.output.display()))?;

    tracing::info!(
        "Extraction complete: {} document(s) exported, {} failed",
        report.dataset.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        tracing::warn!("{}", failure);
    }
    Ok(())
}
