use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use sar_report::{
    DirectorySource, ImageScaling, PaperSize, RejectingConverter, ReportAssembler, ReportOptions,
    ReportRequest, SelectedService,
};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sarpdf", about = "Subject access request report tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a report from a manifest and a content directory
    Render {
        /// Manifest JSON: { "request": {...}, "services": [...] }
        #[arg(short, long)]
        manifest: PathBuf,

        /// Directory holding {service}/section.html and attachments
        #[arg(short, long)]
        content: PathBuf,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,

        /// Layout options JSON (defaults apply when omitted)
        #[arg(long)]
        options: Option<PathBuf>,

        /// Paper size, overriding the options file
        #[arg(long, value_enum)]
        paper: Option<PaperArg>,

        /// Image scaling, overriding the options file
        #[arg(long, value_enum)]
        image_scaling: Option<ScalingArg>,

        /// Generation date printed on the cover (YYYY-MM-DD, default today)
        #[arg(long)]
        generated_on: Option<NaiveDate>,
    },

    /// Show page count and text of a PDF
    Inspect {
        /// PDF file to inspect
        input: PathBuf,

        /// Print the text of every page
        #[arg(long)]
        text: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PaperArg {
    A4,
    Letter,
    Legal,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScalingArg {
    ShrinkToFit,
    Fit,
}

impl From<PaperArg> for PaperSize {
    fn from(arg: PaperArg) -> Self {
        match arg {
            PaperArg::A4 => Self::A4,
            PaperArg::Letter => Self::Letter,
            PaperArg::Legal => Self::Legal,
        }
    }
}

impl From<ScalingArg> for ImageScaling {
    fn from(arg: ScalingArg) -> Self {
        match arg {
            ScalingArg::ShrinkToFit => Self::ShrinkToFit,
            ScalingArg::Fit => Self::Fit,
        }
    }
}

/// One report to render
#[derive(Deserialize)]
struct Manifest {
    request: ReportRequest,
    services: Vec<SelectedService>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            manifest,
            content,
            output,
            options,
            paper,
            image_scaling,
            generated_on,
        } => {
            let bytes = tokio::fs::read(&manifest)
                .await
                .with_context(|| format!("reading manifest {}", manifest.display()))?;
            let manifest: Manifest =
                serde_json::from_slice(&bytes).context("parsing report manifest")?;

            let mut options = match options {
                Some(path) => ReportOptions::load(&path).await?,
                None => ReportOptions::default(),
            };
            if let Some(paper) = paper {
                options.paper_size = paper.into();
            }
            if let Some(scaling) = image_scaling {
                options.image_scaling = scaling.into();
            }

            let assembler =
                ReportAssembler::new(DirectorySource::new(content), RejectingConverter, options)?;
            let report = match generated_on {
                Some(date) => {
                    assembler
                        .render_report_on(&manifest.request, &manifest.services, date)
                        .await?
                }
                None => {
                    assembler
                        .render_report(&manifest.request, &manifest.services)
                        .await?
                }
            };
            sar_report::save_report(&report, &output).await?;

            let summary = &report.summary;
            println!("Report Summary:");
            println!("  Body pages: {}", summary.body_page_count);
            println!("  Final pages: {}", summary.final_page_count);
            println!("  Printed total: {}", summary.printed_total);
            for section in &summary.sections {
                println!(
                    "  {}: {} page(s) from page {}, {} attachment(s){}",
                    section.service_name,
                    section.pages,
                    section.first_page,
                    section.attachments,
                    if section.no_data_held { " (no data held)" } else { "" }
                );
            }
            println!("Rendered → {}", output.display());
        }

        Commands::Inspect { input, text } => {
            let doc = sar_report::load_pdf(&input).await?;
            let pages = doc.get_pages();
            println!("{}: {} page(s)", input.display(), pages.len());

            if text {
                for &page_number in pages.keys() {
                    println!("--- Page {} ---", page_number);
                    match sar_report::page_text(&doc, page_number) {
                        Ok(text) => println!("{}", text.trim_end()),
                        Err(e) => log::warn!("Page {}: text could not be extracted: {}", page_number, e),
                    }
                }
            }
        }
    }

    Ok(())
}
