//! Manual Editor - command line access to drafts and previews
//!
//! Inspects the recovered draft (or a manual exported as JSON), renders its
//! per-audience preview and runs the pre-save checks.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manual_editor::core::config::AppConfig;
use manual_editor::app::validate_for_save;
use manual_editor::core::draft::{DraftRecord, DraftStore, FileDraftStore};
use manual_editor::core::service::validate_service_code;
use manual_editor::preview::{self, render};
use manual_editor::{BeneficiaryType, Lang, ManualDocument};

#[derive(Debug, Parser)]
#[command(name = "manual-editor", about = "Bilingual service manual tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render the per-audience preview
    Preview {
        /// Manual JSON file; defaults to the recovered draft
        #[arg(long)]
        file: Option<PathBuf>,
        /// Preview language (ar or en)
        #[arg(long)]
        lang: Option<Lang>,
        /// Audience to preview; repeat for tabs. Defaults to the manual's selection
        #[arg(long = "beneficiary")]
        beneficiaries: Vec<BeneficiaryType>,
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
    },
    /// List everything that would block saving
    Validate {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Inspect or delete the recovered draft
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
    /// Check a service code
    ServiceCode { code: String },
}

#[derive(Debug, Subcommand)]
enum DraftAction {
    Show,
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Html,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Using default config: {:#}", e);
        AppConfig::default()
    });

    match cli.command {
        Command::Preview {
            file,
            lang,
            beneficiaries,
            format,
        } => {
            let document = open_document(&config, file)?;
            let lang = lang.unwrap_or(config.editor.preview_lang);
            let selected = if beneficiaries.is_empty() {
                document.selected_beneficiaries.clone()
            } else {
                beneficiaries
            };
            let preview = preview::compose(&document, &selected, lang);
            let out = match format {
                Format::Markdown => render::preview_markdown(&preview),
                Format::Html => render::preview_html(&preview),
            };
            println!("{}", out);
        }
        Command::Validate { file } => {
            let document = open_document(&config, file)?;
            let errors = validate_for_save(&document);
            if errors.is_empty() {
                println!("ok");
            } else {
                for err in &errors {
                    println!("{}: {}", err.field(), err);
                }
                anyhow::bail!("{} problem(s) must be fixed before saving", errors.len());
            }
        }
        Command::Draft { action } => {
            let store = config.draft_store()?;
            match action {
                // Inspection only: a corrupt draft is reported, not cleared.
                DraftAction::Show => match read_draft(&store)? {
                    Some(record) => {
                        println!("{}", serde_json::to_string_pretty(&record)?);
                    }
                    None => println!("no draft"),
                },
                DraftAction::Clear => {
                    store.clear().context("Failed to clear draft")?;
                    tracing::info!("Cleared draft at {}", store.path().display());
                }
            }
        }
        Command::ServiceCode { code } => {
            validate_service_code(&code)?;
            println!("ok");
        }
    }

    Ok(())
}

/// Read a manual from a JSON file, or fall back to the recovered draft
fn open_document(config: &AppConfig, file: Option<PathBuf>) -> Result<ManualDocument> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manual: {}", path.display()));
    }

    let store = config.draft_store()?;
    read_draft(&store).map(|record| record.map(|r| r.document).unwrap_or_default())
}

/// Read the draft slot without touching it, even when it is corrupt
fn read_draft(store: &FileDraftStore) -> Result<Option<DraftRecord>> {
    let Some(payload) = store.read().context("Failed to read draft")? else {
        return Ok(None);
    };
    let record = DraftRecord::decode(&payload)
        .with_context(|| format!("Draft at {} is corrupt", store.path().display()))?;
    Ok(Some(record))
}
