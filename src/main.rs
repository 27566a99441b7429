//! form-merge - command line front end for the form merger
//!
//! Lists, fetches, creates and merges Google Forms. Results are printed as
//! JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use form_merge::config::Settings;
use form_merge::merge::{FormMerger, MergeError, MergeRequest};
use form_merge::provider::{FormsProvider, GoogleFormsClient};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for a merge whose items exist but whose navigation failed
const EXIT_PARTIAL_MERGE: u8 = 2;

#[derive(Parser)]
#[command(name = "form-merge", version, about = "Merge Google Forms with their branching intact")]
struct Cli {
    /// Read settings from this file instead of the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List form files visible to the configured account
    List,
    /// Print a form with all of its items
    Get {
        form_id: String,
    },
    /// Create an empty form
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        document_title: String,
    },
    /// Merge forms, in order, behind the introduction form
    Merge {
        #[arg(required = true)]
        form_ids: Vec<String>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        document_title: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "form_merge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?.with_overrides(|key| std::env::var(key).ok()),
        None => Settings::load()?,
    };
    let client = GoogleFormsClient::new(&settings)?;

    match cli.command {
        Command::List => print_json(&client.list_forms().await?)?,
        Command::Get { form_id } => print_json(
            &client
                .get_form(&form_id)
                .await
                .with_context(|| format!("Failed to get form {form_id}"))?,
        )?,
        Command::Create {
            title,
            document_title,
        } => print_json(
            &client
                .create_form(&title, &document_title)
                .await
                .context("Failed to create form")?,
        )?,
        Command::Merge {
            form_ids,
            title,
            document_title,
        } => {
            let mut request = MergeRequest::new(form_ids, title);
            if let Some(document_title) = document_title {
                request = request.with_document_title(document_title);
            }
            return run_merge(FormMerger::new(client, &settings), &request).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_merge<P: FormsProvider>(
    merger: FormMerger<P>,
    request: &MergeRequest,
) -> Result<ExitCode> {
    match merger.merge(request).await {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                eprintln!("warning: {warning}");
            }
            print_json(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(MergeError::Navigation {
            form,
            items_created,
            warnings,
            source,
        }) => {
            for warning in &warnings {
                eprintln!("warning: {warning}");
            }
            eprintln!(
                "warning: merged {items_created} items into {} but branching was not applied: {source}",
                form.id
            );
            print_json(&form)?;
            Ok(ExitCode::from(EXIT_PARTIAL_MERGE))
        }
        Err(err) => {
            let stage = err.stage();
            Err(anyhow::Error::new(err).context(format!("Merge failed at {stage}")))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
