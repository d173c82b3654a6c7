use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kamel_traits::cli::{format_conditions, format_properties, format_resources, Args};
use kamel_traits::config::{apply_platform_defaults, load_document_file, IntegrationDocument};
use kamel_traits::traits::{Catalog, Environment};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // Load .env file if specified
    if let Some(ref env_file) = args.env_file {
        dotenvy::from_path(env_file)
            .with_context(|| format!("failed to load env file {}", env_file.display()))?;
    }

    let catalog = Arc::new(Catalog::default());

    if args.list_properties {
        print!("{}", format_properties(&catalog));
        return Ok(());
    }

    let mut documents = Vec::with_capacity(args.files.len());
    for path in &args.files {
        documents.push((path.clone(), load(path, &args)?));
    }

    // One pass per document, each owning its environment
    let passes: Vec<_> = documents
        .into_iter()
        .map(|(path, document)| {
            let catalog = Arc::clone(&catalog);
            let options = args.traits.clone();
            let handle = tokio::task::spawn_blocking(move || catalog.apply(document, options));
            (path, handle)
        })
        .collect();

    let mut results: Vec<(PathBuf, Environment)> = Vec::with_capacity(passes.len());
    for (path, handle) in passes {
        let env = handle
            .await
            .with_context(|| format!("trait pipeline for {} panicked", path.display()))?
            .with_context(|| format!("failed to apply traits to {}", path.display()))?;
        info!(
            "Resolved {}: {} traits applied, {} resources",
            path.display(),
            env.executed_traits.len(),
            env.resources.len()
        );
        results.push((path, env));
    }

    for (_, env) in &results {
        if args.dry_run {
            println!("{}", format_conditions(env));
        } else {
            print!("{}", format_resources(env, args.output)?);
        }
    }
    Ok(())
}

fn load(path: &Path, args: &Args) -> Result<IntegrationDocument> {
    let mut document = load_document_file(path)
        .with_context(|| format!("failed to load integration document {}", path.display()))?;
    apply_platform_defaults(&mut document, args.platform.as_deref())
        .context("failed to load platform defaults")?;
    if let Some(profile) = args.profile {
        document.integration.profile = Some(profile);
    }
    Ok(document)
}
