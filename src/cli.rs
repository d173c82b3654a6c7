use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Profile;
use crate::traits::{Catalog, Environment};

#[derive(Parser, Debug)]
#[command(name = "kamel-traits")]
#[command(about = "Resolve trait configuration and generate the resources of integrations")]
#[command(version)]
pub struct Args {
    /// Integration documents (YAML or JSON)
    #[arg(required_unless_present = "list_properties")]
    pub files: Vec<PathBuf>,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Override the profile of every integration
    #[arg(long, env = "KAMEL_PROFILE", value_name = "PROFILE")]
    pub profile: Option<Profile>,

    /// Configure a trait property, e.g. -t service.type=NodePort (repeatable)
    #[arg(short = 't', long = "trait", value_name = "TRAIT.PROPERTY=VALUE")]
    pub traits: Vec<String>,

    /// Path to a .env file loaded before anything else
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Platform defaults used by documents without a platform section
    /// (defaults to ~/.kamel/platform.yaml)
    #[arg(long, value_name = "FILE")]
    pub platform: Option<PathBuf>,

    /// List every configurable trait property and exit
    #[arg(long)]
    pub list_properties: bool,

    /// Only report which traits would be applied
    #[arg(long)]
    pub dry_run: bool,

    /// Output format for generated resources
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("could not render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ============================================================================
// SBIO: Pure display logic (no I/O - returns formatted strings)
// ============================================================================

/// Format a simple table with headers and rows
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "Nothing to show.\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();
    let mut push_row = |cells: Vec<String>| {
        let last = cells.len().saturating_sub(1);
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                output.push_str("   ");
            }
            if i < last && i < widths.len() {
                output.push_str(&format!("{:width$}", cell, width = widths[i]));
            } else {
                output.push_str(cell);
            }
        }
        output.push('\n');
    };

    push_row(headers.iter().map(|h| h.to_uppercase()).collect());
    for row in rows {
        push_row(row);
    }
    output
}

/// Every configurable property, in catalog order. Platform traits are
/// marked with `*`.
pub fn format_properties(catalog: &Catalog) -> String {
    let rows = catalog
        .traits()
        .flat_map(|t| {
            let marker = if t.is_platform_trait() { "*" } else { "" };
            t.properties().iter().map(move |p| {
                vec![
                    format!("{}.{}{}", t.id(), p.name, marker),
                    p.kind.as_str().to_string(),
                    p.default.unwrap_or("").to_string(),
                    p.description.to_string(),
                ]
            })
        })
        .collect();
    format_table(&["property", "kind", "default", "description"], rows)
}

/// Decision taken for each trait during the configure phase
pub fn format_conditions(env: &Environment) -> String {
    let mut output = format!(
        "Integration: {}/{}\n",
        env.integration().namespace,
        env.integration().name
    );
    if let Some(strategy) = env.controller_strategy() {
        output.push_str(&format!("Controller strategy: {}\n", strategy));
    }
    output.push('\n');

    let rows = env
        .conditions
        .iter()
        .map(|c| {
            vec![
                c.trait_id.clone(),
                if c.enabled { "applied" } else { "skipped" }.to_string(),
                c.reason.clone().unwrap_or_default(),
            ]
        })
        .collect();
    output.push_str(&format_table(&["trait", "status", "reason"], rows));
    output
}

/// Generated resources as a `List`
pub fn format_resources(env: &Environment, format: OutputFormat) -> Result<String, FormatError> {
    let list = env.resources.to_list();
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&list)? + "\n",
        OutputFormat::Yaml => serde_yaml::to_string(&list)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntegrationDocument, IntegrationSpec, PlatformSpec};
    use std::sync::Arc;

    fn applied(source: &str) -> Environment {
        let doc = IntegrationDocument::new(IntegrationSpec::new("hello").with_source(source))
            .with_platform(PlatformSpec::default());
        Arc::new(Catalog::default()).apply(doc, Vec::new()).unwrap()
    }

    #[test]
    fn test_format_table_aligns_columns() {
        let output = format_table(
            &["name", "value"],
            vec![
                vec!["a".to_string(), "1".to_string()],
                vec!["longer".to_string(), "2".to_string()],
            ],
        );
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[0], "NAME     VALUE");
        assert_eq!(lines[1], "a        1");
        assert_eq!(lines[2], "longer   2");
    }

    #[test]
    fn test_format_table_empty() {
        assert_eq!(format_table(&["a"], Vec::new()), "Nothing to show.\n");
    }

    #[test]
    fn test_format_properties_marks_platform_traits() {
        let output = format_properties(&Catalog::default());
        assert!(output.contains("camel.runtime-version*"));
        assert!(output.contains("cron.schedule "));
        assert!(output.contains("keda.auto-metadata"));
    }

    #[test]
    fn test_format_conditions() {
        let env = applied("timer:tick?period=60000");
        let output = format_conditions(&env);
        assert!(output.contains("Controller strategy: cron-job"));
        assert!(output.contains("cron"));
        assert!(output.contains("controller strategy: cron-job"));
    }

    #[test]
    fn test_format_resources() {
        let env = applied("timer:tick?period=60000");
        let yaml = format_resources(&env, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("kind: CronJob"));
        let json = format_resources(&env, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "List");
        assert_eq!(value["items"][0]["kind"], "CronJob");
    }

    #[test]
    fn test_clap_parsing() {
        let args = Args::parse_from(["kamel-traits", "it.yaml"]);
        assert_eq!(args.files, vec![PathBuf::from("it.yaml")]);
        assert!(!args.dry_run);
        assert_eq!(args.output, OutputFormat::Yaml);
    }

    #[test]
    fn test_clap_trait_options() {
        let args = Args::parse_from([
            "kamel-traits",
            "-t",
            "service.type=NodePort",
            "--trait",
            "keda.enabled=true",
            "--profile",
            "knative",
            "-o",
            "json",
            "it.yaml",
        ]);
        assert_eq!(args.traits, vec!["service.type=NodePort", "keda.enabled=true"]);
        assert_eq!(args.profile, Some(Profile::Knative));
        assert_eq!(args.output, OutputFormat::Json);
    }

    #[test]
    fn test_clap_list_properties_needs_no_file() {
        let args = Args::parse_from(["kamel-traits", "--list-properties"]);
        assert!(args.list_properties);
        assert!(args.files.is_empty());
        assert!(Args::try_parse_from(["kamel-traits"]).is_err());
    }

    #[test]
    fn test_clap_verbose() {
        let args = Args::parse_from(["kamel-traits", "-vvv", "it.yaml"]);
        assert_eq!(args.verbose, 3);
    }
}
