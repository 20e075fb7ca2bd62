//! Converts a C-CDA document (already loaded as JSON) to FHIR.
//!
//! ```text
//! fhirconv --templates demos/templates --code-mapping demos/code_mapping.yaml CCD demos/ccd.json
//! fhirconv --config fhirconv.yaml CCD patient.json --out bundle.json
//! ```
//!
//! Set `RUST_LOG=fhirconv_render=debug` to see filter and render activity.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fhirconv_render::{Converter, ConverterConfig};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "fhirconv", about = "Render a C-CDA document into FHIR JSON")]
struct Cli {
    /// Converter configuration file (YAML).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Template directory; may be repeated, earlier directories win.
    #[arg(long = "templates", short = 't')]
    template_dirs: Vec<PathBuf>,

    /// Code mapping file (YAML or JSON).
    #[arg(long)]
    code_mapping: Option<PathBuf>,

    /// Let the conversion filters overwrite same-named filters.
    #[arg(long)]
    replace_filters: bool,

    /// Print the rendered text instead of the parsed FHIR.
    #[arg(long)]
    raw: bool,

    /// Write the output to a file instead of stdout.
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Name of the root template.
    template: String,

    /// The document as JSON.
    document: PathBuf,
}

impl Cli {
    /// Merges the optional config file with command-line overrides.
    fn converter_config(&self) -> Result<ConverterConfig> {
        let mut config = match &self.config {
            Some(path) => ConverterConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ConverterConfig::default(),
        };
        if !self.template_dirs.is_empty() {
            let mut dirs = self.template_dirs.clone();
            dirs.append(&mut config.template_dirs);
            config.template_dirs = dirs;
        }
        if self.code_mapping.is_some() {
            config.code_mapping = self.code_mapping.clone();
        }
        config.replace_filters |= self.replace_filters;
        Ok(config)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run(cli: &Cli) -> Result<String> {
    let config = cli.converter_config()?;
    let converter = Converter::from_config(&config).context("building converter")?;

    let source = fs::read_to_string(&cli.document)
        .with_context(|| format!("reading {}", cli.document.display()))?;
    let document: serde_json::Value = serde_json::from_str(&source)
        .with_context(|| format!("parsing {}", cli.document.display()))?;

    info!(template = %cli.template, document = %cli.document.display(), "converting");
    if cli.raw {
        Ok(converter.render_fhir_string(&cli.template, &document)?)
    } else {
        let fhir = converter.render_to_fhir(&cli.template, &document)?;
        Ok(serde_json::to_string_pretty(&fhir)?)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let exit_code = match run(&cli) {
        Ok(output) => match &cli.out {
            Some(path) => match fs::write(path, output) {
                Ok(()) => 0,
                Err(error) => {
                    eprintln!("error: writing {}: {error}", path.display());
                    1
                }
            },
            None => {
                println!("{output}");
                0
            }
        },
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn demos() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("demos")
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fhirconv").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_line_overrides_config() {
        let templates = demos().join("templates");
        let cli = cli(&[
            "--templates",
            templates.to_str().unwrap(),
            "--replace-filters",
            "CCD",
            "doc.json",
        ]);
        let config = cli.converter_config().unwrap();
        assert_eq!(config.template_dirs, vec![templates]);
        assert!(config.replace_filters);
        assert_eq!(config.code_mapping, None);
    }

    #[test]
    fn converts_demo_document() {
        let demos = demos();
        let cli = cli(&[
            "--templates",
            demos.join("templates").to_str().unwrap(),
            "--code-mapping",
            demos.join("code_mapping.yaml").to_str().unwrap(),
            "CCD",
            demos.join("ccd.json").to_str().unwrap(),
        ]);

        let bundle: serde_json::Value = serde_json::from_str(&run(&cli).unwrap()).unwrap();
        assert_eq!(bundle["resourceType"], "Bundle");
        let entries = bundle["entry"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["resource"]["resourceType"], "Patient");
        assert_eq!(entries[0]["resource"]["gender"], "female");
        assert_eq!(entries[1]["resource"]["status"], "final");
        assert_eq!(entries[2]["resource"]["effectiveDateTime"], "2014-10-01T10:30:26-05:00");
    }

    #[test]
    fn missing_document_is_reported() {
        let cli = cli(&["CCD", "/no/such/document.json"]);
        let err = run(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("reading /no/such/document.json"));
    }
}
