// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! shapecodec code generator CLI
//!
//! Loads a type library (TOML or JSON schema) and a codegen configuration,
//! then renders companion source, reports diagnostics, or runs values
//! through the runtime codecs.
//!
//! # Usage
//!
//! ```bash
//! # Companion source for every type marked generates_codec
//! shapecodec-gen generate --schema types.toml -o codecs.rs
//!
//! # Only some roots, with a custom configuration
//! shapecodec-gen generate --schema types.toml --config codegen.toml --type Person --type 'Order?'
//!
//! # Diagnostics only (non-zero exit on errors)
//! shapecodec-gen check --schema types.toml --json
//!
//! # JSON value -> hex bytes -> JSON value
//! shapecodec-gen encode --schema types.toml --type Person --value '{"name": "Ada", "age": 36}'
//! shapecodec-gen decode --schema types.toml --type Person --hex 03416461...
//! ```

mod hex;
mod json;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use shapecodec::{
    CodecUnit, CodegenConfig, Generator, RuntimeCodecs, RustSourceBackend, Severity, ShapeCache,
    ShapeRegistry, TypeShape,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shapecodec-gen")]
#[command(about = "Shape-driven binary codec generator")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render companion source for the given roots
    Generate {
        #[command(flatten)]
        inputs: Inputs,

        /// Root types (default: every type marked generates_codec)
        #[arg(short, long = "type", value_name = "TYPE")]
        types: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write the output even when generation reported errors
        #[arg(long)]
        allow_errors: bool,
    },

    /// List generation diagnostics
    Check {
        #[command(flatten)]
        inputs: Inputs,

        /// Root types (default: every type marked generates_codec)
        #[arg(short, long = "type", value_name = "TYPE")]
        types: Vec<String>,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode a JSON value and print the bytes as hex
    Encode {
        #[command(flatten)]
        inputs: Inputs,

        /// Type of the value
        #[arg(short, long = "type", value_name = "TYPE")]
        type_name: String,

        /// JSON value (default: read from --input or stdin)
        #[arg(long, conflicts_with = "input")]
        value: Option<String>,

        /// File holding the JSON value
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
    },

    /// Decode hex bytes and print the value as JSON
    Decode {
        #[command(flatten)]
        inputs: Inputs,

        /// Type of the value
        #[arg(short, long = "type", value_name = "TYPE")]
        type_name: String,

        /// Hex bytes (default: read from --input or stdin)
        #[arg(long, conflicts_with = "input")]
        hex: Option<String>,

        /// File holding the hex bytes
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Write a default configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "shapecodec.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct Inputs {
    /// Type library (.toml or .json)
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Codegen configuration (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Inputs {
    fn load(&self) -> anyhow::Result<(ShapeRegistry, CodegenConfig)> {
        let registry = ShapeRegistry::from_file(&self.schema)
            .with_context(|| format!("loading schema {}", self.schema.display()))?;
        let config = match &self.config {
            Some(path) => CodegenConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => CodegenConfig::default(),
        };
        tracing::debug!(
            "loaded {} types from {}",
            registry.len(),
            self.schema.display()
        );
        Ok((registry, config))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so generated output can be piped
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            inputs,
            types,
            output,
            allow_errors,
        } => cmd_generate(&inputs, &types, output.as_deref(), allow_errors),
        Commands::Check {
            inputs,
            types,
            json,
        } => cmd_check(&inputs, &types, json),
        Commands::Encode {
            inputs,
            type_name,
            value,
            input,
        } => cmd_encode(&inputs, &type_name, value, input.as_deref()),
        Commands::Decode {
            inputs,
            type_name,
            hex,
            input,
            pretty,
        } => cmd_decode(&inputs, &type_name, hex, input.as_deref(), pretty),
        Commands::GenConfig { output, force } => cmd_gen_config(&output, force),
    }
}

/// `Name`, `Name?`, or a JSON type shape (`{"kind": "collection", ...}`).
fn parse_type(text: &str) -> anyhow::Result<TypeShape> {
    let text = text.trim();
    if text.starts_with('{') {
        let shape: TypeShape =
            serde_json::from_str(text).with_context(|| format!("parsing type shape {}", text))?;
        return Ok(shape);
    }
    let (name, nullable) = match text.strip_suffix('?') {
        Some(name) => (name, true),
        None => (text, false),
    };
    if name.is_empty() {
        bail!("empty type name");
    }
    let shape = TypeShape::named(name);
    Ok(if nullable { shape.nullable() } else { shape })
}

fn generate_unit(
    registry: &ShapeRegistry,
    config: &CodegenConfig,
    types: &[String],
) -> anyhow::Result<CodecUnit> {
    let cache = ShapeCache::new();
    let generator = Generator::new(registry, config, &cache);
    let unit = if types.is_empty() {
        if !registry.iter().any(|o| o.generates_codec) {
            bail!("no --type given and no type is marked generates_codec");
        }
        generator.generate_library()?
    } else {
        let roots = types
            .iter()
            .map(|t| parse_type(t))
            .collect::<anyhow::Result<Vec<_>>>()?;
        generator.generate_all(&roots)?
    };
    tracing::info!(
        "generated {} procedures for {} roots",
        unit.procedures.len(),
        unit.entries.len()
    );
    Ok(unit)
}

fn error_count(unit: &CodecUnit) -> usize {
    unit.diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count()
}

fn cmd_generate(
    inputs: &Inputs,
    types: &[String],
    output: Option<&Path>,
    allow_errors: bool,
) -> anyhow::Result<()> {
    let (registry, config) = inputs.load()?;
    let unit = generate_unit(&registry, &config, types)?;
    for diagnostic in &unit.diagnostics {
        tracing::warn!("{}", diagnostic);
    }
    if unit.has_errors() && !allow_errors {
        bail!(
            "generation reported {} errors (run `check` for details, or pass --allow-errors)",
            error_count(&unit)
        );
    }

    let text = RustSourceBackend::new(&config.library).render(&unit)?;
    match output {
        Some(path) => {
            std::fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "[OK] Wrote {} ({} entry types)",
                path.display(),
                unit.entries.len()
            );
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn cmd_check(inputs: &Inputs, types: &[String], json: bool) -> anyhow::Result<()> {
    let (registry, config) = inputs.load()?;
    let unit = generate_unit(&registry, &config, types)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&unit.diagnostics)?);
    } else if unit.diagnostics.is_empty() {
        println!(
            "[OK] {} entry types, {} procedures, no diagnostics",
            unit.entries.len(),
            unit.procedures.len()
        );
    } else {
        for (idx, diagnostic) in unit.diagnostics.iter().enumerate() {
            println!("  {}. {}", idx + 1, diagnostic);
        }
    }

    if unit.has_errors() {
        bail!("{} errors", error_count(&unit));
    }
    Ok(())
}

fn read_input(inline: Option<String>, path: Option<&Path>) -> anyhow::Result<String> {
    if let Some(text) = inline {
        return Ok(text);
    }
    if let Some(path) = path {
        return std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("reading stdin")?;
    Ok(text)
}

fn cmd_encode(
    inputs: &Inputs,
    type_name: &str,
    inline: Option<String>,
    input: Option<&Path>,
) -> anyhow::Result<()> {
    let (registry, config) = inputs.load()?;
    let shape = parse_type(type_name)?;
    let text = read_input(inline, input)?;
    let parsed: serde_json::Value = serde_json::from_str(&text).context("parsing JSON value")?;
    let value = json::to_value(&registry, &shape, &parsed)?;

    let codecs = RuntimeCodecs::new(registry, config);
    let bytes = codecs.encode(&shape, &value)?;
    tracing::debug!("encoded {} bytes", bytes.len());
    println!("{}", hex::encode(&bytes));
    Ok(())
}

fn cmd_decode(
    inputs: &Inputs,
    type_name: &str,
    inline: Option<String>,
    input: Option<&Path>,
    pretty: bool,
) -> anyhow::Result<()> {
    let (registry, config) = inputs.load()?;
    let shape = parse_type(type_name)?;
    let bytes = hex::decode(&read_input(inline, input)?)?;

    let codecs = RuntimeCodecs::new(registry, config);
    let value = codecs.decode(&shape, &bytes)?;
    let output = json::from_value(&value);
    if pretty {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output);
    }
    Ok(())
}

fn cmd_gen_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", output.display());
    }
    let text = CodegenConfig::default().to_toml_string()?;
    std::fs::write(output, text).with_context(|| format!("writing {}", output.display()))?;
    println!("[OK] Generated configuration: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapecodec::shape::ShapeKind;

    #[test]
    fn test_parse_type_name_and_nullable() {
        assert_eq!(parse_type("Person").expect("name"), TypeShape::named("Person"));
        assert_eq!(
            parse_type(" Person? ").expect("nullable"),
            TypeShape::named("Person").nullable()
        );
        assert!(parse_type("?").is_err());
    }

    #[test]
    fn test_parse_type_json_shape() {
        let shape = parse_type(
            r#"{"kind": "collection", "element": {"kind": "primitive", "primitive": "i32"}}"#,
        )
        .expect("json");
        assert!(matches!(shape.kind, ShapeKind::Collection(_)));
        assert_eq!(shape.type_name(), "List<i32>");
    }
}
