//! Command-line interface for the zman expression language.
//!
//! Three subcommands: `eval` runs a single formula and prints its result,
//! `batch` runs a TOML file of named formulas, `check` lexes, parses and
//! validates a formula without evaluating it.

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::arena::Arena;
use crate::ast::Expr;
use crate::astro::NoaaSunCalculator;
use crate::batch::evaluate_batch;
use crate::config::RunConfig;
use crate::context::EvaluationContext;
use crate::executor;
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::parser::Parser as FormulaParser;
use crate::validator;
use chrono::NaiveDate;

#[derive(Parser)]
#[command(name = "zmanim-eval")]
#[command(about = "Evaluate zman expression formulas", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a single formula
    Eval {
        /// Formula source, e.g. "visible_sunrise - 72min"
        formula: String,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Evaluate every formula in a TOML file of name -> formula strings
    Batch {
        /// Path to a TOML file mapping formula names to source text
        path: PathBuf,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Lex, parse and validate a formula without evaluating it
    Check {
        /// Formula source
        formula: String,
    },
}

#[derive(clap::Args)]
pub struct LocationArgs {
    #[arg(long)]
    latitude: Option<f64>,
    #[arg(long)]
    longitude: Option<f64>,
    #[arg(long)]
    elevation: Option<f64>,
    #[arg(long)]
    timezone: Option<String>,
    /// ISO `YYYY-MM-DD`, defaults to the config file's date or today
    #[arg(long)]
    date: Option<String>,
}

pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "warn");
    }
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Eval { formula, location } => cmd_eval(&formula, location),
        Commands::Batch { path, location } => cmd_batch(&path, location),
        Commands::Check { formula } => cmd_check(&formula),
    }
}

fn resolved_config(location: LocationArgs) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let cwd = env::current_dir()?;
    let mut config = RunConfig::load(&cwd)?.unwrap_or_default();
    log::debug!("base config: {:?}", config.timezone);

    if let Some(lat) = location.latitude {
        config.latitude = lat;
    }
    if let Some(lon) = location.longitude {
        config.longitude = lon;
    }
    if let Some(elevation) = location.elevation {
        config.elevation_m = elevation;
    }
    if let Some(tz) = location.timezone {
        config.timezone = tz;
    }
    if let Some(date) = location.date {
        config.date = Some(date);
    }
    Ok(config)
}

fn resolved_date(config: &RunConfig) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match config.parsed_date()? {
        Some(date) => Ok(date),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn cmd_eval(formula: &str, location: LocationArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolved_config(location)?;
    let date = resolved_date(&config)?;
    let tz = config.timezone()?;
    log::trace!("evaluating formula against {date} at ({}, {})", config.latitude, config.longitude);

    let mut interner = Interner::new();
    let (tokens, lex_errors) = Lexer::new(formula).lex(&mut interner);
    if !lex_errors.is_empty() {
        for e in &lex_errors {
            eprintln!("{}", e.display_with_source(formula));
        }
        return Err("lexing failed".into());
    }

    let arena: Arena<Expr<'_>> = Arena::new();
    let (root, parse_errors) = FormulaParser::new(&tokens, &arena, &interner).parse();
    if !parse_errors.is_empty() {
        for e in &parse_errors {
            eprintln!("{}", e.display_with_source(formula));
        }
        return Err("parsing failed".into());
    }
    let root = root.ok_or("empty formula")?;

    let available = Default::default();
    let diags = validator::validate(root, &interner, None, &available);
    if !diags.is_empty() {
        for e in &diags {
            eprintln!("{}", e.display_with_source(formula));
        }
        return Err("validation failed".into());
    }

    let calculator = NoaaSunCalculator;
    let mut ctx = EvaluationContext::new(date, config.latitude, config.longitude, config.elevation_m, tz, &calculator);
    match executor::evaluate(root, &mut ctx, &interner) {
        Ok(value) => {
            println!("{}", format_value(&value));
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.display_with_source(formula));
            Err("evaluation failed".into())
        }
    }
}

fn cmd_batch(path: &PathBuf, location: LocationArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolved_config(location)?;
    let date = resolved_date(&config)?;
    let tz = config.timezone()?;

    let text = fs::read_to_string(path)?;
    let table: HashMap<String, String> = toml::from_str(&text)?;
    let mut formulas: Vec<(String, String)> = table.into_iter().collect();
    formulas.sort_by(|a, b| a.0.cmp(&b.0));
    log::debug!("loaded {} formulas from {}", formulas.len(), path.display());

    let calculator = NoaaSunCalculator;
    let result = evaluate_batch(&formulas, date, config.latitude, config.longitude, config.elevation_m, tz, &calculator);

    let mut names: Vec<&String> = result.results.keys().collect();
    names.sort();
    for name in names {
        println!("{name}: {}", format_value(&result.results[name]));
    }

    if let Some(cycle) = &result.cycle {
        eprintln!("cycle detected among formulas: {}", cycle.join(", "));
    }
    let mut err_names: Vec<&String> = result.errors.keys().collect();
    err_names.sort();
    for name in err_names {
        for diag in &result.errors[name] {
            eprintln!("{name}: {}", diag.message);
        }
    }

    if !result.errors.is_empty() || result.cycle.is_some() {
        return Err("one or more formulas failed".into());
    }
    Ok(())
}

fn cmd_check(formula: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut interner = Interner::new();
    let (tokens, lex_errors) = Lexer::new(formula).lex(&mut interner);
    if !lex_errors.is_empty() {
        for e in &lex_errors {
            eprintln!("{}", e.display_with_source(formula));
        }
        return Err("lexing failed".into());
    }

    let arena: Arena<Expr<'_>> = Arena::new();
    let (root, parse_errors) = FormulaParser::new(&tokens, &arena, &interner).parse();
    if !parse_errors.is_empty() || root.is_none() {
        for e in &parse_errors {
            eprintln!("{}", e.display_with_source(formula));
        }
        return Err("parsing failed".into());
    }

    let available = Default::default();
    let diags = validator::validate(root.unwrap(), &interner, None, &available);
    if !diags.is_empty() {
        for e in &diags {
            eprintln!("{}", e.display_with_source(formula));
        }
        return Err("validation failed".into());
    }

    println!("ok");
    Ok(())
}

fn format_value(value: &crate::value::Value) -> String {
    use crate::value::Value;
    match value {
        Value::Time(t) => t.format("%H:%M:%S %Z").to_string(),
        Value::Duration(minutes) => format!("{minutes} min"),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Boolean(b) => b.to_string(),
    }
}
