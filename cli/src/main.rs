//! mediq CLI: evaluates queries and rule lists against a virtual environment.
//!
//! Subcommands:
//! - `eval <QUERY> [--media name=value...]` evaluate a query
//! - `rules <RULES> [--mask MASK] [--object]` resolve a rule list
//! - `shortcuts` print the registered shortcuts

use std::fmt;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mediq::prelude::*;
use mediq::{parse_object, ShortcutConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mediq")]
#[command(about = "Evaluate media queries and responsive rule lists")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query and print its canonical form and current value
    ///
    /// Examples:
    ///   mediq eval "@md" --media width=1000
    ///   mediq eval "not @mobile and (min-width: 800px)" --user-agent "..."
    Eval {
        /// The query, e.g. "@+md and not print"
        query: String,
        #[command(flatten)]
        env: EnvArgs,
        /// Print the evaluation tree
        #[arg(short, long)]
        trace: bool,
    },
    /// Resolve a rule list and print the active value
    ///
    /// Rules are `payload=>query` segments separated by `|`; a segment
    /// without `=>` is a default rule. With `--mask`, RULES holds only the
    /// payloads and MASK the queries, zipped in order.
    Rules {
        /// The rule list, e.g. "wide=>@+md|narrow"
        rules: String,
        /// Queries zipped with the payloads of RULES
        #[arg(short = 'k', long)]
        mask: Option<String>,
        /// Parse payloads as JSON5 literals and merge objects over the default
        #[arg(short, long)]
        object: bool,
        #[command(flatten)]
        env: EnvArgs,
        /// Print every rule with its match state
        #[arg(short, long)]
        trace: bool,
    },
    /// Print the registered preprocessors, breakpoints and environment shortcuts
    Shortcuts {
        #[command(flatten)]
        shortcuts: ShortcutArgs,
    },
}

/// Virtual environment options for evaluating subcommands.
#[derive(Args, Debug, Default)]
struct EnvArgs {
    /// Media features (format: name=value)
    ///
    /// Examples: width=1024, height=768, resolution=2, type=print, hover=none
    #[arg(short, long = "media", value_name = "NAME=VALUE")]
    media: Vec<String>,
    #[command(flatten)]
    shortcuts: ShortcutArgs,
}

/// Shortcut registry options.
#[derive(Args, Debug, Default)]
struct ShortcutArgs {
    /// Shortcut config file (.json, .yaml or .yml)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// User agent the device shortcuts are detected from
    #[arg(short, long)]
    user_agent: Option<String>,
    /// Report touch input as available
    #[arg(long)]
    touch: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "mediq=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Eval { query, env, trace } => cmd_eval(query, env, *trace),
        Commands::Rules {
            rules,
            mask,
            object,
            env,
            trace,
        } => cmd_rules(rules, mask.as_deref(), *object, env, *trace),
        Commands::Shortcuts { shortcuts } => cmd_shortcuts(shortcuts),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_eval(query: &str, env: &EnvArgs, trace: bool) -> Result<()> {
    let (_media, compiler) = build_environment(env)?;
    let condition = compiler.for_query(query);

    println!("{condition}");
    println!("{}", condition.matches());
    if trace {
        print!("{}", condition.trace());
    }
    Ok(())
}

fn cmd_rules(
    rules: &str,
    mask: Option<&str>,
    object: bool,
    env: &EnvArgs,
    trace: bool,
) -> Result<()> {
    let (_media, compiler) = build_environment(env)?;
    if object {
        let list = match mask {
            Some(mask) => RuleList::parse_tuple_with(rules, mask, &compiler, parse_object)?,
            None => RuleList::parse_with(rules, &compiler, parse_object),
        };
        report_rules(&list, trace);
    } else {
        let list = match mask {
            Some(mask) => RuleList::parse_tuple(rules, mask, &compiler)?,
            None => RuleList::parse(rules, &compiler),
        };
        report_rules(&list, trace);
    }
    Ok(())
}

fn cmd_shortcuts(args: &ShortcutArgs) -> Result<()> {
    let registry = build_registry(args)?;

    println!("Preprocessors (highest priority first):");
    for name in registry.preprocessors() {
        println!("  {name}");
    }

    println!("\nBreakpoints:");
    for (name, bp) in registry.breakpoints().entries() {
        println!("  @{name:<8} {bp}");
    }

    println!("\nEnvironment:");
    for (name, value) in registry.env().entries() {
        println!("  @{name:<8} {}", value.into_term());
    }
    Ok(())
}

fn report_rules<T: RuleValue + fmt::Display>(list: &RuleList<T>, trace: bool) {
    match (list.active_index(), list.active_value()) {
        (Some(index), Some(value)) => println!("[{index}] {value}"),
        _ => println!("(no match)"),
    }
    if trace {
        let trace = list.trace();
        for step in &trace.steps {
            let mark = if trace.active == Some(step.index) {
                "*"
            } else if step.matched {
                "+"
            } else {
                "-"
            };
            println!("{mark} [{}] {}", step.index, list.rules()[step.index]);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Environment assembly (composition root)
// ═══════════════════════════════════════════════════════════════════════════════

fn build_environment(env: &EnvArgs) -> Result<(VirtualMedia, QueryCompiler)> {
    let media = VirtualMedia::new(build_features(&env.media)?);
    let registry = build_registry(&env.shortcuts)?;
    let compiler = QueryCompiler::with_shortcuts(Rc::new(media.clone()), Arc::new(registry));
    Ok((media, compiler))
}

fn build_registry(args: &ShortcutArgs) -> Result<ShortcutRegistry> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ShortcutConfig::default(),
    };
    if let Some(user_agent) = &args.user_agent {
        config.user_agent = Some(user_agent.clone());
    }
    if args.touch {
        config.touch = Some(true);
    }
    Ok(config.build()?)
}

fn build_features(pairs: &[String]) -> Result<MediaFeatures> {
    let mut features = MediaFeatures::default();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid media pair \"{pair}\", expected name=value"))?;
        features.set(name.trim(), value.trim())?;
    }
    Ok(features)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Config loading
// ═══════════════════════════════════════════════════════════════════════════════

fn load_config(path: &Path) -> Result<ShortcutConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read \"{}\"", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config = if is_json {
        serde_json::from_str(&content).context("JSON parse error")?
    } else {
        // .yaml, .yml and anything else
        serde_yaml::from_str(&content).context("YAML parse error")?
    };
    tracing::debug!(path = %path.display(), "loaded shortcut config");
    Ok(config)
}
