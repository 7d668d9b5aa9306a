//! biograph - dump biomedical sources as bulk-load tables.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use biograph::adapter::{AdapterContext, AdapterRegistry};
use biograph::export::read_summary;
use biograph::{DanglingPolicy, MergeRule, Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "biograph")]
#[command(about = "Biomedical knowledge graph ETL: deterministic bulk-load dumps")]
struct Cli {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./biograph.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dump one or more sources read from `<input>/<source>/nodes.jsonl[.gz]`
    Dump {
        /// Source names; each is also its output directory name
        sources: Vec<String>,

        /// Dump every source directory found under the input root
        #[arg(long, conflicts_with = "sources")]
        all: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long)]
        sample_size: Option<usize>,

        #[arg(long)]
        spill_threshold: Option<usize>,

        /// Abort instead of dropping edges whose endpoint is missing
        #[arg(long)]
        fail_on_dangling: bool,

        /// Union labels and properties of duplicate nodes instead of keeping the first
        #[arg(long)]
        union: bool,

        /// Dump all selected sources as one source with this name; earlier sources take precedence
        #[arg(long)]
        merged: Option<String>,
    },

    /// Print the edge summary of a published dump
    Summary {
        source: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Dump {
            sources,
            all,
            output,
            input,
            sample_size,
            spill_threshold,
            fail_on_dangling,
            union,
            merged,
        } => {
            if let Some(output) = output {
                config.output_root = output;
            }
            if let Some(input) = input {
                config.input_root = Some(input);
            }
            if let Some(n) = sample_size {
                config.sample_size = n;
            }
            if let Some(n) = spill_threshold {
                config.spill_threshold = n;
            }
            if fail_on_dangling {
                config.dangling = DanglingPolicy::Fail;
            }
            let rule = if union { MergeRule::Union } else { MergeRule::FirstSeen };

            let mut registry = AdapterRegistry::new();
            let names = if all {
                registry.discover_jsonl(&config.input_root(), rule)?;
                registry.names().map(str::to_string).collect()
            } else {
                for name in &sources {
                    registry.register_jsonl(name, rule)?;
                }
                sources
            };
            if names.is_empty() {
                bail!("no sources to dump");
            }

            let pipeline = Pipeline::new(config);
            let (names, results) = match merged {
                Some(merged) => {
                    let ctx = AdapterContext::new(pipeline.config().input_root());
                    let adapters = names.iter().map(|name| registry.build(name, &ctx)).collect::<Result<Vec<_>, _>>()?;
                    (vec![merged.clone()], vec![pipeline.run_merged(&merged, adapters, rule)])
                }
                None => {
                    let results = pipeline.run_registered(&registry, &names)?;
                    (names, results)
                }
            };
            let mut failed = 0;
            for (name, result) in names.iter().zip(results) {
                match result {
                    Ok(report) => println!(
                        "{name}: {} nodes, {} edges, {} dangling dropped, {} -> {}",
                        report.nodes_written,
                        report.edges_written,
                        report.dangling_dropped,
                        report.rejections,
                        report.dir.display()
                    ),
                    Err(err) => {
                        eprintln!("{name}: {err}");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of {} dumps failed", names.len());
            }
        }

        Command::Summary { source, output } => {
            let root = output.unwrap_or(config.output_root);
            let rows = read_summary(&root.join(&source))
                .with_context(|| format!("reading summary for {source}"))?;
            println!("source_ns\trel\ttarget_ns\tcount");
            for row in rows {
                println!("{}\t{}\t{}\t{}", row.source_ns, row.relation_type, row.target_ns, row.count);
            }
        }
    }

    Ok(())
}
