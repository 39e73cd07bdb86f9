//! vsort CLI: sort a CSV file with ORDER BY / LIMIT / OFFSET into NDJSON.

use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vsort_core::config::SortConfig;
use vsort_io::{
    CsvBlockReader, FileCacheConfig, FileCacheManager, JsonlWriter, LocalFileReader,
    SequentialReader,
};
use vsort_operators::{
    ExecContext, ExecNode, Expr, IterSource, OrderByExpr, SortNode, SortOptions, SortStats,
};

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "vsort")]
#[command(about = "Streaming bounded-memory sort with top-N retention", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort a CSV file and write the ordered rows as NDJSON
    Sort {
        #[command(flatten)]
        sort: SortArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stage the input through a local file cache in this directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Show the sort node and its plan without running it
    Explain {
        #[command(flatten)]
        sort: SortArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct SortArgs {
    /// Input CSV file with a header line
    #[arg(short, long)]
    input: PathBuf,

    /// Sort key: col[:asc|desc][:nulls_first|nulls_last], repeatable
    #[arg(long = "order-by", required = true, value_parser = parse_order_by)]
    order_by: Vec<OrderByExpr>,

    /// Keep at most this many rows
    #[arg(long)]
    limit: Option<usize>,

    /// Skip this many leading rows of the ordered result
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Rows per output batch (overrides env)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Accumulator row ceiling (overrides env)
    #[arg(long)]
    block_rows: Option<usize>,

    /// Accumulator byte ceiling (overrides env)
    #[arg(long)]
    block_bytes: Option<usize>,

    /// Memory cap in bytes (overrides env)
    #[arg(long)]
    memory_cap: Option<usize>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Sort {
            sort,
            output,
            cache_dir,
        } => run_sort(&sort, output.as_deref(), cache_dir.as_deref()),
        Commands::Explain { sort } => explain(&sort, &mut io::stdout()),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_order_by(s: &str) -> Result<OrderByExpr, String> {
    let mut parts = s.split(':');
    let column = parts
        .next()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| format!("missing column in '{s}'"))?;
    let mut item = OrderByExpr::asc(Expr::col(column));
    let mut nulls = None;
    for part in parts {
        match part.to_ascii_lowercase().as_str() {
            "asc" => item = OrderByExpr::asc(Expr::col(column)),
            "desc" => item = OrderByExpr::desc(Expr::col(column)),
            "nulls_first" => nulls = Some(true),
            "nulls_last" => nulls = Some(false),
            other => return Err(format!("unknown sort modifier '{other}' in '{s}'")),
        }
    }
    if let Some(first) = nulls {
        item = item.nulls_first(first);
    }
    Ok(item)
}

/// Flags override environment values, which override defaults.
fn build_config(args: &SortArgs, base: SortConfig) -> CliResult<SortConfig> {
    let mut cfg = base;
    if let Some(v) = args.batch_size {
        cfg.batch_size = v;
    }
    if let Some(v) = args.block_rows {
        cfg.buffered_block_rows = v;
    }
    if let Some(v) = args.block_bytes {
        cfg.buffered_block_bytes = v;
    }
    if let Some(v) = args.memory_cap {
        cfg.mem_cap_bytes = v;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn sort_options(args: &SortArgs) -> SortOptions {
    let mut options = SortOptions::new(args.order_by.clone()).with_offset(args.offset);
    if let Some(limit) = args.limit {
        options = options.with_limit(limit);
    }
    options
}

fn open_input(
    path: &Path,
    batch_rows: usize,
    cache: Option<&FileCacheManager>,
) -> CliResult<CsvBlockReader<Box<dyn Read>>> {
    let input: Box<dyn Read> = match cache {
        Some(manager) => {
            let remote = Arc::new(LocalFileReader::open(path)?);
            let cached = manager.new_whole_file_cache(remote)?;
            Box::new(SequentialReader::new(cached))
        }
        None => Box::new(File::open(path)?),
    };
    Ok(CsvBlockReader::new(input, batch_rows)?)
}

fn sort_to_writer<W: Write>(
    args: &SortArgs,
    cache: Option<&FileCacheManager>,
    out: W,
) -> CliResult<SortStats> {
    let config = build_config(args, SortConfig::from_env())?;
    let reader = open_input(&args.input, config.batch_size, cache)?;
    let schema = reader.schema().clone();

    let mut node = SortNode::new(ExecContext::new(config)?);
    node.init(sort_options(args))?;
    node.prepare(&schema)?;
    node.open(&mut IterSource::new(reader))?;

    let mut writer = JsonlWriter::to_writer(out, None);
    loop {
        let (block, eos) = node.get_next()?;
        writer.write_block(&block)?;
        if eos {
            break;
        }
    }
    writer.flush()?;
    let stats = node.stats().clone();
    node.close();
    tracing::info!(rows = stats.rows_returned, "sort finished");
    Ok(stats)
}

fn run_sort(args: &SortArgs, output: Option<&Path>, cache_dir: Option<&Path>) -> CliResult<()> {
    let manager = match cache_dir {
        Some(dir) => {
            let manager = FileCacheManager::new(FileCacheConfig {
                cache_root: dir.to_path_buf(),
                ..FileCacheConfig::from_env()
            })?;
            manager.remove_orphan_files()?;
            Some(manager)
        }
        None => None,
    };

    let stats = match output {
        Some(path) => sort_to_writer(args, manager.as_ref(), File::create(path)?)?,
        None => sort_to_writer(args, manager.as_ref(), io::stdout().lock())?,
    };
    if let Some(manager) = &manager {
        manager.gc()?;
    }

    eprintln!("✓ Sorted {} input rows", stats.input_rows);
    eprintln!("  Rows returned: {}", stats.rows_returned);
    eprintln!(
        "  Blocks: {} sorted, {} retained, {} discarded",
        stats.sorted_blocks, stats.retained_blocks, stats.discarded_blocks
    );
    eprintln!(
        "  Peak memory: {} bytes ({:.2} MB)",
        stats.peak_mem_bytes,
        stats.peak_mem_bytes as f64 / 1_048_576.0
    );
    Ok(())
}

fn explain<W: Write>(args: &SortArgs, out: &mut W) -> CliResult<()> {
    let config = build_config(args, SortConfig::from_env())?;
    let reader = open_input(&args.input, config.batch_size, None)?;

    let mut node = SortNode::new(ExecContext::new(config.clone())?);
    node.init(sort_options(args))?;
    let plan = node.prepare(reader.schema())?;

    writeln!(out, "Sort Plan")?;
    writeln!(out, "=========")?;
    writeln!(out, "{node}")?;
    writeln!(out)?;
    writeln!(
        out,
        "Memory Cap: {} bytes ({:.2} MB)",
        config.mem_cap_bytes,
        config.mem_cap_bytes as f64 / 1_048_576.0
    )?;
    writeln!(
        out,
        "Accumulator: {} rows / {} bytes",
        config.buffered_block_rows, config.buffered_block_bytes
    )?;
    writeln!(out, "Batch Size: {}", config.batch_size)?;
    writeln!(out)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&plan)?)?;
    Ok(())
}
