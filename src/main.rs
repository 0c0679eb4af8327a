//! Barwert CLI
//!
//! Command-line interface for present values and policy valuation series

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use barwert_engine::mortality::MortalityTables;
use barwert_engine::present_value::equivalence::{check_case, EquivalenceCase};
use barwert_engine::present_value::{build_provider, CommutationEngine, DirectEngine, Quantity};
use barwert_engine::{EngineKind, PolicyParams, PolicyTimeline, Sex, TableId, ValuationConfig};

#[derive(Debug, Parser)]
#[command(name = "barwert", version, about = "Actuarial present values for life insurance contracts")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured engine
    #[arg(long, global = true, value_enum)]
    engine: Option<EngineKind>,

    /// Override the directory holding table CSV files
    #[arg(long, global = true)]
    tables_dir: Option<PathBuf>,

    /// Additional table to load from CSV (repeatable)
    #[arg(long = "load", global = true)]
    load: Vec<TableId>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every present value for one contract
    Value {
        #[command(flatten)]
        policy: PolicyArgs,

        /// Also print the commutation columns at the entry age
        #[arg(long)]
        columns: bool,
    },
    /// Print the year-by-year valuation series
    Timeline {
        #[command(flatten)]
        policy: PolicyArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Cross-check the direct and commutation engines for one contract
    Check {
        #[command(flatten)]
        policy: PolicyArgs,
    },
}

#[derive(Debug, Args)]
struct PolicyArgs {
    /// Entry age
    #[arg(long)]
    age: u32,

    /// Sex (M or F)
    #[arg(long)]
    sex: Sex,

    /// Mortality table (DAV1994T, DAV2008T, IAM2012, IAM2012G)
    #[arg(long, default_value = "IAM2012")]
    table: TableId,

    /// Annual interest rate, e.g. 0.0175
    #[arg(long)]
    rate: f64,

    /// Contract term in years
    #[arg(long)]
    term: i32,

    /// Premium-payment term in years (defaults to the contract term)
    #[arg(long)]
    premium_term: Option<i32>,

    /// Payments per year (1, 2, 4 or 12)
    #[arg(long, default_value_t = 1)]
    frequency: u32,
}

impl PolicyArgs {
    fn to_params(&self) -> Result<PolicyParams> {
        let params = PolicyParams::new(
            self.age,
            self.sex,
            self.table,
            self.rate,
            self.term,
            self.premium_term.unwrap_or(self.term),
            self.frequency,
        )?;
        Ok(params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let tables = Arc::new(config.load_tables().context("Failed to load mortality tables")?);

    match &cli.command {
        Command::Value { policy, columns } => {
            let params = policy.to_params()?;
            print_values(config.engine, tables, &params, *columns)
        }
        Command::Timeline { policy, format } => {
            let params = policy.to_params()?;
            let provider = build_provider(config.engine, tables);
            let timeline = PolicyTimeline::generate(provider.as_ref(), &params)?;
            write_timeline(&timeline, *format)
        }
        Command::Check { policy } => {
            let params = policy.to_params()?;
            run_check(tables, &params)
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<ValuationConfig> {
    let mut config = match &cli.config {
        Some(path) => ValuationConfig::from_json_file(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?,
        None => ValuationConfig::default(),
    };

    if let Some(engine) = cli.engine {
        config.engine = engine;
    }
    if let Some(dir) = &cli.tables_dir {
        config.tables_dir = dir.clone();
    }
    for id in &cli.load {
        if !config.tables.contains(id) {
            config.tables.push(*id);
        }
    }
    Ok(config)
}

fn print_values(
    engine: EngineKind,
    tables: Arc<MortalityTables>,
    p: &PolicyParams,
    columns: bool,
) -> Result<()> {
    let provider = build_provider(engine, Arc::clone(&tables));
    let (x, s, tab, i, n, t, zw) = (p.entry_age, p.sex, p.table, p.rate, p.term, p.premium_term, p.frequency);

    println!("Present values ({} engine)", engine);
    println!("  Age {}, sex {}, table {}, i = {}, n = {}, t = {}, zw = {}", x, s, tab, i, n, t, zw);
    println!("{}", "-".repeat(40));

    let rows = [
        ("ax", provider.ax(x, s, tab, i)?),
        ("ax_k", provider.ax_k(x, s, tab, i, zw)?),
        ("axn(n)", provider.axn(x, n, s, tab, i)?),
        ("axn_k(n)", provider.axn_k(x, n, s, tab, i, zw)?),
        ("axn_k(t)", provider.axn_k(x, t, s, tab, i, zw)?),
        ("nax_k(n)", provider.nax_k(x, n, s, tab, i, zw)?),
        ("m_axn_k(t,n)", provider.m_axn_k(x, t, n, s, tab, i, zw)?),
        ("nAx", provider.term_insurance(x, n, s, tab, i)?),
        ("nEx", provider.pure_endowment(x, n, s, tab, i)?),
        ("endowment", provider.endowment(x, n, s, tab, i)?),
        ("ag_k(n)", provider.ag_k(n, i, zw)),
    ];
    for (label, value) in rows {
        println!("{:<14} {:>18.10}", label, value);
    }

    if columns {
        let commutation = CommutationEngine::new(tables);
        println!();
        println!("Commutation columns at age {}", x);
        println!("{}", "-".repeat(40));
        for quantity in [
            Quantity::Lx,
            Quantity::Deaths,
            Quantity::Dx,
            Quantity::Cx,
            Quantity::Nx,
            Quantity::Mx,
            Quantity::Rx,
        ] {
            let value = commutation.value(quantity, x, s, tab, i)?;
            println!("{:<14} {:>18.6}", quantity.to_string(), value);
        }
    }
    Ok(())
}

fn write_timeline(timeline: &PolicyTimeline, format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Table => {
            match timeline.net_premium {
                Some(premium) => writeln!(out, "Net annual premium per unit: {:.10}", premium)?,
                None => writeln!(out, "Net annual premium per unit: none (no premium term)")?,
            }
            writeln!(
                out,
                "{:>4} {:>4} {:>4} {:>14} {:>14} {:>14} {:>14} {:>14}",
                "k", "Age", "n-k", "Annuity", "DeathBen", "PureEndow", "PremAnnuity", "Reserve"
            )?;
            writeln!(out, "{}", "-".repeat(90))?;
            for e in &timeline.entries {
                writeln!(
                    out,
                    "{:>4} {:>4} {:>4} {:>14.8} {:>14.8} {:>14.8} {:>14.8} {:>14.8}",
                    e.year,
                    e.attained_age,
                    e.remaining_term,
                    e.annuity,
                    e.death_benefit,
                    e.pure_endowment,
                    e.premium_annuity,
                    e.reserve,
                )?;
            }
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for entry in &timeline.entries {
                writer.serialize(entry)?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, timeline)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn run_check(tables: Arc<MortalityTables>, p: &PolicyParams) -> Result<()> {
    let direct = DirectEngine::new(Arc::clone(&tables));
    let commutation = CommutationEngine::new(tables);

    let case = EquivalenceCase {
        age: p.entry_age,
        n: p.term,
        t: p.premium_term,
        sex: p.sex,
        table: p.table,
        rate: p.rate,
        zw: p.frequency,
    };
    let worst = check_case(&direct, &commutation, &case).context("Engines disagree")?;

    let stats = commutation.cache_stats();
    println!("Engines agree; largest relative error {:.3e}", worst);
    println!(
        "Commutation cache: {} columns, {} hits, {} misses",
        stats.entries, stats.hits, stats.misses
    );
    Ok(())
}
