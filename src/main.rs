use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rentbuy::analysis::{self, DistributionSummary, YearBand};
use rentbuy::assumptions::{AssumptionRequest, Assumptions, resolve};
use rentbuy::config::{Catalog, RunParameters};
use rentbuy::monte_carlo::{Execution, MonteCarloRunner};
use rentbuy::profile::MonteCarloProfile;
use rentbuy::sensitivity;
use rentbuy::simulation::{SimulationResult, YearlySimulator};
use rentbuy::types::{FilingStatus, Regime, RentBasis};

type CliResult<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "rentbuy", about = "Owner versus renter net worth projection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One trajectory on baseline rates.
    Deterministic(CommonArgs),
    /// Many seeded trials under rate uncertainty.
    MonteCarlo(MonteCarloArgs),
    /// Bump each rate field and report the change in the final gap.
    Sensitivity(CommonArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    #[arg(long, default_value = "base")]
    scenario: String,
    #[arg(long, default_value = "US")]
    region: String,
    #[arg(long, default_value_t = 30)]
    horizon: u32,
    #[arg(long, default_value_t = 500_000.0)]
    home_price: f64,
    #[arg(long, default_value_t = 100_000.0)]
    down_payment: f64,
    #[arg(long, default_value_t = 0.06)]
    mortgage_rate: f64,
    #[arg(long, default_value_t = 30)]
    mortgage_term: u32,
    #[arg(long, help = "market, match_mortgage or match_owner_cost")]
    rent_basis: RentBasis,
    #[arg(long, help = "single or married")]
    filing_status: FilingStatus,
    #[arg(long, action = ArgAction::Set, help = "true or false")]
    sell_at_end: bool,
    #[arg(long = "override", value_parser = parse_override, help = "field=value, repeatable")]
    overrides: Vec<(String, f64)>,
    #[arg(long, help = "JSON catalog replacing the built-in scenarios and regions")]
    catalog: Option<PathBuf>,
    #[arg(long, help = "Write JSON output to this path")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MonteCarloArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, default_value_t = 1_000)]
    trials: u64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value = "Baseline")]
    profile: String,
    #[arg(long)]
    param_scale: Option<f64>,
    #[arg(long)]
    path_scale: Option<f64>,
    #[arg(long, default_value_t = 0.0)]
    autocorrelation: f64,
    #[arg(long)]
    sequential: bool,
    #[arg(long, help = "Keep every trajectory and print per-year bands")]
    bands: bool,
}

fn parse_override(s: &str) -> Result<(String, f64), String> {
    let (field, value) = s.split_once('=').ok_or_else(|| format!("expected field=value, got `{s}`"))?;
    let value = value.trim().parse::<f64>().map_err(|e| format!("`{value}`: {e}"))?;
    Ok((field.trim().to_string(), value))
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("RENTBUY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Deterministic(args) => deterministic(&args),
        Command::MonteCarlo(args) => monte_carlo(&args),
        Command::Sensitivity(args) => run_sensitivity(&args),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

// ── Setup ─────────────────────────────────────────────────────────────────────

fn load_catalog(path: Option<&Path>) -> CliResult<Catalog> {
    match path {
        Some(path) => Ok(Catalog::from_json_str(&std::fs::read_to_string(path)?)?),
        None => Ok(Catalog::canonical()),
    }
}

fn request(args: &CommonArgs) -> AssumptionRequest {
    let regime = Regime {
        rent_basis: args.rent_basis,
        filing_status: args.filing_status,
        sell_at_end: args.sell_at_end,
    };
    args.overrides.iter().fold(
        AssumptionRequest::new(&args.scenario, &args.region, regime),
        |req, (field, value)| req.with_override(field, *value),
    )
}

fn params(args: &CommonArgs) -> RunParameters {
    RunParameters {
        horizon: args.horizon,
        home_price: args.home_price,
        down_payment: args.down_payment,
        mortgage_rate: args.mortgage_rate,
        mortgage_term_years: args.mortgage_term,
    }
}

fn simulator(args: &CommonArgs) -> CliResult<(Assumptions, YearlySimulator)> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    let assumptions = resolve(&catalog, &request(args))?;
    let sim = YearlySimulator::new(assumptions.clone(), params(args))?;
    Ok((assumptions, sim))
}

fn writer(path: &Path) -> CliResult<BufWriter<File>> {
    let file = File::create(path).map_err(|e| format!("failed to create {}: {e}", path.display()))?;
    Ok(BufWriter::new(file))
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn deterministic(args: &CommonArgs) -> CliResult {
    let (assumptions, sim) = simulator(args)?;
    let result = sim.run_deterministic()?;
    print_trajectory(&result);
    print_decomposition(&result, &assumptions);

    if let Some(path) = &args.output {
        let mut w = writer(path)?;
        for state in &result.years {
            serde_json::to_writer(&mut w, state)?;
            writeln!(w)?;
        }
        w.flush()?;
    }
    Ok(())
}

fn monte_carlo(args: &MonteCarloArgs) -> CliResult {
    let (_, sim) = simulator(&args.common)?;

    let mut profile = MonteCarloProfile::named(&args.profile)?;
    if let Some(scale) = args.param_scale {
        profile = profile.with_parameter_scale(scale)?;
    }
    if let Some(scale) = args.path_scale {
        profile = profile.with_path_scale(scale)?;
    }
    let execution = if args.sequential { Execution::Sequential } else { Execution::Parallel };
    let runner = MonteCarloRunner::new(args.trials, args.seed, profile)
        .with_autocorrelation(args.autocorrelation)?
        .keep_results(args.bands)
        .with_execution(execution);

    let run = runner.run(&sim)?;
    let Some(summary) = analysis::summarize(&run.distribution) else {
        return Err("no trials completed".into());
    };
    let bands = analysis::yearly_bands(&run.distribution);

    print_summary(&summary, profile, args.seed);
    if !bands.is_empty() {
        print_bands(&bands);
    }

    if let Some(path) = &args.common.output {
        let mut w = writer(path)?;
        let json = serde_json::json!({
            "runner": runner,
            "completed": run.completed,
            "discarded": run.discarded,
            "summary": summary,
            "bands": bands,
        });
        serde_json::to_writer_pretty(&mut w, &json)?;
        writeln!(w)?;
        w.flush()?;
    }
    Ok(())
}

fn run_sensitivity(args: &CommonArgs) -> CliResult {
    let catalog = load_catalog(args.catalog.as_deref())?;
    let impacts = sensitivity::analyse(
        &catalog,
        &request(args),
        &params(args),
        &sensitivity::DETERMINISTIC_FIELDS,
    )?;

    println!("\n=== Sensitivity of final owner − renter (deterministic) ===");
    println!("{:<28} | {:>10} | {:>12} | {:>12}", "Field", "Base", "Low Δ", "High Δ");
    println!("{}", "-".repeat(70));
    for i in impacts.iter().filter(|i| i.swing() > 0.0) {
        println!(
            "{:<28} | {:>10.4} | {:>12.0} | {:>12.0}",
            i.field.name(),
            i.base_value,
            i.low_delta,
            i.high_delta
        );
    }

    if let Some(path) = &args.output {
        let mut w = writer(path)?;
        serde_json::to_writer_pretty(&mut w, &impacts)?;
        writeln!(w)?;
        w.flush()?;
    }
    Ok(())
}

// ── Printing ──────────────────────────────────────────────────────────────────

fn print_trajectory(result: &SimulationResult) {
    println!("\n=== Deterministic trajectory ({} years) ===", result.years.len());
    println!(
        "{:>4} | {:>11} | {:>11} | {:>10} | {:>10} | {:>12} | {:>12} | {:>12}",
        "Year", "Home", "Balance", "Outflow", "Rent", "Owner NW", "Renter NW", "Owner−Renter"
    );
    println!("{}", "-".repeat(106));
    for s in &result.years {
        println!(
            "{:>4} | {:>11.0} | {:>11.0} | {:>10.0} | {:>10.0} | {:>12.0} | {:>12.0} | {:>12.0}",
            s.year.0,
            s.owner.home_value,
            s.owner.mortgage_balance,
            s.owner.cash_outflow,
            s.renter.rent_paid,
            s.owner.net_worth,
            s.renter.net_worth,
            s.difference(),
        );
    }

    println!("\nFinal owner net worth:  {:>14.0}", result.owner_final);
    println!("Final renter net worth: {:>14.0}", result.renter_final);
    println!("Owner − renter:         {:>14.0}", result.difference());
    match result.breakeven_year() {
        Some(year) => println!("Break-even year:        {:>14}", year.0),
        None => println!("Break-even year:        {:>14}", "never"),
    }
    if result.renter_depleted_years > 0 {
        println!("Renter portfolio depleted in {} year(s)", result.renter_depleted_years);
    }
    if result.owner_deficit_years > 0 {
        println!("Owner surplus in deficit in {} year(s)", result.owner_deficit_years);
    }
}

fn print_decomposition(result: &SimulationResult, assumptions: &Assumptions) {
    let d = result.decomposition(assumptions);
    println!("\n=== Decomposition ===");
    let rows = [
        ("Renter net worth", d.renter_net_worth),
        ("Net home appreciation", d.net_home_appreciation),
        ("Principal paydown", d.principal_paydown),
        ("Mortgage interest", d.mortgage_interest),
        ("Closing costs", d.closing_costs),
        ("Carrying costs", d.carrying_costs),
        ("Down payment opportunity", d.down_payment_opportunity_cost),
        ("Owner net worth", d.owner_net_worth),
    ];
    for (label, value) in rows {
        println!("  {label:<26} {value:>14.0}");
    }
}

fn print_summary(s: &DistributionSummary, profile: MonteCarloProfile, seed: u64) {
    println!(
        "\n=== Monte Carlo ({} trials, profile {}, seed {seed}) ===",
        s.trials, profile.name
    );
    println!(
        "{:<14} | {:>12} | {:>12} | {:>12} | {:>12} | {:>12} | {:>12} | {:>12}",
        "Metric", "mean", "p1", "p10", "p50", "p90", "p99", "stddev"
    );
    println!("{}", "-".repeat(114));
    for (label, d) in [("Owner−Renter", &s.difference), ("Owner", &s.owner), ("Renter", &s.renter)] {
        println!(
            "{:<14} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0}",
            label, d.mean, d.p1, d.p10, d.p50, d.p90, d.p99, d.std_dev
        );
    }

    println!("\nP(owner > renter):      {:>7.1}%", s.prob_owner_wins * 100.0);
    println!("P(owner < renter):      {:>7.1}%", s.downside.prob_owner_loses * 100.0);
    println!("Downside p10 / p5:      {:>12.0} / {:.0}", s.downside.p10, s.downside.p5);
    match s.median_breakeven_year {
        Some(year) => println!(
            "Median break-even year: {:>7} ({:.1}% of trials break even)",
            year.0,
            s.prob_breakeven * 100.0
        ),
        None => println!("Median break-even year:   never"),
    }
    if s.renter_depletion_rate > 0.0 {
        println!("Renter depletion rate:  {:>7.1}%", s.renter_depletion_rate * 100.0);
    }
}

fn print_bands(bands: &[YearBand]) {
    println!("\n--- Owner − renter by year (pre-sale) ---");
    println!("{:>4} | {:>12} | {:>12} | {:>12} | {:>8}", "Year", "p10", "p50", "p90", "P(lead)");
    for b in bands {
        println!(
            "{:>4} | {:>12.0} | {:>12.0} | {:>12.0} | {:>7.1}%",
            b.year.0,
            b.p10,
            b.p50,
            b.p90,
            b.prob_owner_leads * 100.0
        );
    }
}
