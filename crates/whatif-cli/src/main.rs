//! whatif: run an ESG risk sweep for one company and print the margin table.
//!
//! Usage:
//!   cargo run -p whatif-cli -- --symbol AAPL
//!   cargo run -p whatif-cli -- --symbol MSFT --lo 0 --hi 50 --step 10 --csv
//!   cargo run -p whatif-cli -- --snapshot acme.json

use anyhow::Context;
use esg_core::{FinancialSnapshot, SnapshotSource, SweepConfig};
use margin_models::{MarginModels, MarginModelsConfig};
use scenario_engine::{ResultTable, ScenarioSweep, PCT_COLUMN};
use std::path::PathBuf;
use yahoo_client::YahooFinanceClient;

#[derive(Debug, PartialEq)]
struct CliArgs {
    symbol: Option<String>,
    snapshot: Option<PathBuf>,
    sweep: SweepConfig,
    csv: bool,
}

/// Value following `flag`. A flag given without a value is an error rather
/// than swallowing the next flag.
fn flag_value<'a>(args: &'a [String], flag: &str) -> anyhow::Result<Option<&'a str>> {
    let Some(i) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    match args.get(i + 1) {
        Some(v) if !v.starts_with("--") => Ok(Some(v.as_str())),
        _ => anyhow::bail!("{} requires a value", flag),
    }
}

fn flag_u32(args: &[String], flag: &str, fallback: u32) -> anyhow::Result<u32> {
    match flag_value(args, flag)? {
        Some(v) => v
            .parse()
            .with_context(|| format!("{} expects a non-negative integer, got {:?}", flag, v)),
        None => Ok(fallback),
    }
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<CliArgs>> {
    let symbol = flag_value(args, "--symbol")?.map(str::to_string);
    let snapshot = flag_value(args, "--snapshot")?.map(PathBuf::from);
    if symbol.is_none() && snapshot.is_none() {
        return Ok(None);
    }

    let defaults = SweepConfig::default();
    let sweep = SweepConfig::new(
        flag_u32(args, "--lo", defaults.lo)?,
        flag_u32(args, "--hi", defaults.hi)?,
        flag_u32(args, "--step", defaults.step)?,
    )?;

    Ok(Some(CliArgs {
        symbol,
        snapshot,
        sweep,
        csv: args.iter().any(|a| a == "--csv"),
    }))
}

fn load_snapshot_file(path: &PathBuf) -> anyhow::Result<FinancialSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid snapshot {}", path.display()))
}

fn render_text(table: &ResultTable) -> String {
    let widths = [
        PCT_COLUMN.len(),
        table.margin_a_label.len().max(8),
        table.margin_b_label.len().max(8),
    ];

    let mut out = format!("{}\n", table.symbol);
    out.push_str(&format!(
        "{:>w0$}  {:>w1$}  {:>w2$}\n",
        PCT_COLUMN,
        table.margin_a_label,
        table.margin_b_label,
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
    ));
    for row in &table.rows {
        out.push_str(&format!(
            "{:>w0$}  {:>w1$.4}  {:>w2$.4}\n",
            row.risk_increase_pct,
            row.margin_a,
            row.margin_b,
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        ));
    }
    out
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  whatif --symbol AAPL              Fetch the latest snapshot from Yahoo Finance");
    eprintln!("  whatif --snapshot FILE.json       Use a snapshot stored as JSON");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --lo N      First risk increase in percent (default: 0)");
    eprintln!("  --hi N      Last risk increase in percent, at most 100 (default: 100)");
    eprintln!("  --step N    Increment between scenarios (default: 20)");
    eprintln!("  --csv       Print CSV instead of an aligned table");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whatif=info,scenario_engine=info,yahoo_client=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(cli) = parse_args(&args)? else {
        print_usage();
        std::process::exit(1);
    };

    let models = MarginModels::load(&MarginModelsConfig::default())
        .context("failed to load margin models")?;
    let sweep = ScenarioSweep::new(models.margin_a, models.margin_b);

    let snapshot = match (&cli.snapshot, &cli.symbol) {
        (Some(path), _) => load_snapshot_file(path)?,
        (None, Some(symbol)) => {
            let client = YahooFinanceClient::from_env();
            tracing::info!("Fetching {} from {}", symbol, client.source_name());
            client.fetch_snapshot(symbol).await?
        }
        (None, None) => anyhow::bail!("either --symbol or --snapshot is required"),
    };

    let result = sweep.simulate(&snapshot, &cli.sweep).await?;
    let table = ResultTable::build(&result, sweep.margin_a().label(), sweep.margin_b().label());

    if cli.csv {
        print!("{}", table.to_csv()?);
    } else {
        print!("{}", render_text(&table));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use esg_core::MarginRow;
    use std::io::Write;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("whatif")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_defaults() {
        let cli = parse_args(&args(&["--symbol", "AAPL"])).unwrap().unwrap();
        assert_eq!(cli.symbol.as_deref(), Some("AAPL"));
        assert_eq!(cli.sweep, SweepConfig::default());
        assert!(!cli.csv);
    }

    #[test]
    fn test_parse_range_and_csv() {
        let cli = parse_args(&args(&["--snapshot", "acme.json", "--lo", "10", "--hi", "50", "--step", "10", "--csv"]))
            .unwrap()
            .unwrap();
        assert_eq!(cli.snapshot, Some(PathBuf::from("acme.json")));
        assert_eq!(cli.sweep, SweepConfig { lo: 10, hi: 50, step: 10 });
        assert!(cli.csv);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["--csv"])).unwrap().is_none());
        assert!(parse_args(&args(&["--symbol", "AAPL", "--step", "0"])).is_err());
        assert!(parse_args(&args(&["--symbol", "AAPL", "--hi", "abc"])).is_err());
    }

    #[test]
    fn test_flag_without_value() {
        let err = parse_args(&args(&["--symbol", "--csv"])).unwrap_err();
        assert!(err.to_string().contains("--symbol requires a value"));
        assert!(parse_args(&args(&["--symbol", "AAPL", "--lo", "--csv"])).is_err());
        assert!(parse_args(&args(&["--symbol", "AAPL", "--step"])).is_err());
    }

    #[test]
    fn test_render_text() {
        let table = ResultTable {
            symbol: "ACME".to_string(),
            margin_a_label: "EBITDA Margin".to_string(),
            margin_b_label: "Operating Margin".to_string(),
            rows: vec![
                MarginRow { risk_increase_pct: 0, margin_a: 0.2512, margin_b: 0.1804 },
                MarginRow { risk_increase_pct: 20, margin_a: 0.25, margin_b: -0.01 },
            ],
        };
        let text = render_text(&table);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ACME");
        assert_eq!(lines[1], "Risk +%  EBITDA Margin  Operating Margin");
        assert_eq!(lines[2], "      0         0.2512            0.1804");
        assert_eq!(lines[3], "     20         0.2500           -0.0100");
    }

    #[test]
    fn test_snapshot_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"symbol":"ACME","total_assets":1000.0,"total_liabilities":400.0,"revenue":500.0,
                "net_income":50.0,"operating_cash_flow":60.0,"capital_expenditure":-20.0,
                "esg_risk":{"environmental":30.0,"social":40.0,"governance":20.0}}"#,
        )
        .unwrap();

        let snapshot = load_snapshot_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(snapshot.symbol, "ACME");
        assert!(snapshot.as_of <= chrono::Utc::now());
        assert!(load_snapshot_file(&PathBuf::from("/nonexistent/acme.json")).is_err());
    }
}
