use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fracmarket::*;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "fracmarket-cli")]
#[command(about = "Fractional asset marketplace - replay call scripts and inspect fee schedules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON array of calls against a fresh ledger, in order
    Run {
        /// Path to the call script
        #[arg(short, long)]
        script: PathBuf,

        /// Fee schedule JSON (canonical schedule if omitted)
        #[arg(short, long)]
        fees: Option<PathBuf>,

        /// Principal allowed to issue fee-pool shares
        #[arg(long, default_value = SHARE_ISSUER_PRINCIPAL)]
        issuer: String,

        /// Stop at the first rejected call
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print the canonical fee schedule as JSON
    Fees,

    /// Quote the fees for one operation
    Quote {
        /// create | offer | sale | partial-offer | resale
        #[arg(short, long)]
        op: OperationKind,

        #[arg(short, long, default_value = "0")]
        price: u128,

        #[arg(short, long, default_value = "1")]
        quantity: u64,

        /// Whether the seller is the asset's original creator (sale/resale only)
        #[arg(long)]
        by_creator: bool,

        #[arg(short, long)]
        fees: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { script, fees, issuer, fail_fast } => handle_run(script, fees, issuer, fail_fast),
        Commands::Fees => handle_fees(),
        Commands::Quote { op, price, quantity, by_creator, fees } => {
            handle_quote(op, price, quantity, by_creator, fees)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn schedule_from(path: Option<PathBuf>) -> Result<TieredFeeSchedule> {
    match path {
        Some(p) => load_fee_schedule(&p)
            .with_context(|| format!("loading fee schedule from {}", p.display())),
        None => Ok(TieredFeeSchedule::canonical()),
    }
}

fn handle_run(script: PathBuf, fees: Option<PathBuf>, issuer: String, fail_fast: bool) -> Result<()> {
    let text = fs::read_to_string(&script)
        .with_context(|| format!("reading call script {}", script.display()))?;
    let market = Market::with_fee_schedule(Box::new(schedule_from(fees)?))
        .with_share_issuer(Principal::new(issuer));
    for line in replay_script(market, &text, fail_fast)? {
        println!("{}", line);
    }
    Ok(())
}

/// Dispatches every call of `script` in order and renders one line per call, the final balances as
/// JSON, and the state root. With `fail_fast` the first rejection is an error.
fn replay_script(mut market: Market, script: &str, fail_fast: bool) -> Result<Vec<String>> {
    let calls: Vec<Call> = serde_json::from_str(script).context("parsing call script")?;
    let mut lines = Vec::with_capacity(calls.len() + 3);

    let mut rejected = 0usize;
    for (i, call) in calls.iter().enumerate() {
        match market.dispatch(call) {
            Ok(outcome) => lines.push(format!(
                "[{}] {} ok {}",
                i,
                call.name(),
                serde_json::to_string(&outcome)?
            )),
            Err(e) => {
                rejected += 1;
                lines.push(format!("[{}] {} rejected {}: {}", i, call.name(), e.kind(), e));
                if fail_fast {
                    anyhow::bail!("call {} ({}) rejected: {}", i, call.name(), e);
                }
            }
        }
    }

    let balances: serde_json::Map<String, serde_json::Value> = market
        .ledger()
        .balances()
        .into_iter()
        .map(|(who, bal)| (who.to_string(), serde_json::Value::String(bal.to_string())))
        .collect();
    lines.push(serde_json::to_string_pretty(&balances)?);
    lines.push(format!("state root: {}", market.ledger().state_root()));
    if rejected > 0 {
        lines.push(format!("{} of {} calls rejected", rejected, calls.len()));
    }
    Ok(lines)
}

fn handle_fees() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&TieredFeeSchedule::canonical())?);
    Ok(())
}

fn handle_quote(
    op: OperationKind,
    price: u128,
    quantity: u64,
    by_creator: bool,
    fees: Option<PathBuf>,
) -> Result<()> {
    let schedule = schedule_from(fees)?;
    for line in quote_lines(&schedule, op, price, quantity, by_creator) {
        println!("{}", line);
    }
    Ok(())
}

/// Surcharge, plus the price split for operations that settle a price.
fn quote_lines(
    schedule: &dyn FeeSchedule,
    op: OperationKind,
    price: u128,
    quantity: u64,
    by_creator: bool,
) -> Vec<String> {
    let quote = schedule.quote(op, price, quantity);
    let mut lines = vec![format!("Surcharge: {}", quote.surcharge)];
    if op.splits_price() {
        let split = split_payment(&quote, price, by_creator);
        lines.push(format!("Treasury cut: {}", split.treasury));
        lines.push(format!("Royalty: {}", split.royalty));
        lines.push(format!("Seller: {}", split.seller));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "12345678901234567890123456789012";

    fn reference_script() -> String {
        format!(
            r#"[
                {{ "issue_share": {{ "caller": "fee-structure", "holder": "creator" }} }},
                {{ "create": {{ "caller": "creator", "hash": "{h}", "total_quantity": 100 }} }},
                {{ "propose_full_intent": {{ "caller": "buyer", "hash": "{h}", "price": 2000 }} }},
                {{ "finalize_sale": {{ "caller": "creator", "hash": "{h}" }} }},
                {{ "propose_partial_intent": {{ "caller": "part-buyer", "hash": "{h}", "quantity": 50, "price": 1500 }} }},
                {{ "finalize_resale": {{ "caller": "buyer", "hash": "{h}", "quantity": "50" }} }},
                {{ "finalize_sale": {{ "caller": "buyer", "hash": "{h}" }} }}
            ]"#,
            h = HASH
        )
    }

    #[test]
    fn test_replay_reports_each_call_and_balances() {
        let lines = replay_script(Market::new(), &reference_script(), false).unwrap();

        assert!(lines[0].starts_with("[0] issue_share ok"));
        assert!(lines[5].starts_with("[5] finalize_resale ok"));
        assert!(lines[6].starts_with("[6] finalize_sale rejected NoActiveIntent"));
        let balances: serde_json::Value = serde_json::from_str(&lines[7]).unwrap();
        assert_eq!(balances["creator"], "2250");
        assert_eq!(balances["buyer"], "1250");
        assert_eq!(balances["treasury"], "575");
        assert!(lines[8].starts_with("state root: "));
        assert_eq!(lines[9], "1 of 7 calls rejected");
    }

    #[test]
    fn test_replay_fail_fast_stops_at_rejection() {
        let result = replay_script(Market::new(), &reference_script(), true);
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("call 6 (finalize_sale) rejected"));
    }

    #[test]
    fn test_replay_rejects_malformed_script() {
        let result = replay_script(Market::new(), r#"[{ "auction": {} }]"#, false);
        assert!(format!("{:#}", result.unwrap_err()).contains("parsing call script"));
    }

    #[test]
    fn test_quote_lines() {
        let fees = TieredFeeSchedule::canonical();
        assert_eq!(
            quote_lines(&fees, OperationKind::Resale, 1500, 50, false),
            vec!["Surcharge: 100", "Treasury cut: 0", "Royalty: 250", "Seller: 1250"]
        );
        assert_eq!(
            quote_lines(&fees, OperationKind::Sale, 2000, 100, true),
            vec!["Surcharge: 100", "Treasury cut: 0", "Royalty: 0", "Seller: 2000"]
        );
        assert_eq!(quote_lines(&fees, OperationKind::Offer, 2000, 100, false), vec!["Surcharge: 200"]);
    }

    #[test]
    fn test_missing_fee_file_has_context() {
        let result = schedule_from(Some(PathBuf::from("/nonexistent/fees.json")));
        assert!(format!("{:#}", result.unwrap_err()).contains("loading fee schedule"));
    }
}
