//! usage-report: headless billing report and dashboard backend for the
//! Megaline usage dataset.
//!
//! Usage:
//!   usage-report --data-dir ./data
//!   usage-report --synthetic --seed 42 --users 500 --active-only
//!   usage-report --data-dir ./data --json --export billing.csv
//!   usage-report --synthetic --what-if 600,40,16
//!   usage-report --data-dir ./data --ipc-mode

use anyhow::Result;
use megaline_core::{
    calculator::{what_if, WhatIfInput, WhatIfQuote},
    comparator::Comparison,
    config::PipelineConfig,
    loader::{load_dataset, write_billing_csv},
    pipeline::{compare_plans, compare_regions, Hypothesis, Pipeline, PipelineRun},
    report::{build_report, DashboardReport},
    snapshot::DatasetSnapshot,
    stats::Describe,
    synthetic,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetSummary {
        #[serde(default)]
        active_only: bool,
    },
    WhatIf {
        minutes:  f64,
        messages: u64,
        data_gb:  f64,
    },
    Compare {
        by: CompareBy,
        #[serde(default)]
        active_only: bool,
    },
    Records {
        #[serde(default = "default_record_limit")]
        limit: usize,
    },
    Quit,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "snake_case")]
enum CompareBy {
    Plan,
    Region,
}

fn default_record_limit() -> usize {
    100
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let use_synthetic = args.iter().any(|a| a == "--synthetic");
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let active_only = args.iter().any(|a| a == "--active-only");
    let as_json = args.iter().any(|a| a == "--json");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let export_path = flag_value(&args, "--export");
    let what_if_arg = flag_value(&args, "--what-if");

    let mut config = PipelineConfig::load(data_dir)?;
    config.synthetic.seed = parse_arg(&args, "--seed", config.synthetic.seed);
    config.synthetic.users = parse_arg(&args, "--users", config.synthetic.users);

    // A load failure is reported once; everything downstream runs on an
    // empty snapshot and renders as insufficient data.
    let snapshot = match load_snapshot(use_synthetic, data_dir, &config) {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to load dataset: {e:#}");
            if !ipc_mode {
                eprintln!("error loading data: {e:#}");
            }
            DatasetSnapshot::empty()
        }
    };

    let run = Pipeline::new(&snapshot, &config).run()?;

    if ipc_mode {
        return run_ipc_loop(&snapshot, &run, &config);
    }

    if let Some(path) = export_path {
        write_billing_csv(path, &run.records)?;
    }

    if let Some(raw) = what_if_arg {
        let input = parse_what_if(raw)?;
        let quote = what_if(&snapshot.rate_table.or_megaline(), &config.calculator_plans, input)?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&quote)?);
        } else {
            print_what_if(&quote);
        }
        return Ok(());
    }

    let report = build_report(&snapshot, &run, &config, active_only);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let source = if use_synthetic {
            format!("synthetic (seed {})", config.synthetic.seed)
        } else {
            data_dir.to_string()
        };
        print_report(&report, &source);
    }
    Ok(())
}

fn load_snapshot(use_synthetic: bool, data_dir: &str, config: &PipelineConfig) -> Result<DatasetSnapshot> {
    let raw = if use_synthetic {
        synthetic::generate(&config.synthetic)
    } else {
        load_dataset(data_dir, config)?
    };
    Ok(DatasetSnapshot::build(&raw, config)?)
}

fn run_ipc_loop(snapshot: &DatasetSnapshot, run: &PipelineRun, config: &PipelineConfig) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let response = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetSummary { active_only } => {
                serde_json::to_value(build_report(snapshot, run, config, active_only))?
            }
            IpcCommand::WhatIf { minutes, messages, data_gb } => {
                let input = WhatIfInput { minutes, messages, data_gb };
                match what_if(&snapshot.rate_table.or_megaline(), &config.calculator_plans, input) {
                    Ok(quote) => serde_json::to_value(quote)?,
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                }
            }
            IpcCommand::Compare { by, active_only } => {
                let records = if active_only {
                    run.active_records()
                } else {
                    run.records.clone()
                };
                let hypothesis = match by {
                    CompareBy::Plan => compare_plans(&records, config),
                    CompareBy::Region => compare_regions(&records, config),
                };
                serde_json::to_value(hypothesis)?
            }
            IpcCommand::Records { limit } => {
                let page: Vec<_> = run.records.iter().take(limit).collect();
                serde_json::json!({ "total": run.records.len(), "records": page })
            }
        };
        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_report(report: &DashboardReport, source: &str) {
    let k = &report.kpis;
    println!("Megaline usage report");
    println!("  source:      {source}");
    println!("  run_id:      {}", report.run_id);
    println!("  active only: {}", report.active_only);
    println!();

    println!("=== OVERVIEW ===");
    println!("  users:                    {}", k.total_users);
    println!("  churn rate:               {:.1}%", k.churn_rate_pct);
    println!("  billed user-months:       {}", k.billed_user_months);
    if k.excluded_rows > 0 {
        println!("  excluded user-months:     {}", k.excluded_rows);
    }
    println!("  avg monthly income:       {}", money(k.avg_monthly_income));
    println!("  avg total monthly income: {}", money(k.avg_total_monthly_income));
    println!();

    println!("=== PLANS ===");
    for plan in &report.rate_table {
        println!(
            "  {:<10} ${:>6.2}/mo | {:>5} min | {:>5} msg | {:>4.0} GB | extra ${:.2}/min ${:.2}/msg ${:.2}/GB",
            plan.plan_name.as_str(),
            plan.monthly_fee,
            plan.minutes_included,
            plan.messages_included,
            plan.data_included_gb(),
            plan.rate_per_extra_minute,
            plan.rate_per_extra_message,
            plan.rate_per_extra_gb,
        );
    }
    for c in &report.plan_distribution {
        println!("  {:<10} {} users", c.key.as_str(), c.count);
    }
    println!();

    println!("=== CITIES ===");
    for c in report.city_distribution.iter().take(10) {
        println!("  {:<40} {}", c.key, c.count);
    }
    println!();

    println!("=== USAGE BY PLAN ===");
    for s in &report.plan_summaries {
        println!("  {} ({} user-months, {:.1}% with overage)", s.plan_name, s.user_months, s.overage_share * 100.0);
        print_describe("minutes", s.minutes.as_ref());
        print_describe("messages", s.messages.as_ref());
        print_describe("data GB", s.data_gb.as_ref());
        print_describe("bill $", s.total_monthly_cost.as_ref());
    }
    println!();

    println!("=== MONTHLY REVENUE ===");
    for row in &report.monthly {
        println!(
            "  {} {:<10} n={:<4} min={:>8.1} msg={:>6.1} MB={:>9.0} revenue=${:>10.2}",
            row.month, row.plan_name.as_str(), row.user_months, row.avg_minutes, row.avg_messages, row.avg_usage_mb, row.revenue
        );
    }
    println!();

    println!("=== INCOME BREAKDOWN (mean per user-month) ===");
    for b in &report.income_breakdown {
        println!(
            "  {:<10} base ${:.2} | minutes ${:.2} | messages ${:.2} | data ${:.2}",
            b.plan_name.as_str(), b.base_fee, b.extra_minutes, b.extra_messages, b.extra_data
        );
    }
    for u in &report.per_user_income {
        print_describe(&format!("{} per-user $", u.plan_name), u.income.as_ref());
    }
    println!();

    println!("=== HYPOTHESIS TESTS ===");
    print_hypothesis(&report.plan_test);
    print_hypothesis(&report.region_test);
}

fn print_describe(label: &str, d: Option<&Describe>) {
    match d {
        Some(d) => println!(
            "    {label:<18} n={} mean={:.2} std={:.2} min={:.2} 25%={:.2} 50%={:.2} 75%={:.2} max={:.2}",
            d.count, d.mean, d.std, d.min, d.p25, d.p50, d.p75, d.max
        ),
        None => println!("    {label:<18} (no data)"),
    }
}

fn print_hypothesis(h: &Hypothesis) {
    println!("  {} vs {} ({:?})", h.label_a, h.label_b, h.measure);
    println!("    mean {}: {} (n={})", h.label_a, money(h.mean_a), h.n_a);
    println!("    mean {}: {} (n={})", h.label_b, money(h.mean_b), h.n_b);
    match &h.result {
        Comparison::Tested(t) => {
            println!("    t = {:.4}, df = {:.1}, p = {:.4}, alpha = {}", t.statistic, t.degrees_of_freedom, t.p_value, t.alpha);
            if t.reject_null {
                println!("    -> reject H0: mean revenue differs");
            } else {
                println!("    -> cannot reject H0: no evidence mean revenue differs");
            }
        }
        Comparison::InsufficientData { reason, .. } => println!("    {reason}"),
    }
}

fn print_what_if(quote: &WhatIfQuote) {
    println!(
        "What-if: {} min, {} messages, {} GB",
        quote.input.minutes, quote.input.messages, quote.input.data_gb
    );
    for q in [&quote.first, &quote.second] {
        let c = &q.charges;
        println!("  {:<10} total ${:.2}", q.plan_name.as_str(), c.total_monthly_cost);
        println!("    base fee       ${:.2}", c.monthly_fee);
        println!("    extra minutes  ${:.2}", c.extra_minute_cost);
        println!("    extra messages ${:.2}", c.extra_message_cost);
        println!("    extra data     ${:.2}", c.extra_mb_cost);
    }
    match &quote.cheaper {
        Some(plan) => println!("  {plan} is cheaper by ${:.2}", quote.savings),
        None => println!("  both plans cost the same"),
    }
}

fn money(value: Option<f64>) -> String {
    value.map(|v| format!("${v:.2}")).unwrap_or_else(|| "n/a".into())
}

fn parse_what_if(raw: &str) -> Result<WhatIfInput> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [minutes, messages, data_gb] = parts.as_slice() else {
        anyhow::bail!("--what-if expects MINUTES,MESSAGES,GB, got '{raw}'");
    };
    Ok(WhatIfInput {
        minutes: minutes.parse()?,
        messages: messages.parse()?,
        data_gb: data_gb.parse()?,
    })
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
