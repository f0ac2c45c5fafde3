//! ops-runner: headless batch runner for the support-ops pipeline.
//!
//! Usage:
//!   ops-runner --data-dir ./data --generate --seed 42
//!   ops-runner --data-dir ./data --window 45 --db run.db
//!   ops-runner --data-dir ./data --approve INC-003 --approve INC-007

use anyhow::Result;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use supportops_core::{
    analysis::IncidentAnalysis,
    approval::{self, AuditEntry, Decision, OutboxEmail},
    config::OpsConfig,
    dataset::{self, ANALYSIS_FILE, AUDIT_LOG_FILE, INCIDENTS_FILE, OUTBOX_FILE, TICKETS_FILE},
    engine::{PipelineEngine, RunOutput},
    generator::DataGenerator,
    reference::ReferenceData,
    store::RunStore,
    ticket::Ticket,
    timestamp::Timestamp,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let generate = args.iter().any(|a| a == "--generate");
    let approvals: Vec<&str> = args
        .windows(2)
        .filter(|w| w[0] == "--approve")
        .map(|w| w[1].as_str())
        .collect();

    let mut config = match flag_value(&args, "--config") {
        Some(path) => OpsConfig::load(Path::new(path))?,
        None => OpsConfig::default(),
    };
    config.clustering.window_minutes =
        parse_arg(&args, "--window", config.clustering.window_minutes);
    config.generator.seed = parse_arg(&args, "--seed", config.generator.seed);

    println!("support-ops: ops-runner");
    println!("  data_dir:  {data_dir}");
    println!("  db:        {db}");
    println!("  window:    {}m", config.clustering.window_minutes);
    println!();

    let data_path = Path::new(data_dir);
    if generate {
        let generator = DataGenerator::new(config.generator.clone(), chrono::Utc::now());
        generator.generate().write(data_path)?;
        println!("  generated synthetic data (seed {})", config.generator.seed);
    }

    let tickets: Vec<Ticket> = dataset::load_records(&data_path.join(TICKETS_FILE))?;
    let reference = ReferenceData::load(data_path)?;

    let store = if db == ":memory:" {
        RunStore::in_memory()?
    } else {
        RunStore::open(db)?
    };
    store.migrate()?;

    let run_id = format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
    let mut engine = PipelineEngine::build(run_id.clone(), &config, reference.clone(), store)?;
    let output = engine.run(tickets)?;
    log::info!(
        "run {run_id}: {} incidents, {} analyses",
        output.incidents.len(),
        output.analyses.len()
    );

    dataset::write_records(&data_path.join(INCIDENTS_FILE), &output.incidents)?;
    dataset::write_records(&data_path.join(ANALYSIS_FILE), &output.analyses)?;

    let queued = process_approvals(data_path, &approvals, &output, &reference)?;

    print_summary(&engine, &run_id, &output, queued)?;
    Ok(())
}

/// Record any approvals given on the command line, then queue an email for
/// every approved incident that has none yet.
fn process_approvals(
    data_path: &Path,
    approvals: &[&str],
    output: &RunOutput,
    reference: &ReferenceData,
) -> Result<usize> {
    let audit_path = data_path.join(AUDIT_LOG_FILE);
    let outbox_path = data_path.join(OUTBOX_FILE);

    let mut audit: Vec<AuditEntry> = dataset::load_records(&audit_path)?;
    let mut outbox: Vec<OutboxEmail> = dataset::load_records(&outbox_path)?;

    if !approvals.is_empty() {
        for id in approvals {
            approval::record_decision(&mut audit, id, Decision::Approved, "approved via ops-runner", now());
        }
        dataset::write_records(&audit_path, &audit)?;
    }

    let by_id: BTreeMap<&str, &IncidentAnalysis> = output
        .analyses
        .iter()
        .map(|a| (a.incident_id.as_str(), a))
        .collect();

    let pending = approval::pending_notifications(&output.incidents, &audit, &outbox);
    let queued = pending.len();
    let new_emails: Vec<OutboxEmail> = pending
        .into_iter()
        .map(|inc| {
            let analysis = by_id.get(inc.incident_id.as_str()).copied();
            approval::queue_notification(inc, analysis, reference, now())
        })
        .collect();

    if !new_emails.is_empty() {
        outbox.extend(new_emails);
        dataset::write_records(&outbox_path, &outbox)?;
    }
    Ok(queued)
}

fn print_summary(
    engine: &PipelineEngine,
    run_id: &str,
    output: &RunOutput,
    queued: usize,
) -> Result<()> {
    let tickets: usize = output.incidents.iter().map(|i| i.ticket_count).sum();
    let hypotheses = engine.store().hypothesis_counts(run_id)?;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {run_id}");
    println!("  tickets:        {tickets}");
    println!("  incidents:      {}", output.incidents.len());
    println!("  emails queued:  {queued}");
    for timing in &output.timings {
        println!("  {:<14}  {:.3}s", timing.stage, timing.seconds);
    }

    println!();
    println!("=== HYPOTHESES ===");
    if hypotheses.is_empty() {
        println!("  (no incidents)");
    }
    for (hypothesis, count) in &hypotheses {
        println!("  {hypothesis:<34} {count}");
    }
    Ok(())
}

fn now() -> Timestamp {
    Timestamp::from_instant(chrono::Utc::now())
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
