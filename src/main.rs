use clap::Parser;
use enrollpay::application::orchestrator::CommitOutcome;
use enrollpay::domain::ports::TransactionCache;
use enrollpay::domain::steps::StepManager;
use enrollpay::error::FlowError;
use enrollpay::interfaces::scenario::Scenario;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Runs one scripted checkout / signature confirmation flow and prints its
/// terminal state.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario JSON file describing backend and widget behavior
    scenario: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let scenario = Scenario::load(&cli.scenario).into_diagnostic()?;
    let (orchestrator, backend, cache) = scenario.build().await;

    println!("flow: {:?} order={}", scenario.flow, scenario.order_id);

    let mut wizard = scenario.wizard.clone().map(StepManager::new);
    if let Some(wizard) = &wizard {
        let breadcrumb = wizard.manifest().ordered().join(" > ");
        println!("wizard: {breadcrumb}");
    }

    // Without this a silent widget would leave the commit pending forever.
    if let Some(ms) = scenario.unmount_after_ms {
        let cancel = orchestrator.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            cancel.cancel();
        });
    }

    match orchestrator.commit(scenario.params()).await {
        Ok(CommitOutcome::Confirmed(id)) => {
            println!("outcome: confirmed id={id}");
            if let Some(record) = cache.get(&id).await {
                println!("cache: {} {:?}", record.id, record.state);
            }
            if let Some(wizard) = &mut wizard {
                wizard.next();
                match wizard.current() {
                    Some(step) => println!("wizard advanced to: {step}"),
                    None => println!("wizard finished"),
                }
            }
        }
        Ok(CommitOutcome::Ignored) => println!("outcome: ignored"),
        Ok(CommitOutcome::Cancelled) => println!("outcome: cancelled"),
        Err(FlowError::UserAborted) => println!("outcome: cancelled by user"),
        Err(err @ FlowError::ConfirmationTimeout) => {
            println!("outcome: unconfirmed, check back later ({err})")
        }
        Err(err) => println!("outcome: error ({err})"),
    }

    println!("backend calls: created={} polls={}", backend.created_count().await, backend.poll_count().await);
    Ok(())
}
