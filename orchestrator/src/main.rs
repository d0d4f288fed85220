//! Yield orchestrator binary entrypoint.

mod config;
mod dry_run_chain;
mod gas_watch;
mod http;
mod run;
mod sig_down;
mod signal_funding;
mod worker;

#[cfg(feature = "telemetry")]
mod telemetry;

#[tokio::main]
async fn main() {
    if let Err(err) = run::run().await {
        eprintln!("orchestrator exited with an error: {err}");
        std::process::exit(1);
    }
}
