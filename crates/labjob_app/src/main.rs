mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use labjob_app::{
    ClientConfig, Coordinator, CoordinatorSettings, InterruptAction, InterruptPolicy,
    TerminalErrorPresenter, TerminalProgressPresenter,
};
use labjob_core::JobState;
use labjob_logging::{job_info, job_warn};
use labjob_transport::{JobTransport, ReqwestTransport};

use crate::cli::{Cli, Command, RunArgs};

/// Exit status after a second Ctrl-C.
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    let mut config = ClientConfig::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;

    labjob_logging::initialize(
        config.log_destination,
        config.level_filter()?,
        &config.log_file,
    );
    job_info!("labjob starting against {}", config.base_url);

    let transport = ReqwestTransport::new(config.transport_settings()?)
        .context("failed to set up HTTP client")?;

    match &args.command {
        Command::Run(run_args) => run(run_args, &config, Arc::new(transport)).await,
        Command::Cancel { job_id } => {
            transport
                .cancel_job(job_id)
                .await
                .with_context(|| format!("cancel of job {job_id} failed"))?;
            eprintln!("Cancel requested for job {job_id}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(
    args: &RunArgs,
    config: &ClientConfig,
    transport: Arc<dyn JobTransport>,
) -> Result<ExitCode> {
    let request = args.to_query()?.to_request()?;

    let (coordinator, handle) = Coordinator::new(
        Arc::clone(&transport),
        Box::new(TerminalProgressPresenter::new()),
        Box::new(TerminalErrorPresenter),
        CoordinatorSettings {
            cancel_grace: config.cancel_grace(),
        },
    );
    let runner = tokio::spawn(coordinator.run());
    handle.submit(request);

    let mut interrupts = InterruptPolicy::new();
    let outcome = loop {
        tokio::select! {
            view = handle.wait_for(|view| view.state.is_terminal()) => break view,
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                match interrupts.on_interrupt(&handle.view()) {
                    InterruptAction::Cancel => {
                        eprintln!("Cancelling... (press Ctrl-C again to quit)");
                        handle.cancel();
                    }
                    InterruptAction::NothingToCancel => {
                        eprintln!("Nothing to cancel yet; waiting for the job id");
                    }
                    InterruptAction::Exit => {
                        job_warn!("second interrupt; exiting without waiting for the job");
                        handle.shutdown();
                        return Ok(ExitCode::from(INTERRUPTED));
                    }
                }
            }
        }
    };

    handle.shutdown();
    let _ = runner.await;

    let Some(view) = outcome else {
        anyhow::bail!("coordinator stopped before the job completed");
    };
    match view.state {
        JobState::Finished => {
            if let Some(token) = &view.result_token {
                println!("{}", transport.result_url(token.as_str()));
            }
            Ok(ExitCode::SUCCESS)
        }
        JobState::Cancelled => {
            eprintln!("Job cancelled");
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}
