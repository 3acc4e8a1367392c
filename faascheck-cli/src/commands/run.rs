//! `faascheck run` command handler

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{error, info, warn};

use faascheck_chaos::{
    BackendClient, ChaosError, ClusterReleaser, FaultInjector, FaultKind,
    record_backend_unavailable, run_faults,
};
use faascheck_core::config::FaascheckConfig;
use faascheck_core::types::{Issue, Severity};
use faascheck_engine::{
    CompositeReleaser, EngineError, GatewayClient, GatewayReleaser, StatePoller, Suite,
    SuiteRunner, TestContext, TimedProbe,
};

use crate::cli::RunArgs;
use crate::commands::config::redact_url;
use crate::error::CliError;
use crate::output::OutputWriter;
use crate::report::{RunReport, write_report};

/// Suite name that selects fault injection.
pub const FAULTS_SUITE: &str = "faults";

/// What a run will execute, resolved from flags and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub suites: Vec<Suite>,
    pub faults: Vec<FaultKind>,
}

impl RunPlan {
    /// Resolve the suite and fault selection.
    ///
    /// With no `--suites`, every gateway suite runs and faults follow
    /// `chaos.enabled`. Naming `faults` or passing `--faults` selects fault
    /// injection explicitly. `health` is always kept first when any gateway
    /// suite runs, since it is the environment check.
    pub fn resolve(args: &RunArgs, config: &FaascheckConfig) -> Result<Self, CliError> {
        let mut selected = Vec::new();
        let mut wants_faults = config.chaos.enabled || !args.faults.is_empty();

        if args.suites.is_empty() {
            selected.extend(Suite::ALL);
        } else {
            for name in &args.suites {
                if name.trim().eq_ignore_ascii_case(FAULTS_SUITE) {
                    wants_faults = true;
                    continue;
                }
                let suite = name.parse::<Suite>().map_err(CliError::InvalidArgument)?;
                selected.push(suite);
            }
            if !selected.is_empty() {
                selected.push(Suite::Health);
            }
        }
        let suites = Suite::ALL
            .into_iter()
            .filter(|suite| selected.contains(suite))
            .collect();

        let faults = if !wants_faults {
            Vec::new()
        } else if args.faults.is_empty() {
            FaultKind::ALL.to_vec()
        } else {
            let mut kinds = Vec::new();
            for name in &args.faults {
                let kind = name.parse::<FaultKind>().map_err(CliError::InvalidArgument)?;
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            kinds
        };

        Ok(Self { suites, faults })
    }

    fn suite_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.suites.iter().map(|s| s.as_str().to_owned()).collect();
        if !self.faults.is_empty() {
            names.push(FAULTS_SUITE.to_owned());
        }
        names
    }

    fn fault_names(&self) -> Vec<String> {
        self.faults.iter().map(|k| k.as_str().to_owned()).collect()
    }
}

/// Apply command-line overrides on top of file + env configuration.
pub fn apply_overrides(args: &RunArgs, config: &mut FaascheckConfig) {
    if let Some(url) = &args.base_url {
        config.target.base_url = url.clone();
    }
    if !args.backends.is_empty() {
        config.target.backends = args.backends.clone();
    }
    if args.chaos {
        config.chaos.enabled = true;
    }
    if let Some(backend) = &args.chaos_backend {
        config.chaos.backend = backend.clone();
    }
    if let Some(dir) = &args.report_dir {
        config.general.report_dir = dir.display().to_string();
    }
}

/// Execute the `run` command.
///
/// Runs the selected suites, releases every resource still in the ledger,
/// writes the report and maps the outcome to an exit code. Cleanup and the
/// report happen on every path, including interruption and environment
/// failure.
pub async fn execute(
    args: RunArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut config = FaascheckConfig::load_or_default(config_path).await?;
    apply_overrides(&args, &mut config);
    config.validate()?;
    let plan = RunPlan::resolve(&args, &config)?;

    info!(
        target = %redact_url(&config.target.base_url),
        suites = ?plan.suite_names(),
        faults = plan.faults.len(),
        "starting run"
    );

    let probe = Arc::new(TimedProbe::from_config(&config.target)?);
    let gateway = GatewayClient::new(probe, config.target.deploy_timeout());

    let cluster = if plan.faults.is_empty() {
        None
    } else {
        Some(BackendClient::connect(&config.chaos).await.map(Arc::new))
    };

    let mut releaser = CompositeReleaser::new().with(Arc::new(GatewayReleaser::new(
        gateway.clone(),
        StatePoller::for_build(&config.poller),
    )));
    if let Some(Ok(client)) = &cluster {
        releaser = releaser.with(Arc::new(ClusterReleaser::new(Arc::clone(client))));
    }

    let cancel = CancellationToken::new();
    let ctx = TestContext::new(Arc::new(releaser)).with_cancellation(cancel.clone());
    let signals = AbortOnDropHandle::new(tokio::spawn(cancel_on_signal(cancel.clone())));

    let started_at = Utc::now();
    let runner = SuiteRunner::new(ctx.clone(), gateway, config.clone());
    let mut outcome = runner.run_all(&plan.suites).await;
    if outcome.is_ok() {
        if let Some(cluster) = cluster {
            outcome = run_chaos(&ctx, cluster, &config, &plan.faults).await;
        }
    }
    if let Err(e) = &outcome {
        error!(error = %e, "run aborted");
    }

    let cleanup = ctx.sweep().await;
    if !cleanup.is_clean() {
        warn!(failed = cleanup.failed, "resources left behind after final sweep");
        ctx.record_issue(Issue::new(
            Severity::High,
            "Resources left behind",
            format!(
                "{} resources could not be released after the run",
                cleanup.failed
            ),
        ));
    }
    drop(signals);

    let interrupted = cancel.is_cancelled();
    let report = RunReport {
        run_id: ctx.run_id().to_owned(),
        target: redact_url(&config.target.base_url),
        started_at,
        finished_at: Utc::now(),
        suites: plan.suite_names(),
        faults: plan.fault_names(),
        interrupted,
        aborted: outcome.as_ref().err().map(ToString::to_string),
        cleanup,
        ledger: ctx.results().snapshot(),
    };
    write_report(&report, Path::new(&config.general.report_dir)).await?;
    writer.render(&report)?;

    let counts = report.ledger.counts;
    match outcome {
        Err(e) => Err(e.into()),
        Ok(()) if interrupted => Err(CliError::Interrupted),
        Ok(()) if counts.failed > 0 => Err(CliError::ChecksFailed {
            failed: counts.failed,
            total: counts.total,
        }),
        Ok(()) => Ok(()),
    }
}

async fn run_chaos(
    ctx: &TestContext,
    cluster: Result<Arc<BackendClient>, ChaosError>,
    config: &FaascheckConfig,
    faults: &[FaultKind],
) -> Result<(), EngineError> {
    if ctx.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    let client = match cluster {
        Ok(client) => client,
        Err(e) => {
            error!(backend = %config.chaos.backend, error = %e, "cluster connection failed");
            record_backend_unavailable(ctx, &config.chaos.backend, &e.to_string());
            return Err(EngineError::unavailable("cluster", e.to_string()));
        }
    };
    let injector = FaultInjector::from_config(client, config);
    run_faults(ctx, &injector, &config.chaos, faults).await
}

async fn cancel_on_signal(cancel: CancellationToken) {
    match wait_for_shutdown_signal().await {
        Ok(signal) => {
            warn!(signal, "interrupt received, stopping after cleanup");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "signal handlers unavailable"),
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
