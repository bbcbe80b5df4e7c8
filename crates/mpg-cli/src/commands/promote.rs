//! `mpg promote`: one promotion invocation end to end.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use mpg_audit::AuditWriter;
use mpg_config::{PromotionSettings, RegistryKind, ResolvedSecrets, UnusedKeyPolicy};
use mpg_notify::{HttpReloadNotifier, NoopNotifier, ReloadNotifier, RetryPolicy};
use mpg_promotion::{
    append_decision_event, append_failure_event, write_promotion_report_json, PromotionGate,
    PromotionReport,
};
use mpg_registry::{FileRegistry, MetricsSource, MlflowClient, ModelRegistry};
use tracing::{info, warn};
use uuid::Uuid;

use super::{load_settings, ConfigError};

pub struct PromoteArgs {
    pub config_paths: Vec<String>,
    pub report_out: Option<PathBuf>,
    pub strict_config: bool,
}

pub struct PromoteOutcome {
    pub report: PromotionReport,
    pub report_path: Option<PathBuf>,
    pub audit_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Concrete registry selected by `registry.kind`. Each backend serves both
/// version/alias operations and metrics.
enum RegistryBackend {
    File(FileRegistry),
    Mlflow(MlflowClient),
}

impl RegistryBackend {
    fn from_settings(settings: &PromotionSettings, secrets: &ResolvedSecrets) -> Result<Self> {
        let reg = &settings.registry;
        match reg.kind {
            RegistryKind::File => {
                let path = reg
                    .path
                    .clone()
                    .context("registry.path is required for kind=file")?;
                Ok(RegistryBackend::File(FileRegistry::new(path)))
            }
            RegistryKind::Mlflow => {
                let uri = reg
                    .tracking_uri
                    .as_deref()
                    .context("registry.tracking_uri is required for kind=mlflow")?;
                let client = MlflowClient::new(
                    uri,
                    Duration::from_secs(reg.timeout_secs),
                    secrets.registry_token.clone(),
                )
                .context("build mlflow client")?;
                Ok(RegistryBackend::Mlflow(client))
            }
        }
    }

    fn registry(&self) -> &dyn ModelRegistry {
        match self {
            RegistryBackend::File(r) => r,
            RegistryBackend::Mlflow(r) => r,
        }
    }

    fn metrics(&self) -> &dyn MetricsSource {
        match self {
            RegistryBackend::File(r) => r,
            RegistryBackend::Mlflow(r) => r,
        }
    }
}

fn build_notifier(
    settings: &PromotionSettings,
    secrets: &ResolvedSecrets,
) -> Result<Box<dyn ReloadNotifier>> {
    let api = &settings.api;
    let Some(url) = api.reload_url.as_deref() else {
        return Ok(Box::new(NoopNotifier));
    };
    let notifier = HttpReloadNotifier::new(
        url.trim(),
        secrets.reload_token.clone(),
        Duration::from_secs(api.timeout_secs),
        RetryPolicy {
            retry: api.retry,
            delay: Duration::from_millis(api.retry_delay_ms),
        },
    )
    .context("build reload http client")?;
    Ok(Box::new(notifier))
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub fn run(args: &PromoteArgs) -> Result<PromoteOutcome> {
    let policy = if args.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let (settings, loaded) =
        load_settings(&args.config_paths, policy).map_err(ConfigError::wrap)?;
    let secrets = mpg_config::resolve_secrets(&settings);

    let backend = RegistryBackend::from_settings(&settings, &secrets)?;
    let notifier = build_notifier(&settings, &secrets)?;
    let mut audit = match settings.audit.path.as_deref() {
        Some(p) => Some(AuditWriter::open(p, settings.audit.hash_chain)?),
        None => None,
    };

    let run_id = Uuid::new_v4();
    info!(%run_id, backend = backend.registry().backend(), "promotion run started");

    let gate = PromotionGate::new(
        &settings,
        backend.registry(),
        backend.metrics(),
        notifier.as_ref(),
    )?;

    let mut report = match gate.run() {
        Ok(report) => report,
        Err(err) => {
            if let Some(w) = audit.as_mut() {
                if let Err(e) = append_failure_event(w, run_id, gate.model(), gate.alias(), &err) {
                    warn!(error = %e, "audit append failed");
                }
            }
            return Err(err.into());
        }
    };
    report.config_hash = Some(loaded.config_hash.clone());

    if let Some(w) = audit.as_mut() {
        if let Err(e) = append_decision_event(w, run_id, &report) {
            warn!(error = %e, "audit append failed");
        }
    }

    // Registry state is already committed; a missing artifact must not turn
    // the run into a failure.
    let report_path = match args.report_out.as_deref() {
        Some(dir) => match write_report(dir, &report) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "promotion report not written");
                report.warnings.push(format!("report write failed: {e:#}"));
                None
            }
        },
        None => None,
    };

    Ok(PromoteOutcome {
        report,
        report_path,
        audit_path: audit.map(|w| w.path().to_path_buf()),
    })
}

fn write_report(dir: &Path, report: &PromotionReport) -> Result<PathBuf> {
    write_promotion_report_json(dir, report)
        .with_context(|| format!("write promotion report into {}", dir.display()))
}

pub fn print_summary(outcome: &PromoteOutcome) {
    let r = &outcome.report;
    println!("status={}", r.status.as_str());
    println!("model={}", r.model);
    println!("alias={}", r.alias);
    println!("candidate_version={}", r.candidate.version);
    println!(
        "champion_version={}",
        r.champion.as_ref().map(|c| c.version.as_str()).unwrap_or("none")
    );
    if let Some(d) = &r.decision {
        println!("outcome={}", d.outcome.as_str());
        println!("reasons={}", d.reasons_joined());
        if !d.reason_codes.is_empty() {
            println!("rejected_reason={}", d.reason_codes_joined());
        }
        for note in &d.notes {
            println!("note={note}");
        }
    }
    if let Some(n) = &r.notify {
        println!("notify={}", n.as_str());
    }
    for w in &r.warnings {
        println!("warning={w}");
    }
    if let Some(h) = &r.config_hash {
        println!("config_hash={h}");
    }
    if let Some(p) = &outcome.report_path {
        println!("report_path={}", p.display());
    }
    if let Some(p) = &outcome.audit_path {
        println!("audit_path={}", p.display());
    }
}
