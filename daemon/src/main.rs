//! Arban command-line entry point.
//!
//! Each invocation opens the trust store, runs one command, prints the result
//! as JSON on stdout, and exits. Logs go to stderr.

use anyhow::Context;
use arban_levels::{ReviewDecision, UpgradeRequest};
use arban_node::{init_logging, LmdbTrustStore, LogFormat, ServiceConfig, TrustService};
use arban_types::{CitizenId, EdgeId, GroupId, RequestId, Role, TrustLevel, VerificationMethod};
use arban_verification::VerifyCommand;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "arban", about = "Arban trust graph")]
struct Cli {
    /// Data directory for the trust store.
    /// When a config file is provided, defaults to the file's value.
    #[arg(long, env = "ARBAN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Base URL of the distribution service.
    #[arg(long, env = "ARBAN_DISTRIBUTION_ENDPOINT")]
    distribution_endpoint: Option<String>,

    /// Print Prometheus metrics to stderr after the command.
    #[arg(long, env = "ARBAN_ENABLE_METRICS")]
    metrics: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "ARBAN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "ARBAN_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "ARBAN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Register a new citizen.
    Register {
        citizen: String,
        #[arg(long, default_value = "ordinary")]
        role: Role,
    },
    /// Record a citizen's consent to be verified.
    Consent { citizen: String },
    /// Vouch for a citizen.
    Verify {
        verifier: String,
        verified: String,
        #[arg(long)]
        method: Option<VerificationMethod>,
        /// Extra metadata as key=value; may repeat.
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// Revoke a verification edge and cascade.
    Revoke {
        edge: u64,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
    },
    /// Strip a verifier's standing and cascade through their grants.
    Invalidate {
        citizen: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
    },
    /// Show a citizen's verification chain.
    Chain { citizen: String },
    /// Show a verifier's quota and grants.
    Stats { citizen: String },
    /// List citizens still waiting for a verification.
    Pending,
    /// Show one citizen record.
    Show { citizen: String },
    /// Ask for the next trust level.
    Request {
        citizen: String,
        level: TrustLevel,
        #[arg(long)]
        justification: String,
        #[arg(long = "document")]
        documents: Vec<String>,
    },
    /// List upgrade requests: all pending, or one citizen's.
    Requests {
        #[arg(long)]
        citizen: Option<String>,
    },
    /// Approve or reject an upgrade request.
    Review {
        request: u64,
        #[arg(long)]
        reviewer: String,
        #[arg(long, conflicts_with = "reject")]
        approve: bool,
        #[arg(long)]
        reject: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Set a trust level directly (supreme role only).
    SetLevel {
        citizen: String,
        level: TrustLevel,
        #[arg(long)]
        by: String,
    },
    /// Trust group membership and mutual verification.
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
    /// Record an emission after checking the quota.
    Emit { citizen: String, amount: u128 },
    /// Check whether an emission would be allowed, without recording it.
    CanEmit { citizen: String, amount: u128 },
    /// Show a citizen's emission allowance.
    Emission { citizen: String },
    /// Reconcile supreme-role citizens to FULLY_VERIFIED.
    Bootstrap,
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(clap::Subcommand)]
enum GroupAction {
    Join { citizen: String, group: String },
    Leave { citizen: String },
    Verify {
        group: String,
        verifier: String,
        verified: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Revoke {
        group: String,
        verifier: String,
        verified: String,
        #[arg(long)]
        by: String,
    },
    Progress { group: String },
    Matrix { group: String },
    /// Members `citizen` still has to verify, and their own tallies.
    Member { group: String, citizen: String },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    Ok((key.to_string(), value.to_string()))
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<ServiceConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path_str = path.to_string_lossy();
            ServiceConfig::from_toml_file(&path_str)
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => ServiceConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(endpoint) = &cli.distribution_endpoint {
        config.distribution_endpoint = Some(endpoint.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    config.enable_metrics |= cli.metrics;
    Ok(config)
}

/// How long the CLI waits for remote distribution calls before exiting.
const DISTRIBUTION_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level);

    if let Command::Config = cli.command {
        println!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let service = TrustService::<LmdbTrustStore>::open(&config)
        .with_context(|| format!("opening trust store at {}", config.data_dir.display()))?;
    tracing::debug!(data_dir = %config.data_dir.display(), "trust store ready");

    let outcome = run(&service, cli.command);
    let dropped = service.flush_distribution(DISTRIBUTION_FLUSH_TIMEOUT).await;
    if dropped > 0 {
        tracing::warn!(dropped, "exiting with distribution calls unsent");
    }
    outcome?;

    if config.enable_metrics {
        eprintln!("{}", service.metrics().render()?);
    }
    Ok(())
}

fn run(
    service: &TrustService<LmdbTrustStore>,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Register { citizen, role } => {
            print(&service.register_citizen(CitizenId::new(citizen), role)?)
        }
        Command::Consent { citizen } => {
            let accepted = service.accept_consent(&CitizenId::new(citizen))?;
            print(&serde_json::json!({ "accepted": accepted }))
        }
        Command::Verify {
            verifier,
            verified,
            method,
            metadata,
        } => {
            let mut cmd = VerifyCommand::new(verifier, verified);
            if let Some(method) = method {
                cmd = cmd.with_method(method);
            }
            for (key, value) in metadata {
                cmd = cmd.with_metadata(key, value);
            }
            print(&service.verify(cmd)?)
        }
        Command::Revoke { edge, by, reason } => {
            let outcome = service.revoke(EdgeId::new(edge), &CitizenId::new(by), &reason)?;
            print(&serde_json::json!({
                "edge": outcome.edge,
                "target_unverified": outcome.target_unverified,
                "cascade_count": outcome.cascade_count(),
                "cascade": outcome.cascade,
            }))
        }
        Command::Invalidate {
            citizen,
            by,
            reason,
        } => print(&service.invalidate_verifier(
            &CitizenId::new(citizen),
            &CitizenId::new(by),
            &reason,
        )?),
        Command::Chain { citizen } => {
            let chain = service.chain(&CitizenId::new(citizen))?;
            print(&serde_json::json!({
                "depth": chain.depth(),
                "chain": chain,
            }))
        }
        Command::Stats { citizen } => print(&service.verifier_stats(&CitizenId::new(citizen))?),
        Command::Pending => print(&service.pending_citizens()?),
        Command::Show { citizen } => print(&service.citizen(&CitizenId::new(citizen))?),
        Command::Request {
            citizen,
            level,
            justification,
            documents,
        } => {
            let ask = documents.into_iter().fold(
                UpgradeRequest::new(citizen, level, justification),
                UpgradeRequest::with_document,
            );
            print(&service.request_upgrade(ask)?)
        }
        Command::Requests { citizen } => match citizen {
            Some(citizen) => print(&service.requests_of(&CitizenId::new(citizen))?),
            None => print(&service.pending_requests()?),
        },
        Command::Review {
            request,
            reviewer,
            approve,
            reject,
            notes,
        } => {
            let decision = match (approve, reject) {
                (true, false) => ReviewDecision::Approve,
                (false, true) => ReviewDecision::Reject,
                _ => anyhow::bail!("pass exactly one of --approve or --reject"),
            };
            print(&service.review_request(
                RequestId::new(request),
                &CitizenId::new(reviewer),
                decision,
                notes,
            )?)
        }
        Command::SetLevel { citizen, level, by } => print(&service.set_level(
            &CitizenId::new(citizen),
            level,
            &CitizenId::new(by),
        )?),
        Command::Group { action } => run_group(service, action),
        Command::Emit { citizen, amount } => {
            print(&service.record_emission(&CitizenId::new(citizen), amount)?)
        }
        Command::CanEmit { citizen, amount } => {
            let allowed = service.can_emit(&CitizenId::new(citizen), amount)?;
            print(&serde_json::json!({ "allowed": allowed }))
        }
        Command::Emission { citizen } => print(&service.emission_status(&CitizenId::new(citizen))?),
        Command::Bootstrap => print(&service.bootstrap()?),
        Command::Config => Ok(()),
    }
}

fn run_group(
    service: &TrustService<LmdbTrustStore>,
    action: GroupAction,
) -> anyhow::Result<()> {
    match action {
        GroupAction::Join { citizen, group } => {
            print(&service.assign_member(&CitizenId::new(citizen), &GroupId::new(group))?)
        }
        GroupAction::Leave { citizen } => print(&service.remove_member(&CitizenId::new(citizen))?),
        GroupAction::Verify {
            group,
            verifier,
            verified,
            notes,
        } => print(&service.submit_mutual_verification(
            &GroupId::new(group),
            &CitizenId::new(verifier),
            &CitizenId::new(verified),
            notes,
        )?),
        GroupAction::Revoke {
            group,
            verifier,
            verified,
            by,
        } => print(&service.revoke_mutual_verification(
            &GroupId::new(group),
            &CitizenId::new(verifier),
            &CitizenId::new(verified),
            &CitizenId::new(by),
        )?),
        GroupAction::Progress { group } => print(&service.group_progress(&GroupId::new(group))?),
        GroupAction::Matrix { group } => {
            print(&service.verification_matrix(&GroupId::new(group))?)
        }
        GroupAction::Member { group, citizen } => {
            let group = GroupId::new(group);
            let citizen = CitizenId::new(citizen);
            print(&serde_json::json!({
                "unverified": service.unverified_members(&group, &citizen)?,
                "verifications": service.member_verifications(&group, &citizen)?,
            }))
        }
    }
}
