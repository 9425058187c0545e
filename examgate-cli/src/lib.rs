//! Command-line surface of the examgate operator tool.
//!
//! Every command works against a [`JsonDirStore`] and writes a short,
//! line-oriented report to the given writer.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use examgate_license::{LicenseEvaluator, LicenseStatus};
use examgate_session::mock::MockAuthProvider;
use examgate_session::{
    DeviceIdentity, LeaseManager, LeaseOutcome, ReleaseOutcome, RenewOutcome, SessionConfig,
    SessionEvent, SessionLease, SessionOrchestrator,
};
use examgate_store::JsonDirStore;
use examgate_types::{Account, AccountId, Clock, DeviceId, ceil_div};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SIMULATED_PASSWORD: &str = "examgate";

#[derive(Parser, Debug)]
#[command(name = "examgate")]
#[command(about = "Inspect and manage examgate licenses and session leases")]
pub struct Cli {
    /// Document store directory
    #[arg(short, long, global = true, default_value = "examgate-data")]
    pub store: PathBuf,

    /// Session configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Device identity file (defaults to the local data directory)
    #[arg(long, global = true)]
    pub identity: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate an account's license
    License {
        /// Account id
        account: String,
    },
    /// Inspect or drive an account's session lease
    #[command(subcommand)]
    Lease(LeaseCommand),
    /// Show this machine's device identity
    Device,
    /// Run one simulated client session and print what it shows the user
    Session {
        /// Account id
        account: String,
        /// Email the simulated user signs in with
        #[arg(long, default_value = "operator@localhost")]
        email: String,
        /// Seconds to stay logged in once the session is live
        #[arg(long, default_value_t = 60)]
        hold: u64,
        #[command(flatten)]
        device: DeviceArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum LeaseCommand {
    /// Print the current holder and whether the lease is stale
    Show {
        /// Account id
        account: String,
    },
    /// Take the lease, unless another device holds a fresh one
    Acquire {
        /// Account id
        account: String,
        /// Email recorded in the lease
        #[arg(long, default_value = "")]
        email: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Move `lastRenewedAt` to now
    Renew {
        /// Account id
        account: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Delete the lease if this device owns it
    Release {
        /// Account id
        account: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Act as this device id instead of the local identity
    #[arg(long)]
    pub device: Option<String>,
}

/// Runs one parsed command.
///
/// # Errors
///
/// Returns an error if the store, configuration or identity cannot be
/// opened, if an id does not parse, or if the store fails mid-command.
pub async fn execute(cli: &Cli, clock: Arc<dyn Clock>, out: &mut dyn Write) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    debug!(store = %cli.store.display(), command = ?cli.command, "executing");
    match &cli.command {
        Command::License { account } => {
            let store = open_store(&cli.store)?;
            license(&store, &config, clock.as_ref(), account, out).await
        }
        Command::Lease(command) => {
            let store = Arc::new(open_store(&cli.store)?);
            let manager = LeaseManager::new(store, clock.clone(), config.stale_threshold());
            lease(cli, manager, clock.as_ref(), command, out).await
        }
        Command::Device => {
            let identity = local_identity(cli.identity.as_deref())?;
            writeln!(out, "device:  {}", identity.id())?;
            writeln!(out, "label:   {}", identity.label().unwrap_or("-"))?;
            writeln!(out, "created: {}", timestamp(identity.created_at()))?;
            Ok(())
        }
        Command::Session {
            account,
            email,
            hold,
            device,
        } => {
            let store = Arc::new(open_store(&cli.store)?);
            let device = resolve_device(cli, device)?;
            let account = Account::new(parse_account(account)?, email.clone());
            let hold = Duration::from_secs(*hold);
            session(config, store, clock, device, &account, hold, out).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => Ok(SessionConfig::load(path)?),
        None => Ok(SessionConfig::default()),
    }
}

fn open_store(root: &Path) -> Result<JsonDirStore> {
    JsonDirStore::open(root)
        .with_context(|| format!("Failed to open store at {}", root.display()))
}

fn parse_account(account: &str) -> Result<AccountId> {
    AccountId::parse(account).with_context(|| format!("Invalid account id: {account:?}"))
}

fn local_identity(path: Option<&Path>) -> Result<DeviceIdentity> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => DeviceIdentity::default_path()
            .context("No local data directory; pass --identity")?,
    };
    Ok(DeviceIdentity::load_or_create(&path)?)
}

fn resolve_device(cli: &Cli, args: &DeviceArgs) -> Result<DeviceIdentity> {
    match &args.device {
        Some(id) => {
            let id = DeviceId::parse(id).with_context(|| format!("Invalid device id: {id:?}"))?;
            Ok(DeviceIdentity::with_id(id))
        }
        None => local_identity(cli.identity.as_deref()),
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn seconds(d: Duration) -> u64 {
    ceil_div(u64::try_from(d.as_millis()).unwrap_or(u64::MAX), 1000)
}

fn describe(status: &LicenseStatus) -> String {
    match status {
        LicenseStatus::Invalid(reason) => format!("invalid ({reason})"),
        LicenseStatus::ExpiredTrial { .. } => "expired (trial)".to_string(),
        LicenseStatus::Expired { .. } => "expired (time-limited)".to_string(),
        LicenseStatus::ValidPerpetual => "valid (perpetual)".to_string(),
        LicenseStatus::ValidTrial(_) => "valid (trial)".to_string(),
        LicenseStatus::ValidTimeLimited(_) => "valid (time-limited)".to_string(),
    }
}

async fn license(
    store: &JsonDirStore,
    config: &SessionConfig,
    clock: &dyn Clock,
    account: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let account = parse_account(account)?;
    let evaluator = LicenseEvaluator::new(config.trial_duration());
    let status = evaluator
        .check(store, &account, clock.now())
        .await
        .context("License lookup failed")?;

    writeln!(out, "account:    {account}")?;
    writeln!(out, "status:     {}", describe(&status))?;
    if let Some(remaining) = status.remaining() {
        writeln!(out, "expires:    {}", timestamp(remaining.expires_at()))?;
    }
    if let Some(badge) = status.badge() {
        let flag = if badge.expiring_soon { " (expiring soon)" } else { "" };
        writeln!(out, "badge:      {}{flag}", badge.text)?;
    }
    if let Some(message) = status.user_message() {
        writeln!(out, "message:    {message}")?;
    }
    if status.is_valid() {
        let restricted = if status.is_restricted() { "yes" } else { "no" };
        writeln!(out, "restricted: {restricted}")?;
    }
    Ok(())
}

fn print_lease(
    out: &mut dyn Write,
    lease: &SessionLease,
    now: DateTime<Utc>,
    stale_threshold: Duration,
) -> Result<()> {
    let label = lease
        .device_label
        .as_deref()
        .map(|l| format!(" ({l})"))
        .unwrap_or_default();
    writeln!(out, "owner:   {}{label}", lease.owner_device_id)?;
    writeln!(out, "issued:  {}", timestamp(lease.issued_at))?;
    match (lease.last_renewed_at, lease.age_at(now)) {
        (Some(renewed), Some(age)) => {
            writeln!(out, "renewed: {}", timestamp(renewed))?;
            writeln!(out, "age:     {}s", age.as_secs())?;
        }
        _ => writeln!(out, "renewed: never")?,
    }
    if lease.is_stale_at(now, stale_threshold) {
        writeln!(out, "verdict: stale")?;
    } else {
        let remaining = lease.remaining_at(now, stale_threshold);
        writeln!(out, "verdict: held ({}s until stale)", seconds(remaining))?;
    }
    Ok(())
}

async fn lease(
    cli: &Cli,
    mut manager: LeaseManager,
    clock: &dyn Clock,
    command: &LeaseCommand,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        LeaseCommand::Show { account } => {
            let account = parse_account(account)?;
            match manager
                .inspect(&account)
                .await
                .context("Lease lookup failed")?
            {
                Some(lease) => {
                    writeln!(out, "account: {account}")?;
                    print_lease(out, &lease, clock.now(), manager.stale_threshold())?;
                }
                None => writeln!(out, "no lease for {account}")?,
            }
        }
        LeaseCommand::Acquire {
            account,
            email,
            device,
        } => {
            let account = Account::new(parse_account(account)?, email.clone());
            let device = resolve_device(cli, device)?;
            match manager.acquire_or_contend(&account, &device).await {
                LeaseOutcome::Acquired(_) => {
                    writeln!(out, "acquired lease for {} as {}", account.id, device.id())?;
                }
                LeaseOutcome::Contended { remaining, holder } => {
                    writeln!(
                        out,
                        "contended: held by {}, stale in {}s",
                        holder.owner_device_id,
                        seconds(remaining)
                    )?;
                }
                LeaseOutcome::Failed(e) => {
                    return Err(e).context("Lease acquisition failed");
                }
            }
        }
        LeaseCommand::Renew { account, device } => {
            let account = parse_account(account)?;
            let device = resolve_device(cli, device)?;
            match manager.renew(&account, device.id()).await {
                RenewOutcome::Renewed(lease) => {
                    let renewed = lease.last_renewed_at.map_or_else(|| "-".to_string(), timestamp);
                    writeln!(out, "renewed lease for {account} at {renewed}")?;
                }
                RenewOutcome::Lost(reason) => bail!("Lease lost: {}", reason.user_message()),
                RenewOutcome::Failed(e) => return Err(e).context("Lease renewal failed"),
            }
        }
        LeaseCommand::Release { account, device } => {
            let account = parse_account(account)?;
            let device = resolve_device(cli, device)?;
            match manager.release(&account, device.id()).await {
                ReleaseOutcome::Released => writeln!(out, "released lease for {account}")?,
                ReleaseOutcome::NotOwner => {
                    writeln!(out, "not released: {account} is held by another device")?;
                }
                ReleaseOutcome::Absent => writeln!(out, "no lease for {account}")?,
                ReleaseOutcome::Failed => bail!("Lease release failed for {account}"),
            }
        }
    }
    Ok(())
}

fn describe_event(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::StateChanged(state) => format!("state: {state}"),
        SessionEvent::Progress(step) => format!("step: {step:?}"),
        SessionEvent::LoginError { message } => format!("login error: {message}"),
        SessionEvent::ExpiryScreen { message, .. } => format!("expired: {message}"),
        SessionEvent::LeaseContended { message, .. } => format!("contended: {message}"),
        SessionEvent::SessionLive {
            restricted, badge, ..
        } => {
            let badge = badge.as_ref().map_or("-", |b| b.text.as_str());
            format!("live: restricted={restricted} badge={badge}")
        }
        SessionEvent::Countdown { display } => format!("countdown: {display}"),
        SessionEvent::InactivityWarning(warning) => format!("warning: {}", warning.title),
        SessionEvent::ForceLogout { message, .. } => format!("logged out: {message}"),
        SessionEvent::TornDown => "torn down".to_string(),
        SessionEvent::InactivityCountdown { .. } | SessionEvent::WarningDismissed => return None,
    };
    Some(line)
}

/// Signs a simulated user in through the orchestrator, holds the session
/// for `hold`, then logs out.
async fn session(
    config: SessionConfig,
    store: Arc<JsonDirStore>,
    clock: Arc<dyn Clock>,
    device: DeviceIdentity,
    account: &Account,
    hold: Duration,
    out: &mut dyn Write,
) -> Result<()> {
    let auth = MockAuthProvider::new();
    auth.add_account(account.id.clone(), &account.email, SIMULATED_PASSWORD);
    let (handle, mut events) =
        SessionOrchestrator::spawn(config, Arc::new(auth), store, clock, device)?;
    info!(account = %account.id, "simulated session starting");
    handle
        .submit_credentials(account.email.clone(), SIMULATED_PASSWORD)
        .await?;

    let logout_timer = tokio::time::sleep(hold);
    tokio::pin!(logout_timer);
    let mut live = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(line) = describe_event(&event) {
                    writeln!(out, "{line}")?;
                }
                match event {
                    SessionEvent::SessionLive { .. } => {
                        live = true;
                        logout_timer
                            .as_mut()
                            .reset(tokio::time::Instant::now() + hold);
                    }
                    SessionEvent::LoginError { .. } | SessionEvent::ExpiryScreen { .. }
                        if !live => break,
                    SessionEvent::TornDown => break,
                    _ => {}
                }
            }
            () = &mut logout_timer, if live => {
                live = false;
                handle.logout().await?;
            }
        }
    }
    handle.shutdown().await?;
    Ok(())
}
