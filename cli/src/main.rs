//! Veil command-line client
//!
//! Drives the Veil client services from a terminal: browse the catalog,
//! redeem card keys, run the disguise check and trigger installs.
//!
//! Usage:
//!   veil apps
//!   veil verify <APP_ID> <CARD_KEY> --install
//!   veil disguise --force
//!
//! State (device identifier, unlocks, disguise cache) lives in one JSON file,
//! by default under the user's config directory.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;
use veil_cli::{Services, VeilConfig, default_state_path};
use veil_disguise::NetworkPath;
use veil_install::InstallOutcome;
use veil_types::{AppId, DeviceId, IdentityProvider};

#[derive(Parser, Debug)]
#[command(name = "veil")]
#[command(about = "Veil catalog, entitlement and install client")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON state file
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the API endpoint answers
    Ping,
    /// List the catalog
    Apps,
    /// Show one catalog entry
    Detail { app_id: String },
    /// Show the server's grants for this device
    CheckBinding,
    /// Redeem a card key for an app
    Verify {
        app_id: String,
        card_key: String,
        /// Trigger the install right after a successful redemption
        #[arg(long)]
        install: bool,
    },
    /// Ask the server to refresh an app's entitlement
    Refresh { app_id: String },
    /// Decide whether the real app may be shown
    Disguise {
        /// Ignore the cached verdict
        #[arg(short, long)]
        force: bool,
        /// Network classification to use instead of probing
        #[arg(long, value_enum)]
        network: Option<NetworkArg>,
    },
    /// Resolve a manifest locator and print the install trigger
    Link { locator: String },
    /// Install an app from the catalog
    Install {
        app_id: String,
        /// Install without confirmation even if the app is not unlocked locally
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or change the device identifier
    DeviceId {
        /// Use this identifier from now on
        #[arg(long, conflicts_with = "clear")]
        set: Option<String>,
        /// Forget a custom identifier
        #[arg(long)]
        clear: bool,
    },
    /// Seal a string into an envelope
    Encrypt { plaintext: String },
    /// Open an envelope
    Decrypt { iv: String, data: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum NetworkArg {
    Offline,
    Wifi,
    Cellular,
    Other,
}

impl From<NetworkArg> for NetworkPath {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Offline => Self::Unavailable,
            NetworkArg::Wifi => Self::Wifi,
            NetworkArg::Cellular => Self::Cellular,
            NetworkArg::Other => Self::Other,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = VeilConfig::load(args.config.as_deref())?;
    let state_path = args.state.unwrap_or_else(default_state_path);
    let network = match &args.command {
        Command::Disguise { network, .. } => network.map(NetworkPath::from),
        _ => None,
    };
    let services = Services::build(&config, &state_path, network)?;

    run(args.command, &services).await
}

fn app_id(raw: &str) -> Result<AppId> {
    AppId::new(raw).with_context(|| format!("Invalid app id {raw:?}"))
}

async fn run(command: Command, services: &Services) -> Result<()> {
    match command {
        Command::Ping => {
            let healthy = services.api.probe_primary().await;
            let endpoint = services.api.router().current();
            println!("{} {}", if healthy { "ok" } else { "unreachable" }, endpoint.base_url());
        }
        Command::Apps => {
            let apps = services.api.list_apps().await.context("Failed to list apps")?;
            for app in apps {
                let unlocked = services.entitlements.is_unlocked_locally(&app.id);
                println!(
                    "{:>6}  {:<32} {:<10} {}",
                    app.id,
                    app.name,
                    app.version,
                    match (app.requires_key, unlocked) {
                        (false, _) => "free",
                        (true, true) => "unlocked",
                        (true, false) => "locked",
                    }
                );
            }
        }
        Command::Detail { app_id: raw } => {
            let app_id = app_id(&raw)?;
            let udid = services.identity.device_id();
            let app = services
                .api
                .app_detail(&app_id, &udid)
                .await
                .context("Failed to fetch app")?;
            println!("{}", serde_json::to_string_pretty(&app)?);
        }
        Command::CheckBinding => {
            let udid = services.identity.device_id();
            let status = services
                .api
                .check_udid(&udid)
                .await
                .context("Binding lookup failed")?;
            println!("device {udid}: {}", if status.bound { "bound" } else { "not bound" });
            for binding in &status.bindings {
                println!("  {}", binding.app_id.as_deref().unwrap_or("* (all apps)"));
            }
        }
        Command::Verify {
            app_id: raw,
            card_key,
            install,
        } => {
            let app_id = app_id(&raw)?;
            let result = services
                .entitlements
                .redeem(&card_key, &app_id)
                .await
                .context("Card key verification failed")?;
            println!("{}", result.message);
            if install {
                match result.manifest_link.as_deref() {
                    Some(link) => {
                        let plan = services.installer.plan(&app_id, true, Some(link))?;
                        report(services.installer.install(&plan).await)?;
                    }
                    None => install_app(services, &app_id, true).await?,
                }
            }
        }
        Command::Refresh { app_id: raw } => {
            let app_id = app_id(&raw)?;
            let refreshed = services.entitlements.refresh_entitlement(&app_id).await;
            println!("{}", if refreshed { "refreshed" } else { "refresh failed" });
        }
        Command::Disguise { force, .. } => {
            let decision = services.disguise.decide(force).await;
            println!(
                "{} (source: {:?})",
                if decision.reveal_real_app { "reveal" } else { "decoy" },
                decision.source
            );
        }
        Command::Link { locator } => {
            let (manifest, trigger) = services.installer.trigger_for(&locator);
            println!("kind:     {:?}", manifest.kind);
            println!("manifest: {}", manifest.url);
            println!("trigger:  {trigger}");
        }
        Command::Install { app_id: raw, yes } => {
            install_app(services, &app_id(&raw)?, yes).await?;
        }
        Command::DeviceId { set, clear } => {
            if let Some(raw) = set {
                let id = DeviceId::new(raw).context("Invalid device id")?;
                services.identity.save_custom(&id)?;
                info!(%id, "custom device id saved");
            } else if clear {
                services.identity.clear_custom()?;
                info!("custom device id cleared");
            }
            println!("{}", services.identity.resolve()?);
        }
        Command::Encrypt { plaintext } => {
            let envelope = services.codec.encrypt(&plaintext)?;
            println!("{}", serde_json::to_string(&envelope)?);
        }
        Command::Decrypt { iv, data } => {
            println!("{}", services.codec.decrypt(&data, &iv)?);
        }
    }
    Ok(())
}

async fn install_app(services: &Services, app_id: &AppId, confirmed: bool) -> Result<()> {
    let udid = services.identity.device_id();
    let app = services
        .api
        .app_detail(app_id, &udid)
        .await
        .context("Failed to fetch app")?;

    let record = services
        .entitlements
        .resolve_record(&app.id, app.requires_key)
        .await;
    if !record.is_installable() {
        bail!("{} needs a card key: run `veil verify {} <CARD_KEY>`", app.name, app.id);
    }
    if !services.entitlements.refresh_entitlement(&app.id).await {
        warn!(app = %app.id, "entitlement refresh failed, installing anyway");
    }

    let plan = services
        .installer
        .plan(&app.id, app.requires_key, app.plist.as_deref())?;
    if plan.needs_confirmation && !confirmed {
        println!("Install {} (version {})? Re-run with --yes to confirm.", app.name, app.version);
        return Ok(());
    }
    report(services.installer.install(&plan).await)
}

fn report(outcome: InstallOutcome) -> Result<()> {
    match outcome {
        InstallOutcome::Opened => println!("install started"),
        InstallOutcome::OpenedAfterSanitize(url) => println!("install started ({url})"),
        InstallOutcome::Failed(failure) => {
            eprintln!("{failure}");
            eprintln!("\n{}", failure.clipboard_text);
            bail!("install could not be started");
        }
    }
    Ok(())
}
