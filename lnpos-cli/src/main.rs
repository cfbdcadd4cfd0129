//! Lightning point of sale operator CLI
//!
//! Operates on the same local store as the terminal: PIN and session
//! management, wallet descriptors, tip and currency settings, plus tip and
//! currency calculators.

mod prompt;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use lnpos_core::{CurrencyContext, DisplayCurrency, TipSelection, WalletDescriptor};
use lnpos_service::{PosConfig, PriceClient, RefreshRate, TipFlow};
use lnpos_storage::{
    recovery_affordance, wipe_all_data, KeyValueStore, PinGate, PinGateOutcome, SessionManager,
    SettingsStore, SqliteStore, SystemClock,
};
use prompt::TerminalPrompt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "lnpos")]
#[command(about = "Lightning point of sale terminal", long_about = None)]
struct Cli {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the operator PIN
    Pin {
        #[command(subcommand)]
        action: PinCommand,
    },

    /// Inspect or end the operator session
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Manage wallet connections
    Wallet {
        #[command(subcommand)]
        action: WalletCommand,
    },

    /// Manage tip settings
    Tips {
        #[command(subcommand)]
        action: TipsCommand,
    },

    /// Manage the display currency
    Currency {
        #[command(subcommand)]
        action: CurrencyCommand,
    },

    /// Manage the merchant label used in invoice memos
    Label {
        #[command(subcommand)]
        action: LabelCommand,
    },

    /// Calculate a tip on a base amount
    Tip {
        /// Base amount in sats
        base_sats: u64,

        /// Tip percentage (defaults to listing every preset)
        #[arg(short, long, conflicts_with = "custom")]
        percent: Option<u32>,

        /// Custom tip in the display currency
        #[arg(short, long)]
        custom: Option<String>,
    },

    /// Convert an amount between the display currency and sats
    Convert {
        /// Amount in the display currency (or sats with --from-sats)
        amount: String,

        /// Treat the amount as sats
        #[arg(long)]
        from_sats: bool,
    },

    /// Verify the PIN, then drop the session and wallet connections
    Logout,

    /// Delete all local data. Only available while no wallet is connected.
    Wipe {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PinCommand {
    /// Set the first PIN
    Set,
    /// Replace the current PIN
    Change,
    /// Verify the PIN and start a session
    Verify,
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Show whether a session is active
    Status,
    /// End the session
    Lock,
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Store a wallet connection string
    Set {
        /// nostr+walletconnect:// URI
        uri: String,

        /// Store as the tip wallet
        #[arg(long)]
        tip: bool,
    },
    /// Show stored wallets
    Show,
    /// Remove stored wallets
    Clear {
        /// Only remove the tip wallet
        #[arg(long)]
        tip: bool,
    },
}

#[derive(Subcommand)]
enum TipsCommand {
    /// Show tip settings
    Show,
    /// Update tip settings
    Set {
        /// Offer tips after payment
        #[arg(long)]
        enabled: Option<bool>,

        /// Comma separated percentage presets
        #[arg(long)]
        percentages: Option<String>,

        /// Allow custom tips
        #[arg(long)]
        allow_custom: Option<bool>,

        /// Send tips to the tip wallet
        #[arg(long)]
        use_tip_wallet: Option<bool>,
    },
}

#[derive(Subcommand)]
enum CurrencyCommand {
    /// Show the display currency
    Show,
    /// Select the display currency (SATS or an ISO code)
    Set {
        /// Currency code
        code: String,
    },
}

#[derive(Subcommand)]
enum LabelCommand {
    /// Show the merchant label
    Show,
    /// Set the merchant label
    Set {
        /// New label
        label: String,
    },
}

/// Opened local state
struct Terminal {
    config: PosConfig,
    store: Arc<dyn KeyValueStore>,
    settings: SettingsStore,
    gate: PinGate,
    prompt: Arc<TerminalPrompt>,
}

impl Terminal {
    fn open(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("org", "lnpos", "lnpos")
                .context("cannot determine a data directory, pass --data-dir")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("cannot create {}", data_dir.display()))?;

        let config = PosConfig::load_or_default(data_dir.join("config.json"))?;
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(data_dir.join("pos.db"))?);
        let session = SessionManager::with_duration(
            store.clone(),
            Arc::new(SystemClock),
            config.session_lifetime(),
        );
        let prompt = Arc::new(TerminalPrompt::new());
        let gate = PinGate::new(store.clone(), session, prompt.clone());
        info!("Using data directory {}", data_dir.display());

        Ok(Self {
            config,
            settings: SettingsStore::new(store.clone()),
            store,
            gate,
            prompt,
        })
    }

    fn session(&self) -> &SessionManager {
        self.gate.session()
    }

    /// Require the PIN for a protected command and extend the session
    async fn authorize(&self) -> anyhow::Result<()> {
        match self.gate.require_pin(|| {}).await? {
            PinGateOutcome::Granted => {
                self.session().extend_session()?;
                Ok(())
            }
            PinGateOutcome::RedirectToSetup => bail!("No PIN set. Run `lnpos pin set` first."),
            PinGateOutcome::Denied => bail!("Access denied"),
        }
    }

    async fn read_new_pin(&self) -> anyhow::Result<()> {
        let pin = self.prompt.read_secret("New PIN: ").await.context("PIN entry cancelled")?;
        let confirm = self
            .prompt
            .read_secret("Confirm PIN: ")
            .await
            .context("PIN entry cancelled")?;
        self.gate.set_pin(&pin, &confirm)?;
        Ok(())
    }

    /// Context for the stored display currency with a fresh rate
    async fn currency_context(&self) -> anyhow::Result<CurrencyContext> {
        let currency = self.settings.display_currency()?;
        let mut ctx = CurrencyContext::new(currency);
        if !currency.is_sats() {
            let client = PriceClient::new(self.config.price_source, self.config.rate_timeout())?;
            ctx.refresh(&client)
                .await
                .with_context(|| format!("cannot fetch the {} rate", currency))?;
            if let Some(attribution) = client.source().attribution() {
                eprintln!("{}", attribution);
            }
        }
        Ok(ctx)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let terminal = Terminal::open(cli.data_dir)?;

    match cli.command {
        Commands::Pin { action } => run_pin(&terminal, action).await,
        Commands::Session { action } => run_session(&terminal, action),
        Commands::Wallet { action } => run_wallet(&terminal, action).await,
        Commands::Tips { action } => run_tips(&terminal, action).await,
        Commands::Currency { action } => run_currency(&terminal, action).await,
        Commands::Label { action } => run_label(&terminal, action).await,
        Commands::Tip {
            base_sats,
            percent,
            custom,
        } => run_tip(&terminal, base_sats, percent, custom).await,
        Commands::Convert { amount, from_sats } => run_convert(&terminal, &amount, from_sats).await,
        Commands::Logout => {
            if !terminal.gate.logout().await? {
                bail!("Access denied");
            }
            println!("Logged out");
            Ok(())
        }
        Commands::Wipe { yes } => run_wipe(&terminal, yes),
    }
}

async fn run_pin(terminal: &Terminal, action: PinCommand) -> anyhow::Result<()> {
    match action {
        PinCommand::Set => {
            terminal.read_new_pin().await?;
            println!("PIN set, session started");
        }
        PinCommand::Change => {
            if !terminal.gate.change_pin().await? {
                bail!("Access denied");
            }
            terminal.read_new_pin().await?;
            println!("PIN changed");
        }
        PinCommand::Verify => {
            if !terminal.gate.verify_pin().await? {
                bail!("Access denied");
            }
            println!("PIN verified");
        }
    }
    Ok(())
}

fn run_session(terminal: &Terminal, action: SessionCommand) -> anyhow::Result<()> {
    match action {
        SessionCommand::Status => match terminal.session().remaining() {
            Some(left) => println!("Session active, {}s remaining", left.as_secs()),
            None if terminal.gate.has_pin()? => println!("Locked"),
            None => println!("No PIN set"),
        },
        SessionCommand::Lock => {
            terminal.gate.lock()?;
            println!("Locked");
        }
    }
    Ok(())
}

async fn run_wallet(terminal: &Terminal, action: WalletCommand) -> anyhow::Result<()> {
    let settings = &terminal.settings;
    match action {
        WalletCommand::Set { uri, tip } => {
            let descriptor = WalletDescriptor::parse(&uri)?;
            // First connection happens before any PIN exists
            if tip || settings.has_primary_wallet()? {
                terminal.authorize().await?;
            }
            if tip {
                settings.set_secondary_wallet(&descriptor)?;
                println!("Tip wallet: {}", descriptor.redacted());
            } else {
                settings.set_primary_wallet(&descriptor)?;
                println!("Wallet: {}", descriptor.redacted());
            }
        }
        WalletCommand::Show => {
            let show = |descriptor: Option<WalletDescriptor>| {
                descriptor
                    .map(|d| d.redacted())
                    .unwrap_or_else(|| "none".to_string())
            };
            println!("Wallet:     {}", show(settings.primary_wallet()?));
            println!("Tip wallet: {}", show(settings.secondary_wallet()?));
        }
        WalletCommand::Clear { tip } => {
            terminal.authorize().await?;
            if tip {
                settings.clear_secondary_wallet()?;
                println!("Tip wallet removed");
            } else {
                settings.clear_wallets()?;
                println!("Wallets removed");
            }
        }
    }
    Ok(())
}

async fn run_tips(terminal: &Terminal, action: TipsCommand) -> anyhow::Result<()> {
    let settings = &terminal.settings;
    match action {
        TipsCommand::Show => {
            let tips = settings.tip_settings()?;
            println!("Enabled:        {}", tips.enabled);
            println!("Presets:        {}", tips.percentages_display());
            println!("Custom tips:    {}", tips.allow_custom);
            println!("Use tip wallet: {}", tips.use_secondary_wallet);
        }
        TipsCommand::Set {
            enabled,
            percentages,
            allow_custom,
            use_tip_wallet,
        } => {
            terminal.authorize().await?;
            let mut tips = settings.tip_settings()?;
            if let Some(enabled) = enabled {
                tips.enabled = enabled;
            }
            if let Some(percentages) = percentages {
                tips.set_percentages_from_str(&percentages);
            }
            if let Some(allow_custom) = allow_custom {
                tips.allow_custom = allow_custom;
            }
            if let Some(use_tip_wallet) = use_tip_wallet {
                tips.use_secondary_wallet = use_tip_wallet;
            }
            let secondary = settings.secondary_wallet()?;
            settings.save_tip_configuration(&tips, secondary.as_ref())?;
            println!("Tip settings saved: {}", tips.normalized().percentages_display());
        }
    }
    Ok(())
}

async fn run_currency(terminal: &Terminal, action: CurrencyCommand) -> anyhow::Result<()> {
    match action {
        CurrencyCommand::Show => println!("{}", terminal.settings.display_currency()?),
        CurrencyCommand::Set { code } => {
            let currency: DisplayCurrency = code.parse()?;
            terminal.authorize().await?;
            terminal.settings.set_display_currency(currency)?;
            println!("Display currency: {}", currency);
        }
    }
    Ok(())
}

async fn run_label(terminal: &Terminal, action: LabelCommand) -> anyhow::Result<()> {
    match action {
        LabelCommand::Show => println!("{}", terminal.settings.merchant_label()?),
        LabelCommand::Set { label } => {
            terminal.authorize().await?;
            terminal.settings.set_merchant_label(&label)?;
            println!("Merchant label: {}", terminal.settings.merchant_label()?);
        }
    }
    Ok(())
}

async fn run_tip(
    terminal: &Terminal,
    base_sats: u64,
    percent: Option<u32>,
    custom: Option<String>,
) -> anyhow::Result<()> {
    let ctx = terminal.currency_context().await?;
    let mut flow = TipFlow::new(base_sats, ctx, terminal.settings.tip_settings()?);

    let selections = match (percent, custom) {
        (Some(percent), _) => vec![TipSelection::Percentage(percent)],
        (None, Some(custom)) => {
            flow.select(TipSelection::Custom)?;
            flow.set_custom_input(&custom);
            vec![TipSelection::Custom]
        }
        (None, None) => flow
            .presets()
            .iter()
            .map(|percent| TipSelection::Percentage(*percent))
            .collect(),
    };

    for selection in selections {
        flow.select(selection)?;
        let tip_sats = flow.tip_amount()?;
        let label = match selection {
            TipSelection::Percentage(percent) => format!("{}%", percent),
            _ => "Custom".to_string(),
        };
        println!("{:>7}: {} sats ({})", label, tip_sats, flow.memo(tip_sats)?);
    }
    Ok(())
}

async fn run_convert(terminal: &Terminal, amount: &str, from_sats: bool) -> anyhow::Result<()> {
    let ctx = terminal.currency_context().await?;
    if from_sats {
        let sats: u64 = amount
            .trim()
            .parse()
            .with_context(|| format!("'{}' is not a sats amount", amount))?;
        println!("{} sats = {}", sats, ctx.format_sats(sats)?);
    } else {
        let value = ctx.parse_amount(amount)?;
        println!("{} = {} sats", ctx.format(value), ctx.to_sats(value)?);
    }
    Ok(())
}

fn run_wipe(terminal: &Terminal, yes: bool) -> anyhow::Result<()> {
    if !recovery_affordance(terminal.store.as_ref()).allows_wipe() {
        bail!("Wipe is only available while no wallet is connected. Use `lnpos logout` first.");
    }
    if !yes {
        bail!("This deletes the PIN and every setting. Re-run with --yes to confirm.");
    }
    wipe_all_data(terminal.store.as_ref())?;
    println!("All local data deleted");
    Ok(())
}
