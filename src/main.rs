use anyhow::{bail, Context as _};
use clap::{Args, Parser, Subcommand};
use pagepilot::{ActionCommand, AutomationEngine, Config, MemoryPage, PageDriver};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Drive a web page with declarative action commands.
#[derive(Parser)]
#[command(name = "pagepilot")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    page: PageArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PageArgs {
    /// Page to open in Chrome
    #[arg(long, global = true, conflicts_with = "html")]
    url: Option<String>,

    /// Local HTML file loaded into the in-memory page
    #[arg(long, global = true)]
    html: Option<PathBuf>,

    /// Force headless Chrome
    #[arg(long, global = true)]
    headless: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a batch of actions and print the results
    Run {
        /// JSON file holding an array of commands
        #[arg(long)]
        actions: PathBuf,
    },
    /// Print the page context
    Context,
    /// Print the forms found on the page
    Forms,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if cli.page.headless {
        config.browser.headless = true;
    }
    Ok(config)
}

async fn open_page(args: &PageArgs, config: &Config) -> anyhow::Result<Box<dyn PageDriver>> {
    if let Some(path) = &args.html {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        info!("loaded {} into the in-memory page", path.display());
        return Ok(Box::new(MemoryPage::from_html(&html)));
    }

    match &args.url {
        Some(url) => open_chrome(url, config).await,
        None => bail!("either --url or --html is required"),
    }
}

#[cfg(feature = "chrome")]
async fn open_chrome(url: &str, config: &Config) -> anyhow::Result<Box<dyn PageDriver>> {
    let mut page = pagepilot::ChromePage::launch(&config.browser)?;
    page.navigate(url).await?;
    page.wait_for_load(std::time::Duration::from_millis(config.browser.navigation_timeout_ms))
        .await?;
    info!("opened {}", url);
    Ok(Box::new(page))
}

#[cfg(not(feature = "chrome"))]
async fn open_chrome(_url: &str, _config: &Config) -> anyhow::Result<Box<dyn PageDriver>> {
    bail!("this build has no Chrome support; use --html")
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let page = open_page(&cli.page, &config).await?;

    let mut engine = AutomationEngine::new(page, config)?;
    engine.initialize().await?;

    let mut failed = 0;
    match &cli.command {
        Commands::Run { actions } => {
            let raw = std::fs::read_to_string(actions)
                .with_context(|| format!("failed to read {}", actions.display()))?;
            let commands = ActionCommand::batch_from_json_str(&raw)?;
            info!("executing {} actions", commands.len());

            let results = engine.execute_actions(&commands).await?;
            failed = results.iter().filter(|r| !r.success()).count();
            print_json(&results)?;
        }
        Commands::Context => {
            let context = engine.capture_context().await?;
            print_json(&context)?;
        }
        Commands::Forms => {
            let context = engine.capture_context().await?;
            print_json(&context.forms)?;
        }
    }

    engine.dispose().await?;
    if failed > 0 {
        warn!("{} actions failed", failed);
        std::process::exit(1);
    }
    Ok(())
}
