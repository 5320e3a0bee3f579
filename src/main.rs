use clap::Parser;
use cointrack::error::{Error, Result};
use cointrack::favorites::Favorites;
use cointrack::gateway::coingecko::CoinGecko;
use cointrack::gateway::{Coin, Currency, MarketDataGateway};
use cointrack::list::CoinList;
use cointrack::store::CoinStore;
use cointrack::{config, output};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const APP_VERSION: &str = env!("COINTRACK_VERSION");

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CurrencyArg {
    Usd,
    Eur,
}

impl From<CurrencyArg> for Currency {
    fn from(value: CurrencyArg) -> Self {
        match value {
            CurrencyArg::Usd => Self::Usd,
            CurrencyArg::Eur => Self::Eur,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "cointrack",
    version = APP_VERSION,
    about = "Track crypto market data, tracked coins and favorites from your terminal"
)]
struct Cli {
    /// Fiat currency for the displayed collection
    #[arg(long, short, value_enum)]
    currency: Option<CurrencyArg>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Track a coin by its API id (e.g. bitcoin)
    #[arg(long, value_name = "ID")]
    add: Option<String>,

    /// Stop tracking the coin at this position in the visible list
    #[arg(long, value_name = "POSITION")]
    remove: Option<usize>,

    /// Search coins by name or symbol
    #[arg(long, short, value_name = "QUERY", conflicts_with_all = ["add", "remove", "chart"])]
    search: Option<String>,

    /// Show the favorite list
    #[arg(long, conflicts_with_all = ["add", "remove", "search", "chart"])]
    favorites: bool,

    /// Toggle favorite status for a coin by its API id
    #[arg(long, value_name = "ID", conflicts_with_all = ["add", "remove", "search", "chart", "favorites"])]
    favorite: Option<String>,

    /// Plot the daily price history for a coin by its API id
    #[arg(long, value_name = "ID")]
    chart: Option<String>,

    /// Day window for chart mode
    #[arg(long, default_value_t = 7, requires = "chart")]
    days: u32,

    /// API key for the market data provider
    #[arg(long, env = "COINGECKO_API_KEY")]
    api_key: Option<String>,

    /// Explicit config file path (overrides XDG lookup)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_currency(flag: Option<CurrencyArg>, app_config: &config::AppConfig) -> Result<Currency> {
    if let Some(arg) = flag {
        return Ok(arg.into());
    }

    Ok(app_config
        .defaults
        .parsed_currency()?
        .unwrap_or(config::DEFAULT_CURRENCY))
}

/// Surface a service's dismissible error message, if it recorded one.
fn report_error(message: Option<String>) {
    if let Some(message) = message {
        eprintln!("Warning: {}", message);
    }
}

#[tokio::main]
async fn main() {
    // Load .env before CLI parsing so env-backed args (e.g. COINGECKO_API_KEY)
    // pick it up.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!(error = %e, "fatal error");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let app_config = match cli.config.as_deref() {
        Some(path) => config::load_from_path(path)?,
        None => config::load()?,
    };

    let api_key = cli.api_key.or_else(|| app_config.coingecko.api_key.clone());
    let currency = resolve_currency(cli.currency, &app_config)?;

    let gateway: Arc<dyn MarketDataGateway> = Arc::new(CoinGecko::new(api_key));

    let store_path = app_config
        .storage
        .path
        .clone()
        .or_else(CoinStore::default_path)
        .ok_or_else(|| {
            Error::Config("could not resolve a data directory -- set [storage].path in config".into())
        })?;
    let store = Arc::new(CoinStore::open(&store_path)?);

    if let Some(query) = cli.search.as_deref() {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Config(
                "search mode requires a query -- usage: cointrack --search solana".into(),
            ));
        }

        info!(query = %query, "searching coins");
        let list = CoinList::new(gateway.clone(), store.clone(), currency);
        list.search(query).await;
        report_error(list.take_error().await);

        let results = list.search_results().await;
        if cli.json {
            output::json::print_coins_json(&results)?;
        } else {
            output::table::print_search_table(&results);
        }

        return Ok(());
    }

    if let Some(id) = cli.chart.as_deref() {
        info!(id = %id, currency = currency.as_str(), days = cli.days, "fetching price history");
        let points = gateway.historical_prices(id, currency, cli.days).await?;

        if cli.json {
            output::json::print_points_json(&points)?;
        } else {
            output::table::print_price_chart(id, currency, &points, cli.days);
        }

        return Ok(());
    }

    if cli.favorites {
        let favorites = Favorites::new(gateway.clone(), store.clone(), currency);
        favorites.load().await;
        report_error(favorites.take_error().await);

        let coins = favorites.coins().await;
        if cli.json {
            output::json::print_coins_json(&coins)?;
        } else {
            output::table::print_coins_table(&coins, currency);
        }

        return Ok(());
    }

    let list = CoinList::new(gateway.clone(), store.clone(), currency);
    list.load().await;
    report_error(list.take_error().await);

    if let Some(id) = cli.favorite.as_deref() {
        let visible = list.visible().await;
        let favorites = Favorites::new(gateway.clone(), store.clone(), currency);
        favorites.load().await;

        let target = visible
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .unwrap_or_else(|| Coin::placeholder(id, "", "", ""));
        favorites.toggle(&target, &visible).await;
        report_error(favorites.take_error().await);

        let coins = favorites.coins().await;
        if cli.json {
            output::json::print_coins_json(&coins)?;
        } else {
            output::table::print_coins_table(&coins, currency);
        }

        return Ok(());
    }

    if let Some(id) = cli.add.as_deref() {
        info!(id = %id, "tracking coin");
        list.add_coin(id).await;
    }

    if let Some(position) = cli.remove {
        info!(position, "untracking coin");
        list.remove_at(position).await;
    }

    report_error(list.take_error().await);

    let visible = list.visible().await;
    if cli.json {
        output::json::print_coins_json(&visible)?;
    } else {
        output::table::print_coins_table(&visible, currency);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_flag_overrides_config() {
        let mut app_config = config::AppConfig::default();
        app_config.defaults.currency = Some("eur".to_string());

        let resolved = resolve_currency(Some(CurrencyArg::Usd), &app_config).unwrap();
        assert_eq!(resolved, Currency::Usd);
    }

    #[test]
    fn config_currency_used_when_flag_absent() {
        let mut app_config = config::AppConfig::default();
        app_config.defaults.currency = Some("eur".to_string());

        let resolved = resolve_currency(None, &app_config).unwrap();
        assert_eq!(resolved, Currency::Eur);
    }

    #[test]
    fn builtin_default_currency_when_nothing_configured() {
        let app_config = config::AppConfig::default();
        let resolved = resolve_currency(None, &app_config).unwrap();
        assert_eq!(resolved, Currency::Usd);
    }
}
