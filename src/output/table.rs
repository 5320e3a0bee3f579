use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::gateway::{Coin, Currency, PricePoint};
use crate::output::chart;

#[derive(Tabled)]
struct CoinRow {
    #[tabled(rename = "#")]
    rank: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "24h Change")]
    change_24h: String,
    #[tabled(rename = "Market Cap")]
    market_cap: String,
}

/// Print a coin collection as a styled table to stdout.
pub fn print_coins_table(coins: &[Coin], currency: Currency) {
    let rows: Vec<CoinRow> = coins
        .iter()
        .map(|c| {
            let change = c.price_change_percentage_24h;
            let change_str = if change >= 0.0 {
                format!("+{:.2}%", change).green().to_string()
            } else {
                format!("{:.2}%", change).red().to_string()
            };

            CoinRow {
                rank: c
                    .market_cap_rank
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                symbol: c.symbol.to_uppercase().bold().to_string(),
                name: c.name.clone(),
                price: format_price(c.current_price, currency),
                change_24h: change_str,
                market_cap: format_market_cap(c.market_cap, currency),
            }
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

#[derive(Tabled)]
struct SearchRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Name")]
    name: String,
}

/// Print search results as a styled table to stdout.
///
/// Search rows carry no market data, so only identity columns are shown.
pub fn print_search_table(coins: &[Coin]) {
    let rows: Vec<SearchRow> = coins
        .iter()
        .map(|c| SearchRow {
            id: c.id.clone(),
            symbol: c.symbol.to_uppercase().bold().to_string(),
            name: c.name.clone(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a summary plus an ASCII chart for a daily price series.
pub fn print_price_chart(symbol: &str, currency: Currency, points: &[PricePoint], days: u32) {
    if points.is_empty() {
        println!("No chart data for {}", symbol.to_uppercase());
        return;
    }

    let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
    let start = prices[0];
    let end = prices[prices.len() - 1];
    let low = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let high = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let change_pct = if start.abs() > f64::EPSILON {
        ((end - start) / start) * 100.0
    } else {
        0.0
    };

    let trend = if change_pct >= 0.0 {
        format!("+{change_pct:.2}%").green().to_string()
    } else {
        format!("{change_pct:.2}%").red().to_string()
    };

    println!(
        "{}  [{} {}d]",
        symbol.to_uppercase().bold(),
        currency.as_str().to_uppercase(),
        days
    );
    println!(
        "Start: {}  End: {}  Change: {}",
        format_price(start, currency),
        format_price(end, currency),
        trend
    );
    println!(
        "Low:   {}  High: {}",
        format_price(low, currency),
        format_price(high, currency)
    );
    println!(
        "{}",
        chart::render_price_chart(&symbol.to_uppercase(), currency, points, 96, 18)
    );
    println!();
}

fn format_price(price: f64, currency: Currency) -> String {
    let sym = currency_symbol(currency);
    if price >= 1.0 {
        format!("{}{}", sym, format_with_commas(price, 2))
    } else if price >= 0.01 {
        format!("{}{:.4}", sym, price)
    } else {
        format!("{}{:.8}", sym, price)
    }
}

fn format_with_commas(value: f64, decimals: usize) -> String {
    let formatted = format!("{value:.decimals$}");
    let parts: Vec<&str> = formatted.split('.').collect();
    let whole = parts[0];

    let mut result = String::new();
    for (i, ch) in whole.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    let whole_formatted: String = result.chars().rev().collect();

    if parts.len() > 1 {
        format!("{}.{}", whole_formatted, parts[1])
    } else {
        whole_formatted
    }
}

fn format_market_cap(cap: f64, currency: Currency) -> String {
    let sym = currency_symbol(currency);
    if cap >= 1_000_000_000_000.0 {
        format!("{}{:.2}T", sym, cap / 1_000_000_000_000.0)
    } else if cap >= 1_000_000_000.0 {
        format!("{}{:.2}B", sym, cap / 1_000_000_000.0)
    } else if cap >= 1_000_000.0 {
        format!("{}{:.2}M", sym, cap / 1_000_000.0)
    } else if cap >= 1_000.0 {
        format!("{}{:.2}K", sym, cap / 1_000.0)
    } else {
        format!("{}{:.2}", sym, cap)
    }
}

fn currency_symbol(currency: Currency) -> &'static str {
    match currency {
        Currency::Usd => "$",
        Currency::Eur => "\u{20ac}",
    }
}
