use crate::error::Result;
use crate::gateway::{Coin, PricePoint};

/// Print a coin collection as formatted JSON to stdout.
pub fn print_coins_json(coins: &[Coin]) -> Result<()> {
    let output = serde_json::to_string_pretty(coins)
        .map_err(|e| crate::error::Error::Parse(format!("JSON serialize: {}", e)))?;
    println!("{}", output);
    Ok(())
}

/// Print a historical price series as formatted JSON to stdout.
pub fn print_points_json(points: &[PricePoint]) -> Result<()> {
    let output = serde_json::to_string_pretty(points)
        .map_err(|e| crate::error::Error::Parse(format!("JSON serialize: {}", e)))?;
    println!("{}", output);
    Ok(())
}
