use std::str::FromStr;

use lazor_swap::{
    account::{recent_activity, WalletBalances},
    config::SwapConfig,
    normalize::normalize,
    price::{sol_price_or_zero, PriceClient},
    quote::QuoteRequest,
    swap::SwapRequest,
    token::SwapDirection,
    RaydiumClient,
};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::from_path("demos/.env").ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SwapConfig::from_env()?;
    let wallet = std::env::var("SMART_WALLET")
        .map_err(|_| anyhow::anyhow!("SMART_WALLET environment variable must be set"))?;
    let wallet = Pubkey::from_str(&wallet)?;
    let direction = std::env::var("SWAP_DIRECTION")
        .unwrap_or_else(|_| "usdc-to-sol".to_string())
        .parse::<SwapDirection>()?;
    let amount = std::env::var("SWAP_AMOUNT").unwrap_or_else(|_| "1".to_string());

    let rpc = RpcClient::new(config.rpc_url.clone());
    let balances = WalletBalances::fetch(&rpc, &wallet).await?;
    let sol_price = sol_price_or_zero(&PriceClient::new(Some(config.price_url.clone()))).await;
    println!(
        "Wallet {}: {:.4} SOL, {:.2} USDC (${:.2} total)",
        wallet,
        balances.sol,
        balances.usdc,
        balances.total_usd(sol_price)
    );

    let client = RaydiumClient::new(Some(config.swap_host.clone()));
    let raw_amount = direction.input_asset().to_raw_amount(&amount)?;
    let quote = client
        .quote(&QuoteRequest::new(direction, raw_amount, config.slippage_bps))
        .await?;
    println!(
        "Quote: {} {} -> {} ({} bps slippage)",
        amount,
        direction.input_asset().symbol,
        quote
            .output_amount()
            .map(|out| format!(
                "{:.6} {}",
                direction.output_asset().to_ui_amount(out),
                direction.output_asset().symbol
            ))
            .unwrap_or_else(|| "?".to_string()),
        config.slippage_bps
    );

    let request = SwapRequest::new(
        quote,
        wallet,
        direction,
        config.compute_unit_price_micro_lamports,
    );
    let payload = client.swap_transaction(&request).await?;
    let normalized = normalize(&payload, &rpc).await?;

    println!(
        "Swap: {} transaction, {} instruction{}, {} ALT{}",
        payload.version,
        normalized.instructions.len(),
        if normalized.instructions.len() == 1 { "" } else { "s" },
        normalized.lookup_tables.len(),
        if normalized.lookup_tables.len() == 1 {
            ""
        } else {
            "s"
        }
    );
    for ix in &normalized.instructions {
        println!("  {} ({} accounts)", ix.program_id, ix.accounts.len());
    }

    println!("\nSigning requires the passkey relay; submit from the wallet app.");

    let activity = recent_activity(&rpc, &wallet, config.activity_limit).await;
    println!("\nRecent activity ({}):", activity.len());
    for record in activity.iter().take(5) {
        println!(
            "  {} {} slot {} {}",
            record.status, record.timestamp, record.slot, record.signature
        );
    }

    Ok(())
}
