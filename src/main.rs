// src/main.rs
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use ethers::types::{Address, Bytes, U256};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use zk_paymaster::paymaster::encode_partner_code;
use zk_paymaster::{
    Network, PaymasterClient, PaymasterConfig, PaymentKind, PaymentMode, PaymentRequest, Program,
    SigningCredential, TransactionDraft,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Sponsor,
    Erc20,
    Nft,
}

impl From<Mode> for PaymentKind {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Sponsor => PaymentKind::Sponsor,
            Mode::Erc20 => PaymentKind::Erc20,
            Mode::Nft => PaymentKind::Nft,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Submit a zkSync transaction through a paymaster", long_about = None)]
struct Args {
    #[clap(short, long, default_value = "testnet")]
    network: Network,

    #[clap(short, long)]
    private_key: String,

    /// Contract to call
    #[clap(long)]
    to: String,

    /// Hex-encoded calldata
    #[clap(long, default_value = "0x")]
    data: String,

    /// Value in wei
    #[clap(long, default_value = "0")]
    value: String,

    #[clap(short, long, value_enum, default_value = "sponsor")]
    mode: Mode,

    /// ERC-20 token paying the fee
    #[clap(long)]
    token: Option<String>,

    #[clap(long)]
    nft_type: Option<u8>,

    #[clap(long)]
    paymaster_address: Option<String>,

    /// Hex-encoded inner input passed to the paymaster
    #[clap(long)]
    inner_input: Option<String>,

    /// Partner code; switches to the partner paymaster program
    #[clap(long)]
    partner: Option<String>,

    /// Send from this smart account, signing as its controller
    #[clap(long)]
    smart_account: Option<String>,

    #[clap(long)]
    gas_limit: Option<u64>,

    /// Extra gas in percent on top of the estimate
    #[clap(long)]
    buffer: Option<u64>,
}

fn parse_address(raw: &str) -> anyhow::Result<Address> {
    Address::from_str(raw).map_err(|e| anyhow::anyhow!("invalid address {raw}: {e}"))
}

fn parse_hex(raw: &str) -> anyhow::Result<Bytes> {
    let bytes = hex::decode(raw.trim_start_matches("0x")).with_context(|| format!("invalid hex {raw}"))?;
    Ok(Bytes::from(bytes))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = PaymasterConfig::from_env()?;

    let value = U256::from_dec_str(&args.value)
        .map_err(|e| anyhow::anyhow!("invalid value {}: {e}", args.value))?;
    let draft =
        TransactionDraft::call(parse_address(&args.to)?, parse_hex(&args.data)?).with_value(value);
    let mut request = PaymentRequest::new(args.network, draft);

    if let Some(paymaster) = &args.paymaster_address {
        request = request.with_paymaster_address(parse_address(paymaster)?);
    }
    if let Some(inner_input) = &args.inner_input {
        request = request.with_inner_input(parse_hex(inner_input)?);
    }
    if let Some(gas_limit) = args.gas_limit {
        request = request.with_gas_limit(U256::from(gas_limit));
    }
    if let Some(buffer) = args.buffer {
        request = request.with_gas_buffer_percent(buffer);
    }

    let mut client = PaymasterClient::new(config);
    if let Some(partner) = &args.partner {
        request = request.with_inner_input(encode_partner_code(partner)?);
        client = client.program(Program::Partner);
    }

    let token = args.token.as_deref().map(parse_address).transpose()?;
    let mode = PaymentMode::from_parts(args.mode.into(), token, args.nft_type)?;
    let credential = SigningCredential::from(args.private_key);

    info!("Submitting {:?} payment on {}", mode, args.network);
    let hash = match &args.smart_account {
        Some(account) => {
            client
                .execute_smart_account(&request, &mode, credential, parse_address(account)?)
                .await?
        }
        None => client.execute(&request, &mode, credential).await?,
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "network": args.network.to_string(),
            "transactionHash": format!("{:?}", hash),
        }))?
    );

    Ok(())
}
