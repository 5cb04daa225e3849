//! x402-pay command-line entrypoint.
//!
//! Subcommands:
//! - `fetch <URL>` – Request a resource; when the server answers `402 Payment
//!   Required`, sign an EVM payment within the spend ceiling and retry once
//! - `discover` – List the paid resources a facilitator knows about, each
//!   with its cheapest valid requirement
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `EVM_PRIVATE_KEY`, `X402_FACILITATOR_URL` fill in missing config values
//! - `RUST_LOG` sets the log level; `OTEL_*` variables enable trace export

mod config;
mod sig_down;
mod telemetry;

use clap::Parser;
use dotenvy::dotenv;
use http::{HeaderName, HeaderValue, Method};
use tokio_util::sync::CancellationToken;
use x402_chain_eip155::Eip155ExactSigner;
use x402_reqwest::{FacilitatorClient, X402Client};

use crate::config::{CliArgs, Command, Config, DiscoverArgs, FetchArgs};
use crate::sig_down::SigDown;
use crate::telemetry::Telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let _telemetry = Telemetry::new();

    let cli_args = CliArgs::parse();
    let config = Config::load(cli_args.config.as_deref())?;

    let sig_down = SigDown::try_new()?;
    let cancellation = sig_down.cancellation_token();
    let result = match cli_args.command {
        Command::Fetch(args) => fetch(&config, args, cancellation).await,
        Command::Discover(args) => discover(&config, args, cancellation).await,
    };
    sig_down.shutdown().await;
    result
}

async fn fetch(
    config: &Config,
    args: FetchArgs,
    cancellation: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let private_key = config
        .private_key()
        .ok_or("No private key configured: set privateKey or EVM_PRIVATE_KEY")?;
    let signer = config
        .networks()
        .iter()
        .fold(Eip155ExactSigner::new(private_key.clone()), |signer, network| {
            signer.with_network(network)
        });

    let mut x402_client = X402Client::new(signer).with_cancellation_token(cancellation);
    if let Some(max_value) = config.max_value(args.max_value.as_ref())? {
        x402_client = x402_client.with_max_value(max_value);
    }
    if let Some(timeout) = config.request_timeout() {
        x402_client = x402_client.with_timeout(timeout);
    }

    let http_client = reqwest::Client::new();
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())?;
    let mut request = http_client.request(method, args.url.clone());
    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("Header must be `Name: value`, got {header}"))?;
        request = request.header(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    if let Some(data) = args.data {
        request = request.body(data);
    }
    let request = request.build()?;

    match x402_client.fetch_with_payment(&http_client, request).await {
        Ok(negotiated) => {
            let status = negotiated.response.status();
            println!("{status}");
            if let Some(proof) = &negotiated.proof {
                println!("{}: {}", proof.header_name(), proof.to_header_value()?);
            }
            println!();
            println!("{}", negotiated.response.text().await?);
            Ok(())
        }
        Err(failure) => {
            let (error, response) = failure.into_parts();
            tracing::error!(url = %args.url, "Payment failed: {error}");
            if let Some(response) = response {
                println!("{}", response.status());
                println!();
                println!("{}", response.text());
            }
            Err(error.into())
        }
    }
}

async fn discover(
    config: &Config,
    args: DiscoverArgs,
    cancellation: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let facilitator_url = args.facilitator.as_ref().unwrap_or(config.facilitator());
    let mut facilitator = FacilitatorClient::try_from(facilitator_url.as_str())?
        .with_cancellation_token(cancellation);
    if let Some(timeout) = config.request_timeout() {
        facilitator = facilitator.with_timeout(timeout);
    }

    let resources = facilitator.list_all().await?;
    tracing::info!(count = resources.len(), url = %facilitator.base_url(), "Listed resources");
    let limit = args.limit_output.unwrap_or(usize::MAX);
    for item in resources.iter().take(limit) {
        match item.cheapest() {
            Some((requirement, amount)) => println!(
                "{}\t{}\t{}\t{} {}",
                item.resource, requirement.network, requirement.scheme, amount, requirement.asset
            ),
            None => println!("{}\t-", item.resource),
        }
    }
    Ok(())
}
