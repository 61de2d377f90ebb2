//! `modchain` command-line client.
//!
//! Reads the signing key from `MODCHAIN_PRIVATE_KEY`; everything else comes
//! from an optional TOML config file and command-line overrides.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;

use modchain_client::auth::{Auth, AuthHeaders};
use modchain_client::blockchain::{ModuleInfo, Network, RecoveryVerifier, TxOutcome, Wallet};
use modchain_client::config::{load_config, validate_config, ClientConfig};
use modchain_client::observability::init_logging;
use modchain_client::rpc::{CallOutput, Client};

#[derive(Parser)]
#[command(name = "modchain")]
#[command(about = "Signed module calls and chain transactions", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Module server base URL (overrides rpc.base_url)
    #[arg(short, long)]
    url: Option<String>,

    /// Chain RPC endpoint (overrides network.endpoint)
    #[arg(short, long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a module function
    Call {
        function: String,
        /// JSON params
        #[arg(default_value = "{}")]
        params: String,
        #[arg(long, default_value_t = 0)]
        cost: u64,
    },
    /// Print a signed token for a call without sending it
    Token {
        function: String,
        #[arg(default_value = "{}")]
        params: String,
        #[arg(long, default_value_t = 0)]
        cost: u64,
    },
    /// Verify a token, optionally against the call it claims to cover
    Verify {
        token: String,
        #[arg(long)]
        function: Option<String>,
        #[arg(long)]
        params: Option<String>,
    },
    /// Show the balance of an address (defaults to the signer)
    Balance { address: Option<String> },
    /// Transfer tokens
    Transfer { dest: String, amount: String },
    /// Register a module
    Register {
        name: String,
        data: String,
        url: String,
        #[arg(long, default_value_t = 0)]
        take: u16,
    },
    /// Update a registered module
    Update {
        module_id: u64,
        name: String,
        data: String,
        url: String,
        #[arg(long, default_value_t = 0)]
        take: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = cli.url {
        config.rpc.base_url = url;
    }
    if let Some(endpoint) = cli.endpoint {
        config.network.endpoint = endpoint;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("Invalid configuration: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    init_logging(&config.observability);

    match cli.command {
        Commands::Call {
            function,
            params,
            cost,
        } => {
            let client = Client::new(&config.rpc, auth(&config)?)?;
            let params = parse_json(&params)?;
            match client.call(&function, &params, cost).await? {
                CallOutput::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                CallOutput::Stream(summary) => {
                    println!("stream closed: {} chunks, {} bytes", summary.chunks, summary.bytes)
                }
                CallOutput::Text(text) => println!("{}", text),
            }
        }
        Commands::Token {
            function,
            params,
            cost,
        } => {
            let params = parse_json(&params)?;
            let headers = auth(&config)?.generate(&call_payload(&function, params), cost)?;
            println!("{}", headers.token);
        }
        Commands::Verify {
            token,
            function,
            params,
        } => {
            let payload = match function {
                Some(function) => {
                    let params = parse_json(params.as_deref().unwrap_or("{}"))?;
                    Some(call_payload(&function, params))
                }
                None => None,
            };
            let verifier = Auth::new(Arc::new(RecoveryVerifier), config.auth.clone());
            let valid = verifier.verify(&AuthHeaders { token }, payload.as_ref())?;
            println!("{}", if valid { "valid" } else { "invalid" });
            if !valid {
                std::process::exit(1);
            }
        }
        Commands::Balance { address } => {
            let address = match address {
                Some(address) => address,
                None => wallet(&config)?.address().to_string(),
            };
            let network = Network::evm(config.network.clone())?;
            println!("{}", network.balance_formatted(&address).await?);
        }
        Commands::Transfer { dest, amount } => {
            let network = Network::evm(config.network.clone())?.with_signer(wallet(&config)?);
            print_outcome(&network.transfer(&dest, &amount).await?)?;
        }
        Commands::Register {
            name,
            data,
            url,
            take,
        } => {
            let network = Network::evm(config.network.clone())?.with_signer(wallet(&config)?);
            let module = ModuleInfo {
                name,
                data,
                url,
                take,
            };
            print_outcome(&network.register(&module).await?)?;
        }
        Commands::Update {
            module_id,
            name,
            data,
            url,
            take,
        } => {
            let network = Network::evm(config.network.clone())?.with_signer(wallet(&config)?);
            let module = ModuleInfo {
                name,
                data,
                url,
                take,
            };
            print_outcome(&network.update(module_id, &module).await?)?;
        }
    }

    Ok(())
}

fn wallet(config: &ClientConfig) -> Result<Wallet, Box<dyn std::error::Error>> {
    Ok(Wallet::from_env(config.network.chain_id)?)
}

fn auth(config: &ClientConfig) -> Result<Auth, Box<dyn std::error::Error>> {
    Ok(Auth::new(Arc::new(wallet(config)?), config.auth.clone()))
}

fn parse_json(text: &str) -> Result<Value, Box<dyn std::error::Error>> {
    serde_json::from_str(text).map_err(|e| format!("params must be JSON: {}", e).into())
}

fn call_payload(function: &str, params: Value) -> Value {
    serde_json::json!({ "fn": function, "params": params })
}

fn print_outcome(outcome: &TxOutcome) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}
