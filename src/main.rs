use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use cw_client::{cancellation, Client, ClientConfig, SigningOptions, TransactionResult};
use cw_crypto::SigningKey;
use cw_keyring::FileKeystore;
use cw_log::LogFormat;
use cw_types::{Addr, AdminOption, Coins, Hash, KeyType};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const PASSWORD_ENV: &str = "CWCLI_PASSWORD";

#[derive(Parser)]
#[command(
    name = "cwcli",
    about = "Command line client for cw-sdk chains",
    version,
    author
)]
struct Cli {
    #[arg(long, global = true, value_name = "DIR", help = "Home directory (default ~/.cwcli)")]
    home: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Node RPC endpoint, overriding the config",
    )]
    node: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "ID",
        help = "Expected chain ID, overriding the config",
    )]
    chain_id: Option<String>,

    #[arg(long, global = true, value_name = "FORMAT", help = "Output format (text, json)")]
    output: Option<String>,

    #[arg(
        long,
        global = true,
        default_value = "warn",
        value_name = "LEVEL",
        help = "Log filter, e.g. info or cw_client=debug",
    )]
    log_level: String,

    #[arg(
        long,
        global = true,
        default_value = "pretty",
        value_name = "FORMAT",
        help = "Log format (json, pretty)",
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show chain ID and latest block")]
    Info,

    #[command(about = "Show an account's sequence and public key")]
    Account {
        #[arg(value_name = "ADDRESS")]
        address: Addr,
    },

    #[command(about = "Show balances of an address")]
    Balances {
        #[arg(value_name = "ADDRESS")]
        address: Addr,

        #[arg(long, value_name = "DENOM", help = "Only this denomination")]
        denom: Option<String>,
    },

    #[command(about = "Send coins")]
    Transfer {
        #[command(flatten)]
        tx: TxArgs,

        #[arg(value_name = "TO")]
        to: Addr,

        #[arg(value_name = "COINS", help = "e.g. 100uatom,5uosmo")]
        coins: Coins,
    },

    #[command(about = "Upload a wasm module and instantiate it in one transaction")]
    StoreInstantiate {
        #[command(flatten)]
        tx: TxArgs,

        #[arg(value_name = "WASM_FILE")]
        wasm: PathBuf,

        #[arg(long, value_name = "JSON", help = "Instantiate message")]
        msg: String,

        #[arg(long, value_name = "LABEL", help = "Salt for the contract address")]
        label: String,

        #[arg(long, value_name = "COINS", help = "Funds sent to the contract")]
        funds: Option<Coins>,

        #[arg(
            long,
            default_value = "none",
            value_name = "ADMIN",
            help = "Admin: none, self or an address",
        )]
        admin: String,
    },

    #[command(about = "Wait for a transaction to be included")]
    Wait {
        #[arg(value_name = "HASH")]
        hash: Hash,

        #[arg(long, value_name = "MS", help = "Give up after this long (default from config)")]
        timeout_ms: Option<u64>,
    },

    #[command(about = "Key management")]
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Args)]
struct TxArgs {
    #[arg(long, value_name = "NAME", help = "Signing key name")]
    from: String,

    #[arg(long, value_name = "GAS", help = "Gas limit; simulated when omitted")]
    gas_limit: Option<u64>,

    #[arg(long, default_value = "", value_name = "TEXT")]
    memo: String,

    #[arg(long, value_name = "MS", help = "Confirmation timeout (default from config)")]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum KeysCommands {
    #[command(about = "Generate and store a new key")]
    New {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(
            long,
            default_value = "secp256k1",
            value_name = "TYPE",
            help = "secp256k1 or ed25519",
        )]
        key_type: String,
    },

    #[command(about = "Show the address of a stored key")]
    Show {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },

    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Set a configuration value")]
    Set {
        #[arg(value_name = "KEY")]
        key: String,

        #[arg(value_name = "VALUE")]
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cw_log::init_tracing_with(&cli.log_level, cli.log_format)
        .map_err(|e| anyhow!("invalid log filter {:?}: {e}", cli.log_level))?;

    let home = cli.home.clone().unwrap_or_else(ClientConfig::default_config_dir);

    match cli.command {
        Commands::Keys { command } => keys_command(&home, command).await,
        Commands::Config { command } => config_command(&home, command),
        command => {
            let config = load_config(&home, &cli.node, &cli.chain_id, &cli.output)?;
            chain_command(&home, config, command).await
        }
    }
}

fn key_file(home: &Path, name: &str) -> PathBuf {
    home.join("keys").join(format!("{name}.json"))
}

fn load_config(
    home: &Path,
    node: &Option<String>,
    chain_id: &Option<String>,
    output: &Option<String>,
) -> Result<ClientConfig> {
    let mut config = ClientConfig::load_or_default(home).with_context(|| {
        format!("loading {}", ClientConfig::config_file(home).display())
    })?;

    if let Some(node) = node {
        config.set("endpoint", node)?;
    }
    if let Some(chain_id) = chain_id {
        config.set("chain_id", chain_id)?;
    }
    if let Some(output) = output {
        config.set("output", output)?;
    }
    Ok(config)
}

fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(prompt).context("reading password")
}

async fn chain_command(home: &Path, config: ClientConfig, command: Commands) -> Result<()> {
    let json_output = config.output == "json";
    let confirm_timeout = config.confirm_timeout();

    let (handle, token) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling");
            handle.cancel();
        }
    });

    let client = Client::connect(config).await?.with_cancellation(token);

    match command {
        Commands::Info => {
            let info = client.query_info().await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("chain_id: {}", info.chain_id);
                println!("height: {}", info.last_finalized_block.height);
            }
        }
        Commands::Account { address } => {
            let account = client.query_account(&address).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&account)?);
            } else {
                println!("address: {}", account.address);
                println!("sequence: {}", account.sequence);
                if let Some(key) = account.public_key {
                    println!("public_key: {} {}", key.key_type, key.value.to_base64());
                }
            }
        }
        Commands::Balances { address, denom } => {
            let balances = match denom {
                Some(denom) => {
                    let coin = client.query_balance(&address, &denom).await?;
                    Coins::new(vec![coin])?
                }
                None => client.query_balances(&address).await?,
            };
            if json_output {
                println!("{}", serde_json::to_string_pretty(&balances)?);
            } else if balances.is_empty() {
                println!("no balances");
            } else {
                for coin in &balances {
                    println!("{coin}");
                }
            }
        }
        Commands::Transfer { tx, to, coins } => {
            let opts = signing_options(home, &tx).await?;
            let result = client.transfer(&to, coins, &opts).await?;
            print_result(&result, None, json_output)?;
        }
        Commands::StoreInstantiate {
            tx,
            wasm,
            msg,
            label,
            funds,
            admin,
        } => {
            let wasm_byte_code = tokio::fs::read(&wasm)
                .await
                .with_context(|| format!("reading {}", wasm.display()))?;
            let msg: Value = serde_json::from_str(&msg).context("parsing --msg")?;
            let admin = parse_admin(&admin)?;
            let opts = signing_options(home, &tx).await?;

            let (contract, result) = client
                .store_code_and_instantiate(
                    wasm_byte_code,
                    msg,
                    label.into_bytes(),
                    funds.unwrap_or_default(),
                    admin,
                    &opts,
                )
                .await?;
            print_result(&result, Some(&contract), json_output)?;
        }
        Commands::Wait { hash, timeout_ms } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(confirm_timeout);
            let result = client.await_confirmation(&hash, timeout).await?;
            print_result(&result, None, json_output)?;
        }
        Commands::Keys { .. } | Commands::Config { .. } => bail!("not a chain command"),
    }
    Ok(())
}

async fn signing_options(home: &Path, tx: &TxArgs) -> Result<SigningOptions> {
    let path = key_file(home, &tx.from);
    let password = read_password(&format!("Password for {}: ", tx.from))?;
    let key = FileKeystore::load(&path, &password)
        .await
        .with_context(|| format!("loading key {}", tx.from))?;

    let mut opts = SigningOptions::new(key.address(), Arc::new(key)).memo(tx.memo.clone());
    if let Some(gas_limit) = tx.gas_limit {
        opts = opts.gas_limit(gas_limit);
    }
    if let Some(ms) = tx.timeout_ms {
        opts = opts.confirm_timeout(Duration::from_millis(ms));
    }
    Ok(opts)
}

fn parse_admin(value: &str) -> Result<AdminOption> {
    Ok(match value {
        "none" => AdminOption::SetToNone,
        "self" => AdminOption::SetToSelf,
        addr => AdminOption::SetToAddr(
            addr.parse()
                .map_err(|e| anyhow!("invalid admin {addr:?}: {e}"))?,
        ),
    })
}

fn print_result(
    result: &TransactionResult,
    contract: Option<&Addr>,
    json_output: bool,
) -> Result<()> {
    let mut report = match result {
        TransactionResult::Pending { hash } => json!({
            "status": "pending",
            "hash": hash.to_string(),
        }),
        TransactionResult::Included {
            hash,
            height,
            gas_used,
            events,
        } => json!({
            "status": "included",
            "hash": hash.to_string(),
            "height": height,
            "gas_used": gas_used,
            "events": events,
        }),
        TransactionResult::Failed {
            hash,
            height,
            code,
            log,
        } => json!({
            "status": "failed",
            "hash": hash.to_string(),
            "height": height,
            "code": code,
            "log": log,
        }),
    };
    if let Some(contract) = contract {
        report["contract"] = json!(contract);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(contract) = contract {
        println!("contract: {contract}");
    }
    println!("hash: {}", result.hash());
    match result {
        TransactionResult::Pending { .. } => {
            println!("status: pending (run `cwcli wait {}` to keep polling)", result.hash())
        }
        TransactionResult::Included { height, gas_used, .. } => {
            println!("status: included at height {height}, gas used {gas_used}")
        }
        TransactionResult::Failed { code, log, .. } => println!("status: failed ({code}): {log}"),
    }
    Ok(())
}

async fn keys_command(home: &Path, command: KeysCommands) -> Result<()> {
    match command {
        KeysCommands::New { name, key_type } => {
            let key_type = match key_type.as_str() {
                "secp256k1" => KeyType::Secp256k1,
                "ed25519" => KeyType::Ed25519,
                other => bail!("unknown key type {other:?}"),
            };
            let password = read_password("New key password: ")?;
            if password.is_empty() {
                bail!("password must not be empty");
            }

            let key = SigningKey::generate(key_type);
            let path = key_file(home, &name);
            FileKeystore::save(&path, &key, &password).await?;
            println!("name: {name}");
            println!("address: {}", key.address());
            println!("file: {}", path.display());
        }
        KeysCommands::Show { name } => {
            let address = FileKeystore::address(key_file(home, &name))
                .await
                .with_context(|| format!("reading key {name}"))?;
            println!("{address}");
        }
    }
    Ok(())
}

fn config_command(home: &Path, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            ClientConfig::init(home, force)?;
            println!("config: {}", ClientConfig::config_file(home).display());
        }
        ConfigCommands::Show => {
            let config = ClientConfig::load_or_default(home)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Set { key, value } => {
            let path = ClientConfig::config_file(home);
            let mut config = ClientConfig::init(home, false)?;
            config.set(&key, &value)?;
            config.save_to_file(&path)?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}
