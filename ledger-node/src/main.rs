//! Ledger node - command-line front end
//!
//! Manages wallets and drives a local proof-of-work chain stored on disk:
//! creating the chain, sending value between addresses, querying balances
//! and auditing stored blocks.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::{
    chain::Chain, store::RedbStore, tx_builder::build_spend, utxo::UtxoView, wallet::Wallets, Address,
    LedgerError,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use crate::config::NodeConfig;

/// Ledger node CLI
#[derive(Parser)]
#[command(name = "ledger")]
#[command(version)]
#[command(about = "Single-node proof-of-work ledger", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "LEDGER_CONFIG", default_value = "ledger.toml")]
    config: PathBuf,

    /// Data directory for chain storage, overrides the configuration file
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new wallet and store it in the wallet file
    #[command(name = "createwallet")]
    CreateWallet,

    /// List the addresses in the wallet file
    #[command(name = "listaddresses")]
    ListAddresses,

    /// Create a chain whose genesis reward goes to ADDRESS
    #[command(name = "createblockchain")]
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },

    /// Send AMOUNT from one address to another and mine the block
    #[command(name = "send")]
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },

    /// Print the balance of ADDRESS
    #[command(name = "getbalance")]
    GetBalance {
        #[arg(long)]
        address: String,
    },

    /// Print every block from the tip back to genesis
    #[command(name = "printchain")]
    PrintChain,

    /// Check proof-of-work, links, signatures and value flow of every stored block
    #[command(name = "verifychain")]
    VerifyChain,
}

fn parse_address(text: &str) -> Result<Address> {
    text.parse::<Address>()
        .map_err(|e| LedgerError::InvalidAddress(e.to_string()))
        .with_context(|| format!("Address {} is not valid", text))
}

fn open_chain(node_config: &NodeConfig) -> Result<Chain<RedbStore>> {
    let store = RedbStore::open(node_config.store_path())?;
    Chain::open(store, node_config.chain.clone()).with_context(|| {
        format!(
            "No blockchain in {}, run createblockchain first",
            node_config.data_dir.display()
        )
    })
}

fn run(cli: Cli) -> Result<()> {
    let mut node_config = NodeConfig::load(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        node_config.data_dir = data_dir;
    }

    match cli.command {
        Command::CreateWallet => {
            let mut wallets = Wallets::load(node_config.wallet_path())?;
            let address = wallets.create_wallet();
            wallets.save().context("Failed to save wallet file")?;
            println!("New address: {}", address);
        }

        Command::ListAddresses => {
            let wallets = Wallets::load(node_config.wallet_path())?;
            for address in wallets.addresses() {
                println!("{}", address);
            }
        }

        Command::CreateBlockchain { address } => {
            let address = parse_address(&address)?;
            let store = RedbStore::open(node_config.store_path())?;
            let chain = Chain::init(store, node_config.chain.clone(), &address.public_key_hash())?;
            info!("✅ Blockchain created at tip {}", hex::encode(chain.tip()));
            println!("Finished creating blockchain");
        }

        Command::Send { from, to, amount } => {
            let from = parse_address(&from)?;
            let to = parse_address(&to)?;
            let wallets = Wallets::load(node_config.wallet_path())?;
            let wallet = wallets.get(&from)?;

            let mut chain = open_chain(&node_config)?;
            let tx = build_spend(&chain, wallet, &to.public_key_hash(), amount)?;
            if !chain.validate_transaction(&tx)? {
                bail!("Transaction {} failed verification", hex::encode(&tx.id));
            }
            chain.add_block(vec![tx])?;
            println!("Success!");
        }

        Command::GetBalance { address } => {
            let address = parse_address(&address)?;
            let chain = open_chain(&node_config)?;
            let balance = chain.utxo().balance(&address.public_key_hash())?;
            println!("Balance of {}: {}", address, balance);
        }

        Command::PrintChain => {
            let chain = open_chain(&node_config)?;
            let difficulty = chain.config().difficulty;
            for block in chain.iter() {
                let block = block?;
                print!("{}", block);
                println!("PoW: {}", block.validate_pow(difficulty)?);
                println!();
            }
        }

        Command::VerifyChain => {
            let chain = open_chain(&node_config)?;
            let audit = chain.verify_chain()?;
            println!("Blocks checked:       {}", audit.blocks);
            println!("Transactions checked: {}", audit.transactions);
            match audit.failure {
                Some(failure) => bail!("Chain is invalid: {}", failure),
                None => println!("Chain is valid"),
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    run(Cli::parse())
}
