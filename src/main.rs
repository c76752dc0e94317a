// Node entry point

use clap::Parser;
use std::sync::Arc;
use tincoin::cli::Cli;
use tincoin::storage::{ChainStore, SledStore};
use tincoin::Node;

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let store: Option<Box<dyn ChainStore>> = if cli.no_persist {
        None
    } else {
        let path = format!("{}/node-{}", cli.data_dir, cli.port);
        match SledStore::open(&path) {
            Ok(store) => Some(Box::new(store)),
            Err(e) => {
                eprintln!("Error opening database at {}: {}", path, e);
                std::process::exit(1);
            }
        }
    };

    let node = Arc::new(Node::new(cli.port, cli.peers.as_deref(), store));

    if let Err(e) = node.start().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
