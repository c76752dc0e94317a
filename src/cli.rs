// CLI flags

use clap::Parser;

#[derive(Parser)]
#[command(name = "tincoin")]
#[command(about = "Educational proof-of-work cryptocurrency node", long_about = None)]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Comma-separated peer addresses (host:port,host:port)
    #[arg(long)]
    pub peers: Option<String>,

    /// Directory for the node's database
    #[arg(long, default_value = "./data")]
    pub data_dir: String,

    /// Run without persistence (in-memory chain only)
    #[arg(long, default_value_t = false)]
    pub no_persist: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["tincoin"]);

        assert_eq!(cli.port, 3000);
        assert!(cli.peers.is_none());
        assert_eq!(cli.data_dir, "./data");
        assert!(!cli.no_persist);
    }

    #[test]
    fn test_full_flags() {
        let cli = Cli::parse_from([
            "tincoin",
            "--port",
            "3001",
            "--peers",
            "localhost:3000,localhost:3002",
            "--data-dir",
            "/tmp/nodes",
            "--no-persist",
        ]);

        assert_eq!(cli.port, 3001);
        assert_eq!(cli.peers.as_deref(), Some("localhost:3000,localhost:3002"));
        assert_eq!(cli.data_dir, "/tmp/nodes");
        assert!(cli.no_persist);
    }
}
