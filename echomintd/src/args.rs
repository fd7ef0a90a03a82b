use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Command line surface. Every option can also be provided through a TOML
/// config file (`--config`); explicit command line values win.
#[derive(Parser, Debug, Clone)]
#[command(name = "echomintd", version, about = "Deterministic read-replica daemon")]
pub struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Storage home directory
    #[arg(long = "appdir")]
    pub appdir: Option<PathBuf>,

    /// Database identifier under the home directory
    #[arg(long = "dbname")]
    pub db_name: Option<String>,

    /// Chain identifier this replica follows
    #[arg(long = "chain-id")]
    pub chain_id: Option<String>,

    /// Path to the genesis document (defaults to <appdir>/config/genesis.json)
    #[arg(long)]
    pub genesis: Option<PathBuf>,

    /// Block source directories, one per redundant upstream exporter
    #[arg(long = "block-dir")]
    pub block_dirs: Vec<PathBuf>,

    /// Serve only the initialized state; never construct the block feed
    #[arg(long = "disable-sync")]
    pub disable_sync: bool,

    /// Skip per-block mutation commitments (reduced-fidelity mode)
    #[arg(long = "passthrough-commitment")]
    pub passthrough_commitment: bool,

    /// Log unbounded store reads issued while a batch is open
    #[arg(long = "debug-store-reads")]
    pub debug_store_reads: bool,

    /// Run over an in-memory engine (ephemeral, for experiments)
    #[arg(long = "memdb")]
    pub mem_db: bool,

    #[arg(long = "loglevel")]
    pub log_level: Option<String>,

    /// Poll interval for block sources, in milliseconds
    #[arg(long = "poll-interval-ms")]
    pub poll_interval_ms: Option<u64>,

    /// Source health timeout, in milliseconds
    #[arg(long = "source-timeout-ms")]
    pub source_timeout_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub appdir: Option<PathBuf>,
    pub dbname: Option<String>,
    pub chain_id: Option<String>,
    pub genesis: Option<PathBuf>,
    pub block_dirs: Vec<PathBuf>,
    pub disable_sync: Option<bool>,
    pub passthrough_commitment: Option<bool>,
    pub debug_store_reads: Option<bool>,
    pub loglevel: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub source_timeout_ms: Option<u64>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub appdir: PathBuf,
    pub db_name: String,
    pub chain_id: String,
    pub genesis: PathBuf,
    pub block_dirs: Vec<PathBuf>,
    pub disable_sync: bool,
    pub passthrough_commitment: bool,
    pub debug_store_reads: bool,
    pub mem_db: bool,
    pub log_level: String,
    pub poll_interval_ms: u64,
    pub source_timeout_ms: u64,
}

impl Settings {
    pub fn resolve(args: Args) -> Result<Self, String> {
        let file: FileConfig = match &args.config {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|err| format!("cannot read config {}: {err}", path.display()))?;
                toml::from_str(&raw).map_err(|err| format!("cannot parse config {}: {err}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let appdir = args.appdir.or(file.appdir).unwrap_or_else(|| PathBuf::from("./echomint-data"));
        let chain_id = args.chain_id.or(file.chain_id).ok_or("chain-id is required (command line or config file)")?;
        let genesis = args.genesis.or(file.genesis).unwrap_or_else(|| appdir.join("config").join("genesis.json"));
        let block_dirs = if args.block_dirs.is_empty() { file.block_dirs } else { args.block_dirs };

        Ok(Settings {
            db_name: args.db_name.or(file.dbname).unwrap_or_else(|| "replica".into()),
            chain_id,
            genesis,
            block_dirs,
            disable_sync: args.disable_sync || file.disable_sync.unwrap_or(false),
            passthrough_commitment: args.passthrough_commitment || file.passthrough_commitment.unwrap_or(false),
            debug_store_reads: args.debug_store_reads || file.debug_store_reads.unwrap_or(false),
            mem_db: args.mem_db,
            log_level: args.log_level.or(file.loglevel).unwrap_or_else(|| "info".into()),
            poll_interval_ms: args.poll_interval_ms.or(file.poll_interval_ms).unwrap_or(500),
            source_timeout_ms: args.source_timeout_ms.or(file.source_timeout_ms).unwrap_or(10_000),
            appdir,
        })
    }

    pub fn db_dir(&self) -> PathBuf {
        self.appdir.join(&self.db_name)
    }

    pub fn print(&self) {
        log::info!(
            "config: chain-id={} appdir={} db={} sources={} disable-sync={} commitment={} engine={}",
            self.chain_id,
            self.appdir.display(),
            self.db_name,
            self.block_dirs.len(),
            self.disable_sync,
            if self.passthrough_commitment { "passthrough" } else { "merkleized" },
            if self.mem_db { "memory" } else { "rocksdb" },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["echomintd", "--chain-id", "test-1"])
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(base_args()).unwrap();
        assert_eq!(settings.chain_id, "test-1");
        assert_eq!(settings.db_name, "replica");
        assert_eq!(settings.genesis, PathBuf::from("./echomint-data/config/genesis.json"));
        assert!(!settings.disable_sync);
        assert_eq!(settings.poll_interval_ms, 500);
    }

    #[test]
    fn test_chain_id_required() {
        let args = Args::parse_from(["echomintd"]);
        assert!(Settings::resolve(args).is_err());
    }

    #[test]
    fn test_config_file_merge_with_cli_priority() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("app.toml");
        fs::write(
            &config_path,
            r#"
chain-id = "file-chain"
dbname = "file-db"
poll-interval-ms = 100
block-dirs = ["/var/blocks/a", "/var/blocks/b"]
"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "echomintd",
            "--config",
            config_path.to_str().unwrap(),
            "--chain-id",
            "cli-chain",
        ]);
        let settings = Settings::resolve(args).unwrap();
        assert_eq!(settings.chain_id, "cli-chain");
        assert_eq!(settings.db_name, "file-db");
        assert_eq!(settings.poll_interval_ms, 100);
        assert_eq!(settings.block_dirs.len(), 2);
    }
}
