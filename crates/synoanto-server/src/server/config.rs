use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use synoanto_core::upstream::{
    COLLEGIATE_API_URL, ProviderEndpoint, THESAURUS_API_URL, UpstreamConfig,
};

/// Which backend persists cache entries and search events.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Postgres via `DATABASE_URL`.
    Postgres,
    /// Process-local maps. Nothing survives a restart.
    Memory,
}

/// Runtime configuration for the `synoanto-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "synoanto-server",
    version,
    about = "A cached dictionary and thesaurus lookup service"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Persistence backend for the cache and search log.
    ///
    /// Environment variable: `STORE_BACKEND`
    #[arg(long, env = "STORE_BACKEND", value_enum, default_value_t = StoreBackend::Postgres)]
    pub store: StoreBackend,

    /// Postgres connection string. Required for the `postgres` backend.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Upper bound on pooled database connections.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// Environment variable: `COLLEGIATE_API_URL`
    #[arg(long, env = "COLLEGIATE_API_URL", default_value_t = String::from(COLLEGIATE_API_URL))]
    pub collegiate_api_url: String,

    /// Credential sent as the `key` query parameter to the definitions
    /// provider.
    ///
    /// Environment variable: `COLLEGIATE_API_KEY`
    #[arg(long, env = "COLLEGIATE_API_KEY", hide_env_values = true)]
    pub collegiate_api_key: Option<String>,

    /// Environment variable: `THESAURUS_API_URL`
    #[arg(long, env = "THESAURUS_API_URL", default_value_t = String::from(THESAURUS_API_URL))]
    pub thesaurus_api_url: String,

    /// Credential sent as the `key` query parameter to the thesaurus
    /// provider.
    ///
    /// Environment variable: `THESAURUS_API_KEY`
    #[arg(long, env = "THESAURUS_API_KEY", hide_env_values = true)]
    pub thesaurus_api_key: Option<String>,

    /// Bound, in milliseconds, on each upstream call.
    ///
    /// Environment variable: `UPSTREAM_TIMEOUT_MS`
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", default_value_t = 10_000)]
    pub upstream_timeout_ms: u64,

    /// Number of background writer tasks persisting cache entries and
    /// search events.
    ///
    /// Environment variable: `NUM_WRITERS`
    #[arg(long, env = "NUM_WRITERS", default_value_t = 2)]
    pub num_writers: usize,

    /// Capacity of each writer's queue. Writes submitted while the chosen
    /// queue is full are dropped.
    ///
    /// Environment variable: `WRITER_QUEUE_SIZE`
    #[arg(long, env = "WRITER_QUEUE_SIZE", default_value_t = 256)]
    pub writer_queue_size: usize,

    /// Seconds to wait for each writer to drain its queue on shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Origins allowed by CORS, comma separated.
    ///
    /// Environment variable: `CORS_ORIGINS`
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173,http://127.0.0.1:5173"
    )]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub upstream: UpstreamConfig,
    pub num_writers: usize,
    pub writer_queue_size: usize,
    pub shutdown_timeout: Duration,
    pub cors_origins: Vec<String>,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_writers == 0 {
            bail!("NUM_WRITERS must be greater than 0");
        }

        if args.writer_queue_size == 0 {
            bail!("WRITER_QUEUE_SIZE must be greater than 0");
        }

        if args.upstream_timeout_ms == 0 {
            bail!("UPSTREAM_TIMEOUT_MS must be greater than 0");
        }

        if args.store == StoreBackend::Postgres && args.database_url.is_none() {
            bail!("DATABASE_URL is required when STORE_BACKEND is postgres");
        }

        let Some(collegiate_key) = args.collegiate_api_key else {
            bail!("COLLEGIATE_API_KEY must be set");
        };
        let Some(thesaurus_key) = args.thesaurus_api_key else {
            bail!("THESAURUS_API_KEY must be set");
        };

        Ok(Self {
            server_addr: args.server_addr,
            store: args.store,
            database_url: args.database_url,
            database_max_connections: args.database_max_connections,
            upstream: UpstreamConfig {
                collegiate: ProviderEndpoint::new(args.collegiate_api_url, collegiate_key),
                thesaurus: ProviderEndpoint::new(args.thesaurus_api_url, thesaurus_key),
                timeout: Duration::from_millis(args.upstream_timeout_ms),
            },
            num_writers: args.num_writers,
            writer_queue_size: args.writer_queue_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            cors_origins: args.cors_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<ServerConfig> {
        let mut argv = vec![
            "synoanto-server",
            "--collegiate-api-key",
            "c-key",
            "--thesaurus-api-key",
            "t-key",
        ];
        argv.extend_from_slice(extra);
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let config = parse(&["--store", "memory"]).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.upstream.collegiate.base_url, COLLEGIATE_API_URL);
        assert_eq!(config.upstream.thesaurus.credential, "t-key");
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let err = parse(&["--store", "postgres"]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn rejects_zero_writers() {
        assert!(parse(&["--store", "memory", "--num-writers", "0"]).is_err());
    }

    #[test]
    fn splits_cors_origins() {
        let config = parse(&[
            "--store",
            "memory",
            "--cors-origins",
            "https://a.example,https://b.example",
        ])
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }
}
