//! Server configuration from flags and environment

use std::net::SocketAddr;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "gigboard")]
#[command(about = "Gigboard server - job marketplace connecting agents and contractors")]
#[command(version)]
pub struct Config {
    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:gigboard.db")]
    pub database_url: String,

    /// Address to listen on
    #[arg(long, env = "GIGBOARD_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// HMAC secret used to sign session tokens
    #[arg(long, env = "GIGBOARD_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Lifetime of issued session tokens
    #[arg(long, env = "GIGBOARD_TOKEN_TTL_MINUTES", default_value_t = 60)]
    pub token_ttl_minutes: i64,

    #[arg(long, env = "GIGBOARD_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

impl Config {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_ttl_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["gigboard", "--jwt-secret", "s3cret"]).unwrap();
        assert_eq!(config.bind, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.token_ttl(), chrono::Duration::minutes(60));
        assert_eq!(config.jwt_secret, "s3cret");
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "gigboard",
            "--jwt-secret",
            "s3cret",
            "--bind",
            "127.0.0.1:8080",
            "--token-ttl-minutes",
            "15",
            "--max-connections",
            "2",
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.token_ttl_minutes, 15);
        assert_eq!(config.max_connections, 2);
    }
}
