use clap::{
    crate_authors,
    crate_description,
    crate_name,
    crate_version,
    Args,
    Parser,
};

#[derive(Parser, Debug)]
#[command(name = crate_name!())]
#[command(author = crate_authors!())]
#[command(about = crate_description!())]
#[command(version = crate_version!())]
pub enum Options {
    /// Run the auction backend service.
    Run(RunOptions),
}

#[derive(Args, Clone, Debug)]
pub struct RunOptions {
    #[command(flatten)]
    pub kv: KvOptions,

    #[command(flatten)]
    pub database: DatabaseOptions,

    #[command(flatten)]
    pub server: ServerOptions,
}

#[derive(Args, Clone, Debug)]
#[command(next_help_heading = "KV Store Options")]
#[group(id = "Kv")]
pub struct KvOptions {
    /// Host of the in-memory store backing live auctions.
    #[arg(id = "redis_auctions_host")]
    #[arg(long = "redis-auctions-host")]
    #[arg(env = "REDIS_AUCTIONS_HOST")]
    #[arg(default_value = "localhost")]
    pub host: String,
    /// Port of the in-memory store.
    #[arg(id = "redis_auctions_port")]
    #[arg(long = "redis-auctions-port")]
    #[arg(env = "REDIS_AUCTIONS_PORT")]
    #[arg(default_value = "6379")]
    #[arg(value_parser = clap::value_parser!(u16).range(1000..))]
    pub port: u16,
}

#[derive(Args, Clone, Debug)]
#[command(next_help_heading = "Database Options")]
#[group(id = "Database")]
pub struct DatabaseOptions {
    /// Postgres host for durable auction outcomes.
    #[arg(id = "postgres_host")]
    #[arg(long = "postgres-host")]
    #[arg(env = "POSTGRES_HOST")]
    #[arg(default_value = "localhost")]
    pub host:     String,
    /// Postgres port.
    #[arg(id = "postgres_port")]
    #[arg(long = "postgres-port")]
    #[arg(env = "POSTGRES_PORT")]
    #[arg(default_value = "5432")]
    pub port:     u16,
    /// Postgres user.
    #[arg(id = "postgres_user")]
    #[arg(long = "postgres-user")]
    #[arg(env = "POSTGRES_USER")]
    #[arg(default_value = "auction_user")]
    pub user:     String,
    /// Postgres password.
    #[arg(id = "postgres_password")]
    #[arg(long = "postgres-password")]
    #[arg(env = "POSTGRES_PASSWORD")]
    #[arg(default_value = "auction_password")]
    pub password: String,
    /// Postgres database name.
    #[arg(id = "postgres_db")]
    #[arg(long = "postgres-db")]
    #[arg(env = "POSTGRES_DB")]
    #[arg(default_value = "auction_db")]
    pub database: String,
}

#[derive(Args, Clone, Debug)]
#[command(next_help_heading = "Server Options")]
#[group(id = "Server")]
pub struct ServerOptions {
    /// Minimum amount a new bid must clear the current high bid by. The
    /// opening bid is exempt.
    #[arg(long = "bid-min-increment")]
    #[arg(env = "BID_MIN_INCREMENT")]
    #[arg(default_value = "0")]
    #[arg(value_parser = parse_min_increment)]
    pub bid_min_increment: f64,
    /// Port the HTTP + websocket server binds to.
    #[arg(long = "http-server-port")]
    #[arg(env = "HTTP_SERVER_PORT")]
    #[arg(default_value = "8085")]
    #[arg(value_parser = clap::value_parser!(u16).range(1000..))]
    pub http_server_port:  u16,
}

fn parse_min_increment(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("`{raw}` must be a non-negative number"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use {
        super::Options,
        clap::Parser,
    };

    // Only flags are pinned here: options also read their env vars, so
    // asserting bare defaults would couple the test to the host environment.
    #[test]
    fn explicit_flags_win() {
        let Options::Run(options) = Options::try_parse_from([
            "bidhub",
            "run",
            "--redis-auctions-host",
            "kv.internal",
            "--redis-auctions-port",
            "6380",
            "--postgres-db",
            "auctions_test",
            "--http-server-port",
            "8086",
        ])
        .unwrap();
        assert_eq!(options.kv.host, "kv.internal");
        assert_eq!(options.kv.port, 6380);
        assert_eq!(options.database.database, "auctions_test");
        assert_eq!(options.server.http_server_port, 8086);
    }

    #[test]
    fn rejects_privileged_http_port() {
        let result =
            Options::try_parse_from(["bidhub", "run", "--http-server-port", "80"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_negative_min_increment() {
        let result =
            Options::try_parse_from(["bidhub", "run", "--bid-min-increment", "-1"]);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_fractional_min_increment() {
        let Options::Run(options) =
            Options::try_parse_from(["bidhub", "run", "--bid-min-increment", "0.5"]).unwrap();
        assert_eq!(options.server.bid_min_increment, 0.5);
    }
}
