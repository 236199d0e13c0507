use std::net::SocketAddr;

const WATCHDOG_CONFIG: &str = "WATCHDOG_CONFIG";

const DEFAULT_CONFIG: &str = "config.json";

/// Config file path when `-f` is not given
pub fn get_config_path() -> String {
    std::env::var(WATCHDOG_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG.to_string())
}

const WATCHDOG_BIND_ADDR: &str = "WATCHDOG_BIND_ADDR";

/// Override for the API bind address, ignored if unparsable
pub fn get_bind_addr() -> Option<SocketAddr> {
    let addr_from_env = std::env::var(WATCHDOG_BIND_ADDR);
    addr_from_env.ok().and_then(|res| res.parse().ok())
}

const WATCHDOG_API_TOKEN: &str = "WATCHDOG_API_TOKEN";

pub fn get_api_token() -> Option<String> {
    let token_from_env = std::env::var(WATCHDOG_API_TOKEN);
    token_from_env.ok().filter(|token| !token.is_empty())
}
