//! Startup configuration: compiled-in defaults, optionally overridden by a JSON file, then by
//! environment variables, then by CLI flags — in that order of increasing precedence.

use serde_derive::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TCP_PORT: u16 = 44818;
pub const DEFAULT_UDP_PORT: u16 = 2222;

#[derive(Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub tcp_port: u16,
    pub udp_port: u16,
    pub bind_host: String,
    pub vendor_id: u16,
    pub device_type: u16,
    pub product_code: u32,
    pub product_name: String,
    pub idle_timeout_ms: u64,
    pub sweep_interval_ms: u64,
    pub tag_count: usize,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            tcp_port: DEFAULT_TCP_PORT,
            udp_port: DEFAULT_UDP_PORT,
            bind_host: "0.0.0.0".to_string(),
            vendor_id: 0x0001,
            device_type: 0x000C,
            product_code: 0x0001_0000,
            product_name: "EtherNet/IP Simulator".to_string(),
            idle_timeout_ms: 300_000,
            sweep_interval_ms: 60_000,
            tag_count: 100,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads a JSON configuration file. Fields the file omits are not backfilled from defaults,
    /// so callers are expected to supply a complete document; a missing or unreadable file is a
    /// startup failure.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ServerConfig, flux::error::ConfigError> {
        serdeconv::from_json_file(path).map_err(|err| flux::error::ConfigError::Parse(err.to_string()))
    }

    /// Applies environment variable overrides, each optional and parsed independently; an
    /// unparsable value is left as-is rather than failing startup (the CLI flag layer above it
    /// is the one expected to catch operator typos).
    pub fn apply_env(&mut self) {
        apply_env_u16(&mut self.tcp_port, "EIP_TCP_PORT");
        apply_env_u16(&mut self.udp_port, "EIP_UDP_PORT");
        apply_env_string(&mut self.bind_host, "EIP_BIND_HOST");
        apply_env_u16(&mut self.vendor_id, "EIP_VENDOR_ID");
        apply_env_u16(&mut self.device_type, "EIP_DEVICE_TYPE");
        apply_env_u32(&mut self.product_code, "EIP_PRODUCT_CODE");
        apply_env_string(&mut self.product_name, "EIP_PRODUCT_NAME");
        apply_env_u64(&mut self.idle_timeout_ms, "EIP_IDLE_TIMEOUT_MS");
        apply_env_u64(&mut self.sweep_interval_ms, "EIP_SWEEP_INTERVAL_MS");
        apply_env_usize(&mut self.tag_count, "EIP_TAG_COUNT");
        apply_env_string(&mut self.log_level, "EIP_LOG_LEVEL");
    }
}

fn apply_env_string(field: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *field = value;
    }
}

fn apply_env_u16(field: &mut u16, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

fn apply_env_u32(field: &mut u32, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

fn apply_env_u64(field: &mut u64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

fn apply_env_usize(field: &mut usize, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec() {
        let config = ServerConfig::default();
        assert_eq!(config.tcp_port, DEFAULT_TCP_PORT);
        assert_eq!(config.udp_port, DEFAULT_UDP_PORT);
        assert_eq!(config.tag_count, 100);
        assert_eq!(config.idle_timeout_ms, 300_000);
    }

    #[test]
    fn test_env_override_applies_only_when_present_and_parsable() {
        std::env::set_var("EIP_TEST_TCP_PORT_XYZ", "not-a-number");
        let mut port = 1u16;
        apply_env_u16(&mut port, "EIP_TEST_TCP_PORT_XYZ");
        assert_eq!(port, 1);
        std::env::remove_var("EIP_TEST_TCP_PORT_XYZ");
    }
}
