use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError{
    #[error("could not read {path}: {source}")]
    Io{
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad bridge config: {0}")]
    Parse(#[from] toml::de::Error),
}

//everything the bridge needs to come up: port, pacing, buffer sizing.
//defaults match the lab rigs (usb-cdc at 115200, a 500 sample plot window).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig{
    pub port: String,
    pub baud: u32,
    pub read_timeout_ms: u64,
    pub ack_timeout_ms: u64,
    pub buffer_capacity: usize,
}

impl Default for BridgeConfig{
    fn default() -> Self{
        BridgeConfig{
            port: "/dev/ttyACM0".to_string(),
            baud: 115_200,
            read_timeout_ms: 100,
            ack_timeout_ms: 500,
            buffer_capacity: 500,
        }
    }
}

impl BridgeConfig{
    pub fn load(path: &Path) -> Result<Self, ConfigError>{
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io{
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    pub fn read_timeout(&self) -> Duration{
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration{
        Duration::from_millis(self.ack_timeout_ms)
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_defaults(){
        let config = BridgeConfig::default();
        assert_eq!(config.baud, 115_200);
        assert_eq!(config.read_timeout(), Duration::from_millis(100));
        assert_eq!(config.ack_timeout(), Duration::from_millis(500));
        assert_eq!(config.buffer_capacity, 500);
    }

    #[test]
    fn test_partial_toml_overrides(){
        let config: BridgeConfig = toml::from_str(
            "port = \"COM10\"\nbaud = 57600\n"
        ).unwrap();
        assert_eq!(config.port, "COM10");
        assert_eq!(config.baud, 57_600);
        //untouched fields keep their defaults
        assert_eq!(config.read_timeout_ms, 100);
        assert_eq!(config.buffer_capacity, 500);
    }

    #[test]
    fn test_bad_toml_is_an_error(){
        let result: Result<BridgeConfig, _> = toml::from_str("port = 42");
        assert!(result.is_err());
    }
}
