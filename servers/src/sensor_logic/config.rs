use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "sensor_server.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Sensor dashboard backend: ingestion API, history and live feed", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "PORT_MAIN_SERVER", help = "Port to listen on for HTTP and WebSocket clients.")]
    pub port: Option<u16>,

    #[clap(long, env = "SENSOR_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "DATA_FILE", help = "Path of the JSON history snapshot.")]
    pub data_file: Option<PathBuf>,

    #[clap(long, env = "PUBLIC_DIR", help = "Directory of the dashboard's static files.")]
    pub public_dir: Option<PathBuf>,

    #[clap(long, env = "SERIAL_PORT_PATH", help = "Serial device to read sensor lines from. Unset disables the reader.")]
    pub serial_port_path: Option<String>,

    #[clap(long, env = "SERIAL_BAUD_RATE", help = "Serial line speed.")]
    pub baud_rate: Option<u32>,

    #[clap(long, env = "SERIAL_RETRY_DELAY_MS", help = "Delay in milliseconds before reopening a failed serial port.")]
    pub serial_retry_delay_ms: Option<u64>,

    #[clap(long, env = "SIMULATE_INTERVAL_MS", help = "Generate simulated readings in-process at this interval. Unset disables it.")]
    pub simulate_interval_ms: Option<u64>,

    #[clap(long, env = "SUBSCRIBER_BUFFER", help = "Messages queued per live viewer before it is dropped.")]
    pub subscriber_buffer: Option<usize>,

    #[clap(long, env = "SENSOR_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "SENSOR_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            data_file: other.data_file.or(self.data_file),
            public_dir: other.public_dir.or(self.public_dir),
            serial_port_path: other.serial_port_path.or(self.serial_port_path),
            baud_rate: other.baud_rate.or(self.baud_rate),
            serial_retry_delay_ms: other.serial_retry_delay_ms.or(self.serial_retry_delay_ms),
            simulate_interval_ms: other.simulate_interval_ms.or(self.simulate_interval_ms),
            subscriber_buffer: other.subscriber_buffer.or(self.subscriber_buffer),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(3000),
            data_file: Some(PathBuf::from("./data.json")),
            public_dir: Some(PathBuf::from("./public")),
            baud_rate: Some(9600),
            serial_retry_delay_ms: Some(5000),
            subscriber_buffer: Some(256),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            ..Default::default()
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(3000)
    }

    pub fn data_file(&self) -> PathBuf {
        self.data_file.clone().unwrap_or_else(|| PathBuf::from("./data.json"))
    }

    pub fn public_dir(&self) -> PathBuf {
        self.public_dir.clone().unwrap_or_else(|| PathBuf::from("./public"))
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate.unwrap_or(9600)
    }

    pub fn serial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.serial_retry_delay_ms.unwrap_or(5000))
    }

    pub fn simulate_interval(&self) -> Option<Duration> {
        self.simulate_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn subscriber_buffer(&self) -> usize {
        self.subscriber_buffer.unwrap_or(256)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

/// Defaults, then the JSON config file, then environment and CLI.
pub fn load_config() -> Config {
    resolve(Config::parse())
}

// Runs before logging is set up, so problems go to stderr.
fn resolve(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }

    current_config.merge(cli)
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
            Ok(file_config) => Some(file_config),
            Err(e) => {
                eprintln!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
                None
            }
        },
        Err(e) => {
            eprintln!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}
