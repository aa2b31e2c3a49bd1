//! Process configuration: CLI flags > `OAS_MCP_*` environment > YAML file > defaults.

use anyhow::{Context as _, bail};
use clap::{Parser, ValueEnum};
use oas_mcp_http_tools::config::{AuthConfig, AuthType, UpstreamConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_SWAGGER_FILE: &str = "swagger.json";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Newline-delimited JSON over stdin/stdout.
    #[default]
    Stdio,
    /// `POST /mcp`.
    Http,
    /// `GET /sse` plus `POST /mcp`.
    Sse,
}

#[derive(Debug, Parser)]
#[command(
    name = "oas-mcp",
    version,
    about = "Serve an OpenAPI/Swagger document as MCP tools"
)]
pub struct Cli {
    /// YAML config file. Defaults to ./config.yaml when that file exists.
    #[arg(long, env = "OAS_MCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// OpenAPI/Swagger document (JSON or YAML).
    #[arg(long, env = "OAS_MCP_SWAGGER_FILE")]
    pub swagger_file: Option<PathBuf>,

    #[arg(long, value_enum, env = "OAS_MCP_MODE")]
    pub mode: Option<Mode>,

    #[arg(long, env = "OAS_MCP_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "OAS_MCP_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "OAS_MCP_UPSTREAM_BASE_URL")]
    pub upstream_base_url: Option<String>,

    /// Upstream call timeout in seconds; 0 disables it.
    #[arg(long, env = "OAS_MCP_UPSTREAM_TIMEOUT")]
    pub upstream_timeout: Option<u64>,

    /// none | bearer | basic | apikey
    #[arg(long, env = "OAS_MCP_AUTH_TYPE")]
    pub auth_type: Option<String>,

    #[arg(long, env = "OAS_MCP_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    #[arg(long, env = "OAS_MCP_AUTH_USERNAME")]
    pub auth_username: Option<String>,

    #[arg(long, env = "OAS_MCP_AUTH_PASSWORD", hide_env_values = true)]
    pub auth_password: Option<String>,

    #[arg(long, env = "OAS_MCP_AUTH_API_KEY", hide_env_values = true)]
    pub auth_api_key: Option<String>,

    #[arg(long, env = "OAS_MCP_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[arg(
        long,
        env = "OAS_MCP_LOG_DISABLE_CONSOLE",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub log_disable_console: Option<bool>,

    /// Append JSON log lines to this file.
    #[arg(long, env = "OAS_MCP_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Seconds the HTTP server waits for in-flight requests on shutdown.
    #[arg(long, env = "OAS_MCP_SHUTDOWN_GRACE")]
    pub shutdown_grace: Option<u64>,
}

/// On-disk shape. Every key is optional; missing keys fall through to defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub swagger_file: Option<PathBuf>,
    pub server: FileServerConfig,
    pub upstream: FileUpstreamConfig,
    pub auth: FileAuthConfig,
    pub logging: FileLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    pub mode: Option<Mode>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub shutdown_grace: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileUpstreamConfig {
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileAuthConfig {
    #[serde(rename = "type")]
    pub auth_type: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub level: Option<String>,
    pub disable_console: Option<bool>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub mode: Mode,
    pub host: String,
    pub port: u16,
    pub shutdown_grace: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub disable_console: bool,
    pub file: Option<PathBuf>,
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub swagger_file: PathBuf,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Read the config file (if any) and merge it under `cli`.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, or any file fails to parse.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => load_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    load_file(path)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Ok(Self::merge(cli, file))
    }

    /// Layer `cli` (flags and env, already resolved by clap) over `file` over defaults.
    #[must_use]
    pub fn merge(cli: &Cli, file: FileConfig) -> Self {
        let upstream_defaults = UpstreamConfig::default();
        let auth_type = cli.auth_type.clone().or(file.auth.auth_type);

        Self {
            swagger_file: cli
                .swagger_file
                .clone()
                .or(file.swagger_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SWAGGER_FILE)),
            server: ServerConfig {
                mode: cli.mode.or(file.server.mode).unwrap_or_default(),
                host: cli
                    .host
                    .clone()
                    .or(file.server.host)
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: cli.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
                shutdown_grace: cli
                    .shutdown_grace
                    .or(file.server.shutdown_grace)
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            },
            upstream: UpstreamConfig {
                base_url: cli
                    .upstream_base_url
                    .clone()
                    .or(file.upstream.base_url)
                    .unwrap_or(upstream_defaults.base_url),
                timeout: cli
                    .upstream_timeout
                    .or(file.upstream.timeout)
                    .unwrap_or(upstream_defaults.timeout),
            },
            auth: AuthConfig {
                auth_type: auth_type.map(AuthType::from).unwrap_or_default(),
                token: cli.auth_token.clone().or(file.auth.token).unwrap_or_default(),
                username: cli
                    .auth_username
                    .clone()
                    .or(file.auth.username)
                    .unwrap_or_default(),
                password: cli
                    .auth_password
                    .clone()
                    .or(file.auth.password)
                    .unwrap_or_default(),
                api_key: cli
                    .auth_api_key
                    .clone()
                    .or(file.auth.api_key)
                    .unwrap_or_default(),
            },
            logging: LoggingConfig {
                level: cli
                    .log_level
                    .clone()
                    .or(file.logging.level)
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
                disable_console: cli
                    .log_disable_console
                    .or(file.logging.disable_console)
                    .unwrap_or(false),
                file: cli.log_file.clone().or(file.logging.file),
            },
        }
    }

    /// Startup checks. Unknown auth types pass here and are warned about when the upstream
    /// client is built.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.swagger_file.as_os_str().is_empty() {
            bail!("swagger_file is required");
        }
        if !self.swagger_file.is_file() {
            bail!("swagger file not found: {}", self.swagger_file.display());
        }
        if self.server.port == 0 && self.server.mode != Mode::Stdio {
            bail!("server.port must be greater than 0");
        }
        self.auth.validate().context("invalid auth configuration")?;
        Ok(())
    }
}

/// Parse a YAML config file. An empty file is the default config.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid YAML for [`FileConfig`].
pub fn load_file(path: &Path) -> anyhow::Result<FileConfig> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(FileConfig::default());
    }
    let cfg: FileConfig = serde_yaml::from_slice(&bytes)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["oas-mcp"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("cli")
    }

    fn file(yaml: &str) -> FileConfig {
        serde_yaml::from_str(yaml).expect("yaml")
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = Config::merge(&cli(&[]), FileConfig::default());
        assert_eq!(cfg.swagger_file, PathBuf::from("swagger.json"));
        assert_eq!(cfg.server.mode, Mode::Stdio);
        assert_eq!(cfg.server.host, "localhost");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.shutdown_grace, 10);
        assert_eq!(cfg.upstream.base_url, "");
        assert_eq!(cfg.upstream.effective_base_url(), "http://localhost");
        assert_eq!(cfg.upstream.timeout, 30);
        assert_eq!(cfg.auth.auth_type, AuthType::None);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.disable_console);
        assert!(cfg.logging.file.is_none());
    }

    #[test]
    fn file_values_fill_in_below_flags() {
        let f = file(
            r"
swagger_file: api.yaml
server:
  mode: http
  port: 9000
upstream:
  base_url: https://api.example.com/v1
  timeout: 5
auth:
  type: Bearer
  token: from-file
logging:
  level: debug
  disable_console: true
",
        );
        let cfg = Config::merge(
            &cli(&["--port", "9100", "--auth-token", "from-flag", "--mode", "sse"]),
            f,
        );
        assert_eq!(cfg.swagger_file, PathBuf::from("api.yaml"));
        assert_eq!(cfg.server.mode, Mode::Sse);
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "localhost");
        assert_eq!(cfg.upstream.base_url, "https://api.example.com/v1");
        assert_eq!(cfg.upstream.timeout, 5);
        assert_eq!(cfg.auth.auth_type, AuthType::Bearer);
        assert_eq!(cfg.auth.token, "from-flag");
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.disable_console);
    }

    #[test]
    fn bare_disable_console_flag_means_true() {
        let cfg = Config::merge(&cli(&["--log-disable-console"]), FileConfig::default());
        assert!(cfg.logging.disable_console);

        let cfg = Config::merge(
            &cli(&["--log-disable-console", "false"]),
            file("logging: {disable_console: true}"),
        );
        assert!(!cfg.logging.disable_console);
    }

    #[test]
    fn load_file_handles_empty_and_invalid_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = dir.path().join("empty.yaml");
        std::fs::write(&empty, "\n").expect("write");
        assert!(load_file(&empty).expect("empty").swagger_file.is_none());

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "server: [1, 2").expect("write");
        let err = load_file(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("parse config"), "{err:#}");

        let missing = dir.path().join("missing.yaml");
        assert!(load_file(&missing).is_err());
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("oas.yaml");
        std::fs::write(&path, "server:\n  host: 0.0.0.0\n").expect("write");
        let cfg = Config::load(&cli(&["--config", path.to_str().expect("utf8")])).expect("load");
        assert_eq!(cfg.server.host, "0.0.0.0");
    }

    #[test]
    fn validate_checks_document_and_auth() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = dir.path().join("api.json");
        std::fs::write(&doc, "{}").expect("write");
        let doc_arg = doc.to_str().expect("utf8");

        let cfg = Config::merge(&cli(&["--swagger-file", doc_arg]), FileConfig::default());
        cfg.validate().expect("valid");

        let cfg = Config::merge(
            &cli(&["--swagger-file", "/definitely/not/here.json"]),
            FileConfig::default(),
        );
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("swagger file not found"), "{err}");

        let cfg = Config::merge(
            &cli(&["--swagger-file", doc_arg, "--auth-type", "basic", "--auth-username", "u"]),
            FileConfig::default(),
        );
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").contains("username and password"), "{err:#}");

        let cfg = Config::merge(
            &cli(&["--swagger-file", doc_arg, "--auth-type", "oauth2"]),
            FileConfig::default(),
        );
        cfg.validate().expect("unknown auth types only warn");
    }
}
