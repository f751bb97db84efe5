//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{env, net::SocketAddr, num::NonZeroU64, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, ProbeArgs, RenderOverrides, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "printgate";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 32 * 1024 * 1024;
const DEFAULT_SHARE_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_WEASYPRINT_PATH: &str = "weasyprint";
pub(crate) const DEFAULT_FILE_IO_URL: &str = "https://file.io";
pub(crate) const DEFAULT_KI_TC_URL: &str = "https://ki.tc/file/u/";
pub(crate) const DEFAULT_C_V_SH_URL: &str = "https://c-v.sh";

/// Environment variable honoured for compatibility with older deployments.
pub const LEGACY_TIMEOUT_ENV: &str = "WEB_TIME_OUT_SECOND";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub render: RenderSettings,
    pub uploads: UploadSettings,
    pub share: ShareSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub request_timeout: Duration,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub weasyprint_path: PathBuf,
    pub cache_folder: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct ShareSettings {
    pub timeout: Duration,
    pub file_io_url: Url,
    pub ki_tc_url: Url,
    pub c_v_sh_url: Url,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PRINTGATE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_legacy_timeout(env::var(LEGACY_TIMEOUT_ENV).ok().as_deref());

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Probe(args)) => raw.apply_render_overrides(&args.render),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    render: RawRenderSettings,
    uploads: RawUploadSettings,
    share: RawShareSettings,
}

impl RawSettings {
    /// Apply `WEB_TIME_OUT_SECOND`; anything but a positive integer is ignored.
    fn apply_legacy_timeout(&mut self, value: Option<&str>) {
        if let Some(seconds) = value.and_then(legacy_timeout_seconds) {
            self.server.request_timeout_seconds = Some(seconds);
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_request_timeout_seconds {
            self.server.request_timeout_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(seconds) = overrides.share_timeout_seconds {
            self.share.timeout_seconds = Some(seconds);
        }
        if let Some(url) = overrides.share_file_io_url.as_ref() {
            self.share.file_io_url = Some(url.clone());
        }
        if let Some(url) = overrides.share_ki_tc_url.as_ref() {
            self.share.ki_tc_url = Some(url.clone());
        }
        if let Some(url) = overrides.share_c_v_sh_url.as_ref() {
            self.share.c_v_sh_url = Some(url.clone());
        }

        self.apply_render_overrides(&overrides.render);
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(path) = overrides.weasyprint_path.as_ref() {
            self.render.weasyprint_path = Some(path.clone());
        }
        if let Some(dir) = overrides.cache_folder.as_ref() {
            self.render.cache_folder = Some(dir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            render,
            uploads,
            share,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let render = build_render_settings(render)?;
        let uploads = build_upload_settings(uploads)?;
        let share = build_share_settings(share)?;

        Ok(Self {
            server,
            logging,
            render,
            uploads,
            share,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let request_timeout = positive_seconds(
        server
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        "server.request_timeout_seconds",
    )?;
    let graceful_shutdown = positive_seconds(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        request_timeout,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let weasyprint_path = render
        .weasyprint_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WEASYPRINT_PATH));
    if weasyprint_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.weasyprint_path",
            "path must not be empty",
        ));
    }

    let cache_folder = render
        .cache_folder
        .filter(|dir| !dir.as_os_str().is_empty());

    Ok(RenderSettings {
        weasyprint_path,
        cache_folder,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings { max_request_bytes })
}

fn build_share_settings(share: RawShareSettings) -> Result<ShareSettings, LoadError> {
    let timeout = positive_seconds(
        share.timeout_seconds.unwrap_or(DEFAULT_SHARE_TIMEOUT_SECS),
        "share.timeout_seconds",
    )?;

    Ok(ShareSettings {
        timeout,
        file_io_url: parse_endpoint(share.file_io_url, DEFAULT_FILE_IO_URL, "share.file_io_url")?,
        ki_tc_url: parse_endpoint(share.ki_tc_url, DEFAULT_KI_TC_URL, "share.ki_tc_url")?,
        c_v_sh_url: parse_endpoint(share.c_v_sh_url, DEFAULT_C_V_SH_URL, "share.c_v_sh_url")?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    request_timeout_seconds: Option<u64>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    weasyprint_path: Option<PathBuf>,
    cache_folder: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawShareSettings {
    timeout_seconds: Option<u64>,
    file_io_url: Option<String>,
    ki_tc_url: Option<String>,
    c_v_sh_url: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn parse_endpoint(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<Url, LoadError> {
    let candidate = value.as_deref().map(str::trim).unwrap_or(default);
    let url = Url::parse(candidate)
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{candidate}`: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

fn legacy_timeout_seconds(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|seconds| *seconds > 0)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
