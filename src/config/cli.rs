use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the printgate binary.
#[derive(Debug, Parser)]
#[command(
    name = "printgate",
    version,
    about = "HTML to PDF gateway backed by WeasyPrint"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PRINTGATE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Print the version reported by the configured renderer and exit.
    #[command(name = "probe")]
    Probe(ProbeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub render: RenderOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the WeasyPrint executable used for rendering.
    #[arg(long = "render-weasyprint-path", value_name = "PATH")]
    pub weasyprint_path: Option<PathBuf>,

    /// Directory WeasyPrint may use to cache images and fonts.
    #[arg(long = "render-cache-folder", value_name = "PATH")]
    pub cache_folder: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the per-request timeout.
    #[arg(long = "server-request-timeout-seconds", value_name = "SECONDS")]
    pub server_request_timeout_seconds: Option<u64>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,

    /// Override the timeout applied to sharing-service uploads.
    #[arg(long = "share-timeout-seconds", value_name = "SECONDS")]
    pub share_timeout_seconds: Option<u64>,

    /// Override the file.io upload endpoint.
    #[arg(long = "share-file-io-url", value_name = "URL")]
    pub share_file_io_url: Option<String>,

    /// Override the ki.tc upload endpoint.
    #[arg(long = "share-ki-tc-url", value_name = "URL")]
    pub share_ki_tc_url: Option<String>,

    /// Override the c-v.sh upload endpoint.
    #[arg(long = "share-c-v-sh-url", value_name = "URL")]
    pub share_c_v_sh_url: Option<String>,
}
