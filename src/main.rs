use std::{process, sync::Arc, time::Duration};

use printgate::{
    application::{
        error::AppError,
        render::{PdfRenderer, RendererVersion, WeasyPrint},
        share::{ShareEndpoints, ShareRelay},
    },
    config,
    infra::{
        error::InfraError,
        http::{self, BuildInfo, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging)?;
            run_serve(settings).await
        }
        config::Command::Probe(_) => run_probe(&settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let weasyprint = WeasyPrint::new(
        settings.render.weasyprint_path.clone(),
        settings.server.request_timeout,
    );
    let renderer = PdfRenderer::new(weasyprint, settings.render.cache_folder.clone());
    let share = ShareRelay::new(
        ShareEndpoints {
            file_io: settings.share.file_io_url.clone(),
            ki_tc: settings.share.ki_tc_url.clone(),
            c_v_sh: settings.share.c_v_sh_url.clone(),
        },
        settings.share.timeout,
    )
    .map_err(|err| InfraError::configuration(err.to_string()))?;

    let state = HttpState {
        version: Arc::new(RendererVersion::new(renderer.binary())),
        renderer: Arc::new(renderer),
        share: Arc::new(share),
        build: Arc::new(BuildInfo::from_env()),
    };

    let body_limit = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|err| InfraError::configuration(format!("upload limit too large: {err}")))?;
    let router = http::build_router(state, settings.server.request_timeout, body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "printgate::server",
        addr = %settings.server.addr,
        weasyprint = %settings.render.weasyprint_path.display(),
        request_timeout_secs = settings.server.request_timeout.as_secs(),
        "PDF service listening"
    );

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    // Once a signal arrives, in-flight requests get `grace` to finish.
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline(grace) => {
            warn!(
                target = "printgate::server",
                grace_secs = grace.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "printgate::server", "PDF service stopped");
    Ok(())
}

async fn run_probe(settings: &config::Settings) -> Result<(), AppError> {
    let version = RendererVersion::new(settings.render.weasyprint_path.clone());
    let reported = version
        .get()
        .await
        .map_err(|err| AppError::unexpected(format!("failed to get weasyprint version: {err}")))?;
    println!("{reported}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "printgate::server", error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "printgate::server", error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(target = "printgate::server", "Shutdown signal received");
}

/// Resolves `grace` after the first shutdown signal; never resolves otherwise.
async fn drain_deadline(grace: Duration) {
    shutdown_signal().await;
    tokio::time::sleep(grace).await;
}
