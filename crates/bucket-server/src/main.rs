mod config;
mod purge;

use std::sync::Arc;

use axum::http::{
    HeaderName, HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use bucket_api::email::{EmailSender, LogEmailSender, ResendEmailSender};
use bucket_api::payid::{IdentityProvider, PayIdClient};
use bucket_api::rate_limit::KeyedLimiter;
use bucket_api::session::{SESSION_COOKIE, SessionIssuer};
use bucket_api::{AppState, AppStateInner, Settings};
use bucket_crypto::{cipher::TokenCipher, secrets::SecretHasher};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, MailConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bucket=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       BUCKET_SESSION_SECRET and BUCKET_TOKEN_KEY must each be");
            eprintln!("       exactly 32 bytes. Set them in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = bucket_db::Database::open(&config.db_path)?;

    let email: Arc<dyn EmailSender> = match config.mail {
        MailConfig::Log => {
            warn!("MAIL_PROVIDER=log: outgoing mail is written to the log, not delivered");
            Arc::new(LogEmailSender)
        }
        MailConfig::Resend { api_key, from } => Arc::new(ResendEmailSender::new(&api_key, from)),
    };

    let payid: Arc<dyn IdentityProvider> = match config.payid {
        Some(payid) => {
            info!("PayID provider at {}", payid.base_url);
            Arc::new(PayIdClient::new(payid)?)
        }
        None => {
            warn!("PAYID_API_URL not set; PayID routes are disabled");
            Arc::new(PayIdClient::disabled())
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        sessions: SessionIssuer::new(&config.session_secret),
        cipher: TokenCipher::new(&config.token_key),
        hasher: SecretHasher::new(),
        email,
        payid,
        report_limiter: Arc::new(KeyedLimiter::new(
            config.report_limit,
            config.report_window,
        )),
        settings: Settings::new(&config.app_url),
    });

    tokio::spawn(purge::run_purge_loop(state.clone(), config.purge_interval));

    let cors = cors_layer(&state.settings.app_url)?;
    let app = bucket_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Bucket server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Session cookies are credentials, so only the app origin may call cross-site.
fn cors_layer(app_url: &str) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(app_url)?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(SESSION_COOKIE),
        ])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
