use axum::routing::get;
use axum::{Json, Router};
use sensai_auth::SessionView;
use sensai_auth::middleware::{AuthConfig, AuthSession, auth_routes};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing(debug: bool) {
    let default_directives = if debug {
        "sensai_auth=debug"
    } else {
        "sensai_auth=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

async fn me(AuthSession(session): AuthSession) -> Json<SessionView> {
    Json(session)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    initialize_tracing(std::env::var("NODE_ENV").as_deref() == Ok("development"));
    let config = AuthConfig::from_env()?;

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let registrar = config.backend_client()?;
    tracing::info!(
        backend = %config.backend_url(),
        auth_path = %config.auth_path(),
        failure_mode = ?config.failure_mode(),
        debug = config.debug(),
        "Starting auth service"
    );

    let app = Router::new()
        .route("/me", get(me))
        .with_state(config.session_reader())
        .merge(auth_routes(config, registrar));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
