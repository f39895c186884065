use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod routes;
mod services;

use config::Config;
use services::chat::ChatNotifier;
use services::classes::ClassAnnouncer;
use services::init;
use services::push::PushGateway;
use services::reminders::ReminderSweeper;
use services::schedule::display_offset;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub push: Arc<dyn PushGateway>,
}

impl AppState {
    pub fn chat_notifier(&self) -> ChatNotifier {
        ChatNotifier::new(self.db.clone(), self.push.clone())
    }

    pub fn class_announcer(&self) -> ClassAnnouncer {
        ClassAnnouncer::new(
            self.db.clone(),
            self.push.clone(),
            self.config.events.student_page_size,
            display_offset(self.config.display.utc_offset_minutes),
        )
    }

    pub fn reminder_sweeper(&self) -> ReminderSweeper {
        ReminderSweeper::new(
            self.db.clone(),
            self.push.clone(),
            chrono::Duration::seconds(self.config.reminders.lookahead_seconds),
            display_offset(self.config.display.utc_offset_minutes),
        )
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        // Document-created triggers
        .nest("/events", routes::events::router())
        // Externally scheduled jobs
        .nest("/tasks", routes::events::tasks_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "classroom_notifications=debug,tower_http=debug".into());
    if config.server.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Classroom Notifications Service");

    if config.events.webhook_secret.is_none() {
        tracing::warn!("EVENT_WEBHOOK_SECRET is not set; event deliveries are not verified");
    }

    let pool = init::init_db(&config).await?;
    let push = init::init_push_gateway(&config)?;

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        push,
    });

    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let bg_handles = init::spawn_background_workers(app_state.clone(), shutdown_tx.clone());

    let app = build_router(app_state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(listener, app);

    let shutdown_tx_clone = shutdown_tx.clone();
    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c => {},
                        _ = term.recv() => {},
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to bind SIGTERM, only Ctrl+C will stop the server: {}", e);
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("Shutdown signal received, notifying background workers");
        let _ = shutdown_tx_clone.send(());
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Signal handler completed; server future dropped to stop accepting new connections");
        }
    }

    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for background workers to exit",
        shutdown_wait.as_secs()
    );

    let bg_wait = async {
        for h in bg_handles {
            let _ = h.await;
        }
    };
    let _ = tokio::time::timeout(shutdown_wait, bg_wait).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
