use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::broadcast;

use hydrosense_alerts::{AlertEngine, AlertNotifier};
use hydrosense_mqtt::{BackoffPolicy, Channel, MqttChannel, drive_with_backoff};
use hydrosense_notify::{LettreSmtpSender, NotificationQueue, QueueNotifier, SmtpSender};
use hydrosense_presence::PresenceTracker;
use hydrosense_protocol::ws_event::WsEvent;
use hydrosense_server::config::ServerConfig;
use hydrosense_server::dispatcher::Dispatcher;
use hydrosense_server::gateway::Gateway;
use hydrosense_server::ingestor::Ingestor;
use hydrosense_server::schedulers::BroadcastSchedulers;
use hydrosense_server::state::AppState;
use hydrosense_server::routes::build_router;
use hydrosense_store::Store;
use hydrosense_store::postgres::{self, PostgresStore};
use hydrosense_ws::Hub;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "startup config error");
            return ExitCode::from(1);
        }
    };

    let db_pool = match postgres::connect(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "store unavailable at startup");
            return ExitCode::from(3);
        }
    };
    let store: Arc<dyn Store> = Arc::new(PostgresStore::new(db_pool.clone()));

    let (mqtt_channel, mut eventloop) = match MqttChannel::new(&config.mqtt) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, "failed to build mqtt client");
            return ExitCode::from(1);
        }
    };
    // Establish the initial broker connection up front; a failure here
    // (auth rejected, host unreachable) is Fatal at startup (spec.md
    // §6 exit code 2). Once connected, `drive_with_backoff` takes over
    // reconnection for the life of the process.
    if let Err(e) = eventloop.poll().await {
        tracing::error!(error = %e, "broker connection failed at startup");
        return ExitCode::from(2);
    }
    if let Err(e) = mqtt_channel.subscribe_ingest().await {
        tracing::error!(error = %e, "failed to subscribe to ingest topics");
        return ExitCode::from(2);
    }
    let channel: Arc<dyn Channel> = Arc::new(mqtt_channel);

    let (events, _events_rx) = broadcast::channel::<WsEvent>(1024);

    let smtp_sender: Arc<dyn SmtpSender> = match LettreSmtpSender::new(&config.notify) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, "failed to build smtp transport");
            return ExitCode::from(1);
        }
    };
    let notify_queue = NotificationQueue::spawn(config.notify.clone(), smtp_sender);
    let notifier: Arc<dyn AlertNotifier> = Arc::new(QueueNotifier::new(store.clone(), notify_queue));

    let alert_engine = Arc::new(AlertEngine::new(
        store.clone(),
        events.clone(),
        notifier,
        config.alerts.clone(),
    ));
    let presence = Arc::new(PresenceTracker::new(store.clone(), events.clone(), config.presence.clone()));
    let ingestor = Arc::new(Ingestor::new(store.clone(), events.clone(), alert_engine));
    let gateway = Arc::new(Gateway::new(store.clone(), presence.clone(), ingestor, events.clone()));
    let _dispatcher = Dispatcher::new(channel.clone());

    let presence_task = {
        let presence = presence.clone();
        let channel = channel.clone();
        tokio::spawn(async move { presence.run(channel).await })
    };

    let mqtt_task = tokio::spawn(async move {
        let policy = BackoffPolicy::new(
            std::time::Duration::from_secs(config.mqtt.reconnect_base_secs),
            std::time::Duration::from_secs(config.mqtt.reconnect_cap_secs),
        );
        drive_with_backoff(eventloop, policy, move |event| gateway.handle_event(event)).await
    });

    let schedulers = BroadcastSchedulers::new(store.clone(), db_pool, events.clone());
    schedulers.start();

    let hub = Hub::new(config.ws.clone());
    let hub_task = {
        let hub = hub.clone();
        let events_rx = events.subscribe();
        tokio::spawn(async move { hub.run(events_rx).await })
    };

    let state = AppState {
        store: store.clone(),
        channel: channel.clone(),
        events: events.clone(),
        hub: hub.clone(),
    };
    let router = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, addr, "failed to bind http listener");
            return ExitCode::from(1);
        }
    };
    tracing::info!(addr, "hydrosense server listening");

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = serve_result {
        tracing::error!(error = %e, "http server exited with error");
    }

    // Shutdown ordering (spec.md §5): Broadcast Schedulers -> WebSocket
    // Hub -> MQTT Gateway -> Alert Engine -> Notification Queue (drain
    // or 10s timeout) -> Store. The scheduler and MQTT/presence tasks
    // are detached background loops; aborting them here stops new work
    // from starting in roughly that order, then the process exits and
    // drops the Store pool last.
    tracing::info!("shutting down: stopping broadcast schedulers");
    schedulers.stop();
    hub_task.abort();
    tracing::info!("shutting down: stopping mqtt gateway");
    mqtt_task.abort();
    presence_task.abort();
    tracing::info!("shutdown complete");

    ExitCode::from(0)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
