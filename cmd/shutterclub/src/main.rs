//! # Shutterclub Binary
//!
//! Assembles the conversation core based on compile-time features and
//! runtime configuration: record store, quota counter, session store and
//! an outbound gateway, bolted onto the dispatcher. A stdin REPL stands
//! in for the chat transport so the core is drivable from a terminal:
//!
//! ```text
//! <user_id> /start
//! <user_id> some free text
//! <user_id> cb menu:new_photo
//! <user_id> img file_abc123
//! ```

mod gateway;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use configs::AppConfig;
use domains::{
    ChatContext, ChatKind, EventPayload, InboundEvent, QuotaCounter, RecordStore, SessionStore,
    Topic, TopicStatus,
};
use services::{Dispatcher, Engine};
use storage_adapters::{MemoryQuotaCounter, MemoryRecordStore, MemorySessionStore};

use gateway::ConsoleGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level)),
        )
        .init();

    // 1. Record store
    let records = build_records(&cfg).await?;

    // 2. Quota counter and session store (they share a Redis pool when
    //    that backend is compiled in)
    let (quota, sessions) = build_counter_and_sessions(&cfg)?;

    // 3. Engine + dispatcher
    let engine = Arc::new(Engine::new(
        records,
        quota,
        sessions,
        Arc::new(ConsoleGateway::default()),
    ));
    let dispatcher = Dispatcher::spawn(engine, cfg.dispatch_buffer);

    info!(env = %cfg.app_env, "shutterclub core up; type `<user_id> /start` to begin");

    let intake = dispatcher.sender();
    let repl = tokio::spawn(read_stdin(intake));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    repl.abort();
    dispatcher.shutdown().await;
    info!("drained in-flight conversations; bye");
    Ok(())
}

async fn build_records(cfg: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    #[cfg(feature = "db-postgres")]
    if cfg.record_backend == "postgres" {
        use secrecy::ExposeSecret;
        let store = storage_adapters::PgRecordStore::connect(
            cfg.database_url.expose_secret(),
            cfg.database_max_connections,
        )
        .await
        .context("connecting to postgres")?;
        store.migrate().await.context("applying migrations")?;
        return Ok(Arc::new(store));
    }

    if cfg.record_backend != "memory" {
        anyhow::bail!(
            "record backend {:?} is not compiled into this build",
            cfg.record_backend
        );
    }

    let store = MemoryRecordStore::default();
    // The memory backend starts empty; give the REPL one topic to post to.
    store
        .seed_topic(Topic {
            id: uuid::Uuid::new_v4(),
            group_chat_ref: -1,
            group_thread_ref: None,
            name: "general".to_string(),
            status: TopicStatus::Available,
            description: "anything goes".to_string(),
        })
        .await;
    Ok(Arc::new(store))
}

fn build_counter_and_sessions(
    cfg: &AppConfig,
) -> anyhow::Result<(Arc<dyn QuotaCounter>, Arc<dyn SessionStore>)> {
    #[cfg(feature = "redis")]
    if cfg.counter_backend == "redis" {
        use secrecy::ExposeSecret;
        let pool = deadpool_redis::Config::from_url(cfg.redis_url.expose_secret())
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .context("creating redis pool")?;
        return Ok((
            Arc::new(storage_adapters::RedisQuotaCounter::new(pool.clone())),
            Arc::new(storage_adapters::RedisSessionStore::new(pool)),
        ));
    }

    if cfg.counter_backend != "memory" {
        anyhow::bail!(
            "counter backend {:?} is not compiled into this build",
            cfg.counter_backend
        );
    }

    Ok((
        Arc::new(MemoryQuotaCounter::default()),
        Arc::new(MemorySessionStore::default()),
    ))
}

async fn read_stdin(intake: mpsc::Sender<InboundEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_message_ref = 1i64;
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(event) = parse_line(line, next_message_ref) else {
            warn!(line, "unparseable line; expected `<user_id> </cmd | cb <token> | img <ref> | text>`");
            continue;
        };
        next_message_ref += 1;
        if intake.send(event).await.is_err() {
            break;
        }
    }
}

fn parse_line(line: &str, message_ref: i64) -> Option<InboundEvent> {
    let (id_raw, rest) = line.split_once(' ')?;
    let actor: i64 = id_raw.parse().ok()?;
    let rest = rest.trim();

    let payload = if rest.starts_with('/') {
        EventPayload::Command(rest.to_string())
    } else if let Some(token) = rest.strip_prefix("cb ") {
        EventPayload::Callback {
            token: token.trim().to_string(),
        }
    } else if let Some(media_ref) = rest.strip_prefix("img ") {
        EventPayload::Image {
            media_ref: media_ref.trim().to_string(),
        }
    } else if rest.is_empty() {
        return None;
    } else {
        EventPayload::Text(rest.to_string())
    };

    Some(InboundEvent {
        actor_external_id: actor,
        chat: ChatContext {
            chat_ref: actor,
            kind: ChatKind::Private,
        },
        message_ref: Some(message_ref),
        payload,
    })
}
