use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;

use fabcore::{
    AuthClient, BotDirectory, Guard, MemorySessionStore, RedisSessionStore, Router, SessionStore,
};

use fabrika::auth::{DisabledAuthClient, MtProtoAuthClient};
use fabrika::cli::{Cli, Commands};
use fabrika::config;
use fabrika::db::{self, PgDirectory, PgProvisioner, PgTemplates, WithAdminBot};
use fabrika::logging::init_logger;
use fabrika::telegram::{run_admin_bot, serve_webhooks, Bot, PlatformDeps};
use fabrika::worker::{WorkerBot, WorkerRegistry};

/// Main entry point for the platform
#[tokio::main]
async fn main() -> Result<()> {
    // .env до логгера: конфиг читается лениво, но LOG_FILE_PATH — сразу
    let _ = dotenv();
    let cli = Cli::parse_args();
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        None | Some(Commands::Run) => run().await,
        Some(Commands::BlockBot { id, reason }) => {
            let guard = build_guard().await?;
            guard.block_bot(id, &reason).await?;
            log::info!("Bot {} blocked", id);
            Ok(())
        }
        Some(Commands::BlockUser { bot, user, reason }) => {
            let guard = build_guard().await?;
            guard.block_user(bot, user, &reason).await?;
            log::info!("User {} blocked for bot {}", user, bot);
            Ok(())
        }
    }
}

/// Redis, либо деградация в память с громким предупреждением
async fn build_store() -> Arc<dyn SessionStore> {
    match RedisSessionStore::connect(&fabcore::config::REDIS_URL).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!(
                "Session store unavailable ({}), falling back to in-memory store; \
                 state will NOT survive restarts",
                e
            );
            Arc::new(MemorySessionStore::new())
        }
    }
}

async fn build_guard() -> Result<Guard> {
    let store = build_store().await;
    let pool = db::create_pool(&config::DATABASE_URL).await?;
    let directory: Arc<dyn BotDirectory> = Arc::new(PgDirectory::new(pool));
    Ok(Guard::new(store, directory))
}

async fn run() -> Result<()> {
    let admin_bot_id = config::bot_id_from_token(&config::BOT_TOKEN)
        .ok_or_else(|| anyhow::anyhow!("BOT_TOKEN is not set or malformed"))?;

    let store = build_store().await;
    let pool = db::create_pool(&config::DATABASE_URL).await?;

    let pg_directory = PgDirectory::new(pool.clone());
    let workers = Arc::new(WorkerRegistry::new());
    match pg_directory.active_bots().await {
        Ok(bots) => {
            for (bot_id, token, template_id) in bots {
                workers.register(WorkerBot {
                    bot_id,
                    token,
                    template_id,
                });
            }
            log::info!("Restored {} workers from database", workers.len());
        }
        Err(e) => log::error!("Failed to restore workers: {}", e),
    }

    let directory: Arc<dyn BotDirectory> = Arc::new(WithAdminBot::new(pg_directory, admin_bot_id));
    let auth_client = build_auth_client().await;
    let router = Router::new(store.clone(), directory, auth_client);

    let deps = Arc::new(PlatformDeps {
        router,
        store,
        templates: Arc::new(PgTemplates::new(pool.clone())),
        provisioner: Arc::new(PgProvisioner::new(pool)),
        workers,
        admin_bot_id,
        webhook_base: config::WEBHOOK_BASE_URL.clone(),
    });

    // вебхуки воркеров — отдельной задачей, админ-бот — в текущей
    let webhook_deps = deps.clone();
    tokio::spawn(async move {
        if let Err(e) = serve_webhooks(&config::LISTEN_ADDR, webhook_deps).await {
            log::error!("Webhook server stopped: {}", e);
        }
    });

    let bot = Bot::new(config::BOT_TOKEN.clone());
    run_admin_bot(bot, deps).await;
    Ok(())
}

async fn build_auth_client() -> Arc<dyn AuthClient> {
    match *config::MTPROTO_API_ID {
        Some(api_id) => {
            match MtProtoAuthClient::connect(
                api_id,
                &config::MTPROTO_API_HASH,
                Path::new(config::MTPROTO_SESSION_PATH.as_str()),
            )
            .await
            {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    log::error!("MTProto unavailable, auth flow disabled: {}", e);
                    Arc::new(DisabledAuthClient)
                }
            }
        }
        None => {
            log::warn!("MTPROTO_API_ID not set, auth flow disabled");
            Arc::new(DisabledAuthClient)
        }
    }
}
