use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use prizedrop_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{Messenger, TelegramService},
    handlers::{self, WebhookSecret},
    services::*,
    store::Store,
    swagger::swagger_config,
    tasks,
    utils::ImageProcessor,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config =
        Config::from_toml().map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;
    let game = config.game;

    // 创建数据库连接池并迁移
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database connection pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    let store = Store::new(pool);

    // 外部服务
    let messenger: Arc<dyn Messenger> = Arc::new(TelegramService::new(config.telegram.clone()));
    let images = ImageProcessor::new(&config.assets);

    // 创建服务
    let user_service = UserService::new(store.clone(), game);
    let allocation_service = AllocationService::new(store.clone(), game);
    let economy_service = EconomyService::new(store.clone(), game);
    let backlog_service = BacklogService::new(store.clone());
    let broadcast_service = BroadcastService::new(messenger.clone(), images.clone());
    let prize_service = PrizeService::new(
        store.clone(),
        messenger.clone(),
        images,
        config.telegram.admin_ids.clone(),
        game,
    );
    let scheduler_service = SchedulerService::new(store.clone(), broadcast_service.clone());
    let bot_service = BotService::new(
        messenger,
        user_service.clone(),
        allocation_service,
        economy_service,
        backlog_service,
        broadcast_service,
        prize_service.clone(),
        game,
    );

    // 导入图片目录中尚未入库的图片
    let seeded = prize_service
        .seed_from_directory()
        .await
        .context("Failed to seed prizes from the image directory")?;
    log::info!("Prize pool ready, {seeded} new images imported");

    // 启动后台定时任务
    tasks::spawn_all(scheduler_service, game.broadcast_interval_secs);

    let webhook_secret = WebhookSecret(config.telegram.webhook_secret.clone());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(prize_service.clone()))
            .app_data(web::Data::new(bot_service.clone()))
            .app_data(web::Data::new(webhook_secret.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .service(web::scope("/api/v1").configure(handlers::api_config))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;
    Ok(())
}
