use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::{Logger, from_fn};
use actix_web::{App, HttpResponse, HttpServer, web};
use baseplatform::app::{self, AppContext};
use baseplatform::config::AppConfig;
use baseplatform::db::establish_pool;
use baseplatform::firewall::http_firewall;
use baseplatform::migrate::{has_migrations, run_migrations};
use baseplatform::mq::{Broker, Topology};
use baseplatform::scheduler::{JobStore, PgJobStore, data_backup_scheduler, email_scheduler};
use baseplatform::store::PgStore;
use dotenvy::dotenv;
use log::{info, warn};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = AppConfig::load()?;
    let pool = establish_pool(&cfg.database_url, cfg.database_pool_size)?;

    let migrations_dir = Path::new(&cfg.migrations)
        .parent()
        .unwrap_or_else(|| Path::new("."));
    if cfg.run_migrations && has_migrations(migrations_dir) {
        let pool = pool.clone();
        let pattern = cfg.migrations.clone();
        let applied = web::block(move || run_migrations(&pool, &pattern)).await??;
        info!("applied {} migration(s)", applied.len());
    } else {
        warn!("skipping migrations for {}", cfg.migrations);
    }

    let broker = Arc::new(Broker::new(Topology::service_default())?);
    broker.spawn_consumers();

    let job_store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let email = Arc::new(email_scheduler(cfg.email_scheduler_threads, job_store.clone()));
    let backup = {
        let store = job_store.clone();
        let threads = cfg.data_backup_scheduler_threads;
        Arc::new(web::block(move || data_backup_scheduler(threads, store)).await??)
    };
    email.start();
    backup.start();

    let ctx = AppContext::new(cfg.clone(), Arc::new(PgStore::new(pool)), broker)?;
    let purger = ctx.verify_codes.spawn_purger(Duration::from_secs(60));

    let host = cfg.server_host.clone();
    let port = cfg.server_port;
    info!("Server started at http://{}:{}", host, port);
    info!("Scalar docs at http://{}:{}/scalar", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(app::cors(&ctx.config))
            .wrap(from_fn(http_firewall))
            .wrap(Logger::default())
            .configure(|cfg| app::configure(cfg, &ctx))
            .default_service(web::route().to(HttpResponse::NotFound))
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    purger.abort();
    email.shutdown();
    backup.shutdown();
    Ok(())
}
