//! HMS服务器主程序

use anyhow::{Context, Result};
use clap::Parser;
use hms_admin::{init_logging, ConfigManager, HmsConfig};
use hms_core::store::{AppointmentStore, DirectoryStore, RecordStore};
use hms_core::AccountCredentials;
use hms_database::{DatabasePool, DatabaseQueries, PoolSettings};
use hms_web::{AppState, WebServer};
use hms_workflow::{BookingEngine, InMemoryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// HMS服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "hms-server")]
#[command(about = "HMS (Hospital Management Service) 预约服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 数据库连接字符串
    #[arg(long)]
    database_url: Option<String>,

    /// 存储后端 (postgres | memory)
    #[arg(short, long)]
    backend: Option<String>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    /// 命令行参数覆盖配置文件和环境变量
    fn apply(&self, config: &mut HmsConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(backend) = &self.backend {
            config.database.backend = backend.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

/// 存储后端的三个视图，指向同一个实例
struct Stores {
    appointments: Arc<dyn AppointmentStore>,
    directory: Arc<dyn DirectoryStore>,
    records: Arc<dyn RecordStore>,
}

async fn open_stores(config: &HmsConfig) -> Result<Stores> {
    match config.database.backend.as_str() {
        "memory" => {
            warn!("Using in-memory store, data will be lost on shutdown");
            let store = Arc::new(InMemoryStore::new());
            Ok(Stores {
                appointments: store.clone(),
                directory: store.clone(),
                records: store,
            })
        }
        _ => {
            let settings = PoolSettings {
                url: config.database.url.clone(),
                max_connections: config.database.max_connections,
                min_connections: config.database.min_connections,
                acquire_timeout: Duration::from_secs(config.database.acquire_timeout_secs),
            };
            let pool = DatabasePool::connect(&settings)
                .await
                .context("Failed to connect to PostgreSQL")?;

            let queries = DatabaseQueries::new(pool);
            queries.create_tables().await.context("Failed to create database schema")?;

            let store = Arc::new(queries);
            Ok(Stores {
                appointments: store.clone(),
                directory: store.clone(),
                records: store,
            })
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::new(args.config.as_deref())?;
    let mut config = manager.get_config().await;
    args.apply(&mut config);
    manager.update_config(config.clone()).await?;

    // 初始化日志
    init_logging(&config.logging)?;

    info!("启动HMS服务器...");
    info!("HMS服务器配置:");
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  存储后端: {}", config.database.backend);
    info!("  冲突重试次数: {}", config.booking.conflict_retries);

    let stores = open_stores(&config).await?;

    if let Some((username, password_hash)) = config.admin.credentials() {
        let credentials = AccountCredentials {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        if stores.directory.ensure_admin(&credentials).await? {
            info!("Bootstrap admin '{}' created", username);
        }
    }

    let engine = BookingEngine::new(stores.appointments, stores.directory.clone())
        .with_conflict_retries(config.booking.conflict_retries);

    let state = AppState {
        engine: Arc::new(engine),
        directory: stores.directory,
        records: stores.records,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    // 启动Web服务器
    if let Err(e) = WebServer::new(addr, state).run().await {
        error!("服务器启动失败: {}", e);
        return Err(e);
    }

    Ok(())
}
