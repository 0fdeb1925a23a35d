//! Web服务器

use axum::{
    routing::{get, post, put},
    Router,
};
use hms_core::store::{DirectoryStore, RecordStore};
use hms_workflow::BookingEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::*;

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
    pub directory: Arc<dyn DirectoryStore>,
    pub records: Arc<dyn RecordStore>,
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = Self::create_app(state);
        Self { addr, app }
    }

    pub fn create_app(state: AppState) -> Router {
        Router::new()
            // 根路径
            .route("/", get(api_root))

            // 健康检查
            .route("/health", get(health))

            // API路由
            .nest("/api/v1", api_routes())
            .with_state(state)

            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start web server: {}", e))?;

        Ok(())
    }
}

/// API v1 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api_root))
        // 医生
        .route("/doctors", get(list_doctors).post(register_doctor))
        .route("/doctors/public", get(public_doctors))
        .route("/doctors/available", get(available_doctors))
        .route("/doctors/:id/slots", get(doctor_slots))
        .route("/doctors/:id/appointments", get(doctor_appointments))
        // 患者
        .route("/patients", get(list_patients).post(register_patient))
        .route("/patients/search", get(search_patient))
        .route("/patients/:id/appointments", get(patient_appointments))
        .route("/patients/:id/records", get(patient_records).post(add_record))
        // 预约
        .route("/appointments", post(book_appointment))
        .route("/appointments/:id/status", put(advance_status))
        // 管理员
        .route("/admin/password", put(change_admin_password))
}
