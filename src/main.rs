//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use billing_backend::{config::AppState, services::scheduler};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rotinas de fundo: execução diária e reconciliação do gateway
    if app_state.config.scheduler_enabled {
        let handles = scheduler::spawn(
            &app_state.config,
            app_state.pipeline.clone(),
            app_state.reconcile_service.clone(),
        );
        tracing::info!(tasks = handles.len(), "⏰ Agendador iniciado");
    } else {
        tracing::info!("Agendador desativado (SCHEDULER_ENABLED=false)");
    }

    let addr = app_state.config.bind_addr.clone();
    let app = billing_backend::app(app_state);

    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", addr);
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
