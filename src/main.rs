use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use std::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use wicket_server::auth::handlers::{
    account_overview, confirm_password_reset, login, logout, register, request_password_reset,
    resend_code, verify_email, verify_reset_code,
};
use wicket_server::{health_check, AppError, AppState, Settings};

#[actix_web::main]
async fn main() -> wicket_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully");

    info!(
        "Starting server at {}:{}",
        config.server.host, config.server.port
    );

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let state = web::Data::new(state);

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    let workers = config.server.workers as usize;

    // Start HTTP server
    HttpServer::new(move || {
        let cors = if config.cors.enabled {
            // Allowlisted origins with credentials: the auth cookie must
            // survive cross-site requests.
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"])
                .allowed_headers(vec!["Authorization", "Content-Type", "X-Requested-With"])
                .supports_credentials()
                .max_age(config.cors.max_age as usize);
            for origin in &config.cors.allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        } else {
            // CORS disabled - use most restrictive settings
            Cors::default()
        };

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .service(
                web::scope("/api")
                    .route("/auth/login", web::post().to(login))
                    .route("/auth/register", web::post().to(register))
                    .route("/auth/verify-email", web::post().to(verify_email))
                    .route("/auth/resend-code", web::post().to(resend_code))
                    .route(
                        "/auth/password-reset/request",
                        web::post().to(request_password_reset),
                    )
                    .route(
                        "/auth/password-reset/verify",
                        web::post().to(verify_reset_code),
                    )
                    .route(
                        "/auth/password-reset/confirm",
                        web::post().to(confirm_password_reset),
                    )
                    .route("/auth/logout", web::post().to(logout))
                    .route("/account/overview", web::get().to(account_overview)),
            )
    })
    .listen(listener)?
    .workers(workers)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
