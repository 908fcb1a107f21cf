//! Server construction and route wiring.

pub mod config;

pub use config::{AppConfig, ConfigError};

use actix_web::body::MessageBody;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::Method;
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use tracing::info;

use crate::domain::schema::EntityKind;
use crate::inbound::http::{crud, reports, spendings, users, AppState};
use crate::middleware::Trace;

/// The browser client runs on a different origin; headers are applied to
/// every response and `OPTIONS` preflights answer 200 without auth.
fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add((
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ))
        .add(("Access-Control-Allow-Headers", "Authorization, Content-Type"))
}

async fn fallback(req: HttpRequest) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::NotFound().finish()
    }
}

/// Assemble the application with all routes and middleware.
pub fn build_app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(state)
        .wrap(cors_headers())
        .wrap(Trace)
        .service(
            web::scope("/api")
                .service(users::scope())
                .service(reports::scope())
                .service(spendings::scope())
                .service(crud::crud_scope(EntityKind::Company))
                .service(crud::crud_scope(EntityKind::Account))
                .service(crud::crud_scope(EntityKind::Income)),
        )
        .route(
            "/report/generate/{company}/{type}/{period}/{format}",
            web::get().to(reports::generate),
        )
        .default_service(web::route().to(fallback))
}

/// Bind and return the HTTP server; the caller drives it to completion.
pub fn create_server(state: AppState) -> std::io::Result<Server> {
    let host = state.config.web.host.clone();
    let port = state.config.web.port;
    let data = web::Data::new(state);
    let server = HttpServer::new(move || build_app(data.clone()))
        .bind((host.as_str(), port))?
        .run();
    info!(%host, port, "server listening");
    Ok(server)
}
