use crate::error::RelayError;
use crate::io_struct::{ChatModel, ChatReqInput};
use crate::relay_state::{RelayConfig, RelayState};
use actix_web::{HttpRequest, HttpResponse, HttpServer, get, post, web};
use serde_json::json;
use std::io::Write;

#[get("/health")]
pub async fn health(_req: HttpRequest, _: web::Data<RelayState>) -> HttpResponse {
    HttpResponse::Ok().body("Ok")
}

#[get("/api/models")]
pub async fn models(_req: HttpRequest, _: web::Data<RelayState>) -> HttpResponse {
    let options = ChatModel::ALL
        .iter()
        .map(|model| json!({ "id": model.as_str(), "label": model.label() }))
        .collect::<Vec<_>>();
    HttpResponse::Ok().json(options)
}

#[post("/api/chat")]
pub async fn chat(
    _req: HttpRequest,
    body: web::Bytes,
    app_state: web::Data<RelayState>,
) -> Result<HttpResponse, RelayError> {
    let api_key = app_state.require_api_key()?;
    // Parse the raw bytes ourselves so a malformed body produces our error
    // shape, not the extractor's.
    let payload: ChatReqInput =
        serde_json::from_slice(&body).map_err(|_| RelayError::InvalidPayload)?;
    let req = payload.validate()?;
    app_state.relay_chat(&api_key, req).await
}

pub async fn startup(config: RelayConfig, state: RelayState) -> std::io::Result<()> {
    let app_state = web::Data::new(state);

    println!("Starting server at {}:{}", config.host, config.port);

    // default level is info
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .init();

    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_state.clone())
            .service(health)
            .service(models)
            .service(chat)
    })
    .bind((config.host, config.port))?
    .run()
    .await?;

    std::io::Result::Ok(())
}
