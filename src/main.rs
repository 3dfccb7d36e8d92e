use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use log::info;

use audio_convert_service::api;
use audio_convert_service::config::Config;
use audio_convert_service::processors::FfmpegEncoder;
use audio_convert_service::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cfg = Config::from_env();

    // RUST_LOG wins over CONVERT_LOG when both are set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cfg.log_level.as_str())).init();

    std::fs::create_dir_all(&cfg.upload_root)?;
    std::fs::create_dir_all(&cfg.output_root)?;

    let encoder = Arc::new(FfmpegEncoder::new(cfg.ffmpeg_path.clone()));
    let state = web::Data::new(AppState::new(&cfg, encoder));

    info!(
        "audio_convert_service {} listening on {} (uploads={:?}, outputs={:?})",
        env!("CARGO_PKG_VERSION"),
        cfg.bind_address,
        cfg.upload_root,
        cfg.output_root
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(api::v1::config)
    })
    .bind(&cfg.bind_address)?
    .run()
    .await
}
