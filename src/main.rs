mod assets;
mod catalog;
mod config;
mod errors;
mod export;
mod imaging;
mod models;
mod openapi;
mod routes;
mod telemetry;
mod util;

use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use assets::AssetStore;
use catalog::Catalog;
use config::Settings;
use utoipa::OpenApi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // логи
    telemetry::init_tracing();

    let settings = Settings::from_env();
    let _sentry = telemetry::init_sentry(settings.sentry_dsn.clone());

    let catalog = Catalog::load(&settings.catalog_file)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let catalog = web::Data::new(catalog);

    let assets = AssetStore::new(&settings.public_dir);
    std::fs::create_dir_all(assets.uploads_dir())?;
    std::fs::create_dir_all(&settings.scratch_dir)?;

    // OpenAPI
    let mut openapi = openapi::ApiDoc::openapi();
    openapi.info.title = settings.swagger_title.clone();
    openapi.info.version = settings.swagger_version.clone();

    let bind_addr = settings.bind_addr.clone();
    tracing::info!("Listening on {}", bind_addr);

    HttpServer::new(move || {
        let swagger = if settings.swagger_enabled {
            Some(
                utoipa_swagger_ui::SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
        } else {
            None
        };

        let mut app = App::new()
            .app_data(web::Data::new(settings.clone()))
            .app_data(catalog.clone())
            .app_data(web::Data::new(assets.clone()))
            .app_data(web::JsonConfig::default().limit(256 * 1024))
            .wrap(Logger::new("%r %s %Dms"))
            // bulk-delete и download раньше /{id}
            .service(routes::uploads::upload_image)
            .service(routes::uploads::list_uploads)
            .service(routes::uploads::bulk_delete_uploads)
            .service(routes::uploads::download_uploads)
            .service(routes::uploads::delete_upload)
            .service(Files::new("/uploads", assets.uploads_dir()));

        // SwaggerUi сам отдаёт /api-docs/openapi.json
        if let Some(sw) = swagger {
            app = app.service(sw);
        }

        app
    })
    .workers(num_cpus::get().max(4))
    .bind(bind_addr)?
    .run()
    .await
}
