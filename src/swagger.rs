use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::api::get_leaderboard,
        handlers::api::get_balance,
        handlers::api::get_user_prizes,
        handlers::api::get_prize,
    ),
    components(
        schemas(
            LeaderboardEntry,
            BalanceResponse,
            UserPrizesResponse,
            PrizeStatusResponse,
            ApiError,
        )
    ),
    tags(
        (name = "game", description = "Prize drop read API"),
    ),
    info(
        title = "Prize Drop Backend API",
        version = "0.1.0",
        description = "Read-only view of the prize give-away state"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
