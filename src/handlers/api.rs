use crate::models::*;
use crate::services::{PrizeService, UserService};
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "game",
    responses(
        (status = 200, description = "排行榜（按获奖次数倒序）", body = [LeaderboardEntry])
    )
)]
pub async fn get_leaderboard(user_service: web::Data<UserService>) -> Result<HttpResponse> {
    match user_service.leaderboard().await {
        Ok(board) => Ok(HttpResponse::Ok().json(ApiResponse::success(board))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/users/{id}/balance",
    tag = "game",
    params(("id" = i64, Path, description = "Telegram 用户ID")),
    responses(
        (status = 200, description = "金币余额", body = BalanceResponse),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn get_balance(
    user_service: web::Data<UserService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    match user_service.get_user(user_id).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiResponse::success(BalanceResponse {
            user_id,
            coins: user.coins,
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/users/{id}/prizes",
    tag = "game",
    params(("id" = i64, Path, description = "Telegram 用户ID")),
    responses(
        (status = 200, description = "用户获得的奖品图片", body = UserPrizesResponse),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn get_user_prizes(
    user_service: web::Data<UserService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    if let Err(e) = user_service.get_user(user_id).await {
        return Ok(e.error_response());
    }
    match user_service.won_images(user_id).await {
        Ok(images) => Ok(HttpResponse::Ok().json(ApiResponse::success(UserPrizesResponse {
            user_id,
            images,
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/prizes/{id}",
    tag = "game",
    params(("id" = i32, Path, description = "奖品ID")),
    responses(
        (status = 200, description = "奖品状态", body = PrizeStatusResponse),
        (status = 404, description = "奖品不存在")
    )
)]
pub async fn get_prize(
    prize_service: web::Data<PrizeService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match prize_service.prize_status(path.into_inner()).await {
        Ok(status) => Ok(HttpResponse::Ok().json(ApiResponse::success(status))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn api_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/leaderboard", web::get().to(get_leaderboard))
        .route("/users/{id}/balance", web::get().to(get_balance))
        .route("/users/{id}/prizes", web::get().to(get_user_prizes))
        .route("/prizes/{id}", web::get().to(get_prize));
}
