use std::sync::Arc;

use log::info;
use trading_pit_core::errors::CoreError;
use trading_pit_core::models::order::PlaceOrder;
use trading_pit_core::models::user::{LoginRequest, SignupRequest};
use trading_pit_core::TradingDesk;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::error::reject;

// ── Auth ────────────────────────────────────────────────────────────

pub async fn signup(request: SignupRequest, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    let session = desk.auth().signup(&request).await.map_err(reject)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&session),
        StatusCode::CREATED,
    ))
}

pub async fn login(request: LoginRequest, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    let session = desk.auth().login(&request).await.map_err(reject)?;
    info!("User {} logged in", session.user.username);
    Ok(warp::reply::json(&session))
}

pub async fn me(user_id: Uuid, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    let profile = desk.auth().profile(user_id).await.map_err(reject)?;
    Ok(warp::reply::json(&profile))
}

// ── Orders & book ───────────────────────────────────────────────────

pub async fn place_order(
    user_id: Uuid,
    request: PlaceOrder,
    desk: Arc<TradingDesk>,
) -> Result<impl Reply, Rejection> {
    let order = desk
        .orders()
        .place_order(user_id, &request)
        .await
        .map_err(reject)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&order),
        StatusCode::CREATED,
    ))
}

pub async fn list_orders(user_id: Uuid, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&desk.orders().orders_for(user_id).await))
}

pub async fn holdings(user_id: Uuid, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&desk.portfolio().holdings(user_id).await))
}

pub async fn positions(user_id: Uuid, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&desk.portfolio().positions(user_id).await))
}

// ── Market data ─────────────────────────────────────────────────────

pub async fn all_stocks(desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&desk.analytics().all_stocks().await))
}

pub async fn stock_trends(desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&desk.analytics().stock_trends().await))
}

pub async fn stock_quote(symbol: String, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    match desk.quotes().fetch_quote(&symbol).await {
        Some(quote) => Ok(warp::reply::json(&quote)),
        None => Err(reject(CoreError::QuoteUnavailable(symbol.to_uppercase()))),
    }
}

pub async fn option_chain(symbol: String, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    let chain = desk.analytics().option_chain(&symbol).await.map_err(reject)?;
    Ok(warp::reply::json(&chain))
}

pub async fn api_status(desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&desk.analytics().api_status()))
}

pub async fn pit_snapshot(desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&desk.analytics().pit_snapshot().await))
}

// ── Analytics ───────────────────────────────────────────────────────

pub async fn trading_summary(user_id: Uuid, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    let summary = desk
        .analytics()
        .trading_summary(user_id)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&summary))
}

pub async fn team_performance(desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&desk.analytics().team_performance().await))
}

pub async fn portfolio_risk(user_id: Uuid, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    let risk = desk
        .analytics()
        .portfolio_risk(user_id)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&risk))
}

pub async fn predictions(user_id: Uuid, desk: Arc<TradingDesk>) -> Result<impl Reply, Rejection> {
    let predictions = desk
        .analytics()
        .predict_holdings(user_id)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&predictions))
}
