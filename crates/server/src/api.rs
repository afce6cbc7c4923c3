use std::convert::Infallible;
use std::sync::Arc;

use trading_pit_core::errors::CoreError;
use trading_pit_core::TradingDesk;
use uuid::Uuid;
use warp::{Filter, Rejection, Reply};

use crate::error::{handle_rejection, reject};
use crate::handlers;

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Every `/api` route, with rejections recovered into JSON errors.
pub fn routes(
    desk: Arc<TradingDesk>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    auth_routes(desk.clone())
        .or(order_routes(desk.clone()))
        .or(market_routes(desk.clone()))
        .or(analytics_routes(desk))
        .recover(handle_rejection)
}

fn auth_routes(
    desk: Arc<TradingDesk>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let signup = warp::path!("api" / "auth" / "signup")
        .and(warp::post())
        .and(json_body())
        .and(with_desk(desk.clone()))
        .and_then(handlers::signup);

    let login = warp::path!("api" / "auth" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_desk(desk.clone()))
        .and_then(handlers::login);

    let me = warp::path!("api" / "auth" / "me")
        .and(warp::get())
        .and(with_auth(desk.clone()))
        .and(with_desk(desk))
        .and_then(handlers::me);

    signup.or(login).or(me)
}

fn order_routes(
    desk: Arc<TradingDesk>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let place = warp::path!("api" / "orders")
        .and(warp::post())
        .and(with_auth(desk.clone()))
        .and(json_body())
        .and(with_desk(desk.clone()))
        .and_then(handlers::place_order);

    let list = warp::path!("api" / "orders")
        .and(warp::get())
        .and(with_auth(desk.clone()))
        .and(with_desk(desk.clone()))
        .and_then(handlers::list_orders);

    let holdings = warp::path!("api" / "holdings")
        .and(warp::get())
        .and(with_auth(desk.clone()))
        .and(with_desk(desk.clone()))
        .and_then(handlers::holdings);

    let positions = warp::path!("api" / "positions")
        .and(warp::get())
        .and(with_auth(desk.clone()))
        .and(with_desk(desk))
        .and_then(handlers::positions);

    place.or(list).or(holdings).or(positions)
}

fn market_routes(
    desk: Arc<TradingDesk>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let stocks = warp::path!("api" / "stocks")
        .and(warp::get())
        .and(with_desk(desk.clone()))
        .and_then(handlers::all_stocks);

    // Must be tried before the `{symbol}` route.
    let trends = warp::path!("api" / "stocks" / "trends")
        .and(warp::get())
        .and(with_desk(desk.clone()))
        .and_then(handlers::stock_trends);

    let quote = warp::path!("api" / "stocks" / String)
        .and(warp::get())
        .and(with_desk(desk.clone()))
        .and_then(handlers::stock_quote);

    let options = warp::path!("api" / "options" / String)
        .and(warp::get())
        .and(with_desk(desk.clone()))
        .and_then(handlers::option_chain);

    let status = warp::path!("api" / "status")
        .and(warp::get())
        .and(with_desk(desk.clone()))
        .and_then(handlers::api_status);

    let pit = warp::path!("api" / "pit")
        .and(warp::get())
        .and(with_desk(desk))
        .and_then(handlers::pit_snapshot);

    stocks.or(trends).or(quote).or(options).or(status).or(pit)
}

fn analytics_routes(
    desk: Arc<TradingDesk>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let summary = warp::path!("api" / "summary")
        .and(warp::get())
        .and(with_auth(desk.clone()))
        .and(with_desk(desk.clone()))
        .and_then(handlers::trading_summary);

    let team = warp::path!("api" / "team-performance")
        .and(warp::get())
        .and(with_desk(desk.clone()))
        .and_then(handlers::team_performance);

    let risk = warp::path!("api" / "risk")
        .and(warp::get())
        .and(with_auth(desk.clone()))
        .and(with_desk(desk.clone()))
        .and_then(handlers::portfolio_risk);

    let predictions = warp::path!("api" / "predictions")
        .and(warp::get())
        .and(with_auth(desk.clone()))
        .and(with_desk(desk))
        .and_then(handlers::predictions);

    summary.or(team).or(risk).or(predictions)
}

fn with_desk(
    desk: Arc<TradingDesk>,
) -> impl Filter<Extract = (Arc<TradingDesk>,), Error = Infallible> + Clone {
    warp::any().map(move || desk.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Resolve `Authorization: Bearer <token>` to the caller's user id.
fn with_auth(
    desk: Arc<TradingDesk>,
) -> impl Filter<Extract = (Uuid,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_desk(desk))
        .and_then(|header: Option<String>, desk: Arc<TradingDesk>| async move {
            let token = header
                .as_deref()
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| reject(CoreError::Unauthorized("Missing bearer token".into())))?;
            desk.auth().verify_token(token).map_err(reject)
        })
}
