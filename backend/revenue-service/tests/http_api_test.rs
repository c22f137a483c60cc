mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use common::{fast_batch_config, seed_profile, seed_video};
use jsonwebtoken::{encode, EncodingKey, Header};
use revenue_service::db::{MemoryRevenueStore, RevenueStore};
use revenue_service::handlers::{configure, AppState};
use revenue_service::middleware::{Claims, JwtAuthMiddleware};
use revenue_service::models::Role;
use revenue_service::services::RevenuePolicy;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

fn token_for(user_id: Uuid, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn bearer(user_id: Uuid) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token_for(user_id, SECRET)))
}

fn app_state(store: &Arc<MemoryRevenueStore>) -> web::Data<AppState> {
    web::Data::new(AppState::new(
        RevenueStore::memory(store.clone()),
        RevenuePolicy::default(),
        fast_batch_config(),
    ))
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(|cfg| configure(cfg, JwtAuthMiddleware::new(SECRET))),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health_needs_no_token() {
    let store = Arc::new(MemoryRevenueStore::new());
    let state = app_state(&store);
    let app = init_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/ready").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_missing_or_forged_token_is_unauthorized() {
    let store = Arc::new(MemoryRevenueStore::new());
    let state = app_state(&store);
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/revenue/calculate").to_request();
    let status = match test::try_call_service(&app, req).await {
        Ok(resp) => resp.status(),
        Err(err) => err.as_response_error().status_code(),
    };
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = token_for(Uuid::new_v4(), "another-secret-that-is-also-32-bytes-long");
    let req = test::TestRequest::get()
        .uri("/revenue/calculate")
        .insert_header(("Authorization", format!("Bearer {}", forged)))
        .to_request();
    let status = match test::try_call_service(&app, req).await {
        Ok(resp) => resp.status(),
        Err(err) => err.as_response_error().status_code(),
    };
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_player_calculates_own_video_and_reads_earnings() {
    let store = Arc::new(MemoryRevenueStore::new());
    let player = Uuid::new_v4();
    let user = seed_profile(&store, Some(player), Role::Player).await;
    let video = seed_video(&store, player, 1_000, &[], 0).await;
    let state = app_state(&store);
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/revenue/calculate")
        .insert_header(bearer(user))
        .set_json(json!({ "videoId": video }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], json!(true));
    assert!(body.get("videosProcessed").is_none());
    assert!(body["message"].as_str().unwrap().contains("1000 cents"));

    let req = test::TestRequest::get()
        .uri("/revenue/calculate")
        .insert_header(bearer(user))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["earnings"]["total_earnings_cents"], json!(700));
    assert_eq!(body["recentDistributions"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_player_cannot_target_other_players() {
    let store = Arc::new(MemoryRevenueStore::new());
    let player = Uuid::new_v4();
    let other = Uuid::new_v4();
    let user = seed_profile(&store, Some(player), Role::Player).await;
    let foreign_video = seed_video(&store, other, 10, &[], 0).await;
    let state = app_state(&store);
    let app = init_app!(state);

    for body in [
        json!({ "playerId": other }),
        json!({ "videoId": foreign_video }),
        json!({}),
    ] {
        let req = test::TestRequest::post()
            .uri("/revenue/calculate")
            .insert_header(bearer(user))
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}

#[actix_web::test]
async fn test_both_targets_is_bad_request() {
    let store = Arc::new(MemoryRevenueStore::new());
    let admin = seed_profile(&store, None, Role::Admin).await;
    let state = app_state(&store);
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/revenue/calculate")
        .insert_header(bearer(admin))
        .set_json(json!({ "videoId": Uuid::new_v4(), "playerId": Uuid::new_v4() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], json!(400));
}

#[actix_web::test]
async fn test_admin_runs_all_public_batch() {
    let store = Arc::new(MemoryRevenueStore::new());
    let admin = seed_profile(&store, None, Role::Admin).await;
    let owner = Uuid::new_v4();
    seed_video(&store, owner, 100, &[], 2).await;
    seed_video(&store, owner, 200, &[], 1).await;
    let state = app_state(&store);
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/revenue/calculate")
        .insert_header(bearer(admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["videosProcessed"], json!(2));
    assert_eq!(body["errors"], json!(0));
}

#[actix_web::test]
async fn test_user_without_player_gets_not_found() {
    let store = Arc::new(MemoryRevenueStore::new());
    let viewer = seed_profile(&store, None, Role::Viewer).await;
    let state = app_state(&store);
    let app = init_app!(state);

    let req = test::TestRequest::get()
        .uri("/revenue/calculate")
        .insert_header(bearer(viewer))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_admin_report_and_snapshot() {
    let store = Arc::new(MemoryRevenueStore::new());
    let admin = seed_profile(&store, None, Role::Admin).await;
    let player = Uuid::new_v4();
    let player_user = seed_profile(&store, Some(player), Role::Player).await;
    let video = seed_video(&store, player, 1_000, &[], 0).await;
    let state = app_state(&store);
    state.engine.process_video(video).await.unwrap();
    let app = init_app!(state);

    let req = test::TestRequest::get()
        .uri("/admin/revenue")
        .insert_header(bearer(player_user))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::get()
        .uri("/admin/revenue")
        .insert_header(bearer(admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["platformTotal"], json!(100));
    assert_eq!(body["platformTotalDisplay"], json!("1.00"));
    assert_eq!(body["summary"]["total_cents"], json!(1_000));
    assert_eq!(body["topPlayers"].as_array().unwrap().len(), 1);
    assert!(body["dateRange"]["startDate"].is_string());

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/admin/revenue")
            .insert_header(bearer(admin))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["summary"]["player_cents"], json!(700));
    }
    assert_eq!(store.daily_summary_count().await, 1);

    let req = test::TestRequest::post()
        .uri("/admin/revenue/rebuild")
        .insert_header(bearer(admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["playersRebuilt"], json!(1));
}

#[actix_web::test]
async fn test_video_distributions_visible_to_owner_only() {
    let store = Arc::new(MemoryRevenueStore::new());
    let owner = Uuid::new_v4();
    let owner_user = seed_profile(&store, Some(owner), Role::Player).await;
    let stranger = seed_profile(&store, Some(Uuid::new_v4()), Role::Player).await;
    let video = seed_video(&store, owner, 1_000, &[Uuid::new_v4()], 0).await;
    let state = app_state(&store);
    state.engine.process_video(video).await.unwrap();
    let app = init_app!(state);

    let uri = format!("/revenue/videos/{}/distributions", video);
    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(bearer(owner_user))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["totalCents"], json!(1_000));
    assert_eq!(body["distributions"].as_array().unwrap().len(), 4);

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(bearer(stranger))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );
}
