mod common;

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::http::header::{CACHE_CONTROL, SET_COOKIE};
use actix_web::middleware::from_fn;
use actix_web::{App, HttpResponse, test, web};
use baseplatform::app;
use baseplatform::firewall::http_firewall;
use serde_json::{Value, json};

use common::{ADMIN_ROLE, GENERAL_ROLE, MemoryStore, READ_PERMISSION, context, session_cookie};

macro_rules! service {
    ($ctx:expr) => {{
        let ctx = $ctx.clone();
        test::init_service(
            App::new()
                .wrap(from_fn(http_firewall))
                .configure(move |cfg| app::configure(cfg, &ctx))
                .default_service(web::route().to(HttpResponse::NotFound)),
        )
        .await
    }};
}

fn fixture() -> (Arc<MemoryStore>, i64, i64) {
    let store = Arc::new(MemoryStore::seeded());
    let admin = store.add_user("admin", "admin-pass", true, &[ADMIN_ROLE]);
    let plain = store.add_user("plain", "plain-pass", true, &[GENERAL_ROLE]);
    (store, admin, plain)
}

#[actix_web::test]
async fn health_is_public() {
    let (store, _, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let resp = test::call_service(&svc, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn unknown_route_is_not_found() {
    let (store, _, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let resp =
        test::call_service(&svc, test::TestRequest::get().uri("/nowhere").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn sign_up_then_sign_in_sets_cookie() {
    let (store, _, _) = fixture();
    let ctx = context(store.clone(), "static");
    let svc = service!(ctx);

    let req = test::TestRequest::post()
        .uri("/auth/sign-up")
        .set_json(json!({"username": "newbie", "password": "s3cret"}))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::CREATED);

    let created = store.user_by_name("newbie");
    assert_eq!(store.user_role_ids(created), vec![GENERAL_ROLE]);

    let req = test::TestRequest::post()
        .uri("/auth/sign-in")
        .set_json(json!({"username": "newbie", "password": "s3cret"}))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
}

#[actix_web::test]
async fn duplicate_sign_up_is_rejected() {
    let (store, _, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::post()
        .uri("/auth/sign-up")
        .set_json(json!({"username": "admin", "password": "whatever"}))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "username admin already exist");
}

#[actix_web::test]
async fn sign_in_with_wrong_password_fails() {
    let (store, _, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::post()
        .uri("/auth/sign-in")
        .set_json(json!({"username": "admin", "password": "nope"}))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(SET_COOKIE).is_none());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "password invalid");
}

#[actix_web::test]
async fn blank_credentials_are_a_bad_request() {
    let (store, _, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::post()
        .uri("/auth/sign-in")
        .set_json(json!({"username": " ", "password": ""}))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/auth/sign-in")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn sign_out_clears_cookie() {
    let (store, admin, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::post()
        .uri("/auth/sign-out")
        .cookie(session_cookie(&ctx, admin))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[actix_web::test]
async fn protected_routes_need_a_session() {
    let (store, _, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let resp =
        test::call_service(&svc, test::TestRequest::get().uri("/urp/user").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/problem+json"
    );

    let req = test::TestRequest::get()
        .uri("/urp/user")
        .cookie(actix_web::cookie::Cookie::new("jwt", "garbage"))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn disabled_user_is_unauthenticated() {
    let (store, _, _) = fixture();
    let banned = store.add_user("banned", "pw", false, &[ADMIN_ROLE]);
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::get()
        .uri("/urp/user")
        .cookie(session_cookie(&ctx, banned))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn general_user_lacks_read_authority() {
    let (store, _, plain) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::get()
        .uri("/urp/role")
        .cookie(session_cookie(&ctx, plain))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn admin_pages_users_with_roles_and_permissions() {
    let (store, admin, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::get()
        .uri("/urp/user?page=0&size=10&username=adm")
        .cookie(session_cookie(&ctx, admin))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 1);
    let user = &body["data"][0];
    assert_eq!(user["username"], "admin");
    assert!(user.get("password").is_none());
    assert!(user["createTime"].is_string());
    assert_eq!(user["roles"][0]["code"], "ADMIN");
    assert_eq!(user["permissions"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn paging_rejects_bad_parameters() {
    let (store, admin, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    for uri in [
        "/urp/user?size=0",
        "/urp/user?size=2001",
        "/urp/user?sort=password",
        "/urp/user?page=abc",
        "/urp/user?page=4611686018427387904&size=2",
    ] {
        let req = test::TestRequest::get()
            .uri(uri)
            .cookie(session_cookie(&ctx, admin))
            .to_request();
        assert_eq!(
            test::call_service(&svc, req).await.status(),
            StatusCode::BAD_REQUEST,
            "{uri}"
        );
    }
}

#[actix_web::test]
async fn roles_of_user_without_roles_is_empty_page() {
    let (store, admin, _) = fixture();
    let lonely = store.add_user("lonely", "pw", true, &[]);
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::get()
        .uri(&format!("/urp/role?userId={lonely}"))
        .cookie(session_cookie(&ctx, admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&svc, req).await;
    assert_eq!(body, json!({"total": 0, "data": []}));

    let req = test::TestRequest::get()
        .uri(&format!("/urp/permission?roleId={ADMIN_ROLE}"))
        .cookie(session_cookie(&ctx, admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&svc, req).await;
    assert_eq!(body["total"], 2);
}

#[actix_web::test]
async fn bind_roles_replaces_and_reports_missing() {
    let (store, admin, plain) = fixture();
    let ctx = context(store.clone(), "static");
    let svc = service!(ctx);

    let req = test::TestRequest::post()
        .uri(&format!("/urp/user/{plain}/bind-role"))
        .cookie(session_cookie(&ctx, admin))
        .set_json(json!({"roleIds": [ADMIN_ROLE, 99]}))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::OK);
    assert_eq!(store.user_role_ids(plain), vec![ADMIN_ROLE]);

    let req = test::TestRequest::post()
        .uri(&format!("/urp/user/{plain}/bind-role"))
        .cookie(session_cookie(&ctx, admin))
        .set_json(json!({"roleIds": [98, 99]}))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "绑定的角色不存在");
    assert_eq!(store.user_role_ids(plain), vec![ADMIN_ROLE]);

    let req = test::TestRequest::post()
        .uri(&format!("/urp/user/{plain}/bind-role"))
        .cookie(session_cookie(&ctx, admin))
        .set_json(json!({"roleIds": []}))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::OK);
    assert!(store.user_role_ids(plain).is_empty());
}

#[actix_web::test]
async fn bind_permissions_needs_write_authority() {
    let (store, admin, plain) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::post()
        .uri(&format!("/urp/role/{GENERAL_ROLE}/bind-permission"))
        .cookie(session_cookie(&ctx, plain))
        .set_json(json!({"permissionIds": [READ_PERMISSION]}))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&format!("/urp/role/{GENERAL_ROLE}/bind-permission"))
        .cookie(session_cookie(&ctx, admin))
        .set_json(json!({"permissionIds": [READ_PERMISSION]}))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::OK);

    // plain now holds READ through GENERAL
    let req = test::TestRequest::get()
        .uri("/urp/permission")
        .cookie(session_cookie(&ctx, plain))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn publishers_answer_succeed() {
    let (store, _, plain) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    for uri in [
        "/amqp/publisher/test/simple-mode?routing-key=simple-mode",
        "/amqp/publisher/test/work-mode?routing-key=work-mode",
        "/amqp/publisher/test/topic-mode?routing-key=topic-mode.a.b",
        "/amqp/publisher/test/pubsub-mode",
    ] {
        let req = test::TestRequest::post()
            .uri(uri)
            .cookie(session_cookie(&ctx, plain))
            .set_json(json!({"id": 1, "name": "hello"}))
            .to_request();
        let body = test::call_and_read_body(&svc, req).await;
        assert_eq!(body, "succeed", "{uri}");
    }

    let req = test::TestRequest::post()
        .uri("/amqp/publisher/test/pubsub-mode")
        .set_json(json!({"id": 1}))
        .to_request();
    assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn firewall_blocks_suspicious_paths() {
    let (store, _, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    for uri in ["/health;jsessionid=1", "/asset/%2e%2e/secret", "/a//b"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        assert_eq!(
            test::call_service(&svc, req).await.status(),
            StatusCode::BAD_REQUEST,
            "{uri}"
        );
    }
}

#[actix_web::test]
async fn static_assets_are_cached_for_a_minute() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hi there").unwrap();
    let (store, _, _) = fixture();
    let ctx = context(store, dir.path().to_str().unwrap());
    let svc = service!(ctx);

    let req = test::TestRequest::get().uri("/asset/hello.txt").to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(CACHE_CONTROL).unwrap(), "max-age=60");
    assert_eq!(test::read_body(resp).await, "hi there");
}

#[actix_web::test]
async fn openapi_document_is_served() {
    let (store, _, _) = fixture();
    let ctx = context(store, "static");
    let svc = service!(ctx);

    let req = test::TestRequest::get().uri("/openapi.json").to_request();
    let body: Value = test::call_and_read_body_json(&svc, req).await;
    assert!(body["paths"]["/urp/user/{id}/bind-role"].is_object());
}
