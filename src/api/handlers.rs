// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::database_ops::db::{CardPage, CatalogStore};
use actix_web::{web, HttpResponse, Result};
use tracing::{error, warn};

/// Health check endpoint
pub async fn health_check(store: web::Data<CatalogStore>) -> Result<HttpResponse> {
    let s = store.clone();
    let cards = match web::block(move || s.count_cards()).await {
        Ok(Ok(n)) => Some(n),
        Ok(Err(e)) => {
            warn!(error = %e, "health check could not read the store");
            None
        }
        Err(e) => {
            warn!(error = %e, "health check worker failed");
            None
        }
    };

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: if cards.is_some() { "connected" } else { "disconnected" }.to_string(),
        cards,
    });

    Ok(HttpResponse::Ok().json(response))
}

/// First page, no filters.
pub async fn index(store: web::Data<CatalogStore>) -> Result<HttpResponse> {
    let page = load_page(store, SearchQuery::default()).await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

/// Filtered, paginated card search.
pub async fn search_dynamic(
    store: web::Data<CatalogStore>,
    params: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let page = load_page(store, params.into_inner()).await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

/// Store failures render as an empty page rather than an error response.
async fn load_page(store: web::Data<CatalogStore>, params: SearchQuery) -> CardPage {
    let page = params.page();
    let filters = params.filters();
    match web::block(move || store.query_cards(page, &filters)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!(error = %e, page, "card query failed; serving empty page");
            CardPage::empty(page)
        }
        Err(e) => {
            error!(error = %e, page, "card query worker failed; serving empty page");
            CardPage::empty(page)
        }
    }
}

/// Card plus variants, 404 for an unknown `cid`.
pub async fn get_card(
    store: web::Data<CatalogStore>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let cid = path.into_inner();
    let lookup = cid.clone();
    match web::block(move || store.get_card(&lookup)).await {
        Ok(Ok(detail)) => Ok(HttpResponse::Ok().json(ApiResponse::success(detail))),
        Ok(Err(e)) if e.is_not_found() => {
            Ok(HttpResponse::NotFound().json(ApiResponse::<()>::error(format!("card {cid} not found"))))
        }
        Ok(Err(e)) => {
            error!(cid = %cid, error = %e, "card lookup failed");
            Ok(HttpResponse::ServiceUnavailable()
                .json(ApiResponse::<()>::error("catalog temporarily unavailable")))
        }
        Err(e) => {
            error!(cid = %cid, error = %e, "card lookup worker failed");
            Ok(HttpResponse::ServiceUnavailable()
                .json(ApiResponse::<()>::error("catalog temporarily unavailable")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::configure_routes;
    use crate::database_ops::db::{Card, Variant};
    use actix_web::{test, App};
    use serde_json::Value;
    use std::sync::Arc;

    fn card(cid: &str, name: &str, cost: i64, power: i64) -> Card {
        Card {
            cid: cid.into(),
            name: Some(name.into()),
            card_type: Some("Character".into()),
            cost: Some(cost),
            power: Some(power),
            ability: None,
            flavor: None,
            art: Some(format!("static/images/cards/{name}.png")),
            alternate_art: None,
            url: None,
            status: Some("released".into()),
            carddefid: None,
        }
    }

    fn seeded() -> Arc<CatalogStore> {
        let store = CatalogStore::open_in_memory(2).unwrap();
        let variant = Variant {
            variant_id: None,
            cid: "hulk".into(),
            vid: Some("7".into()),
            variant_url: Some("https://cdn.example.com/v/Hulk_07.webp".into()),
            variant_image: Some("static/images/variants/Hulk_07.png".into()),
            rarity: Some("Epic".into()),
            rarity_slug: Some("epic".into()),
            variant_order: Some("1".into()),
            status: None,
            full_description: None,
            inker: None,
            sketcher: None,
            colorist: None,
            release_date: None,
        };
        store
            .persist_catalog(&[
                (card("ant-man", "Ant-Man", 1, 1), vec![]),
                (card("hulk", "Hulk", 6, 12), vec![variant]),
                (card("iron-man", "Iron Man", 5, 0), vec![]),
            ])
            .unwrap();
        Arc::new(store)
    }

    macro_rules! app {
        ($store:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::from($store))
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn index_serves_first_page() {
        let app = app!(seeded());
        let req = test::TestRequest::get().uri("/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["total_pages"], 2);
        assert_eq!(body["data"]["cards"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["cards"][0]["cid"], "ant-man");
    }

    #[actix_web::test]
    async fn search_applies_buckets_and_name() {
        let app = app!(seeded());
        let req = test::TestRequest::get()
            .uri("/search_dynamic?cost=5,6&query=man&page=1")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let cards = body["data"]["cards"].as_array().unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0]["cid"], "iron-man");
        assert_eq!(body["data"]["total_pages"], 1);
    }

    #[actix_web::test]
    async fn card_detail_and_not_found() {
        let app = app!(seeded());

        let req = test::TestRequest::get().uri("/cards/hulk").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["card"]["name"], "Hulk");
        assert_eq!(body["data"]["variants"][0]["vid"], "7");

        let req = test::TestRequest::get().uri("/cards/nobody").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn broken_store_renders_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.db");
        let store = Arc::new(CatalogStore::open(&path, 10).unwrap());
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE variants; DROP TABLE cards;")
            .unwrap();

        let app = app!(store);
        let req = test::TestRequest::get().uri("/search_dynamic?page=3").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["cards"].as_array().unwrap().len(), 0);
        assert_eq!(body["data"]["total_pages"], 1);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["database"], "disconnected");
    }
}
