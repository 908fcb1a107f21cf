//! Spending routes: the CRUD set plus the category table listing.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::domain::schema::{EntityKind, SPENDING_CATEGORIES};

use super::auth::Authenticated;
use super::crud::crud_routes;
use super::envelope;

pub fn scope() -> actix_web::Scope {
    crud_routes(
        web::scope("/spending")
            .app_data(web::Data::new(EntityKind::Spending))
            .route("/types", web::get().to(types)),
    )
}

async fn types(_auth: Authenticated) -> HttpResponse {
    let listed: Vec<_> = SPENDING_CATEGORIES
        .iter()
        .map(|(code, name)| json!({"type": code, "name": name}))
        .collect();
    envelope::ok(listed)
}
