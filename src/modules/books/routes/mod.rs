//! HTTP handlers for the books module.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use biblio_db::{BookId, CatalogEntry};
use biblio_http::{
    error::AppError,
    extract::{Json, Path},
    identity::CallerIdentity,
};

use super::models::{AddReview, Book, Review};
use super::service::LendingService;

type ApiResult<T> = Result<T, AppError>;

pub fn router(service: Arc<LendingService>) -> Router {
    Router::new()
        .route("/", get(list_books).post(add_book))
        .route("/health", get(health_check))
        .route("/{id}", get(get_book).put(edit_book).delete(delete_book))
        .route("/{id}/checkout", post(checkout))
        .route("/{id}/return", post(return_book))
        .route("/{id}/reviews", get(list_reviews).post(add_review))
        .with_state(service)
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(
    State(service): State<Arc<LendingService>>,
    CallerIdentity(caller): CallerIdentity,
) -> ApiResult<Json<Vec<Book>>> {
    Ok(Json(service.list_books(&caller).await?))
}

async fn get_book(
    State(service): State<Arc<LendingService>>,
    Path(id): Path<BookId>,
    CallerIdentity(caller): CallerIdentity,
) -> ApiResult<Json<Book>> {
    Ok(Json(service.get_book(id, &caller).await?))
}

async fn add_book(
    State(service): State<Arc<LendingService>>,
    CallerIdentity(caller): CallerIdentity,
    Json(catalog): Json<CatalogEntry>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let book = service.add_book(&caller, catalog).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn edit_book(
    State(service): State<Arc<LendingService>>,
    Path(id): Path<BookId>,
    CallerIdentity(caller): CallerIdentity,
    Json(catalog): Json<CatalogEntry>,
) -> ApiResult<Json<Book>> {
    Ok(Json(service.edit_book(id, &caller, catalog).await?))
}

async fn delete_book(
    State(service): State<Arc<LendingService>>,
    Path(id): Path<BookId>,
    CallerIdentity(caller): CallerIdentity,
) -> ApiResult<StatusCode> {
    service.delete_book(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn checkout(
    State(service): State<Arc<LendingService>>,
    Path(id): Path<BookId>,
    CallerIdentity(caller): CallerIdentity,
) -> ApiResult<Json<Book>> {
    Ok(Json(service.checkout(id, &caller).await?))
}

async fn return_book(
    State(service): State<Arc<LendingService>>,
    Path(id): Path<BookId>,
    CallerIdentity(caller): CallerIdentity,
) -> ApiResult<Json<Book>> {
    Ok(Json(service.return_book(id, &caller).await?))
}

async fn list_reviews(
    State(service): State<Arc<LendingService>>,
    Path(id): Path<BookId>,
    CallerIdentity(caller): CallerIdentity,
) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(service.list_reviews(id, &caller).await?))
}

async fn add_review(
    State(service): State<Arc<LendingService>>,
    Path(id): Path<BookId>,
    CallerIdentity(caller): CallerIdentity,
    Json(body): Json<AddReview>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let review = service
        .add_review(id, &caller, body.rating, body.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}
