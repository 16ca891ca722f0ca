pub mod clock;
pub mod error;
pub mod lending;
pub mod models;
pub mod reviews;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use biblio_kernel::{InitCtx, Migration, Module};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};

use service::LendingService;

/// Books module: catalogue, lending lifecycle, and reviews
pub struct BooksModule {
    service: OnceCell<Arc<LendingService>>,
}

impl BooksModule {
    pub const fn new() -> Self {
        Self {
            service: OnceCell::new(),
        }
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if ctx.settings.database.seed_demo_data {
            biblio_db::seed::seed_demo_catalog(ctx.db.as_ref()).await?;
        }

        let service = LendingService::new(Arc::clone(ctx.db), ctx.settings.lending.clone());
        if self.service.set(Arc::new(service)).is_err() {
            anyhow::bail!("books module initialized twice");
        }

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            loan_period_days = ctx.settings.lending.loan_period_days,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.service.get() {
            Some(service) => routes::router(Arc::clone(service)),
            None => {
                tracing::warn!(module = self.name(), "routes requested before init; mounting none");
                Router::new()
            }
        }
    }

    fn openapi(&self) -> Option<Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![
            Migration {
                id: "001_books",
                up: r#"
                CREATE TABLE books (
                    id                BIGSERIAL PRIMARY KEY,
                    title             TEXT NOT NULL CHECK (title <> ''),
                    author            TEXT NOT NULL CHECK (author <> ''),
                    description       TEXT NOT NULL DEFAULT '',
                    cover_image       TEXT NOT NULL DEFAULT '',
                    publisher         TEXT NOT NULL DEFAULT '',
                    publication_date  TIMESTAMPTZ,
                    category          TEXT NOT NULL DEFAULT '',
                    isbn              TEXT NOT NULL DEFAULT '',
                    page_count        INTEGER NOT NULL DEFAULT 0,
                    checked_out_by    TEXT,
                    checked_out_at    TIMESTAMPTZ,
                    version           BIGINT NOT NULL DEFAULT 1,
                    CHECK ((checked_out_by IS NULL) = (checked_out_at IS NULL))
                );
                "#,
            },
            Migration {
                id: "002_reviews",
                up: r#"
                CREATE TABLE reviews (
                    id              BIGSERIAL PRIMARY KEY,
                    book_id         BIGINT NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    author_user_id  TEXT NOT NULL,
                    rating          SMALLINT NOT NULL CHECK (rating BETWEEN 1 AND 5),
                    comment         TEXT NOT NULL DEFAULT '' CHECK (char_length(comment) <= 256),
                    created_at      TIMESTAMPTZ NOT NULL
                );
                CREATE INDEX reviews_book_created ON reviews (book_id, created_at DESC);
                "#,
            },
            Migration {
                id: "003_rating_aggregate",
                up: r#"
                ALTER TABLE books ADD COLUMN rating_sum   BIGINT NOT NULL DEFAULT 0;
                ALTER TABLE books ADD COLUMN rating_count BIGINT NOT NULL DEFAULT 0;
                UPDATE books b SET
                    rating_sum   = COALESCE((SELECT SUM(rating) FROM reviews r WHERE r.book_id = b.id), 0),
                    rating_count = (SELECT COUNT(*) FROM reviews r WHERE r.book_id = b.id);
                "#,
            },
        ]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn json_body(schema: Value) -> Value {
    json!({ "content": { "application/json": { "schema": schema } } })
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn response(description: &str, schema: Value) -> Value {
    let mut body = json_body(schema);
    body["description"] = json!(description);
    body
}

fn error(description: &str) -> Value {
    response(description, schema_ref("ErrorResponse"))
}

fn id_param() -> Value {
    json!([{
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer", "format": "int64" }
    }])
}

fn operation(summary: &str, responses: Value) -> Value {
    json!({ "summary": summary, "tags": ["Books"], "parameters": id_param(), "responses": responses })
}

fn openapi_fragment() -> Value {
    let book_array = json!({ "type": "array", "items": schema_ref("Book") });
    let review_array = json!({ "type": "array", "items": schema_ref("Review") });

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "responses": { "200": response("List of books", book_array) }
                },
                "post": {
                    "summary": "Add a book (librarian)",
                    "tags": ["Books"],
                    "requestBody": json_body(schema_ref("CatalogEntry")),
                    "responses": {
                        "201": response("Created book", schema_ref("Book")),
                        "401": error("No caller identity"),
                        "403": error("Caller is not a librarian"),
                        "422": error("Invalid catalog fields")
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            },
            "/{id}": {
                "get": operation("Get a book", json!({
                    "200": response("Book", schema_ref("Book")),
                    "404": error("Unknown book")
                })),
                "put": {
                    "summary": "Edit catalog fields (librarian)",
                    "tags": ["Books"],
                    "parameters": id_param(),
                    "requestBody": json_body(schema_ref("CatalogEntry")),
                    "responses": {
                        "200": response("Edited book", schema_ref("Book")),
                        "403": error("Caller is not a librarian"),
                        "404": error("Unknown book"),
                        "409": error("Concurrent modification")
                    }
                },
                "delete": operation("Delete a book and its reviews (librarian)", json!({
                    "204": { "description": "Deleted" },
                    "403": error("Caller is not a librarian"),
                    "404": error("Unknown book")
                }))
            },
            "/{id}/checkout": {
                "post": operation("Check out a book", json!({
                    "200": response("Checked-out book", schema_ref("Book")),
                    "401": error("No caller identity"),
                    "404": error("Unknown book"),
                    "409": error("Already checked out")
                }))
            },
            "/{id}/return": {
                "post": operation("Return a book (librarian)", json!({
                    "200": response("Returned book", schema_ref("Book")),
                    "400": error("Book is not checked out"),
                    "403": error("Caller is not a librarian"),
                    "404": error("Unknown book")
                }))
            },
            "/{id}/reviews": {
                "get": operation("List reviews, latest first", json!({
                    "200": response("Reviews", review_array),
                    "401": error("No caller identity"),
                    "404": error("Unknown book")
                })),
                "post": {
                    "summary": "Add a review",
                    "tags": ["Books"],
                    "parameters": id_param(),
                    "requestBody": json_body(schema_ref("AddReview")),
                    "responses": {
                        "201": response("Created review", schema_ref("Review")),
                        "401": error("No caller identity"),
                        "404": error("Unknown book"),
                        "422": error("Rating outside 1-5 or comment too long")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "CatalogEntry": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "description": { "type": "string" },
                        "coverImage": { "type": "string" },
                        "publisher": { "type": "string" },
                        "publicationDate": { "type": "string", "format": "date-time", "nullable": true },
                        "category": { "type": "string" },
                        "isbn": { "type": "string" },
                        "pageCount": { "type": "integer" }
                    },
                    "required": ["title", "author"]
                },
                "Book": {
                    "allOf": [
                        schema_ref("CatalogEntry"),
                        {
                            "type": "object",
                            "properties": {
                                "id": { "type": "integer", "format": "int64" },
                                "isCheckedOut": { "type": "boolean" },
                                "checkedOutByUserId": { "type": "string", "nullable": true },
                                "checkedOutDate": { "type": "string", "format": "date-time", "nullable": true },
                                "dueDate": { "type": "string", "format": "date-time", "nullable": true },
                                "averageRating": { "type": "number", "format": "double" },
                                "reviewCount": { "type": "integer" },
                                "availability": {
                                    "type": "string",
                                    "description": "Available, Overdue, or Not Available (Due in N days)"
                                }
                            },
                            "required": ["id", "isCheckedOut", "averageRating", "reviewCount", "availability"]
                        }
                    ]
                },
                "Review": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "bookId": { "type": "integer", "format": "int64" },
                        "userId": { "type": "string" },
                        "rating": { "type": "integer", "minimum": 1, "maximum": 5 },
                        "comment": { "type": "string" },
                        "createdAt": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "bookId", "userId", "rating", "comment", "createdAt"]
                },
                "AddReview": {
                    "type": "object",
                    "properties": {
                        "rating": { "type": "integer", "minimum": 1, "maximum": 5 },
                        "comment": { "type": "string", "maxLength": 256 }
                    },
                    "required": ["rating"]
                }
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}
