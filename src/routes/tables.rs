use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::tables::{CreateTableRequest, TableList, UpdateTableRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::DiningTable,
    response::ApiResponse,
    routes::params::Pagination,
    services::table_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tables))
        .route("/", post(create_table))
        .route("/{id}", put(update_table))
        .route("/{id}", delete(delete_table))
}

#[utoipa::path(
    get,
    path = "/api/tables",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Tables with derived status labels", body = ApiResponse<TableList>)
    ),
    tag = "Tables"
)]
pub async fn list_tables(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<TableList>>> {
    let resp = table_service::list_tables(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/tables",
    request_body = CreateTableRequest,
    responses(
        (status = 200, description = "Table created", body = ApiResponse<DiningTable>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tables"
)]
pub async fn create_table(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateTableRequest>,
) -> AppResult<Json<ApiResponse<DiningTable>>> {
    let resp = table_service::create_table(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/tables/{id}",
    params(("id" = Uuid, Path, description = "Table ID")),
    request_body = UpdateTableRequest,
    responses(
        (status = 200, description = "Updated table", body = ApiResponse<DiningTable>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tables"
)]
pub async fn update_table(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTableRequest>,
) -> AppResult<Json<ApiResponse<DiningTable>>> {
    let resp = table_service::update_table(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/tables/{id}",
    params(("id" = Uuid, Path, description = "Table ID")),
    responses(
        (status = 200, description = "Deleted table"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tables"
)]
pub async fn delete_table(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = table_service::delete_table(&state, &user, id).await?;
    Ok(Json(resp))
}
