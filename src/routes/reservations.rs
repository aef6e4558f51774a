use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, patch, post, put},
};
use uuid::Uuid;

use crate::{
    dto::reservations::{
        AvailableTableList, AvailableTablesQuery, CreateReservationRequest, ReservationList,
        SetReservationStatusRequest, UpdateReservationRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Reservation,
    response::ApiResponse,
    routes::params::ReservationListQuery,
    services::reservation_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reservation))
        .route("/", get(list_reservations))
        .route("/available-tables", get(available_tables))
        .route("/{id}", get(get_reservation))
        .route("/{id}", put(update_reservation))
        .route("/{id}", delete(cancel_reservation))
        .route("/{id}/status", patch(set_reservation_status))
}

#[utoipa::path(
    post,
    path = "/api/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 200, description = "Reservation created in pending status", body = ApiResponse<Reservation>),
        (status = 400, description = "Past time or inactive table"),
        (status = 409, description = "Table already reserved near the requested time"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateReservationRequest>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let resp = reservation_service::create_reservation(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reservations",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by reservation status"),
        ("table_id" = Option<Uuid>, Query, description = "Filter by table"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "All reservations (staff only)", body = ApiResponse<ReservationList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ReservationListQuery>,
) -> AppResult<Json<ApiResponse<ReservationList>>> {
    let resp = reservation_service::list_reservations(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reservations/available-tables",
    params(
        ("time" = String, Query, description = "Requested reservation time, RFC 3339")
    ),
    responses(
        (status = 200, description = "Active tables free around the requested time", body = ApiResponse<AvailableTableList>),
        (status = 400, description = "Time not in the future"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn available_tables(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<AvailableTablesQuery>,
) -> AppResult<Json<ApiResponse<AvailableTableList>>> {
    let resp = reservation_service::available_tables(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reservations/{id}",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = ApiResponse<Reservation>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let resp = reservation_service::get_reservation(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/reservations/{id}",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    request_body = UpdateReservationRequest,
    responses(
        (status = 200, description = "Updated reservation; table/time moves re-check availability", body = ApiResponse<Reservation>),
        (status = 400, description = "No effective changes or past time"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Table already reserved near the requested time"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn update_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReservationRequest>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let resp = reservation_service::update_reservation(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/reservations/{id}",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled; repeat cancellation is a no-op success", body = ApiResponse<Reservation>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let resp = reservation_service::cancel_reservation(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/reservations/{id}/status",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    request_body = SetReservationStatusRequest,
    responses(
        (status = 200, description = "Reservation status updated", body = ApiResponse<Reservation>),
        (status = 400, description = "Unknown status value"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn set_reservation_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetReservationStatusRequest>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let resp = reservation_service::set_reservation_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
