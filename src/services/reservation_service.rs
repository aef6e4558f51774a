use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::reservations::{
        AvailableTableList, AvailableTablesQuery, CreateReservationRequest, ReservationList,
        SetReservationStatusRequest, UpdateReservationRequest,
    },
    entity::dining_tables::{Column as TableCol, Entity as DiningTables},
    entity::reservations::{
        ActiveModel as ReservationActive, Column, Entity as Reservations, Model as ReservationModel,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_staff},
    models::{Reservation, ReservationStatus},
    response::{ApiResponse, Meta},
    routes::params::{ReservationListQuery, SortOrder},
    services::table_service::{get_active_table, table_from_entity},
    state::AppState,
};

/// Two reservations on the same table collide when their times are less
/// than this far apart. Symmetric fixed radius; reservations carry no
/// duration, so this is the whole collision model.
pub const CONFLICT_WINDOW_MINUTES: i64 = 120;

pub fn conflict_window() -> TimeDelta {
    TimeDelta::minutes(CONFLICT_WINDOW_MINUTES)
}

/// Strict comparison: exactly 120 minutes apart does not collide.
pub fn within_conflict_window(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    (a - b).num_seconds().abs() < conflict_window().num_seconds()
}

/// Availability check behind every reservation write. A store error
/// propagates; it is never treated as "available".
pub async fn is_table_available<C: ConnectionTrait>(
    conn: &C,
    table_id: Uuid,
    requested_at: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> AppResult<bool> {
    let low = requested_at - conflict_window();
    let high = requested_at + conflict_window();

    let mut condition = Condition::all()
        .add(Column::TableId.eq(table_id))
        .add(Column::Status.is_not_in(["cancelled", "no_show"]))
        .add(Column::ReservedAt.gt(low))
        .add(Column::ReservedAt.lt(high));
    if let Some(exclude_id) = exclude {
        condition = condition.add(Column::Id.ne(exclude_id));
    }

    let blocking = Reservations::find()
        .filter(condition)
        .limit(1)
        .one(conn)
        .await?;

    Ok(blocking.is_none())
}

fn conflict_error(table_number: i32, requested_at: DateTime<Utc>) -> AppError {
    AppError::Conflict(format!(
        "table {} already has a reservation near {}",
        table_number,
        requested_at.to_rfc3339()
    ))
}

fn ensure_future(requested_at: DateTime<Utc>) -> AppResult<()> {
    if requested_at <= Utc::now() {
        return Err(AppError::Validation(
            "reservation time must be in the future".into(),
        ));
    }
    Ok(())
}

pub async fn create_reservation(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReservationRequest,
) -> AppResult<ApiResponse<Reservation>> {
    ensure_future(payload.reserved_at)?;

    let customer_id = if user.role == "customer" {
        Some(user.user_id)
    } else {
        payload.customer_id
    };

    let table = get_active_table(&state.orm, payload.table_id).await?;

    if !is_table_available(&state.orm, table.id, payload.reserved_at, None).await? {
        return Err(conflict_error(table.number, payload.reserved_at));
    }

    let reservation = ReservationActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        table_id: Set(table.id),
        reserved_at: Set(payload.reserved_at.into()),
        status: Set(ReservationStatus::Pending.as_str().into()),
        special_requests: Set(payload.special_requests),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "reservation_create",
        Some("reservations"),
        Some(serde_json::json!({ "reservation_id": reservation.id, "table_id": table.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Reservation created",
        reservation_from_entity(reservation),
        Some(Meta::empty()),
    ))
}

pub async fn update_reservation(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReservationRequest,
) -> AppResult<ApiResponse<Reservation>> {
    let existing = Reservations::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_staff(user, existing.customer_id)?;

    if payload.table_id.is_none()
        && payload.reserved_at.is_none()
        && payload.special_requests.is_none()
    {
        return Err(AppError::NoOp);
    }

    let current_time = existing.reserved_at.with_timezone(&Utc);
    let new_table_id = payload.table_id.unwrap_or(existing.table_id);
    let new_time = payload.reserved_at.unwrap_or(current_time);

    // Moving the reservation in space or time re-runs the availability
    // check, excluding this reservation's own row.
    if new_table_id != existing.table_id || new_time != current_time {
        ensure_future(new_time)?;
        let table = get_active_table(&state.orm, new_table_id).await?;
        if !is_table_available(&state.orm, table.id, new_time, Some(existing.id)).await? {
            return Err(conflict_error(table.number, new_time));
        }
    }

    let mut active: ReservationActive = existing.into();
    if let Some(table_id) = payload.table_id {
        active.table_id = Set(table_id);
    }
    if let Some(reserved_at) = payload.reserved_at {
        active.reserved_at = Set(reserved_at.into());
    }
    if let Some(special_requests) = payload.special_requests {
        active.special_requests = Set(Some(special_requests));
    }
    active.updated_at = Set(Utc::now().into());

    let reservation = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "reservation_update",
        Some("reservations"),
        Some(serde_json::json!({ "reservation_id": reservation.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Reservation updated",
        reservation_from_entity(reservation),
        Some(Meta::empty()),
    ))
}

/// Cancelling an already cancelled reservation succeeds without touching
/// the row.
pub async fn cancel_reservation(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Reservation>> {
    let existing = Reservations::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_staff(user, existing.customer_id)?;

    if existing.status == ReservationStatus::Cancelled.as_str() {
        return Ok(ApiResponse::success(
            "Reservation cancelled",
            reservation_from_entity(existing),
            Some(Meta::empty()),
        ));
    }

    let mut active: ReservationActive = existing.into();
    active.status = Set(ReservationStatus::Cancelled.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let reservation = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "reservation_cancel",
        Some("reservations"),
        Some(serde_json::json!({ "reservation_id": reservation.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Reservation cancelled",
        reservation_from_entity(reservation),
        Some(Meta::empty()),
    ))
}

pub async fn set_reservation_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: SetReservationStatusRequest,
) -> AppResult<ApiResponse<Reservation>> {
    ensure_staff(user)?;
    let status = ReservationStatus::parse(&payload.status)?;

    let existing = Reservations::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };

    if existing.status == status.as_str() {
        return Ok(ApiResponse::success(
            "Reservation status unchanged",
            reservation_from_entity(existing),
            Some(Meta::empty()),
        ));
    }

    let mut active: ReservationActive = existing.into();
    active.status = Set(status.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let reservation = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "reservation_status_update",
        Some("reservations"),
        Some(serde_json::json!({ "reservation_id": reservation.id, "status": reservation.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Reservation status updated",
        reservation_from_entity(reservation),
        Some(Meta::empty()),
    ))
}

pub async fn get_reservation(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Reservation>> {
    let reservation = Reservations::find_by_id(id).one(&state.orm).await?;
    let reservation = match reservation {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_staff(user, reservation.customer_id)?;

    Ok(ApiResponse::success(
        "Reservation",
        reservation_from_entity(reservation),
        None,
    ))
}

pub async fn list_reservations(
    state: &AppState,
    user: &AuthUser,
    query: ReservationListQuery,
) -> AppResult<ApiResponse<ReservationList>> {
    ensure_staff(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Status.eq(status.clone()));
    }
    if let Some(table_id) = query.table_id {
        condition = condition.add(Column::TableId.eq(table_id));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Asc);
    let mut finder = Reservations::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(Column::ReservedAt),
        SortOrder::Desc => finder.order_by_desc(Column::ReservedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(reservation_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Reservations",
        ReservationList { items },
        Some(meta),
    ))
}

/// The conflict rule applied across every active table: which tables could
/// take a reservation at the requested time.
pub async fn available_tables(
    state: &AppState,
    query: AvailableTablesQuery,
) -> AppResult<ApiResponse<AvailableTableList>> {
    ensure_future(query.time)?;

    let tables = DiningTables::find()
        .filter(TableCol::Active.eq(true))
        .order_by_asc(TableCol::Number)
        .all(&state.orm)
        .await?;

    let low = query.time - conflict_window();
    let high = query.time + conflict_window();
    let blocked: std::collections::HashSet<Uuid> = Reservations::find()
        .filter(Column::Status.is_not_in(["cancelled", "no_show"]))
        .filter(Column::ReservedAt.gt(low))
        .filter(Column::ReservedAt.lt(high))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|r| r.table_id)
        .collect();

    let items = tables
        .into_iter()
        .filter(|t| !blocked.contains(&t.id))
        .map(|t| table_from_entity(t, false))
        .collect();

    Ok(ApiResponse::success(
        "Available tables",
        AvailableTableList { items },
        Some(Meta::empty()),
    ))
}

fn ensure_owner_or_staff(user: &AuthUser, customer_id: Option<Uuid>) -> AppResult<()> {
    if user.role == "customer" && customer_id != Some(user.user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn reservation_from_entity(model: ReservationModel) -> Reservation {
    Reservation {
        id: model.id,
        customer_id: model.customer_id,
        table_id: model.table_id,
        reserved_at: model.reserved_at.with_timezone(&Utc),
        status: model.status,
        special_requests: model.special_requests,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
