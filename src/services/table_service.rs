use std::collections::HashSet;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::tables::{CreateTableRequest, TableList, UpdateTableRequest},
    entity::dining_tables::{ActiveModel, Column, Entity as DiningTables, Model as TableModel},
    entity::reservations::{Column as ReservationCol, Entity as Reservations},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::DiningTable,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::reservation_service::conflict_window,
    state::AppState,
};

/// Table registry lookup used by the reservation path. A missing id is an
/// invalid reference; an inactive table cannot take reservations.
pub async fn get_active_table<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> AppResult<TableModel> {
    let table = DiningTables::find_by_id(id).one(conn).await?;
    let table = match table {
        Some(t) => t,
        None => return Err(AppError::InvalidReference { missing: vec![id] }),
    };
    if !table.active {
        return Err(AppError::Validation(format!(
            "table {} is not accepting reservations",
            table.number
        )));
    }
    Ok(table)
}

pub async fn list_tables(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<TableList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = DiningTables::find().order_by_asc(Column::Number);
    let total = finder.clone().count(&state.orm).await? as i64;

    let tables = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    // The coarse status label is derived, never stored: a table with a live
    // reservation inside the conflict window of "now" lists as reserved.
    let now = Utc::now();
    let ids: Vec<Uuid> = tables.iter().map(|t| t.id).collect();
    let reserved: HashSet<Uuid> = Reservations::find()
        .filter(ReservationCol::TableId.is_in(ids))
        .filter(ReservationCol::Status.is_not_in(["cancelled", "no_show"]))
        .filter(ReservationCol::ReservedAt.gt(now - conflict_window()))
        .filter(ReservationCol::ReservedAt.lt(now + conflict_window()))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|r| r.table_id)
        .collect();

    let items = tables
        .into_iter()
        .map(|t| {
            let occupied = reserved.contains(&t.id);
            table_from_entity(t, occupied)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Tables", TableList { items }, Some(meta)))
}

pub async fn create_table(
    state: &AppState,
    user: &AuthUser,
    payload: CreateTableRequest,
) -> AppResult<ApiResponse<DiningTable>> {
    ensure_admin(user)?;
    if payload.capacity <= 0 {
        return Err(AppError::Validation("capacity must be greater than 0".into()));
    }

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        number: Set(payload.number),
        capacity: Set(payload.capacity),
        active: Set(payload.active.unwrap_or(true)),
        created_at: NotSet,
    };
    let table = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "table_create",
        Some("dining_tables"),
        Some(serde_json::json!({ "table_id": table.id, "number": table.number })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Table created",
        table_from_entity(table, false),
        Some(Meta::empty()),
    ))
}

pub async fn update_table(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateTableRequest,
) -> AppResult<ApiResponse<DiningTable>> {
    ensure_admin(user)?;
    let existing = DiningTables::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(t) => t,
        None => return Err(AppError::NotFound),
    };

    if let Some(capacity) = payload.capacity {
        if capacity <= 0 {
            return Err(AppError::Validation("capacity must be greater than 0".into()));
        }
    }

    let mut active: ActiveModel = existing.into();
    if let Some(number) = payload.number {
        active.number = Set(number);
    }
    if let Some(capacity) = payload.capacity {
        active.capacity = Set(capacity);
    }
    if let Some(is_active) = payload.active {
        active.active = Set(is_active);
    }

    let table = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "table_update",
        Some("dining_tables"),
        Some(serde_json::json!({ "table_id": table.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        table_from_entity(table, false),
        Some(Meta::empty()),
    ))
}

pub async fn delete_table(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = DiningTables::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "table_delete",
        Some("dining_tables"),
        Some(serde_json::json!({ "table_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn table_from_entity(model: TableModel, occupied: bool) -> DiningTable {
    let status = if !model.active {
        "inactive"
    } else if occupied {
        "reserved"
    } else {
        "available"
    };
    DiningTable {
        id: model.id,
        number: model.number,
        capacity: model.capacity,
        active: model.active,
        status: status.to_string(),
        created_at: model.created_at.with_timezone(&Utc),
    }
}
