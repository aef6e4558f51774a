use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        UpdateDeliveryStatusRequest, UpdateKitchenStatusRequest, UpdateOrderStatusRequest,
    },
    entity::orders::{ActiveModel as OrderActive, Entity as Orders, Model as OrderModel},
    entity::users::{Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_staff},
    models::{DeliveryStatus, KitchenStatus, Order, OrderStatus, OrderType},
    response::{ApiResponse, Meta},
    services::order_service::order_from_entity,
    state::AppState,
};

async fn load_for_update(
    txn: &sea_orm::DatabaseTransaction,
    id: Uuid,
) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?;
    match order {
        Some(o) => Ok(o),
        None => Err(AppError::NotFound),
    }
}

/// Overall order machine: pending -> in_progress -> completed, with
/// cancellation from either non-terminal state.
pub async fn set_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_staff(user)?;
    let next = OrderStatus::parse(&payload.status)?;

    let txn = state.orm.begin().await?;
    let existing = load_for_update(&txn, id).await?;
    let current = OrderStatus::parse(&existing.status)?;

    if current == next {
        return Ok(ApiResponse::success(
            "Order status unchanged",
            order_from_entity(existing),
            Some(Meta::empty()),
        ));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::InvalidStatus(format!(
            "order status cannot move from '{}' to '{}'",
            current.as_str(),
            next.as_str()
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    audit_status_change(state, user, order.id, "order_status_update", next.as_str()).await;

    Ok(ApiResponse::success(
        "Order status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Kitchen machine. Runs for every order type and never feeds back into
/// the overall order status; the two are allowed to diverge transiently.
pub async fn set_kitchen_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateKitchenStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_staff(user)?;
    let next = KitchenStatus::parse(&payload.status)?;

    let txn = state.orm.begin().await?;
    let existing = load_for_update(&txn, id).await?;
    let current = KitchenStatus::parse(&existing.kitchen_status)?;

    if current == next {
        return Ok(ApiResponse::success(
            "Kitchen status unchanged",
            order_from_entity(existing),
            Some(Meta::empty()),
        ));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::InvalidStatus(format!(
            "kitchen status cannot move from '{}' to '{}'",
            current.as_str(),
            next.as_str()
        )));
    }

    let mut active: OrderActive = existing.into();
    active.kitchen_status = Set(next.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    audit_status_change(state, user, order.id, "kitchen_status_update", next.as_str()).await;

    Ok(ApiResponse::success(
        "Kitchen status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Courier machine, delivery orders only. Terminal courier states cascade
/// into the overall order status within the same transaction: a delivered
/// order is completed, a canceled delivery cancels the order.
pub async fn set_delivery_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateDeliveryStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_staff(user)?;
    let next = DeliveryStatus::parse(&payload.status)?;

    let txn = state.orm.begin().await?;
    let existing = load_for_update(&txn, id).await?;

    if OrderType::parse(&existing.order_type)? != OrderType::Delivery {
        return Err(AppError::InvalidStatus(
            "delivery status only applies to delivery orders".into(),
        ));
    }

    let current = DeliveryStatus::parse(&existing.delivery_status)?;

    if current == next {
        return Ok(ApiResponse::success(
            "Delivery status unchanged",
            order_from_entity(existing),
            Some(Meta::empty()),
        ));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::InvalidStatus(format!(
            "delivery status cannot move from '{}' to '{}'",
            current.as_str(),
            next.as_str()
        )));
    }

    let assigned_staff_id = match (next, payload.assigned_staff_id) {
        (DeliveryStatus::Assigned, Some(staff_id)) => {
            let staff = Users::find_by_id(staff_id)
                .filter(UserCol::Role.is_in(["staff", "admin"]))
                .one(&txn)
                .await?;
            if staff.is_none() {
                return Err(AppError::InvalidReference {
                    missing: vec![staff_id],
                });
            }
            Some(staff_id)
        }
        _ => existing.assigned_staff_id,
    };

    let mut active: OrderActive = existing.into();
    active.delivery_status = Set(next.as_str().into());
    active.assigned_staff_id = Set(assigned_staff_id);
    match next {
        DeliveryStatus::Delivered => {
            active.status = Set(OrderStatus::Completed.as_str().into());
        }
        DeliveryStatus::Canceled => {
            active.status = Set(OrderStatus::Cancelled.as_str().into());
        }
        _ => {}
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    audit_status_change(state, user, order.id, "delivery_status_update", next.as_str()).await;

    Ok(ApiResponse::success(
        "Delivery status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

async fn audit_status_change(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    action: &str,
    status: &str,
) {
    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        action,
        Some("orders"),
        Some(serde_json::json!({ "order_id": order_id, "status": status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
}
