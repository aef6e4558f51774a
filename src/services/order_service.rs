use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CreateOrderRequest, OrderItemInput, OrderList, OrderWithItems, UpdateOrderRequest,
    },
    entity::order_items::{
        ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        Model as OrderItemModel,
    },
    entity::orders::{
        ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{DeliveryStatus, KitchenStatus, Order, OrderItem, OrderStatus, OrderType},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::menu_service,
    state::AppState,
};

/// One validated line item with its price snapshot.
struct PricedLine {
    menu_item_id: Uuid,
    quantity: i32,
    price: i64,
}

struct PricedItems {
    total: i64,
    lines: Vec<PricedLine>,
}

/// Resolve every referenced menu item against the catalog and compute the
/// order total from catalog prices. Client-supplied prices never exist in
/// the request shape, so they cannot be trusted by accident.
async fn price_items<C: ConnectionTrait>(
    conn: &C,
    items: &[OrderItemInput],
) -> AppResult<PricedItems> {
    if items.is_empty() {
        return Err(AppError::Validation(
            "order must contain at least one item".into(),
        ));
    }
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::Validation(
                "item quantity must be greater than 0".into(),
            ));
        }
    }

    let mut ids: Vec<Uuid> = items.iter().map(|i| i.menu_item_id).collect();
    ids.sort();
    ids.dedup();

    let resolved = menu_service::resolve_items(conn, &ids).await?;

    let missing: Vec<Uuid> = ids
        .iter()
        .filter(|id| !resolved.contains_key(*id))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(AppError::InvalidReference { missing });
    }

    let unavailable: Vec<&str> = ids
        .iter()
        .filter_map(|id| {
            let row = &resolved[id];
            (!row.available).then_some(row.name.as_str())
        })
        .collect();
    if !unavailable.is_empty() {
        return Err(AppError::Validation(format!(
            "menu items not currently available: {}",
            unavailable.join(", ")
        )));
    }

    let mut total: i64 = 0;
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let price = resolved[&item.menu_item_id].price;
        total += price * i64::from(item.quantity);
        lines.push(PricedLine {
            menu_item_id: item.menu_item_id,
            quantity: item.quantity,
            price,
        });
    }

    Ok(PricedItems { total, lines })
}

fn require_delivery_address(address: Option<&String>) -> AppResult<String> {
    match address.map(|a| a.trim()).filter(|a| !a.is_empty()) {
        Some(a) => Ok(a.to_string()),
        None => Err(AppError::Validation(
            "delivery orders require a delivery address".into(),
        )),
    }
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order_type = OrderType::parse(&payload.order_type)?;

    let delivery_address = match order_type {
        OrderType::Delivery => Some(require_delivery_address(payload.delivery_address.as_ref())?),
        _ => None,
    };

    let customer_id = if user.role == "customer" {
        Some(user.user_id)
    } else {
        payload.customer_id
    };

    let txn = state.orm.begin().await?;

    let priced = price_items(&txn, &payload.items).await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        order_type: Set(order_type.as_str().into()),
        status: Set(OrderStatus::Pending.as_str().into()),
        kitchen_status: Set(KitchenStatus::Pending.as_str().into()),
        delivery_status: Set(DeliveryStatus::None.as_str().into()),
        total_amount: Set(priced.total),
        delivery_address: Set(delivery_address),
        assigned_staff_id: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(priced.lines.len());
    for line in &priced.lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            menu_item_id: Set(line.menu_item_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": order.total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_staff(user, existing.customer_id)?;

    if payload.order_type.is_none()
        && payload.delivery_address.is_none()
        && payload.items.is_none()
    {
        return Err(AppError::NoOp);
    }

    let order_type = match payload.order_type.as_deref() {
        Some(raw) => OrderType::parse(raw)?,
        None => OrderType::parse(&existing.order_type)?,
    };

    // The address rule is re-checked against the effective type: a patch
    // may change either side of it.
    let effective_address = payload
        .delivery_address
        .clone()
        .or_else(|| existing.delivery_address.clone());
    let delivery_address = match order_type {
        OrderType::Delivery => Some(require_delivery_address(effective_address.as_ref())?),
        _ => None,
    };

    // Items are replaced wholesale: delete-all, insert-all, total recomputed
    // from catalog prices inside this same transaction.
    let mut new_total = existing.total_amount;
    let replaced = match payload.items.as_deref() {
        Some(items) => {
            let priced = price_items(&txn, items).await?;
            OrderItems::delete_many()
                .filter(OrderItemCol::OrderId.eq(existing.id))
                .exec(&txn)
                .await?;

            let mut rows = Vec::with_capacity(priced.lines.len());
            for line in &priced.lines {
                let item = OrderItemActive {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(existing.id),
                    menu_item_id: Set(line.menu_item_id),
                    quantity: Set(line.quantity),
                    price: Set(line.price),
                    created_at: NotSet,
                }
                .insert(&txn)
                .await?;
                rows.push(item);
            }
            new_total = priced.total;
            Some(rows)
        }
        None => None,
    };

    let order_id = existing.id;
    let mut active: OrderActive = existing.into();
    active.order_type = Set(order_type.as_str().into());
    active.delivery_address = Set(delivery_address);
    active.total_amount = Set(new_total);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    let items = match replaced {
        Some(rows) => rows,
        None => {
            OrderItems::find()
                .filter(OrderItemCol::OrderId.eq(order_id))
                .all(&txn)
                .await?
        }
    };

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": order.total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        OrderWithItems {
            order: order_from_entity(order),
            items: items.into_iter().map(order_item_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(id))
        .exec(&txn)
        .await?;

    let result = Orders::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        // Dropping the transaction restores any deleted item rows.
        return Err(AppError::NotFound);
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
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

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_staff(user, order.customer_id)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::CustomerId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }
    if let Some(order_type) = query.order_type.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::OrderType.eq(order_type.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

fn ensure_owner_or_staff(user: &AuthUser, customer_id: Option<Uuid>) -> AppResult<()> {
    if user.role == "customer" && customer_id != Some(user.user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        customer_id: model.customer_id,
        order_type: model.order_type,
        status: model.status,
        kitchen_status: model.kitchen_status,
        delivery_status: model.delivery_status,
        total_amount: model.total_amount,
        delivery_address: model.delivery_address,
        assigned_staff_id: model.assigned_staff_id,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        menu_item_id: model.menu_item_id,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
