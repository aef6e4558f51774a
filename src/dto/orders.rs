use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub menu_item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub order_type: String,
    /// Only honored for staff/admin callers; customers always order as
    /// themselves. None marks a walk-in order taken at the counter.
    pub customer_id: Option<Uuid>,
    pub items: Vec<OrderItemInput>,
    pub delivery_address: Option<String>,
}

/// Explicit patch: only fields that are present are mutated.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub order_type: Option<String>,
    pub delivery_address: Option<String>,
    pub items: Option<Vec<OrderItemInput>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateKitchenStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDeliveryStatusRequest {
    pub status: String,
    /// Courier taking the order; meaningful when moving to `assigned`.
    pub assigned_staff_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
