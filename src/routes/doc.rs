use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        menu::{CreateMenuItemRequest, MenuItemList, UpdateMenuItemRequest},
        orders::{
            CreateOrderRequest, OrderItemInput, OrderList, OrderWithItems,
            UpdateDeliveryStatusRequest, UpdateKitchenStatusRequest, UpdateOrderRequest,
            UpdateOrderStatusRequest,
        },
        reservations::{
            AvailableTableList, CreateReservationRequest, ReservationList,
            SetReservationStatusRequest, UpdateReservationRequest,
        },
        tables::{CreateTableRequest, TableList, UpdateTableRequest},
    },
    models::{DiningTable, MenuItem, Order, OrderItem, Reservation},
    response::{ApiResponse, Meta},
    routes::{admin, health, menu, orders, params, reservations, tables},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        menu::list_menu,
        menu::get_menu_item,
        menu::create_menu_item,
        menu::update_menu_item,
        menu::delete_menu_item,
        tables::list_tables,
        tables::create_table,
        tables::update_table,
        tables::delete_table,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order,
        orders::delete_order,
        orders::update_order_status,
        orders::update_kitchen_status,
        orders::update_delivery_status,
        reservations::create_reservation,
        reservations::list_reservations,
        reservations::available_tables,
        reservations::get_reservation,
        reservations::update_reservation,
        reservations::cancel_reservation,
        reservations::set_reservation_status,
        admin::list_all_orders,
        admin::get_order_admin
    ),
    components(
        schemas(
            MenuItem,
            DiningTable,
            Order,
            OrderItem,
            Reservation,
            CreateMenuItemRequest,
            UpdateMenuItemRequest,
            MenuItemList,
            CreateTableRequest,
            UpdateTableRequest,
            TableList,
            CreateOrderRequest,
            OrderItemInput,
            UpdateOrderRequest,
            UpdateOrderStatusRequest,
            UpdateKitchenStatusRequest,
            UpdateDeliveryStatusRequest,
            OrderList,
            OrderWithItems,
            CreateReservationRequest,
            UpdateReservationRequest,
            SetReservationStatusRequest,
            ReservationList,
            AvailableTableList,
            params::Pagination,
            params::MenuQuery,
            params::OrderListQuery,
            params::ReservationListQuery,
            Meta,
            ApiResponse<MenuItem>,
            ApiResponse<MenuItemList>,
            ApiResponse<DiningTable>,
            ApiResponse<TableList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Order>,
            ApiResponse<Reservation>,
            ApiResponse<ReservationList>,
            ApiResponse<AvailableTableList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Menu", description = "Menu catalog endpoints"),
        (name = "Tables", description = "Dining table endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Reservations", description = "Reservation endpoints"),
        (name = "Admin", description = "Staff and admin listing endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
