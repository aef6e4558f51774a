pub mod admin_service;
pub mod menu_service;
pub mod order_service;
pub mod reservation_service;
pub mod status_service;
pub mod table_service;
