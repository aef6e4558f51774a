pub mod dining_tables;
pub mod menu_items;
pub mod order_items;
pub mod orders;
pub mod reservations;
pub mod users;

pub use dining_tables::Entity as DiningTables;
pub use menu_items::Entity as MenuItems;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use reservations::Entity as Reservations;
pub use users::Entity as Users;
