use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::DiningTable;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTableRequest {
    pub number: i32,
    pub capacity: i32,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTableRequest {
    pub number: Option<i32>,
    pub capacity: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TableList {
    pub items: Vec<DiningTable>,
}
