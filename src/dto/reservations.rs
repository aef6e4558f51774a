use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{DiningTable, Reservation};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    pub table_id: Uuid,
    pub reserved_at: DateTime<Utc>,
    /// Only honored for staff/admin callers; walk-in phone reservations
    /// may have no customer account.
    pub customer_id: Option<Uuid>,
    pub special_requests: Option<String>,
}

/// Explicit patch: only fields that are present are mutated. Changing the
/// table or the time re-runs the availability check.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReservationRequest {
    pub table_id: Option<Uuid>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub special_requests: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetReservationStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AvailableTablesQuery {
    /// Requested reservation time, RFC 3339.
    pub time: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationList {
    pub items: Vec<Reservation>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailableTableList {
    pub items: Vec<DiningTable>,
}
