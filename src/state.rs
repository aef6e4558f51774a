use crate::db::{DbPool, OrmConn};

/// Shared store handles, cloned into every handler. No process-wide
/// singleton; every service receives this explicitly.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
}
