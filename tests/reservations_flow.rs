use axum_restaurant_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::reservations::{
        AvailableTablesQuery, CreateReservationRequest, SetReservationStatusRequest,
        UpdateReservationRequest,
    },
    entity::dining_tables::{ActiveModel as TableActive, Model as TableModel},
    entity::users::ActiveModel as UserActive,
    error::AppError,
    middleware::auth::AuthUser,
    services::reservation_service,
    state::AppState,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: the 120-minute collision rule across create/update,
// idempotent cancellation, and the available-tables sweep.
#[tokio::test]
async fn reservation_conflict_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let customer_id = create_user(&state, "customer", "guest@example.com").await?;
    let staff_id = create_user(&state, "staff", "host@example.com").await?;
    let customer = AuthUser {
        user_id: customer_id,
        role: "customer".into(),
    };
    let staff = AuthUser {
        user_id: staff_id,
        role: "staff".into(),
    };

    let table4 = create_table(&state, 4, 4, true).await?;
    let table5 = create_table(&state, 5, 2, true).await?;
    let closed = create_table(&state, 6, 6, false).await?;

    // Whole-second base keeps the strict window boundary exact through the
    // store's microsecond timestamps.
    let base = whole_second_future(Duration::days(1));

    let first = reservation_service::create_reservation(
        &state,
        &customer,
        CreateReservationRequest {
            table_id: table4.id,
            reserved_at: base,
            customer_id: None,
            special_requests: Some("window seat".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(first.status, "pending");
    assert_eq!(first.customer_id, Some(customer_id));

    // 90 minutes away collides, in both directions.
    for offset in [Duration::minutes(90), Duration::minutes(-90)] {
        let err = reservation_service::create_reservation(
            &state,
            &staff,
            CreateReservationRequest {
                table_id: table4.id,
                reserved_at: base + offset,
                customer_id: None,
                special_requests: None,
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Conflict(message) => {
                assert!(message.contains("table 4"), "message was: {message}")
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    // 125 minutes away is fine.
    let second = reservation_service::create_reservation(
        &state,
        &staff,
        CreateReservationRequest {
            table_id: table4.id,
            reserved_at: base + Duration::minutes(125),
            customer_id: None,
            special_requests: None,
        },
    )
    .await?
    .data
    .unwrap();

    // Exactly 120 minutes apart is available: the comparison is strict.
    reservation_service::create_reservation(
        &state,
        &staff,
        CreateReservationRequest {
            table_id: table5.id,
            reserved_at: base,
            customer_id: None,
            special_requests: None,
        },
    )
    .await?;
    reservation_service::create_reservation(
        &state,
        &staff,
        CreateReservationRequest {
            table_id: table5.id,
            reserved_at: base + Duration::minutes(120),
            customer_id: None,
            special_requests: None,
        },
    )
    .await?;

    // Inactive and unknown tables are rejected before the conflict check.
    let err = reservation_service::create_reservation(
        &state,
        &customer,
        CreateReservationRequest {
            table_id: closed.id,
            reserved_at: base + Duration::days(2),
            customer_id: None,
            special_requests: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let ghost = Uuid::new_v4();
    let err = reservation_service::create_reservation(
        &state,
        &customer,
        CreateReservationRequest {
            table_id: ghost,
            reserved_at: base + Duration::days(2),
            customer_id: None,
            special_requests: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidReference { .. }));

    // Past times are rejected outright.
    let err = reservation_service::create_reservation(
        &state,
        &customer,
        CreateReservationRequest {
            table_id: table4.id,
            reserved_at: Utc::now() - Duration::hours(1),
            customer_id: None,
            special_requests: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // A patch with no fields is rejected; a notes-only patch skips the
    // availability check entirely.
    let err = reservation_service::update_reservation(
        &state,
        &customer,
        first.id,
        UpdateReservationRequest {
            table_id: None,
            reserved_at: None,
            special_requests: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NoOp));

    let renamed = reservation_service::update_reservation(
        &state,
        &customer,
        first.id,
        UpdateReservationRequest {
            table_id: None,
            reserved_at: None,
            special_requests: Some("booth, please".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(renamed.special_requests.as_deref(), Some("booth, please"));
    assert_eq!(renamed.reserved_at, base);

    // Moving in time re-runs the check against the *other* reservation on
    // the table, excluding this one's own row.
    let err = reservation_service::update_reservation(
        &state,
        &customer,
        first.id,
        UpdateReservationRequest {
            table_id: None,
            reserved_at: Some(base + Duration::minutes(10)),
            special_requests: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let moved = reservation_service::update_reservation(
        &state,
        &customer,
        first.id,
        UpdateReservationRequest {
            table_id: None,
            reserved_at: Some(base - Duration::minutes(60)),
            special_requests: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(moved.reserved_at, base - Duration::minutes(60));

    // Cancellation is idempotent.
    let cancelled = reservation_service::cancel_reservation(&state, &staff, second.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");
    let again = reservation_service::cancel_reservation(&state, &staff, second.id)
        .await?
        .data
        .unwrap();
    assert_eq!(again.status, "cancelled");

    // A cancelled reservation no longer blocks its slot.
    reservation_service::create_reservation(
        &state,
        &staff,
        CreateReservationRequest {
            table_id: table4.id,
            reserved_at: base + Duration::minutes(125),
            customer_id: None,
            special_requests: None,
        },
    )
    .await?;

    // Status is a flat 5-state enum under administrative control.
    let confirmed = reservation_service::set_reservation_status(
        &state,
        &staff,
        first.id,
        SetReservationStatusRequest {
            status: "confirmed".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(confirmed.status, "confirmed");

    let err = reservation_service::set_reservation_status(
        &state,
        &staff,
        first.id,
        SetReservationStatusRequest {
            status: "seated".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatus(_)));

    let err = reservation_service::set_reservation_status(
        &state,
        &customer,
        first.id,
        SetReservationStatusRequest {
            status: "completed".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Available-tables applies the same rule across every active table.
    let far = reservation_service::available_tables(
        &state,
        AvailableTablesQuery {
            time: base + Duration::minutes(600),
        },
    )
    .await?
    .data
    .unwrap();
    let numbers: Vec<i32> = far.items.iter().map(|t| t.number).collect();
    assert!(numbers.contains(&4));
    assert!(numbers.contains(&5));
    assert!(!numbers.contains(&6), "inactive tables never appear");

    let near = reservation_service::available_tables(
        &state,
        AvailableTablesQuery {
            time: base - Duration::minutes(60),
        },
    )
    .await?
    .data
    .unwrap();
    let numbers: Vec<i32> = near.items.iter().map(|t| t.number).collect();
    assert!(!numbers.contains(&4), "table 4 is booked at that time");
    assert!(!numbers.contains(&5), "table 5 is booked an hour later");

    Ok(())
}

fn whole_second_future(ahead: Duration) -> DateTime<Utc> {
    let secs = (Utc::now() + ahead).timestamp();
    Utc.timestamp_opt(secs, 0).unwrap()
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, reservations, audit_logs, menu_items, dining_tables, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState { pool, orm })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test {role}")),
        email: Set(email.to_string()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_table(
    state: &AppState,
    number: i32,
    capacity: i32,
    active: bool,
) -> anyhow::Result<TableModel> {
    let table = TableActive {
        id: Set(Uuid::new_v4()),
        number: Set(number),
        capacity: Set(capacity),
        active: Set(active),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(table)
}
