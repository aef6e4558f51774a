use chrono::{Duration, TimeZone, Utc};

use axum_restaurant_api::error::AppError;
use axum_restaurant_api::models::{
    DeliveryStatus, KitchenStatus, OrderStatus, OrderType, ReservationStatus,
};
use axum_restaurant_api::services::reservation_service::within_conflict_window;

#[test]
fn order_status_machine_allows_forward_path() {
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::InProgress));
    assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Completed));
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
    assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Cancelled));
}

#[test]
fn order_status_machine_rejects_backward_and_terminal_moves() {
    assert!(!OrderStatus::InProgress.can_transition_to(OrderStatus::Pending));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
    assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::InProgress));
    assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
}

#[test]
fn kitchen_machine_ready_is_terminal() {
    assert!(KitchenStatus::Pending.can_transition_to(KitchenStatus::Preparing));
    assert!(KitchenStatus::Preparing.can_transition_to(KitchenStatus::Ready));
    assert!(KitchenStatus::Preparing.can_transition_to(KitchenStatus::Cancelled));
    assert!(!KitchenStatus::Ready.can_transition_to(KitchenStatus::Preparing));
    assert!(!KitchenStatus::Ready.can_transition_to(KitchenStatus::Cancelled));
    assert!(!KitchenStatus::Cancelled.can_transition_to(KitchenStatus::Pending));
}

#[test]
fn delivery_machine_follows_courier_path() {
    assert!(DeliveryStatus::None.can_transition_to(DeliveryStatus::Assigned));
    assert!(DeliveryStatus::Assigned.can_transition_to(DeliveryStatus::InTransit));
    assert!(DeliveryStatus::InTransit.can_transition_to(DeliveryStatus::Delivered));
    assert!(DeliveryStatus::Assigned.can_transition_to(DeliveryStatus::Canceled));
    assert!(DeliveryStatus::InTransit.can_transition_to(DeliveryStatus::Canceled));

    assert!(!DeliveryStatus::None.can_transition_to(DeliveryStatus::InTransit));
    assert!(!DeliveryStatus::None.can_transition_to(DeliveryStatus::Delivered));
    assert!(!DeliveryStatus::Delivered.can_transition_to(DeliveryStatus::Canceled));
    assert!(!DeliveryStatus::Canceled.can_transition_to(DeliveryStatus::Assigned));
}

#[test]
fn status_strings_round_trip() {
    for status in [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ] {
        assert_eq!(OrderStatus::parse(status.as_str()).unwrap(), status);
    }
    for status in [
        DeliveryStatus::None,
        DeliveryStatus::Assigned,
        DeliveryStatus::InTransit,
        DeliveryStatus::Delivered,
        DeliveryStatus::Canceled,
    ] {
        assert_eq!(DeliveryStatus::parse(status.as_str()).unwrap(), status);
    }
    for status in [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Completed,
        ReservationStatus::Cancelled,
        ReservationStatus::NoShow,
    ] {
        assert_eq!(ReservationStatus::parse(status.as_str()).unwrap(), status);
    }
}

#[test]
fn unknown_status_values_are_rejected() {
    assert!(matches!(
        OrderStatus::parse("shipped"),
        Err(AppError::InvalidStatus(_))
    ));
    assert!(matches!(
        DeliveryStatus::parse("cancelled"),
        Err(AppError::InvalidStatus(_))
    ));
    assert!(matches!(
        ReservationStatus::parse("seated"),
        Err(AppError::InvalidStatus(_))
    ));
    assert!(matches!(
        OrderType::parse("drive_through"),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn reservation_terminal_statuses_do_not_block_tables() {
    assert!(ReservationStatus::Cancelled.is_terminal());
    assert!(ReservationStatus::NoShow.is_terminal());
    assert!(!ReservationStatus::Pending.is_terminal());
    assert!(!ReservationStatus::Confirmed.is_terminal());
    assert!(!ReservationStatus::Completed.is_terminal());
}

#[test]
fn conflict_window_is_symmetric_and_strict() {
    let base = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap();

    // 90 minutes apart collides, in both directions.
    assert!(within_conflict_window(base, base + Duration::minutes(90)));
    assert!(within_conflict_window(base + Duration::minutes(90), base));

    // Exactly 120 minutes apart is available.
    assert!(!within_conflict_window(base, base + Duration::minutes(120)));
    assert!(!within_conflict_window(base - Duration::minutes(120), base));

    // Just inside the window still collides.
    assert!(within_conflict_window(base, base + Duration::minutes(119)));
    // Just outside does not.
    assert!(!within_conflict_window(base, base + Duration::minutes(125)));

    // Same instant collides.
    assert!(within_conflict_window(base, base));
}
