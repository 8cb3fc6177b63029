use chrono::Utc;
use jewel_portal::models::{
    Notification, NotificationKind, OrderStatus, RequestStatus, Role,
};
use serde_json::json;
use uuid::Uuid;

// --- Wire Names ---

#[test]
fn test_enum_wire_names() {
    assert_eq!(serde_json::to_value(Role::Salesman).unwrap(), json!("salesman"));
    assert_eq!(serde_json::to_value(RequestStatus::Pending).unwrap(), json!("pending"));
    assert_eq!(
        serde_json::to_value(OrderStatus::OrderViewAndAccepted).unwrap(),
        json!("order_view_and_accepted")
    );
    assert_eq!(
        serde_json::to_value(NotificationKind::ShopVerified).unwrap(),
        json!("shop_verified")
    );
}

#[test]
fn test_text_and_serde_names_agree() {
    for status in OrderStatus::PIPELINE
        .into_iter()
        .chain(std::iter::once(OrderStatus::Cancelled))
    {
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            json!(status.as_str()),
            "{status:?}"
        );
        assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
    }
}

#[test]
fn test_unknown_values_are_rejected() {
    let err = "shipped".parse::<OrderStatus>().unwrap_err();
    assert_eq!(err.value, "shipped");
    assert!("superuser".parse::<Role>().is_err());
    assert!(RequestStatus::try_from("Approved".to_string()).is_err());
}

#[test]
fn test_notification_kind_serializes_as_type() {
    let notification = Notification {
        id: Uuid::new_v4(),
        recipient_id: Uuid::new_v4(),
        kind: NotificationKind::OrderStatus,
        message: "Order ORD-1 moved from confirmed to order_view_and_accepted.".to_string(),
        is_read: false,
        order_id: None,
        created_at: Utc::now(),
    };

    let value = serde_json::to_value(&notification).unwrap();
    assert_eq!(value["type"], json!("order_status"));
    assert!(value.get("kind").is_none());
}

// --- Approval Invariants ---

#[test]
fn test_only_approved_means_verified() {
    assert!(RequestStatus::Approved.is_verified());
    assert!(!RequestStatus::Pending.is_verified());
    assert!(!RequestStatus::Rejected.is_verified());
    assert_eq!(RequestStatus::default(), RequestStatus::Pending);
}

#[test]
fn test_admins_skip_approval() {
    assert!(!Role::Admin.requires_approval());
    assert!(Role::Shop.requires_approval());
    assert!(Role::Salesman.requires_approval());
}

// --- Order Pipeline ---

#[test]
fn test_pipeline_moves_one_stage_at_a_time() {
    for pair in OrderStatus::PIPELINE.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        assert_eq!(from.successor(), Some(to));
        assert!(from.can_transition_to(to), "{from} -> {to}");
    }
    assert_eq!(OrderStatus::default(), OrderStatus::Confirmed);
}

#[test]
fn test_pipeline_rejects_skips_and_regressions() {
    assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::CadCompleted));
    assert!(!OrderStatus::Finished.can_transition_to(OrderStatus::ProductionFloor));
    assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Confirmed));
}

#[test]
fn test_any_open_stage_can_be_cancelled() {
    for status in OrderStatus::PIPELINE {
        assert_eq!(
            status.can_transition_to(OrderStatus::Cancelled),
            status != OrderStatus::Dispatched,
            "{status}"
        );
    }
}

#[test]
fn test_terminal_states_are_final() {
    assert!(OrderStatus::Dispatched.is_terminal());
    assert!(OrderStatus::Cancelled.is_terminal());
    assert_eq!(OrderStatus::Dispatched.successor(), None);
    assert_eq!(OrderStatus::Cancelled.successor(), None);
    assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Confirmed));
    assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
}
