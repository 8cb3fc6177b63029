use jewel_portal::{
    MemoryRepository,
    models::{
        Account, NewAccount, NewOrder, NewShop, NotificationKind, Order, OrderStatus,
        RequestStatus, Role, Shop,
    },
    repository::{Repository, RepositoryError, RepositoryState},
    workflow::{Entity, WorkflowEngine, WorkflowError},
};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

// --- Fixtures ---

const TIMEOUT: Duration = Duration::from_secs(2);

struct Fixture {
    memory: Arc<MemoryRepository>,
    engine: WorkflowEngine,
}

impl Fixture {
    fn new() -> Self {
        Self::with(MemoryRepository::new())
    }

    fn with(memory: MemoryRepository) -> Self {
        Self::with_timeout(memory, TIMEOUT)
    }

    fn with_timeout(memory: MemoryRepository, timeout: Duration) -> Self {
        let memory = Arc::new(memory);
        let repo: RepositoryState = memory.clone();
        Self {
            engine: WorkflowEngine::new(repo, timeout),
            memory,
        }
    }

    async fn salesman(&self, name: &str) -> Account {
        self.memory
            .create_account(NewAccount::pending(
                name.to_string(),
                None,
                Some(format!("{}@jewel.test", name.to_lowercase())),
                "hash".to_string(),
                Role::Salesman,
            ))
            .await
            .unwrap()
    }

    async fn shop_owner(&self, name: &str) -> (Account, Shop) {
        self.memory
            .register_shop_owner(
                NewAccount::pending(
                    name.to_string(),
                    Some(format!("98{:08}", name.len())),
                    None,
                    "hash".to_string(),
                    Role::Shop,
                ),
                NewShop {
                    name: format!("{name} Jewellers"),
                    address: "12 Zaveri Bazaar".to_string(),
                    tax_id: None,
                },
            )
            .await
            .unwrap()
    }

    async fn order(&self, code: &str, salesman_id: Uuid) -> Order {
        self.memory
            .create_order(NewOrder {
                code: code.to_string(),
                product_name: "Kundan necklace".to_string(),
                design_notes: None,
                quantity: 1,
                shop_id: None,
                salesman_id,
            })
            .await
            .unwrap()
    }

    async fn account(&self, id: Uuid) -> Account {
        self.memory.get_account(id).await.unwrap().unwrap()
    }

    async fn shop(&self, id: Uuid) -> Shop {
        self.memory.get_shop(id).await.unwrap().unwrap()
    }
}

// --- Account Approval ---

#[tokio::test]
async fn test_approving_a_salesman_verifies_and_notifies() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;

    let approved = fx.engine.decide_account(salesman.id, "approved").await.unwrap();

    assert_eq!(approved.request_status, RequestStatus::Approved);
    assert!(approved.is_verified);
    let inbox = fx.memory.list_notifications(salesman.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::AccountApproved);
}

#[tokio::test]
async fn test_reapplying_a_decision_is_a_silent_no_op() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;

    fx.engine.decide_account(salesman.id, "approved").await.unwrap();
    let again = fx.engine.decide_account(salesman.id, "approved").await.unwrap();

    assert_eq!(again.request_status, RequestStatus::Approved);
    assert_eq!(fx.memory.notification_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_approvals_notify_once() {
    let fx = Fixture::with(MemoryRepository::with_read_rendezvous(2));
    let salesman = fx.salesman("Ravi").await;

    // Both callers read the pending account before either writes; one swap loses,
    // re-reads and finds the decision already applied.
    fx.memory.arm_read_rendezvous();
    let (first, second) = tokio::join!(
        fx.engine.decide_account(salesman.id, "approved"),
        fx.engine.decide_account(salesman.id, "approved"),
    );

    assert_eq!(first.unwrap().request_status, RequestStatus::Approved);
    assert_eq!(second.unwrap().request_status, RequestStatus::Approved);
    assert_eq!(fx.memory.notification_count().await, 1);
}

#[tokio::test]
async fn test_rejection_can_be_reversed_but_never_returns_to_pending() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;

    let rejected = fx.engine.decide_account(salesman.id, "rejected").await.unwrap();
    assert_eq!(rejected.request_status, RequestStatus::Rejected);
    assert!(!rejected.is_verified);

    let approved = fx.engine.decide_account(salesman.id, "approved").await.unwrap();
    assert!(approved.is_verified);

    let pending = fx.engine.decide_account(salesman.id, "pending").await;
    assert!(matches!(pending, Err(WorkflowError::InvalidStatus(s)) if s == "pending"));
    assert!(fx.account(salesman.id).await.is_verified);
}

#[tokio::test]
async fn test_unknown_decision_changes_nothing() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;

    let result = fx.engine.decide_account(salesman.id, "maybe").await;

    assert!(matches!(result, Err(WorkflowError::InvalidStatus(_))));
    assert_eq!(fx.account(salesman.id).await.request_status, RequestStatus::Pending);
    assert_eq!(fx.memory.notification_count().await, 0);
}

#[tokio::test]
async fn test_admin_accounts_are_not_approvable() {
    let fx = Fixture::new();
    let admin = fx
        .memory
        .create_account(NewAccount {
            name: "Root".to_string(),
            mobile: None,
            email: Some("root@jewel.test".to_string()),
            password_hash: "hash".to_string(),
            role: Role::Admin,
            request_status: RequestStatus::Approved,
            is_verified: true,
        })
        .await
        .unwrap();

    let result = fx.engine.decide_account(admin.id, "rejected").await;

    assert!(matches!(result, Err(WorkflowError::NotApprovable(Role::Admin))));
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let fx = Fixture::new();

    let result = fx.engine.decide_account(Uuid::new_v4(), "approved").await;

    assert!(matches!(result, Err(WorkflowError::NotFound(Entity::Account))));
}

#[tokio::test]
async fn test_approving_a_shop_owner_verifies_the_shop_too() {
    let fx = Fixture::new();
    let (owner, shop) = fx.shop_owner("Meena").await;

    fx.engine.decide_account(owner.id, "approved").await.unwrap();

    assert!(fx.account(owner.id).await.is_verified);
    assert!(fx.shop(shop.id).await.is_verified);
}

// --- Shop Verification ---

#[tokio::test]
async fn test_shop_approval_moves_shop_and_owner_together() {
    let fx = Fixture::new();
    let (owner, shop) = fx.shop_owner("Meena").await;

    let verified = fx.engine.verify_shop(shop.id, "approve").await.unwrap();

    assert!(verified.is_verified);
    let owner = fx.account(owner.id).await;
    assert_eq!(owner.request_status, RequestStatus::Approved);
    assert!(owner.is_verified);

    let inbox = fx.memory.list_notifications(owner.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::ShopVerified);
}

#[tokio::test]
async fn test_shop_rejection_leaves_both_unverified() {
    let fx = Fixture::new();
    let (owner, shop) = fx.shop_owner("Meena").await;
    fx.engine.verify_shop(shop.id, "approve").await.unwrap();

    let rejected = fx.engine.verify_shop(shop.id, "reject").await.unwrap();

    assert!(!rejected.is_verified);
    let owner = fx.account(owner.id).await;
    assert_eq!(owner.request_status, RequestStatus::Rejected);
    assert!(!owner.is_verified);
}

#[tokio::test]
async fn test_concurrent_shop_approvals_notify_once() {
    let fx = Fixture::with(MemoryRepository::with_read_rendezvous(2));
    let (owner, shop) = fx.shop_owner("Meena").await;

    fx.memory.arm_read_rendezvous();
    let (first, second) = tokio::join!(
        fx.engine.verify_shop(shop.id, "approve"),
        fx.engine.verify_shop(shop.id, "approve"),
    );

    assert!(first.unwrap().is_verified);
    assert!(second.unwrap().is_verified);
    assert_eq!(fx.account(owner.id).await.request_status, RequestStatus::Approved);
    let inbox = fx.memory.list_notifications(owner.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
}

#[tokio::test]
async fn test_shop_verification_repairs_a_diverged_pair() {
    let fx = Fixture::new();
    let (owner, shop) = fx.shop_owner("Meena").await;
    // Owner approved out of band while the shop flag stayed false.
    fx.memory
        .put_account(Account {
            request_status: RequestStatus::Approved,
            is_verified: true,
            ..owner.clone()
        })
        .await;

    let verified = fx.engine.verify_shop(shop.id, "approve").await.unwrap();

    assert!(verified.is_verified);
    assert!(fx.account(owner.id).await.is_verified);
    // Owner status did not change, so nobody is told again.
    assert_eq!(fx.memory.notification_count().await, 0);
}

#[tokio::test]
async fn test_shop_with_missing_owner_is_refused() {
    let fx = Fixture::new();
    let (_, shop) = fx.shop_owner("Meena").await;
    fx.memory
        .put_shop(Shop {
            owner_id: Uuid::new_v4(),
            ..shop.clone()
        })
        .await;

    let result = fx.engine.verify_shop(shop.id, "approve").await;

    assert!(matches!(result, Err(WorkflowError::NotFound(Entity::ShopOwner))));
    assert!(!fx.shop(shop.id).await.is_verified);
}

#[tokio::test]
async fn test_shop_owned_by_a_salesman_is_refused() {
    let fx = Fixture::new();
    let (_, shop) = fx.shop_owner("Meena").await;
    let salesman = fx.salesman("Ravi").await;
    fx.memory
        .put_shop(Shop {
            owner_id: salesman.id,
            ..shop.clone()
        })
        .await;

    let result = fx.engine.verify_shop(shop.id, "approve").await;

    assert!(matches!(result, Err(WorkflowError::NotFound(Entity::ShopOwner))));
    assert_eq!(fx.account(salesman.id).await.request_status, RequestStatus::Pending);
}

#[tokio::test]
async fn test_unknown_shop_action_is_invalid() {
    let fx = Fixture::new();
    let (_, shop) = fx.shop_owner("Meena").await;

    let result = fx.engine.verify_shop(shop.id, "approved").await;

    assert!(matches!(result, Err(WorkflowError::InvalidAction(_))));
}

// --- Order Pipeline ---

#[tokio::test]
async fn test_order_walks_the_full_pipeline() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;
    let order = fx.order("ORD-2024-0001", salesman.id).await;

    for stage in &OrderStatus::PIPELINE[1..] {
        let moved = fx
            .engine
            .advance_order(order.id, stage.as_str())
            .await
            .unwrap();
        assert_eq!(moved.status, *stage);
    }

    let inbox = fx.memory.list_notifications(salesman.id).await.unwrap();
    assert_eq!(inbox.len(), OrderStatus::PIPELINE.len() - 1);
    assert!(inbox.iter().all(|n| n.order_id == Some(order.id)));
    assert_eq!(
        inbox[0].message,
        "Order ORD-2024-0001 moved from finished to dispatched."
    );
}

#[tokio::test]
async fn test_skipping_a_stage_is_illegal() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;
    let order = fx.order("ORD-2024-0002", salesman.id).await;

    let result = fx.engine.advance_order(order.id, "cad_completed").await;

    assert!(matches!(
        result,
        Err(WorkflowError::IllegalTransition {
            from: OrderStatus::Confirmed,
            to: OrderStatus::CadCompleted
        })
    ));
    assert_eq!(fx.memory.notification_count().await, 0);
}

#[tokio::test]
async fn test_accepted_order_can_be_cancelled_then_nothing_more() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;
    let order = fx.order("ORD-2024-0003", salesman.id).await;

    fx.engine
        .advance_order(order.id, "order_view_and_accepted")
        .await
        .unwrap();
    let cancelled = fx.engine.advance_order(order.id, "cancelled").await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let revived = fx.engine.advance_order(order.id, "cad_completed").await;
    assert!(matches!(revived, Err(WorkflowError::IllegalTransition { .. })));
}

#[tokio::test]
async fn test_dispatched_orders_cannot_be_cancelled() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;
    let order = fx.order("ORD-2024-0004", salesman.id).await;
    for stage in &OrderStatus::PIPELINE[1..] {
        fx.engine.advance_order(order.id, stage.as_str()).await.unwrap();
    }

    let result = fx.engine.advance_order(order.id, "cancelled").await;

    assert!(matches!(
        result,
        Err(WorkflowError::IllegalTransition {
            from: OrderStatus::Dispatched,
            ..
        })
    ));
}

#[tokio::test]
async fn test_unknown_order_status_is_invalid() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;
    let order = fx.order("ORD-2024-0005", salesman.id).await;

    let result = fx.engine.advance_order(order.id, "shipped").await;

    assert!(matches!(result, Err(WorkflowError::InvalidStatus(_))));
}

#[tokio::test]
async fn test_concurrent_advances_apply_once() {
    let fx = Fixture::with(MemoryRepository::with_read_rendezvous(2));
    let salesman = fx.salesman("Ravi").await;
    let order = fx.order("ORD-2024-0006", salesman.id).await;

    fx.memory.arm_read_rendezvous();
    let (first, second) = tokio::join!(
        fx.engine.advance_order(order.id, "order_view_and_accepted"),
        fx.engine.advance_order(order.id, "order_view_and_accepted"),
    );

    // The loser re-reads, finds the order already accepted and is refused.
    let (winner, loser) = if first.is_ok() { (first, second) } else { (second, first) };
    assert_eq!(winner.unwrap().status, OrderStatus::OrderViewAndAccepted);
    assert!(matches!(
        loser,
        Err(WorkflowError::IllegalTransition {
            from: OrderStatus::OrderViewAndAccepted,
            to: OrderStatus::OrderViewAndAccepted,
        })
    ));
    assert_eq!(fx.memory.notification_count().await, 1);
}

#[tokio::test]
async fn test_slow_store_times_out_without_committing() {
    let fx = Fixture::with_timeout(
        MemoryRepository::with_slow_transitions(Duration::from_millis(500)),
        Duration::from_millis(50),
    );
    let salesman = fx.salesman("Ravi").await;
    let order = fx.order("ORD-2024-0008", salesman.id).await;

    let approval = fx.engine.decide_account(salesman.id, "approved").await;
    let advance = fx
        .engine
        .advance_order(order.id, "order_view_and_accepted")
        .await;

    assert!(matches!(
        approval,
        Err(WorkflowError::Store(RepositoryError::Timeout(limit))) if limit == Duration::from_millis(50)
    ));
    assert!(matches!(
        advance,
        Err(WorkflowError::Store(RepositoryError::Timeout(_)))
    ));
    let account = fx.account(salesman.id).await;
    assert_eq!(account.request_status, RequestStatus::Pending);
    assert!(!account.is_verified);
    let stored = fx.memory.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Confirmed);
    assert_eq!(fx.memory.notification_count().await, 0);
}

// --- Side Effects ---

#[tokio::test]
async fn test_notification_failure_does_not_undo_the_transition() {
    let fx = Fixture::with(MemoryRepository::with_failing_notifications());
    let salesman = fx.salesman("Ravi").await;
    let order = fx.order("ORD-2024-0007", salesman.id).await;

    let approved = fx.engine.decide_account(salesman.id, "approved").await;
    let moved = fx
        .engine
        .advance_order(order.id, "order_view_and_accepted")
        .await;

    assert!(approved.is_ok());
    assert_eq!(moved.unwrap().status, OrderStatus::OrderViewAndAccepted);
    assert!(fx.account(salesman.id).await.is_verified);
    assert_eq!(fx.memory.notification_count().await, 0);
}

// --- Blocking ---

#[tokio::test]
async fn test_only_salesmen_can_be_blocked() {
    let fx = Fixture::new();
    let salesman = fx.salesman("Ravi").await;
    let (owner, _) = fx.shop_owner("Meena").await;

    let blocked = fx.engine.set_salesman_blocked(salesman.id, true).await.unwrap();
    assert!(blocked.is_blocked);

    let result = fx.engine.set_salesman_blocked(owner.id, true).await;
    assert!(matches!(result, Err(WorkflowError::NotBlockable(Role::Shop))));
}
