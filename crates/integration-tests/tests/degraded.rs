//! Integration tests for saves, deletes and restarts while the remote store
//! is unusable.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use smartshop_core::{PaymentMethod, ProductDraft, ProductId};
use smartshop_integration_tests::Harness;
use smartshop_storefront::remote::{Collection, Operation, RemoteError, classify};
use smartshop_storefront::{BackendHealth, DegradedReason, PosError};

fn permission_denied() -> RemoteError {
    classify(Some("permission-denied"), "Missing or insufficient permissions.")
}

#[tokio::test]
async fn test_denied_delete_keeps_product() {
    let mut h = Harness::seeded();
    h.remote.set_outage(Some(permission_denied()));
    h.controller.pump();

    let err = h
        .controller
        .delete_product(&ProductId::new("4"))
        .await
        .unwrap_err();
    assert!(matches!(err, PosError::DeleteDenied(_)));
    assert_eq!(h.stock("4"), 30);
    assert_eq!(h.remote.products().len(), 8);
}

#[tokio::test]
async fn test_offline_delete_is_local() {
    let mut h = Harness::seeded();
    h.remote
        .set_outage(Some(RemoteError::ConnectivityLoss("network down".to_string())));
    h.controller.pump();

    h.controller.delete_product(&ProductId::new("4")).await.unwrap();
    assert_eq!(h.controller.products().len(), 7);
    assert_eq!(h.remote.calls(Operation::Delete), 0);

    let restarted = h.restart_offline();
    assert!(restarted.products().iter().all(|p| p.id.as_str() != "4"));
}

#[tokio::test]
async fn test_missing_database_write_falls_back_to_cache() {
    let mut h = Harness::seeded();
    h.remote.fail_next(
        Operation::Write,
        classify(Some("not-found"), "Requested entity was not found."),
    );

    let outcome = h
        .controller
        .upsert_product(ProductDraft::new("Bánh Mì Que", Decimal::from(12_000)).with_stock(10))
        .await
        .unwrap();
    assert!(!outcome.synced);
    assert!(outcome.alert.is_none());
    assert_eq!(
        h.controller.health(),
        BackendHealth::Degraded(DegradedReason::DatabaseMissing)
    );
    assert_eq!(
        h.controller.banner().and_then(|b| b.link),
        Some("https://console.cloud.google.com/datastore/setup?project=test".to_string())
    );

    // a sale made while degraded is cached too
    h.controller.add_to_cart(&outcome.product.id, 2).unwrap();
    let receipt = h.controller.checkout(PaymentMethod::Cash).await.unwrap();
    assert_eq!(receipt.invoice.total, Decimal::from(24_000));

    // restart without a remote store
    let offline = h.restart_offline();
    let saved = offline
        .products()
        .iter()
        .find(|p| p.id == outcome.product.id)
        .unwrap();
    assert_eq!(saved.stock, 8);
    assert_eq!(offline.invoices()[0].id, receipt.invoice.id);

    // restart against a store that is still missing
    h.remote.set_outage(Some(RemoteError::DatabaseMissing(
        "The database (default) does not exist".to_string(),
    )));
    let restarted = h.restart();
    assert_eq!(
        restarted.health(),
        BackendHealth::Degraded(DegradedReason::DatabaseMissing)
    );
    assert!(restarted.products().iter().any(|p| p.id == outcome.product.id));
    assert_eq!(restarted.invoices().len(), 1);
}

#[tokio::test]
async fn test_denied_save_is_kept_locally_with_alert() {
    let mut h = Harness::seeded();
    h.remote.set_outage(Some(permission_denied()));
    h.controller.pump();

    let outcome = h
        .controller
        .upsert_product(ProductDraft::new("Trứng Gà", Decimal::from(3_500)))
        .await
        .unwrap();
    assert!(!outcome.synced);
    assert!(outcome.alert.is_some());
    assert_eq!(h.remote.calls(Operation::Write), 0);
    assert!(h.controller.products().iter().any(|p| p.name == "Trứng Gà"));
}

#[tokio::test]
async fn test_local_mode_without_remote() {
    let h = Harness::seeded();
    let mut local = h.restart_offline();
    assert_eq!(local.health(), BackendHealth::ConfigMissing);
    assert_eq!(local.banner().map(|b| b.title), Some("Local mode".to_string()));
    assert_eq!(local.products().len(), 8);
    assert!(!local.retry());

    local.delete_product(&ProductId::new("2")).await.unwrap();
    assert_eq!(h.restart_offline().products().len(), 7);
    // the remote store never heard about it
    assert_eq!(h.remote.documents(Collection::Products).len(), 8);
}
