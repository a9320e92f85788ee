//! Integration tests for checkout on the remote and local commit paths.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use smartshop_core::{PaymentMethod, ProductId};
use smartshop_integration_tests::Harness;
use smartshop_storefront::remote::{Operation, RemoteError};
use smartshop_storefront::{BackendHealth, CommitPath, DegradedReason};

fn fill_cart(h: &mut Harness) {
    h.controller.add_to_cart(&ProductId::new("1"), 2).unwrap();
    h.controller.add_to_cart(&ProductId::new("3"), 3).unwrap();
}

#[tokio::test]
async fn test_remote_checkout_updates_both_sides() {
    let mut h = Harness::seeded();
    fill_cart(&mut h);
    assert_eq!(h.controller.begin_checkout().unwrap(), Decimal::from(33_500));

    let receipt = h.controller.checkout(PaymentMethod::Cash).await.unwrap();
    assert_eq!(receipt.path, CommitPath::Remote);
    assert_eq!(receipt.invoice.total, Decimal::from(33_500));
    assert!(receipt.alert.is_none());
    assert!(h.controller.state().cart.is_empty());

    // the batch landed as a whole
    assert_eq!(h.remote.invoices().len(), 1);
    assert_eq!(h.remote_stock("1"), 98);
    assert_eq!(h.remote_stock("3"), 197);

    h.controller.pump();
    assert_eq!(h.stock("1"), 98);
    assert_eq!(h.stock("3"), 197);
    assert_eq!(h.controller.invoices().len(), 1);
    assert_eq!(h.controller.invoices()[0].id, receipt.invoice.id);

    let spoken = h.announcer.last().unwrap();
    assert!(spoken.contains(receipt.invoice.id.as_str()));
    assert!(spoken.contains("33500"));
}

#[tokio::test]
async fn test_failed_batch_replays_locally() {
    let mut h = Harness::seeded();
    h.remote.fail_next(
        Operation::BatchCommit,
        RemoteError::ConnectivityLoss("deadline exceeded".to_string()),
    );
    fill_cart(&mut h);

    let receipt = h.controller.checkout(PaymentMethod::Debt).await.unwrap();
    assert_eq!(receipt.path, CommitPath::Local);
    assert!(receipt.alert.is_some());
    assert_eq!(
        h.controller.health(),
        BackendHealth::Degraded(DegradedReason::ConnectivityLoss)
    );

    // nothing half-applied remotely
    assert!(h.remote.invoices().is_empty());
    assert_eq!(h.remote_stock("1"), 100);
    assert_eq!(h.remote_stock("3"), 200);

    // the same plan applied on this device
    assert_eq!(h.stock("1"), 98);
    assert_eq!(h.stock("3"), 197);
    assert_eq!(h.controller.invoices()[0].id, receipt.invoice.id);

    // and it survives a restart without a remote store
    let restarted = h.restart_offline();
    assert_eq!(restarted.invoices()[0].id, receipt.invoice.id);
    assert_eq!(restarted.invoices()[0].total, Decimal::from(33_500));
    let coke = restarted
        .products()
        .iter()
        .find(|p| p.id.as_str() == "1")
        .unwrap();
    assert_eq!(coke.stock, 98);
}

#[tokio::test]
async fn test_overselling_floors_stock_at_zero() {
    let mut h = Harness::seeded();
    h.controller.add_to_cart(&ProductId::new("8"), 20).unwrap();
    let receipt = h.controller.checkout(PaymentMethod::Transfer).await.unwrap();

    assert_eq!(receipt.invoice.total, Decimal::from(2_500_000));
    assert_eq!(h.remote_stock("8"), 0);
    // no bank account configured
    assert!(receipt.transfer_qr.is_none());
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let mut h = Harness::seeded();
    assert!(h.controller.begin_checkout().is_err());
    assert!(h.controller.checkout(PaymentMethod::Cash).await.is_err());
    assert!(h.remote.invoices().is_empty());
}

#[tokio::test]
async fn test_close_announces_success_once() {
    let mut h = Harness::seeded();
    fill_cart(&mut h);
    let receipt = h.controller.checkout(PaymentMethod::Cash).await.unwrap();

    assert!(h.controller.close_invoice());
    assert_eq!(h.announcer.last().as_deref(), Some("Thanh toán thành công"));

    // reopening a past invoice is not a fresh checkout
    h.controller.view_invoice(&receipt.invoice.id).unwrap();
    assert!(!h.controller.close_invoice());
    assert_eq!(h.announcer.spoken().len(), 2);
}
