//! Default catalog used when nothing has been cached yet.

use rust_decimal::Decimal;
use smartshop_core::{Product, ProductId};

const SEED: &[(&str, &str, i64, &str, u32, &str)] = &[
    ("1", "Nước Ngọt Coca Cola", 10_000, "Đồ uống", 100, "lon"),
    ("2", "Bánh Snack Khoai Tây", 15_000, "Đồ ăn vặt", 50, "gói"),
    ("3", "Mì Hảo Hảo Tôm Chua Cay", 4_500, "Thực phẩm khô", 200, "gói"),
    ("4", "Dầu Ăn Tường An 1L", 45_000, "Gia vị", 30, "chai"),
    ("5", "Gạo ST25 (5kg)", 180_000, "Lương thực", 20, "túi"),
    ("6", "Nước Mắm Nam Ngư", 32_000, "Gia vị", 40, "chai"),
    ("7", "Sữa Tươi Vinamilk 1L", 30_000, "Sữa", 60, "hộp"),
    ("8", "Bột Giặt Omo 3kg", 125_000, "Hóa phẩm", 15, "túi"),
];

/// The eight-product starter catalog.
#[must_use]
pub fn seed_products() -> Vec<Product> {
    SEED.iter()
        .map(|&(id, name, price, category, stock, unit)| Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Decimal::from(price),
            category: category.to_string(),
            stock,
            unit: unit.to_string(),
        })
        .collect()
}
