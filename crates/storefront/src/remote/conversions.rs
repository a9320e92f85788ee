//! Conversions between domain records and remote documents.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};
use smartshop_core::{Invoice, Product, ProductDraft};

use super::{Fields, RemoteDocument};

/// Document fields for a full product record (the ID is the document name).
#[must_use]
pub fn product_fields(product: &Product) -> Fields {
    let mut fields = to_fields(product);
    fields.remove("id");
    fields
}

/// Fields carried by a draft. Absent optional fields are left out so an
/// update only touches what the clerk edited.
#[must_use]
pub fn draft_fields(draft: &ProductDraft) -> Fields {
    let mut fields = Fields::new();
    fields.insert("name".to_string(), Value::String(draft.name.trim().to_string()));
    if let Some(price) = draft.price {
        fields.insert("price".to_string(), decimal_value(price));
    }
    if let Some(category) = draft.category.as_ref().filter(|c| !c.trim().is_empty()) {
        fields.insert("category".to_string(), Value::String(category.clone()));
    }
    if let Some(stock) = draft.stock {
        fields.insert("stock".to_string(), Value::from(stock));
    }
    if let Some(unit) = draft.unit.as_ref().filter(|u| !u.trim().is_empty()) {
        fields.insert("unit".to_string(), Value::String(unit.clone()));
    }
    fields
}

/// Document fields for an invoice. The receipt number is kept in the body
/// as well as being the document name.
#[must_use]
pub fn invoice_fields(invoice: &Invoice) -> Fields {
    to_fields(invoice)
}

/// Fields for a stock-only update.
#[must_use]
pub fn stock_fields(stock: u32) -> Fields {
    let mut fields = Fields::new();
    fields.insert("stock".to_string(), Value::from(stock));
    fields
}

/// Decode product documents. The document name is always the product ID.
#[must_use]
pub fn decode_products(documents: Vec<RemoteDocument>) -> Vec<Product> {
    decode(documents, true)
}

/// Decode invoice documents. An `id` stored in the body wins over the
/// document name.
#[must_use]
pub fn decode_invoices(documents: Vec<RemoteDocument>) -> Vec<Invoice> {
    decode(documents, false)
}

fn decode<T: DeserializeOwned>(documents: Vec<RemoteDocument>, name_is_id: bool) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|doc| {
            let mut fields = doc.fields;
            if name_is_id {
                fields.insert("id".to_string(), Value::String(doc.id.clone()));
            } else {
                fields
                    .entry("id")
                    .or_insert_with(|| Value::String(doc.id.clone()));
            }
            match serde_json::from_value(Value::Object(fields)) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(document = %doc.id, error = %e, "skipping malformed document");
                    None
                }
            }
        })
        .collect()
}

/// JSON number for a decimal, integral when the value has no fraction.
#[must_use]
pub fn decimal_value(amount: Decimal) -> Value {
    if amount.fract().is_zero()
        && let Some(whole) = amount.to_i64()
    {
        return Value::from(whole);
    }
    amount
        .to_f64()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

fn to_fields<T: Serialize>(record: &T) -> Fields {
    match serde_json::to_value(record).map(integral_numbers) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) | Err(_) => Fields::new(),
    }
}

/// Turn floats with no fractional part (how decimals serialize) into
/// integers, so whole-đồng amounts are stored as integers.
fn integral_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            #[allow(clippy::cast_possible_truncation)] // bounded by the range check
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(integral_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, integral_numbers(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use smartshop_core::{CartItem, PaymentMethod, ProductId};

    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new("3"),
            name: "Mì Hảo Hảo Tôm Chua Cay".to_string(),
            price: Decimal::from(4_500),
            category: "Thực phẩm khô".to_string(),
            stock: 200,
            unit: "gói".to_string(),
        }
    }

    fn doc(id: &str, value: Value) -> RemoteDocument {
        let Value::Object(fields) = value else {
            panic!("expected object");
        };
        RemoteDocument {
            id: id.to_string(),
            fields,
        }
    }

    #[test]
    fn test_product_fields_drop_id_and_use_integers() {
        let fields = product_fields(&product());
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["price"], json!(4500));
        assert_eq!(fields["stock"], json!(200));
    }

    #[test]
    fn test_draft_fields_only_carry_edits() {
        let draft = ProductDraft {
            id: Some(ProductId::new("3")),
            name: "Mì Omachi".to_string(),
            price: Some(Decimal::new(55_005, 1)),
            ..ProductDraft::default()
        };
        let fields = draft_fields(&draft);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["name"], json!("Mì Omachi"));
        assert_eq!(fields["price"], json!(5500.5));
    }

    #[test]
    fn test_decode_products_uses_document_name() {
        let products = decode_products(vec![doc(
            "abc",
            json!({"id": "stale", "name": "Gạo ST25 (5kg)", "price": 180000, "category": "Lương thực", "stock": 20, "unit": "túi"}),
        )]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id.as_str(), "abc");
    }

    #[test]
    fn test_decode_skips_malformed_documents() {
        let products = decode_products(vec![
            doc("1", json!({"name": "no price"})),
            doc("2", json!({"name": "Sữa", "price": 30000, "category": "Sữa", "stock": 60, "unit": "hộp"})),
        ]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id.as_str(), "2");
    }

    #[test]
    fn test_invoice_fields_decode_back() {
        let invoice = Invoice::commit(
            vec![CartItem::new(product(), 3)],
            PaymentMethod::Cash,
            Utc::now(),
        )
        .unwrap();
        let fields = invoice_fields(&invoice);
        assert_eq!(fields["total"], json!(13500));
        assert_eq!(fields["items"][0]["price"], json!(4500));

        let decoded = decode_invoices(vec![RemoteDocument {
            id: "remote-name".to_string(),
            fields,
        }]);
        assert_eq!(decoded, vec![invoice]);
    }
}
