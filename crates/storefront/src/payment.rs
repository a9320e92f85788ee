//! Bank transfer QR codes.

use rust_decimal::Decimal;
use url::Url;

use crate::config::BankConfig;

const VIETQR_BASE: &str = "https://img.vietqr.io/image";

/// Transfer memo shown in the customer's banking app.
pub const TRANSFER_MEMO: &str = "Thanh toan don hang";

/// VietQR image URL asking for `amount` to the configured account.
///
/// Returns `None` if the bank settings do not form a valid URL.
#[must_use]
pub fn transfer_qr_url(bank: &BankConfig, amount: Decimal) -> Option<Url> {
    let mut url = Url::parse(&format!(
        "{VIETQR_BASE}/{}-{}-{}.png",
        bank.bank_id, bank.account_no, bank.template
    ))
    .ok()?;
    url.query_pairs_mut()
        .append_pair("amount", &amount.round().normalize().to_string())
        .append_pair("addInfo", TRANSFER_MEMO)
        .append_pair("accountName", &bank.account_name);
    Some(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_url() {
        let bank = BankConfig {
            bank_id: "MB".to_string(),
            account_no: "0123456789".to_string(),
            account_name: "NGUYEN VAN A".to_string(),
            template: "compact".to_string(),
        };
        let url = transfer_qr_url(&bank, Decimal::from(33_500)).unwrap();
        assert_eq!(url.path(), "/image/MB-0123456789-compact.png");
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            query,
            vec![
                ("amount".to_string(), "33500".to_string()),
                ("addInfo".to_string(), TRANSFER_MEMO.to_string()),
                ("accountName".to_string(), "NGUYEN VAN A".to_string()),
            ]
        );
    }
}
