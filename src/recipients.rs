use std::fs;
use std::path::Path;
use std::str::FromStr;

use bitcoin::{Address, AddressType, Amount, Network};
use serde::Deserialize;

use crate::error::AppError;
use crate::types::RecipientPayment;

/// 受取先リストの1行。金額はBTC単位 (1 BTC = 100,000,000 sats)。
#[derive(Deserialize, Debug)]
pub struct RecipientRow {
    pub address: String,
    pub amount: f64,
}

pub fn load_rows(path: &Path) -> Result<Vec<RecipientRow>, AppError> {
    let content = fs::read_to_string(path)?;
    let rows: Vec<RecipientRow> = serde_json::from_str(&content).map_err(|e| AppError::JsonParse {
        file_path: path.to_path_buf(),
        source: e,
    })?;
    Ok(rows)
}

/// 全行を検証して RecipientPayment に変換する。1行でも不正ならバッチ全体を中止する。
/// 行番号は1始まりで診断メッセージに含める。
pub fn validate_rows(
    rows: Vec<RecipientRow>,
    network: Network,
) -> Result<Vec<RecipientPayment>, AppError> {
    if rows.is_empty() {
        return Err(AppError::InputValidation(
            "受取先リストが空です".to_string(),
        ));
    }

    let mut payments = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let row_number = index + 1;

        let address = Address::from_str(&row.address)
            .and_then(|a| a.require_network(network))
            .map_err(|e| AppError::InvalidRecipient {
                row: row_number,
                address: row.address.clone(),
                reason: e.to_string(),
            })?;

        // bech32のwitnessアドレスのみ受け付ける (レガシーbase58は対象外)
        match address.address_type() {
            Some(AddressType::P2wpkh) | Some(AddressType::P2wsh) | Some(AddressType::P2tr) => {}
            other => {
                return Err(AppError::InvalidRecipient {
                    row: row_number,
                    address: row.address.clone(),
                    reason: format!("未対応のアドレスタイプです: {:?}", other),
                });
            }
        }

        let amount = Amount::from_btc(row.amount).map_err(|_| AppError::InvalidAmount {
            row: row_number,
            address: row.address.clone(),
            amount: row.amount,
        })?;
        if amount == Amount::ZERO {
            return Err(AppError::InvalidAmount {
                row: row_number,
                address: row.address,
                amount: row.amount,
            });
        }

        payments.push(RecipientPayment {
            address,
            amount_sats: amount.to_sat(),
        });
    }

    Ok(payments)
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP173/BIP350のテストベクタ
    const MAINNET_P2WPKH: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const MAINNET_P2TR: &str = "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0";
    const MAINNET_LEGACY: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";

    fn row(address: &str, amount: f64) -> RecipientRow {
        RecipientRow {
            address: address.to_string(),
            amount,
        }
    }

    #[test]
    fn valid_rows_convert_to_satoshis() {
        let payments = validate_rows(
            vec![row(MAINNET_P2WPKH, 0.0005), row(MAINNET_P2TR, 1.0)],
            Network::Bitcoin,
        )
        .unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].amount_sats, 50_000);
        assert_eq!(payments[1].amount_sats, 100_000_000);
    }

    #[test]
    fn recipient_order_is_preserved() {
        let payments = validate_rows(
            vec![row(MAINNET_P2TR, 0.001), row(MAINNET_P2WPKH, 0.002)],
            Network::Bitcoin,
        )
        .unwrap();
        assert_eq!(payments[0].address.to_string(), MAINNET_P2TR);
        assert_eq!(payments[1].address.to_string(), MAINNET_P2WPKH);
    }

    #[test]
    fn wrong_network_address_is_rejected_with_row_number() {
        let err = validate_rows(
            vec![row(MAINNET_P2WPKH, 0.001), row(MAINNET_P2TR, 0.001)],
            Network::Testnet,
        )
        .unwrap_err();
        match err {
            AppError::InvalidRecipient { row, address, .. } => {
                assert_eq!(row, 1);
                assert_eq!(address, MAINNET_P2WPKH);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn legacy_address_is_rejected() {
        let err = validate_rows(vec![row(MAINNET_LEGACY, 0.001)], Network::Bitcoin).unwrap_err();
        assert!(matches!(err, AppError::InvalidRecipient { row: 1, .. }));
    }

    #[test]
    fn one_bad_row_voids_the_batch() {
        let err = validate_rows(
            vec![row(MAINNET_P2WPKH, 0.001), row("not-an-address", 0.001)],
            Network::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRecipient { row: 2, .. }));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let err = validate_rows(vec![row(MAINNET_P2WPKH, 0.0)], Network::Bitcoin).unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount { row: 1, .. }));

        let err = validate_rows(vec![row(MAINNET_P2WPKH, -0.5)], Network::Bitcoin).unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount { row: 1, .. }));
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = validate_rows(vec![], Network::Bitcoin).unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
    }
}
