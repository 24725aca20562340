use bitcoin::key::Keypair;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{Address, CompressedPublicKey, Network, NetworkKind, OutPoint, PrivateKey};

use crate::error::AppError;

/// 支出アドレスの種別 (config の address_type で選択)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressKind {
    /// Taproot key-path spend (bc1p...)
    TaprootKeyPath,
    /// P2WPKH (bc1q...)
    WitnessPubkeyHash,
}

impl AddressKind {
    pub fn from_config(s: &str) -> Result<Self, AppError> {
        match s.to_lowercase().as_str() {
            "p2tr" | "taproot" => Ok(AddressKind::TaprootKeyPath),
            "p2wpkh" | "segwit" => Ok(AddressKind::WitnessPubkeyHash),
            other => Err(AppError::InputValidation(format!(
                "無効な address_type が指定されました: {} (p2tr / p2wpkh のみ対応)",
                other
            ))),
        }
    }
}

/// 支出アカウント。WIF秘密鍵から導出し、1回の転送の間だけ保持する。
pub struct FundingAccount {
    pub private_key: PrivateKey,
    pub kind: AddressKind,
    pub network: Network,
    pub address: Address,
}

impl FundingAccount {
    pub fn from_wif(
        wif: &str,
        kind: AddressKind,
        network: Network,
        secp: &Secp256k1<All>,
    ) -> Result<Self, AppError> {
        let private_key =
            PrivateKey::from_wif(wif).map_err(|e| AppError::InvalidCredential(e.to_string()))?;

        // WIFにエンコードされたネットワーク種別とbase_url由来のネットワークの整合を確認
        if private_key.network != NetworkKind::from(network) {
            return Err(AppError::NetworkMismatch {
                configured: format!("{:?}", network),
                inferred: format!("{:?}", private_key.network),
            });
        }

        let address = match kind {
            AddressKind::TaprootKeyPath => {
                let keypair = Keypair::from_secret_key(secp, &private_key.inner);
                let (xonly, _parity) = keypair.x_only_public_key();
                Address::p2tr(secp, xonly, None, network)
            }
            AddressKind::WitnessPubkeyHash => {
                let compressed = CompressedPublicKey::from_private_key(secp, &private_key)
                    .map_err(|e| AppError::InvalidCredential(e.to_string()))?;
                Address::p2wpkh(&compressed, network)
            }
        };

        Ok(FundingAccount {
            private_key,
            kind,
            network,
            address,
        })
    }
}

/// 選択対象のUTXO。インデックスサービスから取得した時点のスナップショットで、不変。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendableUtxo {
    pub outpoint: OutPoint,
    pub value: u64,
}

/// 検証済みの受取先1件
#[derive(Debug, Clone)]
pub struct RecipientPayment {
    pub address: Address,
    pub amount_sats: u64,
}
