use std::fs;
use std::path::Path;

use bitcoin::Network;
use serde::Deserialize;

use crate::error::AppError;
use crate::types::AddressKind;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    /// インデックスサービスのベースURL (ネットワークはここから導出する)
    pub base_url: String,
    /// 支出アカウントのWIF秘密鍵
    pub wif: String,
    /// 手数料設定: 整数 / "+N" / "low" / "medium" / "high"
    pub fee: String,
    /// "p2tr" または "p2wpkh"
    pub address_type: String,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content).map_err(|e| AppError::JsonParse {
            file_path: path.to_path_buf(),
            source: e,
        })?;
        Ok(config)
    }

    /// base_url からネットワークを導出する。未知のURLは設定エラー。
    pub fn network(&self) -> Result<Network, AppError> {
        match self.base_url.trim_end_matches('/') {
            "https://mempool.space/api" => Ok(Network::Bitcoin),
            "https://mempool.space/signet/api" => Ok(Network::Signet),
            "https://mempool.space/testnet/api" => Ok(Network::Testnet),
            other => Err(AppError::InputValidation(format!(
                "未対応の base_url が指定されました: {}",
                other
            ))),
        }
    }

    pub fn address_kind(&self) -> Result<AddressKind, AppError> {
        AddressKind::from_config(&self.address_type)
    }
}
