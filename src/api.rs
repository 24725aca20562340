use std::str::FromStr;
use std::time::Duration;

use bitcoin::Txid;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;

use crate::error::AppError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// インデックスサービス (mempool.space互換API) のレスポンス型
///
/// @apidoc: https://mempool.space/signet/docs/api/rest
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct AddressStats {
    pub address: String,
    pub chain_stats: TxoSums,
    pub mempool_stats: TxoSums,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct TxoSums {
    pub funded_txo_sum: u64,
    pub spent_txo_sum: u64,
    pub tx_count: u64,
}

impl AddressStats {
    /// funded_txo_sum - spent_txo_sum が確定済みの残高
    pub fn confirmed_balance(&self) -> u64 {
        self.chain_stats
            .funded_txo_sum
            .saturating_sub(self.chain_stats.spent_txo_sum)
    }
}

#[derive(Debug, Deserialize)]
pub struct UtxoEntry {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: UtxoConfirmation,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct UtxoConfirmation {
    pub confirmed: bool,
    pub block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct RecommendedFees {
    #[serde(rename = "fastestFee")]
    pub fastest_fee: u64,
    #[serde(rename = "halfHourFee")]
    pub half_hour_fee: u64,
    #[serde(rename = "hourFee")]
    pub hour_fee: u64,
    #[serde(rename = "economyFee")]
    pub economy_fee: u64,
    #[serde(rename = "minimumFee")]
    pub minimum_fee: u64,
}

/// 全リクエストに同一のタイムアウトとヘッダポリシーを適用するHTTPクライアント。
/// 自動リトライは行わない。失敗は呼び出し元へそのまま伝播する。
pub struct MempoolClient {
    http: Client,
    base_url: String,
}

impl MempoolClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Sec-Ch-Ua",
            HeaderValue::from_static(
                "\"Google Chrome\";v=\"125\", \"Chromium\";v=\"125\", \"Not.A/Brand\";v=\"24\"",
            ),
        );
        headers.insert("Sec-Ch-Ua-Mobile", HeaderValue::from_static("?0"));
        headers.insert("Sec-Ch-Ua-Platform", HeaderValue::from_static("\"Windows\""));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
            ),
        );

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(MempoolClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// アドレスの残高サマリを取得
    pub fn address_stats(&self, address: &str) -> Result<AddressStats, AppError> {
        let url = format!("{}/address/{}", self.base_url, address);
        log::debug!("GET {}", url);
        let stats = self.http.get(&url).send()?.error_for_status()?.json()?;
        Ok(stats)
    }

    /// アドレスのUTXO一覧を取得 (サービスが返した順序のまま)
    pub fn utxos(&self, address: &str) -> Result<Vec<UtxoEntry>, AppError> {
        let url = format!("{}/address/{}/utxo", self.base_url, address);
        log::debug!("GET {}", url);
        let utxos = self.http.get(&url).send()?.error_for_status()?.json()?;
        Ok(utxos)
    }

    /// 推奨手数料 (tier別) を取得。失敗時はローカルのフォールバック値を持たない。
    pub fn recommended_fees(&self) -> Result<RecommendedFees, AppError> {
        let url = format!("{}/v1/fees/recommended", self.base_url);
        log::debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| AppError::FeeSourceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(AppError::FeeSourceUnavailable(format!("{}: {}", status, body)));
        }

        response
            .json()
            .map_err(|e| AppError::FeeSourceUnavailable(e.to_string()))
    }

    /// 署名済みトランザクションをブロードキャストし、txidを返す。ワンショットでリトライなし。
    pub fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, AppError> {
        let url = format!("{}/tx", self.base_url);
        log::debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .body(raw_tx_hex.to_string())
            .send()?;

        let status = response.status();
        let body = response.text().unwrap_or_default();

        if !status.is_success() {
            return Err(AppError::BroadcastFailure {
                response: format!("{}: {}", status, body),
            });
        }

        // 応答本文はtxidの16進文字列。パースできなければ診断用に生の内容を返す。
        Txid::from_str(body.trim()).map_err(|_| AppError::BroadcastFailure {
            response: body.clone(),
        })
    }
}
