use std::path::PathBuf;
use bitcoin::sighash::P2wpkhError as SegwitSighashError;
use bitcoin::sighash::TaprootError as TaprootSighashError;
use bitcoin::secp256k1::Error as SecpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSONパースエラー ファイル: {file_path:?}, 詳細: {source}")]
    JsonParse {
        file_path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTPリクエストエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("秘密鍵(WIF)の形式が不正です: {0}")]
    InvalidCredential(String),

    #[error("ネットワーク不整合: base_url由来 ({configured}) vs WIF ({inferred})")]
    NetworkMismatch {
        configured: String,
        inferred: String,
    },

    #[error("受取先アドレス検証エラー ({row}行目): {address} - {reason}")]
    InvalidRecipient {
        row: usize,
        address: String,
        reason: String,
    },

    #[error("受取金額検証エラー ({row}行目): {address} の金額 {amount} BTC は正のsatoshisに変換できません")]
    InvalidAmount {
        row: usize,
        address: String,
        amount: f64,
    },

    #[error("利用可能なUTXOがありません: {address} (546 sats以下のダストは選択対象外)")]
    NoSpendableOutputs { address: String },

    #[error("資金不足: 利用可能な総額 {available} sats, 要求額 {required} sats (手数料 {fee} sats を含む)")]
    InsufficientFunds {
        available: u64,
        required: u64,
        fee: u64,
    },

    #[error("手数料が入力総額を超過: 入力 {total_input} sats, 出力 {total_output} sats, 手数料 {fee} sats")]
    FeeExceedsInputs {
        total_input: u64,
        total_output: u64,
        fee: u64,
    },

    #[error("推奨手数料の取得に失敗しました: {0}")]
    FeeSourceUnavailable(String),

    #[error("トランザクションのブロードキャストに失敗しました: {response}")]
    BroadcastFailure { response: String },

    #[error("Taproot sighash計算エラー (入力インデックス {input_index}): {source}")]
    TaprootSighash {
        input_index: usize,
        #[source]
        source: TaprootSighashError,
    },

    #[error("P2WPKH sighash計算エラー (入力インデックス {input_index}): {source}")]
    SegwitSighash {
        input_index: usize,
        #[source]
        source: SegwitSighashError,
    },

    #[error("secp256k1エラー: {0}")]
    Secp256k1(#[from] SecpError),

    #[error("入力検証エラー: {0}")]
    InputValidation(String),
}
