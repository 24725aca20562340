use bitcoin::consensus::encode;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::secp256k1::All as AllContext;
use clap::Parser;

mod api;
mod cli;
mod config;
mod confirm;
mod error;
mod fee;
mod recipients;
mod transaction;
mod types;

use api::MempoolClient;
use cli::CliArgs;
use config::AppConfig;
use confirm::{AutoApprove, ConfirmPolicy, InteractivePrompt, TransferSummary};
use error::AppError;
use types::FundingAccount;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("転送を中止しました: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args = CliArgs::parse();
    log::info!("アプリケーションを開始します。引数: {:?}", args);

    let config = AppConfig::load(&args.config)?;
    let network = config.network()?;
    let address_kind = config.address_kind()?;
    log::info!("ネットワーク: {:?}, アドレスタイプ: {:?}", network, address_kind);

    let secp: Secp256k1<AllContext> = Secp256k1::new();
    let account = FundingAccount::from_wif(&config.wif, address_kind, network, &secp)?;
    log::info!("支出アカウント: {} ({:?})", account.address, account.network);

    // 受取先の検証はネットワークアクセスより先に行う。1行でも不正ならバッチ全体を中止する。
    let rows = recipients::load_rows(&args.recipients)?;
    let payments = recipients::validate_rows(rows, network)?;
    let payment_total: u64 = payments.iter().map(|p| p.amount_sats).sum();
    log::info!(
        "受取アカウント {} 件、合計 {:.8} BTC ( {} sats )",
        payments.len(),
        payment_total as f64 / 100_000_000.0,
        payment_total
    );

    let client = MempoolClient::new(&config.base_url)?;

    // 残高の事前チェック。支払合計だけで残高を超えるならUTXO取得前に中止する。
    let stats = client.address_stats(&account.address.to_string())?;
    let balance = stats.confirmed_balance();
    log::info!(
        "残高: {} sats ( {:.8} BTC )",
        balance,
        balance as f64 / 100_000_000.0
    );
    if payment_total > balance {
        return Err(AppError::InsufficientFunds {
            available: balance,
            required: payment_total,
            fee: 0,
        });
    }

    let fee_rate = fee::resolve_fee_rate(&config.fee, &client)?;

    let entries = client.utxos(&account.address.to_string())?;
    let spendable = transaction::filter_spendable(&entries)?;
    if spendable.is_empty() {
        return Err(AppError::NoSpendableOutputs {
            address: account.address.to_string(),
        });
    }

    let draft = transaction::assemble_draft(&spendable, &payments, fee_rate, &account)?;
    let summary = TransferSummary::from_draft(&draft, &account);

    let signed = transaction::sign(draft, &account, &secp)?;
    log::info!("署名済みトランザクションの生成に成功しました");
    let raw_tx = encode::serialize_hex(&signed);

    let mut gate: Box<dyn ConfirmPolicy> = if args.yes {
        Box::new(AutoApprove)
    } else {
        Box::new(InteractivePrompt)
    };
    if !gate.confirm(&summary)? {
        log::warn!("ブロードキャストを取消しました");
        return Ok(());
    }

    log::info!("トランザクションをブロードキャストします hex: {}", raw_tx);
    let txid = client.broadcast(&raw_tx)?;
    log::info!("転送が完了しました");
    println!("{}", txid);

    Ok(())
}
