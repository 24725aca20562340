use std::fmt;
use std::io::{self, Write};

use bitcoin::{Amount, OutPoint};

use crate::error::AppError;
use crate::transaction::DraftTransaction;
use crate::types::FundingAccount;

const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[39m";

/// ブロードキャスト前に操作者へ提示する転送内容のサマリ
pub struct TransferSummary {
    pub from_address: String,
    pub inputs: Vec<(OutPoint, u64)>,
    pub recipient_count: usize,
    pub payment_total: u64,
    pub fee: u64,
    pub fee_rate: u64,
    pub vsize: u64,
    pub change: u64,
}

impl TransferSummary {
    pub fn from_draft(draft: &DraftTransaction, funding: &FundingAccount) -> Self {
        TransferSummary {
            from_address: funding.address.to_string(),
            inputs: draft
                .selected
                .iter()
                .map(|u| (u.outpoint, u.value))
                .collect(),
            recipient_count: draft.tx.output.len()
                - if draft.change > 0 { 1 } else { 0 },
            payment_total: draft.payment_total,
            fee: draft.plan.fee,
            // 表示にも計算にも解決済みの数値レートを使う
            fee_rate: draft.plan.rate,
            vsize: draft.plan.vsize,
            change: draft.change,
        }
    }
}

fn btc(sats: u64) -> f64 {
    Amount::from_sat(sats).to_btc()
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "支出アカウント: {} UTXO {} 本を入力として使用 (546 sats以下のダストは除外済み)",
            self.from_address,
            self.inputs.len()
        )?;
        for (i, (outpoint, value)) in self.inputs.iter().enumerate() {
            writeln!(f, "    utxo{}-txid: {} ({} sats)", i + 1, outpoint, value)?;
        }
        writeln!(
            f,
            "受取アカウント {} 件、合計 {} BTC ( {} sats )",
            self.recipient_count,
            btc(self.payment_total),
            self.payment_total
        )?;
        writeln!(
            f,
            "マイナー手数料: {} BTC ( {} sats )  レート: {} sat/vB, 推定 {} vB",
            btc(self.fee),
            self.fee,
            self.fee_rate,
            self.vsize
        )?;
        writeln!(
            f,
            "おつり {} BTC ( {} sats ) を {} へ返却",
            btc(self.change),
            self.change,
            self.from_address
        )
    }
}

/// 確認プロンプトの差し替え点。対話環境以外では自動承認に置き換えられる。
pub trait ConfirmPolicy {
    fn confirm(&mut self, summary: &TransferSummary) -> Result<bool, AppError>;
}

/// 'y' / 'Y' の完全一致 (改行除去後) のみ承認。空入力を含むそれ以外はすべて中止。
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim_end_matches(['\r', '\n']).eq_ignore_ascii_case("y")
}

/// 標準入力からのブロッキング読み取りによる対話的な確認
pub struct InteractivePrompt;

impl ConfirmPolicy for InteractivePrompt {
    fn confirm(&mut self, summary: &TransferSummary) -> Result<bool, AppError> {
        println!("{}\n{}{}", YELLOW, summary, RESET);
        print!(
            "{}この取引をブロードキャストしますか？ブロードキャスト後の取消はできません。'y' または 'Y' を入力して確定、それ以外の入力で中止: {}",
            YELLOW, RESET
        );
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

/// --yes 指定時の自動承認ポリシー
pub struct AutoApprove;

impl ConfirmPolicy for AutoApprove {
    fn confirm(&mut self, summary: &TransferSummary) -> Result<bool, AppError> {
        log::info!("--yes 指定のため確認プロンプトを省略します");
        println!("{}", summary);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Txid;
    use bitcoin::hashes::Hash;

    #[test]
    fn only_y_is_affirmative() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative("Y"));
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative("Y\r\n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("yes"));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative(" y"));
    }

    #[test]
    fn summary_presents_all_figures() {
        let summary = TransferSummary {
            from_address: "tb1p-example".to_string(),
            inputs: vec![(
                OutPoint::new(Txid::from_byte_array([7; 32]), 1),
                100_000,
            )],
            recipient_count: 2,
            payment_total: 50_000,
            fee: 1630,
            fee_rate: 10,
            vsize: 163,
            change: 48_370,
        };
        let text = summary.to_string();
        assert!(text.contains("tb1p-example"));
        assert!(text.contains("UTXO 1 本"));
        assert!(text.contains("50000 sats"));
        assert!(text.contains("1630 sats"));
        assert!(text.contains("10 sat/vB"));
        assert!(text.contains("48370 sats"));
    }

    #[test]
    fn auto_approve_always_confirms() {
        let summary = TransferSummary {
            from_address: String::new(),
            inputs: vec![],
            recipient_count: 0,
            payment_total: 0,
            fee: 0,
            fee_rate: 0,
            vsize: 0,
            change: 0,
        };
        assert!(AutoApprove.confirm(&summary).unwrap());
    }
}
