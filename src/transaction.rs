use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::key::{Keypair, TapTweak};
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, CompressedPublicKey, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness, ecdsa, taproot,
};

use crate::api::UtxoEntry;
use crate::error::AppError;
use crate::fee::FeePlan;
use crate::types::{AddressKind, FundingAccount, RecipientPayment, SpendableUtxo};

// Bitcoin Coreのデフォルトダスト閾値。これ以下のUTXOは誤燃焼を避けるため選択しない。
const DUST_THRESHOLD_SATS: u64 = 546;

/// インデックスサービスの応答から選択対象のUTXO列を作る。
/// ダスト (546 sats以下) を除外し、サービスが返した順序をそのまま保つ。
/// 値による並べ替えは行わない (呼び出し元はこの順で貪欲に消費する)。
pub fn filter_spendable(entries: &[UtxoEntry]) -> Result<Vec<SpendableUtxo>, AppError> {
    let mut spendable = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.value <= DUST_THRESHOLD_SATS {
            log::debug!(
                "ダストUTXOを除外: {}:{} ({} sats)",
                entry.txid,
                entry.vout,
                entry.value
            );
            continue;
        }
        let txid = Txid::from_str(&entry.txid).map_err(|e| {
            AppError::InputValidation(format!("サービス応答のtxidが不正です ({}): {}", entry.txid, e))
        })?;
        spendable.push(SpendableUtxo {
            outpoint: OutPoint::new(txid, entry.vout),
            value: entry.value,
        });
    }
    Ok(spendable)
}

/// 署名前のトランザクション一式。
/// 不変条件: sum(入力) == sum(出力) + fee が厳密に成立していること。
#[derive(Debug)]
pub struct DraftTransaction {
    pub tx: Transaction,
    pub prevouts: Vec<TxOut>,
    pub selected: Vec<SpendableUtxo>,
    pub plan: FeePlan,
    pub payment_total: u64,
    pub change: u64,
}

/// UTXOを先頭から1つずつ加えながら必要手数料を再計算し、
/// 入力合計が 支払合計+手数料 に達したところで打ち切る。
/// 入力を増やすと手数料も増えるため、これは1パスではなく反復的な不動点になる。
pub fn assemble_draft(
    spendable: &[SpendableUtxo],
    payments: &[RecipientPayment],
    fee_rate: u64,
    funding: &FundingAccount,
) -> Result<DraftTransaction, AppError> {
    let payment_total: u64 = payments.iter().map(|p| p.amount_sats).sum();
    // 出力数は 支払い + 見込みのおつり1件 で見積もる
    let prospective_outputs = payments.len() + 1;

    let mut selected: Vec<SpendableUtxo> = Vec::new();
    let mut total_input = 0u64;
    let mut plan = FeePlan::for_counts(fee_rate, 0, prospective_outputs);
    let mut covered = false;

    for utxo in spendable {
        selected.push(utxo.clone());
        total_input += utxo.value;
        plan = FeePlan::for_counts(fee_rate, selected.len(), prospective_outputs);
        if total_input >= payment_total + plan.fee {
            covered = true;
            break;
        }
    }

    if !covered {
        return Err(AppError::InsufficientFunds {
            available: total_input,
            required: payment_total + plan.fee,
            fee: plan.fee,
        });
    }

    log::debug!(
        "UTXO選択完了: {}本, 入力合計 {} sats, 推定vsize {} vB, 手数料 {} sats",
        selected.len(),
        total_input,
        plan.vsize,
        plan.fee
    );

    let funding_spk = funding.address.script_pubkey();
    let mut input = Vec::with_capacity(selected.len());
    let mut prevouts = Vec::with_capacity(selected.len());
    for utxo in &selected {
        input.push(TxIn {
            previous_output: utxo.outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        });
        prevouts.push(TxOut {
            value: Amount::from_sat(utxo.value),
            script_pubkey: funding_spk.clone(),
        });
    }

    // 受取先の順序を保ったまま支払い出力を並べる
    let mut output: Vec<TxOut> = payments
        .iter()
        .map(|p| TxOut {
            value: Amount::from_sat(p.amount_sats),
            script_pubkey: p.address.script_pubkey(),
        })
        .collect();

    // おつり = 入力合計 - 支払合計 - 手数料。
    // 選択ループが正しければ負にはならないが、明示的に検査して致命的エラーにする。
    let change = total_input
        .checked_sub(payment_total + plan.fee)
        .ok_or(AppError::FeeExceedsInputs {
            total_input,
            total_output: payment_total,
            fee: plan.fee,
        })?;

    if change > 0 {
        output.push(TxOut {
            value: Amount::from_sat(change),
            script_pubkey: funding_spk,
        });
    }

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output,
    };

    debug_assert_eq!(
        total_input,
        tx.output.iter().map(|o| o.value.to_sat()).sum::<u64>() + plan.fee
    );

    Ok(DraftTransaction {
        tx,
        prevouts,
        selected,
        plan,
        payment_total,
        change,
    })
}

/// 全入力に署名して最終的なトランザクションを返す。
/// 署名後は全入力がちょうど1つのwitnessを持つ。
pub fn sign(
    draft: DraftTransaction,
    funding: &FundingAccount,
    secp: &Secp256k1<All>,
) -> Result<Transaction, AppError> {
    let mut tx = draft.tx;

    let witnesses = match funding.kind {
        AddressKind::TaprootKeyPath => {
            let keypair = Keypair::from_secret_key(secp, &funding.private_key.inner);
            let tweaked = keypair.tap_tweak(secp, None);
            let prevouts = Prevouts::All(&draft.prevouts);

            let mut witnesses = Vec::with_capacity(draft.prevouts.len());
            let mut sighash_cache = SighashCache::new(&tx);
            for input_index in 0..draft.prevouts.len() {
                let sighash = sighash_cache
                    .taproot_key_spend_signature_hash(
                        input_index,
                        &prevouts,
                        TapSighashType::Default,
                    )
                    .map_err(|e| AppError::TaprootSighash {
                        input_index,
                        source: e,
                    })?;
                let message = Message::from_digest_slice(sighash.as_ref())?;
                let signature = secp.sign_schnorr_no_aux_rand(&message, &tweaked.to_inner());
                witnesses.push(Witness::p2tr_key_spend(&taproot::Signature {
                    signature,
                    sighash_type: TapSighashType::Default,
                }));
            }
            witnesses
        }
        AddressKind::WitnessPubkeyHash => {
            let compressed = CompressedPublicKey::from_private_key(secp, &funding.private_key)
                .map_err(|e| AppError::InvalidCredential(e.to_string()))?;
            let script_pubkey = funding.address.script_pubkey();

            let mut witnesses = Vec::with_capacity(draft.prevouts.len());
            let mut sighash_cache = SighashCache::new(&tx);
            for (input_index, prevout) in draft.prevouts.iter().enumerate() {
                let sighash = sighash_cache
                    .p2wpkh_signature_hash(
                        input_index,
                        &script_pubkey,
                        prevout.value,
                        EcdsaSighashType::All,
                    )
                    .map_err(|e| AppError::SegwitSighash {
                        input_index,
                        source: e,
                    })?;
                let message = Message::from_digest_slice(sighash.as_ref())?;
                let signature = secp.sign_ecdsa(&message, &funding.private_key.inner);
                let mut witness = Witness::new();
                witness.push_ecdsa_signature(&ecdsa::Signature {
                    signature,
                    sighash_type: EcdsaSighashType::All,
                });
                witness.push(compressed.to_bytes());
                witnesses.push(witness);
            }
            witnesses
        }
    };

    for (tx_in, witness) in tx.input.iter_mut().zip(witnesses) {
        tx_in.witness = witness;
    }

    Ok(tx)
}
