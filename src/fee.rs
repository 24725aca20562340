use crate::api::{MempoolClient, RecommendedFees};
use crate::error::AppError;

/// config の fee 文字列の解釈結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeeSetting {
    /// 整数そのまま (sat/vB)。リモート取得は行わない。
    Explicit(u64),
    /// "+N": fastestFee に N を上乗せ
    OffsetFastest(u64),
    Low,
    Medium,
    High,
    /// 解釈不能。警告を出して high (fastestFee) にフォールバックする。
    Unrecognized(String),
}

fn is_plain_positive(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && !s.starts_with('0')
}

impl FeeSetting {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix('+') {
            if is_plain_positive(rest) {
                if let Ok(n) = rest.parse::<u64>() {
                    return FeeSetting::OffsetFastest(n);
                }
            }
        } else if is_plain_positive(s) {
            if let Ok(n) = s.parse::<u64>() {
                return FeeSetting::Explicit(n);
            }
        }
        match s {
            "low" => FeeSetting::Low,
            "medium" => FeeSetting::Medium,
            "high" => FeeSetting::High,
            other => FeeSetting::Unrecognized(other.to_string()),
        }
    }
}

/// 取得済みのtier表から手数料レートを選ぶ
pub fn rate_from_recommended(setting: &FeeSetting, fees: &RecommendedFees) -> u64 {
    match setting {
        FeeSetting::Explicit(n) => *n,
        FeeSetting::OffsetFastest(n) => fees.fastest_fee + n,
        FeeSetting::Low => fees.hour_fee,
        FeeSetting::Medium => fees.half_hour_fee,
        FeeSetting::High => fees.fastest_fee,
        FeeSetting::Unrecognized(s) => {
            log::warn!(
                "config の fee 設定 \"{}\" は解釈できません。デフォルトで high を使用します",
                s
            );
            fees.fastest_fee
        }
    }
}

/// 手数料レート (sat/vB) を解決する。明示指定以外はリモートの推奨値を参照する。
pub fn resolve_fee_rate(fee_config: &str, client: &MempoolClient) -> Result<u64, AppError> {
    let setting = FeeSetting::parse(fee_config);
    let rate = if let FeeSetting::Explicit(n) = &setting {
        *n
    } else {
        let fees = client.recommended_fees()?;
        log::info!(
            "現在の推奨手数料 (High Priority={} sat/vB), (Medium Priority={} sat/vB), (Low Priority={} sat/vB), (No Priority={} sat/vB)",
            fees.fastest_fee,
            fees.half_hour_fee,
            fees.hour_fee,
            fees.economy_fee
        );
        rate_from_recommended(&setting, &fees)
    };
    log::info!("使用する手数料レート: {} sat/vB", rate);
    Ok(rate)
}

/// トランザクションの仮想サイズ (vB) を入出力数から見積もる。
///
/// 非witness部: 基本10バイト + 入力70バイト + 出力58バイト、
/// witness部: 入力ごとに64バイト (Schnorr単独署名)。
/// witness分を1/4に割り引くため 3:1 で重み付けして4で割る。
pub fn estimate_virtual_bytes(input_count: usize, output_count: usize) -> u64 {
    let non_witness = 10 + input_count as u64 * 70 + output_count as u64 * 58;
    let witness = input_count as u64 * 64;
    (non_witness * 3 + witness).div_ceil(4)
}

/// 入力数が変わるたびに再計算する手数料計画
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FeePlan {
    pub rate: u64,
    pub vsize: u64,
    pub fee: u64,
}

impl FeePlan {
    pub fn for_counts(rate: u64, input_count: usize, output_count: usize) -> Self {
        let vsize = estimate_virtual_bytes(input_count, output_count);
        FeePlan {
            rate,
            vsize,
            fee: rate * vsize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fees() -> RecommendedFees {
        serde_json::from_str(
            r#"{"fastestFee":25,"halfHourFee":15,"hourFee":10,"economyFee":5,"minimumFee":1}"#,
        )
        .unwrap()
    }

    #[test]
    fn fee_setting_parse_table() {
        assert_eq!(FeeSetting::parse("15"), FeeSetting::Explicit(15));
        assert_eq!(FeeSetting::parse("+5"), FeeSetting::OffsetFastest(5));
        assert_eq!(FeeSetting::parse("low"), FeeSetting::Low);
        assert_eq!(FeeSetting::parse("medium"), FeeSetting::Medium);
        assert_eq!(FeeSetting::parse("high"), FeeSetting::High);
        // 先頭ゼロや非正の値は明示指定として扱わない
        assert_eq!(
            FeeSetting::parse("0"),
            FeeSetting::Unrecognized("0".to_string())
        );
        assert_eq!(
            FeeSetting::parse("+0"),
            FeeSetting::Unrecognized("+0".to_string())
        );
        assert_eq!(
            FeeSetting::parse("turbo"),
            FeeSetting::Unrecognized("turbo".to_string())
        );
    }

    #[test]
    fn tier_rates_resolve_from_table() {
        let fees = sample_fees();
        assert_eq!(rate_from_recommended(&FeeSetting::Low, &fees), 10);
        assert_eq!(rate_from_recommended(&FeeSetting::Medium, &fees), 15);
        assert_eq!(rate_from_recommended(&FeeSetting::High, &fees), 25);
        assert_eq!(rate_from_recommended(&FeeSetting::OffsetFastest(5), &fees), 30);
        assert_eq!(rate_from_recommended(&FeeSetting::Explicit(3), &fees), 3);
    }

    #[test]
    fn unrecognized_setting_falls_back_to_fastest() {
        let fees = sample_fees();
        let setting = FeeSetting::Unrecognized("turbo".to_string());
        assert_eq!(rate_from_recommended(&setting, &fees), fees.fastest_fee);
    }

    #[test]
    fn virtual_bytes_formula() {
        // 1入力2出力: non-witness 196, witness 64 -> ceil(652/4) = 163
        assert_eq!(estimate_virtual_bytes(1, 2), 163);
        // 2入力2出力: non-witness 266, witness 128 -> ceil(926/4) = 232
        assert_eq!(estimate_virtual_bytes(2, 2), 232);
    }

    #[test]
    fn virtual_bytes_monotonic_in_both_arguments() {
        for ins in 1..20 {
            for outs in 1..20 {
                let v = estimate_virtual_bytes(ins, outs);
                assert!(estimate_virtual_bytes(ins + 1, outs) >= v);
                assert!(estimate_virtual_bytes(ins, outs + 1) >= v);
            }
        }
    }

    #[test]
    fn virtual_bytes_is_pure() {
        assert_eq!(estimate_virtual_bytes(7, 3), estimate_virtual_bytes(7, 3));
    }

    #[test]
    fn fee_plan_for_counts() {
        let plan = FeePlan::for_counts(10, 1, 2);
        assert_eq!(plan.vsize, 163);
        assert_eq!(plan.fee, 1630);
    }
}
