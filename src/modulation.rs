//! 変調・符号化方式（MCS）テーブルと SINR からの周波数利用効率の決定

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::common::Generation;

/// MCS テーブル構築エラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModulationError {
    #[error("MCS テーブルが空です")]
    Empty,

    #[error("{generation} の MCS テーブルが SINR 昇順ではありません (CQI {cqi_index}: {sinr_threshold_db} dB)")]
    Unsorted {
        generation: Generation,
        cqi_index: u8,
        sinr_threshold_db: f64,
    },
}

/// MCS テーブルの1行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulationCodingEntry {
    pub generation: Generation,
    /// アンテナ構成（例: "1x1"）
    pub transmission_type: String,
    pub cqi_index: u8,
    pub modulation: String,
    /// 符号化率 ×1024（4G/5G 共通の表記）
    pub coding_rate_x1024: f64,
    /// 周波数利用効率（bps/Hz）
    pub spectral_efficiency: f64,
    /// 必要 SINR（dB）
    pub sinr_threshold_db: f64,
}

impl ModulationCodingEntry {
    fn new(
        generation: Generation,
        cqi_index: u8,
        modulation: &str,
        coding_rate_x1024: f64,
        spectral_efficiency: f64,
        sinr_threshold_db: f64,
    ) -> Self {
        Self {
            generation,
            transmission_type: "1x1".to_string(),
            cqi_index,
            modulation: modulation.to_string(),
            coding_rate_x1024,
            spectral_efficiency,
            sinr_threshold_db,
        }
    }
}

/// ルックアップ結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "spectral_efficiency", rename_all = "snake_case")]
pub enum SpectralEfficiency {
    /// SINR 以下で最大の閾値を持つ行の値
    Found(f64),
    /// 最大閾値以上（最大値で飽和）
    AboveMaximum(f64),
    /// 最小閾値未満（通信不可）
    BelowMinimum,
    /// 該当する世代の行がない
    NoMatch,
}

impl SpectralEfficiency {
    /// 周波数利用効率（bps/Hz）
    ///
    /// 最小閾値未満・該当なしはいずれも 0 です。
    pub fn value(&self) -> f64 {
        match self {
            SpectralEfficiency::Found(value) | SpectralEfficiency::AboveMaximum(value) => *value,
            SpectralEfficiency::BelowMinimum | SpectralEfficiency::NoMatch => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpectralEfficiency::Found(_) => "found",
            SpectralEfficiency::AboveMaximum(_) => "above_maximum",
            SpectralEfficiency::BelowMinimum => "below_minimum",
            SpectralEfficiency::NoMatch => "no_match",
        }
    }
}

/// 世代ごとに SINR 昇順であることを検証済みの MCS テーブル
///
/// 伝送方式を指定しない参照は世代の行をまとめて走査するため、昇順は伝送方式を
/// 問わず世代単位で要求します。
#[derive(Debug, Clone, PartialEq)]
pub struct ModulationCodingTable {
    entries: Vec<ModulationCodingEntry>,
}

impl ModulationCodingTable {
    /// テーブルを作成し、世代ごとの昇順を検証
    pub fn new(entries: Vec<ModulationCodingEntry>) -> Result<Self, ModulationError> {
        if entries.is_empty() {
            return Err(ModulationError::Empty);
        }

        for (index, entry) in entries.iter().enumerate() {
            let previous = entries[..index]
                .iter()
                .rev()
                .find(|other| other.generation == entry.generation);
            if let Some(previous) = previous {
                if entry.sinr_threshold_db < previous.sinr_threshold_db {
                    return Err(ModulationError::Unsorted {
                        generation: entry.generation,
                        cqi_index: entry.cqi_index,
                        sinr_threshold_db: entry.sinr_threshold_db,
                    });
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ModulationCodingEntry] {
        &self.entries
    }

    /// 指定世代の行が存在するか
    pub fn supports(&self, generation: Generation) -> bool {
        self.entries.iter().any(|entry| entry.generation == generation)
    }

    /// SINR から周波数利用効率を決定
    ///
    /// `transmission_type` が `None` の場合は世代のみで絞り込みます。
    pub fn lookup(
        &self,
        sinr: f64,
        generation: Generation,
        transmission_type: Option<&str>,
    ) -> SpectralEfficiency {
        let rows: Vec<&ModulationCodingEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.generation == generation)
            .filter(|entry| transmission_type.is_none_or(|kind| entry.transmission_type == kind))
            .collect();

        let (Some(lowest), Some(highest)) = (rows.first(), rows.last()) else {
            return SpectralEfficiency::NoMatch;
        };

        if sinr >= highest.sinr_threshold_db {
            return SpectralEfficiency::AboveMaximum(highest.spectral_efficiency);
        }
        if sinr < lowest.sinr_threshold_db {
            return SpectralEfficiency::BelowMinimum;
        }

        rows.windows(2)
            .find(|pair| sinr >= pair[0].sinr_threshold_db && sinr < pair[1].sinr_threshold_db)
            .map(|pair| SpectralEfficiency::Found(pair[0].spectral_efficiency))
            .unwrap_or(SpectralEfficiency::NoMatch)
    }
}

impl Default for ModulationCodingTable {
    /// 4G/5G 1x1 の標準テーブル（CQI 1〜15）
    fn default() -> Self {
        use Generation::{FiveG, FourG};
        let row = ModulationCodingEntry::new;
        Self {
            entries: vec![
                row(FourG, 1, "QPSK", 78.0, 0.1523, -6.7),
                row(FourG, 2, "QPSK", 120.0, 0.2344, -4.7),
                row(FourG, 3, "QPSK", 193.0, 0.377, -2.3),
                row(FourG, 4, "QPSK", 308.0, 0.6016, 0.2),
                row(FourG, 5, "QPSK", 449.0, 0.877, 2.4),
                row(FourG, 6, "QPSK", 602.0, 1.1758, 4.3),
                row(FourG, 7, "16QAM", 378.0, 1.4766, 5.9),
                row(FourG, 8, "16QAM", 490.0, 1.9141, 8.1),
                row(FourG, 9, "16QAM", 616.0, 2.4063, 10.3),
                row(FourG, 10, "64QAM", 466.0, 2.7305, 11.7),
                row(FourG, 11, "64QAM", 567.0, 3.3223, 14.1),
                row(FourG, 12, "64QAM", 666.0, 3.9023, 16.3),
                row(FourG, 13, "64QAM", 772.0, 4.5234, 18.7),
                row(FourG, 14, "64QAM", 873.0, 5.1152, 21.0),
                row(FourG, 15, "64QAM", 948.0, 5.5547, 22.7),
                row(FiveG, 1, "QPSK", 78.0, 0.1523, -6.7),
                row(FiveG, 2, "QPSK", 193.0, 0.377, -4.7),
                row(FiveG, 3, "QPSK", 449.0, 0.877, -2.3),
                row(FiveG, 4, "16QAM", 378.0, 1.4766, 0.2),
                row(FiveG, 5, "16QAM", 490.0, 1.9141, 2.4),
                row(FiveG, 6, "16QAM", 616.0, 2.4063, 4.3),
                row(FiveG, 7, "64QAM", 466.0, 2.7305, 5.9),
                row(FiveG, 8, "64QAM", 567.0, 3.3223, 8.1),
                row(FiveG, 9, "64QAM", 666.0, 3.9023, 10.3),
                row(FiveG, 10, "64QAM", 772.0, 4.5234, 11.7),
                row(FiveG, 11, "64QAM", 873.0, 5.1152, 14.1),
                row(FiveG, 12, "256QAM", 711.0, 5.5547, 16.3),
                row(FiveG, 13, "256QAM", 797.0, 6.2266, 18.7),
                row(FiveG, 14, "256QAM", 885.0, 6.9141, 21.0),
                row(FiveG, 15, "256QAM", 948.0, 7.4063, 22.7),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_sorted() {
        let table = ModulationCodingTable::default();
        assert!(ModulationCodingTable::new(table.entries().to_vec()).is_ok());
        assert!(table.supports(Generation::FourG));
        assert!(table.supports(Generation::FiveG));
    }

    #[test]
    fn test_lookup_uses_floor_semantics() {
        let table = ModulationCodingTable::default();
        assert_eq!(
            table.lookup(10.0, Generation::FourG, None),
            SpectralEfficiency::Found(1.9141)
        );
        assert_eq!(
            table.lookup(10.0, Generation::FiveG, None),
            SpectralEfficiency::Found(3.3223)
        );
        // 閾値ちょうどはその行に属する
        assert_eq!(
            table.lookup(8.1, Generation::FourG, Some("1x1")),
            SpectralEfficiency::Found(1.9141)
        );
    }

    #[test]
    fn test_lookup_boundaries() {
        let table = ModulationCodingTable::default();
        assert_eq!(
            table.lookup(22.7, Generation::FourG, None),
            SpectralEfficiency::AboveMaximum(5.5547)
        );
        assert_eq!(
            table.lookup(40.0, Generation::FiveG, None),
            SpectralEfficiency::AboveMaximum(7.4063)
        );
        assert_eq!(
            table.lookup(-6.8, Generation::FiveG, None),
            SpectralEfficiency::BelowMinimum
        );
        assert_eq!(table.lookup(-6.8, Generation::FiveG, None).value(), 0.0);
        assert_eq!(
            table.lookup(-6.7, Generation::FiveG, None),
            SpectralEfficiency::Found(0.1523)
        );
    }

    #[test]
    fn test_lookup_without_matching_rows() {
        let table = ModulationCodingTable::new(vec![ModulationCodingEntry::new(
            Generation::FourG,
            1,
            "QPSK",
            78.0,
            0.1523,
            -6.7,
        )])
        .unwrap();
        assert_eq!(
            table.lookup(5.0, Generation::FiveG, None),
            SpectralEfficiency::NoMatch
        );
        assert!(!table.supports(Generation::FiveG));
        assert_eq!(
            table.lookup(5.0, Generation::FourG, Some("2x2")),
            SpectralEfficiency::NoMatch
        );
    }

    #[test]
    fn test_single_row_table() {
        let table = ModulationCodingTable::new(vec![ModulationCodingEntry::new(
            Generation::FourG,
            1,
            "QPSK",
            78.0,
            0.1523,
            -6.7,
        )])
        .unwrap();
        assert_eq!(
            table.lookup(0.0, Generation::FourG, None),
            SpectralEfficiency::AboveMaximum(0.1523)
        );
        assert_eq!(
            table.lookup(-7.0, Generation::FourG, None),
            SpectralEfficiency::BelowMinimum
        );
    }

    #[test]
    fn test_unsorted_table_is_rejected() {
        let mut entries = ModulationCodingTable::default().entries().to_vec();
        entries.swap(3, 4);
        assert!(matches!(
            ModulationCodingTable::new(entries),
            Err(ModulationError::Unsorted {
                generation: Generation::FourG,
                ..
            })
        ));
        assert_eq!(ModulationCodingTable::new(Vec::new()), Err(ModulationError::Empty));
    }

    #[test]
    fn test_interleaved_transmission_types_are_rejected() {
        let entry = |kind: &str, cqi_index, spectral_efficiency, sinr_threshold_db| {
            ModulationCodingEntry {
                transmission_type: kind.to_string(),
                ..ModulationCodingEntry::new(
                    Generation::FourG,
                    cqi_index,
                    "QPSK",
                    78.0,
                    spectral_efficiency,
                    sinr_threshold_db,
                )
            }
        };
        // 1x1 と 2x2 はそれぞれ昇順だが、世代としては 22.7 dB の後に -6.7 dB が続く
        let entries = vec![
            entry("1x1", 1, 0.15, -6.7),
            entry("1x1", 2, 1.0, 5.0),
            entry("1x1", 3, 5.55, 22.7),
            entry("2x2", 1, 0.3, -6.7),
            entry("2x2", 2, 2.0, 5.0),
            entry("2x2", 3, 4.0, 15.0),
        ];
        assert_eq!(
            ModulationCodingTable::new(entries),
            Err(ModulationError::Unsorted {
                generation: Generation::FourG,
                cqi_index: 1,
                sinr_threshold_db: -6.7,
            })
        );
    }

    #[test]
    fn test_coding_rate_uses_x1024_for_both_generations() {
        let table = ModulationCodingTable::default();
        assert!(table.entries().iter().all(|entry| entry.coding_rate_x1024 > 1.0
            && entry.coding_rate_x1024 < 1024.0));
    }
}
