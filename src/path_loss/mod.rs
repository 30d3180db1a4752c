//! # Path Loss モジュール
//!
//! 送受信点間の経路損失（dB）を推定するモデル群です。
//!
//! ## モデル選択
//!
//! | バリアント | 周波数 | モデル |
//! |---|---|---|
//! | `Legacy` | 0.03 < f ≤ 3 GHz | 自由空間と Extended Hata の大きい方 |
//! | `Legacy` | 3 < f < 6 GHz | UMa NLOS optional |
//! | `Tr38901` | 0.05 < f ≤ 100 GHz | UMi / UMa / RMa（自由空間を下限とする） |
//!
//! 屋内端末には建物侵入損失を加算し、最終値は小数点以下2桁に丸めます。

pub mod extended_hata;
pub mod free_space;
pub mod shadowing;
pub mod tr38901;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::common::{math_utils::round_to, AntennaType, Environment, SightLine};

pub use extended_hata::ExtendedHata;
pub use free_space::FreeSpace;
pub use tr38901::{check_applicability, Applicability, Tr38901, Tr38901Scenario, UmaNlosOptional};

/// 経路損失計算エラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathLossError {
    #[error("周波数 {0} GHz は対応範囲外です")]
    FrequencyOutOfRange(f64),

    #[error("周波数 {0} MHz は Extended Hata の適用範囲 (30〜4000 MHz) 外です")]
    InvalidHataFrequency(f64),

    #[error("距離 {0} km は適用範囲 (100 km 未満) 外です")]
    DistanceOutOfRange(f64),

    #[error("伝搬路が屋根上か屋根下か判定できません (above_roof = {0})")]
    AmbiguousRoofRelation(u8),

    #[error(
        "TR 38.901 の適用範囲外です: 建物高 {building_height} m, 道路幅 {street_width} m, \
         基地局高 {tx_height} m, 端末高 {rx_height} m"
    )]
    NotApplicable {
        building_height: f64,
        street_width: f64,
        tx_height: f64,
        rx_height: f64,
    },

    #[error("対数正規分布のパラメータが不正です: mu = {mu}, sigma = {sigma}")]
    InvalidDistribution { mu: f64, sigma: f64 },
}

/// 採用された伝搬モデル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropagationModel {
    #[serde(rename = "free_space_path_loss")]
    FreeSpace,
    #[serde(rename = "extended_hata_path_loss")]
    ExtendedHata,
    #[serde(rename = "uma_nlos_optional")]
    UmaNlosOptional,
    #[serde(rename = "etsi_tr138901_uma")]
    Tr38901Uma,
    #[serde(rename = "etsi_tr138901_umi")]
    Tr38901Umi,
    #[serde(rename = "etsi_tr138901_rma")]
    Tr38901Rma,
}

impl PropagationModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationModel::FreeSpace => "free_space_path_loss",
            PropagationModel::ExtendedHata => "extended_hata_path_loss",
            PropagationModel::UmaNlosOptional => "uma_nlos_optional",
            PropagationModel::Tr38901Uma => "etsi_tr138901_uma",
            PropagationModel::Tr38901Umi => "etsi_tr138901_umi",
            PropagationModel::Tr38901Rma => "etsi_tr138901_rma",
        }
    }
}

impl fmt::Display for PropagationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// モデル選択方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathLossVariant {
    #[default]
    Legacy,
    Tr38901,
}

/// 経路損失計算の入力
#[derive(Debug, Clone, PartialEq)]
pub struct PathLossInput {
    pub frequency_ghz: f64,
    pub distance_m: f64,
    pub tx_height: f64,
    pub antenna_type: AntennaType,
    pub building_height: f64,
    pub street_width: f64,
    pub environment: Environment,
    pub sight: SightLine,
    pub rx_height: f64,
    /// 1: 屋根上, 0: 屋根下
    pub above_roof: u8,
    pub indoor: bool,
    pub seed: Option<u64>,
    pub iterations: usize,
}

/// 経路損失と採用モデル
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathLoss {
    pub value_db: f64,
    pub model: PropagationModel,
}

/// 経路損失モデルのインターフェース
pub trait IPathLossModel: Send + Sync {
    /// 結果に付与するモデル名
    fn model(&self) -> PropagationModel;

    /// 確率的成分を含む経路損失を計算（屋内損失は含まない）
    fn evaluate(&self, input: &PathLossInput) -> Result<PathLoss, PathLossError>;
}

/// 周波数帯・局種別から決まるモデル系統
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// 自由空間と Extended Hata を比較
    FreeSpaceOrHata,
    UmaNlosOptional,
    /// TR 38.901 シナリオ（自由空間を下限とする）
    Tr38901(Tr38901Scenario),
}

/// モデル系統を選択
pub fn select_model_family(
    variant: PathLossVariant,
    frequency_ghz: f64,
    antenna_type: AntennaType,
    environment: Environment,
) -> Result<ModelFamily, PathLossError> {
    match variant {
        PathLossVariant::Legacy => {
            if frequency_ghz > 0.03 && frequency_ghz <= 3.0 {
                Ok(ModelFamily::FreeSpaceOrHata)
            } else if frequency_ghz > 3.0 && frequency_ghz < 6.0 {
                Ok(ModelFamily::UmaNlosOptional)
            } else {
                Err(PathLossError::FrequencyOutOfRange(frequency_ghz))
            }
        }
        PathLossVariant::Tr38901 => {
            if !(frequency_ghz > 0.05 && frequency_ghz <= 100.0) {
                return Err(PathLossError::FrequencyOutOfRange(frequency_ghz));
            }
            let scenario = match (antenna_type, environment) {
                (AntennaType::Micro, _) => Tr38901Scenario::Umi,
                (AntennaType::Macro, Environment::Rural) => Tr38901Scenario::Rma,
                (AntennaType::Macro, _) => Tr38901Scenario::Uma,
            };
            Ok(ModelFamily::Tr38901(scenario))
        }
    }
}

/// 自由空間損失を下限として採用値を決定
///
/// 候補が自由空間損失を下回る場合は自由空間損失を採用します。
pub fn determine_path_loss(free_space: PathLoss, candidate: PathLoss) -> PathLoss {
    if candidate.value_db < free_space.value_db {
        free_space
    } else {
        candidate
    }
}

/// モデル選択から屋内損失加算までを行う計算器
#[derive(Debug, Clone, Copy, Default)]
pub struct PathLossCalculator {
    pub variant: PathLossVariant,
    pub enforce_applicability: bool,
}

impl PathLossCalculator {
    pub fn new(variant: PathLossVariant, enforce_applicability: bool) -> Self {
        Self {
            variant,
            enforce_applicability,
        }
    }

    /// 経路損失を計算
    pub fn calculate(&self, input: &PathLossInput) -> Result<PathLoss, PathLossError> {
        let family = select_model_family(
            self.variant,
            input.frequency_ghz,
            input.antenna_type,
            input.environment,
        )?;

        let outdoor = match family {
            ModelFamily::FreeSpaceOrHata => {
                determine_path_loss(FreeSpace.evaluate(input)?, ExtendedHata.evaluate(input)?)
            }
            ModelFamily::UmaNlosOptional => UmaNlosOptional.evaluate(input)?,
            ModelFamily::Tr38901(scenario) => determine_path_loss(
                FreeSpace.evaluate(input)?,
                Tr38901::new(scenario, self.enforce_applicability).evaluate(input)?,
            ),
        };

        let indoor_loss =
            shadowing::outdoor_to_indoor_path_loss(input.frequency_ghz, input.indoor, input.seed)?;

        Ok(PathLoss {
            value_db: round_to(outdoor.value_db + indoor_loss, 2),
            model: outdoor.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 30 m マクロ局・都市部 NLOS・屋外端末の入力
    pub fn input(frequency_ghz: f64, distance_m: f64) -> PathLossInput {
        PathLossInput {
            frequency_ghz,
            distance_m,
            tx_height: 30.0,
            antenna_type: AntennaType::Macro,
            building_height: 20.0,
            street_width: 20.0,
            environment: Environment::Urban,
            sight: SightLine::Nlos,
            rx_height: 1.5,
            above_roof: 0,
            indoor: false,
            seed: Some(1),
            iterations: 5,
        }
    }

    fn loss(value_db: f64, model: PropagationModel) -> PathLoss {
        PathLoss { value_db, model }
    }

    #[test]
    fn test_determine_path_loss_uses_free_space_floor() {
        let result = determine_path_loss(
            loss(200.0, PropagationModel::FreeSpace),
            loss(100.0, PropagationModel::ExtendedHata),
        );
        assert_eq!(result, loss(200.0, PropagationModel::FreeSpace));

        let result = determine_path_loss(
            loss(100.0, PropagationModel::FreeSpace),
            loss(200.0, PropagationModel::ExtendedHata),
        );
        assert_eq!(result, loss(200.0, PropagationModel::ExtendedHata));
    }

    #[test]
    fn test_legacy_band_selection() {
        let select = |f| {
            select_model_family(PathLossVariant::Legacy, f, AntennaType::Macro, Environment::Urban)
        };
        assert_eq!(select(0.7), Ok(ModelFamily::FreeSpaceOrHata));
        assert_eq!(select(3.0), Ok(ModelFamily::FreeSpaceOrHata));
        assert_eq!(select(3.5), Ok(ModelFamily::UmaNlosOptional));
        assert_eq!(select(0.01), Err(PathLossError::FrequencyOutOfRange(0.01)));
        assert_eq!(select(0.03), Err(PathLossError::FrequencyOutOfRange(0.03)));
        assert_eq!(select(6.0), Err(PathLossError::FrequencyOutOfRange(6.0)));
    }

    #[test]
    fn test_tr38901_scenario_selection() {
        let select = |f, antenna, env| select_model_family(PathLossVariant::Tr38901, f, antenna, env);
        assert_eq!(
            select(3.5, AntennaType::Micro, Environment::Urban),
            Ok(ModelFamily::Tr38901(Tr38901Scenario::Umi))
        );
        assert_eq!(
            select(3.5, AntennaType::Macro, Environment::Suburban),
            Ok(ModelFamily::Tr38901(Tr38901Scenario::Uma))
        );
        assert_eq!(
            select(0.7, AntennaType::Macro, Environment::Rural),
            Ok(ModelFamily::Tr38901(Tr38901Scenario::Rma))
        );
        assert!(select(26.0, AntennaType::Micro, Environment::Urban).is_ok());
        assert!(select(0.05, AntennaType::Macro, Environment::Urban).is_err());
        assert!(select(120.0, AntennaType::Macro, Environment::Urban).is_err());
    }

    #[test]
    fn test_calculator_high_band_uses_uma_nlos_optional() {
        let mut request = input(3.5, 500.0);
        request.tx_height = 35.0;
        let result = PathLossCalculator::default().calculate(&request).unwrap();
        assert_eq!(result.model, PropagationModel::UmaNlosOptional);
        assert!(result.value_db >= 124.28);
        assert_eq!(result.value_db, round_to(result.value_db, 2));
    }

    #[test]
    fn test_calculator_low_band_is_never_below_free_space() {
        let calculator = PathLossCalculator::default();
        for distance in [20.0, 90.0, 200.0, 1000.0, 5000.0] {
            let result = calculator.calculate(&input(0.7, distance)).unwrap();
            let free_space = FreeSpace.evaluate(&input(0.7, distance)).unwrap();
            assert!(result.value_db >= free_space.value_db);
            assert!(matches!(
                result.model,
                PropagationModel::FreeSpace | PropagationModel::ExtendedHata
            ));
        }
    }

    #[test]
    fn test_calculator_is_repeatable() {
        let calculator = PathLossCalculator::default();
        let first = calculator.calculate(&input(1.8, 700.0)).unwrap();
        let second = calculator.calculate(&input(1.8, 700.0)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_indoor_receiver_adds_penetration_loss() {
        let calculator = PathLossCalculator::default();
        let outdoor = calculator.calculate(&input(0.7, 400.0)).unwrap();
        let mut indoor_request = input(0.7, 400.0);
        indoor_request.indoor = true;
        let indoor = calculator.calculate(&indoor_request).unwrap();
        assert!(indoor.value_db > outdoor.value_db);
    }

    #[test]
    fn test_calculator_rejects_out_of_range_frequency() {
        let result = PathLossCalculator::default().calculate(&input(0.01, 500.0));
        assert_eq!(result, Err(PathLossError::FrequencyOutOfRange(0.01)));
    }

    #[test]
    fn test_calculator_tr38901_is_floored_by_free_space() {
        let calculator = PathLossCalculator::new(PathLossVariant::Tr38901, false);
        let result = calculator.calculate(&input(3.5, 300.0)).unwrap();
        let free_space = FreeSpace.evaluate(&input(3.5, 300.0)).unwrap();
        assert!(result.value_db >= free_space.value_db);
        assert_eq!(result.model, PropagationModel::Tr38901Uma);
    }

    #[test]
    fn test_propagation_model_names() {
        assert_eq!(PropagationModel::FreeSpace.to_string(), "free_space_path_loss");
        assert_eq!(PropagationModel::ExtendedHata.to_string(), "extended_hata_path_loss");
        assert_eq!(PropagationModel::Tr38901Rma.as_str(), "etsi_tr138901_rma");
    }
}
