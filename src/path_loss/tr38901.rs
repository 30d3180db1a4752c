//! ETSI TR 138.901（3GPP TR 38.901）の経路損失モデル
//!
//! UMa・UMi（street canyon）・RMa の LOS/NLOS 式と、3〜6 GHz 帯で使用する
//! UMa NLOS optional 式を提供します。周波数は GHz、距離は m で扱います。

use std::f64::consts::PI;

use tracing::debug;

use crate::models::common::{math_utils::round_to, SightLine};
use crate::path_loss::{
    shadowing::log_normal_draw, IPathLossModel, PathLoss, PathLossError, PathLossInput,
    PropagationModel,
};

const SPEED_OF_LIGHT_M_S: f64 = 3.0e8;
/// 実効環境高（m）
const EFFECTIVE_ENVIRONMENT_HEIGHT_M: f64 = 1.0;
/// 2D距離の下限（m）
pub const MIN_DISTANCE_2D_M: f64 = 10.0;
/// RMa 式の適用上限（m）
pub const RMA_MAX_DISTANCE_M: f64 = 10_000.0;

/// シナリオ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tr38901Scenario {
    /// Urban Macro
    Uma,
    /// Urban Micro（street canyon）
    Umi,
    /// Rural Macro
    Rma,
}

impl Tr38901Scenario {
    pub fn model(&self) -> PropagationModel {
        match self {
            Tr38901Scenario::Uma => PropagationModel::Tr38901Uma,
            Tr38901Scenario::Umi => PropagationModel::Tr38901Umi,
            Tr38901Scenario::Rma => PropagationModel::Tr38901Rma,
        }
    }
}

/// パラメータ適用範囲の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applicability {
    pub building_height: bool,
    pub street_width: bool,
    pub tx_height: bool,
    pub rx_height: bool,
}

impl Applicability {
    pub fn is_compliant(&self) -> bool {
        self.building_height && self.street_width && self.tx_height && self.rx_height
    }
}

/// 建物高・道路幅・アンテナ高が式の適用範囲内かを判定
///
/// 5 ≤ 建物高 < 50、5 ≤ 道路幅 < 50、10 ≤ 基地局高 < 150、1 ≤ 端末高 < 10
pub fn check_applicability(
    building_height: f64,
    street_width: f64,
    tx_height: f64,
    rx_height: f64,
) -> Applicability {
    Applicability {
        building_height: (5.0..50.0).contains(&building_height),
        street_width: (5.0..50.0).contains(&street_width),
        tx_height: (10.0..150.0).contains(&tx_height),
        rx_height: (1.0..10.0).contains(&rx_height),
    }
}

/// 中央値損失と確率的成分の標準偏差
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MedianLoss {
    pub value_db: f64,
    pub sigma_db: f64,
}

/// UMa/UMi/RMa モデル
#[derive(Debug, Clone, Copy)]
pub struct Tr38901 {
    pub scenario: Tr38901Scenario,
    /// 適用範囲外のパラメータをエラーとするか（false ならログのみ）
    pub enforce_applicability: bool,
}

impl Tr38901 {
    pub fn new(scenario: Tr38901Scenario, enforce_applicability: bool) -> Self {
        Self {
            scenario,
            enforce_applicability,
        }
    }

    /// 確率的成分を含まない損失
    ///
    /// `distance_2d` は呼び出し側で下限処理済みの水平距離（m）です。
    pub fn median(&self, input: &PathLossInput, distance_2d: f64) -> MedianLoss {
        let f = input.frequency_ghz;
        let h_bs = input.tx_height;
        let h_ut = input.rx_height;
        let distance_3d = (distance_2d.powi(2) + (h_bs - h_ut).powi(2)).sqrt();

        match self.scenario {
            Tr38901Scenario::Uma => uma(distance_2d, distance_3d, f, h_bs, h_ut, input.sight),
            Tr38901Scenario::Umi => umi(distance_2d, distance_3d, f, h_bs, h_ut, input.sight),
            Tr38901Scenario::Rma => rma(
                distance_2d,
                distance_3d,
                f,
                h_bs,
                h_ut,
                input.building_height,
                input.street_width,
                input.sight,
            ),
        }
    }
}

/// 都市部の有効ブレークポイント距離 d'BP（m）
fn urban_breakpoint(f: f64, h_bs: f64, h_ut: f64) -> f64 {
    4.0 * (h_bs - EFFECTIVE_ENVIRONMENT_HEIGHT_M)
        * (h_ut - EFFECTIVE_ENVIRONMENT_HEIGHT_M)
        * f
        * 1e9
        / SPEED_OF_LIGHT_M_S
}

fn uma(d2d: f64, d3d: f64, f: f64, h_bs: f64, h_ut: f64, sight: SightLine) -> MedianLoss {
    let breakpoint = urban_breakpoint(f, h_bs, h_ut);
    let los = if d2d <= breakpoint {
        28.0 + 22.0 * d3d.log10() + 20.0 * f.log10()
    } else {
        28.0 + 40.0 * d3d.log10() + 20.0 * f.log10()
            - 9.0 * (breakpoint.powi(2) + (h_bs - h_ut).powi(2)).log10()
    };

    match sight {
        SightLine::Los => MedianLoss {
            value_db: los,
            sigma_db: 4.0,
        },
        SightLine::Nlos => {
            let nlos = 13.54 + 39.08 * d3d.log10() + 20.0 * f.log10() - 0.6 * (h_ut - 1.5);
            MedianLoss {
                value_db: los.max(nlos),
                sigma_db: 6.0,
            }
        }
    }
}

fn umi(d2d: f64, d3d: f64, f: f64, h_bs: f64, h_ut: f64, sight: SightLine) -> MedianLoss {
    let breakpoint = urban_breakpoint(f, h_bs, h_ut);
    let los = if d2d <= breakpoint {
        32.4 + 21.0 * d3d.log10() + 20.0 * f.log10()
    } else {
        32.4 + 40.0 * d3d.log10() + 20.0 * f.log10()
            - 9.5 * (breakpoint.powi(2) + (h_bs - h_ut).powi(2)).log10()
    };

    match sight {
        SightLine::Los => MedianLoss {
            value_db: los,
            sigma_db: 4.0,
        },
        SightLine::Nlos => {
            let nlos = 35.3 * d3d.log10() + 22.4 + 21.3 * f.log10() - 0.3 * (h_ut - 1.5);
            MedianLoss {
                value_db: los.max(nlos),
                sigma_db: 7.82,
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn rma(
    d2d: f64,
    d3d: f64,
    f: f64,
    h_bs: f64,
    h_ut: f64,
    building_height: f64,
    street_width: f64,
    sight: SightLine,
) -> MedianLoss {
    let h = building_height;
    let breakpoint = 2.0 * PI * h_bs * h_ut * f * 1e9 / SPEED_OF_LIGHT_M_S;

    let pl1 = |distance: f64| {
        20.0 * (40.0 * PI * distance * f / 3.0).log10()
            + (0.03 * h.powf(1.72)).min(10.0) * distance.log10()
            - (0.044 * h.powf(1.72)).min(14.77)
            + 0.002 * h.log10() * distance
    };

    let (los, los_sigma) = if d2d <= breakpoint {
        (pl1(d3d), 4.0)
    } else {
        let breakpoint_3d = (breakpoint.powi(2) + (h_bs - h_ut).powi(2)).sqrt();
        (pl1(breakpoint_3d) + 40.0 * (d3d / breakpoint_3d).log10(), 6.0)
    };

    match sight {
        SightLine::Los => MedianLoss {
            value_db: los,
            sigma_db: los_sigma,
        },
        SightLine::Nlos => {
            let nlos = 161.04 - 7.1 * street_width.log10() + 7.5 * h.log10()
                - (24.37 - 3.7 * (h / h_bs).powi(2)) * h_bs.log10()
                + (43.42 - 3.1 * h_bs.log10()) * (d3d.log10() - 3.0)
                + 20.0 * f.log10()
                - (3.2 * (11.75 * h_ut).log10().powi(2) - 4.97);
            MedianLoss {
                value_db: los.max(nlos),
                sigma_db: 8.0,
            }
        }
    }
}

impl IPathLossModel for Tr38901 {
    fn model(&self) -> PropagationModel {
        self.scenario.model()
    }

    fn evaluate(&self, input: &PathLossInput) -> Result<PathLoss, PathLossError> {
        let distance_2d = input.distance_m.max(MIN_DISTANCE_2D_M);

        if self.scenario == Tr38901Scenario::Rma && distance_2d > RMA_MAX_DISTANCE_M {
            return UmaNlosOptional.evaluate(input);
        }

        let applicability = check_applicability(
            input.building_height,
            input.street_width,
            input.tx_height,
            input.rx_height,
        );
        if !applicability.is_compliant() {
            if self.enforce_applicability {
                return Err(PathLossError::NotApplicable {
                    building_height: input.building_height,
                    street_width: input.street_width,
                    tx_height: input.tx_height,
                    rx_height: input.rx_height,
                });
            }
            debug!(
                model = %self.model(),
                building_height = input.building_height,
                street_width = input.street_width,
                tx_height = input.tx_height,
                rx_height = input.rx_height,
                "PATH_LOSS_NOT_APPLICABLE: 適用範囲外のパラメータで計算します"
            );
        }

        let median = self.median(input, distance_2d);
        let random_variation = log_normal_draw(
            input.frequency_ghz,
            1.0,
            median.sigma_db,
            input.iterations,
            input.seed,
        )?;

        Ok(PathLoss {
            value_db: round_to(median.value_db + random_variation, 2),
            model: self.model(),
        })
    }
}

/// UMa NLOS optional 式（3 GHz 超の簡易モデル）
#[derive(Debug, Clone, Copy, Default)]
pub struct UmaNlosOptional;

impl UmaNlosOptional {
    pub const SIGMA_DB: f64 = 7.8;

    /// `32.4 + 20·log10(f) + 30·log10(d3D)`
    pub fn median(frequency_ghz: f64, distance_m: f64, tx_height: f64, rx_height: f64) -> f64 {
        let distance_3d = (distance_m.powi(2) + (tx_height - rx_height).powi(2)).sqrt();
        32.4 + 20.0 * frequency_ghz.log10() + 30.0 * distance_3d.log10()
    }
}

impl IPathLossModel for UmaNlosOptional {
    fn model(&self) -> PropagationModel {
        PropagationModel::UmaNlosOptional
    }

    fn evaluate(&self, input: &PathLossInput) -> Result<PathLoss, PathLossError> {
        let median = Self::median(
            input.frequency_ghz,
            input.distance_m,
            input.tx_height,
            input.rx_height,
        );
        let random_variation = log_normal_draw(
            input.frequency_ghz,
            1.0,
            Self::SIGMA_DB,
            input.iterations,
            input.seed,
        )?;

        Ok(PathLoss {
            value_db: round_to(median + random_variation, 2),
            model: self.model(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_loss::tests::input;

    fn rounded_median(model: &Tr38901, input: &PathLossInput) -> f64 {
        round_to(model.median(input, input.distance_m.max(MIN_DISTANCE_2D_M)).value_db, 2)
    }

    #[test]
    fn test_uma_nlos_optional_reference_values() {
        let cases = [
            (1000.41, 133.29),
            (5000.08, 154.25),
            (10000.04, 163.28),
            (20000.02, 172.31),
        ];
        for (distance, expected) in cases {
            let actual = round_to(UmaNlosOptional::median(3.5, distance, 30.0, 1.5), 2);
            assert_eq!(actual, expected, "distance {}", distance);
        }
    }

    #[test]
    fn test_uma_reference_values() {
        let model = Tr38901::new(Tr38901Scenario::Uma, false);
        let mut los = input(3.5, 500.0);
        los.sight = SightLine::Los;
        assert_eq!(rounded_median(&model, &los), 98.27);
        assert_eq!(rounded_median(&model, &input(3.5, 500.0)), 129.92);
        assert_eq!(model.median(&input(3.5, 500.0), 500.0).sigma_db, 6.0);
    }

    #[test]
    fn test_umi_reference_values() {
        let model = Tr38901::new(Tr38901Scenario::Umi, false);
        let mut los = input(3.5, 100.0);
        los.tx_height = 10.0;
        los.sight = SightLine::Los;
        assert_eq!(rounded_median(&model, &los), 85.31);
        let mut nlos = los.clone();
        nlos.sight = SightLine::Nlos;
        assert_eq!(rounded_median(&model, &nlos), 104.64);
    }

    #[test]
    fn test_rma_reference_values() {
        let model = Tr38901::new(Tr38901Scenario::Rma, false);
        let mut los = input(0.7, 2000.0);
        los.sight = SightLine::Los;
        assert_eq!(rounded_median(&model, &los), 113.73);
        assert_eq!(rounded_median(&model, &input(0.7, 2000.0)), 136.59);
    }

    #[test]
    fn test_nlos_is_never_below_los() {
        for scenario in [Tr38901Scenario::Uma, Tr38901Scenario::Umi, Tr38901Scenario::Rma] {
            let model = Tr38901::new(scenario, false);
            for distance in [15.0, 50.0, 200.0, 800.0, 3000.0, 8000.0] {
                let mut los = input(2.6, distance);
                los.sight = SightLine::Los;
                let nlos = input(2.6, distance);
                assert!(
                    model.median(&nlos, distance).value_db
                        >= model.median(&los, distance).value_db
                );
            }
        }
    }

    #[test]
    fn test_short_distance_is_clamped() {
        let model = Tr38901::new(Tr38901Scenario::Uma, false);
        let near = model.evaluate(&input(3.5, 1.0)).unwrap();
        let clamped = model.evaluate(&input(3.5, MIN_DISTANCE_2D_M)).unwrap();
        assert_eq!(near, clamped);
    }

    #[test]
    fn test_rma_beyond_range_falls_back() {
        let model = Tr38901::new(Tr38901Scenario::Rma, false);
        let loss = model.evaluate(&input(0.7, 15_000.0)).unwrap();
        assert_eq!(loss.model, PropagationModel::UmaNlosOptional);
    }

    #[test]
    fn test_applicability_check() {
        assert!(check_applicability(20.0, 20.0, 30.0, 1.5).is_compliant());
        let result = check_applicability(60.0, 20.0, 30.0, 1.5);
        assert!(!result.is_compliant());
        assert!(!result.building_height);
        assert!(!check_applicability(20.0, 4.0, 30.0, 1.5).is_compliant());
        assert!(!check_applicability(20.0, 20.0, 8.0, 1.5).is_compliant());
        assert!(!check_applicability(20.0, 20.0, 30.0, 10.0).is_compliant());
    }

    #[test]
    fn test_applicability_enforcement() {
        let mut outside = input(3.5, 500.0);
        outside.building_height = 60.0;

        let permissive = Tr38901::new(Tr38901Scenario::Uma, false);
        assert!(permissive.evaluate(&outside).is_ok());

        let strict = Tr38901::new(Tr38901Scenario::Uma, true);
        assert!(matches!(
            strict.evaluate(&outside),
            Err(PathLossError::NotApplicable { .. })
        ));
    }
}
