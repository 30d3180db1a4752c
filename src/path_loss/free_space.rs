use crate::models::common::math_utils::round_to;
use crate::path_loss::{
    shadowing::log_normal_draw, IPathLossModel, PathLoss, PathLossError, PathLossInput,
    PropagationModel,
};

/// 自由空間伝搬の確率的成分の標準偏差（dB）
const FREE_SPACE_SIGMA_DB: f64 = 2.5;

/// 自由空間伝搬モデル
///
/// 他のモデルの結果が自由空間損失を下回る場合の下限としても使用されます。
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeSpace;

impl FreeSpace {
    /// 確率的成分を含まない自由空間損失（dB）
    ///
    /// # 引数
    ///
    /// * `frequency_mhz` - 周波数（MHz）
    /// * `distance_km` - 水平距離（km）
    /// * `tx_height` - 送信アンテナ高（m）
    /// * `rx_height` - 受信アンテナ高（m）
    pub fn median(frequency_mhz: f64, distance_km: f64, tx_height: f64, rx_height: f64) -> f64 {
        let height_difference_km = (tx_height - rx_height) / 1000.0;
        32.4 + 10.0 * (height_difference_km.powi(2) + distance_km.powi(2)).log10()
            + 20.0 * frequency_mhz.log10()
    }
}

impl IPathLossModel for FreeSpace {
    fn model(&self) -> PropagationModel {
        PropagationModel::FreeSpace
    }

    fn evaluate(&self, input: &PathLossInput) -> Result<PathLoss, PathLossError> {
        let frequency_mhz = input.frequency_ghz * 1000.0;
        let distance_km = input.distance_m / 1000.0;

        let random_variation = log_normal_draw(
            frequency_mhz,
            1.0,
            FREE_SPACE_SIGMA_DB,
            input.iterations,
            input.seed,
        )?;

        let value = Self::median(frequency_mhz, distance_km, input.tx_height, input.rx_height)
            + random_variation;

        Ok(PathLoss {
            value_db: round_to(value, 2),
            model: self.model(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_loss::tests::input;

    #[test]
    fn test_free_space_median_matches_reference_values() {
        let cases = [
            (800.0, 1.0, 90.46),
            (800.0, 5.0, 104.44),
            (1800.0, 1.0, 97.51),
            (1800.0, 3.0, 107.05),
            (2600.0, 2.0, 106.72),
        ];
        for (frequency_mhz, distance_km, expected) in cases {
            let actual = round_to(FreeSpace::median(frequency_mhz, distance_km, 20.0, 1.5), 2);
            assert_eq!(actual, expected, "f={} d={}", frequency_mhz, distance_km);
        }
    }

    #[test]
    fn test_free_space_increases_with_distance() {
        let mut previous = f64::NEG_INFINITY;
        for step in 1..100 {
            let value = FreeSpace::median(700.0, step as f64 * 0.1, 30.0, 1.5);
            assert!(value > previous);
            previous = value;
        }
    }

    #[test]
    fn test_free_space_adds_stochastic_component() {
        let loss = FreeSpace.evaluate(&input(0.8, 1000.0)).unwrap();
        let median = round_to(FreeSpace::median(800.0, 1.0, 30.0, 1.5), 2);
        assert_eq!(loss.model, PropagationModel::FreeSpace);
        assert!(loss.value_db >= median);
    }
}
