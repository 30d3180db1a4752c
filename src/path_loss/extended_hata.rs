//! Extended Hata モデル（ITU-R SM.2028-2、30 MHz〜4 GHz）

use crate::models::common::{math_utils::round_to, Environment};
use crate::path_loss::{
    shadowing::log_normal_draw, IPathLossModel, PathLoss, PathLossError, PathLossInput,
    PropagationModel,
};

/// 最大適用距離（km、この値以上はエラー）
pub const MAX_DISTANCE_KM: f64 = 100.0;

const NEAR_FIELD_KM: f64 = 0.04;
const HATA_MIN_KM: f64 = 0.1;

/// Extended Hata モデル
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedHata;

impl ExtendedHata {
    /// 確率的成分を含まない中央値損失（dB）
    ///
    /// # 引数
    ///
    /// * `frequency_mhz` - 周波数（MHz、30 < f ≤ 4000）
    /// * `distance_km` - 距離（km、100 km 未満）
    /// * `tx_height` / `rx_height` - アンテナ高（m）
    /// * `environment` - 郊外・ルーラルでは補正項を適用
    pub fn median(
        frequency_mhz: f64,
        distance_km: f64,
        tx_height: f64,
        rx_height: f64,
        environment: Environment,
    ) -> Result<f64, PathLossError> {
        if !(frequency_mhz > 30.0 && frequency_mhz <= 4000.0) {
            return Err(PathLossError::InvalidHataFrequency(frequency_mhz));
        }
        if !(distance_km >= 0.0) || distance_km >= MAX_DISTANCE_KM {
            return Err(PathLossError::DistanceOutOfRange(distance_km));
        }

        let hm = tx_height.min(rx_height);
        let hb = tx_height.max(rx_height);

        let near_field = |d: f64| {
            32.4 + 20.0 * frequency_mhz.log10() + 10.0 * (d.powi(2) + (hb - hm).powi(2) / 1e6).log10()
        };

        if distance_km < NEAR_FIELD_KM {
            return Ok(near_field(distance_km));
        }

        if distance_km < HATA_MIN_KM {
            // 0.04 km と 0.1 km の値を対数距離で補間
            let lower = near_field(NEAR_FIELD_KM);
            let upper = near_field(HATA_MIN_KM);
            let fraction = (distance_km.log10() - NEAR_FIELD_KM.log10())
                / (HATA_MIN_KM.log10() - NEAR_FIELD_KM.log10());
            return Ok(lower + fraction * (upper - lower));
        }

        let log_f = frequency_mhz.log10();
        let alpha_hm = (1.1 * log_f - 0.7) * hm.min(10.0) - (1.56 * log_f - 0.8)
            + (20.0 * (hm / 10.0).log10()).max(0.0);
        let beta_hb = (20.0 * (hb / 30.0).log10()).min(0.0);

        let alpha_exponent = if distance_km <= 20.0 {
            1.0
        } else {
            1.0 + (0.14 + 1.87e-4 * frequency_mhz + 1.07e-3 * hb)
                * (distance_km / 20.0).log10().powf(0.8)
        };

        let effective_hb = hb.max(30.0);
        let frequency_term = if frequency_mhz <= 150.0 {
            69.6 + 26.2 * 150f64.log10() - 20.0 * (150.0 / frequency_mhz).log10()
        } else if frequency_mhz <= 1500.0 {
            69.6 + 26.2 * log_f
        } else if frequency_mhz <= 2000.0 {
            46.3 + 33.9 * log_f
        } else {
            46.3 + 33.9 * 2000f64.log10() + 10.0 * (frequency_mhz / 2000.0).log10()
        };

        let urban = frequency_term - 13.82 * effective_hb.log10()
            + (44.9 - 6.55 * effective_hb.log10()) * distance_km.log10().powf(alpha_exponent)
            - alpha_hm
            - beta_hb;

        let clutter_frequency = frequency_mhz.clamp(150.0, 2000.0);
        let path_loss = match environment {
            Environment::Urban => urban,
            Environment::Suburban => {
                urban - 2.0 * (clutter_frequency / 28.0).log10().powi(2) - 5.4
            }
            Environment::Rural => {
                urban - 4.78 * clutter_frequency.log10().powi(2)
                    + 18.33 * clutter_frequency.log10()
                    - 40.94
            }
        };

        Ok(path_loss)
    }

    /// 確率的成分の標準偏差（dB）
    ///
    /// `above_roof` は 1（屋根上）または 0（屋根下）のみ有効です。
    pub fn shadowing_sigma(distance_km: f64, above_roof: u8) -> Result<f64, PathLossError> {
        let roof_sigma = match above_roof {
            1 => 12.0,
            0 => 17.0,
            other => return Err(PathLossError::AmbiguousRoofRelation(other)),
        };

        // 区間内は端点間の線形補間（区間幅で割る形に正した式で、0.02 km のずれは持たない）
        let sigma = if distance_km <= NEAR_FIELD_KM {
            3.5
        } else if distance_km <= HATA_MIN_KM {
            3.5 + (roof_sigma - 3.5) / (HATA_MIN_KM - NEAR_FIELD_KM) * (distance_km - NEAR_FIELD_KM)
        } else if distance_km <= 0.2 {
            roof_sigma
        } else if distance_km <= 0.6 {
            roof_sigma + (9.0 - roof_sigma) / (0.6 - 0.2) * (distance_km - 0.2)
        } else {
            12.0
        };

        Ok(sigma)
    }
}

impl IPathLossModel for ExtendedHata {
    fn model(&self) -> PropagationModel {
        PropagationModel::ExtendedHata
    }

    fn evaluate(&self, input: &PathLossInput) -> Result<PathLoss, PathLossError> {
        let frequency_mhz = input.frequency_ghz * 1000.0;
        let distance_km = input.distance_m / 1000.0;

        let median = Self::median(
            frequency_mhz,
            distance_km,
            input.tx_height,
            input.rx_height,
            input.environment,
        )?;
        let sigma = Self::shadowing_sigma(distance_km, input.above_roof)?;
        let random_variation =
            log_normal_draw(frequency_mhz, 1.0, sigma, input.iterations, input.seed)?;

        Ok(PathLoss {
            value_db: round_to(median + random_variation, 2),
            model: self.model(),
        })
    }
}
