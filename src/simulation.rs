//! # Simulation モジュール
//!
//! 1つのサービングセルと周囲の干渉セルからなる系について、セル領域内の
//! 各受信端末のリンクバジェットを推定します。
//!
//! ## 受信端末ごとの処理順序
//!
//! 1. **経路損失**: サービングセルとの距離・見通しから経路損失を計算（`seed_value1`）
//! 2. **受信電力**: `EIRP − 経路損失 − その他損失 + 端末利得 − 端末損失`
//! 3. **干渉**: 全干渉セルについて同様に受信電力を計算（`seed_value2`）
//! 4. **雑音**: 熱雑音 + 雑音指数 1.5 dB
//! 5. **SINR**: 上位3干渉源の線形和 × ネットワーク負荷率 + 雑音で除算
//! 6. **周波数利用効率**: MCS テーブル参照
//! 7. **容量**: 帯域幅 × 周波数利用効率、セル面積で正規化
//!
//! 受信端末は `rayon` で並列に評価し、結果は受信端末の登録順で返します。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! let manager = SimulationManager::new(
//!     &layout.transmitter,
//!     &layout.interfering_transmitters,
//!     receivers,
//!     layout.site_area,
//!     &TransmitterParameters::default(),
//! )?;
//! let results = manager.estimate_link_budget(&radio, &table, &SimulationParameters::default())?;
//! ```

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::modulation::ModulationCodingTable;
use crate::models::{
    common::{math_utils::round_to, Environment, Generation, SightLine},
    receiver::Receiver,
    site_area::SiteArea,
    traits::{IRadiator, ISite},
    transmitter::{InterferingTransmitter, SiteRecord, Transmitter, TransmitterParameters},
};
use crate::path_loss::{
    PathLoss, PathLossCalculator, PathLossError, PathLossInput, PathLossVariant, PropagationModel,
};

/// ボルツマン定数（J/K）
const BOLTZMANN: f64 = 1.38e-23;
/// 雑音温度（K）
const NOISE_TEMPERATURE_K: f64 = 290.0;
/// 受信機雑音指数（dB）
const NOISE_FIGURE_DB: f64 = 1.5;
/// SINR 計算に含める干渉源の数
const MAX_INTERFERERS_IN_SINR: usize = 3;

/// シミュレーションエラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    PathLoss(#[from] PathLossError),

    #[error("MCS テーブルに {0} の行がありません")]
    UnsupportedGeneration(Generation),

    #[error("{kind} ID が重複しています: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("セル領域 {id} の面積が不正です: {area} m²")]
    InvalidSiteArea { id: String, area: f64 },
}

/// 実行パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// サービングセル経路損失のシード
    pub seed_value1: Option<u64>,
    /// 干渉セル経路損失のシード
    pub seed_value2: Option<u64>,
    /// 確率的成分の試行回数
    pub iterations: usize,
    /// ネットワーク負荷率（%）
    pub network_load: f64,
    /// 見通し判定距離（m）
    pub los_distance_m: f64,
    pub building_height: f64,
    pub street_width: f64,
    /// 1: 屋根上, 0: 屋根下
    pub above_roof: u8,
    pub variant: PathLossVariant,
    pub enforce_applicability: bool,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            seed_value1: Some(1),
            seed_value2: Some(2),
            iterations: 5,
            network_load: 50.0,
            los_distance_m: 250.0,
            building_height: 20.0,
            street_width: 20.0,
            above_roof: 0,
            variant: PathLossVariant::Legacy,
            enforce_applicability: false,
        }
    }
}

/// 無線構成（周波数・帯域幅・世代・環境）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioConfig {
    /// 搬送波周波数（GHz）
    pub frequency: f64,
    /// 帯域幅（MHz）
    pub bandwidth: f64,
    pub generation: Generation,
    pub environment: Environment,
}

/// 1送信所から1受信端末への伝搬推定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathEstimate {
    pub path_loss: PathLoss,
    pub distance_m: f64,
    pub sight: SightLine,
}

/// 干渉の集計
#[derive(Debug, Clone, PartialEq)]
pub struct InterferenceEstimate {
    /// 干渉セルごとの受信電力（dBm、干渉セルの登録順）
    pub received_powers: Vec<f64>,
    /// 最後に評価した干渉セルの伝搬モデル
    pub model: Option<PropagationModel>,
    /// 平均距離（m、干渉セルなしなら0）
    pub average_distance: f64,
    /// 平均経路損失（dB、干渉セルなしなら0）
    pub average_path_loss: f64,
}

/// SINR 計算の中間値
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinrEstimate {
    pub received_power: f64,
    /// 上位干渉源の線形和 × 負荷率
    pub interference_linear: f64,
    pub noise: f64,
    /// 干渉 + 雑音の線形和
    pub i_plus_n_linear: f64,
    pub sinr: f64,
}

/// 受信端末1台分のリンクバジェット
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkBudgetResult {
    pub id: String,
    pub path_loss: f64,
    pub r_model: PropagationModel,
    pub type_of_sight: SightLine,
    pub distance: f64,
    pub ave_distance: f64,
    pub ave_inf_pl: f64,
    pub i_model: Option<PropagationModel>,
    pub received_power: f64,
    /// 干渉の線形和の log10（干渉セルなし、または負荷率 0 なら `None`）
    pub interference: Option<f64>,
    pub noise: f64,
    pub i_plus_n: f64,
    pub network_load: f64,
    pub sinr: f64,
    pub spectral_efficiency: f64,
    pub modulation_outcome: &'static str,
    pub capacity_mbps: f64,
    pub capacity_mbps_km2: f64,
    pub receiver_x: f64,
    pub receiver_y: f64,
}

/// リンクバジェットシミュレータ
///
/// 送信所のアンテナ構成は構築時に確定します。マスト高やアンテナ種別を変える
/// 場合は新しいインスタンスを作成してください。
#[derive(Debug, Clone)]
pub struct SimulationManager {
    pub transmitter: Transmitter,
    pub interfering_transmitters: Vec<InterferingTransmitter>,
    pub receivers: Vec<Receiver>,
    pub site_area: SiteArea,
}

impl SimulationManager {
    pub fn new(
        transmitter: &SiteRecord,
        interfering_transmitters: &[SiteRecord],
        receivers: Vec<Receiver>,
        site_area: SiteArea,
        parameters: &TransmitterParameters,
    ) -> Result<Self, SimulationError> {
        ensure_unique("interfering transmitter", interfering_transmitters.iter().map(|s| &s.id))?;
        ensure_unique("receiver", receivers.iter().map(|r| &r.id))?;
        // 送信所・干渉セル・受信端末をまたいでも ID は一意
        ensure_unique(
            "site",
            std::iter::once(&transmitter.id)
                .chain(interfering_transmitters.iter().map(|s| &s.id))
                .chain(receivers.iter().map(|r| &r.id)),
        )?;

        if !(site_area.area > 0.0) {
            return Err(SimulationError::InvalidSiteArea {
                id: site_area.id.clone(),
                area: site_area.area,
            });
        }

        let manager = Self {
            transmitter: Transmitter::new(transmitter, parameters),
            interfering_transmitters: interfering_transmitters
                .iter()
                .map(|record| InterferingTransmitter::new(record, parameters))
                .collect(),
            receivers,
            site_area,
        };

        debug!(
            transmitter_id = %manager.transmitter.id,
            interfering_transmitters = manager.interfering_transmitters.len(),
            receivers = manager.receivers.len(),
            site_area_km2 = manager.site_area.area_km2(),
            mast_height = parameters.antenna.mast_height_m,
            antenna_type = %parameters.antenna.antenna_type,
            "SIMULATION_MANAGER_CREATED: シミュレータを構築しました"
        );

        Ok(manager)
    }

    /// 全受信端末のリンクバジェットを推定
    pub fn estimate_link_budget(
        &self,
        radio: &RadioConfig,
        table: &ModulationCodingTable,
        parameters: &SimulationParameters,
    ) -> Result<Vec<LinkBudgetResult>, SimulationError> {
        if !table.supports(radio.generation) {
            return Err(SimulationError::UnsupportedGeneration(radio.generation));
        }

        let calculator =
            PathLossCalculator::new(parameters.variant, parameters.enforce_applicability);
        let noise = Self::calculate_noise(radio.bandwidth);

        let results = self
            .receivers
            .par_iter()
            .map(|receiver| {
                self.evaluate_receiver(receiver, radio, table, parameters, &calculator, noise)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            frequency = radio.frequency,
            bandwidth = radio.bandwidth,
            generation = %radio.generation,
            environment = %radio.environment,
            receivers = results.len(),
            "LINK_BUDGET_ESTIMATED: リンクバジェットを推定しました"
        );

        Ok(results)
    }

    fn evaluate_receiver(
        &self,
        receiver: &Receiver,
        radio: &RadioConfig,
        table: &ModulationCodingTable,
        parameters: &SimulationParameters,
        calculator: &PathLossCalculator,
        noise: f64,
    ) -> Result<LinkBudgetResult, SimulationError> {
        let serving = self.calculate_path_loss(
            &self.transmitter,
            receiver,
            radio,
            parameters,
            parameters.seed_value1,
            calculator,
        )?;
        let received_power =
            Self::calc_received_power(&self.transmitter, receiver, serving.path_loss.value_db);

        let interference = self.calculate_interference(receiver, radio, parameters, calculator)?;

        let sinr = Self::calculate_sinr(
            received_power,
            &interference.received_powers,
            noise,
            parameters.network_load,
        );

        let outcome = table.lookup(sinr.sinr, radio.generation, None);
        let spectral_efficiency = outcome.value();
        let (capacity_mbps, capacity_mbps_km2) =
            self.average_capacity(radio.bandwidth, spectral_efficiency);

        trace!(
            receiver_id = %receiver.id,
            path_loss = serving.path_loss.value_db,
            received_power = received_power,
            sinr = sinr.sinr,
            spectral_efficiency = spectral_efficiency,
            "RECEIVER_EVALUATED: 受信端末を評価しました"
        );

        Ok(LinkBudgetResult {
            id: receiver.id.clone(),
            path_loss: serving.path_loss.value_db,
            r_model: serving.path_loss.model,
            type_of_sight: serving.sight,
            distance: serving.distance_m,
            ave_distance: interference.average_distance,
            ave_inf_pl: interference.average_path_loss,
            i_model: interference.model,
            received_power: sinr.received_power,
            interference: (sinr.interference_linear > 0.0)
                .then(|| sinr.interference_linear.log10()),
            noise: sinr.noise,
            i_plus_n: sinr.i_plus_n_linear.log10(),
            network_load: parameters.network_load,
            sinr: sinr.sinr,
            spectral_efficiency,
            modulation_outcome: outcome.as_str(),
            capacity_mbps,
            capacity_mbps_km2,
            receiver_x: receiver.position.x,
            receiver_y: receiver.position.y,
        })
    }

    /// 送信所から受信端末への経路損失
    pub fn calculate_path_loss(
        &self,
        transmitter: &Transmitter,
        receiver: &Receiver,
        radio: &RadioConfig,
        parameters: &SimulationParameters,
        seed: Option<u64>,
        calculator: &PathLossCalculator,
    ) -> Result<PathEstimate, PathLossError> {
        let distance_m = receiver.distance_to(transmitter);
        let sight = SightLine::from_distance(distance_m, parameters.los_distance_m);

        let input = PathLossInput {
            frequency_ghz: radio.frequency,
            distance_m,
            tx_height: transmitter.get_antenna_height(),
            antenna_type: transmitter.get_antenna_type(),
            building_height: parameters.building_height,
            street_width: parameters.street_width,
            environment: radio.environment,
            sight,
            rx_height: receiver.ue_height,
            above_roof: parameters.above_roof,
            indoor: receiver.indoor,
            seed,
            iterations: parameters.iterations,
        };

        Ok(PathEstimate {
            path_loss: calculator.calculate(&input)?,
            distance_m,
            sight,
        })
    }

    /// 受信電力（dBm）
    pub fn calc_received_power(transmitter: &dyn IRadiator, receiver: &Receiver, path_loss: f64) -> f64 {
        transmitter.eirp() - path_loss - receiver.misc_losses + receiver.gain - receiver.losses
    }

    /// 全干渉セルからの受信電力
    pub fn calculate_interference(
        &self,
        receiver: &Receiver,
        radio: &RadioConfig,
        parameters: &SimulationParameters,
        calculator: &PathLossCalculator,
    ) -> Result<InterferenceEstimate, PathLossError> {
        let mut received_powers = Vec::with_capacity(self.interfering_transmitters.len());
        let mut model = None;
        let mut total_distance = 0.0;
        let mut total_path_loss = 0.0;

        for interferer in &self.interfering_transmitters {
            let estimate = self.calculate_path_loss(
                interferer,
                receiver,
                radio,
                parameters,
                parameters.seed_value2,
                calculator,
            )?;
            received_powers.push(Self::calc_received_power(
                interferer,
                receiver,
                estimate.path_loss.value_db,
            ));
            total_distance += estimate.distance_m;
            total_path_loss += estimate.path_loss.value_db;
            model = Some(estimate.path_loss.model);
        }

        let count = received_powers.len();
        let (average_distance, average_path_loss) = if count == 0 {
            (0.0, 0.0)
        } else {
            (total_distance / count as f64, total_path_loss / count as f64)
        };

        Ok(InterferenceEstimate {
            received_powers,
            model,
            average_distance,
            average_path_loss,
        })
    }

    /// 受信機雑音（dBm）
    ///
    /// `10·log10(k·T·1000) + NF + 10·log10(BW)`
    pub fn calculate_noise(bandwidth_mhz: f64) -> f64 {
        let bandwidth_hz = bandwidth_mhz * 1e6;
        10.0 * (BOLTZMANN * NOISE_TEMPERATURE_K * 1000.0).log10()
            + NOISE_FIGURE_DB
            + 10.0 * bandwidth_hz.log10()
    }

    /// SINR を計算
    ///
    /// 各値を `10^x` で線形化し、強い順に3つまでの干渉源のみを合計します。
    pub fn calculate_sinr(
        received_power: f64,
        interference: &[f64],
        noise: f64,
        network_load: f64,
    ) -> SinrEstimate {
        let mut linear: Vec<f64> = interference.iter().map(|value| 10f64.powf(*value)).collect();
        linear.sort_by(|a, b| b.total_cmp(a));
        let strongest: f64 = linear.iter().take(MAX_INTERFERERS_IN_SINR).sum();

        let interference_linear = strongest * (network_load / 100.0);
        let i_plus_n_linear = interference_linear + 10f64.powf(noise);
        let sinr = round_to((10f64.powf(received_power) / i_plus_n_linear).log10(), 2);

        SinrEstimate {
            received_power,
            interference_linear,
            noise,
            i_plus_n_linear,
            sinr,
        }
    }

    /// 平均容量 (Mbps, Mbps/km²)
    pub fn average_capacity(&self, bandwidth_mhz: f64, spectral_efficiency: f64) -> (f64, f64) {
        let capacity_mbps = bandwidth_mhz * 1e6 * spectral_efficiency / 1e6;
        (capacity_mbps, capacity_mbps / self.site_area.area_km2())
    }

    /// セル領域内の受信端末密度（台/km²）
    pub fn receiver_density(&self) -> f64 {
        if self.receivers.is_empty() {
            return 0.0;
        }
        self.receivers.len() as f64 / self.site_area.area_km2()
    }
}

fn ensure_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a String>,
) -> Result<(), SimulationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(SimulationError::DuplicateId {
                kind,
                id: id.clone(),
            });
        }
    }
    Ok(())
}
