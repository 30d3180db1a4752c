use serde::{Deserialize, Serialize};

use crate::models::{
    common::{AntennaType, Point2D},
    traits::{IRadiator, ISite},
};

/// アンテナ構成（マスト高とアンテナ種別）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntennaConfig {
    /// マスト高（m）
    pub mast_height_m: f64,
    /// アンテナ種別
    pub antenna_type: AntennaType,
}

/// 全送信所に共通する送信パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransmitterParameters {
    pub antenna: AntennaConfig,
    /// 送信電力（dBm）
    pub power_dbm: f64,
    /// アンテナ利得（dBi）
    pub gain_dbi: f64,
    /// ケーブル・コネクタ損失（dB）
    pub losses_db: f64,
}

impl Default for TransmitterParameters {
    fn default() -> Self {
        Self {
            antenna: AntennaConfig {
                mast_height_m: 30.0,
                antenna_type: AntennaType::Macro,
            },
            power_dbm: 40.0,
            gain_dbi: 16.0,
            losses_db: 1.0,
        }
    }
}

/// 送信所（サービングセルおよび干渉セル）
///
/// サービングセルも干渉セルも同じ形を持つため、単一の構造体で表現します。
/// シミュレータ内ではサービングセルは1基、干渉セルはサイトIDで識別されます。
#[derive(Debug, Clone, PartialEq)]
pub struct Transmitter {
    pub id: String,
    pub position: Point2D,
    pub antenna_height: f64,
    pub antenna_type: AntennaType,
    pub power: f64,
    pub gain: f64,
    pub losses: f64,
}

/// 干渉源となる近隣送信所
pub type InterferingTransmitter = Transmitter;

/// 送信所・干渉セルの入力レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: String,
    pub position: Point2D,
}

impl Transmitter {
    /// 入力レコードと共通パラメータから送信所を作成
    pub fn new(record: &SiteRecord, parameters: &TransmitterParameters) -> Self {
        Self {
            id: record.id.clone(),
            position: record.position,
            antenna_height: parameters.antenna.mast_height_m,
            antenna_type: parameters.antenna.antenna_type,
            power: parameters.power_dbm,
            gain: parameters.gain_dbi,
            losses: parameters.losses_db,
        }
    }
}

impl ISite for Transmitter {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_position(&self) -> Point2D {
        self.position
    }
}

impl IRadiator for Transmitter {
    fn eirp(&self) -> f64 {
        self.power + self.gain - self.losses
    }

    fn get_antenna_height(&self) -> f64 {
        self.antenna_height
    }

    fn get_antenna_type(&self) -> AntennaType {
        self.antenna_type
    }
}
