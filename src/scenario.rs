use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{
    common::{AntennaType, Environment, Generation, Point2D},
    receiver::{ReceiverLayout, ReceiverParameters},
    transmitter::{AntennaConfig, TransmitterParameters},
};
use crate::modulation::{ModulationCodingEntry, ModulationCodingTable};
use crate::simulation::SimulationParameters;

/// 組み込みの参照シナリオ
const REFERENCE_SCENARIO: &str = include_str!("../scenarios/reference.yaml");

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

/// 基準サイト設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default = "default_source_crs")]
    pub source_crs: String,
    #[serde(default = "default_target_crs")]
    pub target_crs: String,
}

fn default_source_crs() -> String {
    "epsg:4326".to_string()
}

fn default_target_crs() -> String {
    "epsg:3857".to_string()
}

impl SiteConfig {
    pub fn point(&self) -> Point2D {
        Point2D::new(self.longitude, self.latitude)
    }
}

/// 送信所設定（マスト高はスイープ側で指定）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransmitterConfig {
    pub power_dbm: f64,
    pub gain_dbi: f64,
    pub losses_db: f64,
    pub antenna_type: AntennaType,
}

impl TransmitterConfig {
    pub fn parameters(&self, mast_height_m: f64) -> TransmitterParameters {
        TransmitterParameters {
            antenna: AntennaConfig {
                mast_height_m,
                antenna_type: self.antenna_type,
            },
            power_dbm: self.power_dbm,
            gain_dbi: self.gain_dbi,
            losses_db: self.losses_db,
        }
    }
}

/// 受信端末設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiverConfig {
    pub gain: f64,
    pub losses: f64,
    pub misc_losses: f64,
    pub ue_height: f64,
    pub indoor_probability: f64,
    pub layout: ReceiverLayout,
    /// 屋内/屋外判定のシード
    pub seed: u64,
}

impl ReceiverConfig {
    pub fn parameters(&self) -> ReceiverParameters {
        ReceiverParameters {
            gain: self.gain,
            losses: self.losses,
            misc_losses: self.misc_losses,
            ue_height: self.ue_height,
            indoor_probability: self.indoor_probability,
        }
    }
}

/// 周波数帯（周波数・帯域幅・世代）
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SpectrumConfig {
    pub frequency_ghz: f64,
    pub bandwidth_mhz: f64,
    pub generation: Generation,
}

/// スイープ設定
///
/// 環境 × セル半径 × 周波数帯 × マスト高 の全組み合わせを評価します。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    pub environments: Vec<Environment>,
    pub site_radii_m: Vec<f64>,
    pub spectrum_portfolio: Vec<SpectrumConfig>,
    pub mast_heights_m: Vec<f64>,
    /// セル端とみなす SINR パーセンタイル（0〜100）
    #[serde(default = "default_percentile")]
    pub percentile: f64,
}

fn default_percentile() -> f64 {
    50.0
}

impl SweepConfig {
    pub fn configuration_count(&self) -> usize {
        self.environments.len()
            * self.site_radii_m.len()
            * self.spectrum_portfolio.len()
            * self.mast_heights_m.len()
    }
}

/// 出力設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub write_full_tables: bool,
    #[serde(default = "default_lookup_table_file")]
    pub lookup_table_file: String,
}

fn default_lookup_table_file() -> String {
    "lookup_table.csv".to_string()
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationParameters,
    pub site: SiteConfig,
    pub transmitter: TransmitterConfig,
    pub receivers: ReceiverConfig,
    pub sweep: SweepConfig,
    /// 省略時は組み込みの 4G/5G テーブル
    #[serde(default)]
    pub modulation_table: Option<Vec<ModulationCodingEntry>>,
    pub output: OutputConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents =
            fs::read_to_string(path).map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::ParseError(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 組み込みの参照シナリオ（`--test` で使用）
    pub fn reference() -> Result<Self, ScenarioError> {
        Self::from_yaml(REFERENCE_SCENARIO)
    }

    /// MCS テーブル（未指定なら組み込みテーブル）
    pub fn modulation_table(&self) -> Result<ModulationCodingTable, ScenarioError> {
        match &self.modulation_table {
            Some(entries) => ModulationCodingTable::new(entries.clone())
                .map_err(|e| ScenarioError::ValidationError(e.to_string())),
            None => Ok(ModulationCodingTable::default()),
        }
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let invalid = |msg: String| Err(ScenarioError::ValidationError(msg));

        // 実行パラメータ
        if self.sim.iterations == 0 {
            return invalid("iterations must be positive".to_string());
        }
        if !(0.0..=100.0).contains(&self.sim.network_load) {
            return invalid(format!("network_load {} must be within 0-100", self.sim.network_load));
        }
        if self.sim.los_distance_m <= 0.0 {
            return invalid("los_distance_m must be positive".to_string());
        }
        if self.sim.above_roof > 1 {
            return invalid(format!("above_roof {} must be 0 or 1", self.sim.above_roof));
        }

        // 基準サイト
        if !(-90.0..=90.0).contains(&self.site.latitude)
            || !(-180.0..=180.0).contains(&self.site.longitude)
        {
            return invalid(format!(
                "site ({}, {}) is not a valid longitude/latitude",
                self.site.longitude, self.site.latitude
            ));
        }

        // 受信端末
        let receivers = &self.receivers;
        if !(0.0..=1.0).contains(&receivers.indoor_probability) {
            return invalid("indoor_probability must be within 0-1".to_string());
        }
        if receivers.ue_height <= 0.0 {
            return invalid("ue_height must be positive".to_string());
        }

        // スイープ
        let sweep = &self.sweep;
        if sweep.configuration_count() == 0 {
            return invalid("sweep must contain at least one configuration".to_string());
        }
        if let Some(radius) = sweep.site_radii_m.iter().find(|r| **r <= 0.0) {
            return invalid(format!("site radius {} must be positive", radius));
        }
        if let Some(height) = sweep.mast_heights_m.iter().find(|h| **h <= 0.0) {
            return invalid(format!("mast height {} must be positive", height));
        }
        for spectrum in &sweep.spectrum_portfolio {
            if spectrum.frequency_ghz <= 0.0 || spectrum.bandwidth_mhz <= 0.0 {
                return invalid(format!(
                    "spectrum {} GHz / {} MHz must be positive",
                    spectrum.frequency_ghz, spectrum.bandwidth_mhz
                ));
            }
        }
        if !(0.0..=100.0).contains(&sweep.percentile) {
            return invalid(format!("percentile {} must be within 0-100", sweep.percentile));
        }

        // MCS テーブルと周波数帯の世代
        let table = self.modulation_table()?;
        for spectrum in &sweep.spectrum_portfolio {
            if !table.supports(spectrum.generation) {
                return invalid(format!(
                    "modulation table has no entries for {}",
                    spectrum.generation
                ));
            }
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("経路損失モデル: {:?}", self.sim.variant);
        println!("試行回数: {}", self.sim.iterations);
        println!("シード値: {:?} / {:?}", self.sim.seed_value1, self.sim.seed_value2);
        println!("ネットワーク負荷: {:.0}%", self.sim.network_load);
        println!();

        println!("=== 基準サイト ===");
        println!("位置: ({}, {}) [{}]", self.site.longitude, self.site.latitude, self.site.source_crs);
        println!(
            "送信所: {:.0} dBm, {:.0} dBi, 損失 {:.0} dB ({})",
            self.transmitter.power_dbm,
            self.transmitter.gain_dbi,
            self.transmitter.losses_db,
            self.transmitter.antenna_type
        );
        println!();

        println!("=== スイープ ===");
        println!("環境: {:?}", self.sweep.environments);
        println!("セル半径: {:?} m", self.sweep.site_radii_m);
        println!("マスト高: {:?} m", self.sweep.mast_heights_m);
        for spectrum in &self.sweep.spectrum_portfolio {
            println!(
                "  {} GHz / {} MHz ({})",
                spectrum.frequency_ghz, spectrum.bandwidth_mhz, spectrum.generation
            );
        }
        println!("総構成数: {}", self.sweep.configuration_count());
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_scenario_is_valid() {
        let config = ScenarioConfig::reference().unwrap();
        assert_eq!(config.sweep.configuration_count(), 3 * 3 * 5 * 2);
        assert_eq!(config.sim.iterations, 50);
        assert_eq!(config.sim.seed_value1, Some(1));
        assert_eq!(config.receivers.layout, ReceiverLayout::Line);
        assert_eq!(config.sweep.spectrum_portfolio[0].generation, Generation::FiveG);
        assert!(config.modulation_table.is_none());
        assert_eq!(config.modulation_table().unwrap(), ModulationCodingTable::default());
    }

    #[test]
    fn test_transmitter_parameters_bind_mast_height() {
        let config = ScenarioConfig::reference().unwrap();
        let parameters = config.transmitter.parameters(40.0);
        assert_eq!(parameters.antenna.mast_height_m, 40.0);
        assert_eq!(parameters.antenna.antenna_type, AntennaType::Macro);
        assert_eq!(parameters.power_dbm, 40.0);
    }

    #[test]
    fn test_missing_sim_fields_use_defaults() {
        let yaml = REFERENCE_SCENARIO.replace("  iterations: 50\n", "");
        let config = ScenarioConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.sim.iterations, SimulationParameters::default().iterations);
    }

    #[test]
    fn test_invalid_network_load_is_rejected() {
        let yaml = REFERENCE_SCENARIO.replace("network_load: 50", "network_load: 150");
        assert!(matches!(
            ScenarioConfig::from_yaml(&yaml),
            Err(ScenarioError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_radius_is_rejected() {
        let yaml = REFERENCE_SCENARIO.replace("[250, 1250, 2250]", "[250, -1]");
        assert!(matches!(
            ScenarioConfig::from_yaml(&yaml),
            Err(ScenarioError::ValidationError(_))
        ));
    }

    #[test]
    fn test_modulation_table_must_cover_portfolio() {
        let table = "modulation_table:\n  - { generation: \"4G\", transmission_type: \"1x1\", \
                     cqi_index: 1, modulation: QPSK, coding_rate_x1024: 78, \
                     spectral_efficiency: 0.1523, sinr_threshold_db: -6.7 }\n";
        let yaml = format!("{}\n{}", REFERENCE_SCENARIO, table);
        let error = ScenarioConfig::from_yaml(&yaml).unwrap_err();
        assert!(error.to_string().contains("5G"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            ScenarioConfig::from_yaml("meta: [unclosed"),
            Err(ScenarioError::ParseError(_, _))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ScenarioConfig::from_file("does/not/exist.yaml"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
