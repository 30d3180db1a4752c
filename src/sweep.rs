//! # Sweep モジュール
//!
//! 環境・セル半径・周波数帯・マスト高の全組み合わせについてサイト配置を生成し、
//! リンクバジェットを推定して集計します。
//!
//! 各構成は CPU 処理のみで互いに独立しているため、tokio の blocking スレッドプールで
//! 並行に実行します。失敗した構成はログに記録して読み飛ばし、スイープ全体は継続します。

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::hexagon::{produce_sites_and_areas, GeometryError};
use crate::models::{
    common::{
        math_utils::{mean, percentile_nearest},
        Environment,
    },
    receiver::generate_receivers,
};
use crate::modulation::ModulationCodingTable;
use crate::scenario::{ScenarioConfig, ScenarioError, SpectrumConfig, SweepConfig};
use crate::simulation::{LinkBudgetResult, RadioConfig, SimulationError, SimulationManager};

/// 1サイトあたりのセクタ数
pub const SECTORS_PER_SITE: f64 = 3.0;

/// スイープ実行エラー
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("非同期ランタイムを起動できません: {0}")]
    Runtime(#[source] std::io::Error),
}

/// スイープの1構成
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepConfiguration {
    pub environment: Environment,
    pub site_radius_m: f64,
    pub spectrum: SpectrumConfig,
    pub mast_height_m: f64,
}

impl SweepConfiguration {
    /// サイト間距離（m）
    pub fn inter_site_distance(&self) -> f64 {
        self.site_radius_m * 2.0
    }

    /// 1 km² あたりのサイト数
    pub fn sites_per_km2(&self) -> f64 {
        let cell_area_km2 = 3f64.sqrt() / 2.0 * self.inter_site_distance().powi(2) / 1e6;
        1.0 / cell_area_km2
    }

    pub fn radio(&self) -> RadioConfig {
        RadioConfig {
            frequency: self.spectrum.frequency_ghz,
            bandwidth: self.spectrum.bandwidth_mhz,
            generation: self.spectrum.generation,
            environment: self.environment,
        }
    }

    /// ファイル名などに使う識別子
    pub fn label(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.environment, self.site_radius_m, self.spectrum.frequency_ghz, self.mast_height_m
        )
    }
}

/// 全組み合わせを 環境 → 半径 → 周波数帯 → マスト高 の順に展開
pub fn expand_configurations(sweep: &SweepConfig) -> Vec<SweepConfiguration> {
    let mut configurations = Vec::with_capacity(sweep.configuration_count());
    for &environment in &sweep.environments {
        for &site_radius_m in &sweep.site_radii_m {
            for &spectrum in &sweep.spectrum_portfolio {
                for &mast_height_m in &sweep.mast_heights_m {
                    configurations.push(SweepConfiguration {
                        environment,
                        site_radius_m,
                        spectrum,
                        mast_height_m,
                    });
                }
            }
        }
    }
    configurations
}

/// 1構成の受信端末結果の集計値
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellEdgeSummary {
    pub path_loss: f64,
    pub received_power: f64,
    /// 干渉のある結果のみの平均（干渉セルがなければ `None`）
    pub interference: Option<f64>,
    pub sinr: f64,
    /// 指定パーセンタイルの SINR（最近傍法）
    pub sinr_percentile: Option<f64>,
    pub spectral_efficiency: f64,
    pub capacity_mbps: f64,
    pub capacity_mbps_km2: f64,
}

/// 受信端末の結果を平均・パーセンタイルで集計
pub fn summarize(results: &[LinkBudgetResult], percentile: f64) -> CellEdgeSummary {
    let collect = |field: fn(&LinkBudgetResult) -> f64| -> Vec<f64> {
        results.iter().map(field).collect()
    };

    let interference: Vec<f64> = results.iter().filter_map(|r| r.interference).collect();
    let sinr = collect(|r| r.sinr);

    CellEdgeSummary {
        path_loss: mean(&collect(|r| r.path_loss)),
        received_power: mean(&collect(|r| r.received_power)),
        interference: (!interference.is_empty()).then(|| mean(&interference)),
        sinr: mean(&sinr),
        sinr_percentile: percentile_nearest(&sinr, percentile),
        spectral_efficiency: mean(&collect(|r| r.spectral_efficiency)),
        capacity_mbps: mean(&collect(|r| r.capacity_mbps)),
        capacity_mbps_km2: mean(&collect(|r| r.capacity_mbps_km2)),
    }
}

/// 1構成の実行結果
#[derive(Debug, Clone)]
pub struct ConfigurationOutcome {
    pub configuration: SweepConfiguration,
    pub results: Vec<LinkBudgetResult>,
    pub summary: CellEdgeSummary,
    pub receiver_density: f64,
}

/// スイープ全体の結果
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// 展開順に並んだ成功構成
    pub completed: Vec<ConfigurationOutcome>,
    pub failed: usize,
}

/// 1構成を実行
///
/// サイト配置の生成、受信端末の配置、リンクバジェット推定、集計を順に行います。
pub fn run_configuration(
    scenario: &ScenarioConfig,
    table: &ModulationCodingTable,
    configuration: &SweepConfiguration,
) -> Result<ConfigurationOutcome, SweepError> {
    let layout = produce_sites_and_areas(
        scenario.site.point(),
        configuration.site_radius_m,
        &scenario.site.source_crs,
        &scenario.site.target_crs,
    )?;

    let receivers = generate_receivers(
        &layout.site_area,
        &scenario.receivers.parameters(),
        scenario.receivers.layout,
        scenario.receivers.seed,
    );

    let manager = SimulationManager::new(
        &layout.transmitter,
        &layout.interfering_transmitters,
        receivers,
        layout.site_area,
        &scenario.transmitter.parameters(configuration.mast_height_m),
    )?;

    let results = manager.estimate_link_budget(&configuration.radio(), table, &scenario.sim)?;
    let summary = summarize(&results, scenario.sweep.percentile);

    debug!(
        configuration = %configuration.label(),
        receivers = results.len(),
        mean_sinr = summary.sinr,
        capacity_mbps_km2 = summary.capacity_mbps_km2,
        "CONFIGURATION_COMPLETED: 構成の評価が完了しました"
    );

    Ok(ConfigurationOutcome {
        configuration: *configuration,
        receiver_density: manager.receiver_density(),
        results,
        summary,
    })
}

/// スイープを非同期に実行
pub async fn run_sweep_async(scenario: Arc<ScenarioConfig>) -> Result<SweepReport, SweepError> {
    let table = Arc::new(scenario.modulation_table()?);
    let configurations = expand_configurations(&scenario.sweep);

    info!(
        scenario = %scenario.meta.name,
        configurations = configurations.len(),
        "SWEEP_STARTED: スイープを開始します"
    );

    let handles: Vec<_> = configurations
        .into_iter()
        .map(|configuration| {
            let scenario = Arc::clone(&scenario);
            let table = Arc::clone(&table);
            tokio::task::spawn_blocking(move || {
                let outcome = run_configuration(&scenario, &table, &configuration);
                (configuration, outcome)
            })
        })
        .collect();

    let mut report = SweepReport::default();
    for handle in handles {
        match handle.await {
            Ok((_, Ok(outcome))) => report.completed.push(outcome),
            Ok((configuration, Err(e))) => {
                warn!(
                    configuration = %configuration.label(),
                    error = %e,
                    "CONFIGURATION_SKIPPED: 構成の評価に失敗したため読み飛ばします"
                );
                report.failed += 1;
            }
            Err(e) => {
                error!(error = %e, "CONFIGURATION_PANICKED: 構成の評価タスクが異常終了しました");
                report.failed += 1;
            }
        }
    }

    info!(
        completed = report.completed.len(),
        failed = report.failed,
        "SWEEP_COMPLETED: スイープが完了しました"
    );

    Ok(report)
}

/// マルチスレッドランタイムを起動してスイープを実行
pub fn run_sweep(scenario: ScenarioConfig) -> Result<SweepReport, SweepError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("capsim-sweep")
        .build()
        .map_err(SweepError::Runtime)?;

    runtime.block_on(run_sweep_async(Arc::new(scenario)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::Generation;
    use crate::path_loss::PropagationModel;
    use crate::simulation::tests::manager;
    use crate::simulation::SimulationParameters;

    fn small_scenario() -> ScenarioConfig {
        let mut scenario = ScenarioConfig::reference().unwrap();
        scenario.sim.iterations = 5;
        scenario.sweep.environments = vec![Environment::Urban];
        scenario.sweep.site_radii_m = vec![250.0];
        scenario.sweep.spectrum_portfolio = vec![SpectrumConfig {
            frequency_ghz: 0.8,
            bandwidth_mhz: 10.0,
            generation: Generation::FourG,
        }];
        scenario.sweep.mast_heights_m = vec![30.0];
        scenario
    }

    #[test]
    fn test_expand_configurations_order() {
        let scenario = ScenarioConfig::reference().unwrap();
        let configurations = expand_configurations(&scenario.sweep);
        assert_eq!(configurations.len(), scenario.sweep.configuration_count());
        assert_eq!(configurations[0].environment, Environment::Urban);
        assert_eq!(configurations[0].mast_height_m, 30.0);
        assert_eq!(configurations[1].mast_height_m, 40.0);
        assert_eq!(configurations[2].spectrum.frequency_ghz, 0.8);
        assert_eq!(configurations.last().unwrap().environment, Environment::Rural);
    }

    #[test]
    fn test_sites_per_km2() {
        let configuration = expand_configurations(&small_scenario().sweep)[0];
        assert_eq!(configuration.inter_site_distance(), 500.0);
        assert!((configuration.sites_per_km2() - 4.6188).abs() < 1e-3);
        assert_eq!(configuration.label(), "urban_250_0.8_30");
    }

    #[test]
    fn test_summarize_means_and_percentile() {
        let results = manager()
            .estimate_link_budget(
                &RadioConfig {
                    frequency: 0.8,
                    bandwidth: 10.0,
                    generation: Generation::FourG,
                    environment: Environment::Urban,
                },
                &ModulationCodingTable::default(),
                &SimulationParameters::default(),
            )
            .unwrap();
        let summary = summarize(&results, 50.0);

        let sinr: Vec<f64> = results.iter().map(|r| r.sinr).collect();
        assert!((summary.sinr - mean(&sinr)).abs() < 1e-12);
        assert!(sinr.contains(&summary.sinr_percentile.unwrap()));
        assert!(summary.interference.is_some());
        assert!(
            (summary.capacity_mbps - 10.0 * summary.spectral_efficiency).abs() < 1e-9
        );
    }

    #[test]
    fn test_summarize_empty_results() {
        let summary = summarize(&[], 50.0);
        assert_eq!(summary.sinr, 0.0);
        assert_eq!(summary.sinr_percentile, None);
        assert_eq!(summary.interference, None);
    }

    #[test]
    fn test_run_configuration() {
        let scenario = small_scenario();
        let table = scenario.modulation_table().unwrap();
        let configuration = expand_configurations(&scenario.sweep)[0];
        let outcome = run_configuration(&scenario, &table, &configuration).unwrap();

        assert_eq!(outcome.results.len(), 10);
        assert!(outcome.receiver_density > 0.0);
        assert!(outcome.results.iter().all(|r| matches!(
            r.r_model,
            PropagationModel::FreeSpace | PropagationModel::ExtendedHata
        )));
    }

    #[test]
    fn test_failing_configuration_is_skipped() {
        let mut scenario = small_scenario();
        scenario.sweep.spectrum_portfolio.push(SpectrumConfig {
            frequency_ghz: 7.0,
            bandwidth_mhz: 100.0,
            generation: Generation::FiveG,
        });

        let report = run_sweep(scenario).unwrap();
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed[0].configuration.spectrum.frequency_ghz, 0.8);
    }
}
