//! CSV 出力（受信端末ごとの全結果と構成ごとのルックアップテーブル）

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::models::common::{Environment, Generation};
use crate::path_loss::PropagationModel;
use crate::scenario::OutputConfig;
use crate::sweep::{ConfigurationOutcome, SweepReport, SECTORS_PER_SITE};

const FULL_TABLE_DIRECTORY: &str = "full_tables";

/// 出力エラー
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("出力先を作成できません {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("CSV 書き込みエラー: {0}")]
    Csv(#[from] csv::Error),
}

/// 全結果テーブルの1行
#[derive(Debug, Serialize)]
struct FullTableRow<'a> {
    environment: Environment,
    inter_site_distance: f64,
    sites_per_km2: f64,
    frequency: f64,
    bandwidth: f64,
    generation: Generation,
    mast_height: f64,
    receiver_id: &'a str,
    receiver_x: f64,
    receiver_y: f64,
    path_loss: f64,
    r_model: PropagationModel,
    received_power: f64,
    interference: Option<f64>,
    i_model: Option<PropagationModel>,
    noise: f64,
    sinr: f64,
    spectral_efficiency: f64,
    capacity_mbps: f64,
    capacity_mbps_km2: f64,
}

/// ルックアップテーブルの1行
#[derive(Debug, Serialize)]
struct LookupRow {
    environment: Environment,
    inter_site_distance: f64,
    sites_per_km2: f64,
    #[serde(rename = "frequency_GHz")]
    frequency_ghz: f64,
    #[serde(rename = "bandwidth_MHz")]
    bandwidth_mhz: f64,
    generation: Generation,
    mast_height_m: f64,
    #[serde(rename = "path_loss_dB")]
    path_loss_db: f64,
    #[serde(rename = "received_power_dBm")]
    received_power_dbm: f64,
    #[serde(rename = "interference_dBm")]
    interference_dbm: Option<f64>,
    sinr: f64,
    sinr_percentile: Option<f64>,
    spectral_efficiency_bps_hz: f64,
    capacity_mbps_km2: f64,
}

impl From<&ConfigurationOutcome> for LookupRow {
    fn from(outcome: &ConfigurationOutcome) -> Self {
        let configuration = &outcome.configuration;
        let summary = &outcome.summary;
        Self {
            environment: configuration.environment,
            inter_site_distance: configuration.inter_site_distance(),
            sites_per_km2: configuration.sites_per_km2(),
            frequency_ghz: configuration.spectrum.frequency_ghz,
            bandwidth_mhz: configuration.spectrum.bandwidth_mhz,
            generation: configuration.spectrum.generation,
            mast_height_m: configuration.mast_height_m,
            path_loss_db: summary.path_loss,
            received_power_dbm: summary.received_power,
            interference_dbm: summary.interference,
            sinr: summary.sinr,
            sinr_percentile: summary.sinr_percentile,
            spectral_efficiency_bps_hz: summary.spectral_efficiency,
            capacity_mbps_km2: summary.capacity_mbps_km2 * SECTORS_PER_SITE,
        }
    }
}

fn ensure_directory(directory: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(directory).map_err(|e| ReportError::Io(directory.to_path_buf(), e))
}

/// 1構成の全結果を `<directory>/capacity_data_<label>.csv` に書き出す
pub fn write_full_table(
    directory: &Path,
    outcome: &ConfigurationOutcome,
) -> Result<PathBuf, ReportError> {
    ensure_directory(directory)?;
    let path = directory.join(format!("capacity_data_{}.csv", outcome.configuration.label()));

    let configuration = &outcome.configuration;
    let mut writer = Writer::from_path(&path)?;
    for result in &outcome.results {
        writer.serialize(FullTableRow {
            environment: configuration.environment,
            inter_site_distance: configuration.inter_site_distance(),
            sites_per_km2: configuration.sites_per_km2(),
            frequency: configuration.spectrum.frequency_ghz,
            bandwidth: configuration.spectrum.bandwidth_mhz,
            generation: configuration.spectrum.generation,
            mast_height: configuration.mast_height_m,
            receiver_id: &result.id,
            receiver_x: result.receiver_x,
            receiver_y: result.receiver_y,
            path_loss: result.path_loss,
            r_model: result.r_model,
            received_power: result.received_power,
            interference: result.interference,
            i_model: result.i_model,
            noise: result.noise,
            sinr: result.sinr,
            spectral_efficiency: result.spectral_efficiency,
            capacity_mbps: result.capacity_mbps,
            capacity_mbps_km2: result.capacity_mbps_km2,
        })?;
    }
    writer.flush().map_err(|e| ReportError::Io(path.clone(), e))?;

    Ok(path)
}

/// ルックアップテーブルに構成ごとの集計行を追記
///
/// ファイルが存在しない場合のみヘッダ行を書き込みます。
pub fn append_lookup_table(
    path: &Path,
    outcomes: &[ConfigurationOutcome],
) -> Result<usize, ReportError> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let write_header = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ReportError::Io(path.to_path_buf(), e))?;

    let mut writer = WriterBuilder::new().has_headers(write_header).from_writer(file);
    for outcome in outcomes {
        writer.serialize(LookupRow::from(outcome))?;
    }
    writer.flush().map_err(|e| ReportError::Io(path.to_path_buf(), e))?;

    Ok(outcomes.len())
}

/// 出力ファイル一覧
#[derive(Debug, Clone, Default)]
pub struct WrittenFiles {
    pub full_tables: Vec<PathBuf>,
    pub lookup_table: PathBuf,
}

/// スイープ結果を出力設定に従って書き出す
pub fn write_report(output: &OutputConfig, report: &SweepReport) -> Result<WrittenFiles, ReportError> {
    let mut written = WrittenFiles {
        lookup_table: output.directory.join(&output.lookup_table_file),
        ..WrittenFiles::default()
    };

    if output.write_full_tables {
        let directory = output.directory.join(FULL_TABLE_DIRECTORY);
        for outcome in &report.completed {
            written.full_tables.push(write_full_table(&directory, outcome)?);
        }
    }

    let rows = append_lookup_table(&written.lookup_table, &report.completed)?;

    info!(
        directory = %output.directory.display(),
        full_tables = written.full_tables.len(),
        lookup_rows = rows,
        "REPORT_WRITTEN: 結果を書き出しました"
    );

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::math_utils::mean;
    use crate::modulation::ModulationCodingTable;
    use crate::scenario::SpectrumConfig;
    use crate::simulation::tests::manager;
    use crate::simulation::SimulationParameters;
    use crate::sweep::{summarize, SweepConfiguration};

    fn outcome() -> ConfigurationOutcome {
        let configuration = SweepConfiguration {
            environment: Environment::Urban,
            site_radius_m: 250.0,
            spectrum: SpectrumConfig {
                frequency_ghz: 0.8,
                bandwidth_mhz: 10.0,
                generation: Generation::FourG,
            },
            mast_height_m: 30.0,
        };
        let manager = manager();
        let results = manager
            .estimate_link_budget(
                &configuration.radio(),
                &ModulationCodingTable::default(),
                &SimulationParameters::default(),
            )
            .unwrap();
        ConfigurationOutcome {
            configuration,
            summary: summarize(&results, 50.0),
            receiver_density: manager.receiver_density(),
            results,
        }
    }

    fn scratch_directory(name: &str) -> PathBuf {
        let directory =
            std::env::temp_dir().join(format!("capsim-report-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&directory);
        directory
    }

    #[test]
    fn test_write_full_table() {
        let directory = scratch_directory("full");
        let outcome = outcome();
        let path = write_full_table(&directory, &outcome).unwrap();
        assert!(path.ends_with("capacity_data_urban_250_0.8_30.csv"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "environment");
        assert!(headers.iter().any(|h| h == "capacity_mbps_km2"));

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(&records[0][0], "urban");
        assert_eq!(&records[0][5], "4G");
        assert_eq!(&records[0][7], "id_0");

        fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn test_lookup_table_header_written_once() {
        let directory = scratch_directory("lookup");
        let path = directory.join("lookup_table.csv");
        let outcome = outcome();

        append_lookup_table(&path, std::slice::from_ref(&outcome)).unwrap();
        append_lookup_table(&path, std::slice::from_ref(&outcome)).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[3], "frequency_GHz");
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);

        let capacity: f64 = records[0][headers.len() - 1].parse().unwrap();
        let expected =
            mean(&outcome.results.iter().map(|r| r.capacity_mbps_km2).collect::<Vec<_>>())
                * SECTORS_PER_SITE;
        assert!((capacity - expected).abs() < 1e-6 * expected.max(1.0));

        fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn test_write_report_respects_full_table_flag() {
        let directory = scratch_directory("report");
        let report = SweepReport {
            completed: vec![outcome()],
            failed: 0,
        };

        let output = OutputConfig {
            directory: directory.clone(),
            write_full_tables: false,
            lookup_table_file: "lookup.csv".to_string(),
        };
        let written = write_report(&output, &report).unwrap();
        assert!(written.full_tables.is_empty());
        assert!(written.lookup_table.exists());
        assert!(!directory.join(FULL_TABLE_DIRECTORY).exists());

        fs::remove_dir_all(&directory).unwrap();
    }
}
