use std::str::FromStr;

use clap::{Arg, ArgAction, Command};

use capsim::logging::{init_logging, level_from_verbosity, parse_log_level, LogConfig, LogOutput};
use capsim::report::write_report;
use capsim::scenario::ScenarioConfig;
use capsim::sweep::run_sweep;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("capsim")
        .version("0.1.0")
        .about("4G/5G 容量シミュレーション (Capacity Simulation)")
        .long_about("六角形セル配置によるリンクバジェット・容量シミュレータ\n\
                     環境・セル半径・周波数帯・マスト高の組み合わせごとに SINR と面容量を推定します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help("実行するシナリオファイル(.yaml)のパスを指定します。\n\
                           指定しない場合、使用方法を表示して終了します。")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
                .conflicts_with("test")
        )
        .arg(
            Arg::new("test")
                .short('t')
                .long("test")
                .action(ArgAction::SetTrue)
                .help("組み込みの参照シナリオを実行")
                .conflicts_with("info")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .value_parser(LogOutput::from_str)
                .default_value("console")
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。-v より優先")
        )
        .get_matches();

    println!("容量シミュレーション (Capacity Simulation) - capsim v0.1.0");
    println!();

    // 詳細レベルとログの設定
    let verbose_level = matches.get_count("verbose");
    if verbose_level > 0 {
        println!("詳細出力レベル: {}", verbose_level);
    }

    let log_config = LogConfig {
        level: matches
            .get_one::<String>("log-level")
            .map(|level| parse_log_level(level))
            .unwrap_or_else(|| level_from_verbosity(verbose_level)),
        output: matches
            .get_one::<LogOutput>("log-output")
            .copied()
            .unwrap_or(LogOutput::Console),
        ..LogConfig::default()
    };

    // ファイル出力の非同期ライタはこのガードが生きている間だけ書き込む
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    let info_only = matches.get_flag("info");

    let result = if matches.get_flag("test") {
        println!("=== 参照シナリオ実行モード ===");
        run_reference(verbose_level)
    } else if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        run_scenario(scenario_path, info_only, verbose_level)
    } else {
        // デフォルト動作: 使用方法を表示
        show_default_help();
        return;
    };

    match result {
        Ok(_) => {
            if verbose_level > 0 {
                println!("シナリオ実行が正常に完了しました。");
            }
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    }
}

/// シナリオファイルを読み込んで実行
fn run_scenario(scenario_path: &str, info_only: bool, verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = ScenarioConfig::from_file(scenario_path)?;

    if verbose_level > 0 {
        println!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    // 情報表示のみの場合
    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    execute_scenario(scenario, verbose_level)
}

/// 組み込みの参照シナリオを実行
fn run_reference(verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = ScenarioConfig::reference()?;
    execute_scenario(scenario, verbose_level)
}

/// スイープを実行して結果を書き出す
fn execute_scenario(scenario: ScenarioConfig, verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    let output = scenario.output.clone();
    let report = run_sweep(scenario)?;

    println!("=== スイープ結果 ===");
    println!("成功した構成: {}", report.completed.len());
    println!("失敗した構成: {}", report.failed);

    if verbose_level > 0 {
        for outcome in &report.completed {
            println!(
                "  {:<28} SINR {:>7.2} dB  容量 {:>10.2} Mbps/km²",
                outcome.configuration.label(),
                outcome.summary.sinr,
                outcome.summary.capacity_mbps_km2
            );
        }
    }

    let written = write_report(&output, &report)?;
    println!();
    println!("ルックアップテーブル: {}", written.lookup_table.display());
    if !written.full_tables.is_empty() {
        println!("全結果テーブル: {} ファイル", written.full_tables.len());
    }

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  capsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>    シナリオファイルを指定して実行");
    println!("  -i, --info               シナリオ情報のみ表示");
    println!("  -t, --test               組み込みの参照シナリオを実行");
    println!("  -v, --verbose            詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-output <TARGET> ログ出力先 (console, file, both)");
    println!("      --log-level <LEVEL>   ログレベル");
    println!("  -h, --help               このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/reference.yaml  - 参照スイープ（3環境 × 3半径 × 5周波数帯 × 2マスト高）");
    println!();
    println!("例:");
    println!("  capsim -s scenarios/reference.yaml");
    println!("  capsim -s scenarios/reference.yaml -i");
    println!("  capsim -s scenarios/reference.yaml -vv --log-output both");
    println!("  capsim --test");
}
