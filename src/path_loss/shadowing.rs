//! 対数正規分布による確率的成分（シャドウフェージング・建物侵入損失）
//!
//! 各ドローは `(seed, frequency)` から導出したシードで新しい乱数生成器を作成するため、
//! 同じ引数に対しては常に同じ値を返し、スレッド間で状態を共有しません。

use rand::rngs::StdRng;
use rand::{thread_rng, Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal};

use crate::models::common::math_utils::{mean, round_to};
use crate::path_loss::PathLossError;

/// 屋内侵入損失の平均（dB、ITU-R M.1225）
pub const INDOOR_PENETRATION_MEAN_DB: f64 = 12.0;
/// 屋内侵入損失の標準偏差（dB）
pub const INDOOR_PENETRATION_SIGMA_DB: f64 = 8.0;

/// シード値と周波数から乱数生成器のシードを導出
///
/// `seed × frequency × 100` の10進表記の先頭2文字を整数として読みます。
/// 整数部が1桁の場合はその1桁を使用します。
pub fn derive_generator_seed(seed: u64, frequency: f64) -> u64 {
    let frequency_seed = (seed as f64 * frequency * 100.0).abs();
    let text = format!("{}", frequency_seed);
    let prefix: String = text
        .chars()
        .take(2)
        .take_while(|c| c.is_ascii_digit())
        .collect();
    prefix.parse().unwrap_or(0)
}

/// 対数正規分布から `draws` 個の値を引き、その平均を小数点以下2桁で返す
///
/// `mu`・`sigma` は生成される値そのものの平均・標準偏差として与え、
/// 内部で基礎となる正規分布のパラメータに変換します。
///
/// # 引数
///
/// * `frequency` - シード導出に使う周波数（呼び出し側の単位のまま）
/// * `mu` - 平均
/// * `sigma` - 標準偏差
/// * `draws` - 試行回数（0 の場合は1回）
/// * `seed` - シード値（`None` の場合はスレッドローカル乱数で再現性なし）
pub fn log_normal_draw(
    frequency: f64,
    mu: f64,
    sigma: f64,
    draws: usize,
    seed: Option<u64>,
) -> Result<f64, PathLossError> {
    if !(mu > 0.0) || !(sigma >= 0.0) {
        return Err(PathLossError::InvalidDistribution { mu, sigma });
    }

    let normal_std = (1.0 + (sigma / mu).powi(2)).log10().sqrt();
    let normal_mean = mu.log10() - normal_std.powi(2) / 2.0;

    let distribution = LogNormal::new(normal_mean, normal_std)
        .map_err(|_| PathLossError::InvalidDistribution { mu, sigma })?;

    let samples: Vec<f64> = match seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(derive_generator_seed(seed, frequency));
            sample(&distribution, &mut rng, draws)
        }
        None => sample(&distribution, &mut thread_rng(), draws),
    };

    Ok(round_to(mean(&samples), 2))
}

fn sample<R: Rng>(distribution: &LogNormal<f64>, rng: &mut R, draws: usize) -> Vec<f64> {
    (0..draws.max(1)).map(|_| distribution.sample(rng)).collect()
}

/// 屋外から屋内への侵入損失（dB）
///
/// 屋内端末には平均12 dB・標準偏差8 dBの対数正規ドローを1回加算し、
/// 屋外端末は0を返します。
pub fn outdoor_to_indoor_path_loss(
    frequency: f64,
    indoor: bool,
    seed: Option<u64>,
) -> Result<f64, PathLossError> {
    if indoor {
        log_normal_draw(
            frequency,
            INDOOR_PENETRATION_MEAN_DB,
            INDOOR_PENETRATION_SIGMA_DB,
            1,
            seed,
        )
    } else {
        Ok(0.0)
    }
}
