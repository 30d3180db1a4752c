use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{common::Point2D, site_area::SiteArea, traits::ISite};

/// 受信端末（UE）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    pub id: String,
    pub position: Point2D,
    /// 端末高（m）
    pub ue_height: f64,
    /// その他損失（人体損失など、dB）
    pub misc_losses: f64,
    /// アンテナ利得（dBi）
    pub gain: f64,
    /// 挿入損失（dB）
    pub losses: f64,
    /// 屋内端末かどうか（生成時に確率的に決定）
    pub indoor: bool,
}

impl ISite for Receiver {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_position(&self) -> Point2D {
        self.position
    }
}

/// 受信端末の共通パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReceiverParameters {
    pub gain: f64,
    pub losses: f64,
    pub misc_losses: f64,
    pub ue_height: f64,
    /// 屋内端末となる確率（0.0〜1.0）
    pub indoor_probability: f64,
}

impl Default for ReceiverParameters {
    fn default() -> Self {
        Self {
            gain: 4.0,
            losses: 4.0,
            misc_losses: 4.0,
            ue_height: 1.5,
            indoor_probability: 0.5,
        }
    }
}

/// 受信端末の配置方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverLayout {
    /// セル領域の外接矩形上の10×10格子（領域内の点のみ採用）
    Grid,
    /// セル頂点から重心へ向かう線分上の10点
    Line,
}

const GRID_POINTS_PER_AXIS: usize = 10;
const LINE_POINTS: usize = 10;
const LINE_DIVISIONS: f64 = 20.0;

/// セル領域内に受信端末を生成
///
/// 屋内/屋外の判定は候補点ごとに乱数を1回引いて決定します（確率は 0〜1 に丸めます）。格子配置では
/// 領域外の候補点でも乱数を消費するため、同じシードなら同じ判定列になります。
pub fn generate_receivers(
    site_area: &SiteArea,
    parameters: &ReceiverParameters,
    layout: ReceiverLayout,
    seed: u64,
) -> Vec<Receiver> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut receivers = Vec::new();
    let indoor_probability = parameters.indoor_probability.clamp(0.0, 1.0);

    let push_receiver = |position: Point2D, indoor: bool, receivers: &mut Vec<Receiver>| {
        receivers.push(Receiver {
            id: format!("id_{}", receivers.len()),
            position,
            ue_height: parameters.ue_height,
            misc_losses: parameters.misc_losses,
            gain: parameters.gain,
            losses: parameters.losses,
            indoor,
        });
    };

    match layout {
        ReceiverLayout::Grid => {
            let Some((min_x, min_y, max_x, max_y)) = site_area.polygon.bounds() else {
                return receivers;
            };
            let x_axis = linspace(min_x, max_x, GRID_POINTS_PER_AXIS);
            let y_axis = linspace(min_y, max_y, GRID_POINTS_PER_AXIS);

            for x in &x_axis {
                for y in &y_axis {
                    let candidate = Point2D::new(*x, *y);
                    let indoor = rng.gen_bool(indoor_probability);
                    if site_area.polygon.contains(&candidate) {
                        push_receiver(candidate, indoor, &mut receivers);
                    }
                }
            }
        }
        ReceiverLayout::Line => {
            let centroid = site_area.get_position();
            let Some(start) = site_area.polygon.first_vertex() else {
                return receivers;
            };
            let length = start.distance_to(&centroid).trunc();
            let increment = (length / LINE_DIVISIONS).trunc();

            for step in 1..=LINE_POINTS {
                let travelled = increment * step as f64;
                let fraction = if length > 0.0 {
                    travelled / start.distance_to(&centroid)
                } else {
                    0.0
                };
                let indoor = rng.gen_bool(indoor_probability);
                push_receiver(start.interpolate(&centroid, fraction), indoor, &mut receivers);
            }
        }
    }

    debug!(
        site_area_id = %site_area.id,
        layout = ?layout,
        receiver_count = receivers.len(),
        "RECEIVERS_GENERATED: 受信端末を生成しました"
    );

    receivers
}

fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::Polygon;

    fn hexagon_area() -> SiteArea {
        let ring = vec![
            Point2D::new(538492.784267504, 177056.00108970876),
            Point2D::new(538492.784267504, 177344.67622430358),
            Point2D::new(538742.784267504, 177489.013791601),
            Point2D::new(538992.784267504, 177344.67622430358),
            Point2D::new(538992.784267504, 177056.00108970876),
            Point2D::new(538742.784267504, 176911.66352241137),
        ];
        SiteArea::new("9", Polygon::new(ring)).unwrap()
    }

    #[test]
    fn test_grid_receivers_lie_inside_site_area() {
        let site_area = hexagon_area();
        let receivers =
            generate_receivers(&site_area, &ReceiverParameters::default(), ReceiverLayout::Grid, 42);

        assert!(!receivers.is_empty());
        assert!(receivers.len() <= GRID_POINTS_PER_AXIS * GRID_POINTS_PER_AXIS);
        for receiver in &receivers {
            assert!(site_area.polygon.contains(&receiver.position));
        }
    }

    #[test]
    fn test_line_receivers_have_sequential_ids() {
        let site_area = hexagon_area();
        let receivers =
            generate_receivers(&site_area, &ReceiverParameters::default(), ReceiverLayout::Line, 42);

        assert_eq!(receivers.len(), LINE_POINTS);
        assert_eq!(receivers[0].id, "id_0");
        assert_eq!(receivers[9].id, "id_9");
        // 線分の中間点までしか進まない
        let centroid = site_area.get_position();
        let start = site_area.polygon.first_vertex().unwrap();
        let half = start.distance_to(&centroid) / 2.0;
        assert!(receivers[9].position.distance_to(&start) <= half + 1.0);
    }

    #[test]
    fn test_indoor_draws_are_reproducible() {
        let site_area = hexagon_area();
        let parameters = ReceiverParameters::default();
        let first = generate_receivers(&site_area, &parameters, ReceiverLayout::Grid, 7);
        let second = generate_receivers(&site_area, &parameters, ReceiverLayout::Grid, 7);
        assert_eq!(first, second);
    }

    #[test]
    fn test_indoor_probability_extremes() {
        let site_area = hexagon_area();
        let mut parameters = ReceiverParameters::default();
        parameters.indoor_probability = 0.0;
        let outdoor = generate_receivers(&site_area, &parameters, ReceiverLayout::Line, 1);
        assert!(outdoor.iter().all(|r| !r.indoor));

        parameters.indoor_probability = 1.0;
        let indoor = generate_receivers(&site_area, &parameters, ReceiverLayout::Line, 1);
        assert!(indoor.iter().all(|r| r.indoor));
    }
}
