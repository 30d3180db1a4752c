//! # Hexagon モジュール
//!
//! 基準点の周囲に等しい大きさの正六角形セルを敷き詰め、サービングセル領域と
//! それを取り囲む6つの干渉セル領域を決定します。
//!
//! ## 処理手順
//!
//! 1. 基準点を投影座標系へ変換（EPSG:4326 → EPSG:3857）
//! 2. 基準点を `2 × radius` でバッファし、その外接矩形を六角形で敷き詰め
//! 3. 基準点に最も近い重心を持つ六角形をサービングセル領域とし、
//!    その重心から2〜7番目に近い六角形を干渉セル領域とする
//! 4. 各領域の重心を送信所位置とする
//!
//! 乱数は一切使用しない純粋な幾何計算です。

use std::f64::consts::PI;

use thiserror::Error;
use tracing::debug;

use crate::models::{
    common::{Point2D, Polygon},
    site_area::SiteArea,
    transmitter::SiteRecord,
};

/// 干渉セルの数（六角形の1リング）
pub const INTERFERING_RING_SIZE: usize = 6;

/// WGS84 長半径（m）
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// 幾何計算エラー
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("セル半径が不正です: {0}")]
    InvalidRadius(f64),

    #[error("ポリゴン {id} が退化しています ({reason})")]
    DegeneratePolygon { id: String, reason: String },

    #[error("六角形が不足しています: {found} 個 (必要数 {required})")]
    InsufficientHexagons { found: usize, required: usize },

    #[error("座標変換 {from} -> {to} には対応していません")]
    UnsupportedProjection { from: String, to: String },
}

/// 敷き詰められた六角形1つ
#[derive(Debug, Clone, PartialEq)]
pub struct Hexagon {
    /// 生成順に割り当てられるサイトID
    pub site_id: usize,
    pub polygon: Polygon,
    pub centroid: Point2D,
}

/// `produce_sites_and_areas` の出力
#[derive(Debug, Clone)]
pub struct SiteLayout {
    pub transmitter: SiteRecord,
    pub interfering_transmitters: Vec<SiteRecord>,
    pub site_area: SiteArea,
    pub interfering_site_areas: Vec<SiteArea>,
}

/// 矩形範囲を正六角形で敷き詰めた頂点リストを計算
///
/// 行ごとに `3p` ずつ上へ進み、偶数行は `b`（アポセム）だけ右へずらして隙間なく
/// 並べます。開始・終了座標は六角形1つ分の幅・高さだけ外側へ広げて、範囲全体を
/// 確実に覆います。各ポリゴンは先頭頂点で閉じた7点リングです。
pub fn build_hexagons(
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    radius: f64,
) -> Result<Vec<Polygon>, GeometryError> {
    if !(radius > 0.0) || !radius.is_finite() {
        return Err(GeometryError::InvalidRadius(radius));
    }

    let side_length = (2.0 * radius) * (PI / 6.0).tan();

    let p = side_length * 0.5;
    let b = side_length * 30f64.to_radians().cos();
    let w = b * 2.0;
    let h = 2.0 * side_length;

    let origin_x = min_x - w;
    let mut start_y = min_y - h;
    let end_x = max_x + w;
    let end_y = max_y + h;

    let x_offset = b;
    let y_offset = 3.0 * p;

    let mut polygons = Vec::new();
    let mut row = 1;

    while start_y < end_y {
        let mut start_x = if row % 2 == 0 { origin_x + x_offset } else { origin_x };

        while start_x < end_x {
            polygons.push(Polygon::new(vec![
                Point2D::new(start_x, start_y + p),
                Point2D::new(start_x, start_y + 3.0 * p),
                Point2D::new(start_x + b, start_y + h),
                Point2D::new(start_x + w, start_y + 3.0 * p),
                Point2D::new(start_x + w, start_y + p),
                Point2D::new(start_x + b, start_y),
            ]));
            start_x += w;
        }

        start_y += y_offset;
        row += 1;
    }

    Ok(polygons)
}

/// ポリゴン群に生成順のサイトIDと重心を付与
pub fn index_hexagons(polygons: Vec<Polygon>) -> Vec<Hexagon> {
    polygons
        .into_iter()
        .enumerate()
        .map(|(site_id, polygon)| {
            let centroid = polygon.centroid();
            Hexagon {
                site_id,
                polygon,
                centroid,
            }
        })
        .collect()
}

/// 参照位置に最も近い六角形と、その周囲6つの六角形を決定
///
/// 距離が等しい場合は挿入順（サイトIDの昇順）で決まります。
pub fn locate_nearest_areas(
    hexagons: &[Hexagon],
    reference: Point2D,
) -> Result<(Hexagon, Vec<Hexagon>), GeometryError> {
    let required = INTERFERING_RING_SIZE + 1;
    if hexagons.len() < required {
        return Err(GeometryError::InsufficientHexagons {
            found: hexagons.len(),
            required,
        });
    }

    let nearest = rank_by_distance(hexagons, reference)[0];
    let site_centroid = nearest.polygon.centroid();

    let ranked = rank_by_distance(hexagons, site_centroid);
    let site_area = ranked[0].clone();
    let interfering = ranked[1..required].iter().map(|h| (*h).clone()).collect();

    Ok((site_area, interfering))
}

fn rank_by_distance(hexagons: &[Hexagon], reference: Point2D) -> Vec<&Hexagon> {
    let mut ranked: Vec<&Hexagon> = hexagons.iter().collect();
    // sort_by は安定ソートなので同距離は挿入順のまま
    ranked.sort_by(|a, b| {
        a.centroid
            .distance_to(&reference)
            .total_cmp(&b.centroid.distance_to(&reference))
    });
    ranked
}

/// セル領域の重心から送信所位置を決定
pub fn derive_transmitter_points(
    site_area: &Hexagon,
    interfering_areas: &[Hexagon],
) -> (SiteRecord, Vec<SiteRecord>) {
    let transmitter = SiteRecord {
        id: "transmitter".to_string(),
        position: site_area.polygon.centroid(),
    };

    let interfering_transmitters = interfering_areas
        .iter()
        .map(|area| SiteRecord {
            id: area.site_id.to_string(),
            position: area.centroid,
        })
        .collect();

    (transmitter, interfering_transmitters)
}

/// 座標参照系間で点を変換
///
/// 対応しているのは同一CRS（無変換）と EPSG:4326 → EPSG:3857（球面メルカトル）です。
/// 入力点は (経度, 緯度) の順です。
pub fn reproject_point(
    point: Point2D,
    source_crs: &str,
    target_crs: &str,
) -> Result<Point2D, GeometryError> {
    let source = source_crs.to_lowercase();
    let target = target_crs.to_lowercase();

    if source == target {
        return Ok(point);
    }

    match (source.as_str(), target.as_str()) {
        ("epsg:4326", "epsg:3857") => {
            let x = EARTH_RADIUS_M * point.x.to_radians();
            let y = EARTH_RADIUS_M * (PI / 4.0 + point.y.to_radians() / 2.0).tan().ln();
            Ok(Point2D::new(x, y))
        }
        _ => Err(GeometryError::UnsupportedProjection {
            from: source_crs.to_string(),
            to: target_crs.to_string(),
        }),
    }
}

/// 指定半径のサービングセル・干渉セルと送信所位置を生成
///
/// # 戻り値
///
/// 送信所1基、干渉送信所6基、サービングセル領域1つ、干渉セル領域6つ
pub fn produce_sites_and_areas(
    point: Point2D,
    radius: f64,
    source_crs: &str,
    target_crs: &str,
) -> Result<SiteLayout, GeometryError> {
    let projected = reproject_point(point, source_crs, target_crs)?;

    let buffer = radius * 2.0;
    let polygons = build_hexagons(
        projected.x - buffer,
        projected.y - buffer,
        projected.x + buffer,
        projected.y + buffer,
        radius,
    )?;
    let hexagons = index_hexagons(polygons);

    let (site_hexagon, interfering_hexagons) = locate_nearest_areas(&hexagons, projected)?;
    let (transmitter, interfering_transmitters) =
        derive_transmitter_points(&site_hexagon, &interfering_hexagons);

    let site_area = SiteArea::new(site_hexagon.site_id.to_string(), site_hexagon.polygon)?;
    let interfering_site_areas = interfering_hexagons
        .into_iter()
        .map(|h| SiteArea::new(h.site_id.to_string(), h.polygon))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        radius_m = radius,
        hexagon_count = hexagons.len(),
        site_area_id = %site_area.id,
        site_area_m2 = site_area.area,
        transmitter_x = transmitter.position.x,
        transmitter_y = transmitter.position.y,
        "SITES_PRODUCED: セル領域と送信所位置を生成しました"
    );

    Ok(SiteLayout {
        transmitter,
        interfering_transmitters,
        site_area,
        interfering_site_areas,
    })
}
