use geo::{Area, BoundingRect, Centroid, Contains, Coord, LineString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// 投影座標系上の2次元位置（メートル）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64, // m
    pub y: f64, // m
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 2点間の直線距離を計算
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// 2点を結ぶ線分上の位置を補間（`fraction` = 0.0 で self、1.0 で other）
    pub fn interpolate(&self, other: &Point2D, fraction: f64) -> Point2D {
        Point2D::new(
            self.x + (other.x - self.x) * fraction,
            self.y + (other.y - self.y) * fraction,
        )
    }
}

impl Add for Point2D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point2D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl From<Point2D> for Coord<f64> {
    fn from(point: Point2D) -> Self {
        Coord { x: point.x, y: point.y }
    }
}

impl From<geo::Point<f64>> for Point2D {
    fn from(point: geo::Point<f64>) -> Self {
        Point2D::new(point.x(), point.y())
    }
}

/// 閉じたリングで表されるポリゴン
///
/// 幾何演算は `geo::Polygon` に委ねます。外周リングは先頭と末尾の頂点が
/// 一致する形で保持されます（六角形なら7頂点）。
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    inner: geo::Polygon<f64>,
}

impl Polygon {
    /// 頂点列からポリゴンを作成（閉じていなければ先頭頂点を末尾に追加）
    pub fn new(ring: Vec<Point2D>) -> Self {
        let exterior = LineString::new(ring.into_iter().map(Coord::from).collect());
        Self {
            inner: geo::Polygon::new(exterior, Vec::new()),
        }
    }

    /// 外周リングの頂点（閉じた形）
    pub fn ring(&self) -> Vec<Point2D> {
        self.inner
            .exterior()
            .coords()
            .map(|c| Point2D::new(c.x, c.y))
            .collect()
    }

    /// 外周リングの先頭頂点
    pub fn first_vertex(&self) -> Option<Point2D> {
        self.inner
            .exterior()
            .coords()
            .next()
            .map(|c| Point2D::new(c.x, c.y))
    }

    pub fn as_geo(&self) -> &geo::Polygon<f64> {
        &self.inner
    }

    /// 平面面積（m²）
    pub fn area(&self) -> f64 {
        self.inner.unsigned_area()
    }

    /// 重心
    ///
    /// 面積がゼロの退化ポリゴンでは外周線の重心、頂点がなければ原点を返します。
    pub fn centroid(&self) -> Point2D {
        self.inner
            .centroid()
            .map(Point2D::from)
            .unwrap_or(Point2D::new(0.0, 0.0))
    }

    /// 外接矩形 (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.inner.bounding_rect().map(|rect| {
            let (min, max) = (rect.min(), rect.max());
            (min.x, min.y, max.x, max.y)
        })
    }

    /// 点がポリゴン内部にあるかどうか（境界上の点は含まない）
    pub fn contains(&self, point: &Point2D) -> bool {
        self.inner.contains(&geo::Point::new(point.x, point.y))
    }
}

/// 周辺環境（クラッタ）の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Urban,
    Suburban,
    Rural,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Urban => "urban",
            Environment::Suburban => "suburban",
            Environment::Rural => "rural",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 見通し状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SightLine {
    /// 見通し内（Line of Sight）
    Los,
    /// 見通し外（Non Line of Sight）
    Nlos,
}

impl SightLine {
    /// 距離と見通し判定距離から見通し状態を決定
    pub fn from_distance(distance_m: f64, los_distance_m: f64) -> Self {
        if distance_m < los_distance_m {
            SightLine::Los
        } else {
            SightLine::Nlos
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SightLine::Los => "los",
            SightLine::Nlos => "nlos",
        }
    }
}

impl fmt::Display for SightLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 基地局アンテナの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntennaType {
    Macro,
    Micro,
}

impl fmt::Display for AntennaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AntennaType::Macro => f.write_str("macro"),
            AntennaType::Micro => f.write_str("micro"),
        }
    }
}

/// 無線アクセス技術の世代
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Generation {
    #[serde(rename = "4G")]
    FourG,
    #[serde(rename = "5G")]
    FiveG,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::FourG => f.write_str("4G"),
            Generation::FiveG => f.write_str("5G"),
        }
    }
}

/// 数値ユーティリティ
pub mod math_utils {
    /// 小数点以下 `decimals` 桁に丸める
    pub fn round_to(value: f64, decimals: i32) -> f64 {
        let factor = 10f64.powi(decimals);
        (value * factor).round() / factor
    }

    /// 値の算術平均（空なら0）
    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// 最近傍法によるパーセンタイル（`percentile` は 0〜100）
    pub fn percentile_nearest(values: &[f64], percentile: f64) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = (percentile.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
        Some(sorted[rank.round() as usize])
    }
}
