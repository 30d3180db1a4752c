use crate::hexagon::GeometryError;
use crate::models::{
    common::{Point2D, Polygon},
    traits::ISite,
};

/// セル領域
///
/// 送信所がカバーする六角形領域です。シミュレーションでは容量を
/// 面積密度（Mbps/km²）に正規化する目的にのみ使用されます。
#[derive(Debug, Clone, PartialEq)]
pub struct SiteArea {
    pub id: String,
    pub polygon: Polygon,
    /// 平面面積（m²）、常に正
    pub area: f64,
}

impl SiteArea {
    /// ポリゴンからセル領域を作成
    ///
    /// # エラー
    ///
    /// 頂点数が不足している場合、または面積がゼロの場合は `GeometryError`
    pub fn new(id: impl Into<String>, polygon: Polygon) -> Result<Self, GeometryError> {
        let id = id.into();
        let vertices = polygon.ring().len();
        if vertices < 4 {
            return Err(GeometryError::DegeneratePolygon {
                id,
                reason: format!("{} vertices", vertices),
            });
        }

        let area = polygon.area();
        if !(area > 0.0) || !area.is_finite() {
            return Err(GeometryError::DegeneratePolygon {
                id,
                reason: format!("area {}", area),
            });
        }

        Ok(Self { id, polygon, area })
    }

    /// 面積（km²）
    pub fn area_km2(&self) -> f64 {
        self.area / 1e6
    }
}

impl ISite for SiteArea {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_position(&self) -> Point2D {
        self.polygon.centroid()
    }
}
