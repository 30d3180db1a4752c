use crate::models::common::*;

/// 平面上に配置される全てのサイト要素（送信所・受信端末・セル領域）の基本インターフェース
pub trait ISite {
    /// 要素IDの取得
    fn get_id(&self) -> String;

    /// 代表位置の取得（セル領域の場合は重心）
    fn get_position(&self) -> Point2D;

    /// 他の要素との直線距離（メートル）
    fn distance_to(&self, other: &dyn ISite) -> f64 {
        self.get_position().distance_to(&other.get_position())
    }
}

/// 電波を放射する要素のインターフェース
pub trait IRadiator: ISite {
    /// 等価等方放射電力 EIRP（dBm）
    fn eirp(&self) -> f64;

    /// アンテナ高（m）
    fn get_antenna_height(&self) -> f64;

    /// アンテナ種別
    fn get_antenna_type(&self) -> AntennaType;
}
