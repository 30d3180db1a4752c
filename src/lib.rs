//! # capsim
//!
//! 4G/5G 無線アクセスネットワークのリンクバジェット・容量シミュレータ。
//!
//! 六角形タイリングでサービングサイトと干渉サイトを配置し、受信端末ごとに
//! 経路損失・受信電力・干渉・雑音・SINR・周波数利用効率・面容量を推定します。

pub mod hexagon;
pub mod logging;
pub mod models;
pub mod modulation;
pub mod path_loss;
pub mod report;
pub mod scenario;
pub mod simulation;
pub mod sweep;
