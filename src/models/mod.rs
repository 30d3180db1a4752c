// 基本的なデータ型と数学ユーティリティ
pub mod common;

// サイトと送信所の基本インターフェース（trait）定義
pub mod traits;

// 各モデルの実装
pub mod receiver;
pub mod site_area;
pub mod transmitter;

// 便利な re-export
pub use common::*;
pub use receiver::{generate_receivers, Receiver, ReceiverLayout, ReceiverParameters};
pub use site_area::SiteArea;
pub use traits::*;
pub use transmitter::{AntennaConfig, InterferingTransmitter, SiteRecord, Transmitter, TransmitterParameters};
