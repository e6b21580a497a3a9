//! 置換表モジュール
//!
//! 探索結果をキャッシュする置換表（Transposition Table）。
//!
//! - `TTEntry`: エントリ（10バイト、16bitキー）
//! - `Cluster`: エントリのグループ（32バイト）
//! - `TranspositionTable`: テーブル本体
//! - 世代管理
//! - prefetch
//!
//! クラスターインデックスは64bitキーとクラスター数の乗算の上位ビットで
//! 決定し、クラスター内のマッチングにはキーの上位16bitを使用する。
//! 10バイトエントリ × 3 + 2パディング = 32バイト/クラスター。
//!
//! 書き込みは非アトミックで、複数スレッドの同時アクセスによる
//! 切れた書き込みは設計上許容する。読み出した指し手は使用前に
//! `Position::pseudo_legal` で必ず検証すること。

mod alloc;
mod entry;
mod table;

pub use entry::{TTData, TTEntry};
pub use table::{ProbeResult, TranspositionTable};

/// クラスターサイズ（エントリ数）
pub const CLUSTER_SIZE: usize = 3;

/// Generation関連の定数。gen_bound8の下位3bit（PV+境界）は世代に使わない
pub const GENERATION_BITS: u32 = 3;
pub const GENERATION_DELTA: u8 = 1 << GENERATION_BITS; // 8
/// 256（u8の周期）+ 下位3bitの影響を打ち消すための7
pub const GENERATION_CYCLE: u16 = 255 + GENERATION_DELTA as u16; // 263
pub const GENERATION_MASK: u16 = 0xF8;
