//! rchess-core — チェスエンジンの局面コア
//!
//! アルファベータ探索が毎ノード触れる基盤部分を提供する:
//!
//! - `types`: 基本型（Square / Piece / Move / Value など）
//! - `bitboard`: 64bit盤面表現と利き計算
//! - `position`: 局面本体・StateInfoスタック・Zobristハッシュ・FEN・
//!   指し手の実行/巻き戻し・合法性判定・SEE・千日手検出
//! - `movegen`: 合法手生成とperft
//! - `tt`: クラスター式の共有置換表（世代管理・非アトミックなレース許容）
//! - `prefetch`: 置換表プリフェッチのトレイト
//!
//! 通常チェスとChess960（Fischer Random）の両方を扱う。
//! 各探索ワーカーは自分の`Position`を占有し、スレッド間で共有される
//! 可変状態は置換表だけ、という並行モデルを前提にしている。

pub mod bitboard;
pub mod movegen;
pub mod position;
pub mod prefetch;
pub mod tt;
pub mod types;

pub use movegen::{perft, MoveList};
pub use position::{FenError, Position, StateInfo, START_FEN};
pub use prefetch::{NoPrefetch, TtPrefetch};
pub use tt::{TTData, TranspositionTable};
pub use types::{
    Bound, CastlingRights, Color, File, Key, Move, MoveType, Piece, PieceType, Rank, Square, Value,
};
