//! 局面表現モジュール
//!
//! チェスの局面を表現し、指し手の実行・巻き戻しを行う。
//!
//! - `Position`: 局面本体（盤面配列・Bitboard・piece_list・キャスリング情報・手番・手数）
//! - `StateInfo`: 局面状態（Zobristハッシュ、チェック情報、ピン情報、直前の捕獲駒など）
//! - `zobrist_*`: Zobristハッシュ乱数テーブル（駒×升・アンパッサン筋・キャスリング権・手番）
//! - `do_move` / `undo_move` / `do_null_move`: 指し手の実行と巻き戻し
//!   （`StateInfo` をスタックとして管理）
//! - FEN形式の解析・出力（標準 / Shredder-FEN / X-FEN）
//!
//! 盤面配列・Bitboard・piece_list・Zobristキーは `Position` のメソッド
//! （`put_piece` / `remove_piece` / `do_move` 系）を通じて更新されることを前提とし、
//! 常に互いに整合しているように保つ。

mod fen;
pub mod json_conversion;
mod pos;
mod state;
mod zobrist;

pub use fen::{FenError, START_FEN};
pub use pos::Position;
pub use state::StateInfo;
pub use zobrist::{
    zobrist_castling, zobrist_enpassant, zobrist_no_pawns, zobrist_psq, zobrist_psq_nth,
    zobrist_side,
};
