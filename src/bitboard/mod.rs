//! ビットボードモジュール
//!
//! 64マスの盤面を64bitで表現し、高速なビット演算と利き計算を提供する。
//!
//! - `Bitboard`: 64bit盤面表現（bit i ↔ 升 i、A1=0）
//! - 筋・段ごとのマスク（`FILE_BB`, `RANK_BB`）
//! - 近接駒の利きテーブル（ポーン・ナイト・キング）
//! - 遠方駒の利き計算（ビショップ・ルーク・クイーン、`between_bb` / `line_bb` など）

mod core;
mod sliders;
mod tables;

pub use self::core::{Bitboard, BitboardIter, FILE_BB, RANK_BB};
pub use sliders::{
    bishop_effect, bishop_step_effect, queen_effect, queen_step_effect, ray_bb, ray_effect,
    rook_effect, rook_step_effect, Direct,
};
pub use tables::{aligned, between_bb, king_effect, knight_effect, line_bb, pawn_effect};

use crate::types::PieceType;

/// 駒種ごとの利き（ポーン以外）
#[inline]
pub fn piece_effect(pt: PieceType, sq: crate::types::Square, occupied: Bitboard) -> Bitboard {
    match pt {
        PieceType::Knight => knight_effect(sq),
        PieceType::Bishop => bishop_effect(sq, occupied),
        PieceType::Rook => rook_effect(sq, occupied),
        PieceType::Queen => queen_effect(sq, occupied),
        PieceType::King => king_effect(sq),
        PieceType::Pawn => Bitboard::EMPTY,
    }
}
