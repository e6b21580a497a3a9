//! 局面状態（StateInfo）
//!
//! 1手ごとのスナップショット。`Position` が `Vec<StateInfo>` のスタックとして
//! 管理し、`do_move` でpush、`undo_move` でpopする。親状態はスタック上の
//! 1つ手前の要素（巻き戻しはハッシュを再計算せず、popするだけで復元される）。

use crate::bitboard::Bitboard;
use crate::types::{CastlingRights, Key, Piece, PieceType, Square, Value};

/// 局面状態（1手ごとのスナップショット）
#[derive(Debug, Clone, Copy)]
pub struct StateInfo {
    // ---- do_moveで親からコピーされるフィールド ----
    /// ポーン配置のハッシュ
    pub(crate) pawn_key: Key,
    /// 駒構成のハッシュ
    pub(crate) material_key: Key,
    /// ポーン以外の駒の材料値（手番別）
    pub(crate) non_pawn_material: [Value; 2],
    /// キャスリング権
    pub(crate) castling_rights: CastlingRights,
    /// 50手ルールカウンタ（最後の捕獲・ポーン手からの手数）
    pub(crate) rule50: i32,
    /// ヌルムーブからの手数（千日手走査の上限）
    pub(crate) plies_from_null: i32,
    /// アンパッサン対象升
    pub(crate) ep_square: Option<Square>,

    // ---- 毎手計算し直すフィールド ----
    /// 局面ハッシュ
    pub(crate) key: Key,
    /// 手番のキングにチェックをかけている駒
    pub(crate) checkers: Bitboard,
    /// キングへのスライダー攻撃を遮っている駒（手番別、両カラーの駒を含む）
    pub(crate) blockers_for_king: [Bitboard; 2],
    /// 相手キングをピンしている駒（手番別）
    pub(crate) pinners: [Bitboard; 2],
    /// 駒種ごとの「そこに動けば相手キングにチェックになる」升
    pub(crate) check_squares: [Bitboard; PieceType::NUM + 1],
    /// 直前の手で取られた駒
    pub(crate) captured_piece: Piece,
    /// 同一局面までの手数差（負なら3回目以上の出現、0なら未出現）
    pub(crate) repetition: i32,
}

impl Default for StateInfo {
    fn default() -> Self {
        StateInfo {
            pawn_key: 0,
            material_key: 0,
            non_pawn_material: [Value::ZERO; 2],
            castling_rights: CastlingRights::NONE,
            rule50: 0,
            plies_from_null: 0,
            ep_square: None,
            key: 0,
            checkers: Bitboard::EMPTY,
            blockers_for_king: [Bitboard::EMPTY; 2],
            pinners: [Bitboard::EMPTY; 2],
            check_squares: [Bitboard::EMPTY; PieceType::NUM + 1],
            captured_piece: Piece::NONE,
            repetition: 0,
        }
    }
}

impl StateInfo {
    /// do_move用の子状態を作る
    ///
    /// 引き継ぎフィールドだけを親からコピーし、毎手計算し直すフィールドは
    /// 初期値のままにする（do_moveが上書きする）。
    #[inline]
    pub(crate) fn new_child(&self) -> StateInfo {
        StateInfo {
            pawn_key: self.pawn_key,
            material_key: self.material_key,
            non_pawn_material: self.non_pawn_material,
            castling_rights: self.castling_rights,
            rule50: self.rule50,
            plies_from_null: self.plies_from_null,
            ep_square: self.ep_square,
            ..StateInfo::default()
        }
    }
}
