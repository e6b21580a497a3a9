//! 指し手生成器
//!
//! pseudo-legalな指し手を生成し、`Position::legal` のフィルタを通して
//! 合法手リストを作る。チェック中は回避手だけを生成する。
//! 並べ替えは行わない（move orderingは探索側の責務）。

use crate::bitboard::{
    between_bb, king_effect, line_bb, pawn_effect, piece_effect, Bitboard, RANK_BB,
};
use crate::position::Position;
use crate::types::{pawn_push, CastlingRights, Color, Move, PieceType, Rank, Square};

/// 1局面の指し手数の上限
pub const MAX_MOVES: usize = 256;

/// 指し手リスト（固定長バッファ）
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; MAX_MOVES],
    len: usize,
}

impl MoveList {
    /// 合法手のリストを生成する
    pub fn legal(pos: &Position) -> MoveList {
        let mut list = MoveList::pseudo_legal(pos);
        list.retain(|m| pos.legal(m));
        list
    }

    /// pseudo-legalな指し手のリストを生成する（チェック中は回避手のみ）
    pub fn pseudo_legal(pos: &Position) -> MoveList {
        let mut list = MoveList {
            moves: [Move::NONE; MAX_MOVES],
            len: 0,
        };
        if pos.in_check() {
            generate_evasions(pos, &mut list);
        } else {
            generate_non_evasions(pos, &mut list);
        }
        list
    }

    #[inline]
    fn push(&mut self, m: Move) {
        debug_assert!(self.len < MAX_MOVES);
        self.moves[self.len] = m;
        self.len += 1;
    }

    /// 指し手の数
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 空かどうか
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 指し手が含まれるか
    #[inline]
    pub fn contains(&self, m: Move) -> bool {
        self.as_slice().contains(&m)
    }

    /// 指し手を走査するイテレータ
    pub fn iter(&self) -> impl Iterator<Item = Move> + '_ {
        self.as_slice().iter().copied()
    }

    /// スライスとして参照する
    #[inline]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len]
    }

    fn retain(&mut self, f: impl Fn(Move) -> bool) {
        let mut kept = 0;
        for i in 0..self.len {
            if f(self.moves[i]) {
                self.moves[kept] = self.moves[i];
                kept += 1;
            }
        }
        self.len = kept;
    }
}

/// チェックされていない局面の全pseudo-legal手
fn generate_non_evasions(pos: &Position, list: &mut MoveList) {
    debug_assert!(!pos.in_check());

    let us = pos.side_to_move();
    let target = !pos.pieces_c(us);

    generate_pawn_moves(pos, list, target);
    generate_piece_moves(pos, list, target);

    let ksq = pos.king_square(us);
    for to in king_effect(ksq) & target {
        list.push(Move::new(ksq, to));
    }

    for king_side in [true, false] {
        let cr = CastlingRights::make(us, king_side);
        if pos.can_castle(cr) && !pos.castling_impeded(cr) {
            list.push(Move::new_castling(ksq, pos.castling_rook_square(cr)));
        }
    }
}

/// チェック回避手
fn generate_evasions(pos: &Position, list: &mut MoveList) {
    debug_assert!(pos.in_check());

    let us = pos.side_to_move();
    let ksq = pos.king_square(us);
    let checkers = pos.checkers();

    // スライダーのチェックでは、チェック方向に沿って後退する升も利きの
    // 延長線上にある。キングをどけた状態の利きに相当する直線マスクで
    // 移動先から除外する（チェック駒自身の升は捕獲できるので残す）
    let mut slider_attacks = Bitboard::EMPTY;
    let sliders = checkers
        & (pos.pieces_pt(PieceType::Bishop)
            | pos.pieces_pt(PieceType::Rook)
            | pos.pieces_pt(PieceType::Queen));
    for checker_sq in sliders {
        slider_attacks |= line_bb(checker_sq, ksq) ^ checker_sq;
    }

    for to in king_effect(ksq) & !pos.pieces_c(us) & !slider_attacks {
        list.push(Move::new(ksq, to));
    }

    // 両王手はキングを動かすしかない
    if checkers.more_than_one() {
        return;
    }

    // 遮断するか、チェック駒を取る
    let checker_sq = match checkers.lsb() {
        Some(sq) => sq,
        None => return,
    };
    let target = between_bb(checker_sq, ksq) | checker_sq;
    generate_pawn_moves(pos, list, target);
    generate_piece_moves(pos, list, target);
}

/// ナイト・ビショップ・ルーク・クイーンの指し手
fn generate_piece_moves(pos: &Position, list: &mut MoveList, target: Bitboard) {
    let us = pos.side_to_move();
    let occupied = pos.occupied();

    for pt in [
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
    ] {
        for from in pos.pieces(us, pt) {
            for to in piece_effect(pt, from, occupied) & target {
                list.push(Move::new(from, to));
            }
        }
    }
}

/// ポーンの指し手（前進・捕獲・プロモーション・アンパッサン）
fn generate_pawn_moves(pos: &Position, list: &mut MoveList, target: Bitboard) {
    let us = pos.side_to_move();
    let them = !us;
    let up = pawn_push(us);
    let (cap_west, cap_east) = if us == Color::White {
        (Square::DELTA_NW, Square::DELTA_NE)
    } else {
        (Square::DELTA_SW, Square::DELTA_SE)
    };

    let rank7 = RANK_BB[Rank::Rank7.relative(us).index()];
    let rank3 = RANK_BB[Rank::Rank3.relative(us).index()];

    let pawns = pos.pieces(us, PieceType::Pawn);
    let pawns_on7 = pawns & rank7;
    let pawns_not_on7 = pawns & !rank7;
    let empty = !pos.occupied();
    let enemies = pos.pieces_c(them);

    // 前進（1升・2升）
    let single = pawns_not_on7.shift(up) & empty;
    let double = (single & rank3).shift(up) & empty & target;
    for to in single & target {
        list.push(Move::new(to.add(-up), to));
    }
    for to in double {
        list.push(Move::new(to.add(-up).add(-up), to));
    }

    // 捕獲
    for delta in [cap_west, cap_east] {
        for to in pawns_not_on7.shift(delta) & enemies & target {
            list.push(Move::new(to.add(-delta), to));
        }
    }

    // プロモーション（前進・捕獲とも4種へ展開する）
    if !pawns_on7.is_empty() {
        for to in pawns_on7.shift(up) & empty & target {
            push_promotions(list, to.add(-up), to);
        }
        for delta in [cap_west, cap_east] {
            for to in pawns_on7.shift(delta) & enemies & target {
                push_promotions(list, to.add(-delta), to);
            }
        }
    }

    // アンパッサン
    if let Some(ep) = pos.ep_square() {
        debug_assert_eq!(ep.relative_rank(us), Rank::Rank6);
        let capsq = ep.add(-up);

        // チェック中の回避としてのアンパッサンは、取られるポーン自身が
        // チェック駒であるか、ep升への移動がチェックを遮断する場合に限る
        if pos.in_check() && !pos.checkers().contains(capsq) && !target.contains(ep) {
            return;
        }

        for from in pawn_effect(them, ep) & pawns_not_on7 {
            list.push(Move::new_en_passant(from, ep));
        }
    }
}

fn push_promotions(list: &mut MoveList, from: Square, to: Square) {
    for pt in [
        PieceType::Queen,
        PieceType::Rook,
        PieceType::Bishop,
        PieceType::Knight,
    ] {
        list.push(Move::new_promotion(from, to, pt));
    }
}

/// 深さdepthの末端ノード数を数える（指し手生成の正当性検証用）
pub fn perft(pos: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let list = MoveList::legal(pos);
    if depth == 1 {
        return list.len() as u64;
    }

    let mut nodes = 0;
    for m in list.iter() {
        let gives_check = pos.gives_check(m);
        pos.do_move(m, gives_check);
        nodes += perft(pos, depth - 1);
        pos.undo_move(m);
    }
    nodes
}
