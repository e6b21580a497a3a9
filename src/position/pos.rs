//! 局面本体（Position）
//!
//! 盤面配列・Bitboard・piece_list・キャスリング情報・StateInfoスタックを
//! 一体で管理する。盤面の更新は必ず `put_piece` / `remove_piece` /
//! `move_piece` を通し、全インデックスが常に整合しているように保つ。
//!
//! `do_move` はZobristキー・pawn_key・material_key・非ポーン材料値を
//! 差分更新し、`undo_move` は再計算なしでスタックのpopにより復元する。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bitboard::{
    aligned, between_bb, bishop_effect, bishop_step_effect, king_effect, knight_effect,
    pawn_effect, piece_effect, rook_effect, rook_step_effect, Bitboard, RANK_BB,
};
use crate::movegen::MoveList;
use crate::prefetch::{NoPrefetch, TtPrefetch};
use crate::types::{
    pawn_push, piece_value, piece_value_of, CastlingRights, Color, File, Key, Move, MoveType,
    Piece, PieceType, Rank, Square, Value,
};

use super::state::StateInfo;
use super::zobrist::{
    zobrist_castling, zobrist_enpassant, zobrist_no_pawns, zobrist_psq, zobrist_psq_nth,
    zobrist_side,
};

/// StateInfoスタックの初期確保量
///
/// 探索中の`do_move`でVecの再確保が起きないよう、実戦で届かない深さまで
/// 先に確保しておく。
const STATE_STACK_RESERVE: usize = 1024;

/// 局面
#[derive(Clone)]
pub struct Position {
    /// 升→駒の対応
    pub(crate) board: [Piece; Square::NUM],
    /// 駒種別のBitboard（[0]は全駒の合併）
    pub(crate) by_type: [Bitboard; PieceType::NUM + 1],
    /// 手番別のBitboard
    pub(crate) by_color: [Bitboard; Color::NUM],
    /// 駒ごとの枚数
    pub(crate) piece_count: [i32; Piece::NUM],
    /// 駒ごとの升リスト（走査なしでO(1)削除するための逆引き）
    pub(crate) piece_list: [[Square; 16]; Piece::NUM],
    /// 升→piece_list内の位置
    pub(crate) index: [u8; Square::NUM],
    /// その升から/へ駒が動いたときに失われるキャスリング権
    pub(crate) castling_rights_mask: [CastlingRights; Square::NUM],
    /// キャスリング権ごとのルーク初期位置
    pub(crate) castling_rook_square: [Square; CastlingRights::NUM],
    /// キャスリング権ごとの経路（空きであるべき升）
    pub(crate) castling_path: [Bitboard; CastlingRights::NUM],
    /// 手番
    pub(crate) side_to_move: Color,
    /// 開始局面からの手数
    pub(crate) game_ply: i32,
    /// Chess960かどうか
    pub(crate) chess960: bool,
    /// StateInfoスタック（最後尾が現局面）
    pub(crate) states: Vec<StateInfo>,
    /// 探索ノードカウンタ（ワーカーと共有。relaxedでインクリメントのみ）
    pub(crate) nodes: Arc<AtomicU64>,
}

impl Position {
    /// 空の局面を作る（通常はこの後 `set` でFENから構築する）
    pub fn new() -> Position {
        let mut states = Vec::with_capacity(STATE_STACK_RESERVE);
        states.push(StateInfo::default());
        Position {
            board: [Piece::NONE; Square::NUM],
            by_type: [Bitboard::EMPTY; PieceType::NUM + 1],
            by_color: [Bitboard::EMPTY; Color::NUM],
            piece_count: [0; Piece::NUM],
            piece_list: [[Square::NONE; 16]; Piece::NUM],
            index: [0; Square::NUM],
            castling_rights_mask: [CastlingRights::NONE; Square::NUM],
            castling_rook_square: [Square::NONE; CastlingRights::NUM],
            castling_path: [Bitboard::EMPTY; CastlingRights::NUM],
            side_to_move: Color::White,
            game_ply: 0,
            chess960: false,
            states,
            nodes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 全フィールドを初期状態に戻す（`set` の冒頭で使う）
    pub(crate) fn reset(&mut self) {
        self.board = [Piece::NONE; Square::NUM];
        self.by_type = [Bitboard::EMPTY; PieceType::NUM + 1];
        self.by_color = [Bitboard::EMPTY; Color::NUM];
        self.piece_count = [0; Piece::NUM];
        self.piece_list = [[Square::NONE; 16]; Piece::NUM];
        self.index = [0; Square::NUM];
        self.castling_rights_mask = [CastlingRights::NONE; Square::NUM];
        self.castling_rook_square = [Square::NONE; CastlingRights::NUM];
        self.castling_path = [Bitboard::EMPTY; CastlingRights::NUM];
        self.side_to_move = Color::White;
        self.game_ply = 0;
        self.chess960 = false;
        self.states.clear();
        self.states.push(StateInfo::default());
    }

    // =========================================================================
    // 状態アクセス
    // =========================================================================

    #[inline]
    pub(crate) fn st(&self) -> &StateInfo {
        self.states.last().unwrap()
    }

    #[inline]
    pub(crate) fn st_mut(&mut self) -> &mut StateInfo {
        self.states.last_mut().unwrap()
    }

    /// 手番
    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// 全駒の合併Bitboard
    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.by_type[0]
    }

    /// 手番別のBitboard
    #[inline]
    pub fn pieces_c(&self, c: Color) -> Bitboard {
        self.by_color[c.index()]
    }

    /// 駒種別のBitboard（両カラー）
    #[inline]
    pub fn pieces_pt(&self, pt: PieceType) -> Bitboard {
        self.by_type[pt.index()]
    }

    /// 手番×駒種のBitboard
    #[inline]
    pub fn pieces(&self, c: Color, pt: PieceType) -> Bitboard {
        self.by_color[c.index()] & self.by_type[pt.index()]
    }

    /// 升の上の駒
    #[inline]
    pub fn piece_on(&self, sq: Square) -> Piece {
        self.board[sq.index()]
    }

    /// 升が空かどうか
    #[inline]
    pub fn empty(&self, sq: Square) -> bool {
        self.board[sq.index()].is_none()
    }

    /// 指し手で動く駒
    #[inline]
    pub fn moved_piece(&self, m: Move) -> Piece {
        self.piece_on(m.from())
    }

    /// 駒の枚数
    #[inline]
    pub fn count(&self, pc: Piece) -> i32 {
        self.piece_count[pc.index()]
    }

    /// キングの位置
    #[inline]
    pub fn king_square(&self, c: Color) -> Square {
        self.piece_list[Piece::make(c, PieceType::King).index()][0]
    }

    /// 開始局面からの手数
    #[inline]
    pub fn game_ply(&self) -> i32 {
        self.game_ply
    }

    /// Chess960かどうか
    #[inline]
    pub fn is_chess960(&self) -> bool {
        self.chess960
    }

    /// 局面ハッシュ
    #[inline]
    pub fn key(&self) -> Key {
        self.st().key
    }

    /// ポーン配置のハッシュ
    #[inline]
    pub fn pawn_key(&self) -> Key {
        self.st().pawn_key
    }

    /// 駒構成のハッシュ
    #[inline]
    pub fn material_key(&self) -> Key {
        self.st().material_key
    }

    /// ポーン以外の材料値
    #[inline]
    pub fn non_pawn_material(&self, c: Color) -> Value {
        self.st().non_pawn_material[c.index()]
    }

    /// 手番のキングにチェックをかけている駒
    #[inline]
    pub fn checkers(&self) -> Bitboard {
        self.st().checkers
    }

    /// 手番がチェックされているか
    #[inline]
    pub fn in_check(&self) -> bool {
        !self.st().checkers.is_empty()
    }

    /// c側キングへのスライダー攻撃を遮っている駒
    #[inline]
    pub fn blockers_for_king(&self, c: Color) -> Bitboard {
        self.st().blockers_for_king[c.index()]
    }

    /// c側が相手キングに対してピンしている駒
    #[inline]
    pub fn pinners(&self, c: Color) -> Bitboard {
        self.st().pinners[c.index()]
    }

    /// そこに動けば相手キングにチェックになる升
    #[inline]
    pub fn check_squares(&self, pt: PieceType) -> Bitboard {
        self.st().check_squares[pt.index()]
    }

    /// アンパッサン対象升
    #[inline]
    pub fn ep_square(&self) -> Option<Square> {
        self.st().ep_square
    }

    /// 50手ルールカウンタ
    #[inline]
    pub fn rule50_count(&self) -> i32 {
        self.st().rule50
    }

    /// ヌルムーブからの手数
    #[inline]
    pub fn plies_from_null(&self) -> i32 {
        self.st().plies_from_null
    }

    /// 直前の手で取られた駒
    #[inline]
    pub fn captured_piece(&self) -> Piece {
        self.st().captured_piece
    }

    /// 現局面のキャスリング権
    #[inline]
    pub fn castling_rights(&self) -> CastlingRights {
        self.st().castling_rights
    }

    /// 指定の権利が残っているか
    #[inline]
    pub fn can_castle(&self, cr: CastlingRights) -> bool {
        self.st().castling_rights.intersects(cr)
    }

    /// キャスリング経路上に駒があるか
    #[inline]
    pub fn castling_impeded(&self, cr: CastlingRights) -> bool {
        !(self.occupied() & self.castling_path[cr.index()]).is_empty()
    }

    /// キャスリング権に対応するルーク初期位置
    #[inline]
    pub fn castling_rook_square(&self, cr: CastlingRights) -> Square {
        self.castling_rook_square[cr.index()]
    }

    /// キャスリング経路（空きであるべき升）
    #[inline]
    pub fn castling_path(&self, cr: CastlingRights) -> Bitboard {
        self.castling_path[cr.index()]
    }

    /// 探索ノード数
    #[inline]
    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    /// ノードカウンタへの共有参照（ワーカーが集計に使う）
    #[inline]
    pub fn node_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.nodes)
    }

    /// ノードカウンタを差し替える（ワーカー所属時に共有カウンタへ付け替える）
    pub fn set_node_counter(&mut self, counter: Arc<AtomicU64>) {
        self.nodes = counter;
    }

    // =========================================================================
    // 盤面更新プリミティブ
    // =========================================================================

    pub(crate) fn put_piece(&mut self, pc: Piece, sq: Square) {
        // 盤面配列はremove_piece後に古い駒が残っていることがあるため、
        // 占有Bitboardの側で空きを確認する
        debug_assert!(!self.occupied().contains(sq));
        self.board[sq.index()] = pc;
        self.by_type[0] |= sq;
        self.by_type[pc.piece_type().index()] |= sq;
        self.by_color[pc.color().index()] |= sq;
        self.index[sq.index()] = self.piece_count[pc.index()] as u8;
        self.piece_list[pc.index()][self.index[sq.index()] as usize] = sq;
        self.piece_count[pc.index()] += 1;
    }

    /// 駒を取り除く
    ///
    /// 盤面配列は触らない（通常の捕獲では直後のmove_pieceが上書きする。
    /// アンパッサンとキャスリングだけは呼び出し元が明示的にクリアする）。
    pub(crate) fn remove_piece(&mut self, pc: Piece, sq: Square) {
        debug_assert_eq!(self.board[sq.index()], pc);
        self.by_type[0] ^= sq;
        self.by_type[pc.piece_type().index()] ^= sq;
        self.by_color[pc.color().index()] ^= sq;
        self.piece_count[pc.index()] -= 1;
        let last_square = self.piece_list[pc.index()][self.piece_count[pc.index()] as usize];
        self.index[last_square.index()] = self.index[sq.index()];
        self.piece_list[pc.index()][self.index[last_square.index()] as usize] = last_square;
        self.piece_list[pc.index()][self.piece_count[pc.index()] as usize] = Square::NONE;
    }

    pub(crate) fn move_piece(&mut self, pc: Piece, from: Square, to: Square) {
        debug_assert_eq!(self.board[from.index()], pc);
        let from_to = Bitboard::from_square(from) | to;
        self.by_type[0] ^= from_to;
        self.by_type[pc.piece_type().index()] ^= from_to;
        self.by_color[pc.color().index()] ^= from_to;
        self.board[from.index()] = Piece::NONE;
        self.board[to.index()] = pc;
        self.index[to.index()] = self.index[from.index()];
        self.piece_list[pc.index()][self.index[to.index()] as usize] = to;
    }

    /// キャスリング権を設定する（FEN解析用）
    ///
    /// ルークの初期位置から翼を判定し、権利ビット・升ごとの失効マスク・
    /// ルーク位置・経路マスクを一括で登録する。
    pub(crate) fn set_castling_right(&mut self, c: Color, rfrom: Square) {
        let kfrom = self.king_square(c);
        let king_side = kfrom < rfrom;
        let cr = CastlingRights::make(c, king_side);

        self.st_mut().castling_rights |= cr;
        self.castling_rights_mask[kfrom.index()] |= cr;
        self.castling_rights_mask[rfrom.index()] |= cr;
        self.castling_rook_square[cr.index()] = rfrom;

        let kto = Square::new(
            if king_side { File::FileG } else { File::FileC },
            Rank::Rank1,
        )
        .relative(c);
        let rto = Square::new(
            if king_side { File::FileF } else { File::FileD },
            Rank::Rank1,
        )
        .relative(c);

        // キングとルークの通り道のうち、両者の初期位置以外は空いている必要がある
        self.castling_path[cr.index()] = (between_bb(rfrom, rto)
            | between_bb(kfrom, kto)
            | rto
            | kto)
            & !(Bitboard::from_square(kfrom) | rfrom);
    }

    // =========================================================================
    // 利き・ピン
    // =========================================================================

    /// 升sに利いている全駒（現在の占有で）
    #[inline]
    pub fn attackers_to(&self, s: Square) -> Bitboard {
        self.attackers_to_occ(s, self.occupied())
    }

    /// 升sに利いている全駒（占有を指定）
    ///
    /// ポーンの利きは逆対称で求める（黒ポーンの利き形 ∧ 白ポーン、など）。
    pub fn attackers_to_occ(&self, s: Square, occupied: Bitboard) -> Bitboard {
        (pawn_effect(Color::Black, s) & self.pieces(Color::White, PieceType::Pawn))
            | (pawn_effect(Color::White, s) & self.pieces(Color::Black, PieceType::Pawn))
            | (knight_effect(s) & self.pieces_pt(PieceType::Knight))
            | (rook_effect(s, occupied)
                & (self.pieces_pt(PieceType::Rook) | self.pieces_pt(PieceType::Queen)))
            | (bishop_effect(s, occupied)
                & (self.pieces_pt(PieceType::Bishop) | self.pieces_pt(PieceType::Queen)))
            | (king_effect(s) & self.pieces_pt(PieceType::King))
    }

    /// 升sへのスライダー攻撃を遮っている駒（両カラー）とピンしている駒を返す
    ///
    /// スナイパーは `sliders` に含まれるルーク/ビショップ系で、駒をどければ
    /// sに届くもの。スナイパーとsの間にちょうど1駒だけあるとき、その駒が
    /// ブロッカーになる。ブロッカーの色がsの駒と同じならスナイパーはピナー。
    pub fn slider_blockers(&self, sliders: Bitboard, s: Square) -> (Bitboard, Bitboard) {
        let mut blockers = Bitboard::EMPTY;
        let mut pinners = Bitboard::EMPTY;

        let snipers = ((rook_step_effect(s)
            & (self.pieces_pt(PieceType::Queen) | self.pieces_pt(PieceType::Rook)))
            | (bishop_step_effect(s)
                & (self.pieces_pt(PieceType::Queen) | self.pieces_pt(PieceType::Bishop))))
            & sliders;
        let occupancy = self.occupied() ^ snipers;

        for sniper_sq in snipers {
            let b = between_bb(s, sniper_sq) & occupancy;
            if !b.is_empty() && !b.more_than_one() {
                blockers |= b;
                if !(b & self.pieces_c(self.piece_on(s).color())).is_empty() {
                    pinners |= sniper_sq;
                }
            }
        }
        (blockers, pinners)
    }

    /// チェック検出用の情報（ブロッカー・ピナー・チェック升）を現状態に設定する
    pub(crate) fn set_check_info(&mut self) {
        let (w_blockers, b_pinners) =
            self.slider_blockers(self.pieces_c(Color::Black), self.king_square(Color::White));
        let (b_blockers, w_pinners) =
            self.slider_blockers(self.pieces_c(Color::White), self.king_square(Color::Black));

        let them = !self.side_to_move;
        let ksq = self.king_square(them);
        let occupied = self.occupied();

        let pawn = pawn_effect(them, ksq);
        let knight = knight_effect(ksq);
        let bishop = bishop_effect(ksq, occupied);
        let rook = rook_effect(ksq, occupied);

        let st = self.st_mut();
        st.blockers_for_king[Color::White.index()] = w_blockers;
        st.blockers_for_king[Color::Black.index()] = b_blockers;
        st.pinners[Color::White.index()] = w_pinners;
        st.pinners[Color::Black.index()] = b_pinners;
        st.check_squares[PieceType::Pawn.index()] = pawn;
        st.check_squares[PieceType::Knight.index()] = knight;
        st.check_squares[PieceType::Bishop.index()] = bishop;
        st.check_squares[PieceType::Rook.index()] = rook;
        st.check_squares[PieceType::Queen.index()] = bishop | rook;
        st.check_squares[PieceType::King.index()] = Bitboard::EMPTY;
    }

    /// 盤面からハッシュ・材料値・チェック情報をスクラッチ計算して現状態に設定する
    ///
    /// `set` と、デバッグ時の整合性検証（pos_is_ok_full）だけが使う。
    /// 通常の進行では全てdo_moveが差分更新する。
    pub(crate) fn set_state(&mut self) {
        let stm = self.side_to_move;
        let mut key: Key = 0;
        let mut pawn_key = zobrist_no_pawns();
        let mut material_key: Key = 0;
        let mut npm = [Value::ZERO; 2];
        let checkers = self.attackers_to(self.king_square(stm)) & self.pieces_c(!stm);

        for s in self.occupied() {
            let pc = self.piece_on(s);
            key ^= zobrist_psq(pc, s);
            match pc.piece_type() {
                PieceType::Pawn => pawn_key ^= zobrist_psq(pc, s),
                PieceType::King => {}
                pt => npm[pc.color().index()] += piece_value(pt),
            }
        }

        if let Some(ep) = self.st().ep_square {
            key ^= zobrist_enpassant(ep.file());
        }
        if stm == Color::Black {
            key ^= zobrist_side();
        }
        key ^= zobrist_castling(self.st().castling_rights);

        for pc in Piece::ALL {
            for cnt in 0..self.piece_count[pc.index()] {
                material_key ^= zobrist_psq_nth(pc, cnt as usize);
            }
        }

        let st = self.st_mut();
        st.key = key;
        st.pawn_key = pawn_key;
        st.material_key = material_key;
        st.non_pawn_material = npm;
        st.checkers = checkers;

        self.set_check_info();
    }

    // =========================================================================
    // 合法性・チェック判定
    // =========================================================================

    /// pseudo-legalな指し手が合法か（自キングが取られないか）を判定する
    pub fn legal(&self, m: Move) -> bool {
        debug_assert!(m.is_ok());

        let us = self.side_to_move;
        let from = m.from();
        let to = m.to();

        debug_assert_eq!(self.moved_piece(m).color(), us);
        debug_assert_eq!(self.piece_on(self.king_square(us)), Piece::make(us, PieceType::King));

        match m.move_type() {
            // アンパッサンは珍しいので、取った後の占有を作ってキングへの
            // スライダー利きを直接調べる
            MoveType::EnPassant => {
                let ksq = self.king_square(us);
                let capsq = to.add(-pawn_push(us));
                let occupied = (self.occupied() ^ from ^ capsq) | to;

                debug_assert_eq!(Some(to), self.ep_square());
                debug_assert_eq!(self.moved_piece(m), Piece::make(us, PieceType::Pawn));
                debug_assert_eq!(self.piece_on(capsq), Piece::make(!us, PieceType::Pawn));
                debug_assert!(self.piece_on(to).is_none());

                (rook_effect(ksq, occupied)
                    & (self.pieces(!us, PieceType::Queen) | self.pieces(!us, PieceType::Rook)))
                .is_empty()
                    && (bishop_effect(ksq, occupied)
                        & (self.pieces(!us, PieceType::Queen)
                            | self.pieces(!us, PieceType::Bishop)))
                    .is_empty()
            }
            // キャスリングの経路が敵の利きにさらされていないかはここで調べる
            // （生成時には権利と経路の空きだけを見ている）
            MoveType::Castling => {
                // キングとルークの最終位置はChess960でも通常チェスと同じ
                let king_side = to > from;
                let kto = Square::new(
                    if king_side { File::FileG } else { File::FileC },
                    Rank::Rank1,
                )
                .relative(us);
                // Chess960ではキングが移動先のどちら側からでも来うるので、
                // 歩く向きは移動先と移動元の位置関係で決める
                let step = if kto > from { Square::DELTA_W } else { Square::DELTA_E };

                let mut s = kto;
                while s != from {
                    if !(self.attackers_to(s) & self.pieces_c(!us)).is_empty() {
                        return false;
                    }
                    s = s.add(step);
                }

                // Chess960では、どけたルークの裏に隠れていたスライダーが
                // キングの最終位置に利いていないかも確認する
                !self.chess960
                    || (rook_effect(kto, self.occupied() ^ to)
                        & (self.pieces(!us, PieceType::Rook)
                            | self.pieces(!us, PieceType::Queen)))
                    .is_empty()
            }
            _ => {
                // キングが動く場合は移動先が攻撃されていないこと
                if self.piece_on(from).piece_type() == PieceType::King {
                    return (self.attackers_to(to) & self.pieces_c(!us)).is_empty();
                }

                // それ以外はピンされていないか、キングとの直線上の移動であること
                !self.blockers_for_king(us).contains(from)
                    || aligned(from, to, self.king_square(us))
            }
        }
    }

    /// pseudo-legalチェック（置換表由来の手の妥当性確認用）
    ///
    /// 置換表の手はSMPレースやハッシュ衝突で壊れている可能性があるため、
    /// 使う前に必ずこの関数を通す。Normal以外のタグは頻度が低いので
    /// 合法手リストとの照合にフォールバックする。
    pub fn pseudo_legal(&self, m: Move) -> bool {
        let us = self.side_to_move;
        let from = m.from();
        let to = m.to();
        let pc = self.moved_piece(m);

        if m.move_type() != MoveType::Normal {
            return MoveList::legal(self).contains(m);
        }

        // 移動元に自分の駒があるか
        if pc.is_none() || pc.color() != us {
            return false;
        }

        // 移動先に自分の駒がないか
        if self.pieces_c(us).contains(to) {
            return false;
        }

        if pc.piece_type() == PieceType::Pawn {
            // プロモーション手は上で処理済みなので、Normalタグで最終段に
            // 到達する手は不正
            if (RANK_BB[Rank::Rank8.index()] | RANK_BB[Rank::Rank1.index()]).contains(to) {
                return false;
            }

            let push = pawn_push(us);
            let capture_ok =
                pawn_effect(us, from).contains(to) && self.pieces_c(!us).contains(to);
            let single_ok = from.offset(push) == Some(to) && self.empty(to);
            let double_ok = from.offset(2 * push) == Some(to)
                && from.relative_rank(us) == Rank::Rank2
                && self.empty(to)
                && self.empty(to.add(-push));

            if !capture_ok && !single_ok && !double_ok {
                return false;
            }
        } else if !piece_effect(pc.piece_type(), from, self.occupied()).contains(to) {
            return false;
        }

        // チェック中は回避生成が除外する類の手をここでも除外する
        // （legalはその前提に依存している）
        if self.in_check() {
            if pc.piece_type() != PieceType::King {
                // 両王手ならキングを動かすしかない
                if self.checkers().more_than_one() {
                    return false;
                }

                // 遮断かチェック駒の捕獲でなければならない
                let checker = match self.checkers().lsb() {
                    Some(sq) => sq,
                    None => return false,
                };
                if !(between_bb(checker, self.king_square(us)) | self.checkers()).contains(to) {
                    return false;
                }
            } else if !(self.attackers_to_occ(to, self.occupied() ^ from) & self.pieces_c(!us))
                .is_empty()
            {
                // キング移動はキング自身をどけた占有で調べる
                // （スライダーの利きの影に逃げる手を弾くため）
                return false;
            }
        }

        true
    }

    /// pseudo-legalな指し手が相手にチェックをかけるかを判定する
    pub fn gives_check(&self, m: Move) -> bool {
        debug_assert!(m.is_ok());
        debug_assert_eq!(self.moved_piece(m).color(), self.side_to_move);

        let us = self.side_to_move;
        let them = !us;
        let from = m.from();
        let to = m.to();
        let ksq = self.king_square(them);

        // 直接チェック
        if self.check_squares(self.piece_on(from).piece_type()).contains(to) {
            return true;
        }

        // 開きチェック
        if self.blockers_for_king(them).contains(from) && !aligned(from, to, ksq) {
            return true;
        }

        match m.move_type() {
            MoveType::Normal => false,

            MoveType::Promotion => {
                piece_effect(m.promotion_type(), to, self.occupied() ^ from).contains(ksq)
            }

            // 直接・開きチェックは処理済みなので、残るのは取られるポーンを
            // 透かした開きチェックという稀なケースだけ
            MoveType::EnPassant => {
                let capsq = Square::new(to.file(), from.rank());
                let b = (self.occupied() ^ from ^ capsq) | to;

                !((rook_effect(ksq, b)
                    & (self.pieces(us, PieceType::Queen) | self.pieces(us, PieceType::Rook)))
                    | (bishop_effect(ksq, b)
                        & (self.pieces(us, PieceType::Queen)
                            | self.pieces(us, PieceType::Bishop))))
                .is_empty()
            }

            MoveType::Castling => {
                let kfrom = from;
                let rfrom = to; // キングがルークを取る符号化
                let king_side = rfrom > kfrom;
                let kto = Square::new(
                    if king_side { File::FileG } else { File::FileC },
                    Rank::Rank1,
                )
                .relative(us);
                let rto = Square::new(
                    if king_side { File::FileF } else { File::FileD },
                    Rank::Rank1,
                )
                .relative(us);

                rook_step_effect(rto).contains(ksq)
                    && rook_effect(rto, (self.occupied() ^ kfrom ^ rfrom) | rto | kto)
                        .contains(ksq)
            }
        }
    }

    // =========================================================================
    // 指し手の実行・巻き戻し
    // =========================================================================

    /// 指し手を実行する
    ///
    /// 合法手であることが前提。pseudo-legalな手は事前にフィルタすること。
    pub fn do_move(&mut self, m: Move, gives_check: bool) {
        self.do_move_with_prefetch(m, gives_check, &NoPrefetch);
    }

    /// 指し手を実行し、新しいキーが確定した時点で置換表をプリフェッチする
    pub fn do_move_with_prefetch<T: TtPrefetch>(&mut self, m: Move, gives_check: bool, tt: &T) {
        debug_assert!(m.is_ok());

        self.nodes.fetch_add(1, Ordering::Relaxed);
        let mut k = self.st().key ^ zobrist_side();

        // 引き継ぎフィールドだけコピーした子状態をローカルに作り、
        // 盤面更新が終わってからスタックに積む
        let mut st = self.st().new_child();

        self.game_ply += 1;
        st.rule50 += 1;
        st.plies_from_null += 1;

        let us = self.side_to_move;
        let them = !us;
        let from = m.from();
        let mut to = m.to();
        let pc = self.piece_on(from);
        let mut captured = if m.move_type() == MoveType::EnPassant {
            Piece::make(them, PieceType::Pawn)
        } else {
            self.piece_on(to)
        };

        debug_assert!(pc.is_some() && pc.color() == us);
        debug_assert!(captured.is_none() || captured.piece_type() != PieceType::King);

        if m.move_type() == MoveType::Castling {
            debug_assert_eq!(pc, Piece::make(us, PieceType::King));
            debug_assert_eq!(captured, Piece::make(us, PieceType::Rook));

            let rfrom = to;
            let (kto, rto) = self.do_castling(us, from, rfrom, true);

            k ^= zobrist_psq(captured, rfrom) ^ zobrist_psq(captured, rto);
            captured = Piece::NONE;
            to = kto;
        }

        if captured.is_some() {
            let mut capsq = to;

            // ポーンが取られたらpawn_key、それ以外なら材料値を更新する
            if captured.piece_type() == PieceType::Pawn {
                if m.move_type() == MoveType::EnPassant {
                    capsq = to.add(-pawn_push(us));

                    debug_assert_eq!(pc, Piece::make(us, PieceType::Pawn));
                    debug_assert_eq!(Some(to), st.ep_square);
                    debug_assert_eq!(to.relative_rank(us), Rank::Rank6);
                    debug_assert!(self.piece_on(to).is_none());
                    debug_assert_eq!(self.piece_on(capsq), Piece::make(them, PieceType::Pawn));
                }

                st.pawn_key ^= zobrist_psq(captured, capsq);
            } else {
                st.non_pawn_material[them.index()] -= piece_value(captured.piece_type());
            }

            self.remove_piece(captured, capsq);
            if m.move_type() == MoveType::EnPassant {
                // remove_pieceは盤面配列を触らない。通常の捕獲では直後の
                // move_pieceが上書きするが、ep升は別なのでここでクリアする
                self.board[capsq.index()] = Piece::NONE;
            }

            k ^= zobrist_psq(captured, capsq);
            st.material_key ^=
                zobrist_psq_nth(captured, self.piece_count[captured.index()] as usize);

            st.rule50 = 0;
        }

        k ^= zobrist_psq(pc, from) ^ zobrist_psq(pc, to);

        // アンパッサン升のリセット
        if let Some(ep) = st.ep_square {
            k ^= zobrist_enpassant(ep.file());
            st.ep_square = None;
        }

        // キャスリング権の更新（合成可能なテーブルなので差分1回のXORで済む）
        if st.castling_rights.any() {
            let cr =
                self.castling_rights_mask[from.index()] | self.castling_rights_mask[to.index()];
            if cr.any() {
                k ^= zobrist_castling(st.castling_rights & cr);
                st.castling_rights &= !cr;
            }
        }

        // 駒を動かす（Chess960で升が重なりうるキャスリングは処理済み）
        if m.move_type() != MoveType::Castling {
            self.move_piece(pc, from, to);
        }

        if pc.piece_type() == PieceType::Pawn {
            // 2升前進で、隣の敵ポーンが実際に取れるときだけアンパッサン升を立てる
            if to.raw() ^ from.raw() == 16
                && !(pawn_effect(us, to.add(-pawn_push(us))) & self.pieces(them, PieceType::Pawn))
                    .is_empty()
            {
                let ep = to.add(-pawn_push(us));
                st.ep_square = Some(ep);
                k ^= zobrist_enpassant(ep.file());
            } else if m.move_type() == MoveType::Promotion {
                let promotion = Piece::make(us, m.promotion_type());

                debug_assert_eq!(to.relative_rank(us), Rank::Rank8);

                self.remove_piece(pc, to);
                self.put_piece(promotion, to);

                k ^= zobrist_psq(pc, to) ^ zobrist_psq(promotion, to);
                st.pawn_key ^= zobrist_psq(pc, to);
                st.material_key ^= zobrist_psq_nth(
                    promotion,
                    self.piece_count[promotion.index()] as usize - 1,
                ) ^ zobrist_psq_nth(pc, self.piece_count[pc.index()] as usize);

                st.non_pawn_material[us.index()] += piece_value(promotion.piece_type());
            }

            st.pawn_key ^= zobrist_psq(pc, from) ^ zobrist_psq(pc, to);
            st.rule50 = 0;
        }

        st.captured_piece = captured;
        st.key = k;
        tt.prefetch(k);

        // チェック駒の計算（givesCheckが偽なら空で確定）
        st.checkers = if gives_check {
            self.attackers_to(self.king_square(them)) & self.pieces_c(us)
        } else {
            Bitboard::EMPTY
        };

        self.side_to_move = them;
        self.states.push(st);
        self.set_check_info();

        // 千日手情報: 2手刻みで遡って同一キーを探す。見つかった局面自身が
        // 既に繰り返しなら負の距離（3回目以上）として記録する
        let (rule50, plies_from_null, key) = {
            let st = self.st();
            (st.rule50, st.plies_from_null, st.key)
        };
        let mut repetition = 0;
        let end = rule50.min(plies_from_null);
        if end >= 4 {
            let idx = self.states.len() - 1;
            let mut i = 4;
            while i <= end {
                let prev = &self.states[idx - i as usize];
                if prev.key == key {
                    repetition = if prev.repetition != 0 { -i } else { i };
                    break;
                }
                i += 2;
            }
        }
        self.st_mut().repetition = repetition;

        debug_assert!(self.pos_is_ok());
    }

    /// 指し手を巻き戻す
    ///
    /// ハッシュ類は再計算せず、StateInfoのpopで完全に復元される。
    pub fn undo_move(&mut self, m: Move) {
        debug_assert!(m.is_ok());

        self.side_to_move = !self.side_to_move;

        let us = self.side_to_move;
        let from = m.from();
        let to = m.to();
        let mut pc = self.piece_on(to);
        let captured = self.st().captured_piece;

        debug_assert!(self.empty(from) || m.move_type() == MoveType::Castling);
        debug_assert!(captured.is_none() || captured.piece_type() != PieceType::King);

        if m.move_type() == MoveType::Promotion {
            debug_assert_eq!(to.relative_rank(us), Rank::Rank8);
            debug_assert_eq!(pc.piece_type(), m.promotion_type());

            // プロモーション駒をポーンに戻してから動かす
            self.remove_piece(pc, to);
            pc = Piece::make(us, PieceType::Pawn);
            self.put_piece(pc, to);
        }

        if m.move_type() == MoveType::Castling {
            let rfrom = to;
            self.do_castling(us, from, rfrom, false);
        } else {
            self.move_piece(pc, to, from);

            if captured.is_some() {
                let mut capsq = to;

                if m.move_type() == MoveType::EnPassant {
                    capsq = to.add(-pawn_push(us));

                    debug_assert_eq!(pc.piece_type(), PieceType::Pawn);
                    debug_assert_eq!(
                        Some(to),
                        self.states[self.states.len() - 2].ep_square
                    );
                    debug_assert_eq!(to.relative_rank(us), Rank::Rank6);
                    debug_assert!(self.piece_on(capsq).is_none());
                    debug_assert_eq!(captured, Piece::make(!us, PieceType::Pawn));
                }

                self.put_piece(captured, capsq);
            }
        }

        self.states.pop();
        self.game_ply -= 1;

        debug_assert!(self.pos_is_ok());
    }

    /// キャスリングの実行/巻き戻し
    ///
    /// Chess960では移動元と移動先が重なることがあるため、
    /// 必ず両駒を取り除いてから置き直す。戻り値は(キング移動先, ルーク移動先)。
    fn do_castling(&mut self, us: Color, from: Square, rfrom: Square, doing: bool) -> (Square, Square) {
        let king_side = rfrom > from;
        let kto = Square::new(
            if king_side { File::FileG } else { File::FileC },
            Rank::Rank1,
        )
        .relative(us);
        let rto = Square::new(
            if king_side { File::FileF } else { File::FileD },
            Rank::Rank1,
        )
        .relative(us);

        let (k_remove, r_remove, k_put, r_put) = if doing {
            (from, rfrom, kto, rto)
        } else {
            (kto, rto, from, rfrom)
        };

        self.remove_piece(Piece::make(us, PieceType::King), k_remove);
        self.remove_piece(Piece::make(us, PieceType::Rook), r_remove);
        // remove_pieceは盤面配列を触らないのでここでクリアする
        self.board[k_remove.index()] = Piece::NONE;
        self.board[r_remove.index()] = Piece::NONE;
        self.put_piece(Piece::make(us, PieceType::King), k_put);
        self.put_piece(Piece::make(us, PieceType::Rook), r_put);

        (kto, rto)
    }

    /// ヌルムーブ（手番だけ入れ替える）を実行する。チェック中は不可
    pub fn do_null_move(&mut self) {
        self.do_null_move_with_prefetch(&NoPrefetch);
    }

    /// ヌルムーブを実行し、新しいキーで置換表をプリフェッチする
    pub fn do_null_move_with_prefetch<T: TtPrefetch>(&mut self, tt: &T) {
        debug_assert!(!self.in_check());

        self.nodes.fetch_add(1, Ordering::Relaxed);

        // ヌルムーブでは全フィールドをそのまま引き継ぐ
        let mut st = *self.st();

        if let Some(ep) = st.ep_square {
            st.key ^= zobrist_enpassant(ep.file());
            st.ep_square = None;
        }

        st.key ^= zobrist_side();
        st.rule50 += 1;
        st.plies_from_null = 0;
        st.repetition = 0;

        tt.prefetch(st.key);

        self.states.push(st);
        self.side_to_move = !self.side_to_move;
        self.set_check_info();

        debug_assert!(self.pos_is_ok());
    }

    /// ヌルムーブを巻き戻す
    pub fn undo_null_move(&mut self) {
        debug_assert!(!self.in_check());

        self.states.pop();
        self.side_to_move = !self.side_to_move;
    }

    /// 指し手実行後のキーを投機的に計算する（置換表プリフェッチ用）
    ///
    /// キャスリング・アンパッサン・プロモーションは考慮しない。
    pub fn key_after(&self, m: Move) -> Key {
        let from = m.from();
        let to = m.to();
        let pc = self.piece_on(from);
        let captured = self.piece_on(to);
        let mut k = self.st().key ^ zobrist_side();

        if captured.is_some() {
            k ^= zobrist_psq(captured, to);
        }

        k ^ zobrist_psq(pc, to) ^ zobrist_psq(pc, from)
    }

    // =========================================================================
    // SEE (Static Exchange Evaluation)
    // =========================================================================

    /// 指し手のSEE値がthreshold以上かを判定する
    ///
    /// 移動先の升で「互いに最も安い駒から取り合う」交換をヌルウィンドウの
    /// ネガマックスでシミュレートする。
    pub fn see_ge(&self, m: Move, threshold: Value) -> bool {
        debug_assert!(m.is_ok());

        // Normal以外はSEE 0相当とみなす
        if m.move_type() != MoveType::Normal {
            return Value::ZERO >= threshold;
        }

        let from = m.from();
        let to = m.to();

        // 取る駒の価値から閾値を引いた残高。取り返しを強制されない側が
        // 得をするよう、マイナスになった時点で打ち切る
        let mut balance = piece_value_of(self.piece_on(to)) - threshold;
        if balance < Value::ZERO {
            return false;
        }

        // 相手が取り返したと仮定する。それでも残高が非負なら確定で成功
        // （キングで取った場合もここを通るが、キングは残高を変えない）
        balance -= piece_value_of(self.piece_on(from));
        if balance >= Value::ZERO {
            return true;
        }

        let mut stm = self.piece_on(from).color();
        let mut result = true;

        // 動かした駒と取られた駒をどけた占有で、移動先への利きを集める
        let mut occupied = (self.occupied() ^ from) ^ to;
        let mut attackers = self.attackers_to_occ(to, occupied);

        loop {
            stm = !stm;

            // X線で既に使った駒が再度現れることがあるため占有でマスクする
            attackers &= occupied;

            let mut stm_attackers = attackers & self.pieces_c(stm);
            if stm_attackers.is_empty() {
                break;
            }

            // ピナーが盤上に残っている間はピンされた駒で取り返せない
            if !(self.st().pinners[(!stm).index()] & occupied).is_empty() {
                stm_attackers &= !self.st().blockers_for_king[stm.index()];
                if stm_attackers.is_empty() {
                    break;
                }
            }

            result = !result;

            // 最も安い駒を探す。キングしか残っていなければ最後の取り合い
            let mut next = None;
            for pt in [
                PieceType::Pawn,
                PieceType::Knight,
                PieceType::Bishop,
                PieceType::Rook,
                PieceType::Queen,
            ] {
                let bb = stm_attackers & self.pieces_pt(pt);
                if !bb.is_empty() {
                    next = Some((pt, bb));
                    break;
                }
            }

            let (pt, bb) = match next {
                Some(found) => found,
                None => {
                    // キングで取ったのに相手の利きが残っているなら、
                    // キングが取り返されるので結果を反転して終わり
                    if !(attackers & self.pieces_c(!stm)).is_empty() {
                        result = !result;
                    }
                    break;
                }
            };

            // ヌルウィンドウのネガマックス:
            //   (balance, balance+1) -> (-balance-1, -balance)
            balance = -balance - piece_value(pt) - Value::new(1);
            if balance >= Value::ZERO {
                break;
            }

            // 使った駒を占有から外し、その裏から現れるX線攻撃を追加する
            // （追加される駒はどちらの色でもありうる）
            occupied ^= bb.lsb_bb();
            if matches!(pt, PieceType::Pawn | PieceType::Bishop | PieceType::Queen) {
                attackers |= bishop_effect(to, occupied)
                    & (self.pieces_pt(PieceType::Bishop) | self.pieces_pt(PieceType::Queen));
            }
            if matches!(pt, PieceType::Rook | PieceType::Queen) {
                attackers |= rook_effect(to, occupied)
                    & (self.pieces_pt(PieceType::Rook) | self.pieces_pt(PieceType::Queen));
            }
        }

        result
    }

    // =========================================================================
    // 引き分け判定
    // =========================================================================

    /// 千日手または50手ルールによる引き分けか
    ///
    /// 繰り返しの条件は「ルートより後で1回繰り返した」または
    /// 「ルート以前を含めて2回繰り返した」（repetitionの符号が後者を表す）。
    /// ステイルメイトは検出しない。
    pub fn is_draw(&self, ply: i32) -> bool {
        let st = self.st();

        if st.rule50 > 99 && (st.checkers.is_empty() || !MoveList::legal(self).is_empty()) {
            return true;
        }

        st.repetition != 0 && st.repetition < ply
    }

    /// 最後の捕獲・ポーン手以降に同一局面の繰り返しがあったか
    pub fn has_repeated(&self) -> bool {
        let mut end = self.st().rule50.min(self.st().plies_from_null);
        let mut idx = self.states.len() - 1;

        while end >= 4 {
            if self.states[idx].repetition != 0 {
                return true;
            }
            idx -= 1;
            end -= 1;
        }

        false
    }

    // =========================================================================
    // 整合性検査
    // =========================================================================

    /// 軽量な整合性検査（do_move/undo_moveの度にdebug_assertで呼ばれる）
    pub fn pos_is_ok(&self) -> bool {
        assert_eq!(self.piece_count[Piece::W_KING.index()], 1, "pos_is_ok: Default");
        assert_eq!(self.piece_count[Piece::B_KING.index()], 1, "pos_is_ok: Default");
        assert_eq!(
            self.piece_on(self.king_square(Color::White)),
            Piece::W_KING,
            "pos_is_ok: Default"
        );
        assert_eq!(
            self.piece_on(self.king_square(Color::Black)),
            Piece::B_KING,
            "pos_is_ok: Default"
        );
        if let Some(ep) = self.ep_square() {
            assert_eq!(ep.relative_rank(self.side_to_move), Rank::Rank6, "pos_is_ok: Default");
        }
        true
    }

    /// 完全な整合性検査（テスト・デバッグ用）
    ///
    /// Bitboard・piece_list・枚数・キャスリング情報の相互整合に加え、
    /// StateInfoの差分更新値をスクラッチ計算と突き合わせる。
    pub fn pos_is_ok_full(&self) -> bool {
        self.pos_is_ok();

        assert_eq!(self.piece_count[Piece::W_KING.index()], 1, "pos_is_ok: Kings");
        assert_eq!(self.piece_count[Piece::B_KING.index()], 1, "pos_is_ok: Kings");
        assert!(
            (self.attackers_to(self.king_square(!self.side_to_move))
                & self.pieces_c(self.side_to_move))
            .is_empty(),
            "pos_is_ok: Kings"
        );

        assert!(
            (self.pieces_pt(PieceType::Pawn)
                & (RANK_BB[Rank::Rank1.index()] | RANK_BB[Rank::Rank8.index()]))
            .is_empty(),
            "pos_is_ok: Pawns"
        );
        assert!(self.piece_count[Piece::W_PAWN.index()] <= 8, "pos_is_ok: Pawns");
        assert!(self.piece_count[Piece::B_PAWN.index()] <= 8, "pos_is_ok: Pawns");

        assert!(
            (self.pieces_c(Color::White) & self.pieces_c(Color::Black)).is_empty(),
            "pos_is_ok: Bitboards"
        );
        assert_eq!(
            self.pieces_c(Color::White) | self.pieces_c(Color::Black),
            self.occupied(),
            "pos_is_ok: Bitboards"
        );
        for p1 in PieceType::ALL {
            for p2 in PieceType::ALL {
                assert!(
                    p1 == p2 || (self.pieces_pt(p1) & self.pieces_pt(p2)).is_empty(),
                    "pos_is_ok: Bitboards"
                );
            }
        }

        for pc in Piece::ALL {
            assert_eq!(
                self.piece_count[pc.index()],
                self.pieces(pc.color(), pc.piece_type()).count() as i32,
                "pos_is_ok: Pieces"
            );
            assert_eq!(
                self.piece_count[pc.index()],
                self.board.iter().filter(|&&b| b == pc).count() as i32,
                "pos_is_ok: Pieces"
            );
            for i in 0..self.piece_count[pc.index()] as usize {
                let sq = self.piece_list[pc.index()][i];
                assert_eq!(self.board[sq.index()], pc, "pos_is_ok: Index");
                assert_eq!(self.index[sq.index()] as usize, i, "pos_is_ok: Index");
            }
        }

        for c in [Color::White, Color::Black] {
            for king_side in [true, false] {
                let cr = CastlingRights::make(c, king_side);
                if !self.can_castle(cr) {
                    continue;
                }
                assert_eq!(
                    self.piece_on(self.castling_rook_square[cr.index()]),
                    Piece::make(c, PieceType::Rook),
                    "pos_is_ok: Castling"
                );
                assert_eq!(
                    self.castling_rights_mask[self.castling_rook_square[cr.index()].index()],
                    cr,
                    "pos_is_ok: Castling"
                );
                assert!(
                    self.castling_rights_mask[self.king_square(c).index()].has(cr),
                    "pos_is_ok: Castling"
                );
            }
        }

        // 差分更新されたStateInfoをスクラッチ計算と突き合わせる
        let mut copy = self.clone();
        copy.set_state();
        let (a, b) = (self.st(), copy.st());
        assert_eq!(a.key, b.key, "pos_is_ok: State");
        assert_eq!(a.pawn_key, b.pawn_key, "pos_is_ok: State");
        assert_eq!(a.material_key, b.material_key, "pos_is_ok: State");
        assert_eq!(a.non_pawn_material, b.non_pawn_material, "pos_is_ok: State");
        assert_eq!(a.checkers, b.checkers, "pos_is_ok: State");

        true
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new()
    }
}

impl std::fmt::Display for Position {
    /// 盤面のASCII図・FEN・各ハッシュ・チェック駒・合法手数を出力する
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, " +---+---+---+---+---+---+---+---+")?;
        for r in (0..8).rev() {
            for file in 0..8 {
                let sq = Square::from_u8((r * 8 + file) as u8).unwrap();
                write!(f, " | {}", self.piece_on(sq).to_fen_char())?;
            }
            writeln!(f, " |")?;
            writeln!(f, " +---+---+---+---+---+---+---+---+")?;
        }

        writeln!(f, "\nFen: {}", self.fen())?;
        writeln!(f, "PositionKey: {:016X}", self.key())?;
        writeln!(f, "MaterialKey: {:016X}", self.material_key())?;
        writeln!(f, "PawnKey:     {:016X}", self.pawn_key())?;

        write!(f, "Checkers:")?;
        for sq in self.checkers() {
            write!(f, " {}", sq.to_uci())?;
        }
        writeln!(f)?;

        write!(f, "Legal moves: {}", MoveList::legal(self).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::START_FEN;

    fn sq(s: &str) -> Square {
        Square::from_uci(s).unwrap()
    }

    fn pos_from(fen: &str) -> Position {
        let mut pos = Position::new();
        pos.set(fen, false).unwrap();
        pos
    }

    #[test]
    fn test_startpos_setup() {
        let pos = pos_from(START_FEN);
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.count(Piece::W_PAWN), 8);
        assert_eq!(pos.count(Piece::B_KNIGHT), 2);
        assert_eq!(pos.king_square(Color::White), Square::E1);
        assert_eq!(pos.king_square(Color::Black), Square::E8);
        assert!(pos.can_castle(CastlingRights::ANY));
        assert_eq!(pos.ep_square(), None);
        assert!(!pos.in_check());
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_do_move_e2e4_sets_ep_and_key_delta() {
        let mut pos = pos_from(START_FEN);
        let start_key = pos.key();

        let m = Move::new(sq("e2"), sq("e4"));
        assert!(pos.pseudo_legal(m));
        assert!(pos.legal(m));
        let gives_check = pos.gives_check(m);
        assert!(!gives_check);
        pos.do_move(m, gives_check);

        // 初期局面のe2e4では取れる隣接ポーンがいないためep升は立たない
        assert_eq!(pos.ep_square(), None);
        assert_eq!(pos.rule50_count(), 0);
        assert_eq!(
            pos.key(),
            start_key
                ^ zobrist_psq(Piece::W_PAWN, sq("e2"))
                ^ zobrist_psq(Piece::W_PAWN, sq("e4"))
                ^ zobrist_side()
        );
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_double_push_sets_ep_when_capturable() {
        // 黒ポーンd4がいる状態でe2e4 → e3にep升が立つ
        let mut pos = pos_from("rnbqkbnr/ppp1pppp/8/8/3p4/8/PPPPPPPP/RNBQKBNR w KQkq - 0 3");
        let start_key = pos.key();
        let m = Move::new(sq("e2"), sq("e4"));
        pos.do_move(m, pos.gives_check(m));

        assert_eq!(pos.ep_square(), Some(sq("e3")));
        assert!(pos.fen().contains(" e3 "));
        assert_eq!(
            pos.key(),
            start_key
                ^ zobrist_psq(Piece::W_PAWN, sq("e2"))
                ^ zobrist_psq(Piece::W_PAWN, sq("e4"))
                ^ zobrist_enpassant(File::FileE)
                ^ zobrist_side()
        );
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_do_undo_restores_everything() {
        let mut pos = pos_from(START_FEN);
        let fen_before = pos.fen();
        let key_before = pos.key();
        let pawn_key_before = pos.pawn_key();
        let material_key_before = pos.material_key();

        for uci in ["g1f3", "b8c6", "e2e4", "e7e5"] {
            let m = find_move(&pos, uci);
            pos.do_move(m, pos.gives_check(m));
            assert!(pos.pos_is_ok_full());
        }
        for uci in ["e7e5", "e2e4", "b8c6", "g1f3"] {
            let m = parse_uci_shape(uci);
            pos.undo_move(m);
        }

        assert_eq!(pos.fen(), fen_before);
        assert_eq!(pos.key(), key_before);
        assert_eq!(pos.pawn_key(), pawn_key_before);
        assert_eq!(pos.material_key(), material_key_before);
        assert!(pos.pos_is_ok_full());
    }

    /// 合法手リストからUCI表記で指し手を探す
    fn find_move(pos: &Position, uci: &str) -> Move {
        MoveList::legal(pos)
            .iter()
            .find(|m| m.to_uci(pos.is_chess960()) == uci)
            .unwrap_or_else(|| panic!("move {uci} not found"))
    }

    /// 通常の指し手をUCI文字列から直接構築する（undo用）
    fn parse_uci_shape(uci: &str) -> Move {
        Move::new(
            Square::from_uci(&uci[0..2]).unwrap(),
            Square::from_uci(&uci[2..4]).unwrap(),
        )
    }

    #[test]
    fn test_capture_and_undo() {
        let mut pos = pos_from("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2");
        let fen_before = pos.fen();

        let m = find_move(&pos, "e4d5");
        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.captured_piece(), Piece::B_PAWN);
        assert_eq!(pos.rule50_count(), 0);
        assert_eq!(pos.count(Piece::B_PAWN), 7);
        assert!(pos.pos_is_ok_full());

        pos.undo_move(m);
        assert_eq!(pos.fen(), fen_before);
        assert_eq!(pos.count(Piece::B_PAWN), 8);
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_en_passant_do_undo() {
        let mut pos = pos_from("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3");
        assert_eq!(pos.ep_square(), Some(sq("e3")));
        let fen_before = pos.fen();

        let m = find_move(&pos, "d4e3");
        assert_eq!(m.move_type(), MoveType::EnPassant);
        pos.do_move(m, pos.gives_check(m));

        assert!(pos.piece_on(sq("e4")).is_none());
        assert_eq!(pos.piece_on(sq("e3")), Piece::B_PAWN);
        assert_eq!(pos.captured_piece(), Piece::W_PAWN);
        assert!(pos.pos_is_ok_full());

        pos.undo_move(m);
        assert_eq!(pos.fen(), fen_before);
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_promotion_do_undo() {
        let mut pos = pos_from("8/4P1k1/8/8/8/8/8/4K3 w - - 0 1");
        let fen_before = pos.fen();

        let m = find_move(&pos, "e7e8q");
        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.piece_on(sq("e8")), Piece::W_QUEEN);
        assert_eq!(pos.count(Piece::W_PAWN), 0);
        assert_eq!(pos.non_pawn_material(Color::White), Value::QUEEN_MG);
        assert!(pos.pos_is_ok_full());

        pos.undo_move(m);
        assert_eq!(pos.fen(), fen_before);
        assert_eq!(pos.count(Piece::W_PAWN), 1);
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_castling_do_undo() {
        let mut pos = pos_from("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1");
        let fen_before = pos.fen();

        let m = find_move(&pos, "e1g1");
        assert_eq!(m.move_type(), MoveType::Castling);
        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.piece_on(Square::G1), Piece::W_KING);
        assert_eq!(pos.piece_on(Square::F1), Piece::W_ROOK);
        assert!(!pos.can_castle(CastlingRights::WHITE_CASTLING));
        assert!(pos.can_castle(CastlingRights::BLACK_CASTLING));
        assert!(pos.pos_is_ok_full());

        pos.undo_move(m);
        assert_eq!(pos.fen(), fen_before);
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_chess960_castling_overlap() {
        // キングの移動先(g1)がルークの初期位置(g1)と重なるChess960配置
        let mut pos = Position::new();
        pos.set("4k3/8/8/8/8/8/8/5KR1 w G - 0 1", true).unwrap();
        assert!(pos.can_castle(CastlingRights::WHITE_OO));
        let fen_before = pos.fen();
        let key_before = pos.key();

        let m = Move::new_castling(sq("f1"), sq("g1"));
        assert!(MoveList::legal(&pos).contains(m));
        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.piece_on(Square::G1), Piece::W_KING);
        assert_eq!(pos.piece_on(Square::F1), Piece::W_ROOK);
        assert!(pos.pos_is_ok_full());

        pos.undo_move(m);
        assert_eq!(pos.fen(), fen_before);
        assert_eq!(pos.key(), key_before);
        assert_eq!(pos.piece_on(sq("f1")), Piece::W_KING);
        assert_eq!(pos.piece_on(sq("g1")), Piece::W_ROOK);
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_ep_discovered_check_is_illegal() {
        // e5のポーンがd5ポーンをアンパッサンで取ると、5段目のルークの
        // 横利きが自キングに通ってしまう
        let mut pos = Position::new();
        pos.set("8/8/8/KPpr4/8/8/6k1/8 w - c6 0 2", false).unwrap();
        assert_eq!(pos.ep_square(), Some(sq("c6")));

        let m = Move::new_en_passant(sq("b5"), sq("c6"));
        assert!(!pos.legal(m));
        assert!(!MoveList::legal(&pos).contains(m));
    }

    #[test]
    fn test_threefold_repetition() {
        let mut pos = pos_from(START_FEN);
        let moves = ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"];
        for (i, uci) in moves.iter().enumerate() {
            let m = find_move(&pos, uci);
            pos.do_move(m, pos.gives_check(m));
            if i == 3 {
                // 1巡目は初回の繰り返し（正の距離）
                assert_eq!(pos.st().repetition, 4);
            }
        }

        // 2巡目で同一局面の3回目の出現。負の距離で記録される
        assert!(pos.st().repetition < 0);
        assert!(pos.is_draw(9));
        assert!(pos.has_repeated());
    }

    #[test]
    fn test_null_move_roundtrip() {
        let mut pos = pos_from("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3");
        let key_before = pos.key();
        let fen_before = pos.fen();

        pos.do_null_move();
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_ne!(pos.key(), key_before);
        assert_eq!(pos.plies_from_null(), 0);

        pos.undo_null_move();
        assert_eq!(pos.key(), key_before);
        assert_eq!(pos.fen(), fen_before);
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_key_after_matches_do_move_for_quiet_and_capture() {
        let mut pos = pos_from("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2");

        // 捕獲（ep升もキャスリング権も変化しない）
        let m = find_move(&pos, "e4d5");
        let predicted = pos.key_after(m);
        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.key(), predicted);
        pos.undo_move(m);

        // 静かな手
        let m = find_move(&pos, "g1f3");
        let predicted = pos.key_after(m);
        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.key(), predicted);
    }

    #[test]
    fn test_see_ge_pawn_takes_defended_pawn() {
        // e5xd6(ep不可の通常形): d6のポーンはe7ポーンに守られている
        let pos = pos_from("4k3/4p3/3p4/4P3/8/8/8/4K3 w - - 0 1");
        let m = Move::new(sq("e5"), sq("d6"));
        assert!(pos.pseudo_legal(m));

        // PxP, exd6 で交換値はちょうど0
        assert!(pos.see_ge(m, Value::ZERO));
        assert!(!pos.see_ge(m, Value::new(1)));
    }

    #[test]
    fn test_see_ge_xray() {
        // d5の白ポーンをルークで取ると、裏のルークで取り返される
        let pos = pos_from("3r3k/3r4/8/3P4/8/8/3R4/3R3K b - - 0 1");
        let m = Move::new(sq("d7"), sq("d5"));
        // RxP(+128), RxR(-1276), RxR(+1276), RxR(-1276) → 2回目以降は損
        assert!(pos.see_ge(m, Value::new(128 - 1276)));
        assert!(!pos.see_ge(m, Value::new(128 - 1276 + 1)));
    }

    #[test]
    fn test_see_ge_monotone_in_threshold() {
        let pos = pos_from("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2");
        let m = Move::new(sq("e4"), sq("d5"));
        let mut prev = true;
        for t in -200..200 {
            let now = pos.see_ge(m, Value::new(t));
            // 閾値を上げて真になることはない
            assert!(prev || !now);
            prev = now;
        }
    }

    #[test]
    fn test_gives_check_direct_and_discovered() {
        // 直接チェック: Qd1-h5+ は f7 を突いた後でないと成立しないので
        // 単純な配置で確認する
        let pos = pos_from("4k3/8/8/8/8/8/8/3QK3 w - - 0 1");
        let m = Move::new(sq("d1"), sq("d8"));
        assert!(pos.gives_check(m));
        let m = Move::new(sq("d1"), sq("c2"));
        assert!(!pos.gives_check(m));

        // 開きチェック: e4のポーンがe1クイーンの縦利きを遮っている
        let pos = pos_from("4k3/8/8/3p4/4P3/8/8/4QK2 w - - 0 1");
        assert!(pos.blockers_for_king(Color::Black).contains(sq("e4")));
        // 斜めの捕獲で直線から外れると開きチェック
        let m = Move::new(sq("e4"), sq("d5"));
        assert!(pos.gives_check(m));
        // 同一直線上の前進では開きチェックにならない
        let m = Move::new(sq("e4"), sq("e5"));
        assert!(!pos.gives_check(m));

        // gives_checkの結果とdo_move後のcheckersの一致
        for m in MoveList::legal(&pos).iter() {
            let gc = pos.gives_check(m);
            let mut p = pos.clone();
            p.do_move(m, gc);
            assert_eq!(gc, p.in_check(), "gives_check mismatch for {m}");
        }
    }

    #[test]
    fn test_pseudo_legal_rejects_garbage_tt_moves() {
        let pos = pos_from(START_FEN);

        // 空の升から
        assert!(!pos.pseudo_legal(Move::new(sq("e4"), sq("e5"))));
        // 相手の駒を動かす
        assert!(!pos.pseudo_legal(Move::new(sq("e7"), sq("e5"))));
        // 自分の駒の上に
        assert!(!pos.pseudo_legal(Move::new(sq("a1"), sq("a2"))));
        // ナイト以外の駒の利き外
        assert!(!pos.pseudo_legal(Move::new(sq("d1"), sq("d3"))));
        // ポーンの3升前進
        assert!(!pos.pseudo_legal(Move::new(sq("e2"), sq("e5"))));

        // 正しい手は通る
        assert!(pos.pseudo_legal(Move::new(sq("b1"), sq("c3"))));
        assert!(pos.pseudo_legal(Move::new(sq("e2"), sq("e3"))));
    }

    #[test]
    fn test_pseudo_legal_in_check() {
        // 白キングがルークにチェックされている
        let pos = pos_from("4k3/8/8/8/4r3/8/3P4/4KB2 w - - 0 1");
        assert!(pos.in_check());

        // チェックを無視する手は不可
        assert!(!pos.pseudo_legal(Move::new(sq("d2"), sq("d3"))));
        // キングを動かすのは可（攻撃されていない升へ）
        assert!(pos.pseudo_legal(Move::new(sq("e1"), sq("d1"))));

        // チェック駒の利きの影に逃げる手は、キング自身をどけた占有で
        // 調べないと見逃す。a4のルークに対するKe4-f4がそれ
        let pos = pos_from("4k3/8/8/8/r3K3/8/8/8 w - - 0 1");
        assert!(pos.in_check());
        assert!(!pos.pseudo_legal(Move::new(sq("e4"), sq("f4"))));
        assert!(pos.pseudo_legal(Move::new(sq("e4"), sq("e5"))));
    }

    #[test]
    fn test_legal_pinned_piece() {
        // e2のナイトはe4ルークにより縦にピンされている
        let pos = pos_from("4k3/8/8/8/4r3/8/4N3/4K3 w - - 0 1");
        assert!(pos.blockers_for_king(Color::White).contains(sq("e2")));

        // ピンの直線から外れる手は不可
        let m = Move::new(sq("e2"), sq("c3"));
        assert!(pos.pseudo_legal(m));
        assert!(!pos.legal(m));

        // 直線上の移動（チェック駒の捕獲）は可
        let m = Move::new(sq("e2"), sq("e4"));
        assert!(!pos.pseudo_legal(m) || pos.legal(m));
    }

    #[test]
    fn test_slider_blockers_and_pinners() {
        let pos = pos_from("4k3/8/8/8/4r3/8/4N3/4K3 w - - 0 1");
        let (blockers, pinners) =
            pos.slider_blockers(pos.pieces_c(Color::Black), pos.king_square(Color::White));
        assert!(blockers.contains(sq("e2")));
        assert!(pinners.contains(sq("e4")));
        assert_eq!(pos.pinners(Color::Black), pinners);
    }

    #[test]
    fn test_is_draw_rule50() {
        let mut pos = Position::new();
        pos.set("4k3/8/8/8/8/8/8/4K2R w - - 99 80", false).unwrap();
        assert!(!pos.is_draw(1));

        // 100手目に達すると引き分け
        let m = Move::new(Square::H1, sq("h4"));
        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.rule50_count(), 100);
        assert!(pos.is_draw(1));
    }

    #[test]
    fn test_node_counter() {
        let mut pos = pos_from(START_FEN);
        let counter = pos.node_counter();
        assert_eq!(counter.load(Ordering::Relaxed), 0);
        let m = find_move(&pos, "e2e4");
        pos.do_move(m, false);
        assert_eq!(pos.nodes(), 1);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
