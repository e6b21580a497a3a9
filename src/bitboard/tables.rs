//! 近接駒の利きテーブルと升間マスク
//!
//! ポーン・ナイト・キングの利き、および升間（between）・直線（line）の
//! マスクを起動時に前計算する。

use std::sync::OnceLock;

use crate::types::{Color, Square};

use super::sliders::{ray_bb, Direct};
use super::Bitboard;

struct StepTable {
    pawn: [[Bitboard; Square::NUM]; Color::NUM],
    knight: [Bitboard; Square::NUM],
    king: [Bitboard; Square::NUM],
    between: [[Bitboard; Square::NUM]; Square::NUM],
    line: [[Bitboard; Square::NUM]; Square::NUM],
}

static STEP_TABLE: OnceLock<StepTable> = OnceLock::new();

fn tables() -> &'static StepTable {
    STEP_TABLE.get_or_init(StepTable::new)
}

impl StepTable {
    fn new() -> Self {
        let mut pawn = [[Bitboard::EMPTY; Square::NUM]; Color::NUM];
        let mut knight = [Bitboard::EMPTY; Square::NUM];
        let mut king = [Bitboard::EMPTY; Square::NUM];

        for sq in Square::all() {
            for delta in [Square::DELTA_NE, Square::DELTA_NW] {
                if let Some(to) = sq.offset(delta) {
                    pawn[Color::White.index()][sq.index()].set(to);
                }
            }
            for delta in [Square::DELTA_SE, Square::DELTA_SW] {
                if let Some(to) = sq.offset(delta) {
                    pawn[Color::Black.index()][sq.index()].set(to);
                }
            }
            for delta in [17, 15, 10, 6, -6, -10, -15, -17] {
                if let Some(to) = sq.offset(delta) {
                    knight[sq.index()].set(to);
                }
            }
            for d in Direct::ALL {
                if let Some(to) = sq.offset(d.delta()) {
                    king[sq.index()].set(to);
                }
            }
        }

        // between/line: 同一レイ上の2升についてのみ非空
        let mut between = [[Bitboard::EMPTY; Square::NUM]; Square::NUM];
        let mut line = [[Bitboard::EMPTY; Square::NUM]; Square::NUM];

        for a in Square::all() {
            for d in Direct::ALL {
                let forward = ray_bb(d, a);
                for b in forward {
                    between[a.index()][b.index()] = forward & ray_bb(d.opposite(), b);
                    line[a.index()][b.index()] =
                        ray_bb(d, a) | ray_bb(d.opposite(), a) | Bitboard::from_square(a);
                }
            }
        }

        StepTable {
            pawn,
            knight,
            king,
            between,
            line,
        }
    }
}

/// ポーンの利き（前方斜め2方向）
#[inline]
pub fn pawn_effect(color: Color, sq: Square) -> Bitboard {
    tables().pawn[color.index()][sq.index()]
}

/// ナイトの利き
#[inline]
pub fn knight_effect(sq: Square) -> Bitboard {
    tables().knight[sq.index()]
}

/// キングの利き
#[inline]
pub fn king_effect(sq: Square) -> Bitboard {
    tables().king[sq.index()]
}

/// 2升の間の升集合（両端を含まない。同一レイ上にないときは空）
#[inline]
pub fn between_bb(a: Square, b: Square) -> Bitboard {
    tables().between[a.index()][b.index()]
}

/// 2升を通る直線全体（両端を含む。同一レイ上にないときは空）
#[inline]
pub fn line_bb(a: Square, b: Square) -> Bitboard {
    tables().line[a.index()][b.index()]
}

/// 3升が一直線上にあるか
#[inline]
pub fn aligned(a: Square, b: Square, c: Square) -> bool {
    line_bb(a, b).contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_uci(s).unwrap()
    }

    #[test]
    fn test_pawn_effect() {
        let attacks = pawn_effect(Color::White, sq("e4"));
        assert!(attacks.contains(sq("d5")));
        assert!(attacks.contains(sq("f5")));
        assert_eq!(attacks.count(), 2);

        // 端のポーンは1方向のみ
        let attacks = pawn_effect(Color::White, sq("a2"));
        assert_eq!(attacks.count(), 1);
        assert!(attacks.contains(sq("b3")));

        let attacks = pawn_effect(Color::Black, sq("e4"));
        assert!(attacks.contains(sq("d3")));
        assert!(attacks.contains(sq("f3")));
    }

    #[test]
    fn test_knight_effect() {
        assert_eq!(knight_effect(sq("d4")).count(), 8);
        assert_eq!(knight_effect(Square::A1).count(), 2);
        assert!(knight_effect(Square::A1).contains(sq("b3")));
        assert!(knight_effect(Square::A1).contains(sq("c2")));
        // 盤端の折り返しがないこと
        assert!(!knight_effect(sq("h4")).contains(sq("a5")));
    }

    #[test]
    fn test_king_effect() {
        assert_eq!(king_effect(sq("d4")).count(), 8);
        assert_eq!(king_effect(Square::A1).count(), 3);
        assert_eq!(king_effect(Square::E1).count(), 5);
    }

    #[test]
    fn test_between_bb() {
        let b = between_bb(Square::A1, sq("a4"));
        assert_eq!(b.count(), 2);
        assert!(b.contains(sq("a2")));
        assert!(b.contains(sq("a3")));

        // 斜め
        let b = between_bb(sq("c1"), sq("f4"));
        assert!(b.contains(sq("d2")));
        assert!(b.contains(sq("e3")));
        assert_eq!(b.count(), 2);

        // 隣接升の間は空
        assert!(between_bb(Square::A1, Square::B1).is_empty());
        // 非整列は空
        assert!(between_bb(Square::A1, sq("b3")).is_empty());
    }

    #[test]
    fn test_line_bb_aligned() {
        let l = line_bb(sq("a1"), sq("h8"));
        assert_eq!(l.count(), 8);
        assert!(l.contains(sq("d4")));

        assert!(aligned(sq("a1"), sq("d4"), sq("h8")));
        assert!(aligned(sq("e1"), sq("e4"), sq("e8")));
        assert!(!aligned(sq("a1"), sq("d4"), sq("h7")));
        // 非整列の2升のlineは空
        assert!(line_bb(sq("a1"), sq("b3")).is_empty());
    }
}
