//! 遠方駒（ビショップ・ルーク・クイーン）の利き計算
//!
//! 方向別のレイテーブルを前計算しておき、利きは
//! 「レイ ∧ 占有」の最初の遮蔽駒でレイを切り詰めて求める。
//! 正方向（北・東寄り）はlsb、負方向はmsbが最初の遮蔽駒になる。

use std::sync::OnceLock;

use crate::types::Square;

use super::Bitboard;

/// 8方向の単一レイ方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direct {
    N = 0,
    NE = 1,
    E = 2,
    SE = 3,
    S = 4,
    SW = 5,
    W = 6,
    NW = 7,
}

impl Direct {
    /// 全方向
    pub const ALL: [Direct; 8] = [
        Direct::N,
        Direct::NE,
        Direct::E,
        Direct::SE,
        Direct::S,
        Direct::SW,
        Direct::W,
        Direct::NW,
    ];

    /// ルークの4方向
    pub const ROOK: [Direct; 4] = [Direct::N, Direct::E, Direct::S, Direct::W];

    /// ビショップの4方向
    pub const BISHOP: [Direct; 4] = [Direct::NE, Direct::SE, Direct::SW, Direct::NW];

    /// Squareのデルタ
    #[inline]
    pub const fn delta(self) -> i8 {
        match self {
            Direct::N => Square::DELTA_N,
            Direct::NE => Square::DELTA_NE,
            Direct::E => Square::DELTA_E,
            Direct::SE => Square::DELTA_SE,
            Direct::S => Square::DELTA_S,
            Direct::SW => Square::DELTA_SW,
            Direct::W => Square::DELTA_W,
            Direct::NW => Square::DELTA_NW,
        }
    }

    /// 逆方向
    #[inline]
    pub const fn opposite(self) -> Direct {
        match self {
            Direct::N => Direct::S,
            Direct::NE => Direct::SW,
            Direct::E => Direct::W,
            Direct::SE => Direct::NW,
            Direct::S => Direct::N,
            Direct::SW => Direct::NE,
            Direct::W => Direct::E,
            Direct::NW => Direct::SE,
        }
    }

    /// デルタが正（遮蔽駒はlsb側）かどうか
    #[inline]
    pub const fn is_positive(self) -> bool {
        self.delta() > 0
    }

    /// インデックスとして使用
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

struct RayTable {
    /// 方向別レイ（起点の升は含まない）
    ray: [[Bitboard; Square::NUM]; 8],
    /// 空盤面でのルーク利き
    rook_step: [Bitboard; Square::NUM],
    /// 空盤面でのビショップ利き
    bishop_step: [Bitboard; Square::NUM],
}

static RAY_TABLE: OnceLock<RayTable> = OnceLock::new();

fn rays() -> &'static RayTable {
    RAY_TABLE.get_or_init(RayTable::new)
}

impl RayTable {
    fn new() -> Self {
        let mut ray = [[Bitboard::EMPTY; Square::NUM]; 8];

        for d in Direct::ALL {
            for sq in Square::all() {
                let mut bb = Bitboard::EMPTY;
                let mut cur = sq;
                while let Some(next) = cur.offset(d.delta()) {
                    bb.set(next);
                    cur = next;
                }
                ray[d.index()][sq.index()] = bb;
            }
        }

        let mut rook_step = [Bitboard::EMPTY; Square::NUM];
        let mut bishop_step = [Bitboard::EMPTY; Square::NUM];
        for sq in Square::all() {
            for d in Direct::ROOK {
                rook_step[sq.index()] |= ray[d.index()][sq.index()];
            }
            for d in Direct::BISHOP {
                bishop_step[sq.index()] |= ray[d.index()][sq.index()];
            }
        }

        RayTable {
            ray,
            rook_step,
            bishop_step,
        }
    }
}

/// 単一方向のレイ（遮蔽を考慮しない）
#[inline]
pub fn ray_bb(d: Direct, sq: Square) -> Bitboard {
    rays().ray[d.index()][sq.index()]
}

/// 単一方向の利き（最初の遮蔽駒まで。遮蔽駒の升を含む）
#[inline]
pub fn ray_effect(d: Direct, sq: Square, occupied: Bitboard) -> Bitboard {
    let table = rays();
    let attacks = table.ray[d.index()][sq.index()];
    let blockers = attacks & occupied;
    if blockers.is_empty() {
        return attacks;
    }
    // 正方向なら一番近い遮蔽駒はlsb、負方向ならmsb
    let cut = if d.is_positive() {
        blockers.lsb()
    } else {
        blockers.msb()
    };
    match cut {
        Some(c) => attacks ^ table.ray[d.index()][c.index()],
        None => attacks,
    }
}

/// ルークの利き
#[inline]
pub fn rook_effect(sq: Square, occupied: Bitboard) -> Bitboard {
    ray_effect(Direct::N, sq, occupied)
        | ray_effect(Direct::E, sq, occupied)
        | ray_effect(Direct::S, sq, occupied)
        | ray_effect(Direct::W, sq, occupied)
}

/// ビショップの利き
#[inline]
pub fn bishop_effect(sq: Square, occupied: Bitboard) -> Bitboard {
    ray_effect(Direct::NE, sq, occupied)
        | ray_effect(Direct::SE, sq, occupied)
        | ray_effect(Direct::SW, sq, occupied)
        | ray_effect(Direct::NW, sq, occupied)
}

/// クイーンの利き
#[inline]
pub fn queen_effect(sq: Square, occupied: Bitboard) -> Bitboard {
    rook_effect(sq, occupied) | bishop_effect(sq, occupied)
}

/// 空盤面でのルーク利き（スナイパー検出用）
#[inline]
pub fn rook_step_effect(sq: Square) -> Bitboard {
    rays().rook_step[sq.index()]
}

/// 空盤面でのビショップ利き（スナイパー検出用）
#[inline]
pub fn bishop_step_effect(sq: Square) -> Bitboard {
    rays().bishop_step[sq.index()]
}

/// 空盤面でのクイーン利き
#[inline]
pub fn queen_step_effect(sq: Square) -> Bitboard {
    rook_step_effect(sq) | bishop_step_effect(sq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_uci(s).unwrap()
    }

    #[test]
    fn test_rook_effect_empty_board() {
        let attacks = rook_effect(sq("d4"), Bitboard::EMPTY);
        assert_eq!(attacks.count(), 14);
        assert!(attacks.contains(sq("d8")));
        assert!(attacks.contains(sq("a4")));
        assert!(!attacks.contains(sq("e5")));
        assert!(!attacks.contains(sq("d4")));
    }

    #[test]
    fn test_rook_effect_blocked() {
        let occupied = Bitboard::from_square(sq("d6")) | sq("f4");
        let attacks = rook_effect(sq("d4"), occupied);
        // 遮蔽駒の升までは利く
        assert!(attacks.contains(sq("d5")));
        assert!(attacks.contains(sq("d6")));
        assert!(!attacks.contains(sq("d7")));
        assert!(attacks.contains(sq("f4")));
        assert!(!attacks.contains(sq("g4")));
        // 遮蔽のない方向はそのまま
        assert!(attacks.contains(sq("d1")));
        assert!(attacks.contains(sq("a4")));
    }

    #[test]
    fn test_bishop_effect_blocked() {
        let occupied = Bitboard::from_square(sq("f6"));
        let attacks = bishop_effect(sq("d4"), occupied);
        assert!(attacks.contains(sq("e5")));
        assert!(attacks.contains(sq("f6")));
        assert!(!attacks.contains(sq("g7")));
        assert!(attacks.contains(sq("a1")));
        assert!(attacks.contains(sq("a7")));
        assert!(attacks.contains(sq("g1")));
    }

    #[test]
    fn test_queen_effect_corner() {
        let attacks = queen_effect(Square::A1, Bitboard::EMPTY);
        assert_eq!(attacks.count(), 21);
    }

    #[test]
    fn test_step_effects() {
        assert_eq!(rook_step_effect(sq("d4")), rook_effect(sq("d4"), Bitboard::EMPTY));
        assert_eq!(bishop_step_effect(sq("d4")), bishop_effect(sq("d4"), Bitboard::EMPTY));
    }
}
