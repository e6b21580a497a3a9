//! 指し手（Move）
//!
//! 16bitのパック表現。置換表・指し手生成のワイヤフォーマットでもある。
//!
//! - bit 0-5:   移動先
//! - bit 6-11:  移動元
//! - bit 12-13: プロモーション駒種（Knight=0 .. Queen=3）
//! - bit 14-15: 指し手タイプ（Normal/Promotion/EnPassant/Castling）
//!
//! キャスリングは「キングが味方ルークを取る」形で符号化する
//! （Chess960でキングとルークの初期位置が任意でも一意に表せる）。

use super::{File, PieceType, Square};

/// 指し手タイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MoveType {
    Normal = 0,
    Promotion = 1 << 14,
    EnPassant = 2 << 14,
    Castling = 3 << 14,
}

/// 指し手（16bitパック表現）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    /// 無効手
    pub const NONE: Move = Move(0);

    /// ヌルムーブ（from == to == B1 の特殊パターン）
    pub const NULL: Move = Move(65);

    /// 通常の指し手を生成
    #[inline]
    pub const fn new(from: Square, to: Square) -> Move {
        Move((from.raw() as u16) << 6 | to.raw() as u16)
    }

    /// プロモーションの指し手を生成
    #[inline]
    pub const fn new_promotion(from: Square, to: Square, pt: PieceType) -> Move {
        debug_assert!(pt as u16 >= PieceType::Knight as u16 && pt as u16 <= PieceType::Queen as u16);
        Move(
            MoveType::Promotion as u16
                | ((pt as u16 - PieceType::Knight as u16) << 12)
                | (from.raw() as u16) << 6
                | to.raw() as u16,
        )
    }

    /// アンパッサンの指し手を生成
    #[inline]
    pub const fn new_en_passant(from: Square, to: Square) -> Move {
        Move(MoveType::EnPassant as u16 | (from.raw() as u16) << 6 | to.raw() as u16)
    }

    /// キャスリングの指し手を生成（to = 味方ルークの位置）
    #[inline]
    pub const fn new_castling(from: Square, to: Square) -> Move {
        Move(MoveType::Castling as u16 | (from.raw() as u16) << 6 | to.raw() as u16)
    }

    /// 移動元を取得
    #[inline]
    pub const fn from(self) -> Square {
        // SAFETY: 6bitマスクなので 0..=63
        match Square::from_u8(((self.0 >> 6) & 0x3F) as u8) {
            Some(sq) => sq,
            None => unreachable!(),
        }
    }

    /// 移動先を取得
    #[inline]
    pub const fn to(self) -> Square {
        match Square::from_u8((self.0 & 0x3F) as u8) {
            Some(sq) => sq,
            None => unreachable!(),
        }
    }

    /// 指し手タイプを取得
    #[inline]
    pub const fn move_type(self) -> MoveType {
        match self.0 >> 14 {
            0 => MoveType::Normal,
            1 => MoveType::Promotion,
            2 => MoveType::EnPassant,
            _ => MoveType::Castling,
        }
    }

    /// プロモーション先の駒種を取得（Promotion手のみ有効）
    #[inline]
    pub const fn promotion_type(self) -> PieceType {
        match PieceType::from_u8(((self.0 >> 12) & 3) as u8 + PieceType::Knight as u8) {
            Some(pt) => pt,
            None => unreachable!(),
        }
    }

    /// NONEでもNULLでもない通常の形かどうか（from != to）
    ///
    /// 合法性は一切保証しない。NONE/NULLの排除だけを行う。
    #[inline]
    pub const fn is_ok(self) -> bool {
        // NONE: from == to == A1、NULL: from == to == B1
        (self.0 >> 6) & 0x3F != self.0 & 0x3F
    }

    /// 無効手かどうか
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// 16bit生値に変換（置換表格納用）
    #[inline]
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// 16bit生値から復元（置換表由来。内容の妥当性はpseudo_legalで検証すること）
    #[inline]
    pub const fn from_u16(v: u16) -> Move {
        Move(v)
    }

    /// UCI形式の文字列に変換
    ///
    /// 通常チェスではキャスリングを "e1g1" のようにキングの移動として出力し、
    /// Chess960では「キングがルークを取る」符号化のまま出力する。
    pub fn to_uci(self, chess960: bool) -> String {
        if self.is_none() {
            return "(none)".to_string();
        }
        if self == Move::NULL {
            return "0000".to_string();
        }

        let from = self.from();
        let mut to = self.to();

        if self.move_type() == MoveType::Castling && !chess960 {
            let file = if to > from { File::FileG } else { File::FileC };
            to = Square::new(file, from.rank());
        }

        let mut s = format!("{}{}", from.to_uci(), to.to_uci());
        if self.move_type() == MoveType::Promotion {
            s.push(self.promotion_type().to_promotion_char());
        }
        s
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uci(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_new() {
        let e2 = Square::from_uci("e2").unwrap();
        let e4 = Square::from_uci("e4").unwrap();
        let m = Move::new(e2, e4);
        assert_eq!(m.from(), e2);
        assert_eq!(m.to(), e4);
        assert_eq!(m.move_type(), MoveType::Normal);
        assert!(m.is_ok());
    }

    #[test]
    fn test_move_promotion() {
        let e7 = Square::from_uci("e7").unwrap();
        let e8 = Square::from_uci("e8").unwrap();
        for pt in [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen] {
            let m = Move::new_promotion(e7, e8, pt);
            assert_eq!(m.move_type(), MoveType::Promotion);
            assert_eq!(m.promotion_type(), pt);
        }
    }

    #[test]
    fn test_move_castling_uci() {
        // 白のキングサイド: e1がh1のルークを取る形
        let m = Move::new_castling(Square::E1, Square::H1);
        assert_eq!(m.move_type(), MoveType::Castling);
        assert_eq!(m.to_uci(false), "e1g1");
        assert_eq!(m.to_uci(true), "e1h1");

        // クイーンサイド
        let m = Move::new_castling(Square::E1, Square::A1);
        assert_eq!(m.to_uci(false), "e1c1");
    }

    #[test]
    fn test_move_none_null() {
        assert!(Move::NONE.is_none());
        assert!(!Move::NONE.is_ok());
        assert!(!Move::NULL.is_ok());
        assert_eq!(Move::NULL.to_uci(false), "0000");
    }

    #[test]
    fn test_move_u16_roundtrip() {
        let m = Move::new_en_passant(
            Square::from_uci("e5").unwrap(),
            Square::from_uci("d6").unwrap(),
        );
        assert_eq!(Move::from_u16(m.to_u16()), m);
        assert_eq!(m.move_type(), MoveType::EnPassant);
    }
}
