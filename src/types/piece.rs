//! 駒種（PieceType）と駒（Piece）

use super::Color;

/// 駒種（先後の区別なし）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PieceType {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceType {
    /// 有効な駒種の数（1-6）
    pub const NUM: usize = 6;

    /// 全ての駒種（価値の昇順）
    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    /// u8からPieceTypeに変換
    #[inline]
    pub const fn from_u8(n: u8) -> Option<PieceType> {
        if n >= 1 && n <= 6 {
            // SAFETY: 1..=6 は有効なPieceType値
            Some(unsafe { std::mem::transmute::<u8, PieceType>(n) })
        } else {
            None
        }
    }

    /// インデックスとして使用（1始まり。0はby_typeの全駒集合に予約）
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// プロモーション先の文字（UCI形式、小文字）
    #[inline]
    pub const fn to_promotion_char(self) -> char {
        match self {
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            _ => '?',
        }
    }
}

/// 駒（手番+駒種のパック表現）
///
/// 内部値: bit0-2 = 駒種、bit3 = 手番。
/// White: 1-6, Black: 9-14。0 は駒なし（NONE）。
/// Zobristテーブル・piece_list等の添字空間がこの符号化と一致する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Piece(u8);

impl Piece {
    /// 添字空間の大きさ（未使用スロット込み）
    pub const NUM: usize = 16;

    /// 駒なし
    pub const NONE: Piece = Piece(0);

    pub const W_PAWN: Piece = Piece(1);
    pub const W_KNIGHT: Piece = Piece(2);
    pub const W_BISHOP: Piece = Piece(3);
    pub const W_ROOK: Piece = Piece(4);
    pub const W_QUEEN: Piece = Piece(5);
    pub const W_KING: Piece = Piece(6);
    pub const B_PAWN: Piece = Piece(9);
    pub const B_KNIGHT: Piece = Piece(10);
    pub const B_BISHOP: Piece = Piece(11);
    pub const B_ROOK: Piece = Piece(12);
    pub const B_QUEEN: Piece = Piece(13);
    pub const B_KING: Piece = Piece(14);

    /// 全ての駒（白→黒の順。Zobrist初期化の乱数列がこの順序に依存する）
    pub const ALL: [Piece; 12] = [
        Piece::W_PAWN,
        Piece::W_KNIGHT,
        Piece::W_BISHOP,
        Piece::W_ROOK,
        Piece::W_QUEEN,
        Piece::W_KING,
        Piece::B_PAWN,
        Piece::B_KNIGHT,
        Piece::B_BISHOP,
        Piece::B_ROOK,
        Piece::B_QUEEN,
        Piece::B_KING,
    ];

    /// 手番と駒種からPieceを生成
    #[inline]
    pub const fn make(color: Color, pt: PieceType) -> Piece {
        Piece((color as u8) << 3 | pt as u8)
    }

    /// 手番を取得（NONEに対しては呼ばない）
    #[inline]
    pub const fn color(self) -> Color {
        debug_assert!(self.0 != 0);
        // SAFETY: bit3 は 0 か 1 なので有効なColor値
        unsafe { std::mem::transmute(self.0 >> 3) }
    }

    /// 駒種を取得（NONEに対しては呼ばない）
    #[inline]
    pub const fn piece_type(self) -> PieceType {
        debug_assert!(self.0 != 0);
        // SAFETY: 下位3bitは構築時に1..=6に限定される
        unsafe { std::mem::transmute(self.0 & 7) }
    }

    /// 駒なしかどうか
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// 駒があるかどうか
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// インデックスとして使用（配列アクセス用）
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// FEN形式の文字（白大文字/黒小文字）に変換
    pub const fn to_fen_char(self) -> char {
        match self.0 {
            1 => 'P',
            2 => 'N',
            3 => 'B',
            4 => 'R',
            5 => 'Q',
            6 => 'K',
            9 => 'p',
            10 => 'n',
            11 => 'b',
            12 => 'r',
            13 => 'q',
            14 => 'k',
            _ => ' ',
        }
    }

    /// FEN形式の文字からPieceに変換
    pub const fn from_fen_char(c: char) -> Option<Piece> {
        let pt = match c.to_ascii_uppercase() {
            'P' => PieceType::Pawn,
            'N' => PieceType::Knight,
            'B' => PieceType::Bishop,
            'R' => PieceType::Rook,
            'Q' => PieceType::Queen,
            'K' => PieceType::King,
            _ => return None,
        };
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Piece::make(color, pt))
    }
}
