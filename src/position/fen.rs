//! FEN形式の解析・出力
//!
//! 3種類のキャスリング表記（標準KQkq / Shredder-FEN / X-FEN）を受け付ける。
//! パーサは寛容で、構文として読めない要素だけをエラーにする。意味的な
//! 妥当性（キングの数など）は検証しない。入力は信頼できる前提で、
//! 粗い不変条件はデバッグビルドのpos_is_okが確認する。

use std::error::Error;
use std::fmt;

use crate::bitboard::Bitboard;
use crate::types::{pawn_push, Color, File, Piece, PieceType, Rank, Square};

use super::Position;

/// 平手初期局面のFEN
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// FEN解析エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// フィールドが足りない
    MissingField(&'static str),
    /// 駒配置に不明な文字がある、または盤外にはみ出した
    InvalidPiece(char),
    /// 手番の文字が不正
    InvalidColor(char),
    /// エンドゲームコードが不正（"KBPKN"形式でない）
    InvalidEndgameCode,
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::MissingField(name) => write!(f, "missing FEN field: {name}"),
            FenError::InvalidPiece(c) => write!(f, "invalid piece placement token: {c:?}"),
            FenError::InvalidColor(c) => write!(f, "invalid active color: {c:?}"),
            FenError::InvalidEndgameCode => write!(f, "invalid endgame code"),
        }
    }
}

impl Error for FenError {}

impl Position {
    /// FEN文字列から局面を構築する
    ///
    /// フィールドは (1)駒配置 (2)手番 (3)キャスリング (4)アンパッサン升
    /// (5)50手カウンタ (6)手数 の6つ。5と6は省略時に0/1として扱う。
    pub fn set(&mut self, fen: &str, chess960: bool) -> Result<(), FenError> {
        self.reset();

        let mut fields = fen.split_whitespace();

        // 1. 駒配置（8段目から1段目へ、各段はaファイルから）
        let placement = fields
            .next()
            .ok_or(FenError::MissingField("piece placement"))?;
        let mut cursor = Square::A8.raw() as i32;
        for token in placement.chars() {
            if let Some(d) = token.to_digit(10) {
                cursor += d as i32; // 空き升の数だけ東へ
            } else if token == '/' {
                cursor -= 16; // 段末から次の段頭へ
            } else if let Some(pc) = Piece::from_fen_char(token) {
                let sq = u8::try_from(cursor)
                    .ok()
                    .and_then(Square::from_u8)
                    .ok_or(FenError::InvalidPiece(token))?;
                self.put_piece(pc, sq);
                cursor += 1;
            } else {
                return Err(FenError::InvalidPiece(token));
            }
        }

        // 2. 手番
        let active = fields
            .next()
            .ok_or(FenError::MissingField("active color"))?;
        let stm_char = active.chars().next().unwrap_or(' ');
        self.side_to_move =
            Color::from_fen_char(stm_char).ok_or(FenError::InvalidColor(stm_char))?;
        let us = self.side_to_move;

        // 3. キャスリング。3つの表記を受け付ける:
        //    標準FENのKQkq、ルークの筋文字を使うShredder-FEN、および
        //    Chess960で外側ルークが対象でないときに筋文字へ置き換えるX-FEN
        let castling = fields
            .next()
            .ok_or(FenError::MissingField("castling availability"))?;
        if castling != "-" {
            for token in castling.chars() {
                let color = if token.is_ascii_lowercase() {
                    Color::Black
                } else {
                    Color::White
                };
                // キングがいない配置では権利を無視する（寛容パース）
                if self.count(Piece::make(color, PieceType::King)) == 0 {
                    continue;
                }
                let rook = Piece::make(color, PieceType::Rook);
                let upper = token.to_ascii_uppercase();

                let rsq = if upper == 'K' {
                    // 外側（hファイル側）から内側へルークを探す
                    let mut s = Square::H1.relative(color);
                    loop {
                        if self.piece_on(s) == rook {
                            break Some(s);
                        }
                        if s.file() == File::FileA {
                            break None;
                        }
                        s = s.add(Square::DELTA_W);
                    }
                } else if upper == 'Q' {
                    let mut s = Square::A1.relative(color);
                    loop {
                        if self.piece_on(s) == rook {
                            break Some(s);
                        }
                        if s.file() == File::FileH {
                            break None;
                        }
                        s = s.add(Square::DELTA_E);
                    }
                } else {
                    File::from_char(upper.to_ascii_lowercase())
                        .map(|f| Square::new(f, Rank::Rank1.relative(color)))
                };

                if let Some(rsq) = rsq {
                    self.set_castling_right(color, rsq);
                }
            }
        }

        // 4. アンパッサン升。実際に取れる形でなければ無視する。
        //    手の順序だけが違う同一局面のハッシュがずれるのを防ぐため、
        //    (a) 手番のポーンがその升に利いていること
        //    (b) 2升進んだ相手ポーンが想定位置にいること  を要求する
        if let Some(ep) = fields.next().and_then(Square::from_uci) {
            if ep.relative_rank(us) == Rank::Rank6 {
                let them = !us;
                let capturable = !(self.attackers_to(ep) & self.pieces(us, PieceType::Pawn))
                    .is_empty()
                    && !(self.pieces(them, PieceType::Pawn)
                        & Bitboard::from_square(ep.add(pawn_push(them))))
                    .is_empty();
                if capturable {
                    self.st_mut().ep_square = Some(ep);
                }
            }
        }

        // 5-6. 50手カウンタと手数。fullmove=0のような壊れた値にも耐える
        let rule50 = fields.next().and_then(|s| s.parse::<i32>().ok()).unwrap_or(0);
        let fullmove = fields.next().and_then(|s| s.parse::<i32>().ok()).unwrap_or(1);
        self.st_mut().rule50 = rule50;
        // 50手ルールの主張に必要なだけの履歴が確保されるようにply換算する
        self.game_ply = std::cmp::max(2 * (std::cmp::max(fullmove, rule50 / 2 + 1) - 1), 0)
            + (us == Color::Black) as i32;

        self.chess960 = chess960;
        self.set_state();

        debug_assert!(self.pos_is_ok());
        Ok(())
    }

    /// 現局面のFEN表現を返す。Chess960ではShredder-FEN表記で出力する
    pub fn fen(&self) -> String {
        let mut ss = String::new();

        for r in (0..8).rev() {
            let mut empty_cnt: u8 = 0;
            for f in 0..8 {
                let sq = Square::new(File::ALL[f], Rank::ALL[r]);
                let pc = self.piece_on(sq);
                if pc.is_none() {
                    empty_cnt += 1;
                } else {
                    if empty_cnt > 0 {
                        ss.push((b'0' + empty_cnt) as char);
                        empty_cnt = 0;
                    }
                    ss.push(pc.to_fen_char());
                }
            }
            if empty_cnt > 0 {
                ss.push((b'0' + empty_cnt) as char);
            }
            if r > 0 {
                ss.push('/');
            }
        }

        ss.push(' ');
        ss.push(self.side_to_move().to_fen_char());
        ss.push(' ');

        use crate::types::CastlingRights as CR;
        if self.can_castle(CR::ANY) {
            for (cr, standard) in [
                (CR::WHITE_OO, 'K'),
                (CR::WHITE_OOO, 'Q'),
                (CR::BLACK_OO, 'k'),
                (CR::BLACK_OOO, 'q'),
            ] {
                if !self.can_castle(cr) {
                    continue;
                }
                if self.is_chess960() {
                    let file = self.castling_rook_square(cr).file().to_char();
                    ss.push(if standard.is_ascii_uppercase() {
                        file.to_ascii_uppercase()
                    } else {
                        file
                    });
                } else {
                    ss.push(standard);
                }
            }
        } else {
            ss.push('-');
        }

        match self.ep_square() {
            Some(ep) => ss.push_str(&format!(" {} ", ep.to_uci())),
            None => ss.push_str(" - "),
        }

        let fullmove = 1 + (self.game_ply() - (self.side_to_move() == Color::Black) as i32) / 2;
        ss.push_str(&format!("{} {}", self.rule50_count(), fullmove));

        ss
    }

    /// エンドゲームコード（"KBPKN"のような駒構成文字列）から局面を構築する
    ///
    /// 強い側の駒列を7段目に、弱い側を2段目に並べた最小限のFENを作る。
    /// エンドゲームテーブルのmaterial_keyを得るためだけに使う。
    pub fn set_endgame_code(&mut self, code: &str, strong: Color) -> Result<(), FenError> {
        if !code.is_ascii() || !code.starts_with('K') {
            return Err(FenError::InvalidEndgameCode);
        }
        let weak_at = code[1..]
            .find('K')
            .map(|i| i + 1)
            .ok_or(FenError::InvalidEndgameCode)?;

        // sides[0] = 弱い側、sides[1] = 強い側。strongがWhiteなら弱い側を
        // 小文字（黒）に、Blackなら強い側を小文字にする
        let mut sides = [code[weak_at..].to_string(), code[..weak_at].to_string()];
        if sides[0].is_empty() || sides[1].is_empty() || sides[0].len() + sides[1].len() >= 8 {
            return Err(FenError::InvalidEndgameCode);
        }
        sides[strong.index()] = sides[strong.index()].to_lowercase();

        let fen = format!(
            "8/{}{}/8/8/8/8/{}{}/8 w - - 0 1",
            sides[0],
            (b'0' + (8 - sides[0].len() as u8)) as char,
            sides[1],
            (b'0' + (8 - sides[1].len() as u8)) as char,
        );
        self.set(&fen, false)
    }

    /// 白黒を入れ替えた局面にする（評価の対称性バグを探すデバッグ用）
    pub fn flip(&mut self) {
        let fen = self.fen();
        let fields: Vec<&str> = fen.split(' ').collect();

        // 駒配置: 段の並びを逆にして大小文字を入れ替える
        let placement: Vec<String> = fields[0]
            .split('/')
            .rev()
            .map(|rank| rank.chars().map(swap_case).collect())
            .collect();

        let stm = if fields[1] == "w" { "b" } else { "w" };
        let castling: String = fields[2].chars().map(swap_case).collect();
        let ep = if fields[3] == "-" {
            "-".to_string()
        } else {
            let mut chars: Vec<char> = fields[3].chars().collect();
            chars[1] = if chars[1] == '3' { '6' } else { '3' };
            chars.into_iter().collect()
        };

        let flipped = format!(
            "{} {} {} {} {} {}",
            placement.join("/"),
            stm,
            castling,
            ep,
            fields.get(4).unwrap_or(&"0"),
            fields.get(5).unwrap_or(&"1"),
        );

        let chess960 = self.is_chess960();
        self.set(&flipped, chess960)
            .expect("flipped FEN must be valid");
        debug_assert!(self.pos_is_ok());
    }
}

fn swap_case(c: char) -> char {
    if c.is_ascii_lowercase() {
        c.to_ascii_uppercase()
    } else if c.is_ascii_uppercase() {
        c.to_ascii_lowercase()
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CastlingRights;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    fn pos_from(fen: &str) -> Position {
        let mut pos = Position::new();
        pos.set(fen, false).unwrap();
        pos
    }

    #[test]
    fn test_fen_roundtrip() {
        for fen in [
            START_FEN,
            KIWIPETE,
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1",
            "4k3/8/8/8/8/8/8/4K2R w K - 13 42",
        ] {
            let pos = pos_from(fen);
            assert_eq!(pos.fen(), fen, "round-trip failed");
        }
    }

    #[test]
    fn test_fen_missing_fields() {
        let mut pos = Position::new();
        assert_eq!(pos.set("", false), Err(FenError::MissingField("piece placement")));
        assert_eq!(
            pos.set("8/8/8/8/8/8/8/8", false),
            Err(FenError::MissingField("active color"))
        );
        assert!(pos.set("8/8/8/8/8/8/8/4X3 w - - 0 1", false).is_err());
    }

    #[test]
    fn test_spurious_ep_square_is_dropped() {
        // ep升は宣言されているが、取れるポーンがいないので無視される
        let pos = pos_from("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        assert_eq!(pos.ep_square(), None);
        assert!(pos.fen().contains(" - "));

        // 取れる形ならば保持される
        let pos = pos_from("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3");
        assert_eq!(pos.ep_square(), Some(Square::from_uci("e3").unwrap()));
    }

    #[test]
    fn test_ep_square_hash_consistency() {
        // 無効なep升が落とされるため、手順違いの同一局面はキーが一致する
        let a = pos_from("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        let b = pos_from("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_game_ply_formula() {
        // fullmove=1, 白番 → ply 0
        assert_eq!(pos_from(START_FEN).game_ply(), 0);
        // fullmove=1, 黒番 → ply 1
        assert_eq!(
            pos_from("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").game_ply(),
            1
        );
        // 壊れたfullmove=0にも耐える
        assert_eq!(pos_from("4k3/8/8/8/8/8/8/4K3 w - - 0 0").game_ply(), 0);
        // rule50が大きいときは50手の主張に足る履歴を確保する
        let pos = pos_from("4k3/8/8/8/8/8/8/4K3 w - - 90 3");
        assert!(pos.game_ply() >= 90);
    }

    #[test]
    fn test_shredder_fen_castling() {
        // Shredder-FEN: ルークの筋文字で権利を表す
        let mut pos = Position::new();
        pos.set("r3k2r/8/8/8/8/8/8/R3K2R w HAha - 0 1", true).unwrap();
        assert!(pos.can_castle(CastlingRights::ANY));
        assert_eq!(pos.castling_rook_square(CastlingRights::WHITE_OO), Square::H1);
        assert_eq!(pos.castling_rook_square(CastlingRights::WHITE_OOO), Square::A1);
        // Chess960モードの出力はShredder-FEN
        assert_eq!(pos.fen(), "r3k2r/8/8/8/8/8/8/R3K2R w HAha - 0 1");
    }

    #[test]
    fn test_xfen_inner_rook() {
        // X-FEN: 内側のルークが対象のときは筋文字で区別する
        // b1とg1にルーク、c1にキング。'G'はg1側、'B'はb1側の権利
        let mut pos = Position::new();
        pos.set("1rk3r1/8/8/8/8/8/8/1RK3R1 w GBgb - 0 1", true).unwrap();
        assert_eq!(
            pos.castling_rook_square(CastlingRights::WHITE_OO),
            Square::G1
        );
        assert_eq!(
            pos.castling_rook_square(CastlingRights::WHITE_OOO),
            Square::B1
        );
    }

    #[test]
    fn test_standard_castling_letters_find_outer_rooks() {
        let pos = pos_from(KIWIPETE);
        assert_eq!(pos.castling_rook_square(CastlingRights::WHITE_OO), Square::H1);
        assert_eq!(pos.castling_rook_square(CastlingRights::WHITE_OOO), Square::A1);
        assert_eq!(pos.castling_rook_square(CastlingRights::BLACK_OO), Square::H8);
        assert_eq!(pos.castling_rook_square(CastlingRights::BLACK_OOO), Square::A8);
    }

    #[test]
    fn test_endgame_code() {
        let mut pos = Position::new();
        pos.set_endgame_code("KBPKN", Color::White).unwrap();

        // 強い側（白）はKBP、弱い側（黒）はKN
        assert_eq!(pos.count(Piece::W_BISHOP), 1);
        assert_eq!(pos.count(Piece::W_PAWN), 1);
        assert_eq!(pos.count(Piece::B_KNIGHT), 1);
        assert_eq!(pos.count(Piece::W_KING), 1);
        assert_eq!(pos.count(Piece::B_KING), 1);

        // material_keyは同じ駒構成の局面と一致する
        let manual = pos_from("8/kn6/8/8/8/8/KBP5/8 w - - 0 1");
        assert_eq!(pos.material_key(), manual.material_key());

        assert!(pos.set_endgame_code("BPKN", Color::White).is_err());
        assert!(pos.set_endgame_code("KBPN", Color::White).is_err());
    }

    #[test]
    fn test_flip_involution() {
        let mut pos = pos_from(KIWIPETE);
        let original = pos.fen();
        let key = pos.key();

        pos.flip();
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_ne!(pos.fen(), original);
        assert!(pos.pos_is_ok_full());

        // 2回で元に戻る
        pos.flip();
        assert_eq!(pos.fen(), original);
        assert_eq!(pos.key(), key);
    }
}
