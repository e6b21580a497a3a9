//! GUIフロントエンド向けの局面JSON表現
//!
//! 盤面スナップショットをTypeScript側が扱いやすい形に変換する。
//! 読み取り専用のビューであり、エンジン状態の永続化には使わない。

use serde::{Deserialize, Serialize};

use crate::types::{Color, File, Rank, Square};

use super::Position;

/// 駒のJSON表現
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PieceJson {
    /// "white" | "black"
    pub owner: String,
    /// "P" | "N" | "B" | "R" | "Q" | "K"
    #[serde(rename = "type")]
    pub piece_type: String,
}

/// 盤面の1マス
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellJson {
    /// "a1" 〜 "h8" 形式
    pub square: String,
    /// 駒（存在しない場合はnull）
    pub piece: Option<PieceJson>,
}

/// 局面全体の状態
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionJson {
    /// 8x8のセル配列（8段目から1段目、各段はaファイルから）
    pub cells: Vec<Vec<CellJson>>,
    /// 手番: "white" | "black"
    pub turn: String,
    /// キャスリング権（FENの第3フィールドと同じ表記）
    pub castling: String,
    /// アンパッサン升（なければ省略）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en_passant: Option<String>,
    /// 50手カウンタ
    pub halfmove_clock: i32,
    /// 手数
    pub fullmove_number: i32,
    /// FEN文字列
    pub fen: String,
}

/// 局面をJSON表現に変換する
pub fn position_to_json(pos: &Position) -> PositionJson {
    let fen = pos.fen();
    let fields: Vec<&str> = fen.split(' ').collect();

    let mut cells = Vec::with_capacity(8);
    for r in (0..8).rev() {
        let mut row = Vec::with_capacity(8);
        for f in 0..8 {
            let sq = Square::new(File::ALL[f], Rank::ALL[r]);
            let pc = pos.piece_on(sq);
            let piece = if pc.is_some() {
                Some(PieceJson {
                    owner: color_name(pc.color()).to_string(),
                    piece_type: pc.to_fen_char().to_ascii_uppercase().to_string(),
                })
            } else {
                None
            };
            row.push(CellJson {
                square: sq.to_uci(),
                piece,
            });
        }
        cells.push(row);
    }

    PositionJson {
        cells,
        turn: color_name(pos.side_to_move()).to_string(),
        castling: fields.get(2).unwrap_or(&"-").to_string(),
        en_passant: pos.ep_square().map(|sq| sq.to_uci()),
        halfmove_clock: pos.rule50_count(),
        fullmove_number: fields
            .get(5)
            .and_then(|s| s.parse().ok())
            .unwrap_or(1),
        fen,
    }
}

fn color_name(c: Color) -> &'static str {
    match c {
        Color::White => "white",
        Color::Black => "black",
    }
}
