//! perftによる指し手生成・do_move/undo_moveの正当性検証
//!
//! 公表されている標準テスト局面のperft値と突き合わせる。
//! 深い深さは実行時間がかかるため `#[ignore]` にしてある
//! （`cargo test --release -- --ignored` で実行する）。

use rchess_core::{perft, Position, START_FEN};

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
const POSITION_6: &str = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";

fn run(fen: &str, chess960: bool, expected: &[(u32, u64)]) {
    let mut pos = Position::new();
    pos.set(fen, chess960).unwrap();
    for &(depth, nodes) in expected {
        assert_eq!(perft(&mut pos, depth), nodes, "perft({depth}) of {fen}");
    }
}

#[test]
fn perft_startpos() {
    run(START_FEN, false, &[(1, 20), (2, 400), (3, 8_902), (4, 197_281)]);
}

#[test]
#[ignore]
fn perft_startpos_deep() {
    run(START_FEN, false, &[(5, 4_865_609), (6, 119_060_324)]);
}

#[test]
fn perft_kiwipete() {
    run(KIWIPETE, false, &[(1, 48), (2, 2_039), (3, 97_862)]);
}

#[test]
#[ignore]
fn perft_kiwipete_deep() {
    run(KIWIPETE, false, &[(4, 4_085_603), (5, 193_690_690)]);
}

#[test]
fn perft_position_3() {
    run(POSITION_3, false, &[(1, 14), (2, 191), (3, 2_812), (4, 43_238)]);
}

#[test]
#[ignore]
fn perft_position_3_deep() {
    run(POSITION_3, false, &[(5, 674_624), (6, 11_030_083)]);
}

#[test]
fn perft_position_4() {
    run(POSITION_4, false, &[(1, 6), (2, 264), (3, 9_467)]);
}

#[test]
#[ignore]
fn perft_position_4_deep() {
    run(POSITION_4, false, &[(4, 422_333), (5, 15_833_292)]);
}

#[test]
fn perft_position_5() {
    run(POSITION_5, false, &[(1, 44), (2, 1_486), (3, 62_379)]);
}

#[test]
#[ignore]
fn perft_position_5_deep() {
    run(POSITION_5, false, &[(4, 2_103_487), (5, 89_941_194)]);
}

#[test]
fn perft_position_6() {
    run(POSITION_6, false, &[(1, 46), (2, 2_079), (3, 89_890)]);
}

#[test]
#[ignore]
fn perft_position_6_deep() {
    run(POSITION_6, false, &[(4, 3_894_594), (5, 164_075_551)]);
}

#[test]
fn perft_startpos_as_chess960() {
    // 通常の初期配置は有効なChess960配置でもある。キャスリングの内部
    // 符号化が違っても手数は一致しなければならない
    run(START_FEN, true, &[(1, 20), (2, 400), (3, 8_902), (4, 197_281)]);
}
