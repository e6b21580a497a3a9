//! 置換表プリフェッチのトレイト定義
//!
//! `do_move` の中で次局面の置換表エントリを事前にキャッシュへ読み込み、
//! 実際のTT参照時のメモリレイテンシを隠蔽する。

use crate::types::Key;

/// 置換表のプリフェッチを行うトレイト
///
/// `do_move_with_prefetch` が新しいキーの確定直後に呼び出す。
pub trait TtPrefetch {
    /// 指定されたキーに対応する置換表エントリをプリフェッチする
    fn prefetch(&self, key: Key);
}

/// プリフェッチを行わないダミー実装
///
/// 探索以外の用途（局面操作、棋譜再生、テストなど）で使う。
pub struct NoPrefetch;

impl TtPrefetch for NoPrefetch {
    #[inline]
    fn prefetch(&self, _key: Key) {}
}
