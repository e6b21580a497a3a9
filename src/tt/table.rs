//! TranspositionTable本体
//!
//! - Cluster: エントリのグループ
//! - TranspositionTable: テーブル本体
//! - probe/save操作、hashfull、並列clear

use super::alloc::{AllocKind, Allocation};
use super::entry::{TTData, TTEntry};
use super::{CLUSTER_SIZE, GENERATION_DELTA};
use crate::prefetch::TtPrefetch;
use crate::types::{Bound, Key, Move, Value};
use std::sync::atomic::{AtomicU8, Ordering};

/// クラスター構造
/// 同じハッシュインデックスに対して複数のエントリを持つ
/// 10バイトエントリ × 3 + 2パディング = 32バイト。確保ブロックの先頭が
/// 64バイト境界に揃うので、クラスターがキャッシュラインをまたぐことはない
#[repr(C, align(32))]
pub struct Cluster {
    entries: [TTEntry; CLUSTER_SIZE],
    _padding: [u8; 2],
}

// クラスターは32バイトであることを保証
const _: () = assert!(std::mem::size_of::<Cluster>() == 32);

/// キャッシュラインサイズ（確保ブロックの整列に使う）
const CACHE_LINE_SIZE: usize = 64;

struct ClusterTable {
    alloc: Allocation,
    len: usize,
}

impl ClusterTable {
    fn new(len: usize) -> Self {
        let bytes = len * std::mem::size_of::<Cluster>();
        let alloc = Allocation::allocate(bytes, CACHE_LINE_SIZE);
        let ptr = alloc.ptr().as_ptr() as *mut Cluster;
        // SAFETY: allocはlenクラスター分のメモリを確保済み
        unsafe {
            std::ptr::write_bytes(ptr, 0, len);
        }
        Self { alloc, len }
    }

    #[inline]
    fn ptr(&self) -> *mut Cluster {
        self.alloc.ptr().as_ptr() as *mut Cluster
    }

    fn uses_large_pages(&self) -> bool {
        self.alloc.kind() == AllocKind::LargePages
    }
}

/// 置換表
///
/// 全探索ワーカーが共有する唯一の可変状態。エントリの読み書きは
/// 非アトミックで、レースによる切れた書き込みは設計上許容される。
/// `resize` / `clear` は`&mut self`を要求するため、借用規則が
/// 「探索停止中にのみ呼べる」ことを保証する。
pub struct TranspositionTable {
    /// クラスターの配列
    table: ClusterTable,
    /// クラスター数
    cluster_count: usize,
    /// 世代カウンター（下位3bitは使用しない）
    generation8: AtomicU8,
}

impl TranspositionTable {
    /// 新しい置換表を作成（サイズはMB単位）
    pub fn new(mb_size: usize) -> Self {
        let cluster_count = (mb_size * 1024 * 1024 / std::mem::size_of::<Cluster>()).max(1);
        Self {
            table: ClusterTable::new(cluster_count),
            cluster_count,
            generation8: AtomicU8::new(0),
        }
    }

    /// サイズを変更する（既存の内容は破棄してゼロクリアされる）
    pub fn resize(&mut self, mb_size: usize) {
        let new_count = (mb_size * 1024 * 1024 / std::mem::size_of::<Cluster>()).max(1);

        self.table = ClusterTable::new(new_count);
        self.cluster_count = new_count;

        log::info!(
            "TT resize: {} MB, {} clusters, large pages: {}",
            mb_size,
            new_count,
            self.table.uses_large_pages()
        );
    }

    /// 全エントリをゼロクリアする（指定スレッド数で分担）
    pub fn clear(&mut self, thread_count: usize) {
        self.generation8.store(0, Ordering::Relaxed);

        let len = self.table.len;
        let threads = thread_count.max(1);

        // 小さいテーブルやスレッド数1では逐次クリア
        if threads == 1 || len < threads * 1024 {
            // SAFETY: テーブルはlenクラスター分確保済み
            unsafe {
                std::ptr::write_bytes(self.table.ptr(), 0, len);
            }
            return;
        }

        let chunk = len.div_ceil(threads);
        let base = self.table.ptr() as usize;

        std::thread::scope(|scope| {
            for i in 0..threads {
                let start = i * chunk;
                if start >= len {
                    break;
                }
                let count = (start + chunk).min(len) - start;
                let addr = base + start * std::mem::size_of::<Cluster>();

                // SAFETY: 各スレッドは互いに重ならない領域をクリアする
                scope.spawn(move || unsafe {
                    std::ptr::write_bytes(addr as *mut Cluster, 0, count);
                });
            }
        });
    }

    /// 新しい探索を開始する（世代を進める。下位3bitはPV/境界用）
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    /// 現在の世代を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    /// クラスター数を取得
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Large Pagesで確保されたかどうか
    pub fn uses_large_pages(&self) -> bool {
        self.table.uses_large_pages()
    }

    /// クラスターインデックスを計算
    #[inline]
    fn cluster_index(&self, key: Key) -> usize {
        // key * cluster_count / 2^64 でインデックスを計算する
        ((key as u128 * self.cluster_count as u128) >> 64) as usize
    }

    #[inline]
    fn cluster_ptr(&self, key: Key) -> *mut Cluster {
        let index = self.cluster_index(key);
        debug_assert!(index < self.table.len);
        // SAFETY: cluster_indexは常にlen未満
        unsafe { self.table.ptr().add(index) }
    }

    /// 置換表を検索する
    ///
    /// クラスター内を走査し、キー上位16bitの一致または空きスロットが
    /// 見つかればその世代を更新して返す（found = キー一致）。
    /// どちらもなければ、置換価値 depth8 − 相対世代 が最小のエントリを
    /// 書き込み先として返す。
    pub fn probe(&self, key: Key) -> ProbeResult {
        let cluster = self.cluster_ptr(key);
        let key16 = (key >> 48) as u16;
        let gen8 = self.generation();

        // SAFETY: clusterは確保済みテーブル内を指す。他スレッドとの同時
        // 書き込みで切れた値を読む可能性はあるが、それは設計上許容され、
        // 読み出し側が指し手をpseudo_legalで検証する
        unsafe {
            for i in 0..CLUSTER_SIZE {
                let entry = std::ptr::addr_of_mut!((*cluster).entries[i]);
                if (*entry).key16() == key16 || !(*entry).is_occupied() {
                    (*entry).refresh(gen8);
                    return ProbeResult {
                        found: (*entry).is_occupied(),
                        data: (*entry).read(),
                        writer: entry,
                    };
                }
            }

            // 置換するエントリを選択（置換価値が最小のもの。先頭が同価値なら先頭）
            let mut replace = std::ptr::addr_of_mut!((*cluster).entries[0]);
            for i in 1..CLUSTER_SIZE {
                let entry = std::ptr::addr_of_mut!((*cluster).entries[i]);
                let replace_value =
                    (*replace).depth8() as i32 - (*replace).relative_age(gen8) as i32;
                let entry_value = (*entry).depth8() as i32 - (*entry).relative_age(gen8) as i32;
                if replace_value > entry_value {
                    replace = entry;
                }
            }

            ProbeResult {
                found: false,
                data: TTData::EMPTY,
                writer: replace,
            }
        }
    }

    /// 置換表の使用率を千分率で返す
    ///
    /// 等間隔にサンプルして現世代のエントリを数える。テーブルが大きい
    /// ときはサンプル数を増やす。
    pub fn hashfull(&self) -> i32 {
        let samples: usize = if self.cluster_count > 64_000_000 { 10000 } else { 1000 };
        let stride = self.cluster_count / samples;
        let gen8 = self.generation();
        let mut cnt: i32 = 0;

        for i in 0..samples {
            // SAFETY: stride = cluster_count / samples なので i * stride は
            // 常にcluster_count未満（cluster_count < samplesならstride=0）
            let cluster = unsafe { &*self.table.ptr().add(i * stride) };
            for entry in &cluster.entries {
                cnt += (entry.generation8() == gen8) as i32;
            }
        }

        cnt * 1000 / (samples * CLUSTER_SIZE) as i32
    }

    /// 指定キーのクラスターをプリフェッチする
    #[inline]
    pub fn prefetch(&self, key: Key) {
        let cluster = self.cluster_ptr(key);

        #[cfg(target_arch = "x86_64")]
        // SAFETY: プリフェッチは例外を起こさないヒントで、アドレスは
        // テーブル内を指している
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            _mm_prefetch::<_MM_HINT_T0>(cluster as *const i8);
        }

        #[cfg(not(target_arch = "x86_64"))]
        let _ = cluster;
    }
}

impl TtPrefetch for TranspositionTable {
    #[inline]
    fn prefetch(&self, key: Key) {
        TranspositionTable::prefetch(self, key);
    }
}

/// probe結果
pub struct ProbeResult {
    /// キーが一致したか
    pub found: bool,
    /// 読み取ったデータ
    pub data: TTData,
    /// 書き込み用エントリ
    writer: *mut TTEntry,
}

impl ProbeResult {
    /// エントリに書き込む
    ///
    /// 書き込みは非アトミックで、他スレッドとレースしうる（設計上許容）。
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key: Key,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: i32,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        // SAFETY: writerはprobe()で取得したテーブル内の有効なポインタ
        unsafe {
            (*self.writer).save(key, value, is_pv, bound, depth, mv, eval, generation8);
        }
    }
}
