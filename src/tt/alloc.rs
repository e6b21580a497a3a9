//! 置換表用のメモリ確保
//!
//! クラスター配列の先頭がキャッシュライン境界に揃うように確保する。
//! Linux/AndroidではTransparent Huge Pageを要求し、WindowsではLarge Pages
//! での確保を試みて、失敗時は通常ページにフォールバックする
//! （Large PagesにはSeLockMemoryPrivilegeの付与が必要で、それはOS側の設定）。
//! 確保の失敗は`handle_alloc_error`でプロセスを終了させる。

use std::alloc::{handle_alloc_error, Layout};
use std::ptr::NonNull;

#[cfg(not(windows))]
use std::alloc::{alloc, dealloc};

#[cfg(windows)]
use windows_sys::Win32::System::Memory::{
    GetLargePageMinimum, VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_LARGE_PAGES, MEM_RELEASE,
    MEM_RESERVE, PAGE_READWRITE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum AllocKind {
    /// Large Pages / Huge Pagesで確保できた（またはそれを要求した）
    LargePages,
    /// 通常ページへのフォールバック
    #[allow(dead_code)]
    Regular,
}

pub(super) struct Allocation {
    ptr: NonNull<u8>,
    kind: AllocKind,
    #[cfg(not(windows))]
    layout: Layout,
}

impl Allocation {
    pub(super) fn allocate(size: usize, alignment: usize) -> Self {
        #[cfg(windows)]
        {
            alloc_windows(size)
        }

        #[cfg(not(windows))]
        {
            alloc_unix(size, alignment)
        }
    }

    pub(super) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(super) fn kind(&self) -> AllocKind {
        self.kind
    }
}

#[cfg(not(windows))]
fn alloc_unix(size: usize, alignment: usize) -> Allocation {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let (page_align, kind) = (2 * 1024 * 1024, AllocKind::LargePages);
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let (page_align, kind) = (4096, AllocKind::Regular);

    let alignment = alignment.max(page_align);
    let layout = Layout::from_size_align(size, alignment)
        .expect("invalid TT allocation layout")
        .pad_to_align();
    let ptr = unsafe { alloc(layout) };
    if ptr.is_null() {
        handle_alloc_error(layout);
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    unsafe {
        // 失敗しても正しさには影響しない（通常ページのまま進むだけ）
        let _ = libc::madvise(ptr as *mut _, layout.size(), libc::MADV_HUGEPAGE);
    }

    Allocation {
        ptr: NonNull::new(ptr).expect("TT allocation returned null"),
        kind,
        layout,
    }
}

#[cfg(windows)]
fn alloc_windows(size: usize) -> Allocation {
    unsafe {
        // Large Pagesを試す。権利がなければVirtualAllocがnullを返すだけ
        let large_page_size = GetLargePageMinimum() as usize;
        if large_page_size != 0 {
            let aligned = size.div_ceil(large_page_size) * large_page_size;
            let ptr = VirtualAlloc(
                std::ptr::null_mut(),
                aligned,
                MEM_RESERVE | MEM_COMMIT | MEM_LARGE_PAGES,
                PAGE_READWRITE,
            );
            if let Some(ptr) = NonNull::new(ptr as *mut u8) {
                return Allocation {
                    ptr,
                    kind: AllocKind::LargePages,
                };
            }
        }

        let ptr = VirtualAlloc(
            std::ptr::null_mut(),
            size,
            MEM_RESERVE | MEM_COMMIT,
            PAGE_READWRITE,
        );
        let ptr = NonNull::new(ptr as *mut u8).unwrap_or_else(|| {
            handle_alloc_error(Layout::from_size_align(size.max(1), 4096).unwrap())
        });
        Allocation {
            ptr,
            kind: AllocKind::Regular,
        }
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        unsafe {
            #[cfg(windows)]
            {
                VirtualFree(self.ptr.as_ptr() as *mut _, 0, MEM_RELEASE);
            }
            #[cfg(not(windows))]
            {
                dealloc(self.ptr.as_ptr(), self.layout);
            }
        }
    }
}

// SAFETY: Allocationは置換表の生メモリを所有する。エントリ単位の並行書き込みは
// 置換表の設計として許容され、確保・解放自体は&mut経由でしか起きない。
unsafe impl Send for Allocation {}
unsafe impl Sync for Allocation {}
