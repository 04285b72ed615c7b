use tracing::{debug, warn};

/// Index-based handle to one contiguous run inside a [`PageArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub page: u32,
    pub start: u32,
    pub len: u32,
}

/// Paged, amortized-growth storage for variable-length per-particle runs.
///
/// Pages are preallocated at a configurable default capacity and reused
/// across rebuilds by rewinding cursors instead of freeing memory. A run is
/// never split across pages: when the current page cannot hold the growing
/// run, the partial run migrates to a fresh page (oversized if the run alone
/// exceeds the default capacity) and the old page is retired for this cycle.
/// Buffers only grow, never shrink.
#[derive(Debug, Clone)]
pub struct PageArena<T> {
    pages: Vec<Page<T>>,
    page_size: usize,
    current: usize,
    run_start: usize,
    /// Fresh allocations since the last reset; repeated growth in one build
    /// cycle is worth a loud diagnostic.
    growth_events: usize,
}

#[derive(Debug, Clone)]
struct Page<T> {
    buf: Vec<T>,
    cap: usize,
}

impl<T> Page<T> {
    fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            cap,
        }
    }

    fn remaining(&self) -> usize {
        self.cap - self.buf.len()
    }
}

const GROWTH_WARN_THRESHOLD: usize = 4;

impl<T: Copy> PageArena<T> {
    pub fn new(page_size: usize) -> Self {
        assert!(page_size > 0);
        Self {
            pages: vec![Page::with_capacity(page_size)],
            page_size,
            current: 0,
            run_start: 0,
            growth_events: 0,
        }
    }

    /// Rewinds every page cursor without releasing the underlying buffers.
    pub fn reset(&mut self) {
        for page in &mut self.pages {
            page.buf.clear();
        }
        self.current = 0;
        self.run_start = 0;
        self.growth_events = 0;
    }

    /// Marks the start of a new contiguous run.
    pub fn begin_run(&mut self) {
        self.run_start = self.pages[self.current].buf.len();
    }

    /// Appends one value to the open run, migrating the run to a fresh page
    /// when the current page is exhausted.
    pub fn push(&mut self, value: T) {
        if self.pages[self.current].remaining() == 0 {
            self.migrate_run();
        }
        self.pages[self.current].buf.push(value);
    }

    /// Closes the open run and returns its handle.
    pub fn end_run(&mut self) -> Span {
        let start = self.run_start;
        let len = self.pages[self.current].buf.len() - start;
        let span = Span {
            page: self.current as u32,
            start: start as u32,
            len: len as u32,
        };
        self.run_start = self.pages[self.current].buf.len();
        span
    }

    /// The run recorded by `span`, as one contiguous slice.
    #[inline]
    pub fn get(&self, span: Span) -> &[T] {
        let page = &self.pages[span.page as usize];
        &page.buf[span.start as usize..(span.start + span.len) as usize]
    }

    /// Total values committed since the last reset.
    pub fn len(&self) -> usize {
        self.pages.iter().map(|p| p.buf.len()).sum::<usize>() - self.open_run_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn open_run_len(&self) -> usize {
        self.pages[self.current].buf.len() - self.run_start
    }

    fn migrate_run(&mut self) {
        let run_len = self.open_run_len();
        // A run that alone outgrows the default page gets an oversized page so
        // it stays contiguous.
        let needed = (self.page_size).max(run_len * 2);

        let next = self.current + 1;
        if next == self.pages.len() || self.pages[next].cap < needed {
            if next < self.pages.len() {
                // Existing page is too small for this run; replace it.
                self.pages[next] = Page::with_capacity(needed);
            } else {
                self.pages.push(Page::with_capacity(needed));
            }
            self.growth_events += 1;
            if self.growth_events >= GROWTH_WARN_THRESHOLD {
                warn!(
                    growths = self.growth_events,
                    page_size = self.page_size,
                    "Neighbor arena keeps growing this build; consider a larger page size"
                );
            } else {
                debug!(capacity = needed, "Allocated a new arena page");
            }
        }

        let (left, right) = self.pages.split_at_mut(next);
        let src = &mut left[self.current];
        let dst = &mut right[0];
        dst.buf.extend_from_slice(&src.buf[self.run_start..]);
        src.buf.truncate(self.run_start);

        self.current = next;
        self.run_start = 0;
    }
}
