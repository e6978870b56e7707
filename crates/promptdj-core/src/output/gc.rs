//! Deferred deallocation for buffers released on the audio thread
//!
//! Voices hold their audio in `basedrop::Shared`. When the audio callback
//! drops one, the pointer is queued and the memory is freed later on the
//! collector thread, so the callback never calls into the allocator.

use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle};

const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

pub const COLLECTOR_THREAD_NAME: &str = "promptdj-gc";

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = flume::bounded(1);

    let spawned = thread::Builder::new()
        .name(COLLECTOR_THREAD_NAME.to_string())
        .spawn(move || {
            // Collector is !Sync; it lives and dies on this thread
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Output: buffer collector started");
            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.ok().and_then(|_| rx.recv().ok()) {
        Some(handle) => handle,
        None => {
            log::error!("Output: collector thread unavailable, released buffers will leak");
            let collector: &'static Collector = Box::leak(Box::new(Collector::new()));
            collector.handle()
        }
    }
}

/// Handle for wrapping buffers that may be released on the audio thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
