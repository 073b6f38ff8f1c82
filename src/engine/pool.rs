//! Consumer task bookkeeping.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct ConsumerSlot {
    index: usize,
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

/// Running consumers plus the handles of ones asked to stop, so shutdown
/// can still wait for their in-flight work.
#[derive(Default)]
pub(crate) struct ConsumerPool {
    active: Vec<ConsumerSlot>,
    retired: Vec<JoinHandle<()>>,
    next_index: usize,
}

impl ConsumerPool {
    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn next_index(&mut self) -> usize {
        self.next_index += 1;
        self.next_index
    }

    pub(crate) fn push(&mut self, index: usize, stop: CancellationToken, handle: JoinHandle<()>) {
        self.active.push(ConsumerSlot {
            index,
            stop,
            handle,
        });
    }

    /// Ask the newest consumer to stop. Never retires the last one.
    /// Returns the retired consumer's index.
    pub(crate) fn retire_newest(&mut self) -> Option<usize> {
        if self.active.len() <= 1 {
            return None;
        }
        let slot = self.active.pop()?;
        slot.stop.cancel();
        self.retired.retain(|handle| !handle.is_finished());
        self.retired.push(slot.handle);
        Some(slot.index)
    }

    pub(crate) fn take_handles(&mut self) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<_> = self.active.drain(..).map(|slot| slot.handle).collect();
        handles.append(&mut self.retired);
        handles
    }
}
