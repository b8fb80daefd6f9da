use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

pub type Task = Box<dyn FnOnce() + Send>;

/// 延迟执行抽象：生产环境使用 tokio 定时器，测试使用可手动推进的虚拟时钟
///
/// 调度后的任务不可取消；页面卸载时由宿主直接丢弃。
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task);
}

pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// 绑定当前 tokio 运行时；不在运行时上下文中时返回 None
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

struct PendingTask {
    due: Duration,
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTask>,
}

/// 虚拟时钟调度器：只有调用 [`ManualScheduler::advance`] 时才会执行到期任务
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.state.lock().map(|s| s.now).unwrap_or_default()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().map(|s| s.pending.len()).unwrap_or(0)
    }

    /// 推进虚拟时钟，按到期时间（同时到期按调度顺序）执行任务
    ///
    /// 任务执行期间不持有锁，因此任务内部可以继续调度新任务；
    /// 新任务若在本次推进窗口内到期，也会被执行。返回执行的任务数。
    pub fn advance(&self, by: Duration) -> usize {
        let target = match self.state.lock() {
            Ok(state) => state.now.saturating_add(by),
            Err(_) => return 0,
        };
        let mut ran = 0usize;
        loop {
            let next = {
                let Ok(mut state) = self.state.lock() else {
                    warn!("[Scheduler] Manual scheduler state poisoned");
                    return ran;
                };
                let due_index = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(index, _)| index);
                match due_index {
                    Some(index) => {
                        let pending = state.pending.swap_remove(index);
                        state.now = state.now.max(pending.due);
                        Some(pending.task)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        if let Ok(mut state) = self.state.lock() {
            let due = state.now.saturating_add(delay);
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.push(PendingTask { due, seq, task });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn manual_runs_only_due_tasks_in_order() {
        let scheduler = ManualScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (delay, label) in [(300, "late"), (100, "first"), (100, "second")] {
            let log = log.clone();
            scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move || log.lock().unwrap().push(label)),
            );
        }

        assert_eq!(scheduler.advance(Duration::from_millis(99)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(1)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.advance(Duration::from_millis(200)), 1);
        assert_eq!(scheduler.now(), Duration::from_millis(300));
    }

    #[test]
    fn huge_delay_saturates_instead_of_overflowing() {
        let scheduler = ManualScheduler::new();
        scheduler.advance(Duration::from_secs(10));
        let fired = Arc::new(Mutex::new(false));
        let flag = fired.clone();
        scheduler.schedule(
            Duration::MAX,
            Box::new(move || *flag.lock().unwrap() = true),
        );
        assert_eq!(scheduler.advance(Duration::from_secs(3600)), 0);
        assert_eq!(scheduler.advance(Duration::MAX), 1);
        assert!(*fired.lock().unwrap());
        assert_eq!(scheduler.now(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_fires_after_delay() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.schedule(
            Duration::from_millis(1500),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        let started = tokio::time::Instant::now();
        rx.await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }
}
