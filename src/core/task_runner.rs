//! 任务执行器：把命令处理器放到宿主正确的执行上下文中运行
//!
//! InlineTaskRunner 在当前线程直接执行；ThreadTaskRunner 把任务排队到一条专用宿主线程上按序执行。
//! 处理器中以 [`AbortSignal`] 为负载的 panic 表示宿主主动中止，会被静默吞掉。

use std::any::Any;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

/// 交给执行器的一个无参工作单元
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// 宿主执行上下文
pub trait TaskRunner: Send + Sync {
    fn execute(&self, task: Task);
}

/// 在调用线程上直接执行
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineTaskRunner;

impl TaskRunner for InlineTaskRunner {
    fn execute(&self, task: Task) {
        task();
    }
}

/// 专用宿主线程：按提交顺序逐个执行任务；runner 被 drop 后线程在队列清空时退出
pub struct ThreadTaskRunner {
    tx: Option<mpsc::UnboundedSender<Task>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadTaskRunner {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    task();
                }
                tracing::debug!("task runner thread exiting");
            })?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// 关闭队列并等待线程执行完剩余任务
    pub fn shutdown(mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("task runner thread panicked");
            }
        }
    }
}

impl TaskRunner for ThreadTaskRunner {
    fn execute(&self, task: Task) {
        let sent = self.tx.as_ref().is_some_and(|tx| tx.send(task).is_ok());
        if !sent {
            tracing::warn!("task runner thread is gone, dropping task");
        }
    }
}

/// 宿主中止信号：作为 panic 负载抛出时不视为命令失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortSignal;

/// 以 [`AbortSignal`] 中止当前处理器
pub fn abort_current_task() -> ! {
    std::panic::panic_any(AbortSignal)
}

pub fn is_abort_signal(payload: &(dyn Any + Send)) -> bool {
    payload.is::<AbortSignal>()
}

/// 提取 panic 负载中的文本
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_inline_runner_runs_immediately() {
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        InlineTaskRunner.execute(Box::new(move || *h.lock().unwrap() += 1));
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_thread_runner_preserves_order() {
        let runner = ThreadTaskRunner::spawn("test-host").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = seen.clone();
            runner.execute(Box::new(move || seen.lock().unwrap().push(i)));
        }
        runner.shutdown();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_panic_payloads() {
        let abort = std::panic::catch_unwind(|| {
            abort_current_task();
        }).unwrap_err();
        assert!(is_abort_signal(abort.as_ref()));

        let plain = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert!(!is_abort_signal(plain.as_ref()));
        assert_eq!(panic_message(plain.as_ref()), "boom 1");
    }
}
