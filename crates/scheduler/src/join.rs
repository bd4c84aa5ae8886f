// join.rs
// 每请求的汇合状态：未完成子任务计数、结果缓冲与完成信号。
// 最后一个完成的子任务恰好触发一次完成信号，提交线程在此阻塞等待。
use crate::error::{Error, Result};
use crate::task::TaskStatus;
use std::sync::{Condvar, Mutex};

/// 单个子任务的执行结局
pub enum SubtaskOutcome {
    /// 执行成功，携带分片输出
    Completed(Vec<u8>),
    /// 执行失败，携带失败原因
    Failed(String),
    /// 请求已失败后被排空：不执行内核，仅计入汇合计数
    Drained,
}

struct JoinInner {
    /// 尚未汇合的子任务数
    remaining: usize,
    /// 按分片序存放的输出槽位
    results: Vec<Option<Vec<u8>>>,
    /// 首个被捕获的失败原因
    failure: Option<String>,
    /// 完成标志，置位后不再变化
    finished: bool,
    /// 请求级状态
    status: TaskStatus,
}

/// 汇合状态，由同一请求的全部子任务与提交线程共享
pub struct JoinState {
    inner: Mutex<JoinInner>,
    done: Condvar,
}

impl JoinState {
    /// 为 num_partitions 个子任务创建汇合状态
    pub fn new(num_partitions: usize) -> Self {
        Self {
            inner: Mutex::new(JoinInner {
                remaining: num_partitions,
                results: (0..num_partitions).map(|_| None).collect(),
                failure: None,
                finished: false,
                status: TaskStatus::Pending,
            }),
            done: Condvar::new(),
        }
    }

    /// 请求是否已记录失败；工作线程据此决定排空而不执行剩余子任务
    pub fn has_failed(&self) -> bool {
        self.inner.lock().unwrap().failure.is_some()
    }

    /// 首个子任务被领取时将请求标记为运行中
    pub fn mark_running(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.status == TaskStatus::Pending {
            inner.status = TaskStatus::Running;
        }
    }

    /// 记录一个子任务的结局并递减计数
    /// 最后一个到达者置位完成标志并发出信号，恰好一次
    pub fn complete(&self, partition_index: usize, outcome: SubtaskOutcome) {
        let mut inner = self.inner.lock().unwrap();
        match outcome {
            SubtaskOutcome::Completed(output) => {
                if let Some(slot) = inner.results.get_mut(partition_index) {
                    *slot = Some(output);
                }
            }
            SubtaskOutcome::Failed(reason) => {
                // 仅保留首个失败原因
                if inner.failure.is_none() {
                    inner.failure = Some(reason);
                }
            }
            SubtaskOutcome::Drained => {}
        }
        inner.remaining = inner.remaining.saturating_sub(1);
        if inner.remaining == 0 && !inner.finished {
            inner.finished = true;
            inner.status = match &inner.failure {
                Some(reason) => TaskStatus::Failed(reason.clone()),
                None => TaskStatus::Completed,
            };
            self.done.notify_all();
        }
    }

    /// 阻塞等待全部子任务汇合
    /// 成功时返回按分片序排列的输出，失败时返回请求级错误
    pub fn wait(&self) -> Result<Vec<Vec<u8>>> {
        let mut inner = self.inner.lock().unwrap();
        while !inner.finished {
            inner = self.done.wait(inner).unwrap();
        }
        if let Some(reason) = &inner.failure {
            return Err(Error::SubtaskError(reason.clone()));
        }
        let mut parts = Vec::with_capacity(inner.results.len());
        for slot in inner.results.iter_mut() {
            match slot.take() {
                Some(output) => parts.push(output),
                None => return Err(Error::Other("分片结果缺失".to_string())),
            }
        }
        Ok(parts)
    }

    /// 请求当前状态
    pub fn status(&self) -> TaskStatus {
        self.inner.lock().unwrap().status.clone()
    }
}
