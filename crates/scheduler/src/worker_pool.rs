// worker_pool.rs
// 工作线程池：每个物理核心一个常驻OS线程并绑核，从调度器提供的任务源领取子任务执行。
// 空闲线程阻塞停车（不自旋），提交路径先让任务可见、再唤醒能执行它的工作线程。
use crate::error::{Error, Result};
use crate::join::SubtaskOutcome;
use crate::task::SubTask;
use crate::task_executor::SubtaskKernel;
use crate::topology::TopologyMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// 任务源契约：工作线程按核心ID非阻塞领取子任务
/// 不同调度策略提供不同的任务源（每核队列、投递箱集合等）
pub trait TaskSource: Send + Sync {
    /// 领取一个可在 core_id 上执行的子任务；无可执行任务时返回None
    fn claim(&self, core_id: usize) -> Option<SubTask>;
}

/// 每核心的停车位：待唤醒标志 + 条件变量
/// 唤醒标志在通知前置位，先于停车的唤醒不会丢失
struct ParkSlot {
    pending: Mutex<bool>,
    cv: Condvar,
}

struct PoolShared {
    slots: Vec<ParkSlot>,
    source: Arc<dyn TaskSource>,
    kernel: Arc<dyn SubtaskKernel>,
    shutdown: AtomicBool,
}

/// 工作线程池，三种调度策略共享的执行基座
/// 生命周期内每个核心恰好一个线程，进程存活期间保持绑核
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    core_ids: Vec<usize>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// 按拓扑启动线程池：拓扑中每个核心ID一个线程
    pub fn start(
        topology: &TopologyMap,
        source: Arc<dyn TaskSource>,
        kernel: Arc<dyn SubtaskKernel>,
    ) -> Result<Self> {
        let core_ids = topology.all_cores();
        let slots = (0..=topology.max_core_id())
            .map(|_| ParkSlot {
                pending: Mutex::new(false),
                cv: Condvar::new(),
            })
            .collect();
        let shared = Arc::new(PoolShared {
            slots,
            source,
            kernel,
            shutdown: AtomicBool::new(false),
        });
        let mut handles = Vec::with_capacity(core_ids.len());
        for &core_id in &core_ids {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("worker-{}", core_id))
                .spawn(move || worker_loop(core_id, shared))?;
            handles.push(handle);
        }
        println!("工作线程池启动: {} 个核心", core_ids.len());
        Ok(Self { shared, core_ids, handles })
    }

    /// 唤醒指定核心上的工作线程（恰好是能执行新任务的那些）
    pub fn wake(&self, core_ids: &[usize]) {
        for &core_id in core_ids {
            if let Some(slot) = self.shared.slots.get(core_id) {
                let mut pending = slot.pending.lock().unwrap();
                *pending = true;
                slot.cv.notify_one();
            }
        }
    }

    /// 唤醒全部工作线程
    pub fn wake_all(&self) {
        let core_ids = self.core_ids.clone();
        self.wake(&core_ids);
    }

    /// 停止线程池：置停机标志、唤醒全部线程并等待退出
    pub fn stop(&mut self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        for slot in &self.shared.slots {
            let mut pending = slot.pending.lock().unwrap();
            *pending = true;
            slot.cv.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(core_id: usize, shared: Arc<PoolShared>) {
    // 绑核失败不致命，仅损失缓存局部性
    if let Some(ids) = core_affinity::get_core_ids() {
        if let Some(id) = ids.into_iter().find(|c| c.id == core_id) {
            core_affinity::set_for_current(id);
        }
    }
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        match shared.source.claim(core_id) {
            Some(task) => run_subtask(shared.kernel.as_ref(), task),
            None => {
                let slot = &shared.slots[core_id];
                let mut pending = slot.pending.lock().unwrap();
                while !*pending && !shared.shutdown.load(Ordering::Acquire) {
                    pending = slot.cv.wait(pending).unwrap();
                }
                *pending = false;
            }
        }
    }
}

/// 执行一个已领取的子任务并汇合
/// 请求已失败时排空：不调用内核，只计入汇合计数，保证汇合必然完成
fn run_subtask(kernel: &dyn SubtaskKernel, task: SubTask) {
    let join = Arc::clone(&task.join);
    if join.has_failed() {
        join.complete(task.partition_index, SubtaskOutcome::Drained);
        return;
    }
    join.mark_running();
    match kernel.execute_subtask(&task) {
        Ok(output) => join.complete(task.partition_index, SubtaskOutcome::Completed(output)),
        Err(e) => join.complete(task.partition_index, SubtaskOutcome::Failed(e.to_string())),
    }
}

/// 默认任务源：每核心一个FIFO队列，工作线程只消费自己核心的队列
/// 单流与弹性调度通过它把子任务限定在指定核心子集内
pub struct CoreQueues {
    queues: Vec<Mutex<VecDeque<SubTask>>>,
}

impl CoreQueues {
    pub fn new(topology: &TopologyMap) -> Self {
        Self {
            queues: (0..=topology.max_core_id())
                .map(|_| Mutex::new(VecDeque::new()))
                .collect(),
        }
    }

    /// 提交子任务到目标核心集合，选排队最少的核心（并列取最小核心ID）
    /// 返回所选核心，调用方据此唤醒对应工作线程
    pub fn submit(&self, task: SubTask, target_cores: &[usize]) -> Result<usize> {
        let mut chosen: Option<(usize, usize)> = None;
        for &core_id in target_cores {
            let queue = self
                .queues
                .get(core_id)
                .ok_or_else(|| Error::ConfigError(format!("核心 {} 不在拓扑内", core_id)))?;
            let len = queue.lock().unwrap().len();
            let better = match chosen {
                None => true,
                Some((_, best_len)) => len < best_len,
            };
            if better {
                chosen = Some((core_id, len));
            }
        }
        let (core_id, _) = chosen
            .ok_or_else(|| Error::ConfigError("目标核心集合为空".to_string()))?;
        self.queues[core_id].lock().unwrap().push_back(task);
        Ok(core_id)
    }

    /// 指定核心当前排队的子任务数
    pub fn queued(&self, core_id: usize) -> usize {
        self.queues
            .get(core_id)
            .map(|q| q.lock().unwrap().len())
            .unwrap_or(0)
    }
}

impl TaskSource for CoreQueues {
    fn claim(&self, core_id: usize) -> Option<SubTask> {
        self.queues.get(core_id)?.lock().unwrap().pop_front()
    }
}
