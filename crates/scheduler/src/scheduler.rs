// scheduler.rs
// 三种调度策略（单流、多流、弹性）与统一的EngineScheduler入口。
// 策略在构造期由配置选定，对外契约一致：同步执行请求，可多线程并发提交。
use crate::config::{SchedulerConfig, SchedulerPolicy};
use crate::dropbox::DropboxSet;
use crate::error::{Error, Result};
use crate::task::InferenceRequest;
use crate::task_executor::{SubtaskKernel, TaskExecutor};
use crate::task_splitter::{EvenSplitter, TaskSplitter};
use crate::topology::TopologyMap;
use crate::worker_pool::{CoreQueues, TaskSource, WorkerPool};
use std::sync::{Arc, Condvar, Mutex};

/// 调度器公共契约：同步执行一个请求，返回聚合结果或请求级失败
/// 可被多个互不相关的调用线程并发调用
pub trait RequestScheduler: Send + Sync {
    fn execute(&self, request: &InferenceRequest) -> Result<Vec<u8>>;
}

/// 单流调度器的排队状态：取号器实现严格FIFO
struct TurnState {
    next_ticket: u64,
    now_serving: u64,
}

/// 单流调度器：同时只有一个请求处于派发中，起跑顺序严格FIFO
/// 每个请求按整机核心数拆分，独占全部核心，单请求延迟最低
pub struct SingleStreamScheduler {
    topology: Arc<TopologyMap>,
    splitter: Arc<dyn TaskSplitter>,
    queues: Arc<CoreQueues>,
    pool: WorkerPool,
    turn: Mutex<TurnState>,
    turn_cv: Condvar,
}

impl SingleStreamScheduler {
    pub fn new(
        topology: Arc<TopologyMap>,
        splitter: Arc<dyn TaskSplitter>,
        kernel: Arc<dyn SubtaskKernel>,
    ) -> Result<Self> {
        let queues = Arc::new(CoreQueues::new(&topology));
        let pool = WorkerPool::start(
            &topology,
            Arc::clone(&queues) as Arc<dyn TaskSource>,
            kernel,
        )?;
        Ok(Self {
            topology,
            splitter,
            queues,
            pool,
            turn: Mutex::new(TurnState { next_ticket: 0, now_serving: 0 }),
            turn_cv: Condvar::new(),
        })
    }

    fn dispatch(&self, request: &InferenceRequest) -> Result<Vec<u8>> {
        let cores = self.topology.all_cores();
        let degree = request.parallel_degree.clamp(1, cores.len());
        let (tasks, join) = self.splitter.split(request, degree)?;
        for task in tasks {
            // 先入队再唤醒：子任务对工作线程可见后，提交线程才会阻塞在汇合上
            let core = self.queues.submit(task, &cores)?;
            self.pool.wake(&[core]);
        }
        let parts = join.wait()?;
        self.splitter.merge(parts)
    }
}

impl RequestScheduler for SingleStreamScheduler {
    fn execute(&self, request: &InferenceRequest) -> Result<Vec<u8>> {
        // 取号排队：并发提交按号序逐个进入派发
        let mut turn = self.turn.lock().unwrap();
        let ticket = turn.next_ticket;
        turn.next_ticket += 1;
        while turn.now_serving != ticket {
            turn = self.turn_cv.wait(turn).unwrap();
        }
        drop(turn);

        let result = self.dispatch(request);

        let mut turn = self.turn.lock().unwrap();
        turn.now_serving += 1;
        self.turn_cv.notify_all();
        result
    }
}

/// 多流调度器：D个有界投递箱，多个请求的子任务可同时在池中执行
/// 单请求并行度受 cap 限制，防止一个请求占满全部投递容量
pub struct MultiStreamScheduler {
    splitter: Arc<dyn TaskSplitter>,
    dropboxes: Arc<DropboxSet>,
    pool: WorkerPool,
    cap: usize,
}

impl MultiStreamScheduler {
    pub fn new(
        topology: Arc<TopologyMap>,
        num_streams: usize,
        stream_cap: Option<usize>,
        splitter: Arc<dyn TaskSplitter>,
        kernel: Arc<dyn SubtaskKernel>,
    ) -> Result<Self> {
        if num_streams == 0 {
            return Err(Error::ConfigError("num_streams 必须大于 0".to_string()));
        }
        let cap = match stream_cap {
            Some(0) => return Err(Error::ConfigError("stream_cap 不能为 0".to_string())),
            Some(n) => n,
            None => (topology.total_cores() / num_streams).max(1),
        };
        // 投递箱容量与单请求上限一致：一个请求至多占满一个投递箱
        let dropboxes = Arc::new(DropboxSet::new(num_streams, cap)?);
        let pool = WorkerPool::start(
            &topology,
            Arc::clone(&dropboxes) as Arc<dyn TaskSource>,
            kernel,
        )?;
        Ok(Self { splitter, dropboxes, pool, cap })
    }

    /// 配置的单请求并行度上限
    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl RequestScheduler for MultiStreamScheduler {
    fn execute(&self, request: &InferenceRequest) -> Result<Vec<u8>> {
        let degree = request.parallel_degree.clamp(1, self.cap);
        let (tasks, join) = self.splitter.split(request, degree)?;
        let index = self.dropboxes.select();
        println!("请求 {} 投递到 {} 号投递箱", request.request_id, index);
        let dropbox = &self.dropboxes.boxes()[index];
        // 整批准入，槽位不足时在此阻塞；任务可见后再唤醒工作线程
        dropbox.deposit(tasks)?;
        self.pool.wake_all();
        let outcome = join.wait();
        // 全部子任务汇合后才归还槽位：执行中的子任务也计入 D·cap 上限
        dropbox.release(degree);
        self.splitter.merge(outcome?)
    }
}

/// 弹性调度器：按NUMA节点划分池，同一节点同时至多一个在途请求
/// 以吞吐换取节点内共享缓存的隔离，跨节点并发不受限
pub struct ElasticScheduler {
    topology: Arc<TopologyMap>,
    splitter: Arc<dyn TaskSplitter>,
    queues: Arc<CoreQueues>,
    pool: WorkerPool,
    node_busy: Mutex<Vec<bool>>,
    node_free: Condvar,
}

impl ElasticScheduler {
    pub fn new(
        topology: Arc<TopologyMap>,
        splitter: Arc<dyn TaskSplitter>,
        kernel: Arc<dyn SubtaskKernel>,
    ) -> Result<Self> {
        let queues = Arc::new(CoreQueues::new(&topology));
        let pool = WorkerPool::start(
            &topology,
            Arc::clone(&queues) as Arc<dyn TaskSource>,
            kernel,
        )?;
        let num_nodes = topology.nodes().len();
        Ok(Self {
            topology,
            splitter,
            queues,
            pool,
            node_busy: Mutex::new(vec![false; num_nodes]),
            node_free: Condvar::new(),
        })
    }

    /// 获取节点锁：优先第一个空闲节点，全忙时阻塞等待释放
    fn acquire_node(&self) -> usize {
        let mut busy = self.node_busy.lock().unwrap();
        loop {
            if let Some(index) = busy.iter().position(|&b| !b) {
                busy[index] = true;
                return index;
            }
            busy = self.node_free.wait(busy).unwrap();
        }
    }

    fn release_node(&self, node_index: usize) {
        let mut busy = self.node_busy.lock().unwrap();
        busy[node_index] = false;
        self.node_free.notify_one();
    }

    fn dispatch_on_node(&self, request: &InferenceRequest, node_index: usize) -> Result<Vec<u8>> {
        let node = &self.topology.nodes()[node_index];
        let degree = request.parallel_degree.clamp(1, node.core_ids.len());
        let (tasks, join) = self.splitter.split(request, degree)?;
        for task in tasks {
            // 子任务只落在持锁节点的核心上
            let core = self.queues.submit(task, &node.core_ids)?;
            self.pool.wake(&[core]);
        }
        let parts = join.wait()?;
        self.splitter.merge(parts)
    }
}

impl RequestScheduler for ElasticScheduler {
    fn execute(&self, request: &InferenceRequest) -> Result<Vec<u8>> {
        let node_index = self.acquire_node();
        let result = self.dispatch_on_node(request, node_index);
        // 成功或失败都要释放节点锁
        self.release_node(node_index);
        result
    }
}

/// 统一调度入口：按配置构造具体策略的封闭变体
pub enum EngineScheduler {
    SingleStream(SingleStreamScheduler),
    MultiStream(MultiStreamScheduler),
    Elastic(ElasticScheduler),
}

impl EngineScheduler {
    /// 使用默认拆分器与模拟内核构造
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        Self::with_collaborators(config, Arc::new(EvenSplitter), Arc::new(TaskExecutor::new()))
    }

    /// 注入自定义拆分器与内核构造
    pub fn with_collaborators(
        config: &SchedulerConfig,
        splitter: Arc<dyn TaskSplitter>,
        kernel: Arc<dyn SubtaskKernel>,
    ) -> Result<Self> {
        let topology = Arc::new(config.build_topology()?);
        println!(
            "调度器启动: 策略={} 核心数={} 节点数={}",
            config.policy.as_str(),
            topology.total_cores(),
            topology.nodes().len()
        );
        match config.policy {
            SchedulerPolicy::SingleStream => Ok(EngineScheduler::SingleStream(
                SingleStreamScheduler::new(topology, splitter, kernel)?,
            )),
            SchedulerPolicy::MultiStream => Ok(EngineScheduler::MultiStream(
                MultiStreamScheduler::new(
                    topology,
                    config.num_streams,
                    config.stream_cap,
                    splitter,
                    kernel,
                )?,
            )),
            SchedulerPolicy::Elastic => Ok(EngineScheduler::Elastic(
                ElasticScheduler::new(topology, splitter, kernel)?,
            )),
        }
    }

    /// 当前策略
    pub fn policy(&self) -> SchedulerPolicy {
        match self {
            EngineScheduler::SingleStream(_) => SchedulerPolicy::SingleStream,
            EngineScheduler::MultiStream(_) => SchedulerPolicy::MultiStream,
            EngineScheduler::Elastic(_) => SchedulerPolicy::Elastic,
        }
    }

    pub fn execute(&self, request: &InferenceRequest) -> Result<Vec<u8>> {
        match self {
            EngineScheduler::SingleStream(s) => s.execute(request),
            EngineScheduler::MultiStream(s) => s.execute(request),
            EngineScheduler::Elastic(s) => s.execute(request),
        }
    }
}

impl RequestScheduler for EngineScheduler {
    fn execute(&self, request: &InferenceRequest) -> Result<Vec<u8>> {
        EngineScheduler::execute(self, request)
    }
}
