// dropbox.rs
// 多流调度的投递箱：有界子任务邮箱。容量按"已投递且尚未执行完"的子任务计数，
// 取走执行不腾出空间，请求汇合后才归还，在途子任务同样受 D·cap 上限约束。
// 同一请求的子任务整批准入（全有或全无），避免两个提交线程各占半箱互相等待。
// 空闲工作线程不绑定投递箱，按索引序扫描领取。
use crate::error::{Error, Result};
use crate::task::SubTask;
use crate::worker_pool::TaskSource;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct DropboxInner {
    queue: VecDeque<SubTask>,
    /// 占用的容量槽位：排队中 + 执行中的子任务总数
    charged: usize,
    /// 正在等待空间的提交线程数
    waiting_senders: usize,
}

/// 单个投递箱：有界待执行子任务队列 + 等待中的提交线程计数
pub struct Dropbox {
    inner: Mutex<DropboxInner>,
    space: Condvar,
    capacity: usize,
}

impl Dropbox {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(DropboxInner {
                queue: VecDeque::new(),
                charged: 0,
                waiting_senders: 0,
            }),
            space: Condvar::new(),
            capacity,
        }
    }

    /// 当前排队的子任务数
    pub fn queued(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// 当前占用的容量槽位（排队中 + 执行中）
    pub fn charged(&self) -> usize {
        self.inner.lock().unwrap().charged
    }

    /// 正在等待空间的提交线程数
    pub fn waiting_senders(&self) -> usize {
        self.inner.lock().unwrap().waiting_senders
    }

    /// 阻塞投递一批子任务，整批准入
    /// 槽位不足时等待在途子任务执行完归还；超过箱容量的批次直接拒绝
    pub fn deposit(&self, tasks: Vec<SubTask>) -> Result<()> {
        if tasks.len() > self.capacity {
            return Err(Error::QueueError(format!(
                "批次大小 {} 超过投递箱容量 {}", tasks.len(), self.capacity
            )));
        }
        let mut inner = self.inner.lock().unwrap();
        while inner.charged + tasks.len() > self.capacity {
            inner.waiting_senders += 1;
            inner = self.space.wait(inner).unwrap();
            inner.waiting_senders -= 1;
        }
        inner.charged += tasks.len();
        inner.queue.extend(tasks);
        Ok(())
    }

    /// 非阻塞投递一批子任务：槽位不足时返回队列容量错误，整批拒绝
    pub fn try_deposit(&self, tasks: Vec<SubTask>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.charged + tasks.len() > self.capacity {
            return Err(Error::QueueError(format!(
                "投递箱无法容纳 {} 个子任务（容量 {}，已占用 {}）",
                tasks.len(),
                self.capacity,
                inner.charged
            )));
        }
        inner.charged += tasks.len();
        inner.queue.extend(tasks);
        Ok(())
    }

    /// 归还 count 个槽位并唤醒等待的提交线程
    /// 由提交路径在请求的全部子任务汇合后调用，执行中的子任务始终占着槽位
    pub fn release(&self, count: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.charged = inner.charged.saturating_sub(count);
        if inner.waiting_senders > 0 {
            self.space.notify_all();
        }
    }

    /// 工作线程取走一个子任务；槽位不在此处归还
    fn take(&self) -> Option<SubTask> {
        self.inner.lock().unwrap().queue.pop_front()
    }
}

/// 投递箱集合：多流调度的任务源
/// 提交侧按负载均衡规则选箱，工作线程按索引序扫描全部投递箱
pub struct DropboxSet {
    boxes: Vec<Dropbox>,
}

impl DropboxSet {
    /// 创建 num_streams 个容量为 capacity 的投递箱
    pub fn new(num_streams: usize, capacity: usize) -> Result<Self> {
        if num_streams == 0 {
            return Err(Error::ConfigError("投递箱数量必须大于 0".to_string()));
        }
        if capacity == 0 {
            return Err(Error::ConfigError("投递箱容量必须大于 0".to_string()));
        }
        Ok(Self {
            boxes: (0..num_streams).map(|_| Dropbox::new(capacity)).collect(),
        })
    }

    /// 负载均衡选箱：占用槽位最少者优先（在途子任务也计入），并列取最小索引
    pub fn select(&self) -> usize {
        let mut best = 0;
        let mut best_charged = self.boxes[0].charged();
        for (index, dropbox) in self.boxes.iter().enumerate().skip(1) {
            let charged = dropbox.charged();
            if charged < best_charged {
                best = index;
                best_charged = charged;
            }
        }
        best
    }

    pub fn boxes(&self) -> &[Dropbox] {
        &self.boxes
    }

    pub fn num_streams(&self) -> usize {
        self.boxes.len()
    }
}

impl TaskSource for DropboxSet {
    /// 工作线程不绑定投递箱：按索引序扫描，取第一个有任务的箱子
    fn claim(&self, _core_id: usize) -> Option<SubTask> {
        self.boxes.iter().find_map(|dropbox| dropbox.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::JoinState;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn subtask(request: &str, index: usize, join: &Arc<JoinState>) -> SubTask {
        SubTask {
            task_id: format!("{}_part_{}", request, index),
            partition_index: index,
            num_partitions: 4,
            input_data: vec![index as u8],
            join: Arc::clone(join),
        }
    }

    #[test]
    fn test_select_prefers_least_charged_lowest_index() {
        let set = DropboxSet::new(3, 4).unwrap();
        assert_eq!(set.num_streams(), 3);
        let join = Arc::new(JoinState::new(4));
        assert_eq!(set.select(), 0);
        set.boxes()[0]
            .deposit(vec![subtask("a", 0, &join), subtask("a", 1, &join)])
            .unwrap();
        set.boxes()[1].deposit(vec![subtask("b", 0, &join)]).unwrap();
        // 2号箱为空，最少
        assert_eq!(set.select(), 2);
        set.boxes()[2].deposit(vec![subtask("c", 0, &join)]).unwrap();
        // 1号与2号并列（各1），取较小索引
        assert_eq!(set.select(), 1);
    }

    #[test]
    fn test_select_counts_in_flight_tasks() {
        let set = DropboxSet::new(2, 4).unwrap();
        let join = Arc::new(JoinState::new(4));
        set.boxes()[0]
            .deposit(vec![subtask("a", 0, &join), subtask("a", 1, &join)])
            .unwrap();
        // 取走执行不归还槽位：0号箱队列虽空，占用仍是2
        assert!(set.claim(0).is_some());
        assert!(set.claim(0).is_some());
        assert_eq!(set.boxes()[0].queued(), 0);
        assert_eq!(set.boxes()[0].charged(), 2);
        assert_eq!(set.select(), 1);
        // 汇合归还后0号箱重新变为最空
        set.boxes()[0].release(2);
        assert_eq!(set.boxes()[0].charged(), 0);
        assert_eq!(set.select(), 0);
    }

    #[test]
    fn test_try_deposit_rejects_until_release() {
        let set = DropboxSet::new(1, 2).unwrap();
        let join = Arc::new(JoinState::new(4));
        set.boxes()[0]
            .try_deposit(vec![subtask("a", 0, &join), subtask("a", 1, &join)])
            .unwrap();
        let err = set.boxes()[0]
            .try_deposit(vec![subtask("b", 0, &join)])
            .unwrap_err();
        assert!(matches!(err, Error::QueueError(_)));
        // 被取走执行中的子任务仍占槽位，投递依旧被拒
        assert!(set.claim(0).is_some());
        assert!(set.claim(0).is_some());
        let err = set.boxes()[0]
            .try_deposit(vec![subtask("b", 0, &join)])
            .unwrap_err();
        assert!(matches!(err, Error::QueueError(_)));
        set.boxes()[0].release(2);
        set.boxes()[0].try_deposit(vec![subtask("b", 0, &join)]).unwrap();
    }

    #[test]
    fn test_deposit_blocks_until_release() {
        let set = Arc::new(DropboxSet::new(1, 1).unwrap());
        let join = Arc::new(JoinState::new(4));
        set.boxes()[0].deposit(vec![subtask("a", 0, &join)]).unwrap();

        let blocked = {
            let set = Arc::clone(&set);
            let join = Arc::clone(&join);
            thread::spawn(move || set.boxes()[0].deposit(vec![subtask("a", 1, &join)]))
        };
        // 投递箱已满，提交线程必须阻塞
        thread::sleep(Duration::from_millis(50));
        assert!(!blocked.is_finished());
        assert_eq!(set.boxes()[0].waiting_senders(), 1);

        // 仅取走执行不腾出空间，提交线程继续阻塞
        assert!(set.claim(0).is_some());
        thread::sleep(Duration::from_millis(50));
        assert!(!blocked.is_finished());

        // 汇合归还槽位后，阻塞的提交线程才被唤醒
        set.boxes()[0].release(1);
        blocked.join().unwrap().unwrap();
        assert_eq!(set.boxes()[0].queued(), 1);
        assert_eq!(set.boxes()[0].charged(), 1);
    }

    #[test]
    fn test_deposit_admits_whole_batch_or_waits() {
        // 整批准入：剩余1个槽位放不下2个子任务的批次，部分入箱是不允许的
        let set = Arc::new(DropboxSet::new(1, 2).unwrap());
        let join = Arc::new(JoinState::new(4));
        set.boxes()[0].deposit(vec![subtask("a", 0, &join)]).unwrap();

        let blocked = {
            let set = Arc::clone(&set);
            let join = Arc::clone(&join);
            thread::spawn(move || {
                set.boxes()[0].deposit(vec![subtask("b", 0, &join), subtask("b", 1, &join)])
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!blocked.is_finished());
        assert_eq!(set.boxes()[0].queued(), 1);

        // 取走并归还第一个请求的槽位后，整批两个子任务一起入箱
        assert!(set.claim(0).is_some());
        set.boxes()[0].release(1);
        blocked.join().unwrap().unwrap();
        assert_eq!(set.boxes()[0].queued(), 2);
        assert_eq!(set.boxes()[0].charged(), 2);
    }

    #[test]
    fn test_deposit_rejects_oversized_batch() {
        let set = DropboxSet::new(1, 2).unwrap();
        let join = Arc::new(JoinState::new(4));
        let batch = vec![
            subtask("a", 0, &join),
            subtask("a", 1, &join),
            subtask("a", 2, &join),
        ];
        let err = set.boxes()[0].deposit(batch).unwrap_err();
        assert!(matches!(err, Error::QueueError(_)));
    }

    #[test]
    fn test_claim_scans_in_index_order() {
        let set = DropboxSet::new(2, 4).unwrap();
        let join = Arc::new(JoinState::new(4));
        set.boxes()[1].deposit(vec![subtask("b", 0, &join)]).unwrap();
        set.boxes()[0].deposit(vec![subtask("a", 0, &join)]).unwrap();
        let first = set.claim(0).unwrap();
        assert_eq!(first.task_id, "a_part_0");
        let second = set.claim(0).unwrap();
        assert_eq!(second.task_id, "b_part_0");
        assert!(set.claim(0).is_none());
    }
}
