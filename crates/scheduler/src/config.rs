// config.rs
// 调度器全局配置：策略选择、投递箱数量与拓扑覆盖，构造期固定。
use crate::error::{Error, Result};
use crate::topology::TopologyMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 调度策略，构造期选定后不可切换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPolicy {
    /// 单流：请求严格FIFO串行，每个请求独占整机
    SingleStream,
    /// 多流：多个请求的子任务经投递箱同时在池中执行
    MultiStream,
    /// 弹性：按NUMA节点划分池，同一节点同时至多一个请求
    Elastic,
}

impl SchedulerPolicy {
    /// 解析策略名，未知名称返回配置错误
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "single_stream" => Ok(SchedulerPolicy::SingleStream),
            "multi_stream" => Ok(SchedulerPolicy::MultiStream),
            "elastic" => Ok(SchedulerPolicy::Elastic),
            other => Err(Error::ConfigError(format!("未知调度策略: {}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerPolicy::SingleStream => "single_stream",
            SchedulerPolicy::MultiStream => "multi_stream",
            SchedulerPolicy::Elastic => "elastic",
        }
    }
}

/// 调度器全局配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 调度策略
    pub policy: SchedulerPolicy,
    /// 投递箱数量（多流策略专用）
    pub num_streams: usize,
    /// 单请求并行度上限（多流策略），None 表示 total_cores / num_streams
    pub stream_cap: Option<usize>,
    /// 核心数覆盖，None 表示探测全部核心
    pub num_cores: Option<usize>,
    /// NUMA节点数，None 表示单节点
    pub num_nodes: Option<usize>,
}

impl Default for SchedulerConfig {
    /// 默认配置：单流策略，2个投递箱，使用探测到的完整拓扑
    fn default() -> Self {
        Self {
            policy: SchedulerPolicy::SingleStream,
            num_streams: 2,
            stream_cap: None,
            num_cores: None,
            num_nodes: None,
        }
    }
}

impl SchedulerConfig {
    /// 从 JSON 配置文件加载
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigError(format!(
                "配置文件 {} 不存在", path.display()
            )));
        }
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigError(format!("解析配置文件失败: {}", e)))
    }

    /// 按配置构造拓扑：num_nodes 指定时把核心均分到各节点
    pub fn build_topology(&self) -> Result<TopologyMap> {
        match self.num_nodes {
            None => TopologyMap::detect(self.num_cores),
            Some(0) => Err(Error::ConfigError("num_nodes 不能为 0".to_string())),
            Some(nodes) => {
                let cores = match self.num_cores {
                    Some(0) => {
                        return Err(Error::ConfigError("num_cores 不能为 0".to_string()))
                    }
                    Some(n) => n,
                    None => num_cpus::get(),
                };
                if cores < nodes {
                    return Err(Error::ConfigError(format!(
                        "核心数 {} 少于节点数 {}，无法划分拓扑", cores, nodes
                    )));
                }
                TopologyMap::uniform(nodes, cores / nodes)
            }
        }
    }
}
