// topology.rs
// CPU拓扑图：NUMA节点到核心的静态映射，初始化后只读，供所有调度策略查询。
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 单个NUMA节点，持有有序的核心ID列表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumaNode {
    /// 节点ID
    pub node_id: usize,
    /// 节点内的核心ID，按序排列
    pub core_ids: Vec<usize>,
}

/// CPU拓扑图，按节点顺序组织全部核心
/// 构造时校验一次，此后只读共享，无需加锁
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyMap {
    nodes: Vec<NumaNode>,
}

impl TopologyMap {
    /// 从节点列表构造拓扑，校验节点非空且核心ID不重复
    pub fn new(nodes: Vec<NumaNode>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::ConfigError("拓扑中没有任何NUMA节点".to_string()));
        }
        let mut seen = HashSet::new();
        for node in &nodes {
            if node.core_ids.is_empty() {
                return Err(Error::ConfigError(format!(
                    "NUMA节点 {} 不包含任何核心", node.node_id
                )));
            }
            for &core_id in &node.core_ids {
                if !seen.insert(core_id) {
                    return Err(Error::ConfigError(format!(
                        "核心 {} 在拓扑中出现多次", core_id
                    )));
                }
            }
        }
        Ok(Self { nodes })
    }

    /// 探测当前机器拓扑：单节点，核心数取 num_cpus；num_cores 可覆盖探测结果
    pub fn detect(num_cores: Option<usize>) -> Result<Self> {
        let cores = match num_cores {
            Some(0) => return Err(Error::ConfigError("num_cores 不能为 0".to_string())),
            Some(n) => n,
            None => num_cpus::get(),
        };
        Self::new(vec![NumaNode {
            node_id: 0,
            core_ids: (0..cores).collect(),
        }])
    }

    /// 构造均匀的多节点拓扑（测试与多节点模拟用），核心ID连续分配
    pub fn uniform(num_nodes: usize, cores_per_node: usize) -> Result<Self> {
        if num_nodes == 0 || cores_per_node == 0 {
            return Err(Error::ConfigError(
                "节点数与每节点核心数都必须大于 0".to_string(),
            ));
        }
        let nodes = (0..num_nodes)
            .map(|node_id| NumaNode {
                node_id,
                core_ids: (node_id * cores_per_node..(node_id + 1) * cores_per_node).collect(),
            })
            .collect();
        Self::new(nodes)
    }

    /// 节点列表，按节点序
    pub fn nodes(&self) -> &[NumaNode] {
        &self.nodes
    }

    /// 全部核心数
    pub fn total_cores(&self) -> usize {
        self.nodes.iter().map(|n| n.core_ids.len()).sum()
    }

    /// 全部核心ID，按节点序展开
    pub fn all_cores(&self) -> Vec<usize> {
        self.nodes.iter().flat_map(|n| n.core_ids.clone()).collect()
    }

    /// 最大核心ID（用于按核心ID直接索引的结构定容）
    pub fn max_core_id(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| n.core_ids.iter().copied())
            .max()
            .unwrap_or(0)
    }
}
