use crate::core::path::RelativePath;
use crate::core::scanner::TreeSnapshot;
use std::collections::BTreeSet;
use std::io;
use tracing::{debug, info, warn};

/// 判断两侧都存在的文件是否需要更新
pub trait UpdateOracle {
    fn differs(&mut self, path: &RelativePath) -> io::Result<bool>;
}

impl<F> UpdateOracle for F
where
    F: FnMut(&RelativePath) -> io::Result<bool>,
{
    fn differs(&mut self, path: &RelativePath) -> io::Result<bool> {
        self(path)
    }
}

/// 一轮同步的动作集合，三者两两不相交
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// 只在源中存在
    pub to_add: BTreeSet<RelativePath>,
    /// 只在副本中存在
    pub to_remove: BTreeSet<RelativePath>,
    /// 两侧都存在但内容不同
    pub to_update: BTreeSet<RelativePath>,
}

impl ReconciliationPlan {
    /// 比较两个快照，生成动作集合
    pub fn compute(
        source: &TreeSnapshot,
        replica: &TreeSnapshot,
        oracle: &mut dyn UpdateOracle,
    ) -> Self {
        let source_all = source.all();
        let replica_all = replica.all();

        let to_add: BTreeSet<_> = source_all.difference(&replica_all).cloned().collect();
        let to_remove: BTreeSet<_> = replica_all.difference(&source_all).cloned().collect();

        let mut to_update = BTreeSet::new();
        for path in source_all.intersection(&replica_all) {
            if source.is_dir(path) {
                // 两侧都是目录无需处理；副本这里是文件时需要替换
                if replica.is_file(path) {
                    debug!("类型不同（目录/文件）: {}", path);
                    to_update.insert(path.clone());
                }
                continue;
            }

            match oracle.differs(path) {
                Ok(true) => {
                    debug!("需要更新: {}", path);
                    to_update.insert(path.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("比较文件失败，按需要更新处理: {}: {}", path, e);
                    to_update.insert(path.clone());
                }
            }
        }

        let plan = Self {
            to_add,
            to_remove,
            to_update,
        };

        info!(
            "同步计划: 新增 {}, 更新 {}, 删除 {}",
            plan.to_add.len(),
            plan.to_update.len(),
            plan.to_remove.len()
        );

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_update.is_empty()
    }

    /// 需要复制的路径（新增与更新），祖先在后代之前
    pub fn copies(&self) -> Vec<&RelativePath> {
        self.to_add.union(&self.to_update).collect()
    }

    /// 需要删除的路径
    ///
    /// 上层目录已在删除列表中，或上层在副本中是目录而源中是文件（复制时整体替换）
    /// 的后代会跳过。
    pub fn removals(&self) -> Vec<&RelativePath> {
        let mut result: Vec<&RelativePath> = Vec::new();
        for path in &self.to_remove {
            let mut ancestor = path.parent();
            let mut covered = false;
            while let Some(dir) = ancestor {
                if dir.is_root() {
                    break;
                }
                if self.to_remove.contains(&dir) || self.to_update.contains(&dir) {
                    covered = true;
                    break;
                }
                ancestor = dir.parent();
            }
            if !covered {
                result.push(path);
            }
        }
        result
    }
}
