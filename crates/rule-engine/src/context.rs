//! 事实上下文
//!
//! 对一次评估共享的事实对象做一层显式包装：所有读、写、删除都经过 `FactContext`，
//! 在执行底层操作之前先通知当前安装的观察者。观察者槽位只有一个，
//! 通过 [`FactContext::observe`] 返回的守卫安装，守卫 drop 时恢复原值。

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, RuleError};

/// 一次上下文访问
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextAccess {
    Get { path: String },
    Set { path: String, value: Value },
    Delete { path: String },
}

impl ContextAccess {
    pub fn path(&self) -> &str {
        match self {
            Self::Get { path } | Self::Set { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// 上下文访问观察者
///
/// 在访问真正发生之前被同步调用，返回值不影响访问本身。
#[cfg_attr(test, mockall::automock)]
pub trait ContextObserver: Send + Sync {
    fn observe(&self, access: &ContextAccess);
}

impl<F> ContextObserver for F
where
    F: Fn(&ContextAccess) + Send + Sync,
{
    fn observe(&self, access: &ContextAccess) {
        self(access)
    }
}

/// 路径片段
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// 对象键；纯数字的键在数组上按下标解析
    Key(String),
    /// `[n]` 形式的显式下标
    Index(usize),
}

/// 解析点号路径，支持 `orders[0].amount`、`matrix[1][2]` 和 `items.0.name`
fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let invalid = || RuleError::InvalidPath(path.to_string());

    if path.is_empty() {
        return Err(invalid());
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => part.split_at(pos),
            None => (part, ""),
        };

        if key.is_empty() && (rest.is_empty() || segments.is_empty()) {
            return Err(invalid());
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }

        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(invalid)?;
            if !rest.starts_with('[') {
                return Err(invalid());
            }
            let index: usize = rest[1..close].parse().map_err(|_| invalid())?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
        }
    }

    Ok(segments)
}

fn lookup<'a>(mut current: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    for segment in segments {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key)?,
            (Segment::Key(key), Value::Array(arr)) => arr.get(key.parse::<usize>().ok()?)?,
            (Segment::Index(index), Value::Array(arr)) => arr.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

fn assign(target: &mut Value, segments: &[Segment], value: Value, path: &str) -> Result<()> {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return Ok(());
    };

    match first {
        Segment::Key(key) => {
            if let Value::Array(arr) = target {
                if let Ok(index) = key.parse::<usize>() {
                    return assign_index(arr, index, rest, value, path);
                }
            }

            // 非容器的中间节点被替换为对象
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            let map = target
                .as_object_mut()
                .ok_or_else(|| RuleError::InvalidPath(path.to_string()))?;

            if rest.is_empty() {
                map.insert(key.clone(), value);
                Ok(())
            } else {
                let child = map.entry(key.clone()).or_insert(Value::Null);
                assign(child, rest, value, path)
            }
        }
        Segment::Index(index) => match target {
            Value::Array(arr) => assign_index(arr, *index, rest, value, path),
            _ => Err(RuleError::InvalidPath(path.to_string())),
        },
    }
}

fn assign_index(
    arr: &mut Vec<Value>,
    index: usize,
    rest: &[Segment],
    value: Value,
    path: &str,
) -> Result<()> {
    if index > arr.len() {
        return Err(RuleError::InvalidPath(path.to_string()));
    }
    if index == arr.len() {
        arr.push(Value::Null);
    }
    assign(&mut arr[index], rest, value, path)
}

fn remove(target: &mut Value, segments: &[Segment]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;

    let mut current = target;
    for segment in parents {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (Segment::Key(key), Value::Array(arr)) => arr.get_mut(key.parse::<usize>().ok()?)?,
            (Segment::Index(index), Value::Array(arr)) => arr.get_mut(*index)?,
            _ => return None,
        };
    }

    match (last, current) {
        (Segment::Key(key), Value::Object(map)) => map.shift_remove(key),
        (Segment::Key(key), Value::Array(arr)) => {
            let index = key.parse::<usize>().ok()?;
            (index < arr.len()).then(|| arr.remove(index))
        }
        (Segment::Index(index), Value::Array(arr)) => {
            (*index < arr.len()).then(|| arr.remove(*index))
        }
        _ => None,
    }
}

/// 带访问拦截的事实容器
///
/// 每次评估创建一个；评估过程中只有一条规则在访问它，锁只用来满足 `Sync`。
#[derive(Default)]
pub struct FactContext {
    data: RwLock<Value>,
    observer: Mutex<Option<Arc<dyn ContextObserver>>>,
}

impl FactContext {
    pub fn new(data: Value) -> Self {
        Self {
            data: RwLock::new(data),
            observer: Mutex::new(None),
        }
    }

    /// 读取字段，路径不存在时返回 `None`
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let segments = parse_path(path)?;
        self.notify(|| ContextAccess::Get {
            path: path.to_string(),
        });
        Ok(lookup(&self.data.read(), &segments).cloned())
    }

    /// 判断字段是否存在
    pub fn has(&self, path: &str) -> Result<bool> {
        Ok(self.get(path)?.is_some())
    }

    /// 写入字段，按需创建中间对象
    pub fn set(&self, path: &str, value: Value) -> Result<()> {
        let segments = parse_path(path)?;
        self.notify(|| ContextAccess::Set {
            path: path.to_string(),
            value: value.clone(),
        });
        assign(&mut self.data.write(), &segments, value, path)
    }

    /// 删除字段，返回被删除的值
    pub fn delete(&self, path: &str) -> Result<Option<Value>> {
        let segments = parse_path(path)?;
        self.notify(|| ContextAccess::Delete {
            path: path.to_string(),
        });
        Ok(remove(&mut self.data.write(), &segments))
    }

    /// 安装观察者，返回的守卫 drop 时恢复之前的观察者
    pub fn observe(&self, observer: Arc<dyn ContextObserver>) -> ObserverGuard<'_> {
        let previous = self.observer.lock().replace(observer);
        ObserverGuard {
            context: self,
            previous,
        }
    }

    /// 当前数据的快照
    pub fn snapshot(&self) -> Value {
        self.data.read().clone()
    }

    pub fn into_inner(self) -> Value {
        self.data.into_inner()
    }

    fn notify(&self, access: impl FnOnce() -> ContextAccess) {
        // 先取出观察者再回调，避免回调内访问上下文时死锁
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.observe(&access());
        }
    }
}

impl std::fmt::Debug for FactContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactContext")
            .field("data", &*self.data.read())
            .field("observed", &self.observer.lock().is_some())
            .finish()
    }
}

/// 观察者守卫
#[must_use = "守卫被丢弃时观察者立即卸载"]
pub struct ObserverGuard<'a> {
    context: &'a FactContext,
    previous: Option<Arc<dyn ContextObserver>>,
}

impl Drop for ObserverGuard<'_> {
    fn drop(&mut self) {
        *self.context.observer.lock() = self.previous.take();
    }
}
