use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use crate::error::GraphError;
use crate::executor::types::TaskLike;

/// Task dependency graph (DAG) in execution order.
///
/// Every task appears after all of its dependencies.
#[derive(Debug, Clone)]
pub struct TaskGraph<T: TaskLike> {
    /// Task nodes in plan order: task_id -> Task
    nodes: IndexMap<String, T>,

    /// Dependency edges: task_id -> dependencies that made it into the plan
    edges: HashMap<String, Vec<String>>,

    /// Reverse edges: task_id -> tasks that depend on it
    reverse_edges: HashMap<String, Vec<String>>,
}

impl<T: TaskLike> TaskGraph<T> {
    /// Construct a graph containing every task.
    pub fn from_tasks(tasks: &[T]) -> Result<Self, GraphError> {
        Self::build(tasks, |_| true)
    }

    /// Construct a graph of the tasks accepted by `filter`.
    ///
    /// Tasks are visited in input order; each is placed after its
    /// dependencies. Rejected tasks are left out, as are edges to them.
    pub fn build<F>(tasks: &[T], filter: F) -> Result<Self, GraphError>
    where
        F: Fn(&T) -> bool,
    {
        let mut by_id: HashMap<&str, &T> = HashMap::with_capacity(tasks.len());
        for task in tasks {
            if by_id.insert(task.id(), task).is_some() {
                return Err(GraphError::DuplicateTaskId(task.id().to_string()));
            }
        }
        for task in tasks {
            for dep in task.dependencies() {
                if !by_id.contains_key(dep.as_str()) {
                    return Err(GraphError::DependencyNotFound {
                        task_id: task.id().to_string(),
                        missing_dep: dep.clone(),
                    });
                }
            }
        }

        let mut nodes: IndexMap<String, T> = IndexMap::with_capacity(tasks.len());
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut reverse_edges: HashMap<String, Vec<String>> = HashMap::new();

        let mut queue: VecDeque<&T> = tasks.iter().collect();
        let mut visiting: HashSet<&str> = HashSet::new();

        while let Some(&task) = queue.front() {
            let id = task.id();
            if nodes.contains_key(id) || !filter(task) {
                queue.pop_front();
                continue;
            }

            if visiting.insert(id) {
                // First visit: schedule dependencies ahead of this task.
                for dep in task.dependencies().iter().rev() {
                    if visiting.contains(dep.as_str()) {
                        return Err(GraphError::CircularReference {
                            from: id.to_string(),
                            to: dep.clone(),
                        });
                    }
                    if let Some(&dep_task) = by_id.get(dep.as_str()) {
                        queue.push_front(dep_task);
                    }
                }
            } else {
                // Second visit: every dependency is placed or filtered out.
                queue.pop_front();
                visiting.remove(id);

                let deps: Vec<String> = task
                    .dependencies()
                    .iter()
                    .filter(|dep| nodes.contains_key(dep.as_str()))
                    .cloned()
                    .collect();
                for dep in &deps {
                    reverse_edges
                        .entry(dep.clone())
                        .or_default()
                        .push(id.to_string());
                }
                edges.insert(id.to_string(), deps);
                nodes.insert(id.to_string(), task.clone());
            }
        }

        Ok(Self {
            nodes,
            edges,
            reverse_edges,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.nodes.contains_key(task_id)
    }

    pub fn get(&self, task_id: &str) -> Option<&T> {
        self.nodes.get(task_id)
    }

    /// Position of `task_id` in plan order.
    pub fn index_of(&self, task_id: &str) -> Option<usize> {
        self.nodes.get_index_of(task_id)
    }

    /// Tasks in plan order.
    pub fn tasks(&self) -> impl Iterator<Item = &T> {
        self.nodes.values()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn dependencies_of(&self, task_id: &str) -> &[String] {
        self.edges.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependents_of(&self, task_id: &str) -> &[String] {
        self.reverse_edges
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn into_tasks(self) -> Vec<T> {
        self.nodes.into_values().collect()
    }
}
