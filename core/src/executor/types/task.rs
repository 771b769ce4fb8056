/// Minimal, executor-agnostic task representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableTask {
    pub id: String,
    pub group: String,
    pub dependencies: Vec<String>,
}

impl ExecutableTask {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: String::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }
}

/// Common task interface for executor graph handling.
pub trait TaskLike: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];

    /// Grouping key used to shard tasks across legacy workers.
    fn group(&self) -> &str {
        ""
    }
}

impl TaskLike for ExecutableTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn group(&self) -> &str {
        &self.group
    }
}
