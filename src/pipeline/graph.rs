use std::collections::HashMap;

use super::error::{PipelineError, PipelineResult};

/// One build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub description: String,
    /// Tasks that must complete before this one.
    pub depends_on: Vec<String>,
    /// Tasks that run after this one whenever this one runs.
    pub finalized_by: Vec<String>,
    /// Program and arguments to spawn; empty for aggregate tasks.
    pub command: Vec<String>,
}

impl Task {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            depends_on: Vec::new(),
            finalized_by: Vec::new(),
            command: Vec::new(),
        }
    }

    pub fn depends_on(mut self, tasks: &[&str]) -> Self {
        self.depends_on.extend(tasks.iter().map(|t| t.to_string()));
        self
    }

    pub fn finalized_by(mut self, tasks: &[&str]) -> Self {
        self.finalized_by.extend(tasks.iter().map(|t| t.to_string()));
        self
    }

    pub fn command(mut self, argv: &[&str]) -> Self {
        self.command = argv.iter().map(|a| a.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Task registry with dependency and finalizer edges.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `task`, replacing a task of the same name.
    pub fn register(&mut self, task: Task) -> &mut Self {
        match self.tasks.iter_mut().find(|t| t.name == task.name) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
        self
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Execution order for `requested`: dependencies first, each finalizer
    /// right after the task it finalizes and its own dependencies.
    pub fn plan(&self, requested: &[&str]) -> PipelineResult<Vec<String>> {
        for name in requested {
            self.require(name)?;
        }
        let mut planner = Planner {
            graph: self,
            marks: HashMap::new(),
            stack: Vec::new(),
            order: Vec::new(),
        };
        for name in requested {
            planner.visit(name)?;
        }
        Ok(planner.order)
    }

    fn require(&self, name: &str) -> PipelineResult<&Task> {
        self.task(name)
            .ok_or_else(|| PipelineError::UnknownTask(name.to_string()))
    }
}

struct Planner<'a> {
    graph: &'a TaskGraph,
    marks: HashMap<&'a str, Mark>,
    stack: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Planner<'a> {
    fn visit(&mut self, name: &str) -> PipelineResult<()> {
        let task = self.graph.require(name)?;
        let name = task.name.as_str();
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> =
                    self.stack[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(PipelineError::Cycle(cycle));
            }
            None => {}
        }

        self.marks.insert(name, Mark::Visiting);
        self.stack.push(name);
        for dep in &task.depends_on {
            self.visit(dep)?;
        }
        self.stack.pop();
        self.marks.insert(name, Mark::Done);
        self.order.push(name.to_string());

        for finalizer in &task.finalized_by {
            // already in progress further up; it lands after this task anyway
            if self.marks.get(finalizer.as_str()) == Some(&Mark::Visiting) {
                continue;
            }
            self.visit(finalizer)?;
        }
        Ok(())
    }
}

pub const GENERATE: &str = "generate";
pub const COMPILE: &str = "compile";
pub const TEST: &str = "test";
pub const COVERAGE: &str = "coverage";
pub const PACKAGE: &str = "package";
pub const LINT: &str = "lint";
pub const FORMAT: &str = "format";
pub const BUILD: &str = "build";

/// generate → compile → test (finalized by coverage) and package, plus the
/// lint and format checks.
pub fn default_graph() -> TaskGraph {
    let mut graph = TaskGraph::new();
    graph
        .register(
            Task::new(GENERATE, "Generate DB access code from the migration scripts")
                .command(&["cargo", "run", "--quiet", "--bin", "codegen"]),
        )
        .register(
            Task::new(COMPILE, "Compile all targets")
                .depends_on(&[GENERATE])
                .command(&["cargo", "build", "--all-targets"]),
        )
        .register(
            Task::new(TEST, "Run the test suite")
                .depends_on(&[COMPILE])
                .finalized_by(&[COVERAGE])
                .command(&["cargo", "llvm-cov", "--no-report", "--all-targets"]),
        )
        .register(
            Task::new(COVERAGE, "Write the coverage report")
                .depends_on(&[TEST])
                .command(&["cargo", "llvm-cov", "report", "--html"]),
        )
        .register(
            Task::new(PACKAGE, "Build the release artifact")
                .depends_on(&[COMPILE])
                .command(&["cargo", "build", "--release", "--bin", "baseplatform"]),
        )
        .register(
            Task::new(LINT, "Static analysis")
                .command(&["cargo", "clippy", "--all-targets", "--", "-D", "warnings"]),
        )
        .register(
            Task::new(FORMAT, "Formatting checks").command(&["cargo", "fmt", "--all", "--check"]),
        )
        .register(
            Task::new(BUILD, "Full pipeline").depends_on(&[PACKAGE, TEST, LINT, FORMAT]),
        );
    graph
}
