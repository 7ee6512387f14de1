//! The compile stack.
//!
//! Containers under construction live in an arena and the stack holds their indices, so a
//! container can be pushed, filled and popped while its parent still owns it. When the
//! template has been scanned the arena is frozen into an owned [`Command`] tree.

use crate::command::{Clause, Command, Conjunction, Group};
use crate::error::TemplateError;
use crate::expr::FieldExpr;

type NodeId = usize;

/// The kinds of open container a directive can find on top of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    Root,
    Then,
    Else,
    If,
    Prefix,
    Clause,
    Group,
}

impl Construct {
    /// The name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Construct::Root => "block",
            Construct::Then | Construct::If => "if",
            Construct::Else => "else",
            Construct::Prefix | Construct::Group => "group",
            Construct::Clause => "clause",
        }
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    Block(Construct),
    If(Vec<FieldExpr>),
    Group {
        conjunction: Conjunction,
        null_clause: String,
    },
    Clause(usize),
}

impl Kind {
    fn construct(&self) -> Construct {
        match self {
            Kind::Block(construct) => *construct,
            Kind::If(_) => Construct::If,
            Kind::Group { .. } => Construct::Group,
            Kind::Clause(_) => Construct::Clause,
        }
    }
}

#[derive(Debug)]
enum Child {
    Leaf(Command),
    Node(NodeId),
}

#[derive(Debug)]
struct Container {
    kind: Kind,
    children: Vec<Child>,
}

impl Default for Container {
    fn default() -> Self {
        Container {
            kind: Kind::Block(Construct::Root),
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CompileStack {
    arena: Vec<Container>,
    stack: Vec<NodeId>,
}

impl CompileStack {
    pub fn new() -> Self {
        CompileStack {
            arena: vec![Container::default()],
            stack: vec![0],
        }
    }

    pub fn top(&self) -> Construct {
        let id = self.stack.last().copied().unwrap_or(0);
        self.arena[id].kind.construct()
    }

    /// Add a finished command to the container on top of the stack.
    pub fn add_to_top(&mut self, command: Command) -> Result<(), TemplateError> {
        self.attach(Child::Leaf(command))
    }

    /// Add a new container to the one on top of the stack, then push it.
    pub fn add_and_push(&mut self, kind: Kind) -> Result<(), TemplateError> {
        let id = self.arena.len();
        self.arena.push(Container {
            kind,
            children: Vec::new(),
        });
        self.attach(Child::Node(id))?;
        self.stack.push(id);
        Ok(())
    }

    /// Pop the top container, which must be one of `allowed` for `directive` to be valid here.
    pub fn pop_in_context(
        &mut self,
        directive: &'static str,
        allowed: &[Construct],
    ) -> Result<(), TemplateError> {
        match self.pop() {
            Some(construct) if allowed.contains(&construct) => Ok(()),
            _ => Err(TemplateError::Misplaced(directive)),
        }
    }

    /// Pop the top container. The root is never popped.
    pub fn pop(&mut self) -> Option<Construct> {
        if self.stack.len() <= 1 {
            return None;
        }
        self.stack
            .pop()
            .map(|id| self.arena[id].kind.construct())
    }

    /// Freeze the arena into a command tree. Every container but the root must be closed.
    pub fn finish(mut self) -> Result<Command, TemplateError> {
        if self.stack.len() > 1 {
            return Err(TemplateError::Unclosed(self.top().name()));
        }
        Ok(self.freeze(0))
    }

    fn attach(&mut self, child: Child) -> Result<(), TemplateError> {
        let id = self.stack.last().copied().unwrap_or(0);
        let is_clause = match &child {
            Child::Node(node) => matches!(self.arena[*node].kind, Kind::Clause(_)),
            Child::Leaf(_) => false,
        };
        let top = &mut self.arena[id];
        match top.kind {
            Kind::If(_) if top.children.len() >= 2 => {
                return Err(TemplateError::Rejected("Too many clauses for IF."))
            }
            Kind::Group { .. } if !top.children.is_empty() && !is_clause => {
                return Err(TemplateError::Rejected(
                    "Only clauses may follow the prefix of a group.",
                ))
            }
            _ => {}
        }
        top.children.push(child);
        Ok(())
    }

    fn freeze(&mut self, id: NodeId) -> Command {
        let Container { kind, children } = std::mem::take(&mut self.arena[id]);
        if let Kind::Group {
            conjunction,
            null_clause,
        } = kind
        {
            let mut children = children.into_iter();
            let prefix = match children.next() {
                Some(child) => self.freeze_child(child),
                None => Command::Block(Vec::new()),
            };
            let clauses = children
                .filter_map(|child| match child {
                    Child::Node(node) => self.freeze_clause(node),
                    Child::Leaf(_) => None,
                })
                .collect();
            return Command::Group(Group {
                conjunction,
                null_clause,
                prefix: Box::new(prefix),
                clauses,
            });
        }

        let commands: Vec<Command> = children
            .into_iter()
            .map(|child| self.freeze_child(child))
            .collect();
        match kind {
            Kind::If(conditions) => {
                let mut blocks = commands.into_iter();
                let then_block = blocks.next().unwrap_or(Command::Block(Vec::new()));
                Command::If {
                    conditions,
                    then_block: Box::new(then_block),
                    else_block: blocks.next().map(Box::new),
                }
            }
            _ => Command::Block(commands),
        }
    }

    fn freeze_child(&mut self, child: Child) -> Command {
        match child {
            Child::Leaf(command) => command,
            Child::Node(node) => self.freeze(node),
        }
    }

    fn freeze_clause(&mut self, id: NodeId) -> Option<Clause> {
        let Container { kind, children } = std::mem::take(&mut self.arena[id]);
        let Kind::Clause(col) = kind else {
            return None;
        };
        let body = children
            .into_iter()
            .map(|child| self.freeze_child(child))
            .collect();
        Some(Clause { col, body })
    }
}
