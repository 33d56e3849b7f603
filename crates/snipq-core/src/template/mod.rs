//! Template rendering.
//!
//! Snippet bodies use a small `{{ }}` action language: field lookups,
//! literals, calls into a fixed table of built-ins, pipelines and
//! `if`/`else if`/`else` blocks. Parsing and execution are separate so the
//! engine can inspect a template (see [`Template::counter_names`]) before
//! rendering it.

mod ast;
mod exec;
pub mod functions;
mod layout;
mod parse;

use crate::error::Result;
use crate::value::{Params, Value};
use ast::{walk_commands, Command, Node, Operand};
use chrono::{DateTime, Local};
use exec::Executor;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

/// Per-render inputs that are not template parameters.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Clock reading for `date`; `None` reads the system clock.
    pub now: Option<DateTime<Local>>,
    /// Counter values handed out by `counter`, keyed by name.
    pub counters: HashMap<String, i64>,
    read_counters: RefCell<BTreeSet<String>>,
}

impl RenderContext {
    pub fn at(now: DateTime<Local>) -> Self {
        Self {
            now: Some(now),
            ..Self::default()
        }
    }

    pub fn with_counters(mut self, counters: HashMap<String, i64>) -> Self {
        self.counters = counters;
        self
    }

    /// Counters that `counter` was actually evaluated for during a render.
    /// Calls in branches that were not taken are not included.
    pub fn read_counters(&self) -> BTreeSet<String> {
        self.read_counters.borrow().clone()
    }

    pub(crate) fn mark_counter_read(&self, name: &str) {
        self.read_counters.borrow_mut().insert(name.to_string());
    }
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(src: &str) -> Result<Self> {
        Ok(Self {
            nodes: parse::parse_template(src)?,
        })
    }

    pub fn render(&self, data: &Params, ctx: &RenderContext) -> Result<String> {
        let mut out = String::new();
        Executor::new(data, ctx).run(&self.nodes, &mut out)?;
        Ok(out)
    }

    /// Names of the counters this template may read, in order of first use.
    /// Every branch is included; [`RenderContext::read_counters`] reports
    /// which ones a render actually used.
    ///
    /// Only calls whose name argument is a literal or a `.field` can be
    /// resolved ahead of rendering; anything else reads as the default.
    pub fn counter_names(&self, data: &Params) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        walk_commands(&self.nodes, &mut |command: &Command| {
            let is_counter = matches!(
                command.operands.first(),
                Some(Operand::Ident(name)) if name == functions::COUNTER_FUNC
            );
            if !is_counter {
                return;
            }

            let name = match command.operands.get(1) {
                Some(Operand::Literal(value)) => value.to_string(),
                Some(Operand::Field(key)) => match data.get(key) {
                    Some(value) => value.to_string(),
                    None => return,
                },
                _ => return,
            };
            if !names.contains(&name) {
                names.push(name);
            }
        });
        names
    }
}

/// Parse and render in one step, with the system clock and no counters.
pub fn render(template: &str, data: &Params) -> Result<String> {
    Template::parse(template)?.render(data, &RenderContext::default())
}

/// Convenience for building parameter maps in callers and tests.
pub fn params<K, V, I>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
