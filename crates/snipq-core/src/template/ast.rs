use crate::value::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Action(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
}

/// Commands joined by `|`; each result feeds the next as its last argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `.key` lookup in the parameter map
    Field(String),
    Literal(Value),
    /// Function name
    Ident(String),
    /// Parenthesised pipeline
    Sub(Pipeline),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(key) => write!(f, ".{}", key),
            Operand::Literal(Value::Str(s)) => write!(f, "{:?}", s),
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Ident(name) => f.write_str(name),
            Operand::Sub(_) => f.write_str("(...)"),
        }
    }
}

/// Visit every command in a node tree, including nested sub-pipelines.
pub fn walk_commands<'a>(nodes: &'a [Node], visit: &mut dyn FnMut(&'a Command)) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Action(pipeline) => walk_pipeline(pipeline, visit),
            Node::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    walk_pipeline(cond, visit);
                    walk_commands(body, visit);
                }
                walk_commands(otherwise, visit);
            }
        }
    }
}

fn walk_pipeline<'a>(pipeline: &'a Pipeline, visit: &mut dyn FnMut(&'a Command)) {
    for command in &pipeline.commands {
        visit(command);
        for operand in &command.operands {
            if let Operand::Sub(inner) = operand {
                walk_pipeline(inner, visit);
            }
        }
    }
}
