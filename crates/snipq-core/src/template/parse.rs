use super::ast::{Command, Node, Operand, Pipeline};
use crate::error::{Result, SnipqError};
use crate::value::Value;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_until, take_while},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

const OPEN: &str = "{{";

#[derive(Debug)]
enum ActionKind {
    Expr(Pipeline),
    If(Pipeline),
    ElseIf(Pipeline),
    Else,
    End,
    Comment,
}

#[derive(Debug)]
enum Token {
    Text(String),
    Action { kind: ActionKind, line: usize },
}

enum Terminator {
    Else(usize),
    ElseIf(Pipeline, usize),
    End(usize),
}

/// Parse template source into a node tree.
pub fn parse_template(src: &str) -> Result<Vec<Node>> {
    let tokens = lex(src)?;
    let mut iter = tokens.into_iter();
    let (nodes, terminator) = parse_block(&mut iter)?;
    match terminator {
        None => Ok(nodes),
        Some(Terminator::End(line)) => Err(parse_error(line, "unexpected {{end}}")),
        Some(Terminator::Else(line)) | Some(Terminator::ElseIf(_, line)) => {
            Err(parse_error(line, "unexpected {{else}}"))
        }
    }
}

fn parse_error(line: usize, message: &str) -> SnipqError {
    SnipqError::TemplateParse(format!("line {}: {}", line, message))
}

fn line_at(src: &str, offset: usize) -> usize {
    src[..offset].matches('\n').count() + 1
}

fn lex(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = src;
    let mut trim_next = false;

    while let Some(start) = rest.find(OPEN) {
        let mut text = &rest[..start];
        if trim_next {
            text = text.trim_start();
        }

        let after_open = &rest[start + OPEN.len()..];
        // `{{- ` trims the preceding text; the dash must be followed by a space
        let trim_left = after_open.starts_with('-')
            && after_open[1..].starts_with(|c: char| c.is_whitespace());
        if trim_left {
            text = text.trim_end();
        }
        if !text.is_empty() {
            tokens.push(Token::Text(text.to_string()));
        }

        let line = line_at(src, src.len() - rest.len() + start);
        let body = if trim_left { &after_open[1..] } else { after_open };

        match action(body) {
            Ok((remaining, (kind, trim_right))) => {
                tokens.push(Token::Action { kind, line });
                trim_next = trim_right;
                rest = remaining;
            }
            Err(_) => {
                let snippet: String = body.chars().take(24).collect();
                let message = if body.contains("}}") {
                    format!("bad action syntax near \"{}\"", snippet.trim())
                } else {
                    "unclosed action".to_string()
                };
                return Err(parse_error(line, &message));
            }
        }
    }

    let mut text = rest;
    if trim_next {
        text = text.trim_start();
    }
    if !text.is_empty() {
        tokens.push(Token::Text(text.to_string()));
    }

    Ok(tokens)
}

fn parse_block(iter: &mut std::vec::IntoIter<Token>) -> Result<(Vec<Node>, Option<Terminator>)> {
    let mut nodes = Vec::new();

    while let Some(token) = iter.next() {
        match token {
            Token::Text(text) => nodes.push(Node::Text(text)),
            Token::Action { kind, line } => match kind {
                ActionKind::Expr(pipeline) => nodes.push(Node::Action(pipeline)),
                ActionKind::Comment => {}
                ActionKind::If(cond) => nodes.push(parse_if(cond, line, iter)?),
                ActionKind::Else => return Ok((nodes, Some(Terminator::Else(line)))),
                ActionKind::ElseIf(cond) => {
                    return Ok((nodes, Some(Terminator::ElseIf(cond, line))))
                }
                ActionKind::End => return Ok((nodes, Some(Terminator::End(line)))),
            },
        }
    }

    Ok((nodes, None))
}

fn parse_if(first: Pipeline, line: usize, iter: &mut std::vec::IntoIter<Token>) -> Result<Node> {
    let mut branches = Vec::new();
    let mut cond = first;

    loop {
        let (body, terminator) = parse_block(iter)?;
        branches.push((cond, body));

        match terminator {
            Some(Terminator::End(_)) => {
                return Ok(Node::If {
                    branches,
                    otherwise: Vec::new(),
                })
            }
            Some(Terminator::ElseIf(next, _)) => cond = next,
            Some(Terminator::Else(_)) => {
                let (otherwise, terminator) = parse_block(iter)?;
                return match terminator {
                    Some(Terminator::End(_)) => Ok(Node::If {
                        branches,
                        otherwise,
                    }),
                    Some(Terminator::Else(l)) | Some(Terminator::ElseIf(_, l)) => {
                        Err(parse_error(l, "{{else}} after final {{else}}"))
                    }
                    None => Err(parse_error(line, "{{if}} has no matching {{end}}")),
                };
            }
            None => return Err(parse_error(line, "{{if}} has no matching {{end}}")),
        }
    }
}

// Action body parsers

fn action(input: &str) -> IResult<&str, (ActionKind, bool)> {
    let (input, _) = multispace0(input)?;
    let (input, kind) = alt((
        comment,
        if_action,
        else_if_action,
        else_action,
        end_action,
        map(pipeline, ActionKind::Expr),
    ))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, trim_right) = opt(char('-'))(input)?;
    let (input, _) = tag("}}")(input)?;
    Ok((input, (kind, trim_right.is_some())))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(peek(satisfy(is_ident_char))))
}

fn comment(input: &str) -> IResult<&str, ActionKind> {
    map(
        delimited(tag("/*"), take_until("*/"), tag("*/")),
        |_| ActionKind::Comment,
    )(input)
}

fn if_action(input: &str) -> IResult<&str, ActionKind> {
    map(
        preceded(pair(keyword("if"), multispace0), pipeline),
        ActionKind::If,
    )(input)
}

fn else_if_action(input: &str) -> IResult<&str, ActionKind> {
    map(
        preceded(
            tuple((keyword("else"), multispace1, keyword("if"), multispace0)),
            pipeline,
        ),
        ActionKind::ElseIf,
    )(input)
}

fn else_action(input: &str) -> IResult<&str, ActionKind> {
    map(keyword("else"), |_| ActionKind::Else)(input)
}

fn end_action(input: &str) -> IResult<&str, ActionKind> {
    map(keyword("end"), |_| ActionKind::End)(input)
}

fn pipeline(input: &str) -> IResult<&str, Pipeline> {
    map(
        separated_list1(delimited(multispace0, char('|'), multispace0), command),
        |commands| Pipeline { commands },
    )(input)
}

fn command(input: &str) -> IResult<&str, Command> {
    let (input, first) = operand(input)?;
    let (input, rest) = many0(preceded(multispace1, operand))(input)?;

    let mut operands = Vec::with_capacity(rest.len() + 1);
    operands.push(first);
    operands.extend(rest);
    Ok((input, Command { operands }))
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(
            delimited(
                pair(char('('), multispace0),
                pipeline,
                pair(multispace0, char(')')),
            ),
            Operand::Sub,
        ),
        map(preceded(char('.'), identifier), |key| {
            Operand::Field(key.to_string())
        }),
        map(string_literal, |s| Operand::Literal(Value::Str(s))),
        map(raw_string, |s| Operand::Literal(Value::Str(s.to_string()))),
        map(integer, |n| Operand::Literal(Value::Int(n))),
        map(identifier, |name| match name {
            "true" => Operand::Literal(Value::Bool(true)),
            "false" => Operand::Literal(Value::Bool(false)),
            _ => Operand::Ident(name.to_string()),
        }),
    ))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(
        terminated(
            recognize(pair(opt(char('-')), digit1)),
            not(peek(satisfy(is_ident_char))),
        ),
        str::parse::<i64>,
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((
                    value("\\", tag("\\")),
                    value("\"", tag("\"")),
                    value("\n", tag("n")),
                    value("\t", tag("t")),
                    value("\r", tag("r")),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

fn raw_string(input: &str) -> IResult<&str, &str> {
    delimited(char('`'), take_until("`"), char('`'))(input)
}
