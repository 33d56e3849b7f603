use super::layout::format_time;
use super::RenderContext;
use crate::config::MAX_COUNTER_PAD;
use crate::error::{Result, SnipqError};
use crate::models::format_counter;
use crate::value::Value;
use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use rand::rngs::OsRng;
use rand::Rng;
use std::cmp::Ordering;
use tracing::debug;
use uuid::Uuid;

pub type Builtin = fn(&[Value], &RenderContext) -> Result<Value>;

pub const COUNTER_FUNC: &str = "counter";

const RANDOM_WORDS: &[&str] = &["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];

static BUILTINS: &[(&str, Builtin)] = &[
    ("date", date),
    ("uuid", uuid_func),
    (COUNTER_FUNC, counter),
    ("clipboard", clipboard),
    ("random", random),
    ("upper", upper),
    ("lower", lower),
    ("title", title),
    ("trim", trim),
    ("eq", eq),
    ("ne", ne),
    ("lt", lt),
    ("le", le),
    ("gt", gt),
    ("ge", ge),
    ("and", and),
    ("or", or),
    ("not", not),
];

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, func)| *func)
}

fn exec_error(name: &str, message: impl std::fmt::Display) -> SnipqError {
    SnipqError::TemplateExec(format!("{}: {}", name, message))
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(exec_error(
            name,
            format!("wrong number of args: want {} got {}", count, args.len()),
        ));
    }
    Ok(())
}

fn expect_int(name: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(exec_error(
            name,
            format!("expected int, got {} {:?}", other.type_name(), other.to_string()),
        )),
    }
}

/// `date format tz`
fn date(args: &[Value], ctx: &RenderContext) -> Result<Value> {
    expect_args("date", args, 2)?;
    let format = args[0].to_string();
    let now = ctx.now.unwrap_or_else(Local::now);
    let time = in_timezone(now, &args[1].to_string());
    format_time(&time, &format).map(Value::Str)
}

/// Resolve `tz` to an offset: `Local`, `UTC`, a fixed offset like `+07:00`
/// or an IANA zone name. Unknown names fall back to local time.
fn in_timezone(now: DateTime<Local>, tz: &str) -> DateTime<FixedOffset> {
    match tz {
        "" | "Local" => now.fixed_offset(),
        "UTC" => now.with_timezone(&Utc).fixed_offset(),
        other => {
            if let Ok(offset) = other.parse::<FixedOffset>() {
                return now.with_timezone(&offset);
            }
            match other.parse::<Tz>() {
                Ok(zone) => now.with_timezone(&zone).fixed_offset(),
                Err(_) => {
                    debug!("Unknown timezone {:?}, using local time", other);
                    now.fixed_offset()
                }
            }
        }
    }
}

/// `uuid withHyphens`
fn uuid_func(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    expect_args("uuid", args, 1)?;
    let with_hyphens = match &args[0] {
        Value::Bool(b) => *b,
        other => {
            return Err(exec_error(
                "uuid",
                format!("expected bool, got {}", other.type_name()),
            ))
        }
    };

    let id = Uuid::new_v4();
    Ok(Value::Str(if with_hyphens {
        id.hyphenated().to_string()
    } else {
        id.simple().to_string()
    }))
}

/// `counter name pad`
///
/// Values come from the engine's counter pass; outside of it every counter
/// reads as 1.
fn counter(args: &[Value], ctx: &RenderContext) -> Result<Value> {
    expect_args(COUNTER_FUNC, args, 2)?;
    let name = args[0].to_string();
    let pad = expect_int(COUNTER_FUNC, &args[1])?;
    if pad > MAX_COUNTER_PAD as i64 {
        return Err(exec_error(
            COUNTER_FUNC,
            format!("pad {} exceeds {} digits", pad, MAX_COUNTER_PAD),
        ));
    }
    let pad = pad.max(0) as usize;
    ctx.mark_counter_read(&name);
    let value = ctx.counters.get(&name).copied().unwrap_or(1);
    Ok(Value::Str(format_counter(value, pad)))
}

fn clipboard(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    expect_args("clipboard", args, 0)?;
    Ok(Value::Str(String::new()))
}

/// `random`, `random "word"` or `random n`
fn random(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    let mut rng = OsRng;
    match args {
        [] => Ok(Value::Str(rng.gen_range(0..=100).to_string())),
        [Value::Str(kind)] if kind == "word" => {
            let word = RANDOM_WORDS[rng.gen_range(0..RANDOM_WORDS.len())];
            Ok(Value::Str(word.to_string()))
        }
        [Value::Int(n)] if *n < 0 => Err(exec_error("random", format!("negative bound {}", n))),
        [Value::Int(n)] => Ok(Value::Str(rng.gen_range(0..=*n).to_string())),
        [_] => Ok(Value::Str("random".to_string())),
        _ => Err(exec_error(
            "random",
            format!("wrong number of args: want at most 1 got {}", args.len()),
        )),
    }
}

fn upper(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    expect_args("upper", args, 1)?;
    Ok(Value::Str(args[0].to_string().to_uppercase()))
}

fn lower(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    expect_args("lower", args, 1)?;
    Ok(Value::Str(args[0].to_string().to_lowercase()))
}

/// Capitalise each whitespace-separated word and lower-case the rest.
fn title(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    expect_args("title", args, 1)?;
    let text = args[0].to_string();
    let words: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();
    Ok(Value::Str(words.join(" ")))
}

fn trim(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    expect_args("trim", args, 1)?;
    Ok(Value::Str(args[0].to_string().trim().to_string()))
}

fn compare(name: &str, args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value> {
    expect_args(name, args, 2)?;
    Ok(Value::Bool(accept(args[0].compare(&args[1]))))
}

fn eq(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    compare("eq", args, Ordering::is_eq)
}

fn ne(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    compare("ne", args, Ordering::is_ne)
}

fn lt(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    compare("lt", args, Ordering::is_lt)
}

fn le(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    compare("le", args, Ordering::is_le)
}

fn gt(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    compare("gt", args, Ordering::is_gt)
}

fn ge(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    compare("ge", args, Ordering::is_ge)
}

/// Returns the first falsy argument, or the last one.
fn and(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    match args.iter().find(|v| !v.is_truthy()).or_else(|| args.last()) {
        Some(value) => Ok(value.clone()),
        None => Err(exec_error("and", "wrong number of args: want at least 1 got 0")),
    }
}

/// Returns the first truthy argument, or the last one.
fn or(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    match args.iter().find(|v| v.is_truthy()).or_else(|| args.last()) {
        Some(value) => Ok(value.clone()),
        None => Err(exec_error("or", "wrong number of args: want at least 1 got 0")),
    }
}

fn not(args: &[Value], _ctx: &RenderContext) -> Result<Value> {
    expect_args("not", args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
}
