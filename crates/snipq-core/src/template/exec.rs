use super::ast::{Command, Node, Operand, Pipeline};
use super::functions;
use super::RenderContext;
use crate::error::{Result, SnipqError};
use crate::value::{Params, Value};

/// Walks a parsed template, writing output into a buffer.
pub struct Executor<'a> {
    data: &'a Params,
    ctx: &'a RenderContext,
}

impl<'a> Executor<'a> {
    pub fn new(data: &'a Params, ctx: &'a RenderContext) -> Self {
        Self { data, ctx }
    }

    pub fn run(&self, nodes: &[Node], out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(pipeline) => {
                    let value = self.eval_pipeline(pipeline)?;
                    out.push_str(&value.to_string());
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = false;
                    for (cond, body) in branches {
                        if self.eval_pipeline(cond)?.is_truthy() {
                            self.run(body, out)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.run(otherwise, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn eval_pipeline(&self, pipeline: &Pipeline) -> Result<Value> {
        let mut piped: Option<Value> = None;
        for command in &pipeline.commands {
            piped = Some(self.eval_command(command, piped.take())?);
        }
        // the parser never yields an empty pipeline
        piped.ok_or_else(|| SnipqError::TemplateExec("empty pipeline".to_string()))
    }

    fn eval_command(&self, command: &Command, piped: Option<Value>) -> Result<Value> {
        let (head, rest) = match command.operands.split_first() {
            Some(split) => split,
            None => return Err(SnipqError::TemplateExec("empty command".to_string())),
        };

        if let Operand::Ident(name) = head {
            let mut args = Vec::with_capacity(rest.len() + 1);
            for operand in rest {
                args.push(self.eval_operand(operand)?);
            }
            args.extend(piped);
            return self.call(name, &args);
        }

        if !rest.is_empty() || piped.is_some() {
            return Err(SnipqError::TemplateExec(format!(
                "can't give argument to non-function {}",
                head
            )));
        }
        self.eval_operand(head)
    }

    fn eval_operand(&self, operand: &Operand) -> Result<Value> {
        match operand {
            // a missing key renders as empty and is falsy
            Operand::Field(key) => Ok(self
                .data
                .get(key)
                .cloned()
                .unwrap_or_else(|| Value::Str(String::new()))),
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Ident(name) => self.call(name, &[]),
            Operand::Sub(pipeline) => self.eval_pipeline(pipeline),
        }
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match functions::lookup(name) {
            Some(func) => func(args, self.ctx),
            None => Err(SnipqError::TemplateExec(format!(
                "function \"{}\" not defined",
                name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse::parse_template;

    fn exec(src: &str, data: &Params) -> Result<String> {
        let nodes = parse_template(src)?;
        let ctx = RenderContext::default();
        let mut out = String::new();
        Executor::new(data, &ctx).run(&nodes, &mut out)?;
        Ok(out)
    }

    fn data(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_pipeline_appends_last_argument() {
        let params = data(&[("name", Value::from("  alice "))]);
        assert_eq!(exec("{{ .name | trim | title }}", &params).unwrap(), "Alice");
        assert_eq!(
            exec(r#"{{ "vi" | eq .lang }}"#, &data(&[("lang", Value::from("vi"))])).unwrap(),
            "true"
        );
    }

    #[test]
    fn test_subexpression() {
        let params = data(&[("x", Value::from(" hey "))]);
        assert_eq!(exec("{{ upper (trim .x) }}!", &params).unwrap(), "HEY!");
    }

    #[test]
    fn test_missing_key_is_empty_and_falsy() {
        assert_eq!(
            exec("[{{ .nope }}]{{ if .nope }}yes{{ else }}no{{ end }}", &Params::new()).unwrap(),
            "[]no"
        );
    }

    #[test]
    fn test_else_if_chain() {
        let src = r#"{{ if eq .lang "vi" }}Xin chào{{ else if eq .lang "fr" }}Bonjour{{ else }}Hello{{ end }}"#;
        assert_eq!(exec(src, &data(&[("lang", Value::from("fr"))])).unwrap(), "Bonjour");
        assert_eq!(exec(src, &data(&[("lang", Value::from("de"))])).unwrap(), "Hello");
    }

    #[test]
    fn test_bool_param_drives_condition() {
        let src = "{{ if .upper }}LOUD{{ end }}quiet";
        assert_eq!(exec(src, &data(&[("upper", Value::Bool(true))])).unwrap(), "LOUDquiet");
        assert_eq!(exec(src, &data(&[("upper", Value::Bool(false))])).unwrap(), "quiet");
    }

    #[test]
    fn test_unknown_function() {
        let err = exec("{{ shout .x }}", &Params::new()).unwrap_err();
        assert!(err.to_string().contains("\"shout\" not defined"));
    }

    #[test]
    fn test_argument_to_non_function() {
        let err = exec("{{ .name \"x\" }}", &Params::new()).unwrap_err();
        assert!(matches!(err, SnipqError::TemplateExec(_)));

        let err = exec("{{ \"x\" | .name }}", &Params::new()).unwrap_err();
        assert!(matches!(err, SnipqError::TemplateExec(_)));
    }

    #[test]
    fn test_niladic_function_as_argument() {
        assert_eq!(exec("[{{ upper clipboard }}]", &Params::new()).unwrap(), "[]");
    }

    #[test]
    fn test_int_and_time_values_render() {
        let params = data(&[("timestamp", Value::Int(1700000000))]);
        assert_eq!(exec("{{ .timestamp }}", &params).unwrap(), "1700000000");
    }
}
