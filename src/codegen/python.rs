//! Python source emission and validation for the accessor module

use crate::codegen::resources::AttrValue;
use crate::codegen::ResourceBinding;
use crate::error::{DeplumiError, DeplumiResult};
use rustpython_parser::{parse, Mode};
use std::fmt::Write;

const ACCESSOR_PATH: &str = "__res__.py";

const HEADER: &str = "\
# Generated by deplumi. Do not edit.
import boto3
import functools

_resources = {
";

// `_resources` maps name -> (constructor, arguments). Module-level
// `__getattr__` makes `__res__.<name>` build the client on first access.
const FOOTER: &str = "\
}


@functools.lru_cache()
def __getattr__(name):
    if name not in _resources:
        raise AttributeError(f\"{name} is not a defined resource\")
    ctor, args = _resources[name]
    return ctor(*args)
";

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Render a string as a Python string literal
pub fn str_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() && (c as u32) <= 0xff => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Render an attribute value as a Python literal
pub fn value_literal(value: &AttrValue) -> String {
    match value {
        AttrValue::Str(s) => str_literal(s),
        AttrValue::Int(n) => n.to_string(),
        AttrValue::Bool(true) => "True".to_string(),
        AttrValue::Bool(false) => "False".to_string(),
    }
}

/// Render values as a Python tuple literal
pub fn tuple_literal(values: &[AttrValue]) -> String {
    match values {
        [] => "()".to_string(),
        [single] => format!("({},)", value_literal(single)),
        many => format!(
            "({})",
            many.iter().map(value_literal).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Whether `name` can be used as a Python parameter name
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic());
    starts_ok
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && !KEYWORDS.contains(&name)
}

/// `(lambda <attrs>: <expr>)` for one binding
pub fn constructor(binding: &ResourceBinding) -> String {
    format!(
        "(lambda {}: {})",
        binding.kind.attributes().join(", "),
        binding.kind.expression()
    )
}

/// Emit the accessor module for resolved bindings
pub fn render_module(bindings: &[&ResourceBinding]) -> DeplumiResult<String> {
    let mut source = String::from(HEADER);
    for binding in bindings {
        for attr in binding.kind.attributes() {
            if !is_identifier(attr) {
                return Err(DeplumiError::CodeGenInvariantViolation(format!(
                    "attribute '{}' of {} is not a valid parameter name",
                    attr, binding.kind
                )));
            }
        }
        let _ = writeln!(
            source,
            "    {}: ({}, {}),",
            str_literal(&binding.name),
            constructor(binding),
            tuple_literal(&binding.values)
        );
    }
    source.push_str(FOOTER);

    validate(&source)?;
    Ok(source)
}

/// Parse generated source as a Python module.
///
/// Guards against generator bugs: anything the parser rejects is an
/// invariant violation, reported with the parser's location.
pub fn validate(source: &str) -> DeplumiResult<()> {
    parse(source, Mode::Module, ACCESSOR_PATH)
        .map(|_| ())
        .map_err(|e| DeplumiError::CodeGenInvariantViolation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::resources::ResourceKind;

    fn bucket(name: &str, value: &str) -> ResourceBinding {
        ResourceBinding {
            name: name.to_string(),
            kind: ResourceKind::S3Bucket,
            values: vec![AttrValue::from(value)],
        }
    }

    #[test]
    fn str_literal_escapes() {
        assert_eq!(str_literal("my-bucket"), "'my-bucket'");
        assert_eq!(str_literal("it's"), "'it\\'s'");
        assert_eq!(str_literal("a\\b"), "'a\\\\b'");
        assert_eq!(str_literal("x\ny"), "'x\\ny'");
        assert_eq!(str_literal("\u{1}"), "'\\x01'");
        assert_eq!(str_literal("café"), "'café'");
    }

    #[test]
    fn tuple_literals() {
        assert_eq!(tuple_literal(&[]), "()");
        assert_eq!(tuple_literal(&[AttrValue::from("b")]), "('b',)");
        assert_eq!(
            tuple_literal(&[AttrValue::from("b"), AttrValue::Int(3), AttrValue::Bool(true)]),
            "('b', 3, True)"
        );
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("bucket"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("lambda"));
        assert!(!is_identifier("bucket-name"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn renders_record_layout() {
        let b = bucket("bucket", "my-bucket");
        let source = render_module(&[&b]).unwrap();
        assert!(source.contains(
            "    'bucket': ((lambda bucket: boto3.resource('s3').Bucket(bucket)), ('my-bucket',)),\n"
        ));
        assert!(source.contains("raise AttributeError(f\"{name} is not a defined resource\")"));
        assert!(source.contains("@functools.lru_cache()"));
    }

    #[test]
    fn hostile_names_still_validate() {
        let b = bucket("we'ird\n\"name\")", "va'lue\\");
        assert!(render_module(&[&b]).is_ok());
    }

    #[test]
    fn validate_catches_unbalanced_brackets() {
        assert!(validate("x = (1, 2\n").is_err());
        assert!(validate("x = [1, 2)\n").is_err());
        assert!(validate("x = 1)\n").is_err());
        assert!(validate("x = {'a': (1, [2])}\n").is_ok());
    }

    #[test]
    fn validate_catches_unterminated_strings() {
        assert!(validate("x = 'abc\n").is_err());
        assert!(validate("x = \"\"\"abc\n").is_err());
        assert!(validate("x = \"\"\"a\nb\"\"\"\n").is_ok());
        assert!(validate("x = 'a\\'b'\n").is_ok());
        assert!(validate("# it's a comment (\nx = 1\n").is_ok());
    }

    #[test]
    fn validate_rejects_grammar_errors() {
        let lambda_without_colon =
            "_resources = {\n    'a': ((lambda bucket boto3.resource('s3').Bucket(bucket)), ('x',)),\n}\n";
        let err = validate(lambda_without_colon).unwrap_err();
        assert!(matches!(err, DeplumiError::CodeGenInvariantViolation(_)));

        assert!(validate("def __getattr__(name)\n    return 1\n").is_err());
        assert!(validate("x = 1 +\n").is_err());
        assert!(validate("def f():\nreturn 1\n").is_err());
    }

    #[test]
    fn rendered_module_parses() {
        let bindings = [bucket("a", "x"), bucket("b", "y")];
        let refs: Vec<&ResourceBinding> = bindings.iter().collect();
        let source = render_module(&refs).unwrap();
        assert!(validate(&source).is_ok());
        assert!(validate(&source.replace("lambda bucket:", "lambda bucket")).is_err());
    }
}
