//! Helpers available to the deployment document template.

use std::sync::LazyLock;

use minijinja::value::{Rest, Value};
use minijinja::{Environment, Error, ErrorKind};
use rand::RngCore;
use rand::rngs::OsRng;
use regex::Regex;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^A-Za-z0-9]+").expect("valid logical id regex"));
static RANGE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-?[^\-]+)").expect("valid range start regex"));
static RANGE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^\\-]-)?(-?[^\\-]+)$").expect("valid range end regex"));

pub fn register(env: &mut Environment<'_>) {
    env.add_function("add", add);
    env.add_function("rand", random_hex);
    env.add_function("resolvessm", resolve_ssm);
    env.add_function("suffix", suffix);
    env.add_function("trimws", trim_spaces);
    env.add_function("logicalid", logical_id);
    env.add_function("titlecase", title_case);
    env.add_function("rangestart", range_start);
    env.add_function("rangeend", range_end);
    env.add_function("contains", contains);
}

fn add(a: i64, b: i64) -> Result<i64, Error> {
    a.checked_add(b).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("add: {a} + {b} overflows"),
        )
    })
}

/// Hex encoding of `len` bytes from the OS RNG.
fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A `{{resolve:ssm:...}}` dynamic reference. CloudFormation fetches the
/// parameter at deploy time, so nothing secret passes through the renderer.
fn resolve_ssm(format: String, args: Rest<Value>) -> Result<String, Error> {
    printf(&format!("{{{{resolve:ssm:{format}}}}}"), &args)
}

/// Small printf: `%s`, `%v`, `%d` and `%%`.
fn printf(format: &str, args: &[Value]) -> Result<String, Error> {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(verb @ ('s' | 'v' | 'd')) => match args.next() {
                Some(arg) => out.push_str(&arg.to_string()),
                None => out.push_str(&format!("%!{verb}(MISSING)")),
            },
            Some(other) => {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!("resolvessm: unsupported verb %{other}"),
                ));
            }
            None => out.push_str("%!(NOVERB)"),
        }
    }
    Ok(out)
}

/// Text after the last `sep`; the whole input when `sep` does not occur.
fn suffix(input: String, sep: String) -> String {
    if sep.is_empty() {
        return input.chars().last().map(String::from).unwrap_or_default();
    }
    input.rsplit(sep.as_str()).next().unwrap_or_default().to_string()
}

/// Removes space characters only; tabs and newlines stay.
fn trim_spaces(input: String) -> String {
    input.replace(' ', "")
}

fn logical_id(parts: Rest<Value>) -> String {
    parts
        .iter()
        .map(|part| NON_ALPHANUMERIC.replace_all(&part.to_string(), "").into_owned())
        .collect()
}

fn title_case(input: String) -> String {
    if input.eq_ignore_ascii_case("allow") {
        "Allow".to_string()
    } else {
        "Deny".to_string()
    }
}

/// First component of `lo-hi`, or the whole value when there is no range.
fn range_start(input: Value) -> String {
    RANGE_START
        .captures(&input.to_string())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Second component of `lo-hi`. Only a single-character lower bound is
/// recognised, so `1000-2000` yields an empty string.
fn range_end(input: Value) -> String {
    RANGE_END
        .captures(&input.to_string())
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn contains(haystack: String, needle: String) -> bool {
    haystack.contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> Rest<Value> {
        Rest(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn add_rejects_overflow() {
        assert_eq!(add(100, 100).expect("sum"), 200);
        let err = add(i64::MAX, 1).expect_err("should overflow");
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn resolve_ssm_formats_reference() {
        assert_eq!(
            resolve_ssm("/%s/db/%s".to_string(), values(&["prod", "password"])).expect("fmt"),
            "{{resolve:ssm:/prod/db/password}}"
        );
        assert_eq!(
            resolve_ssm("/app/key:%d".to_string(), Rest(vec![Value::from(3)])).expect("fmt"),
            "{{resolve:ssm:/app/key:3}}"
        );
    }

    #[test]
    fn printf_marks_missing_arguments() {
        assert_eq!(printf("%s-%s", &[Value::from("a")]).expect("fmt"), "a-%!s(MISSING)");
        assert_eq!(printf("100%%", &[]).expect("fmt"), "100%");
        assert!(printf("%q", &[Value::from("a")]).is_err());
    }

    #[test]
    fn suffix_after_last_separator() {
        assert_eq!(suffix("arn:aws:ecs:r:1:cluster/main".into(), "/".into()), "main");
        assert_eq!(suffix("plain".into(), "/".into()), "plain");
        assert_eq!(suffix("a/b/".into(), "/".into()), "");
    }

    #[test]
    fn trimws_removes_spaces_only() {
        assert_eq!(trim_spaces(" my app\t".into()), "myapp\t");
    }

    #[test]
    fn logical_id_strips_non_alphanumerics() {
        assert_eq!(logical_id(values(&["billing-api", "_v2", "log group"])), "billingapiv2loggroup");
        assert_eq!(logical_id(Rest(vec![Value::from("s"), Value::from(3)])), "s3");
    }

    #[test]
    fn titlecase_is_binary() {
        assert_eq!(title_case("ALLOW".into()), "Allow");
        assert_eq!(title_case("allow".into()), "Allow");
        assert_eq!(title_case("deny".into()), "Deny");
        assert_eq!(title_case("maybe".into()), "Deny");
    }

    #[test]
    fn range_start_cases() {
        assert_eq!(range_start(Value::from("80")), "80");
        assert_eq!(range_start(Value::from(443)), "443");
        assert_eq!(range_start(Value::from("1000-2000")), "1000");
        assert_eq!(range_start(Value::from("-1-5")), "-1");
        assert_eq!(range_start(Value::from("")), "");
    }

    #[test]
    fn range_end_cases() {
        assert_eq!(range_end(Value::from("80")), "80");
        assert_eq!(range_end(Value::from("1-5")), "5");
        assert_eq!(range_end(Value::from("-1")), "-1");
        assert_eq!(range_end(Value::from("1000-2000")), "");
        assert_eq!(range_end(Value::from("1--5")), "-5");
    }

    #[test]
    fn contains_is_substring_test() {
        assert!(contains("FARGATE_SPOT".into(), "FARGATE".into()));
        assert!(!contains("EC2".into(), "FARGATE".into()));
    }

    #[test]
    fn random_hex_has_two_chars_per_byte() {
        let a = random_hex(8);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, random_hex(8));
    }
}
