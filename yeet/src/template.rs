//! Self-templating of the assembled configuration.
//!
//! The tree is serialized to YAML, rendered as a template with the tree itself
//! as context, and parsed back. Values can therefore reference other values
//! (`<( name )>-logs`), including values that are themselves templated, so the
//! pass repeats until the YAML stops changing.
//!
//! Delimiters are `<( )>`, `<% %>` and `<# #>` so that `{{ }}` in config
//! values passes through untouched to the document template.

use std::sync::Arc;

use minijinja::syntax::SyntaxConfig;
use minijinja::value::ValueKind;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};
use tracing::{debug, instrument, warn};

use crate::core::fixed_point::{IterationPolicy, Step, iterate};
use crate::core::value::{ConfigTree, parse_tree, to_yaml};
use crate::error::YeetError;
use crate::io::secrets::SecretStore;

const ORIGIN: &str = "templated config";

/// Build the environment used for the pass. Undefined references are errors.
pub fn config_environment(secrets: Arc<dyn SecretStore>) -> Result<Environment<'static>, YeetError> {
    let syntax = SyntaxConfig::builder()
        .block_delimiters("<%", "%>")
        .variable_delimiters("<(", ")>")
        .comment_delimiters("<#", "#>")
        .build()
        .map_err(|err| YeetError::parse(ORIGIN, err))?;

    let mut env = Environment::new();
    env.set_syntax(syntax);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.add_function("json", json);
    env.add_function("join", join);
    env.add_function("ssm", move |name: String| -> Result<String, Error> {
        secrets.get_parameter(&name).map_err(|err| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("unable to get param {name}: {err:#}"),
            )
        })
    });
    Ok(env)
}

fn json(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value).map_err(|err| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("unable to marshal to json: {err}"),
        )
    })
}

/// Join a sequence with `sep`, skipping null entries.
fn join(value: Value, sep: String) -> Result<String, Error> {
    if value.kind() != ValueKind::Seq {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("join expects a sequence, got {}", value.kind()),
        ));
    }
    let parts: Vec<String> = value
        .try_iter()?
        .filter(|item| !item.is_none() && !item.is_undefined())
        .map(|item| item.to_string())
        .collect();
    Ok(parts.join(&sep))
}

/// Render the tree against itself until it reaches a fixed point or the
/// policy's cap. Hitting the cap returns the last tree.
#[instrument(skip_all)]
pub fn template_config(
    tree: ConfigTree,
    env: &Environment<'_>,
    policy: IterationPolicy,
) -> Result<ConfigTree, YeetError> {
    let outcome = iterate(policy, tree, |tree| {
        let before = to_yaml(&tree)?;
        let rendered = env
            .render_str(&before, Value::from_serialize(&tree))
            .map_err(|err| YeetError::parse(ORIGIN, format!("{err:#}")))?;
        let next = parse_tree(&rendered, ORIGIN)?;
        let after = to_yaml(&next)?;
        Ok::<_, YeetError>(if after == before {
            Step::Settled(next)
        } else {
            Step::Changed(next)
        })
    })?;

    if outcome.converged {
        debug!(iterations = outcome.iterations, "config templating settled");
    } else {
        warn!(
            max_iterations = policy.max_iterations,
            "config templating still changing at iteration cap"
        );
    }
    Ok(outcome.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MapSecretStore;

    fn run(yaml: &str, secrets: MapSecretStore) -> Result<ConfigTree, YeetError> {
        let env = config_environment(Arc::new(secrets)).expect("env");
        template_config(
            parse_tree(yaml, "test").expect("parse"),
            &env,
            IterationPolicy::default(),
        )
    }

    fn text(tree: &ConfigTree, key: &str) -> String {
        tree[key].as_str().expect("string").to_string()
    }

    #[test]
    fn references_resolve_through_chains() {
        let out = run(
            "name: billing\nlogs: '<( prefix )>-logs'\nprefix: '<( name )>-prod'\n",
            MapSecretStore::default(),
        )
        .expect("template");
        assert_eq!(text(&out, "logs"), "billing-prod-logs");
        assert_eq!(text(&out, "prefix"), "billing-prod");
    }

    #[test]
    fn output_is_a_fixed_point() {
        let out = run(
            "name: billing\nlogs: '<( name )>-logs'\n",
            MapSecretStore::default(),
        )
        .expect("template");
        let again = run(&to_yaml(&out).expect("yaml"), MapSecretStore::default())
            .expect("template again");
        assert_eq!(out, again);
    }

    #[test]
    fn nested_keys_are_reachable() {
        let out = run(
            "aws:\n  region: eu-west-1\nbucket: 'logs-<( aws.region )>'\n",
            MapSecretStore::default(),
        )
        .expect("template");
        assert_eq!(text(&out, "bucket"), "logs-eu-west-1");
    }

    #[test]
    fn missing_reference_is_a_hard_failure() {
        let err = run("bucket: '<( nope )>'\n", MapSecretStore::default())
            .expect_err("should fail");
        assert!(matches!(err, YeetError::Parse { .. }));
    }

    #[test]
    fn join_skips_nulls() {
        let out = run(
            "subnets: [a, ~, b]\njoined: '<( join(subnets, \",\") )>'\n",
            MapSecretStore::default(),
        )
        .expect("template");
        assert_eq!(text(&out, "joined"), "a,b");
    }

    #[test]
    fn join_rejects_non_sequences() {
        let err = run("x: abc\ny: '<( join(x, \",\") )>'\n", MapSecretStore::default())
            .expect_err("should fail");
        assert!(err.to_string().contains("join expects a sequence"));
    }

    #[test]
    fn json_encodes_structures() {
        let out = run(
            "ports: [80, 443]\nencoded: 'ports=<( json(ports) )>'\n",
            MapSecretStore::default(),
        )
        .expect("template");
        assert_eq!(text(&out, "encoded"), "ports=[80,443]");
    }

    #[test]
    fn ssm_fetches_inline() {
        let out = run(
            "token: '<( ssm(\"/app/token\") )>'\n",
            MapSecretStore::new([("/app/token", "s3cret")]),
        )
        .expect("template");
        assert_eq!(text(&out, "token"), "s3cret");
    }

    #[test]
    fn ssm_missing_fails_render() {
        let err = run("token: '<( ssm(\"/absent\") )>'\n", MapSecretStore::default())
            .expect_err("should fail");
        assert!(err.to_string().contains("unable to get param /absent"));
    }

    #[test]
    fn document_braces_pass_through() {
        let out = run("image: '{{ image }}:latest'\n", MapSecretStore::default())
            .expect("template");
        assert_eq!(text(&out, "image"), "{{ image }}:latest");
    }

    #[test]
    fn growing_reference_stops_at_cap_with_last_tree() {
        let env = config_environment(Arc::new(MapSecretStore::default())).expect("env");
        let out = template_config(
            parse_tree("a: '<( a )>x'\n", "test").expect("parse"),
            &env,
            IterationPolicy { max_iterations: 3 },
        )
        .expect("cap is not an error");
        assert_eq!(text(&out, "a"), "<( a )>xxxx");
    }
}
