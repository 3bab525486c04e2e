// src/resolve.rs

//! Configuration resolution.
//!
//! Turns the raw configuration document into an immutable [`Activity`].
//!
//! Defaults cascade top-down in three levels:
//! Activity fields -> each Question -> each Correction. At every level the
//! parent's fields are copied and the child's fields are laid over them
//! ([`merge`]), so the child wins and siblings never see each other's
//! overrides. The source document is only ever borrowed.
//!
//! Document shape (Portuguese keys are part of the file format):
//!
//! ```yaml
//! titulo: Activity 1
//! comando: python3          # inheritable default
//! questoes:
//!   - descricao: Question 1
//!     pontos: 2
//!     func_expect: regex_match
//!     correcoes:
//!       - script: q1.py
//!         msg_erro: Wrong greeting.
//!         args: hello
//!         verificacoes:
//!           - args_expect: hello
//! ```

use serde_json::{Map, Value};
use std::path::Path;

use crate::activity::{Activity, Correction, Question};
use crate::checks::{self, Verification};
use crate::error::ConfigError;

/// One level of configuration fields.
pub type Fields = Map<String, Value>;

/// Keys that shape the tree and are never pushed down as defaults.
const STRUCTURAL: &[&str] = &["titulo", "questoes", "descricao", "correcoes"];

const CHECK_NAME: &str = "func_expect";
const CHECK_ARGUMENT: &str = "args_expect";

/// Lay `child` over a copy of `parent`; values in `child` win.
///
/// Neither input is modified. Merging the same parent again is a no-op:
/// `merge(p, &merge(p, c)) == merge(p, c)`.
pub fn merge(parent: &Fields, child: &Fields) -> Fields {
    let mut merged = parent.clone();
    for (key, value) in child {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Resolve a document, leaving process working directories unset.
pub fn resolve(raw: &Value) -> Result<Activity, ConfigError> {
    resolve_in(raw, None)
}

/// Resolve a document; every correction runs inside `workdir` if given.
pub fn resolve_in(raw: &Value, workdir: Option<&Path>) -> Result<Activity, ConfigError> {
    let at = "document";
    let root = as_map(raw, at)?;

    let title = required_str(root, "titulo", at)?;
    let defaults = inheritable(root);

    let questions = required_list(root, "questoes", at)?
        .iter()
        .enumerate()
        .map(|(i, q)| -> Result<Question, ConfigError> {
            let at = format!("questoes[{i}]");
            let fields = merge(&defaults, as_map(q, &at)?);
            resolve_question(&fields, &at, workdir)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Activity { title, questions })
}

fn resolve_question(
    fields: &Fields,
    at: &str,
    workdir: Option<&Path>,
) -> Result<Question, ConfigError> {
    let description = required_str(fields, "descricao", at)?;
    let points = optional_int(fields, "pontos", at)?;
    let defaults = inheritable(fields);

    let corrections = required_list(fields, "correcoes", at)?
        .iter()
        .enumerate()
        .map(|(i, c)| -> Result<Correction, ConfigError> {
            let at = format!("{at}.correcoes[{i}]");
            let fields = merge(&defaults, as_map(c, &at)?);
            let mut correction = resolve_correction(&fields, &at)?;
            correction.workdir = workdir.map(Path::to_path_buf);
            Ok(correction)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Question {
        description,
        points,
        corrections,
    })
}

fn resolve_correction(fields: &Fields, at: &str) -> Result<Correction, ConfigError> {
    let script = required_str(fields, "script", at)?;
    let command = required_str(fields, "comando", at)?;
    let error_message = required_str(fields, "msg_erro", at)?;
    let stdin = optional_str(fields, "entrada", at)?.unwrap_or_default();
    let args = optional_str(fields, "args", at)?.unwrap_or_default();
    let verifications = resolve_verifications(fields, at)?;

    Ok(Correction::new(
        command,
        script,
        args,
        stdin,
        error_message,
        verifications,
    ))
}

/// `verificacoes` (required, possibly inherited) followed by
/// `mais_verificacoes`, with missing names/arguments back-filled from the
/// correction-level `func_expect` / `args_expect`.
fn resolve_verifications(fields: &Fields, at: &str) -> Result<Vec<Verification>, ConfigError> {
    let base = required_list(fields, "verificacoes", at)?;
    let extra = match fields.get("mais_verificacoes") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(list)) => list.as_slice(),
        Some(_) => {
            return Err(ConfigError::Malformed {
                at: format!("{at}.mais_verificacoes"),
                expected: "a list",
            })
        }
    };

    // Empty defaults are ignored, like absent ones.
    let default_name = optional_str(fields, CHECK_NAME, at)?.filter(|s| !s.is_empty());
    let default_argument = optional_str(fields, CHECK_ARGUMENT, at)?.filter(|s| !s.is_empty());

    let entries = base
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("{at}.verificacoes[{i}]"), v))
        .chain(
            extra
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("{at}.mais_verificacoes[{i}]"), v)),
        );

    entries
        .map(|(at, entry)| -> Result<Verification, ConfigError> {
            let entry = as_map(entry, &at)?;

            let name = optional_str(entry, CHECK_NAME, &at)?
                .or_else(|| default_name.clone())
                .ok_or_else(|| missing(CHECK_NAME, &at))?;
            let argument = optional_str(entry, CHECK_ARGUMENT, &at)?
                .or_else(|| default_argument.clone())
                .ok_or_else(|| missing(CHECK_ARGUMENT, &at))?;

            let check = checks::lookup(&name).ok_or_else(|| ConfigError::UnknownCheck {
                name: name.clone(),
                at: at.clone(),
                known: checks::known_checks(),
            })?;
            Verification::new(check, argument.clone()).map_err(|e| {
                ConfigError::InvalidPattern {
                    pattern: argument,
                    at,
                    message: e.to_string(),
                }
            })
        })
        .collect()
}

/* ---------------- field access ---------------- */

fn inheritable(fields: &Fields) -> Fields {
    fields
        .iter()
        .filter(|(k, _)| !STRUCTURAL.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn missing(field: &str, at: &str) -> ConfigError {
    ConfigError::MissingField {
        field: field.to_string(),
        at: at.to_string(),
    }
}

fn as_map<'a>(value: &'a Value, at: &str) -> Result<&'a Fields, ConfigError> {
    value.as_object().ok_or_else(|| ConfigError::Malformed {
        at: at.to_string(),
        expected: "a map",
    })
}

fn required_list<'a>(fields: &'a Fields, key: &str, at: &str) -> Result<&'a [Value], ConfigError> {
    match fields.get(key) {
        None | Some(Value::Null) => Err(missing(key, at)),
        Some(Value::Array(list)) => Ok(list),
        Some(_) => Err(ConfigError::Malformed {
            at: format!("{at}.{key}"),
            expected: "a list",
        }),
    }
}

/// Strings, plus numbers and booleans in their textual form (YAML writes
/// `args: 42` unquoted). `null` counts as absent.
fn optional_str(fields: &Fields, key: &str, at: &str) -> Result<Option<String>, ConfigError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(ConfigError::Malformed {
            at: format!("{at}.{key}"),
            expected: "a string",
        }),
    }
}

fn required_str(fields: &Fields, key: &str, at: &str) -> Result<String, ConfigError> {
    optional_str(fields, key, at)?.ok_or_else(|| missing(key, at))
}

fn optional_int(fields: &Fields, key: &str, at: &str) -> Result<Option<i64>, ConfigError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| ConfigError::Malformed {
            at: format!("{at}.{key}"),
            expected: "an integer",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().expect("object")
    }

    fn sample() -> Value {
        json!({
            "titulo": "Atividade 1",
            "comando": "python3",
            "msg_erro": "Mensagem de erro padrão.",
            "pontos": 1,
            "questoes": [
                {
                    "descricao": "Questão 1",
                    "pontos": 0,
                    "script": "q1.py",
                    "func_expect": "regex_match",
                    "verificacoes": [{ "args_expect": "hello" }],
                    "correcoes": [
                        { "entrada": "hello\n", "args": "hello" },
                        { "args": "world", "args_expect": "world",
                          "verificacoes": [{}] },
                        { "args": "x", "msg_erro": "Outra mensagem.",
                          "mais_verificacoes": [
                              { "func_expect": "not_regex_match", "args_expect": "y" }
                          ] }
                    ]
                },
                {
                    "descricao": "Questão 2",
                    "script": "q2.py",
                    "comando": "sh",
                    "verificacoes": [],
                    "correcoes": [{ "script": "own.sh" }]
                }
            ]
        })
    }

    #[test]
    fn merge_child_wins_and_parent_is_untouched() {
        let parent = fields(json!({ "a": 1, "b": 2 }));
        let child = fields(json!({ "b": 3, "c": 4 }));
        let before = parent.clone();

        let merged = merge(&parent, &child);

        assert_eq!(merged, fields(json!({ "a": 1, "b": 3, "c": 4 })));
        assert_eq!(parent, before);
    }

    #[test]
    fn merge_is_idempotent() {
        let parent = fields(json!({ "a": 1, "b": [1, 2] }));
        let child = fields(json!({ "b": [3] }));

        let once = merge(&parent, &child);
        let twice = merge(&parent, &once);

        assert_eq!(once, twice);
    }

    #[test]
    fn resolves_activity_tree() {
        let a = resolve(&sample()).unwrap();

        assert_eq!(a.title, "Atividade 1");
        assert_eq!(a.questions.len(), 2);

        let q1 = &a.questions[0];
        assert_eq!(q1.description, "Questão 1");
        assert_eq!(q1.points, Some(0));
        assert_eq!(q1.corrections.len(), 3);

        let c = &q1.corrections[0];
        assert_eq!(c.command, "python3");
        assert_eq!(c.script, "q1.py");
        assert_eq!(c.stdin, "hello\n");
        assert_eq!(c.args, "hello");
        assert_eq!(c.error_message, "Mensagem de erro padrão.");
        assert_eq!(c.verifications.len(), 1);
        assert_eq!(c.verifications[0].check.name(), "regex_match");
        assert_eq!(c.verifications[0].argument, "hello");
    }

    #[test]
    fn points_inherit_from_activity() {
        let a = resolve(&sample()).unwrap();
        assert_eq!(a.questions[1].points, Some(1));
    }

    #[test]
    fn correction_values_override_question_and_activity() {
        let a = resolve(&sample()).unwrap();
        let q2 = &a.questions[1];
        assert_eq!(q2.corrections[0].command, "sh");
        assert_eq!(q2.corrections[0].script, "own.sh");
        assert!(q2.corrections[0].verifications.is_empty());

        let c3 = &a.questions[0].corrections[2];
        assert_eq!(c3.error_message, "Outra mensagem.");
    }

    #[test]
    fn own_list_replaces_inherited_and_backfills_from_correction_level() {
        let a = resolve(&sample()).unwrap();
        let c2 = &a.questions[0].corrections[1];
        assert_eq!(c2.verifications.len(), 1);
        assert_eq!(c2.verifications[0].check.name(), "regex_match");
        assert_eq!(c2.verifications[0].argument, "world");
    }

    #[test]
    fn extra_checks_append_without_leaking_to_siblings() {
        let a = resolve(&sample()).unwrap();
        let q1 = &a.questions[0];

        let c3 = &q1.corrections[2];
        assert_eq!(c3.verifications.len(), 2);
        assert_eq!(c3.verifications[0].argument, "hello");
        assert_eq!(c3.verifications[1].check.name(), "not_regex_match");
        assert_eq!(c3.verifications[1].argument, "y");

        assert_eq!(q1.corrections[0].verifications.len(), 1);
    }

    #[test]
    fn entry_values_are_never_overwritten() {
        let doc = json!({
            "titulo": "t",
            "questoes": [{
                "descricao": "d",
                "correcoes": [{
                    "script": "s", "comando": "c", "msg_erro": "m",
                    "func_expect": "regex_match", "args_expect": "default",
                    "verificacoes": [
                        { "func_expect": "not_regex_match", "args_expect": "own" },
                        { "args_expect": "" }
                    ]
                }]
            }]
        });
        let a = resolve(&doc).unwrap();
        let v = &a.questions[0].corrections[0].verifications;
        assert_eq!(v[0].check.name(), "not_regex_match");
        assert_eq!(v[0].argument, "own");
        assert_eq!(v[1].check.name(), "regex_match");
        assert_eq!(v[1].argument, "");
    }

    #[test]
    fn resolution_does_not_mutate_the_document() {
        let doc = sample();
        let before = doc.clone();
        resolve(&doc).unwrap();
        resolve(&doc).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let a = resolve(&sample()).unwrap();
        let c = &a.questions[1].corrections[0];
        assert_eq!(c.stdin, "");
        assert_eq!(c.args, "");
    }

    #[test]
    fn scalar_args_are_taken_as_text() {
        let doc = json!({
            "titulo": "t",
            "questoes": [{ "descricao": "d", "correcoes": [{
                "script": "s", "comando": "c", "msg_erro": "m",
                "args": 42, "verificacoes": []
            }]}]
        });
        let a = resolve(&doc).unwrap();
        assert_eq!(a.questions[0].corrections[0].args, "42");
    }

    #[test]
    fn missing_title_is_reported() {
        let err = resolve(&json!({ "questoes": [] })).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field, .. } if field == "titulo"));
    }

    #[test]
    fn missing_verification_list_is_reported_with_location() {
        let doc = json!({
            "titulo": "t",
            "questoes": [{ "descricao": "d", "correcoes": [
                { "script": "s", "comando": "c", "msg_erro": "m" }
            ]}]
        });
        match resolve(&doc).unwrap_err() {
            ConfigError::MissingField { field, at } => {
                assert_eq!(field, "verificacoes");
                assert_eq!(at, "questoes[0].correcoes[0]");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_check_name_without_default_is_reported() {
        let doc = json!({
            "titulo": "t",
            "questoes": [{ "descricao": "d", "correcoes": [{
                "script": "s", "comando": "c", "msg_erro": "m",
                "verificacoes": [{ "args_expect": "x" }]
            }]}]
        });
        assert!(matches!(
            resolve(&doc).unwrap_err(),
            ConfigError::MissingField { ref field, .. } if field == "func_expect"
        ));
    }

    #[test]
    fn unknown_check_is_rejected_at_resolution() {
        let doc = json!({
            "titulo": "t",
            "questoes": [{ "descricao": "d", "correcoes": [{
                "script": "s", "comando": "c", "msg_erro": "m",
                "verificacoes": [{ "func_expect": "__import__('os')", "args_expect": "x" }]
            }]}]
        });
        assert!(matches!(
            resolve(&doc).unwrap_err(),
            ConfigError::UnknownCheck { ref name, .. } if name == "__import__('os')"
        ));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_resolution() {
        let doc = json!({
            "titulo": "t",
            "questoes": [{ "descricao": "d", "correcoes": [{
                "script": "s", "comando": "c", "msg_erro": "m",
                "verificacoes": [{ "func_expect": "regex_match", "args_expect": "(" }]
            }]}]
        });
        assert!(matches!(
            resolve(&doc).unwrap_err(),
            ConfigError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn lookaround_pattern_names_the_unsupported_syntax() {
        let doc = json!({
            "titulo": "t",
            "questoes": [{ "descricao": "d", "correcoes": [{
                "script": "s", "comando": "c", "msg_erro": "m",
                "verificacoes": [{ "func_expect": "not_regex_match", "args_expect": "a(?!b)" }]
            }]}]
        });
        let err = resolve(&doc).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
        assert!(err.to_string().contains("look-around"), "{err}");
    }

    #[test]
    fn wrong_shapes_are_malformed() {
        let err = resolve(&json!({ "titulo": "t", "questoes": {} })).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { expected: "a list", .. }));

        let err = resolve(&json!({ "titulo": "t", "questoes": ["q"] })).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { expected: "a map", .. }));

        let err = resolve(&json!({ "titulo": "t", "questoes": [
            { "descricao": "d", "pontos": "three", "correcoes": [] }
        ]}))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { expected: "an integer", .. }));

        let err = resolve(&json!(["not", "a", "map"])).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn workdir_is_applied_to_every_correction() {
        let a = resolve_in(&sample(), Some(Path::new("/tmp/activity"))).unwrap();
        assert!(a
            .questions
            .iter()
            .flat_map(|q| &q.corrections)
            .all(|c| c.workdir.as_deref() == Some(Path::new("/tmp/activity"))));
    }
}
