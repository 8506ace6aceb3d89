//! Script-level behavior: compile a source text, run it against a record,
//! check the emitted payloads and record mutations.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::{json, Value as Json};

use gx_lang::{compile, FeatureCell, RuntimeError, ScriptError, Vm};
use gx_model::Feature;

fn record(raw: Json) -> FeatureCell {
    let feature: Feature = serde_json::from_value(raw).expect("bad test fixture");
    Rc::new(RefCell::new(feature))
}

fn run(source: &str, input: &FeatureCell) -> Result<Vec<Json>, RuntimeError> {
    let program = Arc::new(compile(source).expect("compile failed"));
    let mut vm = Vm::new(program);
    let mut out = Vec::new();
    vm.run(input, &mut out)?;
    Ok(out)
}

#[test]
fn passthrough() {
    let input_json = json!({
        "id": "a",
        "type": "Feature",
        "properties": {"k": "v"},
        "geometry": null,
    });
    let input = record(input_json.clone());
    let out = run("emit @", &input).unwrap();
    assert_eq!(out, vec![input_json]);
}

#[test]
fn local_binding_and_arithmetic() {
    let input = record(json!({"type": "Feature"}));
    let out = run("x = 2\ny = 3.5\nemit x * y + 1", &input).unwrap();
    assert_eq!(out, vec![json!(8.0)]);
}

#[test]
fn conditional_emit_with_short_circuit() {
    let source = r#"
if (@type == "Feature" && @properties.kind == "park") {
  emit @
}
"#;
    let matching = record(json!({"type": "Feature", "properties": {"kind": "park"}}));
    let out = run(source, &matching).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["properties"]["kind"], json!("park"));

    // The right operand must be skipped entirely: no emission, no fault.
    let other = record(json!({"type": "Point", "properties": {}}));
    let out = run(source, &other).unwrap();
    assert!(out.is_empty());
}

#[test]
fn mutation_writes_through_to_the_record() {
    let input = record(json!({"type": "Feature", "properties": {"a": "1"}}));
    let out = run("@type = \"Point\"  emit @", &input).unwrap();
    assert_eq!(out[0]["type"], json!("Point"));
    // The caller's record changed in place, not a copy.
    assert_eq!(input.borrow().kind, "Point");
}

#[test]
fn builtin_dispatch_chain() {
    let input = record(json!({"type": "Feature", "properties": {"name": "MiXeD"}}));
    let out = run("emit upper(lower(@properties.name))", &input).unwrap();
    assert_eq!(out, vec![json!("MIXED")]);
}

#[test]
fn parse_error_reports_rule_and_location() {
    let err = compile("if (x) { emit }").unwrap_err();
    let ScriptError::Parse(parse) = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(parse.rule, "emit");
    assert_eq!(parse.line, 1);
    assert_eq!(parse.column, 15);
}

#[test]
fn or_short_circuits_too() {
    // With a Point record the left operand is true; evaluating the right
    // operand would dereference a missing properties key and compare it
    // against an int, which faults. `||` must skip it.
    let source = r#"
if (@type == "Point" || @properties.level < 3) {
  emit 1
}
"#;
    let input = record(json!({"type": "Point", "properties": {}}));
    let out = run(source, &input).unwrap();
    assert_eq!(out, vec![json!(1)]);
}

#[test]
fn boolean_chains_converge_on_bool() {
    let input = record(json!({"type": "Feature"}));
    let out = run("emit true && true\nemit true && false\nemit false || false", &input).unwrap();
    assert_eq!(out, vec![json!(true), json!(false), json!(false)]);
}

#[test]
fn else_branch_runs_when_condition_fails() {
    let source = r#"
if (@type == "Feature") {
  emit "yes"
} else {
  emit "no"
}
emit "after"
"#;
    let feature = record(json!({"type": "Feature"}));
    assert_eq!(run(source, &feature).unwrap(), vec![json!("yes"), json!("after")]);

    let point = record(json!({"type": "Point"}));
    assert_eq!(run(source, &point).unwrap(), vec![json!("no"), json!("after")]);
}

#[test]
fn nested_conditionals() {
    let source = r#"
if (@type == "Feature") {
  if (@properties.kind == "park") {
    emit "park"
  } else {
    emit "other"
  }
}
"#;
    let park = record(json!({"type": "Feature", "properties": {"kind": "park"}}));
    assert_eq!(run(source, &park).unwrap(), vec![json!("park")]);

    let road = record(json!({"type": "Feature", "properties": {"kind": "road"}}));
    assert_eq!(run(source, &road).unwrap(), vec![json!("other")]);
}

#[test]
fn locals_survive_reassignment() {
    let input = record(json!({"type": "Feature"}));
    let out = run("x = 1\ny = 10\nx = x + y\nemit x\nemit y", &input).unwrap();
    assert_eq!(out, vec![json!(11), json!(10)]);
}

#[test]
fn property_mutation_round_trip() {
    let input = record(json!({
        "type": "Feature",
        "properties": {"height_m": "30"},
    }));
    let source = r#"
height = float(@properties.height_m)
@properties.height_ft = str(round(m2ft(height)))
emit @
"#;
    let out = run(source, &input).unwrap();
    assert_eq!(out[0]["properties"]["height_ft"], json!("98"));
    assert_eq!(input.borrow().properties["height_ft"], "98");
}

#[test]
fn new_props_and_delete() {
    let input = record(json!({"type": "Feature", "properties": {"a": "1", "b": "2"}}));
    let out = run("emit delete(@properties, \"a\")\nemit @", &input).unwrap();
    assert_eq!(out[0], json!("1"));
    assert_eq!(out[1]["properties"], json!({"b": "2"}));
}

#[test]
fn comments_are_ignored() {
    let input = record(json!({"type": "Feature"}));
    let source = "// header\nemit 1 // trailing\n// footer\n";
    assert_eq!(run(source, &input).unwrap(), vec![json!(1)]);
}

#[test]
fn runtime_fault_carries_no_partial_emissions_after_it() {
    let input = record(json!({"type": "Feature"}));
    let program = Arc::new(compile("emit 1\nemit 1 / 0\nemit 2").unwrap());
    let mut vm = Vm::new(program);
    let mut out = Vec::new();
    let err = vm.run(&input, &mut out).unwrap_err();
    assert_eq!(err, RuntimeError::DivisionByZero);
    // Emissions before the fault were already delivered; nothing after.
    assert_eq!(out, vec![json!(1)]);
}

#[test]
fn vm_reuse_across_many_records() {
    let program = Arc::new(
        compile("if (@properties.keep == \"yes\") { emit @properties.name }").unwrap(),
    );
    let mut vm = Vm::new(program);
    let mut out = Vec::new();
    for (name, keep) in [("a", "yes"), ("b", "no"), ("c", "yes")] {
        let input = record(json!({
            "type": "Feature",
            "properties": {"name": name, "keep": keep},
        }));
        vm.run(&input, &mut out).unwrap();
    }
    assert_eq!(out, vec![json!("a"), json!("c")]);
}

#[test]
fn geometry_builtins_reach_the_payload() {
    let input = record(json!({
        "type": "Feature",
        "properties": {},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
        },
    }));
    let out = run("emit bbox(@geometry)\nemit centroid(@geometry)", &input).unwrap();
    assert_eq!(out[0], json!([0.0, 0.0, 1.0, 1.0]));
    assert_eq!(out[1], json!({"type": "Point", "coordinates": [0.5, 0.5]}));
}

#[test]
fn no_matching_overload_names_the_signature() {
    let input = record(json!({"type": "Feature"}));
    let err = run("emit lower(1)", &input).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::NoMatchingCall {
            signature: "lower(int)".into()
        }
    );
}

#[test]
fn cast_failures_surface_as_runtime_errors() {
    let input = record(json!({"type": "Feature", "properties": {"n": "12a"}}));
    let err = run("emit int(@properties.n)", &input).unwrap_err();
    assert!(matches!(err, RuntimeError::ParseFailure { kind: "int", .. }));
}

#[test]
fn float_division_by_zero_emits_infinity_without_fault() {
    let input = record(json!({"type": "Feature"}));
    // IEEE infinity has no JSON representation; serde maps it to null,
    // which is the host convention for non-finite payloads.
    let out = run("emit 1.0 / 0.0", &input).unwrap();
    assert_eq!(out, vec![json!(null)]);
}
