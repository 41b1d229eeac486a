//! End-to-end: source in, flattened callable out, executed in the sandbox.

use flatpy_core::features::sandbox::builtins;
use flatpy_core::{FlatpyConfig, FlattenUseCase, Namespace, Value};
use pretty_assertions::assert_eq;

#[test]
fn test_flattened_diff_with_injected_builtin() {
    let source = "\
def diff(a, b):
    return abs(a - b)
";
    let mut usecase = FlattenUseCase::with_defaults().unwrap();
    let callable = usecase.flatten_callable(source, builtins()).unwrap();

    assert_eq!(callable.name, "diff");
    let result = callable
        .call(&[Value::Int(391), Value::Int(1096)])
        .unwrap();
    assert_eq!(result, Value::Int(705));
}

#[test]
fn test_augmented_assignment_matches_original() {
    let source = "\
def bump(x, y):
    x += y
    return x
";
    let mut usecase = FlattenUseCase::with_defaults().unwrap();
    let callable = usecase.flatten_callable(source, Namespace::default()).unwrap();

    let result = callable.call(&[Value::Int(3), Value::Int(4)]).unwrap();
    assert_eq!(result, Value::Int(7));
}

#[test]
fn test_flattened_text_is_three_address() {
    let source = "r = f(g(), h())\n";
    let mut usecase = FlattenUseCase::with_defaults().unwrap();
    let (_, text) = usecase.flatten_source(source).unwrap();

    assert_eq!(
        text,
        "__flat_1 = g()\n__flat_2 = h()\nr = f(__flat_1, __flat_2)\n"
    );
}

#[test]
fn test_chained_assignment_fans_out_through_one_temp() {
    let source = "a = b = f(x)\n";
    let mut usecase = FlattenUseCase::with_defaults().unwrap();
    let (_, text) = usecase.flatten_source(source).unwrap();

    assert_eq!(text, "__flat_1 = f(x)\na = __flat_1\nb = __flat_1\n");
}

#[test]
fn test_chained_assignment_executes_correctly() {
    let source = "\
def pair(x):
    a = b = x + 1
    return a + b
";
    let mut usecase = FlattenUseCase::with_defaults().unwrap();
    let callable = usecase.flatten_callable(source, Namespace::default()).unwrap();

    let result = callable.call(&[Value::Int(10)]).unwrap();
    assert_eq!(result, Value::Int(22));
}

#[test]
fn test_custom_temp_prefix_flows_through() {
    let config = FlatpyConfig {
        temp_prefix: "__v_".to_string(),
        ..FlatpyConfig::default()
    };
    let mut usecase = FlattenUseCase::new(config).unwrap();
    let (_, text) = usecase.flatten_source("r = f(g(x))\n").unwrap();

    assert_eq!(text, "__v_1 = g(x)\nr = f(__v_1)\n");
}

#[test]
fn test_deeply_nested_arithmetic_preserves_value() {
    let source = "\
def mix(a, b, c):
    return (a + b) * (b - c) + abs(c - a * 2)
";
    let mut usecase = FlattenUseCase::with_defaults().unwrap();
    let callable = usecase.flatten_callable(source, builtins()).unwrap();

    // (2 + 3) * (3 - 4) + abs(4 - 4) = -5
    let result = callable
        .call(&[Value::Int(2), Value::Int(3), Value::Int(4)])
        .unwrap();
    assert_eq!(result, Value::Int(-5));
}
