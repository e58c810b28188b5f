//! Integration test: build a two-stage blur pipeline programmatically and
//! verify the text dump output.

use stagememo_ir::*;

/// Builds:
///
/// ```text
/// param radius: i32
/// param input: buffer<u8, 1>
/// stage kernel(x) = radius * radius
/// stage blur(x)   = input[x] + kernel(x)      (cached)
/// ```
fn build_blur_module() -> Module {
    let mut module = Module::default();

    let radius = module.add_parameter(Parameter::scalar("radius", Scalar::I32));
    let input = module.add_parameter(Parameter::buffer("input", Scalar::U8, 1));

    // ---- kernel ----
    let r = module.param_ref(radius);
    let square = module.append(Expression::Binary {
        op: BinaryOp::Multiply,
        left: r,
        right: r,
    });
    let mut kernel = Function::new("kernel");
    kernel.args = vec!["x".into()];
    kernel.values = vec![square];
    let kernel = module.add_function(kernel);

    // ---- blur ----
    let x = module.append(Expression::Variable {
        name: "x".into(),
        ty: Scalar::I32,
        param: None,
    });
    let load = module.append(Expression::Load {
        ty: Scalar::U8,
        buffer: "input".into(),
        index: x,
        param: Some(input),
    });
    let widened = module.append(Expression::Cast {
        ty: Scalar::I32,
        expr: load,
    });
    let call = module.append(Expression::Call {
        ty: Scalar::I32,
        kind: CallKind::Stage(kernel),
        args: vec![x],
        param: None,
    });
    let sum = module.append(Expression::Binary {
        op: BinaryOp::Add,
        left: widened,
        right: call,
    });
    let mut blur = Function::new("blur");
    blur.args = vec!["x".into()];
    blur.values = vec![sum];
    blur.schedule.cached = true;
    module.add_function(blur);

    let zero = module.literal(Literal::I32(0));
    module.body = Statement::Stage {
        name: "kernel".into(),
        produce: Some(Box::new(Statement::Store {
            buffer: "kernel".into(),
            index: zero,
            value: square,
        })),
        update: None,
        consume: Some(Box::new(Statement::Stage {
            name: "blur".into(),
            produce: Some(Box::new(Statement::Store {
                buffer: "blur".into(),
                index: zero,
                value: sum,
            })),
            update: None,
            consume: None,
        })),
    };

    module
}

#[test]
fn build_blur_pipeline() {
    let module = build_blur_module();

    assert_eq!(module.parameters.len(), 2);
    assert_eq!(module.functions.len(), 2);
    // `r` is shared by both operands of the square.
    let kernel = module.function_by_name("kernel").expect("kernel defined");
    let square = module.functions[kernel].values[0];
    let operands = module.expressions[square].operands();
    assert_eq!(operands[0], operands[1]);

    let env = module.environment();
    let blur = env["blur"];
    assert!(module.functions[blur].schedule.cached);
    assert_eq!(module.expr_type(module.functions[blur].values[0]), Scalar::I32);
}

#[test]
fn dump_blur_pipeline() {
    let module = build_blur_module();
    let dump = dump_module(&module);

    assert!(dump.contains("[0] radius: i32"));
    assert!(dump.contains("[1] input: buffer<u8, 1>"));
    assert!(dump.contains("Load<u8>(input[[2]], param [1])"));
    assert!(dump.contains("Call<i32>(stage kernel([2]))"));
    assert!(dump.contains("stage blur(x) [[1]] cached {"));
    assert!(dump.contains("Stage kernel {"));
    assert!(dump.contains("Stage blur {"));

    // Dumping is deterministic.
    assert_eq!(dump, dump_module(&build_blur_module()));
}
