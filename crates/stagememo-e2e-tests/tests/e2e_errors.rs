mod common;

use stagememo_opt::{CacheError, PassError, UnsupportedKind};

#[test]
fn invalid_json_is_rejected() {
    let result = stagememo_parser::parse("this is not JSON @@@ {{{");
    assert!(result.is_err());
}

#[test]
fn buffer_read_in_cached_stage_is_rejected() {
    common::init_logger();
    let source = r#"{
        "name": "pipe",
        "params": [{ "name": "input", "type": "u8", "buffer": { "dimensions": 1 } }],
        "stages": [{
            "name": "blur",
            "args": ["x"],
            "values": [{ "load": { "buffer": "input", "index": { "var": "x" } } }],
            "cached": true
        }]
    }"#;
    let err = common::try_compile_json(source).unwrap_err();
    let PassError::Caching(CacheError::UnsupportedDependencyType { stage, name, kind }) = &err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(stage, "blur");
    assert_eq!(name, "input");
    assert_eq!(*kind, UnsupportedKind::Buffer);

    let message = err.to_string();
    assert!(message.contains("'blur'"));
    assert!(message.contains("buffer parameter 'input'"));
}

#[test]
fn buffer_read_in_uncached_stage_is_fine() {
    let source = r#"{
        "name": "pipe",
        "params": [{ "name": "input", "type": "u8", "buffer": { "dimensions": 1 } }],
        "stages": [{
            "name": "blur",
            "args": ["x"],
            "values": [{ "load": { "buffer": "input", "index": { "var": "x" } } }]
        }]
    }"#;
    assert!(common::try_compile_json(source).is_ok());
}

#[test]
fn bracket_hides_buffer_read_but_not_handle() {
    // A bracketed load is one opaque u8 value.
    let scalar = r#"{
        "name": "pipe",
        "params": [{ "name": "input", "type": "u8", "buffer": { "dimensions": 1 } }],
        "stages": [{
            "name": "blur",
            "args": ["x"],
            "values": [{ "memoize": { "load": { "buffer": "input", "index": { "int": 0 } } } }],
            "cached": true
        }]
    }"#;
    assert!(common::try_compile_json(scalar).is_ok());

    let handle = r#"{
        "name": "pipe",
        "params": [{ "name": "input", "type": "u8", "buffer": { "dimensions": 1 } }],
        "stages": [{
            "name": "blur",
            "type": "u8",
            "values": [{ "memoize": { "param": "input" } }],
            "cached": true
        }]
    }"#;
    let err = common::try_compile_json(handle).unwrap_err();
    assert!(matches!(
        err,
        PassError::Caching(CacheError::UnsupportedDependencyType {
            kind: UnsupportedKind::Handle,
            ..
        })
    ));
}

#[test]
fn undefined_extern_argument_is_rejected() {
    let source = r#"{
        "name": "pipe",
        "stages": [{
            "name": "ext",
            "type": "f32",
            "extern": { "name": "ext_impl", "dimensions": 1, "args": ["undefined"] },
            "cached": true
        }]
    }"#;
    let err = common::try_compile_json(source).unwrap_err();
    assert!(matches!(
        err,
        PassError::Caching(CacheError::UnrecognizedExternArgument { index: 0, .. })
    ));
}

#[test]
fn unknown_stage_call_gives_useful_message() {
    let result = stagememo_parser::parse(
        r#"{ "name": "p", "stages": [{ "name": "f", "values": [{ "call": { "stage": "g" } }] }] }"#,
    );
    let err_msg = format!("{}", result.unwrap_err());
    assert!(err_msg.contains("'g'"));
}
