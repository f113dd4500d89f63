//! Unit tests for `AppError` display format and conversions.

use kernel_runner::AppError;

#[test]
fn display_is_prefixed_with_domain() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Protocol("bad".into()), "protocol: bad"),
        (AppError::Io("bad".into()), "io: bad"),
        (AppError::Dataset("bad".into()), "dataset: bad"),
        (AppError::Artifact("bad".into()), "artifact: bad"),
        (AppError::Script("bad".into()), "script: bad"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn io_error_converts_to_io_variant() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
    assert!(matches!(err, AppError::Io(ref msg) if msg == "gone"));
}

#[test]
fn json_error_converts_to_protocol_variant() {
    let err: AppError = serde_json::from_str::<serde_json::Value>("{")
        .expect_err("truncated JSON must fail")
        .into();
    assert!(err.to_string().starts_with("protocol: json:"));
}

#[test]
fn app_error_implements_std_error() {
    let err: Box<dyn std::error::Error> = Box::new(AppError::Dataset("x".into()));
    assert_eq!(err.to_string(), "dataset: x");
}

#[test]
fn lua_error_converts_to_script_variant() {
    let err: AppError = mlua::Error::RuntimeError("nope".into()).into();
    assert!(matches!(err, AppError::Script(ref msg) if msg.contains("nope")));
}
