use std::process::Command;

#[test]
fn matrix_code_binary_type_checks() {
    let status = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["check", "--quiet", "--bin", "matrix-code"])
        .status()
        .expect("could not launch cargo to check the matrix-code glyph engine binary");

    assert!(
        status.success(),
        "the matrix-code binary (run, sequence and inspect subcommands with the ANSI text backend) should type-check"
    );
}
