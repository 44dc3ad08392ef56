fn main() {
    use vergen::{BuildBuilder, Emitter};

    // Emits VERGEN_BUILD_TIMESTAMP for the --version string.
    let mut emitter = Emitter::default();
    if let Ok(build) = BuildBuilder::all_build() {
        let _ = emitter.add_instructions(&build);
    }
    if let Err(e) = emitter.emit() {
        eprintln!("vergen emit skipped: {e}");
    }
}
