fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Package name, version and target, logged by `arrayio::init`
    built::write_built_file()
        .expect("Failed to acquire build-time information");
}
