fn main() {
    #[cfg(feature = "c-driver")]
    compile_driver();

    println!("cargo:rerun-if-changed=build.rs");
}

#[cfg(feature = "c-driver")]
fn compile_driver() {
    let mut build = cc::Build::new();

    build
        .include("csrc")
        .file("csrc/foreign.c")
        .warnings(true)
        .flag_if_supported("-std=c99")
        .flag_if_supported("-O2");

    build.compile("bytepool_foreign");

    println!("cargo:rerun-if-changed=csrc/bytepool.h");
    println!("cargo:rerun-if-changed=csrc/foreign.c");
}
