use std::{
    env,
    path::PathBuf
};

fn main() {
    println!("cargo:rerun-if-changed=wrapper.h");
    let include_paths = match pkg_config::probe_library("krb5-gssapi") {
        Ok(lib) => lib.include_paths,
        Err(_) => {
            println!("cargo:rustc-link-lib=gssapi_krb5");
            Vec::new()
        }
    };
    let bindings = include_paths
        .iter()
        .fold(bindgen::Builder::default().header("wrapper.h"), |b, path| {
            b.clang_arg(format!("-I{}", path.display()))
        })
        .allowlist_function("gss_.*")
        .allowlist_type("gss_.*")
        .allowlist_type("OM_uint32")
        .allowlist_var("gss_mech_krb5")
        .generate()
        .expect("failed to generate gssapi bindings");
    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings.write_to_file(out_path.join("bindings.rs"))
        .expect("failed to write bindings")
}
