//! Build script for linking the VideoCore userland libraries.
//!
//! With the `videocore` feature, adds the firmware library directory to the
//! link search path. `VC_LIB_DIR` overrides the default `/opt/vc/lib`.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=VC_LIB_DIR");

    if std::env::var_os("CARGO_FEATURE_VIDEOCORE").is_none() {
        return;
    }

    let lib_dir = std::env::var("VC_LIB_DIR").unwrap_or_else(|_| "/opt/vc/lib".to_string());
    if !std::path::Path::new(&lib_dir).exists() {
        println!(
            "cargo:warning=VideoCore libraries not found at {}. Linking will fail unless they are on the default search path.",
            lib_dir
        );
    }
    println!("cargo:rustc-link-search=native={}", lib_dir);
    println!("cargo:rustc-link-arg=-Wl,-rpath,{}", lib_dir);
}
