use std::env;

/// Host containers selectable through cargo features, paired with the cfg
/// value the library sees.
const CONTEXT_FEATURES: &[(&str, &str)] = &[
    ("CARGO_FEATURE_APP_EXTENSION", "app-extension"),
    ("CARGO_FEATURE_WATCH_EXTENSION", "watch-extension"),
    ("CARGO_FEATURE_TV_EXTENSION", "tv-extension"),
    ("CARGO_FEATURE_MAC_EXTENSION", "mac-extension"),
];

fn main() {
    let enabled: Vec<&str> = CONTEXT_FEATURES
        .iter()
        .filter(|(var, _)| env::var_os(var).is_some())
        .map(|(_, name)| *name)
        .collect();

    // Two entry functions would both be eligible; refuse to build.
    if enabled.len() > 1 {
        panic!(
            "conflicting host contexts enabled: {} (enable at most one host container feature)",
            enabled.join(", ")
        );
    }

    let context = enabled.first().copied().unwrap_or("standalone-app");

    println!(
        "cargo:rustc-check-cfg=cfg(host_context, values(\"standalone-app\", \"app-extension\", \"watch-extension\", \"tv-extension\", \"mac-extension\"))"
    );
    println!("cargo:rustc-cfg=host_context=\"{}\"", context);

    println!("cargo:rerun-if-changed=build.rs");
}
