use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../config.template.toml");

    let template = r#"# tsdemux configuration template
# Copy this file to 'tsdemux.toml' and adjust the values

# PIDs to demultiplex: all, none, or a list such as 0, 0x100, 1068
pids = "all"

# Add <font color> tags in Teletext subtitles
teletext_colors = false

# Default G0 character set group (0 to 15) of Teletext pages
teletext_charset = 0
"#;

    if !template_path.exists() {
        let _ = fs::write(template_path, template);
    }
    println!("cargo:rerun-if-changed=build.rs");
}
