// Build script to compile the disc shaders to SPIR-V
//
// The renderer reads the .spv files at startup (paths come from config.toml),
// so a missing glslc only produces a warning here.

use std::path::Path;
use std::process::Command;

const SHADERS: &[(&str, &str)] = &[
    ("shaders/disc.vert", "shaders/disc.vert.spv"),
    ("shaders/disc.frag", "shaders/disc.frag.spv"),
];

fn main() {
    println!("cargo:rerun-if-changed=shaders/disc.vert");
    println!("cargo:rerun-if-changed=shaders/disc.frag");

    for (input, output) in SHADERS {
        compile_shader(input, output);
    }
}

fn compile_shader(input: &str, output: &str) {
    let input_path = Path::new(input);
    let output_path = Path::new(output);

    let result = Command::new("glslc")
        .arg(input_path)
        .arg("-o")
        .arg(output_path)
        .status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            panic!("Failed to compile {}: exit code {:?}", input, status.code());
        }
        Err(e) => {
            println!("cargo:warning=glslc not found ({}), {} not rebuilt", e, output);
            println!("cargo:warning=compile manually: glslc {} -o {}", input, output);
        }
    }
}
