use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use crate::raw::{env_key, merge, RawConfig};
use crate::{Config, RenderConfig};

const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");

fn data(path: &str) -> PathBuf {
    PathBuf::from(DATA_DIR).join(path)
}

fn raw(cwd: &str, home: &str, env: &[(&str, &str)]) -> RawConfig {
    let root = cwd.split('/').next().unwrap();
    let mut cfg = RawConfig::new(data(cwd), data(home)).stop_root_at(data(root));
    cfg.set_env(
        env.iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect::<HashMap<_, _>>(),
    );
    cfg
}

#[test]
fn defaults_without_files() -> Result<()> {
    let mut empty = RawConfig::new(data("home"), data("missing_home")).stop_root_at(data("home"));
    empty.set_env(HashMap::new());
    assert!(empty.files().is_empty());
    let config = empty.resolve()?;
    assert_eq!(config, Config::default());
    assert_eq!(config.render, RenderConfig::default());
    assert_eq!(config.render.output_dir, PathBuf::from("."));
    assert!(config.render.box_plus_buffer);
    assert_eq!(config.log.filter, "info");
    Ok(())
}

#[test_log::test]
fn layers_apply_in_priority_order() -> Result<()> {
    let cfg = raw("projects/chip", "home", &[]);
    let files = cfg.files();
    assert_eq!(
        files,
        vec![
            data("home/config.toml"),
            data("projects/metal.toml"),
            data("projects/chip/metal.toml"),
        ]
    );

    let config = cfg.resolve()?;
    assert!(config.design.overwrite_enabled);
    assert_eq!(config.render.output_dir, PathBuf::from("/tmp/metal-out"));
    // The project file overrides the home file.
    assert_eq!(config.render.x_buffer_width_mm, 0.3);
    assert_eq!(config.render.y_buffer_width_mm, 0.5);
    assert_eq!(config.log.filter, "metal=debug");
    Ok(())
}

#[test]
fn layer_stack_is_relative_to_its_file() -> Result<()> {
    let config = raw("projects/chip", "home", &[]).resolve()?;
    assert_eq!(
        config.design.layer_stack,
        Some(data("projects/stacks/two_chip.csv"))
    );
    Ok(())
}

#[test_log::test]
fn env_overrides_files() -> Result<()> {
    let config = raw(
        "projects/chip",
        "home",
        &[
            ("METAL_RENDER_OUTPUT_DIR", "/scratch/render"),
            ("METAL_RENDER_BOX_PLUS_BUFFER", "false"),
            ("METAL_RENDER_Y_BUFFER_WIDTH_MM", "1.25"),
            ("METAL_DESIGN_OVERWRITE_ENABLED", "false"),
            ("METAL_DESIGN_LAYER_STACK", "/stacks/env.toml"),
        ],
    )
    .resolve()?;
    assert_eq!(config.render.output_dir, PathBuf::from("/scratch/render"));
    assert!(!config.render.box_plus_buffer);
    assert_eq!(config.render.y_buffer_width_mm, 1.25);
    assert!(!config.design.overwrite_enabled);
    assert_eq!(
        config.design.layer_stack,
        Some(PathBuf::from("/stacks/env.toml"))
    );
    Ok(())
}

#[test]
fn bad_env_value_is_an_error() {
    let err = raw(
        "projects",
        "home",
        &[("METAL_RENDER_BOX_PLUS_BUFFER", "sometimes")],
    )
    .resolve()
    .unwrap_err();
    assert!(format!("{err:#}").contains("METAL_RENDER_BOX_PLUS_BUFFER"));
}

#[test]
fn malformed_file_is_an_error() {
    let err = raw("broken", "missing_home", &[]).resolve().unwrap_err();
    assert!(format!("{err:#}").contains("could not parse"));
}

#[test]
fn env_keys() {
    assert_eq!(
        env_key(&["render".to_string(), "x_buffer_width_mm".to_string()]),
        "METAL_RENDER_X_BUFFER_WIDTH_MM"
    );
}

#[test]
fn merge_is_deep() {
    let mut base: toml::Table = "[a]\nx = 1\ny = 2\n".parse().unwrap();
    let layer: toml::Table = "[a]\ny = 3\n[b]\nz = 4\n".parse().unwrap();
    merge(&mut base, layer);
    assert_eq!(base["a"]["x"].as_integer(), Some(1));
    assert_eq!(base["a"]["y"].as_integer(), Some(3));
    assert_eq!(base["b"]["z"].as_integer(), Some(4));
}

#[test]
fn single_document() -> Result<()> {
    let config = Config::from_toml(
        "[design]\nlayer_stack = \"ls.csv\"\n",
        &PathBuf::from("/work/metal.toml"),
    )?;
    assert_eq!(
        config.design.layer_stack,
        Some(PathBuf::from("/work/ls.csv"))
    );
    assert_eq!(config.render, RenderConfig::default());
    Ok(())
}
