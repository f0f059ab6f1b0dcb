//! World Tool
//!
//! Expands a RON world description and writes it back out as world-file
//! text, Wavefront OBJ (with a `.mtl` beside it) or a packed blob.
//!
//! Usage:
//!
//! ```text
//! cargo run --bin worldtool -- world.ron [--config world.toml]
//!     [--flat] [--meshes] [--obj] [--pack] [-o output]
//! ```
//!
//! `--config` replaces the settings embedded in the description with a TOML
//! or RON `WorldConfig` file.

mod description;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use bzworld::config::state::{SAVE_AS_MESHES, SAVE_AS_OBJ, SAVE_FLAT_FILE};
use bzworld::config::{Config, WorldConfig};
use bzworld::foundation::logging;
use bzworld::obstacle::ObstacleType;
use bzworld::WorldContext;
use log::{error, info};

use description::{ToolError, WorldDescription};

const USAGE: &str =
    "usage: worldtool world.ron [--config file] [--flat] [--meshes] [--obj] [--pack] [-o output]";

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct Options {
    input: PathBuf,
    config: Option<String>,
    output: Option<PathBuf>,
    flat: bool,
    meshes: bool,
    obj: bool,
    pack: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self, ToolError> {
        let mut options = Self::default();
        let mut input = None;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--flat" => options.flat = true,
                "--meshes" => options.meshes = true,
                "--obj" => options.obj = true,
                "--pack" => options.pack = true,
                "--config" => {
                    let path = iter.next().ok_or_else(|| ToolError::Usage(USAGE.to_string()))?;
                    options.config = Some(path.clone());
                }
                "-o" => {
                    let path = iter.next().ok_or_else(|| ToolError::Usage(USAGE.to_string()))?;
                    options.output = Some(PathBuf::from(path));
                }
                other if other.starts_with('-') || input.is_some() => {
                    return Err(ToolError::Usage(format!("unexpected argument {other:?}\n{USAGE}")));
                }
                other => input = Some(PathBuf::from(other)),
            }
        }
        options.input = input.ok_or_else(|| ToolError::Usage(USAGE.to_string()))?;
        Ok(options)
    }
}

fn main() {
    logging::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let result = Options::parse(&args).and_then(|options| run(&options));
    if let Err(e) = result {
        error!("{e}");
        eprintln!("worldtool: {e}");
        std::process::exit(1);
    }
}

fn run(options: &Options) -> Result<(), ToolError> {
    let mut description = WorldDescription::load(&options.input)?;
    if let Some(path) = &options.config {
        description.config = WorldConfig::load_from_file(path)?;
        info!("settings from {path}");
    }
    let mut world = description.into_world()?;
    info!("loaded {}", options.input.display());
    print_summary(&world);

    for (key, on) in [
        (SAVE_FLAT_FILE, options.flat),
        (SAVE_AS_MESHES, options.meshes),
        (SAVE_AS_OBJ, options.obj),
    ] {
        if on {
            world.state.set(key, "1");
        }
    }

    if options.pack {
        let bytes = world.pack();
        let check = WorldContext::unpack(world.config.clone(), &bytes)?;
        eprintln!(
            "packed {} bytes, {} obstacles after rebuilding",
            bytes.len(),
            check.groups.world.obstacle_count()
        );
        if let Some(path) = &options.output {
            fs::write(path, &bytes)?;
        }
        return Ok(());
    }

    let mut text = String::new();
    world.save(&mut text)?;
    match &options.output {
        Some(path) => {
            fs::write(path, &text)?;
            if options.obj {
                write_mtl(&world, path)?;
            }
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn write_mtl(world: &WorldContext, obj_path: &Path) -> Result<(), ToolError> {
    let mut mtl = String::new();
    world.save_mtl(&mut mtl)?;
    let path = obj_path.with_file_name("world.mtl");
    fs::write(&path, mtl)?;
    info!("wrote {}", path.display());
    Ok(())
}

fn print_summary(world: &WorldContext) {
    for kind in ObstacleType::ALL {
        let count = world.groups.world_list(kind).len();
        if count > 0 {
            eprintln!("  {:<12} {count}", kind.name());
        }
    }
    let (gx, gy) = world.grid.dimensions();
    let filled = world.grid.cells().iter().filter(|c| !c.objs.is_empty()).count();
    eprintln!("  grid {gx}x{gy}, {filled} cells in use, {} materials", world.materials.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_options() {
        let list = args(&["w.ron", "--flat", "--obj", "-o", "out.obj", "--config", "w.toml"]);
        let options = Options::parse(&list).unwrap();
        assert_eq!(options.input, PathBuf::from("w.ron"));
        assert_eq!(options.config.as_deref(), Some("w.toml"));
        assert_eq!(options.output, Some(PathBuf::from("out.obj")));
        assert!(options.flat && options.obj);
        assert!(!options.meshes && !options.pack);
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(matches!(Options::parse(&args(&[])), Err(ToolError::Usage(_))));
        assert!(matches!(Options::parse(&args(&["a.ron", "b.ron"])), Err(ToolError::Usage(_))));
        assert!(matches!(Options::parse(&args(&["a.ron", "--bogus"])), Err(ToolError::Usage(_))));
        assert!(matches!(Options::parse(&args(&["a.ron", "-o"])), Err(ToolError::Usage(_))));
    }
}
