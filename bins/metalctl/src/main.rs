use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use arcstr::ArcStr;
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use metal::parse::{Options, RawValue};
use metal::renderer::ansys::AnsysRenderer;
use metal::renderer::elmer::ElmerRenderer;
use metal::renderer::gmsh::GmshRenderer;
use metal::renderer::{RenderRequest, Renderer};
use metal::Design;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env().with_context(|| "Failed to load configuration.")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .with_context(|| format!("Invalid log filter `{}`.", config.log.filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut design = Design::load(&args.design)
        .with_context(|| format!("Failed to load design file {:?}.", args.design))?;
    design.apply_config(&config);
    let failed = design.rebuild();
    if failed > 0 {
        tracing::warn!(failed, "some components failed to build");
    }

    match args.command {
        Command::Info => info(&design),
        Command::Validate => validate(&design),
        Command::Bounds(bounds) => print_bounds(&design, &config, bounds),
        Command::Render(render) => render_design(&mut design, &config, render),
    }
}

/// Arguments to `metalctl`.
#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "Inspect, validate and render a metal design file"
)]
pub struct Args {
    /// The design file (TOML).
    design: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the design's chips, components and nets.
    Info,
    /// Check the design and exit with an error if any issue is an error.
    Validate,
    /// Print the render box of a selection.
    Bounds(BoundsArgs),
    /// Render the design for a simulator.
    Render(RenderArgs),
}

#[derive(clap::Args)]
struct BoundsArgs {
    /// Components to bound. Repeat the flag to select several.
    #[arg(short, long)]
    select: Vec<String>,
    /// Use the chip footprint instead of fitting the geometry.
    #[arg(long)]
    no_buffer: bool,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// The simulator backend.
    #[arg(short, long, value_enum)]
    backend: Backend,
    /// Components to render. Repeat the flag to select several.
    #[arg(short, long)]
    select: Vec<String>,
    /// Cut an endcap at a pin, written `component:pin`.
    #[arg(long, value_parser = parse_pin)]
    open_pin: Vec<(ArcStr, ArcStr)>,
    /// Place a lumped port on a pin, written `component:pin:ohms`.
    #[arg(long, value_parser = parse_port)]
    port: Vec<(ArcStr, ArcStr, f64)>,
    /// Leave every junction out of the render.
    #[arg(long)]
    skip_junctions: bool,
    /// Use the chip footprint instead of fitting the geometry.
    #[arg(long)]
    no_buffer: bool,
    /// The output directory.
    ///
    /// Defaults to `render.output_dir` from the configuration.
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Gmsh,
    Elmer,
    Hfss,
    Q3d,
}

fn parse_pin(s: &str) -> anyhow::Result<(ArcStr, ArcStr)> {
    match s.split_once(':') {
        Some((component, pin)) if !component.is_empty() && !pin.is_empty() => {
            Ok((component.into(), pin.into()))
        }
        _ => bail!("expected `component:pin`, got `{s}`"),
    }
}

fn parse_port(s: &str) -> anyhow::Result<(ArcStr, ArcStr, f64)> {
    let (pin, ohms) = s
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected `component:pin:ohms`, got `{s}`"))?;
    let (component, pin) = parse_pin(pin)?;
    let ohms = ohms
        .parse()
        .with_context(|| format!("invalid impedance `{ohms}`"))?;
    Ok((component, pin, ohms))
}

fn info(design: &Design) -> anyhow::Result<()> {
    println!("design: {} ({:?})", design.name(), design.variant());
    if !design.notes().is_empty() {
        println!("notes: {}", design.notes());
    }
    for chip in design.chip_names() {
        match design.get_x_y_for_chip(&chip) {
            (Some(rect), _) => println!(
                "chip {chip}: {} x {} nm centered at ({}, {})",
                rect.width(),
                rect.height(),
                rect.center().x,
                rect.center().y
            ),
            (None, lookup) => println!("chip {chip}: {lookup:?}"),
        }
    }
    for component in design.components() {
        println!(
            "component {} [{}] {:?}, {} pins",
            component.name(),
            component.class_name(),
            component.status(),
            component.pins().len()
        );
    }
    println!("nets: {}", design.net_info().net_ids().len());
    Ok(())
}

fn validate(design: &Design) -> anyhow::Result<()> {
    let issues = design.validate();
    issues.log();
    for issue in issues.iter() {
        println!("{issue}");
    }
    if issues.has_error() {
        bail!("design has {} errors", issues.num_errors());
    }
    println!("{} warnings", issues.num_warnings());
    Ok(())
}

fn mm_to_db(mm: f64) -> i64 {
    (mm * 1e6).round() as i64
}

fn print_bounds(design: &Design, config: &Config, args: BoundsArgs) -> anyhow::Result<()> {
    let selection: Vec<&str> = args.select.iter().map(String::as_str).collect();
    let (ids, case) = design.get_unique_component_ids(&selection);
    let tables = design.get_bounds_of_path_and_poly_tables(
        config.render.box_plus_buffer && !args.no_buffer,
        &ids,
        case,
        mm_to_db(config.render.x_buffer_width_mm),
        mm_to_db(config.render.y_buffer_width_mm),
    );
    if !tables.chip_names_matched {
        tracing::warn!("layer stack names chips that the design does not define");
    }
    let bounds = tables
        .bounds
        .ok_or_else(|| anyhow!("selection {selection:?} has no render box ({case:?})"))?;
    println!(
        "{} {} {} {}",
        bounds.left(),
        bounds.bot(),
        bounds.right(),
        bounds.top()
    );
    Ok(())
}

fn render_design(design: &mut Design, config: &Config, args: RenderArgs) -> anyhow::Result<()> {
    let mut buffers = Options::new();
    buffers.insert(
        "x_buffer_width_mm".into(),
        RawValue::Float(config.render.x_buffer_width_mm),
    );
    buffers.insert(
        "y_buffer_width_mm".into(),
        RawValue::Float(config.render.y_buffer_width_mm),
    );

    let mut renderer: Box<dyn Renderer> = match args.backend {
        Backend::Gmsh => Box::new(GmshRenderer::new(buffers)),
        Backend::Elmer => Box::new(ElmerRenderer::new(Options::new(), buffers)),
        Backend::Hfss => Box::new(AnsysRenderer::hfss(buffers)),
        Backend::Q3d => Box::new(AnsysRenderer::q3d(buffers)),
    };
    design.register_renderer(renderer.as_ref());
    renderer.start();

    let mut request = RenderRequest::default()
        .select(args.select)
        .box_plus_buffer(config.render.box_plus_buffer && !args.no_buffer);
    request.open_pins = args.open_pin;
    request.port_list = args.port;
    request.skip_junctions = args.skip_junctions;

    let output = renderer
        .render_design(design, &request)
        .with_context(|| format!("Failed to render with `{}`.", renderer.name()))?;
    renderer.stop();
    output.issues.log();

    let out = args.out.unwrap_or_else(|| config.render.output_dir.clone());
    output
        .write_to(&out)
        .with_context(|| format!("Failed to write render output to {:?}.", out))?;
    eprintln!("wrote {} files to {:?}", output.files.len(), out);
    Ok(())
}
