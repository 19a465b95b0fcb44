use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gramscale::csv_reader;
use gramscale::data::{DataFrame, Formula};
use gramscale::geom::{BinPosition, GeomKind, HistogramDrawingStyle, PositionKind};
use gramscale::plot::{Facet, FacetScales, Labels, Layer, Plot};
use gramscale::scale::Aesthetic;
use gramscale::theme::{Sampling, Theme};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Geom {
    Point,
    Line,
    Errorbar,
    Bar,
    Histogram,
    Freqpoly,
    Tile,
    Raster,
    Text,
}

impl From<Geom> for GeomKind {
    fn from(g: Geom) -> Self {
        match g {
            Geom::Point => GeomKind::Point,
            Geom::Line => GeomKind::Line,
            Geom::Errorbar => GeomKind::ErrorBar,
            Geom::Bar => GeomKind::Bar,
            Geom::Histogram => GeomKind::Histogram,
            Geom::Freqpoly => GeomKind::FreqPoly,
            Geom::Tile => GeomKind::Tile,
            Geom::Raster => GeomKind::Raster,
            Geom::Text => GeomKind::Text,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Position {
    Identity,
    Stack,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Bins {
    None,
    Left,
    Center,
    Right,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SharedScales {
    Fixed,
    FreeX,
    FreeY,
    Free,
}

#[derive(Parser, Debug)]
#[command(name = "gramscale")]
#[command(about = "Render grammar-of-graphics plots from CSV data", long_about = None)]
struct Args {
    #[arg(short = 'x', long = "x", required = true, help = "X-axis column (name or 0-based index)")]
    x_column: String,

    #[arg(short = 'y', long = "y", required = true, help = "Y-axis column (name or 0-based index)")]
    y_column: String,

    #[arg(long = "color", help = "Column mapped to the stroke color")]
    color: Option<String>,

    #[arg(long = "fill", help = "Column mapped to the fill color")]
    fill: Option<String>,

    #[arg(long = "size", help = "Column mapped to the point size or line width")]
    size: Option<String>,

    #[arg(long = "alpha", help = "Column mapped to the opacity")]
    alpha: Option<String>,

    #[arg(long = "shape", help = "Column mapped to the marker and line type")]
    shape: Option<String>,

    #[arg(long = "text", help = "Column holding text labels")]
    text: Option<String>,

    #[arg(long = "y-min", help = "Lower end column for error bars")]
    y_min: Option<String>,

    #[arg(long = "y-max", help = "Upper end column for error bars")]
    y_max: Option<String>,

    #[arg(short = 'g', long = "geom", value_enum, default_value = "point", help = "Geometry to draw")]
    geom: Geom,

    #[arg(long = "position", value_enum, default_value = "identity", help = "Position adjustment")]
    position: Position,

    #[arg(long = "bin-position", value_enum, help = "Where x values sit inside their bin")]
    bin_position: Option<Bins>,

    #[arg(long = "outline", help = "Draw histograms as a step outline")]
    outline: bool,

    #[arg(long = "facet", help = "Column to facet by")]
    facet: Option<String>,

    #[arg(long = "ncol", help = "Number of facet columns")]
    ncol: Option<usize>,

    #[arg(long = "scales", value_enum, default_value = "fixed", help = "Axis sharing between facets")]
    scales: SharedScales,

    #[arg(long = "width", default_value = "800", help = "Output width in pixels")]
    width: u32,

    #[arg(long = "height", default_value = "600", help = "Output height in pixels")]
    height: u32,

    #[arg(long = "seed", default_value = "42", help = "Seed for discreteness sampling")]
    seed: u64,

    #[arg(long = "no-sampling", help = "Classify columns from every row")]
    no_sampling: bool,

    #[arg(long = "hue-start", default_value = "15", help = "Hue of the first discrete color, in degrees")]
    hue_start: f64,

    #[arg(short = 't', long = "title", help = "Graph title")]
    title: Option<String>,

    #[arg(long = "x-label", help = "X-axis label (defaults to column name)")]
    x_label: Option<String>,

    #[arg(long = "y-label", help = "Y-axis label (defaults to column name)")]
    y_label: Option<String>,
}

fn column(df: &DataFrame, selector: &str, what: &str) -> Result<Formula> {
    let name = csv_reader::resolve_column(df, csv_reader::parse_column_selector(selector))
        .with_context(|| format!("Failed to resolve {} column", what))?;
    Ok(Formula::col(&name))
}

fn build_plot(args: &Args, data: DataFrame) -> Result<Plot> {
    let mut layer = Layer::new(args.geom.into()).with_position(match args.position {
        Position::Identity => PositionKind::Identity,
        Position::Stack => PositionKind::Stack,
    });
    if let Some(bins) = args.bin_position {
        layer = layer.with_bin_position(match bins {
            Bins::None => BinPosition::None,
            Bins::Left => BinPosition::Left,
            Bins::Center => BinPosition::Center,
            Bins::Right => BinPosition::Right,
        });
    }
    if args.outline {
        layer = layer.with_hist_style(HistogramDrawingStyle::Outline);
    }

    let optional = [
        (Aesthetic::Color, &args.color, "color"),
        (Aesthetic::Fill, &args.fill, "fill"),
        (Aesthetic::Size, &args.size, "size"),
        (Aesthetic::Alpha, &args.alpha, "alpha"),
        (Aesthetic::Shape, &args.shape, "shape"),
        (Aesthetic::Text, &args.text, "text"),
        (Aesthetic::YMin, &args.y_min, "y-min"),
        (Aesthetic::YMax, &args.y_max, "y-max"),
    ];
    for (aesthetic, selector, what) in optional {
        if let Some(selector) = selector {
            layer = layer.aes(aesthetic, column(&data, selector, what)?);
        }
    }

    let x = column(&data, &args.x_column, "X")?;
    let y = column(&data, &args.y_column, "Y")?;
    let facet = match &args.facet {
        Some(selector) => Some(Facet {
            columns: vec![column(&data, selector, "facet")?],
            ncol: args.ncol,
            scales: match args.scales {
                SharedScales::Fixed => FacetScales::Fixed,
                SharedScales::FreeX => FacetScales::FreeX,
                SharedScales::FreeY => FacetScales::FreeY,
                SharedScales::Free => FacetScales::Free,
            },
        }),
        None => None,
    };

    let sampling = if args.no_sampling {
        Sampling::Exhaustive
    } else {
        Sampling::Seeded(args.seed)
    };
    let theme = Theme::default()
        .with_sampling(sampling)
        .with_hue_start(args.hue_start);

    let mut plot = Plot::new(data)
        .aes(Aesthetic::X, x)
        .aes(Aesthetic::Y, y)
        .layer(layer)
        .with_theme(theme)
        .with_labels(Labels {
            title: args.title.clone(),
            x_label: args.x_label.clone(),
            y_label: args.y_label.clone(),
        })
        .with_size(args.width as f64, args.height as f64);
    plot.facet = facet;
    Ok(plot)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let data = csv_reader::read_csv_from_stdin()
        .context("Failed to read CSV from stdin")?;

    let plot = build_plot(&args, data)?;

    let view = gramscale::compiler::render_plot(&plot)
        .context("Failed to lay out plot")?;

    let png_bytes = gramscale::graph::render_png(&view)
        .context("Failed to generate graph")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(&png_bytes)
        .context("Failed to write PNG to stdout")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}
