use gramscale::compiler::{draw_geom, render_plot};
use gramscale::csv_reader::read_csv;
use gramscale::data::{DataFrame, Formula, Value};
use gramscale::geom::{fill_geom, GeomKind, PositionKind, PREV_VALS_COL};
use gramscale::graph::render_png;
use gramscale::ir::GraphObject;
use gramscale::plot::{Layer, Plot};
use gramscale::scale::{collect_scales, Aesthetic, Scale, ScaleValue};
use gramscale::theme::{Sampling, Theme};
use gramscale::viewport::Viewport;
use gramscale::Error;
use std::fs;
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

/// Helper function to run gramscale with arguments and CSV input
fn run_gramscale(args: &[&str], csv_content: &str) -> Result<Vec<u8>, String> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_gramscale"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    // Write CSV to stdin
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(csv_content.as_bytes())
            .map_err(|e| format!("Failed to write to stdin: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for process: {}", e))?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("test/{}", name)).expect("Failed to read test CSV")
}

fn count_objects(view: &Viewport, kind: &str) -> usize {
    view.objects.iter().filter(|o| o.kind_name() == kind).count()
        + view.children.iter().map(|c| count_objects(c, kind)).sum::<usize>()
}

#[test]
fn test_end_to_end_scatter_plot() {
    let result = run_gramscale(&["-x", "height", "-y", "weight"], &fixture("scatter.csv"));
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_end_to_end_scatter_by_color_and_shape() {
    let result = run_gramscale(
        &["-x", "height", "-y", "weight", "--color", "group", "--shape", "group"],
        &fixture("scatter.csv"),
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_end_to_end_grouped_lines() {
    let result = run_gramscale(
        &["-x", "day", "-y", "temperature", "--color", "city", "--geom", "line"],
        &fixture("timeseries.csv"),
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_end_to_end_error_bars() {
    let result = run_gramscale(
        &["-x", "day", "-y", "temperature", "--y-min", "low", "--y-max", "high", "--geom", "errorbar"],
        &fixture("timeseries.csv"),
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_end_to_end_stacked_bars() {
    let result = run_gramscale(
        &["-x", "month", "-y", "sales", "--fill", "product", "--geom", "bar", "--position", "stack"],
        &fixture("sales.csv"),
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_end_to_end_histogram_and_outline() {
    let csv = fixture("histogram.csv");
    for extra in [&[][..], &["--outline"][..]] {
        let mut args = vec!["-x", "edge", "-y", "count", "--geom", "histogram"];
        args.extend_from_slice(extra);
        let result = run_gramscale(&args, &csv);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        assert!(is_valid_png(&result.unwrap()));
    }
}

#[test]
fn test_end_to_end_freqpoly() {
    let result = run_gramscale(
        &["-x", "edge", "-y", "count", "--geom", "freqpoly"],
        &fixture("histogram.csv"),
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_end_to_end_facet_wrap() {
    let result = run_gramscale(
        &["-x", "day", "-y", "temperature", "--facet", "city", "--scales", "free-y", "--ncol", "1"],
        &fixture("timeseries.csv"),
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_end_to_end_column_by_index() {
    let result = run_gramscale(&["-x", "0", "-y", "1", "--no-sampling"], &fixture("scatter.csv"));
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_end_to_end_large_dataset() {
    let mut csv = String::from("x,y\n");
    for i in 0..1000 {
        csv.push_str(&format!("{},{}\n", i, (i as f64 * 0.1).sin()));
    }
    let result = run_gramscale(&["-x", "x", "-y", "y", "--geom", "line"], &csv);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_end_to_end_column_not_found() {
    let result = run_gramscale(&["-x", "nope", "-y", "weight"], &fixture("scatter.csv"));
    assert!(result.unwrap_err().contains("not found"));
}

#[test]
fn test_end_to_end_empty_csv() {
    let result = run_gramscale(&["-x", "x", "-y", "y"], "x,y\n");
    assert!(result.is_err());
}

#[test]
fn test_end_to_end_continuous_shape_fails() {
    let result = run_gramscale(
        &["-x", "height", "-y", "weight", "--shape", "weight"],
        &fixture("scatter.csv"),
    );
    assert!(result.is_err());
}

fn sales() -> DataFrame {
    read_csv(Cursor::new(fixture("sales.csv"))).unwrap()
}

#[test]
fn test_api_scale_set_for_stacked_bars() {
    let plot = Plot::new(sales())
        .aes(Aesthetic::X, Formula::col("month"))
        .aes(Aesthetic::Y, Formula::col("sales"))
        .layer(
            Layer::new(GeomKind::Bar)
                .aes(Aesthetic::Fill, Formula::col("product"))
                .with_position(PositionKind::Stack),
        );
    let scales = collect_scales(&plot).unwrap();
    assert!(scales.discrete_x);
    assert!(!scales.discrete_y);
    let months: Vec<String> = scales
        .get(Aesthetic::X)
        .unwrap()
        .label_seq()
        .iter()
        .map(|v| v.to_string())
        .collect();
    assert_eq!(months, vec!["Apr", "Feb", "Jan", "Mar"]);

    let fg = fill_geom(&plot.data, &plot.layers[0], &scales, &plot.theme).unwrap();
    assert_eq!(fg.groups.len(), 2);
    assert_eq!(fg.y_scale, (0.0, 270.0));
    let widget = &fg.groups[1].df;
    let prev = widget.column(PREV_VALS_COL).unwrap();
    assert!(prev.iter().all(|v| v.as_f64().unwrap() > 0.0));

    let view = Viewport::new("panel", 400.0, 300.0).with_scales((0.0, 1.0), fg.y_scale);
    let drawn = draw_geom(view, &fg, &plot.theme, None).unwrap();
    assert_eq!(drawn.children.len(), 6);
    assert_eq!(count_objects(&drawn, "rect"), 8);
}

#[test]
fn test_api_integer_years_are_discrete() {
    let data = DataFrame::new()
        .with_column("year", vec![2020i64, 2021, 2020, 2021, 2020, 2021, 2020, 2021, 2020, 2021, 2020, 2021, 2020, 2021, 2020, 2021, 2020])
        .unwrap()
        .with_column("v", (0..17).map(|i| i as f64).collect::<Vec<f64>>())
        .unwrap();
    let plot = Plot::new(data)
        .aes(Aesthetic::X, Formula::col("v"))
        .aes(Aesthetic::Y, Formula::col("v"))
        .layer(Layer::new(GeomKind::Point).aes(Aesthetic::Color, Formula::col("year")))
        .with_theme(Theme::default().with_sampling(Sampling::Exhaustive));
    let scales = collect_scales(&plot).unwrap();
    let color = scales.get(Aesthetic::Color).unwrap();
    assert!(color.is_discrete());
    assert_eq!(color.label_seq(), &[Value::Int(2020), Value::Int(2021)]);
}

#[test]
fn test_api_layers_share_color_scale() {
    let data = DataFrame::new()
        .with_column("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
        .unwrap()
        .with_column("y", vec![2.0, 3.0, 5.0, 7.0, 11.0, 13.0, 17.0, 19.0])
        .unwrap()
        .with_column("site", vec!["n", "e", "s", "w", "n", "e", "s", "w"])
        .unwrap();
    let plot = Plot::new(data)
        .aes(Aesthetic::X, Formula::col("x"))
        .aes(Aesthetic::Y, Formula::col("y"))
        .layer(Layer::new(GeomKind::Point).aes(Aesthetic::Color, Formula::col("site")))
        .layer(Layer::new(GeomKind::Line).aes(Aesthetic::Color, Formula::col("site")));
    let scales = collect_scales(&plot).unwrap();
    let points = scales.for_layer(Aesthetic::Color, 0).unwrap();
    let lines = scales.for_layer(Aesthetic::Color, 1).unwrap();
    assert!(points.is_discrete());
    assert_eq!(points.label_seq().len(), 4);
    assert_eq!(points.label_seq(), lines.label_seq());
    assert_eq!(points.value_map(), lines.value_map());

    let per_row = lines.map_data(&plot.data).unwrap();
    assert_eq!(per_row.len(), 8);
    assert_eq!(per_row[2], points.get_value(&Value::from("s")).unwrap());
    assert_eq!(per_row[2], per_row[6]);
}

#[test]
fn test_api_explicit_value_map() {
    let map = [("widget", "#ff0000"), ("gadget", "#0000ff")]
        .into_iter()
        .map(|(k, c)| (Value::from(k), ScaleValue::Color(gramscale::palette::parse_color(c).unwrap())))
        .collect();
    let plot = Plot::new(sales())
        .aes(Aesthetic::X, Formula::col("month"))
        .aes(Aesthetic::Y, Formula::col("sales"))
        .layer(Layer::new(GeomKind::Point).scale(Scale::new(Aesthetic::Color, Formula::col("product")).with_value_map(map)));
    let scales = collect_scales(&plot).unwrap();
    let color = scales.get(Aesthetic::Color).unwrap();
    let ScaleValue::Color(c) = color.get_value(&Value::from("widget")).unwrap() else {
        panic!("expected a color");
    };
    assert_eq!(c.to_rgba8(), [255, 0, 0, 255]);
}

#[test]
fn test_api_dodge_is_rejected() {
    let plot = Plot::new(sales())
        .aes(Aesthetic::X, Formula::col("month"))
        .aes(Aesthetic::Y, Formula::col("sales"))
        .layer(Layer::new(GeomKind::Bar).with_position(PositionKind::Dodge));
    assert_eq!(
        render_plot(&plot).unwrap_err(),
        Error::UnimplementedPositionPolicy(PositionKind::Dodge)
    );
}

#[test]
fn test_api_render_plot_to_png() {
    let plot = Plot::new(sales())
        .aes(Aesthetic::X, Formula::col("month"))
        .aes(Aesthetic::Y, Formula::col("sales"))
        .layer(Layer::new(GeomKind::Bar).aes(Aesthetic::Fill, Formula::col("product")).with_position(PositionKind::Stack))
        .facet_wrap(vec![Formula::col("product")])
        .with_size(320.0, 240.0);
    let root = render_plot(&plot).unwrap();
    assert_eq!((root.width, root.height), (320.0, 240.0));
    assert_eq!(count_objects(&root, "rect"), 8 + 2);
    let png = render_png(&root).unwrap();
    assert!(is_valid_png(&png));
}

#[test]
fn test_api_text_labels_use_precision() {
    let data = DataFrame::new()
        .with_column("x", vec![1.0, 2.0, 3.0])
        .unwrap()
        .with_column("y", vec![1.0, 4.0, 9.0])
        .unwrap()
        .with_column("label", vec![0.5, 0.25, 0.125])
        .unwrap();
    let plot = Plot::new(data)
        .aes(Aesthetic::X, Formula::col("x"))
        .aes(Aesthetic::Y, Formula::col("y"))
        .layer(Layer::new(GeomKind::Text).aes(Aesthetic::Text, Formula::col("label")));
    let root = render_plot(&plot).unwrap();
    let panel = &root.children[4].children[0].children[1];
    let labels: Vec<&str> = panel
        .objects
        .iter()
        .filter_map(|o| match o {
            GraphObject::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert!(labels.contains(&"0.500"));
    assert!(labels.contains(&"0.125"));
}
