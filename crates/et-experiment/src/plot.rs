//! Fitness-over-generations chart.

use std::path::Path;

use plotters::prelude::*;

use et_optimizer::Logbook;
use et_types::{EtError, EtResult};

fn plot_error<E: std::fmt::Display>(err: E) -> EtError {
    EtError::Plot(err.to_string())
}

/// Y-axis range covering every min and max record, padded so flat series
/// still get a visible band.
pub fn fitness_bounds(logbook: &Logbook) -> Option<(f64, f64)> {
    let low = logbook
        .iter()
        .map(|r| r.min)
        .fold(f64::INFINITY, f64::min);
    let high = logbook
        .iter()
        .map(|r| r.max)
        .fold(f64::NEG_INFINITY, f64::max);
    if !(low.is_finite() && high.is_finite()) {
        return None;
    }
    let pad = if high > low {
        (high - low) * 0.05
    } else {
        low.abs().max(1.0) * 0.05
    };
    Some((low - pad, high + pad))
}

/// Draw avg/min/max fitness per generation to an SVG file at `path`.
pub fn plot_fitness(logbook: &Logbook, path: &Path, size: (u32, u32)) -> EtResult<()> {
    let (y_low, y_high) =
        fitness_bounds(logbook).ok_or_else(|| EtError::Plot("logbook is empty".to_string()))?;
    let x_high = logbook.len().saturating_sub(1).max(1) as f64;

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Fitness over generations", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..x_high, y_low..y_high)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Generation")
        .y_desc("Fitness")
        .draw()
        .map_err(plot_error)?;

    let series = [
        ("avg", logbook.avg(), BLUE),
        ("min", logbook.min(), GREEN),
        ("max", logbook.max(), RED),
    ];
    for (label, values, color) in series {
        chart
            .draw_series(LineSeries::new(
                values.into_iter().enumerate().map(|(i, v)| (i as f64, v)),
                &color,
            ))
            .map_err(plot_error)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use et_optimizer::GenerationStats;

    #[test]
    fn bounds_cover_all_records() {
        let mut logbook = Logbook::new();
        logbook.record(GenerationStats::from_values(0, 2, &[-10.0, 0.0]).unwrap());
        logbook.record(GenerationStats::from_values(1, 2, &[-2.0, 10.0]).unwrap());

        let (low, high) = fitness_bounds(&logbook).unwrap();
        assert!(low < -10.0);
        assert!(high > 10.0);
    }

    #[test]
    fn flat_series_gets_padding() {
        let mut logbook = Logbook::new();
        logbook.record(GenerationStats::from_values(0, 2, &[3.0, 3.0]).unwrap());
        let (low, high) = fitness_bounds(&logbook).unwrap();
        assert!(low < 3.0 && high > 3.0);
    }

    #[test]
    fn writes_svg_chart() {
        let mut logbook = Logbook::new();
        for gen in 0..5 {
            let g = gen as f64;
            logbook.record(GenerationStats::from_values(gen, 3, &[g, g + 1.0, g + 2.0]).unwrap());
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fitness_graph.svg");
        plot_fitness(&logbook, &path, (640, 480)).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Fitness over generations"));
    }

    #[test]
    fn empty_logbook_cannot_be_plotted() {
        let logbook = Logbook::new();
        assert!(fitness_bounds(&logbook).is_none());
        let dir = tempfile::tempdir().unwrap();
        let err = plot_fitness(&logbook, &dir.path().join("g.svg"), (320, 240)).unwrap_err();
        assert!(matches!(err, EtError::Plot(_)));
    }
}
