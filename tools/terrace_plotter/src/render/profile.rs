//! Long profile: terrace treads against distance upstream, over the channel.
use anyhow::{Context, Result};
use image::RgbImage;
use plotters::coord::Shift;
use plotters::prelude::*;

use terrace_core::pipeline::LongProfileData;

use super::{draw_colour_bar, draw_to_image, font, padded, rgb, ColourBar};
use crate::colour::discrete_rainbow;
use crate::figure::RenderConfig;

/// Share of the figure width given to the axes; the rest holds the colour bar.
const PLOT_FRACTION: f64 = 0.84;

pub fn render_long_profile(data: &LongProfileData, cfg: &RenderConfig) -> Result<RgbImage> {
    draw_to_image(cfg.profile_size_px(), |root| draw_long_profile(root, data, cfg))
}

type Extent = ((f64, f64), (f64, f64));

/// Extent of the terrace profiles joined with the channel's.
fn combined_extent(data: &LongProfileData) -> Option<Extent> {
    let join = |((a0, a1), (b0, b1)): Extent, ((c0, c1), (d0, d1)): Extent| {
        ((a0.min(c0), a1.max(c1)), (b0.min(d0), b1.max(d1)))
    };
    match (data.profiles.extent(), data.channel.extent()) {
        (Some(t), Some(c)) => Some(join(t, c)),
        (t, c) => t.or(c),
    }
}

pub fn draw_long_profile<DB>(
    root: DrawingArea<DB, Shift>,
    data: &LongProfileData,
    cfg: &RenderConfig,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let ((x_lo, x_hi), (z_lo, z_hi)) =
        combined_extent(data).context("long profile has no finite points")?;

    let (w, _) = root.dim_in_pixel();
    let (plot_area, bar_area) = root.split_horizontally((w as f64 * PLOT_FRACTION) as u32);

    let label_px = (cfg.font_px() * 2.5) as u32;
    let mut chart = ChartBuilder::on(&plot_area)
        .margin((cfg.font_px() * 0.5) as u32)
        .set_label_area_size(LabelAreaPosition::Left, label_px * 2)
        .set_label_area_size(LabelAreaPosition::Bottom, label_px)
        .build_cartesian_2d(padded(x_lo, x_hi), padded(z_lo, z_hi))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Distance upstream (m)")
        .y_desc("Elevation (m)")
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format!("{v:.0}"))
        .label_style(font(cfg, 0.8))
        .axis_desc_style(font(cfg, 1.0))
        .draw()?;

    let colours = discrete_rainbow(data.profiles.len());
    let radius = cfg.pt_to_px(1.0).round().max(1.0) as u32;
    for (profile, colour) in data.profiles.profiles.iter().zip(&colours) {
        let colour = rgb(*colour);
        chart.draw_series(
            profile
                .distance
                .iter()
                .zip(&profile.elevation)
                .map(|(&x, &z)| Circle::new((x, z), radius, colour.filled())),
        )?;
    }

    if !data.channel.is_empty() {
        let line_width = cfg.pt_to_px(2.0).round() as u32;
        chart.draw_series(LineSeries::new(data.channel.points(), BLACK.stroke_width(line_width)))?;
    }

    let bar = ColourBar::Discrete {
        labels: data.profiles.ids().iter().map(|id| id.to_string()).collect(),
        colours,
        title: "Terrace ID".to_string(),
    };
    draw_colour_bar(&bar_area, &bar, cfg)?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use terrace_core::profile::{ChannelProfile, ProfileSet, TerraceProfile};

    fn sample() -> LongProfileData {
        let profile = |id: i64, z0: f64| TerraceProfile {
            terrace_id: id,
            distance: vec![0.0, 100.0, 200.0, 300.0],
            elevation: vec![z0, z0 + 1.0, z0 + 2.0, z0 + 3.0],
        };
        LongProfileData {
            channel: ChannelProfile {
                distance: vec![0.0, 150.0, 300.0],
                elevation: vec![90.0, 91.5, 93.0],
            },
            profiles: ProfileSet {
                profiles: vec![profile(2, 95.0), profile(7, 100.0)],
                rejected: Vec::new(),
            },
            excluded_by_size: BTreeMap::new(),
        }
    }

    #[test]
    fn extent_covers_terraces_and_channel() {
        let ((x0, x1), (z0, z1)) = combined_extent(&sample()).unwrap();
        assert_eq!((x0, x1), (0.0, 300.0));
        assert_eq!((z0, z1), (90.0, 103.0));
    }

    #[test]
    fn extent_without_channel_is_the_terraces() {
        let mut data = sample();
        data.channel = ChannelProfile::default();
        assert_eq!(combined_extent(&data), Some(((0.0, 300.0), (95.0, 103.0))));
    }

    #[test]
    fn axis_titles_and_bar_labels_are_drawn() {
        let cfg = RenderConfig::default();
        let img = render_long_profile(&sample(), &cfg).unwrap();
        let (w, h) = img.dimensions();
        let ink = |xs: std::ops::Range<u32>, ys: std::ops::Range<u32>| {
            ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
                .filter(|&(x, y)| img.get_pixel(x, y).0 != [255, 255, 255])
                .count()
        };
        // Left edge holds the rotated "Elevation (m)" title.
        assert!(ink(0..w / 10, h / 4..3 * h / 4) > 0);
        // Bar label column, right of the swatches.
        let bar_x0 = (w as f64 * PLOT_FRACTION) as u32;
        let label_x = bar_x0 + (w - bar_x0) * 3 / 10 + 2;
        assert!(ink(label_x..w, h / 10..h - h / 10) > 0);
    }

    #[test]
    fn renders_at_profile_size() {
        let cfg = RenderConfig::default();
        let img = render_long_profile(&sample(), &cfg).unwrap();
        assert_eq!(img.dimensions(), cfg.profile_size_px());
        // Something other than background was drawn.
        assert!(img.pixels().any(|p| p.0 != [255, 255, 255]));
    }

    #[test]
    fn empty_data_is_an_error() {
        let data = LongProfileData {
            channel: ChannelProfile::default(),
            profiles: ProfileSet::default(),
            excluded_by_size: BTreeMap::new(),
        };
        assert!(render_long_profile(&data, &RenderConfig::default()).is_err());
    }
}
