//! terrace_plotter: figures and reports for terraces extracted along a
//! baseline channel.
//!
//! Reads `<prefix>_terrace_info.csv`, `<prefix>_baseline_channel_info.csv` and
//! the ENVI rasters from `--data-dir` and writes every output back beside them.
mod colour;
mod figure;
mod render;
mod report;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use terrace_core::area::{pixel_counts, raster_cell_area, terrace_areas};
use terrace_core::pipeline::{self, AnalysisConfig};
use terrace_core::raster::{
    raster_path, EnviRaster, HILLSHADE_SUFFIX, TERRACE_ID_SUFFIX, TERRACE_RELIEF_SUFFIX,
};
use terrace_core::SizeBounds;

use figure::{output_path, save_image, FigFormat, RenderConfig, SizeFormat};
use render::raster::Drape;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "terrace_plotter",
    about = "Long profiles, raster maps, dips and areas of river terraces"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Terrace treads and the channel baseline against distance upstream.
    LongProfile(LongProfileArgs),

    /// Hillshade with terraces coloured by ID.
    RasterIds(CommonArgs),

    /// Hillshade with terraces coloured by elevation above the channel.
    RasterElev(CommonArgs),

    /// Plane-fit dip and strike of each terrace, written as CSV.
    Dips(DipArgs),

    /// Planimetric area of each terrace, written as CSV.
    Areas(AreaArgs),

    /// Every figure and report.
    All(AllArgs),
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Directory holding the input CSVs and rasters; outputs are written here.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// DEM name that prefixes every input file.
    #[arg(long)]
    prefix: String,

    /// Terraces with fewer pixels are left out.
    #[arg(long, default_value_t = SizeBounds::default().min_size)]
    min_size: usize,

    /// Terraces with more pixels are left out.
    #[arg(long, default_value_t = SizeBounds::default().max_size)]
    max_size: usize,

    /// Figure file format.
    #[arg(long, value_enum, default_value_t = FigFormat::Png)]
    format: FigFormat,

    /// Figure width preset.
    #[arg(long, value_enum, default_value_t = SizeFormat::Esurf)]
    size_format: SizeFormat,
}

impl CommonArgs {
    fn analysis(&self) -> AnalysisConfig {
        let mut cfg = AnalysisConfig::new(&self.data_dir, &self.prefix);
        cfg.size_bounds = SizeBounds::new(self.min_size, self.max_size);
        cfg
    }

    fn render(&self) -> RenderConfig {
        RenderConfig {
            size_format: self.size_format,
            fig_format: self.format,
            ..RenderConfig::default()
        }
    }

    fn raster(&self, suffix: &str) -> Result<EnviRaster> {
        let path = raster_path(&self.data_dir, &self.prefix, suffix);
        EnviRaster::read(&path).with_context(|| format!("cannot load raster {}", path.display()))
    }

    fn save(&self, img: &RgbImage, suffix: &str) -> Result<()> {
        let path = output_path(&self.data_dir, &self.prefix, suffix, self.format);
        save_image(img, &path, self.format)?;
        info!(path = %path.display(), "figure written");
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
struct LongProfileArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Average channel nodes that share a distance along the baseline.
    #[arg(long)]
    mean_channel: bool,
}

#[derive(Args, Debug, Clone)]
struct DipArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Also draw a 3D diagnostic figure per fitted terrace.
    #[arg(long)]
    plots: bool,
}

#[derive(Args, Debug, Clone)]
struct AreaArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Cell size in metres, used when the terrace-ID raster has no map info.
    #[arg(long, default_value = "1.0")]
    cell_size: f64,
}

#[derive(Args, Debug, Clone)]
struct AllArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Also draw a 3D diagnostic figure per fitted terrace.
    #[arg(long)]
    plots: bool,

    /// Cell size in metres, used when the terrace-ID raster has no map info.
    #[arg(long, default_value = "1.0")]
    cell_size: f64,

    /// Average channel nodes that share a distance along the baseline.
    #[arg(long)]
    mean_channel: bool,
}

// ── Subcommands ──────────────────────────────────────────────────────────────

fn run_long_profile(args: &CommonArgs, mean_channel: bool) -> Result<()> {
    let config = AnalysisConfig { mean_channel, ..args.analysis() };
    let data = pipeline::long_profile(&config).context("long profile")?;
    info!(
        terraces = data.profiles.len(),
        excluded_by_size = data.excluded_by_size.len(),
        rejected = data.profiles.rejected.len(),
        "plotting long profile"
    );
    let img = render::profile::render_long_profile(&data, &args.render())?;
    args.save(&img, "_terrace_plot")
}

fn run_raster_ids(args: &CommonArgs) -> Result<()> {
    let (profiles, _) = pipeline::terrace_profiles(&args.analysis()).context("terrace profiles")?;
    let hillshade = args.raster(HILLSHADE_SUFFIX)?;
    let ids = args.raster(TERRACE_ID_SUFFIX)?;
    let style = Drape::TerraceIds { n_colours: profiles.len() };
    let img = render::raster::render_draped_raster(&hillshade, &ids, style, &args.render())?;
    args.save(&img, "_terrace_IDs_raster_plot")
}

fn run_raster_elev(args: &CommonArgs) -> Result<()> {
    let hillshade = args.raster(HILLSHADE_SUFFIX)?;
    let relief = args.raster(TERRACE_RELIEF_SUFFIX)?;
    let img =
        render::raster::render_draped_raster(&hillshade, &relief, Drape::Relief, &args.render())?;
    args.save(&img, "_terrace_elev_raster_plot")
}

fn run_dips(args: &CommonArgs, plots: bool) -> Result<()> {
    let (dips, table) =
        pipeline::terrace_dips_with_table(&args.analysis()).context("terrace dips")?;
    report::log_skipped(&dips);

    let path = report::report_path(&args.data_dir, &args.prefix, report::DIPS_CSV_SUFFIX);
    report::write_dip_csv(&path, &dips.estimates)?;
    info!(path = %path.display(), terraces = dips.estimates.len(), "dip report written");

    if plots {
        let cfg = args.render();
        let groups = table.xyz_groups();
        for est in &dips.estimates {
            let points = groups.get(&est.terrace_id).map_or(&[][..], Vec::as_slice);
            let img = render::dip::render_dip(est, points, &cfg)
                .with_context(|| format!("dip figure for terrace {}", est.terrace_id))?;
            args.save(&img, &format!("_terrace_{}_dip", est.terrace_id))?;
        }
    }
    Ok(())
}

fn run_areas(args: &CommonArgs, cell_size: f64) -> Result<()> {
    let (table, _) = pipeline::filtered_terraces(&args.analysis()).context("terrace table")?;
    let default_area = cell_size * cell_size;

    let id_path = raster_path(&args.data_dir, &args.prefix, TERRACE_ID_SUFFIX);
    let cell_area = if id_path.is_file() {
        let ids = args.raster(TERRACE_ID_SUFFIX)?;
        let raster_counts = pixel_counts(&ids);
        for (terrace_id, n) in table.group_sizes() {
            let in_raster = raster_counts.get(&terrace_id).copied().unwrap_or(0);
            if in_raster != n {
                debug!(terrace_id, table = n, raster = in_raster, "pixel counts differ");
            }
        }
        raster_cell_area(&ids, default_area)
    } else {
        warn!(path = %id_path.display(), cell_size, "no terrace-ID raster, using --cell-size");
        default_area
    };

    let areas = terrace_areas(&table, cell_area);
    let path = report::report_path(&args.data_dir, &args.prefix, report::AREAS_CSV_SUFFIX);
    report::write_area_csv(&path, &areas)?;
    info!(path = %path.display(), terraces = areas.len(), cell_area, "area report written");
    Ok(())
}

/// Every output; a failing step is logged and the rest still run.
fn run_all(args: &AllArgs) -> Result<()> {
    let common = &args.common;
    let steps: [(&str, Box<dyn Fn() -> Result<()> + '_>); 5] = [
        ("long-profile", Box::new(|| run_long_profile(common, args.mean_channel))),
        ("raster-ids", Box::new(|| run_raster_ids(common))),
        ("raster-elev", Box::new(|| run_raster_elev(common))),
        ("dips", Box::new(|| run_dips(common, args.plots))),
        ("areas", Box::new(|| run_areas(common, args.cell_size))),
    ];

    let mut failed = Vec::new();
    for (name, step) in &steps {
        if let Err(err) = step() {
            error!(step = *name, "{err:#}");
            failed.push(*name);
        }
    }
    if !failed.is_empty() {
        bail!("{} of {} steps failed: {}", failed.len(), steps.len(), failed.join(", "));
    }
    Ok(())
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::LongProfile(args) => run_long_profile(&args.common, args.mean_channel),
        Commands::RasterIds(args) => run_raster_ids(args),
        Commands::RasterElev(args) => run_raster_elev(args),
        Commands::Dips(args) => run_dips(&args.common, args.plots),
        Commands::Areas(args) => run_areas(&args.common, args.cell_size),
        Commands::All(args) => run_all(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn common_flags_map_to_configs() {
        let cli = Cli::try_parse_from([
            "terrace_plotter",
            "long-profile",
            "--data-dir",
            "/data",
            "--prefix",
            "toro",
            "--min-size",
            "100",
            "--format",
            "jpg",
            "--size-format",
            "geomorphology",
        ])
        .unwrap();
        let Commands::LongProfile(LongProfileArgs { common: args, mean_channel }) = cli.command
        else {
            panic!("expected long-profile");
        };
        assert!(!mean_channel);
        let analysis = args.analysis();
        assert_eq!(analysis.prefix, "toro");
        assert_eq!(analysis.size_bounds, SizeBounds::new(100, 1_000_000));
        let render = args.render();
        assert_eq!(render.fig_format, FigFormat::Jpg);
        assert_eq!(render.size_format, SizeFormat::Geomorphology);
        assert_eq!(render.dpi, 300);
    }

    #[test]
    fn defaults_follow_script_defaults() {
        let cli = Cli::try_parse_from(["terrace_plotter", "areas", "--prefix", "toro"]).unwrap();
        let Commands::Areas(args) = cli.command else {
            panic!("expected areas");
        };
        assert_eq!(args.common.data_dir, PathBuf::from("."));
        assert_eq!(args.common.min_size, 5000);
        assert_eq!(args.common.max_size, 1_000_000);
        assert_eq!(args.common.format, FigFormat::Png);
        assert_eq!(args.common.size_format, SizeFormat::Esurf);
        assert_eq!(args.cell_size, 1.0);
    }

    #[test]
    fn mean_channel_flag_is_parsed() {
        let cli = Cli::try_parse_from([
            "terrace_plotter",
            "long-profile",
            "--prefix",
            "toro",
            "--mean-channel",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::LongProfile(LongProfileArgs { mean_channel: true, .. })
        ));
        let cli = Cli::try_parse_from(["terrace_plotter", "all", "--prefix", "t", "--mean-channel"])
            .unwrap();
        assert!(matches!(cli.command, Commands::All(AllArgs { mean_channel: true, .. })));
    }

    #[test]
    fn dips_plots_flag_is_optional() {
        let cli = Cli::try_parse_from(["terrace_plotter", "dips", "--prefix", "t", "--plots"]).unwrap();
        assert!(matches!(cli.command, Commands::Dips(DipArgs { plots: true, .. })));
        assert!(Cli::try_parse_from(["terrace_plotter", "dips"]).is_err());
    }
}
