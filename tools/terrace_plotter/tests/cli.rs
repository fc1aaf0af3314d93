//! Runs the built binary against a small synthetic site on disk.
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;

const PREFIX: &str = "toro";
const N: usize = 20;

fn write_csvs(dir: &Path) {
    let mut terraces = String::from("TerraceID,DistAlongBaseline,DistToBaseline,Elevation,X,Y\n");
    for (id, nx, base) in [(2, 40, 520.0), (3, 60, 540.0)] {
        for i in 0..nx {
            for j in 0..10 {
                let along = i as f64 * 10.0;
                let z = base + 0.002 * along + 0.01 * j as f64;
                let (x, y) = (350_000.0 + along, 9_500_000.0 + j as f64 * 10.0);
                writeln!(terraces, "{id},{along},{},{z},{x},{y}", j as f64 * 10.0).unwrap();
            }
        }
    }
    fs::write(dir.join(format!("{PREFIX}_terrace_info.csv")), terraces).unwrap();

    let mut channel = String::from("DistAlongBaseline,Elevation\n");
    for i in 0..30 {
        let z = if i == 4 { -9999.0 } else { 500.0 + i as f64 * 0.4 };
        writeln!(channel, "{},{z}", i as f64 * 20.0).unwrap();
    }
    fs::write(dir.join(format!("{PREFIX}_baseline_channel_info.csv")), channel).unwrap();
}

/// Little-endian float32 ENVI BIL with 10 m pixels.
fn write_raster(dir: &Path, suffix: &str, value: impl Fn(usize, usize) -> f32) {
    let mut bytes = Vec::with_capacity(N * N * 4);
    for row in 0..N {
        for col in 0..N {
            bytes.extend_from_slice(&value(row, col).to_le_bytes());
        }
    }
    fs::write(dir.join(format!("{PREFIX}{suffix}.bil")), bytes).unwrap();
    let header = format!(
        "ENVI\nsamples = {N}\nlines = {N}\nbands = 1\nheader offset = 0\ndata type = 4\n\
         interleave = bil\nbyte order = 0\ndata ignore value = -9999\n\
         map info = {{UTM, 1, 1, 350000, 9500200, 10, 10, 18, South, WGS-84}}\n"
    );
    fs::write(dir.join(format!("{PREFIX}{suffix}.hdr")), header).unwrap();
}

fn write_site(dir: &Path) {
    write_csvs(dir);
    write_raster(dir, "_hs", |row, col| (row * 7 + col * 3) as f32);
    write_raster(dir, "_terrace_IDs", |_, col| match col {
        0..=3 => -9999.0,
        4..=11 => 2.0,
        _ => 3.0,
    });
    write_raster(dir, "_terrace_relief_final", |row, col| {
        if col < 4 { -9999.0 } else { (row + col) as f32 * 0.5 }
    });
}

fn plotter(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_terrace_plotter"))
        .args(args)
        .args(["--data-dir", dir.to_str().unwrap(), "--prefix", PREFIX])
        .args(["--min-size", "100", "--max-size", "10000"])
        .output()
        .unwrap()
}

#[test]
fn all_writes_every_output() {
    let dir = tempfile::tempdir().unwrap();
    write_site(dir.path());

    let out = plotter(dir.path(), &["all", "--plots"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    for name in [
        "toro_terrace_plot.png",
        "toro_terrace_IDs_raster_plot.png",
        "toro_terrace_elev_raster_plot.png",
        "toro_terrace_dips.csv",
        "toro_terrace_areas.csv",
        "toro_terrace_2_dip.png",
        "toro_terrace_3_dip.png",
    ] {
        assert!(dir.path().join(name).is_file(), "missing {name}");
    }

    let areas = fs::read_to_string(dir.path().join("toro_terrace_areas.csv")).unwrap();
    assert_eq!(areas, "TerraceID,PixelCount,AreaM2\n2,400,40000.0\n3,600,60000.0\n");
}

#[test]
fn long_profile_honours_format_flag() {
    let dir = tempfile::tempdir().unwrap();
    write_site(dir.path());

    let out = plotter(dir.path(), &["long-profile", "--format", "jpg", "--size-format", "big"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let img = image::open(dir.path().join("toro_terrace_plot.jpg")).unwrap();
    assert_eq!((img.width(), img.height()), (4800, 2700));
}

#[test]
fn size_exclusions_are_logged_by_default() {
    let dir = tempfile::tempdir().unwrap();
    write_site(dir.path());

    let out = Command::new(env!("CARGO_BIN_EXE_terrace_plotter"))
        .args(["long-profile", "--mean-channel", "--data-dir", dir.path().to_str().unwrap()])
        .args(["--prefix", PREFIX, "--min-size", "500"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let log = String::from_utf8_lossy(&out.stdout);
    let excluded: Vec<&str> =
        log.lines().filter(|l| l.contains("terrace excluded by size")).collect();
    assert_eq!(excluded.len(), 1, "log: {log}");
    assert!(excluded[0].contains("400"), "line: {}", excluded[0]);
    assert!(dir.path().join("toro_terrace_plot.png").is_file());
}

#[test]
fn no_surviving_terraces_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_site(dir.path());

    let out = Command::new(env!("CARGO_BIN_EXE_terrace_plotter"))
        .args(["dips", "--data-dir", dir.path().to_str().unwrap(), "--prefix", PREFIX])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(!dir.path().join("toro_terrace_dips.csv").exists());
}

#[test]
fn missing_inputs_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = plotter(dir.path(), &["areas"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("toro_terrace_info.csv"), "stderr: {stderr}");
}
