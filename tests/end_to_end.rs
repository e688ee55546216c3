use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use csv2gpx::altitude_corrector::{apply_corrections, window_corrections};
use csv2gpx::{pressure_altitude, ConvertError, Converter, ConverterConfig, OutputNaming};
use tempfile::TempDir;

const WINDOW: usize = 101;

fn line(pressure: f64) -> String {
    format!(
        "ID;DEV1;LAT;50.123456;LON;30.654321;ALT;120.5;DT;2024-04-20T07:00:00Z;PRESS;{}",
        pressure
    )
}

fn pressures(n: usize) -> Vec<f64> {
    (0..n).map(|i| 1005.2 - i as f64 * 0.01).collect()
}

fn write_log(dir: &Path, name: &str, lines: &[String]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

fn elevations(doc: &str) -> Vec<String> {
    doc.lines()
        .filter_map(|l| {
            let l = l.trim();
            l.strip_prefix("<ele>")
                .and_then(|rest| rest.strip_suffix("</ele>"))
                .map(str::to_string)
        })
        .collect()
}

#[test]
fn test_single_device_log_is_corrected_and_written() {
    let dir = TempDir::new().unwrap();
    let press = pressures(WINDOW);
    let lines: Vec<String> = press.iter().map(|&p| line(p)).collect();
    let input = write_log(dir.path(), "flight.csv", &lines);

    let converter = Converter::new(ConverterConfig::default()).unwrap();
    let conversion = converter.convert_file(&input, None).unwrap();

    let output = dir.path().join("flight.gpx");
    assert_eq!(conversion.summary.devices.len(), 1);
    assert_eq!(conversion.summary.devices[0].output.as_deref(), Some(output.as_path()));
    assert_eq!(conversion.summary.devices[0].corrected_points, WINDOW);
    assert_eq!(conversion.series[0].corrections.len(), 1);

    let doc = fs::read_to_string(&output).unwrap();
    assert_eq!(doc.matches("<trkpt ").count(), WINDOW);
    assert_eq!(doc.matches("<time>2024-04-20T07:00:00Z</time>").count(), WINDOW + 1);

    let gps = vec![120.5; WINDOW];
    let baro: Vec<f64> = press.iter().map(|&p| pressure_altitude(p)).collect();
    let corrections = window_corrections(&gps, &baro, WINDOW).unwrap();
    let expected: Vec<String> = apply_corrections(&baro, &corrections, WINDOW)
        .iter()
        .map(|v| format!("{:.10}", v))
        .collect();
    assert_eq!(elevations(&doc), expected);

    // With a single window the whole series shares one offset, so the
    // corrected profile keeps the barometric shape around the GPS mean.
    let offset = corrections[0];
    let mean_baro = baro.iter().sum::<f64>() / WINDOW as f64;
    assert!((offset - (120.5 - mean_baro)).abs() < 1e-9);
}

#[test]
fn test_output_is_readable_gpx() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = pressures(WINDOW + 20).iter().map(|&p| line(p)).collect();
    let input = write_log(dir.path(), "flight.csv", &lines);
    let output = dir.path().join("out.gpx");

    Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_file(&input, Some(&output))
        .unwrap();

    let gpx = gpx::read(BufReader::new(File::open(&output).unwrap())).unwrap();
    assert_eq!(gpx.version, gpx::GpxVersion::Gpx11);
    assert_eq!(gpx.creator.as_deref(), Some("rust-csv2gpx"));
    assert_eq!(gpx.tracks.len(), 1);
    assert_eq!(gpx.tracks[0].segments.len(), 1);
    let points = &gpx.tracks[0].segments[0].points;
    assert_eq!(points.len(), WINDOW + 20);
    for p in points {
        assert!((p.point().y() - 50.123456).abs() < 1e-9);
        assert!((p.point().x() - 30.654321).abs() < 1e-9);
        assert!(p.time.is_some());
        let ele = p.elevation.unwrap();
        assert!((ele - 120.5).abs() < 10.0, "elevation {}", ele);
    }
}

#[test]
fn test_fix_without_longitude_is_left_out() {
    let dir = TempDir::new().unwrap();
    let mut lines: Vec<String> = pressures(WINDOW).iter().map(|&p| line(p)).collect();
    lines.insert(
        0,
        "ID;DEV1;LAT;50.1;ALT;120;DT;2024-04-20T06:59:59Z;PRESS;1005.3".to_string(),
    );
    let input = write_log(dir.path(), "nolon.csv", &lines);
    let output = dir.path().join("nolon.gpx");

    let conversion = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_file(&input, Some(&output))
        .unwrap();
    assert_eq!(conversion.summary.dropped_points, 1);

    let doc = fs::read_to_string(&output).unwrap();
    assert!(!doc.contains("lat=\"50.1000000000\""));
    let gpx = gpx::read(BufReader::new(File::open(&output).unwrap())).unwrap();
    assert_eq!(gpx.tracks[0].segments[0].points.len(), WINDOW);
}

#[test]
fn test_high_hdop_point_is_dropped() {
    let dir = TempDir::new().unwrap();
    let mut lines: Vec<String> = pressures(WINDOW).iter().map(|&p| line(p)).collect();
    lines.insert(
        50,
        "ID;DEV1;LAT;51.5;LON;31.5;ALT;300;DT;2024-04-20T07:00:50Z;PRESS;1000;HDOP;6.0".to_string(),
    );
    let input = write_log(dir.path(), "hdop.csv", &lines);

    let conversion = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_file(&input, None)
        .unwrap();
    assert_eq!(conversion.summary.dropped_points, 1);
    assert_eq!(conversion.summary.admitted_points, WINDOW);

    let doc = fs::read_to_string(dir.path().join("hdop.gpx")).unwrap();
    assert_eq!(doc.matches("<trkpt ").count(), WINDOW);
    assert!(!doc.contains("51.5000000000"));
    assert!(!doc.contains("07:00:50"));
}

#[test]
fn test_odd_token_line_aborts_without_output() {
    let dir = TempDir::new().unwrap();
    let mut lines: Vec<String> = pressures(WINDOW).iter().map(|&p| line(p)).collect();
    lines.insert(3, "ID;DEV1;LAT".to_string());
    let input = write_log(dir.path(), "broken.csv", &lines);

    let err = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_file(&input, None)
        .unwrap_err();
    assert!(err.to_string().starts_with("line 4:"));
    match err {
        ConvertError::OddTokenCount { line_number, content } => {
            assert_eq!(line_number, 4);
            assert_eq!(content, "ID;DEV1;LAT");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!dir.path().join("broken.gpx").exists());
}

#[test]
fn test_insufficient_data_produces_no_document() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = pressures(WINDOW - 1).iter().map(|&p| line(p)).collect();
    let input = write_log(dir.path(), "short.csv", &lines);

    let err = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_file(&input, None)
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::InsufficientData { available: 100, required: 101, .. }
    ));
    assert!(!dir.path().join("short.gpx").exists());

    // The same log converts once the correction stage is switched off.
    let config = ConverterConfig {
        altitude_correction: false,
        ..ConverterConfig::default()
    };
    Converter::new(config).unwrap().convert_file(&input, None).unwrap();
    let doc = fs::read_to_string(dir.path().join("short.gpx")).unwrap();
    assert_eq!(doc.matches("<ele>120.5000000000</ele>").count(), WINDOW - 1);
}

#[test]
fn test_points_without_pressure_keep_gps_altitude() {
    let dir = TempDir::new().unwrap();
    let mut lines: Vec<String> = pressures(WINDOW).iter().map(|&p| line(p)).collect();
    lines.push("ID;DEV1;LAT;50.2;LON;30.7;ALT;133.25;DT;2024-04-20T08:00:00Z".to_string());
    let input = write_log(dir.path(), "mixed.csv", &lines);

    let conversion = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_file(&input, None)
        .unwrap();
    assert_eq!(conversion.summary.devices[0].points, WINDOW + 1);
    assert_eq!(conversion.summary.devices[0].corrected_points, WINDOW);

    let doc = fs::read_to_string(dir.path().join("mixed.gpx")).unwrap();
    assert_eq!(elevations(&doc).last().map(String::as_str), Some("133.2500000000"));
}

#[test]
fn test_multiple_devices_shared_and_per_device() {
    let dir = TempDir::new().unwrap();
    let mut lines = Vec::new();
    for (i, p) in pressures(WINDOW).iter().enumerate() {
        lines.push(line(*p));
        lines.push(format!(
            "ID;DEV2;LAT;48.{};LON;11.5;ALT;520;DT;2024-04-20T07:00:00Z;PRESS;{}",
            i, p - 50.0
        ));
    }
    let input = write_log(dir.path(), "fleet.csv", &lines);

    let shared = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_file(&input, None)
        .unwrap();
    let shared_path = dir.path().join("fleet.gpx");
    assert!(shared
        .summary
        .devices
        .iter()
        .all(|d| d.output.as_deref() == Some(shared_path.as_path())));
    // Last device written wins.
    let doc = fs::read_to_string(&shared_path).unwrap();
    assert!(doc.contains("<name>DEV2</name>"));
    assert!(!doc.contains("<name>DEV1</name>"));

    let config = ConverterConfig {
        output_naming: OutputNaming::PerDevice,
        ..ConverterConfig::default()
    };
    let split = Converter::new(config).unwrap().convert_file(&input, None).unwrap();
    assert_eq!(split.series.len(), 2);
    assert_eq!(split.series_rows().len(), 2 * WINDOW);
    let dev1 = fs::read_to_string(dir.path().join("fleet_DEV1.gpx")).unwrap();
    let dev2 = fs::read_to_string(dir.path().join("fleet_DEV2.gpx")).unwrap();
    assert!(dev1.contains("<name>DEV1</name>"));
    assert!(dev2.contains("<name>DEV2</name>"));
    assert_eq!(dev2.matches("<trkpt ").count(), WINDOW);
}

#[test]
fn test_folder_conversion_counts_failures() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir_all(logs.join("nested")).unwrap();
    let good: Vec<String> = pressures(WINDOW).iter().map(|&p| line(p)).collect();
    write_log(&logs, "a.csv", &good);
    write_log(&logs.join("nested"), "b.CSV", &good);
    write_log(&logs, "bad.csv", &["ID;X;LAT".to_string()]);
    write_log(&logs, "notes.txt", &["not a log".to_string()]);

    let out = dir.path().join("gpx");
    let batch = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_directory(&logs, Some(&out))
        .unwrap();

    assert_eq!(batch.converted.len(), 2);
    assert_eq!(batch.failed.len(), 1);
    assert!(batch.failed[0].0.ends_with("bad.csv"));
    assert!(out.join("a.gpx").exists());
    assert!(out.join("nested").join("b.gpx").exists());
    assert!(!out.join("bad.gpx").exists());
}

#[test]
fn test_folder_conversion_keeps_same_named_logs_apart() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir_all(logs.join("nested")).unwrap();
    let first: Vec<String> = pressures(WINDOW).iter().map(|&p| line(p)).collect();
    let second: Vec<String> = first.iter().map(|l| l.replace("DEV1", "SECOND")).collect();
    write_log(&logs, "a.csv", &first);
    write_log(&logs.join("nested"), "a.csv", &second);

    let out = dir.path().join("gpx");
    let batch = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_directory(&logs, Some(&out))
        .unwrap();
    assert_eq!(batch.converted.len(), 2);
    assert!(batch.failed.is_empty());
    let top = fs::read_to_string(out.join("a.gpx")).unwrap();
    let nested = fs::read_to_string(out.join("nested").join("a.gpx")).unwrap();
    assert!(top.contains("<name>DEV1</name>"));
    assert!(nested.contains("<name>SECOND</name>"));
}

// Needs a case-sensitive file system to hold both logs.
#[cfg(target_os = "linux")]
#[test]
fn test_folder_conversion_refuses_to_overwrite_a_document() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    let first: Vec<String> = pressures(WINDOW).iter().map(|&p| line(p)).collect();
    let second: Vec<String> = first.iter().map(|l| l.replace("DEV1", "SECOND")).collect();
    write_log(&logs, "a.CSV", &first);
    write_log(&logs, "a.csv", &second);

    let batch = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_directory(&logs, None)
        .unwrap();
    assert_eq!(batch.converted.len(), 1);
    assert_eq!(batch.failed.len(), 1);
    // Sorted order: a.CSV is converted first and keeps its document.
    assert!(batch.failed[0].0.ends_with("a.csv"));
    let doc = fs::read_to_string(logs.join("a.gpx")).unwrap();
    assert!(doc.contains("<name>DEV1</name>"));
}

#[test]
fn test_config_file_drives_pipeline() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("converter.toml");
    fs::write(
        &config_path,
        "window_size = 3\nenvironment_extensions = false\ncoordinate_check = \"either\"\n",
    )
    .unwrap();
    let config = ConverterConfig::from_file(&config_path).unwrap();

    let lines = vec![
        "ID;E;LAT;0.0;LON;12.5;ALT;10;PRESS;1010;TEMP;20;DT;2024-04-20T07:00:00Z".to_string(),
        "ID;E;LAT;0.0;LON;12.6;ALT;11;PRESS;1010.1;TEMP;20;DT;2024-04-20T07:00:01Z".to_string(),
        "ID;E;LAT;0.0;LON;12.7;ALT;12;PRESS;1010.2;TEMP;20;DT;2024-04-20T07:00:02Z".to_string(),
    ];
    let input = write_log(dir.path(), "equator.csv", &lines);
    let conversion = Converter::new(config).unwrap().convert_file(&input, None).unwrap();
    assert_eq!(conversion.summary.admitted_points, 3);

    let doc = fs::read_to_string(dir.path().join("equator.gpx")).unwrap();
    assert!(doc.contains("lon=\"12.5000000000\""));
    assert!(!doc.contains("<extensions>"));
}

#[test]
fn test_missing_input_reports_path() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.csv");
    let err = Converter::new(ConverterConfig::default())
        .unwrap()
        .convert_file(&missing, None)
        .unwrap_err();
    assert!(matches!(err, ConvertError::Io { ref path, .. } if path == &missing));
}
