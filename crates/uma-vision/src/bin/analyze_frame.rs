//! CLI tool to run marker detection and event-name OCR on a saved screenshot.
//! Usage: cargo run -p uma-vision --features cli --bin analyze_frame -- <screenshot.png> <template.png> [output_dir]

use std::path::PathBuf;
use uma_capture::{regions, Screenshot};
use uma_vision::{extract_text, EventNameReader, LocateParams, MarkerLocator};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <screenshot.png> <template.png> [output_dir]", args[0]);
        std::process::exit(1);
    }

    let input_path = PathBuf::from(&args[1]);
    let template_path = PathBuf::from(&args[2]);
    let output_dir = if args.len() >= 4 {
        PathBuf::from(&args[3])
    } else {
        PathBuf::from("./debug_output")
    };
    let _ = std::fs::create_dir_all(&output_dir);

    println!("Loading image: {}", input_path.display());
    let img = image::open(&input_path)
        .expect("Failed to open image")
        .to_rgba8();
    println!("Image size: {}x{}", img.width(), img.height());
    let shot = Screenshot::now(img);

    let template = image::open(&template_path)
        .expect("Failed to open template")
        .to_luma8();
    let mut locator = MarkerLocator::new();
    locator.insert("marker", &template);

    println!("\n=== Marker Detection ===");
    let choice_region = regions::event_choices();
    let crop = shot.crop(&choice_region);
    let _ = crop.save(output_dir.join("choice_region.png"));

    for (label, brightness) in [("raw", 0.0), ("bright", 160.0)] {
        let params = LocateParams {
            region: choice_region,
            confidence_threshold: 0.45,
            brightness_threshold: brightness,
        };
        let markers = locator.locate_markers(&shot, "marker", &params);
        println!("{} markers: {}", label, markers.len());
        for (i, m) in markers.iter().enumerate() {
            println!(
                "  #{} x={} y={} w={} h={} confidence={:.2} brightness={:.1}",
                i + 1,
                m.x,
                m.y,
                m.width,
                m.height,
                m.confidence,
                m.brightness
            );
        }
    }

    println!("\n=== Event Name OCR ===");
    let name_region = regions::event_name();
    let reader = EventNameReader::new();
    let (text, crop) = extract_text(&reader, &shot, &name_region);
    let _ = crop.save(output_dir.join("event_name.png"));
    let _ = uma_vision::preprocess_for_ocr(&crop).save(output_dir.join("event_name_ocr.png"));
    if !reader.is_available() {
        println!("Tesseract not available!");
    } else if text.is_failure() {
        println!("Event name: NOT RECOGNIZED");
    } else {
        println!("Event name: {}", text.as_str());
    }

    println!("\nDebug images saved to: {}", output_dir.display());
}
