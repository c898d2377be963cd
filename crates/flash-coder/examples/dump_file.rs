//! Simple dumper to inspect movie and media files.

use std::collections::BTreeMap;
use std::fs;

use flash_coder::codec::DecodeOptions;
use flash_coder::validate_movie;
use flash_coder::{AmfValue, FlvBody, FlvFile, Movie, MovieTag, decode_flv, read_movie};

fn format_amf(value: &AmfValue) -> String {
    match value {
        AmfValue::Number(n) => format!("{}", n),
        AmfValue::Bool(b) => format!("{}", b),
        AmfValue::String(s) | AmfValue::LongString(s) => {
            let preview: String = s.chars().take(60).collect();
            if s.chars().count() > 60 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        AmfValue::Null => "null".to_string(),
        AmfValue::Undefined => "undefined".to_string(),
        AmfValue::Object(entries) | AmfValue::EcmaArray { entries, .. } => {
            let fields: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", key, format_amf(value)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        AmfValue::StrictArray(items) => format!("[{} items]", items.len()),
        AmfValue::Date { millis, timezone } => format!("DATE({}, tz={})", millis, timezone),
    }
}

fn tag_name(tag: &MovieTag) -> String {
    match tag {
        MovieTag::Unknown { code, data, .. } => format!("Unknown(code={}, {} bytes)", code, data.len()),
        MovieTag::DefineShape(shape) => format!(
            "DefineShape{:?} id={} ({} records)",
            shape.version,
            shape.id,
            shape.shape.records.len()
        ),
        MovieTag::DefineSprite(sprite) => format!(
            "DefineSprite id={} frames={} ({} tags)",
            sprite.id,
            sprite.frame_count,
            sprite.tags.len()
        ),
        MovieTag::DefineImage(image) => format!(
            "DefineImage id={} {}x{} {:?}",
            image.id, image.width, image.height, image.format
        ),
        MovieTag::DoAction(actions) => format!("DoAction ({} actions)", actions.len()),
        MovieTag::PlaceObject(place) => format!("PlaceObject depth={} character={:?}", place.depth, place.character),
        other => format!("{:?}", other),
    }
}

fn dump_movie(movie: &Movie) {
    println!("\n=== Movie Info ===");
    println!("Version: {}", movie.version);
    println!("Compressed: {}", movie.compressed);
    println!(
        "Stage: {}x{} px",
        (movie.frame_size.max_x - movie.frame_size.min_x) / 20,
        (movie.frame_size.max_y - movie.frame_size.min_y) / 20
    );
    println!("Frame rate: {:.2}", movie.frame_rate.to_f32());
    println!("Frames: {}", movie.frame_count);
    if let Err(err) = validate_movie(movie) {
        println!("Validation: {}", err);
    }

    let mut counts: BTreeMap<u16, usize> = BTreeMap::new();
    for tag in &movie.tags {
        *counts.entry(tag.code()).or_default() += 1;
    }
    println!("\n=== Records ({}) ===", movie.tags.len());
    for (code, count) in &counts {
        println!("  code {:>4}: {}", code, count);
    }

    println!("\n=== First 20 Records (detail) ===");
    for (i, tag) in movie.tags.iter().take(20).enumerate() {
        println!("[{}] {}", i, tag_name(tag));
    }
}

fn dump_media(file: &FlvFile) {
    println!("\n=== Media Info ===");
    println!("Version: {}", file.version);
    println!("Audio: {}, Video: {}", file.has_audio, file.has_video);
    println!("Tags: {}", file.tags.len());

    for (i, tag) in file.tags.iter().take(20).enumerate() {
        match &tag.body {
            FlvBody::Audio(audio) => println!(
                "[{}] {:>8}ms audio format={} {} bytes",
                i,
                tag.timestamp,
                audio.format,
                audio.data.len()
            ),
            FlvBody::Video(video) => println!(
                "[{}] {:>8}ms video codec={} frame={} {} bytes",
                i,
                tag.timestamp,
                video.codec,
                video.frame_type,
                video.data.len()
            ),
            FlvBody::Script(values) => {
                let values: Vec<String> = values.iter().map(format_amf).collect();
                println!("[{}] {:>8}ms script {}", i, tag.timestamp, values.join(" "));
            }
            FlvBody::Unknown { tag_type, data } => {
                println!("[{}] {:>8}ms type {} ({} bytes)", i, tag.timestamp, tag_type, data.len())
            }
        }
    }
}

fn main() {
    let path = std::env::args().nth(1).unwrap_or_else(|| "movie.swf".to_string());

    println!("Reading: {}", path);

    if path.ends_with(".flv") {
        let data = fs::read(&path).expect("Failed to read file");
        println!("File size: {} bytes", data.len());
        let file = decode_flv(&data).expect("Failed to decode");
        dump_media(&file);
    } else {
        let file = fs::File::open(&path).expect("Failed to open file");
        let options = DecodeOptions { skip_malformed: true, ..DecodeOptions::default() };
        let movie = read_movie(file, &options).expect("Failed to decode");
        dump_movie(&movie);
    }
}
