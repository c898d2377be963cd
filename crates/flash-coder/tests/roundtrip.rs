//! Whole-file round trips through the public entry points.

use flash_coder::codec::{EncodeOptions, Fixed8};
use flash_coder::model::{
    AudioData, BasicAction, DefineImage, DefineSprite, PlaceObject, PushValue, VideoData,
};
use flash_coder::{
    Action, AmfValue, Bounds, Color, DecodeOptions, ErrorKind, FlvBody, FlvFile, FlvTag, Movie,
    MovieTag, decode_flv, decode_movie, encode_flv, encode_movie, read_movie, validate_movie,
    write_movie,
};

fn pixels() -> Vec<u8> {
    let mut argb = Vec::new();
    for i in 0..16u8 {
        argb.extend_from_slice(&[0xFF, i * 16, 255 - i * 16, i]);
    }
    argb
}

fn sample_movie() -> Movie {
    let mut movie = Movie::new(8);
    movie.frame_size = Bounds::new(0, 0, 550 * 20, 400 * 20);
    movie.frame_rate = Fixed8::from_f32(24.0);
    movie.frame_count = 2;
    movie.tags = vec![
        MovieTag::FileAttributes(0x08),
        MovieTag::SetBackgroundColor(Color::rgb(0x33, 0x66, 0x99)),
        MovieTag::DefineImage(DefineImage::from_argb(1, 4, 4, &pixels()).unwrap()),
        MovieTag::DefineSprite(DefineSprite {
            id: 2,
            frame_count: 1,
            tags: vec![
                MovieTag::PlaceObject(PlaceObject { depth: 1, character: Some(1), ..PlaceObject::default() }),
                MovieTag::ShowFrame,
            ],
        }),
        MovieTag::PlaceObject(PlaceObject {
            depth: 1,
            character: Some(2),
            name: Some("clip".to_string()),
            ..PlaceObject::default()
        }),
        MovieTag::DoAction(vec![
            Action::Push(vec![PushValue::String("frame".to_string()), PushValue::Integer(1)]),
            Action::Basic(BasicAction::Trace),
            Action::Basic(BasicAction::Stop),
        ]),
        MovieTag::ShowFrame,
        MovieTag::Unknown { code: 500, data: vec![1, 2, 3, 4], extended: false },
        MovieTag::ShowFrame,
    ];
    movie
}

#[test]
fn test_movie_roundtrip() {
    let movie = sample_movie();
    assert_eq!(validate_movie(&movie), Ok(()));

    let bytes = encode_movie(&movie).unwrap();
    assert_eq!(&bytes[..4], b"FWS\x08");
    assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize, bytes.len());

    let decoded = decode_movie(&bytes).unwrap();
    assert_eq!(decoded, movie);
    assert_eq!(encode_movie(&decoded).unwrap(), bytes);

    match &decoded.tags[2] {
        MovieTag::DefineImage(image) => assert_eq!(image.pixels().unwrap(), pixels()),
        other => panic!("expected image, got {:?}", other),
    }
}

#[test]
fn test_compressed_movie_stream() {
    let movie = sample_movie();
    let mut out = Vec::new();
    write_movie(&movie, &mut out, &EncodeOptions::compressed(9)).unwrap();
    assert_eq!(&out[..3], b"CWS");

    let decoded = read_movie(out.as_slice(), &DecodeOptions::default()).unwrap();
    assert!(decoded.compressed);
    assert_eq!(decoded.tags, movie.tags);

    // Same body as the uncompressed form.
    let plain = encode_movie(&movie).unwrap();
    assert_eq!(&out[4..8], &plain[4..8]);
}

#[test]
fn test_strict_mode_reports_unknown_record() {
    let bytes = encode_movie(&sample_movie()).unwrap();
    let err = flash_coder::codec::decode_movie_with_options(&bytes, &DecodeOptions::strict()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTag);
}

#[test]
fn test_truncated_movie_fails() {
    let bytes = encode_movie(&sample_movie()).unwrap();
    // Cuts the last ShowFrame record in half.
    let mut truncated = bytes[..bytes.len() - 11].to_vec();
    let len = truncated.len() as u32;
    truncated[4..8].copy_from_slice(&len.to_le_bytes());
    assert!(decode_movie(&truncated).is_err());
}

fn sample_media() -> FlvFile {
    FlvFile {
        version: 1,
        has_audio: true,
        has_video: true,
        tags: vec![
            FlvTag {
                timestamp: 0,
                stream_id: 0,
                body: FlvBody::Script(vec![
                    AmfValue::String("onMetaData".to_string()),
                    AmfValue::EcmaArray {
                        count: 3,
                        entries: vec![
                            ("duration".to_string(), AmfValue::Number(2.0)),
                            ("width".to_string(), AmfValue::Number(320.0)),
                            ("stereo".to_string(), AmfValue::Bool(true)),
                        ],
                    },
                ]),
            },
            FlvTag {
                timestamp: 0,
                stream_id: 0,
                body: FlvBody::Video(VideoData { frame_type: 1, codec: 7, data: vec![0, 0, 0, 0, 0x17] }),
            },
            FlvTag {
                timestamp: 23,
                stream_id: 0,
                body: FlvBody::Audio(AudioData {
                    format: 10,
                    rate: 3,
                    sixteen_bit: true,
                    stereo: true,
                    data: vec![1, 0x12, 0x10],
                }),
            },
            FlvTag { timestamp: 40, stream_id: 0, body: FlvBody::Unknown { tag_type: 30, data: vec![9; 5] } },
        ],
        ..FlvFile::default()
    }
}

#[test]
fn test_media_roundtrip() {
    let file = sample_media();
    let bytes = encode_flv(&file).unwrap();
    assert_eq!(&bytes[..5], b"FLV\x01\x05");
    assert_eq!(&bytes[5..13], &[0, 0, 0, 9, 0, 0, 0, 0]);

    let decoded = decode_flv(&bytes).unwrap();
    assert_eq!(decoded, file);
    assert_eq!(encode_flv(&decoded).unwrap(), bytes);

    // The file ends with the size of the last tag: 11 header + 5 body.
    assert_eq!(&bytes[bytes.len() - 4..], &16u32.to_be_bytes());
}

#[test]
fn test_media_truncated_tag() {
    let bytes = encode_flv(&sample_media()).unwrap();
    let err = decode_flv(&bytes[..bytes.len() - 2]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}
