//! Whole-page scenarios through the public pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as DrawRect;

use examcrop::config::SegmentationConfig;
use examcrop::layout::LayoutAnalyzer;
use examcrop::models::{PageImage, PixelFormat, Rect, TextLine};
use examcrop::ocr::PrecomputedRecognizer;
use examcrop::orchestrator::{Orchestrator, RecognitionMode};
use examcrop::pipeline::PageSegmenter;
use examcrop::vision::{EncodedImage, VisionConfig, VisionEngine, VisionEngineKind, VisionError};

fn blank_page() -> PageImage {
    PageImage::from_raw(vec![255; 900 * 1400], 900, 1400, 150, PixelFormat::Gray8)
}

fn lines(rows: &[(&str, i32, i32, i32)]) -> Vec<TextLine> {
    rows.iter()
        .enumerate()
        .map(|(i, (text, left, top, right))| {
            TextLine::new(*text, Rect::new(*left, *top, *right, top + 24), 0.9, i)
        })
        .collect()
}

fn segmenter(lines: Vec<TextLine>) -> PageSegmenter {
    let orchestrator = Orchestrator::new(RecognitionMode::OnDevice)
        .with_primary(Arc::new(PrecomputedRecognizer::new(lines)));
    PageSegmenter::new(&SegmentationConfig::default(), orchestrator)
}

#[tokio::test]
async fn test_single_question_on_blank_page() {
    let lines = lines(&[
        ("1. Aşağıdakilerden hangisi bir asal sayıdır?", 60, 100, 700),
        ("A) 4", 60, 140, 300),
        ("B) 6", 60, 170, 300),
        ("C) 7", 60, 200, 300),
        ("D) 9", 60, 236, 300),
    ]);
    let result = segmenter(lines).segment_page(1, blank_page()).await.unwrap();

    assert_eq!(result.boundaries.len(), 1);
    let boundary = &result.boundaries[0];
    assert_eq!(boundary.question_number, 1);
    assert_eq!(boundary.bounding_box.bottom, 270);
    assert!(boundary.bounding_box.top < 300);
    assert!(boundary.confidence >= 0.8);

    let question = &result.questions[0];
    assert_eq!(question.options.len(), 4);
    assert!(question.body.starts_with("1. Aşağıdakilerden"));
}

#[tokio::test]
async fn test_two_column_results_do_not_overlap() {
    let mut gray = GrayImage::from_pixel(900, 1400, Luma([255]));
    for i in 0..10 {
        let y = 200 + i * 50;
        draw_filled_rect_mut(&mut gray, DrawRect::at(50, y).of_size(200, 14), Luma([0]));
        draw_filled_rect_mut(&mut gray, DrawRect::at(650, y).of_size(200, 14), Luma([0]));
    }
    let page = PageImage::from_dynamic(DynamicImage::ImageLuma8(gray), 150);

    let mut rows = Vec::new();
    for ((left, right), first) in [((60, 240), 1), ((660, 840), 3)] {
        for (k, top) in [200, 500].into_iter().enumerate() {
            rows.push((format!("{}. Soru kökü metni burada", first + k), left, top, right));
            for (j, label) in ["A) a", "B) b", "C) c", "D) d"].iter().enumerate() {
                rows.push((label.to_string(), left, top + 30 * (j as i32 + 1), right));
            }
        }
    }
    let rows: Vec<(&str, i32, i32, i32)> =
        rows.iter().map(|(t, l, top, r)| (t.as_str(), *l, *top, *r)).collect();

    let result = segmenter(lines(&rows)).segment_page(1, page).await.unwrap();
    assert_eq!(result.column_count, 2);

    let numbers: Vec<u32> = result.boundaries.iter().map(|b| b.question_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    let left: Vec<&Rect> = result
        .boundaries
        .iter()
        .filter(|b| b.column_index == 0)
        .map(|b| &b.bounding_box)
        .collect();
    let right: Vec<&Rect> = result
        .boundaries
        .iter()
        .filter(|b| b.column_index == 1)
        .map(|b| &b.bounding_box)
        .collect();
    for l in &left {
        for r in &right {
            assert!(l.right <= r.left, "{} overlaps {}", l, r);
        }
    }
}

#[tokio::test]
async fn test_corrupt_page_still_segments_on_full_width() {
    let page = PageImage::from_raw(vec![1, 2, 3], 900, 1400, 150, PixelFormat::Rgb8);
    let layout = LayoutAnalyzer::default().analyze(&page);
    assert_eq!(layout.column_count, 1);
    assert_eq!((layout.columns[0].start_x, layout.columns[0].end_x), (0, 900));

    let lines = lines(&[
        ("1. Bozuk sayfada soru", 60, 100, 700),
        ("A) bir", 60, 140, 300),
        ("B) iki", 60, 170, 300),
    ]);
    let result = segmenter(lines).segment_page(1, page).await.unwrap();
    assert_eq!(result.boundaries.len(), 1);
}

struct Unmatched;

#[async_trait]
impl VisionEngine for Unmatched {
    fn kind(&self) -> VisionEngineKind {
        VisionEngineKind::Gemini
    }

    fn model(&self) -> &str {
        "fixture"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    fn config(&self) -> &VisionConfig {
        static CONFIG: std::sync::OnceLock<VisionConfig> = std::sync::OnceLock::new();
        CONFIG.get_or_init(VisionConfig::default)
    }

    async fn complete(&self, _image: &EncodedImage, _prompt: &str) -> Result<String, VisionError> {
        let question = |n: u32| {
            format!(
                r#"{{"number":{},"text":"Görünmeyen soru {}","options":{{"A":"x","B":"y","C":"z","D":"w"}},"confidence":0.9}}"#,
                n, n
            )
        };
        Ok(format!(
            r#"{{"questions":[{},{},{}]}}"#,
            question(1),
            question(2),
            question(3)
        ))
    }
}

#[tokio::test]
async fn test_unanchored_vision_questions_span_the_page() {
    let orchestrator = Orchestrator::new(RecognitionMode::Vision).with_vision(Arc::new(Unmatched));
    let segmenter = PageSegmenter::new(&SegmentationConfig::default(), orchestrator);
    let result = segmenter.segment_page(1, blank_page()).await.unwrap();

    assert_eq!(result.boundaries.len(), 3);
    for boundary in &result.boundaries {
        assert!(boundary.bounding_box.area() > 0);
    }
    let tops: Vec<i32> = result.boundaries.iter().map(|b| b.bounding_box.top).collect();
    assert!(tops.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(result.boundaries[0].bounding_box.top, 0);
    assert_eq!(result.boundaries[2].bounding_box.bottom, 1400);
}
