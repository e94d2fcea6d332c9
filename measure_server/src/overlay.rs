//! Annotations drawn onto streamed frames.
use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{
        draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut,
        draw_line_segment_mut, draw_text_mut,
    },
    rect::Rect,
};
use rusttype::{Font, Scale};

use crate::{
    calibration::{DistanceGuidance, MIN_LANDMARK_CONFIDENCE},
    landmarks::{Pose, SKELETON},
    measure::BodyMeasurements,
    nn::Bbox,
};

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Draws shapes and, if a font could be loaded, text.
pub struct Overlay {
    font: Option<Font<'static>>,
}

impl Overlay {
    /// Load the TrueType font used for labels.
    pub fn load(font_path: &Path) -> Result<Self> {
        let data = std::fs::read(font_path)
            .with_context(|| format!("failed to read font {}", font_path.display()))?;
        let font = Font::try_from_vec(data)
            .with_context(|| format!("invalid font {}", font_path.display()))?;
        Ok(Self { font: Some(font) })
    }

    /// An overlay that only draws shapes.
    pub fn without_text() -> Self {
        Self { font: None }
    }

    /// Use the font at `font_path` if possible, draw shapes only otherwise.
    pub fn load_or_shapes_only(font_path: &Path) -> Self {
        Self::load(font_path).unwrap_or_else(|e| {
            log::warn!("Labels disabled: {e:#}");
            Self::without_text()
        })
    }

    /// Draw `text` with its baseline at `y`.
    pub fn label(&self, frame: &mut RgbImage, x: i32, y: i32, size: f32, color: Rgb<u8>, text: &str) {
        if let Some(font) = &self.font {
            let top = y - size as i32;
            draw_text_mut(frame, color, x, top, Scale::uniform(size), font, text);
        }
    }

    pub fn face_box(&self, frame: &mut RgbImage, bbox: &Bbox) {
        let (width, height) = (frame.width() as f32, frame.height() as f32);
        let (x_tl, y_tl) = (bbox[0] * width, bbox[1] * height);
        let (x_br, y_br) = (bbox[2] * width, bbox[3] * height);
        if x_br <= x_tl || y_br <= y_tl {
            return;
        }

        let rect = Rect::at(x_tl as i32, y_tl as i32)
            .of_size((x_br - x_tl).max(1.0) as u32, (y_br - y_tl).max(1.0) as u32);
        draw_hollow_rect_mut(frame, rect, GREEN);
    }

    /// Distance read-out with a hint whether to step closer or back.
    pub fn distance(&self, frame: &mut RgbImage, distance_cm: i32, guidance: DistanceGuidance) {
        draw_filled_rect_mut(frame, Rect::at(14, 14).of_size(232, 32), RED);
        draw_filled_rect_mut(frame, Rect::at(16, 16).of_size(228, 28), BLACK);
        self.label(frame, 30, 38, 20.0, GREEN, &format!("Distance: {distance_cm} cms"));

        let color = if guidance.is_perfect() { GREEN } else { RED };
        self.label(frame, 30, 90, 20.0, color, guidance.message());
    }

    /// Skeleton of the confidently detected keypoints.
    pub fn pose(&self, frame: &mut RgbImage, pose: &Pose) {
        let (width, height) = frame.dimensions();

        for (from, to) in SKELETON.iter() {
            let (a, b) = (pose.get(*from), pose.get(*to));
            if !a.is_visible(MIN_LANDMARK_CONFIDENCE) || !b.is_visible(MIN_LANDMARK_CONFIDENCE) {
                continue;
            }
            let (ax, ay) = a.to_pixel(width, height);
            let (bx, by) = b.to_pixel(width, height);
            draw_line_segment_mut(frame, (ax as f32, ay as f32), (bx as f32, by as f32), WHITE);
            draw_line_segment_mut(
                frame,
                (ax as f32 + 1.0, ay as f32),
                (bx as f32 + 1.0, by as f32),
                WHITE,
            );
        }

        for keypoint in pose.keypoints() {
            if keypoint.is_visible(MIN_LANDMARK_CONFIDENCE) {
                draw_filled_circle_mut(frame, keypoint.to_pixel(width, height), 4, RED);
            }
        }
    }

    /// Head and foot markers with the height read-out.
    pub fn height(&self, frame: &mut RgbImage, head: (i32, i32), foot: (i32, i32), height_cm: f32) {
        draw_filled_circle_mut(frame, head, 15, BLACK);
        draw_filled_circle_mut(frame, foot, 15, BLACK);
        self.label(frame, 40, 70, 32.0, YELLOW, &format!("Height : {height_cm:.0} cms"));
    }

    pub fn body(&self, frame: &mut RgbImage, body: &BodyMeasurements) {
        let lines = [
            (110, format!("Shoulder: {}cm", body.shoulder_width)),
            (150, format!("Chest: {}cm", body.chest_circumference)),
            (190, format!("Waist: {}cm", body.waist_circumference)),
        ];
        for (y, text) in lines {
            self.label(frame, 40, y, 22.0, YELLOW, &text);
        }
    }

    pub fn countdown(&self, frame: &mut RgbImage, remaining_secs: u64) {
        self.label(
            frame,
            40,
            400,
            22.0,
            YELLOW,
            &format!("Capturing in: {remaining_secs}s"),
        );
    }

    pub fn saved(&self, frame: &mut RgbImage) {
        self.label(frame, 40, 440, 22.0, GREEN, "Measurements saved to database!");
    }

    pub fn fps(&self, frame: &mut RgbImage, fps: f32) {
        self.label(frame, 40, 30, 28.0, BLACK, &format!("FPS : {}", fps as u32));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::landmarks::{Keypoint, Landmark};

    #[test]
    fn distance_bar_has_a_red_border() {
        let overlay = Overlay::without_text();
        let mut frame = RgbImage::new(320, 240);
        overlay.distance(&mut frame, 300, DistanceGuidance::Perfect);

        assert_eq!(frame.get_pixel(14, 14), &RED);
        assert_eq!(frame.get_pixel(100, 30), &BLACK);
    }

    #[test]
    fn face_box_is_drawn_in_relative_coordinates() {
        let overlay = Overlay::without_text();
        let mut frame = RgbImage::new(100, 100);
        overlay.face_box(&mut frame, &[0.25, 0.25, 0.75, 0.75]);

        assert_eq!(frame.get_pixel(25, 50), &GREEN);
        assert_eq!(frame.get_pixel(50, 50), &BLACK);
    }

    #[test]
    fn hidden_limbs_are_not_drawn() {
        let overlay = Overlay::without_text();
        let mut frame = RgbImage::new(100, 100);
        let mut pose = Pose::default();
        pose.set(Landmark::LeftShoulder, Keypoint::new(0.2, 0.5, 0.9));
        pose.set(Landmark::RightShoulder, Keypoint::new(0.8, 0.5, 0.1));
        overlay.pose(&mut frame, &pose);

        assert_eq!(frame.get_pixel(50, 50), &BLACK);
        assert_eq!(frame.get_pixel(20, 50), &RED);
    }

    #[test]
    fn missing_font_falls_back_to_shapes() {
        let overlay = Overlay::load_or_shapes_only(Path::new("/nonexistent/font.ttf"));
        let mut frame = RgbImage::new(50, 50);
        overlay.label(&mut frame, 0, 40, 20.0, WHITE, "ignored");
        assert!(frame.pixels().all(|p| *p == BLACK));
    }
}
