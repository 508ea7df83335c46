use cartosym_core::geometry::Point;
use cartosym_core::Color;
use serde::{Deserialize, Serialize};

use crate::canvas::{Canvas, MarkerGlyph, Stroke};

/// A single paint call captured by [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    Polyline {
        points: Vec<Point>,
        stroke: Stroke,
    },
    Polygon {
        exterior: Vec<Point>,
        holes: Vec<Vec<Point>>,
        fill: Option<Color>,
        stroke: Option<Stroke>,
    },
    Marker(MarkerGlyph),
}

impl DrawCommand {
    /// The dominant color of the command: fill if any, else the pen color.
    pub fn color(&self) -> Option<Color> {
        match self {
            DrawCommand::Polyline { stroke, .. } => Some(stroke.color),
            DrawCommand::Polygon { fill, stroke, .. } => {
                fill.or_else(|| stroke.as_ref().map(|s| s.color))
            }
            DrawCommand::Marker(glyph) => glyph.fill.or_else(|| glyph.stroke.as_ref().map(|s| s.color)),
        }
    }
}

/// Canvas that records paint calls instead of rasterizing them. The recorded
/// frame serializes to JSON for consumers that draw elsewhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Paint the recorded commands onto another canvas, in order.
    pub fn replay(&self, target: &mut dyn Canvas) {
        for command in &self.commands {
            match command {
                DrawCommand::Polyline { points, stroke } => target.draw_polyline(points, stroke),
                DrawCommand::Polygon {
                    exterior,
                    holes,
                    fill,
                    stroke,
                } => target.draw_polygon(exterior, holes, *fill, stroke.as_ref()),
                DrawCommand::Marker(glyph) => target.draw_marker(glyph),
            }
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Canvas for RecordingCanvas {
    fn draw_polyline(&mut self, points: &[Point], stroke: &Stroke) {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            stroke: stroke.clone(),
        });
    }

    fn draw_polygon(
        &mut self,
        exterior: &[Point],
        holes: &[Vec<Point>],
        fill: Option<Color>,
        stroke: Option<&Stroke>,
    ) {
        self.commands.push(DrawCommand::Polygon {
            exterior: exterior.to_vec(),
            holes: holes.to_vec(),
            fill,
            stroke: stroke.cloned(),
        });
    }

    fn draw_marker(&mut self, glyph: &MarkerGlyph) {
        self.commands.push(DrawCommand::Marker(glyph.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::MarkerShape;

    #[test]
    fn test_records_in_order_and_serializes() {
        let mut canvas = RecordingCanvas::new();
        canvas.draw_polyline(
            &[Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
            &Stroke::new(Color::BLACK, 1.0),
        );
        canvas.draw_marker(&MarkerGlyph {
            center: Point::new(2.0, 2.0),
            shape: MarkerShape::Square,
            size: 3.0,
            angle: 0.0,
            fill: Some(Color::WHITE),
            stroke: None,
        });
        assert_eq!(canvas.len(), 2);
        assert_eq!(canvas.commands()[1].color(), Some(Color::WHITE));

        let json = canvas.to_json().unwrap();
        assert!(json.contains("\"kind\": \"marker\""));
        let back = RecordingCanvas::from_json(&json).unwrap();
        assert_eq!(back.commands(), canvas.commands());
    }

    #[test]
    fn test_replay_copies_commands() {
        let mut source = RecordingCanvas::new();
        source.draw_polygon(
            &[Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(4.0, 4.0)],
            &[],
            Some(Color::BLACK),
            None,
        );
        let mut target = RecordingCanvas::new();
        source.replay(&mut target);
        assert_eq!(target.commands(), source.commands());
    }
}
