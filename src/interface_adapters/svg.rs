// Serializes a draw list into a standalone SVG document.

use crate::use_cases::render::{DrawCommand, Point, Stroke};
use std::fmt::Write;

const BACKGROUND: &str = "#ffffff";
const FONT_FAMILY: &str = "sans-serif";

pub fn to_svg(commands: &[DrawCommand]) -> String {
    let (width, height) = commands
        .iter()
        .find_map(|command| match command {
            DrawCommand::Clear { width, height } => Some((*width, *height)),
            _ => None,
        })
        .unwrap_or((0.0, 0.0));

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    for command in commands {
        write_command(&mut out, command);
    }
    out.push_str("</svg>\n");
    out
}

fn write_command(out: &mut String, command: &DrawCommand) {
    // Writing into a String cannot fail.
    let _ = match command {
        DrawCommand::Clear { width, height } => writeln!(
            out,
            r#"<rect x="0" y="0" width="{width}" height="{height}" fill="{BACKGROUND}"/>"#
        ),
        DrawCommand::Line { from, to, stroke } => writeln!(
            out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" {}/>"#,
            from.x,
            from.y,
            to.x,
            to.y,
            stroke_attrs(stroke)
        ),
        DrawCommand::Circle {
            center,
            radius,
            fill,
            stroke,
        } => writeln!(
            out,
            r#"<circle cx="{}" cy="{}" r="{radius}" fill="{}"{}/>"#,
            center.x,
            center.y,
            fill.css(),
            stroke
                .as_ref()
                .map(|s| format!(" {}", stroke_attrs(s)))
                .unwrap_or_default()
        ),
        DrawCommand::Triangle {
            points,
            fill,
            stroke,
        } => writeln!(
            out,
            r#"<polygon points="{}" fill="{}" {}/>"#,
            polygon_points(points),
            fill.css(),
            stroke_attrs(stroke)
        ),
        DrawCommand::Label {
            anchor,
            text,
            color,
            font_size,
        } => writeln!(
            out,
            r#"<text x="{}" y="{}" fill="{}" font-size="{font_size}" font-family="{FONT_FAMILY}" text-anchor="middle" dominant-baseline="hanging">{}</text>"#,
            anchor.x,
            anchor.y,
            color.css(),
            escape(text)
        ),
    };
}

fn stroke_attrs(stroke: &Stroke) -> String {
    format!(
        r#"stroke="{}" stroke-width="{}""#,
        stroke.color.css(),
        stroke.width
    )
}

fn polygon_points(points: &[Point; 3]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
