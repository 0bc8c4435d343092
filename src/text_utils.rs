// src/text_utils.rs
// Utility functions for text formatting

use textwrap::core::display_width;

/// Center a string within a given width
pub fn pad_centered(text: &str, width: usize) -> String {
    let line_width = display_width(text);
    let pad_left = if width > line_width { (width - line_width) / 2 } else { 0 };
    let mut content = String::with_capacity(width.max(line_width));
    for _ in 0..pad_left { content.push(' '); }
    content.push_str(text);
    content
}

/// Format a position in seconds as m:ss. Junk readings render as 0:00.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Elapsed / total label for the transport line.
pub fn time_label(position: f64, duration: f64) -> String {
    format!("{} / {}", format_clock(position), format_clock(duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_floors_seconds() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(59.9), "0:59");
        assert_eq!(format_clock(65.0), "1:05");
        assert_eq!(format_clock(600.0), "10:00");
        assert_eq!(format_clock(3725.2), "62:05");
    }

    #[test]
    fn clock_tolerates_junk_readings() {
        assert_eq!(format_clock(f64::NAN), "0:00");
        assert_eq!(format_clock(f64::INFINITY), "0:00");
        assert_eq!(format_clock(-3.0), "0:00");
    }

    #[test]
    fn label_pairs_elapsed_with_total() {
        assert_eq!(time_label(65.0, 212.0), "1:05 / 3:32");
    }

    #[test]
    fn centering_pads_the_left_side() {
        assert_eq!(pad_centered("ab", 6), "  ab");
        assert_eq!(pad_centered("abc", 2), "abc");
        assert_eq!(pad_centered("", 4), "  ");
    }
}
