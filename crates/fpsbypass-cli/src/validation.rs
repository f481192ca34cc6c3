//! Operator input validation.

use fpsbypass_core::{MAX_FPS, MIN_FPS};

/// Parsed line from the FPS prompt
#[derive(Debug, PartialEq, Eq)]
pub enum FpsInput {
    Accepted(i32),
    Quit,
    Empty,
    NotANumber,
    OutOfRange(i64),
}

/// Interpret one line typed at the prompt
pub fn parse_fps_input(line: &str) -> FpsInput {
    let line = line.trim();
    if line.is_empty() {
        return FpsInput::Empty;
    }
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return FpsInput::Quit;
    }

    let Ok(value) = line.parse::<i64>() else {
        return FpsInput::NotANumber;
    };
    match i32::try_from(value) {
        Ok(fps) if (MIN_FPS..=MAX_FPS).contains(&fps) => FpsInput::Accepted(fps),
        _ => FpsInput::OutOfRange(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted() {
        assert_eq!(parse_fps_input("144"), FpsInput::Accepted(144));
        assert_eq!(parse_fps_input("  60 \r\n"), FpsInput::Accepted(60));
        assert_eq!(parse_fps_input("1"), FpsInput::Accepted(1));
        assert_eq!(parse_fps_input("1000"), FpsInput::Accepted(1000));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert_eq!(parse_fps_input("-5"), FpsInput::OutOfRange(-5));
        assert_eq!(parse_fps_input("0"), FpsInput::OutOfRange(0));
        assert_eq!(parse_fps_input("1001"), FpsInput::OutOfRange(1001));
        assert_eq!(
            parse_fps_input("99999999999"),
            FpsInput::OutOfRange(99_999_999_999)
        );
    }

    #[test]
    fn test_parse_not_a_number() {
        assert_eq!(parse_fps_input("fast"), FpsInput::NotANumber);
        assert_eq!(parse_fps_input("60.5"), FpsInput::NotANumber);
        assert_eq!(
            parse_fps_input("999999999999999999999"),
            FpsInput::NotANumber
        );
    }

    #[test]
    fn test_parse_quit_and_empty() {
        assert_eq!(parse_fps_input("q"), FpsInput::Quit);
        assert_eq!(parse_fps_input("QUIT"), FpsInput::Quit);
        assert_eq!(parse_fps_input("   "), FpsInput::Empty);
    }
}
