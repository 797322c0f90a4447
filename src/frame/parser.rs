//! # Frame Parser
//!
//! Splits a raw sensor line into its ordered measurement fields.

/// Default start-of-payload token sent by the sensor firmware
pub const DEFAULT_PREFIX: &str = "start;";

/// Default field separator
pub const DEFAULT_DELIMITER: &str = ";";

/// Ordered measurement fields of one frame
pub type ParsedReading = Vec<String>;

/// Layout of a sensor text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFormat {
    /// Token stripped from the start of the line when present (may be empty)
    prefix: String,
    /// Field separator (never empty)
    delimiter: String,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

impl FrameFormat {
    /// Creates a frame format with a custom prefix and delimiter.
    ///
    /// An empty delimiter falls back to [`DEFAULT_DELIMITER`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sensor_logger::frame::FrameFormat;
    ///
    /// let format = FrameFormat::new("", ",");
    /// assert_eq!(format.parse("1,2,3"), vec!["1", "2", "3"]);
    /// ```
    #[must_use]
    pub fn new(prefix: &str, delimiter: &str) -> Self {
        let delimiter = if delimiter.is_empty() { DEFAULT_DELIMITER } else { delimiter };
        Self {
            prefix: prefix.to_string(),
            delimiter: delimiter.to_string(),
        }
    }

    /// Returns the start token.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the field separator.
    #[must_use]
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Parses one raw frame into its fields.
    ///
    /// Surrounding whitespace is trimmed, the start token is stripped when
    /// present, and the remainder is split on the delimiter. Empty input, or
    /// input that is only the start token, yields an empty reading.
    ///
    /// # Examples
    ///
    /// ```
    /// use sensor_logger::frame::FrameFormat;
    ///
    /// let format = FrameFormat::default();
    /// assert_eq!(format.parse("start;12;0.4;0.1"), vec!["12", "0.4", "0.1"]);
    /// assert!(format.parse("").is_empty());
    /// ```
    #[must_use]
    pub fn parse(&self, raw: &str) -> ParsedReading {
        let line = raw.trim();
        let payload = if self.prefix.is_empty() {
            line
        } else {
            line.strip_prefix(self.prefix.as_str()).unwrap_or(line)
        };

        if payload.is_empty() {
            return Vec::new();
        }

        payload.split(self.delimiter.as_str()).map(str::to_string).collect()
    }
}
