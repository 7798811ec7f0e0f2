use std::str::FromStr;

use thiserror::Error;

/// One progress record pushed by the backend.
///
/// The wire form is `percent,sizeMB` optionally followed by `,speed,eta`.
/// Speed and ETA arrive pre-formatted and are kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub downloaded_mb: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected 2 or 4 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid percent: {0:?}")]
    Percent(String),

    #[error("percent out of range: {0}")]
    PercentOutOfRange(u32),

    #[error("invalid size: {0:?}")]
    Size(String),
}

impl FromStr for ProgressSnapshot {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        if fields.len() != 2 && fields.len() != 4 {
            return Err(ParseError::FieldCount(fields.len()));
        }

        let percent: u32 = fields[0]
            .parse()
            .map_err(|_| ParseError::Percent(fields[0].to_string()))?;
        if percent > 100 {
            return Err(ParseError::PercentOutOfRange(percent));
        }

        let downloaded_mb: f64 = fields[1]
            .parse()
            .ok()
            .filter(|size: &f64| size.is_finite() && *size >= 0.0)
            .ok_or_else(|| ParseError::Size(fields[1].to_string()))?;

        let optional = |i: usize| {
            fields
                .get(i)
                .filter(|field| !field.is_empty())
                .map(|field| field.to_string())
        };

        Ok(Self {
            percent: percent as u8,
            downloaded_mb,
            speed: optional(2),
            eta: optional(3),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_four_fields() {
        let snapshot: ProgressSnapshot = "10,5.2,1.0MB/s,120".parse().unwrap();
        assert_eq!(snapshot.percent, 10);
        assert_eq!(snapshot.downloaded_mb, 5.2);
        assert_eq!(snapshot.speed.as_deref(), Some("1.0MB/s"));
        assert_eq!(snapshot.eta.as_deref(), Some("120"));
    }

    #[test]
    fn test_parse_backend_two_fields() {
        let snapshot: ProgressSnapshot = "42,17.35".parse().unwrap();
        assert_eq!(snapshot.percent, 42);
        assert_eq!(snapshot.speed, None);
        assert_eq!(snapshot.eta, None);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(
            "abc,xyz,fast,soon".parse::<ProgressSnapshot>(),
            Err(ParseError::Percent("abc".into()))
        );
        assert_eq!(
            "10,xyz,fast,soon".parse::<ProgressSnapshot>(),
            Err(ParseError::Size("xyz".into()))
        );
        assert_eq!(
            "10,NaN".parse::<ProgressSnapshot>(),
            Err(ParseError::Size("NaN".into()))
        );
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        assert_eq!(
            "10,5.2,1.0MB/s".parse::<ProgressSnapshot>(),
            Err(ParseError::FieldCount(3))
        );
        assert_eq!(
            "101,5.2".parse::<ProgressSnapshot>(),
            Err(ParseError::PercentOutOfRange(101))
        );
    }
}
