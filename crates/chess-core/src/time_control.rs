//! Time-control buckets for filtering games.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeClass {
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Correspondence,
}

impl TimeClass {
    /// Bucket a raw time-control string such as `"180+0"`, `"3+2"`, `"600"`
    /// or `"correspondence"`. Values under 60 are taken as minutes.
    /// Anything unparseable counts as blitz.
    pub fn classify(raw: &str) -> TimeClass {
        let tc = raw.trim().to_lowercase();
        if tc.contains("correspondence") || tc.contains("daily") {
            return TimeClass::Correspondence;
        }

        let base = tc.split('+').next().unwrap_or_default();
        let Ok(mut seconds) = base.parse::<u32>() else {
            return TimeClass::Blitz;
        };
        if seconds < 60 {
            seconds *= 60;
        }

        if seconds < 180 {
            TimeClass::Bullet
        } else if seconds < 600 {
            TimeClass::Blitz
        } else if seconds < 1800 {
            TimeClass::Rapid
        } else {
            TimeClass::Classical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeClass::Bullet => "bullet",
            TimeClass::Blitz => "blitz",
            TimeClass::Rapid => "rapid",
            TimeClass::Classical => "classical",
            TimeClass::Correspondence => "correspondence",
        }
    }
}

impl fmt::Display for TimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bullet" => Ok(TimeClass::Bullet),
            "blitz" => Ok(TimeClass::Blitz),
            "rapid" => Ok(TimeClass::Rapid),
            "classical" => Ok(TimeClass::Classical),
            "correspondence" => Ok(TimeClass::Correspondence),
            other => Err(format!("unknown time control class: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_seconds() {
        assert_eq!(TimeClass::classify("60+0"), TimeClass::Bullet);
        assert_eq!(TimeClass::classify("180+0"), TimeClass::Blitz);
        assert_eq!(TimeClass::classify("600"), TimeClass::Rapid);
        assert_eq!(TimeClass::classify("900+10"), TimeClass::Rapid);
        assert_eq!(TimeClass::classify("1800"), TimeClass::Classical);
    }

    #[test]
    fn test_classify_minutes() {
        assert_eq!(TimeClass::classify("1+0"), TimeClass::Bullet);
        assert_eq!(TimeClass::classify("3+0"), TimeClass::Blitz);
        assert_eq!(TimeClass::classify("10+5"), TimeClass::Rapid);
        assert_eq!(TimeClass::classify("45+45"), TimeClass::Classical);
    }

    #[test]
    fn test_classify_fallbacks() {
        assert_eq!(TimeClass::classify("correspondence"), TimeClass::Correspondence);
        assert_eq!(TimeClass::classify("Daily"), TimeClass::Correspondence);
        assert_eq!(TimeClass::classify("garbage"), TimeClass::Blitz);
        assert_eq!(TimeClass::classify(""), TimeClass::Blitz);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Bullet".parse::<TimeClass>(), Ok(TimeClass::Bullet));
        assert!("hyper".parse::<TimeClass>().is_err());
    }
}
