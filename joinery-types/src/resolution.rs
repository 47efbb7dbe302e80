use serde::{Deserialize, Serialize};

/// Temporal resolution vocabulary, coarsest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionOrder(Vec<String>);

impl Default for ResolutionOrder {
    fn default() -> Self {
        Self::new(["year", "quarter", "month", "week", "day", "hour", "minute", "second"])
    }
}

impl ResolutionOrder {
    pub fn new<I, S>(coarse_first: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(coarse_first.into_iter().map(Into::into).collect())
    }

    /// 0 is the coarsest label.
    pub fn rank(&self, resolution: &str) -> Option<usize> {
        self.0.iter().position(|r| r == resolution)
    }

    /// Pick the coarser of two resolutions; the finer side can always be aggregated up.
    ///
    /// Returns `None` if either label is outside the vocabulary.
    pub fn coarser<'a>(&self, left: &'a str, right: &'a str) -> Option<&'a str> {
        let l = self.rank(left)?;
        let r = self.rank(right)?;
        if l < r {
            Some(left)
        } else {
            Some(right)
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }
}
